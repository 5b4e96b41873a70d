//! Local directory tree enumeration for uploads
// (c) 2026 fileshare contributors

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// One file or directory found under an upload source
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct LocalEntry {
    /// Where it is on the local filesystem
    pub path: PathBuf,
    /// Its path below the walk root, one name per component; empty for the root itself
    pub relative: Vec<String>,
    pub is_dir: bool,
    /// File length; 0 for directories
    pub size: u64,
}

/// Why a local tree could not be enumerated
#[derive(Debug, thiserror::Error)]
pub(crate) enum WalkError {
    /// A symbolic link leads back to one of its own ancestors
    #[error("filesystem loop at {}", path.display())]
    Loop { path: PathBuf },
    /// A name is not valid UTF-8 and cannot be sent
    #[error("{} is not valid UTF-8", path.display())]
    NotUnicode { path: PathBuf },
    #[error("{}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl WalkError {
    fn from_walkdir(root: &Path, err: walkdir::Error) -> Self {
        let path = err.path().unwrap_or(root).to_path_buf();
        if err.loop_ancestor().is_some() {
            return Self::Loop { path };
        }
        Self::Io {
            path,
            source: err.into(),
        }
    }
}

/// Lists `root` and everything below it, following symbolic links.
///
/// Directories come before their contents, and siblings are in file name order.
/// This does blocking I/O.
pub(crate) fn local_tree(root: &Path) -> Result<Vec<LocalEntry>, WalkError> {
    let mut output = Vec::new();
    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| WalkError::from_walkdir(root, e))?;
        let path = entry.path();
        // walkdir includes the root in every path; keep only what is below it
        let n_strip = path.components().count() - entry.depth();
        let relative = path
            .components()
            .skip(n_strip)
            .map(|c| {
                c.as_os_str()
                    .to_str()
                    .map(str::to_string)
                    .ok_or_else(|| WalkError::NotUnicode {
                        path: path.to_path_buf(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let is_dir = entry.file_type().is_dir();
        let size = if is_dir {
            0
        } else {
            entry
                .metadata()
                .map_err(|e| WalkError::from_walkdir(root, e))?
                .len()
        };
        output.push(LocalEntry {
            path: path.to_path_buf(),
            relative,
            is_dir,
            size,
        });
    }
    Ok(output)
}
