//! Path-related
// (c) 2026 fileshare contributors

use std::path::{Component, Path, PathBuf};

/// Lexically normalises a path: `.` components are dropped and `..` removes the
/// preceding component. `..` never climbs above the root.
///
/// The filesystem is not consulted, so symbolic links are not resolved.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::Normal(_) => {
                out.push(component);
            }
            Component::CurDir => (),
            Component::ParentDir => {
                // pop() refuses to remove the root, which is what we want
                let _ = out.pop();
            }
        }
    }
    out
}

/// Resolves a client-supplied path against a base directory.
///
/// Absolute paths are taken as-is; anything else is relative to `base`. Either way the
/// result is normalised. An empty path resolves to `base` itself.
pub(crate) fn resolve(base: &Path, path: &str) -> PathBuf {
    let given = Path::new(path);
    if given.is_absolute() {
        normalize(given)
    } else {
        normalize(&base.join(given))
    }
}

/// Join a remote path using the separator the server told us about,
/// independent of the client's OS.
pub(crate) fn join_remote(base: &str, separator: &str, leaf: &str) -> String {
    if base.is_empty() {
        return leaf.to_string();
    }
    if base.ends_with(separator) {
        format!("{base}{leaf}")
    } else {
        format!("{base}{separator}{leaf}")
    }
}

/// Returns the final component of a remote path, given the server's separator
pub(crate) fn remote_basename<'a>(path: &'a str, separator: &str) -> &'a str {
    let trimmed = path.trim_end_matches(separator);
    if trimmed.is_empty() {
        return path;
    }
    trimmed
        .rsplit_once(separator)
        .map_or(trimmed, |(_, leaf)| leaf)
}

/// Checks that a name supplied by the server is a single plain path component,
/// so that joining it onto a local directory cannot escape that directory.
pub(crate) fn is_plain_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::{is_plain_name, join_remote, normalize, remote_basename, resolve};
    use pretty_assertions::assert_eq;
    use std::path::{Path, PathBuf};

    #[cfg(unix)]
    #[test]
    fn normalization() {
        assert_eq!(normalize(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize(Path::new("/../../x")), PathBuf::from("/x"));
        assert_eq!(normalize(Path::new("/a/b/")), PathBuf::from("/a/b"));
        assert_eq!(normalize(Path::new("/")), PathBuf::from("/"));
    }

    #[cfg(unix)]
    #[test]
    fn resolution() {
        let base = Path::new("/srv/share");
        assert_eq!(resolve(base, ""), PathBuf::from("/srv/share"));
        assert_eq!(resolve(base, "."), PathBuf::from("/srv/share"));
        assert_eq!(resolve(base, "sub"), PathBuf::from("/srv/share/sub"));
        assert_eq!(resolve(base, "../other"), PathBuf::from("/srv/other"));
        assert_eq!(resolve(base, "/etc/hosts"), PathBuf::from("/etc/hosts"));
        assert_eq!(resolve(base, "/tmp/../etc"), PathBuf::from("/etc"));
    }

    #[test]
    fn remote_joins() {
        assert_eq!(join_remote("", "/", "a"), "a");
        assert_eq!(join_remote("/x", "/", "a"), "/x/a");
        assert_eq!(join_remote("/x/", "/", "a"), "/x/a");
        assert_eq!(join_remote("C:\\x", "\\", "a"), "C:\\x\\a");
    }

    #[test]
    fn remote_basenames() {
        assert_eq!(remote_basename("/a/b/c", "/"), "c");
        assert_eq!(remote_basename("/a/b/", "/"), "b");
        assert_eq!(remote_basename("c", "/"), "c");
        assert_eq!(remote_basename("C:\\x\\y.txt", "\\"), "y.txt");
        assert_eq!(remote_basename("/", "/"), "/");
    }

    #[test]
    fn plain_names() {
        assert!(is_plain_name("file.txt"));
        assert!(!is_plain_name(""));
        assert!(!is_plain_name(".."));
        assert!(!is_plain_name("a/b"));
        assert!(!is_plain_name("/etc"));
    }
}
