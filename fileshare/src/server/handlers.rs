//! Request handlers
//!
//! Each handler returns a populated response with `success` set, or an error.
//! Errors never reach the client; the session turns them into a failure response.
// (c) 2026 fileshare contributors

use std::io::SeekFrom;
use std::path::{MAIN_SEPARATOR_STR, Path};

use anyhow::{Context as _, Result, anyhow, ensure};
use bytes::BytesMut;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncReadExt as _, AsyncSeekExt as _, AsyncWriteExt as _};
use tracing::trace;

use super::session::Session;
use crate::protocol::{
    ChangeDirectoryRequest, ChangeDirectoryResponse, FileIo, FileStat, GetConfigRequest,
    GetConfigResponse, GetCurrentDirectoryRequest, GetCurrentDirectoryResponse, GetFileRequest,
    GetFileResponse, GetFileSizeRequest, GetFileSizeResponse, ListRequest, ListResponse,
    MAX_PAYLOAD_LEN, MakeDirectoryRequest, MakeDirectoryResponse, PutFileRequest, PutFileResponse,
    RemoveRequest, RemoveResponse, RenameRequest, RenameResponse,
};
use crate::util::path::resolve;

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Validates the offset and length of a file I/O request
fn io_window(io: &FileIo) -> Result<(u64, usize)> {
    let offset = u64::try_from(io.file_offset)
        .map_err(|_| anyhow!("negative file offset {}", io.file_offset))?;
    let length = usize::try_from(io.io_length)
        .map_err(|_| anyhow!("negative I/O length {}", io.io_length))?;
    ensure!(
        length <= MAX_PAYLOAD_LEN,
        "I/O length {length} exceeds the limit of {MAX_PAYLOAD_LEN}"
    );
    Ok((offset, length))
}

impl Session {
    pub(super) async fn list(&self, req: ListRequest) -> Result<ListResponse> {
        let dir = resolve(&self.current_dir, &req.path);
        trace!("list {dir:?}");
        let mut entries = fs::read_dir(&dir)
            .await
            .with_context(|| format!("reading directory {}", dir.display()))?;
        let mut items = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            // A link is reported by its target, so that a client walking the tree can
            // recognise a directory it has already entered. A dangling link is reported as itself.
            let full_path = if entry.file_type().await?.is_symlink() {
                fs::canonicalize(entry.path())
                    .await
                    .unwrap_or_else(|_| entry.path())
            } else {
                entry.path()
            };
            let meta = match fs::metadata(&full_path).await {
                Ok(m) => m,
                Err(_) => entry.metadata().await?,
            };
            let is_directory = meta.is_dir();
            items.push(FileStat {
                path: entry.file_name().to_string_lossy().into_owned(),
                full_path: path_string(&full_path),
                size: if is_directory {
                    0
                } else {
                    i64::try_from(meta.len()).unwrap_or(i64::MAX)
                },
                is_directory,
            });
        }
        items.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(ListResponse {
            success: true,
            items,
        })
    }

    pub(super) async fn change_directory(
        &mut self,
        req: ChangeDirectoryRequest,
    ) -> Result<ChangeDirectoryResponse> {
        let target = resolve(&self.current_dir, &req.path);
        let meta = fs::metadata(&target)
            .await
            .with_context(|| format!("cd {}", target.display()))?;
        ensure!(meta.is_dir(), "cd {}: not a directory", target.display());
        trace!("cd {target:?}");
        self.current_dir = target;
        Ok(ChangeDirectoryResponse { success: true })
    }

    pub(super) async fn make_directory(
        &self,
        req: MakeDirectoryRequest,
    ) -> Result<MakeDirectoryResponse> {
        let target = resolve(&self.current_dir, &req.path);
        fs::create_dir_all(&target)
            .await
            .with_context(|| format!("mkdir {}", target.display()))?;
        Ok(MakeDirectoryResponse {
            success: true,
            path: path_string(&target),
        })
    }

    pub(super) async fn rename(&self, req: RenameRequest) -> Result<RenameResponse> {
        let from = resolve(&self.current_dir, &req.source);
        let to = resolve(&self.current_dir, &req.destination);
        fs::rename(&from, &to)
            .await
            .with_context(|| format!("rename {} to {}", from.display(), to.display()))?;
        Ok(RenameResponse { success: true })
    }

    pub(super) async fn remove(&self, req: RemoveRequest) -> Result<RemoveResponse> {
        let target = resolve(&self.current_dir, &req.path);
        if req.is_directory {
            fs::remove_dir_all(&target).await
        } else {
            fs::remove_file(&target).await
        }
        .with_context(|| format!("remove {}", target.display()))?;
        Ok(RemoveResponse { success: true })
    }

    pub(super) fn get_current_directory(
        &self,
        _req: &GetCurrentDirectoryRequest,
    ) -> Result<GetCurrentDirectoryResponse> {
        Ok(GetCurrentDirectoryResponse {
            success: true,
            path: path_string(&self.current_dir),
        })
    }

    pub(super) async fn get_file_size(
        &self,
        req: GetFileSizeRequest,
    ) -> Result<GetFileSizeResponse> {
        let target = resolve(&self.current_dir, &req.path);
        let meta = fs::metadata(&target)
            .await
            .with_context(|| format!("stat {}", target.display()))?;
        ensure!(meta.is_file(), "{} is not a file", target.display());
        Ok(GetFileSizeResponse {
            success: true,
            size: i64::try_from(meta.len())?,
        })
    }

    pub(super) async fn get_file(&self, req: GetFileRequest) -> Result<GetFileResponse> {
        let (offset, length) = io_window(&req.io)?;
        let target = resolve(&self.current_dir, &req.io.path);
        let mut file = fs::File::open(&target)
            .await
            .with_context(|| format!("open {}", target.display()))?;
        let _ = file.seek(SeekFrom::Start(offset)).await?;

        // read until the window is full or the file ends
        let mut content = BytesMut::zeroed(length);
        let mut filled = 0;
        while filled < length {
            let n = file.read(&mut content[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        content.truncate(filled);
        trace!("read {filled} bytes at {offset} from {target:?}");

        Ok(GetFileResponse {
            success: true,
            io: FileIo {
                path: req.io.path,
                file_offset: req.io.file_offset,
                io_length: i32::try_from(filled)?,
                content: content.freeze(),
            },
        })
    }

    pub(super) async fn put_file(&self, req: PutFileRequest) -> Result<PutFileResponse> {
        let (offset, length) = io_window(&req.io)?;
        ensure!(
            length == req.io.content.len(),
            "declared length {length} does not match the {} bytes supplied",
            req.io.content.len()
        );
        let target = resolve(&self.current_dir, &req.io.path);
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&target)
            .await
            .with_context(|| format!("open {} for writing", target.display()))?;
        if req.truncate {
            file.set_len(0).await?;
        }
        let _ = file.seek(SeekFrom::Start(offset)).await?;
        file.write_all(&req.io.content).await?;
        file.flush().await?;
        trace!("wrote {length} bytes at {offset} to {target:?}");
        Ok(PutFileResponse {
            success: true,
            written_length: req.io.io_length,
        })
    }

    pub(super) fn get_config(_req: &GetConfigRequest) -> Result<GetConfigResponse> {
        Ok(GetConfigResponse {
            success: true,
            path_separator: MAIN_SEPARATOR_STR.to_string(),
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::Session;
    use crate::protocol::{
        ChangeDirectoryRequest, FileIo, GetCurrentDirectoryRequest, GetFileRequest,
        GetFileSizeRequest, ListRequest, MakeDirectoryRequest, PutFileRequest, RemoveRequest,
        RenameRequest,
    };

    use assertables::assert_contains;
    use bytes::Bytes;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, Session) {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::new(dir.path().to_path_buf());
        (dir, session)
    }

    fn get(path: &str, offset: i32, len: i32) -> GetFileRequest {
        GetFileRequest {
            io: FileIo {
                path: path.into(),
                file_offset: offset,
                io_length: len,
                content: Bytes::new(),
            },
        }
    }

    fn put(path: &str, offset: i32, data: &'static [u8], truncate: bool) -> PutFileRequest {
        PutFileRequest {
            io: FileIo {
                path: path.into(),
                file_offset: offset,
                io_length: i32::try_from(data.len()).unwrap(),
                content: Bytes::from_static(data),
            },
            truncate,
        }
    }

    #[tokio::test]
    async fn list_sorted_with_sizes() {
        let (dir, session) = fixture();
        fs::write(dir.path().join("b.txt"), b"12345").unwrap();
        fs::create_dir(dir.path().join("a")).unwrap();

        let resp = session
            .list(ListRequest {
                path: String::new(),
            })
            .await
            .unwrap();
        assert!(resp.success);
        let names: Vec<_> = resp.items.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(names, ["a", "b.txt"]);
        assert!(resp.items[0].is_directory);
        assert_eq!(resp.items[0].size, 0);
        assert!(!resp.items[1].is_directory);
        assert_eq!(resp.items[1].size, 5);
        assert_eq!(
            resp.items[1].full_path,
            dir.path().join("b.txt").to_string_lossy()
        );
    }

    #[tokio::test]
    async fn list_missing_directory_fails() {
        let (_dir, session) = fixture();
        let _ = session
            .list(ListRequest {
                path: "nope".into(),
            })
            .await
            .unwrap_err();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn links_are_listed_by_target() {
        let (dir, session) = fixture();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        std::os::unix::fs::symlink(&sub, sub.join("loop")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone"), sub.join("dangling")).unwrap();

        let resp = session
            .list(ListRequest {
                path: "sub".into(),
            })
            .await
            .unwrap();
        let names: Vec<_> = resp.items.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(names, ["dangling", "loop"]);
        assert_eq!(
            resp.items[0].full_path,
            sub.join("dangling").to_string_lossy()
        );
        assert!(!resp.items[0].is_directory);
        assert!(resp.items[1].is_directory);
        assert_eq!(
            resp.items[1].full_path,
            fs::canonicalize(&sub).unwrap().to_string_lossy()
        );
    }

    #[tokio::test]
    async fn change_directory_rejects_files_and_missing() {
        let (dir, mut session) = fixture();
        fs::write(dir.path().join("f"), b"").unwrap();
        for bad in ["f", "missing"] {
            let _ = session
                .change_directory(ChangeDirectoryRequest { path: bad.into() })
                .await
                .unwrap_err();
            assert_eq!(session.current_dir(), dir.path());
        }
    }

    #[tokio::test]
    async fn change_directory_up_and_down() {
        let (dir, mut session) = fixture();
        fs::create_dir_all(dir.path().join("x/y")).unwrap();
        let _ = session
            .change_directory(ChangeDirectoryRequest {
                path: "x/./y".into(),
            })
            .await
            .unwrap();
        assert_eq!(session.current_dir(), dir.path().join("x/y"));
        let _ = session
            .change_directory(ChangeDirectoryRequest { path: "..".into() })
            .await
            .unwrap();
        assert_eq!(session.current_dir(), dir.path().join("x"));
        let abs = dir.path().to_string_lossy().to_string();
        let _ = session
            .change_directory(ChangeDirectoryRequest { path: abs })
            .await
            .unwrap();
        assert_eq!(session.current_dir(), dir.path());
        let resp = session
            .get_current_directory(&GetCurrentDirectoryRequest {})
            .unwrap();
        assert_eq!(resp.path, dir.path().to_string_lossy());
    }

    #[tokio::test]
    async fn make_directory_nested_and_existing() {
        let (dir, session) = fixture();
        let resp = session
            .make_directory(MakeDirectoryRequest {
                path: "p/q".into(),
            })
            .await
            .unwrap();
        assert_eq!(resp.path, dir.path().join("p/q").to_string_lossy());
        assert!(dir.path().join("p/q").is_dir());
        // again: already exists, still fine
        let _ = session
            .make_directory(MakeDirectoryRequest {
                path: "p/q".into(),
            })
            .await
            .unwrap();
        // but not on top of a file
        fs::write(dir.path().join("file"), b"").unwrap();
        let _ = session
            .make_directory(MakeDirectoryRequest {
                path: "file".into(),
            })
            .await
            .unwrap_err();
    }

    #[tokio::test]
    async fn rename_and_remove() {
        let (dir, session) = fixture();
        fs::write(dir.path().join("old"), b"data").unwrap();
        let _ = session
            .rename(RenameRequest {
                source: "old".into(),
                destination: "new".into(),
            })
            .await
            .unwrap();
        assert!(!dir.path().join("old").exists());
        assert_eq!(fs::read(dir.path().join("new")).unwrap(), b"data");

        let _ = session
            .remove(RemoveRequest {
                path: "new".into(),
                is_directory: false,
            })
            .await
            .unwrap();
        assert!(!dir.path().join("new").exists());

        let _ = session
            .remove(RemoveRequest {
                path: "new".into(),
                is_directory: false,
            })
            .await
            .unwrap_err();
    }

    #[tokio::test]
    async fn remove_is_relative_to_current_directory() {
        let (dir, mut session) = fixture();
        fs::create_dir_all(dir.path().join("d/tree/deeper")).unwrap();
        fs::write(dir.path().join("d/tree/deeper/f"), b"x").unwrap();
        let _ = session
            .change_directory(ChangeDirectoryRequest { path: "d".into() })
            .await
            .unwrap();
        let _ = session
            .remove(RemoveRequest {
                path: "tree".into(),
                is_directory: true,
            })
            .await
            .unwrap();
        assert!(!dir.path().join("d/tree").exists());
        assert!(dir.path().join("d").exists());
    }

    #[tokio::test]
    async fn file_size() {
        let (dir, session) = fixture();
        fs::write(dir.path().join("f"), [0u8; 1000]).unwrap();
        let resp = session
            .get_file_size(GetFileSizeRequest { path: "f".into() })
            .await
            .unwrap();
        assert_eq!(resp.size, 1000);
        let e = session
            .get_file_size(GetFileSizeRequest { path: ".".into() })
            .await
            .unwrap_err();
        assert_contains!(e.to_string(), "not a file");
    }

    #[tokio::test]
    async fn get_file_windows() {
        let (dir, session) = fixture();
        fs::write(dir.path().join("f"), b"0123456789").unwrap();

        let resp = session.get_file(get("f", 2, 4)).await.unwrap();
        assert_eq!(&resp.io.content[..], b"2345");
        assert_eq!(resp.io.io_length, 4);
        assert_eq!(resp.io.file_offset, 2);
        assert_eq!(resp.io.path, "f");

        // short read at end of file
        let resp = session.get_file(get("f", 8, 100)).await.unwrap();
        assert_eq!(&resp.io.content[..], b"89");
        assert_eq!(resp.io.io_length, 2);

        // past the end
        let resp = session.get_file(get("f", 50, 10)).await.unwrap();
        assert!(resp.io.content.is_empty());
        assert_eq!(resp.io.io_length, 0);

        let _ = session.get_file(get("f", -1, 10)).await.unwrap_err();
        let _ = session.get_file(get("f", 0, -1)).await.unwrap_err();
        let _ = session.get_file(get("f", 0, i32::MAX)).await.unwrap_err();
    }

    #[tokio::test]
    async fn put_file_truncate_semantics() {
        let (dir, session) = fixture();
        let path = dir.path().join("out");

        let resp = session.put_file(put("out", 0, b"", true)).await.unwrap();
        assert!(resp.success);
        assert_eq!(resp.written_length, 0);
        assert_eq!(fs::read(&path).unwrap(), b"");

        let _ = session.put_file(put("out", 0, b"hello", false)).await.unwrap();
        let _ = session.put_file(put("out", 5, b" world", false)).await.unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"hello world");

        // overwrite in the middle without truncating
        let _ = session.put_file(put("out", 0, b"J", false)).await.unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"Jello world");

        // truncate then write
        let _ = session.put_file(put("out", 0, b"bye", true)).await.unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"bye");
    }

    #[tokio::test]
    async fn put_file_length_mismatch() {
        let (_dir, session) = fixture();
        let mut req = put("out", 0, b"abc", false);
        req.io.io_length = 4;
        let _ = session.put_file(req).await.unwrap_err();
    }

    #[tokio::test]
    async fn get_file_reassembles() {
        let (dir, session) = fixture();
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        fs::write(dir.path().join("src"), &data).unwrap();

        let mut rebuilt = Vec::new();
        let mut offset = 0;
        while offset < data.len() {
            let resp = session
                .get_file(get("src", i32::try_from(offset).unwrap(), 4096))
                .await
                .unwrap();
            rebuilt.extend_from_slice(&resp.io.content);
            offset += resp.io.content.len();
        }
        assert_eq!(rebuilt, data);
    }

    #[test]
    fn config_reports_separator() {
        let resp = Session::get_config(&crate::protocol::GetConfigRequest {}).unwrap();
        assert_eq!(resp.path_separator, std::path::MAIN_SEPARATOR_STR);
    }
}
