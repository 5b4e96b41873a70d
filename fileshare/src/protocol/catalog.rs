// (c) 2026 fileshare contributors

//! The operation catalog: one request/response pair per [`OpCode`]

use std::fmt::Debug;
use std::future::Future;

use bytes::{Bytes, BytesMut};
use tokio::io::AsyncRead;

use super::{Header, OpCode, WireError, WireMessage};

/// Declares a message struct whose wire encoding is its fields, in declaration order.
macro_rules! wire_struct {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $( $(#[$fmeta:meta])* $fvis:vis $field:ident : $ty:ty ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Default, PartialEq, Eq)]
        $vis struct $name {
            $( $(#[$fmeta])* $fvis $field: $ty, )*
        }

        impl WireMessage for $name {
            #[allow(unused_variables)] // for field-less messages
            fn encode(&self, buf: &mut BytesMut) {
                $( self.$field.encode(buf); )*
            }

            #[allow(unused_variables)]
            fn decode<R>(reader: &mut R) -> impl Future<Output = Result<Self, WireError>> + Send
            where
                R: AsyncRead + Unpin + Send,
            {
                async move {
                    Ok(Self {
                        $( $field: <$ty as WireMessage>::decode(reader).await?, )*
                    })
                }
            }
        }
    };
}

/// A request message.
///
/// Each request type knows its opcode and the type of its response.
pub trait Request: WireMessage + Debug {
    /// The opcode that introduces this request on the wire
    const OPCODE: OpCode;
    /// The matching response type
    type Response: Response;

    /// Encodes this request, with its [`Header`], ready to send
    fn to_framed_bytes(&self) -> BytesMut {
        let mut buf = BytesMut::new();
        Header::new(Self::OPCODE).encode(&mut buf);
        self.encode(&mut buf);
        buf
    }
}

/// A response message.
///
/// `Default` produces the failure response: `success` is false and every other field
/// is empty or zero.
pub trait Response: WireMessage + Debug + Default {
    /// Did the server carry out the request?
    fn success(&self) -> bool;
}

/// Binds a request type to its opcode and response type
macro_rules! operation {
    ($op:ident: $req:ty => $resp:ty) => {
        impl Request for $req {
            const OPCODE: OpCode = OpCode::$op;
            type Response = $resp;
        }
        impl Response for $resp {
            fn success(&self) -> bool {
                self.success
            }
        }
    };
}

// SHARED STRUCTURES /////////////////////////////////////////////////////////////////////

wire_struct! {
    /// One directory entry, as reported by the server
    pub struct FileStat {
        /// The server's absolute path to the entry
        pub full_path: String,
        /// The entry's name within its directory
        pub path: String,
        /// Length in bytes; 0 for directories
        pub size: i64,
        /// Whether the entry is a directory
        pub is_directory: bool,
    }
}

wire_struct! {
    /// A window onto a file, shared by [`GetFile`](OpCode::GetFile) and [`PutFile`](OpCode::PutFile).
    ///
    /// In a GetFile request `content` is empty and `io_length` is the number of bytes wanted;
    /// in the response `io_length` is the number of bytes actually read (less than requested at
    /// end of file) and `content` holds them.
    /// In a PutFile request `content` holds the bytes to write and `io_length` is its length.
    pub struct FileIo {
        /// The file concerned, as given by the client
        pub path: String,
        /// Byte offset into the file
        pub file_offset: i32,
        /// Number of bytes requested or carried
        pub io_length: i32,
        /// File data
        pub content: Bytes,
    }
}

// REQUESTS AND RESPONSES ////////////////////////////////////////////////////////////////

wire_struct! {
    /// List the entries of a directory. An empty path means the current directory.
    pub struct ListRequest {
        /// Directory to list
        pub path: String,
    }
}
wire_struct! {
    /// Reply to [`ListRequest`]
    pub struct ListResponse {
        /// Outcome
        pub success: bool,
        /// Directory entries, sorted by name
        pub items: Vec<FileStat>,
    }
}
operation!(List: ListRequest => ListResponse);

wire_struct! {
    /// Change the session's current directory
    pub struct ChangeDirectoryRequest {
        /// The new directory; must exist
        pub path: String,
    }
}
wire_struct! {
    /// Reply to [`ChangeDirectoryRequest`]
    pub struct ChangeDirectoryResponse {
        /// Outcome
        pub success: bool,
    }
}
operation!(ChangeDirectory: ChangeDirectoryRequest => ChangeDirectoryResponse);

wire_struct! {
    /// Create a directory and any missing parents
    pub struct MakeDirectoryRequest {
        /// Directory to create
        pub path: String,
    }
}
wire_struct! {
    /// Reply to [`MakeDirectoryRequest`]
    pub struct MakeDirectoryResponse {
        /// Outcome
        pub success: bool,
        /// The server's absolute path to the directory
        pub path: String,
    }
}
operation!(MakeDirectory: MakeDirectoryRequest => MakeDirectoryResponse);

wire_struct! {
    /// Rename or move a file or directory
    pub struct RenameRequest {
        /// Existing path
        pub source: String,
        /// New path
        pub destination: String,
    }
}
wire_struct! {
    /// Reply to [`RenameRequest`]
    pub struct RenameResponse {
        /// Outcome
        pub success: bool,
    }
}
operation!(Rename: RenameRequest => RenameResponse);

wire_struct! {
    /// Delete a file, or a directory and everything in it
    pub struct RemoveRequest {
        /// Path to delete
        pub path: String,
        /// Whether `path` is a directory (which is deleted recursively)
        pub is_directory: bool,
    }
}
wire_struct! {
    /// Reply to [`RemoveRequest`]
    pub struct RemoveResponse {
        /// Outcome
        pub success: bool,
    }
}
operation!(Remove: RemoveRequest => RemoveResponse);

wire_struct! {
    /// Report the session's current directory
    pub struct GetCurrentDirectoryRequest {}
}
wire_struct! {
    /// Reply to [`GetCurrentDirectoryRequest`]
    pub struct GetCurrentDirectoryResponse {
        /// Outcome
        pub success: bool,
        /// Absolute path
        pub path: String,
    }
}
operation!(GetCurrentDirectory: GetCurrentDirectoryRequest => GetCurrentDirectoryResponse);

wire_struct! {
    /// Write a chunk of a file
    pub struct PutFileRequest {
        /// What to write, and where
        pub io: FileIo,
        /// Truncate the file to zero length before writing
        pub truncate: bool,
    }
}
wire_struct! {
    /// Reply to [`PutFileRequest`]
    pub struct PutFileResponse {
        /// Outcome
        pub success: bool,
        /// Number of bytes written; on success this is always the full request
        pub written_length: i32,
    }
}
operation!(PutFile: PutFileRequest => PutFileResponse);

wire_struct! {
    /// Read a chunk of a file
    pub struct GetFileRequest {
        /// What to read; `content` is empty
        pub io: FileIo,
    }
}
wire_struct! {
    /// Reply to [`GetFileRequest`]
    pub struct GetFileResponse {
        /// Outcome
        pub success: bool,
        /// The bytes read
        pub io: FileIo,
    }
}
operation!(GetFile: GetFileRequest => GetFileResponse);

wire_struct! {
    /// Report the size of a file
    pub struct GetFileSizeRequest {
        /// File to measure
        pub path: String,
    }
}
wire_struct! {
    /// Reply to [`GetFileSizeRequest`]
    pub struct GetFileSizeResponse {
        /// Outcome
        pub success: bool,
        /// Length in bytes
        pub size: i64,
    }
}
operation!(GetFileSize: GetFileSizeRequest => GetFileSizeResponse);

wire_struct! {
    /// Report server properties
    pub struct GetConfigRequest {}
}
wire_struct! {
    /// Reply to [`GetConfigRequest`]
    pub struct GetConfigResponse {
        /// Outcome
        pub success: bool,
        /// The server's path separator, to be used when building remote paths
        pub path_separator: String,
    }
}
operation!(GetConfig: GetConfigRequest => GetConfigResponse);

// SERVER-SIDE DECODING //////////////////////////////////////////////////////////////////

/// Any request, as decoded by the server
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(missing_docs)] // the variants are self-explanatory
pub enum Command {
    List(ListRequest),
    ChangeDirectory(ChangeDirectoryRequest),
    MakeDirectory(MakeDirectoryRequest),
    Rename(RenameRequest),
    Remove(RemoveRequest),
    GetCurrentDirectory(GetCurrentDirectoryRequest),
    PutFile(PutFileRequest),
    GetFile(GetFileRequest),
    GetFileSize(GetFileSizeRequest),
    GetConfig(GetConfigRequest),
}

impl Command {
    /// Reads the body of a request whose [`Header`] has already been read
    pub async fn read_body<R>(opcode: OpCode, reader: &mut R) -> Result<Self, WireError>
    where
        R: AsyncRead + Unpin + Send,
    {
        Ok(match opcode {
            OpCode::List => Self::List(ListRequest::decode(reader).await?),
            OpCode::ChangeDirectory => {
                Self::ChangeDirectory(ChangeDirectoryRequest::decode(reader).await?)
            }
            OpCode::MakeDirectory => {
                Self::MakeDirectory(MakeDirectoryRequest::decode(reader).await?)
            }
            OpCode::Rename => Self::Rename(RenameRequest::decode(reader).await?),
            OpCode::Remove => Self::Remove(RemoveRequest::decode(reader).await?),
            OpCode::GetCurrentDirectory => {
                Self::GetCurrentDirectory(GetCurrentDirectoryRequest::decode(reader).await?)
            }
            OpCode::PutFile => Self::PutFile(PutFileRequest::decode(reader).await?),
            OpCode::GetFile => Self::GetFile(GetFileRequest::decode(reader).await?),
            OpCode::GetFileSize => Self::GetFileSize(GetFileSizeRequest::decode(reader).await?),
            OpCode::GetConfig => Self::GetConfig(GetConfigRequest::decode(reader).await?),
        })
    }

    /// Reads a complete request: header, then body.
    ///
    /// # Return
    /// `Ok(None)` if the stream closed cleanly before a new request began.
    pub async fn read<R>(reader: &mut R) -> Result<Option<Self>, WireError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let Some(header) = Header::read_opt(reader).await? else {
            return Ok(None);
        };
        Self::read_body(header.opcode, reader).await.map(Some)
    }

    /// The opcode this request travels under
    #[must_use]
    pub fn opcode(&self) -> OpCode {
        match self {
            Self::List(_) => ListRequest::OPCODE,
            Self::ChangeDirectory(_) => ChangeDirectoryRequest::OPCODE,
            Self::MakeDirectory(_) => MakeDirectoryRequest::OPCODE,
            Self::Rename(_) => RenameRequest::OPCODE,
            Self::Remove(_) => RemoveRequest::OPCODE,
            Self::GetCurrentDirectory(_) => GetCurrentDirectoryRequest::OPCODE,
            Self::PutFile(_) => PutFileRequest::OPCODE,
            Self::GetFile(_) => GetFileRequest::OPCODE,
            Self::GetFileSize(_) => GetFileSizeRequest::OPCODE,
            Self::GetConfig(_) => GetConfigRequest::OPCODE,
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    async fn roundtrip<T: WireMessage + PartialEq + Debug>(value: &T) {
        let buf = value.to_bytes();
        let mut reader = &buf[..];
        let decoded = T::decode(&mut reader).await.unwrap();
        assert!(reader.is_empty(), "decoder left {} bytes", reader.len());
        assert_eq!(&decoded, value);
    }

    async fn command_roundtrip<Q: Request + Clone>(request: &Q, wrap: fn(Q) -> Command) {
        let buf = request.to_framed_bytes();
        let mut reader = &buf[..];
        let decoded = Command::read(&mut reader).await.unwrap().unwrap();
        assert!(reader.is_empty());
        assert_eq!(decoded.opcode(), Q::OPCODE);
        assert_eq!(decoded, wrap(request.clone()));
    }

    fn deep_path() -> String {
        (0..64).map(|i| format!("level{i}")).collect::<Vec<_>>().join("/")
    }

    #[tokio::test]
    async fn requests() {
        command_roundtrip(&ListRequest { path: String::new() }, Command::List).await;
        command_roundtrip(
            &ChangeDirectoryRequest { path: deep_path() },
            Command::ChangeDirectory,
        )
        .await;
        command_roundtrip(
            &MakeDirectoryRequest {
                path: "sub".into(),
            },
            Command::MakeDirectory,
        )
        .await;
        command_roundtrip(
            &RenameRequest {
                source: "a".into(),
                destination: "b/ü".into(),
            },
            Command::Rename,
        )
        .await;
        command_roundtrip(
            &RemoveRequest {
                path: "gone".into(),
                is_directory: true,
            },
            Command::Remove,
        )
        .await;
        command_roundtrip(&GetCurrentDirectoryRequest {}, Command::GetCurrentDirectory).await;
        command_roundtrip(
            &PutFileRequest {
                io: FileIo {
                    path: "f".into(),
                    file_offset: i32::MAX,
                    io_length: 3,
                    content: Bytes::from_static(b"abc"),
                },
                truncate: true,
            },
            Command::PutFile,
        )
        .await;
        command_roundtrip(
            &GetFileRequest {
                io: FileIo {
                    path: "f".into(),
                    file_offset: 0,
                    io_length: 4096,
                    content: Bytes::new(),
                },
            },
            Command::GetFile,
        )
        .await;
        command_roundtrip(
            &GetFileSizeRequest { path: deep_path() },
            Command::GetFileSize,
        )
        .await;
        command_roundtrip(&GetConfigRequest {}, Command::GetConfig).await;
    }

    #[tokio::test]
    async fn responses() {
        roundtrip(&ListResponse {
            success: true,
            items: vec![
                FileStat {
                    full_path: "/srv/a".into(),
                    path: "a".into(),
                    size: i64::MAX,
                    is_directory: false,
                },
                FileStat {
                    full_path: "/srv/sub".into(),
                    path: "sub".into(),
                    size: 0,
                    is_directory: true,
                },
            ],
        })
        .await;
        roundtrip(&ChangeDirectoryResponse { success: true }).await;
        roundtrip(&MakeDirectoryResponse {
            success: true,
            path: "/srv/sub".into(),
        })
        .await;
        roundtrip(&RenameResponse { success: false }).await;
        roundtrip(&RemoveResponse { success: true }).await;
        roundtrip(&GetCurrentDirectoryResponse {
            success: true,
            path: deep_path(),
        })
        .await;
        roundtrip(&PutFileResponse {
            success: true,
            written_length: i32::MAX,
        })
        .await;
        roundtrip(&GetFileResponse {
            success: true,
            io: FileIo {
                path: "f".into(),
                file_offset: 8,
                io_length: 2,
                content: Bytes::from_static(&[0xff, 0x00]),
            },
        })
        .await;
        roundtrip(&GetFileSizeResponse {
            success: true,
            size: 10 * 1024 * 1024,
        })
        .await;
        roundtrip(&GetConfigResponse {
            success: true,
            path_separator: "/".into(),
        })
        .await;
    }

    #[tokio::test]
    async fn failure_responses_are_default() {
        let resp = GetFileResponse::default();
        assert!(!resp.success());
        // all fields are still present on the wire: bool, string, 2x int32, empty payload
        assert_eq!(resp.to_bytes().len(), 1 + 1 + 4 + 4 + 4);
        roundtrip(&resp).await;
    }

    #[test]
    fn field_order() {
        let req = RemoveRequest {
            path: "x".into(),
            is_directory: true,
        };
        assert_eq!(&req.to_framed_bytes()[..], &[4, 0, 0, 0, 0, 1, b'x', 1]);

        let req = PutFileRequest {
            io: FileIo {
                path: "p".into(),
                file_offset: 2,
                io_length: 1,
                content: Bytes::from_static(b"z"),
            },
            truncate: true,
        };
        assert_eq!(
            &req.to_bytes()[..],
            &[1, b'p', 2, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, b'z', 1]
        );
    }

    #[tokio::test]
    async fn reserved_header_field_is_not_a_length() {
        let req = RenameRequest {
            source: "a".into(),
            destination: "b".into(),
        };
        let mut buf = req.to_framed_bytes();
        buf[1..5].copy_from_slice(&[0xff; 4]);
        let follower = GetCurrentDirectoryRequest {}.to_framed_bytes();
        buf.extend_from_slice(&follower);

        let mut reader = &buf[..];
        let first = Command::read(&mut reader).await.unwrap().unwrap();
        assert_eq!(first, Command::Rename(req));
        let second = Command::read(&mut reader).await.unwrap().unwrap();
        assert_eq!(second.opcode(), OpCode::GetCurrentDirectory);
        assert!(Command::read(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn truncated_file_payload_is_a_framing_error() {
        let req = PutFileRequest {
            io: FileIo {
                path: "p".into(),
                file_offset: 0,
                io_length: 8,
                content: Bytes::from_static(b"12345678"),
            },
            truncate: false,
        };
        let buf = req.to_framed_bytes();
        let mut reader = &buf[..buf.len() - 4];
        let e = Command::read(&mut reader).await.unwrap_err();
        assert!(matches!(e, WireError::Truncated));
    }
}
