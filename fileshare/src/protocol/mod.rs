// (c) 2026 fileshare contributors

//! 📖 The fileshare wire protocol
//!
//! A client drives a server over a single TCP connection, one request at a time.
//! There is no request identifier and no pipelining: the two sides stay in step
//! because each waits for the other before sending again.
//!
//! ## Framing
//!
//! A request is a [`Header`] followed by the request body for its [`OpCode`].
//! A response has no header; its body always starts with a `success` flag.
//!
//! | Element | Encoding |
//! | ------- | -------- |
//! | Header | opcode `u8`, reserved `u32` (always 0, ignored on receipt) |
//! | `bool` | one byte, 0 or 1 |
//! | `int32`, `int64`, `uint32` | little-endian |
//! | string | LEB128 byte count (at most 5 bytes) then UTF-8 bytes |
//! | payload | `int32` byte count then the bytes |
//! | sequence | `int32` item count then the items |
//!
//! The reserved header field does not describe the message length.
//! Message boundaries come only from each type's own decoder, so a decoder must
//! consume exactly what the matching encoder produced.
//! A short or malformed message therefore desynchronises the stream for good,
//! and both endpoints drop the connection when one is seen ([`WireError`]).
//!
//! ## Operations
//!
//! | Opcode | Request | Response |
//! | ------ | ------- | -------- |
//! | 0 List | path | success, sequence of [`FileStat`] |
//! | 1 ChangeDirectory | path | success |
//! | 2 MakeDirectory | path | success, resolved path |
//! | 3 Rename | source, destination | success |
//! | 4 Remove | path, is-directory | success |
//! | 5 GetCurrentDirectory | | success, path |
//! | 6 PutFile | [`FileIo`], truncate | success, written length |
//! | 7 GetFile | [`FileIo`] (empty content) | success, [`FileIo`] |
//! | 8 GetFileSize | path | success, size (`int64`) |
//! | 9 GetConfig | | success, path separator |
//!
//! A response with `success = false` carries default values in every other field.
//! No error detail crosses the wire.

mod codec;
pub use codec::{MAX_PAYLOAD_LEN, MAX_SEQUENCE_LEN, MAX_STRING_LEN, WireError};

pub mod common;
pub use common::WireMessage;

mod header;
pub use header::{Header, OpCode};

mod catalog;
pub use catalog::*;

#[cfg(test)]
pub(crate) mod test_helpers;
