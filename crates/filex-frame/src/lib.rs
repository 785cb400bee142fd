//! Message and file-body framing for filex.
//!
//! The TCP stream carries two kinds of traffic, neither of which is
//! length-prefixed:
//! - Command messages and replies: short UTF-8 text, one write per message,
//!   read back with a single bounded read. Requests from filex clients end in
//!   `\n` so the server can separate a command from bytes that follow it.
//! - File bodies: raw bytes written in fixed-size chunks and terminated by the
//!   sentinel `\r\nEND\r\n`. A body that itself contains the sentinel is cut
//!   short at its first occurrence; that is a property of the wire format.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub use codec::BodyCodec;
pub use codec::{
    encode_body, find_sentinel, split_body, FrameConfig, COMMAND_TERMINATOR, DEFAULT_CHUNK_SIZE,
    DEFAULT_MAX_BODY, DEFAULT_MAX_MESSAGE, SENTINEL,
};
pub use error::{FrameError, Result};
pub use reader::MessageReader;
pub use writer::MessageWriter;
