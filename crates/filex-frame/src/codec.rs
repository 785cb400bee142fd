use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Marks the end of a file body: `\r\nEND\r\n`.
pub const SENTINEL: &[u8] = b"\r\nEND\r\n";

/// Terminates requests sent by filex clients.
pub const COMMAND_TERMINATOR: u8 = b'\n';

/// Size of each body chunk write, and of each body read.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Upper bound for one command or reply read.
pub const DEFAULT_MAX_MESSAGE: usize = 1024;

/// Default maximum accepted body size: 1 GiB.
pub const DEFAULT_MAX_BODY: usize = 1024 * 1024 * 1024;

/// Configuration for message and body framing.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Bytes per body chunk. Default: 1024.
    pub chunk_size: usize,
    /// Read buffer size for a single command or reply. Default: 1024.
    pub max_message_size: usize,
    /// Largest body accepted by the reader. Default: 1 GiB.
    pub max_body_size: usize,
    /// Read timeout for blocking operations. `None` blocks indefinitely.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_message_size: DEFAULT_MAX_MESSAGE,
            max_body_size: DEFAULT_MAX_BODY,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

/// Position of the first sentinel in `buf`.
pub fn find_sentinel(buf: &[u8]) -> Option<usize> {
    find_sentinel_from(buf, 0)
}

/// Position of the first sentinel in `buf` starting at or after `start`.
pub(crate) fn find_sentinel_from(buf: &[u8], start: usize) -> Option<usize> {
    if buf.len() < SENTINEL.len() || start > buf.len() - SENTINEL.len() {
        return None;
    }
    buf[start..]
        .windows(SENTINEL.len())
        .position(|window| window == SENTINEL)
        .map(|pos| start + pos)
}

/// Earliest offset a sentinel could start at once `len` bytes have been
/// scanned without a match.
pub(crate) fn rescan_offset(len: usize) -> usize {
    len.saturating_sub(SENTINEL.len() - 1)
}

/// Append `body` followed by the sentinel.
///
/// Wire format:
/// ```text
/// ┌───────────────────────────┬──────────────────────┐
/// │ Body (any length)         │ Sentinel (7B)        │
/// │ raw bytes                 │ 0D 0A 45 4E 44 0D 0A │
/// └───────────────────────────┴──────────────────────┘
/// ```
pub fn encode_body(body: &[u8], dst: &mut BytesMut) {
    dst.reserve(body.len() + SENTINEL.len());
    dst.put_slice(body);
    dst.put_slice(SENTINEL);
}

/// Split a complete body off the front of `src`.
///
/// Returns `None` if no sentinel has arrived yet. On success, consumes the
/// body and the sentinel; whatever followed the sentinel stays in `src`.
pub fn split_body(src: &mut BytesMut) -> Option<Bytes> {
    let pos = find_sentinel(src)?;
    let body = src.split_to(pos).freeze();
    src.advance(SENTINEL.len());
    Some(body)
}

#[cfg(feature = "async")]
mod body_codec {
    use bytes::{Buf, Bytes, BytesMut};
    use tokio_util::codec::{Decoder, Encoder};

    use super::{encode_body, find_sentinel_from, rescan_offset, DEFAULT_MAX_BODY, SENTINEL};
    use crate::error::FrameError;

    /// `tokio_util` codec for sentinel-terminated bodies.
    #[derive(Debug, Clone)]
    pub struct BodyCodec {
        max_body_size: usize,
        scanned: usize,
    }

    impl BodyCodec {
        pub fn new(max_body_size: usize) -> Self {
            Self {
                max_body_size,
                scanned: 0,
            }
        }
    }

    impl Default for BodyCodec {
        fn default() -> Self {
            Self::new(DEFAULT_MAX_BODY)
        }
    }

    impl Decoder for BodyCodec {
        type Item = Bytes;
        type Error = FrameError;

        fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, FrameError> {
            if let Some(pos) = find_sentinel_from(src, self.scanned) {
                self.scanned = 0;
                if pos > self.max_body_size {
                    return Err(FrameError::BodyTooLarge {
                        size: pos,
                        max: self.max_body_size,
                    });
                }
                let body = src.split_to(pos).freeze();
                src.advance(SENTINEL.len());
                return Ok(Some(body));
            }

            let body_floor = rescan_offset(src.len());
            if body_floor > self.max_body_size {
                return Err(FrameError::BodyTooLarge {
                    size: body_floor,
                    max: self.max_body_size,
                });
            }
            self.scanned = body_floor;
            Ok(None)
        }

        fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, FrameError> {
            match self.decode(src)? {
                Some(body) => Ok(Some(body)),
                None if src.is_empty() => Ok(None),
                None => Err(FrameError::ConnectionClosed),
            }
        }
    }

    impl Encoder<Bytes> for BodyCodec {
        type Error = FrameError;

        fn encode(&mut self, body: Bytes, dst: &mut BytesMut) -> Result<(), FrameError> {
            encode_body(&body, dst);
            Ok(())
        }
    }
}

#[cfg(feature = "async")]
pub use body_codec::BodyCodec;
