use std::io::{ErrorKind, Read};

use bytes::{Buf, Bytes, BytesMut};
use filex_transport::Connection;
use tracing::trace;

use crate::codec::{find_sentinel_from, rescan_offset, FrameConfig, COMMAND_TERMINATOR, SENTINEL};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Reads messages and file bodies from any `Read` stream.
///
/// Bytes read past the end of the current message or body are kept in an
/// internal buffer and served to the next call, so nothing the peer sent is
/// lost between a command and the body that follows it.
pub struct MessageReader<T> {
    inner: T,
    buf: BytesMut,
    scratch: Vec<u8>,
    config: FrameConfig,
}

impl<T: Read> MessageReader<T> {
    /// Create a new reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        let scratch = vec![0u8; config.chunk_size.max(config.max_message_size).max(1)];
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            scratch,
            config,
        }
    }

    /// Read one reply-style message (blocking).
    ///
    /// Returns everything already buffered, or else the result of exactly one
    /// read of at most `max_message_size` bytes. Returns
    /// `Err(FrameError::ConnectionClosed)` at EOF.
    pub fn read_message(&mut self) -> Result<Bytes> {
        self.fill_if_empty()?;
        Ok(self.buf.split().freeze())
    }

    /// Read one command-style message (blocking).
    ///
    /// Like [`MessageReader::read_message`], but if the buffered bytes contain
    /// a `\n` the message stops there and the terminator is dropped. Any bytes
    /// after the terminator stay buffered.
    ///
    /// Leftover bytes without a terminator (the head of a pipelined command
    /// split across reads) are completed with one more read before the
    /// message is handed out.
    pub fn read_command(&mut self) -> Result<Bytes> {
        let mut fresh = self.fill_if_empty()?;
        loop {
            if let Some(pos) = self.buf.iter().position(|b| *b == COMMAND_TERMINATOR) {
                let line = self.buf.split_to(pos).freeze();
                self.buf.advance(1);
                return Ok(line);
            }
            if fresh || self.fill(self.config.max_message_size)? == 0 {
                return Ok(self.buf.split().freeze());
            }
            fresh = true;
        }
    }

    /// Look at the next message without consuming it.
    ///
    /// Performs one read if nothing is buffered.
    pub fn peek_message(&mut self) -> Result<&[u8]> {
        self.fill_if_empty()?;
        Ok(&self.buf)
    }

    /// Read a sentinel-terminated file body (blocking).
    ///
    /// Returns the bytes preceding the first sentinel. Bytes after the sentinel
    /// remain buffered for the next read instead of being discarded with the
    /// chunk they arrived in, so a command sent right behind a body is kept.
    pub fn read_body(&mut self) -> Result<Bytes> {
        let mut scanned = 0usize;
        loop {
            if let Some(pos) = find_sentinel_from(&self.buf, scanned) {
                if pos > self.config.max_body_size {
                    return Err(FrameError::BodyTooLarge {
                        size: pos,
                        max: self.config.max_body_size,
                    });
                }
                let body = self.buf.split_to(pos).freeze();
                self.buf.advance(SENTINEL.len());
                trace!(size = body.len(), "body complete");
                return Ok(body);
            }

            scanned = rescan_offset(self.buf.len());
            if scanned > self.config.max_body_size {
                return Err(FrameError::BodyTooLarge {
                    size: scanned,
                    max: self.config.max_body_size,
                });
            }

            if self.fill(self.config.chunk_size)? == 0 {
                return Err(FrameError::ConnectionClosed);
            }
        }
    }

    /// Pull in whatever the stream has ready without waiting for more.
    ///
    /// Intended for streams in non-blocking mode: reads until the stream
    /// reports `WouldBlock` and returns the number of bytes added to the
    /// buffer. EOF is reported as `Err(FrameError::ConnectionClosed)`.
    pub fn read_available(&mut self) -> Result<usize> {
        let mut total = 0usize;
        loop {
            let limit = self.scratch.len();
            match self.inner.read(&mut self.scratch[..limit]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => {
                    self.buf.extend_from_slice(&self.scratch[..n]);
                    total += n;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(total),
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Bytes received but not yet handed out.
    pub fn buffered(&self) -> &[u8] {
        &self.buf
    }

    /// Remove and return everything buffered.
    pub fn take_buffered(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    /// Returns `true` if a read was performed.
    fn fill_if_empty(&mut self) -> Result<bool> {
        if !self.buf.is_empty() {
            return Ok(false);
        }
        if self.fill(self.config.max_message_size)? == 0 {
            return Err(FrameError::ConnectionClosed);
        }
        Ok(true)
    }

    /// One read of at most `limit` bytes appended to the buffer.
    fn fill(&mut self, limit: usize) -> Result<usize> {
        let limit = limit.clamp(1, self.scratch.len());
        loop {
            match self.inner.read(&mut self.scratch[..limit]) {
                Ok(n) => {
                    self.buf.extend_from_slice(&self.scratch[..n]);
                    return Ok(n);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream. Buffered bytes are dropped.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl MessageReader<Connection> {
    /// Create a reader for a `Connection` and apply the read timeout from config.
    pub fn with_config_conn(inner: Connection, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

pub(crate) fn transport_to_frame_error(err: filex_transport::TransportError) -> FrameError {
    match err {
        filex_transport::TransportError::Io(io)
        | filex_transport::TransportError::Accept(io) => FrameError::Io(io),
        filex_transport::TransportError::Bind { source, .. }
        | filex_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
