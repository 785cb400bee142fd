use std::io::{ErrorKind, Read, Write};

use filex_transport::Connection;
use tracing::trace;

use crate::codec::{FrameConfig, COMMAND_TERMINATOR, SENTINEL};
use crate::error::{FrameError, Result};
use crate::reader::transport_to_frame_error;

/// Writes messages and file bodies to any `Write` stream.
pub struct MessageWriter<T> {
    inner: T,
    config: FrameConfig,
}

impl<T: Write> MessageWriter<T> {
    /// Create a new writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self { inner, config }
    }

    /// Send a reply-style message: the full text in a single write.
    pub fn send_message(&mut self, text: &str) -> Result<()> {
        self.write_all(text.as_bytes())?;
        self.flush()
    }

    /// Send a request: the text plus the `\n` terminator in a single write.
    pub fn send_command(&mut self, text: &str) -> Result<()> {
        let mut line = Vec::with_capacity(text.len() + 1);
        line.extend_from_slice(text.as_bytes());
        line.push(COMMAND_TERMINATOR);
        self.write_all(&line)?;
        self.flush()
    }

    /// Send a file body in `chunk_size` writes, then the sentinel as a final
    /// separate write.
    pub fn send_body(&mut self, body: &[u8]) -> Result<()> {
        for chunk in body.chunks(self.config.chunk_size.max(1)) {
            self.write_all(chunk)?;
        }
        self.write_all(SENTINEL)?;
        trace!(size = body.len(), "body sent");
        self.flush()
    }

    /// Stream a file body from `src` without holding it in memory.
    ///
    /// Returns the number of body bytes sent (sentinel excluded).
    pub fn send_body_from<R: Read>(&mut self, mut src: R) -> Result<u64> {
        let mut chunk = vec![0u8; self.config.chunk_size.max(1)];
        let mut sent = 0u64;
        loop {
            let n = match src.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };
            self.write_all(&chunk[..n])?;
            sent += n as u64;
        }
        self.write_all(SENTINEL)?;
        trace!(size = sent, "body streamed");
        self.flush()?;
        Ok(sent)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let mut offset = 0usize;
        while offset < bytes.len() {
            match self.inner.write(&bytes[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        Ok(())
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
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

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl MessageWriter<Connection> {
    /// Create a writer for a `Connection` and apply the write timeout from config.
    pub fn with_config_conn(inner: Connection, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::reader::MessageReader;

    #[test]
    fn send_message_is_verbatim() {
        let mut writer = MessageWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send_message("Directory list:\na.txt\nb.txt").unwrap();

        let wire = writer.into_inner().into_inner();
        assert_eq!(wire.as_slice(), b"Directory list:\na.txt\nb.txt");
    }

    #[test]
    fn send_command_appends_terminator() {
        let mut writer = MessageWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send_command("/get report.pdf").unwrap();

        let wire = writer.into_inner().into_inner();
        assert_eq!(wire.as_slice(), b"/get report.pdf\n");
    }

    #[test]
    fn body_is_chunked_then_sentinel() {
        let mut writer = MessageWriter::new(RecordingWriter::default());
        writer.send_body(&vec![1u8; 1500]).unwrap();

        let inner = writer.into_inner();
        assert_eq!(inner.writes, vec![1024, 476, SENTINEL.len()]);
        assert_eq!(&inner.data[1500..], SENTINEL);
    }

    #[test]
    fn empty_body_is_only_sentinel() {
        let mut writer = MessageWriter::new(RecordingWriter::default());
        writer.send_body(b"").unwrap();

        let inner = writer.into_inner();
        assert_eq!(inner.writes, vec![SENTINEL.len()]);
    }

    #[test]
    fn custom_chunk_size() {
        let cfg = FrameConfig {
            chunk_size: 4,
            ..FrameConfig::default()
        };
        let mut writer = MessageWriter::with_config(RecordingWriter::default(), cfg);
        writer.send_body(b"0123456789").unwrap();

        assert_eq!(writer.into_inner().writes, vec![4, 4, 2, SENTINEL.len()]);
    }

    #[test]
    fn streamed_body_matches_buffered_body() {
        let payload: Vec<u8> = (0..2500u32).map(|i| (i % 7) as u8).collect();

        let mut streamed = MessageWriter::new(Cursor::new(Vec::<u8>::new()));
        let sent = streamed.send_body_from(Cursor::new(payload.clone())).unwrap();
        assert_eq!(sent, 2500);

        let mut buffered = MessageWriter::new(Cursor::new(Vec::<u8>::new()));
        buffered.send_body(&payload).unwrap();

        assert_eq!(
            streamed.into_inner().into_inner(),
            buffered.into_inner().into_inner()
        );
    }

    #[test]
    fn written_body_decodes() {
        let mut writer = MessageWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send_body(b"report contents").unwrap();

        let wire = writer.into_inner().into_inner();
        let mut reader = MessageReader::new(Cursor::new(wire));
        assert_eq!(reader.read_body().unwrap().as_ref(), b"report contents");
    }

    #[test]
    fn flush_propagates() {
        let sink = FlushTrackingWriter::default();
        let flag = Arc::clone(&sink.flushed);
        let mut writer = MessageWriter::new(sink);

        writer.send_message("x").unwrap();

        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn handles_interrupted_and_would_block_writes() {
        let mut writer = MessageWriter::new(FlakyWriter {
            failures: vec![ErrorKind::Interrupted, ErrorKind::WouldBlock],
            data: Vec::new(),
        });
        writer.send_message("Left the server.").unwrap();

        assert_eq!(writer.into_inner().data.as_slice(), b"Left the server.");
    }

    #[test]
    fn connection_closed_when_write_returns_zero() {
        let mut writer = MessageWriter::new(ZeroWriter);
        let err = writer.send_message("x").unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn accessors_and_into_inner() {
        let cursor = Cursor::new(Vec::<u8>::new());
        let mut writer = MessageWriter::new(cursor);

        let _ = writer.get_ref();
        let _ = writer.get_mut();
        assert_eq!(writer.config().chunk_size, 1024);
        let _inner = writer.into_inner();
    }

    #[derive(Default)]
    struct RecordingWriter {
        writes: Vec<usize>,
        data: Vec<u8>,
    }

    impl Write for RecordingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.writes.push(buf.len());
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct FlushTrackingWriter {
        flushed: Arc<AtomicBool>,
        data: Vec<u8>,
    }

    impl Write for FlushTrackingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FlakyWriter {
        failures: Vec<ErrorKind>,
        data: Vec<u8>,
    }

    impl Write for FlakyWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if let Some(kind) = self.failures.pop() {
                return Err(std::io::Error::from(kind));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
