/// Errors that can occur while reading or writing messages and bodies.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// An incoming file body grew past the configured maximum before its
    /// sentinel arrived.
    #[error("file body too large ({size} bytes, max {max})")]
    BodyTooLarge { size: usize, max: usize },

    /// An I/O error occurred on the underlying stream.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed, possibly in the middle of a body.
    #[error("connection closed")]
    ConnectionClosed,
}

impl FrameError {
    /// True when the peer went away rather than misbehaving.
    pub fn is_disconnect(&self) -> bool {
        match self {
            FrameError::ConnectionClosed => true,
            FrameError::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::UnexpectedEof
            ),
            FrameError::BodyTooLarge { .. } => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
