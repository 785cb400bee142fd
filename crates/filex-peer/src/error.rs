use filex_store::StoreError;

/// Errors that end a peer operation.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] filex_transport::TransportError),

    /// Framing or connection I/O error.
    #[error("frame error: {0}")]
    Frame(#[from] filex_frame::FrameError),

    /// A local state precondition failed; nothing was sent.
    #[error("{0}")]
    State(&'static str),

    /// The server answered with an error reply.
    #[error("{0}")]
    Rejected(String),

    /// A local file could not be read or written.
    #[error("{context}: {source}")]
    Local {
        context: String,
        source: std::io::Error,
    },
}

impl PeerError {
    /// True when the error means the connection is gone.
    pub fn is_disconnect(&self) -> bool {
        match self {
            PeerError::Frame(err) => err.is_disconnect(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, PeerError>;

/// Classification of a failed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandErrorKind {
    /// Malformed or unsupported command, or wrong argument count.
    Protocol,
    /// The session is not in a state that allows the command.
    State,
    /// The handle is bound to another connection.
    NameConflict,
    /// The requested file does not exist.
    NotFound,
    /// Disk failure while serving the command.
    Io,
}

/// A command that failed without harming the connection.
///
/// The `Display` text is the exact reply sent back to the client.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Error: Command not found.")]
    UnknownCommand(String),

    #[error("Error: Invalid parameters. Usage: {0}")]
    Usage(&'static str),

    #[error("{0}")]
    State(&'static str),

    #[error("Error: Registration failed. Handle or alias already exists.")]
    NameConflict(String),

    #[error("Error: File '{0}' not found.")]
    NotFound(String),

    #[error("Error: Failed to store file. {0}")]
    StoreFailed(StoreError),

    #[error("Error: Failed to store file. {0}")]
    BodyRejected(filex_frame::FrameError),

    #[error("Error: Failed to send file. {0}")]
    SendFailed(StoreError),

    #[error("Error: Failed to list directory. {0}")]
    ListFailed(StoreError),
}

impl CommandError {
    pub fn kind(&self) -> CommandErrorKind {
        match self {
            CommandError::UnknownCommand(_) | CommandError::Usage(_) => CommandErrorKind::Protocol,
            CommandError::State(_) => CommandErrorKind::State,
            CommandError::NameConflict(_) => CommandErrorKind::NameConflict,
            CommandError::NotFound(_) => CommandErrorKind::NotFound,
            CommandError::StoreFailed(_)
            | CommandError::BodyRejected(_)
            | CommandError::SendFailed(_)
            | CommandError::ListFailed(_) => CommandErrorKind::Io,
        }
    }
}
