use std::io::{Read, Write};
use std::sync::Arc;

use filex_frame::{FrameError, MessageReader, MessageWriter};
use filex_store::{FileStore, StoreError};
use tracing::{debug, info, warn};

use crate::addresses::AddressLease;
use crate::error::{CommandError, Result};
use crate::protocol::{self, Request};
use crate::registry::{ClientRegistry, PeerInfo};

/// Registration state of one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unregistered,
    Registered { handle: String },
}

impl SessionState {
    pub fn handle(&self) -> Option<&str> {
        match self {
            SessionState::Unregistered => None,
            SessionState::Registered { handle } => Some(handle),
        }
    }
}

/// What to do after a command has been handled.
enum Outcome {
    Reply(String),
    Silent,
    /// Reply, then end the session.
    Close(String),
}

type Handled = std::result::Result<Outcome, CommandError>;

/// Server side of one connection.
///
/// Reads one command at a time, handles it completely (including any file
/// transfer), replies, then reads the next. Command failures are answered with
/// an `Error:` reply and the loop continues; stream failures end the session.
///
/// Dropping the session releases its handle and its address lease.
pub struct Session<R, W> {
    peer: PeerInfo,
    reader: MessageReader<R>,
    writer: MessageWriter<W>,
    registry: Arc<ClientRegistry>,
    store: FileStore,
    state: SessionState,
    joined: bool,
    lease: Option<AddressLease>,
}

impl<R: Read, W: Write> Session<R, W> {
    pub fn new(
        peer: PeerInfo,
        reader: MessageReader<R>,
        writer: MessageWriter<W>,
        registry: Arc<ClientRegistry>,
        store: FileStore,
    ) -> Self {
        Self {
            peer,
            reader,
            writer,
            registry,
            store,
            state: SessionState::Unregistered,
            joined: true,
            lease: None,
        }
    }

    /// Hold `lease` for the lifetime of the session.
    pub fn with_lease(mut self, lease: AddressLease) -> Self {
        self.lease = Some(lease);
        self
    }

    pub fn peer(&self) -> PeerInfo {
        self.peer
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_joined(&self) -> bool {
        self.joined
    }

    /// Run the command loop until the peer disconnects.
    ///
    /// A clean or abrupt disconnect is `Ok`; any other stream failure is
    /// returned after cleanup.
    pub fn run(mut self) -> Result<()> {
        loop {
            match self.step() {
                Ok(true) => {}
                Ok(false) => {
                    info!(peer = %self.peer.addr, "session closed by server");
                    return Ok(());
                }
                Err(err) if err.is_disconnect() => {
                    info!(peer = %self.peer.addr, "client disconnected");
                    return Ok(());
                }
                Err(err) => {
                    warn!(peer = %self.peer.addr, error = %err, "session failed");
                    return Err(err);
                }
            }
        }
    }

    /// Read and handle one command.
    ///
    /// Returns `Ok(false)` when the session should end.
    pub fn step(&mut self) -> Result<bool> {
        let raw = self.reader.read_command()?;
        let line = String::from_utf8_lossy(&raw);

        let handled = match Request::parse(&line) {
            Ok(Some(request)) => {
                debug!(peer = %self.peer.addr, command = ?request, "received command");
                self.dispatch(request)?
            }
            Ok(None) => {
                debug!(peer = %self.peer.addr, "ignored blank message");
                Ok(Outcome::Silent)
            }
            Err(err) => Err(err),
        };

        match handled {
            Ok(Outcome::Reply(text)) => self.reply(&text)?,
            Ok(Outcome::Silent) => {}
            Ok(Outcome::Close(text)) => {
                self.reply(&text)?;
                return Ok(false);
            }
            Err(err) => {
                debug!(peer = %self.peer.addr, kind = ?err.kind(), "command rejected");
                self.reply(&err.to_string())?;
            }
        }
        Ok(true)
    }

    fn dispatch(&mut self, request: Request) -> Result<Handled> {
        Ok(match request {
            Request::Register { handle } => self.register(handle),
            Request::Store { name } => return self.store_file(&name),
            Request::Get { name } => return self.send_file(&name),
            Request::Dir => self.directory(),
            Request::Join => self.join(),
            Request::Leave => self.leave(),
        })
    }

    fn reply(&mut self, text: &str) -> Result<()> {
        self.writer.send_message(text)?;
        Ok(())
    }

    fn register(&mut self, handle: String) -> Handled {
        if matches!(self.state, SessionState::Registered { .. }) {
            return Err(CommandError::State(protocol::ALREADY_REGISTERED));
        }
        if !self.registry.register(&handle, self.peer) {
            let holder = self.registry.peer_of(&handle).map(|peer| peer.addr);
            info!(peer = %self.peer.addr, handle = %handle, holder = ?holder, "handle already taken");
            return Err(CommandError::NameConflict(handle));
        }

        let reply = protocol::welcome(&handle);
        self.state = SessionState::Registered { handle };
        self.joined = true;
        Ok(Outcome::Reply(reply))
    }

    fn store_file(&mut self, name: &str) -> Result<Handled> {
        if self.state.handle().is_none() {
            return Ok(Err(CommandError::State(protocol::STORE_BEFORE_REGISTER)));
        }

        let body = match self.reader.read_body() {
            Ok(body) => body,
            Err(err @ FrameError::BodyTooLarge { .. }) => {
                // The rest of the body is still in flight; the stream cannot be resynchronized.
                warn!(peer = %self.peer.addr, name, error = %err, "upload rejected");
                let text = CommandError::BodyRejected(err).to_string();
                return Ok(Ok(Outcome::Close(text)));
            }
            Err(err) => return Err(err.into()),
        };

        if let Err(err) = self.store.write(name, &body) {
            warn!(peer = %self.peer.addr, name, error = %err, "failed to store file");
            return Ok(Err(CommandError::StoreFailed(err)));
        }
        info!(peer = %self.peer.addr, name, size = body.len(), "file stored");
        Ok(Ok(Outcome::Silent))
    }

    fn send_file(&mut self, name: &str) -> Result<Handled> {
        if self.state.handle().is_none() {
            return Ok(Err(CommandError::State(protocol::GET_BEFORE_REGISTER)));
        }

        let file = match self.store.open_read(name) {
            Ok(file) => file,
            Err(StoreError::NotFound { .. }) => {
                return Ok(Err(CommandError::NotFound(name.to_string())));
            }
            Err(err) => {
                warn!(peer = %self.peer.addr, name, error = %err, "failed to open file");
                return Ok(Err(CommandError::SendFailed(err)));
            }
        };

        let size = self.writer.send_body_from(file)?;
        info!(peer = %self.peer.addr, name, size, "file sent");
        Ok(Ok(Outcome::Silent))
    }

    fn directory(&mut self) -> Handled {
        if self.state.handle().is_none() {
            return Err(CommandError::State(protocol::DIR_BEFORE_REGISTER));
        }
        let listing = self.store.list().map_err(CommandError::ListFailed)?;
        Ok(Outcome::Reply(protocol::render_listing(&listing)))
    }

    fn join(&mut self) -> Handled {
        if self.joined {
            return Err(CommandError::State(protocol::ALREADY_JOINED));
        }
        self.joined = true;
        Ok(Outcome::Reply(protocol::JOINED.to_string()))
    }

    fn leave(&mut self) -> Handled {
        if !self.joined && self.state.handle().is_none() {
            return Err(CommandError::State(protocol::NOT_JOINED));
        }
        self.release_handle();
        self.joined = false;
        info!(peer = %self.peer.addr, "client left");
        Ok(Outcome::Reply(protocol::LEFT.to_string()))
    }
}

impl<R, W> Session<R, W> {
    fn release_handle(&mut self) {
        if let SessionState::Registered { handle } =
            std::mem::replace(&mut self.state, SessionState::Unregistered)
        {
            self.registry.unregister(&handle);
        }
    }
}

impl<R, W> Drop for Session<R, W> {
    fn drop(&mut self) {
        self.release_handle();
        debug!(peer = %self.peer.addr, connection = self.peer.id, "session cleaned up");
    }
}
