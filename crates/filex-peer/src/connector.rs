use std::fmt::Display;
use std::fs::File;
use std::io::{self, Read};
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use filex_frame::{FrameConfig, MessageReader, MessageWriter};
use filex_store::Listing;
use filex_transport::{Connection, TcpTransport};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{PeerError, Result};
use crate::protocol::{self, Request};

pub const CONNECTED: &str = "Connection to the File Exchange Server is successful!";
pub const DISCONNECTED: &str = "Connection closed. Thank you!";
pub const INVALID_COMMAND: &str = "Error: Command not found or incorrect parameters.";
pub const ALREADY_JOINED: &str = "Error: Already joined the server.";
pub const NOT_JOINED: &str = "Error: You have not joined the server yet.";
pub const REGISTER_BEFORE_JOIN: &str = "Error: Please join the server before registering.";
pub const ALREADY_REGISTERED: &str = "Error: Already registered.";
pub const STORE_BEFORE_REGISTER: &str = "Error: Please register before storing files.";
pub const GET_BEFORE_REGISTER: &str = "Error: Please register before requesting files.";
pub const DIR_BEFORE_REGISTER: &str = "Error: Please register before requesting the directory list.";
pub const LOCAL_FILE_MISSING: &str = "Error: File not found.";

pub const HELP: &str = "Available Commands:\n\
/join <server_ip_add> <port>\n\
/leave\n\
/register <handle>\n\
/store <filename>\n\
/dir\n\
/get <filename>\n\
/?";

/// Receives everything the dispatcher wants shown to the user.
pub trait LogSink {
    fn log(&self, message: &str);

    /// Show a directory listing. Defaults to logging its text form.
    fn listing(&self, listing: &Listing) {
        self.log(&format!(
            "Files in server:\n{}",
            protocol::render_listing(listing)
        ));
    }
}

/// Sink that forwards messages to `tracing` at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, message: &str) {
        info!(target: "filex::client", "{message}");
    }
}

impl<S: LogSink + ?Sized> LogSink for &S {
    fn log(&self, message: &str) {
        (**self).log(message);
    }

    fn listing(&self, listing: &Listing) {
        (**self).listing(listing);
    }
}

/// Client connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientState {
    Disconnected,
    Connected,
    Registered,
}

/// Status fields for presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientStatus {
    pub state: ClientState,
    pub connected: bool,
    pub registered: bool,
    pub handle: Option<String>,
    pub server: Option<SocketAddr>,
}

/// Client behavior config.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub frame: FrameConfig,
    /// Where fetched files are written by [`Dispatcher::execute`].
    pub download_dir: PathBuf,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            download_dir: PathBuf::from("."),
        }
    }
}

struct Link {
    reader: MessageReader<Connection>,
    writer: MessageWriter<Connection>,
    server: SocketAddr,
}

/// Client side of the protocol.
///
/// Every operation checks the local state first and fails with
/// [`PeerError::State`] without contacting the server if the precondition is
/// not met. Any stream failure drops the connection and resets the state to
/// [`ClientState::Disconnected`].
pub struct Dispatcher<S> {
    sink: S,
    config: DispatcherConfig,
    link: Option<Link>,
    handle: Option<String>,
}

impl<S: LogSink> Dispatcher<S> {
    pub fn new(sink: S) -> Self {
        Self::with_config(sink, DispatcherConfig::default())
    }

    pub fn with_config(sink: S, config: DispatcherConfig) -> Self {
        Self {
            sink,
            config,
            link: None,
            handle: None,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn state(&self) -> ClientState {
        match (&self.link, &self.handle) {
            (None, _) => ClientState::Disconnected,
            (Some(_), None) => ClientState::Connected,
            (Some(_), Some(_)) => ClientState::Registered,
        }
    }

    pub fn status(&self) -> ClientStatus {
        let state = self.state();
        ClientStatus {
            state,
            connected: state != ClientState::Disconnected,
            registered: state == ClientState::Registered,
            handle: self.handle.clone(),
            server: self.link.as_ref().map(|link| link.server),
        }
    }

    /// Open the connection. No protocol message is sent.
    pub fn connect<A: ToSocketAddrs + Display>(&mut self, addr: A) -> Result<()> {
        if self.link.is_some() {
            return Err(PeerError::State(ALREADY_JOINED));
        }

        let conn = TcpTransport::connect(addr)?;
        let server = conn.peer_addr();
        let read_half = conn.try_clone()?;
        let reader = MessageReader::with_config_conn(read_half, self.config.frame.clone())?;
        let writer = MessageWriter::with_config_conn(conn, self.config.frame.clone())?;

        info!(server = %server, "connected");
        self.link = Some(Link {
            reader,
            writer,
            server,
        });
        Ok(())
    }

    /// Register `handle`. Returns the server's welcome text.
    pub fn register(&mut self, handle: &str) -> Result<String> {
        if self.link.is_none() {
            return Err(PeerError::State(REGISTER_BEFORE_JOIN));
        }
        if self.handle.is_some() {
            return Err(PeerError::State(ALREADY_REGISTERED));
        }

        let request = Request::Register {
            handle: handle.to_string(),
        };
        let reply = self.request_text(&request)?;
        if !reply.starts_with(protocol::WELCOME_PREFIX) {
            return Err(PeerError::Rejected(reply));
        }
        self.handle = Some(handle.to_string());
        Ok(reply)
    }

    /// Upload `src` under `name`. Returns the number of bytes sent.
    ///
    /// The server does not acknowledge a successful store; a failure reply
    /// is picked up before the next request. The protocol has no store
    /// acknowledgement to wait for, so a failure reply that arrives only after
    /// the next request has been sent is read as that request's reply, and
    /// the real answer surfaces on the following drain.
    pub fn store<R: Read>(&mut self, name: &str, src: R) -> Result<u64> {
        if self.handle.is_none() {
            return Err(PeerError::State(STORE_BEFORE_REGISTER));
        }

        self.drain()?;
        let request = Request::Store {
            name: name.to_string(),
        };
        let result = self.with_link(|link| {
            link.writer.send_command(&request.to_line())?;
            Ok(link.writer.send_body_from(src)?)
        });
        let sent = self.guard(result)?;
        debug!(name, size = sent, "file uploaded");
        Ok(sent)
    }

    /// Download `name`.
    pub fn fetch(&mut self, name: &str) -> Result<Bytes> {
        if self.handle.is_none() {
            return Err(PeerError::State(GET_BEFORE_REGISTER));
        }

        self.drain()?;
        let request = Request::Get {
            name: name.to_string(),
        };
        let result = self.with_link(|link| {
            link.writer.send_command(&request.to_line())?;
            if protocol::is_error_reply(link.reader.peek_message()?) {
                let reply = link.reader.read_message()?;
                return Err(PeerError::Rejected(
                    String::from_utf8_lossy(&reply).into_owned(),
                ));
            }
            Ok(link.reader.read_body()?)
        });
        self.guard(result)
    }

    pub fn list_directory(&mut self) -> Result<Listing> {
        if self.handle.is_none() {
            return Err(PeerError::State(DIR_BEFORE_REGISTER));
        }

        let reply = self.request_text(&Request::Dir)?;
        protocol::parse_listing(&reply).ok_or(PeerError::Rejected(reply))
    }

    /// Send `/leave` and close the connection without waiting for a reply.
    pub fn leave(&mut self) -> Result<()> {
        let Some(mut link) = self.link.take() else {
            return Err(PeerError::State(NOT_JOINED));
        };
        self.handle = None;

        let sent = link.writer.send_command(&Request::Leave.to_line());
        link.writer.get_ref().shutdown();
        info!(server = %link.server, "disconnected");
        sent?;
        Ok(())
    }

    /// Parse and run one user command line, reporting every outcome through
    /// the sink.
    ///
    /// Errors are logged to the sink and also returned.
    pub fn execute(&mut self, line: &str) -> Result<()> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let result = match tokens.as_slice() {
            [] => return Ok(()),
            ["/join", ip, port] => match port.parse::<u16>() {
                Ok(port) => self.join_command(ip, port),
                Err(_) => Err(PeerError::State(INVALID_COMMAND)),
            },
            ["/leave"] => self.leave().map(|()| self.sink.log(DISCONNECTED)),
            ["/register", handle] => self.register(handle).map(|reply| self.sink.log(&reply)),
            ["/store", path] => self.store_command(Path::new(path)),
            ["/dir"] => self
                .list_directory()
                .map(|listing| self.sink.listing(&listing)),
            ["/get", name] => self.get_command(name),
            ["/?"] => {
                self.sink.log(HELP);
                Ok(())
            }
            _ => Err(PeerError::State(INVALID_COMMAND)),
        };

        if let Err(err) = &result {
            self.sink.log(&err.to_string());
        }
        result
    }

    fn join_command(&mut self, ip: &str, port: u16) -> Result<()> {
        match self.connect(host_port(ip, port)) {
            Ok(()) => {
                self.sink.log(CONNECTED);
                Ok(())
            }
            Err(err @ PeerError::State(_)) => Err(err),
            Err(err) => Err(PeerError::Rejected(format!(
                "Error: Connection to the Server has failed! Please check IP Address and Port Number. {err}"
            ))),
        }
    }

    fn store_command(&mut self, path: &Path) -> Result<()> {
        if self.handle.is_none() {
            return Err(PeerError::State(STORE_BEFORE_REGISTER));
        }
        let name = match path.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => return Err(PeerError::State(LOCAL_FILE_MISSING)),
        };
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(PeerError::State(LOCAL_FILE_MISSING));
            }
            Err(source) => {
                return Err(PeerError::Local {
                    context: format!("Error: Failed to send file. {}", path.display()),
                    source,
                });
            }
        };

        self.store(&name, file)?;
        self.sink
            .log(&format!("User<{}>: Uploaded {name}", unix_timestamp()));
        Ok(())
    }

    fn get_command(&mut self, name: &str) -> Result<()> {
        let body = self.fetch(name)?;
        let target = self.config.download_dir.join(name);
        std::fs::write(&target, &body).map_err(|source| PeerError::Local {
            context: format!("Error: Failed to save file. {}", target.display()),
            source,
        })?;
        self.sink
            .log(&format!("File received from Server: {name}"));
        Ok(())
    }

    /// Send `request` and read one textual reply. Error replies become
    /// [`PeerError::Rejected`].
    fn request_text(&mut self, request: &Request) -> Result<String> {
        self.drain()?;
        let line = request.to_line();
        let result = self.with_link(|link| {
            link.writer.send_command(&line)?;
            let reply = link.reader.read_message()?;
            Ok(String::from_utf8_lossy(&reply).into_owned())
        });
        let reply = self.guard(result)?;
        if protocol::is_error_reply(reply.as_bytes()) {
            return Err(PeerError::Rejected(reply));
        }
        Ok(reply)
    }

    /// Log any unsolicited bytes (such as a deferred store failure) waiting on
    /// the connection.
    fn drain(&mut self) -> Result<()> {
        let result = self.with_link(|link| {
            let conn = link.reader.get_ref();
            conn.set_nonblocking(true)?;
            let pulled = link.reader.read_available();
            link.reader.get_ref().set_nonblocking(false)?;
            pulled?;
            Ok(link.reader.take_buffered())
        });
        let pending = self.guard(result)?;
        if !pending.is_empty() {
            let text = String::from_utf8_lossy(&pending);
            warn!(message = %text, "unsolicited server message");
            self.sink.log(&text);
        }
        Ok(())
    }

    fn with_link<T>(&mut self, f: impl FnOnce(&mut Link) -> Result<T>) -> Result<T> {
        match self.link.as_mut() {
            Some(link) => f(link),
            None => Err(PeerError::State(NOT_JOINED)),
        }
    }

    /// Drop the connection if `result` failed on the stream.
    fn guard<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err @ (PeerError::Frame(_) | PeerError::Transport(_))) = &result {
            warn!(error = %err, "connection lost");
            if let Some(link) = self.link.take() {
                link.writer.get_ref().shutdown();
            }
            self.handle = None;
        }
        result
    }
}

/// `host:port`, bracketing bare IPv6 literals.
fn host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

fn unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}
