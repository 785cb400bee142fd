//! Connection lifecycle and command protocol for filex.
//!
//! Server side: [`FileServer`] accepts connections, rejects duplicate source
//! addresses, and runs one [`Session`] per connection on its own thread.
//! Sessions share a [`ClientRegistry`] that keeps handles unique.
//!
//! Client side: [`Dispatcher`] turns user commands into requests and decodes
//! the replies, reporting everything through a [`LogSink`].

pub mod addresses;
pub mod connector;
pub mod error;
pub mod listener;
pub mod protocol;
pub mod registry;
pub mod session;

pub use addresses::{ActiveAddresses, AddressKey, AddressLease};
pub use connector::{ClientState, ClientStatus, Dispatcher, DispatcherConfig, LogSink, TracingSink};
pub use error::{CommandError, CommandErrorKind, PeerError, Result};
pub use listener::{FileServer, ServerConfig, ServerHandle, ServerStatus};
pub use protocol::Request;
pub use registry::{ClientRegistry, ConnectionId, PeerInfo, RegistrySnapshot};
pub use session::{Session, SessionState};
