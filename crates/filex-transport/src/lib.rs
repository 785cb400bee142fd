//! TCP transport for filex.
//!
//! Wraps `std::net` listeners and streams behind the [`Connection`] type that
//! the framing and peer layers operate on. This is the lowest layer of filex;
//! it knows nothing about commands, handles or file bodies.

pub mod error;
pub mod tcp;
pub mod traits;

pub use error::{Result, TransportError};
pub use tcp::TcpTransport;
pub use traits::Connection;
