//! Multi-client file exchange over TCP.
//!
//! A server stores files uploaded by clients that have registered a unique
//! handle; clients list, upload and download files with a small text protocol.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP listener and connection
//! - [`frame`]: command messages and sentinel-terminated file bodies
//! - [`store`]: directory-backed file store
//! - [`peer`]: server sessions, client registry and client dispatcher (behind `peer` feature)

/// Re-export transport types.
pub mod transport {
    pub use filex_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use filex_frame::*;
}

/// Re-export store types.
pub mod store {
    pub use filex_store::*;
}

/// Re-export peer types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use filex_peer::*;
}
