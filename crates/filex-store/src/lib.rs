//! Flat, directory-backed storage of named byte blobs.
//!
//! One file per stored name under a storage root. Names are taken verbatim
//! from the caller; there is no metadata beyond the filesystem's own and no
//! locking between concurrent writers of the same name (last write wins).

pub mod error;
pub mod store;

pub use error::{Result, StoreError};
pub use store::{FileStore, Listing};
