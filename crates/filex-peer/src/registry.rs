use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::info;

/// Server-assigned id of an accepted connection.
pub type ConnectionId = u64;

/// The connection a handle is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerInfo {
    pub id: ConnectionId,
    pub addr: SocketAddr,
}

/// Point-in-time view of the registered handles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistrySnapshot {
    pub user_count: usize,
    /// Handles in registration order.
    pub user_list: Vec<String>,
}

#[derive(Debug)]
struct Entry {
    peer: PeerInfo,
    seq: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    next_seq: u64,
}

/// Handle → connection map shared by all sessions of a server.
///
/// Registration is check-and-insert under one lock, so two sessions racing
/// for the same handle cannot both win.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    inner: Mutex<Inner>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `handle` to `peer`.
    ///
    /// Returns `false` if the handle is empty or already taken.
    pub fn register(&self, handle: &str, peer: PeerInfo) -> bool {
        if handle.is_empty() {
            return false;
        }

        let snapshot = {
            let mut inner = self.lock();
            if inner.entries.contains_key(handle) {
                return false;
            }
            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.entries.insert(handle.to_string(), Entry { peer, seq });
            snapshot_of(&inner)
        };

        info!(
            handle,
            peer = %peer.addr,
            connection = peer.id,
            user_count = snapshot.user_count,
            user_list = ?snapshot.user_list,
            "handle registered"
        );
        true
    }

    /// Remove `handle`. Removing an absent handle is a no-op.
    pub fn unregister(&self, handle: &str) {
        let snapshot = {
            let mut inner = self.lock();
            if inner.entries.remove(handle).is_none() {
                return;
            }
            snapshot_of(&inner)
        };

        info!(
            handle,
            user_count = snapshot.user_count,
            user_list = ?snapshot.user_list,
            "handle released"
        );
    }

    pub fn contains(&self, handle: &str) -> bool {
        self.lock().entries.contains_key(handle)
    }

    /// Connection currently bound to `handle`.
    pub fn peer_of(&self, handle: &str) -> Option<PeerInfo> {
        self.lock().entries.get(handle).map(|entry| entry.peer)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        snapshot_of(&self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panicking session cannot leave the map half-updated.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn snapshot_of(inner: &Inner) -> RegistrySnapshot {
    let mut entries: Vec<(&String, &Entry)> = inner.entries.iter().collect();
    entries.sort_by_key(|(_, entry)| entry.seq);
    RegistrySnapshot {
        user_count: entries.len(),
        user_list: entries.into_iter().map(|(handle, _)| handle.clone()).collect(),
    }
}
