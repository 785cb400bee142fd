use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// What counts as "the same client" when rejecting duplicate connections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AddressKey {
    /// Full `ip:port` source address.
    #[default]
    SocketAddr,
    /// Source IP only: one connection per host.
    Ip,
}

impl AddressKey {
    fn normalize(self, addr: SocketAddr) -> SocketAddr {
        match self {
            AddressKey::SocketAddr => addr,
            AddressKey::Ip => SocketAddr::new(addr.ip(), 0),
        }
    }
}

/// Source addresses with a live session.
#[derive(Debug, Default)]
pub struct ActiveAddresses {
    key: AddressKey,
    addrs: Mutex<HashSet<SocketAddr>>,
}

impl ActiveAddresses {
    pub fn new(key: AddressKey) -> Self {
        Self {
            key,
            addrs: Mutex::new(HashSet::new()),
        }
    }

    pub fn key(&self) -> AddressKey {
        self.key
    }

    /// Reserve `addr` for a new session.
    ///
    /// Returns `None` if a session from the same address is already active.
    /// The reservation is released when the lease is dropped.
    pub fn claim(self: &Arc<Self>, addr: SocketAddr) -> Option<AddressLease> {
        let key = self.key.normalize(addr);
        if !self.lock().insert(key) {
            return None;
        }
        Some(AddressLease {
            owner: Arc::clone(self),
            key,
        })
    }

    pub fn contains(&self, addr: SocketAddr) -> bool {
        self.lock().contains(&self.key.normalize(addr))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<SocketAddr>> {
        self.addrs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Keeps an address marked active until dropped.
#[derive(Debug)]
pub struct AddressLease {
    owner: Arc<ActiveAddresses>,
    key: SocketAddr,
}

impl Drop for AddressLease {
    fn drop(&mut self) {
        self.owner.lock().remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn claim_rejects_duplicate_until_released() {
        let active = Arc::new(ActiveAddresses::new(AddressKey::SocketAddr));

        let lease = active.claim(addr(5000)).expect("first claim should succeed");
        assert!(active.claim(addr(5000)).is_none());
        assert!(active.contains(addr(5000)));

        drop(lease);
        assert!(active.is_empty());
        assert!(active.claim(addr(5000)).is_some());
    }

    #[test]
    fn socket_addr_key_distinguishes_ports() {
        let active = Arc::new(ActiveAddresses::new(AddressKey::SocketAddr));
        let _a = active.claim(addr(5000)).expect("claim should succeed");
        let _b = active.claim(addr(5001)).expect("other port should be distinct");
        assert_eq!(active.len(), 2);
    }

    #[test]
    fn ip_key_allows_one_connection_per_host() {
        let active = Arc::new(ActiveAddresses::new(AddressKey::Ip));
        let _a = active.claim(addr(5000)).expect("claim should succeed");
        assert!(active.claim(addr(5001)).is_none());
        assert!(active.contains(addr(6000)));

        let other_host = SocketAddr::from(([127, 0, 0, 2], 5000));
        assert!(active.claim(other_host).is_some());
    }

    #[test]
    fn default_key_is_socket_addr() {
        assert_eq!(AddressKey::default(), AddressKey::SocketAddr);
        assert_eq!(ActiveAddresses::default().key(), AddressKey::SocketAddr);
    }
}
