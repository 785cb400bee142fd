use std::fmt::Display;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use filex_frame::{FrameConfig, MessageReader, MessageWriter};
use filex_store::FileStore;
use filex_transport::{TcpTransport, TransportError};
use serde::Serialize;
use tracing::{info, warn};

use crate::addresses::{ActiveAddresses, AddressKey};
use crate::error::{PeerError, Result};
use crate::registry::{ClientRegistry, PeerInfo};
use crate::session::Session;

/// Server behavior config.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    pub frame: FrameConfig,
    pub address_key: AddressKey,
}

/// What the server exposes for status display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerStatus {
    pub address: SocketAddr,
    pub user_count: usize,
    pub user_list: Vec<String>,
}

/// Accepts connections and runs one session thread per client.
pub struct FileServer {
    transport: TcpTransport,
    store: FileStore,
    registry: Arc<ClientRegistry>,
    active: Arc<ActiveAddresses>,
    config: ServerConfig,
    next_id: AtomicU64,
    running: Arc<AtomicBool>,
}

impl FileServer {
    /// Bind with default configuration.
    pub fn bind<A: ToSocketAddrs + Display>(addr: A, store: FileStore) -> Result<Self> {
        Self::with_config(addr, store, ServerConfig::default())
    }

    pub fn with_config<A: ToSocketAddrs + Display>(
        addr: A,
        store: FileStore,
        config: ServerConfig,
    ) -> Result<Self> {
        let transport = TcpTransport::bind(addr)?;
        info!(
            address = %transport.local_addr(),
            root = %store.root().display(),
            "server started"
        );
        Ok(Self {
            transport,
            store,
            registry: Arc::new(ClientRegistry::new()),
            active: Arc::new(ActiveAddresses::new(config.address_key)),
            config,
            next_id: AtomicU64::new(1),
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    pub fn status(&self) -> ServerStatus {
        let snapshot = self.registry.snapshot();
        ServerStatus {
            address: self.local_addr(),
            user_count: snapshot.user_count,
            user_list: snapshot.user_list,
        }
    }

    /// A handle that can stop [`FileServer::serve`] from another thread.
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            running: Arc::clone(&self.running),
            wake_addr: self.local_addr(),
        }
    }

    /// Accept one connection.
    ///
    /// Returns the session thread, or `None` if the connection was rejected
    /// because its source address already has a live session (or the server
    /// is shutting down).
    pub fn accept(&self) -> Result<Option<JoinHandle<()>>> {
        let conn = self.transport.accept()?;
        if !self.running.load(Ordering::SeqCst) {
            conn.shutdown();
            return Ok(None);
        }

        let addr = conn.peer_addr();
        let Some(lease) = self.active.claim(addr) else {
            info!(peer = %addr, "rejected connection: already connected");
            conn.shutdown();
            return Ok(None);
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        info!(peer = %addr, connection = id, "connection accepted");

        let read_half = conn.try_clone()?;
        let reader = MessageReader::with_config_conn(read_half, self.config.frame.clone())?;
        let writer = MessageWriter::with_config_conn(conn, self.config.frame.clone())?;
        let session = Session::new(
            PeerInfo { id, addr },
            reader,
            writer,
            Arc::clone(&self.registry),
            self.store.clone(),
        )
        .with_lease(lease);

        let thread = std::thread::Builder::new()
            .name(format!("filex-session-{id}"))
            .spawn(move || {
                // Failures are logged by the session itself.
                let _ = session.run();
            })
            .map_err(|source| PeerError::Local {
                context: "failed to spawn session thread".to_string(),
                source,
            })?;
        Ok(Some(thread))
    }

    /// Accept connections until [`ServerHandle::shutdown`] is called.
    ///
    /// Running sessions are not waited for.
    pub fn serve(&self) -> Result<()> {
        while self.running.load(Ordering::SeqCst) {
            match self.accept() {
                Ok(_) => {}
                Err(err @ PeerError::Transport(TransportError::Accept(_))) => return Err(err),
                Err(err) => warn!(error = %err, "failed to start session"),
            }
        }
        info!(address = %self.local_addr(), "server stopped");
        Ok(())
    }
}

/// Stops a running [`FileServer::serve`] loop.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    running: Arc<AtomicBool>,
    wake_addr: SocketAddr,
}

impl ServerHandle {
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        // Unblock the pending accept().
        let mut wake = self.wake_addr;
        if wake.ip().is_unspecified() {
            wake.set_ip(match wake {
                SocketAddr::V4(_) => Ipv4Addr::LOCALHOST.into(),
                SocketAddr::V6(_) => Ipv6Addr::LOCALHOST.into(),
            });
        }
        let _ = TcpTransport::connect(wake);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::thread;
    use std::time::{Duration, Instant};

    use filex_transport::Connection;

    use super::*;

    fn unique_root(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "filex-server-{}-{}-{}",
            tag,
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ))
    }

    struct RunningServer {
        root: PathBuf,
        store: FileStore,
        addr: SocketAddr,
        registry: Arc<ClientRegistry>,
        handle: ServerHandle,
        thread: Option<thread::JoinHandle<Result<()>>>,
    }

    impl RunningServer {
        fn start(tag: &str, config: ServerConfig) -> Self {
            let root = unique_root(tag);
            let store = FileStore::create(&root).expect("store should be creatable");
            let server = FileServer::with_config("127.0.0.1:0", store.clone(), config)
                .expect("server should bind");
            let addr = server.local_addr();
            let registry = Arc::clone(server.registry());
            let handle = server.handle();
            let thread = thread::spawn(move || server.serve());
            Self {
                root,
                store,
                addr,
                registry,
                handle,
                thread: Some(thread),
            }
        }

        fn wait_until(&self, what: &str, cond: impl Fn(&ClientRegistry) -> bool) {
            let deadline = Instant::now() + Duration::from_secs(5);
            while !cond(&self.registry) {
                assert!(Instant::now() < deadline, "timed out waiting for {what}");
                thread::sleep(Duration::from_millis(10));
            }
        }
    }

    impl Drop for RunningServer {
        fn drop(&mut self) {
            self.handle.shutdown();
            if let Some(thread) = self.thread.take() {
                let _ = thread.join();
            }
            let _ = std::fs::remove_dir_all(&self.root);
        }
    }

    struct TestClient {
        reader: MessageReader<Connection>,
        writer: MessageWriter<Connection>,
    }

    impl TestClient {
        fn connect(addr: SocketAddr) -> Self {
            let conn = TcpTransport::connect(addr).expect("client should connect");
            let read_half = conn.try_clone().expect("clone should succeed");
            Self {
                reader: MessageReader::new(read_half),
                writer: MessageWriter::new(conn),
            }
        }

        fn request(&mut self, line: &str) -> String {
            self.writer.send_command(line).expect("send should succeed");
            let reply = self.reader.read_message().expect("reply should arrive");
            String::from_utf8_lossy(&reply).into_owned()
        }
    }

    #[test]
    fn report_pdf_roundtrip() {
        let server = RunningServer::start("report", ServerConfig::default());
        let mut client = TestClient::connect(server.addr);

        assert_eq!(client.request("/register alice"), "Welcome alice!");

        let payload: Vec<u8> = (0..1500u32).map(|i| (i * 7 % 256) as u8).collect();
        client
            .writer
            .send_command("/store report.pdf")
            .expect("send should succeed");
        client.writer.send_body(&payload).expect("body should send");

        assert_eq!(client.request("/dir"), "Directory list:\nreport.pdf");
        assert_eq!(
            server.store.read("report.pdf").expect("file should exist"),
            payload
        );

        client
            .writer
            .send_command("/get report.pdf")
            .expect("send should succeed");
        let body = client.reader.read_body().expect("body should arrive");
        assert_eq!(body.as_ref(), payload.as_slice());
    }

    #[test]
    fn distinct_handles_register_concurrently() {
        let server = RunningServer::start("concurrent", ServerConfig::default());
        let addr = server.addr;

        let clients: Vec<_> = ["h1", "h2"]
            .into_iter()
            .map(|handle| {
                thread::spawn(move || {
                    let mut client = TestClient::connect(addr);
                    let reply = client.request(&format!("/register {handle}"));
                    (client, reply)
                })
            })
            .collect();
        let mut connected = Vec::new();
        for thread in clients {
            let (client, reply) = thread.join().expect("client thread should finish");
            assert!(reply.starts_with("Welcome"));
            connected.push(client);
        }
        assert_eq!(server.registry.len(), 2);

        let mut third = TestClient::connect(addr);
        assert_eq!(
            third.request("/register h1"),
            "Error: Registration failed. Handle or alias already exists."
        );
    }

    #[test]
    fn store_before_register_mutates_nothing() {
        let server = RunningServer::start("prereg", ServerConfig::default());
        let mut client = TestClient::connect(server.addr);

        assert_eq!(
            client.request("/store x.txt"),
            "Error: Please join the server before storing files."
        );
        assert_eq!(
            client.request("/get x.txt"),
            "Error: Please join the server before requesting files."
        );
        assert!(server.store.list().expect("list").is_empty());
    }

    #[test]
    fn disconnect_frees_handle() {
        let server = RunningServer::start("disconnect", ServerConfig::default());

        let mut first = TestClient::connect(server.addr);
        assert_eq!(first.request("/register alice"), "Welcome alice!");
        drop(first);
        server.wait_until("alice to be released", |r| !r.contains("alice"));

        let mut second = TestClient::connect(server.addr);
        assert_eq!(second.request("/register alice"), "Welcome alice!");
    }

    #[test]
    fn duplicate_host_rejected_with_ip_key() {
        let config = ServerConfig {
            address_key: AddressKey::Ip,
            ..ServerConfig::default()
        };
        let server = RunningServer::start("duplicate", config);

        let mut first = TestClient::connect(server.addr);
        assert_eq!(first.request("/register alice"), "Welcome alice!");

        let mut second = TestClient::connect(server.addr);
        let _ = second.writer.send_command("/register bob");
        assert!(second.reader.read_message().is_err());
        assert!(!server.registry.contains("bob"));

        assert_eq!(first.request("/dir"), "Directory is empty.");
    }

    #[test]
    fn leave_keeps_connection_open() {
        let server = RunningServer::start("leave", ServerConfig::default());
        let mut client = TestClient::connect(server.addr);

        assert_eq!(client.request("/register alice"), "Welcome alice!");
        assert_eq!(client.request("/leave"), "Left the server.");
        server.wait_until("alice to be released", |r| r.is_empty());
        assert_eq!(client.request("/leave"), "Error: Not joined yet.");
    }

    #[test]
    fn status_reports_users() {
        let root = unique_root("status");
        let store = FileStore::create(&root).expect("store should be creatable");
        let server = FileServer::bind("127.0.0.1:0", store).expect("server should bind");

        server.registry().register(
            "alice",
            PeerInfo {
                id: 9,
                addr: SocketAddr::from(([127, 0, 0, 1], 9)),
            },
        );
        let status = server.status();
        assert_eq!(status.address, server.local_addr());
        assert_eq!(status.user_count, 1);
        assert_eq!(status.user_list, vec!["alice"]);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn shutdown_stops_serve() {
        let root = unique_root("shutdown");
        let store = FileStore::create(&root).expect("store should be creatable");
        let server = FileServer::bind("127.0.0.1:0", store).expect("server should bind");
        let handle = server.handle();
        let thread = thread::spawn(move || server.serve());

        assert!(handle.is_running());
        handle.shutdown();
        handle.shutdown();
        thread
            .join()
            .expect("serve thread should finish")
            .expect("serve should end cleanly");
        assert!(!handle.is_running());

        let _ = std::fs::remove_dir_all(&root);
    }
}
