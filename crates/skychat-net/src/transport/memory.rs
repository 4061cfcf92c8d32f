//! In-process mesh over `tokio::io::duplex`, for tests and embedding.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use skychat_shared::PeerId;

use super::{Connection, Listener, Transport};

const PIPE_CAPACITY: usize = 64 * 1024;

type Backlog = mpsc::UnboundedSender<Connection>;

/// Shared registry of listening visors.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    listeners: Arc<Mutex<HashMap<(PeerId, u16), Backlog>>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport that dials and listens as `local`.
    pub fn transport(&self, local: PeerId) -> MemoryTransport {
        MemoryTransport {
            local,
            network: self.clone(),
        }
    }

    fn backlog(&self, peer: PeerId, port: u16) -> io::Result<Backlog> {
        let listeners = self
            .listeners
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "memory network poisoned"))?;
        listeners.get(&(peer, port)).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::ConnectionRefused, "no listener for peer")
        })
    }
}

pub struct MemoryTransport {
    local: PeerId,
    network: MemoryNetwork,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn dial(&self, peer: PeerId, port: u16) -> io::Result<Connection> {
        let backlog = self.network.backlog(peer, port)?;
        let (near, far) = tokio::io::duplex(PIPE_CAPACITY);
        backlog
            .send(Connection::new(self.local, far))
            .map_err(|_| io::Error::new(io::ErrorKind::ConnectionRefused, "listener closed"))?;
        debug!(from = %self.local.short(), to = %peer.short(), port, "memory dial");
        Ok(Connection::new(peer, near))
    }

    async fn listen(&self, port: u16) -> io::Result<Box<dyn Listener>> {
        let mut listeners = self
            .network
            .listeners
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "memory network poisoned"))?;
        let key = (self.local, port);
        if listeners.get(&key).is_some_and(|tx| !tx.is_closed()) {
            return Err(io::Error::new(io::ErrorKind::AddrInUse, "already listening"));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        listeners.insert(key, tx);
        Ok(Box::new(MemoryListener { backlog: rx }))
    }
}

struct MemoryListener {
    backlog: mpsc::UnboundedReceiver<Connection>,
}

#[async_trait]
impl Listener for MemoryListener {
    async fn accept(&mut self) -> io::Result<Connection> {
        self.backlog
            .recv()
            .await
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "memory network dropped"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_dial_reaches_listener_with_identities() {
        let net = MemoryNetwork::new();
        let a = PeerId([1u8; 32]);
        let b = PeerId([2u8; 32]);

        let mut listener = net.transport(b).listen(7).await.unwrap();
        let mut outbound = net.transport(a).dial(b, 7).await.unwrap();
        let mut inbound = listener.accept().await.unwrap();

        assert_eq!(outbound.remote, b);
        assert_eq!(inbound.remote, a);

        outbound.stream.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        inbound.stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
    }

    #[tokio::test]
    async fn test_dial_without_listener_is_refused() {
        let net = MemoryNetwork::new();
        let err = net
            .transport(PeerId([1u8; 32]))
            .dial(PeerId([2u8; 32]), 7)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionRefused);
    }

    #[tokio::test]
    async fn test_double_listen_rejected() {
        let net = MemoryNetwork::new();
        let t = net.transport(PeerId([1u8; 32]));
        let _l = t.listen(7).await.unwrap();
        assert_eq!(
            t.listen(7).await.err().map(|e| e.kind()),
            Some(io::ErrorKind::AddrInUse)
        );
    }
}
