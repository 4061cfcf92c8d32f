//! The dial/listen collaborator the connection handler runs on.

pub mod memory;
pub mod tcp;

use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use skychat_shared::PeerId;

/// Any bidirectional byte stream a transport hands out.
pub trait ChatStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin + 'static> ChatStream for T {}

pub type BoxStream = Box<dyn ChatStream>;

/// An established stream together with the identity of the remote visor.
pub struct Connection {
    pub remote: PeerId,
    pub stream: BoxStream,
}

impl Connection {
    pub fn new(remote: PeerId, stream: impl ChatStream) -> Self {
        Self {
            remote,
            stream: Box::new(stream),
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("remote", &self.remote)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn dial(&self, peer: PeerId, port: u16) -> io::Result<Connection>;

    async fn listen(&self, port: u16) -> io::Result<Box<dyn Listener>>;
}

#[async_trait]
pub trait Listener: Send {
    /// `NotConnected` means the listener is gone for good.
    async fn accept(&mut self) -> io::Result<Connection>;
}
