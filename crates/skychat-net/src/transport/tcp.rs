//! Plain TCP stand-in for the mesh transport.
//!
//! Peers are found through a static address book. The dialer writes its
//! 32-byte public key as a preamble so the acceptor learns who connected.
//! Each accepted socket reads its preamble in its own task, under a
//! deadline, so a silent client never holds up the accept loop.

use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use skychat_shared::constants::{HANDSHAKE_TIMEOUT_MS, PUBKEY_SIZE};
use skychat_shared::PeerId;

use super::{Connection, Listener, Transport};

pub struct TcpTransport {
    local: PeerId,
    bind_ip: IpAddr,
    handshake_timeout: Duration,
    /// Port 0 means "use the port passed to `dial`"
    address_book: RwLock<HashMap<PeerId, SocketAddr>>,
}

impl TcpTransport {
    pub fn new(local: PeerId, bind_ip: IpAddr) -> Self {
        Self {
            local,
            bind_ip,
            handshake_timeout: Duration::from_millis(HANDSHAKE_TIMEOUT_MS),
            address_book: RwLock::new(HashMap::new()),
        }
    }

    /// How long an accepted socket may take to send its preamble.
    pub fn with_handshake_timeout(mut self, handshake_timeout: Duration) -> Self {
        self.handshake_timeout = handshake_timeout;
        self
    }

    pub fn add_peer(&self, peer: PeerId, addr: SocketAddr) {
        if let Ok(mut book) = self.address_book.write() {
            book.insert(peer, addr);
        }
    }

    fn lookup(&self, peer: &PeerId, port: u16) -> io::Result<SocketAddr> {
        let book = self
            .address_book
            .read()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "address book poisoned"))?;
        let mut addr = *book.get(peer).ok_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, format!("no address for {peer}"))
        })?;
        if addr.port() == 0 {
            addr.set_port(port);
        }
        Ok(addr)
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn dial(&self, peer: PeerId, port: u16) -> io::Result<Connection> {
        let addr = self.lookup(&peer, port)?;
        let mut stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        stream.write_all(&self.local.0).await?;
        debug!(peer = %peer.short(), %addr, "tcp connection established");
        Ok(Connection::new(peer, stream))
    }

    async fn listen(&self, port: u16) -> io::Result<Box<dyn Listener>> {
        let listener = TcpListener::bind((self.bind_ip, port)).await?;
        info!(addr = %listener.local_addr()?, "tcp listener bound");
        let (ready_tx, ready_rx) = mpsc::unbounded_channel();
        Ok(Box::new(TcpChatListener {
            listener,
            handshake_timeout: self.handshake_timeout,
            ready_tx,
            ready_rx,
        }))
    }
}

struct TcpChatListener {
    listener: TcpListener,
    handshake_timeout: Duration,
    /// Sockets whose preamble arrived, in completion order
    ready_tx: mpsc::UnboundedSender<Connection>,
    ready_rx: mpsc::UnboundedReceiver<Connection>,
}

async fn read_preamble(mut stream: TcpStream) -> io::Result<Connection> {
    let mut preamble = [0u8; PUBKEY_SIZE];
    stream.read_exact(&mut preamble).await?;
    Ok(Connection::new(PeerId(preamble), stream))
}

#[async_trait]
impl Listener for TcpChatListener {
    async fn accept(&mut self) -> io::Result<Connection> {
        loop {
            tokio::select! {
                Some(conn) = self.ready_rx.recv() => return Ok(conn),
                accepted = self.listener.accept() => {
                    let (stream, addr) = accepted?;
                    stream.set_nodelay(true)?;
                    let ready = self.ready_tx.clone();
                    let deadline = self.handshake_timeout;
                    tokio::spawn(async move {
                        match timeout(deadline, read_preamble(stream)).await {
                            Ok(Ok(conn)) => {
                                debug!(peer = %conn.remote.short(), %addr, "tcp connection accepted");
                                let _ = ready.send(conn);
                            }
                            Ok(Err(e)) => debug!(%addr, error = %e, "tcp handshake failed"),
                            Err(_) => warn!(%addr, "no preamble before deadline, closing"),
                        }
                    });
                }
            }
        }
    }
}
