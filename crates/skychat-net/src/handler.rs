//! Live connections keyed by remote visor.
//!
//! Every connection gets one read task that decodes frames onto the shared
//! inbound stream. Writes go through a per-connection async mutex so the
//! prefix and body of concurrent frames never interleave. The connection map
//! is shared by the accept loop and the dial path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::io::{AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, oneshot, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use skychat_shared::constants::DEFAULT_CHAT_PORT;
use skychat_shared::{Message, MessageStatus, PeerId, Route, Visor, VisorRepository};

use crate::error::{FrameError, NetError};
use crate::frame::{decode_message, encode_message, read_frame, write_frame};
use crate::retry::RetryPolicy;
use crate::transport::{BoxStream, Connection, Transport};

type Writer = Arc<AsyncMutex<WriteHalf<BoxStream>>>;

#[derive(Debug, Clone)]
pub struct HandlerConfig {
    /// Chat port dialed on remote visors and listened on locally.
    pub port: u16,
    pub retry: RetryPolicy,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_CHAT_PORT,
            retry: RetryPolicy::default(),
        }
    }
}

/// Receiving ends handed out once, at construction.
pub struct HandlerStreams {
    /// Every decoded message, in per-connection arrival order.
    pub inbound: mpsc::UnboundedReceiver<Message>,
    /// Per-connection and per-frame failures, for logging.
    pub errors: mpsc::UnboundedReceiver<NetError>,
}

struct ConnectionEntry {
    id: u64,
    writer: Writer,
    /// Dropping or firing this ends the connection's read task.
    stop: Option<oneshot::Sender<()>>,
}

struct Inner {
    local: PeerId,
    config: HandlerConfig,
    transport: Arc<dyn Transport>,
    repo: Arc<dyn VisorRepository>,
    connections: Mutex<HashMap<PeerId, ConnectionEntry>>,
    next_id: AtomicU64,
    inbound_tx: mpsc::UnboundedSender<Message>,
    errors_tx: mpsc::UnboundedSender<NetError>,
    shutdown_tx: watch::Sender<bool>,
}

#[derive(Clone)]
pub struct ConnectionHandler {
    inner: Arc<Inner>,
}

impl ConnectionHandler {
    pub fn new(
        local: PeerId,
        transport: Arc<dyn Transport>,
        repo: Arc<dyn VisorRepository>,
        config: HandlerConfig,
    ) -> (Self, HandlerStreams) {
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let (errors_tx, errors) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = watch::channel(false);

        let inner = Inner {
            local,
            config,
            transport,
            repo,
            connections: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            inbound_tx,
            errors_tx,
            shutdown_tx,
        };

        (
            Self {
                inner: Arc::new(inner),
            },
            HandlerStreams { inbound, errors },
        )
    }

    pub fn local(&self) -> PeerId {
        self.inner.local
    }

    pub fn connected_peers(&self) -> Vec<PeerId> {
        self.inner.connections().keys().copied().collect()
    }

    pub fn is_connected(&self, peer: &PeerId) -> bool {
        self.inner.connections().contains_key(peer)
    }

    /// Register `conn` under its remote identity and start its read task.
    /// A previous connection to the same peer is replaced and stopped.
    pub fn handle_connection(&self, conn: Connection) {
        self.attach(conn, true);
    }

    /// Ask the read task for `peer` to stop. Returns `false` if there is no
    /// such connection.
    pub fn unhandle_connection(&self, peer: &PeerId) -> bool {
        let stop = self
            .inner
            .connections()
            .get_mut(peer)
            .and_then(|entry| entry.stop.take());
        match stop {
            Some(stop) => {
                let _ = stop.send(());
                true
            }
            None => false,
        }
    }

    /// Existing connection to `peer`, or a new one dialed with backoff.
    pub async fn dial(&self, peer: PeerId) -> Result<(), NetError> {
        self.writer_for(peer).await.map(|_| ())
    }

    async fn writer_for(&self, peer: PeerId) -> Result<Writer, NetError> {
        if peer == self.inner.local {
            return Err(NetError::SelfDial);
        }
        if let Some(entry) = self.inner.connections().get(&peer) {
            return Ok(entry.writer.clone());
        }

        let port = self.inner.config.port;
        let transport = self.inner.transport.clone();
        let conn = self
            .inner
            .config
            .retry
            .run(|attempt| {
                let transport = transport.clone();
                async move {
                    debug!(peer = %peer.short(), attempt, "dialing");
                    transport.dial(peer, port).await
                }
            })
            .await
            .map_err(|(attempts, source)| NetError::DialExhausted {
                peer,
                attempts,
                source,
            })?;

        info!(peer = %peer.short(), "connected");
        Ok(self.attach(conn, false))
    }

    /// Frame `message` to `message.dest.visor`, dialing if needed. With
    /// `persist`, the message is then stored in the room `route` names,
    /// marked `Sent`.
    pub async fn send_message(
        &self,
        route: Route,
        message: &Message,
        persist: bool,
    ) -> Result<(), NetError> {
        let peer = message.dest.visor;
        let body = encode_message(message)?;
        let writer = self.writer_for(peer).await?;

        let written = {
            let mut writer = writer.lock().await;
            write_frame(&mut *writer, &body).await
        };
        if let Err(source) = written {
            self.drop_connection(&peer);
            return Err(NetError::Write { peer, source });
        }
        debug!(peer = %peer.short(), route = %route, len = body.len(), "message sent");

        if persist {
            self.persist_sent(route, message)?;
        }
        Ok(())
    }

    fn persist_sent(&self, route: Route, message: &Message) -> Result<(), NetError> {
        let mut stored = message.clone();
        stored.status = MessageStatus::Sent;
        self.inner.repo.upsert(
            &route.visor,
            &|| Visor::for_route(route),
            &mut |visor| {
                visor.ensure_route(&route)?;
                visor.add_message(&route, stored.clone())
            },
        )?;
        Ok(())
    }

    /// Bind the chat port and spawn the accept loop. Failing to bind is
    /// returned; accept failures after that are reported on the error stream.
    pub async fn listen(&self) -> Result<JoinHandle<()>, NetError> {
        let port = self.inner.config.port;
        let mut listener = self
            .inner
            .transport
            .listen(port)
            .await
            .map_err(|source| NetError::Listen { port, source })?;
        info!(port, local = %self.inner.local.short(), "accepting chat connections");

        let handler = self.clone();
        let mut shutdown = self.inner.shutdown_tx.subscribe();
        Ok(tokio::spawn(async move {
            loop {
                if *shutdown.borrow() {
                    break;
                }
                tokio::select! {
                    _ = shutdown.changed() => break,
                    accepted = listener.accept() => match accepted {
                        Ok(conn) => {
                            info!(peer = %conn.remote.short(), "accepted connection");
                            handler.handle_connection(conn);
                        }
                        Err(e) if e.kind() == std::io::ErrorKind::NotConnected => {
                            handler.inner.report(NetError::Accept(e));
                            break;
                        }
                        Err(e) => handler.inner.report(NetError::Accept(e)),
                    },
                }
            }
            debug!("accept loop stopped");
        }))
    }

    /// Stop the accept loop and close every connection.
    pub fn shutdown(&self) {
        self.inner.shutdown_tx.send_replace(true);
        let entries: Vec<_> = self.inner.connections().drain().collect();
        info!(connections = entries.len(), "connection handler shutting down");
        for (_, mut entry) in entries {
            if let Some(stop) = entry.stop.take() {
                let _ = stop.send(());
            }
        }
    }

    fn attach(&self, conn: Connection, replace: bool) -> Writer {
        let Connection { remote, stream } = conn;
        let (reader, writer) = tokio::io::split(stream);

        let mut connections = self.inner.connections();
        if !replace {
            if let Some(existing) = connections.get(&remote) {
                // lost a dial race; keep the connection already registered
                return existing.writer.clone();
            }
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let writer: Writer = Arc::new(AsyncMutex::new(writer));
        let (stop_tx, stop_rx) = oneshot::channel();
        let replaced = connections.insert(
            remote,
            ConnectionEntry {
                id,
                writer: writer.clone(),
                stop: Some(stop_tx),
            },
        );
        drop(connections);

        if replaced.is_some() {
            debug!(peer = %remote.short(), "replaced existing connection");
        }
        tokio::spawn(read_loop(self.inner.clone(), remote, id, reader, stop_rx));
        writer
    }

    fn drop_connection(&self, peer: &PeerId) {
        if let Some(mut entry) = self.inner.connections().remove(peer) {
            if let Some(stop) = entry.stop.take() {
                let _ = stop.send(());
            }
        }
    }
}

impl Inner {
    fn connections(&self) -> MutexGuard<'_, HashMap<PeerId, ConnectionEntry>> {
        // a panic while holding the map cannot leave it half-updated
        self.connections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn report(&self, err: NetError) {
        if self.errors_tx.send(err).is_err() {
            debug!("error stream closed");
        }
    }

    fn dispatch(&self, remote: PeerId, body: &[u8]) {
        let message = match decode_message(body) {
            Ok(message) => message,
            Err(source) => {
                self.report(NetError::Decode {
                    peer: remote,
                    source,
                });
                return;
            }
        };
        if message.root.visor != remote {
            self.report(NetError::SpoofedRoot {
                peer: remote,
                root: message.root,
            });
            return;
        }
        if self.inbound_tx.send(message).is_err() {
            debug!(peer = %remote.short(), "inbound stream closed, dropping message");
        }
    }

    /// Remove the entry only if it still belongs to connection `id`.
    fn deregister(&self, remote: PeerId, id: u64) -> Option<Writer> {
        let mut connections = self.connections();
        match connections.get(&remote) {
            Some(entry) if entry.id == id => connections.remove(&remote).map(|e| e.writer),
            _ => None,
        }
    }
}

async fn read_loop(
    inner: Arc<Inner>,
    remote: PeerId,
    id: u64,
    mut reader: ReadHalf<BoxStream>,
    mut stop: oneshot::Receiver<()>,
) {
    let mut shutdown = inner.shutdown_tx.subscribe();
    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            _ = &mut stop => {
                debug!(peer = %remote.short(), "connection stopped");
                break;
            }
            _ = shutdown.changed() => break,
            frame = read_frame(&mut reader) => match frame {
                Ok(body) => inner.dispatch(remote, &body),
                Err(FrameError::Closed) => {
                    debug!(peer = %remote.short(), "remote closed connection");
                    break;
                }
                Err(source) => {
                    warn!(peer = %remote.short(), error = %source, "dropping connection");
                    inner.report(NetError::Frame { peer: remote, source });
                    break;
                }
            },
        }
    }

    if let Some(writer) = inner.deregister(remote, id) {
        let mut writer = writer.lock().await;
        let _ = writer.shutdown().await;
    }
    info!(peer = %remote.short(), "connection closed");
}
