//! # skychat-node
//!
//! A single skychat visor: loads its identity, opens the store, listens for
//! peers over TCP and runs the messenger until Ctrl+C.

mod config;
mod identity;

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use skychat_messenger::{log_errors, AppContext, ChannelNotifier, MessengerService, Notification};
use skychat_net::{ConnectionHandler, HandlerConfig, RetryPolicy, TcpTransport};
use skychat_shared::{Info, PeerId, RepositoryError, User, UserRepository, VisorRepository};
use skychat_store::{Database, InMemoryUserRepository, InMemoryVisorRepository};

use crate::config::{NodeConfig, StoreKind};

type Stores = (Arc<dyn VisorRepository>, Arc<dyn UserRepository>);

fn open_stores(config: &NodeConfig) -> anyhow::Result<Stores> {
    match config.store {
        StoreKind::Sqlite => {
            let path = config.database_path();
            std::fs::create_dir_all(&config.data_dir)?;
            let db = Arc::new(
                Database::open_at(&path)
                    .with_context(|| format!("opening database {}", path.display()))?,
            );
            info!(path = %path.display(), "Opened database");
            let visors: Arc<dyn VisorRepository> = db.clone();
            let users: Arc<dyn UserRepository> = db;
            Ok((visors, users))
        }
        StoreKind::Memory => {
            info!("Using in-memory store, nothing will be persisted");
            let visors: Arc<dyn VisorRepository> = Arc::new(InMemoryVisorRepository::new());
            let users: Arc<dyn UserRepository> = Arc::new(InMemoryUserRepository::default());
            Ok((visors, users))
        }
    }
}

/// Create the local user on first start; keep an existing one untouched.
fn ensure_user(users: &dyn UserRepository, local: PeerId, alias: &str) -> anyhow::Result<User> {
    match users.get_user() {
        Ok(user) if user.pk() == local => Ok(user),
        Ok(user) => anyhow::bail!(
            "stored user {} does not match identity {}",
            user.pk(),
            local
        ),
        Err(RepositoryError::UserNotFound) => {
            let user = User::new(Info::new(local, alias, "", ""));
            users.set_user(user.clone())?;
            info!(alias, "Created local user");
            Ok(user)
        }
        Err(e) => Err(e.into()),
    }
}

async fn log_notifications(mut rx: broadcast::Receiver<Notification>) {
    loop {
        match rx.recv().await {
            Ok(note) => debug!(route = %note.route(), ?note, "notification"),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "notification logger lagged")
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Tracing (respects RUST_LOG)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,skychat_node=debug,skychat_messenger=debug")
        }))
        .init();

    info!("Starting skychat node v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Configuration, identity, store
    // -----------------------------------------------------------------------
    let config = NodeConfig::from_env();
    info!(?config, "Loaded configuration");

    let identity = identity::load_or_generate(&config.identity_path())?;
    let local = identity.peer_id();

    let (visors, users) = open_stores(&config)?;
    let user = ensure_user(users.as_ref(), local, &config.alias)?;
    info!(peer = %local, alias = %user.info.alias, "Local visor ready");

    // -----------------------------------------------------------------------
    // 3. Connection handler over TCP
    // -----------------------------------------------------------------------
    let transport = TcpTransport::new(local, config.listen_addr);
    for (peer, addr) in &config.peers {
        transport.add_peer(*peer, *addr);
    }
    info!(known_peers = config.peers.len(), "Address book loaded");

    let handler_config = HandlerConfig {
        port: config.port,
        retry: RetryPolicy {
            max_attempts: config.dial_attempts,
            ..RetryPolicy::default()
        },
    };
    let (handler, streams) =
        ConnectionHandler::new(local, Arc::new(transport), visors.clone(), handler_config);
    let accept_loop = handler
        .listen()
        .await
        .context("cannot open the chat listener")?;

    // -----------------------------------------------------------------------
    // 4. Messenger and background tasks
    // -----------------------------------------------------------------------
    let notifier = Arc::new(ChannelNotifier::default());
    tokio::spawn(log_notifications(notifier.subscribe()));

    let ctx = AppContext::new(visors, users, notifier, handler.clone());
    let (service, messenger_errors) = MessengerService::new(ctx);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(log_errors(streams.errors, "connection handler"));
    tokio::spawn(log_errors(messenger_errors, "messenger"));
    let messenger = tokio::spawn(service.run(streams.inbound, shutdown_rx));

    // -----------------------------------------------------------------------
    // 5. Run until Ctrl+C
    // -----------------------------------------------------------------------
    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down");

    shutdown_tx.send_replace(true);
    handler.shutdown();
    if let Err(e) = messenger.await {
        warn!(error = %e, "messenger task failed");
    }
    if let Err(e) = accept_loop.await {
        warn!(error = %e, "accept loop failed");
    }

    info!("Node stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_user_creates_once() {
        let users = InMemoryUserRepository::default();
        let local = PeerId([3u8; 32]);

        let created = ensure_user(&users, local, "ada").unwrap();
        assert_eq!(created.info.alias, "ada");

        // a later start with another alias keeps the stored user
        let again = ensure_user(&users, local, "bob").unwrap();
        assert_eq!(again.info.alias, "ada");
    }

    #[test]
    fn test_ensure_user_rejects_foreign_user() {
        let users = InMemoryUserRepository::new(User::new(Info::new(
            PeerId([1u8; 32]),
            "someone",
            "",
            "",
        )));
        assert!(ensure_user(&users, PeerId([2u8; 32]), "ada").is_err());
    }
}
