//! The inbound dispatch loop: classify, authorize, apply, reply and notify.

use std::fmt::Display;

use futures::future::join_all;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use skychat_shared::{Message, MessageKind, PeerId, Route, Visor};

use crate::classify::{classify, MessageClass};
use crate::context::AppContext;
use crate::error::{MessengerError, Result};
use crate::notification::{emit, Notification};

#[derive(Clone)]
pub struct MessengerService {
    pub(crate) ctx: AppContext,
    errors_tx: mpsc::UnboundedSender<MessengerError>,
}

impl MessengerService {
    /// Returns the service and the stream its inbound loop reports
    /// per-message failures on.
    pub fn new(ctx: AppContext) -> (Self, mpsc::UnboundedReceiver<MessengerError>) {
        let (errors_tx, errors) = mpsc::unbounded_channel();
        (Self { ctx, errors_tx }, errors)
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    pub fn local(&self) -> PeerId {
        self.ctx.local
    }

    /// Apply inbound messages one at a time until the stream ends or
    /// `shutdown` turns true. A message being applied always completes.
    pub async fn run(
        self,
        mut inbound: mpsc::UnboundedReceiver<Message>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(local = %self.ctx.local.short(), "messenger started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = shutdown.changed() => break,
                next = inbound.recv() => match next {
                    Some(message) => {
                        if let Err(e) = self.handle_message(message).await {
                            self.report(e);
                        }
                    }
                    None => break,
                },
            }
        }
        info!("messenger stopped");
    }

    fn report(&self, err: MessengerError) {
        if self.errors_tx.send(err).is_err() {
            debug!("messenger error stream closed");
        }
    }

    /// Classify `message` and run it through the matching handler.
    pub async fn handle_message(&self, message: Message) -> Result<()> {
        let Some(class) = classify(self.ctx.local, &message.root, &message.dest) else {
            return Err(MessengerError::Unclassified {
                root: message.root,
                dest: message.dest,
            });
        };
        let kind = message.kind()?;
        debug!(
            id = %message.id,
            origin = %message.origin.short(),
            root = %message.root,
            dest = %message.dest,
            ?class,
            ?kind,
            "handling message"
        );

        match class {
            MessageClass::P2P => self.handle_p2p(message, kind).await,
            MessageClass::RemoteGroup => self.handle_remote_group(message, kind).await,
            MessageClass::LocalGroup => self.handle_local_group(message, kind).await,
        }
    }

    // -- helpers shared by the handlers --

    pub(crate) fn notify(&self, notification: Notification) {
        emit(self.ctx.notifier.as_ref(), notification);
    }

    pub(crate) fn notify_message(&self, route: Route, message: &Message) {
        self.notify(Notification::NewMessage {
            route,
            message: message.clone(),
        });
    }

    /// Append `message` to the log of `route`.
    pub(crate) fn store(&self, route: &Route, message: &Message) -> Result<()> {
        self.ctx.visors.update(&route.visor, &mut |visor| {
            visor.add_message(route, message.clone())
        })?;
        Ok(())
    }

    /// Send over the network. With `persist` the message is stored in
    /// `route`'s log on success.
    pub(crate) async fn transmit(&self, route: Route, message: &Message, persist: bool) -> Result<()> {
        self.ctx.handler.send_message(route, message, persist).await?;
        Ok(())
    }

    /// Copy `message` to every member of the hosted group `route` except
    /// ourselves, re-rooted at the group, concurrently. Failures to reach one
    /// member are logged and do not stop the others.
    pub(crate) async fn send_to_peers(&self, route: Route, message: &Message) -> Result<()> {
        let visor = self.ctx.visors.get_by_pk(&route.visor)?;
        let members = group_members(&visor, &route)?;
        if members.is_empty() {
            debug!(route = %route, "no members to send to");
        }

        let sends = members
            .into_iter()
            .filter(|pk| *pk != route.visor)
            .map(|member| {
                let mut copy = message.clone();
                copy.root = route;
                copy.dest = Route::p2p(member);
                async move { (member, self.transmit(route, &copy, false).await) }
            });
        for (member, sent) in join_all(sends).await {
            if let Err(e) = sent {
                warn!(route = %route, peer = %member.short(), error = %e, "Failed to send group message");
            }
        }
        Ok(())
    }

    /// Delete the server of `route` once its last room is gone, then the
    /// visor once it holds nothing. Returns whether the visor was deleted.
    pub(crate) fn prune(&self, route: &Route) -> Result<bool> {
        if route.is_group() {
            let server = route.server;
            self.ctx.visors.update(&route.visor, &mut |visor| {
                let empty = visor.server(&server).is_ok_and(|s| s.rooms().is_empty());
                if empty {
                    visor.delete_server(&server)?;
                }
                Ok(())
            })?;
        }
        self.prune_visor(&route.visor)
    }

    pub(crate) fn prune_visor(&self, pk: &PeerId) -> Result<bool> {
        let deleted = self.ctx.visors.delete_if(pk, &|visor| visor.is_empty())?;
        if deleted && *pk != self.ctx.local {
            info!(peer = %pk.short(), "forgot visor");
            self.ctx.handler.unhandle_connection(pk);
        }
        Ok(deleted)
    }

    pub(crate) fn unexpected(kind: MessageKind, class: MessageClass) -> MessengerError {
        MessengerError::UnexpectedKind { kind, class }
    }
}

/// Member keys of a server lobby or room.
pub(crate) fn group_members(visor: &Visor, route: &Route) -> Result<Vec<PeerId>> {
    let server = visor.server(&route.server)?;
    let members = if route.is_room() {
        server.room(&route.room)?.members().keys().copied().collect()
    } else {
        server.members().keys().copied().collect()
    };
    Ok(members)
}

/// Log every error arriving on `errors` until the stream closes.
pub async fn log_errors<E: Display>(mut errors: mpsc::UnboundedReceiver<E>, source: &'static str) {
    while let Some(e) = errors.recv().await {
        warn!(source, error = %e, "message dropped");
    }
    debug!(source, "error stream closed");
}
