//! Direct chats between two visors.

use tracing::{debug, info};

use skychat_shared::{ConnKind, Info, InfoKind, Message, MessageKind, Route, Visor};

use crate::classify::MessageClass;
use crate::error::{MessengerError, Result};
use crate::notification::Notification;
use crate::service::MessengerService;

impl MessengerService {
    pub(crate) async fn handle_p2p(&self, message: Message, kind: MessageKind) -> Result<()> {
        if let MessageKind::Conn(conn) = kind {
            return self.handle_p2p_conn(message, conn).await;
        }

        let peer = message.root.visor;
        let route = Route::p2p(peer);
        let user = self.ctx.user()?;

        // no other traffic from a blacklisted peer, handshake or not
        if user.in_blacklist(&peer) {
            self.send_chat_reject(Route::p2p(self.ctx.local), route).await?;
            return Err(MessengerError::Blacklisted { peer, route });
        }

        match kind {
            MessageKind::Txt => {
                self.ctx.visors.update(&peer, &mut |visor| {
                    visor.add_message(&route, message.clone())
                })?;
                self.notify_message(route, &message);
                self.send_message_received(&message).await
            }
            MessageKind::Info(InfoKind::Single) => {
                let info: Info = serde_json::from_slice(&message.payload)?;
                if info.pk != peer {
                    return Err(MessengerError::ForeignInfo {
                        peer,
                        described: info.pk,
                    });
                }
                self.ctx.visors.update(&peer, &mut |visor| {
                    visor.add_message(&route, message.clone())?;
                    visor.set_route_info(&route, info.clone())
                })?;
                debug!(peer = %peer.short(), alias = %info.alias, "peer info updated");
                self.notify_message(route, &message);
                self.send_message_received(&message).await
            }
            MessageKind::Status(status) => {
                let acked = message.payload_text();
                let mut advanced = false;
                self.ctx.visors.update(&peer, &mut |visor| {
                    advanced = visor.set_message_status(&route, &acked, status)?;
                    Ok(())
                })?;
                if advanced {
                    self.notify_message(route, &message);
                }
                Ok(())
            }
            other => Err(Self::unexpected(other, MessageClass::P2P)),
        }
    }

    async fn handle_p2p_conn(&self, message: Message, conn: ConnKind) -> Result<()> {
        let peer = message.root.visor;
        let route = Route::p2p(peer);
        let local_route = Route::p2p(self.ctx.local);
        let user = self.ctx.user()?;

        match conn {
            ConnKind::Request | ConnKind::Accept if user.in_blacklist(&peer) => {
                self.send_chat_reject(local_route, route).await?;
                // keep the visor if we still share a group with it
                let deleted = self.ctx.visors.delete_if(&peer, &|visor| visor.servers().is_empty())?;
                if deleted {
                    self.ctx.handler.unhandle_connection(&peer);
                }
                Err(MessengerError::Blacklisted { peer, route })
            }
            ConnKind::Request => {
                // the peer may already be known as the host of a server
                self.ctx.visors.upsert(
                    &peer,
                    &|| Visor::new_default_p2p(peer),
                    &mut |visor| {
                        visor.ensure_route(&route)?;
                        visor.add_message(&route, message.clone())
                    },
                )?;
                info!(peer = %peer.short(), "accepted chat request");
                self.notify(Notification::NewP2PChat { route });

                self.send_chat_accept(route, local_route, route).await?;
                self.transmit_info(local_route, route, &user.info).await
            }
            ConnKind::Accept => {
                self.ctx.visors.update(&peer, &mut |visor| {
                    visor.add_message(&route, message.clone())
                })?;
                self.notify_message(route, &message);
                // the handshake is symmetric, answer with our info
                self.transmit_info(local_route, route, &user.info).await
            }
            ConnKind::Reject | ConnKind::Leave | ConnKind::Delete => {
                self.ctx.visors.update(&peer, &mut |visor| {
                    visor.add_message(&route, message.clone())
                })?;
                self.notify_message(route, &message);
                Ok(())
            }
        }
    }
}
