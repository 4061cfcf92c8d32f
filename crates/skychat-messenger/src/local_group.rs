//! Servers and rooms hosted by the local visor.
//!
//! Members address the hosted group directly; the local user reaches it
//! in-process. Every mutation goes through one repository update so a
//! rejected command leaves the group untouched.

use tracing::{debug, info};

use skychat_shared::{
    CmdKind, ConnKind, DomainError, Info, InfoKind, Message, MessageKind, Peer, PeerId, Room,
    RoomType, Route, Visor,
};

use crate::classify::MessageClass;
use crate::error::{MessengerError, Result};
use crate::notification::Notification;
use crate::service::MessengerService;

impl MessengerService {
    pub(crate) async fn handle_local_group(&self, message: Message, kind: MessageKind) -> Result<()> {
        let route = message.dest;
        let requester = message.root;
        let sender = requester.visor;

        let visor = self.ctx.visors.get_by_pk(&route.visor)?;
        let server = visor.server(&route.server)?;

        if let MessageKind::Conn(conn) = kind {
            return self.handle_local_conn(message, conn, &visor).await;
        }

        if server.is_blacklisted(&sender) || !server.is_member(&sender) {
            return self
                .refuse(route, requester, server.is_blacklisted(&sender))
                .await;
        }

        if let MessageKind::Cmd(cmd) = kind {
            return self.handle_local_cmd(message, cmd, &visor).await;
        }

        // the rest lives in a room's log
        let room = visor.room(&route)?;
        if room.is_blacklisted(&sender) || !room.is_member(&sender) {
            return self
                .refuse(route, requester, room.is_blacklisted(&sender))
                .await;
        }

        match kind {
            MessageKind::Txt => {
                self.store(&route, &message)?;
                self.notify_message(route, &message);
                if server.is_muted(&sender) || room.is_muted(&sender) {
                    debug!(route = %route, peer = %sender.short(), "author is muted, not forwarding");
                    return Ok(());
                }
                self.send_to_peers(route, &message).await
            }
            MessageKind::Info(InfoKind::Single) => {
                let info: Info = serde_json::from_slice(&message.payload)?;
                if info.pk != sender {
                    return Err(MessengerError::ForeignInfo {
                        peer: sender,
                        described: info.pk,
                    });
                }
                let updated = self.ctx.visors.update(&route.visor, &mut |visor| {
                    visor.add_message(&route, message.clone())?;
                    visor.server_mut(&route.server)?.set_member_info(info.clone())
                })?;
                self.notify_message(route, &message);
                self.broadcast_members(&updated, route).await
            }
            MessageKind::Status(status) => {
                let acked = message.payload_text();
                let mut advanced = false;
                self.ctx.visors.update(&route.visor, &mut |visor| {
                    advanced = visor.set_message_status(&route, &acked, status)?;
                    Ok(())
                })?;
                if advanced {
                    self.notify_message(route, &message);
                }
                Ok(())
            }
            other => Err(Self::unexpected(other, MessageClass::LocalGroup)),
        }
    }

    async fn handle_local_conn(&self, message: Message, conn: ConnKind, visor: &Visor) -> Result<()> {
        let route = message.dest;
        let requester = message.root;
        let sender = requester.visor;
        let server = visor.server(&route.server)?;

        // a banned peer can neither join nor touch the member lists
        let room_blacklisted = route.is_room() && visor.room(&route)?.is_blacklisted(&sender);
        if server.is_blacklisted(&sender) || room_blacklisted {
            return self.refuse(route, requester, true).await;
        }

        match conn {
            ConnKind::Request => {
                let peer = Peer::with_default_info(sender);
                let updated = self.ctx.visors.update(&route.visor, &mut |visor| {
                    let server = visor.server_mut(&route.server)?;
                    if !server.is_member(&sender) {
                        server.add_member(peer.clone())?;
                    }
                    if route.is_room() {
                        let room = server.room_mut(&route.room)?;
                        if !room.is_member(&sender) {
                            room.add_member(peer.clone())?;
                        }
                        room.add_message(message.clone());
                    }
                    Ok(())
                })?;
                info!(route = %route, peer = %sender.short(), "peer joined hosted group");
                self.notify(Notification::NewGroupChat { route });

                let accept = Message::chat_accept(route, requester);
                self.transmit(route, &accept, route.is_room()).await?;
                let info = if route.is_room() {
                    updated.room(&route)?.info().clone()
                } else {
                    updated.server(&route.server)?.info().clone()
                };
                self.transmit_info(route, requester, &info).await?;
                self.broadcast_members(&updated, route).await
            }
            ConnKind::Leave | ConnKind::Delete => {
                let updated = self.ctx.visors.update(&route.visor, &mut |visor| {
                    let server = visor.server_mut(&route.server)?;
                    if route.is_room() {
                        let room = server.room_mut(&route.room)?;
                        room.add_message(message.clone());
                        room.delete_member(&sender);
                    } else {
                        server.delete_member(&sender);
                    }
                    Ok(())
                })?;
                info!(route = %route, peer = %sender.short(), "peer left hosted group");
                self.notify_message(route, &message);
                if route.is_room() {
                    self.send_to_peers(route, &message).await?;
                }
                self.broadcast_members(&updated, route).await
            }
            ConnKind::Accept | ConnKind::Reject => Err(Self::unexpected(
                MessageKind::Conn(conn),
                MessageClass::LocalGroup,
            )),
        }
    }

    async fn handle_local_cmd(&self, message: Message, cmd: CmdKind, visor: &Visor) -> Result<()> {
        let route = message.dest;
        let sender = message.root.visor;
        let server = visor.server(&route.server)?;

        let is_admin = server.is_admin(&sender);
        let is_mod = route.is_room() && visor.room(&route).is_ok_and(|room| room.is_mod(&sender));
        let allowed = match cmd {
            CmdKind::MutePeer | CmdKind::UnmutePeer => is_admin || is_mod,
            _ => is_admin,
        };
        if !allowed {
            return Err(MessengerError::Unauthorized {
                peer: sender,
                route,
                command: cmd,
            });
        }

        match cmd {
            CmdKind::AddRoom => {
                let info: Info = serde_json::from_slice(&message.payload)?;
                let mut key = PeerId::random();
                while server.rooms().contains_key(&key) {
                    key = PeerId::random();
                }
                let room_route = Route::room(route.visor, route.server, key);

                let mut room = Room::new(room_route, Info { pk: key, ..info }, RoomType::Chat);
                let user = self.ctx.user()?;
                room.add_member(Peer::new(user.info.clone(), user.info.alias.clone()))?;
                if sender != user.pk() {
                    let creator = server
                        .members()
                        .get(&sender)
                        .cloned()
                        .unwrap_or_else(|| Peer::with_default_info(sender));
                    room.add_member(creator)?;
                }

                self.ctx.visors.update(&route.visor, &mut |visor| {
                    visor.server_mut(&route.server)?.add_room(room.clone())
                })?;
                info!(route = %room_route, "room added");
                self.notify(Notification::AddRoute { route: room_route });
                Ok(())
            }
            CmdKind::DeleteRoom => {
                if !route.is_room() {
                    return Err(DomainError::InvalidRoute(route).into());
                }
                self.send_to_peers(route, &Message::route_deleted(route, route))
                    .await?;
                self.ctx.visors.update(&route.visor, &mut |visor| {
                    visor
                        .server_mut(&route.server)?
                        .delete_room(&route.room)
                        .map(|_| ())
                })?;
                info!(route = %route, "room deleted");
                self.notify(Notification::DeleteRoute { route });
                Ok(())
            }
            CmdKind::MutePeer | CmdKind::UnmutePeer => {
                let target: PeerId = serde_json::from_slice(&message.payload)?;
                let mute = cmd == CmdKind::MutePeer;
                let updated = self.ctx.visors.update(&route.visor, &mut |visor| {
                    // rooms keep their own mute list, the lobby route mutes server-wide
                    if route.is_room() {
                        let room = visor.room_mut(&route)?;
                        if mute {
                            room.add_muted(target)
                        } else {
                            room.delete_muted(&target)
                        }
                    } else {
                        let server = visor.server_mut(&route.server)?;
                        if mute {
                            server.add_muted(target)
                        } else {
                            server.delete_muted(&target)
                        }
                    }
                })?;
                info!(route = %route, peer = %target.short(), mute, "mute list changed");
                self.notify_message(route, &message);

                let muted = if route.is_room() {
                    updated.room(&route)?.muted().clone()
                } else {
                    updated.server(&route.server)?.muted().clone()
                };
                let notice = Message::room_muted(route, route, serde_json::to_vec(&muted)?);
                self.send_to_peers(route, &notice).await
            }
            CmdKind::HireModerator | CmdKind::FireModerator => {
                let target: PeerId = serde_json::from_slice(&message.payload)?;
                let hire = cmd == CmdKind::HireModerator;
                let updated = self.ctx.visors.update(&route.visor, &mut |visor| {
                    let room = visor.room_mut(&route)?;
                    if hire {
                        room.add_mod(target)
                    } else {
                        room.delete_mod(&target)
                    }
                })?;
                info!(route = %route, peer = %target.short(), hire, "moderators changed");
                self.notify_message(route, &message);

                let mods = updated.room(&route)?.mods().clone();
                let notice = Message::room_mods(route, route, serde_json::to_vec(&mods)?);
                self.send_to_peers(route, &notice).await
            }
        }
    }

    /// Reply `Reject` to `requester` and fail with the reason.
    async fn refuse(&self, route: Route, requester: Route, blacklisted: bool) -> Result<()> {
        let peer = requester.visor;
        self.send_chat_reject(route, requester).await?;
        Err(if blacklisted {
            MessengerError::Blacklisted { peer, route }
        } else {
            MessengerError::NotMember { peer, route }
        })
    }

    /// Send the current member list of `route` to its members.
    async fn broadcast_members(&self, visor: &Visor, route: Route) -> Result<()> {
        let notice = if route.is_room() {
            let members = serde_json::to_vec(visor.room(&route)?.members())?;
            Message::room_members(route, route, members)
        } else {
            let members = serde_json::to_vec(visor.server(&route.server)?.members())?;
            Message::server_members(route, route, members)
        };
        self.send_to_peers(route, &notice).await
    }
}
