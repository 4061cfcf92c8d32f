//! Traffic from the hosts of groups we joined.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use skychat_shared::{
    ConnKind, DomainError, Info, InfoKind, Message, MessageKind, Peer, PeerId, Route, Visor,
};

use crate::classify::MessageClass;
use crate::error::{MessengerError, Result};
use crate::notification::Notification;
use crate::service::MessengerService;

/// Decoded form of a group info payload.
enum GroupInfo {
    Single(Info),
    ServerMembers(BTreeMap<PeerId, Peer>),
    RoomMembers(BTreeMap<PeerId, Peer>),
    RoomMuted(BTreeSet<PeerId>),
    RoomMods(BTreeSet<PeerId>),
}

impl GroupInfo {
    fn decode(kind: InfoKind, payload: &[u8]) -> serde_json::Result<Self> {
        Ok(match kind {
            InfoKind::Single => Self::Single(serde_json::from_slice(payload)?),
            InfoKind::ServerMembers => Self::ServerMembers(serde_json::from_slice(payload)?),
            InfoKind::RoomMembers => Self::RoomMembers(serde_json::from_slice(payload)?),
            InfoKind::RoomMuted => Self::RoomMuted(serde_json::from_slice(payload)?),
            InfoKind::RoomMods => Self::RoomMods(serde_json::from_slice(payload)?),
        })
    }

    fn apply(&self, visor: &mut Visor, route: &Route) -> std::result::Result<(), DomainError> {
        match self {
            Self::Single(info) => visor.set_route_info(route, info.clone()),
            Self::ServerMembers(members) => {
                visor.server_mut(&route.server)?.set_members(members.clone());
                Ok(())
            }
            Self::RoomMembers(members) => {
                visor.room_mut(route)?.set_members(members.clone());
                Ok(())
            }
            Self::RoomMuted(muted) => {
                visor.room_mut(route)?.set_muted(muted.clone());
                Ok(())
            }
            Self::RoomMods(mods) => {
                visor.room_mut(route)?.set_mods(mods.clone());
                Ok(())
            }
        }
    }
}

impl MessengerService {
    pub(crate) async fn handle_remote_group(&self, message: Message, kind: MessageKind) -> Result<()> {
        let route = message.root;

        // drop anything from groups we are not in
        let joined = self
            .ctx
            .visors
            .get_by_pk(&route.visor)
            .ok()
            .is_some_and(|visor| visor.room(&route).is_ok());
        if !joined {
            return Err(MessengerError::NotMember {
                peer: self.ctx.local,
                route,
            });
        }

        match kind {
            MessageKind::Conn(conn) => self.handle_remote_group_conn(message, conn).await,
            MessageKind::Txt => {
                self.store(&route, &message)?;
                self.notify_message(route, &message);
                Ok(())
            }
            MessageKind::Info(info_kind) => {
                let info = GroupInfo::decode(info_kind, &message.payload)?;
                self.ctx.visors.update(&route.visor, &mut |visor| {
                    visor.add_message(&route, message.clone())?;
                    info.apply(visor, &route)
                })?;
                debug!(route = %route, kind = ?info_kind, "group info updated");
                self.notify_message(route, &message);
                Ok(())
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
            MessageKind::Cmd(_) => Err(Self::unexpected(kind, MessageClass::RemoteGroup)),
        }
    }

    async fn handle_remote_group_conn(&self, message: Message, conn: ConnKind) -> Result<()> {
        let route = message.root;
        match conn {
            ConnKind::Accept => {
                self.store(&route, &message)?;
                self.notify_message(route, &message);
                let user = self.ctx.user()?;
                self.transmit_info(Route::p2p(self.ctx.local), route, &user.info)
                    .await
            }
            ConnKind::Reject => {
                self.store(&route, &message)?;
                self.notify_message(route, &message);
                Ok(())
            }
            ConnKind::Leave => {
                // we were removed; later traffic for this room is filtered
                let local = message.dest.visor;
                self.ctx.visors.update(&route.visor, &mut |visor| {
                    visor.add_message(&route, message.clone())?;
                    visor.room_mut(&route)?.delete_member(&local);
                    Ok(())
                })?;
                self.notify_message(route, &message);
                Ok(())
            }
            ConnKind::Delete => {
                self.store(&route, &message)?;
                self.notify(Notification::DeleteRoute { route });
                Ok(())
            }
            ConnKind::Request => Err(Self::unexpected(
                MessageKind::Conn(conn),
                MessageClass::RemoteGroup,
            )),
        }
    }
}
