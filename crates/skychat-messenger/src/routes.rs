//! Creating, deleting and leaving routes on behalf of the local user.

use std::collections::BTreeMap;

use tracing::{info, warn};

use skychat_shared::{DomainError, Info, Peer, PeerId, Room, RoomType, Route, Server, Visor};

use crate::error::{MessengerError, Result};
use crate::notification::Notification;
use crate::service::MessengerService;

impl MessengerService {
    /// Host a new server with one default room. The local user becomes a
    /// member of both and the server's admin. Returns the room's route.
    pub fn add_local_server(&self, info: Info) -> Result<Route> {
        let user = self.ctx.user()?;
        let local = self.ctx.local;
        let me = Peer::new(user.info.clone(), user.info.alias.clone());

        let server_pk = fresh_key(|pk| *pk == local);
        let room_pk = fresh_key(|pk| *pk == local || *pk == server_pk);
        let route = Route::room(local, server_pk, room_pk);

        let mut server = Server::new(route.server_lobby(), Info { pk: server_pk, ..info.clone() });
        server.add_member(me.clone())?;
        server.add_admin(me.pk())?;
        let mut room = Room::new(route, Info { pk: room_pk, ..info.clone() }, RoomType::Chat);
        room.add_member(me)?;
        server.add_room(room)?;

        self.ctx.visors.upsert(
            &local,
            &|| Visor::new(local, None, BTreeMap::new()),
            &mut |visor| visor.add_server(server.clone()),
        )?;

        info!(route = %route, alias = %info.alias, "hosting new server");
        self.notify(Notification::AddRoute { route });
        Ok(route)
    }

    /// Delete `route` locally. A hosted room or server first tells its
    /// members it is gone; a remote route is forgotten without a `Leave`,
    /// see [`leave_remote_route`](Self::leave_remote_route) for that.
    pub async fn delete_route(&self, route: Route) -> Result<()> {
        if route.kind().is_none() {
            return Err(DomainError::InvalidRoute(route).into());
        }
        if route.visor == self.ctx.local {
            if route.is_p2p() {
                return Err(MessengerError::OwnRoute(route));
            }
            if let Err(e) = self.send_route_deleted(route).await {
                warn!(route = %route, error = %e, "Failed to notify members of deleted route");
            }
        }

        self.forget(&route)?;
        self.prune(&route)?;
        info!(route = %route, "route deleted");
        self.notify(Notification::DeleteRoute { route });
        Ok(())
    }

    /// Tell the host of a remote route we are leaving, then forget it.
    /// Leaving the last room of a server leaves the server too.
    pub async fn leave_remote_route(&self, route: Route) -> Result<()> {
        if route.kind().is_none() {
            return Err(DomainError::InvalidRoute(route).into());
        }
        if route.visor == self.ctx.local {
            return Err(MessengerError::OwnRoute(route));
        }

        let visor = self.ctx.visors.get_by_pk(&route.visor)?;
        if route.is_p2p() {
            if visor.p2p_is_empty() {
                // nothing to leave
                self.prune_visor(&route.visor)?;
                return Ok(());
            }
            self.send_leave_route(route).await?;
        } else {
            // must be known before we say goodbye
            visor.room(&route)?;
            if let Err(e) = self.send_leave_route(route).await {
                warn!(route = %route, error = %e, "Failed to send leave message");
            }
        }

        self.forget(&route)?;
        if route.is_room() {
            let server_empty = self
                .ctx
                .visors
                .get_by_pk(&route.visor)?
                .server(&route.server)
                .is_ok_and(|server| server.rooms().is_empty());
            if server_empty {
                let lobby = route.server_lobby();
                if let Err(e) = self.send_leave_route(lobby).await {
                    warn!(route = %lobby, error = %e, "Failed to leave server");
                }
            }
        }
        self.prune(&route)?;
        info!(route = %route, "left route");
        self.notify(Notification::DeleteRoute { route });
        Ok(())
    }

    /// Remove the P2P chat, server or room `route` names.
    fn forget(&self, route: &Route) -> Result<()> {
        self.ctx.visors.update(&route.visor, &mut |visor| {
            if route.is_p2p() {
                visor.delete_p2p().map(|_| ())
            } else if route.is_server() {
                visor.delete_server(&route.server).map(|_| ())
            } else {
                visor
                    .server_mut(&route.server)?
                    .delete_room(&route.room)
                    .map(|_| ())
            }
        })?;
        Ok(())
    }
}

fn fresh_key(taken: impl Fn(&PeerId) -> bool) -> PeerId {
    loop {
        let pk = PeerId::random();
        if !taken(&pk) {
            return pk;
        }
    }
}
