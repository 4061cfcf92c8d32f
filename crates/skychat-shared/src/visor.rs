//! A visor as seen by the local node: its P2P chat and the servers we know
//! of on it. The local visor's own entry holds the servers it hosts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::info::Info;
use crate::message::{Message, MessageStatus};
use crate::room::Room;
use crate::route::Route;
use crate::server::Server;
use crate::types::PeerId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Visor {
    pk: PeerId,
    p2p: Option<Room>,
    /// Keyed by each server's `route.server`
    servers: BTreeMap<PeerId, Server>,
}

impl Visor {
    pub fn new(pk: PeerId, p2p: Option<Room>, servers: BTreeMap<PeerId, Server>) -> Self {
        Self { pk, p2p, servers }
    }

    pub fn new_undefined() -> Self {
        Self::new(PeerId::default(), None, BTreeMap::new())
    }

    /// A visor known only through its P2P chat.
    pub fn new_default_p2p(pk: PeerId) -> Self {
        Self::new(pk, Some(Room::new_default_p2p(Route::p2p(pk))), BTreeMap::new())
    }

    /// A visor known only through one of its servers.
    pub fn new_default(route: Route) -> Self {
        let server = Server::new_default(route);
        let mut servers = BTreeMap::new();
        servers.insert(server.pk(), server);
        Self::new(route.visor, None, servers)
    }

    /// Default visor holding whichever chat `route` names.
    pub fn for_route(route: Route) -> Self {
        if route.server == route.visor {
            Self::new_default_p2p(route.visor)
        } else {
            Self::new_default(route)
        }
    }

    pub fn pk(&self) -> PeerId {
        self.pk
    }

    /// No P2P chat and no servers left.
    pub fn is_empty(&self) -> bool {
        self.p2p.is_none() && self.servers.is_empty()
    }

    // -- p2p --

    pub fn p2p(&self) -> Option<&Room> {
        self.p2p.as_ref()
    }

    pub fn p2p_mut(&mut self) -> Result<&mut Room, DomainError> {
        self.p2p.as_mut().ok_or(DomainError::P2PNotFound)
    }

    pub fn p2p_is_empty(&self) -> bool {
        self.p2p.is_none()
    }

    pub fn add_p2p(&mut self, room: Room) -> Result<(), DomainError> {
        if self.p2p.is_some() {
            return Err(DomainError::P2PExists);
        }
        self.p2p = Some(room);
        Ok(())
    }

    pub fn delete_p2p(&mut self) -> Result<Room, DomainError> {
        self.p2p.take().ok_or(DomainError::P2PNotFound)
    }

    pub fn set_p2p(&mut self, room: Room) {
        self.p2p = Some(room);
    }

    // -- servers --

    pub fn servers(&self) -> &BTreeMap<PeerId, Server> {
        &self.servers
    }

    pub fn server(&self, pk: &PeerId) -> Result<&Server, DomainError> {
        self.servers.get(pk).ok_or(DomainError::ServerNotFound(*pk))
    }

    pub fn server_mut(&mut self, pk: &PeerId) -> Result<&mut Server, DomainError> {
        self.servers.get_mut(pk).ok_or(DomainError::ServerNotFound(*pk))
    }

    pub fn add_server(&mut self, server: Server) -> Result<(), DomainError> {
        let pk = server.pk();
        if self.servers.contains_key(&pk) {
            return Err(DomainError::ServerExists(pk));
        }
        self.servers.insert(pk, server);
        Ok(())
    }

    pub fn delete_server(&mut self, pk: &PeerId) -> Result<Server, DomainError> {
        self.servers.remove(pk).ok_or(DomainError::ServerNotFound(*pk))
    }

    pub fn set_server(&mut self, server: Server) -> Result<(), DomainError> {
        let slot = self
            .servers
            .get_mut(&server.pk())
            .ok_or(DomainError::ServerNotFound(server.pk()))?;
        *slot = server;
        Ok(())
    }

    // -- routed access --

    /// Resolve `route` to the P2P chat or a server room.
    pub fn room(&self, route: &Route) -> Result<&Room, DomainError> {
        if route.server == route.visor {
            return self.p2p.as_ref().ok_or(DomainError::P2PNotFound);
        }
        self.server(&route.server)?.room(&route.room)
    }

    pub fn room_mut(&mut self, route: &Route) -> Result<&mut Room, DomainError> {
        if route.server == route.visor {
            return self.p2p_mut();
        }
        self.server_mut(&route.server)?.room_mut(&route.room)
    }

    /// Create the P2P chat, server or room `route` names if it is missing.
    /// Rooms added this way are remote rooms we learned of by messaging.
    pub fn ensure_route(&mut self, route: &Route) -> Result<(), DomainError> {
        if route.kind().is_none() {
            return Err(DomainError::InvalidRoute(*route));
        }
        if route.server == route.visor {
            if self.p2p.is_none() {
                self.p2p = Some(Room::new_default_p2p(*route));
            }
            return Ok(());
        }
        match self.servers.get_mut(&route.server) {
            None => {
                let server = Server::new_default(*route);
                self.servers.insert(server.pk(), server);
            }
            Some(server) if server.room(&route.room).is_err() => {
                server.add_room(Room::new_default_remote(*route))?;
            }
            Some(_) => {}
        }
        Ok(())
    }

    pub fn add_message(&mut self, route: &Route, message: Message) -> Result<(), DomainError> {
        self.room_mut(route)?.add_message(message);
        Ok(())
    }

    pub fn set_message_status(
        &mut self,
        route: &Route,
        id: &str,
        status: MessageStatus,
    ) -> Result<bool, DomainError> {
        self.room_mut(route)?.set_message_status(id, status)
    }

    pub fn set_route_info(&mut self, route: &Route, info: Info) -> Result<(), DomainError> {
        if route.server == route.visor {
            self.p2p_mut()?.set_info(info);
            return Ok(());
        }
        self.server_mut(&route.server)?.set_route_info(route, info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pk(b: u8) -> PeerId {
        PeerId([b; 32])
    }

    #[test]
    fn test_default_p2p_visor() {
        let visor = Visor::new_default_p2p(pk(1));
        assert!(!visor.p2p_is_empty());
        assert!(visor.servers().is_empty());
        assert!(!visor.is_empty());
    }

    #[test]
    fn test_ensure_route_creates_missing_chats() {
        let mut visor = Visor::new_default_p2p(pk(1));
        let route = Route::room(pk(1), pk(2), pk(3));
        visor.ensure_route(&route).unwrap();
        assert!(visor.room(&route).unwrap().is_visible());

        let other = Route::room(pk(1), pk(2), pk(4));
        visor.ensure_route(&other).unwrap();
        assert_eq!(visor.server(&pk(2)).unwrap().rooms().len(), 2);

        // already present, untouched
        visor.add_message(&route, Message::text(pk(1), route, "x")).unwrap();
        visor.ensure_route(&route).unwrap();
        assert_eq!(visor.room(&route).unwrap().messages().len(), 1);
    }

    #[test]
    fn test_ensure_route_rejects_invalid_route() {
        let mut visor = Visor::new_undefined();
        let bad = Route::new(pk(1), pk(1), pk(2));
        assert_eq!(
            visor.ensure_route(&bad),
            Err(DomainError::InvalidRoute(bad))
        );
    }

    #[test]
    fn test_add_message_routes_to_p2p() {
        let mut visor = Visor::new_default_p2p(pk(1));
        let msg = Message::text(pk(1), Route::p2p(pk(0)), "hi");
        visor.add_message(&Route::p2p(pk(1)), msg).unwrap();
        assert_eq!(visor.p2p().unwrap().messages().len(), 1);
    }

    #[test]
    fn test_add_message_routes_to_server_room() {
        let route = Route::room(pk(1), pk(2), pk(3));
        let mut visor = Visor::new_default(route);
        visor
            .add_message(&route, Message::text(pk(1), route, "hi"))
            .unwrap();
        assert_eq!(visor.room(&route).unwrap().messages().len(), 1);
        assert!(visor.p2p_is_empty());

        let unknown = Route::room(pk(1), pk(5), pk(6));
        assert_eq!(
            visor.add_message(&unknown, Message::text(pk(1), unknown, "x")),
            Err(DomainError::ServerNotFound(pk(5)))
        );
    }

    #[test]
    fn test_cascade_to_empty_visor() {
        let route = Route::room(pk(1), pk(2), pk(3));
        let mut visor = Visor::new_default(route);

        visor.server_mut(&pk(2)).unwrap().delete_room(&pk(3)).unwrap();
        assert!(visor.server(&pk(2)).unwrap().rooms().is_empty());

        visor.delete_server(&pk(2)).unwrap();
        assert!(visor.p2p_is_empty());
        assert!(visor.is_empty());
    }

    #[test]
    fn test_p2p_lifecycle() {
        let mut visor = Visor::new_undefined();
        assert!(visor.pk().is_null());
        visor.add_p2p(Room::new_default_p2p(Route::p2p(pk(1)))).unwrap();
        assert_eq!(
            visor.add_p2p(Room::new_default_p2p(Route::p2p(pk(1)))),
            Err(DomainError::P2PExists)
        );
        visor.delete_p2p().unwrap();
        assert_eq!(visor.delete_p2p().unwrap_err(), DomainError::P2PNotFound);
    }

    #[test]
    fn test_set_route_info_p2p() {
        let mut visor = Visor::new_default_p2p(pk(1));
        visor
            .set_route_info(&Route::p2p(pk(1)), Info::new(pk(1), "dave", "", ""))
            .unwrap();
        assert_eq!(visor.p2p().unwrap().info().alias, "dave");
    }
}
