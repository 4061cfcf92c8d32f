use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::PeerId;

/// Addressing mode encoded by the equality pattern of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// `visor == server == room`
    P2P,
    /// `visor != server`, `server == room`: the server lobby
    Server,
    /// `visor`, `server` and `room` all distinct
    Room,
}

/// The `(visor, server, room)` triple addressing any destination.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Route {
    #[serde(rename = "Visor")]
    pub visor: PeerId,
    #[serde(rename = "Server")]
    pub server: PeerId,
    #[serde(rename = "Room")]
    pub room: PeerId,
}

impl Route {
    pub fn new(visor: PeerId, server: PeerId, room: PeerId) -> Self {
        Self { visor, server, room }
    }

    pub fn p2p(visor: PeerId) -> Self {
        Self::new(visor, visor, visor)
    }

    pub fn server(visor: PeerId, server: PeerId) -> Self {
        Self::new(visor, server, server)
    }

    pub fn room(visor: PeerId, server: PeerId, room: PeerId) -> Self {
        Self::new(visor, server, room)
    }

    /// `None` for triples that match none of the three addressing modes.
    pub fn kind(&self) -> Option<RouteKind> {
        if self.visor == self.server && self.server == self.room {
            Some(RouteKind::P2P)
        } else if self.visor != self.server && self.server == self.room {
            Some(RouteKind::Server)
        } else if self.visor != self.server && self.server != self.room && self.visor != self.room
        {
            Some(RouteKind::Room)
        } else {
            None
        }
    }

    pub fn is_p2p(&self) -> bool {
        self.kind() == Some(RouteKind::P2P)
    }

    pub fn is_server(&self) -> bool {
        self.kind() == Some(RouteKind::Server)
    }

    pub fn is_room(&self) -> bool {
        self.kind() == Some(RouteKind::Room)
    }

    /// Server lobby or room.
    pub fn is_group(&self) -> bool {
        matches!(self.kind(), Some(RouteKind::Server | RouteKind::Room))
    }

    /// The P2P route of this route's visor.
    pub fn visor_p2p(&self) -> Route {
        Route::p2p(self.visor)
    }

    /// The lobby route of this route's server.
    pub fn server_lobby(&self) -> Route {
        Route::server(self.visor, self.server)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.visor.short(),
            self.server.short(),
            self.room.short()
        )
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Route({self})")
    }
}
