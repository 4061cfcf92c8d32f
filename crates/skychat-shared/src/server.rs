//! A group space hosted by a visor, holding rooms.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, PeerSet};
use crate::info::Info;
use crate::peer::{insert_unique, remove_present, Peer};
use crate::room::Room;
use crate::route::Route;
use crate::types::PeerId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Server {
    route: Route,
    info: Info,
    members: BTreeMap<PeerId, Peer>,
    admins: BTreeSet<PeerId>,
    muted: BTreeSet<PeerId>,
    blacklist: BTreeSet<PeerId>,
    whitelist: BTreeSet<PeerId>,
    /// Keyed by each room's `route.room`
    rooms: BTreeMap<PeerId, Room>,
}

impl Server {
    pub fn new(route: Route, info: Info) -> Self {
        Self {
            route: route.server_lobby(),
            info,
            members: BTreeMap::new(),
            admins: BTreeSet::new(),
            muted: BTreeSet::new(),
            blacklist: BTreeSet::new(),
            whitelist: BTreeSet::new(),
            rooms: BTreeMap::new(),
        }
    }

    /// A remote server first seen through `route`, holding a default remote
    /// room keyed by `route.room`.
    pub fn new_default(route: Route) -> Self {
        let mut server = Self::new(route, Info::default_for(route.server));
        let room = Room::new_default_remote(route);
        server.rooms.insert(room.pk(), room);
        server
    }

    pub fn route(&self) -> Route {
        self.route
    }

    pub fn pk(&self) -> PeerId {
        self.route.server
    }

    pub fn info(&self) -> &Info {
        &self.info
    }

    pub fn set_info(&mut self, info: Info) {
        self.info = info;
    }

    /// Apply `info` to the room named by `route`; a lobby route also updates
    /// the server's own info.
    pub fn set_route_info(&mut self, route: &Route, info: Info) -> Result<(), DomainError> {
        let is_lobby = route.server == route.room;
        if is_lobby {
            self.info = info.clone();
        }
        match self.rooms.get_mut(&route.room) {
            Some(room) => room.set_info(info),
            None if is_lobby => {}
            None => return Err(DomainError::RoomNotFound(route.room)),
        }
        Ok(())
    }

    // -- rooms --

    pub fn rooms(&self) -> &BTreeMap<PeerId, Room> {
        &self.rooms
    }

    pub fn room(&self, pk: &PeerId) -> Result<&Room, DomainError> {
        self.rooms.get(pk).ok_or(DomainError::RoomNotFound(*pk))
    }

    pub fn room_mut(&mut self, pk: &PeerId) -> Result<&mut Room, DomainError> {
        self.rooms.get_mut(pk).ok_or(DomainError::RoomNotFound(*pk))
    }

    pub fn add_room(&mut self, room: Room) -> Result<(), DomainError> {
        let pk = room.pk();
        if self.rooms.contains_key(&pk) {
            return Err(DomainError::RoomExists(pk));
        }
        self.rooms.insert(pk, room);
        Ok(())
    }

    pub fn delete_room(&mut self, pk: &PeerId) -> Result<Room, DomainError> {
        self.rooms.remove(pk).ok_or(DomainError::RoomNotFound(*pk))
    }

    pub fn set_room(&mut self, room: Room) -> Result<(), DomainError> {
        let slot = self
            .rooms
            .get_mut(&room.pk())
            .ok_or(DomainError::RoomNotFound(room.pk()))?;
        *slot = room;
        Ok(())
    }

    // -- members --

    pub fn members(&self) -> &BTreeMap<PeerId, Peer> {
        &self.members
    }

    pub fn is_member(&self, pk: &PeerId) -> bool {
        self.members.contains_key(pk)
    }

    pub fn add_member(&mut self, peer: Peer) -> Result<(), DomainError> {
        let pk = peer.pk();
        if self.members.contains_key(&pk) {
            return Err(DomainError::AlreadyInSet {
                set: PeerSet::Members,
                peer: pk,
            });
        }
        self.members.insert(pk, peer);
        Ok(())
    }

    /// Removes the peer from the server and from every room. Deleting a
    /// non-member is a no-op.
    pub fn delete_member(&mut self, pk: &PeerId) {
        self.members.remove(pk);
        for room in self.rooms.values_mut() {
            room.delete_member(pk);
        }
    }

    /// Updates the member's info in the server and in every room it joined.
    pub fn set_member_info(&mut self, info: Info) -> Result<(), DomainError> {
        let peer = self
            .members
            .get_mut(&info.pk)
            .ok_or(DomainError::NotInSet {
                set: PeerSet::Members,
                peer: info.pk,
            })?;
        peer.info = info.clone();
        for room in self.rooms.values_mut() {
            if room.is_member(&info.pk) {
                room.set_member_info(info.clone())?;
            }
        }
        Ok(())
    }

    pub fn set_members(&mut self, members: BTreeMap<PeerId, Peer>) {
        self.members = members;
    }

    // -- admins --

    pub fn admins(&self) -> &BTreeSet<PeerId> {
        &self.admins
    }

    pub fn is_admin(&self, pk: &PeerId) -> bool {
        self.admins.contains(pk)
    }

    pub fn add_admin(&mut self, pk: PeerId) -> Result<(), DomainError> {
        insert_unique(&mut self.admins, PeerSet::Admins, pk)
    }

    pub fn delete_admin(&mut self, pk: &PeerId) -> Result<(), DomainError> {
        remove_present(&mut self.admins, PeerSet::Admins, pk)
    }

    // -- muted --

    pub fn muted(&self) -> &BTreeSet<PeerId> {
        &self.muted
    }

    pub fn is_muted(&self, pk: &PeerId) -> bool {
        self.muted.contains(pk)
    }

    pub fn add_muted(&mut self, pk: PeerId) -> Result<(), DomainError> {
        insert_unique(&mut self.muted, PeerSet::Muted, pk)
    }

    pub fn delete_muted(&mut self, pk: &PeerId) -> Result<(), DomainError> {
        remove_present(&mut self.muted, PeerSet::Muted, pk)
    }

    // -- blacklist / whitelist --

    pub fn blacklist(&self) -> &BTreeSet<PeerId> {
        &self.blacklist
    }

    pub fn is_blacklisted(&self, pk: &PeerId) -> bool {
        self.blacklist.contains(pk)
    }

    pub fn add_to_blacklist(&mut self, pk: PeerId) -> Result<(), DomainError> {
        insert_unique(&mut self.blacklist, PeerSet::Blacklist, pk)
    }

    pub fn delete_from_blacklist(&mut self, pk: &PeerId) -> Result<(), DomainError> {
        remove_present(&mut self.blacklist, PeerSet::Blacklist, pk)
    }

    pub fn whitelist(&self) -> &BTreeSet<PeerId> {
        &self.whitelist
    }

    pub fn add_to_whitelist(&mut self, pk: PeerId) -> Result<(), DomainError> {
        insert_unique(&mut self.whitelist, PeerSet::Whitelist, pk)
    }

    pub fn delete_from_whitelist(&mut self, pk: &PeerId) -> Result<(), DomainError> {
        remove_present(&mut self.whitelist, PeerSet::Whitelist, pk)
    }
}
