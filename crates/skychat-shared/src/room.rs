//! A conversation unit: the P2P chat with a visor, or a room inside a server.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, PeerSet};
use crate::info::Info;
use crate::message::{Message, MessageStatus};
use crate::peer::{insert_unique, remove_present, Peer};
use crate::route::Route;
use crate::types::PeerId;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomType {
    #[default]
    Chat,
    Board,
    Voice,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Room {
    route: Route,
    info: Info,
    /// Arrival order
    msgs: Vec<Message>,
    is_visible: bool,
    room_type: RoomType,
    members: BTreeMap<PeerId, Peer>,
    mods: BTreeSet<PeerId>,
    muted: BTreeSet<PeerId>,
    blacklist: BTreeSet<PeerId>,
    whitelist: BTreeSet<PeerId>,
}

impl Room {
    pub fn new(route: Route, info: Info, room_type: RoomType) -> Self {
        Self {
            route,
            info,
            msgs: Vec::new(),
            is_visible: false,
            room_type,
            members: BTreeMap::new(),
            mods: BTreeSet::new(),
            muted: BTreeSet::new(),
            blacklist: BTreeSet::new(),
            whitelist: BTreeSet::new(),
        }
    }

    /// Room hosted by the local visor; hidden until published.
    pub fn new_default_local(route: Route) -> Self {
        Self::new(route, Info::default_for(route.room), RoomType::Chat)
    }

    /// Room of a remote server we joined.
    pub fn new_default_remote(route: Route) -> Self {
        let mut room = Self::new(route, Info::default_for(route.room), RoomType::Chat);
        room.is_visible = true;
        room
    }

    /// The P2P chat with `route.visor`.
    pub fn new_default_p2p(route: Route) -> Self {
        Self::new(route, Info::default_for(route.visor), RoomType::Chat)
    }

    pub fn route(&self) -> Route {
        self.route
    }

    pub fn pk(&self) -> PeerId {
        self.route.room
    }

    pub fn info(&self) -> &Info {
        &self.info
    }

    pub fn set_info(&mut self, info: Info) {
        self.info = info;
    }

    pub fn is_visible(&self) -> bool {
        self.is_visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.is_visible = visible;
    }

    pub fn room_type(&self) -> RoomType {
        self.room_type
    }

    // -- messages --

    pub fn messages(&self) -> &[Message] {
        &self.msgs
    }

    pub fn add_message(&mut self, message: Message) {
        self.msgs.push(message);
    }

    pub fn message(&self, id: &str) -> Option<&Message> {
        self.msgs.iter().find(|m| m.id == id)
    }

    /// Advance the status of message `id`. `Ok(false)` means the update
    /// would have regressed it and was ignored.
    pub fn set_message_status(
        &mut self,
        id: &str,
        status: MessageStatus,
    ) -> Result<bool, DomainError> {
        let msg = self
            .msgs
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| DomainError::MessageNotFound(id.to_string()))?;
        Ok(msg.advance_status(status))
    }

    // -- members --

    pub fn members(&self) -> &BTreeMap<PeerId, Peer> {
        &self.members
    }

    pub fn member(&self, pk: &PeerId) -> Option<&Peer> {
        self.members.get(pk)
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

    /// Deleting a non-member is a no-op.
    pub fn delete_member(&mut self, pk: &PeerId) {
        self.members.remove(pk);
    }

    pub fn set_member_info(&mut self, info: Info) -> Result<(), DomainError> {
        let peer = self
            .members
            .get_mut(&info.pk)
            .ok_or(DomainError::NotInSet {
                set: PeerSet::Members,
                peer: info.pk,
            })?;
        peer.info = info;
        Ok(())
    }

    /// Replace the member list, as announced by the hosting server.
    pub fn set_members(&mut self, members: BTreeMap<PeerId, Peer>) {
        self.members = members;
    }

    // -- moderators --

    pub fn mods(&self) -> &BTreeSet<PeerId> {
        &self.mods
    }

    pub fn is_mod(&self, pk: &PeerId) -> bool {
        self.mods.contains(pk)
    }

    pub fn add_mod(&mut self, pk: PeerId) -> Result<(), DomainError> {
        insert_unique(&mut self.mods, PeerSet::Moderators, pk)
    }

    pub fn delete_mod(&mut self, pk: &PeerId) -> Result<(), DomainError> {
        remove_present(&mut self.mods, PeerSet::Moderators, pk)
    }

    pub fn set_mods(&mut self, mods: BTreeSet<PeerId>) {
        self.mods = mods;
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

    pub fn set_muted(&mut self, muted: BTreeSet<PeerId>) {
        self.muted = muted;
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

#[cfg(test)]
mod tests {
    use super::*;

    fn pk(b: u8) -> PeerId {
        PeerId([b; 32])
    }

    fn room() -> Room {
        Room::new_default_local(Route::room(pk(1), pk(2), pk(3)))
    }

    #[test]
    fn test_default_visibility() {
        let route = Route::room(pk(1), pk(2), pk(3));
        assert!(!Room::new_default_local(route).is_visible());
        assert!(Room::new_default_remote(route).is_visible());
        assert!(!Room::new_default_p2p(Route::p2p(pk(1))).is_visible());
        assert_eq!(Room::new_default_p2p(Route::p2p(pk(1))).info().pk, pk(1));
    }

    #[test]
    fn test_add_member_twice_fails_and_keeps_set() {
        let mut room = room();
        room.add_member(Peer::with_default_info(pk(9))).unwrap();
        let before = room.members().clone();

        let err = room.add_member(Peer::with_default_info(pk(9))).unwrap_err();
        assert_eq!(
            err,
            DomainError::AlreadyInSet {
                set: PeerSet::Members,
                peer: pk(9)
            }
        );
        assert_eq!(room.members(), &before);
    }

    #[test]
    fn test_delete_non_member_is_noop() {
        let mut room = room();
        room.delete_member(&pk(9));
        assert!(room.members().is_empty());
    }

    #[test]
    fn test_set_member_info() {
        let mut room = room();
        room.add_member(Peer::with_default_info(pk(9))).unwrap();
        room.set_member_info(Info::new(pk(9), "bob", "", "")).unwrap();
        assert_eq!(room.member(&pk(9)).unwrap().info.alias, "bob");
        assert!(room.set_member_info(Info::default_for(pk(8))).is_err());
    }

    #[test]
    fn test_muted_semantics() {
        let mut room = room();
        room.add_muted(pk(4)).unwrap();
        assert!(room.add_muted(pk(4)).is_err());
        assert!(room.is_muted(&pk(4)));
        room.delete_muted(&pk(4)).unwrap();
        assert!(room.delete_muted(&pk(4)).is_err());
    }

    #[test]
    fn test_message_status_monotonic() {
        let mut room = room();
        let msg = Message::text(pk(1), room.route(), "hi");
        let id = msg.id.clone();
        room.add_message(msg);

        assert!(room.set_message_status(&id, MessageStatus::Sent).unwrap());
        assert!(room.set_message_status(&id, MessageStatus::Received).unwrap());
        assert!(!room.set_message_status(&id, MessageStatus::Sent).unwrap());
        assert_eq!(room.message(&id).unwrap().status, MessageStatus::Received);
        assert!(room.set_message_status("nope", MessageStatus::Sent).is_err());
    }

    #[test]
    fn test_serde_roundtrip_keeps_sets() {
        let mut room = room();
        room.add_member(Peer::with_default_info(pk(5))).unwrap();
        room.add_to_blacklist(pk(6)).unwrap();
        let json = serde_json::to_string(&room).unwrap();
        let back: Room = serde_json::from_str(&json).unwrap();
        assert_eq!(room, back);
    }
}
