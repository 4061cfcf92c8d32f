//! Typed constructors for every message kind.
//!
//! Each constructor stamps a fresh id, the UTC time, `Origin`, `Root`,
//! `Dest`, the type codes and `Status = Initial`. Payloads are passed in
//! already serialized.

use chrono::Utc;
use uuid::Uuid;

use crate::constants::{
    PAYLOAD_CHAT_ACCEPTED, PAYLOAD_CHAT_DELETED, PAYLOAD_CHAT_LEFT, PAYLOAD_CHAT_REJECTED,
    PAYLOAD_CHAT_REQUEST, PAYLOAD_ROOM_DELETED,
};
use crate::message::{CmdKind, ConnKind, InfoKind, Message, MessageKind, MessageStatus};
use crate::route::Route;
use crate::types::PeerId;

impl Message {
    fn build(
        origin: PeerId,
        root: Route,
        dest: Route,
        kind: MessageKind,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        let (msg_type, msg_subtype) = kind.codes();
        Self {
            id: Uuid::new_v4().to_string(),
            origin,
            time: Utc::now(),
            root,
            dest,
            msg_type,
            msg_subtype,
            payload: payload.into(),
            status: MessageStatus::Initial,
            seen: false,
        }
    }

    /// Messages sent on behalf of a route are authored by the route's visor.
    fn from_route(root: Route, dest: Route, kind: MessageKind, payload: impl Into<Vec<u8>>) -> Self {
        Self::build(root.visor, root, dest, kind, payload)
    }

    pub fn text(origin: PeerId, dest: Route, text: impl Into<Vec<u8>>) -> Self {
        Self::build(origin, Route::p2p(origin), dest, MessageKind::Txt, text)
    }

    pub fn route_request(origin: PeerId, dest: Route) -> Self {
        Self::build(
            origin,
            Route::p2p(origin),
            dest,
            MessageKind::Conn(ConnKind::Request),
            PAYLOAD_CHAT_REQUEST,
        )
    }

    pub fn chat_accept(root: Route, dest: Route) -> Self {
        Self::from_route(root, dest, MessageKind::Conn(ConnKind::Accept), PAYLOAD_CHAT_ACCEPTED)
    }

    pub fn chat_reject(root: Route, dest: Route) -> Self {
        Self::from_route(root, dest, MessageKind::Conn(ConnKind::Reject), PAYLOAD_CHAT_REJECTED)
    }

    pub fn chat_leave(root: Route, dest: Route) -> Self {
        Self::from_route(root, dest, MessageKind::Conn(ConnKind::Leave), PAYLOAD_CHAT_LEFT)
    }

    pub fn route_deleted(root: Route, dest: Route) -> Self {
        Self::from_route(root, dest, MessageKind::Conn(ConnKind::Delete), PAYLOAD_CHAT_DELETED)
    }

    /// `info` is a JSON encoded [`crate::Info`].
    pub fn chat_info(root: Route, dest: Route, info: Vec<u8>) -> Self {
        Self::from_route(root, dest, MessageKind::Info(InfoKind::Single), info)
    }

    /// `members` is a JSON map of peer id to [`crate::Peer`].
    pub fn server_members(root: Route, dest: Route, members: Vec<u8>) -> Self {
        Self::from_route(root, dest, MessageKind::Info(InfoKind::ServerMembers), members)
    }

    /// `members` is a JSON map of peer id to [`crate::Peer`].
    pub fn room_members(root: Route, dest: Route, members: Vec<u8>) -> Self {
        Self::from_route(root, dest, MessageKind::Info(InfoKind::RoomMembers), members)
    }

    /// `mods` is a JSON list of peer ids.
    pub fn room_mods(root: Route, dest: Route, mods: Vec<u8>) -> Self {
        Self::from_route(root, dest, MessageKind::Info(InfoKind::RoomMods), mods)
    }

    /// `muted` is a JSON list of peer ids.
    pub fn room_muted(root: Route, dest: Route, muted: Vec<u8>) -> Self {
        Self::from_route(root, dest, MessageKind::Info(InfoKind::RoomMuted), muted)
    }

    /// `info` is the JSON encoded [`crate::Info`] of the new room.
    pub fn add_room(root: Route, dest: Route, info: Vec<u8>) -> Self {
        Self::from_route(root, dest, MessageKind::Cmd(CmdKind::AddRoom), info)
    }

    pub fn delete_room(root: Route, dest: Route) -> Self {
        Self::from_route(root, dest, MessageKind::Cmd(CmdKind::DeleteRoom), PAYLOAD_ROOM_DELETED)
    }

    /// `pk` is the JSON encoded target peer id.
    pub fn mute_peer(root: Route, dest: Route, pk: Vec<u8>) -> Self {
        Self::from_route(root, dest, MessageKind::Cmd(CmdKind::MutePeer), pk)
    }

    /// `pk` is the JSON encoded target peer id.
    pub fn unmute_peer(root: Route, dest: Route, pk: Vec<u8>) -> Self {
        Self::from_route(root, dest, MessageKind::Cmd(CmdKind::UnmutePeer), pk)
    }

    /// `pk` is the JSON encoded target peer id.
    pub fn hire_moderator(root: Route, dest: Route, pk: Vec<u8>) -> Self {
        Self::from_route(root, dest, MessageKind::Cmd(CmdKind::HireModerator), pk)
    }

    /// `pk` is the JSON encoded target peer id.
    pub fn fire_moderator(root: Route, dest: Route, pk: Vec<u8>) -> Self {
        Self::from_route(root, dest, MessageKind::Cmd(CmdKind::FireModerator), pk)
    }

    /// Ack for the message with id `acked_id`; the subtype carries the new status.
    pub fn status(
        origin: PeerId,
        root: Route,
        dest: Route,
        acked_id: &str,
        status: MessageStatus,
    ) -> Self {
        Self::build(origin, root, dest, MessageKind::Status(status), acked_id.as_bytes())
    }
}
