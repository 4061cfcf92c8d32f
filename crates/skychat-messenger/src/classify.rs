//! Which handler an inbound message belongs to.

use skychat_shared::{PeerId, Route, RouteKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageClass {
    /// Direct chat: a remote visor's P2P route to our own P2P route.
    P2P,
    /// Sent by the host of a group we joined, on the group's behalf.
    RemoteGroup,
    /// Addressed to a server or room we host, from a member or from
    /// ourselves.
    LocalGroup,
}

/// Classify a message by its `root` and `dest` routes, relative to the
/// `local` visor. `None` for combinations no handler accepts.
pub fn classify(local: PeerId, root: &Route, dest: &Route) -> Option<MessageClass> {
    let root_kind = root.kind()?;
    let dest_kind = dest.kind()?;

    if dest.visor != local {
        return None;
    }

    match (root_kind, dest_kind) {
        (_, RouteKind::Server | RouteKind::Room) => {
            // group traffic always comes from a visor's own route
            (root_kind == RouteKind::P2P).then_some(MessageClass::LocalGroup)
        }
        (RouteKind::P2P, RouteKind::P2P) if root.visor != local => Some(MessageClass::P2P),
        (RouteKind::Server | RouteKind::Room, RouteKind::P2P) if root.visor != local => {
            Some(MessageClass::RemoteGroup)
        }
        _ => None,
    }
}
