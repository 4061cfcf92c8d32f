//! End-to-end runs of several visors over the in-memory mesh.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc, watch};

use skychat_net::{ConnectionHandler, HandlerConfig, MemoryNetwork, RetryPolicy};
use skychat_shared::{
    ConnKind, Info, InfoKind, Message, MessageKind, MessageStatus, Peer, PeerId, Room, Route,
    User, UserRepository, Visor, VisorRepository,
};
use skychat_store::{InMemoryUserRepository, InMemoryVisorRepository};

use crate::context::AppContext;
use crate::error::MessengerError;
use crate::notification::{ChannelNotifier, Notification};
use crate::service::MessengerService;

fn pk(b: u8) -> PeerId {
    PeerId([b; 32])
}

struct Node {
    pk: PeerId,
    service: MessengerService,
    visors: Arc<InMemoryVisorRepository>,
    users: Arc<InMemoryUserRepository>,
    notes: broadcast::Receiver<Notification>,
    errors: mpsc::UnboundedReceiver<MessengerError>,
    _shutdown: watch::Sender<bool>,
}

impl Node {
    async fn start(net: &MemoryNetwork, b: u8, alias: &str) -> Self {
        let pk = pk(b);
        let visors = Arc::new(InMemoryVisorRepository::new());
        let users = Arc::new(InMemoryUserRepository::new(User::new(Info::new(
            pk, alias, "", "",
        ))));
        let notifier = Arc::new(ChannelNotifier::default());
        let notes = notifier.subscribe();

        let config = HandlerConfig {
            port: 4001,
            retry: RetryPolicy {
                base_delay: Duration::from_millis(1),
                factor: 2,
                max_attempts: 3,
            },
        };
        let (handler, streams) =
            ConnectionHandler::new(pk, Arc::new(net.transport(pk)), visors.clone(), config);
        handler.listen().await.unwrap();

        let ctx = AppContext::new(visors.clone(), users.clone(), notifier, handler);
        let (service, errors) = MessengerService::new(ctx);
        let (shutdown, shutdown_rx) = watch::channel(false);
        tokio::spawn(service.clone().run(streams.inbound, shutdown_rx));

        Self {
            pk,
            service,
            visors,
            users,
            notes,
            errors,
            _shutdown: shutdown,
        }
    }

    fn room(&self, route: &Route) -> Option<Room> {
        self.visors
            .get_by_pk(&route.visor)
            .ok()
            .and_then(|visor| visor.room(route).ok().cloned())
    }

    fn visor(&self, pk: &PeerId) -> Option<Visor> {
        self.visors.get_by_pk(pk).ok()
    }

    fn has_message(&self, route: &Route, pred: impl Fn(&Message) -> bool) -> bool {
        self.room(route)
            .is_some_and(|room| room.messages().iter().any(|m| pred(m)))
    }
}

async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(3);
    while !check() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn is_kind(message: &Message, kind: MessageKind) -> bool {
    message.kind().is_ok_and(|k| k == kind)
}

#[tokio::test]
async fn test_p2p_handshake_exchanges_info() {
    let net = MemoryNetwork::new();
    let mut alice = Node::start(&net, 1, "alice").await;
    let bob = Node::start(&net, 2, "bob").await;
    let to_bob = Route::p2p(bob.pk);
    let to_alice = Route::p2p(alice.pk);

    assert!(alice.visor(&bob.pk).is_none());
    alice.service.send_route_request(to_bob).await.unwrap();

    // the request is logged as sent before anything comes back
    let first = alice.room(&to_bob).unwrap().messages()[0].clone();
    assert!(is_kind(&first, MessageKind::Conn(ConnKind::Request)));
    assert_eq!(first.status, MessageStatus::Sent);

    eventually("bob to know alice", || {
        bob.has_message(&to_alice, |m| is_kind(m, MessageKind::Conn(ConnKind::Request)))
    })
    .await;
    eventually("alice to see the accept", || {
        alice.has_message(&to_bob, |m| is_kind(m, MessageKind::Conn(ConnKind::Accept)))
    })
    .await;
    eventually("both infos exchanged", || {
        alice.room(&to_bob).is_some_and(|r| r.info().alias == "bob")
            && bob.room(&to_alice).is_some_and(|r| r.info().alias == "alice")
    })
    .await;

    // bob acked alice's info
    eventually("alice's info to be received", || {
        alice.has_message(&to_bob, |m| {
            m.origin == alice.pk
                && is_kind(m, MessageKind::Info(InfoKind::Single))
                && m.status == MessageStatus::Received
        })
    })
    .await;

    let mut added = false;
    while let Ok(note) = alice.notes.try_recv() {
        added |= note == Notification::AddRoute { route: to_bob };
    }
    assert!(added);
}

#[tokio::test]
async fn test_text_is_acked_received() {
    let net = MemoryNetwork::new();
    let alice = Node::start(&net, 1, "alice").await;
    let bob = Node::start(&net, 2, "bob").await;
    let to_bob = Route::p2p(bob.pk);

    alice.service.send_route_request(to_bob).await.unwrap();
    eventually("handshake", || {
        alice.room(&to_bob).is_some_and(|r| r.info().alias == "bob")
    })
    .await;

    let sent = alice.service.send_text(to_bob, "hello bob").await.unwrap();
    eventually("bob to log the text", || {
        bob.has_message(&Route::p2p(alice.pk), |m| m.id == sent.id)
    })
    .await;
    eventually("the ack", || {
        alice.has_message(&to_bob, |m| {
            m.id == sent.id && m.status == MessageStatus::Received
        })
    })
    .await;
}

#[tokio::test]
async fn test_blacklisted_request_is_rejected_and_forgotten() {
    let net = MemoryNetwork::new();
    let alice = Node::start(&net, 1, "alice").await;
    let mut bob = Node::start(&net, 2, "bob").await;

    let mut user = bob.users.get_user().unwrap();
    user.add_to_blacklist(alice.pk).unwrap();
    bob.users.set_user(user).unwrap();

    let to_bob = Route::p2p(bob.pk);
    alice.service.send_route_request(to_bob).await.unwrap();

    eventually("alice to see the reject", || {
        alice.has_message(&to_bob, |m| is_kind(m, MessageKind::Conn(ConnKind::Reject)))
    })
    .await;
    match bob.errors.recv().await.unwrap() {
        MessengerError::Blacklisted { peer, .. } => assert_eq!(peer, alice.pk),
        other => panic!("unexpected: {other:?}"),
    }
    assert!(bob.visor(&alice.pk).is_none());
}

#[tokio::test]
async fn test_blacklisted_request_keeps_visor_with_groups() {
    let net = MemoryNetwork::new();
    let alice = Node::start(&net, 1, "alice").await;
    let mut bob = Node::start(&net, 2, "bob").await;

    // bob already joined a server alice hosts
    let alice_server = Route::server(alice.pk, pk(50));
    bob.visors.add(Visor::new_default(alice_server)).unwrap();
    let mut user = bob.users.get_user().unwrap();
    user.add_to_blacklist(alice.pk).unwrap();
    bob.users.set_user(user).unwrap();

    alice
        .service
        .send_route_request(Route::p2p(bob.pk))
        .await
        .unwrap();
    assert!(matches!(
        bob.errors.recv().await.unwrap(),
        MessengerError::Blacklisted { .. }
    ));

    let kept = bob.visor(&alice.pk).unwrap();
    assert!(kept.p2p_is_empty());
    assert_eq!(kept.servers().len(), 1);
}

#[tokio::test]
async fn test_accept_from_blacklisted_peer_is_refused() {
    let net = MemoryNetwork::new();
    let alice = Node::start(&net, 1, "alice").await;
    let bob = Node::start(&net, 2, "bob").await;
    let to_bob = Route::p2p(bob.pk);

    // bob answers a request alice has since regretted
    alice.visors.add(Visor::new_default_p2p(bob.pk)).unwrap();
    let mut user = alice.users.get_user().unwrap();
    user.add_to_blacklist(bob.pk).unwrap();
    alice.users.set_user(user).unwrap();

    let accept = Message::chat_accept(to_bob, Route::p2p(alice.pk));
    match alice.service.handle_message(accept).await {
        Err(MessengerError::Blacklisted { peer, .. }) => assert_eq!(peer, bob.pk),
        other => panic!("unexpected: {other:?}"),
    }
    // nothing stored and the bare visor is gone
    assert!(alice.visor(&bob.pk).is_none());
}

#[tokio::test]
async fn test_moderator_mutes_member_in_hosted_room() {
    let net = MemoryNetwork::new();
    let mut host = Node::start(&net, 1, "host").await;
    let peer = Node::start(&net, 2, "peer").await;
    let quiet = Node::start(&net, 3, "quiet").await;

    let room = host
        .service
        .add_local_server(Info::new(PeerId::default(), "lounge", "a place", ""))
        .unwrap();

    peer.service.send_route_request(room).await.unwrap();
    quiet.service.send_route_request(room).await.unwrap();
    eventually("both members to join", || {
        host.room(&room)
            .is_some_and(|r| r.is_member(&peer.pk) && r.is_member(&quiet.pk))
    })
    .await;
    eventually("members to learn the member list", || {
        peer.room(&room).is_some_and(|r| r.members().len() == 3)
            && quiet.room(&room).is_some_and(|r| r.members().len() == 3)
    })
    .await;
    assert_eq!(peer.room(&room).unwrap().info().alias, "lounge");

    // a plain member may not mute
    peer.service.send_mute_peer(room, quiet.pk).await.unwrap();
    match host.errors.recv().await.unwrap() {
        MessengerError::Unauthorized { peer: who, .. } => assert_eq!(who, peer.pk),
        other => panic!("unexpected: {other:?}"),
    }
    assert!(!host.room(&room).unwrap().is_muted(&quiet.pk));

    host.service.send_hire_moderator(room, peer.pk).await.unwrap();
    assert!(host.room(&room).unwrap().is_mod(&peer.pk));

    peer.service.send_mute_peer(room, quiet.pk).await.unwrap();
    eventually("quiet to be muted", || {
        host.room(&room).is_some_and(|r| r.is_muted(&quiet.pk))
    })
    .await;
    eventually("members to learn the mute list", || {
        peer.room(&room).is_some_and(|r| r.is_muted(&quiet.pk))
    })
    .await;

    // still logged by the host, never forwarded
    let muted = quiet.service.send_text(room, "can anyone hear me").await.unwrap();
    eventually("host to log the muted text", || {
        host.has_message(&room, |m| m.id == muted.id)
    })
    .await;

    let spoken = peer.service.send_text(room, "loud and clear").await.unwrap();
    eventually("the echo to reach quiet", || {
        quiet.has_message(&room, |m| m.id == spoken.id)
    })
    .await;
    eventually("the echo to reach its author", || {
        peer.has_message(&room, |m| m.id == spoken.id)
    })
    .await;
    assert!(!peer.has_message(&room, |m| m.id == muted.id));
    assert!(!quiet.has_message(&room, |m| m.id == muted.id));
}

#[tokio::test]
async fn test_host_mutes_server_wide_from_the_lobby() {
    let net = MemoryNetwork::new();
    let host = Node::start(&net, 1, "host").await;
    let room = host
        .service
        .add_local_server(Info::new(PeerId::default(), "hall", "", ""))
        .unwrap();
    let lobby = room.server_lobby();

    host.service.send_mute_peer(lobby, pk(9)).await.unwrap();
    let server = host.visor(&host.pk).unwrap().server(&lobby.server).unwrap().clone();
    assert!(server.is_muted(&pk(9)));
    assert!(!host.room(&room).unwrap().is_muted(&pk(9)));

    // room moderators cannot be hired on the lobby
    assert!(host.service.send_hire_moderator(lobby, pk(9)).await.is_err());
}

#[tokio::test]
async fn test_blacklisted_peer_cannot_join_hosted_room() {
    let net = MemoryNetwork::new();
    let mut host = Node::start(&net, 1, "host").await;
    let outcast = Node::start(&net, 2, "outcast").await;

    let room = host
        .service
        .add_local_server(Info::new(PeerId::default(), "club", "", ""))
        .unwrap();
    host.visors
        .update(&host.pk, &mut |visor| {
            visor.room_mut(&room)?.add_to_blacklist(outcast.pk)
        })
        .unwrap();
    let before = host.visor(&host.pk).unwrap();

    outcast.service.send_route_request(room).await.unwrap();
    eventually("the reject", || {
        outcast.has_message(&room, |m| is_kind(m, MessageKind::Conn(ConnKind::Reject)))
    })
    .await;
    assert!(matches!(
        host.errors.recv().await.unwrap(),
        MessengerError::Blacklisted { .. }
    ));
    assert_eq!(host.visor(&host.pk).unwrap(), before);
}

#[tokio::test]
async fn test_blacklisted_member_cannot_post_or_leave() {
    let net = MemoryNetwork::new();
    let host = Node::start(&net, 1, "host").await;
    let member = Node::start(&net, 2, "member").await;

    let room = host
        .service
        .add_local_server(Info::new(PeerId::default(), "yard", "", ""))
        .unwrap();
    member.service.send_route_request(room).await.unwrap();
    eventually("the member's info to land", || {
        host.has_message(&room, |m| {
            m.origin == member.pk && is_kind(m, MessageKind::Info(InfoKind::Single))
        })
    })
    .await;

    host.visors
        .update(&host.pk, &mut |visor| {
            visor.room_mut(&room)?.add_to_blacklist(member.pk)
        })
        .unwrap();
    let before = host.room(&room).unwrap();

    let text = Message::text(member.pk, room, "still here");
    assert!(matches!(
        host.service.handle_message(text).await,
        Err(MessengerError::Blacklisted { .. })
    ));
    let leave = Message::chat_leave(Route::p2p(member.pk), room);
    assert!(matches!(
        host.service.handle_message(leave).await,
        Err(MessengerError::Blacklisted { .. })
    ));

    // late acks may still move a status, nothing else changes
    let after = host.room(&room).unwrap();
    assert!(after.is_member(&member.pk));
    assert!(after.is_blacklisted(&member.pk));
    assert_eq!(after.messages().len(), before.messages().len());
    assert_eq!(after.members(), before.members());
}

#[tokio::test]
async fn test_leaving_last_room_forgets_host() {
    let net = MemoryNetwork::new();
    let host = Node::start(&net, 1, "host").await;
    let member = Node::start(&net, 2, "member").await;

    let room = host
        .service
        .add_local_server(Info::new(PeerId::default(), "den", "", ""))
        .unwrap();
    member.service.send_route_request(room).await.unwrap();
    eventually("join", || {
        member.room(&room).is_some_and(|r| r.members().len() == 2)
    })
    .await;

    member.service.leave_remote_route(room).await.unwrap();
    assert!(member.visor(&host.pk).is_none());
    eventually("host to drop the member", || {
        host.room(&room).is_some_and(|r| !r.is_member(&member.pk))
    })
    .await;
}

#[tokio::test]
async fn test_deleting_hosted_room_cascades() {
    let net = MemoryNetwork::new();
    let host = Node::start(&net, 1, "host").await;
    let room = host
        .service
        .add_local_server(Info::new(PeerId::default(), "tmp", "", ""))
        .unwrap();

    host.service.delete_route(room).await.unwrap();
    // the server lost its only room and the local entry held nothing else
    assert!(host.visor(&host.pk).is_none());
}

#[tokio::test]
async fn test_deleting_remote_room_does_not_leave() {
    let net = MemoryNetwork::new();
    let host = Node::start(&net, 1, "host").await;
    let member = Node::start(&net, 2, "member").await;

    let room = host
        .service
        .add_local_server(Info::new(PeerId::default(), "porch", "", ""))
        .unwrap();
    member.service.send_route_request(room).await.unwrap();
    eventually("join", || {
        member.room(&room).is_some_and(|r| r.members().len() == 2)
    })
    .await;

    member.service.delete_route(room).await.unwrap();
    assert!(member.visor(&host.pk).is_none());

    // the host was never told
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(host.room(&room).unwrap().is_member(&member.pk));
    assert!(!host.has_message(&room, |m| is_kind(m, MessageKind::Conn(ConnKind::Leave))));
}

#[tokio::test]
async fn test_status_never_regresses() {
    let net = MemoryNetwork::new();
    let bob = Node::start(&net, 2, "bob").await;
    let alice = pk(1);
    let route = Route::p2p(alice);

    let mut acked = Message::text(bob.pk, route, "hi");
    acked.status = MessageStatus::Received;
    let mut visor = Visor::new_default_p2p(alice);
    visor.add_message(&route, acked.clone()).unwrap();
    bob.visors.add(visor).unwrap();

    let stale = Message::status(alice, route, Route::p2p(bob.pk), &acked.id, MessageStatus::Sent);
    bob.service.handle_message(stale).await.unwrap();

    let stored = bob.room(&route).unwrap().message(&acked.id).unwrap().clone();
    assert_eq!(stored.status, MessageStatus::Received);
}

#[tokio::test]
async fn test_stale_status_in_hosted_room_is_silent() {
    let net = MemoryNetwork::new();
    let mut host = Node::start(&net, 1, "host").await;
    let member = pk(2);

    let room = host
        .service
        .add_local_server(Info::new(PeerId::default(), "attic", "", ""))
        .unwrap();
    let mut acked = Message::text(host.pk, room, "hello");
    acked.status = MessageStatus::Sent;
    host.visors
        .update(&host.pk, &mut |visor| {
            let peer = Peer::with_default_info(member);
            visor.server_mut(&room.server)?.add_member(peer.clone())?;
            visor.room_mut(&room)?.add_member(peer)?;
            visor.add_message(&room, acked.clone())
        })
        .unwrap();
    while host.notes.try_recv().is_ok() {}

    let root = Route::p2p(member);
    let stale = Message::status(member, root, room, &acked.id, MessageStatus::Sent);
    host.service.handle_message(stale).await.unwrap();
    assert!(host.notes.try_recv().is_err());

    let fresh = Message::status(member, root, room, &acked.id, MessageStatus::Received);
    host.service.handle_message(fresh).await.unwrap();
    assert!(matches!(
        host.notes.try_recv(),
        Ok(Notification::NewMessage { .. })
    ));
    let stored = host.room(&room).unwrap().message(&acked.id).unwrap().clone();
    assert_eq!(stored.status, MessageStatus::Received);
}

#[tokio::test]
async fn test_stale_status_in_remote_room_is_silent() {
    let net = MemoryNetwork::new();
    let mut bob = Node::start(&net, 2, "bob").await;
    let room = Route::room(pk(1), pk(50), pk(51));

    let mut acked = Message::text(bob.pk, room, "hi all");
    acked.status = MessageStatus::Received;
    let mut visor = Visor::new_default(room);
    visor.add_message(&room, acked.clone()).unwrap();
    bob.visors.add(visor).unwrap();
    while bob.notes.try_recv().is_ok() {}

    let stale = Message::status(pk(1), room, Route::p2p(bob.pk), &acked.id, MessageStatus::Sent);
    bob.service.handle_message(stale).await.unwrap();
    assert!(bob.notes.try_recv().is_err());
    let stored = bob.room(&room).unwrap().message(&acked.id).unwrap().clone();
    assert_eq!(stored.status, MessageStatus::Received);
}

#[tokio::test]
async fn test_misaddressed_and_forbidden_messages() {
    let net = MemoryNetwork::new();
    let bob = Node::start(&net, 2, "bob").await;
    bob.visors.add(Visor::new_default_p2p(pk(1))).unwrap();

    let misaddressed = Message::text(pk(1), Route::p2p(pk(3)), "wrong door");
    assert!(matches!(
        bob.service.handle_message(misaddressed).await,
        Err(MessengerError::Unclassified { .. })
    ));

    let cmd = Message::delete_room(Route::p2p(pk(1)), Route::p2p(bob.pk));
    assert!(matches!(
        bob.service.handle_message(cmd).await,
        Err(MessengerError::UnexpectedKind { .. })
    ));
    assert!(bob.room(&Route::p2p(pk(1))).unwrap().messages().is_empty());

    let mut unknown = Message::text(pk(1), Route::p2p(bob.pk), "?");
    unknown.msg_type = 42;
    assert!(matches!(
        bob.service.handle_message(unknown).await,
        Err(MessengerError::Domain(_))
    ));
}
