//! Outbound operations started by the local user.
//!
//! Messages addressed to a group the local visor hosts never touch the
//! network; they are applied in-process exactly as if a member had sent
//! them. Direct chat messages are stored when sent, group messages are
//! stored once the host echoes them back.

use tracing::debug;

use skychat_shared::{DomainError, Info, Message, MessageStatus, PeerId, Route};

use crate::error::{MessengerError, Result};
use crate::notification::Notification;
use crate::service::MessengerService;

impl MessengerService {
    /// Ask the visor, server or room `route` names to let us in.
    pub async fn send_route_request(&self, route: Route) -> Result<()> {
        self.check_remote(&route)?;
        let message = Message::route_request(self.ctx.local, route);
        self.transmit(route, &message, true).await?;
        self.notify(Notification::AddRoute { route });
        Ok(())
    }

    pub async fn send_text(&self, route: Route, text: &str) -> Result<Message> {
        let message = Message::text(self.ctx.local, route, text);
        self.deliver(message.clone()).await?;
        Ok(message)
    }

    pub async fn send_add_room(&self, route: Route, info: &Info) -> Result<()> {
        let message = Message::add_room(self.own_route(), route, serde_json::to_vec(info)?);
        self.deliver(message).await
    }

    pub async fn send_delete_room(&self, route: Route) -> Result<()> {
        self.deliver(Message::delete_room(self.own_route(), route))
            .await
    }

    pub async fn send_mute_peer(&self, route: Route, pk: PeerId) -> Result<()> {
        let message = Message::mute_peer(self.own_route(), route, serde_json::to_vec(&pk)?);
        self.deliver(message).await
    }

    pub async fn send_unmute_peer(&self, route: Route, pk: PeerId) -> Result<()> {
        let message = Message::unmute_peer(self.own_route(), route, serde_json::to_vec(&pk)?);
        self.deliver(message).await
    }

    pub async fn send_hire_moderator(&self, route: Route, pk: PeerId) -> Result<()> {
        let message = Message::hire_moderator(self.own_route(), route, serde_json::to_vec(&pk)?);
        self.deliver(message).await
    }

    pub async fn send_fire_moderator(&self, route: Route, pk: PeerId) -> Result<()> {
        let message = Message::fire_moderator(self.own_route(), route, serde_json::to_vec(&pk)?);
        self.deliver(message).await
    }

    /// Send `info` as the info of `root` to `dest`, in-process when `dest`
    /// is a group we host.
    pub async fn send_info(&self, root: Route, dest: Route, info: &Info) -> Result<()> {
        if dest.visor == self.ctx.local {
            let message = Message::chat_info(root, dest, serde_json::to_vec(info)?);
            return self.handle_message(message).await;
        }
        self.transmit_info(root, dest, info).await
    }

    /// Network-only half of [`send_info`](Self::send_info), used while
    /// handling inbound messages.
    pub(crate) async fn transmit_info(&self, root: Route, dest: Route, info: &Info) -> Result<()> {
        let message = Message::chat_info(root, dest, serde_json::to_vec(info)?);
        // only direct chats keep a copy of what we told the peer
        let persist = root.is_p2p() && dest.is_p2p();
        self.transmit(dest, &message, persist).await
    }

    /// Accept a request; the accept is stored in `route`'s log.
    pub async fn send_chat_accept(&self, route: Route, root: Route, dest: Route) -> Result<()> {
        self.transmit(route, &Message::chat_accept(root, dest), true)
            .await
    }

    pub async fn send_chat_reject(&self, root: Route, dest: Route) -> Result<()> {
        self.transmit(dest, &Message::chat_reject(root, dest), false)
            .await
    }

    pub async fn send_leave_route(&self, route: Route) -> Result<()> {
        self.transmit(route, &Message::chat_leave(self.own_route(), route), false)
            .await
    }

    /// Ack `message` back to its root as `Received`.
    pub async fn send_message_received(&self, message: &Message) -> Result<()> {
        let ack = Message::status(
            message.dest.visor,
            message.dest,
            message.root,
            &message.id,
            MessageStatus::Received,
        );
        self.transmit(message.root, &ack, false).await
    }

    /// Tell the members of the hosted `route` that it is gone.
    pub async fn send_route_deleted(&self, route: Route) -> Result<()> {
        if route.visor != self.ctx.local {
            return Err(MessengerError::ForeignRoute(route));
        }
        if !route.is_group() {
            return Err(DomainError::InvalidRoute(route).into());
        }
        self.send_to_peers(route, &Message::route_deleted(route, route))
            .await
    }

    fn own_route(&self) -> Route {
        Route::p2p(self.ctx.local)
    }

    fn check_remote(&self, route: &Route) -> Result<()> {
        if route.kind().is_none() {
            return Err(DomainError::InvalidRoute(*route).into());
        }
        if route.visor == self.ctx.local {
            return Err(MessengerError::OwnRoute(*route));
        }
        Ok(())
    }

    /// Hand a user message to the hosted group in-process, or send it.
    async fn deliver(&self, message: Message) -> Result<()> {
        let dest = message.dest;
        if dest.visor == self.ctx.local {
            debug!(route = %dest, "delivering to hosted group in-process");
            return self.handle_message(message).await;
        }
        self.check_remote(&dest)?;
        self.transmit(dest, &message, dest.is_p2p()).await?;
        self.notify_message(dest, &message);
        Ok(())
    }
}
