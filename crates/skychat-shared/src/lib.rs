//! # skychat-shared
//!
//! Domain model shared by every skychat crate: identities and routes, the
//! Visor → Server → Room → Peer hierarchy, the wire `Message` with its typed
//! constructors, and the persistence traits the messenger consumes.

pub mod catalog;
pub mod constants;
pub mod error;
pub mod identity;
pub mod info;
pub mod message;
pub mod peer;
pub mod repository;
pub mod room;
pub mod route;
pub mod server;
pub mod types;
pub mod user;
pub mod visor;

pub use error::{DomainError, IdentityError, PeerSet, RepositoryError};
pub use info::Info;
pub use message::{CmdKind, ConnKind, InfoKind, Message, MessageKind, MessageStatus};
pub use peer::Peer;
pub use repository::{UserRepository, VisorRepository};
pub use room::{Room, RoomType};
pub use route::{Route, RouteKind};
pub use server::Server;
pub use types::PeerId;
pub use user::{Settings, User};
pub use visor::Visor;
