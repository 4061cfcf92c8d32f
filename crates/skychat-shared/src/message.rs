//! The wire message exchanged between visors.
//!
//! `Msgtype`/`MsgSubtype` travel as raw integers so that a frame with an
//! unknown combination still decodes; [`Message::kind`] is the typed view
//! and rejects anything it does not recognise.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::route::Route;
use crate::types::PeerId;

// ---------------------------------------------------------------------------
// Type codes
// ---------------------------------------------------------------------------

pub const MSG_TYPE_CONN: u8 = 1;
pub const MSG_TYPE_TXT: u8 = 2;
pub const MSG_TYPE_INFO: u8 = 3;
pub const MSG_TYPE_CMD: u8 = 4;
pub const MSG_TYPE_STATUS: u8 = 5;

/// Handshake subtypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnKind {
    Request = 1,
    Accept = 2,
    Reject = 3,
    Leave = 4,
    Delete = 5,
}

/// Info subtypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InfoKind {
    /// Info of a single visor, server or room
    Single = 1,
    /// Full member list of a server
    ServerMembers = 2,
    /// Full member list of a room
    RoomMembers = 3,
    /// Full muted list of a room
    RoomMuted = 4,
    /// Full moderator list of a room
    RoomMods = 5,
}

/// Moderation command subtypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CmdKind {
    AddRoom = 1,
    DeleteRoom = 2,
    MutePeer = 3,
    UnmutePeer = 4,
    HireModerator = 5,
    FireModerator = 6,
}

/// Delivery status of a message.
///
/// Ordered `Initial < Sent < Received | Rejected`; see [`MessageStatus::rank`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum MessageStatus {
    #[default]
    Initial = 0,
    Sent = 1,
    Received = 2,
    Rejected = 3,
}

impl MessageStatus {
    /// Received and Rejected are both terminal and share a rank.
    pub fn rank(self) -> u8 {
        match self {
            MessageStatus::Initial => 0,
            MessageStatus::Sent => 1,
            MessageStatus::Received | MessageStatus::Rejected => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Initial),
            1 => Some(Self::Sent),
            2 => Some(Self::Received),
            3 => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl From<MessageStatus> for u8 {
    fn from(status: MessageStatus) -> u8 {
        status as u8
    }
}

impl TryFrom<u8> for MessageStatus {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or_else(|| format!("invalid message status {code}"))
    }
}

/// Typed view of `(Msgtype, MsgSubtype)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Conn(ConnKind),
    Txt,
    Info(InfoKind),
    Cmd(CmdKind),
    /// Delivery ack; the subtype is the new status of the acked message.
    Status(MessageStatus),
}

impl MessageKind {
    pub fn codes(self) -> (u8, u8) {
        match self {
            MessageKind::Conn(k) => (MSG_TYPE_CONN, k as u8),
            MessageKind::Txt => (MSG_TYPE_TXT, 0),
            MessageKind::Info(k) => (MSG_TYPE_INFO, k as u8),
            MessageKind::Cmd(k) => (MSG_TYPE_CMD, k as u8),
            MessageKind::Status(s) => (MSG_TYPE_STATUS, s as u8),
        }
    }

    pub fn from_codes(msg_type: u8, msg_subtype: u8) -> Result<Self, DomainError> {
        let unknown = DomainError::UnknownKind {
            msg_type,
            msg_subtype,
        };
        let kind = match (msg_type, msg_subtype) {
            (MSG_TYPE_CONN, 1) => MessageKind::Conn(ConnKind::Request),
            (MSG_TYPE_CONN, 2) => MessageKind::Conn(ConnKind::Accept),
            (MSG_TYPE_CONN, 3) => MessageKind::Conn(ConnKind::Reject),
            (MSG_TYPE_CONN, 4) => MessageKind::Conn(ConnKind::Leave),
            (MSG_TYPE_CONN, 5) => MessageKind::Conn(ConnKind::Delete),
            (MSG_TYPE_TXT, 0) => MessageKind::Txt,
            (MSG_TYPE_INFO, 1) => MessageKind::Info(InfoKind::Single),
            (MSG_TYPE_INFO, 2) => MessageKind::Info(InfoKind::ServerMembers),
            (MSG_TYPE_INFO, 3) => MessageKind::Info(InfoKind::RoomMembers),
            (MSG_TYPE_INFO, 4) => MessageKind::Info(InfoKind::RoomMuted),
            (MSG_TYPE_INFO, 5) => MessageKind::Info(InfoKind::RoomMods),
            (MSG_TYPE_CMD, 1) => MessageKind::Cmd(CmdKind::AddRoom),
            (MSG_TYPE_CMD, 2) => MessageKind::Cmd(CmdKind::DeleteRoom),
            (MSG_TYPE_CMD, 3) => MessageKind::Cmd(CmdKind::MutePeer),
            (MSG_TYPE_CMD, 4) => MessageKind::Cmd(CmdKind::UnmutePeer),
            (MSG_TYPE_CMD, 5) => MessageKind::Cmd(CmdKind::HireModerator),
            (MSG_TYPE_CMD, 6) => MessageKind::Cmd(CmdKind::FireModerator),
            (MSG_TYPE_STATUS, code) => {
                MessageKind::Status(MessageStatus::from_code(code).ok_or(unknown)?)
            }
            _ => return Err(unknown),
        };
        Ok(kind)
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A chat message as it travels on the wire and sits in a room's log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "Id")]
    pub id: String,
    /// The visor that authored the message
    #[serde(rename = "Origin")]
    pub origin: PeerId,
    #[serde(rename = "Time")]
    pub time: DateTime<Utc>,
    /// The route the message is logically from
    #[serde(rename = "Root")]
    pub root: Route,
    /// The route the message is addressed to
    #[serde(rename = "Dest")]
    pub dest: Route,
    #[serde(rename = "Msgtype")]
    pub msg_type: u8,
    #[serde(rename = "MsgSubtype")]
    pub msg_subtype: u8,
    #[serde(rename = "Message", with = "payload_base64")]
    pub payload: Vec<u8>,
    #[serde(rename = "Status")]
    pub status: MessageStatus,
    /// Local read flag, never interpreted by the receiver
    #[serde(rename = "Seen")]
    pub seen: bool,
}

impl Message {
    pub fn kind(&self) -> Result<MessageKind, DomainError> {
        MessageKind::from_codes(self.msg_type, self.msg_subtype)
    }

    /// Move the status forward; returns `false` when `status` would not
    /// advance it.
    pub fn advance_status(&mut self, status: MessageStatus) -> bool {
        if status.rank() > self.status.rank() {
            self.status = status;
            true
        } else {
            false
        }
    }

    /// Payload as text, lossy.
    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }

    /// Serialize to the JSON wire body.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize from a JSON wire body.
    pub fn from_bytes(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}

mod payload_base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}
