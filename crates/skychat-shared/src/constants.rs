/// Application name
pub const APP_NAME: &str = "Skychat";

/// Ed25519 public key size in bytes
pub const PUBKEY_SIZE: usize = 32;

/// Ed25519 secret key size in bytes
pub const SECRET_KEY_SIZE: usize = 32;

/// Size of the big-endian length prefix in front of every frame
pub const FRAME_HEADER_SIZE: usize = 4;

/// Upper bound for a single read while accumulating a frame body
pub const READ_CHUNK_SIZE: usize = 1024;

/// Maximum accepted frame body in bytes (4 MiB)
pub const MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;

/// Default chat port on the mesh transport
pub const DEFAULT_CHAT_PORT: u16 = 4001;

/// First dial retry delay in milliseconds
pub const DIAL_BASE_DELAY_MS: u64 = 50;

/// Multiplier applied to the dial delay after every failed attempt
pub const DIAL_BACKOFF_FACTOR: u32 = 2;

/// Number of dial attempts before giving up
pub const DIAL_MAX_ATTEMPTS: u32 = 5;

/// Time an accepted TCP socket has to send its identity preamble
pub const HANDSHAKE_TIMEOUT_MS: u64 = 5_000;

/// Alias given to peers and groups we know nothing about yet
pub const DEFAULT_ALIAS: &str = "Unknown";

/// Description given to peers and groups we know nothing about yet
pub const DEFAULT_DESC: &str = "-";

/// Payload of a `Conn/Request` message
pub const PAYLOAD_CHAT_REQUEST: &[u8] = b"Chat Request";
/// Payload of a `Conn/Accept` message
pub const PAYLOAD_CHAT_ACCEPTED: &[u8] = b"Chat Accepted";
/// Payload of a `Conn/Reject` message
pub const PAYLOAD_CHAT_REJECTED: &[u8] = b"Chat Rejected";
/// Payload of a `Conn/Leave` message
pub const PAYLOAD_CHAT_LEFT: &[u8] = b"Chat Left";
/// Payload of a `Conn/Delete` message
pub const PAYLOAD_CHAT_DELETED: &[u8] = b"Chat Deleted";
/// Payload of a `Cmd/DeleteRoom` message
pub const PAYLOAD_ROOM_DELETED: &[u8] = b"Room Deleted";
