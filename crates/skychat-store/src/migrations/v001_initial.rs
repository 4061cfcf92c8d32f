//! v001 -- Initial schema creation.
//!
//! Creates the `visors` table holding one JSON document per visor aggregate
//! and the single-row `local_user` table.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Visors (P2P chat + servers + rooms, one document each)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS visors (
    pubkey   TEXT PRIMARY KEY NOT NULL,   -- hex-encoded 32-byte Ed25519 pubkey
    document TEXT NOT NULL                -- JSON encoded Visor
);

-- ----------------------------------------------------------------
-- Local user (exactly one row)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS local_user (
    id       INTEGER PRIMARY KEY CHECK (id = 1),
    document TEXT NOT NULL                -- JSON encoded User
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
