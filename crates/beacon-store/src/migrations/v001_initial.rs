//! v001 -- Initial schema: the `locations` and `messages` tables.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Emergency locations
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS locations (
    id             TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    wallet_address TEXT NOT NULL,              -- 0x + 40 hex chars
    lat            REAL NOT NULL,
    lng            REAL NOT NULL,
    emergency_info TEXT,                       -- JSON, nullable
    created_at     TEXT NOT NULL               -- ISO-8601 / RFC-3339
);

CREATE INDEX IF NOT EXISTS idx_locations_owner ON locations(wallet_address);

-- ----------------------------------------------------------------
-- Chat messages (global stream + pairwise direct conversations)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id               TEXT PRIMARY KEY NOT NULL,  -- UUID v4, server-assigned
    content          TEXT NOT NULL,
    sender_address   TEXT NOT NULL,
    receiver_address TEXT,                       -- NULL iff is_global
    created_at       TEXT NOT NULL,              -- ISO-8601
    is_global        INTEGER NOT NULL DEFAULT 0, -- boolean 0/1

    CHECK (is_global = (receiver_address IS NULL))
);

CREATE INDEX IF NOT EXISTS idx_messages_global_ts
    ON messages(is_global, created_at);
CREATE INDEX IF NOT EXISTS idx_messages_pair
    ON messages(sender_address, receiver_address, created_at);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
