//! SQL schema for the rally SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    email         TEXT NOT NULL UNIQUE,
    username      TEXT NOT NULL UNIQUE,
    display_name  TEXT,
    avatar_url    TEXT,
    is_online     INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT NOT NULL
);

-- One active row per unordered pair; decline and unfriend delete the row.
CREATE TABLE IF NOT EXISTS friendships (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    requester_id  INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    addressee_id  INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    status        TEXT NOT NULL,   -- 'PENDING' | 'ACCEPTED'
    created_at    TEXT NOT NULL,
    CHECK (requester_id != addressee_id)
);

CREATE UNIQUE INDEX IF NOT EXISTS friendships_pair_idx
    ON friendships (MIN(requester_id, addressee_id), MAX(requester_id, addressee_id));

-- AUTOINCREMENT keeps ids strictly increasing; history cursors rely on it.
-- Only is_read is ever updated, and only from 0 to 1.
CREATE TABLE IF NOT EXISTS messages (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    sender_id    INTEGER NOT NULL REFERENCES users(id),
    receiver_id  INTEGER NOT NULL REFERENCES users(id),
    content      TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    is_read      INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS messages_pair_idx   ON messages(sender_id, receiver_id, id);
CREATE INDEX IF NOT EXISTS messages_unread_idx ON messages(receiver_id, is_read);

CREATE TABLE IF NOT EXISTS games (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    player1_id      INTEGER NOT NULL REFERENCES users(id),
    player2_id      INTEGER REFERENCES users(id),
    board_state     TEXT NOT NULL,             -- JSON array of 9 cells: \"X\" | \"O\" | null
    board_size      INTEGER NOT NULL DEFAULT 3,
    current_turn    TEXT NOT NULL,             -- 'X' | 'O'
    status          TEXT NOT NULL,
    winner_id       INTEGER REFERENCES users(id),
    player1_symbol  TEXT NOT NULL,
    player2_symbol  TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    started_at      TEXT,
    finished_at     TEXT
);

CREATE INDEX IF NOT EXISTS games_player1_idx ON games(player1_id);
CREATE INDEX IF NOT EXISTS games_player2_idx ON games(player2_id);

PRAGMA user_version = 1;
";
