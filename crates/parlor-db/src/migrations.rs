use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id                TEXT PRIMARY KEY,
            nick_name         TEXT NOT NULL,
            icon_file_path    TEXT NOT NULL DEFAULT '',
            enable_invisible  INTEGER NOT NULL DEFAULT 0,
            current_channel   INTEGER NOT NULL DEFAULT -1,
            connect_key       TEXT NOT NULL DEFAULT '',
            channel_version   INTEGER NOT NULL DEFAULT 0
        );

        -- One table for both conversation kinds; `kind` decides which
        -- columns are populated.
        CREATE TABLE IF NOT EXISTS conversations (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            kind              TEXT NOT NULL,
            aes_key           TEXT NOT NULL,
            created_at        INTEGER NOT NULL,
            requester_id      TEXT,
            target_id         TEXT,
            pair_low          TEXT,
            pair_high         TEXT,
            group_name        TEXT,
            group_image_path  TEXT,
            owner_id          TEXT,
            join_password     TEXT
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_private_pair
            ON conversations(pair_low, pair_high) WHERE kind = 'private';

        CREATE TABLE IF NOT EXISTS messages (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            conversation_id  INTEGER NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
            sender_id        TEXT NOT NULL,
            content          TEXT NOT NULL,
            send_time        INTEGER NOT NULL,
            read             INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(conversation_id, send_time);

        CREATE TABLE IF NOT EXISTS ats (
            message_id      INTEGER NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
            target_user_id  TEXT NOT NULL,
            PRIMARY KEY (message_id, target_user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_ats_target
            ON ats(target_user_id);

        CREATE TABLE IF NOT EXISTS user_group_relations (
            user_id          TEXT NOT NULL,
            group_id         INTEGER NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
            read_time_stamp  INTEGER NOT NULL,
            muted            INTEGER NOT NULL DEFAULT 0,
            join_time        INTEGER NOT NULL,
            PRIMARY KEY (user_id, group_id)
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
