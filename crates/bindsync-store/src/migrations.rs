use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS messages (
            id              TEXT PRIMARY KEY,
            source          TEXT NOT NULL,
            text            TEXT NOT NULL,
            username        TEXT NOT NULL,
            tg_msg_id       INTEGER,
            dc_msg_id       INTEGER,
            reply_to_id     TEXT REFERENCES messages(id),
            reply_to_tg_id  INTEGER,
            reply_to_dc_id  INTEGER,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_messages_tg_msg_id
            ON messages(tg_msg_id);

        CREATE INDEX IF NOT EXISTS idx_messages_dc_msg_id
            ON messages(dc_msg_id);
        ",
    )?;

    info!("Message store migrations complete");
    Ok(())
}
