use crate::models::{MessageRow, NewMessage};
use crate::Database;
use anyhow::{anyhow, Result};
use rusqlite::{Connection, Row};
use tracing::warn;

const MESSAGE_COLUMNS: &str = "id, source, text, username, tg_msg_id, dc_msg_id, \
     reply_to_id, reply_to_tg_id, reply_to_dc_id, created_at";

impl Database {
    pub fn insert_message(&self, msg: &NewMessage) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages
                    (id, source, text, username, tg_msg_id, dc_msg_id,
                     reply_to_id, reply_to_tg_id, reply_to_dc_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    msg.id.to_string(),
                    msg.source.as_str(),
                    msg.text,
                    msg.username,
                    msg.tg_msg_id,
                    msg.dc_msg_id,
                    msg.reply_to_id.map(|id| id.to_string()),
                    msg.reply_to_tg_id,
                    msg.reply_to_dc_id,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1");
            let mut stmt = conn.prepare(&sql)?;
            stmt.query_row([id], read_message_row).optional()
        })
    }

    pub fn find_by_tg_id(&self, tg_msg_id: i64) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| query_by_native(conn, "tg_msg_id", tg_msg_id))
    }

    pub fn find_by_dc_id(&self, dc_msg_id: i64) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| query_by_native(conn, "dc_msg_id", dc_msg_id))
    }

    /// Record the Telegram-side native id once the relay there succeeds.
    /// Write-once: if the field is already set, this is a warn-and-no-op,
    /// never an overwrite.
    pub fn set_tg_id(&self, id: &str, tg_msg_id: i64) -> Result<()> {
        self.set_native_id(id, "tg_msg_id", tg_msg_id)
    }

    /// Discord-side counterpart of `set_tg_id`, same write-once contract.
    pub fn set_dc_id(&self, id: &str, dc_msg_id: i64) -> Result<()> {
        self.set_native_id(id, "dc_msg_id", dc_msg_id)
    }

    fn set_native_id(&self, id: &str, column: &str, value: i64) -> Result<()> {
        self.with_conn(|conn| {
            // The IS NULL guard makes concurrent confirmations race-safe:
            // whichever arrives first wins, the loser becomes a no-op.
            let sql = format!("UPDATE messages SET {column} = ?2 WHERE id = ?1 AND {column} IS NULL");
            let updated = conn.execute(&sql, rusqlite::params![id, value])?;
            if updated == 0 {
                let sql = format!("SELECT {column} FROM messages WHERE id = ?1");
                let existing: Option<i64> = conn
                    .query_row(&sql, [id], |row| row.get(0))
                    .optional()?
                    .ok_or_else(|| anyhow!("no such message: {}", id))?;
                warn!(
                    "Ignoring {} = {} for message '{}': already set to {:?}",
                    column, value, id, existing
                );
            }
            Ok(())
        })
    }

    /// Most-recent-first page of messages. Limit clamping is the API
    /// layer's job; this trusts its arguments.
    pub fn list_messages(&self, limit: u32, offset: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 ORDER BY rowid DESC LIMIT ?1 OFFSET ?2"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![limit, offset], read_message_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_by_native(conn: &Connection, column: &str, value: i64) -> Result<Option<MessageRow>> {
    let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE {column} = ?1");
    let mut stmt = conn.prepare(&sql)?;
    stmt.query_row(rusqlite::params![value], read_message_row)
        .optional()
}

fn read_message_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        source: row.get(1)?,
        text: row.get(2)?,
        username: row.get(3)?,
        tg_msg_id: row.get(4)?,
        dc_msg_id: row.get(5)?,
        reply_to_id: row.get(6)?,
        reply_to_tg_id: row.get(7)?,
        reply_to_dc_id: row.get(8)?,
        created_at: row.get(9)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bindsync_types::message::Source;
    use uuid::Uuid;

    fn open_store() -> (Database, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("bindsync.db")).unwrap();
        (db, dir)
    }

    fn new_message(source: Source, text: &str) -> NewMessage {
        NewMessage {
            id: Uuid::new_v4(),
            source,
            text: text.to_string(),
            username: "alice".to_string(),
            tg_msg_id: None,
            dc_msg_id: None,
            reply_to_id: None,
            reply_to_tg_id: None,
            reply_to_dc_id: None,
        }
    }

    #[test]
    fn insert_and_get_roundtrip() {
        let (db, _dir) = open_store();

        let mut msg = new_message(Source::Telegram, "hello");
        msg.tg_msg_id = Some(100);
        db.insert_message(&msg).unwrap();

        let row = db.get_message(&msg.id.to_string()).unwrap().unwrap();
        assert_eq!(row.source, "telegram");
        assert_eq!(row.text, "hello");
        assert_eq!(row.tg_msg_id, Some(100));
        assert_eq!(row.dc_msg_id, None);

        let found = db.find_by_tg_id(100).unwrap().unwrap();
        assert_eq!(found.id, msg.id.to_string());
        assert!(db.find_by_tg_id(999).unwrap().is_none());
        assert!(db.get_message("not-a-real-id").unwrap().is_none());
    }

    #[test]
    fn native_id_setters_are_write_once() {
        let (db, _dir) = open_store();

        let msg = new_message(Source::Api, "cross-posted");
        db.insert_message(&msg).unwrap();
        let id = msg.id.to_string();

        db.set_dc_id(&id, 555).unwrap();
        // Second write with a different value must lose.
        db.set_dc_id(&id, 777).unwrap();

        let row = db.get_message(&id).unwrap().unwrap();
        assert_eq!(row.dc_msg_id, Some(555));

        // The other field is independent and still writable.
        db.set_tg_id(&id, 42).unwrap();
        let row = db.get_message(&id).unwrap().unwrap();
        assert_eq!(row.tg_msg_id, Some(42));
        assert_eq!(row.dc_msg_id, Some(555));
    }

    #[test]
    fn set_native_id_on_missing_message_errors() {
        let (db, _dir) = open_store();
        assert!(db.set_tg_id(&Uuid::new_v4().to_string(), 1).is_err());
    }

    #[test]
    fn list_is_most_recent_first_with_offset() {
        let (db, _dir) = open_store();

        for i in 0..5 {
            db.insert_message(&new_message(Source::Api, &format!("m{}", i)))
                .unwrap();
        }

        let page = db.list_messages(2, 0).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].text, "m4");
        assert_eq!(page[1].text, "m3");

        let page = db.list_messages(2, 4).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].text, "m0");
    }
}
