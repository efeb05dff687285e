use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use beacon_shared::types::{Message, WalletAddress};

use crate::database::Database;
use crate::error::Result;

impl Database {
    /// Insert a new message. The id and creation timestamp are assigned here;
    /// the caller has already checked the global/receiver invariant.
    pub fn insert_message(
        &self,
        content: &str,
        sender: &WalletAddress,
        receiver: Option<&WalletAddress>,
        is_global: bool,
    ) -> Result<Message> {
        let message = Message {
            id: Uuid::new_v4(),
            content: content.to_string(),
            sender_address: sender.clone(),
            receiver_address: receiver.cloned(),
            created_at: Utc::now(),
            is_global,
        };

        self.conn().execute(
            "INSERT INTO messages (id, content, sender_address, receiver_address, created_at, is_global)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                message.id.to_string(),
                message.content,
                message.sender_address.as_str(),
                message.receiver_address.as_ref().map(|a| a.as_str()),
                message.created_at.to_rfc3339(),
                message.is_global,
            ],
        )?;
        Ok(message)
    }

    /// The global stream, ascending by creation time.
    pub fn list_global_messages(&self) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, content, sender_address, receiver_address, created_at, is_global
             FROM messages
             WHERE is_global = 1
             ORDER BY created_at, id",
        )?;

        let rows = stmt.query_map([], row_to_message)?;
        collect(rows)
    }

    /// The direct conversation between exactly the unordered pair `{a, b}`,
    /// ascending by creation time. This is a precise pairwise predicate; it
    /// never matches messages either party exchanged with a third address.
    pub fn list_direct_messages(
        &self,
        a: &WalletAddress,
        b: &WalletAddress,
    ) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, content, sender_address, receiver_address, created_at, is_global
             FROM messages
             WHERE is_global = 0
               AND ((sender_address = ?1 AND receiver_address = ?2)
                 OR (sender_address = ?2 AND receiver_address = ?1))
             ORDER BY created_at, id",
        )?;

        let rows = stmt.query_map(params![a.as_str(), b.as_str()], row_to_message)?;
        collect(rows)
    }
}

fn collect(
    rows: impl Iterator<Item = rusqlite::Result<Message>>,
) -> Result<Vec<Message>> {
    let mut messages = Vec::new();
    for row in rows {
        messages.push(row?);
    }
    Ok(messages)
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let id_str: String = row.get(0)?;
    let content: String = row.get(1)?;
    let sender_str: String = row.get(2)?;
    let receiver_str: Option<String> = row.get(3)?;
    let ts_str: String = row.get(4)?;
    let is_global: bool = row.get(5)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let sender_address = WalletAddress::parse(&sender_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let receiver_address = match receiver_str {
        Some(s) => Some(WalletAddress::parse(&s).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?),
        None => None,
    };

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&ts_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Message {
        id,
        content,
        sender_address,
        receiver_address,
        created_at,
        is_global,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(seed: u8) -> WalletAddress {
        WalletAddress::from_pubkey(&[seed; 32])
    }

    #[test]
    fn global_and_direct_are_partitioned() {
        let db = Database::open_in_memory().unwrap();
        let a = addr(1);
        let b = addr(2);

        db.insert_message("help", &a, None, true).unwrap();
        db.insert_message("hi b", &a, Some(&b), false).unwrap();

        let global = db.list_global_messages().unwrap();
        assert_eq!(global.len(), 1);
        assert_eq!(global[0].content, "help");
        assert!(global[0].is_global);
        assert!(global[0].receiver_address.is_none());

        let direct = db.list_direct_messages(&a, &b).unwrap();
        assert_eq!(direct.len(), 1);
        assert_eq!(direct[0].content, "hi b");
    }

    #[test]
    fn direct_query_is_symmetric_and_excludes_third_parties() {
        let db = Database::open_in_memory().unwrap();
        let a = addr(1);
        let b = addr(2);
        let c = addr(3);

        db.insert_message("a to b", &a, Some(&b), false).unwrap();
        db.insert_message("b to a", &b, Some(&a), false).unwrap();
        // Both a and c appear in rows opposite b; none of these may leak
        // into the a<->b view.
        db.insert_message("a to c", &a, Some(&c), false).unwrap();
        db.insert_message("c to b", &c, Some(&b), false).unwrap();

        let ab = db.list_direct_messages(&a, &b).unwrap();
        let ba = db.list_direct_messages(&b, &a).unwrap();
        assert_eq!(ab, ba);
        assert_eq!(ab.len(), 2);
        assert!(ab.iter().all(|m| {
            let r = m.receiver_address.as_ref().unwrap();
            (m.sender_address == a && *r == b) || (m.sender_address == b && *r == a)
        }));
    }

    #[test]
    fn messages_come_back_in_creation_order() {
        let db = Database::open_in_memory().unwrap();
        let a = addr(1);

        for i in 0..5 {
            db.insert_message(&format!("m{i}"), &a, None, true).unwrap();
        }

        let global = db.list_global_messages().unwrap();
        let contents: Vec<_> = global.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["m0", "m1", "m2", "m3", "m4"]);

        let mut sorted = global.clone();
        sorted.sort_by(|x, y| x.created_at.cmp(&y.created_at).then(x.id.cmp(&y.id)));
        assert_eq!(sorted, global);
    }

    #[test]
    fn schema_rejects_malformed_rows() {
        let db = Database::open_in_memory().unwrap();
        // is_global with a receiver violates the table CHECK constraint.
        let result = db.conn().execute(
            "INSERT INTO messages (id, content, sender_address, receiver_address, created_at, is_global)
             VALUES ('x', 'bad', '0xaa', '0xbb', '2026-01-01T00:00:00Z', 1)",
            [],
        );
        assert!(result.is_err());
    }
}
