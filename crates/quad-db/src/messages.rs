use anyhow::Result;

use crate::Database;
use crate::models::{GroupMessageRow, PrivateMessageRow, ProfileRow};

/// History reads return at most this many messages, oldest first.
pub const HISTORY_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Group,
    Private,
}

impl MessageKind {
    fn as_str(self) -> &'static str {
        match self {
            MessageKind::Group => "group",
            MessageKind::Private => "private",
        }
    }
}

impl Database {
    /// Append a message. The caller assigns id and timestamp so the
    /// clock stays injectable; exactly one of faculty/receiver_id must
    /// be set, enforced by the schema.
    pub fn insert_message(
        &self,
        id: &str,
        sender_id: &str,
        faculty: Option<&str>,
        receiver_id: Option<&str>,
        content: &str,
        kind: MessageKind,
        created_at: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO messages (id, sender_id, faculty, receiver_id, content, kind, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![id, sender_id, faculty, receiver_id, content, kind.as_str(), created_at],
            )?;
            Ok(())
        })
    }

    /// The most recent `HISTORY_LIMIT` group messages for a faculty
    /// room, ascending chronological order, sender profile joined in.
    /// Messages from senders the viewer has blocked are filtered out
    /// at read time, independent of live fan-out suppression.
    pub fn group_history(&self, faculty: &str, viewer_id: &str) -> Result<Vec<GroupMessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.faculty, m.content, m.created_at,
                        s.id, s.full_name, s.faculty, s.degree, s.course, s.avatar
                 FROM messages m
                 JOIN members s ON m.sender_id = s.id
                 WHERE m.kind = 'group' AND m.faculty = ?1
                   AND m.sender_id NOT IN
                       (SELECT blocked_id FROM blocks WHERE member_id = ?2)
                 ORDER BY m.created_at DESC
                 LIMIT ?3",
            )?;

            let mut rows = stmt
                .query_map(rusqlite::params![faculty, viewer_id, HISTORY_LIMIT], |row| {
                    Ok(GroupMessageRow {
                        id: row.get(0)?,
                        faculty: row.get(1)?,
                        content: row.get(2)?,
                        created_at: row.get(3)?,
                        sender: profile_at(row, 4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            // Query newest-first to apply the limit, serve oldest-first.
            rows.reverse();
            Ok(rows)
        })
    }

    /// The most recent `HISTORY_LIMIT` private messages exchanged
    /// between exactly these two members, ascending order, both
    /// profiles joined in. No block filtering on private history.
    pub fn private_history(&self, a: &str, b: &str) -> Result<Vec<PrivateMessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.content, m.created_at,
                        s.id, s.full_name, s.faculty, s.degree, s.course, s.avatar,
                        r.id, r.full_name, r.faculty, r.degree, r.course, r.avatar
                 FROM messages m
                 JOIN members s ON m.sender_id = s.id
                 JOIN members r ON m.receiver_id = r.id
                 WHERE m.kind = 'private'
                   AND ((m.sender_id = ?1 AND m.receiver_id = ?2)
                     OR (m.sender_id = ?2 AND m.receiver_id = ?1))
                 ORDER BY m.created_at DESC
                 LIMIT ?3",
            )?;

            let mut rows = stmt
                .query_map(rusqlite::params![a, b, HISTORY_LIMIT], |row| {
                    Ok(PrivateMessageRow {
                        id: row.get(0)?,
                        content: row.get(1)?,
                        created_at: row.get(2)?,
                        sender: profile_at(row, 3)?,
                        receiver: profile_at(row, 9)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.reverse();
            Ok(rows)
        })
    }

    /// Retention delete. Returns the number of rows removed.
    pub fn delete_messages_older_than(&self, kind: MessageKind, cutoff: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute(
                "DELETE FROM messages WHERE kind = ?1 AND created_at < ?2",
                [kind.as_str(), cutoff],
            )?;
            Ok(removed)
        })
    }

    /// Stored group message count for one room. Used by tests and the
    /// delivery engine's property checks.
    pub fn group_message_count(&self, faculty: &str) -> Result<i64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE kind = 'group' AND faculty = ?1",
                [faculty],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    pub fn message_count(&self) -> Result<i64> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
            Ok(count)
        })
    }
}

pub(crate) fn profile_at(row: &rusqlite::Row, base: usize) -> rusqlite::Result<ProfileRow> {
    Ok(ProfileRow {
        id: row.get(base)?,
        full_name: row.get(base + 1)?,
        faculty: row.get(base + 2)?,
        degree: row.get(base + 3)?,
        course: row.get(base + 4)?,
        avatar: row.get(base + 5)?,
    })
}
