use anyhow::Result;
use rusqlite::Connection;

use crate::models::MemberRow;
use crate::{Database, OptionalExt};

impl Database {
    pub fn create_member(&self, row: &MemberRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO members
                 (id, email, phone, full_name, faculty, degree, course, avatar, password, is_active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                rusqlite::params![
                    row.id,
                    row.email,
                    row.phone,
                    row.full_name,
                    row.faculty,
                    row.degree,
                    row.course,
                    row.avatar,
                    row.password,
                    row.is_active,
                    row.created_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_member_by_id(&self, id: &str) -> Result<Option<MemberRow>> {
        self.with_conn(|conn| query_member(conn, "id", id))
    }

    pub fn get_member_by_email(&self, email: &str) -> Result<Option<MemberRow>> {
        self.with_conn(|conn| query_member(conn, "email", email))
    }

    /// Registration duplicate check: a member already using this email
    /// or phone number.
    pub fn find_member_by_email_or_phone(&self, email: &str, phone: &str) -> Result<Option<MemberRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MEMBER_COLS} FROM members WHERE email = ?1 OR phone = ?2"
            ))?;
            let row = stmt
                .query_row([email, phone], member_from_row)
                .optional()?;
            Ok(row)
        })
    }

    pub fn list_members(&self) -> Result<Vec<MemberRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MEMBER_COLS} FROM members ORDER BY created_at"
            ))?;
            let rows = stmt
                .query_map([], member_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Partial profile update: absent fields keep their current value.
    pub fn update_member_profile(
        &self,
        id: &str,
        full_name: Option<&str>,
        faculty: Option<&str>,
        degree: Option<&str>,
        course: Option<&str>,
    ) -> Result<Option<MemberRow>> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE members SET
                     full_name = COALESCE(?2, full_name),
                     faculty   = COALESCE(?3, faculty),
                     degree    = COALESCE(?4, degree),
                     course    = COALESCE(?5, course)
                 WHERE id = ?1",
                rusqlite::params![id, full_name, faculty, degree, course],
            )?;
            query_member(conn, "id", id)
        })
    }

    /// Flip the active flag. Returns the new state, or None if the
    /// member does not exist.
    pub fn toggle_member_active(&self, id: &str) -> Result<Option<bool>> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE members SET is_active = NOT is_active WHERE id = ?1",
                [id],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            let active: bool =
                conn.query_row("SELECT is_active FROM members WHERE id = ?1", [id], |row| {
                    row.get(0)
                })?;
            Ok(Some(active))
        })
    }

    // -- Blocks --

    pub fn add_block(&self, member_id: &str, blocked_id: &str, created_at: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO blocks (member_id, blocked_id, created_at) VALUES (?1, ?2, ?3)",
                [member_id, blocked_id, created_at],
            )?;
            Ok(())
        })
    }

    pub fn remove_block(&self, member_id: &str, blocked_id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "DELETE FROM blocks WHERE member_id = ?1 AND blocked_id = ?2",
                [member_id, blocked_id],
            )?;
            Ok(())
        })
    }

    /// Has `member_id` blocked `other_id`?
    pub fn is_blocked(&self, member_id: &str, other_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM blocks WHERE member_id = ?1 AND blocked_id = ?2)",
                [member_id, other_id],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    /// Everyone who has blocked the given member. Used by the delivery
    /// engine to suppress group fan-out to those members' connections.
    pub fn blockers_of(&self, member_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT member_id FROM blocks WHERE blocked_id = ?1")?;
            let ids = stmt
                .query_map([member_id], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(ids)
        })
    }
}

pub(crate) const MEMBER_COLS: &str =
    "id, email, phone, full_name, faculty, degree, course, avatar, password, is_active, created_at";

pub(crate) fn member_from_row(row: &rusqlite::Row) -> rusqlite::Result<MemberRow> {
    Ok(MemberRow {
        id: row.get(0)?,
        email: row.get(1)?,
        phone: row.get(2)?,
        full_name: row.get(3)?,
        faculty: row.get(4)?,
        degree: row.get(5)?,
        course: row.get(6)?,
        avatar: row.get(7)?,
        password: row.get(8)?,
        is_active: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn query_member(conn: &Connection, col: &str, value: &str) -> Result<Option<MemberRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MEMBER_COLS} FROM members WHERE {col} = ?1"
    ))?;
    let row = stmt.query_row([value], member_from_row).optional()?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use crate::Database;
    use crate::testutil::member;

    #[test]
    fn create_and_lookup() {
        let db = Database::open_in_memory().unwrap();
        db.create_member(&member("m1", "a@uni.edu")).unwrap();

        let by_id = db.get_member_by_id("m1").unwrap().unwrap();
        assert_eq!(by_id.email, "a@uni.edu");
        assert!(by_id.is_active);

        let by_email = db.get_member_by_email("a@uni.edu").unwrap().unwrap();
        assert_eq!(by_email.id, "m1");

        assert!(db.get_member_by_id("nope").unwrap().is_none());
    }

    #[test]
    fn duplicate_email_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.create_member(&member("m1", "a@uni.edu")).unwrap();
        assert!(db.create_member(&member("m2", "a@uni.edu")).is_err());
    }

    #[test]
    fn email_or_phone_match() {
        let db = Database::open_in_memory().unwrap();
        db.create_member(&member("m1", "a@uni.edu")).unwrap();

        assert!(db.find_member_by_email_or_phone("a@uni.edu", "other").unwrap().is_some());
        assert!(db.find_member_by_email_or_phone("other@uni.edu", "+994-m1").unwrap().is_some());
        assert!(db.find_member_by_email_or_phone("other@uni.edu", "other").unwrap().is_none());
    }

    #[test]
    fn partial_profile_update() {
        let db = Database::open_in_memory().unwrap();
        db.create_member(&member("m1", "a@uni.edu")).unwrap();

        let updated = db
            .update_member_profile("m1", Some("New Name"), None, None, Some("3"))
            .unwrap()
            .unwrap();
        assert_eq!(updated.full_name, "New Name");
        assert_eq!(updated.faculty, "physics");
        assert_eq!(updated.course, "3");
    }

    #[test]
    fn toggle_active_flips() {
        let db = Database::open_in_memory().unwrap();
        db.create_member(&member("m1", "a@uni.edu")).unwrap();

        assert_eq!(db.toggle_member_active("m1").unwrap(), Some(false));
        assert_eq!(db.toggle_member_active("m1").unwrap(), Some(true));
        assert_eq!(db.toggle_member_active("ghost").unwrap(), None);
    }

    #[test]
    fn block_unblock_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        db.create_member(&member("m1", "a@uni.edu")).unwrap();
        db.create_member(&member("m2", "b@uni.edu")).unwrap();

        db.add_block("m1", "m2", "2026-01-01T00:00:00.000Z").unwrap();
        assert!(db.is_blocked("m1", "m2").unwrap());
        assert!(!db.is_blocked("m2", "m1").unwrap());
        assert_eq!(db.blockers_of("m2").unwrap(), vec!["m1".to_string()]);

        // Idempotent re-block
        db.add_block("m1", "m2", "2026-01-01T00:00:00.000Z").unwrap();

        db.remove_block("m1", "m2").unwrap();
        assert!(!db.is_blocked("m1", "m2").unwrap());
        assert!(db.blockers_of("m2").unwrap().is_empty());
    }

    #[test]
    fn self_block_rejected_by_schema() {
        let db = Database::open_in_memory().unwrap();
        db.create_member(&member("m1", "a@uni.edu")).unwrap();
        assert!(db.add_block("m1", "m1", "2026-01-01T00:00:00.000Z").is_err());
    }
}
