use anyhow::Result;
use rusqlite::Connection;

use crate::models::ModeratorRow;
use crate::{Database, OptionalExt};

/// Outcome of a moderator delete attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum DeleteModerator {
    Deleted,
    NotFound,
    /// The super moderator can never be deleted.
    IsSuper,
}

impl Database {
    /// Idempotent bootstrap: creates the super moderator if no super
    /// row exists yet. Returns true if a row was created.
    pub fn ensure_super_moderator(
        &self,
        id: &str,
        username: &str,
        password_hash: &str,
        created_at: &str,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM moderators WHERE is_super = 1)",
                [],
                |row| row.get(0),
            )?;
            if exists {
                return Ok(false);
            }
            conn.execute(
                "INSERT INTO moderators (id, username, password, is_super, created_at)
                 VALUES (?1, ?2, ?3, 1, ?4)",
                [id, username, password_hash, created_at],
            )?;
            Ok(true)
        })
    }

    pub fn create_moderator(
        &self,
        id: &str,
        username: &str,
        password_hash: &str,
        created_at: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO moderators (id, username, password, is_super, created_at)
                 VALUES (?1, ?2, ?3, 0, ?4)",
                [id, username, password_hash, created_at],
            )?;
            Ok(())
        })
    }

    pub fn get_moderator_by_username(&self, username: &str) -> Result<Option<ModeratorRow>> {
        self.with_conn(|conn| query_moderator(conn, "username", username))
    }

    pub fn get_moderator_by_id(&self, id: &str) -> Result<Option<ModeratorRow>> {
        self.with_conn(|conn| query_moderator(conn, "id", id))
    }

    pub fn list_moderators(&self) -> Result<Vec<ModeratorRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, username, password, is_super, created_at
                 FROM moderators ORDER BY created_at",
            )?;
            let rows = stmt
                .query_map([], moderator_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Delete a non-super moderator. The guard against deleting the
    /// super moderator lives here, under the same lock as the delete.
    pub fn delete_moderator(&self, id: &str) -> Result<DeleteModerator> {
        self.with_conn_mut(|conn| {
            let existing = query_moderator(conn, "id", id)?;
            match existing {
                None => Ok(DeleteModerator::NotFound),
                Some(row) if row.is_super => Ok(DeleteModerator::IsSuper),
                Some(_) => {
                    conn.execute("DELETE FROM moderators WHERE id = ?1 AND is_super = 0", [id])?;
                    Ok(DeleteModerator::Deleted)
                }
            }
        })
    }
}

fn query_moderator(conn: &Connection, col: &str, value: &str) -> Result<Option<ModeratorRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, username, password, is_super, created_at FROM moderators WHERE {col} = ?1"
    ))?;
    let row = stmt.query_row([value], moderator_from_row).optional()?;
    Ok(row)
}

fn moderator_from_row(row: &rusqlite::Row) -> rusqlite::Result<ModeratorRow> {
    Ok(ModeratorRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        is_super: row.get(3)?,
        created_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::DeleteModerator;
    use crate::Database;

    const TS: &str = "2026-01-01T00:00:00.000Z";

    #[test]
    fn bootstrap_is_idempotent() {
        let db = Database::open_in_memory().unwrap();

        assert!(db.ensure_super_moderator("s1", "root", "hash", TS).unwrap());
        assert!(!db.ensure_super_moderator("s2", "root2", "hash", TS).unwrap());

        let mods = db.list_moderators().unwrap();
        assert_eq!(mods.len(), 1);
        assert!(mods[0].is_super);
        assert_eq!(mods[0].username, "root");
    }

    #[test]
    fn super_moderator_cannot_be_deleted() {
        let db = Database::open_in_memory().unwrap();
        db.ensure_super_moderator("s1", "root", "hash", TS).unwrap();

        assert_eq!(db.delete_moderator("s1").unwrap(), DeleteModerator::IsSuper);
        assert!(db.get_moderator_by_id("s1").unwrap().is_some());
    }

    #[test]
    fn sub_moderator_lifecycle() {
        let db = Database::open_in_memory().unwrap();
        db.ensure_super_moderator("s1", "root", "hash", TS).unwrap();
        db.create_moderator("mod1", "helper", "hash", TS).unwrap();

        let found = db.get_moderator_by_username("helper").unwrap().unwrap();
        assert!(!found.is_super);

        assert_eq!(db.delete_moderator("mod1").unwrap(), DeleteModerator::Deleted);
        assert_eq!(db.delete_moderator("mod1").unwrap(), DeleteModerator::NotFound);
    }

    #[test]
    fn duplicate_username_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.create_moderator("mod1", "helper", "hash", TS).unwrap();
        assert!(db.create_moderator("mod2", "helper", "hash", TS).is_err());
    }
}
