use anyhow::Result;
use rusqlite::Connection;

use crate::Database;
use crate::models::SettingsRow;

/// Partial settings mutation — None fields keep their current value.
#[derive(Debug, Default)]
pub struct SettingsPatch {
    pub rules: Option<String>,
    pub daily_topic: Option<String>,
    pub filter_words: Option<Vec<String>>,
    pub group_retention_hours: Option<i64>,
    pub private_retention_hours: Option<i64>,
}

impl Database {
    pub fn get_settings(&self) -> Result<SettingsRow> {
        self.with_conn(query_settings)
    }

    /// Apply a partial update to the singleton row and return the full
    /// updated record. Last write wins; readers observe the latest
    /// committed value.
    pub fn update_settings(&self, patch: &SettingsPatch) -> Result<SettingsRow> {
        let words_json = match &patch.filter_words {
            Some(words) => Some(serde_json::to_string(words)?),
            None => None,
        };

        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE settings SET
                     rules                   = COALESCE(?1, rules),
                     daily_topic             = COALESCE(?2, daily_topic),
                     filter_words            = COALESCE(?3, filter_words),
                     group_retention_hours   = COALESCE(?4, group_retention_hours),
                     private_retention_hours = COALESCE(?5, private_retention_hours)
                 WHERE id = 1",
                rusqlite::params![
                    patch.rules,
                    patch.daily_topic,
                    words_json,
                    patch.group_retention_hours,
                    patch.private_retention_hours,
                ],
            )?;
            query_settings(conn)
        })
    }
}

fn query_settings(conn: &Connection) -> Result<SettingsRow> {
    let (rules, daily_topic, words_json, group_hours, private_hours) = conn.query_row(
        "SELECT rules, daily_topic, filter_words, group_retention_hours, private_retention_hours
         FROM settings WHERE id = 1",
        [],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
            ))
        },
    )?;

    let filter_words: Vec<String> = serde_json::from_str(&words_json).unwrap_or_else(|e| {
        tracing::warn!("Corrupt filter_words '{}': {}", words_json, e);
        Vec::new()
    });

    Ok(SettingsRow {
        rules,
        daily_topic,
        filter_words,
        group_retention_hours: group_hours,
        private_retention_hours: private_hours,
    })
}

#[cfg(test)]
mod tests {
    use super::SettingsPatch;
    use crate::Database;

    #[test]
    fn seeded_defaults() {
        let db = Database::open_in_memory().unwrap();
        let settings = db.get_settings().unwrap();

        assert!(settings.filter_words.is_empty());
        assert_eq!(settings.group_retention_hours, 24);
        assert_eq!(settings.private_retention_hours, 48);
    }

    #[test]
    fn partial_update_keeps_other_fields() {
        let db = Database::open_in_memory().unwrap();

        let updated = db
            .update_settings(&SettingsPatch {
                filter_words: Some(vec!["spam".to_string()]),
                group_retention_hours: Some(1),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(updated.filter_words, vec!["spam".to_string()]);
        assert_eq!(updated.group_retention_hours, 1);
        assert_eq!(updated.private_retention_hours, 48);
        assert_eq!(updated.rules, "House rules will be posted here.");

        // Visible to a plain subsequent read.
        let read_back = db.get_settings().unwrap();
        assert_eq!(read_back.filter_words, vec!["spam".to_string()]);
    }

    #[test]
    fn empty_patch_is_a_noop() {
        let db = Database::open_in_memory().unwrap();
        let before = db.get_settings().unwrap();
        let after = db.update_settings(&SettingsPatch::default()).unwrap();
        assert_eq!(before.rules, after.rules);
        assert_eq!(before.group_retention_hours, after.group_retention_hours);
    }
}
