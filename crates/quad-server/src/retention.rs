use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use quad_db::Database;
use quad_db::messages::MessageKind;

/// Sweep period: fixed one hour wall-clock, no jitter or backoff.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Background task that deletes messages past their retention window.
/// A failed sweep is logged and the next scheduled run proceeds
/// independently — no retry within a cycle.
pub async fn run_retention_loop(db: Arc<Database>) {
    let mut interval = tokio::time::interval(SWEEP_INTERVAL);

    loop {
        interval.tick().await;

        let db = db.clone();
        match tokio::task::spawn_blocking(move || sweep(&db, Utc::now())).await {
            Ok(Ok((group, private))) => {
                if group + private > 0 {
                    info!(
                        "Retention sweep removed {} group and {} private messages",
                        group, private
                    );
                }
            }
            Ok(Err(e)) => warn!("Retention sweep error: {}", e),
            Err(e) => warn!("Retention sweep join error: {}", e),
        }
    }
}

/// One sweep pass with an injected clock: read the current retention
/// thresholds, compute both cutoffs, delete everything older. A
/// threshold of zero hours makes every message immediately eligible.
pub fn sweep(db: &Database, now: DateTime<Utc>) -> anyhow::Result<(usize, usize)> {
    let settings = db.get_settings()?;

    let group_cutoff =
        quad_db::timestamp(now - chrono::Duration::hours(settings.group_retention_hours));
    let private_cutoff =
        quad_db::timestamp(now - chrono::Duration::hours(settings.private_retention_hours));

    let group = db.delete_messages_older_than(MessageKind::Group, &group_cutoff)?;
    let private = db.delete_messages_older_than(MessageKind::Private, &private_cutoff)?;
    Ok((group, private))
}

#[cfg(test)]
mod tests {
    use super::sweep;
    use chrono::{Duration, Utc};
    use quad_db::Database;
    use quad_db::messages::MessageKind;
    use quad_db::models::MemberRow;
    use quad_db::settings::SettingsPatch;

    fn add_member(db: &Database, id: &str) {
        db.create_member(&MemberRow {
            id: id.to_string(),
            email: format!("{}@uni.edu", id),
            phone: id.to_string(),
            full_name: id.to_string(),
            faculty: "physics".to_string(),
            degree: "bachelor".to_string(),
            course: "2".to_string(),
            avatar: None,
            password: "hash".to_string(),
            is_active: true,
            created_at: quad_db::timestamp(Utc::now()),
        })
        .unwrap();
    }

    fn group_msg(db: &Database, id: &str, age: Duration) {
        let at = quad_db::timestamp(Utc::now() - age);
        db.insert_message(id, "m1", Some("physics"), None, "hi", MessageKind::Group, &at)
            .unwrap();
    }

    fn private_msg(db: &Database, id: &str, age: Duration) {
        let at = quad_db::timestamp(Utc::now() - age);
        db.insert_message(id, "m1", None, Some("m2"), "hi", MessageKind::Private, &at)
            .unwrap();
    }

    #[test]
    fn sweep_removes_only_expired_messages() {
        let db = Database::open_in_memory().unwrap();
        add_member(&db, "m1");
        add_member(&db, "m2");
        db.update_settings(&SettingsPatch {
            group_retention_hours: Some(1),
            private_retention_hours: Some(48),
            ..Default::default()
        })
        .unwrap();

        group_msg(&db, "g-old", Duration::hours(2));
        group_msg(&db, "g-new", Duration::minutes(30));
        private_msg(&db, "p-old", Duration::hours(2));

        let (group, private) = sweep(&db, Utc::now()).unwrap();
        assert_eq!(group, 1);
        assert_eq!(private, 0);

        // The expired message is gone from subsequent history reads.
        let history = db.group_history("physics", "m2").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, "g-new");
    }

    #[test]
    fn zero_retention_means_immediate_eligibility() {
        let db = Database::open_in_memory().unwrap();
        add_member(&db, "m1");
        add_member(&db, "m2");
        db.update_settings(&SettingsPatch {
            private_retention_hours: Some(0),
            ..Default::default()
        })
        .unwrap();

        private_msg(&db, "p1", Duration::seconds(1));

        let (_, private) = sweep(&db, Utc::now()).unwrap();
        assert_eq!(private, 1);
    }

    #[test]
    fn sweep_with_nothing_expired_is_a_noop() {
        let db = Database::open_in_memory().unwrap();
        add_member(&db, "m1");
        group_msg(&db, "g1", Duration::minutes(5));

        let (group, private) = sweep(&db, Utc::now()).unwrap();
        assert_eq!((group, private), (0, 0));
        assert_eq!(db.message_count().unwrap(), 1);
    }
}
