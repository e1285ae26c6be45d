use anyhow::Result;

use crate::Database;
use crate::messages::profile_at;
use crate::models::ReportedMemberRow;

impl Database {
    /// Append-only: reports are never mutated or deleted.
    pub fn insert_report(
        &self,
        id: &str,
        reported_id: &str,
        reporter_id: &str,
        reason: &str,
        created_at: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO reports (id, reported_id, reporter_id, reason, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                [id, reported_id, reporter_id, reason, created_at],
            )?;
            Ok(())
        })
    }

    /// Moderation triage: members with at least `min_count` reports,
    /// most-reported first.
    pub fn reported_members(&self, min_count: i64) -> Result<Vec<ReportedMemberRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.full_name, u.faculty, u.degree, u.course, u.avatar,
                        COUNT(*) AS report_count
                 FROM reports r
                 JOIN members u ON r.reported_id = u.id
                 GROUP BY r.reported_id
                 HAVING COUNT(*) >= ?1
                 ORDER BY report_count DESC",
            )?;
            let rows = stmt
                .query_map([min_count], |row| {
                    Ok(ReportedMemberRow {
                        member: profile_at(row, 0)?,
                        report_count: row.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}
