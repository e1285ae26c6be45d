use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS members (
            id          TEXT PRIMARY KEY,
            email       TEXT NOT NULL UNIQUE,
            phone       TEXT NOT NULL,
            full_name   TEXT NOT NULL,
            faculty     TEXT NOT NULL,
            degree      TEXT NOT NULL,
            course      TEXT NOT NULL,
            avatar      TEXT,
            password    TEXT NOT NULL,
            is_active   INTEGER NOT NULL DEFAULT 1,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS blocks (
            member_id   TEXT NOT NULL REFERENCES members(id),
            blocked_id  TEXT NOT NULL REFERENCES members(id),
            created_at  TEXT NOT NULL,
            PRIMARY KEY (member_id, blocked_id),
            CHECK (member_id != blocked_id)
        );

        CREATE TABLE IF NOT EXISTS moderators (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            is_super    INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS messages (
            id          TEXT PRIMARY KEY,
            sender_id   TEXT NOT NULL REFERENCES members(id),
            faculty     TEXT,
            receiver_id TEXT REFERENCES members(id),
            content     TEXT NOT NULL,
            kind        TEXT NOT NULL CHECK (kind IN ('group', 'private')),
            created_at  TEXT NOT NULL,
            CHECK ((kind = 'group') = (faculty IS NOT NULL)),
            CHECK ((kind = 'private') = (receiver_id IS NOT NULL))
        );

        CREATE INDEX IF NOT EXISTS idx_messages_faculty
            ON messages(faculty, created_at);
        CREATE INDEX IF NOT EXISTS idx_messages_private
            ON messages(sender_id, receiver_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_messages_retention
            ON messages(kind, created_at);

        CREATE TABLE IF NOT EXISTS reports (
            id          TEXT PRIMARY KEY,
            reported_id TEXT NOT NULL REFERENCES members(id),
            reporter_id TEXT NOT NULL REFERENCES members(id),
            reason      TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_reports_reported
            ON reports(reported_id);

        -- Singleton settings row
        CREATE TABLE IF NOT EXISTS settings (
            id                      INTEGER PRIMARY KEY CHECK (id = 1),
            rules                   TEXT NOT NULL,
            daily_topic             TEXT NOT NULL,
            filter_words            TEXT NOT NULL,
            group_retention_hours   INTEGER NOT NULL,
            private_retention_hours INTEGER NOT NULL
        );

        INSERT OR IGNORE INTO settings
            (id, rules, daily_topic, filter_words, group_retention_hours, private_retention_hours)
            VALUES (1, 'House rules will be posted here.', '', '[]', 24, 48);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
