use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: i64 = 1;

pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;

    // Force-checkpoint stale WAL data into the main DB on open.
    // Errors are non-fatal - in-memory DBs legitimately fail this.
    if conn
        .execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
        .is_ok()
    {
        tracing::debug!("startup WAL checkpoint complete");
    }

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS parts (
            idx             INTEGER PRIMARY KEY,
            enabled         INTEGER NOT NULL DEFAULT 1,
            frame           TEXT NOT NULL,
            contd_period_ms INTEGER NOT NULL,
            contd_smoothing INTEGER NOT NULL,
            next_gesture_id INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS gestures (
            part_idx INTEGER NOT NULL REFERENCES parts(idx),
            id       INTEGER NOT NULL,
            name     TEXT NOT NULL,
            enabled  INTEGER NOT NULL DEFAULT 1,
            metadata TEXT NOT NULL DEFAULT '',
            PRIMARY KEY (part_idx, id)
        );

        CREATE TABLE IF NOT EXISTS samples (
            part_idx   INTEGER NOT NULL,
            gesture_id INTEGER NOT NULL,
            sample_idx INTEGER NOT NULL,
            hmd_px REAL NOT NULL, hmd_py REAL NOT NULL, hmd_pz REAL NOT NULL,
            hmd_qw REAL NOT NULL, hmd_qx REAL NOT NULL,
            hmd_qy REAL NOT NULL, hmd_qz REAL NOT NULL,
            PRIMARY KEY (part_idx, gesture_id, sample_idx),
            FOREIGN KEY (part_idx, gesture_id) REFERENCES gestures(part_idx, id)
        );

        CREATE TABLE IF NOT EXISTS frames (
            part_idx   INTEGER NOT NULL,
            gesture_id INTEGER NOT NULL,
            sample_idx INTEGER NOT NULL,
            processed  INTEGER NOT NULL,
            frame_idx  INTEGER NOT NULL,
            px REAL NOT NULL, py REAL NOT NULL, pz REAL NOT NULL,
            qw REAL NOT NULL, qx REAL NOT NULL, qy REAL NOT NULL, qz REAL NOT NULL,
            hpx REAL NOT NULL, hpy REAL NOT NULL, hpz REAL NOT NULL,
            hqw REAL NOT NULL, hqx REAL NOT NULL, hqy REAL NOT NULL, hqz REAL NOT NULL,
            t REAL NOT NULL,
            PRIMARY KEY (part_idx, gesture_id, sample_idx, processed, frame_idx)
        );

        CREATE TABLE IF NOT EXISTS models (
            part_idx    INTEGER PRIMARY KEY REFERENCES parts(idx),
            resolution  INTEGER NOT NULL,
            temperature REAL NOT NULL,
            score       REAL NOT NULL,
            stale       INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS prototypes (
            part_idx   INTEGER NOT NULL,
            gesture_id INTEGER NOT NULL,
            sigma      REAL NOT NULL,
            mean       TEXT NOT NULL,
            PRIMARY KEY (part_idx, gesture_id)
        );

        CREATE TABLE IF NOT EXISTS combinations (
            id       INTEGER PRIMARY KEY,
            name     TEXT NOT NULL,
            metadata TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS combination_slots (
            combination_id INTEGER NOT NULL REFERENCES combinations(id),
            part_idx       INTEGER NOT NULL,
            gesture_id     INTEGER,
            PRIMARY KEY (combination_id, part_idx)
        );

        CREATE INDEX IF NOT EXISTS idx_gestures_part ON gestures(part_idx);
        CREATE INDEX IF NOT EXISTS idx_samples_gesture ON samples(part_idx, gesture_id);
        CREATE INDEX IF NOT EXISTS idx_frames_sample
            ON frames(part_idx, gesture_id, sample_idx);
        ",
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;
    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('engine_version', ?1)",
        [gk_core::VERSION],
    )?;

    Ok(())
}

pub fn get_schema_version(conn: &Connection) -> Result<Option<i64>> {
    let mut stmt = conn.prepare("SELECT value FROM metadata WHERE key = 'schema_version'")?;
    let version = stmt
        .query_row([], |row| {
            let v: String = row.get(0)?;
            Ok(v.parse::<i64>().unwrap_or(0))
        })
        .ok();
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_creates_tables() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        for table in &[
            "parts",
            "gestures",
            "samples",
            "frames",
            "models",
            "prototypes",
            "combinations",
            "combination_slots",
            "metadata",
        ] {
            let count: i64 = conn
                .query_row(&format!("SELECT count(*) FROM {table}"), [], |row| {
                    row.get(0)
                })
                .unwrap();
            assert!(count >= 0, "table {table} should exist");
        }
    }

    #[test]
    fn test_schema_and_engine_version_set() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        assert_eq!(get_schema_version(&conn).unwrap(), Some(SCHEMA_VERSION));
        let engine: String = conn
            .query_row(
                "SELECT value FROM metadata WHERE key = 'engine_version'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(engine.starts_with("gesturekit"), "got: {engine}");
    }

    #[test]
    fn test_idempotent_initialize() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        initialize(&conn).unwrap();
    }

    #[test]
    fn test_busy_timeout_set() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        let timeout: i64 = conn
            .query_row("PRAGMA busy_timeout", [], |row| row.get(0))
            .unwrap();
        assert_eq!(timeout, 5000);
    }
}
