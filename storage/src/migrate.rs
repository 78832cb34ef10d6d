const SCHEMA_VERSION: i64 = 1;

/// Bring the metadata database up to the current schema.
pub(crate) fn migrate(connection: &rusqlite::Connection) -> rusqlite::Result<()> {
    let version: i64 = connection.query_row("PRAGMA user_version;", (), |row| row.get(0))?;
    if version >= SCHEMA_VERSION {
        return Ok(());
    }

    connection.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS bundles (
            id TEXT PRIMARY KEY NOT NULL,
            source BLOB NOT NULL,
            destination BLOB NOT NULL,
            report_to BLOB NOT NULL,
            creation_time INTEGER NOT NULL,
            creation_seq_num INTEGER NOT NULL,
            fragment_offset INTEGER NOT NULL,
            fragment_total_len INTEGER NOT NULL,
            already_sent_to BLOB NOT NULL,
            retention_constraints BLOB NOT NULL,
            constraint_mask INTEGER NOT NULL,
            retain INTEGER NOT NULL,
            dispatch INTEGER NOT NULL,
            expires INTEGER NOT NULL,
            body_name TEXT NOT NULL
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_bundles_dispatch
            ON bundles (dispatch) WHERE dispatch != 0;
        CREATE INDEX IF NOT EXISTS idx_bundles_expiry
            ON bundles (expires) WHERE retain = 0;
        CREATE INDEX IF NOT EXISTS idx_bundles_constraints
            ON bundles (constraint_mask);

        PRAGMA user_version = 1;
        "#,
    )
}
