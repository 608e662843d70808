// SPDX-FileCopyrightText: 2026 Kurir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded schema migrations.
//!
//! SQL files under `migrations/` are compiled in with `embed_migrations!` and
//! applied every time the database is opened.

use kurir_core::KurirError;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Apply all pending migrations. Applied versions are tracked by refinery in
/// `refinery_schema_history`.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), KurirError> {
    let report = embedded::migrations::runner()
        .run(conn)
        .map_err(KurirError::persistence)?;
    for migration in report.applied_migrations() {
        tracing::debug!(
            version = migration.version(),
            name = migration.name(),
            "migration applied"
        );
    }
    Ok(())
}
