use std::path::Path;

use anyhow::{Context, Result};
use tokio_rusqlite::Connection;

pub mod jobs;

pub use jobs::JobStore;

/// Open (creating if needed) the local database and apply the schema.
pub async fn init(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .await
        .with_context(|| format!("Failed to open database at {}", path.display()))?;
    apply_schema(&conn).await?;
    Ok(conn)
}

/// In-memory database with the schema applied. Used by tests.
pub async fn init_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().await?;
    apply_schema(&conn).await?;
    Ok(conn)
}

async fn apply_schema(conn: &Connection) -> Result<()> {
    conn.call(|conn| {
        let schema = include_str!("schema.sql");
        conn.execute_batch(schema)?;
        Ok::<(), tokio_rusqlite::rusqlite::Error>(())
    })
    .await
    .context("Failed to apply database schema")?;

    Ok(())
}
