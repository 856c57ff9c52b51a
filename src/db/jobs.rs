//! Durable bookkeeping of submitted jobs.
//!
//! The whole history for a profile lives in one `kv_store` row as a JSON
//! list, most recent first. Every mutation reads, edits and rewrites that
//! list inside a single transaction on the connection's worker thread, so
//! concurrent writers never interleave partial lists.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use tokio_rusqlite::rusqlite::OptionalExtension;
use tokio_rusqlite::{Connection, params, rusqlite};
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::core::models::{JobRecord, JobStatus};

#[derive(Clone)]
pub struct JobStore {
    conn: Connection,
    namespace: String,
    max_records: usize,
    stale_after: Duration,
}

impl JobStore {
    pub fn new(conn: Connection, config: &AppConfig) -> Self {
        Self::with_limits(
            conn,
            config.jobs_namespace(),
            config.jobs.max_records,
            config.jobs.stale_after(),
        )
    }

    pub fn with_limits(
        conn: Connection,
        namespace: impl Into<String>,
        max_records: usize,
        stale_after: Duration,
    ) -> Self {
        Self {
            conn,
            namespace: namespace.into(),
            max_records,
            stale_after,
        }
    }

    /// Recent jobs, most recent first.
    ///
    /// Records left `pending` or `processing` for longer than the staleness
    /// threshold are marked `failed` (and persisted) before being returned.
    pub async fn list(&self) -> Result<Vec<JobRecord>> {
        self.list_as_of(Utc::now()).await
    }

    pub async fn list_as_of(&self, now: DateTime<Utc>) -> Result<Vec<JobRecord>> {
        let stale_after = self.stale_after;
        let max_records = self.max_records;

        let (records, swept) = self
            .modify(move |records| {
                let swept = sweep_stale(records, now, stale_after);
                let overflow = records.len() > max_records;
                records.truncate(max_records);
                (swept > 0 || overflow, swept)
            })
            .await
            .context("Failed to list jobs")?;

        if swept > 0 {
            info!(count = swept, "Marked stale jobs as failed");
        }
        Ok(records)
    }

    pub async fn get(&self, job_id: &str) -> Result<Option<JobRecord>> {
        let records = self.list().await?;
        Ok(records.into_iter().find(|r| r.id == job_id))
    }

    /// Insert a new `pending` record at the front, evicting the oldest
    /// beyond the cap.
    pub async fn record(&self, job_id: &str, description: &str) -> Result<()> {
        self.record_at(job_id, description, Utc::now()).await
    }

    pub async fn record_at(
        &self,
        job_id: &str,
        description: &str,
        time: DateTime<Utc>,
    ) -> Result<()> {
        let record = JobRecord {
            id: job_id.to_string(),
            desc: description.to_string(),
            time,
            status: JobStatus::Pending,
        };
        let max_records = self.max_records;

        let (_, evicted) = self
            .modify(move |records| {
                records.retain(|r| r.id != record.id);
                records.insert(0, record);
                let evicted = records.len().saturating_sub(max_records);
                records.truncate(max_records);
                (true, evicted)
            })
            .await
            .with_context(|| format!("Failed to record job {}", job_id))?;

        debug!(job_id, evicted, "Job recorded");
        Ok(())
    }

    /// Overwrite the status of a known job.
    ///
    /// Returns whether the record changed. Unknown ids are ignored, as are
    /// moves back to `pending` and any change to a `done` record.
    pub async fn update_status(&self, job_id: &str, status: JobStatus) -> Result<bool> {
        let id = job_id.to_string();

        let (_, outcome) = self
            .modify(move |records| match records.iter_mut().find(|r| r.id == id) {
                None => (false, Update::Unknown),
                Some(record) if record.status == status => (false, Update::Unchanged),
                Some(record) if !may_transition(record.status, status) => {
                    (false, Update::Refused(record.status))
                }
                Some(record) => {
                    record.status = status;
                    (true, Update::Applied)
                }
            })
            .await
            .with_context(|| format!("Failed to update status of job {}", job_id))?;

        match outcome {
            Update::Applied => {
                debug!(job_id, %status, "Job status updated");
                Ok(true)
            }
            Update::Unchanged => Ok(false),
            Update::Unknown => {
                debug!(job_id, %status, "Status update for unknown job ignored");
                Ok(false)
            }
            Update::Refused(current) => {
                warn!(job_id, %current, %status, "Refusing backwards job status transition");
                Ok(false)
            }
        }
    }

    /// Run `edit` against the stored list as one read-modify-write.
    /// `edit` reports whether it changed anything; unchanged lists are not
    /// rewritten.
    async fn modify<F, T>(&self, edit: F) -> Result<(Vec<JobRecord>, T)>
    where
        F: FnOnce(&mut Vec<JobRecord>) -> (bool, T) + Send + 'static,
        T: Send + 'static,
    {
        let namespace = self.namespace.clone();

        let result = self
            .conn
            .call(move |c| {
                let tx = c.transaction()?;

                let raw: Option<String> = tx
                    .query_row(
                        "SELECT value FROM kv_store WHERE namespace = ?1",
                        params![&namespace],
                        |row| row.get(0),
                    )
                    .optional()?;

                let mut records = decode(&namespace, raw.as_deref());
                let (changed, out) = edit(&mut records);

                if changed {
                    let value = serde_json::to_string(&records)
                        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
                    tx.execute(
                        "INSERT INTO kv_store (namespace, value)
                         VALUES (?1, ?2)
                         ON CONFLICT(namespace) DO UPDATE SET
                            value = excluded.value,
                            updated_at = CURRENT_TIMESTAMP",
                        params![&namespace, value],
                    )?;
                }

                tx.commit()?;
                Ok::<_, rusqlite::Error>((records, out))
            })
            .await?;

        Ok(result)
    }
}

enum Update {
    Applied,
    Unchanged,
    Unknown,
    Refused(JobStatus),
}

/// `done` is final. `failed` may still be replaced by a later observation,
/// since the staleness sweep can mark a job whose poller is still running.
fn may_transition(from: JobStatus, to: JobStatus) -> bool {
    from != JobStatus::Done && to != JobStatus::Pending
}

/// A corrupt stored value is treated as an empty history.
fn decode(namespace: &str, raw: Option<&str>) -> Vec<JobRecord> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    match serde_json::from_str(raw) {
        Ok(records) => records,
        Err(e) => {
            warn!(namespace, error = %e, "Discarding unreadable job history");
            Vec::new()
        }
    }
}

/// Mark abandoned jobs failed. Returns how many were changed.
fn sweep_stale(records: &mut [JobRecord], now: DateTime<Utc>, stale_after: Duration) -> usize {
    let mut swept = 0;
    for record in records.iter_mut() {
        let waiting = matches!(record.status, JobStatus::Pending | JobStatus::Processing);
        if waiting && now.signed_duration_since(record.time) > stale_after {
            debug!(job_id = %record.id, status = %record.status, "Job is stale");
            record.status = JobStatus::Failed;
            swept += 1;
        }
    }
    swept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn store() -> JobStore {
        let conn = db::init_in_memory().await.unwrap();
        JobStore::with_limits(conn, "jobs:test", 20, Duration::minutes(30))
    }

    #[tokio::test]
    async fn test_record_puts_newest_first() {
        let store = store().await;
        store.record("a", "first").await.unwrap();
        store.record("b", "second").await.unwrap();

        let records = store.list().await.unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert!(records.iter().all(|r| r.status == JobStatus::Pending));
    }

    #[tokio::test]
    async fn test_cap_evicts_oldest() {
        let store = store().await;
        for i in 0..21 {
            store.record(&format!("job-{}", i), "post").await.unwrap();
        }

        let records = store.list().await.unwrap();
        assert_eq!(records.len(), 20);
        assert_eq!(records[0].id, "job-20");
        assert_eq!(records[19].id, "job-1");
        assert!(!records.iter().any(|r| r.id == "job-0"));
    }

    #[tokio::test]
    async fn test_staleness_threshold() {
        let store = store().await;
        let now = Utc::now();
        store
            .record_at("old", "old", now - Duration::minutes(31))
            .await
            .unwrap();
        store
            .record_at("recent", "recent", now - Duration::minutes(29))
            .await
            .unwrap();
        store.update_status("old", JobStatus::Processing).await.unwrap();
        store
            .update_status("recent", JobStatus::Processing)
            .await
            .unwrap();

        let records = store.list_as_of(now).await.unwrap();
        let status = |id: &str| records.iter().find(|r| r.id == id).unwrap().status;
        assert_eq!(status("old"), JobStatus::Failed);
        assert_eq!(status("recent"), JobStatus::Processing);

        // The sweep is persisted, not just applied to the returned copy.
        let reread = store.list_as_of(now - Duration::minutes(10)).await.unwrap();
        assert_eq!(
            reread.iter().find(|r| r.id == "old").unwrap().status,
            JobStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_sweep_leaves_later_stages_alone() {
        let store = store().await;
        let now = Utc::now();
        store
            .record_at("posting", "p", now - Duration::hours(2))
            .await
            .unwrap();
        store.update_status("posting", JobStatus::Posting).await.unwrap();

        let records = store.list_as_of(now).await.unwrap();
        assert_eq!(records[0].status, JobStatus::Posting);
    }

    #[tokio::test]
    async fn test_update_unknown_is_noop() {
        let store = store().await;
        store.record("a", "first").await.unwrap();

        assert!(!store.update_status("missing", JobStatus::Done).await.unwrap());
        let records = store.list().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_status_never_moves_backwards() {
        let store = store().await;
        store.record("a", "first").await.unwrap();

        assert!(store.update_status("a", JobStatus::Uploading).await.unwrap());
        assert!(!store.update_status("a", JobStatus::Pending).await.unwrap());
        assert!(store.update_status("a", JobStatus::Processing).await.unwrap());
        assert!(store.update_status("a", JobStatus::Done).await.unwrap());
        assert!(!store.update_status("a", JobStatus::Failed).await.unwrap());

        assert_eq!(store.get("a").await.unwrap().unwrap().status, JobStatus::Done);
    }

    #[tokio::test]
    async fn test_swept_job_accepts_later_completion() {
        let store = store().await;
        let now = Utc::now();
        store
            .record_at("long", "long render", now - Duration::minutes(31))
            .await
            .unwrap();
        store.update_status("long", JobStatus::Processing).await.unwrap();

        let records = store.list_as_of(now).await.unwrap();
        assert_eq!(records[0].status, JobStatus::Failed);

        assert!(!store.update_status("long", JobStatus::Pending).await.unwrap());
        assert!(store.update_status("long", JobStatus::Done).await.unwrap());
        assert_eq!(
            store.get("long").await.unwrap().unwrap().status,
            JobStatus::Done
        );
    }

    #[tokio::test]
    async fn test_duplicate_id_keeps_single_record() {
        let store = store().await;
        store.record("a", "first").await.unwrap();
        store.record("b", "second").await.unwrap();
        store.record("a", "again").await.unwrap();

        let records = store.list().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "a");
        assert_eq!(records[0].desc, "again");
    }

    #[tokio::test]
    async fn test_corrupt_history_reads_as_empty() {
        let store = store().await;
        store
            .conn
            .call(|c| {
                c.execute(
                    "INSERT INTO kv_store (namespace, value) VALUES ('jobs:test', '{not json')",
                    [],
                )?;
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();

        assert!(store.list().await.unwrap().is_empty());
        store.record("a", "fresh").await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_profiles_are_isolated() {
        let conn = db::init_in_memory().await.unwrap();
        let alice = JobStore::with_limits(conn.clone(), "jobs:alice", 20, Duration::minutes(30));
        let bob = JobStore::with_limits(conn, "jobs:bob", 20, Duration::minutes(30));

        alice.record("a", "alice's").await.unwrap();

        assert_eq!(alice.list().await.unwrap().len(), 1);
        assert!(bob.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("postflow.db");

        {
            let conn = db::init(&path).await.unwrap();
            let store = JobStore::with_limits(conn, "jobs:test", 20, Duration::minutes(30));
            store.record("abc", "launch").await.unwrap();
            store.update_status("abc", JobStatus::Posting).await.unwrap();
        }

        let conn = db::init(&path).await.unwrap();
        let store = JobStore::with_limits(conn, "jobs:test", 20, Duration::minutes(30));
        let record = store.get("abc").await.unwrap().unwrap();
        assert_eq!(record.desc, "launch");
        assert_eq!(record.status, JobStatus::Posting);
    }
}
