//! SQLite-backed job store implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::store::{CasOutcome, JobFilter, JobStore, JobStoreError, NewJob};
use super::types::{CreationJob, CreationType, InputDescriptor, JobState};
use crate::pricing::PriceQuote;

/// SQLite-backed job store with per-row optimistic versioning.
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
}

impl SqliteJobStore {
    /// Create a new SQLite job store, creating the database file and tables
    /// if needed.
    pub fn new(path: &Path) -> Result<Self, JobStoreError> {
        let conn = Connection::open(path).map_err(|e| JobStoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite job store (useful for testing).
    pub fn in_memory() -> Result<Self, JobStoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| JobStoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), JobStoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                owner TEXT NOT NULL,
                creation_type TEXT NOT NULL,
                input TEXT NOT NULL,
                language TEXT NOT NULL DEFAULT 'en',
                price TEXT NOT NULL,
                state TEXT NOT NULL,
                version INTEGER NOT NULL DEFAULT 1,
                idempotency_key TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_owner ON jobs(owner);
            CREATE INDEX IF NOT EXISTS idx_jobs_updated_at ON jobs(updated_at);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_jobs_idempotency
                ON jobs(owner, idempotency_key)
                WHERE idempotency_key IS NOT NULL;
            "#,
        )
        .map_err(|e| JobStoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn build_where_clause(filter: &JobFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref state) = filter.state {
            conditions.push("json_extract(state, '$.type') = ?");
            params.push(Box::new(state.clone()));
        }

        if let Some(ref owner) = filter.owner {
            conditions.push("owner = ?");
            params.push(Box::new(owner.clone()));
        }

        if let Some(cutoff) = filter.started_before {
            conditions.push(
                "json_extract(state, '$.started_at') IS NOT NULL \
                 AND datetime(json_extract(state, '$.started_at')) < datetime(?)",
            );
            params.push(Box::new(cutoff.to_rfc3339()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<CreationJob> {
        let id: String = row.get(0)?;
        let owner: String = row.get(1)?;
        let creation_type_str: String = row.get(2)?;
        let input_json: String = row.get(3)?;
        let language: String = row.get(4)?;
        let price_json: String = row.get(5)?;
        let state_json: String = row.get(6)?;
        let version: i64 = row.get(7)?;
        let idempotency_key: Option<String> = row.get(8)?;
        let created_at_str: String = row.get(9)?;
        let updated_at_str: String = row.get(10)?;

        let creation_type =
            CreationType::parse(&creation_type_str).unwrap_or(CreationType::General);

        // JSON columns are written by us, so parse failures mean corruption;
        // surface them as rusqlite errors rather than guessing.
        let input: InputDescriptor = serde_json::from_str(&input_json)
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
            })?;
        let price_charged: PriceQuote = serde_json::from_str(&price_json)
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
            })?;
        let state: JobState = serde_json::from_str(&state_json)
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
            })?;

        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(CreationJob {
            id,
            owner,
            creation_type,
            input,
            language,
            price_charged,
            created_at,
            updated_at,
            state,
            version: version as u64,
            idempotency_key,
        })
    }

    const SELECT_COLUMNS: &'static str = "id, owner, creation_type, input, language, price, \
         state, version, idempotency_key, created_at, updated_at";

    fn fetch(conn: &Connection, id: &str) -> Result<Option<CreationJob>, JobStoreError> {
        conn.query_row(
            &format!("SELECT {} FROM jobs WHERE id = ?", Self::SELECT_COLUMNS),
            params![id],
            Self::row_to_job,
        )
        .optional()
        .map_err(|e| JobStoreError::Database(e.to_string()))
    }
}

impl JobStore for SqliteJobStore {
    fn create(&self, new_job: NewJob) -> Result<CreationJob, JobStoreError> {
        let conn = self.conn.lock().unwrap();

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let state = JobState::Queued;

        let state_json =
            serde_json::to_string(&state).map_err(|e| JobStoreError::Database(e.to_string()))?;
        let input_json = serde_json::to_string(&new_job.input)
            .map_err(|e| JobStoreError::Database(e.to_string()))?;
        let price_json = serde_json::to_string(&new_job.price_charged)
            .map_err(|e| JobStoreError::Database(e.to_string()))?;

        conn.execute(
            "INSERT INTO jobs (id, owner, creation_type, input, language, price, state, \
             version, idempotency_key, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?, ?)",
            params![
                id,
                new_job.owner,
                new_job.creation_type.as_str(),
                input_json,
                new_job.language,
                price_json,
                state_json,
                new_job.idempotency_key,
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| {
            if e.to_string().contains("UNIQUE") {
                JobStoreError::AlreadyExists(id.clone())
            } else {
                JobStoreError::Database(e.to_string())
            }
        })?;

        Ok(CreationJob {
            id,
            owner: new_job.owner,
            creation_type: new_job.creation_type,
            input: new_job.input,
            language: new_job.language,
            price_charged: new_job.price_charged,
            created_at: now,
            updated_at: now,
            state,
            version: 1,
            idempotency_key: new_job.idempotency_key,
        })
    }

    fn get(&self, id: &str) -> Result<Option<CreationJob>, JobStoreError> {
        let conn = self.conn.lock().unwrap();
        Self::fetch(&conn, id)
    }

    fn find_by_idempotency_key(
        &self,
        owner: &str,
        key: &str,
    ) -> Result<Option<CreationJob>, JobStoreError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!(
                "SELECT {} FROM jobs WHERE owner = ? AND idempotency_key = ?",
                Self::SELECT_COLUMNS
            ),
            params![owner, key],
            Self::row_to_job,
        )
        .optional()
        .map_err(|e| JobStoreError::Database(e.to_string()))
    }

    fn compare_and_set(
        &self,
        id: &str,
        expected_version: u64,
        new_state: JobState,
    ) -> Result<CasOutcome, JobStoreError> {
        let conn = self.conn.lock().unwrap();

        let state_json = serde_json::to_string(&new_state)
            .map_err(|e| JobStoreError::Database(e.to_string()))?;
        let now = Utc::now();

        // Terminal states are immutable no matter which version a stale
        // writer presents.
        let changed = conn
            .execute(
                "UPDATE jobs SET state = ?1, updated_at = ?2, version = version + 1 \
                 WHERE id = ?3 AND version = ?4 \
                 AND json_extract(state, '$.type') IN ('queued', 'processing')",
                params![state_json, now.to_rfc3339(), id, expected_version as i64],
            )
            .map_err(|e| JobStoreError::Database(e.to_string()))?;

        if changed == 1 {
            let job = Self::fetch(&conn, id)?.ok_or_else(|| JobStoreError::NotFound(id.to_string()))?;
            return Ok(CasOutcome::Updated(job));
        }

        match Self::fetch(&conn, id)? {
            Some(_) => Ok(CasOutcome::Conflict),
            None => Err(JobStoreError::NotFound(id.to_string())),
        }
    }

    fn list(&self, filter: &JobFilter) -> Result<Vec<CreationJob>, JobStoreError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, mut query_params) = Self::build_where_clause(filter);
        let sql = format!(
            "SELECT {} FROM jobs {} ORDER BY created_at DESC LIMIT ? OFFSET ?",
            Self::SELECT_COLUMNS,
            where_clause
        );
        query_params.push(Box::new(filter.limit));
        query_params.push(Box::new(filter.offset));

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| JobStoreError::Database(e.to_string()))?;
        let rows = stmt
            .query_map(
                rusqlite::params_from_iter(query_params.iter().map(|p| p.as_ref())),
                Self::row_to_job,
            )
            .map_err(|e| JobStoreError::Database(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| JobStoreError::Database(e.to_string()))
    }

    fn count(&self, filter: &JobFilter) -> Result<i64, JobStoreError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, query_params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM jobs {}", where_clause);

        conn.query_row(
            &sql,
            rusqlite::params_from_iter(query_params.iter().map(|p| p.as_ref())),
            |row| row.get(0),
        )
        .map_err(|e| JobStoreError::Database(e.to_string()))
    }

    fn count_active_owners(&self) -> Result<i64, JobStoreError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(DISTINCT owner) FROM jobs \
             WHERE json_extract(state, '$.type') IN ('queued', 'processing')",
            [],
            |row| row.get(0),
        )
        .map_err(|e| JobStoreError::Database(e.to_string()))
    }

    fn evict_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<usize, JobStoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM jobs \
             WHERE json_extract(state, '$.type') IN ('completed', 'failed') \
             AND datetime(updated_at) < datetime(?)",
            params![cutoff.to_rfc3339()],
        )
        .map_err(|e| JobStoreError::Database(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::types::{FailureReason, ShareLink};
    use crate::pricing::PriceTier;

    fn quote() -> PriceQuote {
        PriceQuote {
            tier: PriceTier::Standard,
            amount: 0.99,
            multiplier: 1.0,
            surge_active: false,
        }
    }

    fn new_job(owner: &str) -> NewJob {
        NewJob {
            owner: owner.to_string(),
            creation_type: CreationType::General,
            input: InputDescriptor::Text {
                content: "a cat".to_string(),
            },
            language: "en".to_string(),
            price_charged: quote(),
            idempotency_key: None,
        }
    }

    fn processing(attempt: u32) -> JobState {
        JobState::Processing {
            started_at: Utc::now(),
            attempt,
        }
    }

    fn completed() -> JobState {
        JobState::Completed {
            completed_at: Utc::now(),
            result_reference: "http://storage/result.json".to_string(),
            share_links: ShareLink::links_for("https://fabrica.app/share", "x"),
        }
    }

    fn failed(reason: FailureReason) -> JobState {
        JobState::Failed {
            reason,
            message: "boom".to_string(),
            failed_at: Utc::now(),
        }
    }

    #[test]
    fn test_create_starts_queued_at_version_one() {
        let store = SqliteJobStore::in_memory().unwrap();
        let job = store.create(new_job("alice")).unwrap();

        assert_eq!(job.state, JobState::Queued);
        assert_eq!(job.version, 1);
        assert_eq!(job.price_charged.amount, 0.99);

        let fetched = store.get(&job.id).unwrap().unwrap();
        assert_eq!(fetched, job);
    }

    #[test]
    fn test_get_unknown_id_is_none() {
        let store = SqliteJobStore::in_memory().unwrap();
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_cas_bumps_version() {
        let store = SqliteJobStore::in_memory().unwrap();
        let job = store.create(new_job("alice")).unwrap();

        let outcome = store.compare_and_set(&job.id, 1, processing(1)).unwrap();
        let updated = match outcome {
            CasOutcome::Updated(j) => j,
            CasOutcome::Conflict => panic!("expected update"),
        };
        assert_eq!(updated.version, 2);
        assert_eq!(updated.state.state_type(), "processing");
    }

    #[test]
    fn test_cas_with_stale_version_conflicts() {
        let store = SqliteJobStore::in_memory().unwrap();
        let job = store.create(new_job("alice")).unwrap();

        store.compare_and_set(&job.id, 1, processing(1)).unwrap();

        // A second writer still holding version 1 must lose.
        let outcome = store
            .compare_and_set(&job.id, 1, failed(FailureReason::Timeout))
            .unwrap();
        assert!(matches!(outcome, CasOutcome::Conflict));

        let current = store.get(&job.id).unwrap().unwrap();
        assert_eq!(current.state.state_type(), "processing");
        assert_eq!(current.version, 2);
    }

    #[test]
    fn test_exactly_one_terminal_write_wins() {
        let store = SqliteJobStore::in_memory().unwrap();
        let job = store.create(new_job("alice")).unwrap();
        store.compare_and_set(&job.id, 1, processing(1)).unwrap();

        // Worker completion and watchdog timeout race at version 2.
        let worker = store.compare_and_set(&job.id, 2, completed()).unwrap();
        let watchdog = store
            .compare_and_set(&job.id, 2, failed(FailureReason::Timeout))
            .unwrap();

        assert!(matches!(worker, CasOutcome::Updated(_)));
        assert!(matches!(watchdog, CasOutcome::Conflict));

        let current = store.get(&job.id).unwrap().unwrap();
        assert_eq!(current.state.state_type(), "completed");
    }

    #[test]
    fn test_terminal_state_is_immutable_even_with_current_version() {
        let store = SqliteJobStore::in_memory().unwrap();
        let job = store.create(new_job("alice")).unwrap();
        store.compare_and_set(&job.id, 1, processing(1)).unwrap();
        store.compare_and_set(&job.id, 2, completed()).unwrap();

        let outcome = store
            .compare_and_set(&job.id, 3, failed(FailureReason::Backend))
            .unwrap();
        assert!(matches!(outcome, CasOutcome::Conflict));

        let current = store.get(&job.id).unwrap().unwrap();
        assert_eq!(current.state.state_type(), "completed");
        assert_eq!(current.version, 3);
    }

    #[test]
    fn test_cas_unknown_id_is_not_found() {
        let store = SqliteJobStore::in_memory().unwrap();
        let result = store.compare_and_set("missing", 1, processing(1));
        assert!(matches!(result, Err(JobStoreError::NotFound(_))));
    }

    #[test]
    fn test_list_filters_by_state_and_owner() {
        let store = SqliteJobStore::in_memory().unwrap();
        let a = store.create(new_job("alice")).unwrap();
        let _b = store.create(new_job("bob")).unwrap();

        store.compare_and_set(&a.id, 1, processing(1)).unwrap();

        let processing_jobs = store
            .list(&JobFilter::new().with_state("processing"))
            .unwrap();
        assert_eq!(processing_jobs.len(), 1);
        assert_eq!(processing_jobs[0].id, a.id);

        let bobs = store.list(&JobFilter::new().with_owner("bob")).unwrap();
        assert_eq!(bobs.len(), 1);
        assert_eq!(bobs[0].owner, "bob");

        assert_eq!(store.count(&JobFilter::new().with_state("queued")).unwrap(), 1);
    }

    #[test]
    fn test_list_started_before_finds_stuck_jobs() {
        let store = SqliteJobStore::in_memory().unwrap();
        let job = store.create(new_job("alice")).unwrap();
        let started_at = Utc::now() - chrono::Duration::hours(2);
        store
            .compare_and_set(
                &job.id,
                1,
                JobState::Processing {
                    started_at,
                    attempt: 1,
                },
            )
            .unwrap();

        let cutoff = Utc::now() - chrono::Duration::hours(1);
        let stuck = store
            .list(
                &JobFilter::new()
                    .with_state("processing")
                    .with_started_before(cutoff),
            )
            .unwrap();
        assert_eq!(stuck.len(), 1);

        let fresh_cutoff = Utc::now() - chrono::Duration::hours(3);
        let stuck = store
            .list(
                &JobFilter::new()
                    .with_state("processing")
                    .with_started_before(fresh_cutoff),
            )
            .unwrap();
        assert!(stuck.is_empty());
    }

    #[test]
    fn test_idempotency_key_lookup_and_uniqueness() {
        let store = SqliteJobStore::in_memory().unwrap();
        let mut req = new_job("alice");
        req.idempotency_key = Some("retry-1".to_string());
        let job = store.create(req.clone()).unwrap();

        let found = store
            .find_by_idempotency_key("alice", "retry-1")
            .unwrap()
            .unwrap();
        assert_eq!(found.id, job.id);

        // Same key, same owner: rejected by the unique index.
        let dup = store.create(req);
        assert!(matches!(dup, Err(JobStoreError::AlreadyExists(_))));

        // Same key, different owner: fine.
        let mut other = new_job("bob");
        other.idempotency_key = Some("retry-1".to_string());
        assert!(store.create(other).is_ok());
    }

    #[test]
    fn test_count_active_owners() {
        let store = SqliteJobStore::in_memory().unwrap();
        assert_eq!(store.count_active_owners().unwrap(), 0);

        let a = store.create(new_job("alice")).unwrap();
        store.create(new_job("alice")).unwrap();
        store.create(new_job("bob")).unwrap();
        assert_eq!(store.count_active_owners().unwrap(), 2);

        store.compare_and_set(&a.id, 1, processing(1)).unwrap();
        assert_eq!(store.count_active_owners().unwrap(), 2);
    }

    #[test]
    fn test_evict_terminal_before_keeps_active_jobs() {
        let store = SqliteJobStore::in_memory().unwrap();
        let done = store.create(new_job("alice")).unwrap();
        let active = store.create(new_job("bob")).unwrap();

        store.compare_and_set(&done.id, 1, processing(1)).unwrap();
        store.compare_and_set(&done.id, 2, completed()).unwrap();

        // Cutoff in the future: the completed job is older and goes away.
        let evicted = store
            .evict_terminal_before(Utc::now() + chrono::Duration::hours(1))
            .unwrap();
        assert_eq!(evicted, 1);

        assert!(store.get(&done.id).unwrap().is_none());
        assert!(store.get(&active.id).unwrap().is_some());
    }
}
