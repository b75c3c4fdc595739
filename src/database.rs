use crate::crawler::CrawlReport;
use crate::models::League;
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

/// A per-match failure as persisted for a run
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFailure {
    pub match_id: String,
    pub stage: String,
    pub kind: String,
    pub message: String,
}

pub struct RunSummary {
    pub uuid: Uuid,
    pub league: String,
    pub started_at: DateTime<Utc>,
    pub harvested: usize,
    pub sampled: usize,
    pub extracted: usize,
    pub failed: usize,
}

/// SQLite archive of crawl runs, their extracted fields and per-match failures
pub struct ResultStore {
    conn: Connection,
}

impl ResultStore {
    pub fn new(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = ResultStore { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS crawl_runs (
                uuid TEXT PRIMARY KEY,
                country TEXT NOT NULL,
                division TEXT NOT NULL,
                season TEXT NOT NULL,
                started_at TEXT NOT NULL,
                harvested INTEGER NOT NULL,
                sampled INTEGER NOT NULL,
                extracted INTEGER NOT NULL,
                failed INTEGER NOT NULL
            )",
            [],
        )?;

        // Rows are keyed by position, a match id may appear more than once in a run
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS match_fields (
                run_uuid TEXT NOT NULL REFERENCES crawl_runs(uuid),
                row_index INTEGER NOT NULL,
                match_id TEXT NOT NULL,
                field TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (run_uuid, row_index, field)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS match_failures (
                run_uuid TEXT NOT NULL REFERENCES crawl_runs(uuid),
                match_id TEXT NOT NULL,
                stage TEXT NOT NULL,
                kind TEXT NOT NULL,
                message TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_match_fields_match ON match_fields(match_id)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_match_failures_run ON match_failures(run_uuid)",
            [],
        )?;

        Ok(())
    }

    /// Writes a whole run in one transaction and returns its id
    pub fn save_report(&mut self, league: &League, report: &CrawlReport) -> Result<Uuid> {
        let uuid = Uuid::new_v4();
        let run = uuid.to_string();
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO crawl_runs (
                uuid, country, division, season, started_at,
                harvested, sampled, extracted, failed
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                &run,
                &league.country,
                &league.division,
                &league.season,
                Utc::now(),
                report.harvested as i64,
                report.sampled as i64,
                report.table.len() as i64,
                report.failures.len() as i64,
            ],
        )?;

        {
            let mut insert_field = tx.prepare(
                "INSERT INTO match_fields (run_uuid, row_index, match_id, field, value)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (index, row) in report.table.rows().iter().enumerate() {
                for column in report.table.columns() {
                    let Some(value) = row.cells.get(column) else {
                        continue;
                    };
                    insert_field.execute(params![
                        &run,
                        index as i64,
                        row.id.as_str(),
                        column,
                        serde_json::to_string(value)?,
                    ])?;
                }
            }

            let mut insert_failure = tx.prepare(
                "INSERT INTO match_failures (run_uuid, match_id, stage, kind, message)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for failure in &report.failures {
                insert_failure.execute(params![
                    &run,
                    failure.id.as_str(),
                    failure.stage.as_str(),
                    failure.error.kind(),
                    failure.error.to_string(),
                ])?;
            }
        }

        tx.commit()?;
        tracing::info!("Stored crawl run {} for {}", uuid, league);
        Ok(uuid)
    }

    pub fn run_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM crawl_runs", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn get_run(&self, uuid: &Uuid) -> Result<Option<RunSummary>> {
        let summary = self
            .conn
            .query_row(
                "SELECT country, division, season, started_at, harvested, sampled, extracted, failed
                 FROM crawl_runs WHERE uuid = ?1",
                params![uuid.to_string()],
                |row| {
                    let league = League::new(
                        &row.get::<_, String>(0)?,
                        &row.get::<_, String>(1)?,
                        &row.get::<_, String>(2)?,
                    );
                    Ok(RunSummary {
                        uuid: *uuid,
                        league: league.to_string(),
                        started_at: row.get(3)?,
                        harvested: row.get::<_, i64>(4)? as usize,
                        sampled: row.get::<_, i64>(5)? as usize,
                        extracted: row.get::<_, i64>(6)? as usize,
                        failed: row.get::<_, i64>(7)? as usize,
                    })
                },
            )
            .optional()?;
        Ok(summary)
    }

    /// Stored value of one field, decoded from its JSON text
    #[cfg(test)]
    pub fn field_value(
        &self,
        uuid: &Uuid,
        match_id: &str,
        field: &str,
    ) -> Result<Option<serde_json::Value>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM match_fields
                 WHERE run_uuid = ?1 AND match_id = ?2 AND field = ?3
                 ORDER BY row_index LIMIT 1",
                params![uuid.to_string(), match_id, field],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn failures_for_run(&self, uuid: &Uuid) -> Result<Vec<StoredFailure>> {
        let mut stmt = self.conn.prepare(
            "SELECT match_id, stage, kind, message
             FROM match_failures
             WHERE run_uuid = ?1
             ORDER BY rowid",
        )?;

        let failures = stmt
            .query_map(params![uuid.to_string()], |row| {
                Ok(StoredFailure {
                    match_id: row.get(0)?,
                    stage: row.get(1)?,
                    kind: row.get(2)?,
                    message: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(failures)
    }
}
