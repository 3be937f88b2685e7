use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use serde::Deserialize;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use super::{CounterStore, StoreError};
use crate::competitor::{Competitor, CounterName};

/// Counter store backed by a SQLite file that several clients (or the vote server) share.
///
/// WAL mode lets readers proceed while another client is writing.
#[derive(Clone)]
pub struct SqliteCounterStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCounterStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open store database {:?}", path))?;
        setup_database(&conn)?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        setup_database(&conn)?;
        Ok(Self::from_connection(conn))
    }

    /// Wrap a connection whose schema is already set up
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Insert competitors, skipping ids that already exist
    pub fn seed(&self, competitors: &[Competitor]) -> Result<usize> {
        let conn = self.lock()?;
        insert_competitors(&conn, competitors)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

#[async_trait]
impl CounterStore for SqliteCounterStore {
    async fn list_all(&self) -> Result<Vec<Competitor>, StoreError> {
        let conn = self.lock()?;
        let competitors = get_all_competitors(&conn)?;
        debug!(count = competitors.len(), "Listed competitors");
        Ok(competitors)
    }

    async fn increment(
        &self,
        competitor_id: &str,
        counter: CounterName,
        new_value: u32,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;

        // Column names come from a closed enum, never from input
        let sql = format!(
            "UPDATE competitors SET {} = ?1, updated_at = ?2 WHERE id = ?3",
            counter.column()
        );
        let changed = conn.execute(&sql, params![new_value, Utc::now().to_rfc3339(), competitor_id])?;

        if changed == 0 {
            return Err(StoreError::NotFound(competitor_id.to_string()));
        }

        debug!(competitor_id, %counter, new_value, "Counter updated");
        Ok(())
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode so concurrent clients can read during writes
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS competitors (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            image_url TEXT NOT NULL DEFAULT '',
            flavor_votes INTEGER NOT NULL DEFAULT 0 CHECK (flavor_votes >= 0),
            looks_votes INTEGER NOT NULL DEFAULT 0 CHECK (looks_votes >= 0),
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT
        )",
        [],
    )?;

    Ok(())
}

/// One line of a competitor seed file.
///
/// Header: `id,name,imageUrl,flavorVotes,looksVotes`. Blank ids are derived from the name
/// so re-importing the same file hits the same records; blank counters start at zero.
#[derive(Debug, Deserialize)]
struct CompetitorRow {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(rename = "imageUrl", default)]
    image_url: Option<String>,
    #[serde(rename = "flavorVotes", default)]
    flavor_votes: Option<u32>,
    #[serde(rename = "looksVotes", default)]
    looks_votes: Option<u32>,
}

impl From<CompetitorRow> for Competitor {
    fn from(row: CompetitorRow) -> Self {
        let id = row
            .id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| slug_id(&row.name));

        Competitor::new(id, row.name.trim(), row.image_url.unwrap_or_default())
            .with_votes(row.flavor_votes.unwrap_or(0), row.looks_votes.unwrap_or(0))
    }
}

/// `"Ginger Molasses"` → `"ginger-molasses"`. Falls back to a UUID when the name has no
/// letters or digits to build from.
fn slug_id(name: &str) -> String {
    let slug = name
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-");

    if slug.is_empty() {
        uuid::Uuid::new_v4().to_string()
    } else {
        slug
    }
}

pub fn load_competitors_csv(csv_path: &Path) -> Result<Vec<Competitor>> {
    let rdr = csv::Reader::from_path(csv_path).context("Failed to open CSV file")?;
    read_competitors(rdr)
}

fn read_competitors<R: std::io::Read>(mut rdr: csv::Reader<R>) -> Result<Vec<Competitor>> {
    let mut competitors = Vec::new();

    for result in rdr.deserialize() {
        let row: CompetitorRow = result.context("Failed to deserialize competitor")?;
        competitors.push(row.into());
    }

    Ok(competitors)
}

pub fn insert_competitors(conn: &Connection, competitors: &[Competitor]) -> Result<usize> {
    let mut inserted = 0;
    let mut duplicates = 0;

    for competitor in competitors {
        let result = conn.execute(
            "INSERT INTO competitors (id, name, image_url, flavor_votes, looks_votes)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                competitor.id,
                competitor.name,
                competitor.image_url,
                competitor.flavor_votes,
                competitor.looks_votes,
            ],
        );

        match result {
            Ok(_) => inserted += 1,
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                duplicates += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!(inserted, duplicates, "Seeded competitors");

    Ok(inserted)
}

fn get_all_competitors(conn: &Connection) -> Result<Vec<Competitor>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT id, name, image_url, flavor_votes, looks_votes
         FROM competitors
         ORDER BY rowid",
    )?;

    let competitors = stmt
        .query_map([], |row| {
            Ok(Competitor {
                id: row.get(0)?,
                name: row.get(1)?,
                image_url: row.get(2)?,
                flavor_votes: row.get(3)?,
                looks_votes: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(competitors)
}
