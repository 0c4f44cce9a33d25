use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Result;
use crate::models::DissertationSummary;
use crate::source::RecordSource;

/// Rows requested per round trip when reading the catalog.
pub const PAGE_SIZE: i64 = 1000;

/// Stored school names may carry stray whitespace; requested names are already trimmed.
const SCHOOL_ROWS_SQL: &str = "SELECT year, school, subject_broad, department_broad \
     FROM dissertations \
     WHERE is_deleted = FALSE AND btrim(school) = ANY($1)";

pub async fn connect(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;
    Ok(pool)
}

pub async fn init_db(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> Result<u64> {
    let dissertations = vec![
        (
            "seed-001",
            "Sarton, George",
            "The History of Science and the New Humanism",
            Some(1911),
            Some("Ghent University"),
            Some("History of Science"),
            Some("History of Science"),
        ),
        (
            "seed-002",
            "Kuhn, Thomas S.",
            "The Cohesive Energy of Monovalent Metals as a Function of Their Atomic Quantum Defects",
            Some(1949),
            Some("Harvard University"),
            Some("Science"),
            Some("Physics"),
        ),
        (
            "seed-003",
            "Cohen, I. Bernard",
            "Franklin and Newton",
            Some(1947),
            Some("Harvard University"),
            Some("History of Science"),
            Some("History of Science"),
        ),
        (
            "seed-004",
            "Guerlac, Henry",
            "Science and War in the Old Regime",
            Some(1941),
            Some("Harvard University"),
            Some("History of Science"),
            Some("History"),
        ),
        (
            "seed-005",
            "Temkin, Owsei",
            "Der systematische Zusammenhang im Corpus Hippocraticum",
            Some(1927),
            Some("Leipzig University"),
            Some("History of Medicine"),
            Some("Medicine"),
        ),
        (
            "seed-006",
            "Clagett, Marshall",
            "Giovanni Marliani and Late Medieval Physics",
            Some(1941),
            Some("Columbia University"),
            Some("History of Science"),
            Some("History"),
        ),
        (
            "seed-007",
            "Unknown",
            "Manuscript notes on early chemistry",
            None,
            Some("Columbia University"),
            None,
            Some("Unknown"),
        ),
    ];

    let mut inserted = 0u64;
    for (source_key, author, title, year, school, subject, department) in dissertations {
        let result = sqlx::query(
            r#"
            INSERT INTO dissertations
            (id, source_key, author_name, title, year, school, subject_broad, department_broad)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(source_key)
        .bind(author)
        .bind(title)
        .bind(year)
        .bind(school)
        .bind(subject)
        .bind(department)
        .execute(pool)
        .await?;

        inserted += result.rows_affected();
    }

    Ok(inserted)
}

fn summary_from_row(row: &sqlx::postgres::PgRow) -> DissertationSummary {
    DissertationSummary {
        year: row.get("year"),
        school: row.get("school"),
        subject_broad: row.get("subject_broad"),
        department_broad: row.get("department_broad"),
    }
    .normalized()
}

/// Paginated reader over the live rows of the `dissertations` table.
#[derive(Clone)]
pub struct PgSource {
    pool: PgPool,
}

impl PgSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn fetch_page(&self, offset: i64) -> Result<Vec<DissertationSummary>> {
        let rows = sqlx::query(
            "SELECT year, school, subject_broad, department_broad \
             FROM dissertations \
             WHERE is_deleted = FALSE \
             ORDER BY id \
             LIMIT $1 OFFSET $2",
        )
        .bind(PAGE_SIZE)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(summary_from_row).collect())
    }
}

#[async_trait]
impl RecordSource for PgSource {
    async fn fetch_all(&self) -> Result<Vec<DissertationSummary>> {
        let mut records = Vec::new();
        let mut offset = 0i64;

        loop {
            let page = self.fetch_page(offset).await?;
            let fetched = page.len() as i64;
            records.extend(page);
            debug!("Fetched {} records (total: {})", fetched, records.len());

            if fetched < PAGE_SIZE {
                break;
            }
            offset += PAGE_SIZE;
        }

        info!("Fetched {} dissertations from database", records.len());
        Ok(records)
    }

    async fn fetch_schools(&self, schools: &[String]) -> Result<Vec<DissertationSummary>> {
        let rows = sqlx::query(SCHOOL_ROWS_SQL)
            .bind(schools)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(summary_from_row).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn school_filter_matches_trimmed_names() {
        assert!(SCHOOL_ROWS_SQL.contains("btrim(school) = ANY($1)"));
        assert!(SCHOOL_ROWS_SQL.contains("is_deleted = FALSE"));
    }
}
