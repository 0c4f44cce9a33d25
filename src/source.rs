use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::error::Result;
use crate::models::DissertationSummary;

/// Supplies the full set of live (non-deleted) dissertation summaries.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<DissertationSummary>>;

    /// Records belonging to any of `schools`.
    async fn fetch_schools(&self, schools: &[String]) -> Result<Vec<DissertationSummary>> {
        let mut records = self.fetch_all().await?;
        records.retain(|record| {
            record
                .school
                .as_ref()
                .is_some_and(|school| schools.contains(school))
        });
        Ok(records)
    }
}

/// Reads summaries from a catalog CSV export.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[derive(Deserialize)]
struct CsvRow {
    #[serde(default)]
    year: Option<String>,
    #[serde(default)]
    school: Option<String>,
    #[serde(default)]
    subject_broad: Option<String>,
    #[serde(default)]
    department_broad: Option<String>,
}

impl From<CsvRow> for DissertationSummary {
    fn from(row: CsvRow) -> Self {
        DissertationSummary {
            year: row.year.and_then(|raw| raw.trim().parse().ok()),
            school: row.school,
            subject_broad: row.subject_broad,
            department_broad: row.department_broad,
        }
        .normalized()
    }
}

pub fn read_csv<R: std::io::Read>(reader: R) -> Result<Vec<DissertationSummary>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut records = Vec::new();
    for row in reader.deserialize::<CsvRow>() {
        records.push(row?.into());
    }
    Ok(records)
}

#[async_trait]
impl RecordSource for CsvSource {
    async fn fetch_all(&self) -> Result<Vec<DissertationSummary>> {
        let file = std::fs::File::open(&self.path)?;
        let records = read_csv(file)?;
        info!("Read {} records from {}", records.len(), self.path.display());
        Ok(records)
    }
}

/// Fixed in-memory record set.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    records: Vec<DissertationSummary>,
}

impl MemorySource {
    pub fn new(records: Vec<DissertationSummary>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl RecordSource for MemorySource {
    async fn fetch_all(&self) -> Result<Vec<DissertationSummary>> {
        Ok(self.records.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_csv_rows_leniently() {
        let data = "\
title,year,school,subject_broad,department_broad
\"On Kepler, revisited\",1952,Harvard University,History of Science,History
Untitled,unknown,  Yale University ,,
Lost,,,,
";
        let records = read_csv(data.as_bytes()).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].year, Some(1952));
        assert_eq!(records[0].school.as_deref(), Some("Harvard University"));
        assert_eq!(records[0].subject_broad.as_deref(), Some("History of Science"));
        assert_eq!(records[1].year, None);
        assert_eq!(records[1].school.as_deref(), Some("Yale University"));
        assert_eq!(records[1].department_broad, None);
        assert_eq!(records[2], DissertationSummary::default());
    }

    #[test]
    fn tolerates_missing_columns() {
        let data = "year,school\n1901,Columbia\n";
        let records = read_csv(data.as_bytes()).unwrap();
        assert_eq!(records, vec![DissertationSummary::new(Some(1901), Some("Columbia"))]);
    }

    #[tokio::test]
    async fn memory_source_returns_its_records() {
        let source = MemorySource::new(vec![DissertationSummary::new(Some(1930), Some("MIT"))]);
        let records = source.fetch_all().await.unwrap();
        assert_eq!(records.len(), 1);
    }
}
