use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

/// Projection of a catalog record used by every aggregation stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DissertationSummary {
    pub year: Option<i32>,
    pub school: Option<String>,
    pub subject_broad: Option<String>,
    pub department_broad: Option<String>,
}

impl DissertationSummary {
    pub fn new(year: Option<i32>, school: Option<&str>) -> Self {
        Self {
            year,
            school: school.map(str::to_string),
            subject_broad: None,
            department_broad: None,
        }
        .normalized()
    }

    /// Trims text fields; blank ones become `None`. Any present year is kept,
    /// including zero and negative (BCE) years.
    pub fn normalized(self) -> Self {
        Self {
            year: self.year,
            school: clean_text(self.school),
            subject_broad: clean_text(self.subject_broad),
            department_broad: clean_text(self.department_broad),
        }
    }
}

fn clean_text(value: Option<String>) -> Option<String> {
    value.and_then(|raw| {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed.len() == raw.len() {
            Some(raw)
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearCount {
    pub year: i32,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodCount {
    pub period: String,
    pub start: i32,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub by_year: Vec<YearCount>,
    pub by_5year: Vec<PeriodCount>,
    pub by_decade: Vec<PeriodCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchoolRecord {
    pub name: String,
    pub count: u64,
    pub min_year: Option<i32>,
    pub max_year: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParetoSummary {
    pub top_10_count: u64,
    pub top_10_percent: f64,
    pub top_25_percent_count: u64,
    pub top_25_percent: f64,
    pub gini: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchoolsReport {
    pub schools: Vec<SchoolRecord>,
    pub pareto: ParetoSummary,
}

/// A ranked school annotated with its share of the catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParetoEntry {
    pub name: String,
    pub count: u64,
    pub min_year: Option<i32>,
    pub max_year: Option<i32>,
    pub rank: usize,
    pub percentage: f64,
    #[serde(rename = "cumulativePercentage")]
    pub cumulative_percentage: f64,
    #[serde(rename = "schoolPercentile")]
    pub school_percentile: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShareBucket {
    pub count: u64,
    pub percentage: f64,
    pub schools: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopNComparison {
    pub label: String,
    #[serde(rename = "topN")]
    pub top_n: usize,
    #[serde(rename = "totalSchools")]
    pub total_schools: usize,
    pub top: ShareBucket,
    pub rest: ShareBucket,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_dissertations: u64,
    pub total_schools: u64,
    pub year_range: [i32; 2],
    pub mean_per_year: f64,
    pub median_per_year: f64,
    pub growth_rates: BTreeMap<String, f64>,
    pub hhi: f64,
    pub gini: f64,
    pub top_10_share: f64,
    pub top_25_share: f64,
}

/// Per-school sparse yearly counts, keyed in selection order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchoolTimeseries {
    entries: Vec<(String, Vec<YearCount>)>,
}

impl SchoolTimeseries {
    pub fn insert(&mut self, school: String, series: Vec<YearCount>) {
        match self.entries.iter_mut().find(|(name, _)| *name == school) {
            Some(entry) => entry.1 = series,
            None => self.entries.push((school, series)),
        }
    }

    pub fn get(&self, school: &str) -> Option<&[YearCount]> {
        self.entries
            .iter()
            .find(|(name, _)| name == school)
            .map(|(_, series)| series.as_slice())
    }

    pub fn schools(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for SchoolTimeseries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (school, series) in &self.entries {
            map.serialize_entry(school, series)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub generated_at: DateTime<Utc>,
    pub record_count: u64,
    pub year_range: [i32; 2],
    pub school_count: u64,
    pub snapshot_id: Uuid,
}
