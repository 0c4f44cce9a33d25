use std::collections::{BTreeMap, HashMap};

use crate::models::{DissertationSummary, SchoolRecord, SchoolTimeseries, YearCount};

/// Schools carried in `school_timeseries.json`.
pub const SNAPSHOT_TIMESERIES_SCHOOLS: usize = 50;

/// Upper bound on schools accepted by a comparison request.
pub const COMPARE_MAX_SCHOOLS: usize = 5;

/// Sparse per-year counts for each selected school, in selection order.
pub fn build_school_timeseries<S: AsRef<str>>(
    records: &[DissertationSummary],
    selected: &[S],
) -> SchoolTimeseries {
    let mut per_school: HashMap<&str, BTreeMap<i32, u64>> = selected
        .iter()
        .map(|name| (name.as_ref(), BTreeMap::new()))
        .collect();

    for record in records {
        let (Some(school), Some(year)) = (record.school.as_deref(), record.year) else {
            continue;
        };
        if let Some(years) = per_school.get_mut(school) {
            *years.entry(year).or_insert(0) += 1;
        }
    }

    let mut timeseries = SchoolTimeseries::default();
    for name in selected {
        let name = name.as_ref();
        if timeseries.get(name).is_some() {
            continue;
        }
        let series = per_school
            .remove(name)
            .unwrap_or_default()
            .into_iter()
            .map(|(year, count)| YearCount { year, count })
            .collect();
        timeseries.insert(name.to_string(), series);
    }
    timeseries
}

/// Trimmed, distinct, non-blank school names, capped at [`COMPARE_MAX_SCHOOLS`].
pub fn select_schools<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut schools: Vec<String> = Vec::new();
    for name in names {
        let name = name.as_ref().trim();
        if name.is_empty() || schools.iter().any(|existing| existing == name) {
            continue;
        }
        schools.push(name.to_string());
        if schools.len() == COMPARE_MAX_SCHOOLS {
            break;
        }
    }
    schools
}

pub fn top_school_names(schools: &[SchoolRecord], limit: usize) -> Vec<&str> {
    schools
        .iter()
        .take(limit)
        .map(|school| school.name.as_str())
        .collect()
}
