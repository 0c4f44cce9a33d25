use std::collections::HashMap;

use crate::models::{
    DissertationSummary, ParetoEntry, ParetoSummary, SchoolRecord, SchoolsReport, ShareBucket,
    TopNComparison,
};

pub const TOP_SCHOOLS: usize = 10;
pub const TOP_QUARTILE: f64 = 0.25;

/// Groups records by school, ranked by count. Equal counts keep first-seen order.
pub fn aggregate_schools(records: &[DissertationSummary]) -> SchoolsReport {
    let mut schools: Vec<SchoolRecord> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for record in records {
        let Some(name) = record.school.as_deref().filter(|name| !name.is_empty()) else {
            continue;
        };

        let slot = *index.entry(name).or_insert_with(|| {
            schools.push(SchoolRecord {
                name: name.to_string(),
                count: 0,
                min_year: None,
                max_year: None,
            });
            schools.len() - 1
        });

        let school = &mut schools[slot];
        school.count += 1;
        if let Some(year) = record.year {
            school.min_year = Some(school.min_year.map_or(year, |min| min.min(year)));
            school.max_year = Some(school.max_year.map_or(year, |max| max.max(year)));
        }
    }

    // Vec::sort_by is stable.
    schools.sort_by(|a, b| b.count.cmp(&a.count));

    let pareto = pareto_summary(&schools);
    SchoolsReport { schools, pareto }
}

pub fn pareto_summary(schools: &[SchoolRecord]) -> ParetoSummary {
    let counts: Vec<u64> = schools.iter().map(|school| school.count).collect();
    let (top_10_count, top_10_percent) = top_share(schools, TOP_SCHOOLS);
    let (top_25_percent_count, top_25_percent) = top_share(schools, top_quartile_len(schools.len()));

    ParetoSummary {
        top_10_count,
        top_10_percent,
        top_25_percent_count,
        top_25_percent,
        gini: gini(&counts),
    }
}

pub fn total_count(schools: &[SchoolRecord]) -> u64 {
    schools.iter().map(|school| school.count).sum()
}

/// Number of schools in the top quarter, rounded up.
pub fn top_quartile_len(school_count: usize) -> usize {
    (school_count as f64 * TOP_QUARTILE).ceil() as usize
}

/// Count held by the first `k` ranked schools and its share of the total.
pub fn top_share(schools: &[SchoolRecord], k: usize) -> (u64, f64) {
    let top: u64 = schools.iter().take(k).map(|school| school.count).sum();
    (top, ratio(top, total_count(schools)))
}

pub(crate) fn ratio(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

pub fn gini(values: &[u64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let n = sorted.len() as f64;
    let total: u64 = sorted.iter().sum();
    if total == 0 {
        return 0.0;
    }

    let weighted: f64 = sorted
        .iter()
        .enumerate()
        .map(|(i, value)| (i as f64 + 1.0) * *value as f64)
        .sum();

    let gini = (2.0 * weighted) / (n * total as f64) - (n + 1.0) / n;
    gini.clamp(0.0, 1.0)
}

/// Ranks schools by count and annotates each with its cumulative share.
pub fn pareto_entries(schools: &[SchoolRecord]) -> Vec<ParetoEntry> {
    let mut sorted = schools.to_vec();
    sorted.sort_by(|a, b| b.count.cmp(&a.count));

    let total = total_count(&sorted);
    let len = sorted.len();
    let mut cumulative = 0u64;

    sorted
        .into_iter()
        .enumerate()
        .map(|(index, school)| {
            cumulative += school.count;
            ParetoEntry {
                percentage: ratio(school.count, total),
                cumulative_percentage: ratio(cumulative, total),
                school_percentile: (index + 1) as f64 / len as f64,
                rank: index + 1,
                name: school.name,
                count: school.count,
                min_year: school.min_year,
                max_year: school.max_year,
            }
        })
        .collect()
}

/// Top `n` schools against the rest. `n == 0` means the default of ten.
pub fn top_n_comparison(schools: &[SchoolRecord], n: usize) -> Option<TopNComparison> {
    if schools.is_empty() {
        return None;
    }

    let mut sorted = schools.to_vec();
    sorted.sort_by(|a, b| b.count.cmp(&a.count));

    let requested = if n == 0 { TOP_SCHOOLS } else { n };
    let top_n = requested.min(sorted.len());
    let total = total_count(&sorted);
    let top_count: u64 = sorted[..top_n].iter().map(|school| school.count).sum();
    let rest_count = total - top_count;

    Some(TopNComparison {
        label: format!("Top {top_n}"),
        top_n,
        total_schools: sorted.len(),
        top: ShareBucket {
            count: top_count,
            percentage: ratio(top_count, total),
            schools: top_n,
        },
        rest: ShareBucket {
            count: rest_count,
            percentage: ratio(rest_count, total),
            schools: sorted.len() - top_n,
        },
    })
}
