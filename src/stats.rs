use std::collections::BTreeMap;

use crate::models::{DissertationSummary, PeriodCount, SchoolsReport, Statistics, YearCount};
use crate::schools::{ratio, top_quartile_len, top_share, TOP_SCHOOLS};
use crate::timeline::{
    aggregate_by_interval, count_by_year, observed_year_range, DECADE_INTERVAL, DEFAULT_YEAR_RANGE,
};

pub fn build_statistics(records: &[DissertationSummary], schools: &SchoolsReport) -> Statistics {
    let year_counts = count_by_year(records);
    let (min_year, max_year) = observed_year_range(&year_counts).unwrap_or(DEFAULT_YEAR_RANGE);

    let per_year: Vec<u64> = year_counts.values().copied().collect();
    let (mean_per_year, median_per_year) = mean_median(&per_year);

    let counts: Vec<u64> = schools.schools.iter().map(|school| school.count).collect();

    // Only observed years feed the decade totals, so empty decades never appear.
    let observed: Vec<YearCount> = year_counts
        .iter()
        .map(|(year, count)| YearCount {
            year: *year,
            count: *count,
        })
        .collect();
    let decades = aggregate_by_interval(&observed, DECADE_INTERVAL);

    let (_, top_10_share) = top_share(&schools.schools, TOP_SCHOOLS);
    let (_, top_25_share) = top_share(&schools.schools, top_quartile_len(schools.schools.len()));

    Statistics {
        total_dissertations: records.len() as u64,
        total_schools: schools.schools.len() as u64,
        year_range: [min_year, max_year],
        mean_per_year,
        median_per_year,
        growth_rates: growth_rates(&decades),
        hhi: hhi(&counts),
        gini: schools.pareto.gini,
        top_10_share,
        top_25_share,
    }
}

/// Mean and median of a count distribution; both are 0 for an empty slice.
pub fn mean_median(values: &[u64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }

    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let sum: u64 = sorted.iter().sum();
    let mean = sum as f64 / sorted.len() as f64;

    let mid = sorted.len() / 2;
    let median = if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) as f64 / 2.0
    } else {
        sorted[mid] as f64
    };

    (mean, median)
}

/// Herfindahl-Hirschman index over raw counts.
pub fn hhi(counts: &[u64]) -> f64 {
    let total: u64 = counts.iter().sum();
    counts
        .iter()
        .map(|count| {
            let share = ratio(*count, total);
            share * share
        })
        .sum()
}

/// Relative change between consecutive periods, keyed `"{prev}s_to_{curr}s"`.
/// Transitions out of an empty period are left out.
pub fn growth_rates(periods: &[PeriodCount]) -> BTreeMap<String, f64> {
    periods
        .windows(2)
        .filter(|pair| pair[0].count > 0)
        .map(|pair| {
            let (prev, curr) = (&pair[0], &pair[1]);
            let rate = (curr.count as f64 - prev.count as f64) / prev.count as f64;
            (format!("{}s_to_{}s", prev.start, curr.start), rate)
        })
        .collect()
}
