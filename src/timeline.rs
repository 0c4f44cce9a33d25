use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{DissertationSummary, PeriodCount, Timeline, YearCount};

/// Year span reported when no record carries a year.
pub const DEFAULT_YEAR_RANGE: (i32, i32) = (1878, 2025);

pub const FIVE_YEAR_INTERVAL: i32 = 5;
pub const DECADE_INTERVAL: i32 = 10;

pub fn count_by_year(records: &[DissertationSummary]) -> BTreeMap<i32, u64> {
    let mut counts = BTreeMap::new();
    for year in records.iter().filter_map(|record| record.year) {
        *counts.entry(year).or_insert(0u64) += 1;
    }
    counts
}

/// Observed `(min, max)` year, or `None` when no record has one.
pub fn observed_year_range(counts: &BTreeMap<i32, u64>) -> Option<(i32, i32)> {
    let min = counts.keys().next()?;
    let max = counts.keys().next_back()?;
    Some((*min, *max))
}

pub fn build_timeline(records: &[DissertationSummary]) -> Timeline {
    let counts = count_by_year(records);
    let (min_year, max_year) = observed_year_range(&counts).unwrap_or(DEFAULT_YEAR_RANGE);

    let by_year: Vec<YearCount> = (min_year..=max_year)
        .map(|year| YearCount {
            year,
            count: counts.get(&year).copied().unwrap_or(0),
        })
        .collect();

    let by_5year = aggregate_by_interval(&by_year, FIVE_YEAR_INTERVAL);
    let by_decade = aggregate_by_interval(&by_year, DECADE_INTERVAL);

    Timeline {
        by_year,
        by_5year,
        by_decade,
    }
}

pub fn period_start(year: i32, interval: i32) -> i32 {
    year.div_euclid(interval) * interval
}

pub fn period_label(start: i32, interval: i32) -> String {
    if interval == DECADE_INTERVAL {
        format!("{start}s")
    } else {
        format!("{}-{}", start, start + interval - 1)
    }
}

/// Sums yearly buckets into periods of `interval` years, ascending by start.
pub fn aggregate_by_interval(buckets: &[YearCount], interval: i32) -> Vec<PeriodCount> {
    let interval = interval.max(1);
    let mut groups: BTreeMap<i32, u64> = BTreeMap::new();

    for bucket in buckets {
        *groups.entry(period_start(bucket.year, interval)).or_insert(0) += bucket.count;
    }

    groups
        .into_iter()
        .map(|(start, count)| PeriodCount {
            period: period_label(start, interval),
            start,
            count,
        })
        .collect()
}

pub fn filter_by_year_range(buckets: &[YearCount], min_year: i32, max_year: i32) -> Vec<YearCount> {
    buckets
        .iter()
        .filter(|bucket| bucket.year >= min_year && bucket.year <= max_year)
        .copied()
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YearAverage {
    pub year: i32,
    pub average: f64,
}

/// Trailing mean over `window` buckets; early points average the available prefix.
pub fn rolling_average(buckets: &[YearCount], window: usize) -> Vec<YearAverage> {
    let window = window.max(1);
    let mut running = 0u64;

    buckets
        .iter()
        .enumerate()
        .map(|(index, bucket)| {
            running += bucket.count;
            if index >= window {
                running -= buckets[index - window].count;
            }
            let span = (index + 1).min(window);
            YearAverage {
                year: bucket.year,
                average: running as f64 / span as f64,
            }
        })
        .collect()
}
