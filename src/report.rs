use std::fmt::Write;

use crate::models::{DissertationSummary, YearCount};
use crate::schools::{pareto_entries, top_n_comparison};
use crate::snapshot::Snapshot;
use crate::timeline::rolling_average;

/// Window used for the smoothed peak in the report.
pub const SMOOTHING_WINDOW: usize = 5;

pub fn peak_year(buckets: &[YearCount]) -> Option<YearCount> {
    buckets
        .iter()
        .copied()
        .max_by(|a, b| a.count.cmp(&b.count).then(b.year.cmp(&a.year)))
        .filter(|bucket| bucket.count > 0)
}

pub fn subject_mix(records: &[DissertationSummary]) -> Vec<(String, usize)> {
    let mut map: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();

    for subject in records.iter().filter_map(|r| r.subject_broad.as_deref()) {
        *map.entry(subject).or_insert(0) += 1;
    }

    let mut mix: Vec<(String, usize)> = map
        .into_iter()
        .map(|(subject, count)| (subject.to_string(), count))
        .collect();
    mix.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    mix
}

pub fn build_report(records: &[DissertationSummary], snapshot: &Snapshot, top: usize) -> String {
    let stats = &snapshot.statistics;
    let mut output = String::new();

    let _ = writeln!(output, "# Dissertation Catalog Report");
    let _ = writeln!(
        output,
        "Generated {} from {} records ({}-{})",
        snapshot.meta.generated_at.format("%Y-%m-%d %H:%M UTC"),
        stats.total_dissertations,
        stats.year_range[0],
        stats.year_range[1]
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Output");
    let _ = writeln!(
        output,
        "- Mean per year: {:.1}, median per year: {:.1}",
        stats.mean_per_year, stats.median_per_year
    );

    match peak_year(&snapshot.timeline.by_year) {
        Some(peak) => {
            let _ = writeln!(output, "- Peak year: {} ({} dissertations)", peak.year, peak.count);
        }
        None => {
            let _ = writeln!(output, "- No dated dissertations recorded.");
        }
    }

    let smoothed = rolling_average(&snapshot.timeline.by_year, SMOOTHING_WINDOW);
    if let Some(peak) = smoothed
        .iter()
        .filter(|point| point.average > 0.0)
        .max_by(|a, b| a.average.total_cmp(&b.average))
    {
        let _ = writeln!(
            output,
            "- Highest {}-year average: {:.1} ending {}",
            SMOOTHING_WINDOW, peak.average, peak.year
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Decade Growth");

    if stats.growth_rates.is_empty() {
        let _ = writeln!(output, "Not enough dated records to compare decades.");
    } else {
        for (transition, rate) in stats.growth_rates.iter() {
            let _ = writeln!(output, "- {}: {:+.1}%", transition.replace('_', " "), rate * 100.0);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Concentration");
    let _ = writeln!(
        output,
        "- {} schools, Gini {:.3}, HHI {:.4}",
        stats.total_schools, stats.gini, stats.hhi
    );
    let _ = writeln!(
        output,
        "- Top 10 schools hold {:.1}%, top quarter holds {:.1}%",
        stats.top_10_share * 100.0,
        stats.top_25_share * 100.0
    );
    if let Some(comparison) = top_n_comparison(&snapshot.schools.schools, top) {
        let _ = writeln!(
            output,
            "- {} vs remaining {} schools: {} / {} dissertations",
            comparison.label, comparison.rest.schools, comparison.top.count, comparison.rest.count
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Leading Schools");

    let ranked = pareto_entries(&snapshot.schools.schools);
    if ranked.is_empty() {
        let _ = writeln!(output, "No schools recorded.");
    } else {
        for entry in ranked.iter().take(top.max(1)) {
            let span = match (entry.min_year, entry.max_year) {
                (Some(min), Some(max)) => format!("{min}-{max}"),
                _ => "undated".to_string(),
            };
            let _ = writeln!(
                output,
                "{}. {} ({}) {} dissertations, {:.1}% cumulative",
                entry.rank,
                entry.name,
                span,
                entry.count,
                entry.cumulative_percentage * 100.0
            );
        }
    }

    let mix = subject_mix(records);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Subject Mix");

    if mix.is_empty() {
        let _ = writeln!(output, "No subjects recorded.");
    } else {
        for (subject, count) in mix.iter().take(8) {
            let _ = writeln!(output, "- {}: {}", subject, count);
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(year: i32, school: &str, subject: &str) -> DissertationSummary {
        DissertationSummary {
            year: Some(year),
            school: Some(school.to_string()),
            subject_broad: Some(subject.to_string()),
            department_broad: None,
        }
    }

    #[test]
    fn peak_prefers_earliest_of_equal_years() {
        let buckets = vec![
            YearCount { year: 1900, count: 2 },
            YearCount { year: 1901, count: 5 },
            YearCount { year: 1902, count: 5 },
        ];
        assert_eq!(peak_year(&buckets).unwrap().year, 1901);
        assert!(peak_year(&[YearCount { year: 1900, count: 0 }]).is_none());
    }

    #[test]
    fn subject_mix_orders_by_count() {
        let records = vec![
            record(1950, "A", "History"),
            record(1951, "A", "Medicine"),
            record(1952, "B", "Medicine"),
        ];
        assert_eq!(
            subject_mix(&records),
            vec![("Medicine".to_string(), 2), ("History".to_string(), 1)]
        );
    }

    #[test]
    fn report_lists_sections() {
        let records = vec![
            record(1951, "Harvard University", "History of Science"),
            record(1962, "Harvard University", "History of Science"),
            record(1963, "Yale University", "History of Medicine"),
        ];
        let snapshot = Snapshot::build(&records, Utc::now());
        let report = build_report(&records, &snapshot, 10);

        assert!(report.contains("# Dissertation Catalog Report"));
        assert!(report.contains("- Peak year: 1951 (1 dissertations)"));
        assert!(report.contains("1950s to 1960s: +100.0%"));
        assert!(report.contains("1. Harvard University (1951-1962) 2 dissertations"));
        assert!(report.contains("- History of Science: 2"));
    }

    #[test]
    fn empty_catalog_report_does_not_panic() {
        let snapshot = Snapshot::build(&[], Utc::now());
        let report = build_report(&[], &snapshot, 10);
        assert!(report.contains("No dated dissertations recorded."));
        assert!(report.contains("No schools recorded."));
    }
}
