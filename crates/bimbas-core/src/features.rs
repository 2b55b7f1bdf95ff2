//! Converts an activity list for one contributor into the 38-column
//! behavioral feature row the classifier scores.
//!
//! Numerical definitions (Gini, quantile method, sample std edge cases) are
//! grounded on `original_source/.../predictor/features.py`: quantiles use
//! linear interpolation (the `pandas`/`numpy` `"linear"` default that source
//! relies on via `Series.quantile`), sample std is ddof=1 and 0 for a
//! single-element or NaN result, and Gini drops zeros before ranking.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use chrono::{DateTime, Utc};

use crate::error::BimbasError;
use crate::mapping::Activity;

/// The 38 feature names, in the exact column order the classifier expects.
pub const FEATURE_NAMES: [&str; 38] = [
    "NA", "NT", "NOR", "ORR", "DCA_mean", "DCA_median", "DCA_std", "DCA_gini", "NAR_mean",
    "NAR_median", "NAR_gini", "NAR_IQR", "NTR_mean", "NTR_median", "NTR_std", "NTR_gini",
    "NCAR_mean", "NCAR_std", "NCAR_IQR", "DCAR_mean", "DCAR_median", "DCAR_std", "DCAR_IQR",
    "DAAR_mean", "DAAR_median", "DAAR_std", "DAAR_gini", "DAAR_IQR", "DCAT_mean", "DCAT_median",
    "DCAT_std", "DCAT_gini", "DCAT_IQR", "NAT_mean", "NAT_median", "NAT_std", "NAT_gini",
    "NAT_IQR",
];

/// One contributor's 38-dimensional feature row, labeled by login.
///
/// A fixed-field struct rather than a `HashMap` so column order is a
/// compile-time property: [`FeatureRow::iter_ordered`] and
/// [`FEATURE_NAMES`] are both derived from this same field order and cannot
/// drift apart.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub login: String,
    pub na: i64,
    pub nt: i64,
    pub nor: i64,
    pub orr: f64,
    pub dca_mean: f64,
    pub dca_median: f64,
    pub dca_std: f64,
    pub dca_gini: f64,
    pub nar_mean: f64,
    pub nar_median: f64,
    pub nar_gini: f64,
    pub nar_iqr: f64,
    pub ntr_mean: f64,
    pub ntr_median: f64,
    pub ntr_std: f64,
    pub ntr_gini: f64,
    pub ncar_mean: f64,
    pub ncar_std: f64,
    pub ncar_iqr: f64,
    pub dcar_mean: f64,
    pub dcar_median: f64,
    pub dcar_std: f64,
    pub dcar_iqr: f64,
    pub daar_mean: f64,
    pub daar_median: f64,
    pub daar_std: f64,
    pub daar_gini: f64,
    pub daar_iqr: f64,
    pub dcat_mean: f64,
    pub dcat_median: f64,
    pub dcat_std: f64,
    pub dcat_gini: f64,
    pub dcat_iqr: f64,
    pub nat_mean: f64,
    pub nat_median: f64,
    pub nat_std: f64,
    pub nat_gini: f64,
    pub nat_iqr: f64,
}

impl FeatureRow {
    /// The 38 values in [`FEATURE_NAMES`] order, ready for tensor
    /// construction or CSV serialization.
    pub fn iter_ordered(&self) -> [(&'static str, f64); 38] {
        let values = [
            self.na as f64,
            self.nt as f64,
            self.nor as f64,
            self.orr,
            self.dca_mean,
            self.dca_median,
            self.dca_std,
            self.dca_gini,
            self.nar_mean,
            self.nar_median,
            self.nar_gini,
            self.nar_iqr,
            self.ntr_mean,
            self.ntr_median,
            self.ntr_std,
            self.ntr_gini,
            self.ncar_mean,
            self.ncar_std,
            self.ncar_iqr,
            self.dcar_mean,
            self.dcar_median,
            self.dcar_std,
            self.dcar_iqr,
            self.daar_mean,
            self.daar_median,
            self.daar_std,
            self.daar_gini,
            self.daar_iqr,
            self.dcat_mean,
            self.dcat_median,
            self.dcat_std,
            self.dcat_gini,
            self.dcat_iqr,
            self.nat_mean,
            self.nat_median,
            self.nat_std,
            self.nat_gini,
            self.nat_iqr,
        ];
        std::array::from_fn(|i| (FEATURE_NAMES[i], values[i]))
    }
}

pub struct ActivityFeatureExtractor;

impl ActivityFeatureExtractor {
    /// Builds the feature row for one contributor's activities.
    ///
    /// Returns `Ok(None)` for an empty activity list — per §4.4, no row is
    /// produced and the classifier is not invoked.
    pub fn extract(login: &str, activities: &[Activity]) -> Result<Option<FeatureRow>, BimbasError> {
        if activities.is_empty() {
            return Ok(None);
        }

        let distinct_logins: HashSet<&str> =
            activities.iter().map(|a| a.actor.login.as_str()).collect();
        if distinct_logins.len() > 1 {
            return Err(BimbasError::MultipleContributors(distinct_logins.len()));
        }

        let mut rows: Vec<Row> = activities
            .iter()
            .map(|a| Row {
                date: a.start_date,
                activity: a.activity.clone(),
                repository_id: a.repository.id,
                owner: a.repository.owner().to_string(),
            })
            .collect();
        rows.sort_by_key(|r| r.date);

        let na = rows.len() as i64;
        let nt = distinct(rows.iter().map(|r| r.activity.as_str())).len() as i64;
        let nor = distinct(rows.iter().map(|r| r.owner.as_str())).len() as i64;
        let distinct_repos = distinct(rows.iter().map(|r| r.repository_id)).len();
        let orr = if distinct_repos == 0 {
            0.0
        } else {
            nor as f64 / distinct_repos as f64
        };

        let dca = pairwise_gaps_hours(&rows);
        let nar = insertion_order_counts(rows.iter().map(|r| r.repository_id));
        let ntr = distinct_per_insertion_group(rows.iter().map(|r| (r.repository_id, r.activity.as_str())));
        let nat = insertion_order_counts(rows.iter().map(|r| r.activity.as_str()));

        let repo_groups = consecutive_groups(rows.iter().map(|r| (r.repository_id, r.date)));
        let kind_groups = consecutive_groups(rows.iter().map(|r| (r.activity.clone(), r.date)));

        let ncar: Vec<f64> = repo_groups.iter().map(|g| g.count as f64).collect();
        let dcar: Vec<f64> = repo_groups.iter().map(|g| hours(g.end - g.start)).collect();
        let daar = time_to_switch_hours(&repo_groups);
        let dcat = time_to_switch_hours(&kind_groups);

        Ok(Some(FeatureRow {
            login: login.to_string(),
            na,
            nt,
            nor,
            orr: round3(orr),
            dca_mean: round3(mean(&dca)),
            dca_median: round3(median(&dca)),
            dca_std: round3(sample_std(&dca)),
            dca_gini: round3(gini(&dca)),
            nar_mean: round3(mean(&nar)),
            nar_median: round3(median(&nar)),
            nar_gini: round3(gini(&nar)),
            nar_iqr: round3(iqr(&nar)),
            ntr_mean: round3(mean(&ntr)),
            ntr_median: round3(median(&ntr)),
            ntr_std: round3(sample_std(&ntr)),
            ntr_gini: round3(gini(&ntr)),
            ncar_mean: round3(mean(&ncar)),
            ncar_std: round3(sample_std(&ncar)),
            ncar_iqr: round3(iqr(&ncar)),
            dcar_mean: round3(mean(&dcar)),
            dcar_median: round3(median(&dcar)),
            dcar_std: round3(sample_std(&dcar)),
            dcar_iqr: round3(iqr(&dcar)),
            daar_mean: round3(mean(&daar)),
            daar_median: round3(median(&daar)),
            daar_std: round3(sample_std(&daar)),
            daar_gini: round3(gini(&daar)),
            daar_iqr: round3(iqr(&daar)),
            dcat_mean: round3(mean(&dcat)),
            dcat_median: round3(median(&dcat)),
            dcat_std: round3(sample_std(&dcat)),
            dcat_gini: round3(gini(&dcat)),
            dcat_iqr: round3(iqr(&dcat)),
            nat_mean: round3(mean(&nat)),
            nat_median: round3(median(&nat)),
            nat_std: round3(sample_std(&nat)),
            nat_gini: round3(gini(&nat)),
            nat_iqr: round3(iqr(&nat)),
        }))
    }
}

struct Row {
    date: DateTime<Utc>,
    activity: String,
    repository_id: i64,
    owner: String,
}

struct ConsecutiveGroup {
    count: usize,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

fn hours(d: chrono::Duration) -> f64 {
    d.num_milliseconds() as f64 / (1000.0 * 60.0 * 60.0)
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

fn distinct<T: Eq + Hash>(values: impl Iterator<Item = T>) -> HashSet<T> {
    values.collect()
}

/// `next.date - this.date` for every row but the last, in hours. Empty for
/// a single-row input (the "single activity" edge case).
fn pairwise_gaps_hours(rows: &[Row]) -> Vec<f64> {
    rows.windows(2).map(|w| hours(w[1].date - w[0].date)).collect()
}

/// Groups `keys` in first-occurrence order and counts total occurrences per
/// group (pandas `groupby(sort=False)` equivalent — not a consecutive-run
/// grouping).
fn insertion_order_counts<K: Eq + Hash + Clone>(keys: impl Iterator<Item = K>) -> Vec<f64> {
    let mut order = Vec::new();
    let mut counts: HashMap<K, usize> = HashMap::new();
    for key in keys {
        let count = counts.entry(key.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            order.push(key);
        }
    }
    order.iter().map(|k| counts[k] as f64).collect()
}

/// Groups `(group_key, member)` pairs in first-occurrence order of
/// `group_key` and counts distinct `member` values within each group.
fn distinct_per_insertion_group<G, M>(pairs: impl Iterator<Item = (G, M)>) -> Vec<f64>
where
    G: Eq + Hash + Clone,
    M: Eq + Hash,
{
    let mut order: Vec<G> = Vec::new();
    let mut sets: HashMap<G, HashSet<M>> = HashMap::new();
    for (group, member) in pairs {
        let set = sets.entry(group.clone()).or_insert_with(|| {
            order.push(group.clone());
            HashSet::new()
        });
        set.insert(member);
    }
    order.iter().map(|g| sets[g].len() as f64).collect()
}

/// Marks a new group whenever `key` differs from the previous row's key.
/// Rows must already be in ascending-date order.
fn consecutive_groups<K: PartialEq>(
    rows: impl Iterator<Item = (K, DateTime<Utc>)>,
) -> Vec<ConsecutiveGroup> {
    let mut groups: Vec<ConsecutiveGroup> = Vec::new();
    let mut last_key: Option<K> = None;

    for (key, date) in rows {
        let starts_new_group = match &last_key {
            Some(prev) => prev != &key,
            None => true,
        };
        if starts_new_group {
            groups.push(ConsecutiveGroup {
                count: 1,
                start: date,
                end: date,
            });
        } else if let Some(group) = groups.last_mut() {
            group.count += 1;
            group.end = date;
        }
        last_key = Some(key);
    }

    groups
}

/// `next_group.start - this_group.end` for every group but the last, in
/// hours. Empty when fewer than two groups exist (the "single activity"
/// edge case, since one activity is one group).
fn time_to_switch_hours(groups: &[ConsecutiveGroup]) -> Vec<f64> {
    groups
        .windows(2)
        .map(|w| hours(w[1].start - w[0].end))
        .collect()
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        0.0
    } else {
        xs.iter().sum::<f64>() / xs.len() as f64
    }
}

fn sorted(xs: &[f64]) -> Vec<f64> {
    let mut xs = xs.to_vec();
    xs.sort_by(f64::total_cmp);
    xs
}

/// Linear-interpolation quantile, the `pandas`/`numpy` `"linear"` default.
fn quantile(xs_sorted: &[f64], q: f64) -> f64 {
    if xs_sorted.is_empty() {
        return 0.0;
    }
    if xs_sorted.len() == 1 {
        return xs_sorted[0];
    }
    let idx = q * (xs_sorted.len() - 1) as f64;
    let lo = idx.floor() as usize;
    let hi = idx.ceil() as usize;
    if lo == hi {
        xs_sorted[lo]
    } else {
        let frac = idx - lo as f64;
        xs_sorted[lo] + (xs_sorted[hi] - xs_sorted[lo]) * frac
    }
}

fn median(xs: &[f64]) -> f64 {
    quantile(&sorted(xs), 0.5)
}

fn iqr(xs: &[f64]) -> f64 {
    let s = sorted(xs);
    quantile(&s, 0.75) - quantile(&s, 0.25)
}

/// Sample standard deviation (ddof=1); 0 for fewer than two values or a NaN
/// result.
fn sample_std(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let m = mean(xs);
    let variance = xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (xs.len() - 1) as f64;
    let std = variance.sqrt();
    if std.is_nan() {
        0.0
    } else {
        std
    }
}

/// Drops zeros, then `sum((2i - n - 1) * x_i) / (n * sum(x_i))` over the
/// ascending-sorted remainder, `i` 1-indexed. 0 if nothing remains after
/// dropping zeros.
fn gini(xs: &[f64]) -> f64 {
    let filtered: Vec<f64> = xs.iter().copied().filter(|&x| x != 0.0).collect();
    if filtered.is_empty() {
        return 0.0;
    }
    let values = sorted(&filtered);
    let n = values.len() as f64;
    let total: f64 = values.iter().sum();
    if total == 0.0 {
        return 0.0;
    }
    let numerator: f64 = values
        .iter()
        .enumerate()
        .map(|(idx, &x)| {
            let i = (idx + 1) as f64;
            (2.0 * i - n - 1.0) * x
        })
        .sum();
    numerator / (n * total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{Actor, Repo};

    fn activity(login: &str, repo_id: i64, activity: &str, at: &str) -> Activity {
        Activity {
            start_date: at.parse().unwrap(),
            actor: Actor {
                login: login.to_string(),
            },
            repository: Repo {
                id: repo_id,
                name: format!("{login}/repo{repo_id}"),
            },
            activity: activity.to_string(),
        }
    }

    #[test]
    fn empty_activity_list_yields_no_row() {
        assert!(ActivityFeatureExtractor::extract("octocat", &[]).unwrap().is_none());
    }

    #[test]
    fn mixed_contributors_is_an_error() {
        let activities = vec![
            activity("octocat", 1, "push", "2024-01-01T10:00:00Z"),
            activity("other", 1, "push", "2024-01-01T11:00:00Z"),
        ];
        let err = ActivityFeatureExtractor::extract("octocat", &activities).unwrap_err();
        assert!(matches!(err, BimbasError::MultipleContributors(2)));
    }

    #[test]
    fn single_activity_has_zeroed_pairwise_aggregates() {
        let activities = vec![activity("octocat", 1, "push", "2024-01-01T10:00:00Z")];
        let row = ActivityFeatureExtractor::extract("octocat", &activities)
            .unwrap()
            .unwrap();
        assert_eq!(row.na, 1);
        assert_eq!(row.nt, 1);
        assert_eq!(row.nor, 1);
        assert_eq!(row.dca_mean, 0.0);
        assert_eq!(row.dca_gini, 0.0);
        assert_eq!(row.daar_mean, 0.0);
        assert_eq!(row.dcat_mean, 0.0);
    }

    #[test]
    fn counts_and_order_match_spec() {
        assert_eq!(FEATURE_NAMES.len(), 38);
        assert_eq!(FEATURE_NAMES[0], "NA");
        assert_eq!(FEATURE_NAMES[37], "NAT_IQR");

        let activities = vec![
            activity("octocat", 1, "push", "2024-01-01T10:00:00Z"),
            activity("octocat", 1, "push", "2024-01-01T11:00:00Z"),
            activity("octocat", 2, "issue", "2024-01-01T13:00:00Z"),
        ];
        let row = ActivityFeatureExtractor::extract("octocat", &activities)
            .unwrap()
            .unwrap();
        assert_eq!(row.na, 3);
        assert_eq!(row.nt, 2);
        assert_eq!(row.nor, 1);
        let ordered = row.iter_ordered();
        assert_eq!(ordered[0], ("NA", 3.0));
        assert_eq!(ordered.len(), 38);
    }

    #[test]
    fn gini_of_uniform_series_is_zero() {
        assert_eq!(gini(&[2.0, 2.0, 2.0]), 0.0);
    }

    #[test]
    fn gini_is_zero_for_all_zero_series() {
        assert_eq!(gini(&[0.0, 0.0]), 0.0);
    }

    #[test]
    fn gini_is_invariant_to_positive_scaling() {
        let base = gini(&[1.0, 4.0, 10.0]);
        let scaled = gini(&[3.0, 12.0, 30.0]);
        assert!((base - scaled).abs() < 1e-9);
    }

    #[test]
    fn sample_std_of_single_value_is_zero() {
        assert_eq!(sample_std(&[5.0]), 0.0);
    }
}
