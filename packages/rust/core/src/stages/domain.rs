//! Domain-keyed stages: aggregation, location grouping, deduplication and the
//! aggregate join.
//!
//! All of them group by [`Record::domain_key`] and keep first-seen order.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use sieve_shared::{JoinMiss, Record, Result};

use super::{Join, Transform, require_count, require_domain};

// ---------------------------------------------------------------------------
// Aggregate
// ---------------------------------------------------------------------------

/// Emits one record per domain carrying the summed occurrence count.
///
/// Output records have `domain` set and `url` equal to the domain.
#[derive(Debug, Clone, Default)]
pub struct AggregateByDomain;

#[async_trait]
impl Transform for AggregateByDomain {
    fn name(&self) -> &'static str {
        "aggregate-by-domain"
    }

    async fn apply(&self, input: &[Record]) -> Result<Vec<Record>> {
        let mut order: Vec<String> = Vec::new();
        let mut totals: HashMap<String, u64> = HashMap::new();

        for record in input {
            let domain = require_domain(record)?;
            let count = require_count(record)?;

            match totals.get_mut(&domain) {
                Some(total) => *total = total.saturating_add(count),
                None => {
                    totals.insert(domain.clone(), count);
                    order.push(domain);
                }
            }
        }

        Ok(order
            .into_iter()
            .map(|domain| {
                let total = totals.get(&domain).copied().unwrap_or_default();
                Record {
                    url: domain.clone(),
                    domain: Some(domain),
                    occurrence_count: Some(total),
                    ..Record::default()
                }
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Location grouping
// ---------------------------------------------------------------------------

/// Replaces each record's locations with every distinct location seen for its domain.
#[derive(Debug, Clone, Default)]
pub struct GroupLocationsByDomain;

#[async_trait]
impl Transform for GroupLocationsByDomain {
    fn name(&self) -> &'static str {
        "group-locations-by-domain"
    }

    async fn apply(&self, input: &[Record]) -> Result<Vec<Record>> {
        // One pass to collect per-domain locations, one to assign them.
        let mut by_domain: HashMap<String, Vec<String>> = HashMap::new();
        let mut keys = Vec::with_capacity(input.len());

        for record in input {
            let domain = require_domain(record)?;
            let locations = by_domain.entry(domain.clone()).or_default();
            for location in &record.locations {
                if !locations.contains(location) {
                    locations.push(location.clone());
                }
            }
            keys.push(domain);
        }

        Ok(input
            .iter()
            .zip(keys)
            .map(|(record, domain)| Record {
                locations: by_domain.get(&domain).cloned().unwrap_or_default(),
                ..record.clone()
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Deduplication
// ---------------------------------------------------------------------------

/// Keeps the first record per domain, in input order.
#[derive(Debug, Clone, Default)]
pub struct DeduplicateByDomain;

#[async_trait]
impl Transform for DeduplicateByDomain {
    fn name(&self) -> &'static str {
        "deduplicate-by-domain"
    }

    async fn apply(&self, input: &[Record]) -> Result<Vec<Record>> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        for record in input {
            if seen.insert(require_domain(record)?) {
                out.push(record.clone());
            }
        }

        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Join
// ---------------------------------------------------------------------------

/// Merges link records (primary) with aggregate records (secondary) by domain.
///
/// Emits `{url, locations, occurrence_count}` per matched primary record, in
/// primary order. Unmatched records follow the configured [`JoinMiss`] policy.
#[derive(Debug, Clone, Default)]
pub struct JoinAggregate {
    on_missing: JoinMiss,
}

impl JoinAggregate {
    pub fn new(on_missing: JoinMiss) -> Self {
        Self { on_missing }
    }
}

#[async_trait]
impl Join for JoinAggregate {
    fn name(&self) -> &'static str {
        "join-aggregate"
    }

    async fn apply(&self, primary: &[Record], secondary: &[Record]) -> Result<Vec<Record>> {
        let mut counts: HashMap<String, u64> = HashMap::new();
        for aggregate in secondary {
            let domain = require_domain(aggregate)?;
            let count = require_count(aggregate)?;
            // first match wins
            counts.entry(domain).or_insert(count);
        }

        let mut out = Vec::with_capacity(primary.len());
        for record in primary {
            let domain = require_domain(record)?;
            let count = match (counts.get(&domain), self.on_missing) {
                (Some(count), _) => *count,
                (None, JoinMiss::KeepZero) => 0,
                (None, JoinMiss::Drop) => {
                    tracing::debug!(url = %record.url, %domain, "no aggregate for domain, dropping");
                    continue;
                }
            };

            out.push(Record {
                url: record.url.clone(),
                locations: record.locations.clone(),
                occurrence_count: Some(count),
                ..Record::default()
            });
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::link;

    fn aggregate(domain: &str, count: u64) -> Record {
        Record {
            url: domain.into(),
            domain: Some(domain.into()),
            occurrence_count: Some(count),
            ..Record::default()
        }
    }

    #[tokio::test]
    async fn aggregate_sums_per_domain_in_first_seen_order() {
        let input = vec![
            link("http://b.com/1", 2, "UK"),
            link("http://a.com/1", 1, "UK"),
            link("https://b.com/2", 5, "ES"),
            link("http://a.com/2", 0, "PT"),
        ];
        let out = AggregateByDomain.apply(&input).await.unwrap();
        assert_eq!(out, vec![aggregate("b.com", 7), aggregate("a.com", 1)]);

        let input_total: u64 = input.iter().filter_map(|r| r.occurrence_count).sum();
        let output_total: u64 = out.iter().filter_map(|r| r.occurrence_count).sum();
        assert_eq!(input_total, output_total);
    }

    #[tokio::test]
    async fn aggregate_requires_counts() {
        let mut record = link("http://a.com/", 1, "UK");
        record.occurrence_count = None;
        let err = AggregateByDomain.apply(&[record]).await.unwrap_err();
        assert!(err.to_string().contains("occurrence count"));
    }

    #[tokio::test]
    async fn group_locations_collects_distinct_domain_locations() {
        let input = vec![
            link("http://a.com/x", 1, "UK"),
            link("http://b.com/y", 1, "ES"),
            link("http://a.com/z", 1, "PT"),
            link("http://a.com/x", 1, "UK"),
            link("http://a.com/w", 1, "ES"),
        ];
        let out = GroupLocationsByDomain.apply(&input).await.unwrap();

        assert_eq!(out.len(), input.len());
        for (i, record) in out.iter().enumerate() {
            assert_eq!(record.url, input[i].url);
            let expected: Vec<&str> = if record.url.contains("a.com") {
                vec!["UK", "PT", "ES"]
            } else {
                vec!["ES"]
            };
            assert_eq!(record.locations, expected);
        }
    }

    #[tokio::test]
    async fn dedup_keeps_first_per_domain() {
        let input = vec![
            link("http://a.com/x", 1, "UK"),
            link("http://b.com/y", 2, "ES"),
            link("https://a.com/z", 3, "PT"),
            link("http://c.com/", 4, "UK"),
            link("http://b.com/", 5, "UK"),
        ];
        let out = DeduplicateByDomain.apply(&input).await.unwrap();

        let urls: Vec<&str> = out.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["http://a.com/x", "http://b.com/y", "http://c.com/"]);

        let domains: HashSet<String> = out.iter().filter_map(Record::domain_key).collect();
        assert_eq!(domains.len(), out.len());
    }

    #[tokio::test]
    async fn join_merges_in_primary_order_and_drops_misses() {
        let primary = vec![
            link("http://b.com/z", 1, "ES"),
            link("http://orphan.com/", 1, "UK"),
            link("http://a.com/x", 1, "UK"),
        ];
        let secondary = vec![aggregate("a.com", 2), aggregate("b.com", 1), aggregate("a.com", 9)];

        let out = JoinAggregate::default().apply(&primary, &secondary).await.unwrap();
        assert_eq!(
            out,
            vec![
                Record {
                    url: "http://b.com/z".into(),
                    locations: vec!["ES".into()],
                    occurrence_count: Some(1),
                    ..Record::default()
                },
                Record {
                    url: "http://a.com/x".into(),
                    locations: vec!["UK".into()],
                    occurrence_count: Some(2),
                    ..Record::default()
                },
            ]
        );
    }

    #[tokio::test]
    async fn join_can_keep_misses_with_zero() {
        let primary = vec![link("http://orphan.com/", 7, "UK")];
        let out = JoinAggregate::new(JoinMiss::KeepZero)
            .apply(&primary, &[])
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].occurrence_count, Some(0));
        assert_eq!(out[0].locations, vec!["UK"]);
    }
}
