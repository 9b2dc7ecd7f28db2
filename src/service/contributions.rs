use crate::github::types::{GitHubEvent, ISSUES_EVENT, PULL_REQUEST_EVENT, PUSH_EVENT};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use tracing::debug;

/// Activity weight of a single event. Pushes count their commits (never less than 1),
/// pull requests and issues count once, everything else is ignored.
pub fn event_weight(event: &GitHubEvent) -> i64 {
    match event.kind.as_str() {
        PUSH_EVENT => match event.payload.size {
            Some(size) if size > 0 => size,
            _ => 1,
        },
        PULL_REQUEST_EVENT | ISSUES_EVENT => 1,
        _ => 0,
    }
}

/// Group a batch of events into per-day activity counts keyed by UTC calendar date.
///
/// Dates whose events all weigh zero produce no entry. Events with an unparseable
/// `created_at` are skipped individually.
pub fn derive_contributions(events: &[GitHubEvent]) -> BTreeMap<NaiveDate, i64> {
    let mut by_date = BTreeMap::new();
    for event in events {
        let weight = event_weight(event);
        if weight == 0 {
            continue;
        }
        let date = match DateTime::parse_from_rfc3339(&event.created_at) {
            Ok(ts) => ts.with_timezone(&Utc).date_naive(),
            Err(e) => {
                debug!(created_at = %event.created_at, error = %e, "skipping event with bad timestamp");
                continue;
            }
        };
        *by_date.entry(date).or_insert(0) += weight;
    }
    by_date
}
