use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::config::Thresholds;
use crate::filter::FlowFilter;
use crate::models::{BaselineRow, FlowRecord, Status};

/// Daily totals per store with a trailing rolling baseline and status.
///
/// Rows come back ordered by store then date. The window includes the day
/// itself; a baseline only exists once `max(2, window / 2)` days have been
/// observed for that store.
pub fn compute_alerts(records: &[FlowRecord], window: usize, thresholds: Thresholds) -> Vec<BaselineRow> {
    if records.is_empty() {
        return Vec::new();
    }

    let window = window.max(1);
    let min_periods = min_periods(window);
    let daily = daily_store_totals(records);

    let mut rows = Vec::with_capacity(daily.len());
    let mut current_store: Option<&str> = None;
    let mut history: Vec<f64> = Vec::new();

    for ((store, date, store_id), flow) in &daily {
        if current_store != Some(store.as_str()) {
            current_store = Some(store.as_str());
            history.clear();
        }
        history.push(*flow);

        let baseline = rolling_mean(&history, window, min_periods);
        let var_pct = baseline.and_then(|b| variation_pct(*flow, b));

        rows.push(BaselineRow {
            store: store.clone(),
            store_id: store_id.clone(),
            date: *date,
            flow: *flow,
            baseline,
            var_pct,
            status: classify(var_pct, thresholds),
        });
    }

    rows
}

pub fn min_periods(window: usize) -> usize {
    (window / 2).max(2)
}

fn daily_store_totals(records: &[FlowRecord]) -> BTreeMap<(String, NaiveDate, String), f64> {
    let mut totals = BTreeMap::new();
    for record in records {
        let Some(date) = record.date else {
            continue;
        };
        let entry = totals
            .entry((record.store.clone(), date, record.store_id.clone()))
            .or_insert(0.0);
        *entry += record.flow.unwrap_or(0.0);
    }
    totals
}

fn rolling_mean(history: &[f64], window: usize, min_periods: usize) -> Option<f64> {
    let start = history.len().saturating_sub(window);
    let tail = &history[start..];
    if tail.len() < min_periods {
        return None;
    }
    Some(tail.iter().sum::<f64>() / tail.len() as f64)
}

pub fn variation_pct(flow: f64, baseline: f64) -> Option<f64> {
    (baseline > 0.0).then(|| (flow - baseline) / baseline * 100.0)
}

/// Only declines beyond a threshold alert; growth is always on time.
pub fn classify(var_pct: Option<f64>, thresholds: Thresholds) -> Status {
    match var_pct {
        None => Status::Unknown,
        Some(v) if v <= -thresholds.critical_pct() => Status::Critical,
        Some(v) if v <= -thresholds.warn_pct() => Status::Alert,
        Some(_) => Status::OnTime,
    }
}

pub fn last_day_alerts(rows: &[BaselineRow], filter: &FlowFilter) -> Vec<BaselineRow> {
    let in_scope: Vec<&BaselineRow> = rows
        .iter()
        .filter(|row| filter.admits_day(&row.store, row.date))
        .collect();

    let Some(last_day) = in_scope.iter().map(|row| row.date).max() else {
        return Vec::new();
    };

    let mut latest: Vec<BaselineRow> = in_scope
        .into_iter()
        .filter(|row| row.date == last_day)
        .cloned()
        .collect();
    latest.sort_by(|a, b| a.status.cmp(&b.status).then_with(|| cmp_nulls_last(a.var_pct, b.var_pct)));
    latest
}

fn cmp_nulls_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
