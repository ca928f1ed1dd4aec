use std::collections::BTreeMap;

use crate::models::{DailyTotal, FlowRecord, HeatCell, Kpis, StoreTotal};

pub fn daily_totals(records: &[FlowRecord]) -> Vec<DailyTotal> {
    let mut totals = BTreeMap::new();
    for record in records {
        if let Some(date) = record.date {
            *totals.entry(date).or_insert(0.0) += record.flow.unwrap_or(0.0);
        }
    }
    totals
        .into_iter()
        .map(|(date, flow)| DailyTotal { date, flow })
        .collect()
}

pub fn kpis(records: &[FlowRecord]) -> Kpis {
    let daily = daily_totals(records);
    let total_flow = records.iter().filter_map(|r| r.flow).sum();
    let mean_per_day = if daily.is_empty() {
        0.0
    } else {
        daily.iter().map(|d| d.flow).sum::<f64>() / daily.len() as f64
    };

    let mut peak_day: Option<DailyTotal> = None;
    for day in &daily {
        if peak_day.as_ref().map_or(true, |p| day.flow > p.flow) {
            peak_day = Some(day.clone());
        }
    }

    Kpis {
        total_flow,
        mean_per_day,
        days: daily.len(),
        peak_day,
    }
}

pub fn store_ranking(records: &[FlowRecord]) -> Vec<StoreTotal> {
    let mut totals: BTreeMap<(String, String), f64> = BTreeMap::new();
    for record in records {
        *totals
            .entry((record.store.clone(), record.store_id.clone()))
            .or_insert(0.0) += record.flow.unwrap_or(0.0);
    }

    let mut ranking: Vec<StoreTotal> = totals
        .into_iter()
        .map(|((store, store_id), flow)| StoreTotal {
            store,
            store_id,
            flow,
        })
        .collect();
    ranking.sort_by(|a, b| b.flow.partial_cmp(&a.flow).unwrap_or(std::cmp::Ordering::Equal));
    ranking
}

pub fn heatmap(records: &[FlowRecord]) -> Vec<HeatCell> {
    let mut cells = BTreeMap::new();
    for record in records {
        if let (Some(date), Some(hour)) = (record.date, record.hour) {
            *cells.entry((date, hour)).or_insert(0.0) += record.flow.unwrap_or(0.0);
        }
    }
    cells
        .into_iter()
        .map(|((date, hour), flow)| HeatCell { date, hour, flow })
        .collect()
}
