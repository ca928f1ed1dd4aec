use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::Serialize;

use crate::metrics;
use crate::models::{FlowRecord, HourProfile, PodiumEntry};

pub const PODIUM_SIZE: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreSelection {
    TopN(usize),
    Manual(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SmallMultiples {
    pub stores: Vec<String>,
    pub normalized: bool,
    pub profiles: Vec<HourProfile>,
    pub podium: Vec<PodiumEntry>,
}

impl SmallMultiples {
    pub fn plotted(&self, profile: &HourProfile) -> Option<f64> {
        if self.normalized {
            profile.norm_pct
        } else {
            Some(profile.flow)
        }
    }
}

pub fn ranked_stores(records: &[FlowRecord]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    metrics::store_ranking(records)
        .into_iter()
        .filter(|t| seen.insert(t.store.clone()))
        .map(|t| t.store)
        .collect()
}

pub fn select_stores(records: &[FlowRecord], selection: &StoreSelection) -> Vec<String> {
    let ranked = ranked_stores(records);
    match selection {
        StoreSelection::TopN(n) => ranked.into_iter().take(*n).collect(),
        StoreSelection::Manual(picked) => ranked
            .into_iter()
            .filter(|store| picked.contains(store))
            .collect(),
    }
}

pub fn small_multiples(
    records: &[FlowRecord],
    selection: &StoreSelection,
    normalized: bool,
) -> Option<SmallMultiples> {
    let stores = select_stores(records, selection);
    if stores.is_empty() {
        return None;
    }

    let store_day_hour = store_day_hour_sums(records);
    let chosen = |store: &str| stores.iter().any(|s| s == store);

    // Sum across days for each (store, id, hour).
    let mut period: BTreeMap<(&str, &str, i64), f64> = BTreeMap::new();
    // Per (store, hour): sum and count of the store-day-hour cells plus the days seen.
    let mut per_hour: HashMap<(&str, i64), (f64, usize, BTreeSet<NaiveDate>)> = HashMap::new();

    for ((store, store_id, date, hour), flow) in &store_day_hour {
        let cell = per_hour.entry((*store, *hour)).or_default();
        cell.0 += flow;
        cell.1 += 1;
        cell.2.insert(*date);

        if chosen(*store) {
            *period.entry((*store, *store_id, *hour)).or_insert(0.0) += flow;
        }
    }

    let profiles: Vec<HourProfile> = period
        .iter()
        .map(|((store, store_id, hour), flow)| {
            let (baseline_hora, n_dias) = per_hour
                .get(&(*store, *hour))
                .map(|(sum, count, days)| (Some(sum / *count as f64), Some(days.len())))
                .unwrap_or((None, None));
            let esperado = baseline_hora.zip(n_dias).map(|(b, n)| b * n as f64);
            let norm_pct = esperado
                .filter(|e| *e > 0.0)
                .map(|e| (flow / e - 1.0) * 100.0);

            HourProfile {
                store: store.to_string(),
                store_id: store_id.to_string(),
                hour: *hour,
                flow: *flow,
                baseline_hora,
                n_dias,
                esperado,
                norm_pct,
            }
        })
        .collect();

    let podium = podium(&profiles);

    Some(SmallMultiples {
        stores,
        normalized,
        profiles,
        podium,
    })
}

/// Top stores for each hour; ties keep the first row seen.
pub fn podium(profiles: &[HourProfile]) -> Vec<PodiumEntry> {
    let mut by_hour: BTreeMap<i64, Vec<&HourProfile>> = BTreeMap::new();
    for profile in profiles {
        by_hour.entry(profile.hour).or_default().push(profile);
    }

    let mut entries = Vec::new();
    for (hour, mut rows) in by_hour {
        // Stable sort keeps first appearance on equal flow.
        rows.sort_by(|a, b| b.flow.partial_cmp(&a.flow).unwrap_or(std::cmp::Ordering::Equal));
        entries.extend(rows.into_iter().take(PODIUM_SIZE).enumerate().map(|(idx, p)| {
            PodiumEntry {
                store: p.store.clone(),
                store_id: p.store_id.clone(),
                hour,
                flow: p.flow,
                rank: idx + 1,
            }
        }));
    }
    entries
}

fn store_day_hour_sums(records: &[FlowRecord]) -> BTreeMap<(&str, &str, NaiveDate, i64), f64> {
    let mut sums = BTreeMap::new();
    for record in records {
        let (Some(date), Some(hour)) = (record.date, record.hour) else {
            continue;
        };
        *sums
            .entry((record.store.as_str(), record.store_id.as_str(), date, hour))
            .or_insert(0.0) += record.flow.unwrap_or(0.0);
    }
    sums
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(store: &str, day: u32, hour: i64, flow: f64) -> FlowRecord {
        FlowRecord {
            company: "A".to_string(),
            store: store.to_string(),
            store_id: format!("id-{store}"),
            date: NaiveDate::from_ymd_opt(2024, 1, day),
            hour: Some(hour),
            flow: Some(flow),
        }
    }

    fn sample() -> Vec<FlowRecord> {
        vec![
            record("Big", 1, 9, 100.0),
            record("Big", 2, 9, 50.0),
            record("Big", 1, 10, 30.0),
            record("Mid", 1, 9, 40.0),
            record("Mid", 1, 10, 30.0),
            record("Low", 1, 9, 10.0),
            record("Tiny", 1, 9, 1.0),
        ]
    }

    #[test]
    fn top_n_follows_ranking() {
        assert_eq!(
            select_stores(&sample(), &StoreSelection::TopN(2)),
            vec!["Big".to_string(), "Mid".to_string()]
        );
    }

    #[test]
    fn manual_selection_keeps_ranking_order() {
        let picked = StoreSelection::Manual(vec!["Low".to_string(), "Big".to_string(), "Nope".to_string()]);
        assert_eq!(select_stores(&sample(), &picked), vec!["Big".to_string(), "Low".to_string()]);
    }

    #[test]
    fn empty_selection_yields_none() {
        assert!(small_multiples(&sample(), &StoreSelection::Manual(vec![]), false).is_none());
        assert!(small_multiples(&[], &StoreSelection::TopN(6), false).is_none());
    }

    #[test]
    fn profiles_carry_hour_baseline() {
        let panels = small_multiples(&sample(), &StoreSelection::TopN(1), true).unwrap();
        assert_eq!(panels.stores, vec!["Big".to_string()]);
        assert_eq!(panels.profiles.len(), 2);

        let nine = &panels.profiles[0];
        assert_eq!(nine.hour, 9);
        assert_eq!(nine.flow, 150.0);
        assert_eq!(nine.baseline_hora, Some(75.0));
        assert_eq!(nine.n_dias, Some(2));
        assert_eq!(nine.esperado, Some(150.0));
        assert_eq!(nine.norm_pct, Some(0.0));
        assert_eq!(panels.plotted(nine), Some(0.0));

        let ten = &panels.profiles[1];
        assert_eq!(ten.n_dias, Some(1));
        assert_eq!(ten.norm_pct, Some(0.0));
    }

    #[test]
    fn plotted_value_follows_toggle() {
        let panels = small_multiples(&sample(), &StoreSelection::TopN(1), false).unwrap();
        assert_eq!(panels.plotted(&panels.profiles[0]), Some(150.0));
    }

    #[test]
    fn podium_keeps_top_three_per_hour() {
        let panels = small_multiples(&sample(), &StoreSelection::TopN(4), false).unwrap();
        let nine: Vec<(&str, usize)> = panels
            .podium
            .iter()
            .filter(|e| e.hour == 9)
            .map(|e| (e.store.as_str(), e.rank))
            .collect();
        assert_eq!(nine, vec![("Big", 1), ("Mid", 2), ("Low", 3)]);

        let ten: Vec<(&str, usize)> = panels
            .podium
            .iter()
            .filter(|e| e.hour == 10)
            .map(|e| (e.store.as_str(), e.rank))
            .collect();
        // Equal flow: the first row in (store, id, hour) order ranks higher.
        assert_eq!(ten, vec![("Big", 1), ("Mid", 2)]);
        assert!(panels.podium.windows(2).all(|w| (w[0].hour, w[0].rank) < (w[1].hour, w[1].rank)));
    }
}
