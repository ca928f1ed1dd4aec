use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::CompareError;
use crate::models::{
    DailyComparison, FlowRecord, GroupDay, GroupMember, HourlyComparison, SideTotals, StoreHour,
    WinTally, Winner,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub name: String,
    pub stores: Vec<String>,
}

impl Group {
    pub fn new(name: impl Into<String>, stores: Vec<String>) -> Self {
        Self {
            name: name.into(),
            stores,
        }
    }

    fn contains(&self, store: &str) -> bool {
        self.stores.iter().any(|s| s == store)
    }

    pub fn without(&self, other: &Group) -> Group {
        Group {
            name: self.name.clone(),
            stores: self
                .stores
                .iter()
                .filter(|s| !other.contains(s))
                .cloned()
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyReport {
    pub totals: SideTotals,
    pub rows: Vec<HourlyComparison>,
    pub tally: WinTally,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyReport {
    pub totals: SideTotals,
    pub rows: Vec<DailyComparison>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupDailyReport {
    pub totals: SideTotals,
    pub rows: Vec<GroupDay>,
    pub composition: Vec<GroupMember>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupHourlyReport {
    #[serde(flatten)]
    pub hourly: HourlyReport,
    pub composition: Vec<GroupMember>,
}

pub fn side_totals(
    records: &[FlowRecord],
    label_a: &str,
    in_a: impl Fn(&FlowRecord) -> bool,
    label_b: &str,
    in_b: impl Fn(&FlowRecord) -> bool,
) -> SideTotals {
    let sum = |pred: &dyn Fn(&FlowRecord) -> bool| -> f64 {
        records
            .iter()
            .filter(|r| pred(*r))
            .filter_map(|r| r.flow)
            .sum()
    };
    let total_a = sum(&in_a);
    let total_b = sum(&in_b);
    let delta = total_a - total_b;

    SideTotals {
        label_a: label_a.to_string(),
        label_b: label_b.to_string(),
        total_a,
        total_b,
        delta,
        delta_pct: (total_b > 0.0).then(|| delta / total_b * 100.0),
    }
}

pub fn pair_hourly(records: &[FlowRecord], a: &str, b: &str) -> Result<HourlyReport, CompareError> {
    check_pair(a, b)?;
    let totals = side_totals(records, a, |r| r.store == a, b, |r| r.store == b);
    let hours_a = sums_by(records, |r| r.store == a, |r| r.hour);
    let hours_b = sums_by(records, |r| r.store == b, |r| r.hour);
    ensure_sides(&hours_a, a, &hours_b, b)?;

    let (rows, tally) = hourly_rows(&hours_a, &hours_b);
    Ok(HourlyReport { totals, rows, tally })
}

pub fn pair_daily(records: &[FlowRecord], a: &str, b: &str) -> Result<DailyReport, CompareError> {
    check_pair(a, b)?;
    let totals = side_totals(records, a, |r| r.store == a, b, |r| r.store == b);
    let days_a = sums_by(records, |r| r.store == a, |r| r.date);
    let days_b = sums_by(records, |r| r.store == b, |r| r.date);
    ensure_sides(&days_a, a, &days_b, b)?;

    Ok(DailyReport {
        totals,
        rows: daily_rows(&days_a, &days_b),
    })
}

pub fn overlay_hourly(records: &[FlowRecord], stores: &[String]) -> Result<Vec<StoreHour>, CompareError> {
    let selected: BTreeSet<&str> = stores.iter().map(String::as_str).collect();
    if selected.len() < 2 {
        return Err(CompareError::TooFewStores(selected.len()));
    }

    let mut sums: BTreeMap<(&str, i64), f64> = BTreeMap::new();
    for record in records {
        let Some(hour) = record.hour else { continue };
        if selected.contains(record.store.as_str()) {
            *sums.entry((record.store.as_str(), hour)).or_insert(0.0) += record.flow.unwrap_or(0.0);
        }
    }
    if sums.is_empty() {
        return Err(CompareError::NoData);
    }

    Ok(sums
        .into_iter()
        .map(|((store, hour), flow)| StoreHour {
            store: store.to_string(),
            hour,
            flow,
        })
        .collect())
}

pub fn groups_hourly(
    records: &[FlowRecord],
    a: &Group,
    b: &Group,
) -> Result<GroupHourlyReport, CompareError> {
    let b = check_groups(a, b)?;
    let totals = side_totals(records, &a.name, |r| a.contains(&r.store), &b.name, |r| {
        b.contains(&r.store)
    });
    let hours_a = sums_by(records, |r| a.contains(&r.store), |r| r.hour);
    let hours_b = sums_by(records, |r| b.contains(&r.store), |r| r.hour);
    ensure_sides(&hours_a, &a.name, &hours_b, &b.name)?;

    let (rows, tally) = hourly_rows(&hours_a, &hours_b);
    Ok(GroupHourlyReport {
        hourly: HourlyReport { totals, rows, tally },
        composition: composition(a, &b),
    })
}

pub fn groups_daily(
    records: &[FlowRecord],
    a: &Group,
    b: &Group,
) -> Result<GroupDailyReport, CompareError> {
    let b = check_groups(a, b)?;
    let totals = side_totals(records, &a.name, |r| a.contains(&r.store), &b.name, |r| {
        b.contains(&r.store)
    });
    let days_a = sums_by(records, |r| a.contains(&r.store), |r| r.date);
    let days_b = sums_by(records, |r| b.contains(&r.store), |r| r.date);

    let mut rows: Vec<GroupDay> = Vec::with_capacity(days_a.len() + days_b.len());
    for (group, days) in [(&a.name, &days_a), (&b.name, &days_b)] {
        rows.extend(days.iter().map(|(date, flow)| GroupDay {
            group: group.clone(),
            date: *date,
            flow: *flow,
        }));
    }
    if rows.is_empty() {
        return Err(CompareError::NoData);
    }
    rows.sort_by(|x, y| x.group.cmp(&y.group).then(x.date.cmp(&y.date)));

    Ok(GroupDailyReport {
        totals,
        rows,
        composition: composition(a, &b),
    })
}

pub fn composition(a: &Group, b: &Group) -> Vec<GroupMember> {
    [a, b]
        .into_iter()
        .flat_map(|g| {
            g.stores.iter().map(move |store| GroupMember {
                group: g.name.clone(),
                store: store.clone(),
            })
        })
        .collect()
}

fn check_pair(a: &str, b: &str) -> Result<(), CompareError> {
    if a == b {
        return Err(CompareError::SameStore);
    }
    Ok(())
}

fn check_groups(a: &Group, b: &Group) -> Result<Group, CompareError> {
    if a.name == b.name {
        return Err(CompareError::SameGroupName(a.name.clone()));
    }
    let b = b.without(a);
    for group in [a, &b] {
        if group.stores.is_empty() {
            return Err(CompareError::EmptyGroup(group.name.clone()));
        }
    }
    Ok(b)
}

fn ensure_sides<K>(
    a: &BTreeMap<K, f64>,
    label_a: &str,
    b: &BTreeMap<K, f64>,
    label_b: &str,
) -> Result<(), CompareError> {
    if a.is_empty() {
        return Err(CompareError::MissingSide(label_a.to_string()));
    }
    if b.is_empty() {
        return Err(CompareError::MissingSide(label_b.to_string()));
    }
    Ok(())
}

fn sums_by<K: Ord + Copy>(
    records: &[FlowRecord],
    pred: impl Fn(&FlowRecord) -> bool,
    key: impl Fn(&FlowRecord) -> Option<K>,
) -> BTreeMap<K, f64> {
    let mut sums = BTreeMap::new();
    for record in records.iter().filter(|r| pred(*r)) {
        if let Some(k) = key(record) {
            *sums.entry(k).or_insert(0.0) += record.flow.unwrap_or(0.0);
        }
    }
    sums
}

fn union_keys<K: Ord + Copy>(a: &BTreeMap<K, f64>, b: &BTreeMap<K, f64>) -> BTreeSet<K> {
    a.keys().chain(b.keys()).copied().collect()
}

fn hourly_rows(a: &BTreeMap<i64, f64>, b: &BTreeMap<i64, f64>) -> (Vec<HourlyComparison>, WinTally) {
    let mut tally = WinTally::default();
    let rows = union_keys(a, b)
        .into_iter()
        .map(|hour| {
            let flow_a = a.get(&hour).copied().unwrap_or(0.0);
            let flow_b = b.get(&hour).copied().unwrap_or(0.0);
            let delta = flow_a - flow_b;
            let winner = Winner::from_delta(delta);
            match winner {
                Winner::A => tally.hours_a += 1,
                Winner::B => tally.hours_b += 1,
                Winner::Tie => tally.ties += 1,
            }
            HourlyComparison {
                hour,
                flow_a,
                flow_b,
                delta,
                winner,
            }
        })
        .collect();
    (rows, tally)
}

fn daily_rows(a: &BTreeMap<NaiveDate, f64>, b: &BTreeMap<NaiveDate, f64>) -> Vec<DailyComparison> {
    union_keys(a, b)
        .into_iter()
        .map(|date| {
            let flow_a = a.get(&date).copied().unwrap_or(0.0);
            let flow_b = b.get(&date).copied().unwrap_or(0.0);
            DailyComparison {
                date,
                flow_a,
                flow_b,
                delta: flow_a - flow_b,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(store: &str, day: u32, hour: i64, flow: f64) -> FlowRecord {
        FlowRecord {
            company: "A".to_string(),
            store: store.to_string(),
            store_id: "1".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, day),
            hour: Some(hour),
            flow: Some(flow),
        }
    }

    fn sample() -> Vec<FlowRecord> {
        vec![
            record("A", 1, 9, 10.0),
            record("A", 1, 10, 5.0),
            record("A", 2, 9, 10.0),
            record("B", 1, 9, 12.0),
            record("B", 1, 11, 3.0),
            record("C", 2, 10, 5.0),
        ]
    }

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn same_store_is_rejected() {
        assert_eq!(pair_hourly(&sample(), "A", "A"), Err(CompareError::SameStore));
        assert_eq!(pair_daily(&sample(), "B", "B").unwrap_err(), CompareError::SameStore);
    }

    #[test]
    fn pair_hourly_fills_missing_hours_and_tallies() {
        let report = pair_hourly(&sample(), "A", "B").unwrap();
        assert_eq!(report.totals.total_a, 25.0);
        assert_eq!(report.totals.total_b, 15.0);
        assert_eq!(report.totals.delta, 10.0);
        assert!((report.totals.delta_pct.unwrap() - 66.666).abs() < 0.01);

        let hours: Vec<(i64, f64, f64, Winner)> = report
            .rows
            .iter()
            .map(|r| (r.hour, r.flow_a, r.flow_b, r.winner))
            .collect();
        assert_eq!(
            hours,
            vec![
                (9, 20.0, 12.0, Winner::A),
                (10, 5.0, 0.0, Winner::A),
                (11, 0.0, 3.0, Winner::B),
            ]
        );
        assert_eq!(
            report.tally,
            WinTally {
                hours_a: 2,
                hours_b: 1,
                ties: 0
            }
        );
    }

    #[test]
    fn missing_side_is_reported() {
        let err = pair_hourly(&sample(), "A", "Z").unwrap_err();
        assert_eq!(err, CompareError::MissingSide("Z".to_string()));
    }

    #[test]
    fn delta_pct_absent_when_b_has_no_flow() {
        let totals = side_totals(&sample(), "A", |r| r.store == "A", "Z", |r| r.store == "Z");
        assert_eq!(totals.total_b, 0.0);
        assert_eq!(totals.delta_pct, None);
    }

    #[test]
    fn pair_daily_aligns_dates() {
        let report = pair_daily(&sample(), "A", "C").unwrap();
        assert_eq!(report.rows.len(), 2);
        assert_eq!((report.rows[0].flow_a, report.rows[0].flow_b), (15.0, 0.0));
        assert_eq!((report.rows[1].flow_a, report.rows[1].delta), (10.0, 5.0));
    }

    #[test]
    fn overlay_needs_two_stores() {
        assert_eq!(
            overlay_hourly(&sample(), &names(&["A", "A"])),
            Err(CompareError::TooFewStores(1))
        );
        let rows = overlay_hourly(&sample(), &names(&["A", "C"])).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!((rows[0].store.as_str(), rows[0].hour, rows[0].flow), ("A", 9, 20.0));
        assert_eq!((rows[2].store.as_str(), rows[2].hour), ("C", 10));
    }

    #[test]
    fn groups_reject_empty_and_overlapping_sides() {
        let a = Group::new("Grupo A", names(&["A"]));
        let empty = Group::new("Grupo B", vec![]);
        assert_eq!(
            groups_hourly(&sample(), &a, &empty).unwrap_err(),
            CompareError::EmptyGroup("Grupo B".to_string())
        );

        let overlapping = Group::new("Grupo B", names(&["A"]));
        assert_eq!(
            groups_daily(&sample(), &a, &overlapping).unwrap_err(),
            CompareError::EmptyGroup("Grupo B".to_string())
        );

        let same_name = Group::new("Grupo A", names(&["B"]));
        assert!(matches!(
            groups_hourly(&sample(), &a, &same_name),
            Err(CompareError::SameGroupName(_))
        ));
    }

    #[test]
    fn groups_hourly_sums_member_stores() {
        let a = Group::new("Norte", names(&["A"]));
        let b = Group::new("Sul", names(&["A", "B", "C"]));
        let report = groups_hourly(&sample(), &a, &b).unwrap();
        assert_eq!(report.hourly.totals.total_a, 25.0);
        assert_eq!(report.hourly.totals.total_b, 20.0);
        let hour10 = report.hourly.rows.iter().find(|r| r.hour == 10).unwrap();
        assert_eq!((hour10.flow_a, hour10.flow_b, hour10.winner), (5.0, 5.0, Winner::Tie));
        assert_eq!(report.hourly.tally.ties, 1);
        assert_eq!(report.composition.len(), 3);
        assert!(report.composition.iter().all(|m| !(m.group == "Sul" && m.store == "A")));
    }

    #[test]
    fn groups_daily_is_long_format() {
        let a = Group::new("Grupo A", names(&["A"]));
        let b = Group::new("Grupo B", names(&["B", "C"]));
        let report = groups_daily(&sample(), &a, &b).unwrap();
        let rows: Vec<(&str, u32, f64)> = report
            .rows
            .iter()
            .map(|r| (r.group.as_str(), chrono::Datelike::day(&r.date), r.flow))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("Grupo A", 1, 15.0),
                ("Grupo A", 2, 10.0),
                ("Grupo B", 1, 15.0),
                ("Grupo B", 2, 5.0),
            ]
        );
    }
}
