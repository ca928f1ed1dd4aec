use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::models::FlowRecord;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowFilter {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub stores: Option<Vec<String>>,
    pub hour_min: Option<i64>,
    pub hour_max: Option<i64>,
}

impl FlowFilter {
    /// Rows with a null date or hour never fall inside a range.
    pub fn admits(&self, record: &FlowRecord) -> bool {
        let (Some(date), Some(hour)) = (record.date, record.hour) else {
            return false;
        };
        self.admits_day(&record.store, date)
            && self.hour_min.map_or(true, |min| hour >= min)
            && self.hour_max.map_or(true, |max| hour <= max)
    }

    pub fn admits_day(&self, store: &str, date: NaiveDate) -> bool {
        self.date_from.map_or(true, |from| date >= from)
            && self.date_to.map_or(true, |to| date <= to)
            && self
                .stores
                .as_ref()
                .map_or(true, |stores| stores.iter().any(|s| s == store))
    }

    pub fn apply(&self, records: &[FlowRecord]) -> Vec<FlowRecord> {
        records.iter().filter(|r| self.admits(r)).cloned().collect()
    }
}

pub fn store_names(records: &[FlowRecord]) -> Vec<String> {
    records
        .iter()
        .filter(|r| !r.store.is_empty())
        .map(|r| r.store.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn date_span(records: &[FlowRecord]) -> Option<(NaiveDate, NaiveDate)> {
    let min = records.iter().filter_map(|r| r.date).min()?;
    let max = records.iter().filter_map(|r| r.date).max()?;
    Some((min, max))
}

pub fn hour_span(records: &[FlowRecord]) -> Option<(i64, i64)> {
    let min = records.iter().filter_map(|r| r.hour).min()?;
    let max = records.iter().filter_map(|r| r.hour).max()?;
    Some((min, max))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(store: &str, day: u32, hour: Option<i64>) -> FlowRecord {
        FlowRecord {
            company: "A".to_string(),
            store: store.to_string(),
            store_id: "1".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, day),
            hour,
            flow: Some(1.0),
        }
    }

    #[test]
    fn default_filter_drops_only_null_dates_and_hours() {
        let records = vec![
            record("A", 1, Some(9)),
            record("B", 2, None),
            FlowRecord {
                date: None,
                ..record("C", 3, Some(10))
            },
        ];
        let kept = FlowFilter::default().apply(&records);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].store, "A");
    }

    #[test]
    fn bounds_are_inclusive() {
        let records = vec![
            record("A", 1, Some(8)),
            record("A", 2, Some(9)),
            record("A", 3, Some(18)),
            record("B", 2, Some(9)),
            record("A", 4, Some(9)),
        ];
        let filter = FlowFilter {
            date_from: NaiveDate::from_ymd_opt(2024, 1, 2),
            date_to: NaiveDate::from_ymd_opt(2024, 1, 3),
            stores: Some(vec!["A".to_string()]),
            hour_min: Some(9),
            hour_max: Some(18),
        };
        let kept = filter.apply(&records);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|r| r.store == "A"));
    }

    #[test]
    fn spans_and_store_names() {
        let records = vec![
            record("Norte", 5, Some(22)),
            record("Centro", 2, Some(7)),
            record("", 9, None),
            record("Norte", 3, Some(10)),
        ];
        assert_eq!(store_names(&records), vec!["Centro", "Norte"]);
        assert_eq!(
            date_span(&records),
            Some((
                NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 9).unwrap()
            ))
        );
        assert_eq!(hour_span(&records), Some((7, 22)));
        assert_eq!(date_span(&[]), None);
    }
}
