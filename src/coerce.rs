use chrono::{NaiveDate, NaiveDateTime};

use crate::header::{format_number, Cell};

const DAY_FIRST_DATES: [&str; 3] = ["%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y"];
const DAY_FIRST_DATETIMES: [&str; 6] = [
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];
const ISO_DATETIMES: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Day-first date parsing; ISO `yyyy-mm-dd` is accepted as-is.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }
    if let Some(date) = DAY_FIRST_DATES
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
    {
        return Some(date);
    }

    DAY_FIRST_DATETIMES
        .iter()
        .chain(ISO_DATETIMES.iter())
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|dt| dt.date())
}

pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Integral values only; `"10.0"` is accepted, `"10.5"` is not.
pub fn parse_hour(raw: &str) -> Option<i64> {
    parse_number(raw).and_then(integral)
}

fn integral(n: f64) -> Option<i64> {
    (n.fract() == 0.0 && n.abs() < 1e15).then_some(n as i64)
}

pub fn cell_date(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::DateTime(dt) => Some(dt.date()),
        Cell::Text(s) => parse_date(s),
        Cell::Empty | Cell::Number(_) => None,
    }
}

pub fn cell_hour(cell: &Cell) -> Option<i64> {
    match cell {
        Cell::Number(n) => Some(*n).filter(|n| n.is_finite()).and_then(integral),
        Cell::Text(s) => parse_hour(s),
        Cell::Empty | Cell::DateTime(_) => None,
    }
}

pub fn cell_flow(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Number(n) => Some(*n).filter(|n| n.is_finite()),
        Cell::Text(s) => parse_number(s),
        Cell::Empty | Cell::DateTime(_) => None,
    }
}

pub fn cell_text(cell: &Cell) -> String {
    match cell {
        Cell::Number(n) => format_number(*n),
        other => other.as_text().unwrap_or_default(),
    }
}
