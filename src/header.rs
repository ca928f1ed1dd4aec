use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;

pub const EXPECTED_COLUMNS: [&str; 6] = ["Company", "Loja", "ID_Loja", "Data", "Hora", "Fluxo"];

pub const REDUCED_COLUMNS: [&str; 3] = ["Loja", "Data", "Fluxo"];

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    DateTime(NaiveDateTime),
}

impl Cell {
    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) => Some(s.trim().to_string()),
            Cell::Number(n) => Some(format_number(*n)),
            Cell::DateTime(dt) => Some(dt.to_string()),
        }
    }
}

pub(crate) fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Index of the header row, preferring the full signature over the reduced
/// one and the earliest row within a signature.
pub fn detect_header(rows: &[Vec<Cell>]) -> Option<usize> {
    let mut reduced_hit = None;

    for (idx, row) in rows.iter().enumerate() {
        let values: HashSet<String> = row.iter().filter_map(Cell::as_text).collect();
        if EXPECTED_COLUMNS.iter().all(|c| values.contains(*c)) {
            return Some(idx);
        }
        if reduced_hit.is_none() && REDUCED_COLUMNS.iter().all(|c| values.contains(*c)) {
            reduced_hit = Some(idx);
        }
    }

    reduced_hit
}

/// Renames repeated names to `name.1`, `name.2`, ... in order of appearance.
pub fn dedup_names(names: &[String]) -> Vec<String> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut out = Vec::with_capacity(names.len());

    for name in names {
        match seen.get_mut(name.as_str()) {
            Some(count) => {
                *count += 1;
                out.push(format!("{name}.{count}"));
            }
            None => {
                seen.insert(name.as_str(), 0);
                out.push(name.clone());
            }
        }
    }

    out
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    pub company: Option<usize>,
    pub store: Option<usize>,
    pub store_id: Option<usize>,
    pub date: Option<usize>,
    pub hour: Option<usize>,
    pub flow: Option<usize>,
}

impl ColumnMap {
    /// Picks the first column whose base name (text before the first `.`)
    /// equals each expected name.
    pub fn from_header(names: &[String]) -> Self {
        let pick = |wanted: &str| {
            names
                .iter()
                .position(|n| n.split('.').next().unwrap_or_default() == wanted)
        };

        Self {
            company: pick("Company"),
            store: pick("Loja"),
            store_id: pick("ID_Loja"),
            date: pick("Data"),
            hour: pick("Hora"),
            flow: pick("Fluxo"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.matched() == 0
    }

    pub fn matched(&self) -> usize {
        [
            self.company,
            self.store,
            self.store_id,
            self.date,
            self.hour,
            self.flow,
        ]
        .iter()
        .filter(|c| c.is_some())
        .count()
    }
}

pub fn header_names(row: &[Cell]) -> Vec<String> {
    let raw: Vec<String> = row
        .iter()
        .map(|c| c.as_text().unwrap_or_default())
        .collect();
    dedup_names(&raw)
}
