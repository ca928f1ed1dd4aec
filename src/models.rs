use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowRecord {
    #[serde(rename = "Company")]
    pub company: String,
    #[serde(rename = "Loja")]
    pub store: String,
    #[serde(rename = "ID_Loja")]
    pub store_id: String,
    #[serde(rename = "Data")]
    pub date: Option<NaiveDate>,
    #[serde(rename = "Hora")]
    pub hour: Option<i64>,
    #[serde(rename = "Fluxo")]
    pub flow: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    CleanCsv(std::path::PathBuf),
    Upload(std::path::PathBuf),
    FallbackWorkbook(std::path::PathBuf),
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::CleanCsv(path) => write!(f, "clean csv {}", path.display()),
            DataSource::Upload(path) => write!(f, "uploaded workbook {}", path.display()),
            DataSource::FallbackWorkbook(path) => {
                write!(f, "fallback workbook {}", path.display())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct FlowTable {
    pub source: DataSource,
    pub records: Vec<FlowRecord>,
}

impl FlowTable {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Status {
    Critical,
    Alert,
    OnTime,
    Unknown,
}

impl Status {
    pub fn label(self) -> &'static str {
        match self {
            Status::Critical => "Critical",
            Status::Alert => "Alert",
            Status::OnTime => "On time",
            Status::Unknown => "—",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Status {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BaselineRow {
    #[serde(rename = "Loja")]
    pub store: String,
    #[serde(rename = "ID_Loja")]
    pub store_id: String,
    #[serde(rename = "Data")]
    pub date: NaiveDate,
    #[serde(rename = "Fluxo")]
    pub flow: f64,
    #[serde(rename = "Baseline (MM)")]
    pub baseline: Option<f64>,
    #[serde(rename = "Var %")]
    pub var_pct: Option<f64>,
    #[serde(rename = "Status")]
    pub status: Status,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpis {
    pub total_flow: f64,
    pub mean_per_day: f64,
    pub days: usize,
    pub peak_day: Option<DailyTotal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyTotal {
    #[serde(rename = "Data")]
    pub date: NaiveDate,
    #[serde(rename = "Fluxo")]
    pub flow: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreTotal {
    #[serde(rename = "Loja")]
    pub store: String,
    #[serde(rename = "ID_Loja")]
    pub store_id: String,
    #[serde(rename = "Fluxo")]
    pub flow: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatCell {
    #[serde(rename = "Data")]
    pub date: NaiveDate,
    #[serde(rename = "Hora")]
    pub hour: i64,
    #[serde(rename = "Fluxo")]
    pub flow: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    A,
    B,
    Tie,
}

impl Winner {
    pub fn label(self) -> &'static str {
        match self {
            Winner::A => "A",
            Winner::B => "B",
            Winner::Tie => "Empate",
        }
    }

    pub fn from_delta(delta: f64) -> Self {
        if delta > 0.0 {
            Winner::A
        } else if delta < 0.0 {
            Winner::B
        } else {
            Winner::Tie
        }
    }
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Winner {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyComparison {
    #[serde(rename = "Hora")]
    pub hour: i64,
    #[serde(rename = "Fluxo_A")]
    pub flow_a: f64,
    #[serde(rename = "Fluxo_B")]
    pub flow_b: f64,
    #[serde(rename = "Delta")]
    pub delta: f64,
    #[serde(rename = "Vencedor")]
    pub winner: Winner,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyComparison {
    #[serde(rename = "Data")]
    pub date: NaiveDate,
    #[serde(rename = "Fluxo_A")]
    pub flow_a: f64,
    #[serde(rename = "Fluxo_B")]
    pub flow_b: f64,
    #[serde(rename = "Delta")]
    pub delta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SideTotals {
    pub label_a: String,
    pub label_b: String,
    pub total_a: f64,
    pub total_b: f64,
    pub delta: f64,
    pub delta_pct: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WinTally {
    pub hours_a: usize,
    pub hours_b: usize,
    pub ties: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreHour {
    #[serde(rename = "Loja")]
    pub store: String,
    #[serde(rename = "Hora")]
    pub hour: i64,
    #[serde(rename = "Fluxo")]
    pub flow: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupDay {
    #[serde(rename = "Grupo")]
    pub group: String,
    #[serde(rename = "Data")]
    pub date: NaiveDate,
    #[serde(rename = "Fluxo")]
    pub flow: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupMember {
    #[serde(rename = "Grupo")]
    pub group: String,
    #[serde(rename = "Loja")]
    pub store: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourProfile {
    #[serde(rename = "Loja")]
    pub store: String,
    #[serde(rename = "ID_Loja")]
    pub store_id: String,
    #[serde(rename = "Hora")]
    pub hour: i64,
    #[serde(rename = "Fluxo")]
    pub flow: f64,
    pub baseline_hora: Option<f64>,
    pub n_dias: Option<usize>,
    pub esperado: Option<f64>,
    pub norm_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PodiumEntry {
    #[serde(rename = "Loja")]
    pub store: String,
    #[serde(rename = "ID_Loja")]
    pub store_id: String,
    #[serde(rename = "Hora")]
    pub hour: i64,
    #[serde(rename = "Fluxo")]
    pub flow: f64,
    pub rank: usize,
}
