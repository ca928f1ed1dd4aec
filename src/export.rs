use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;
use tracing::info;

use crate::models::{
    BaselineRow, DailyComparison, FlowRecord, GroupDay, HourProfile, HourlyComparison,
    PodiumEntry, StoreHour,
};

pub const FILTERED: &str = "fluxo_filtrado.csv";
pub const LAST_DAY_ALERTS: &str = "alertas_ultimo_dia.csv";
pub const PAIR_HOURLY: &str = "comparacao_por_hora_AB.csv";
pub const PAIR_DAILY: &str = "comparacao_diaria_AB.csv";
pub const OVERLAY_HOURLY: &str = "comparacao_por_hora_N_lojas.csv";
pub const GROUPS_HOURLY: &str = "comparacao_AxB_grupos_por_hora.csv";
pub const GROUPS_DAILY: &str = "comparacao_AxB_grupos_diario.csv";
pub const SMALL_MULTIPLES: &str = "small_multiples_por_hora.csv";
pub const PODIUM: &str = "podio_por_hora_top3.csv";

/// Row type with a fixed CSV header. `HEADER` must list the serialized
/// field names in order; it is written on its own when there are no rows.
pub trait ExportRow: Serialize {
    const HEADER: &'static [&'static str];
}

impl ExportRow for FlowRecord {
    const HEADER: &'static [&'static str] = &["Company", "Loja", "ID_Loja", "Data", "Hora", "Fluxo"];
}

impl ExportRow for BaselineRow {
    const HEADER: &'static [&'static str] = &[
        "Loja",
        "ID_Loja",
        "Data",
        "Fluxo",
        "Baseline (MM)",
        "Var %",
        "Status",
    ];
}

impl ExportRow for HourlyComparison {
    const HEADER: &'static [&'static str] = &["Hora", "Fluxo_A", "Fluxo_B", "Delta", "Vencedor"];
}

impl ExportRow for DailyComparison {
    const HEADER: &'static [&'static str] = &["Data", "Fluxo_A", "Fluxo_B", "Delta"];
}

impl ExportRow for StoreHour {
    const HEADER: &'static [&'static str] = &["Loja", "Hora", "Fluxo"];
}

impl ExportRow for GroupDay {
    const HEADER: &'static [&'static str] = &["Grupo", "Data", "Fluxo"];
}

impl ExportRow for HourProfile {
    const HEADER: &'static [&'static str] = &[
        "Loja",
        "ID_Loja",
        "Hora",
        "Fluxo",
        "baseline_hora",
        "n_dias",
        "esperado",
        "norm_pct",
    ];
}

impl ExportRow for PodiumEntry {
    const HEADER: &'static [&'static str] = &["Loja", "ID_Loja", "Hora", "Fluxo", "rank"];
}

#[derive(Debug, Clone, Default)]
pub struct Exporter {
    dir: Option<PathBuf>,
}

impl Exporter {
    pub fn new(dir: Option<PathBuf>) -> anyhow::Result<Self> {
        if let Some(dir) = &dir {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create export dir {}", dir.display()))?;
        }
        Ok(Self { dir })
    }

    pub fn write<T: ExportRow>(&self, file_name: &str, rows: &[T]) -> anyhow::Result<Option<PathBuf>> {
        let Some(dir) = &self.dir else {
            return Ok(None);
        };
        let path = dir.join(file_name);
        write_csv(&path, rows)?;
        info!(path = %path.display(), rows = rows.len(), "export written");
        Ok(Some(path))
    }
}

pub fn write_csv<T: ExportRow>(path: &Path, rows: &[T]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    if rows.is_empty() {
        writer.write_record(T::HEADER)?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
