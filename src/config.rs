use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::SettingsError;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub sources: SourceSettings,
    #[serde(default)]
    pub alerts: AlertSettings,
    #[serde(default)]
    pub theme: Theme,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceSettings {
    #[serde(default = "default_clean_csv")]
    pub clean_csv: PathBuf,
    #[serde(default = "default_fallback_xlsx")]
    pub fallback_xlsx: PathBuf,
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,
    #[serde(default = "default_true")]
    pub prefer_clean: bool,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AlertSettings {
    #[serde(default = "default_window")]
    pub window: u32,
    #[serde(default = "default_warn_pct")]
    pub warn_pct: u32,
    #[serde(default = "default_critical_pct")]
    pub critical_pct: u32,
    #[serde(default = "default_min_consecutive_zero")]
    pub min_consecutive_zero: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

fn default_clean_csv() -> PathBuf {
    PathBuf::from("fluxo_seed_limpo.csv")
}

fn default_fallback_xlsx() -> PathBuf {
    PathBuf::from("Fluxo SEED 30d.xlsx")
}

fn default_sheet_name() -> String {
    "Fluxo seed 30d".to_string()
}

fn default_true() -> bool {
    true
}

fn default_window() -> u32 {
    7
}

fn default_warn_pct() -> u32 {
    20
}

fn default_critical_pct() -> u32 {
    40
}

fn default_min_consecutive_zero() -> u32 {
    4
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            clean_csv: default_clean_csv(),
            fallback_xlsx: default_fallback_xlsx(),
            sheet_name: default_sheet_name(),
            prefer_clean: true,
        }
    }
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            window: default_window(),
            warn_pct: default_warn_pct(),
            critical_pct: default_critical_pct(),
            min_consecutive_zero: default_min_consecutive_zero(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with(path, environment())
    }

    fn load_with(path: &Path, env: config::Environment) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(env)
            .build()?;
        let settings: Settings = settings.try_deserialize()?;
        settings.alerts.validate()?;
        Ok(settings)
    }
}

// FLOW__ALERTS__WINDOW=14 overrides alerts.window.
fn environment() -> config::Environment {
    config::Environment::with_prefix("FLOW")
        .separator("__")
        .try_parsing(true)
}

impl AlertSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        check_range("alerts.window", self.window, 5, 30)?;
        check_range("alerts.warn_pct", self.warn_pct, 5, 60)?;
        check_range("alerts.critical_pct", self.critical_pct, 10, 90)?;
        check_range("alerts.min_consecutive_zero", self.min_consecutive_zero, 2, 8)?;
        Ok(())
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds::new(f64::from(self.warn_pct), f64::from(self.critical_pct))
    }
}

fn check_range(field: &'static str, value: u32, min: u32, max: u32) -> Result<(), SettingsError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(SettingsError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

/// Decline thresholds as positive percentages.
///
/// Invariant: `critical_pct >= warn_pct`. Construction swaps inverted
/// inputs so the alert tier is always reachable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    warn_pct: f64,
    critical_pct: f64,
}

impl Thresholds {
    pub fn new(warn_pct: f64, critical_pct: f64) -> Self {
        let (warn_pct, critical_pct) = (warn_pct.abs(), critical_pct.abs());
        if critical_pct < warn_pct {
            warn!(
                warn_pct,
                critical_pct, "critical threshold below alert threshold, swapping"
            );
            return Self {
                warn_pct: critical_pct,
                critical_pct: warn_pct,
            };
        }
        Self {
            warn_pct,
            critical_pct,
        }
    }

    pub fn warn_pct(&self) -> f64 {
        self.warn_pct
    }

    pub fn critical_pct(&self) -> f64 {
        self.critical_pct
    }
}
