use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing::level_filters::LevelFilter;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod alerts;
mod coerce;
mod compare;
mod config;
mod error;
mod export;
mod filter;
mod header;
mod loader;
mod metrics;
mod models;
mod multiples;
mod report;

use crate::compare::Group;
use crate::config::{AlertSettings, Settings, Theme};
use crate::error::CompareError;
use crate::filter::FlowFilter;
use crate::loader::{CachedLoader, LoadRequest, Upload};
use crate::models::FlowRecord;
use crate::multiples::StoreSelection;

#[derive(Parser)]
#[command(name = "flow-dashboard")]
#[command(about = "Store foot-traffic dashboard: KPIs, alerts, comparisons and exports", long_about = None)]
struct Cli {
    /// Optional settings file
    #[arg(long, global = true, default_value = "flow.toml")]
    config: PathBuf,
    /// Workbook to load instead of the local files
    #[arg(long, global = true)]
    upload: Option<PathBuf>,
    /// Ignore the pre-cleaned CSV even if present
    #[arg(long, global = true)]
    no_clean: bool,
    /// First day of the period (dd/mm/yyyy or yyyy-mm-dd)
    #[arg(long, global = true, value_parser = parse_day)]
    from: Option<NaiveDate>,
    /// Last day of the period
    #[arg(long, global = true, value_parser = parse_day)]
    to: Option<NaiveDate>,
    /// Restrict to these stores (repeatable)
    #[arg(long = "store", global = true)]
    stores: Vec<String>,
    #[arg(long, global = true)]
    hour_min: Option<i64>,
    #[arg(long, global = true)]
    hour_max: Option<i64>,
    /// Write CSV exports into this directory
    #[arg(long, global = true)]
    export_dir: Option<PathBuf>,
    #[arg(long, global = true, value_enum)]
    theme: Option<Theme>,
    #[arg(long, global = true, value_enum, default_value_t = Format::Markdown)]
    format: Format,
    /// Write the rendered output here instead of stdout
    #[arg(long, global = true)]
    out: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Markdown,
    Json,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Granularity {
    Hour,
    Day,
}

#[derive(clap::Args)]
struct AlertArgs {
    /// Rolling window in days
    #[arg(long, value_parser = clap::value_parser!(u32).range(5..=30))]
    window: Option<u32>,
    /// Alert when the day drops at least this percentage below baseline
    #[arg(long, value_parser = clap::value_parser!(u32).range(5..=60))]
    warn_pct: Option<u32>,
    /// Critical when the day drops at least this percentage below baseline
    #[arg(long, value_parser = clap::value_parser!(u32).range(10..=90))]
    critical_pct: Option<u32>,
    /// Consecutive zero-flow hours to flag (reserved)
    #[arg(long, value_parser = clap::value_parser!(u32).range(2..=8))]
    min_consecutive_zero: Option<u32>,
}

#[derive(clap::Args)]
#[command(group(
    ArgGroup::new("selection")
        .args(["top_n", "pick"])
        .multiple(false)
))]
struct MultiplesArgs {
    /// Top N stores by flow in the period
    #[arg(long, value_parser = clap::value_parser!(u32).range(2..=12))]
    top_n: Option<u32>,
    /// Manual store selection (repeatable)
    #[arg(long)]
    pick: Vec<String>,
    /// Plot the deviation from each store's hour baseline instead of flow
    #[arg(long)]
    normalize: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// KPIs, daily series, store ranking and date × hour sums
    Summary,
    /// Last-day status of every store against its rolling baseline
    Alerts {
        #[command(flatten)]
        args: AlertArgs,
    },
    /// Compare stores or groups of stores
    Compare {
        #[command(subcommand)]
        mode: CompareCommand,
    },
    /// Hourly panels per store plus the top-3 podium
    Multiples {
        #[command(flatten)]
        args: MultiplesArgs,
    },
    /// Every section with default settings
    Report {
        #[command(flatten)]
        args: AlertArgs,
    },
}

#[derive(Subcommand)]
enum CompareCommand {
    /// Store A against store B
    Pair {
        #[arg(long)]
        a: String,
        #[arg(long)]
        b: String,
        #[arg(long, value_enum, default_value_t = Granularity::Hour)]
        by: Granularity,
    },
    /// Several stores on one hourly chart
    Overlay {
        #[arg(long, num_args = 1..)]
        pick: Vec<String>,
    },
    /// Group A against group B, several stores per side
    Groups {
        #[arg(long, default_value = "Grupo A")]
        a_name: String,
        #[arg(long = "a-store")]
        a_stores: Vec<String>,
        #[arg(long, default_value = "Grupo B")]
        b_name: String,
        #[arg(long = "b-store")]
        b_stores: Vec<String>,
        #[arg(long, value_enum, default_value_t = Granularity::Hour)]
        by: Granularity,
    },
}

fn parse_day(raw: &str) -> Result<NaiveDate, String> {
    coerce::parse_date(raw).ok_or_else(|| format!("not a date: {raw}"))
}

/// Markdown for humans, JSON for anything downstream.
struct Rendered {
    markdown: String,
    json: serde_json::Value,
}

impl Rendered {
    fn skipped(section: &str, err: &CompareError) -> Self {
        warn!(section, %err, "section skipped");
        Self {
            markdown: format!("## {section}\n> {err}\n"),
            json: json!({ "section": section, "warning": err.to_string() }),
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(&cli.config)
        .with_context(|| format!("failed to load settings from {}", cli.config.display()))?;
    let theme = cli.theme.unwrap_or(settings.theme);

    let request = LoadRequest {
        prefer_clean: settings.sources.prefer_clean && !cli.no_clean,
        clean_csv: settings.sources.clean_csv.clone(),
        upload: cli.upload.as_deref().map(Upload::from_path).transpose()?,
        fallback_xlsx: settings.sources.fallback_xlsx.clone(),
        sheet_name: settings.sources.sheet_name.clone(),
    };

    let mut loader = CachedLoader::new();
    let table = loader
        .load(&request)
        .context("cannot proceed: supply a workbook with --upload or keep the clean CSV alongside")?;
    if table.is_empty() {
        bail!("no data rows in {}; supply another file", table.source);
    }
    info!(source = %table.source, rows = table.records.len(), "table ready");

    let flow_filter = FlowFilter {
        date_from: cli.from,
        date_to: cli.to,
        stores: (!cli.stores.is_empty()).then(|| cli.stores.clone()),
        hour_min: cli.hour_min,
        hour_max: cli.hour_max,
    };
    let filtered = flow_filter.apply(&table.records);
    debug!(rows = filtered.len(), "filter applied");

    let exporter = export::Exporter::new(cli.export_dir.clone())?;

    let sections = match &cli.command {
        Commands::Summary => vec![summary(&filtered, &exporter)?],
        Commands::Alerts { args } => {
            let alerts = alert_settings(&settings.alerts, args)?;
            vec![alert_section(&table.records, &flow_filter, &alerts, theme, &exporter)?]
        }
        Commands::Compare { mode } => vec![compare_section(&filtered, mode, &exporter)?],
        Commands::Multiples { args } => {
            let selection = if args.pick.is_empty() {
                StoreSelection::TopN(args.top_n.unwrap_or(6) as usize)
            } else {
                StoreSelection::Manual(args.pick.clone())
            };
            vec![multiples_section(&filtered, &selection, args.normalize, &exporter)?]
        }
        Commands::Report { args } => {
            let alerts = alert_settings(&settings.alerts, args)?;
            full_report(&table.records, &filtered, &flow_filter, &alerts, theme, &exporter)?
        }
    };

    let output = match cli.format {
        Format::Markdown => sections
            .iter()
            .map(|s| s.markdown.as_str())
            .collect::<Vec<_>>()
            .join("\n"),
        Format::Json => {
            let values: Vec<&serde_json::Value> = sections.iter().map(|s| &s.json).collect();
            serde_json::to_string_pretty(&values)?
        }
    };

    match &cli.out {
        Some(path) => {
            std::fs::write(path, output)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Report written to {}.", path.display());
        }
        None => println!("{output}"),
    }

    Ok(())
}

fn alert_settings(base: &AlertSettings, args: &AlertArgs) -> anyhow::Result<AlertSettings> {
    let settings = AlertSettings {
        window: args.window.unwrap_or(base.window),
        warn_pct: args.warn_pct.unwrap_or(base.warn_pct),
        critical_pct: args.critical_pct.unwrap_or(base.critical_pct),
        min_consecutive_zero: args.min_consecutive_zero.unwrap_or(base.min_consecutive_zero),
    };
    settings.validate()?;
    debug!(
        min_consecutive_zero = settings.min_consecutive_zero,
        "zero-flow streak flagging is reserved and not applied"
    );
    Ok(settings)
}

fn summary(filtered: &[FlowRecord], exporter: &export::Exporter) -> anyhow::Result<Rendered> {
    let kpis = metrics::kpis(filtered);
    let daily = metrics::daily_totals(filtered);
    let ranking = metrics::store_ranking(filtered);
    let heatmap = metrics::heatmap(filtered);
    if filtered.is_empty() {
        info!("no rows in the selected period/stores/hours");
    }

    exporter.write(export::FILTERED, filtered)?;

    Ok(Rendered {
        markdown: report::build_summary(filter::date_span(filtered), &kpis, &daily, &ranking, &heatmap),
        json: json!({
            "section": "summary",
            "stores": filter::store_names(filtered),
            "hours": filter::hour_span(filtered),
            "kpis": kpis,
            "daily": daily,
            "ranking": ranking,
            "heatmap": heatmap,
        }),
    })
}

fn alert_section(
    records: &[FlowRecord],
    flow_filter: &FlowFilter,
    settings: &AlertSettings,
    theme: Theme,
    exporter: &export::Exporter,
) -> anyhow::Result<Rendered> {
    let rows = alerts::compute_alerts(records, settings.window as usize, settings.thresholds());
    let latest = alerts::last_day_alerts(&rows, flow_filter);
    if latest.is_empty() {
        info!("no data to compute alerts in the selected period");
    } else {
        exporter.write(export::LAST_DAY_ALERTS, &latest)?;
    }

    Ok(Rendered {
        markdown: report::build_alerts(theme, &latest),
        json: json!({ "section": "alerts", "window": settings.window, "rows": latest }),
    })
}

fn compare_section(
    filtered: &[FlowRecord],
    mode: &CompareCommand,
    exporter: &export::Exporter,
) -> anyhow::Result<Rendered> {
    if filtered.is_empty() {
        return Ok(Rendered::skipped("Compare", &CompareError::NoData));
    }

    let rendered = match mode {
        CompareCommand::Pair { a, b, by: Granularity::Hour } => {
            match compare::pair_hourly(filtered, a, b) {
                Ok(view) => {
                    exporter.write(export::PAIR_HOURLY, &view.rows)?;
                    Rendered {
                        markdown: report::build_hourly_comparison(&format!("{a} vs {b} by hour"), &view),
                        json: json!({ "section": "compare_pair_hourly", "report": view }),
                    }
                }
                Err(err) => Rendered::skipped("Compare by hour", &err),
            }
        }
        CompareCommand::Pair { a, b, by: Granularity::Day } => match compare::pair_daily(filtered, a, b) {
            Ok(view) => {
                exporter.write(export::PAIR_DAILY, &view.rows)?;
                Rendered {
                    markdown: report::build_daily_comparison(&format!("{a} vs {b} by day"), &view),
                    json: json!({ "section": "compare_pair_daily", "report": view }),
                }
            }
            Err(err) => Rendered::skipped("Compare by day", &err),
        },
        CompareCommand::Overlay { pick } => match compare::overlay_hourly(filtered, pick) {
            Ok(rows) => {
                exporter.write(export::OVERLAY_HOURLY, &rows)?;
                Rendered {
                    markdown: report::build_overlay(&rows),
                    json: json!({ "section": "compare_overlay", "rows": rows }),
                }
            }
            Err(err) => Rendered::skipped("Hourly overlay", &err),
        },
        CompareCommand::Groups {
            a_name,
            a_stores,
            b_name,
            b_stores,
            by,
        } => {
            let a = Group::new(a_name.as_str(), a_stores.clone());
            let b = Group::new(b_name.as_str(), b_stores.clone());
            match by {
                Granularity::Hour => match compare::groups_hourly(filtered, &a, &b) {
                    Ok(view) => {
                        exporter.write(export::GROUPS_HOURLY, &view.hourly.rows)?;
                        Rendered {
                            markdown: report::build_group_hourly(&view),
                            json: json!({ "section": "compare_groups_hourly", "report": view }),
                        }
                    }
                    Err(err) => Rendered::skipped("Groups A×B by hour", &err),
                },
                Granularity::Day => match compare::groups_daily(filtered, &a, &b) {
                    Ok(view) => {
                        exporter.write(export::GROUPS_DAILY, &view.rows)?;
                        Rendered {
                            markdown: report::build_group_daily(&view),
                            json: json!({ "section": "compare_groups_daily", "report": view }),
                        }
                    }
                    Err(err) => Rendered::skipped("Groups A×B by day", &err),
                },
            }
        }
    };

    Ok(rendered)
}

fn multiples_section(
    filtered: &[FlowRecord],
    selection: &StoreSelection,
    normalize: bool,
    exporter: &export::Exporter,
) -> anyhow::Result<Rendered> {
    let Some(panels) = multiples::small_multiples(filtered, selection, normalize) else {
        warn!("no stores selected for small multiples");
        return Ok(Rendered {
            markdown: "## Small multiples by hour\n> Select at least one store.\n".to_string(),
            json: json!({ "section": "small_multiples", "warning": "no stores selected" }),
        });
    };

    exporter.write(export::SMALL_MULTIPLES, &panels.profiles)?;
    exporter.write(export::PODIUM, &panels.podium)?;

    Ok(Rendered {
        markdown: report::build_small_multiples(&panels),
        json: json!({ "section": "small_multiples", "panels": panels }),
    })
}

fn full_report(
    records: &[FlowRecord],
    filtered: &[FlowRecord],
    flow_filter: &FlowFilter,
    settings: &AlertSettings,
    theme: Theme,
    exporter: &export::Exporter,
) -> anyhow::Result<Vec<Rendered>> {
    let mut sections = vec![
        summary(filtered, exporter)?,
        alert_section(records, flow_filter, settings, theme, exporter)?,
    ];

    // Default pair: the first two stores in the filter, as the dashboard preselects.
    let stores = filter::store_names(filtered);
    if let [a, b, ..] = stores.as_slice() {
        let pair = CompareCommand::Pair {
            a: a.clone(),
            b: b.clone(),
            by: Granularity::Hour,
        };
        sections.push(compare_section(filtered, &pair, exporter)?);
    } else {
        sections.push(Rendered::skipped("Compare", &CompareError::TooFewStores(stores.len())));
    }

    sections.push(multiples_section(filtered, &StoreSelection::TopN(6), false, exporter)?);
    Ok(sections)
}
