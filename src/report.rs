use std::fmt::Write;

use chrono::NaiveDate;

use crate::compare::{DailyReport, GroupDailyReport, GroupHourlyReport, HourlyReport};
use crate::config::Theme;
use crate::models::{BaselineRow, DailyTotal, HeatCell, Kpis, SideTotals, Status, StoreHour, StoreTotal};
use crate::multiples::SmallMultiples;

pub fn format_thousands(value: f64) -> String {
    let rounded = value.trunc() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if rounded < 0 {
        out.push('-');
    }
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    out
}

fn format_pct(value: Option<f64>) -> String {
    value.map_or_else(|| "—".to_string(), |v| format!("{v:.1}%"))
}

fn status_marker(theme: Theme, status: Status) -> &'static str {
    match (theme, status) {
        (Theme::Dark, Status::Critical) => "🔴",
        (Theme::Dark, Status::Alert) => "🟠",
        (Theme::Dark, Status::OnTime) => "🟢",
        (Theme::Dark, Status::Unknown) => "⚪",
        (Theme::Light, Status::Critical) => "[!!]",
        (Theme::Light, Status::Alert) => "[!]",
        (Theme::Light, Status::OnTime) => "[ok]",
        (Theme::Light, Status::Unknown) => "[-]",
    }
}

pub fn build_summary(
    period: Option<(NaiveDate, NaiveDate)>,
    kpis: &Kpis,
    daily: &[DailyTotal],
    ranking: &[StoreTotal],
    heatmap: &[HeatCell],
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Flow Dashboard");
    match period {
        Some((from, to)) => {
            let _ = writeln!(output, "Period {from} to {to}");
        }
        None => {
            let _ = writeln!(output, "No dated rows in the selection.");
        }
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "## Key Figures");
    let _ = writeln!(output, "- Flow (sum): {}", format_thousands(kpis.total_flow));
    let _ = writeln!(output, "- Mean per day: {:.1}", kpis.mean_per_day);
    let _ = writeln!(output, "- Days in filter: {}", kpis.days);
    match &kpis.peak_day {
        Some(peak) => {
            let _ = writeln!(
                output,
                "- Peak day: {} on {}",
                format_thousands(peak.flow),
                peak.date
            );
        }
        None => {
            let _ = writeln!(output, "- Peak day: —");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Daily Flow");
    if daily.is_empty() {
        let _ = writeln!(output, "No data for the selected period/stores/hours.");
    } else {
        for day in daily {
            let _ = writeln!(output, "- {}: {}", day.date, format_thousands(day.flow));
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Store Ranking");
    if ranking.is_empty() {
        let _ = writeln!(output, "No stores in the selection.");
    } else {
        for (idx, store) in ranking.iter().enumerate() {
            let _ = writeln!(
                output,
                "{}. {} ({}) {}",
                idx + 1,
                store.store,
                store.store_id,
                format_thousands(store.flow)
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Date × Hour");
    if heatmap.is_empty() {
        let _ = writeln!(output, "No data to show in the heatmap.");
    } else {
        let _ = writeln!(output, "| Data | Hora | Fluxo |");
        let _ = writeln!(output, "|---|---|---|");
        for cell in heatmap {
            let _ = writeln!(
                output,
                "| {} | {} | {} |",
                cell.date,
                cell.hour,
                format_thousands(cell.flow)
            );
        }
    }

    output
}

pub fn build_alerts(theme: Theme, rows: &[BaselineRow]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "## Alerts: decline vs baseline");

    let Some(first) = rows.first() else {
        let _ = writeln!(output, "No data to compute alerts in the selected period.");
        return output;
    };

    let _ = writeln!(output, "Status on the last date of the filter: {}", first.date);
    let _ = writeln!(output);
    let _ = writeln!(output, "| | Loja | ID_Loja | Day flow | Baseline (MM) | Var % | Status |");
    let _ = writeln!(output, "|---|---|---|---|---|---|---|");
    for row in rows {
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} | {} | {} | {} |",
            status_marker(theme, row.status),
            row.store,
            row.store_id,
            format_thousands(row.flow),
            row.baseline.map_or_else(|| "—".to_string(), |b| format!("{b:.1}")),
            format_pct(row.var_pct),
            row.status
        );
    }

    output
}

fn write_totals(output: &mut String, totals: &SideTotals) {
    let _ = writeln!(
        output,
        "- Flow {}: {}",
        totals.label_a,
        format_thousands(totals.total_a)
    );
    let _ = writeln!(
        output,
        "- Flow {}: {}",
        totals.label_b,
        format_thousands(totals.total_b)
    );
    let _ = writeln!(output, "- Δ absolute (A - B): {}", format_thousands(totals.delta));
    let _ = writeln!(output, "- Δ % vs B: {}", format_pct(totals.delta_pct));
}

pub fn build_hourly_comparison(title: &str, report: &HourlyReport) -> String {
    let mut output = String::new();
    let totals = &report.totals;
    let _ = writeln!(output, "## {title}");
    write_totals(&mut output, totals);
    let _ = writeln!(
        output,
        "By hour: {} wins {}h, {} wins {}h, ties {}h.",
        totals.label_a, report.tally.hours_a, totals.label_b, report.tally.hours_b, report.tally.ties
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "| Hora | Fluxo_A | Fluxo_B | Delta | Vencedor |");
    let _ = writeln!(output, "|---|---|---|---|---|");
    for row in &report.rows {
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} | {} |",
            row.hour,
            format_thousands(row.flow_a),
            format_thousands(row.flow_b),
            format_thousands(row.delta),
            row.winner
        );
    }
    output
}

pub fn build_daily_comparison(title: &str, report: &DailyReport) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "## {title}");
    write_totals(&mut output, &report.totals);
    let _ = writeln!(output);
    let _ = writeln!(output, "| Data | Fluxo_A | Fluxo_B | Delta |");
    let _ = writeln!(output, "|---|---|---|---|");
    for row in &report.rows {
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} |",
            row.date,
            format_thousands(row.flow_a),
            format_thousands(row.flow_b),
            format_thousands(row.delta)
        );
    }
    output
}

pub fn build_overlay(rows: &[StoreHour]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "## Hourly overlay");
    let mut current = None;
    for row in rows {
        if current != Some(row.store.as_str()) {
            current = Some(row.store.as_str());
            let _ = writeln!(output, "### {}", row.store);
        }
        let _ = writeln!(output, "- {:02}h: {}", row.hour, format_thousands(row.flow));
    }
    output
}

fn write_composition(output: &mut String, members: &[crate::models::GroupMember]) {
    let _ = writeln!(output);
    let _ = writeln!(output, "Group composition:");
    for member in members {
        let _ = writeln!(output, "- {}: {}", member.group, member.store);
    }
}

pub fn build_group_hourly(report: &GroupHourlyReport) -> String {
    let mut output = build_hourly_comparison("Groups A×B by hour", &report.hourly);
    write_composition(&mut output, &report.composition);
    output
}

pub fn build_group_daily(report: &GroupDailyReport) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "## Groups A×B by day");
    write_totals(&mut output, &report.totals);
    let _ = writeln!(output);
    let _ = writeln!(output, "| Grupo | Data | Fluxo |");
    let _ = writeln!(output, "|---|---|---|");
    for row in &report.rows {
        let _ = writeln!(
            output,
            "| {} | {} | {} |",
            row.group,
            row.date,
            format_thousands(row.flow)
        );
    }
    write_composition(&mut output, &report.composition);
    output
}

pub fn build_small_multiples(panels: &SmallMultiples) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "## Small multiples by hour");
    let _ = writeln!(
        output,
        "Plotting {}",
        if panels.normalized {
            "deviation vs hour baseline (%)"
        } else {
            "flow (sum in period)"
        }
    );

    for store in &panels.stores {
        let _ = writeln!(output);
        let _ = writeln!(output, "### {store}");
        for profile in panels.profiles.iter().filter(|p| &p.store == store) {
            let value = match panels.plotted(profile) {
                Some(v) if panels.normalized => format!("{v:.1}%"),
                Some(v) => format_thousands(v),
                None => "—".to_string(),
            };
            let _ = writeln!(output, "- {:02}h: {}", profile.hour, value);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Podium by hour (Top 3)");
    if panels.podium.is_empty() {
        let _ = writeln!(output, "No hourly data for the selected stores.");
    } else {
        let _ = writeln!(output, "| Hora | Rank | Loja | Fluxo |");
        let _ = writeln!(output, "|---|---|---|---|");
        for entry in &panels.podium {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} |",
                entry.hour,
                entry.rank,
                entry.store,
                format_thousands(entry.flow)
            );
        }
    }

    output
}
