use anyhow::Result;
use chrono::Local;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use sugartrack_core::models::{Overview, Unit};
use sugartrack_core::service::SugarService;
use sugartrack_core::units::format_value;
use sugartrack_core::views::{HIGH_THRESHOLD_MG_DL, LOW_THRESHOLD_MG_DL};

pub(crate) fn cmd_overview(svc: &SugarService, json: bool) -> Result<()> {
    let overview = svc.overview(&Local);

    if json {
        println!("{}", serde_json::to_string_pretty(&overview)?);
        return Ok(());
    }

    if overview.stats.count == 0 {
        eprintln!("No readings yet. Use `sugartrack add` to log one.");
        return Ok(());
    }

    print_overview(&overview);
    Ok(())
}

fn print_overview(overview: &Overview) {
    let s = &overview.stats;
    println!("=== Overview (mg/dL) ===\n");
    println!(
        "  Average: {}   High: {}   Low: {}   Readings: {}",
        s.avg, s.high, s.low, s.count
    );
    println!("  Guide lines: low < {LOW_THRESHOLD_MG_DL:.0}, high > {HIGH_THRESHOLD_MG_DL:.0}\n");

    #[derive(Tabled)]
    struct PointRow {
        #[tabled(rename = "When")]
        label: String,
        #[tabled(rename = "mg/dL")]
        value: String,
        #[tabled(rename = "Entered")]
        entered: String,
        #[tabled(rename = "Range")]
        range: String,
        #[tabled(rename = "Trend")]
        bar: String,
    }

    let rows: Vec<PointRow> = overview
        .chart
        .iter()
        .map(|p| PointRow {
            label: p.label.clone(),
            value: format!("{:.0}", p.value),
            entered: if p.original_unit == Unit::MgDl {
                String::new()
            } else {
                format_value(p.original_value, p.original_unit)
            },
            range: p.range.label().to_string(),
            bar: bar(p.value),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..3)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

/// One block per 20 mg/dL, capped so wide readings don't wrap.
#[allow(clippy::cast_sign_loss)]
fn bar(value: f64) -> String {
    let blocks = (value / 20.0).round().clamp(0.0, 20.0) as usize;
    "█".repeat(blocks)
}
