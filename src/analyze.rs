use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use plotters::element::Pie;
use plotters::prelude::*;
use plotters::style::Palette;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, GlossaError};
use crate::parse::ParsedResult;

/// Bucket used for responses with no detectable code.
pub const UNKNOWN_BUCKET: &str = "unknown";

pub const RESULTS_FILE: &str = "language_analysis_results.json";
pub const SUMMARY_FILE: &str = "language_analysis_summary.txt";
pub const BAR_CHART_FILE: &str = "language_distribution_bar.svg";
pub const PIE_CHART_FILE: &str = "language_distribution_pie.svg";

/// Distribution of detected programming languages across one prompt's
/// per-language model responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub total_languages: usize,
    /// Detected programming language -> number of responses
    pub counts: BTreeMap<String, usize>,
    /// Language tag -> detected programming language (or "unknown")
    pub by_language: BTreeMap<String, String>,
}

/// Tally detected languages. Null detections land in the "unknown" bucket,
/// so an all-null input yields a single bucket sized to the language count.
pub fn summarize(results: &BTreeMap<String, ParsedResult>) -> AnalysisSummary {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_language = BTreeMap::new();

    for (language, parsed) in results {
        let detected = parsed
            .detected_language
            .clone()
            .unwrap_or_else(|| UNKNOWN_BUCKET.to_string());
        *counts.entry(detected.clone()).or_insert(0) += 1;
        by_language.insert(language.clone(), detected);
    }

    AnalysisSummary {
        total_languages: results.len(),
        counts,
        by_language,
    }
}

/// Write the analysis JSON and the human-readable text report.
pub fn write_report(summary: &AnalysisSummary, dir: &Path) -> Result<()> {
    let json_path = dir.join(RESULTS_FILE);
    std::fs::write(&json_path, serde_json::to_string_pretty(summary)?)?;

    let text_path = dir.join(SUMMARY_FILE);
    std::fs::write(&text_path, render_text_report(summary))?;

    info!("Analysis report written to {}", text_path.display());
    Ok(())
}

fn render_text_report(summary: &AnalysisSummary) -> String {
    let mut report = Vec::new();
    report.push("=".repeat(60));
    report.push("LANGUAGE ANALYSIS SUMMARY".to_string());
    report.push("=".repeat(60));
    report.push(String::new());
    report.push(format!("Generated: {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S")));
    report.push(format!("Languages analyzed: {}", summary.total_languages));
    report.push(String::new());

    report.push("DETECTED LANGUAGE DISTRIBUTION:".to_string());
    report.push("-".repeat(40));
    let total = summary.total_languages.max(1);
    // Largest buckets first, ties by name
    let mut ranked: Vec<(&String, &usize)> = summary.counts.iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
    for (language, count) in ranked {
        report.push(format!(
            "{}: {} ({:.1}%)",
            language,
            count,
            *count as f64 * 100.0 / total as f64
        ));
    }
    report.push(String::new());

    report.push("PER-LANGUAGE DETECTION:".to_string());
    report.push("-".repeat(40));
    for (language, detected) in &summary.by_language {
        report.push(format!("{} -> {}", language, detected));
    }
    report.push(String::new());

    report.join("\n")
}

/// Render the distribution as a bar chart and, when there is data, a pie
/// chart. Returns the paths of the images written.
pub fn render_charts(summary: &AnalysisSummary, dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries: Vec<(String, usize)> = summary
        .counts
        .iter()
        .map(|(name, count)| (name.clone(), *count))
        .collect();
    if entries.is_empty() {
        entries.push((UNKNOWN_BUCKET.to_string(), 0));
    }

    let mut written = Vec::new();

    let bar_path = dir.join(BAR_CHART_FILE);
    render_bar_chart(&entries, &bar_path)?;
    written.push(bar_path);

    let total: usize = entries.iter().map(|(_, c)| c).sum();
    if total > 0 {
        let pie_path = dir.join(PIE_CHART_FILE);
        render_pie_chart(&entries, &pie_path)?;
        written.push(pie_path);
    }

    Ok(written)
}

fn chart_err<E: std::fmt::Display>(e: E) -> GlossaError {
    GlossaError::Chart(e.to_string())
}

fn palette_color(index: usize) -> RGBColor {
    let (r, g, b) = Palette99::COLORS[index % Palette99::COLORS.len()];
    RGBColor(r, g, b)
}

fn render_bar_chart(entries: &[(String, usize)], path: &Path) -> Result<()> {
    let max = entries.iter().map(|(_, c)| *c).max().unwrap_or(0).max(1) as i32;
    let n = entries.len() as i32;

    let root = SVGBackend::new(path, (900, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(chart_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Detected programming languages", ("sans-serif", 28))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(50)
        .build_cartesian_2d(0i32..n, 0i32..max + 1)
        .map_err(chart_err)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(entries.len())
        .x_label_formatter(&|x| {
            entries
                .get(*x as usize)
                .map(|(name, _)| name.clone())
                .unwrap_or_default()
        })
        .y_desc("responses")
        .draw()
        .map_err(chart_err)?;

    chart
        .draw_series(entries.iter().enumerate().map(|(i, (_, count))| {
            Rectangle::new(
                [(i as i32, 0), (i as i32 + 1, *count as i32)],
                palette_color(i).mix(0.85).filled(),
            )
        }))
        .map_err(chart_err)?;

    root.present().map_err(chart_err)?;
    Ok(())
}

fn render_pie_chart(entries: &[(String, usize)], path: &Path) -> Result<()> {
    let root = SVGBackend::new(path, (700, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(chart_err)?;

    let sizes: Vec<f64> = entries.iter().map(|(_, c)| *c as f64).collect();
    let colors: Vec<RGBColor> = (0..entries.len()).map(palette_color).collect();
    let labels: Vec<String> = entries
        .iter()
        .map(|(name, count)| format!("{} ({})", name, count))
        .collect();

    let center = (350, 300);
    let radius = 220.0;
    let mut pie = Pie::new(&center, &radius, &sizes, &colors, &labels);
    pie.label_style(("sans-serif", 18).into_font());
    root.draw(&pie).map_err(chart_err)?;

    root.present().map_err(chart_err)?;
    Ok(())
}
