//! Reporting and export: JSON, CSV, and Markdown artifact generation.
//!
//! - **JSON**: the full `RunReport`, schema-versioned, round-trippable
//! - **CSV**: consensus ranking, one table per model, rank heatmap
//! - **Markdown**: a human-readable run summary
//!
//! Flags appear in their bracketed form (`[Q][V][!]`) only here.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use screenlab_core::{rank_heatmap, Category, ConsensusRecord, ModelResult, RankHeatmap};

use crate::runner::{RunReport, SCHEMA_VERSION};

/// Consensus rows included in the Markdown report and heatmap.
pub const REPORT_TOP: usize = 20;

const LATEST_DIR: &str = "latest";

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `RunReport` to pretty JSON.
pub fn export_json(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize RunReport to JSON")
}

/// Deserialize a `RunReport` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<RunReport> {
    let report: RunReport =
        serde_json::from_str(json).context("failed to deserialize RunReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export the consensus ranking.
///
/// Columns: rank, ticker, signal_strength, coverage, elite_score,
/// flag_density, warning_count, consistency_bonus, avg_rank, best_rank,
/// top_tier_hits, one `cat_<category>` column per category, thesis_category,
/// conviction, thesis_detail
pub fn export_consensus_csv(consensus: &[ConsensusRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header: Vec<String> = [
        "rank",
        "ticker",
        "signal_strength",
        "coverage",
        "elite_score",
        "flag_density",
        "warning_count",
        "consistency_bonus",
        "avg_rank",
        "best_rank",
        "top_tier_hits",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    header.extend(Category::ALL.iter().map(|c| format!("cat_{c}")));
    header.extend(["thesis_category", "conviction", "thesis_detail"].map(String::from));
    wtr.write_record(&header)?;

    for (i, r) in consensus.iter().enumerate() {
        let mut record = vec![
            (i + 1).to_string(),
            r.ticker.clone(),
            format!("{:.4}", r.signal_strength),
            r.coverage.to_string(),
            format!("{:.1}", r.elite_score),
            format!("{:.4}", r.flag_density),
            r.warning_count.to_string(),
            format!("{:.4}", r.consistency_bonus),
            format!("{:.2}", r.avg_rank),
            r.best_rank.to_string(),
            r.top_tier_hits.to_string(),
        ];
        record.extend(Category::ALL.iter().map(|c| {
            format!("{:.2}", r.category_strength.get(c).copied().unwrap_or(0.0))
        }));
        record.push(
            r.thesis
                .category
                .map(|c| c.to_string())
                .unwrap_or_default(),
        );
        record.push(r.thesis.conviction.to_string());
        record.push(r.thesis.detail.clone());
        wtr.write_record(&record)?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export one model's ranked rows.
///
/// Columns: rank, ticker, score, `S_<component>` per component, flags
pub fn export_model_csv(result: &ModelResult) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let components: BTreeSet<&str> = result
        .rows()
        .iter()
        .flat_map(|r| r.components.keys().map(String::as_str))
        .collect();

    let mut header = vec!["rank".to_string(), "ticker".to_string(), "score".to_string()];
    header.extend(components.iter().map(|c| format!("S_{c}")));
    header.push("flags".to_string());
    wtr.write_record(&header)?;

    for (rank, row) in result.ranked() {
        let mut record = vec![
            rank.to_string(),
            row.ticker().to_string(),
            format!("{:.2}", row.score),
        ];
        record.extend(components.iter().map(|c| {
            row.components
                .get(*c)
                .map(|v| format!("{v:.2}"))
                .unwrap_or_default()
        }));
        record.push(row.flags.render_brackets());
        wtr.write_record(&record)?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export a rank heatmap: ticker plus one rank column per model, blank when
/// the ticker is absent from that model.
pub fn export_heatmap_csv(heatmap: &RankHeatmap) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec!["ticker".to_string()];
    header.extend(heatmap.models.iter().cloned());
    wtr.write_record(&header)?;

    for row in &heatmap.rows {
        let mut record = vec![row.ticker.clone()];
        record.extend(
            row.ranks
                .iter()
                .map(|r| r.map(|v| v.to_string()).unwrap_or_default()),
        );
        wtr.write_record(&record)?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifacts ──────────────────────────────────────────────────────

/// Save all artifacts for a run to a timestamped directory.
///
/// Creates `{output_dir}/run_{timestamp}/` containing:
/// - `report.json`: full run report (schema-versioned)
/// - `consensus.csv`: consensus ranking
/// - `heatmap.csv`: rank heatmap of the top consensus tickers
/// - `<model_id>.csv`: one table per model result
/// - `report.md`: Markdown summary
///
/// The same files are also written to `{output_dir}/latest/`, replacing its
/// previous contents. Returns the path to the timestamped directory.
pub fn save_artifacts(report: &RunReport, output_dir: &Path) -> Result<PathBuf> {
    let dirname = format!("run_{}", chrono::Local::now().format("%Y%m%d_%H%M%S"));
    let run_dir = output_dir.join(dirname);
    write_artifacts(report, &run_dir)?;

    let latest = output_dir.join(LATEST_DIR);
    if latest.exists() {
        std::fs::remove_dir_all(&latest)
            .with_context(|| format!("failed to clear {}", latest.display()))?;
    }
    write_artifacts(report, &latest)?;

    Ok(run_dir)
}

fn write_artifacts(report: &RunReport, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create artifact dir: {}", dir.display()))?;

    let write = |name: &str, content: &str| -> Result<()> {
        let path = dir.join(name);
        std::fs::write(&path, content)
            .with_context(|| format!("failed to write {}", path.display()))
    };

    write("report.json", &export_json(report)?)?;
    write("consensus.csv", &export_consensus_csv(&report.consensus)?)?;
    let heatmap = rank_heatmap(&report.results, &report.consensus, REPORT_TOP);
    write("heatmap.csv", &export_heatmap_csv(&heatmap)?)?;
    for (id, result) in &report.results {
        write(&format!("{id}.csv"), &export_model_csv(result)?)?;
    }
    write("report.md", &generate_report(report, REPORT_TOP))?;
    Ok(())
}

/// Load a `RunReport` from an artifact directory's report.json.
///
/// Rejects unknown schema versions.
pub fn load_artifacts(dir: &Path) -> Result<RunReport> {
    let path = dir.join("report.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

// ─── Markdown report ────────────────────────────────────────────────

/// Generate a Markdown summary of a run, listing the top `top` consensus
/// tickers and the top five of each model.
pub fn generate_report(report: &RunReport, top: usize) -> String {
    let mut md = String::with_capacity(4096);

    md.push_str("# Screening Report\n\n");

    md.push_str("## Metadata\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!(
        "| Generated | {} |\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    md.push_str(&format!("| Data | {} |\n", report.data_source));
    if report.synthetic {
        md.push_str("| Data Kind | **SYNTHETIC** |\n");
    }
    md.push_str(&format!("| Fingerprint | {} |\n", report.fingerprint));
    md.push_str(&format!("| Models Run | {} |\n", report.results.len()));
    md.push_str(&format!(
        "| Models Skipped | {} |\n",
        report.skipped_models.len()
    ));
    md.push_str(&format!("| Rows Skipped | {} |\n", report.skipped_row_count()));
    md.push_str(&format!("| Tickers | {} |\n", report.consensus.len()));
    md.push('\n');

    md.push_str("## Consensus\n\n");
    md.push_str("| # | Ticker | Signal | Coverage | Elite | Flags/Model | Warnings | Thesis |\n");
    md.push_str("| --- | --- | --- | --- | --- | --- | --- | --- |\n");
    for (i, r) in report.consensus.iter().take(top).enumerate() {
        md.push_str(&format!(
            "| {} | {} | {:.2} | {} | {:.0} | {:.2} | {} | {} |\n",
            i + 1,
            r.ticker,
            r.signal_strength,
            r.coverage,
            r.elite_score,
            r.flag_density,
            r.warning_count,
            r.thesis
        ));
    }
    md.push('\n');

    md.push_str("## Models\n\n");
    for result in report.results.values() {
        md.push_str(&format!(
            "### {} ({}, {} rows)\n\n",
            result.model_name,
            result.theme,
            result.len()
        ));
        md.push_str("| Rank | Ticker | Score | Flags |\n");
        md.push_str("| --- | --- | --- | --- |\n");
        for (rank, row) in result.ranked().take(5) {
            md.push_str(&format!(
                "| {} | {} | {:.1} | {} |\n",
                rank,
                row.ticker(),
                row.score,
                row.flags.render_brackets()
            ));
        }
        md.push('\n');
    }

    if !report.skipped_models.is_empty() {
        md.push_str("## Skipped Models\n\n");
        md.push_str("| Model | Kind | Reason |\n");
        md.push_str("| --- | --- | --- |\n");
        for s in &report.skipped_models {
            md.push_str(&format!("| {} | {:?} | {} |\n", s.model_id, s.kind, s.reason));
        }
        md.push('\n');
    }

    let skipped_rows: Vec<_> = report.skipped_rows().collect();
    if !skipped_rows.is_empty() {
        md.push_str("## Skipped Rows\n\n");
        md.push_str("| Model | Line | Reason |\n");
        md.push_str("| --- | --- | --- |\n");
        for (model, row) in skipped_rows {
            md.push_str(&format!("| {} | {} | {} |\n", model, row.line, row.error));
        }
        md.push('\n');
    }

    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use chrono::Utc;
    use screenlab_core::{
        aggregate, AggregationConfig, DataRowError, Flag, FlagSet, MetricRow, ScoredRow,
        SkippedRow,
    };

    use crate::runner::{SkipKind, SkippedModel};

    fn scored(ticker: &str, score: f64, flags: FlagSet) -> ScoredRow {
        let components = [("quality".to_string(), score), ("value".to_string(), 50.0)]
            .into_iter()
            .collect();
        ScoredRow {
            row: MetricRow::new(ticker, BTreeMap::new()),
            score,
            components,
            flags,
        }
    }

    fn sample_report() -> RunReport {
        let flags: FlagSet = [Flag::positive("Q", Category::Quality), Flag::warning("!")]
            .into_iter()
            .collect();
        let result = ModelResult::new(
            "quality_growth",
            "Quality Growth",
            Category::Quality,
            vec![
                scored("AAA", 90.0, flags),
                scored("BBB", 70.0, FlagSet::new()),
            ],
            vec![SkippedRow {
                line: 3,
                error: DataRowError::EmptyTicker { line: 3 },
            }],
        );
        let mut results = BTreeMap::new();
        results.insert("quality_growth".to_string(), result);
        let consensus = aggregate(&results, &AggregationConfig::default());
        RunReport {
            schema_version: SCHEMA_VERSION,
            generated_at: Utc::now(),
            fingerprint: "ab".repeat(32),
            data_source: "memory".into(),
            synthetic: false,
            results,
            skipped_models: vec![SkippedModel {
                model_id: "turnaround".into(),
                kind: SkipKind::DatasetMissing,
                reason: "dataset 'turnaround.csv' not found in memory".into(),
            }],
            consensus,
        }
    }

    // ─── JSON ───────────────────────────────────────────────────────

    #[test]
    fn json_roundtrip() {
        let report = sample_report();
        let json = export_json(&report).unwrap();
        let loaded = import_json(&json).unwrap();
        assert_eq!(loaded.fingerprint, report.fingerprint);
        assert_eq!(loaded.results["quality_growth"].len(), 2);
        assert_eq!(loaded.consensus.len(), report.consensus.len());
        assert_eq!(loaded.consensus[0].ticker, "AAA");
        assert_eq!(loaded.skipped_models, report.skipped_models);
        assert_eq!(loaded.skipped_row_count(), 1);
    }

    #[test]
    fn json_rejects_unknown_version() {
        let mut report = sample_report();
        report.schema_version = SCHEMA_VERSION + 1;
        let json = export_json(&report).unwrap();
        assert!(import_json(&json).is_err());
    }

    // ─── CSV ────────────────────────────────────────────────────────

    #[test]
    fn model_csv_has_component_columns_and_brackets() {
        let report = sample_report();
        let csv = export_model_csv(&report.results["quality_growth"]).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "rank,ticker,score,S_quality,S_value,flags"
        );
        assert_eq!(lines.next().unwrap(), "1,AAA,90.00,90.00,50.00,[Q][!]");
        assert_eq!(lines.next().unwrap(), "2,BBB,70.00,70.00,50.00,");
    }

    #[test]
    fn consensus_csv_columns() {
        let report = sample_report();
        let csv = export_consensus_csv(&report.consensus).unwrap();
        let header = csv.lines().next().unwrap();
        assert!(header.starts_with("rank,ticker,signal_strength,coverage"));
        assert!(header.contains("cat_quality"));
        assert!(header.ends_with("thesis_category,conviction,thesis_detail"));
        assert_eq!(csv.lines().count(), 1 + report.consensus.len());
        assert!(csv.lines().nth(1).unwrap().starts_with("1,AAA,"));
    }

    #[test]
    fn heatmap_csv_blanks_absent() {
        let heatmap = RankHeatmap {
            models: vec!["a".into(), "b".into()],
            rows: vec![screenlab_core::views::HeatmapRow {
                ticker: "AAA".into(),
                ranks: vec![Some(3), None],
            }],
        };
        let csv = export_heatmap_csv(&heatmap).unwrap();
        assert_eq!(csv, "ticker,a,b\nAAA,3,\n");
    }

    // ─── Markdown ───────────────────────────────────────────────────

    #[test]
    fn markdown_report_has_sections() {
        let md = generate_report(&sample_report(), 10);
        assert!(md.contains("# Screening Report"));
        assert!(md.contains("## Consensus"));
        assert!(md.contains("### Quality Growth"));
        assert!(md.contains("## Skipped Models"));
        assert!(md.contains("## Skipped Rows"));
        assert!(md.contains("| 1 | AAA |"));
        assert!(!md.contains("SYNTHETIC"));
    }

    // ─── Save/load artifacts ────────────────────────────────────────

    #[test]
    fn save_load_artifacts_roundtrip() {
        let report = sample_report();
        let dir = tempfile::tempdir().unwrap();
        let run_dir = save_artifacts(&report, dir.path()).unwrap();

        for name in ["report.json", "consensus.csv", "heatmap.csv", "quality_growth.csv", "report.md"] {
            assert!(run_dir.join(name).exists(), "{name} missing");
            assert!(dir.path().join("latest").join(name).exists(), "latest/{name} missing");
        }

        let loaded = load_artifacts(&run_dir).unwrap();
        assert_eq!(loaded.fingerprint, report.fingerprint);
        let latest = load_artifacts(&dir.path().join("latest")).unwrap();
        assert_eq!(latest.fingerprint, report.fingerprint);
    }
}
