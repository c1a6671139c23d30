//! HTML rendering of a [`TrainingReport`].
use std::path::Path;

use maud::{html, Markup, PreEscaped, DOCTYPE};

use crate::config::TrainerConfig;
use crate::error::{PhytoError, Result};
use crate::trainer::TrainingReport;

const STYLE: &str = "
body { font-family: sans-serif; margin: 2em; color: #222; }
table { border-collapse: collapse; margin-bottom: 1.5em; }
th, td { border: 1px solid #ccc; padding: 4px 10px; text-align: left; }
th { background-color: #eef3ea; }
.code-container {
    background-color: #f5f5f5;
    padding: 10px;
    border-radius: 5px;
    overflow-x: auto;
    font-family: monospace;
    white-space: pre-wrap;
}";

fn fmt_metric(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.4}", v),
        None => "n/a".to_string(),
    }
}

fn overview(report: &TrainingReport) -> Markup {
    html! {
        h2 { "Overview" }
        table {
            tr { th { "Bundle" } td { (report.bundle_id) } }
            tr { th { "Created" } td { (report.created_at.to_rfc3339()) } }
            tr { th { "Records offered" } td { (report.n_records) } }
            tr { th { "Records trained on" } td { (report.n_matched) } }
            tr { th { "Dropped (no image)" } td { (report.n_missing_image) } }
            tr { th { "Dropped (unreadable image)" } td { (report.n_failed_image) } }
            tr { th { "Train / validation" } td { (report.n_train) " / " (report.n_validation) } }
            tr { th { "Validation accuracy" } td { (fmt_metric(report.validation_accuracy)) } }
        }
        h3 { "Classes" }
        ul {
            @for class in &report.classes {
                li { (class) }
            }
        }
    }
}

fn regressors(report: &TrainingReport) -> Markup {
    html! {
        h2 { "Soil regressors" }
        table {
            tr { th { "Attribute" } th { "Validation RMSE" } }
            @for entry in &report.rmse {
                tr { td { (entry.attribute) } td { (fmt_metric(entry.rmse)) } }
            }
        }
    }
}

/// Render the report as a standalone HTML page. The trainer configuration,
/// when given, is embedded as JSON.
pub fn training_report_html(
    report: &TrainingReport,
    config: Option<&TrainerConfig>,
) -> Result<String> {
    let config_json = match config {
        Some(config) => Some(
            serde_json::to_string_pretty(config)
                .map_err(|e| PhytoError::Configuration(e.to_string()))?,
        ),
        None => None,
    };

    let page = html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                title { "PhytoScan Training Report" }
                style { (PreEscaped(STYLE)) }
            }
            body {
                h1 { "PhytoScan Training Report" }
                (overview(report))
                (regressors(report))
                @if let Some(json) = &config_json {
                    h2 { "Configuration" }
                    div class="code-container" {
                        pre { code { (json) } }
                    }
                }
            }
        }
    };
    Ok(page.into_string())
}

pub fn save_training_report<P: AsRef<Path>>(
    path: P,
    report: &TrainingReport,
    config: Option<&TrainerConfig>,
) -> Result<()> {
    let path = path.as_ref();
    std::fs::write(path, training_report_html(report, config)?)?;
    log::info!("Training report written to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trainer::AttributeRmse;

    fn report() -> TrainingReport {
        TrainingReport {
            bundle_id: "test-bundle".to_string(),
            created_at: chrono::Utc::now(),
            n_records: 10,
            n_matched: 8,
            n_missing_image: 2,
            n_failed_image: 0,
            classes: vec!["Blight".to_string(), "<Healthy>".to_string()],
            n_train: 6,
            n_validation: 2,
            validation_accuracy: Some(0.5),
            rmse: vec![AttributeRmse {
                attribute: "soil_pH".to_string(),
                rmse: None,
            }],
        }
    }

    #[test]
    fn page_lists_counts_and_escapes_classes() {
        let html = training_report_html(&report(), None).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("test-bundle"));
        assert!(html.contains("0.5000"));
        assert!(html.contains("&lt;Healthy&gt;"));
        assert!(html.contains("n/a"));
        assert!(!html.contains("Configuration"));
    }

    #[test]
    fn config_is_embedded_when_given() {
        let html = training_report_html(&report(), Some(&TrainerConfig::default())).unwrap();
        assert!(html.contains("validation_fraction"));
    }
}
