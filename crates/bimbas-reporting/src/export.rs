use bimbas_core::{ContributorResult, ContributorType, FEATURE_NAMES};
use serde_json::{json, Value};

use crate::types::{ExportFormat, ReportingError};

/// Serializes `results` to the requested format.
pub fn export_results(results: &[ContributorResult], format: ExportFormat) -> Result<String, ReportingError> {
    match format {
        ExportFormat::Csv => Ok(export_csv(results)),
        ExportFormat::Json => export_json(results),
        ExportFormat::PlainText => Ok(export_plain_text(results)),
    }
}

/// One JSON array entry per contributor: `contributor`, `type`,
/// `confidence` (a number, or the literal string `"-"` for the sentinel),
/// and `features` (an object keyed by the §4.4 column names, or `null`).
pub fn export_json(results: &[ContributorResult]) -> Result<String, ReportingError> {
    let rows: Vec<Value> = results.iter().map(result_to_json).collect();
    Ok(serde_json::to_string_pretty(&Value::Array(rows))?)
}

fn result_to_json(result: &ContributorResult) -> Value {
    let confidence = match result.confidence {
        Some(value) => json!(value),
        None => json!("-"),
    };
    let features = result.features.as_ref().map(|row| {
        let mut map = serde_json::Map::new();
        for (name, value) in row.iter_ordered() {
            map.insert(name.to_string(), json!(value));
        }
        Value::Object(map)
    });

    json!({
        "contributor": result.contributor,
        "type": user_type_label(result.user_type),
        "confidence": confidence,
        "features": features,
    })
}

/// One row per contributor: `contributor,type,confidence`, followed by the
/// 38 feature columns (blank when no features were computed).
fn export_csv(results: &[ContributorResult]) -> String {
    let mut out = String::new();
    out.push_str("contributor,type,confidence,");
    out.push_str(&FEATURE_NAMES.join(","));
    out.push('\n');

    for result in results {
        out.push_str(&csv_field(&result.contributor));
        out.push(',');
        out.push_str(user_type_label(result.user_type));
        out.push(',');
        match result.confidence {
            Some(value) => out.push_str(&value.to_string()),
            None => out.push('-'),
        }
        match &result.features {
            Some(row) => {
                for (_, value) in row.iter_ordered() {
                    out.push(',');
                    out.push_str(&value.to_string());
                }
            }
            None => {
                for _ in FEATURE_NAMES {
                    out.push(',');
                }
            }
        }
        out.push('\n');
    }

    out
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn export_plain_text(results: &[ContributorResult]) -> String {
    results
        .iter()
        .map(|result| {
            let confidence = match result.confidence {
                Some(value) => format!("{value:.3}"),
                None => "-".to_string(),
            };
            format!("{}\t{}\t{}", result.contributor, user_type_label(result.user_type), confidence)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn user_type_label(user_type: ContributorType) -> &'static str {
    match user_type {
        ContributorType::Bot => "Bot",
        ContributorType::Human => "Human",
        ContributorType::Organization => "Organization",
        ContributorType::Unknown => "Unknown",
        ContributorType::Invalid => "Invalid",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ContributorResult {
        ContributorResult {
            contributor: "octocat".to_string(),
            user_type: ContributorType::Human,
            confidence: Some(0.91),
            features: None,
        }
    }

    #[test]
    fn csv_uses_dash_sentinel_for_missing_confidence() {
        let mut invalid = sample();
        invalid.user_type = ContributorType::Invalid;
        invalid.confidence = None;
        let csv = export_csv(&[invalid]);
        assert!(csv.contains("octocat,Invalid,-"));
    }

    #[test]
    fn json_round_trips_contributor_and_type() {
        let json = export_json(&[sample()]).unwrap();
        let parsed: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0]["contributor"], "octocat");
        assert_eq!(parsed[0]["type"], "Human");
        assert_eq!(parsed[0]["confidence"], 0.91);
    }

    #[test]
    fn plain_text_has_one_line_per_contributor() {
        let text = export_plain_text(&[sample(), sample()]);
        assert_eq!(text.lines().count(), 2);
    }
}
