use std::collections::{BTreeMap, HashMap};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use colored::Colorize;
use relaycache_engine::BatchError;
use serde::Serialize;
use serde_json::{Value, json};

/// Printable outcome of a keyed command.
#[derive(Debug, Default, Serialize)]
pub struct Report {
    pub values: BTreeMap<String, Value>,
    pub errors: Vec<ReportError>,
}

#[derive(Debug, Serialize)]
pub struct ReportError {
    pub key: String,
    pub error: String,
}

impl Report {
    pub fn from_batch(values: HashMap<String, Vec<u8>>, error: Option<BatchError>) -> Self {
        let mut report = Report {
            values: values
                .into_iter()
                .map(|(key, bytes)| (key, render_bytes(&bytes)))
                .collect(),
            errors: Vec::new(),
        };
        if let Some(error) = error {
            for failure in error.into_errors() {
                report.push_error(failure.key, failure.source.to_string());
            }
        }
        report.errors.sort_by(|a, b| a.key.cmp(&b.key));
        report
    }

    pub fn push_error(&mut self, key: impl Into<String>, error: impl Into<String>) {
        self.errors.push(ReportError {
            key: key.into(),
            error: error.into(),
        });
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// UTF-8 payloads print as strings, anything else as `{"base64": ...}`.
pub fn render_bytes(bytes: &[u8]) -> Value {
    match std::str::from_utf8(bytes) {
        Ok(text) => Value::String(text.to_string()),
        Err(_) => json!({ "base64": STANDARD.encode(bytes) }),
    }
}

pub fn print_report(report: &Report) {
    match serde_json::to_string_pretty(report) {
        Ok(text) => println!("{text}"),
        Err(e) => print_error(&format!("Failed to render output: {e}")),
    }
}

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaycache_engine::{EngineError, KeyError};

    #[test]
    fn test_render_bytes() {
        assert_eq!(render_bytes(br#"{"zoo":"zac"}"#), json!(r#"{"zoo":"zac"}"#));
        assert_eq!(render_bytes(&[0xff, 0x00]), json!({ "base64": "/wA=" }));
    }

    #[test]
    fn test_report_from_batch() {
        let values = HashMap::from([("api:a".to_string(), b"1".to_vec())]);
        let error = BatchError::from_errors(vec![
            KeyError::new("api:c", EngineError::unresolvable("api:c", "unknown cache")),
            KeyError::new("api:b", EngineError::invalid_request("bad")),
        ]);

        let report = Report::from_batch(values, error);
        assert!(!report.is_success());
        assert_eq!(report.values["api:a"], json!("1"));
        assert_eq!(report.errors[0].key, "api:b");
        assert_eq!(report.errors[1].error, "unknown cache");

        let rendered = serde_json::to_value(&report).unwrap();
        assert_eq!(rendered["errors"].as_array().map(Vec::len), Some(2));
    }
}
