use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The declared kind of a form field, as reported by the upstream scraper.
///
/// The declared kind does not determine the rendered control: a `ValueSelect`
/// may surface as radio buttons, checkboxes, or a filterable combobox. That
/// distinction is probed at fill time, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    Text,
    LongText,
    Boolean,
    File,
    Location,
    ValueSelect,
    MultiValueSelect,
    Date,
}

/// Normalized description of one form input. Produced by an external scraper
/// and treated as read-only input for the whole attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Human-visible question text, e.g. "Are you authorized to work in the US?".
    pub title: String,
    /// Unique logical id for this field within the form.
    pub path: String,
    pub kind: FieldKind,
    pub required: bool,
    #[serde(default)]
    pub description: Option<String>,
    /// Ordered option captions for select-style fields.
    #[serde(default)]
    pub options: Option<Vec<String>>,
}

/// A resolved value to place into a field, supplied per `path` by an external
/// answer oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerValue {
    Text(String),
    Flag(bool),
    /// Preformatted date string, set verbatim.
    Date(String),
    Choice(String),
    Choices(Vec<String>),
    FilePath(PathBuf),
}

impl AnswerValue {
    /// The value as text to be typed, where that makes sense.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AnswerValue::Text(s) | AnswerValue::Date(s) | AnswerValue::Choice(s) => Some(s),
            AnswerValue::FilePath(p) => p.to_str(),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            AnswerValue::Flag(b) => Some(*b),
            _ => None,
        }
    }

    /// Requested option captions, whether the answer holds one or several.
    pub fn choice_list(&self) -> Vec<&str> {
        match self {
            AnswerValue::Choice(s) => vec![s.as_str()],
            AnswerValue::Choices(v) => v.iter().map(String::as_str).collect(),
            AnswerValue::Text(s) => vec![s.as_str()],
            _ => Vec::new(),
        }
    }
}

/// `path -> AnswerValue`, built once per attempt by the answer oracle.
pub type AnswerMap = HashMap<String, AnswerValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillStatus {
    Filled,
    Skipped,
    Error,
}

/// Outcome of processing a single field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillResult {
    pub path: String,
    pub status: FillStatus,
    #[serde(default)]
    pub detail: Option<String>,
}

impl FillResult {
    pub fn filled(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            status: FillStatus::Filled,
            detail: None,
        }
    }

    pub fn skipped(path: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            status: FillStatus::Skipped,
            detail: Some(detail.into()),
        }
    }

    pub fn error(path: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            status: FillStatus::Error,
            detail: Some(detail.into()),
        }
    }
}

/// Ordered per-field outcomes for one attempt. Each `path` appears at most once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FillReport {
    results: Vec<FillResult>,
}

impl FillReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a result. A second result for the same path is ignored so the
    /// at-most-once invariant holds even if a deferred field is visited twice.
    pub fn record(&mut self, result: FillResult) {
        if !self.results.iter().any(|r| r.path == result.path) {
            self.results.push(result);
        }
    }

    pub fn results(&self) -> &[FillResult] {
        &self.results
    }

    pub fn filled(&self) -> usize {
        self.count(FillStatus::Filled)
    }

    pub fn skipped(&self) -> usize {
        self.count(FillStatus::Skipped)
    }

    pub fn errors(&self) -> usize {
        self.count(FillStatus::Error)
    }

    fn count(&self, status: FillStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionStatus {
    Submitted,
    Flagged,
    Uncertain,
    Failed,
    ManualSubmit,
}

/// Terminal classification of an application attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    pub status: SubmissionStatus,
    pub message: String,
}

impl SubmissionOutcome {
    pub fn new(status: SubmissionStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(SubmissionStatus::Failed, message)
    }
}

/// Raw audit captures taken at fixed lifecycle points. Where these end up is
/// the caller's concern; the engine only produces them.
#[derive(Debug, Clone, Default)]
pub struct AuditArtifacts {
    pub form_debug_png: Option<Vec<u8>>,
    pub pre_submit_png: Option<Vec<u8>>,
    pub post_submit_png: Option<Vec<u8>>,
    pub page_html: Option<String>,
}

/// Everything one attempt hands back to the persistence layer.
#[derive(Debug)]
pub struct AttemptOutput {
    pub report: FillReport,
    pub outcome: SubmissionOutcome,
    pub artifacts: AuditArtifacts,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_keeps_one_result_per_path() {
        let mut report = FillReport::new();
        report.record(FillResult::filled("field_a"));
        report.record(FillResult::error("field_a", "late duplicate"));
        report.record(FillResult::skipped("field_b", "no value"));

        assert_eq!(report.results().len(), 2);
        assert_eq!(report.results()[0].status, FillStatus::Filled);
        assert_eq!(report.filled(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.errors(), 0);
    }

    #[test]
    fn choice_list_covers_single_and_multi() {
        let one = AnswerValue::Choice("Massachusetts".into());
        assert_eq!(one.choice_list(), vec!["Massachusetts"]);

        let many = AnswerValue::Choices(vec!["Rust".into(), "Go".into()]);
        assert_eq!(many.choice_list(), vec!["Rust", "Go"]);

        assert!(AnswerValue::Flag(true).choice_list().is_empty());
    }

    #[test]
    fn descriptor_round_trips_through_json() {
        let json = r#"{
            "title": "State",
            "path": "state",
            "kind": "ValueSelect",
            "required": true,
            "options": ["Massachusetts", "New York"]
        }"#;
        let field: FieldDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(field.kind, FieldKind::ValueSelect);
        assert_eq!(field.options.as_deref().unwrap().len(), 2);
        assert!(field.description.is_none());
    }
}
