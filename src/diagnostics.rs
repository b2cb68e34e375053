use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Stable diagnostic codes.
pub mod codes {
    pub const PATH_EMPTY: &str = "W_PATH_EMPTY";
    pub const COLOR_UNPARSEABLE: &str = "W_COLOR_UNPARSEABLE";
    pub const RECT_ROUNDED_IGNORED: &str = "W_RECT_ROUNDED_IGNORED";
    pub const SHAPE_SKIPPED: &str = "W_SHAPE_SKIPPED";
    pub const SHAPE_DEGENERATE: &str = "W_SHAPE_DEGENERATE";
    pub const SHAPE_TRANSFORM_RETAINED: &str = "W_SHAPE_TRANSFORM_RETAINED";
    pub const NO_VIEWBOX: &str = "W_NO_VIEWBOX";
    pub const VIEWPORT_FALLBACK: &str = "W_VIEWPORT_FALLBACK";
    pub const STROKE_LINECAP_UNSUPPORTED: &str = "W_STROKE_LINECAP_UNSUPPORTED";
    pub const STROKE_LINEJOIN_UNSUPPORTED: &str = "W_STROKE_LINEJOIN_UNSUPPORTED";
    pub const UNSUPPORTED_LINEARGRADIENT: &str = "W_UNSUPPORTED_LINEARGRADIENT";
    pub const UNSUPPORTED_RADIALGRADIENT: &str = "W_UNSUPPORTED_RADIALGRADIENT";
    pub const UNSUPPORTED_PATTERN: &str = "W_UNSUPPORTED_PATTERN";
    pub const UNSUPPORTED_FILTER: &str = "W_UNSUPPORTED_FILTER";
    pub const UNSUPPORTED_MASK: &str = "W_UNSUPPORTED_MASK";
    pub const UNSUPPORTED_FOREIGNOBJECT: &str = "W_UNSUPPORTED_FOREIGNOBJECT";
    pub const UNSUPPORTED_TEXT: &str = "W_UNSUPPORTED_TEXT";
    pub const CLIPPATH_LIMITED: &str = "W_CLIPPATH_LIMITED";
    pub const PATH_TRANSFORM_UNAVAILABLE: &str = "W_PATH_TRANSFORM_UNAVAILABLE";
    pub const PATH_TRANSFORM_FAILED: &str = "W_PATH_TRANSFORM_FAILED";
    pub const OPTIMIZER_UNAVAILABLE: &str = "W_OPTIMIZER_UNAVAILABLE";
    pub const OPTIMIZER_FAILED: &str = "W_OPTIMIZER_FAILED";
    pub const SANITIZED_ELEMENT: &str = "W_SANITIZED_ELEMENT";
    pub const SANITIZED_HANDLER: &str = "W_SANITIZED_HANDLER";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub code: String,
    pub message: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CodeSummary {
    pub count: usize,
    pub severity: Severity,
}

/// Append-only diagnostics accumulator, one per top-level call.
///
/// Records are never removed or edited once pushed; callers read them through
/// [`WarningSink::as_slice`] or take ownership with [`WarningSink::into_vec`].
#[derive(Debug, Clone, Default)]
pub struct WarningSink {
    items: Vec<Diagnostic>,
}

impl WarningSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        code: &str,
        message: impl Into<String>,
        severity: Severity,
        meta: Option<Value>,
    ) {
        self.items.push(Diagnostic {
            code: code.to_string(),
            message: message.into(),
            severity,
            meta,
        });
    }

    pub fn info(&mut self, code: &str, message: impl Into<String>) {
        self.push(code, message, Severity::Info, None);
    }

    pub fn warn(&mut self, code: &str, message: impl Into<String>) {
        self.push(code, message, Severity::Warn, None);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn count_code(&self, code: &str) -> usize {
        self.items.iter().filter(|d| d.code == code).count()
    }

    pub fn max_severity(&self) -> Option<Severity> {
        self.items.iter().map(|d| d.severity).max()
    }

    /// Per code: occurrence count and the highest severity seen.
    pub fn summarize(&self) -> BTreeMap<String, CodeSummary> {
        let mut out: BTreeMap<String, CodeSummary> = BTreeMap::new();
        for d in &self.items {
            let entry = out.entry(d.code.clone()).or_insert(CodeSummary {
                count: 0,
                severity: d.severity,
            });
            entry.count += 1;
            entry.severity = entry.severity.max(d.severity);
        }
        out
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn summary_counts_and_keeps_max_severity() {
        let mut sink = WarningSink::new();
        sink.info("A", "first");
        sink.warn("A", "second");
        sink.info("A", "third");
        sink.push("B", "boom", Severity::Error, Some(json!({ "n": 1 })));
        sink.warn("B", "later warn");

        let summary = sink.summarize();
        assert_eq!(
            summary["A"],
            CodeSummary {
                count: 3,
                severity: Severity::Warn
            }
        );
        assert_eq!(
            summary["B"],
            CodeSummary {
                count: 2,
                severity: Severity::Error
            }
        );
        assert_eq!(sink.max_severity(), Some(Severity::Error));
    }

    #[test]
    fn severity_ordering_is_error_over_warn_over_info() {
        assert!(Severity::Error > Severity::Warn);
        assert!(Severity::Warn > Severity::Info);
    }

    #[test]
    fn diagnostics_serialize_with_lowercase_severity() {
        let mut sink = WarningSink::new();
        sink.push("W_X", "msg", Severity::Warn, None);
        let json = serde_json::to_value(&sink.as_slice()[0]).unwrap();
        assert_eq!(json, json!({ "code": "W_X", "message": "msg", "severity": "warn" }));
    }
}
