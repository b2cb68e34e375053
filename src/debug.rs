use crate::diagnostics::Diagnostic;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// JSON-lines debug log shared by every conversion of one `Vectorizer`.
#[derive(Clone)]
pub(crate) struct DebugLogger {
    inner: Arc<Mutex<DebugState>>,
}

struct DebugState {
    writer: BufWriter<File>,
    totals: BTreeMap<String, u64>,
}

impl DebugLogger {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(DebugState {
                writer: BufWriter::new(file),
                totals: BTreeMap::new(),
            })),
        })
    }

    pub fn log_value(&self, value: &Value) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = writeln!(state.writer, "{value}");
        }
    }

    /// Writes one line per diagnostic followed by a `debug.summary` line of
    /// per-code counts. The lines of one conversion are never interleaved with
    /// another's.
    pub fn log_conversion(&self, context: &str, diagnostics: &[Diagnostic]) {
        let Ok(mut state) = self.inner.lock() else {
            return;
        };
        let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
        for d in diagnostics {
            let line = json!({
                "type": "diagnostic",
                "context": context,
                "code": d.code,
                "severity": d.severity,
                "message": d.message,
                "meta": d.meta,
            });
            let _ = writeln!(state.writer, "{line}");
            *counts.entry(d.code.as_str()).or_insert(0) += 1;
        }
        for (code, n) in &counts {
            let total = state.totals.entry(code.to_string()).or_insert(0);
            *total = total.saturating_add(*n);
        }
        let line = json!({
            "type": "debug.summary",
            "context": context,
            "counts": counts,
        });
        let _ = writeln!(state.writer, "{line}");
    }

    /// Running per-code totals across every conversion logged so far.
    pub fn totals(&self) -> BTreeMap<String, u64> {
        self.inner
            .lock()
            .map(|state| state.totals.clone())
            .unwrap_or_default()
    }

    pub fn flush(&self) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = state.writer.flush();
        }
    }
}
