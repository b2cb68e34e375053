use serde_json::json;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// JSON-lines timing log. A `<stem>_hot.log` ranking of the slowest stages is
/// written next to it when the last clone is dropped.
#[derive(Clone)]
pub(crate) struct PerfLogger {
    inner: Arc<Mutex<PerfState>>,
}

struct PerfState {
    writer: BufWriter<File>,
    path: PathBuf,
    span_totals: HashMap<String, f64>,
    span_counts: HashMap<String, u64>,
    count_totals: HashMap<String, u64>,
}

impl PerfLogger {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(PerfState {
                writer: BufWriter::new(file),
                path,
                span_totals: HashMap::new(),
                span_counts: HashMap::new(),
                count_totals: HashMap::new(),
            })),
        })
    }

    pub fn log_span_ms(&self, name: &str, doc: Option<&str>, ms: f64) {
        let line = json!({
            "type": "perf.span",
            "name": name,
            "doc": doc,
            "unit": "ms",
            "ms": round_ms(ms),
        });
        if let Ok(mut state) = self.inner.lock() {
            *state.span_totals.entry(name.to_string()).or_insert(0.0) += ms;
            let entry = state.span_counts.entry(name.to_string()).or_insert(0);
            *entry = entry.saturating_add(1);
            let _ = writeln!(state.writer, "{line}");
        }
    }

    pub fn log_counts(&self, name: &str, doc: Option<&str>, counts: &[(&str, u64)]) {
        let map: serde_json::Map<String, serde_json::Value> = counts
            .iter()
            .map(|(key, value)| (key.to_string(), json!(value)))
            .collect();
        let line = json!({
            "type": "perf.counts",
            "name": name,
            "doc": doc,
            "counts": map,
        });
        if let Ok(mut state) = self.inner.lock() {
            for (key, value) in counts {
                let entry = state.count_totals.entry(format!("{name}.{key}")).or_insert(0);
                *entry = entry.saturating_add(*value);
            }
            let _ = writeln!(state.writer, "{line}");
        }
    }

    pub fn flush(&self) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = state.writer.flush();
        }
    }
}

fn round_ms(ms: f64) -> f64 {
    (ms * 1000.0).round() / 1000.0
}

impl Drop for PerfState {
    fn drop(&mut self) {
        let _ = self.writer.flush();
        let Ok(file) = File::create(hot_path_for(&self.path)) else {
            return;
        };
        let mut writer = BufWriter::new(file);

        let mut spans: Vec<(&String, &f64)> = self.span_totals.iter().collect();
        spans.sort_by(|a, b| b.1.total_cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (rank, (name, ms)) in spans.into_iter().take(100).enumerate() {
            let count = self.span_counts.get(name).copied().unwrap_or(1).max(1);
            let line = json!({
                "type": "perf.hot.span",
                "rank": rank + 1,
                "name": name,
                "unit": "ms",
                "agg": "sum",
                "ms": round_ms(*ms),
                "count": count,
                "avg_ms": round_ms(ms / count as f64),
            });
            let _ = writeln!(writer, "{line}");
        }

        let mut counts: Vec<(&String, &u64)> = self.count_totals.iter().collect();
        counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (rank, (name, value)) in counts.into_iter().take(100).enumerate() {
            let line = json!({
                "type": "perf.hot.count",
                "rank": rank + 1,
                "name": name,
                "value": value,
            });
            let _ = writeln!(writer, "{line}");
        }
        let _ = writer.flush();
    }
}

fn hot_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("vdkit_perf.log");
    let stem = file_name
        .rsplit_once('.')
        .map(|(s, _)| s)
        .unwrap_or(file_name);
    path.with_file_name(format!("{stem}_hot.log"))
}
