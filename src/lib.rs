mod affine;
mod archive;
mod bundle;
mod debug;
mod diagnostics;
mod drawable;
mod error;
mod mapper;
mod normalize;
mod optimize;
mod options;
mod parse;
mod path;
mod perf;
mod precision;
mod shapes;
mod style;
mod tree;

pub use affine::{Matrix, compose, parse_transform};
pub use archive::{
    Archive, ArchiveBuilder, ArchiveEntry, ArchiveFile, ArchiveTimestamp, build_archive, crc32,
};
pub use bundle::{BundleBuilder, resource_path, sanitize_resource_name};
use debug::DebugLogger;
pub use diagnostics::{CodeSummary, Diagnostic, Severity, WarningSink, codes};
pub use drawable::{OutputDocument, VectorPathRecord};
pub use error::VdkitError;
pub use mapper::{MapContext, MapOutput, map_document};
pub use normalize::{NormalizeOptions, NormalizeReport, normalize_tree};
pub use optimize::{OptimizeConfig, OptimizeStats, Optimizer};
pub use options::{ConvertOptions, MAX_SIZE_DP, MIN_SIZE_DP, Preset, Viewport};
pub use parse::{ParsedSvg, SourceSize, parse_svg};
pub use path::{
    AbsolutePathTransformer, PathSeg, PathTransformer, fmt_num, parse_path_data, serialize_path,
    transform_path_segs,
};
use perf::PerfLogger;
pub use precision::{MAX_DECIMALS, canonicalize, canonicalize_number, clamp_decimals, round_to};
pub use shapes::shape_to_path;
pub use style::{
    Color, FillType, LineCap, LineJoin, Paint, StyleAttributes, parse_color, parse_float_prefix,
    parse_length, resolve_paint,
};
pub use tree::{
    Descendants, ElementKind, GeometryClass, GeometryTree, Node, NodeId, ShapeKind, UnsupportedKind,
};

use rayon::prelude::*;
use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        use std::fmt::Write;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionStats {
    pub path_count: usize,
    pub skipped_count: usize,
    pub viewport: Viewport,
    pub source: SourceSize,
    pub flattened_paths: usize,
    pub xml_bytes: usize,
    /// Present when an optimizer ran successfully.
    pub optimize: Option<OptimizeStats>,
}

/// Result of one SVG conversion.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub xml: String,
    pub document: OutputDocument,
    pub stats: ConversionStats,
    /// Every diagnostic of every stage, in stage order.
    pub diagnostics: Vec<Diagnostic>,
    pub summary: BTreeMap<String, CodeSummary>,
}

impl Conversion {
    /// Lowercase hex SHA-256 of the XML.
    pub fn fingerprint(&self) -> String {
        sha256_hex(self.xml.as_bytes())
    }

    pub fn max_severity(&self) -> Option<Severity> {
        self.diagnostics.iter().map(|d| d.severity).max()
    }

    pub fn count_code(&self, code: &str) -> usize {
        self.summary.get(code).map(|s| s.count).unwrap_or(0)
    }
}

pub struct VectorizerBuilder {
    options: ConvertOptions,
    path_transformer: Option<Arc<dyn PathTransformer>>,
    optimizer: Option<Arc<dyn Optimizer>>,
    optimize_config: OptimizeConfig,
    debug_path: Option<PathBuf>,
    perf_enabled: bool,
    perf_path: Option<PathBuf>,
}

impl Default for VectorizerBuilder {
    fn default() -> Self {
        Self {
            options: ConvertOptions::default(),
            path_transformer: Some(Arc::new(AbsolutePathTransformer)),
            optimizer: None,
            optimize_config: OptimizeConfig::default(),
            debug_path: None,
            perf_enabled: false,
            perf_path: None,
        }
    }
}

impl VectorizerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn options(mut self, options: ConvertOptions) -> Self {
        self.options = options;
        self
    }

    pub fn preset(mut self, preset: Preset) -> Self {
        self.options = preset.options();
        self
    }

    pub fn decimals(mut self, decimals: u8) -> Self {
        self.options.decimals = decimals;
        self
    }

    pub fn convert_shapes(mut self, enabled: bool) -> Self {
        self.options.convert_shapes = enabled;
        self
    }

    pub fn path_transformer(mut self, transformer: Arc<dyn PathTransformer>) -> Self {
        self.path_transformer = Some(transformer);
        self
    }

    /// Leaves transforms unbaked; affected paths get `W_PATH_TRANSFORM_UNAVAILABLE`.
    pub fn without_path_transformer(mut self) -> Self {
        self.path_transformer = None;
        self
    }

    pub fn optimizer(mut self, optimizer: Arc<dyn Optimizer>) -> Self {
        self.optimizer = Some(optimizer);
        self
    }

    pub fn optimize_config(mut self, config: OptimizeConfig) -> Self {
        self.optimize_config = config;
        self
    }

    pub fn debug_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_path = Some(path.into());
        self
    }

    /// Enables the perf log at `vdkit_perf.log` unless a path is set.
    pub fn perf_enabled(mut self, enabled: bool) -> Self {
        self.perf_enabled = enabled;
        self
    }

    pub fn perf_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.perf_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<Vectorizer, VdkitError> {
        let debug = match self.debug_path {
            Some(path) => Some(DebugLogger::new(path)?),
            None => None,
        };
        let perf = if self.perf_enabled || self.perf_path.is_some() {
            let path = self
                .perf_path
                .unwrap_or_else(|| PathBuf::from("vdkit_perf.log"));
            Some(PerfLogger::new(path)?)
        } else {
            None
        };
        Ok(Vectorizer {
            options: self.options.normalized(),
            path_transformer: self.path_transformer,
            optimizer: self.optimizer,
            optimize_config: self.optimize_config,
            debug,
            perf,
        })
    }
}

/// SVG to VectorDrawable converter. Holds no per-document state, so one
/// instance can serve concurrent conversions.
pub struct Vectorizer {
    options: ConvertOptions,
    path_transformer: Option<Arc<dyn PathTransformer>>,
    optimizer: Option<Arc<dyn Optimizer>>,
    optimize_config: OptimizeConfig,
    debug: Option<DebugLogger>,
    perf: Option<PerfLogger>,
}

impl Vectorizer {
    pub fn builder() -> VectorizerBuilder {
        VectorizerBuilder::new()
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    pub fn convert_svg(&self, text: &str) -> Result<Conversion, VdkitError> {
        self.convert_document(None, text)
    }

    /// Same as [`convert_svg`](Self::convert_svg); `name` tags the log lines.
    pub fn convert_named(&self, name: &str, text: &str) -> Result<Conversion, VdkitError> {
        self.convert_document(Some(name), text)
    }

    /// Runs normalization and mapping on an already built tree.
    pub fn convert_tree(&self, tree: GeometryTree) -> Result<Conversion, VdkitError> {
        let source = SourceSize::of(&tree);
        self.finish(None, tree, source, WarningSink::new(), None)
    }

    /// Converts independent inputs in parallel. Results keep input order.
    pub fn convert_batch<N, S>(&self, inputs: &[(N, S)]) -> Vec<Result<Conversion, VdkitError>>
    where
        N: AsRef<str> + Sync,
        S: AsRef<str> + Sync,
    {
        log::debug!(target: "vdkit", "batch of {} inputs", inputs.len());
        inputs
            .par_iter()
            .map(|(name, text)| self.convert_document(Some(name.as_ref()), text.as_ref()))
            .collect()
    }

    pub fn bundle(&self, bundle: &BundleBuilder) -> Result<Archive, VdkitError> {
        let started = Instant::now();
        let result = bundle.build();
        self.span("archive", None, started);
        if let Ok(archive) = &result {
            log::info!(
                target: "vdkit",
                "archive of {} entries, {} bytes",
                archive.entries.len(),
                archive.len()
            );
        }
        result
    }

    pub fn flush_logs(&self) {
        if let Some(debug) = &self.debug {
            debug.log_value(&json!({
                "type": "debug.totals",
                "counts": debug.totals(),
            }));
            debug.flush();
        }
        if let Some(perf) = &self.perf {
            perf.flush();
        }
    }

    fn convert_document(&self, doc: Option<&str>, text: &str) -> Result<Conversion, VdkitError> {
        let mut sink = WarningSink::new();
        let (source, optimize_stats) = self.run_optimizer(doc, text, &mut sink);

        let started = Instant::now();
        let parsed = parse_svg(&source, &mut sink);
        self.span("parse", doc, started);
        match parsed {
            Ok(parsed) => self.finish(doc, parsed.tree, parsed.source, sink, optimize_stats),
            Err(err) => {
                self.log_failure(doc, &err, &sink);
                Err(err)
            }
        }
    }

    fn run_optimizer<'a>(
        &self,
        doc: Option<&str>,
        text: &'a str,
        sink: &mut WarningSink,
    ) -> (Cow<'a, str>, Option<OptimizeStats>) {
        let Some(optimizer) = &self.optimizer else {
            sink.push(
                codes::OPTIMIZER_UNAVAILABLE,
                "No optimizer configured; input used as-is.",
                Severity::Info,
                None,
            );
            return (Cow::Borrowed(text), None);
        };

        let started = Instant::now();
        let result = optimizer.optimize(text, &self.optimize_config);
        self.span("optimize", doc, started);
        match result {
            Ok((optimized, stats)) => (Cow::Owned(optimized), Some(stats)),
            Err(reason) => {
                sink.push(
                    codes::OPTIMIZER_FAILED,
                    format!("Optimizer failed: {}; using original input.", reason),
                    Severity::Warn,
                    Some(json!({ "reason": reason })),
                );
                (Cow::Borrowed(text), None)
            }
        }
    }

    fn finish(
        &self,
        doc: Option<&str>,
        mut tree: GeometryTree,
        source: SourceSize,
        mut sink: WarningSink,
        optimize: Option<OptimizeStats>,
    ) -> Result<Conversion, VdkitError> {
        let transformer = self.path_transformer.as_deref();

        let started = Instant::now();
        let normalized = normalize_tree(
            &mut tree,
            NormalizeOptions {
                convert_shapes: self.options.convert_shapes,
            },
            transformer,
            &mut sink,
        );
        self.span("normalize", doc, started);
        let report = match normalized {
            Ok(report) => report,
            Err(err) => {
                self.log_failure(doc, &err, &sink);
                return Err(err);
            }
        };

        let started = Instant::now();
        let ctx = MapContext {
            options: &self.options,
            transformer,
            shape_transforms: &report.shape_transforms,
        };
        let mapped = map_document(&tree, &ctx, &mut sink);
        let xml = mapped.document.to_xml();
        self.span("map", doc, started);

        let stats = ConversionStats {
            path_count: mapped.path_count,
            skipped_count: mapped.skipped_count,
            viewport: mapped.viewport,
            source,
            flattened_paths: report.flattened_paths,
            xml_bytes: xml.len(),
            optimize,
        };
        if let Some(perf) = &self.perf {
            perf.log_counts(
                "convert",
                doc,
                &[
                    ("paths", stats.path_count as u64),
                    ("skipped", stats.skipped_count as u64),
                    ("diagnostics", sink.len() as u64),
                    ("xml_bytes", stats.xml_bytes as u64),
                ],
            );
        }
        if let Some(debug) = &self.debug {
            debug.log_conversion(doc.unwrap_or("svg"), sink.as_slice());
        }
        log::info!(
            target: "vdkit",
            "converted {}: {} paths, {} skipped, {} diagnostics",
            doc.unwrap_or("svg"),
            stats.path_count,
            stats.skipped_count,
            sink.len()
        );

        let summary = sink.summarize();
        Ok(Conversion {
            xml,
            document: mapped.document,
            stats,
            diagnostics: sink.into_vec(),
            summary,
        })
    }

    fn span(&self, name: &str, doc: Option<&str>, started: Instant) {
        if let Some(perf) = &self.perf {
            perf.log_span_ms(name, doc, started.elapsed().as_secs_f64() * 1000.0);
        }
    }

    fn log_failure(&self, doc: Option<&str>, err: &VdkitError, sink: &WarningSink) {
        let fatal = err.is_fatal_core_error();
        if fatal {
            log::warn!(target: "vdkit", "conversion of {} failed: {}", doc.unwrap_or("svg"), err);
        } else {
            log::debug!(target: "vdkit", "conversion of {} failed: {}", doc.unwrap_or("svg"), err);
        }
        if let Some(debug) = &self.debug {
            debug.log_conversion(doc.unwrap_or("svg"), sink.as_slice());
            debug.log_value(&json!({
                "type": "conversion.error",
                "context": doc,
                "error": err.to_string(),
                "fatalCore": fatal,
            }));
        }
    }
}
