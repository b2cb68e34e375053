use serde::{Deserialize, Serialize};

/// Settings handed to an injected [`Optimizer`]. Implementations may ignore
/// fields they do not support.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OptimizeConfig {
    pub keep_title: bool,
    pub keep_desc: bool,
    pub keep_metadata: bool,
    pub collapse_whitespace: bool,
    pub float_precision: Option<u8>,
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        Self {
            keep_title: false,
            keep_desc: false,
            keep_metadata: false,
            collapse_whitespace: true,
            float_precision: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeStats {
    pub bytes_in: usize,
    pub bytes_out: usize,
    pub saved: usize,
    /// Fraction of the input removed; 0 when the output is empty.
    pub ratio: f64,
}

impl OptimizeStats {
    pub fn between(input: &str, output: &str) -> Self {
        let bytes_in = input.len();
        let bytes_out = output.len();
        let ratio = if bytes_out > 0 && bytes_in > 0 {
            1.0 - bytes_out as f64 / bytes_in as f64
        } else {
            0.0
        };
        Self {
            bytes_in,
            bytes_out,
            saved: bytes_in.saturating_sub(bytes_out),
            ratio,
        }
    }
}

/// Source-level SVG optimizer run before parsing.
pub trait Optimizer: Send + Sync {
    fn optimize(&self, svg: &str, config: &OptimizeConfig) -> Result<(String, OptimizeStats), String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_between_texts() {
        let stats = OptimizeStats::between("0123456789", "01234");
        assert_eq!(stats.bytes_in, 10);
        assert_eq!(stats.bytes_out, 5);
        assert_eq!(stats.saved, 5);
        assert_eq!(stats.ratio, 0.5);

        let grown = OptimizeStats::between("ab", "abcd");
        assert_eq!(grown.saved, 0);
        assert_eq!(grown.ratio, -1.0);
        assert_eq!(OptimizeStats::between("", "").ratio, 0.0);
    }

    #[test]
    fn config_reads_camel_case() {
        let config: OptimizeConfig =
            serde_json::from_str(r#"{"keepTitle": true, "floatPrecision": 3}"#).unwrap();
        assert!(config.keep_title);
        assert!(config.collapse_whitespace);
        assert_eq!(config.float_precision, Some(3));
    }
}
