use crate::error::VdkitError;
use crate::precision::{MAX_DECIMALS, clamp_decimals};
use serde::{Deserialize, Deserializer, Serialize};

pub const MIN_SIZE_DP: f64 = 8.0;
pub const MAX_SIZE_DP: f64 = 512.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 24.0,
            height: 24.0,
        }
    }
}

/// Per-conversion options. Accepts camelCase JSON from hosts; out-of-range
/// values are clamped rather than rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConvertOptions {
    #[serde(deserialize_with = "deserialize_decimals")]
    pub decimals: u8,
    pub convert_shapes: bool,
    pub default_viewport: Viewport,
    pub default_size_dp: f64,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            decimals: 2,
            convert_shapes: false,
            default_viewport: Viewport::default(),
            default_size_dp: 24.0,
        }
    }
}

impl ConvertOptions {
    pub fn from_json(text: &str) -> Result<Self, VdkitError> {
        let options: ConvertOptions = serde_json::from_str(text)
            .map_err(|e| VdkitError::InvalidConfiguration(e.to_string()))?;
        Ok(options.normalized())
    }

    /// Clamps every field into its supported range.
    pub fn normalized(mut self) -> Self {
        self.decimals = self.decimals.min(MAX_DECIMALS);
        self.default_size_dp = if self.default_size_dp.is_finite() {
            self.default_size_dp.clamp(MIN_SIZE_DP, MAX_SIZE_DP)
        } else {
            24.0
        };
        if !self.default_viewport.is_valid() {
            self.default_viewport = Viewport::default();
        }
        self
    }
}

fn deserialize_decimals<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let value = f64::deserialize(deserializer)?;
    Ok(clamp_decimals(value.round() as i64))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    MaxQuality,
    Balanced,
    MaxReduce,
}

impl Preset {
    pub const ALL: [Preset; 3] = [Preset::MaxQuality, Preset::Balanced, Preset::MaxReduce];

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.id() == id)
    }

    pub fn id(self) -> &'static str {
        match self {
            Preset::MaxQuality => "max_quality",
            Preset::Balanced => "balanced",
            Preset::MaxReduce => "max_reduce",
        }
    }

    pub fn options(self) -> ConvertOptions {
        let (decimals, convert_shapes) = match self {
            Preset::MaxQuality => (4, true),
            Preset::Balanced => (2, false),
            Preset::MaxReduce => (1, true),
        };
        ConvertOptions {
            decimals,
            convert_shapes,
            ..ConvertOptions::default()
        }
    }
}
