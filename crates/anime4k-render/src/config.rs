//! Engine configuration
//!
//! The effect list and target resolution are the only two knobs that can be
//! changed on a live engine. Both deserialize from the camelCase JSON shape
//! used by persisted settings.

use crate::dimensions::{Dimensions, ScaleFactor};
use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One requested stage in an enhancement chain
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancementEffect {
    /// Registry identifier of the stage constructor
    pub class_name: String,
    /// Resolution change caused by the stage; `None` means the output matches the input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upscale_factor: Option<ScaleFactor>,
}

impl EnhancementEffect {
    /// Creates an effect that keeps the resolution unchanged
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            upscale_factor: None,
        }
    }

    /// Creates an effect that multiplies the resolution by `factor`
    pub fn upscaling(class_name: impl Into<String>, factor: ScaleFactor) -> Self {
        Self {
            class_name: class_name.into(),
            upscale_factor: Some(factor),
        }
    }

    /// The declared factor, treating an absent factor as unity
    pub fn factor(&self) -> ScaleFactor {
        self.upscale_factor.unwrap_or(ScaleFactor::ONE)
    }
}

/// The reconfigurable part of an engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Effects to apply, in order
    #[serde(default)]
    pub effects: Vec<EnhancementEffect>,
    /// Desired final output resolution
    pub target_dimensions: Dimensions,
}

impl EngineConfig {
    /// Parses a configuration from a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations that cannot produce a drawable output
    pub fn validate(&self) -> Result<()> {
        if self.target_dimensions.is_empty() {
            return Err(EngineError::InvalidDimensions(self.target_dimensions));
        }
        Ok(())
    }
}

/// User-facing target resolution setting
///
/// Either a multiple of the video's native size (`"x2"`) or a fixed output
/// height that keeps the native aspect ratio (`"1080p"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetResolution {
    /// Native size multiplied by a factor
    Multiple(ScaleFactor),
    /// Fixed output height; the width follows the native aspect ratio
    Height(u32),
}

impl TargetResolution {
    /// Resolves the setting against the video's native dimensions
    pub fn resolve(&self, native: Dimensions) -> Result<Dimensions> {
        if native.is_empty() {
            return Err(EngineError::InvalidDimensions(native));
        }

        let dimensions = match *self {
            TargetResolution::Multiple(factor) => Dimensions::new(factor.apply(native.width), factor.apply(native.height)),
            TargetResolution::Height(height) => {
                let width = (native.width as u64 * height as u64).div_ceil(native.height as u64);
                Dimensions::new(u32::try_from(width).unwrap_or(u32::MAX), height)
            }
        };

        if dimensions.is_empty() {
            return Err(EngineError::InvalidDimensions(dimensions));
        }
        Ok(dimensions)
    }
}

impl Default for TargetResolution {
    fn default() -> Self {
        TargetResolution::Multiple(ScaleFactor::integer(2).unwrap_or(ScaleFactor::ONE))
    }
}

impl FromStr for TargetResolution {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || EngineError::InvalidTargetResolution(s.to_string());

        if let Some(factor) = s.strip_prefix('x').or_else(|| s.strip_prefix('X')) {
            let factor = factor.parse::<ScaleFactor>().map_err(|_| invalid())?;
            return Ok(TargetResolution::Multiple(factor));
        }

        let height = match s.to_ascii_lowercase().as_str() {
            "4k" => 2160,
            "2k" => 1440,
            other => other
                .strip_suffix('p')
                .and_then(|height| height.parse::<u32>().ok())
                .filter(|height| *height > 0)
                .ok_or_else(invalid)?,
        };
        Ok(TargetResolution::Height(height))
    }
}

impl fmt::Display for TargetResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetResolution::Multiple(factor) => write!(f, "x{factor}"),
            TargetResolution::Height(height) => write!(f, "{height}p"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_settings_json() {
        let json = r#"{
            "effects": [
                { "className": "ClampHighlights" },
                { "className": "RestoreCNN_M" },
                { "className": "UpscaleCNNx2_M", "upscaleFactor": 2 }
            ],
            "targetDimensions": { "width": 2560, "height": 1440 }
        }"#;

        let config = EngineConfig::from_json(json).unwrap();
        assert_eq!(config.effects.len(), 3);
        assert_eq!(config.effects[0], EnhancementEffect::new("ClampHighlights"));
        assert_eq!(config.effects[2].upscale_factor, Some(ScaleFactor::integer(2).unwrap()));
        assert_eq!(config.target_dimensions, Dimensions::new(2560, 1440));
    }

    #[test]
    fn test_reject_empty_target() {
        let json = r#"{ "effects": [], "targetDimensions": { "width": 0, "height": 1080 } }"#;
        assert!(matches!(EngineConfig::from_json(json), Err(EngineError::InvalidDimensions(_))));
        assert!(matches!(EngineConfig::from_json("{"), Err(EngineError::Config(_))));
    }

    #[test]
    fn test_effect_equality_is_structural() {
        let a = vec![EnhancementEffect::upscaling("X", ScaleFactor::integer(2).unwrap())];
        let b = vec![EnhancementEffect::upscaling("X", "4/2".parse().unwrap())];
        assert_eq!(a, b);
        assert_ne!(a, vec![EnhancementEffect::new("X")]);
    }

    #[test]
    fn test_target_resolution_parsing() {
        assert_eq!("x2".parse::<TargetResolution>().unwrap(), TargetResolution::Multiple(ScaleFactor::integer(2).unwrap()));
        assert_eq!("1080p".parse::<TargetResolution>().unwrap(), TargetResolution::Height(1080));
        assert_eq!("4K".parse::<TargetResolution>().unwrap(), TargetResolution::Height(2160));
        assert!("huge".parse::<TargetResolution>().is_err());
        assert!("0p".parse::<TargetResolution>().is_err());
        assert_eq!(TargetResolution::Height(720).to_string(), "720p");
    }

    #[test]
    fn test_target_resolution_resolve() {
        let native = Dimensions::new(1280, 720);
        assert_eq!("x2".parse::<TargetResolution>().unwrap().resolve(native).unwrap(), Dimensions::new(2560, 1440));
        assert_eq!("1080p".parse::<TargetResolution>().unwrap().resolve(native).unwrap(), Dimensions::new(1920, 1080));
        // Widths that do not divide evenly round up
        assert_eq!(TargetResolution::Height(1080).resolve(Dimensions::new(640, 481)).unwrap(), Dimensions::new(1438, 1080));
        assert!(TargetResolution::default().resolve(Dimensions::new(0, 0)).is_err());
    }
}
