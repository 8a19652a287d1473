//! Anime4K mode and performance presets
//!
//! A preset expands into the ordered effect list handed to the engine. The
//! effect identifiers follow the Anime4K shader names, so any registry that
//! provides those stages can run them.

use crate::config::EnhancementEffect;
use crate::dimensions::ScaleFactor;
use crate::error::EngineError;
use std::str::FromStr;

/// Identifier of the highlight clamping pre-pass shared by every mode
pub const CLAMP_HIGHLIGHTS: &str = "ClampHighlights";

/// Controls which CNN model sizes a mode uses
///
/// Each preset trades quality for GPU time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PerformancePreset {
    /// Smallest models
    Light,
    /// Balanced
    #[default]
    Medium,
    High,
    Ultra,
    /// Largest models everywhere
    Extreme,
}

impl PerformancePreset {
    pub const ALL: [PerformancePreset; 5] = [
        PerformancePreset::Light,
        PerformancePreset::Medium,
        PerformancePreset::High,
        PerformancePreset::Ultra,
        PerformancePreset::Extreme,
    ];

    /// Returns the human-readable name of this performance preset
    pub fn name(&self) -> &'static str {
        match self {
            PerformancePreset::Light => "Light",
            PerformancePreset::Medium => "Medium",
            PerformancePreset::High => "High",
            PerformancePreset::Ultra => "Ultra",
            PerformancePreset::Extreme => "Extreme",
        }
    }

    /// Model size suffix for the first pass of each kind
    fn initial_model(&self) -> &'static str {
        match self {
            PerformancePreset::Light => "S",
            PerformancePreset::Medium => "M",
            PerformancePreset::High => "L",
            PerformancePreset::Ultra => "VL",
            PerformancePreset::Extreme => "UL",
        }
    }

    /// Model size suffix for passes running on already upscaled images
    fn subsequent_model(&self) -> &'static str {
        match self {
            PerformancePreset::Light | PerformancePreset::Medium => "S",
            PerformancePreset::High => "M",
            PerformancePreset::Ultra | PerformancePreset::Extreme => "L",
        }
    }

    fn initial_restore(&self) -> EnhancementEffect {
        EnhancementEffect::new(format!("RestoreCNN_{}", self.initial_model()))
    }

    fn initial_restore_soft(&self) -> EnhancementEffect {
        EnhancementEffect::new(format!("RestoreSoftCNN_{}", self.initial_model()))
    }

    fn initial_upscale_2x(&self) -> EnhancementEffect {
        EnhancementEffect::upscaling(format!("UpscaleCNNx2_{}", self.initial_model()), two())
    }

    fn initial_upscale_denoise_2x(&self) -> EnhancementEffect {
        EnhancementEffect::upscaling(format!("UpscaleDenoiseCNNx2_{}", self.initial_model()), two())
    }

    fn subsequent_restore(&self) -> EnhancementEffect {
        EnhancementEffect::new(format!("RestoreCNN_{}", self.subsequent_model()))
    }

    fn subsequent_restore_soft(&self) -> EnhancementEffect {
        EnhancementEffect::new(format!("RestoreSoftCNN_{}", self.subsequent_model()))
    }

    fn subsequent_upscale_2x(&self) -> EnhancementEffect {
        EnhancementEffect::upscaling(format!("UpscaleCNNx2_{}", self.subsequent_model()), two())
    }
}

impl FromStr for PerformancePreset {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PerformancePreset::ALL
            .into_iter()
            .find(|preset| preset.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| EngineError::UnknownPreset(s.to_string()))
    }
}

/// Anime4K modes
///
/// Each mode is a fixed arrangement of restore and upscale passes suited to
/// a different kind of source material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EnhancementPreset {
    /// No processing
    Off,
    /// Restore then upscale; suits most content
    #[default]
    ModeA,
    /// Mode A with an extra restore pass
    ModeAA,
    /// Soft restore then upscale
    ModeB,
    /// Mode B with an extra soft restore pass
    ModeBB,
    /// Combined upscale and denoise, for noisy sources
    ModeC,
    /// Mode C followed by a restore pass
    ModeCA,
}

impl EnhancementPreset {
    pub const ALL: [EnhancementPreset; 7] = [
        EnhancementPreset::Off,
        EnhancementPreset::ModeA,
        EnhancementPreset::ModeAA,
        EnhancementPreset::ModeB,
        EnhancementPreset::ModeBB,
        EnhancementPreset::ModeC,
        EnhancementPreset::ModeCA,
    ];

    /// Returns the human-readable name of this preset
    pub fn name(&self) -> &'static str {
        match self {
            EnhancementPreset::Off => "OFF",
            EnhancementPreset::ModeA => "Mode A",
            EnhancementPreset::ModeAA => "Mode AA",
            EnhancementPreset::ModeB => "Mode B",
            EnhancementPreset::ModeBB => "Mode BB",
            EnhancementPreset::ModeC => "Mode C",
            EnhancementPreset::ModeCA => "Mode CA",
        }
    }

    /// Builds the effect list for this mode
    ///
    /// Extra x2 upscale passes are appended until `target_scale_factor` is
    /// reached. The resulting chain may overshoot; the engine's intermediate
    /// downscale and the compositor absorb the difference.
    ///
    /// # Arguments
    /// * `performance_preset` - Controls the model sizes used
    /// * `target_scale_factor` - Desired output scale relative to the source
    pub fn effects(&self, performance_preset: PerformancePreset, target_scale_factor: ScaleFactor) -> Vec<EnhancementEffect> {
        let mut effects = match self {
            EnhancementPreset::Off => return vec![],
            EnhancementPreset::ModeA => vec![clamp_highlights(), performance_preset.initial_restore(), performance_preset.initial_upscale_2x()],
            EnhancementPreset::ModeB => vec![clamp_highlights(), performance_preset.initial_restore_soft(), performance_preset.initial_upscale_2x()],
            EnhancementPreset::ModeC => vec![clamp_highlights(), performance_preset.initial_upscale_denoise_2x()],
            EnhancementPreset::ModeAA => vec![
                clamp_highlights(),
                performance_preset.initial_restore(),
                performance_preset.initial_upscale_2x(),
                performance_preset.subsequent_restore(),
            ],
            EnhancementPreset::ModeBB => vec![
                clamp_highlights(),
                performance_preset.initial_restore_soft(),
                performance_preset.initial_upscale_2x(),
                performance_preset.subsequent_restore_soft(),
            ],
            EnhancementPreset::ModeCA => vec![clamp_highlights(), performance_preset.initial_upscale_denoise_2x(), performance_preset.subsequent_restore()],
        };

        let mut current_scale_factor = two();
        while current_scale_factor.to_f64() < target_scale_factor.to_f64() {
            effects.push(performance_preset.subsequent_upscale_2x());
            current_scale_factor = current_scale_factor * two();
        }

        effects
    }
}

impl FromStr for EnhancementPreset {
    type Err = EngineError;

    /// Accepts the display name (`"Mode AA"`) or its short form (`"aa"`, `"off"`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        let short = wanted.strip_prefix("Mode ").unwrap_or(wanted);
        EnhancementPreset::ALL
            .into_iter()
            .find(|preset| {
                let name = preset.name();
                name.eq_ignore_ascii_case(wanted) || name.strip_prefix("Mode ").is_some_and(|mode| mode.eq_ignore_ascii_case(short))
            })
            .ok_or_else(|| EngineError::UnknownPreset(s.to_string()))
    }
}

fn clamp_highlights() -> EnhancementEffect {
    EnhancementEffect::new(CLAMP_HIGHLIGHTS)
}

fn two() -> ScaleFactor {
    ScaleFactor::integer(2).unwrap_or(ScaleFactor::ONE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class_names(effects: &[EnhancementEffect]) -> Vec<&str> {
        effects.iter().map(|effect| effect.class_name.as_str()).collect()
    }

    #[test]
    fn test_off_is_empty() {
        assert!(EnhancementPreset::Off.effects(PerformancePreset::Extreme, ScaleFactor::integer(4).unwrap()).is_empty());
    }

    #[test]
    fn test_mode_a_medium_x2() {
        let effects = EnhancementPreset::ModeA.effects(PerformancePreset::Medium, ScaleFactor::integer(2).unwrap());
        assert_eq!(class_names(&effects), vec!["ClampHighlights", "RestoreCNN_M", "UpscaleCNNx2_M"]);
        assert_eq!(effects[2].upscale_factor, Some(ScaleFactor::integer(2).unwrap()));
        assert_eq!(effects[1].upscale_factor, None);
    }

    #[test]
    fn test_additional_upscales_until_target() {
        let effects = EnhancementPreset::ModeCA.effects(PerformancePreset::High, ScaleFactor::integer(4).unwrap());
        assert_eq!(class_names(&effects), vec!["ClampHighlights", "UpscaleDenoiseCNNx2_L", "RestoreCNN_M", "UpscaleCNNx2_M"]);

        // x3 needs two doublings
        let effects = EnhancementPreset::ModeB.effects(PerformancePreset::Light, ScaleFactor::integer(3).unwrap());
        assert_eq!(class_names(&effects), vec!["ClampHighlights", "RestoreSoftCNN_S", "UpscaleCNNx2_S", "UpscaleCNNx2_S"]);
    }

    #[test]
    fn test_fractional_target_below_two_adds_nothing() {
        let effects = EnhancementPreset::ModeBB.effects(PerformancePreset::Ultra, ScaleFactor::new(3, 2).unwrap());
        assert_eq!(class_names(&effects), vec!["ClampHighlights", "RestoreSoftCNN_VL", "UpscaleCNNx2_VL", "RestoreSoftCNN_L"]);
    }

    #[test]
    fn test_parse_presets() {
        assert_eq!("Mode AA".parse::<EnhancementPreset>().unwrap(), EnhancementPreset::ModeAA);
        assert_eq!("ca".parse::<EnhancementPreset>().unwrap(), EnhancementPreset::ModeCA);
        assert_eq!("off".parse::<EnhancementPreset>().unwrap(), EnhancementPreset::Off);
        assert!("D".parse::<EnhancementPreset>().is_err());
        assert_eq!("extreme".parse::<PerformancePreset>().unwrap(), PerformancePreset::Extreme);
        assert!("fast".parse::<PerformancePreset>().is_err());
    }
}
