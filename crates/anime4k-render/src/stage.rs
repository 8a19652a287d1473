//! Effect stage contract and the registry of stage constructors
//!
//! An effect stage is an opaque GPU processing unit: it is constructed against
//! a fixed input texture, records its work into a command encoder every frame
//! and exposes the texture it writes. Stages are looked up by string
//! identifier in a [`StageRegistry`].

use crate::config::EnhancementEffect;
use crate::dimensions::Dimensions;
use crate::error::Result;
use crate::gpu::Gpu;
use std::collections::HashMap;
use std::fmt;

/// Registry identifier of the stage used for automatic intermediate resizing
pub const DOWNSCALE_STAGE: &str = "Downscale";

/// Everything a stage constructor receives
pub struct StageDescriptor<'a, G: Gpu> {
    /// The GPU to allocate resources on
    pub gpu: &'a G,
    /// Texture the stage reads every frame
    pub input_texture: &'a G::Texture,
    /// Size of `input_texture` as tracked by the chain builder
    pub native_dimensions: Dimensions,
    /// Final output size requested for the whole chain, or the exact output
    /// size for an intermediate downscale
    pub target_dimensions: Dimensions,
}

/// One GPU processing step with a fixed input and output texture
pub trait EffectStage<G: Gpu> {
    /// Records this stage's GPU work
    fn process(&self, encoder: &mut G::Encoder);

    /// The texture this stage writes
    fn output_texture(&self) -> &G::Texture;

    /// Releases GPU resources owned by the stage
    ///
    /// Stages that own nothing keep the default no-op.
    fn dispose(&mut self, gpu: &G) -> Result<()> {
        let _ = gpu;
        Ok(())
    }
}

/// Boxed constructor stored in a [`StageRegistry`]
pub type StageConstructor<G> = Box<dyn Fn(&StageDescriptor<'_, G>) -> Result<Box<dyn EffectStage<G>>>>;

/// Lookup from effect identifiers to stage constructors
pub struct StageRegistry<G: Gpu> {
    constructors: HashMap<String, StageConstructor<G>>,
}

impl<G: Gpu> StageRegistry<G> {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self { constructors: HashMap::new() }
    }

    /// Registers `constructor` under `class_name`, replacing any previous entry
    pub fn register<F>(&mut self, class_name: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn(&StageDescriptor<'_, G>) -> Result<Box<dyn EffectStage<G>>> + 'static,
    {
        self.constructors.insert(class_name.into(), Box::new(constructor));
        self
    }

    /// Builder-style variant of [`StageRegistry::register`]
    pub fn with<F>(mut self, class_name: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&StageDescriptor<'_, G>) -> Result<Box<dyn EffectStage<G>>> + 'static,
    {
        self.register(class_name, constructor);
        self
    }

    /// Looks up the constructor registered under `class_name`
    pub fn get(&self, class_name: &str) -> Option<&StageConstructor<G>> {
        self.constructors.get(class_name)
    }

    /// Returns true if a constructor is registered under `class_name`
    pub fn contains(&self, class_name: &str) -> bool {
        self.constructors.contains_key(class_name)
    }

    /// The constructor used for intermediate downscales, if registered
    pub fn downscale(&self) -> Option<&StageConstructor<G>> {
        self.get(DOWNSCALE_STAGE)
    }

    /// Identifiers in `effects` that have no registered constructor, in request order
    pub fn unknown_effects<'a>(&self, effects: &'a [EnhancementEffect]) -> Vec<&'a str> {
        effects
            .iter()
            .map(|effect| effect.class_name.as_str())
            .filter(|class_name| !self.contains(class_name))
            .collect()
    }

    /// Registered identifiers, in no particular order
    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }
}

impl<G: Gpu> Default for StageRegistry<G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: Gpu> fmt::Debug for StageRegistry<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut class_names: Vec<_> = self.class_names().collect();
        class_names.sort_unstable();
        f.debug_struct("StageRegistry").field("class_names", &class_names).finish()
    }
}

/// Pass-through stage whose output is its input
///
/// Used as the whole chain when no requested effect resolved, so that the
/// render path always has at least one stage.
#[derive(Debug)]
pub struct IdentityStage<G: Gpu> {
    texture: G::Texture,
}

impl<G: Gpu> IdentityStage<G> {
    /// Wraps `texture` as a stage that does nothing
    pub fn new(texture: G::Texture) -> Self {
        Self { texture }
    }
}

impl<G: Gpu> EffectStage<G> for IdentityStage<G> {
    fn process(&self, _encoder: &mut G::Encoder) {}

    fn output_texture(&self) -> &G::Texture {
        &self.texture
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockGpu, MockStage};

    #[test]
    fn test_unknown_effects_preserve_order() {
        let registry = StageRegistry::<MockGpu>::new().with("Known", |desc| MockStage::boxed("Known", desc, None));

        let effects = [EnhancementEffect::new("B"), EnhancementEffect::new("Known"), EnhancementEffect::new("A")];
        assert_eq!(registry.unknown_effects(&effects), vec!["B", "A"]);
        assert!(registry.downscale().is_none());
    }

    #[test]
    fn test_register_replaces_entry() {
        let mut registry = StageRegistry::<MockGpu>::new();
        registry.register(DOWNSCALE_STAGE, |desc| MockStage::boxed("first", desc, None));
        registry.register(DOWNSCALE_STAGE, |desc| MockStage::boxed("second", desc, None));

        assert_eq!(registry.class_names().count(), 1);
        assert!(registry.downscale().is_some());
        assert_eq!(format!("{registry:?}"), "StageRegistry { class_names: [\"Downscale\"] }");
    }

    #[test]
    fn test_identity_stage_owns_nothing() {
        let gpu = MockGpu::new();
        let texture = gpu.create_source_texture(Dimensions::new(4, 4));
        let mut stage = IdentityStage::<MockGpu>::new(texture.clone());

        assert_eq!(stage.output_texture(), &texture);
        assert!(stage.dispose(&gpu).is_ok());
        assert!(gpu.log().destroyed_textures.is_empty());
    }
}
