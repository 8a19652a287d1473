//! Stage chain construction
//!
//! Turns an ordered list of requested effects into a chain of instantiated
//! stages, each reading the texture written by the one before it. After every
//! upscaling stage the builder checks whether the image has grown past what
//! the rest of the chain needs and, if so, inserts an intermediate downscale so
//! later stages do not process more pixels than the target requires.

use crate::config::EnhancementEffect;
use crate::dimensions::{Dimensions, ScaleFactor};
use crate::error::{EngineError, Result};
use crate::gpu::Gpu;
use crate::stage::{DOWNSCALE_STAGE, EffectStage, IdentityStage, StageConstructor, StageDescriptor, StageRegistry};

/// Tolerance above the ideal intermediate width before a downscale is inserted
const INTERMEDIATE_DOWNSCALE_TOLERANCE: f64 = 1.1;

/// Why a stage is part of a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    /// A requested effect
    Effect,
    /// A downscale inserted by the builder between two upscaling effects
    IntermediateDownscale,
    /// The pass-through stage of a chain with no resolved effects
    Identity,
}

/// An instantiated stage together with the parameters it was built from
pub struct ChainedStage<G: Gpu> {
    class_name: String,
    kind: StageKind,
    native_dimensions: Dimensions,
    target_dimensions: Dimensions,
    stage: Box<dyn EffectStage<G>>,
}

impl<G: Gpu> ChainedStage<G> {
    /// Registry identifier the stage was built from
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Why the stage is in the chain
    pub fn kind(&self) -> StageKind {
        self.kind
    }

    /// Input size the stage was constructed with
    pub fn native_dimensions(&self) -> Dimensions {
        self.native_dimensions
    }

    /// Target size the stage was constructed with
    pub fn target_dimensions(&self) -> Dimensions {
        self.target_dimensions
    }

    /// The texture the stage writes
    pub fn output_texture(&self) -> &G::Texture {
        self.stage.output_texture()
    }
}

/// Ordered, never-empty sequence of stages executed every frame
pub struct StageChain<G: Gpu> {
    stages: Vec<ChainedStage<G>>,
    output_texture: G::Texture,
}

impl<G: Gpu> StageChain<G> {
    /// A single pass-through stage whose output is `source_texture`
    pub fn identity(source_texture: &G::Texture, source_dimensions: Dimensions) -> Self {
        Self {
            stages: vec![ChainedStage {
                class_name: "Identity".to_string(),
                kind: StageKind::Identity,
                native_dimensions: source_dimensions,
                target_dimensions: source_dimensions,
                stage: Box::new(IdentityStage::<G>::new(source_texture.clone())),
            }],
            output_texture: source_texture.clone(),
        }
    }

    /// The stages in execution order
    pub fn stages(&self) -> &[ChainedStage<G>] {
        &self.stages
    }

    /// Number of stages, including inserted downscales
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// A built chain always holds at least one stage
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Returns true if the chain only passes the source texture through
    pub fn is_identity(&self) -> bool {
        self.stages.iter().all(|stage| stage.kind == StageKind::Identity)
    }

    /// The texture written by the last stage
    pub fn output_texture(&self) -> &G::Texture {
        &self.output_texture
    }

    /// Records every stage in order
    pub fn process(&self, encoder: &mut G::Encoder) {
        for chained in &self.stages {
            chained.stage.process(encoder);
        }
    }

    /// Disposes every stage, continuing past failures
    ///
    /// # Returns
    /// The errors raised by individual stages, in chain order
    pub fn dispose(self, gpu: &G) -> Vec<EngineError> {
        dispose_stages(self.stages, gpu)
    }
}

fn dispose_stages<G: Gpu>(stages: Vec<ChainedStage<G>>, gpu: &G) -> Vec<EngineError> {
    stages.into_iter().filter_map(|mut chained| chained.stage.dispose(gpu).err()).collect()
}

/// Builds [`StageChain`]s from effect lists
pub struct PipelineBuilder<'a, G: Gpu> {
    gpu: &'a G,
    registry: &'a StageRegistry<G>,
}

impl<'a, G: Gpu> PipelineBuilder<'a, G> {
    /// Creates a builder that instantiates stages from `registry` on `gpu`
    pub fn new(gpu: &'a G, registry: &'a StageRegistry<G>) -> Self {
        Self { gpu, registry }
    }

    /// Builds the chain for `effects`
    ///
    /// Effects with no registered constructor are skipped. If none resolve, the
    /// result is the identity chain over `source_texture`.
    ///
    /// # Arguments
    /// * `effects` - Requested effects in execution order
    /// * `source_texture` - Texture holding the decoded video frame
    /// * `source_dimensions` - Native size of `source_texture`
    /// * `target_dimensions` - Desired final output size
    ///
    /// # Errors
    /// Returns the first constructor failure. Stages built before the failure
    /// are disposed.
    pub fn build(&self, effects: &[EnhancementEffect], source_texture: &G::Texture, source_dimensions: Dimensions, target_dimensions: Dimensions) -> Result<StageChain<G>> {
        let mut stages = Vec::new();

        let output_texture = match self.build_stages(&mut stages, effects, source_texture, source_dimensions, target_dimensions) {
            Ok(output_texture) => output_texture,
            Err(err) => {
                for dispose_err in dispose_stages(stages, self.gpu) {
                    tracing::error!(error = %dispose_err, "failed to dispose stage of an abandoned chain");
                }
                return Err(err);
            }
        };

        if stages.is_empty() {
            tracing::debug!(%source_dimensions, "no effect resolved, using identity chain");
            return Ok(StageChain::identity(source_texture, source_dimensions));
        }

        Ok(StageChain { stages, output_texture })
    }

    fn build_stages(
        &self,
        stages: &mut Vec<ChainedStage<G>>,
        effects: &[EnhancementEffect],
        source_texture: &G::Texture,
        source_dimensions: Dimensions,
        target_dimensions: Dimensions,
    ) -> Result<G::Texture> {
        let remaining_factors = remaining_upscale_factors(effects);

        let mut current_texture = source_texture.clone();
        let mut current_dimensions = source_dimensions;

        for (index, effect) in effects.iter().enumerate() {
            let Some(constructor) = self.registry.get(&effect.class_name) else {
                tracing::warn!(class_name = %effect.class_name, "no stage registered for effect, skipping");
                continue;
            };

            current_texture = self.push_stage(stages, constructor, &effect.class_name, StageKind::Effect, &current_texture, current_dimensions, target_dimensions)?;

            let Some(upscale_factor) = effect.upscale_factor else {
                continue;
            };
            current_dimensions = current_dimensions.scaled(upscale_factor);

            // Cap the size carried into later upscalers at their share of the target
            let remaining_factor = remaining_factors[index];
            let Some(downscale) = self.registry.downscale() else {
                continue;
            };
            if !remaining_factor.is_upscale() {
                continue;
            }

            let ideal_width = target_dimensions.width as f64 / remaining_factor.to_f64();
            let ideal_height = target_dimensions.height as f64 / remaining_factor.to_f64();
            if current_dimensions.width as f64 > ideal_width * INTERMEDIATE_DOWNSCALE_TOLERANCE {
                let intermediate_dimensions = Dimensions::new((ideal_width.ceil() as u32).max(1), (ideal_height.ceil() as u32).max(1));
                tracing::debug!(
                    after = %effect.class_name,
                    from = %current_dimensions,
                    to = %intermediate_dimensions,
                    %remaining_factor,
                    "inserting intermediate downscale"
                );

                current_texture = self.push_stage(
                    stages,
                    downscale,
                    DOWNSCALE_STAGE,
                    StageKind::IntermediateDownscale,
                    &current_texture,
                    current_dimensions,
                    intermediate_dimensions,
                )?;
                current_dimensions = intermediate_dimensions;
            }
        }

        Ok(current_texture)
    }

    #[allow(clippy::too_many_arguments)]
    fn push_stage(
        &self,
        stages: &mut Vec<ChainedStage<G>>,
        constructor: &StageConstructor<G>,
        class_name: &str,
        kind: StageKind,
        input_texture: &G::Texture,
        native_dimensions: Dimensions,
        target_dimensions: Dimensions,
    ) -> Result<G::Texture> {
        let stage = constructor(&StageDescriptor {
            gpu: self.gpu,
            input_texture,
            native_dimensions,
            target_dimensions,
        })?;
        let output_texture = stage.output_texture().clone();

        tracing::debug!(class_name, ?kind, native = %native_dimensions, target = %target_dimensions, "appended stage");

        stages.push(ChainedStage {
            class_name: class_name.to_string(),
            kind,
            native_dimensions,
            target_dimensions,
            stage,
        });
        Ok(output_texture)
    }
}

/// For each effect, the product of the upscale factors of every effect after it
fn remaining_upscale_factors(effects: &[EnhancementEffect]) -> Vec<ScaleFactor> {
    let mut remaining = vec![ScaleFactor::ONE; effects.len()];
    for index in (0..effects.len().saturating_sub(1)).rev() {
        remaining[index] = remaining[index + 1] * effects[index + 1].factor();
    }
    remaining
}
