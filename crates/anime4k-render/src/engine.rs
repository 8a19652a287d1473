//! Top-level render engine
//!
//! [`RenderEngine`] owns the GPU, the source texture, the stage chain and the
//! compositor, and drives them from the video's display clock. All rebuilds go
//! through `&mut self`, so they can never interleave with a frame in flight.

use crate::config::{EngineConfig, EnhancementEffect};
use crate::dimensions::Dimensions;
use crate::error::{EngineError, Result};
use crate::gpu::{Compositor, Gpu};
use crate::pipeline_builder::{PipelineBuilder, StageChain};
use crate::scheduler::{FrameScheduler, SchedulerState, TickOutcome};
use crate::stage::StageRegistry;
use crate::video::{ReadyState, VideoSource};
use std::fmt;
use std::future::Future;

/// Called once with the error that ended the render loop
pub type ErrorCallback = Box<dyn FnMut(&EngineError)>;

/// Called once when the first frame has been presented
pub type FirstFrameCallback = Box<dyn FnMut()>;

/// Everything needed to start an engine besides the video and the GPU
pub struct EngineOptions<G: Gpu> {
    /// Effects to apply, in order
    pub effects: Vec<EnhancementEffect>,
    /// Desired final output size
    pub target_dimensions: Dimensions,
    /// Constructors for the effect identifiers
    pub registry: StageRegistry<G>,
    pub on_error: Option<ErrorCallback>,
    pub on_first_frame_rendered: Option<FirstFrameCallback>,
}

impl<G: Gpu> EngineOptions<G> {
    /// Options for `config` without callbacks
    pub fn new(config: EngineConfig, registry: StageRegistry<G>) -> Self {
        Self {
            effects: config.effects,
            target_dimensions: config.target_dimensions,
            registry,
            on_error: None,
            on_first_frame_rendered: None,
        }
    }

    /// Sets the callback receiving the error that stops the render loop
    pub fn on_error(mut self, callback: impl FnMut(&EngineError) + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }

    /// Sets the callback fired after the first presented frame
    pub fn on_first_frame_rendered(mut self, callback: impl FnMut() + 'static) -> Self {
        self.on_first_frame_rendered = Some(Box::new(callback));
        self
    }
}

/// Runs a chain of effect stages on every displayed video frame
pub struct RenderEngine<G: Gpu, V: VideoSource<G>> {
    gpu: G,
    video: V,
    registry: StageRegistry<G>,
    effects: Vec<EnhancementEffect>,
    target_dimensions: Dimensions,
    source_texture: G::Texture,
    chain: Option<StageChain<G>>,
    compositor: G::Compositor,
    scheduler: FrameScheduler,
    on_error: Option<ErrorCallback>,
    on_first_frame_rendered: Option<FirstFrameCallback>,
}

impl<G: Gpu, V: VideoSource<G>> RenderEngine<G, V> {
    /// Sets up every GPU resource and arms the first frame callback
    ///
    /// # Arguments
    /// * `video` - The playing video to enhance
    /// * `acquire_gpu` - Requests the device and configures the presentation surface
    /// * `options` - Effects, target size, stage registry and callbacks
    ///
    /// # Errors
    /// Returns adapter, device and surface acquisition failures, stage
    /// construction failures of the initial chain, compositor compilation
    /// failures and a refused first frame callback. No engine exists
    /// afterwards and no callback is armed.
    pub async fn create<F, Fut>(video: V, acquire_gpu: F, options: EngineOptions<G>) -> Result<Self>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<G>>,
    {
        let EngineOptions {
            effects,
            target_dimensions,
            registry,
            on_error,
            on_first_frame_rendered,
        } = options;

        if target_dimensions.is_empty() {
            return Err(EngineError::InvalidDimensions(target_dimensions));
        }

        if video.ready_state() < ReadyState::HaveFutureData {
            tracing::debug!(ready_state = ?video.ready_state(), "waiting for video data");
            video.wait_for_future_data().await;
        }

        let gpu = acquire_gpu().await?;

        let native_dimensions = video.native_dimensions();
        if native_dimensions.is_empty() {
            return Err(EngineError::InvalidDimensions(native_dimensions));
        }

        let source_texture = gpu.create_source_texture(native_dimensions);

        let chain = match PipelineBuilder::new(&gpu, &registry).build(&effects, &source_texture, native_dimensions, target_dimensions) {
            Ok(chain) => chain,
            Err(err) => {
                gpu.destroy_texture(&source_texture);
                return Err(err);
            }
        };

        let mut compositor = match gpu.create_compositor().await {
            Ok(compositor) => compositor,
            Err(err) => {
                log_disposal_errors(chain.dispose(&gpu));
                gpu.destroy_texture(&source_texture);
                return Err(err);
            }
        };
        compositor.bind(&gpu, chain.output_texture());

        tracing::info!(
            native = %native_dimensions,
            target = %target_dimensions,
            stages = chain.len(),
            "render engine created"
        );

        let mut engine = Self {
            gpu,
            video,
            registry,
            effects,
            target_dimensions,
            source_texture,
            chain: Some(chain),
            compositor,
            scheduler: FrameScheduler::new(),
            on_error,
            on_first_frame_rendered,
        };
        if let Err(err) = engine.scheduler.arm(&mut engine.video) {
            engine.destroy();
            return Err(err);
        }
        Ok(engine)
    }

    /// Handles one display-frame callback
    ///
    /// The host calls this whenever the callback armed by the engine fires.
    /// Errors are not returned: they are reported through `on_error` and the
    /// engine destroys itself.
    pub fn tick(&mut self) {
        if !self.scheduler.begin_tick() {
            return;
        }

        let rendered = match self.process_frame() {
            Ok(rendered) => rendered,
            Err(err) => {
                self.fail(err);
                false
            }
        };

        match self.scheduler.complete_tick(rendered, &mut self.video) {
            Ok(TickOutcome::FirstFrameRendered) => {
                tracing::info!("first frame rendered");
                if let Some(callback) = self.on_first_frame_rendered.as_mut() {
                    callback();
                }
            }
            Ok(TickOutcome::Continue | TickOutcome::Stopped) => {}
            Err(err) => self.fail(err),
        }
    }

    /// Renders the current video frame
    ///
    /// # Returns
    /// `true` if a frame was presented; `false` if the video was not ready or
    /// its resolution changed and the resources were rebuilt instead
    pub fn process_frame(&mut self) -> Result<bool> {
        if self.scheduler.is_destroyed() {
            return Ok(false);
        }
        if self.video.is_paused() || self.video.ready_state() < ReadyState::HaveCurrentData {
            return Ok(false);
        }

        let native_dimensions = self.video.native_dimensions();
        if native_dimensions.is_empty() {
            return Ok(false);
        }
        if native_dimensions != G::texture_dimensions(&self.source_texture) {
            self.handle_source_resize()?;
            return Ok(false);
        }

        let Some(chain) = self.chain.as_ref() else {
            return Ok(false);
        };

        self.video.copy_frame_to(&self.gpu, &self.source_texture)?;

        let frame = self.gpu.acquire_frame()?;
        let mut encoder = self.gpu.create_encoder();
        chain.process(&mut encoder);
        self.compositor.draw(&mut encoder, &frame)?;
        self.gpu.submit(encoder);
        self.gpu.present(frame);

        Ok(true)
    }

    /// Recreates the source texture at the video's current native size and rebuilds the chain
    ///
    /// Effects and target dimensions are kept. On failure the previous texture
    /// and chain stay in place.
    pub fn handle_source_resize(&mut self) -> Result<()> {
        if self.scheduler.is_destroyed() {
            return Ok(());
        }

        let native_dimensions = self.video.native_dimensions();
        if native_dimensions.is_empty() {
            return Err(EngineError::InvalidDimensions(native_dimensions));
        }
        let previous_dimensions = G::texture_dimensions(&self.source_texture);

        let source_texture = self.gpu.create_source_texture(native_dimensions);
        let chain = match PipelineBuilder::new(&self.gpu, &self.registry).build(&self.effects, &source_texture, native_dimensions, self.target_dimensions) {
            Ok(chain) => chain,
            Err(err) => {
                self.gpu.destroy_texture(&source_texture);
                return Err(err);
            }
        };

        self.install_chain(chain);
        let previous_texture = std::mem::replace(&mut self.source_texture, source_texture);
        self.gpu.destroy_texture(&previous_texture);

        tracing::info!(from = %previous_dimensions, to = %native_dimensions, "source resolution changed");
        Ok(())
    }

    /// Replaces the effect list and target dimensions
    ///
    /// Does nothing when both equal the current values. Otherwise the chain is
    /// rebuilt against the existing source texture; on failure the previous
    /// configuration and chain stay in place.
    pub fn reconfigure(&mut self, effects: Vec<EnhancementEffect>, target_dimensions: Dimensions) -> Result<()> {
        if self.scheduler.is_destroyed() {
            return Ok(());
        }
        if effects == self.effects && target_dimensions == self.target_dimensions {
            tracing::debug!("configuration unchanged");
            return Ok(());
        }
        if target_dimensions.is_empty() {
            return Err(EngineError::InvalidDimensions(target_dimensions));
        }

        let native_dimensions = G::texture_dimensions(&self.source_texture);
        let chain = PipelineBuilder::new(&self.gpu, &self.registry).build(&effects, &self.source_texture, native_dimensions, target_dimensions)?;
        self.install_chain(chain);
        self.effects = effects;
        self.target_dimensions = target_dimensions;

        tracing::info!(
            target = %self.target_dimensions,
            effects = self.effects.len(),
            "render engine reconfigured"
        );
        Ok(())
    }

    /// [`RenderEngine::reconfigure`] from a parsed [`EngineConfig`]
    pub fn apply_config(&mut self, config: EngineConfig) -> Result<()> {
        config.validate()?;
        self.reconfigure(config.effects, config.target_dimensions)
    }

    /// Tears down every resource
    ///
    /// Idempotent. The destroyed state is entered first so no further frame
    /// is processed; each teardown step is attempted even if an earlier one fails.
    pub fn destroy(&mut self) {
        if !self.scheduler.shut_down(&mut self.video) {
            return;
        }

        if let Some(chain) = self.chain.take() {
            log_disposal_errors(chain.dispose(&self.gpu));
        }
        self.gpu.destroy_texture(&self.source_texture);

        if let Err(err) = self.gpu.detach_surface() {
            tracing::error!(error = %err, "failed to detach surface");
        }
        if let Err(err) = self.gpu.destroy_device() {
            tracing::error!(error = %err, "failed to destroy device");
        }

        tracing::info!("render engine destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.scheduler.is_destroyed()
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    /// The current configuration
    pub fn config(&self) -> EngineConfig {
        EngineConfig {
            effects: self.effects.clone(),
            target_dimensions: self.target_dimensions,
        }
    }

    pub fn effects(&self) -> &[EnhancementEffect] {
        &self.effects
    }

    pub fn target_dimensions(&self) -> Dimensions {
        self.target_dimensions
    }

    /// The active chain; `None` once destroyed
    pub fn chain(&self) -> Option<&StageChain<G>> {
        self.chain.as_ref()
    }

    pub fn source_texture(&self) -> &G::Texture {
        &self.source_texture
    }

    pub fn gpu(&self) -> &G {
        &self.gpu
    }

    /// Mutable access for host-side surface changes such as window resizes
    pub fn gpu_mut(&mut self) -> &mut G {
        &mut self.gpu
    }

    pub fn video(&self) -> &V {
        &self.video
    }

    pub fn video_mut(&mut self) -> &mut V {
        &mut self.video
    }

    fn install_chain(&mut self, chain: StageChain<G>) {
        self.compositor.bind(&self.gpu, chain.output_texture());
        tracing::debug!(stages = chain.len(), identity = chain.is_identity(), "stage chain rebuilt");

        if let Some(previous) = self.chain.replace(chain) {
            log_disposal_errors(previous.dispose(&self.gpu));
        }
    }

    fn fail(&mut self, err: EngineError) {
        tracing::error!(error = %err, "render loop failed, destroying render engine");
        if let Some(callback) = self.on_error.as_mut() {
            callback(&err);
        }
        self.destroy();
    }
}

impl<G: Gpu, V: VideoSource<G>> Drop for RenderEngine<G, V> {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl<G: Gpu, V: VideoSource<G>> fmt::Debug for RenderEngine<G, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderEngine")
            .field("effects", &self.effects)
            .field("target_dimensions", &self.target_dimensions)
            .field("source_texture", &self.source_texture)
            .field("stages", &self.chain.as_ref().map(StageChain::len))
            .field("scheduler", &self.scheduler.state())
            .finish_non_exhaustive()
    }
}

fn log_disposal_errors(errors: Vec<EngineError>) {
    for err in errors {
        tracing::error!(error = %err, "failed to dispose stage");
    }
}
