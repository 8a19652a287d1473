//! Window event handling for the player
//!
//! Creates the window and the engine on resume, pumps the engine from the
//! redraw loop and maps keyboard shortcuts to engine reconfiguration.

use crate::still_frames::StillFrameSource;
use anime4k_render::presets::{EnhancementPreset, PerformancePreset};
use anime4k_render::{Dimensions, EngineConfig, EngineOptions, EnhancementEffect, KernelStage, RenderEngine, ScaleFactor, StageRegistry, TargetResolution, VideoSource, WgpuContext, kernels};
use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::ActiveEventLoop,
    keyboard::{KeyCode, ModifiersState, PhysicalKey},
    window::{Window, WindowAttributes, WindowId},
};

/// Largest scale factor any preset is expanded for when registering stand-ins
const MAX_STAND_IN_SCALE: u32 = 4;

type Engine = RenderEngine<WgpuContext, StillFrameSource>;

pub struct PlayerApp {
    /// Moved into the engine once the window exists
    source: Option<StillFrameSource>,
    preset: EnhancementPreset,
    performance: PerformancePreset,
    target: TargetResolution,
    modifiers: ModifiersState,
    window: Option<Arc<Window>>,
    engine: Option<Engine>,
    failed: Rc<Cell<bool>>,
}

impl PlayerApp {
    pub fn new(source: StillFrameSource, preset: EnhancementPreset, performance: PerformancePreset, target: TargetResolution) -> Self {
        Self {
            source: Some(source),
            preset,
            performance,
            target,
            modifiers: ModifiersState::default(),
            window: None,
            engine: None,
            failed: Rc::new(Cell::new(false)),
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<(), Box<dyn std::error::Error>> {
        let Some(source) = self.source.take() else {
            return Ok(());
        };

        let native = source.native_dimensions();
        let window = Arc::new(
            event_loop.create_window(
                WindowAttributes::default()
                    .with_title("anime4k-render player")
                    .with_inner_size(PhysicalSize::new(native.width, native.height)),
            )?,
        );

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance.create_surface(window.clone())?;
        let size = window.inner_size();
        let surface_dimensions = Dimensions::new(size.width, size.height);

        let config = EngineConfig {
            effects: self.effects(),
            target_dimensions: self.target.resolve(native)?,
        };
        let failed = self.failed.clone();
        let options = EngineOptions::new(config, stand_in_registry())
            .on_error(move |err| {
                tracing::error!("render loop stopped: {err}");
                failed.set(true);
            })
            .on_first_frame_rendered(|| tracing::info!("first frame on screen"));

        let engine = pollster::block_on(RenderEngine::create(source, || WgpuContext::new(&instance, surface, surface_dimensions), options))?;
        tracing::debug!(?engine, "engine ready");

        self.engine = Some(engine);
        self.window = Some(window.clone());
        self.update_window_title();
        window.request_redraw();
        Ok(())
    }

    fn effects(&self) -> Vec<EnhancementEffect> {
        let factor = match self.target {
            TargetResolution::Multiple(factor) => factor,
            // The relative scale of a fixed height depends on the image, so plan for the largest chain
            TargetResolution::Height(_) => ScaleFactor::integer(MAX_STAND_IN_SCALE).unwrap_or(ScaleFactor::ONE),
        };
        self.preset.effects(self.performance, factor)
    }

    fn reconfigure(&mut self) {
        let effects = self.effects();
        let Some(engine) = self.engine.as_mut() else {
            return;
        };

        let native = engine.video().native_dimensions();
        let result = self.target.resolve(native).and_then(|target| engine.reconfigure(effects, target));
        if let Err(err) = result {
            tracing::error!("failed to apply {} {}: {err}", self.preset.name(), self.performance.name());
        }
        self.update_window_title();
    }

    fn update_window_title(&self) {
        let (Some(window), Some(engine)) = (self.window.as_ref(), self.engine.as_ref()) else {
            return;
        };

        let preset_text = if self.preset == EnhancementPreset::Off {
            "OFF".to_string()
        } else {
            format!("{} {}", self.preset.name(), self.performance.name())
        };
        let paused = if engine.video().is_paused() { " [PAUSED]" } else { "" };
        window.set_title(&format!("anime4k-render player [{preset_text}] {}{paused}", engine.target_dimensions()));
    }

    fn redraw(&mut self) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        if engine.video_mut().display_frame() {
            engine.tick();
        }
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }
}

/// Built-in kernels plus bilinear stand-ins for every effect a preset can request
fn stand_in_registry() -> StageRegistry<WgpuContext> {
    let mut registry = StageRegistry::with_builtin_stages();
    let factor = ScaleFactor::integer(MAX_STAND_IN_SCALE).unwrap_or(ScaleFactor::ONE);

    let all_effects: Vec<EnhancementEffect> = EnhancementPreset::ALL
        .iter()
        .flat_map(|preset| PerformancePreset::ALL.iter().flat_map(move |performance| preset.effects(*performance, factor)))
        .collect();

    let mut stand_ins: Vec<EnhancementEffect> = Vec::new();
    for effect in &all_effects {
        if !registry.contains(&effect.class_name) && !stand_ins.contains(effect) {
            stand_ins.push(effect.clone());
        }
    }

    for effect in stand_ins {
        let spec = if effect.upscale_factor.is_some_and(|factor| factor.is_upscale()) { kernels::BILINEAR_X2 } else { kernels::COPY };
        tracing::debug!(class_name = %effect.class_name, kernel = spec.label, "registering stand-in stage");
        registry.register(effect.class_name, KernelStage::constructor(spec));
    }

    registry
}

impl ApplicationHandler for PlayerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let Err(err) = self.start(event_loop) {
            tracing::error!("failed to start player: {err}");
            event_loop.exit();
            return;
        }

        println!();
        println!("Keyboard shortcuts:");
        println!("  - Esc: Quit");
        println!("  - Space: Pause/Resume");
        println!("  - Ctrl+0: Disable Anime4K");
        println!("  - Ctrl+1-6: Set Anime4K preset (A, B, C, AA, BB, CA)");
        println!("  - Shift+1-5: Set performance preset (Light, Medium, High, Ultra, Extreme)");
        println!();
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if self.failed.get() {
            event_loop.exit();
            return;
        }

        match event {
            WindowEvent::ModifiersChanged(new_modifiers) => {
                self.modifiers = new_modifiers.state();
            }

            WindowEvent::KeyboardInput {
                event: KeyEvent {
                    state: ElementState::Pressed,
                    physical_key: PhysicalKey::Code(KeyCode::Escape),
                    ..
                },
                ..
            }
            | WindowEvent::CloseRequested => {
                if let Some(mut engine) = self.engine.take() {
                    engine.destroy();
                }
                event_loop.exit();
            }

            WindowEvent::KeyboardInput {
                event: KeyEvent {
                    state: ElementState::Pressed,
                    physical_key: PhysicalKey::Code(KeyCode::Space),
                    ..
                },
                ..
            } => {
                if let Some(engine) = self.engine.as_mut() {
                    let paused = engine.video_mut().toggle_pause();
                    tracing::info!(paused, "playback toggled");
                }
                self.update_window_title();
            }

            WindowEvent::KeyboardInput {
                event: KeyEvent {
                    state: ElementState::Pressed,
                    physical_key: PhysicalKey::Code(keycode),
                    ..
                },
                ..
            } if self.modifiers == ModifiersState::CONTROL => {
                let preset = match keycode {
                    KeyCode::Digit0 => Some(EnhancementPreset::Off),
                    KeyCode::Digit1 => Some(EnhancementPreset::ModeA),
                    KeyCode::Digit2 => Some(EnhancementPreset::ModeB),
                    KeyCode::Digit3 => Some(EnhancementPreset::ModeC),
                    KeyCode::Digit4 => Some(EnhancementPreset::ModeAA),
                    KeyCode::Digit5 => Some(EnhancementPreset::ModeBB),
                    KeyCode::Digit6 => Some(EnhancementPreset::ModeCA),
                    _ => None,
                };

                if let Some(preset) = preset.filter(|preset| *preset != self.preset) {
                    tracing::info!("preset set to {}", preset.name());
                    self.preset = preset;
                    self.reconfigure();
                }
            }

            WindowEvent::KeyboardInput {
                event: KeyEvent {
                    state: ElementState::Pressed,
                    physical_key: PhysicalKey::Code(keycode),
                    ..
                },
                ..
            } if self.modifiers == ModifiersState::SHIFT => {
                let performance = match keycode {
                    KeyCode::Digit1 => Some(PerformancePreset::Light),
                    KeyCode::Digit2 => Some(PerformancePreset::Medium),
                    KeyCode::Digit3 => Some(PerformancePreset::High),
                    KeyCode::Digit4 => Some(PerformancePreset::Ultra),
                    KeyCode::Digit5 => Some(PerformancePreset::Extreme),
                    _ => None,
                };

                if let Some(performance) = performance.filter(|performance| *performance != self.performance) {
                    tracing::info!("performance preset set to {}", performance.name());
                    self.performance = performance;
                    self.reconfigure();
                }
            }

            WindowEvent::RedrawRequested => self.redraw(),

            WindowEvent::Resized(new_size) => {
                if let Some(engine) = self.engine.as_mut() {
                    engine.gpu_mut().resize_surface(Dimensions::new(new_size.width, new_size.height));
                }
            }

            _ => {}
        }
    }
}
