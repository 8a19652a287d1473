//! In-memory backend for unit tests
//!
//! [`MockGpu`] and [`MockVideo`] record everything the engine asks of them in
//! shared logs so tests can assert on texture lifetimes, submissions and
//! callback registrations. Clones share state, so a test can keep a handle
//! after moving the original into an engine.

use crate::dimensions::{Dimensions, ScaleFactor};
use crate::error::{EngineError, Result};
use crate::gpu::{Compositor, Gpu};
use crate::stage::{EffectStage, StageDescriptor};
use crate::video::{FrameCallbackId, FrameClock, ReadyState, VideoSource};
use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockTexture {
    pub id: u32,
    pub dimensions: Dimensions,
}

#[derive(Debug, Default)]
pub struct MockEncoder {
    pub commands: Vec<String>,
}

#[derive(Debug)]
pub struct MockFrame {
    pub id: u32,
}

/// A stage constructor call as seen by the backend
#[derive(Debug, Clone)]
pub struct ConstructedStage {
    pub class_name: String,
    pub input: MockTexture,
    pub native: Dimensions,
    pub target: Dimensions,
}

#[derive(Debug, Default)]
pub struct GpuLog {
    pub created_textures: Vec<MockTexture>,
    pub destroyed_textures: Vec<u32>,
    pub constructed: Vec<ConstructedStage>,
    pub disposed_stages: Vec<String>,
    pub compositor_bindings: Vec<MockTexture>,
    pub submissions: Vec<Vec<String>>,
    pub presented: usize,
    pub surface_detached: usize,
    pub device_destroyed: usize,
}

#[derive(Debug, Default)]
struct Faults {
    construction: Option<String>,
    disposal: bool,
    compositor: bool,
    acquire: bool,
    detach: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MockGpu {
    log: Rc<RefCell<GpuLog>>,
    faults: Rc<RefCell<Faults>>,
}

impl MockGpu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> Ref<'_, GpuLog> {
        self.log.borrow()
    }

    pub fn create_texture(&self, dimensions: Dimensions) -> MockTexture {
        let mut log = self.log.borrow_mut();
        let texture = MockTexture {
            id: log.created_textures.len() as u32 + 1,
            dimensions,
        };
        log.created_textures.push(texture.clone());
        texture
    }

    /// Textures created and not yet destroyed
    pub fn live_textures(&self) -> Vec<MockTexture> {
        let log = self.log.borrow();
        log.created_textures.iter().filter(|texture| !log.destroyed_textures.contains(&texture.id)).cloned().collect()
    }

    pub fn fail_construction_of(&self, class_name: &str) {
        self.faults.borrow_mut().construction = Some(class_name.to_string());
    }

    pub fn fail_disposal(&self, fail: bool) {
        self.faults.borrow_mut().disposal = fail;
    }

    pub fn fail_compositor(&self, fail: bool) {
        self.faults.borrow_mut().compositor = fail;
    }

    pub fn fail_acquire(&self, fail: bool) {
        self.faults.borrow_mut().acquire = fail;
    }

    pub fn fail_detach(&self, fail: bool) {
        self.faults.borrow_mut().detach = fail;
    }
}

impl Gpu for MockGpu {
    type Texture = MockTexture;
    type Encoder = MockEncoder;
    type Frame = MockFrame;
    type Compositor = MockCompositor;

    fn create_source_texture(&self, dimensions: Dimensions) -> MockTexture {
        self.create_texture(dimensions)
    }

    fn texture_dimensions(texture: &MockTexture) -> Dimensions {
        texture.dimensions
    }

    fn destroy_texture(&self, texture: &MockTexture) {
        self.log.borrow_mut().destroyed_textures.push(texture.id);
    }

    async fn create_compositor(&self) -> Result<MockCompositor> {
        if self.faults.borrow().compositor {
            return Err(EngineError::CompositorCompilation("mock shader error".to_string()));
        }
        Ok(MockCompositor {
            log: self.log.clone(),
            bound: None,
        })
    }

    fn create_encoder(&self) -> MockEncoder {
        MockEncoder::default()
    }

    fn acquire_frame(&self) -> Result<MockFrame> {
        if self.faults.borrow().acquire {
            return Err(EngineError::SurfaceFrame(wgpu::SurfaceError::Lost));
        }
        let id = self.log.borrow().presented as u32;
        Ok(MockFrame { id })
    }

    fn submit(&self, encoder: MockEncoder) {
        self.log.borrow_mut().submissions.push(encoder.commands);
    }

    fn present(&self, _frame: MockFrame) {
        self.log.borrow_mut().presented += 1;
    }

    fn detach_surface(&mut self) -> Result<()> {
        if self.faults.borrow().detach {
            return Err(EngineError::Release("mock surface refused to detach".to_string()));
        }
        self.log.borrow_mut().surface_detached += 1;
        Ok(())
    }

    fn destroy_device(&mut self) -> Result<()> {
        self.log.borrow_mut().device_destroyed += 1;
        Ok(())
    }
}

#[derive(Debug)]
pub struct MockCompositor {
    log: Rc<RefCell<GpuLog>>,
    bound: Option<MockTexture>,
}

impl Compositor<MockGpu> for MockCompositor {
    fn bind(&mut self, _gpu: &MockGpu, texture: &MockTexture) {
        self.log.borrow_mut().compositor_bindings.push(texture.clone());
        self.bound = Some(texture.clone());
    }

    fn draw(&self, encoder: &mut MockEncoder, frame: &MockFrame) -> Result<()> {
        let texture = self.bound.as_ref().ok_or(EngineError::CompositorUnbound)?;
        encoder.commands.push(format!("composite {} -> frame {}", texture.id, frame.id));
        Ok(())
    }
}

/// Stage that allocates an output texture and records itself when processed
pub struct MockStage {
    class_name: String,
    input: MockTexture,
    output: MockTexture,
}

impl MockStage {
    /// Output size is the native size scaled by `factor`
    pub fn boxed(class_name: &str, desc: &StageDescriptor<'_, MockGpu>, factor: Option<ScaleFactor>) -> Result<Box<dyn EffectStage<MockGpu>>> {
        let output = desc.native_dimensions.scaled(factor.unwrap_or(ScaleFactor::ONE));
        Self::construct(class_name, desc, output)
    }

    /// Output size is the requested target size
    pub fn downscale(desc: &StageDescriptor<'_, MockGpu>) -> Result<Box<dyn EffectStage<MockGpu>>> {
        Self::construct(crate::stage::DOWNSCALE_STAGE, desc, desc.target_dimensions)
    }

    fn construct(class_name: &str, desc: &StageDescriptor<'_, MockGpu>, output: Dimensions) -> Result<Box<dyn EffectStage<MockGpu>>> {
        let gpu = desc.gpu;
        if gpu.faults.borrow().construction.as_deref() == Some(class_name) {
            return Err(EngineError::stage_construction(class_name, "mock construction failure"));
        }

        gpu.log.borrow_mut().constructed.push(ConstructedStage {
            class_name: class_name.to_string(),
            input: desc.input_texture.clone(),
            native: desc.native_dimensions,
            target: desc.target_dimensions,
        });

        Ok(Box::new(MockStage {
            class_name: class_name.to_string(),
            input: desc.input_texture.clone(),
            output: gpu.create_texture(output),
        }))
    }
}

impl EffectStage<MockGpu> for MockStage {
    fn process(&self, encoder: &mut MockEncoder) {
        encoder.commands.push(format!("{} {} -> {}", self.class_name, self.input.id, self.output.id));
    }

    fn output_texture(&self) -> &MockTexture {
        &self.output
    }

    fn dispose(&mut self, gpu: &MockGpu) -> Result<()> {
        gpu.log.borrow_mut().disposed_stages.push(self.class_name.clone());
        gpu.destroy_texture(&self.output);
        if gpu.faults.borrow().disposal {
            return Err(EngineError::stage_disposal(&self.class_name, "mock disposal failure"));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct VideoState {
    pub dimensions: Dimensions,
    pub paused: bool,
    pub ready_state: ReadyState,
    pub pending_callbacks: Vec<FrameCallbackId>,
    pub requested_callbacks: u32,
    pub cancelled_callbacks: Vec<FrameCallbackId>,
    pub copies: Vec<u32>,
    pub waited_for_data: bool,
    pub fail_copy: bool,
    pub fail_request: bool,
}

#[derive(Debug, Clone)]
pub struct MockVideo {
    state: Rc<RefCell<VideoState>>,
}

impl MockVideo {
    /// A playing video with enough data buffered
    pub fn new(dimensions: Dimensions) -> Self {
        Self {
            state: Rc::new(RefCell::new(VideoState {
                dimensions,
                paused: false,
                ready_state: ReadyState::HaveEnoughData,
                pending_callbacks: Vec::new(),
                requested_callbacks: 0,
                cancelled_callbacks: Vec::new(),
                copies: Vec::new(),
                waited_for_data: false,
                fail_copy: false,
                fail_request: false,
            })),
        }
    }

    pub fn state(&self) -> RefMut<'_, VideoState> {
        self.state.borrow_mut()
    }

    /// Consumes the pending callback, if any, as the display clock would
    pub fn fire(&self) -> bool {
        self.state.borrow_mut().pending_callbacks.pop().is_some()
    }
}

impl FrameClock for MockVideo {
    fn request_frame_callback(&mut self) -> Result<FrameCallbackId> {
        let mut state = self.state.borrow_mut();
        if state.fail_request {
            return Err(EngineError::FrameCallback("mock clock refused".to_string()));
        }
        state.requested_callbacks += 1;
        let id = FrameCallbackId(state.requested_callbacks);
        state.pending_callbacks.push(id);
        Ok(id)
    }

    fn cancel_frame_callback(&mut self, id: FrameCallbackId) {
        let mut state = self.state.borrow_mut();
        state.pending_callbacks.retain(|pending| *pending != id);
        state.cancelled_callbacks.push(id);
    }
}

impl VideoSource<MockGpu> for MockVideo {
    fn native_dimensions(&self) -> Dimensions {
        self.state.borrow().dimensions
    }

    fn is_paused(&self) -> bool {
        self.state.borrow().paused
    }

    fn ready_state(&self) -> ReadyState {
        self.state.borrow().ready_state
    }

    async fn wait_for_future_data(&self) {
        let mut state = self.state.borrow_mut();
        state.waited_for_data = true;
        state.ready_state = state.ready_state.max(ReadyState::HaveFutureData);
    }

    fn copy_frame_to(&self, _gpu: &MockGpu, texture: &MockTexture) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.fail_copy {
            return Err(EngineError::frame_copy("mock decoder stalled"));
        }
        if texture.dimensions != state.dimensions {
            return Err(EngineError::frame_copy(format!("frame is {} but texture is {}", state.dimensions, texture.dimensions)));
        }
        state.copies.push(texture.id);
        Ok(())
    }
}
