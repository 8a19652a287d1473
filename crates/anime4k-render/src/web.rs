//! Browser video source
//!
//! Wraps an `HTMLVideoElement`. Frames are paced with
//! `requestVideoFrameCallback`, which is not yet part of the stable `web-sys`
//! bindings and is therefore called through `js_sys::Reflect`.

use crate::dimensions::Dimensions;
use crate::error::{EngineError, Result};
use crate::video::{FrameCallbackId, FrameClock, ReadyState, VideoSource};
use crate::wgpu_context::WgpuContext;
use js_sys::{Function, Promise, Reflect};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{AddEventListenerOptions, HtmlVideoElement};

/// Video source over an `HTMLVideoElement`
pub struct HtmlVideoSource {
    element: HtmlVideoElement,
    on_frame: Closure<dyn FnMut(JsValue, JsValue)>,
}

impl HtmlVideoSource {
    /// Wraps `element`; `on_frame` runs every time a requested frame callback fires
    ///
    /// The host is expected to call [`crate::RenderEngine::tick`] from `on_frame`.
    pub fn new(element: HtmlVideoElement, mut on_frame: impl FnMut() + 'static) -> Self {
        let on_frame = Closure::wrap(Box::new(move |_now: JsValue, _metadata: JsValue| on_frame()) as Box<dyn FnMut(JsValue, JsValue)>);
        Self { element, on_frame }
    }

    pub fn element(&self) -> &HtmlVideoElement {
        &self.element
    }

    fn video_method(&self, name: &str) -> Option<Function> {
        Reflect::get(&self.element, &JsValue::from_str(name)).ok()?.dyn_into::<Function>().ok()
    }
}

impl FrameClock for HtmlVideoSource {
    fn request_frame_callback(&mut self) -> Result<FrameCallbackId> {
        let request = self
            .video_method("requestVideoFrameCallback")
            .ok_or_else(|| EngineError::FrameCallback("requestVideoFrameCallback is unavailable".to_string()))?;
        let handle = request
            .call1(&self.element, self.on_frame.as_ref().unchecked_ref())
            .map_err(|err| EngineError::FrameCallback(format!("{err:?}")))?;
        let handle = handle
            .as_f64()
            .ok_or_else(|| EngineError::FrameCallback("requestVideoFrameCallback returned no handle".to_string()))?;
        Ok(FrameCallbackId(handle as u32))
    }

    fn cancel_frame_callback(&mut self, id: FrameCallbackId) {
        if let Some(cancel) = self.video_method("cancelVideoFrameCallback") {
            let _ = cancel.call1(&self.element, &JsValue::from(id.0));
        }
    }
}

impl VideoSource<WgpuContext> for HtmlVideoSource {
    fn native_dimensions(&self) -> Dimensions {
        Dimensions::new(self.element.video_width(), self.element.video_height())
    }

    fn is_paused(&self) -> bool {
        self.element.paused()
    }

    fn ready_state(&self) -> ReadyState {
        ReadyState::from_html(self.element.ready_state())
    }

    async fn wait_for_future_data(&self) {
        let element = self.element.clone();
        let ready = Promise::new(&mut |resolve, _reject| {
            let options = AddEventListenerOptions::new();
            options.set_once(true);
            if element.add_event_listener_with_callback_and_add_event_listener_options("canplay", &resolve, &options).is_err() {
                let _ = resolve.call0(&JsValue::UNDEFINED);
            }
        });

        if let Err(err) = JsFuture::from(ready).await {
            tracing::warn!(error = ?err, "waiting for video data failed");
        }
    }

    fn copy_frame_to(&self, gpu: &WgpuContext, texture: &wgpu::Texture) -> Result<()> {
        let dimensions = self.native_dimensions();
        if dimensions != Dimensions::new(texture.width(), texture.height()) {
            return Err(EngineError::frame_copy(format!("video frame is {dimensions} but source texture is {}x{}", texture.width(), texture.height())));
        }

        gpu.queue().copy_external_image_to_texture(
            &wgpu::CopyExternalImageSourceInfo {
                source: wgpu::ExternalImageSource::HTMLVideoElement(self.element.clone()),
                origin: wgpu::Origin2d::ZERO,
                flip_y: false,
            },
            wgpu::CopyExternalImageDestInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
                color_space: wgpu::PredefinedColorSpace::Srgb,
                premultiplied_alpha: false,
            },
            dimensions.to_extent(),
        );
        Ok(())
    }
}
