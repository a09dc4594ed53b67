use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;

use crate::asset::ParsedAsset;
use crate::particle_eval::SteamVertex;
use crate::settings::{SessionConfig, VisualSettings};
use crate::visualiser::{FrameOutput, VisualiserState};

#[wasm_bindgen]
pub struct WasmVisualiser {
    inner: Rc<RefCell<VisualiserContext>>,
}

struct VisualiserContext {
    state: VisualiserState,
    /// Most recent tick result, read back by the accessors below.
    last_frame: Option<FrameOutput>,
}

#[wasm_bindgen]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Info);
}

#[wasm_bindgen]
impl WasmVisualiser {
    #[wasm_bindgen(constructor)]
    pub fn new(width: u32, height: u32) -> Self {
        init_panic_hook();

        let mut state = VisualiserState::new(SessionConfig::default());
        if let Err(e) = state.resize(width as f32, height as f32) {
            log::error!("Initial resize failed: {}", e);
        }
        log::info!("Visualiser created ({}x{})", width, height);

        Self {
            inner: Rc::new(RefCell::new(VisualiserContext {
                state,
                last_frame: None,
            })),
        }
    }

    /// Start decoding a dropped file. Returns the load ticket, or 0 after dispose.
    pub fn load_file(&self, bytes: &[u8], filename: &str) -> u64 {
        let mut inner = self.inner.borrow_mut();
        match inner.state.load_file(bytes.to_vec(), filename) {
            Ok(ticket) => ticket,
            Err(e) => {
                log::error!("Cannot load '{}': {}", filename, e);
                0
            }
        }
    }

    pub fn cancel_load(&self) {
        self.inner.borrow_mut().state.cancel_load();
    }

    pub fn is_loading(&self) -> bool {
        self.inner.borrow().state.is_loading()
    }

    /// Queue a settings snapshot (camelCase JSON).
    /// Returns true if successful, false if parsing failed.
    pub fn set_settings(&self, json: &str) -> bool {
        let settings = match VisualSettings::from_json(json) {
            Ok(settings) => settings,
            Err(e) => {
                log::error!("Failed to parse settings: {}", e);
                return false;
            }
        };

        let mut inner = self.inner.borrow_mut();
        match inner.state.queue_settings(settings) {
            Ok(()) => true,
            Err(e) => {
                log::error!("Settings rejected: {}", e);
                false
            }
        }
    }

    pub fn resize(&self, width: u32, height: u32) {
        let mut inner = self.inner.borrow_mut();
        if let Err(e) = inner.state.resize(width as f32, height as f32) {
            log::warn!("Resize ignored: {}", e);
        }
    }

    /// Pointer press in canvas pixels; relocates the steam on the next tick.
    pub fn pointer_down(&self, x: f32, y: f32) {
        let mut inner = self.inner.borrow_mut();
        if let Err(e) = inner.state.queue_pick(x, y) {
            log::warn!("Pointer ignored: {}", e);
        }
    }

    /// Run one frame. Returns false once the visualiser is disposed.
    pub fn tick(&self, dt: f32) -> bool {
        let mut inner = self.inner.borrow_mut();
        match inner.state.tick(dt) {
            Ok(frame) => {
                inner.last_frame = Some(frame);
                true
            }
            Err(_) => false,
        }
    }

    /// Rendered steam positions from the last tick, flat xyz.
    pub fn particle_positions(&self) -> Vec<f32> {
        let inner = self.inner.borrow();
        inner
            .last_frame
            .as_ref()
            .map(|frame| frame.particle_positions.clone())
            .unwrap_or_default()
    }

    /// Steam sprite vertices from the last tick, four floats each (xyz + size).
    pub fn steam_vertices(&self) -> Vec<f32> {
        let inner = self.inner.borrow();
        inner
            .last_frame
            .as_ref()
            .map(|frame| bytemuck::cast_slice::<SteamVertex, f32>(&frame.steam_vertices).to_vec())
            .unwrap_or_default()
    }

    /// Steam uniforms from the last tick: time, intensity, speed, pointSize.
    pub fn uniforms(&self) -> Vec<f32> {
        let inner = self.inner.borrow();
        inner
            .last_frame
            .as_ref()
            .map(|frame| bytemuck::cast_slice(std::slice::from_ref(&frame.uniforms)).to_vec())
            .unwrap_or_default()
    }

    /// Positions of the installed asset, flat xyz. Models are flattened to world space.
    pub fn point_cloud(&self) -> Vec<f32> {
        let inner = self.inner.borrow();
        match inner.state.current_asset() {
            Some(ParsedAsset::PointCloud { vertices, .. }) => vertices.as_slice().to_vec(),
            Some(ParsedAsset::Model(model)) => model.world_positions().into_inner(),
            None => Vec::new(),
        }
    }

    /// Last tick's frame as JSON, for debugging.
    pub fn frame_json(&self) -> String {
        let inner = self.inner.borrow();
        match &inner.last_frame {
            Some(frame) => serde_json::to_string(frame).unwrap_or_else(|e| {
                log::error!("Failed to serialize frame: {}", e);
                "null".to_string()
            }),
            None => "null".to_string(),
        }
    }

    /// Scene graph attach/detach events since the last call, as a JSON array.
    /// The host must drain these each frame to mirror its GPU resources.
    pub fn drain_graph_events(&self) -> String {
        let mut inner = self.inner.borrow_mut();
        let events = inner.state.drain_graph_events();
        serde_json::to_string(&events).unwrap_or_else(|e| {
            log::error!("Failed to serialize graph events: {}", e);
            "[]".to_string()
        })
    }

    /// Message of the most recent failed load, if any.
    pub fn last_error(&self) -> Option<String> {
        let inner = self.inner.borrow();
        inner.state.last_load_error().map(|e| e.to_string())
    }

    /// Release every resource. Later calls are no-ops.
    pub fn dispose(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.state.teardown();
        inner.last_frame = None;
    }
}
