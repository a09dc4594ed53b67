//! Render-loop session.
//!
//! [`VisualiserState`] owns everything a running viewer needs: the settings
//! snapshot, camera, viewport, loader, scene resources and clock. Host events
//! (settings, resize, pointer, file drops) are queued and only take effect at
//! the start of the next [`VisualiserState::tick`], which runs as one unit:
//!
//! 1. apply queued settings and viewport (a density change rebuilds the field)
//! 2. install the newest finished load, or record its error
//! 3. apply a queued pick, relocating the emission origin
//! 4. advance the steam field and the asset's auto-rotation
//! 5. return the frame

use std::time::Duration;

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use serde::Serialize;

use crate::asset::ParsedAsset;
use crate::camera::{Camera, CameraUniforms};
use crate::error::{ParseError, SessionError};
use crate::loader::{AssetLoader, Dispatch, LoadOutcome, LoadTicket};
use crate::particle::ParticleField;
use crate::particle_eval::SteamVertex;
use crate::picking::{self, Viewport};
use crate::resource_manager::SceneResourceManager;
use crate::scene_graph::GraphEvent;
use crate::settings::{SessionConfig, VisualSettings};

// ============================================================================
// Frame Output
// ============================================================================

/// Per-frame steam/point uniforms.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SteamUniforms {
    pub time: f32,
    pub intensity: f32,
    pub speed: f32,
    pub point_size: f32,
}

/// Summary of the installed asset as drawn this frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetFrame {
    pub kind: &'static str,
    pub format: &'static str,
    pub vertex_count: usize,
    /// Euler rotation in radians.
    pub rotation: [f32; 3],
    pub model_matrix: [[f32; 4]; 4],
}

/// Everything the render consumer needs to draw one frame.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameOutput {
    pub frame: u64,
    pub uniforms: SteamUniforms,
    pub camera: CameraUniforms,
    pub emission_origin: [f32; 3],
    /// Rendered steam positions, flat `xyz`.
    pub particle_positions: Vec<f32>,
    pub steam_vertices: Vec<SteamVertex>,
    pub asset: Option<AssetFrame>,
    pub load_error: Option<String>,
}

// ============================================================================
// Session
// ============================================================================

pub struct VisualiserState {
    config: SessionConfig,
    settings: VisualSettings,
    pending_settings: Option<VisualSettings>,
    viewport: Viewport,
    pending_viewport: Option<Viewport>,
    pending_pick: Option<(f32, f32)>,
    camera: Camera,
    emission_origin: Vec3,
    resources: SceneResourceManager,
    loader: AssetLoader,
    /// Outcome fetched by `wait_for_load`, delivered at the next tick.
    ready_load: Option<LoadOutcome>,
    last_load_error: Option<ParseError>,
    rebuilds: u64,
    frame: u64,
}

impl VisualiserState {
    pub fn new(config: SessionConfig) -> Self {
        Self::with_dispatch(config, Dispatch::default())
    }

    pub fn with_dispatch(config: SessionConfig, dispatch: Dispatch) -> Self {
        let settings = config.settings.clamped();
        let camera = if config.camera.is_degenerate() {
            log::warn!("Configured camera has no view basis, using the default camera");
            Camera::default()
        } else {
            config.camera
        };
        let mut state = Self {
            settings,
            pending_settings: None,
            viewport: Viewport::default(),
            pending_viewport: None,
            pending_pick: None,
            camera,
            emission_origin: config.emission_origin,
            resources: SceneResourceManager::new(),
            loader: AssetLoader::new(dispatch),
            ready_load: None,
            last_load_error: None,
            rebuilds: 0,
            frame: 0,
            config,
        };
        state.rebuild_steam();
        state
    }

    // --- Host events ---

    /// Queue a settings snapshot for the next tick.
    pub fn queue_settings(&mut self, settings: VisualSettings) -> Result<(), SessionError> {
        self.ensure_live()?;
        self.pending_settings = Some(settings.clamped());
        Ok(())
    }

    /// Queue a viewport size for the next tick.
    pub fn resize(&mut self, width: f32, height: f32) -> Result<(), SessionError> {
        self.ensure_live()?;
        self.pending_viewport = Some(Viewport::new(width, height));
        Ok(())
    }

    /// Queue a pointer press; the newest one wins.
    pub fn queue_pick(&mut self, screen_x: f32, screen_y: f32) -> Result<(), SessionError> {
        self.ensure_live()?;
        self.pending_pick = Some((screen_x, screen_y));
        Ok(())
    }

    /// Start loading a file. Any load still in flight is abandoned.
    pub fn load_file(
        &mut self,
        bytes: Vec<u8>,
        filename: &str,
    ) -> Result<LoadTicket, SessionError> {
        self.ensure_live()?;
        self.ready_load = None;
        Ok(self.loader.submit(bytes, filename))
    }

    pub fn cancel_load(&mut self) {
        self.ready_load = None;
        self.loader.cancel();
    }

    /// Block until the load in flight finishes, at most `timeout`.
    ///
    /// The outcome is still only applied by the next tick.
    pub fn wait_for_load(&mut self, timeout: Duration) -> bool {
        if self.ready_load.is_some() {
            return true;
        }
        self.ready_load = self.loader.wait(timeout);
        self.ready_load.is_some()
    }

    // --- Frame ---

    /// Advance one fixed step of the configured length.
    pub fn step(&mut self) -> Result<FrameOutput, SessionError> {
        self.tick(self.config.time_step)
    }

    /// Run one frame of `dt` seconds.
    pub fn tick(&mut self, dt: f32) -> Result<FrameOutput, SessionError> {
        self.ensure_live()?;

        let dt = if dt.is_finite() && dt >= 0.0 {
            dt
        } else {
            log::warn!("Invalid frame delta {}, using {}", dt, self.config.time_step);
            self.config.time_step
        };

        self.apply_pending_settings();
        self.deliver_load()?;
        self.apply_pending_pick();

        let speed = self.settings.speed;
        if let Some(field) = self.resources.steam_mut() {
            field.tick(dt, speed);
        }
        if self.settings.auto_rotate {
            let step = self.config.rotation_step;
            if let Some(transform) = self.resources.asset_transform_mut() {
                transform.rotation.y += step;
            }
        }

        self.frame += 1;
        Ok(self.frame_output())
    }

    /// Release every resource and reject further calls. Idempotent.
    pub fn teardown(&mut self) {
        if self.resources.is_torn_down() {
            return;
        }
        self.loader.cancel();
        self.ready_load = None;
        self.pending_settings = None;
        self.pending_viewport = None;
        self.pending_pick = None;
        self.resources.teardown();
        log::info!("Session torn down after {} frames", self.frame);
    }

    // --- Accessors ---

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn settings(&self) -> &VisualSettings {
        &self.settings
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn emission_origin(&self) -> Vec3 {
        self.emission_origin
    }

    pub fn current_asset(&self) -> Option<&ParsedAsset> {
        self.resources.current_asset()
    }

    pub fn steam(&self) -> Option<&ParticleField> {
        self.resources.steam()
    }

    pub fn resources(&self) -> &SceneResourceManager {
        &self.resources
    }

    /// Scene graph changes since the last call.
    pub fn drain_graph_events(&mut self) -> Vec<GraphEvent> {
        self.resources.graph_mut().drain_events()
    }

    /// Error from the most recent failed load, cleared by the next successful one.
    pub fn last_load_error(&self) -> Option<&ParseError> {
        self.last_load_error.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loader.is_pending() || self.ready_load.is_some()
    }

    pub fn is_torn_down(&self) -> bool {
        self.resources.is_torn_down()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    // --- Tick stages ---

    fn apply_pending_settings(&mut self) {
        if let Some(viewport) = self.pending_viewport.take() {
            log::debug!("Viewport {}x{}", viewport.width, viewport.height);
            self.viewport = viewport;
        }

        let Some(next) = self.pending_settings.take() else {
            return;
        };
        let density_changed = next.density != self.settings.density;
        self.settings = next;
        if density_changed {
            self.rebuild_steam();
        }
    }

    fn deliver_load(&mut self) -> Result<(), SessionError> {
        let Some(outcome) = self.ready_load.take().or_else(|| self.loader.poll()) else {
            return Ok(());
        };

        match outcome.result {
            Ok(asset) => {
                self.resources.install(asset)?;
                self.last_load_error = None;
            }
            Err(e) => {
                log::error!("Failed to load '{}': {}", outcome.filename, e);
                self.last_load_error = Some(e);
            }
        }
        Ok(())
    }

    fn apply_pending_pick(&mut self) {
        let Some((x, y)) = self.pending_pick.take() else {
            return;
        };

        match picking::pick(x, y, self.viewport, &self.camera) {
            Some(point) => {
                log::info!("Emission origin moved to {:?}", point);
                self.emission_origin = point;
                if let Some(field) = self.resources.steam_mut() {
                    field.set_origin(point);
                }
            }
            None => log::debug!("Pick at ({}, {}) missed the ground", x, y),
        }
    }

    fn rebuild_steam(&mut self) {
        let seed = self.config.seed.wrapping_add(self.rebuilds);
        self.rebuilds += 1;
        if let Err(e) =
            self.resources
                .rebuild_steam(self.settings.density, self.emission_origin, seed)
        {
            log::error!("Steam rebuild skipped: {}", e);
        }
    }

    fn frame_output(&self) -> FrameOutput {
        let (time, particle_positions, steam_vertices) = match self.resources.steam() {
            Some(field) => (field.time(), field.positions().to_vec(), field.vertices()),
            None => (0.0, Vec::new(), Vec::new()),
        };

        let asset = self.resources.current_asset().and_then(|asset| {
            let transform = self.resources.asset_transform()?;
            Some(AssetFrame {
                kind: asset.kind(),
                format: asset.format().name(),
                vertex_count: asset.vertex_count(),
                rotation: transform.rotation.to_array(),
                model_matrix: transform.matrix().to_cols_array_2d(),
            })
        });

        FrameOutput {
            frame: self.frame,
            uniforms: SteamUniforms {
                time,
                intensity: self.settings.intensity,
                speed: self.settings.speed,
                point_size: self.settings.point_size,
            },
            camera: self.camera.to_uniforms(self.viewport.aspect()),
            emission_origin: self.emission_origin.to_array(),
            particle_positions,
            steam_vertices,
            asset,
            load_error: self.last_load_error.as_ref().map(|e| e.to_string()),
        }
    }

    fn ensure_live(&self) -> Result<(), SessionError> {
        if self.resources.is_torn_down() {
            Err(SessionError::TornDown)
        } else {
            Ok(())
        }
    }
}

impl Default for VisualiserState {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}
