//! Ownership of the installed asset and the steam field.
//!
//! Replacements follow swap-without-flicker: the new resource is attached to
//! the scene graph before the one it replaces is detached, so the consumer
//! never observes a frame with neither.

use glam::Vec3;

use crate::asset::ParsedAsset;
use crate::error::SessionError;
use crate::particle::ParticleField;
use crate::scene_graph::{EntityId, SceneGraph, SceneResource, Transform};

/// Owns the render-side resources of a session.
#[derive(Debug, Default)]
pub struct SceneResourceManager {
    graph: SceneGraph,
    asset: Option<EntityId>,
    steam: Option<(EntityId, ParticleField)>,
    torn_down: bool,
}

impl SceneResourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a decoded asset, replacing and releasing the previous one.
    pub fn install(&mut self, asset: ParsedAsset) -> Result<EntityId, SessionError> {
        self.ensure_live()?;

        let kind = asset.kind();
        let vertex_count = asset.vertex_count();
        let id = self.graph.attach(SceneResource::Asset(asset));

        if let Some(previous) = self.asset.replace(id) {
            if let Some(entity) = self.graph.detach(previous) {
                log::info!("Released {} asset {:?}", kind_of(&entity.resource), previous);
            }
        }

        log::info!("Installed {} asset {:?} ({} vertices)", kind, id, vertex_count);
        Ok(id)
    }

    /// The installed asset, if any.
    pub fn current_asset(&self) -> Option<&ParsedAsset> {
        let id = self.asset?;
        match &self.graph.get(id)?.resource {
            SceneResource::Asset(asset) => Some(asset),
            SceneResource::Steam => None,
        }
    }

    pub fn current_asset_id(&self) -> Option<EntityId> {
        self.asset
    }

    /// Transform of the installed asset.
    pub fn asset_transform(&self) -> Option<Transform> {
        self.graph.get(self.asset?).map(|e| e.transform)
    }

    pub fn asset_transform_mut(&mut self) -> Option<&mut Transform> {
        let id = self.asset?;
        self.graph.get_mut(id).map(|e| &mut e.transform)
    }

    /// Replace the steam field with a fresh one of `density` particles.
    ///
    /// All prior particle state is discarded.
    pub fn rebuild_steam(
        &mut self,
        density: usize,
        origin: Vec3,
        seed: u64,
    ) -> Result<&mut ParticleField, SessionError> {
        self.ensure_live()?;

        let field = ParticleField::with_seed(density, origin, seed);
        let id = self.graph.attach(SceneResource::Steam);
        if let Some((previous, old_field)) = self.steam.take() {
            self.graph.detach(previous);
            log::info!(
                "Rebuilt steam field: {} -> {} particles",
                old_field.len(),
                density
            );
        }

        let (_, field) = self.steam.insert((id, field));
        Ok(field)
    }

    pub fn steam(&self) -> Option<&ParticleField> {
        self.steam.as_ref().map(|(_, field)| field)
    }

    pub fn steam_mut(&mut self) -> Option<&mut ParticleField> {
        self.steam.as_mut().map(|(_, field)| field)
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut SceneGraph {
        &mut self.graph
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Release every owned resource. Later installs and rebuilds fail.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }

        if let Some(id) = self.asset.take() {
            self.graph.detach(id);
        }
        if let Some((id, field)) = self.steam.take() {
            self.graph.detach(id);
            drop(field);
        }
        self.torn_down = true;
        log::info!("Scene resources released");
    }

    fn ensure_live(&self) -> Result<(), SessionError> {
        if self.torn_down {
            Err(SessionError::TornDown)
        } else {
            Ok(())
        }
    }
}

fn kind_of(resource: &SceneResource) -> &'static str {
    match resource {
        SceneResource::Asset(asset) => asset.kind(),
        SceneResource::Steam => "steam",
    }
}
