//! Live render graph.
//!
//! The graph is the set of resources currently attached for drawing. Every
//! attach and detach is recorded in an ordered journal so the render consumer
//! can mirror GPU-side resources by draining [`SceneGraph::drain_events`].

use std::collections::BTreeMap;

use glam::{Mat4, Quat, Vec3};
use serde::Serialize;

use crate::asset::ParsedAsset;

/// Unique identifier for scene entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EntityId(pub u64);

/// Transform component for scene entities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3, // Euler angles in radians
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Model matrix (scale, then XYZ rotation, then translation).
    pub fn matrix(&self) -> Mat4 {
        let rotation = Quat::from_euler(
            glam::EulerRot::XYZ,
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
        );
        Mat4::from_scale_rotation_translation(self.scale, rotation, self.position)
    }
}

/// What an attached entity draws.
#[derive(Debug, Clone)]
pub enum SceneResource {
    /// The user's decoded asset.
    Asset(ParsedAsset),
    /// The steam particle field, owned by the resource manager.
    Steam,
}

impl SceneResource {
    pub fn is_asset(&self) -> bool {
        matches!(self, SceneResource::Asset(_))
    }
}

/// An attached entity.
#[derive(Debug, Clone)]
pub struct SceneEntity {
    pub resource: SceneResource,
    pub transform: Transform,
    pub visible: bool,
}

/// Journal entry describing a change to the attached set.
///
/// Serializes as `{"kind": "attached", "id": 3}` for the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum GraphEvent {
    Attached(EntityId),
    Detached(EntityId),
}

/// Attached resources plus the change journal.
#[derive(Debug, Default)]
pub struct SceneGraph {
    entities: BTreeMap<EntityId, SceneEntity>,
    events: Vec<GraphEvent>,
    next_id: u64,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a resource and return its id.
    pub fn attach(&mut self, resource: SceneResource) -> EntityId {
        self.next_id += 1;
        let id = EntityId(self.next_id);
        self.entities.insert(
            id,
            SceneEntity {
                resource,
                transform: Transform::default(),
                visible: true,
            },
        );
        self.events.push(GraphEvent::Attached(id));
        id
    }

    /// Detach an entity, handing its resource back to the caller for release.
    pub fn detach(&mut self, id: EntityId) -> Option<SceneEntity> {
        let entity = self.entities.remove(&id)?;
        self.events.push(GraphEvent::Detached(id));
        Some(entity)
    }

    pub fn get(&self, id: EntityId) -> Option<&SceneEntity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut SceneEntity> {
        self.entities.get_mut(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Number of attached entities of any kind.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Number of attached asset entities.
    pub fn asset_count(&self) -> usize {
        self.entities
            .values()
            .filter(|e| e.resource.is_asset())
            .count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &SceneEntity)> {
        self.entities.iter().map(|(id, e)| (*id, e))
    }

    /// Journal entries recorded since the last drain.
    pub fn events(&self) -> &[GraphEvent] {
        &self.events
    }

    /// Take the journal entries recorded since the last drain.
    pub fn drain_events(&mut self) -> Vec<GraphEvent> {
        std::mem::take(&mut self.events)
    }
}
