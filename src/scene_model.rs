//! Binary scene (glTF/GLB) loading.
//!
//! Container parsing and accessor decoding are delegated to the `gltf`
//! crate. The result is a [`SceneModel`]: an immutable, cheaply cloned handle
//! to the node hierarchy and mesh positions. No file system access happens
//! here, so only GLB binary chunks and base64 `data:` URIs can back buffers.

use std::sync::Arc;

use base64::Engine;
use glam::{Mat4, Vec3};

use crate::asset::{BoundingBox, VertexBuffer};
use crate::error::ParseError;
use crate::format::AssetFormat;

const FORMAT: AssetFormat = AssetFormat::Gltf;

/// A node in the model hierarchy.
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: Option<String>,
    /// Transform relative to the parent node.
    pub local_transform: Mat4,
    /// Index into [`SceneModel::meshes`].
    pub mesh: Option<usize>,
    /// Indices into [`SceneModel::nodes`].
    pub children: Vec<usize>,
}

/// Geometry of one glTF mesh, all primitives merged.
#[derive(Debug, Clone, Default)]
pub struct ModelMesh {
    pub name: Option<String>,
    pub positions: Vec<[f32; 3]>,
    /// Triangle indices into `positions`. Empty for non-indexed primitives.
    pub indices: Vec<u32>,
}

#[derive(Debug)]
struct SceneModelData {
    name: Option<String>,
    nodes: Vec<SceneNode>,
    roots: Vec<usize>,
    meshes: Vec<ModelMesh>,
}

/// Opaque handle to a loaded hierarchical scene.
#[derive(Debug, Clone)]
pub struct SceneModel {
    inner: Arc<SceneModelData>,
}

impl SceneModel {
    pub fn format(&self) -> AssetFormat {
        FORMAT
    }

    /// Name of the scene that was loaded, if the file provides one.
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.inner.nodes
    }

    /// Root nodes of the loaded scene.
    pub fn roots(&self) -> &[usize] {
        &self.inner.roots
    }

    pub fn meshes(&self) -> &[ModelMesh] {
        &self.inner.meshes
    }

    /// Total mesh positions, counted once per mesh (not per instance).
    pub fn position_count(&self) -> usize {
        self.inner.meshes.iter().map(|m| m.positions.len()).sum()
    }

    /// Whether two handles refer to the same loaded model.
    pub fn ptr_eq(&self, other: &SceneModel) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Flatten every mesh instance through its node's world transform.
    ///
    /// Models without any node hierarchy place each mesh once at the origin.
    pub fn world_positions(&self) -> VertexBuffer {
        let data = &self.inner;
        let mut out = Vec::new();

        if data.nodes.is_empty() {
            for mesh in &data.meshes {
                out.extend(mesh.positions.iter().copied());
            }
            return VertexBuffer::from_points(out);
        }

        let mut visited = vec![false; data.nodes.len()];
        let mut stack: Vec<(usize, Mat4)> =
            data.roots.iter().rev().map(|&root| (root, Mat4::IDENTITY)).collect();

        while let Some((index, parent)) = stack.pop() {
            let Some(node) = data.nodes.get(index) else {
                continue;
            };
            // Malformed files can reference a node twice; instance it once
            if std::mem::replace(&mut visited[index], true) {
                continue;
            }

            let world = parent * node.local_transform;
            if let Some(mesh) = node.mesh.and_then(|m| data.meshes.get(m)) {
                out.extend(
                    mesh.positions
                        .iter()
                        .map(|p| world.transform_point3(Vec3::from_array(*p)).to_array()),
                );
            }
            for &child in node.children.iter().rev() {
                stack.push((child, world));
            }
        }

        VertexBuffer::from_points(out)
    }

    pub fn bounds(&self) -> BoundingBox {
        self.world_positions().bounds()
    }
}

/// Decode a `.glb` or `.gltf` byte stream.
pub fn load_scene(bytes: &[u8]) -> Result<SceneModel, ParseError> {
    let gltf = gltf::Gltf::from_slice(bytes).map_err(|e| load_failed(e.to_string()))?;
    let buffers = resolve_buffers(&gltf)?;

    let mut meshes = Vec::with_capacity(gltf.meshes().len());
    for mesh in gltf.meshes() {
        let mut merged = ModelMesh {
            name: mesh.name().map(str::to_string),
            ..Default::default()
        };

        for (primitive_index, primitive) in mesh.primitives().enumerate() {
            let fail = |reason: String| {
                load_failed(format!(
                    "mesh {} primitive {}: {}",
                    mesh.index(),
                    primitive_index,
                    reason
                ))
            };
            let Some(position_accessor) = primitive.get(&gltf::Semantic::Positions) else {
                continue;
            };
            check_accessor(&position_accessor, &buffers).map_err(&fail)?;

            let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
            let positions = reader
                .read_positions()
                .ok_or_else(|| fail("POSITION data could not be read".to_string()))?;

            let base = u32::try_from(merged.positions.len())
                .map_err(|_| fail("too many positions".to_string()))?;
            let count = position_accessor.count();
            merged.positions.extend(positions);

            if let Some(index_accessor) = primitive.indices() {
                check_accessor(&index_accessor, &buffers).map_err(&fail)?;
                let indices = reader
                    .read_indices()
                    .ok_or_else(|| fail("index data could not be read".to_string()))?;
                for index in indices.into_u32() {
                    if index as usize >= count {
                        return Err(fail(format!(
                            "index {} out of range for {} positions",
                            index, count
                        )));
                    }
                    let index = base
                        .checked_add(index)
                        .ok_or_else(|| fail("too many positions".to_string()))?;
                    merged.indices.push(index);
                }
            }
        }

        meshes.push(merged);
    }

    if meshes.iter().all(|m| m.positions.is_empty()) {
        return Err(load_failed("no mesh geometry".to_string()));
    }

    let nodes: Vec<SceneNode> = gltf
        .nodes()
        .map(|node| SceneNode {
            name: node.name().map(str::to_string),
            local_transform: Mat4::from_cols_array_2d(&node.transform().matrix()),
            mesh: node.mesh().map(|m| m.index()),
            children: node.children().map(|c| c.index()).collect(),
        })
        .collect();

    let scene = gltf.default_scene().or_else(|| gltf.scenes().next());
    let roots = match &scene {
        Some(scene) => scene.nodes().map(|n| n.index()).collect(),
        None => orphan_nodes(&nodes),
    };

    log::info!(
        "Loaded glTF scene: {} nodes, {} meshes, {} roots",
        nodes.len(),
        meshes.len(),
        roots.len()
    );

    Ok(SceneModel {
        inner: Arc::new(SceneModelData {
            name: scene.and_then(|s| s.name().map(str::to_string)),
            nodes,
            roots,
            meshes,
        }),
    })
}

/// Check that reading `accessor` stays inside its buffer view and buffer.
///
/// The `gltf` reader assumes both; an empty or overlong accessor panics there.
fn check_accessor(accessor: &gltf::Accessor, buffers: &[Vec<u8>]) -> Result<(), String> {
    let count = accessor.count();
    if count == 0 {
        return Err(format!("accessor {} is empty", accessor.index()));
    }
    let Some(view) = accessor.view() else {
        return Err(format!("accessor {} has no buffer view", accessor.index()));
    };

    let buffer_len = buffers.get(view.buffer().index()).map_or(0, Vec::len);
    let view_end = view.offset().checked_add(view.length());
    if view_end.map_or(true, |end| end > buffer_len) {
        return Err(format!(
            "buffer view {} runs past the end of buffer {} ({} bytes)",
            view.index(),
            view.buffer().index(),
            buffer_len
        ));
    }

    let element = accessor.size();
    let stride = view.stride().unwrap_or(element);
    let needed = stride
        .checked_mul(count - 1)
        .and_then(|n| n.checked_add(accessor.offset()))
        .and_then(|n| n.checked_add(element));
    if needed.map_or(true, |n| n > view.length()) {
        return Err(format!(
            "accessor {} reads past the end of buffer view {}",
            accessor.index(),
            view.index()
        ));
    }
    Ok(())
}

fn load_failed(cause: String) -> ParseError {
    ParseError::AssetLoadFailed {
        format: FORMAT,
        cause,
    }
}

/// Nodes that no other node lists as a child.
fn orphan_nodes(nodes: &[SceneNode]) -> Vec<usize> {
    let mut is_child = vec![false; nodes.len()];
    for node in nodes {
        for &child in &node.children {
            if let Some(flag) = is_child.get_mut(child) {
                *flag = true;
            }
        }
    }
    (0..nodes.len()).filter(|&i| !is_child[i]).collect()
}

fn resolve_buffers(gltf: &gltf::Gltf) -> Result<Vec<Vec<u8>>, ParseError> {
    let mut buffers = Vec::new();

    for buffer in gltf.buffers() {
        let data = match buffer.source() {
            gltf::buffer::Source::Bin => gltf
                .blob
                .clone()
                .ok_or_else(|| load_failed("GLB file missing binary chunk".to_string()))?,
            gltf::buffer::Source::Uri(uri) => decode_data_uri(uri)?,
        };

        if data.len() < buffer.length() {
            return Err(load_failed(format!(
                "buffer {} holds {} bytes, declared {}",
                buffer.index(),
                data.len(),
                buffer.length()
            )));
        }
        buffers.push(data);
    }

    Ok(buffers)
}

fn decode_data_uri(uri: &str) -> Result<Vec<u8>, ParseError> {
    let Some(rest) = uri.strip_prefix("data:") else {
        return Err(load_failed(format!(
            "external buffer '{}' cannot be resolved without a file system",
            uri
        )));
    };
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| load_failed("invalid data URI".to_string()))?;
    if !header.ends_with(";base64") {
        return Err(load_failed("data URI is not base64 encoded".to_string()));
    }

    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| load_failed(format!("invalid base64 buffer: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A single triangle, translated by `(0, 1, 0)` through its node.
    fn triangle_gltf() -> String {
        let positions: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0];
        let bytes: &[u8] = bytemuck::cast_slice(&positions);
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);

        format!(
            r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [{{ "name": "bowl", "nodes": [0] }}],
  "nodes": [{{ "name": "root", "translation": [0.0, 1.0, 0.0], "mesh": 0 }}],
  "meshes": [{{ "name": "tri", "primitives": [{{ "attributes": {{ "POSITION": 0 }} }}] }}],
  "buffers": [{{ "byteLength": 36, "uri": "data:application/octet-stream;base64,{}" }}],
  "bufferViews": [{{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }}],
  "accessors": [{{
    "bufferView": 0,
    "componentType": 5126,
    "count": 3,
    "type": "VEC3",
    "min": [0.0, 0.0, 0.0],
    "max": [1.0, 0.0, 1.0]
  }}]
}}"#,
            encoded
        )
    }

    #[test]
    fn test_load_embedded_triangle() {
        let model = load_scene(triangle_gltf().as_bytes()).unwrap();
        assert_eq!(model.name(), Some("bowl"));
        assert_eq!(model.meshes().len(), 1);
        assert_eq!(model.position_count(), 3);
        assert_eq!(model.roots(), &[0]);

        let world = model.world_positions();
        assert_eq!(world.vertex_count(), 3);
        assert_eq!(world.point(1), Some(Vec3::new(1.0, 1.0, 0.0)));
        assert_eq!(model.bounds().min, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_garbage_is_asset_load_failure() {
        let err = load_scene(b"definitely not a glb").unwrap_err();
        assert!(matches!(err, ParseError::AssetLoadFailed { .. }));
    }

    #[test]
    fn test_external_buffer_is_rejected() {
        let doc = triangle_gltf().replace(
            "data:application/octet-stream;base64,",
            "triangle.bin?",
        );
        let err = load_scene(doc.as_bytes()).unwrap_err();
        match err {
            ParseError::AssetLoadFailed { cause, .. } => assert!(cause.contains("external buffer")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_orphan_nodes_become_roots() {
        let nodes = vec![
            SceneNode {
                name: None,
                local_transform: Mat4::IDENTITY,
                mesh: None,
                children: vec![2],
            },
            SceneNode {
                name: None,
                local_transform: Mat4::IDENTITY,
                mesh: None,
                children: vec![],
            },
            SceneNode {
                name: None,
                local_transform: Mat4::IDENTITY,
                mesh: None,
                children: vec![],
            },
        ];
        assert_eq!(orphan_nodes(&nodes), vec![0, 1]);
    }

    fn edited(edit: impl FnOnce(&mut serde_json::Value)) -> Vec<u8> {
        let mut doc: serde_json::Value = serde_json::from_str(&triangle_gltf()).unwrap();
        edit(&mut doc);
        serde_json::to_vec(&doc).unwrap()
    }

    fn load_cause(bytes: &[u8]) -> String {
        match load_scene(bytes) {
            Err(ParseError::AssetLoadFailed { cause, .. }) => cause,
            other => panic!("expected AssetLoadFailed, got {:?}", other.map(|m| m.position_count())),
        }
    }

    #[test]
    fn test_empty_accessor_is_rejected() {
        let doc = edited(|doc| doc["accessors"][0]["count"] = 0.into());
        load_cause(&doc);
    }

    #[test]
    fn test_view_longer_than_buffer_is_rejected() {
        let doc = edited(|doc| doc["bufferViews"][0]["byteLength"] = 3600.into());
        let cause = load_cause(&doc);
        assert!(cause.contains("past the end of buffer"), "{}", cause);
        assert!(!cause.contains("no mesh geometry"), "{}", cause);
    }

    #[test]
    fn test_unreadable_primitive_fails_the_whole_scene() {
        let doc = edited(|doc| {
            let mut overlong = doc["accessors"][0].clone();
            overlong["count"] = 100.into();
            doc["accessors"].as_array_mut().unwrap().push(overlong);
            doc["meshes"][0]["primitives"]
                .as_array_mut()
                .unwrap()
                .push(serde_json::json!({ "attributes": { "POSITION": 1 } }));
        });
        let cause = load_cause(&doc);
        assert!(cause.starts_with("mesh 0 primitive 1"), "{}", cause);
        assert!(cause.contains("accessor 1 reads past the end"), "{}", cause);
    }

    #[test]
    fn test_index_out_of_range_is_rejected() {
        let indices: [u16; 4] = [0, 1, 7, 0];
        let encoded =
            base64::engine::general_purpose::STANDARD.encode(bytemuck::cast_slice::<u16, u8>(&indices));
        let doc = edited(|doc| {
            doc["buffers"]
                .as_array_mut()
                .unwrap()
                .push(serde_json::json!({
                    "byteLength": 8,
                    "uri": format!("data:application/octet-stream;base64,{}", encoded)
                }));
            doc["bufferViews"]
                .as_array_mut()
                .unwrap()
                .push(serde_json::json!({ "buffer": 1, "byteLength": 6 }));
            doc["accessors"]
                .as_array_mut()
                .unwrap()
                .push(serde_json::json!({
                    "bufferView": 1,
                    "componentType": 5123,
                    "count": 3,
                    "type": "SCALAR"
                }));
            doc["meshes"][0]["primitives"][0]["indices"] = 2.into();
        });
        let cause = load_cause(&doc);
        assert!(cause.contains("index 7 out of range"), "{}", cause);
    }
}
