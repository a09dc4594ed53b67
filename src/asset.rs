//! Decoded asset types.
//!
//! A load produces exactly one [`ParsedAsset`]: either a flat point cloud
//! ([`VertexBuffer`]) or a hierarchical [`SceneModel`]. Consumers branch on the
//! variant; the two are never populated together.

use glam::Vec3;
use serde::Serialize;

use crate::format::AssetFormat;
use crate::scene_model::SceneModel;

/// Axis-aligned bounding box for a set of points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BoundingBox {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl BoundingBox {
    /// Compute the bounding box of a point sequence. Empty input yields the zero box.
    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = [f32; 3]>,
    {
        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];
        let mut any = false;

        for p in points {
            any = true;
            for i in 0..3 {
                min[i] = min[i].min(p[i]);
                max[i] = max[i].max(p[i]);
            }
        }

        if !any {
            return Self::default();
        }
        Self { min, max }
    }

    /// Get the center of the bounding box.
    pub fn center(&self) -> [f32; 3] {
        [
            (self.min[0] + self.max[0]) / 2.0,
            (self.min[1] + self.max[1]) / 2.0,
            (self.min[2] + self.max[2]) / 2.0,
        ]
    }

    /// Get the dimensions of the bounding box.
    pub fn size(&self) -> [f32; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }
}

/// Flat, index-addressable sequence of `x, y, z` coordinates.
///
/// The length is always a multiple of 3; decoders never construct a buffer
/// that violates this.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VertexBuffer {
    data: Vec<f32>,
}

impl VertexBuffer {
    /// Wrap a flat coordinate vector.
    ///
    /// Returns `None` if the length is not a multiple of 3.
    pub fn from_flat(data: Vec<f32>) -> Option<Self> {
        if data.len() % 3 != 0 {
            return None;
        }
        Some(Self { data })
    }

    /// Build from explicit points.
    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = [f32; 3]>,
    {
        let data = points.into_iter().flatten().collect();
        Self { data }
    }

    pub(crate) fn with_capacity(vertex_count: usize) -> Self {
        Self {
            data: Vec::with_capacity(vertex_count * 3),
        }
    }

    pub(crate) fn push(&mut self, point: [f32; 3]) {
        self.data.extend_from_slice(&point);
    }

    pub fn vertex_count(&self) -> usize {
        self.data.len() / 3
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Raw bytes for upload into a GPU vertex buffer.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    /// Iterate the buffer as points.
    pub fn points(&self) -> impl Iterator<Item = [f32; 3]> + '_ {
        self.data.chunks_exact(3).map(|c| [c[0], c[1], c[2]])
    }

    /// Get a single point by vertex index.
    pub fn point(&self, index: usize) -> Option<Vec3> {
        let start = index.checked_mul(3)?;
        let end = start.checked_add(3)?;
        self.data
            .get(start..end)
            .map(|c| Vec3::new(c[0], c[1], c[2]))
    }

    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::from_points(self.points())
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.data
    }
}

/// Result of a successful load.
#[derive(Debug, Clone)]
pub enum ParsedAsset {
    /// Points decoded from PLY, XYZ or JSON.
    PointCloud {
        format: AssetFormat,
        vertices: VertexBuffer,
    },
    /// A hierarchical scene from a glTF/GLB file.
    Model(SceneModel),
}

impl ParsedAsset {
    /// Which decoder produced this asset.
    pub fn format(&self) -> AssetFormat {
        match self {
            ParsedAsset::PointCloud { format, .. } => *format,
            ParsedAsset::Model(model) => model.format(),
        }
    }

    /// Short label for logs and host UIs.
    pub fn kind(&self) -> &'static str {
        match self {
            ParsedAsset::PointCloud { .. } => "pointCloud",
            ParsedAsset::Model(_) => "model",
        }
    }

    /// Number of points (cloud) or mesh positions (model).
    pub fn vertex_count(&self) -> usize {
        match self {
            ParsedAsset::PointCloud { vertices, .. } => vertices.vertex_count(),
            ParsedAsset::Model(model) => model.position_count(),
        }
    }

    pub fn as_point_cloud(&self) -> Option<&VertexBuffer> {
        match self {
            ParsedAsset::PointCloud { vertices, .. } => Some(vertices),
            ParsedAsset::Model(_) => None,
        }
    }

    pub fn as_model(&self) -> Option<&SceneModel> {
        match self {
            ParsedAsset::PointCloud { .. } => None,
            ParsedAsset::Model(model) => Some(model),
        }
    }

    pub fn bounds(&self) -> BoundingBox {
        match self {
            ParsedAsset::PointCloud { vertices, .. } => vertices.bounds(),
            ParsedAsset::Model(model) => model.bounds(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_flat_rejects_partial_points() {
        assert!(VertexBuffer::from_flat(vec![1.0, 2.0]).is_none());
        let buffer = VertexBuffer::from_flat(vec![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(buffer.vertex_count(), 1);
    }

    #[test]
    fn test_point_out_of_range() {
        let buffer = VertexBuffer::from_points([[1.0, 2.0, 3.0]]);
        assert_eq!(buffer.point(0), Some(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(buffer.point(1), None);
        assert_eq!(buffer.point(usize::MAX / 2), None);
        assert_eq!(buffer.point(usize::MAX), None);
    }

    #[test]
    fn test_bounds() {
        let buffer = VertexBuffer::from_points([[-1.0, 0.0, 2.0], [3.0, 4.0, -2.0]]);
        let bounds = buffer.bounds();
        assert_eq!(bounds.min, [-1.0, 0.0, -2.0]);
        assert_eq!(bounds.max, [3.0, 4.0, 2.0]);
        assert_eq!(bounds.center(), [1.0, 2.0, 0.0]);
        assert_eq!(bounds.size(), [4.0, 4.0, 4.0]);
    }

    #[test]
    fn test_empty_bounds_is_zero() {
        assert_eq!(VertexBuffer::default().bounds(), BoundingBox::default());
    }

    #[test]
    fn test_bytes_cover_every_coordinate() {
        let buffer = VertexBuffer::from_points([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        assert_eq!(buffer.as_bytes().len(), 6 * std::mem::size_of::<f32>());
        assert_eq!(buffer.point(1), Some(Vec3::new(4.0, 5.0, 6.0)));
        assert_eq!(buffer.point(2), None);
    }
}
