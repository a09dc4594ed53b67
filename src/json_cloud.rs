//! JSON point cloud decoding.
//!
//! Two document shapes are accepted, checked in this order:
//! - `{"vertices": [x0, y0, z0, x1, y1, z1, ...]}` (flat)
//! - `{"points": [[x0, y0, z0], [x1, y1, z1], ...]}` (nested)

use serde_json::Value;

use crate::asset::VertexBuffer;
use crate::error::ParseError;
use crate::format::AssetFormat;

const FORMAT: AssetFormat = AssetFormat::Json;

/// Decode a JSON point cloud document.
pub fn parse_json_cloud(bytes: &[u8]) -> Result<VertexBuffer, ParseError> {
    let document: Value =
        serde_json::from_slice(bytes).map_err(|e| ParseError::InvalidJsonShape {
            format: FORMAT,
            reason: format!("not a JSON document ({})", e),
        })?;

    if let Some(Value::Array(flat)) = document.get("vertices") {
        return parse_flat(flat);
    }
    if let Some(Value::Array(points)) = document.get("points") {
        return parse_nested(points);
    }

    Err(ParseError::InvalidJsonShape {
        format: FORMAT,
        reason: "expected a 'vertices' array or a 'points' array".to_string(),
    })
}

fn malformed(reason: String) -> ParseError {
    ParseError::MalformedVertexArray {
        format: FORMAT,
        reason,
    }
}

fn finite_f32(value: &Value) -> Option<f32> {
    value
        .as_f64()
        .map(|v| v as f32)
        .filter(|v| v.is_finite())
}

fn parse_flat(flat: &[Value]) -> Result<VertexBuffer, ParseError> {
    if flat.len() % 3 != 0 {
        return Err(malformed(format!(
            "'vertices' has {} entries, not a multiple of 3",
            flat.len()
        )));
    }

    let data = flat
        .iter()
        .enumerate()
        .map(|(i, value)| {
            finite_f32(value)
                .ok_or_else(|| malformed(format!("'vertices[{}]' is not a finite number", i)))
        })
        .collect::<Result<Vec<f32>, ParseError>>()?;

    VertexBuffer::from_flat(data)
        .ok_or_else(|| malformed("'vertices' is not a sequence of triples".to_string()))
}

fn parse_nested(points: &[Value]) -> Result<VertexBuffer, ParseError> {
    let mut vertices = VertexBuffer::with_capacity(points.len());

    for (i, entry) in points.iter().enumerate() {
        let components = entry
            .as_array()
            .ok_or_else(|| malformed(format!("'points[{}]' is not an array", i)))?;
        if components.len() < 3 {
            return Err(malformed(format!(
                "'points[{}]' has {} components, expected 3",
                i,
                components.len()
            )));
        }

        let mut point = [0.0f32; 3];
        for (axis, slot) in point.iter_mut().enumerate() {
            *slot = finite_f32(&components[axis]).ok_or_else(|| {
                malformed(format!("'points[{}][{}]' is not a finite number", i, axis))
            })?;
        }
        vertices.push(point);
    }

    Ok(vertices)
}
