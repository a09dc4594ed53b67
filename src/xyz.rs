//! XYZ point cloud decoding: one `x y z` row per line.

use crate::asset::VertexBuffer;
use crate::error::ParseError;
use crate::format::{decode_text, parse_point_row, AssetFormat};

const FORMAT: AssetFormat = AssetFormat::Xyz;

/// Decode whitespace-delimited rows into a vertex buffer.
///
/// Blank lines are skipped. A row that does not start with three finite
/// numbers fails with [`ParseError::InvalidVertexData`] rather than producing NaN.
pub fn parse_xyz(bytes: &[u8]) -> Result<VertexBuffer, ParseError> {
    let text = decode_text(bytes, FORMAT)?;

    // Line numbers count from the first line of the input text
    let mut vertices = VertexBuffer::default();
    for (idx, row) in text.lines().enumerate() {
        let row = row.trim();
        if row.is_empty() {
            continue;
        }
        let point = parse_point_row(row).map_err(|reason| ParseError::InvalidVertexData {
            format: FORMAT,
            line: idx + 1,
            reason,
        })?;
        vertices.push(point);
    }

    Ok(vertices)
}
