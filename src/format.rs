//! Format detection and decoder dispatch.
//!
//! The filename hint's extension selects the decoder. Point cloud formats
//! (PLY, XYZ, JSON) produce [`ParsedAsset::PointCloud`]; glTF/GLB produces
//! [`ParsedAsset::Model`].

use std::fmt;
use std::path::Path;

use crate::asset::ParsedAsset;
use crate::error::ParseError;
use crate::{json_cloud, ply, scene_model, xyz};

/// Supported input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetFormat {
    /// Stanford PLY, ASCII encoding, vertex element only.
    Ply,
    /// Whitespace-delimited `x y z` rows.
    Xyz,
    /// `{"vertices": [...]}` or `{"points": [[x, y, z], ...]}`.
    Json,
    /// glTF 2.0, either `.gltf` JSON with embedded buffers or `.glb` binary.
    Gltf,
}

impl AssetFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "ply" => Some(Self::Ply),
            "xyz" => Some(Self::Xyz),
            "json" => Some(Self::Json),
            "glb" | "gltf" => Some(Self::Gltf),
            _ => None,
        }
    }

    /// Detect the format from a filename hint such as `"scan.PLY"`.
    pub fn from_filename(filename: &str) -> Result<Self, ParseError> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");

        Self::from_extension(extension).ok_or_else(|| ParseError::UnsupportedFormat {
            extension: extension.to_string(),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Ply => "PLY",
            Self::Xyz => "XYZ",
            Self::Json => "JSON",
            Self::Gltf => "glTF",
        }
    }

    /// Whether this format decodes to a flat point cloud.
    pub fn is_point_cloud(&self) -> bool {
        !matches!(self, Self::Gltf)
    }
}

impl fmt::Display for AssetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decode `bytes` using the decoder selected by `filename_hint`.
pub fn parse(bytes: &[u8], filename_hint: &str) -> Result<ParsedAsset, ParseError> {
    let format = AssetFormat::from_filename(filename_hint)?;

    let asset = match format {
        AssetFormat::Ply => ParsedAsset::PointCloud {
            format,
            vertices: ply::parse_ply(bytes)?,
        },
        AssetFormat::Xyz => ParsedAsset::PointCloud {
            format,
            vertices: xyz::parse_xyz(bytes)?,
        },
        AssetFormat::Json => ParsedAsset::PointCloud {
            format,
            vertices: json_cloud::parse_json_cloud(bytes)?,
        },
        AssetFormat::Gltf => ParsedAsset::Model(scene_model::load_scene(bytes)?),
    };

    log::debug!(
        "Decoded '{}' as {} ({} vertices)",
        filename_hint,
        format,
        asset.vertex_count()
    );
    Ok(asset)
}

/// Decode text-based formats from a `&[u8]`, reporting bad encodings as header errors.
pub(crate) fn decode_text(bytes: &[u8], format: AssetFormat) -> Result<&str, ParseError> {
    std::str::from_utf8(bytes).map_err(|e| ParseError::InvalidHeader {
        format,
        reason: format!("not valid UTF-8 text ({})", e),
    })
}

/// Read the first three whitespace-separated fields of a row as a finite point.
///
/// Fields beyond the third (colors, normals) are ignored.
pub(crate) fn parse_point_row(row: &str) -> Result<[f32; 3], String> {
    let fields: Vec<&str> = row.split_whitespace().take(3).collect();
    if fields.len() < 3 {
        return Err(format!("expected at least 3 fields, found {}", fields.len()));
    }

    let mut point = [0.0f32; 3];
    for (slot, field) in point.iter_mut().zip(&fields) {
        let value: f32 = field
            .parse()
            .map_err(|_| format!("'{}' is not a number", field))?;
        if !value.is_finite() {
            return Err(format!("'{}' is not a finite number", field));
        }
        *slot = value;
    }
    Ok(point)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_row_ignores_extra_fields() {
        assert_eq!(parse_point_row("1 2.5 -3 255 0 0"), Ok([1.0, 2.5, -3.0]));
        assert_eq!(parse_point_row("1e2\t0\t0"), Ok([100.0, 0.0, 0.0]));
    }

    #[test]
    fn test_point_row_errors() {
        assert!(parse_point_row("1 2").unwrap_err().contains("found 2"));
        assert!(parse_point_row("1 x 3").unwrap_err().contains("'x'"));
        assert!(parse_point_row("1 NaN 3").unwrap_err().contains("finite"));
    }

    #[test]
    fn test_extension_is_case_insensitive() {
        assert_eq!(AssetFormat::from_filename("scan.PLY"), Ok(AssetFormat::Ply));
        assert_eq!(AssetFormat::from_filename("bowl.Glb"), Ok(AssetFormat::Gltf));
        assert_eq!(AssetFormat::from_filename("a.b.xyz"), Ok(AssetFormat::Xyz));
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let err = AssetFormat::from_filename("mesh.obj").unwrap_err();
        assert_eq!(
            err,
            ParseError::UnsupportedFormat {
                extension: "obj".to_string()
            }
        );

        let err = parse(b"ply", "no_extension").unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_dispatch_to_point_cloud() {
        let asset = parse(b"0 0 0\n1 1 1", "cloud.xyz").unwrap();
        assert_eq!(asset.format(), AssetFormat::Xyz);
        assert_eq!(asset.kind(), "pointCloud");
        assert_eq!(asset.vertex_count(), 2);
    }

    #[test]
    fn test_invalid_utf8_is_a_header_error() {
        let err = parse(&[0xff, 0xfe, 0x00], "cloud.ply").unwrap_err();
        assert!(matches!(
            err,
            ParseError::InvalidHeader {
                format: AssetFormat::Ply,
                ..
            }
        ));
    }
}
