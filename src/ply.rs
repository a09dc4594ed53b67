//! ASCII PLY point cloud decoding.
//!
//! Only the vertex element is read, and only its first three properties are
//! used as `x y z`. Faces and per-vertex attributes are ignored.

use std::fmt::Write;

use crate::asset::VertexBuffer;
use crate::error::ParseError;
use crate::format::{decode_text, parse_point_row, AssetFormat};

const FORMAT: AssetFormat = AssetFormat::Ply;

/// Decode an ASCII PLY file into a vertex buffer of exactly `3 * vertex_count` floats.
pub fn parse_ply(bytes: &[u8]) -> Result<VertexBuffer, ParseError> {
    let text = decode_text(bytes, FORMAT)?;

    // (1-based source line, trimmed content), blank lines dropped
    let lines: Vec<(usize, &str)> = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
        .collect();

    match lines.first() {
        Some((_, "ply")) => {}
        Some((_, other)) => {
            return Err(ParseError::InvalidHeader {
                format: FORMAT,
                reason: format!("expected 'ply' on the first line, found '{}'", other),
            })
        }
        None => {
            return Err(ParseError::InvalidHeader {
                format: FORMAT,
                reason: "file is empty".to_string(),
            })
        }
    }

    let header = scan_header(&lines)?;
    let vertex_count = header.vertex_count?;

    let rows = &lines[header.data_start..];
    if rows.len() < vertex_count {
        return Err(ParseError::TruncatedData {
            format: FORMAT,
            expected: vertex_count,
            found: rows.len(),
        });
    }

    let mut vertices = VertexBuffer::with_capacity(vertex_count);
    for &(line, row) in &rows[..vertex_count] {
        let point = parse_point_row(row).map_err(|reason| ParseError::InvalidVertexData {
            format: FORMAT,
            line,
            reason,
        })?;
        vertices.push(point);
    }

    Ok(vertices)
}

/// What the header scan found.
struct PlyHeader {
    /// Deferred so a missing terminator is reported ahead of a bad count.
    vertex_count: Result<usize, ParseError>,
    /// Index into the filtered line list of the first data row.
    data_start: usize,
}

fn scan_header(lines: &[(usize, &str)]) -> Result<PlyHeader, ParseError> {
    let mut vertex_count = None;
    let mut encoding = None;

    for (idx, &(_, line)) in lines.iter().enumerate().skip(1) {
        if line == "end_header" {
            if let Some(encoding) = encoding.filter(|e| *e != "ascii") {
                return Err(ParseError::InvalidHeader {
                    format: FORMAT,
                    reason: format!("'{}' encoding is not supported, only ascii", encoding),
                });
            }

            return Ok(PlyHeader {
                vertex_count: vertex_count.unwrap_or_else(|| {
                    Err(ParseError::InvalidVertexCount {
                        format: FORMAT,
                        reason: "no 'element vertex' declaration".to_string(),
                    })
                }),
                data_start: idx + 1,
            });
        }

        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("format") => encoding = tokens.next(),
            Some("element") if vertex_count.is_none() => {
                if tokens.next() == Some("vertex") {
                    vertex_count = Some(parse_vertex_count(tokens.next()));
                }
            }
            _ => {}
        }
    }

    Err(ParseError::MissingHeaderTerminator { format: FORMAT })
}

fn parse_vertex_count(token: Option<&str>) -> Result<usize, ParseError> {
    let invalid = |reason: String| ParseError::InvalidVertexCount {
        format: FORMAT,
        reason,
    };

    let token = token.ok_or_else(|| invalid("count is missing".to_string()))?;
    let count: i64 = token
        .parse()
        .map_err(|_| invalid(format!("'{}' is not an integer", token)))?;
    if count <= 0 {
        return Err(invalid(format!("count must be positive, got {}", count)));
    }
    usize::try_from(count).map_err(|_| invalid(format!("count {} is too large", count)))
}

/// Serialize a vertex buffer as an ASCII PLY document that [`parse_ply`] reads back.
pub fn write_ply(vertices: &VertexBuffer) -> String {
    let mut out = String::new();
    out.push_str("ply\n");
    out.push_str("format ascii 1.0\n");
    let _ = writeln!(out, "element vertex {}", vertices.vertex_count());
    out.push_str("property float x\n");
    out.push_str("property float y\n");
    out.push_str("property float z\n");
    out.push_str("end_header\n");
    for [x, y, z] in vertices.points() {
        // `{}` on f32 prints the shortest representation that parses back exactly
        let _ = writeln!(out, "{} {} {}", x, y, z);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "ply\nformat ascii 1.0\nelement vertex 2\nproperty float x\nproperty float y\nproperty float z\nend_header\n";

    #[test]
    fn test_parse_basic() {
        let input = format!("{}0 0 0\n1.5 -2 3\n", HEADER);
        let vertices = parse_ply(input.as_bytes()).unwrap();
        assert_eq!(vertices.as_slice(), &[0.0, 0.0, 0.0, 1.5, -2.0, 3.0]);
    }

    #[test]
    fn test_extra_columns_and_trailing_rows_are_ignored() {
        let input = format!("{}0 0 0 255 0 0\n1 1 1 0 255 0\n9 9 9\n3 4 5\n", HEADER);
        let vertices = parse_ply(input.as_bytes()).unwrap();
        assert_eq!(vertices.len(), 6);
        assert_eq!(vertices.as_slice(), &[0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_blank_lines_and_crlf_are_tolerated() {
        let input = "ply\r\n\r\nformat ascii 1.0\r\nelement vertex 1\r\nend_header\r\n\r\n  4 5 6  \r\n";
        let vertices = parse_ply(input.as_bytes()).unwrap();
        assert_eq!(vertices.as_slice(), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_comments_do_not_confuse_header_scan() {
        let input = "ply\ncomment element vertex 99\nelement vertex 1\nend_header\n1 2 3\n";
        let vertices = parse_ply(input.as_bytes()).unwrap();
        assert_eq!(vertices.vertex_count(), 1);
    }

    #[test]
    fn test_magic_must_be_first() {
        let err = parse_ply(b"format ascii 1.0\nply\n").unwrap_err();
        assert!(matches!(err, ParseError::InvalidHeader { .. }));

        let err = parse_ply(b"   \n\n").unwrap_err();
        assert!(matches!(err, ParseError::InvalidHeader { .. }));
    }

    #[test]
    fn test_vertex_count_validation() {
        for header in [
            "ply\nend_header\n0 0 0\n",
            "ply\nelement vertex\nend_header\n0 0 0\n",
            "ply\nelement vertex abc\nend_header\n0 0 0\n",
            "ply\nelement vertex 0\nend_header\n0 0 0\n",
            "ply\nelement vertex -3\nend_header\n0 0 0\n",
        ] {
            let err = parse_ply(header.as_bytes()).unwrap_err();
            assert!(
                matches!(err, ParseError::InvalidVertexCount { .. }),
                "{:?} for {:?}",
                err,
                header
            );
        }
    }

    #[test]
    fn test_missing_terminator_wins_over_bad_count() {
        let err = parse_ply(b"ply\nelement vertex abc\n0 0 0\n").unwrap_err();
        assert_eq!(err, ParseError::MissingHeaderTerminator { format: FORMAT });

        let err = parse_ply(b"ply\nelement vertex 1\n0 0 0\n").unwrap_err();
        assert_eq!(err, ParseError::MissingHeaderTerminator { format: FORMAT });
    }

    #[test]
    fn test_truncated_data() {
        let input = format!("{}0 0 0\n", HEADER);
        let err = parse_ply(input.as_bytes()).unwrap_err();
        assert_eq!(
            err,
            ParseError::TruncatedData {
                format: FORMAT,
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn test_invalid_row_reports_source_line() {
        let input = format!("{}0 0 0\n1 oops 1\n", HEADER);
        let err = parse_ply(input.as_bytes()).unwrap_err();
        match err {
            ParseError::InvalidVertexData { line, .. } => assert_eq!(line, 9),
            other => panic!("unexpected error: {:?}", other),
        }

        let input = format!("{}0 0 0\n1 1\n", HEADER);
        let err = parse_ply(input.as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::InvalidVertexData { line: 9, .. }));
    }

    #[test]
    fn test_binary_encoding_rejected() {
        let input = "ply\nformat binary_little_endian 1.0\nelement vertex 1\nend_header\n";
        let err = parse_ply(input.as_bytes()).unwrap_err();
        match err {
            ParseError::InvalidHeader { reason, .. } => assert!(reason.contains("binary_little_endian")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_write_then_parse() {
        let original = VertexBuffer::from_points([[0.1, -2.75, 3.0e-4], [1234.5, 0.0, -0.333]]);
        let text = write_ply(&original);
        assert_eq!(parse_ply(text.as_bytes()).unwrap(), original);
    }
}
