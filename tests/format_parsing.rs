//! Decoder behaviour through the public `parse` entry point.
//!
//! Run with: cargo test --test format_parsing

use steamview::asset::VertexBuffer;
use steamview::ply::write_ply;
use steamview::{parse, AssetFormat, ParseError, ParsedAsset};

fn cloud(bytes: &[u8], name: &str) -> Vec<f32> {
    match parse(bytes, name) {
        Ok(ParsedAsset::PointCloud { vertices, .. }) => vertices.into_inner(),
        other => panic!("expected point cloud for {}, got {:?}", name, other),
    }
}

/// Minimal GLB container: one triangle in the BIN chunk, one node.
fn triangle_glb() -> Vec<u8> {
    let positions: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 2.0, 0.0];
    let bin: &[u8] = bytemuck::cast_slice(&positions);

    let mut json = String::from(
        r#"{"asset":{"version":"2.0"},"scene":0,"scenes":[{"nodes":[0]}],"nodes":[{"name":"kettle","mesh":0,"scale":[2.0,2.0,2.0]}],"meshes":[{"primitives":[{"attributes":{"POSITION":0}}]}],"buffers":[{"byteLength":36}],"bufferViews":[{"buffer":0,"byteLength":36}],"accessors":[{"bufferView":0,"componentType":5126,"count":3,"type":"VEC3","min":[0,0,0],"max":[1,2,0]}]}"#,
    );
    while json.len() % 4 != 0 {
        json.push(' ');
    }

    let total = 12 + 8 + json.len() + 8 + bin.len();
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(b"glTF");
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(b"JSON");
    out.extend_from_slice(json.as_bytes());
    out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    out.extend_from_slice(b"BIN\0");
    out.extend_from_slice(bin);
    out
}

#[test]
fn test_ply_reads_declared_rows() {
    let ply = "ply\nformat ascii 1.0\ncomment scanned kettle\nelement vertex 3\nproperty float x\nproperty float y\nproperty float z\nend_header\n0 0 0\n1 2 3\n4 5 6\n7 8 9\n";
    assert_eq!(
        cloud(ply.as_bytes(), "kettle.PLY"),
        vec![0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0]
    );
}

#[test]
fn test_ply_round_trip() {
    let original = VertexBuffer::from_points([
        [0.5, -1.25, 3.0],
        [1e-3, 42.0, -0.1],
        [7.0, 8.0, 9.5],
    ]);
    let text = write_ply(&original);
    assert_eq!(cloud(text.as_bytes(), "again.ply"), original.into_inner());
}

#[test]
fn test_ply_without_terminator() {
    let inputs = [
        "ply\nformat ascii 1.0\nelement vertex 2\n0 0 0\n1 1 1\n",
        "ply\nformat ascii 1.0\nelement vertex -4\n",
        "ply\n",
    ];
    for input in inputs {
        assert_eq!(
            parse(input.as_bytes(), "x.ply").unwrap_err(),
            ParseError::MissingHeaderTerminator {
                format: AssetFormat::Ply
            },
            "{:?}",
            input
        );
    }
}

#[test]
fn test_ply_truncated() {
    let ply = "ply\nformat ascii 1.0\nelement vertex 3\nend_header\n0 0 0\n";
    assert!(matches!(
        parse(ply.as_bytes(), "x.ply"),
        Err(ParseError::TruncatedData {
            expected: 3,
            found: 1,
            ..
        })
    ));
}

#[test]
fn test_json_shapes() {
    assert_eq!(
        cloud(br#"{"points": [[1,2,3],[4,5,6]]}"#, "a.json"),
        vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]
    );
    assert_eq!(cloud(br#"{"vertices": [1,2,3]}"#, "a.json"), vec![1.0, 2.0, 3.0]);
    assert!(matches!(
        parse(br#"{"vertices": [1,2]}"#, "a.json"),
        Err(ParseError::MalformedVertexArray { .. })
    ));
    assert!(matches!(
        parse(br#"[1, 2, 3]"#, "a.json"),
        Err(ParseError::InvalidJsonShape { .. })
    ));
}

#[test]
fn test_xyz_rows() {
    assert_eq!(
        cloud(b"0 0 0\n1 1 1", "scan.xyz"),
        vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0]
    );
    assert!(matches!(
        parse(b"0 0 0\n1 x 1\n", "scan.xyz"),
        Err(ParseError::InvalidVertexData { line: 2, .. })
    ));
}

#[test]
fn test_unknown_extension() {
    assert_eq!(
        parse(b"v 0 0 0", "mesh.obj").unwrap_err(),
        ParseError::UnsupportedFormat {
            extension: "obj".to_string()
        }
    );
    assert!(matches!(
        parse(b"0 0 0", "noextension"),
        Err(ParseError::UnsupportedFormat { .. })
    ));
}

#[test]
fn test_glb_binary_chunk() {
    let asset = parse(&triangle_glb(), "kettle.glb").unwrap();
    let model = asset.as_model().expect("glb decodes to a model");
    assert_eq!(asset.format(), AssetFormat::Gltf);
    assert_eq!(model.nodes()[0].name.as_deref(), Some("kettle"));
    assert_eq!(model.position_count(), 3);

    // Node scale applies when flattening to world space
    let world = model.world_positions();
    assert_eq!(world.as_slice()[7], 4.0);
    assert_eq!(asset.bounds().max, [2.0, 4.0, 0.0]);
}

#[test]
fn test_glb_garbage_fails() {
    assert!(matches!(
        parse(b"glTF\x02\x00\x00\x00garbage", "broken.glb"),
        Err(ParseError::AssetLoadFailed { .. })
    ));
}
