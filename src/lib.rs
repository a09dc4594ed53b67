pub mod asset;
pub mod camera;
pub mod error;
pub mod format;
pub mod loader;
pub mod picking;
pub mod resource_manager;
pub mod scene_graph;
pub mod settings;
pub mod visualiser;

// Format decoders
pub mod json_cloud;
pub mod ply;
pub mod scene_model;
pub mod xyz;

// Steam simulation
pub mod particle;
pub mod particle_eval;

pub use asset::{ParsedAsset, VertexBuffer};
pub use error::{ParseError, SessionError};
pub use format::{parse, AssetFormat};
pub use settings::{SessionConfig, VisualSettings};
pub use visualiser::{FrameOutput, VisualiserState};

#[cfg(not(target_arch = "wasm32"))]
pub mod cli;

#[cfg(target_arch = "wasm32")]
pub mod wasm;
