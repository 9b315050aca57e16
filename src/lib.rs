//! Concurrent multi-asset scene loading and saving pipeline.
//!
//! A scene is described by a JSON document referencing external mesh and
//! texture files. Loading and saving fan the per-resource work out across a
//! bounded worker pool; a single failing resource aborts the whole batch and
//! its message is the one reported.

pub mod parallel;
mod paths;
pub mod scene;
pub mod scene_io;
pub mod shape_io;
pub mod texture_io;

pub use parallel::{parallel_for, parallel_foreach};
pub use scene::{
    CameraData, InstanceData, LineEnd, MaterialData, MaterialType, SceneBounds, SceneData,
    ShapeData, TextureData, add_missing_camera, add_missing_caps, add_missing_material,
    add_missing_radius, compute_bounds, trim_memory,
};
pub use scene_io::{load_scene, make_scene_directories, save_scene};
pub use shape_io::{load_shape, save_shape};
pub use texture_io::{load_texture, save_texture};

/// Boxed error carrying a human-readable message. `Send + Sync` so failures
/// can cross distributor workers.
pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
