//! Shared value types read by the renderer each frame.
//!
//! # Invariants
//! - Types here are plain data. Scene containers own them; rendering code
//!   only reads them.

mod environment;
mod light;
mod types;

pub use environment::{DAY_LENGTH_SECONDS, TimeOfDay, Weather};
pub use light::{Light, LightKind};
pub use types::{MaterialHandle, MeshHandle, ObjectId, Renderable, Transform};

pub fn crate_info() -> &'static str {
    "wonderlands-common v0.1.0"
}
