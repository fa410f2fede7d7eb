//! wgpu implementation of the render backend seam.
//!
//! Compiles one WGSL program per pipeline pass, owns the GPU textures the
//! resource registry asks for, and replays each recorded pass into a frame
//! command encoder.
//!
//! # Invariants
//! - Every draw captures its own uniform and texture bindings, so state set
//!   later in a pass never leaks into earlier draws.
//! - All bindings reset when a pass ends.
//! - Nothing is submitted until the frame ends.

mod backend;
mod mesh;
mod shaders;

pub use backend::{PassTraits, WgpuBackend, attachment_status, pass_traits, texture_format, texture_usages};
pub use mesh::{InstanceData, MeshData, Vertex, cube_mesh, plane_mesh};
pub use shaders::{shader_source, uses_mesh_input};

pub fn crate_info() -> &'static str {
    "wonderlands-render-wgpu v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("wgpu"));
    }
}
