use crate::caps::GlProfile;

/// Initialization parameters for an [`Rlgl`](crate::Rlgl) context.
///
/// Capacities are fixed at init; the CPU-side arrays are allocated once and
/// never grow.
#[derive(Debug, Clone)]
pub struct RlglConfig {
    /// Line segments per batch (2 vertices each).
    pub max_lines_batch: usize,

    /// Triangles per batch (3 vertices each).
    pub max_triangles_batch: usize,

    /// Quads per batch (4 vertices, 6 indices each).
    pub max_quads_batch: usize,

    /// Matrix stack depth shared by projection and modelview.
    pub matrix_stack_size: usize,

    /// Vertices that can be held between a modelview push and the transform
    /// that flushes them.
    pub temp_vertex_buffer_size: usize,

    /// Depth added after every `end()` so later 2D primitives win the depth
    /// test against earlier ones.
    pub depth_step: f32,

    /// Depth value restored after each flush.
    pub initial_depth: f32,

    /// Size of the light pool used by the standard shader.
    pub max_lights: usize,

    /// Forces a backend strategy instead of the probed one.
    pub profile_override: Option<GlProfile>,

    /// Near/far planes for stereo projections.
    pub cull_distance_near: f64,
    pub cull_distance_far: f64,
}

impl Default for RlglConfig {
    fn default() -> Self {
        Self {
            max_lines_batch: 8192,
            max_triangles_batch: 4096,
            max_quads_batch: 8192,
            matrix_stack_size: 16,
            temp_vertex_buffer_size: 1024,
            depth_step: 1.0 / 20000.0,
            initial_depth: -1.0,
            max_lights: 8,
            profile_override: None,
            cull_distance_near: 0.01,
            cull_distance_far: 1000.0,
        }
    }
}
