//! CPU-side batching: per-primitive dynamic buffers, the draw-call list and
//! the temp-vertex routing state used under a modelview push.

mod buffer;
mod draw_call;
mod routing;

pub use buffer::{quad_indices, DynamicBuffer, MAX_SHORT_INDEX_QUADS};
pub use draw_call::{DrawCall, DrawCallTracker};
pub use routing::VertexRouting;

/// Primitive kind selected by `begin()`. Each kind owns one buffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum DrawMode {
    Lines,
    Triangles,
    Quads,
}

impl DrawMode {
    #[inline]
    pub const fn vertices_per_primitive(self) -> usize {
        match self {
            DrawMode::Lines => 2,
            DrawMode::Triangles => 3,
            DrawMode::Quads => 4,
        }
    }
}

/// Counters since the context was created.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct BatchStats {
    /// Vertices rejected because a buffer was full.
    pub dropped_vertices: usize,
    /// Completed `draw()` calls.
    pub flushes: usize,
    /// Draws issued by the last flush (all eyes).
    pub last_flush_draws: usize,
}
