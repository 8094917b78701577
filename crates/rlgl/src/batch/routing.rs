use crate::math::Vec3;

/// Where `vertex()` sends positions.
///
/// A modelview push switches to `Buffering`: raw positions are held until
/// `end()` so the transforms issued after the push apply to the whole
/// primitive. `base_depth` is the stack index of the matrix saved by that
/// push; popping below it returns to `Direct`.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum VertexRouting {
    #[default]
    Direct,
    Buffering {
        base_depth: usize,
        vertices: Vec<Vec3>,
    },
}

impl VertexRouting {
    #[inline]
    pub fn is_buffering(&self) -> bool {
        matches!(self, VertexRouting::Buffering { .. })
    }

    /// Takes the held vertices; a buffering state stays buffering.
    pub fn drain(&mut self) -> Vec<Vec3> {
        match self {
            VertexRouting::Direct => Vec::new(),
            VertexRouting::Buffering { vertices, .. } => std::mem::take(vertices),
        }
    }

    /// Stack index of the matrix saved by the push that started buffering.
    #[inline]
    pub fn base_depth(&self) -> Option<usize> {
        match self {
            VertexRouting::Direct => None,
            VertexRouting::Buffering { base_depth, .. } => Some(*base_depth),
        }
    }

    #[inline]
    pub fn pending(&self) -> usize {
        match self {
            VertexRouting::Direct => 0,
            VertexRouting::Buffering { vertices, .. } => vertices.len(),
        }
    }
}
