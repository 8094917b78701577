use crate::backend::{VertexArrays, VertexBuffers};
use crate::math::Vec3;

use super::DrawMode;

/// Index pattern of one quad: two triangles sharing the 0-2 diagonal.
const QUAD_PATTERN: [u32; 6] = [0, 1, 2, 0, 2, 3];

/// Most quads a 16-bit index buffer can address.
pub const MAX_SHORT_INDEX_QUADS: usize = (u16::MAX as usize + 1) / 4;

/// Builds the index buffer for `quads` quads.
pub fn quad_indices(quads: usize) -> Vec<u32> {
    let mut out = Vec::with_capacity(quads * 6);
    for k in 0..quads as u32 {
        out.extend(QUAD_PATTERN.iter().map(|i| 4 * k + i));
    }
    out
}

/// Fixed-capacity vertex storage for one primitive kind.
///
/// Arrays are sized once; pushes past capacity are rejected and the caller
/// decides how to report them. Texcoords and indices exist for quads only.
#[derive(Debug)]
pub struct DynamicBuffer {
    mode: DrawMode,
    capacity: usize,

    vertices: Vec<f32>,
    texcoords: Option<Vec<f32>>,
    colors: Vec<u8>,
    indices: Option<Vec<u32>>,

    vertex_count: usize,
    color_count: usize,
    texcoord_count: usize,

    /// GPU objects; null until the context uploads the buffer.
    pub(crate) gpu: VertexBuffers,
}

impl DynamicBuffer {
    /// `primitives` is the number of lines/triangles/quads that fit.
    pub fn new(mode: DrawMode, primitives: usize) -> Self {
        let capacity = primitives * mode.vertices_per_primitive();
        let quads = mode == DrawMode::Quads;
        Self {
            mode,
            capacity,
            vertices: vec![0.0; capacity * 3],
            texcoords: quads.then(|| vec![0.0; capacity * 2]),
            colors: vec![0; capacity * 4],
            indices: quads.then(|| quad_indices(primitives)),
            vertex_count: 0,
            color_count: 0,
            texcoord_count: 0,
            gpu: VertexBuffers::default(),
        }
    }

    #[inline]
    pub fn mode(&self) -> DrawMode {
        self.mode
    }

    /// Vertex capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    #[inline]
    pub fn color_count(&self) -> usize {
        self.color_count
    }

    #[inline]
    pub fn texcoord_count(&self) -> usize {
        self.texcoord_count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertex_count == 0
    }

    /// True when `n` more vertices would not fit.
    #[inline]
    pub fn would_overflow(&self, n: usize) -> bool {
        self.vertex_count + n > self.capacity
    }

    /// Appends a position. Returns `false` (and stores nothing) when full.
    pub fn push_vertex(&mut self, v: Vec3) -> bool {
        if self.vertex_count >= self.capacity {
            return false;
        }
        let i = self.vertex_count * 3;
        self.vertices[i..i + 3].copy_from_slice(&v.to_array());
        self.vertex_count += 1;
        true
    }

    pub fn push_color(&mut self, rgba: [u8; 4]) -> bool {
        if self.color_count >= self.capacity {
            return false;
        }
        let i = self.color_count * 4;
        self.colors[i..i + 4].copy_from_slice(&rgba);
        self.color_count += 1;
        true
    }

    /// Always `false` for buffers without texcoords.
    pub fn push_texcoord(&mut self, u: f32, v: f32) -> bool {
        let Some(texcoords) = self.texcoords.as_mut() else {
            return false;
        };
        if self.texcoord_count >= self.capacity {
            return false;
        }
        let i = self.texcoord_count * 2;
        texcoords[i] = u;
        texcoords[i + 1] = v;
        self.texcoord_count += 1;
        true
    }

    pub fn last_color(&self) -> Option<[u8; 4]> {
        let n = self.color_count.checked_sub(1)?;
        let i = n * 4;
        Some([self.colors[i], self.colors[i + 1], self.colors[i + 2], self.colors[i + 3]])
    }

    /// Brings colour and texcoord counts to the vertex count.
    ///
    /// Missing colours repeat the last colour stored (or `fallback` when
    /// there is none); missing texcoords are zero. Extra entries beyond the
    /// vertex count are discarded.
    pub fn pad(&mut self, fallback: [u8; 4]) {
        if self.color_count < self.vertex_count {
            let fill = self.last_color().unwrap_or(fallback);
            while self.color_count < self.vertex_count {
                self.push_color(fill);
            }
        } else {
            self.color_count = self.vertex_count;
        }

        if let Some(texcoords) = self.texcoords.as_mut() {
            if self.texcoord_count < self.vertex_count {
                texcoords[self.texcoord_count * 2..self.vertex_count * 2].fill(0.0);
            }
            self.texcoord_count = self.vertex_count;
        }
    }

    /// Zeroes the counters. Array contents are left for the next batch to
    /// overwrite.
    pub fn reset(&mut self) {
        self.vertex_count = 0;
        self.color_count = 0;
        self.texcoord_count = 0;
    }

    /// Position of vertex `i`.
    pub fn vertex(&self, i: usize) -> Option<Vec3> {
        if i >= self.vertex_count {
            return None;
        }
        let v = &self.vertices[i * 3..i * 3 + 3];
        Some(Vec3::new(v[0], v[1], v[2]))
    }

    pub fn color(&self, i: usize) -> Option<[u8; 4]> {
        if i >= self.color_count {
            return None;
        }
        let c = &self.colors[i * 4..i * 4 + 4];
        Some([c[0], c[1], c[2], c[3]])
    }

    pub fn texcoord(&self, i: usize) -> Option<[f32; 2]> {
        if i >= self.texcoord_count {
            return None;
        }
        let t = self.texcoords.as_ref()?;
        Some([t[i * 2], t[i * 2 + 1]])
    }

    #[inline]
    pub fn indices(&self) -> Option<&[u32]> {
        self.indices.as_deref()
    }

    /// Whole arrays, as allocated on the GPU at init.
    pub fn arrays(&self) -> VertexArrays<'_> {
        VertexArrays {
            vertices: &self.vertices,
            texcoords: self.texcoords.as_deref(),
            normals: None,
            colors: Some(&self.colors),
            indices: self.indices.as_deref(),
        }
    }

    /// The filled prefix of each array; what a flush has to upload.
    pub fn dirty_arrays(&self) -> VertexArrays<'_> {
        VertexArrays {
            vertices: &self.vertices[..self.vertex_count * 3],
            texcoords: self.texcoords.as_deref().map(|t| &t[..self.texcoord_count * 2]),
            normals: None,
            colors: Some(&self.colors[..self.color_count * 4]),
            indices: None,
        }
    }
}
