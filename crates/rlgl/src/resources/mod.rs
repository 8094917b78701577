//! GPU resources owned by the caller: textures, shader programs, render
//! targets, meshes and the light pool of the standard shader.
//!
//! Creation never fails loudly. A resource that cannot be created is logged
//! with the driver's diagnostic and comes back as a null handle; every
//! `unload_*` accepts null handles.

mod light;
mod mesh;
mod mipmap;
mod render_texture;
mod shader;
mod texture;

pub use light::{Light, LightKind, LightLocations, LightPool};
pub use mesh::{Material, Mesh};
pub use mipmap::{mip_chain, mip_level_count};
pub use render_texture::RenderTexture;
pub use shader::{BuiltinShader, Shader, ShaderLocations};
pub use texture::{PixelFormat, TextureFilter};
