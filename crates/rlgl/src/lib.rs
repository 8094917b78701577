//! OpenGL abstraction layer with an immediate-mode front end.
//!
//! Vertices submitted between `begin`/`end` are batched into three dynamic
//! buffers (lines, triangles, quads) and flushed as few draw calls as the
//! texture and shader changes allow. Matrices, textures, shaders, render
//! targets and meshes are managed on top of a [`backend::GpuBackend`].
//!
//! # Structure
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`context`] | `Rlgl`, the state every call goes through |
//! | [`batch`] | dynamic buffers, draw-call tracking |
//! | [`math`] | `glam` adapters for GL matrix conventions |
//! | [`matrix_stack`] | projection/modelview stack emulation |
//! | [`resources`] | textures, shaders, render textures, meshes, lights |
//! | [`caps`] | profile and extension probing |
//! | [`vr`] | stereo view, headset session, simulator |
//! | [`backend`] | GPU seam plus a recording backend for tests |
//! | `gl` | `glow`-backed implementation (native targets) |

pub mod backend;
pub mod batch;
pub mod caps;
pub mod config;
pub mod context;
pub mod logging;
pub mod math;
pub mod matrix_stack;
pub mod resources;
pub mod vr;

mod flush;
mod vertex;

#[cfg(not(target_arch = "wasm32"))]
pub mod gl;

pub use batch::{BatchStats, DrawMode};
pub use caps::{Capabilities, GlProfile};
pub use config::RlglConfig;
pub use context::Rlgl;
pub use matrix_stack::MatrixMode;
pub use resources::{
    BuiltinShader, Light, LightKind, Material, Mesh, PixelFormat, RenderTexture, Shader, TextureFilter,
};
pub use math::{Mat4, Quat, Vec3};
