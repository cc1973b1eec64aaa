//! Small building blocks for OpenGL 3.3 tutorial-style renderers.
//!
//! The crate covers the three chores every such renderer repeats: turning
//! GLSL files into a linked program, steering a fly camera from input
//! events, and uploading interleaved vertex data. Every GPU call goes
//! through an explicit [`RenderContext`], so the same code runs against a
//! real driver ([`GlowContext`]) or the in-process [`HeadlessContext`] used
//! by the tests and the `lit-cube` demo. Window and context creation are
//! left to the host.

pub mod camera;
pub mod config;
pub mod error;
pub mod geometry;
pub mod gpu;
pub mod input;
pub mod shader;
pub mod texture;
pub mod vertex;

pub use camera::{Camera, CameraMovement};
pub use config::{CameraConfig, ShaderPolicy, TextureOptions};
pub use error::{GpuError, LayoutError, ShaderError, TextureError};
pub use gpu::{
    BufferTarget, GlowContext, HeadlessContext, PrimitiveMode, RenderContext, ShaderStage,
    TextureFormat, UniformValue,
};
pub use input::{drive_camera, FrameClock, InputState, KeyCode};
pub use shader::ShaderProgram;
pub use texture::{load_texture, load_texture_or_empty};
pub use vertex::{MeshBuffers, VertexAttribute, VertexLayout, VertexLayoutBuilder};
