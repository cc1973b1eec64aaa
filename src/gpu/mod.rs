//! Render context abstraction shared by every GPU-facing helper.
//!
//! OpenGL keeps its "current program" and "bound vertex array" in
//! process-wide registers. Here those registers live behind a
//! [`RenderContext`] value that callers pass explicitly, so the helpers in
//! this crate never reach for ambient state.

mod gl;
mod glsl;
mod headless;

use std::fmt;

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::error::GpuError;
use crate::vertex::VertexAttribute;

pub use gl::GlowContext;
pub use headless::{
    DrawCall, HeadlessBuffer, HeadlessContext, HeadlessProgram, HeadlessShader, HeadlessTexture,
    HeadlessUniformLocation, HeadlessVertexArray, ObjectCounts, TextureInfo,
};

/// Programmable pipeline stage a shader object belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        })
    }
}

/// Buffer binding points used by the vertex helpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    Array,
    ElementArray,
}

/// Primitive assembly mode for draw calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveMode {
    Triangles,
    TriangleStrip,
    Lines,
    Points,
}

/// Pixel layout of uploaded texture data (8 bits per channel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Red,
    Rgb,
    Rgba,
}

impl TextureFormat {
    /// Maps a decoded image channel count to an upload format.
    pub fn from_channels(channels: u8) -> Option<Self> {
        match channels {
            1 => Some(Self::Red),
            3 => Some(Self::Rgb),
            4 => Some(Self::Rgba),
            _ => None,
        }
    }

    pub fn channels(self) -> u8 {
        match self {
            Self::Red => 1,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }
}

/// Value uploaded to a uniform location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat3(Mat3),
    Mat4(Mat4),
}

impl From<bool> for UniformValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for UniformValue {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<f32> for UniformValue {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<Vec2> for UniformValue {
    fn from(value: Vec2) -> Self {
        Self::Vec2(value)
    }
}

impl From<Vec3> for UniformValue {
    fn from(value: Vec3) -> Self {
        Self::Vec3(value)
    }
}

impl From<Vec4> for UniformValue {
    fn from(value: Vec4) -> Self {
        Self::Vec4(value)
    }
}

impl From<Mat3> for UniformValue {
    fn from(value: Mat3) -> Self {
        Self::Mat3(value)
    }
}

impl From<Mat4> for UniformValue {
    fn from(value: Mat4) -> Self {
        Self::Mat4(value)
    }
}

/// GL-shaped command surface used by the shader, vertex and texture helpers.
///
/// Methods take `&self` the same way a GL driver does; implementations keep
/// their own interior state. Object handles are plain copyable identifiers
/// and are only meaningful to the context that created them.
pub trait RenderContext {
    type Shader: Copy + fmt::Debug;
    type Program: Copy + fmt::Debug + PartialEq;
    type Buffer: Copy + fmt::Debug + PartialEq;
    type VertexArray: Copy + fmt::Debug + PartialEq;
    type Texture: Copy + fmt::Debug + PartialEq;
    type UniformLocation: Clone + fmt::Debug;

    fn create_shader(&self, stage: ShaderStage) -> Result<Self::Shader, GpuError>;
    /// Compiles `source` into `shader`, returning the info log on failure.
    fn compile_shader(&self, shader: Self::Shader, source: &str) -> Result<(), String>;
    fn delete_shader(&self, shader: Self::Shader);

    fn create_program(&self) -> Result<Self::Program, GpuError>;
    /// Attaches `shaders`, links, then detaches them again. Returns the info
    /// log on failure.
    fn link_program(&self, program: Self::Program, shaders: &[Self::Shader])
        -> Result<(), String>;
    fn delete_program(&self, program: Self::Program);
    fn use_program(&self, program: Option<Self::Program>);

    /// Looks up a uniform; `None` mirrors GL's `-1` location.
    fn uniform_location(&self, program: Self::Program, name: &str)
        -> Option<Self::UniformLocation>;
    /// Uploads into the current program.
    fn set_uniform(&self, location: &Self::UniformLocation, value: UniformValue);

    fn create_vertex_array(&self) -> Result<Self::VertexArray, GpuError>;
    fn bind_vertex_array(&self, vertex_array: Option<Self::VertexArray>);
    fn delete_vertex_array(&self, vertex_array: Self::VertexArray);

    fn create_buffer(&self) -> Result<Self::Buffer, GpuError>;
    fn bind_buffer(&self, target: BufferTarget, buffer: Option<Self::Buffer>);
    /// Replaces the contents of the buffer bound to `target` (static usage).
    fn buffer_data(&self, target: BufferTarget, data: &[u8]);
    fn delete_buffer(&self, buffer: Self::Buffer);

    /// Describes a float attribute sourced from the bound array buffer.
    fn vertex_attrib_pointer(&self, attribute: &VertexAttribute);
    fn enable_vertex_attrib_array(&self, slot: u32);

    fn create_texture(&self) -> Result<Self::Texture, GpuError>;
    /// Selects texture unit `unit` (0 for `TEXTURE0`).
    fn active_texture(&self, unit: u32);
    fn bind_texture(&self, texture: Option<Self::Texture>);
    /// Uploads level 0 of the bound 2D texture.
    fn tex_image_2d(&self, format: TextureFormat, width: u32, height: u32, pixels: &[u8]);
    fn generate_mipmap(&self);
    /// Applies repeat wrapping with trilinear minification to the bound texture.
    fn set_default_sampling(&self);
    fn delete_texture(&self, texture: Self::Texture);

    fn draw_arrays(&self, mode: PrimitiveMode, first: u32, count: u32);
    /// Draws `count` 32-bit indices from the element buffer of the bound
    /// vertex array.
    fn draw_elements(&self, mode: PrimitiveMode, count: u32);
}
