use glow::HasContext;

use super::{BufferTarget, PrimitiveMode, RenderContext, ShaderStage, TextureFormat, UniformValue};
use crate::error::GpuError;
use crate::vertex::VertexAttribute;

/// [`RenderContext`] backed by a live OpenGL 3.3 core context.
///
/// The host owns window and context creation and must keep the context
/// current on the calling thread for as long as this value is used.
pub struct GlowContext {
    gl: glow::Context,
}

impl GlowContext {
    pub fn new(gl: glow::Context) -> Self {
        Self { gl }
    }

    /// Direct access for host code that needs calls this crate does not wrap
    /// (clearing, viewport, depth test).
    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }
}

fn stage_enum(stage: ShaderStage) -> u32 {
    match stage {
        ShaderStage::Vertex => glow::VERTEX_SHADER,
        ShaderStage::Fragment => glow::FRAGMENT_SHADER,
    }
}

fn target_enum(target: BufferTarget) -> u32 {
    match target {
        BufferTarget::Array => glow::ARRAY_BUFFER,
        BufferTarget::ElementArray => glow::ELEMENT_ARRAY_BUFFER,
    }
}

fn mode_enum(mode: PrimitiveMode) -> u32 {
    match mode {
        PrimitiveMode::Triangles => glow::TRIANGLES,
        PrimitiveMode::TriangleStrip => glow::TRIANGLE_STRIP,
        PrimitiveMode::Lines => glow::LINES,
        PrimitiveMode::Points => glow::POINTS,
    }
}

fn format_enum(format: TextureFormat) -> u32 {
    match format {
        TextureFormat::Red => glow::RED,
        TextureFormat::Rgb => glow::RGB,
        TextureFormat::Rgba => glow::RGBA,
    }
}

impl RenderContext for GlowContext {
    type Shader = glow::Shader;
    type Program = glow::Program;
    type Buffer = glow::Buffer;
    type VertexArray = glow::VertexArray;
    type Texture = glow::Texture;
    type UniformLocation = glow::UniformLocation;

    fn create_shader(&self, stage: ShaderStage) -> Result<Self::Shader, GpuError> {
        unsafe { self.gl.create_shader(stage_enum(stage)) }
            .map_err(|reason| GpuError::allocation("shader", reason))
    }

    fn compile_shader(&self, shader: Self::Shader, source: &str) -> Result<(), String> {
        unsafe {
            self.gl.shader_source(shader, source);
            self.gl.compile_shader(shader);
            if self.gl.get_shader_compile_status(shader) {
                Ok(())
            } else {
                Err(self.gl.get_shader_info_log(shader))
            }
        }
    }

    fn delete_shader(&self, shader: Self::Shader) {
        unsafe { self.gl.delete_shader(shader) }
    }

    fn create_program(&self) -> Result<Self::Program, GpuError> {
        unsafe { self.gl.create_program() }
            .map_err(|reason| GpuError::allocation("program", reason))
    }

    fn link_program(&self, program: Self::Program, shaders: &[Self::Shader]) -> Result<(), String> {
        unsafe {
            for shader in shaders {
                self.gl.attach_shader(program, *shader);
            }
            self.gl.link_program(program);
            let linked = self.gl.get_program_link_status(program);
            for shader in shaders {
                self.gl.detach_shader(program, *shader);
            }
            if linked {
                Ok(())
            } else {
                Err(self.gl.get_program_info_log(program))
            }
        }
    }

    fn delete_program(&self, program: Self::Program) {
        unsafe { self.gl.delete_program(program) }
    }

    fn use_program(&self, program: Option<Self::Program>) {
        unsafe { self.gl.use_program(program) }
    }

    fn uniform_location(
        &self,
        program: Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation> {
        unsafe { self.gl.get_uniform_location(program, name) }
    }

    fn set_uniform(&self, location: &Self::UniformLocation, value: UniformValue) {
        let location = Some(location);
        unsafe {
            match value {
                UniformValue::Bool(value) => self.gl.uniform_1_i32(location, i32::from(value)),
                UniformValue::Int(value) => self.gl.uniform_1_i32(location, value),
                UniformValue::Float(value) => self.gl.uniform_1_f32(location, value),
                UniformValue::Vec2(value) => self.gl.uniform_2_f32(location, value.x, value.y),
                UniformValue::Vec3(value) => {
                    self.gl.uniform_3_f32(location, value.x, value.y, value.z)
                }
                UniformValue::Vec4(value) => {
                    self.gl.uniform_4_f32(location, value.x, value.y, value.z, value.w)
                }
                UniformValue::Mat3(value) => {
                    self.gl
                        .uniform_matrix_3_f32_slice(location, false, &value.to_cols_array())
                }
                UniformValue::Mat4(value) => {
                    self.gl
                        .uniform_matrix_4_f32_slice(location, false, &value.to_cols_array())
                }
            }
        }
    }

    fn create_vertex_array(&self) -> Result<Self::VertexArray, GpuError> {
        unsafe { self.gl.create_vertex_array() }
            .map_err(|reason| GpuError::allocation("vertex array", reason))
    }

    fn bind_vertex_array(&self, vertex_array: Option<Self::VertexArray>) {
        unsafe { self.gl.bind_vertex_array(vertex_array) }
    }

    fn delete_vertex_array(&self, vertex_array: Self::VertexArray) {
        unsafe { self.gl.delete_vertex_array(vertex_array) }
    }

    fn create_buffer(&self) -> Result<Self::Buffer, GpuError> {
        unsafe { self.gl.create_buffer() }.map_err(|reason| GpuError::allocation("buffer", reason))
    }

    fn bind_buffer(&self, target: BufferTarget, buffer: Option<Self::Buffer>) {
        unsafe { self.gl.bind_buffer(target_enum(target), buffer) }
    }

    fn buffer_data(&self, target: BufferTarget, data: &[u8]) {
        unsafe {
            self.gl
                .buffer_data_u8_slice(target_enum(target), data, glow::STATIC_DRAW)
        }
    }

    fn delete_buffer(&self, buffer: Self::Buffer) {
        unsafe { self.gl.delete_buffer(buffer) }
    }

    fn vertex_attrib_pointer(&self, attribute: &VertexAttribute) {
        unsafe {
            self.gl.vertex_attrib_pointer_f32(
                attribute.slot,
                attribute.components as i32,
                glow::FLOAT,
                false,
                attribute.stride_bytes as i32,
                attribute.offset_bytes as i32,
            )
        }
    }

    fn enable_vertex_attrib_array(&self, slot: u32) {
        unsafe { self.gl.enable_vertex_attrib_array(slot) }
    }

    fn create_texture(&self) -> Result<Self::Texture, GpuError> {
        unsafe { self.gl.create_texture() }
            .map_err(|reason| GpuError::allocation("texture", reason))
    }

    fn active_texture(&self, unit: u32) {
        unsafe { self.gl.active_texture(glow::TEXTURE0 + unit) }
    }

    fn bind_texture(&self, texture: Option<Self::Texture>) {
        unsafe { self.gl.bind_texture(glow::TEXTURE_2D, texture) }
    }

    fn tex_image_2d(&self, format: TextureFormat, width: u32, height: u32, pixels: &[u8]) {
        let format = format_enum(format);
        unsafe {
            // Rows of RED and RGB images are not 4-byte aligned in general.
            self.gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            self.gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                format as i32,
                width as i32,
                height as i32,
                0,
                format,
                glow::UNSIGNED_BYTE,
                glow::PixelUnpackData::Slice(Some(pixels)),
            );
        }
    }

    fn generate_mipmap(&self) {
        unsafe { self.gl.generate_mipmap(glow::TEXTURE_2D) }
    }

    fn set_default_sampling(&self) {
        unsafe {
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::REPEAT as i32);
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::REPEAT as i32);
            self.gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                glow::LINEAR_MIPMAP_LINEAR as i32,
            );
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
        }
    }

    fn delete_texture(&self, texture: Self::Texture) {
        unsafe { self.gl.delete_texture(texture) }
    }

    fn draw_arrays(&self, mode: PrimitiveMode, first: u32, count: u32) {
        unsafe { self.gl.draw_arrays(mode_enum(mode), first as i32, count as i32) }
    }

    fn draw_elements(&self, mode: PrimitiveMode, count: u32) {
        unsafe {
            self.gl
                .draw_elements(mode_enum(mode), count as i32, glow::UNSIGNED_INT, 0)
        }
    }
}
