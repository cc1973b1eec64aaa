use std::collections::{BTreeMap, HashMap};

use log::warn;
use parking_lot::RwLock;

use super::glsl::{self, StageInterface};
use super::{BufferTarget, PrimitiveMode, RenderContext, ShaderStage, TextureFormat, UniformValue};
use crate::error::GpuError;
use crate::vertex::VertexAttribute;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            /// Raw object name, never zero.
            pub fn raw(self) -> u32 {
                self.0
            }
        }
    };
}

handle!(
    /// Shader object name issued by [`HeadlessContext`].
    HeadlessShader
);
handle!(
    /// Program object name issued by [`HeadlessContext`].
    HeadlessProgram
);
handle!(
    /// Buffer object name issued by [`HeadlessContext`].
    HeadlessBuffer
);
handle!(
    /// Vertex array object name issued by [`HeadlessContext`].
    HeadlessVertexArray
);
handle!(
    /// Texture object name issued by [`HeadlessContext`].
    HeadlessTexture
);

/// Program-relative uniform location, as in GL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeadlessUniformLocation {
    program: u32,
    index: usize,
}

/// Live object counts, used to check for leaks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObjectCounts {
    pub shaders: usize,
    pub programs: usize,
    pub buffers: usize,
    pub vertex_arrays: usize,
    pub textures: usize,
}

impl ObjectCounts {
    pub fn total(&self) -> usize {
        self.shaders + self.programs + self.buffers + self.vertex_arrays + self.textures
    }
}

/// A draw call accepted by the headless context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCall {
    pub program: HeadlessProgram,
    pub vertex_array: HeadlessVertexArray,
    pub mode: PrimitiveMode,
    pub count: u32,
    pub indexed: bool,
}

/// Storage and sampling state of a texture object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextureInfo {
    /// `None` until an image has been uploaded.
    pub format: Option<TextureFormat>,
    pub width: u32,
    pub height: u32,
    pub mipmaps: bool,
    pub repeat_wrap: bool,
}

#[derive(Debug)]
struct ShaderObject {
    stage: ShaderStage,
    interface: Option<StageInterface>,
}

#[derive(Debug, Default)]
struct ProgramObject {
    linked: bool,
    uniforms: Vec<String>,
    values: Vec<Option<UniformValue>>,
}

#[derive(Debug, Default, Clone, Copy)]
struct AttributeState {
    pointer: Option<(VertexAttribute, u32)>,
    enabled: bool,
}

#[derive(Debug, Default)]
struct VertexArrayObject {
    attributes: BTreeMap<u32, AttributeState>,
    element_buffer: Option<u32>,
}

#[derive(Debug, Default)]
struct State {
    next_name: u32,
    shaders: HashMap<u32, ShaderObject>,
    programs: HashMap<u32, ProgramObject>,
    buffers: HashMap<u32, Vec<u8>>,
    vertex_arrays: HashMap<u32, VertexArrayObject>,
    textures: HashMap<u32, TextureInfo>,
    current_program: Option<u32>,
    bound_vertex_array: Option<u32>,
    array_buffer: Option<u32>,
    active_unit: u32,
    texture_units: HashMap<u32, u32>,
    draw_calls: Vec<DrawCall>,
}

impl State {
    fn allocate(&mut self) -> u32 {
        self.next_name += 1;
        self.next_name
    }

    fn bound_texture(&self) -> Option<u32> {
        self.texture_units.get(&self.active_unit).copied()
    }

    fn bound_texture_mut(&mut self) -> Option<&mut TextureInfo> {
        let texture = self.bound_texture()?;
        self.textures.get_mut(&texture)
    }

    fn bound_vao_mut(&mut self) -> Option<&mut VertexArrayObject> {
        let vao = self.bound_vertex_array?;
        self.vertex_arrays.get_mut(&vao)
    }
}

/// In-process stand-in for a GL 3.3 core context.
///
/// Tracks object tables, the current-program and vertex-array registers,
/// uniform values and accepted draw calls. Shader sources go through a
/// source-level GLSL checker so compile and link failures produce
/// driver-style logs. Every declared uniform counts as active.
#[derive(Debug, Default)]
pub struct HeadlessContext {
    state: RwLock<State>,
}

impl HeadlessContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts of objects created and not yet deleted.
    pub fn live_objects(&self) -> ObjectCounts {
        let state = self.state.read();
        ObjectCounts {
            shaders: state.shaders.len(),
            programs: state.programs.len(),
            buffers: state.buffers.len(),
            vertex_arrays: state.vertex_arrays.len(),
            textures: state.textures.len(),
        }
    }

    pub fn current_program(&self) -> Option<HeadlessProgram> {
        self.state.read().current_program.map(HeadlessProgram)
    }

    pub fn bound_vertex_array(&self) -> Option<HeadlessVertexArray> {
        self.state.read().bound_vertex_array.map(HeadlessVertexArray)
    }

    /// Last value written to `name` in `program`.
    pub fn uniform_value(&self, program: HeadlessProgram, name: &str) -> Option<UniformValue> {
        let state = self.state.read();
        let object = state.programs.get(&program.0)?;
        let index = object.uniforms.iter().position(|uniform| uniform == name)?;
        object.values[index]
    }

    /// Active uniform names of a linked program.
    pub fn active_uniforms(&self, program: HeadlessProgram) -> Vec<String> {
        self.state
            .read()
            .programs
            .get(&program.0)
            .map(|object| object.uniforms.clone())
            .unwrap_or_default()
    }

    /// Enabled attribute pointers of `vertex_array`, ordered by slot.
    pub fn vertex_attributes(&self, vertex_array: HeadlessVertexArray) -> Vec<VertexAttribute> {
        let state = self.state.read();
        let Some(object) = state.vertex_arrays.get(&vertex_array.0) else {
            return Vec::new();
        };
        object
            .attributes
            .values()
            .filter(|attribute| attribute.enabled)
            .filter_map(|attribute| attribute.pointer.map(|(pointer, _)| pointer))
            .collect()
    }

    /// Array buffer an attribute slot of `vertex_array` reads from.
    pub fn attribute_buffer(
        &self,
        vertex_array: HeadlessVertexArray,
        slot: u32,
    ) -> Option<HeadlessBuffer> {
        let state = self.state.read();
        let attribute = state.vertex_arrays.get(&vertex_array.0)?.attributes.get(&slot)?;
        attribute.pointer.map(|(_, buffer)| HeadlessBuffer(buffer))
    }

    pub fn element_buffer(&self, vertex_array: HeadlessVertexArray) -> Option<HeadlessBuffer> {
        let state = self.state.read();
        state
            .vertex_arrays
            .get(&vertex_array.0)?
            .element_buffer
            .map(HeadlessBuffer)
    }

    pub fn buffer_contents(&self, buffer: HeadlessBuffer) -> Option<Vec<u8>> {
        self.state.read().buffers.get(&buffer.0).cloned()
    }

    pub fn texture_info(&self, texture: HeadlessTexture) -> Option<TextureInfo> {
        self.state.read().textures.get(&texture.0).copied()
    }

    pub fn draw_calls(&self) -> Vec<DrawCall> {
        self.state.read().draw_calls.clone()
    }

    fn record_draw(&self, mode: PrimitiveMode, count: u32, indexed: bool) {
        let mut state = self.state.write();
        let (Some(program), Some(vertex_array)) =
            (state.current_program, state.bound_vertex_array)
        else {
            warn!("draw call ignored: no current program or vertex array");
            return;
        };
        if indexed
            && state
                .vertex_arrays
                .get(&vertex_array)
                .and_then(|object| object.element_buffer)
                .is_none()
        {
            warn!("indexed draw ignored: vertex array {vertex_array} has no element buffer");
            return;
        }
        state.draw_calls.push(DrawCall {
            program: HeadlessProgram(program),
            vertex_array: HeadlessVertexArray(vertex_array),
            mode,
            count,
            indexed,
        });
    }
}

impl RenderContext for HeadlessContext {
    type Shader = HeadlessShader;
    type Program = HeadlessProgram;
    type Buffer = HeadlessBuffer;
    type VertexArray = HeadlessVertexArray;
    type Texture = HeadlessTexture;
    type UniformLocation = HeadlessUniformLocation;

    fn create_shader(&self, stage: ShaderStage) -> Result<HeadlessShader, GpuError> {
        let mut state = self.state.write();
        let name = state.allocate();
        state.shaders.insert(
            name,
            ShaderObject {
                stage,
                interface: None,
            },
        );
        Ok(HeadlessShader(name))
    }

    fn compile_shader(&self, shader: HeadlessShader, source: &str) -> Result<(), String> {
        let mut state = self.state.write();
        let object = state
            .shaders
            .get_mut(&shader.0)
            .ok_or_else(|| format!("error: {} is not a shader object", shader.0))?;
        match glsl::check(object.stage, source) {
            Ok(interface) => {
                object.interface = Some(interface);
                Ok(())
            }
            Err(log) => {
                object.interface = None;
                Err(log)
            }
        }
    }

    fn delete_shader(&self, shader: HeadlessShader) {
        self.state.write().shaders.remove(&shader.0);
    }

    fn create_program(&self) -> Result<HeadlessProgram, GpuError> {
        let mut state = self.state.write();
        let name = state.allocate();
        state.programs.insert(name, ProgramObject::default());
        Ok(HeadlessProgram(name))
    }

    fn link_program(
        &self,
        program: HeadlessProgram,
        shaders: &[HeadlessShader],
    ) -> Result<(), String> {
        let mut state = self.state.write();
        let mut vertex = None;
        let mut fragment = None;
        for shader in shaders {
            let object = state
                .shaders
                .get(&shader.0)
                .ok_or_else(|| format!("error: {} is not a shader object", shader.0))?;
            let interface = object
                .interface
                .clone()
                .ok_or_else(|| "error: linking with uncompiled/unspecialized shader".to_string())?;
            match object.stage {
                ShaderStage::Vertex => vertex = Some(interface),
                ShaderStage::Fragment => fragment = Some(interface),
            }
        }

        let linked = match (vertex, fragment) {
            (Some(vertex), Some(fragment)) => {
                glsl::check_interface(&vertex, &fragment).map(|()| {
                    let mut uniforms = vertex.uniforms;
                    for name in fragment.uniforms {
                        if !uniforms.contains(&name) {
                            uniforms.push(name);
                        }
                    }
                    uniforms
                })
            }
            (None, _) => Err("error: program lacks a vertex shader".to_string()),
            (_, None) => Err("error: program lacks a fragment shader".to_string()),
        };

        let object = state
            .programs
            .get_mut(&program.0)
            .ok_or_else(|| format!("error: {} is not a program object", program.0))?;
        match linked {
            Ok(uniforms) => {
                object.linked = true;
                object.values = vec![None; uniforms.len()];
                object.uniforms = uniforms;
                Ok(())
            }
            Err(log) => {
                *object = ProgramObject::default();
                Err(log)
            }
        }
    }

    fn delete_program(&self, program: HeadlessProgram) {
        let mut state = self.state.write();
        state.programs.remove(&program.0);
        if state.current_program == Some(program.0) {
            state.current_program = None;
        }
    }

    fn use_program(&self, program: Option<HeadlessProgram>) {
        let mut state = self.state.write();
        match program {
            Some(program)
                if !state.programs.get(&program.0).is_some_and(|object| object.linked) =>
            {
                warn!("use_program ignored: program {} is not linked", program.0);
            }
            _ => state.current_program = program.map(|program| program.0),
        }
    }

    fn uniform_location(
        &self,
        program: HeadlessProgram,
        name: &str,
    ) -> Option<HeadlessUniformLocation> {
        let state = self.state.read();
        let object = state.programs.get(&program.0)?;
        let index = object.uniforms.iter().position(|uniform| uniform == name)?;
        Some(HeadlessUniformLocation {
            program: program.0,
            index,
        })
    }

    fn set_uniform(&self, location: &HeadlessUniformLocation, value: UniformValue) {
        let mut state = self.state.write();
        let Some(current) = state.current_program else {
            warn!("uniform write ignored: no current program");
            return;
        };
        if current != location.program {
            warn!(
                "uniform location from program {} applied to current program {current}",
                location.program
            );
        }
        if let Some(slot) = state
            .programs
            .get_mut(&current)
            .and_then(|object| object.values.get_mut(location.index))
        {
            *slot = Some(value);
        }
    }

    fn create_vertex_array(&self) -> Result<HeadlessVertexArray, GpuError> {
        let mut state = self.state.write();
        let name = state.allocate();
        state.vertex_arrays.insert(name, VertexArrayObject::default());
        Ok(HeadlessVertexArray(name))
    }

    fn bind_vertex_array(&self, vertex_array: Option<HeadlessVertexArray>) {
        self.state.write().bound_vertex_array = vertex_array.map(|vao| vao.0);
    }

    fn delete_vertex_array(&self, vertex_array: HeadlessVertexArray) {
        let mut state = self.state.write();
        state.vertex_arrays.remove(&vertex_array.0);
        if state.bound_vertex_array == Some(vertex_array.0) {
            state.bound_vertex_array = None;
        }
    }

    fn create_buffer(&self) -> Result<HeadlessBuffer, GpuError> {
        let mut state = self.state.write();
        let name = state.allocate();
        state.buffers.insert(name, Vec::new());
        Ok(HeadlessBuffer(name))
    }

    fn bind_buffer(&self, target: BufferTarget, buffer: Option<HeadlessBuffer>) {
        let mut state = self.state.write();
        let name = buffer.map(|buffer| buffer.0);
        match target {
            BufferTarget::Array => state.array_buffer = name,
            BufferTarget::ElementArray => match state.bound_vao_mut() {
                Some(vao) => vao.element_buffer = name,
                None => warn!("element buffer bind ignored: no vertex array bound"),
            },
        }
    }

    fn buffer_data(&self, target: BufferTarget, data: &[u8]) {
        let mut state = self.state.write();
        let bound = match target {
            BufferTarget::Array => state.array_buffer,
            BufferTarget::ElementArray => state
                .bound_vertex_array
                .and_then(|vao| state.vertex_arrays.get(&vao))
                .and_then(|vao| vao.element_buffer),
        };
        match bound.and_then(|buffer| state.buffers.get_mut(&buffer)) {
            Some(contents) => *contents = data.to_vec(),
            None => warn!("buffer upload ignored: nothing bound to {target:?}"),
        }
    }

    fn delete_buffer(&self, buffer: HeadlessBuffer) {
        let mut state = self.state.write();
        state.buffers.remove(&buffer.0);
        if state.array_buffer == Some(buffer.0) {
            state.array_buffer = None;
        }
    }

    fn vertex_attrib_pointer(&self, attribute: &VertexAttribute) {
        let mut state = self.state.write();
        let Some(buffer) = state.array_buffer else {
            warn!("attribute pointer for slot {} ignored: no array buffer bound", attribute.slot);
            return;
        };
        match state.bound_vao_mut() {
            Some(vao) => {
                let entry = vao.attributes.entry(attribute.slot).or_default();
                entry.pointer = Some((*attribute, buffer));
            }
            None => warn!(
                "attribute pointer for slot {} ignored: no vertex array bound",
                attribute.slot
            ),
        }
    }

    fn enable_vertex_attrib_array(&self, slot: u32) {
        let mut state = self.state.write();
        match state.bound_vao_mut() {
            Some(vao) => vao.attributes.entry(slot).or_default().enabled = true,
            None => warn!("enabling slot {slot} ignored: no vertex array bound"),
        }
    }

    fn create_texture(&self) -> Result<HeadlessTexture, GpuError> {
        let mut state = self.state.write();
        let name = state.allocate();
        state.textures.insert(name, TextureInfo::default());
        Ok(HeadlessTexture(name))
    }

    fn active_texture(&self, unit: u32) {
        self.state.write().active_unit = unit;
    }

    fn bind_texture(&self, texture: Option<HeadlessTexture>) {
        let mut state = self.state.write();
        let unit = state.active_unit;
        match texture {
            Some(texture) => state.texture_units.insert(unit, texture.0),
            None => state.texture_units.remove(&unit),
        };
    }

    fn tex_image_2d(&self, format: TextureFormat, width: u32, height: u32, pixels: &[u8]) {
        let expected = width as usize * height as usize * format.channels() as usize;
        if pixels.len() < expected {
            warn!(
                "texture upload of {width}x{height} {format:?} supplied {} of {expected} bytes",
                pixels.len()
            );
        }
        let mut state = self.state.write();
        match state.bound_texture_mut() {
            Some(info) => {
                info.format = Some(format);
                info.width = width;
                info.height = height;
                info.mipmaps = false;
            }
            None => warn!("texture upload ignored: no texture bound"),
        }
    }

    fn generate_mipmap(&self) {
        if let Some(info) = self.state.write().bound_texture_mut() {
            info.mipmaps = info.format.is_some();
        }
    }

    fn set_default_sampling(&self) {
        if let Some(info) = self.state.write().bound_texture_mut() {
            info.repeat_wrap = true;
        }
    }

    fn delete_texture(&self, texture: HeadlessTexture) {
        let mut state = self.state.write();
        state.textures.remove(&texture.0);
        state.texture_units.retain(|_, bound| *bound != texture.0);
    }

    fn draw_arrays(&self, mode: PrimitiveMode, _first: u32, count: u32) {
        self.record_draw(mode, count, false);
    }

    fn draw_elements(&self, mode: PrimitiveMode, count: u32) {
        self.record_draw(mode, count, true);
    }
}
