use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};
use log::{debug, trace, warn};

use crate::config::ShaderPolicy;
use crate::error::ShaderError;
use crate::gpu::{RenderContext, ShaderStage, UniformValue};

/// A linked vertex + fragment program owned by this value.
///
/// The program object is deleted when the value is dropped. Uniform setters
/// write into whichever program is current in the context, as GL does, so
/// call [`use_program`](Self::use_program) first.
pub struct ShaderProgram<'ctx, C: RenderContext> {
    ctx: &'ctx C,
    handle: C::Program,
    vertex_path: Option<PathBuf>,
    fragment_path: Option<PathBuf>,
}

impl<'ctx, C: RenderContext> ShaderProgram<'ctx, C> {
    /// Reads, compiles and links the two stage files.
    pub fn from_files(
        ctx: &'ctx C,
        vertex_path: impl AsRef<Path>,
        fragment_path: impl AsRef<Path>,
    ) -> Result<Self, ShaderError> {
        let vertex_path = vertex_path.as_ref();
        let fragment_path = fragment_path.as_ref();
        let vertex_source = read_source(ShaderStage::Vertex, vertex_path)?;
        let fragment_source = read_source(ShaderStage::Fragment, fragment_path)?;

        let mut program = Self::from_sources(ctx, &vertex_source, &fragment_source)?;
        program.vertex_path = Some(vertex_path.to_path_buf());
        program.fragment_path = Some(fragment_path.to_path_buf());
        debug!(
            "linked shader program {:?} from {} and {}",
            program.handle,
            vertex_path.display(),
            fragment_path.display()
        );
        Ok(program)
    }

    /// Compiles and links in-memory sources.
    pub fn from_sources(
        ctx: &'ctx C,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Self, ShaderError> {
        let vertex = compile_stage(ctx, ShaderStage::Vertex, vertex_source)?;
        let fragment = match compile_stage(ctx, ShaderStage::Fragment, fragment_source) {
            Ok(fragment) => fragment,
            Err(err) => {
                ctx.delete_shader(vertex);
                return Err(err);
            }
        };

        let linked = ctx
            .create_program()
            .map_err(ShaderError::from)
            .and_then(|program| match ctx.link_program(program, &[vertex, fragment]) {
                Ok(()) => Ok(program),
                Err(log) => {
                    ctx.delete_program(program);
                    Err(ShaderError::Link { log })
                }
            });
        // Stage objects are not needed once linking has been attempted.
        ctx.delete_shader(vertex);
        ctx.delete_shader(fragment);

        Ok(Self {
            ctx,
            handle: linked?,
            vertex_path: None,
            fragment_path: None,
        })
    }

    /// Like [`from_files`](Self::from_files), with compile and link failures
    /// handled according to `policy`.
    ///
    /// I/O errors are always returned.
    pub fn load(
        ctx: &'ctx C,
        vertex_path: impl AsRef<Path>,
        fragment_path: impl AsRef<Path>,
        policy: ShaderPolicy,
    ) -> Result<Option<Self>, ShaderError> {
        match Self::from_files(ctx, vertex_path, fragment_path) {
            Ok(program) => Ok(Some(program)),
            Err(err @ (ShaderError::Compile { .. } | ShaderError::Link { .. }))
                if policy == ShaderPolicy::WarnAndContinue =>
            {
                warn!("{err}");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Makes this program current in the context.
    pub fn use_program(&self) {
        self.ctx.use_program(Some(self.handle));
    }

    pub fn handle(&self) -> C::Program {
        self.handle
    }

    pub fn vertex_path(&self) -> Option<&Path> {
        self.vertex_path.as_deref()
    }

    pub fn fragment_path(&self) -> Option<&Path> {
        self.fragment_path.as_deref()
    }

    /// Uploads `value` to the uniform `name`.
    ///
    /// Names the program does not expose (misspelled, or optimized out by
    /// the driver) are ignored.
    pub fn set_uniform(&self, name: &str, value: impl Into<UniformValue>) {
        match self.ctx.uniform_location(self.handle, name) {
            Some(location) => self.ctx.set_uniform(&location, value.into()),
            None => trace!("uniform {name} not active in program {:?}", self.handle),
        }
    }

    pub fn set_bool(&self, name: &str, value: bool) {
        self.set_uniform(name, value);
    }

    pub fn set_int(&self, name: &str, value: i32) {
        self.set_uniform(name, value);
    }

    pub fn set_float(&self, name: &str, value: f32) {
        self.set_uniform(name, value);
    }

    pub fn set_vec2(&self, name: &str, value: Vec2) {
        self.set_uniform(name, value);
    }

    pub fn set_vec3(&self, name: &str, value: Vec3) {
        self.set_uniform(name, value);
    }

    pub fn set_vec4(&self, name: &str, value: Vec4) {
        self.set_uniform(name, value);
    }

    pub fn set_mat3(&self, name: &str, value: &Mat3) {
        self.set_uniform(name, *value);
    }

    pub fn set_mat4(&self, name: &str, value: &Mat4) {
        self.set_uniform(name, *value);
    }
}

impl<C: RenderContext> Drop for ShaderProgram<'_, C> {
    fn drop(&mut self) {
        self.ctx.delete_program(self.handle);
    }
}

impl<C: RenderContext> fmt::Debug for ShaderProgram<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShaderProgram")
            .field("handle", &self.handle)
            .field("vertex_path", &self.vertex_path)
            .field("fragment_path", &self.fragment_path)
            .finish()
    }
}

fn read_source(stage: ShaderStage, path: &Path) -> Result<String, ShaderError> {
    fs::read_to_string(path).map_err(|source| ShaderError::Io {
        stage,
        path: path.to_path_buf(),
        source,
    })
}

fn compile_stage<C: RenderContext>(
    ctx: &C,
    stage: ShaderStage,
    source: &str,
) -> Result<C::Shader, ShaderError> {
    let shader = ctx.create_shader(stage)?;
    match ctx.compile_shader(shader, source) {
        Ok(()) => Ok(shader),
        Err(log) => {
            ctx.delete_shader(shader);
            Err(ShaderError::Compile { stage, log })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;
    use crate::gpu::HeadlessContext;

    const VERTEX: &str = r#"#version 330 core
layout (location = 0) in vec3 aPos;
layout (location = 1) in vec3 aNormal;

out vec3 Normal;

uniform mat4 model;
uniform mat4 view;
uniform mat4 projection;

void main()
{
    Normal = aNormal;
    gl_Position = projection * view * model * vec4(aPos, 1.0);
}
"#;

    const FRAGMENT: &str = r#"#version 330 core
in vec3 Normal;
out vec4 FragColor;

struct Light {
    vec3 direction;
    vec3 diffuse;
};

uniform Light light;
uniform bool lit;
uniform int mode;
uniform float mixValue;
uniform vec4 tint;

void main()
{
    float diff = max(dot(normalize(Normal), -light.direction), 0.0);
    FragColor = tint * vec4(light.diffuse * diff, mixValue);
}
"#;

    fn shader_file(source: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp shader");
        file.write_all(source.as_bytes()).expect("write shader");
        file
    }

    #[test]
    fn valid_pair_links_and_becomes_current() {
        let ctx = HeadlessContext::new();
        let vertex = shader_file(VERTEX);
        let fragment = shader_file(FRAGMENT);

        let program = ShaderProgram::from_files(&ctx, vertex.path(), fragment.path()).unwrap();
        program.use_program();
        assert_eq!(ctx.current_program(), Some(program.handle()));
        assert_eq!(program.vertex_path(), Some(vertex.path()));

        let counts = ctx.live_objects();
        assert_eq!((counts.shaders, counts.programs), (0, 1));

        drop(program);
        assert_eq!(ctx.live_objects().total(), 0);
        assert_eq!(ctx.current_program(), None);
    }

    #[test]
    fn syntax_error_reports_compile_log_without_leaks() {
        let ctx = HeadlessContext::new();
        let before = ctx.live_objects();
        let broken = FRAGMENT.replace("mixValue);", "mixValue)");

        let err = ShaderProgram::from_sources(&ctx, VERTEX, &broken).unwrap_err();
        match err {
            ShaderError::Compile { stage, log } => {
                assert_eq!(stage, ShaderStage::Fragment);
                assert!(!log.is_empty());
            }
            other => panic!("expected compile error, got {other:?}"),
        }
        assert_eq!(ctx.live_objects(), before);
    }

    #[test]
    fn recursive_struct_is_a_compile_error() {
        let ctx = HeadlessContext::new();
        let fragment = "#version 330 core\nout vec4 FragColor;\n\
                        struct Node { Node next; };\nuniform Node node;\n\
                        void main()\n{\n    FragColor = vec4(1.0);\n}\n";

        let err = ShaderProgram::from_sources(&ctx, VERTEX, fragment).unwrap_err();
        match err {
            ShaderError::Compile { stage, log } => {
                assert_eq!(stage, ShaderStage::Fragment);
                assert!(log.contains("cannot contain itself"), "{log}");
            }
            other => panic!("expected compile error, got {other:?}"),
        }
        assert_eq!(ctx.live_objects().total(), 0);
    }

    #[test]
    fn link_error_reports_log_without_leaks() {
        let ctx = HeadlessContext::new();
        let fragment = FRAGMENT.replace("in vec3 Normal;", "in vec3 Normal;\nin vec2 TexCoords;");

        let err = ShaderProgram::from_sources(&ctx, VERTEX, &fragment).unwrap_err();
        match err {
            ShaderError::Link { log } => assert!(log.contains("TexCoords")),
            other => panic!("expected link error, got {other:?}"),
        }
        assert_eq!(ctx.live_objects().total(), 0);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let ctx = HeadlessContext::new();
        let fragment = shader_file(FRAGMENT);
        let err =
            ShaderProgram::from_files(&ctx, "does/not/exist.vert", fragment.path()).unwrap_err();
        assert!(matches!(
            err,
            ShaderError::Io {
                stage: ShaderStage::Vertex,
                ..
            }
        ));
        assert_eq!(ctx.live_objects().total(), 0);
    }

    #[test]
    fn setters_upload_to_current_program() {
        let ctx = HeadlessContext::new();
        let program = ShaderProgram::from_sources(&ctx, VERTEX, FRAGMENT).unwrap();
        program.use_program();

        let model = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        program.set_mat4("model", &model);
        program.set_vec3("light.direction", Vec3::NEG_Y);
        program.set_bool("lit", true);
        program.set_int("mode", 2);
        program.set_float("mixValue", 0.2);
        program.set_vec4("tint", Vec4::ONE);

        let handle = program.handle();
        assert_eq!(ctx.uniform_value(handle, "model"), Some(UniformValue::Mat4(model)));
        assert_eq!(
            ctx.uniform_value(handle, "light.direction"),
            Some(UniformValue::Vec3(Vec3::NEG_Y))
        );
        assert_eq!(ctx.uniform_value(handle, "lit"), Some(UniformValue::Bool(true)));
        assert_eq!(ctx.uniform_value(handle, "mode"), Some(UniformValue::Int(2)));
        assert_eq!(ctx.uniform_value(handle, "mixValue"), Some(UniformValue::Float(0.2)));
        assert_eq!(ctx.uniform_value(handle, "light.diffuse"), None);
    }

    #[test]
    fn unknown_uniform_is_ignored() {
        let ctx = HeadlessContext::new();
        let program = ShaderProgram::from_sources(&ctx, VERTEX, FRAGMENT).unwrap();
        program.use_program();
        let uniforms = ctx.active_uniforms(program.handle());

        program.set_float("nonexistent_name", 1.0);

        for name in &uniforms {
            assert_eq!(ctx.uniform_value(program.handle(), name), None);
        }
        assert_eq!(ctx.active_uniforms(program.handle()), uniforms);
    }

    #[test]
    fn load_applies_policy() {
        let ctx = HeadlessContext::new();
        let vertex = shader_file(VERTEX);
        let broken = shader_file("#version 330 core\nvoid main()\n{\n");

        let warn = ShaderPolicy::WarnAndContinue;
        let loaded = ShaderProgram::load(&ctx, vertex.path(), broken.path(), warn).unwrap();
        assert!(loaded.is_none());

        let err = ShaderProgram::load(&ctx, vertex.path(), broken.path(), ShaderPolicy::FailFast)
            .unwrap_err();
        assert!(matches!(err, ShaderError::Compile { .. }));

        let err = ShaderProgram::load(&ctx, vertex.path(), "missing.frag", warn).unwrap_err();
        assert!(matches!(err, ShaderError::Io { .. }));
        assert_eq!(ctx.live_objects().total(), 0);
    }
}
