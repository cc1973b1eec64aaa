use std::env;

use anyhow::{anyhow, Context, Result};
use glam::{Vec2, Vec3};
use log::info;

use glkit::geometry::{self, CUBE_POSITIONS, CUBE_STRIDE, CUBE_VERTICES};
use glkit::{
    drive_camera, load_texture_or_empty, Camera, FrameClock, HeadlessContext, InputState, KeyCode,
    PrimitiveMode, RenderContext, ShaderPolicy, ShaderProgram, TextureOptions,
    VertexLayoutBuilder,
};

const SCREEN_WIDTH: f32 = 800.0;
const SCREEN_HEIGHT: f32 = 600.0;
const FRAME_SECONDS: f32 = 1.0 / 60.0;
const DEFAULT_FRAMES: usize = 120;

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse()?;
    let ctx = HeadlessContext::new();

    let policy = if options.strict {
        ShaderPolicy::FailFast
    } else {
        ShaderPolicy::WarnAndContinue
    };
    let program = ShaderProgram::load(&ctx, &options.vertex_path, &options.fragment_path, policy)
        .context("failed to load shader program")?;
    match &program {
        Some(program) => println!(
            "Linked shader program {} from {} and {}",
            program.handle().raw(),
            options.vertex_path,
            options.fragment_path
        ),
        None => println!("Shader program unavailable; frames will be skipped"),
    }

    let layout = geometry::position_normal_uv_layout();
    let mesh = VertexLayoutBuilder::new(&ctx)
        .with_validation(true)
        .build_unindexed(&CUBE_VERTICES, &layout)
        .context("failed to build cube mesh")?;
    let vertex_count = (CUBE_VERTICES.len() / CUBE_STRIDE) as u32;
    println!(
        "Cube mesh: {vertex_count} vertices across {} attributes",
        layout.attributes().len()
    );

    let texture_options = TextureOptions { flip_vertically: true };
    let mut textures = Vec::new();
    for (unit, path) in [(0, &options.diffuse), (1, &options.specular)] {
        if let Some(path) = path {
            ctx.active_texture(unit);
            let texture = load_texture_or_empty(&ctx, path, texture_options)
                .with_context(|| format!("failed to load {path}"))?;
            textures.push((unit, texture));
        }
    }

    if let Some(program) = &program {
        program.use_program();
        program.set_int("material.diffuse", 0);
        program.set_int("material.specular", 1);
    }

    let mut camera = Camera::new(Vec3::new(0.0, 0.0, 3.0));
    let input = InputState::new();
    let mut clock = FrameClock::new();

    for frame in 0..options.frames {
        script_input(&input, frame, options.frames);
        let delta = clock.tick(frame as f32 * FRAME_SECONDS);
        drive_camera(&mut camera, &input, delta);

        let Some(program) = &program else {
            continue;
        };
        program.use_program();
        program.set_vec3("light.position", camera.position);
        program.set_vec3("light.direction", camera.front());
        program.set_float("light.cutOff", 12.5_f32.to_radians().cos());
        program.set_vec3("viewPos", camera.position);
        program.set_vec3("light.ambient", Vec3::splat(0.2));
        program.set_vec3("light.diffuse", Vec3::splat(0.5));
        program.set_vec3("light.specular", Vec3::ONE);
        program.set_float("light.constant", 1.0);
        program.set_float("light.linear", 0.09);
        program.set_float("light.quadratic", 0.032);
        program.set_float("material.shininess", 64.0);

        let projection = camera.projection_matrix(SCREEN_WIDTH / SCREEN_HEIGHT, 0.1, 100.0);
        program.set_mat4("projection", &projection);
        program.set_mat4("view", &camera.view_matrix());

        for &(unit, texture) in &textures {
            ctx.active_texture(unit);
            ctx.bind_texture(Some(texture));
        }

        ctx.bind_vertex_array(Some(mesh.vertex_array));
        for index in 0..CUBE_POSITIONS.len() {
            program.set_mat4("model", &geometry::cube_model(index));
            ctx.draw_arrays(PrimitiveMode::Triangles, 0, vertex_count);
        }
    }

    let position = camera.position;
    println!(
        "Camera position=({:.2}, {:.2}, {:.2}) yaw={:.2} pitch={:.2} zoom={:.2}",
        position.x,
        position.y,
        position.z,
        camera.yaw(),
        camera.pitch(),
        camera.zoom()
    );
    println!(
        "Issued {} draw calls over {} frames",
        ctx.draw_calls().len(),
        options.frames
    );

    ctx.bind_vertex_array(None);
    mesh.release(&ctx);
    for (_, texture) in textures {
        ctx.delete_texture(texture);
    }
    drop(program);
    let live = ctx.live_objects();
    info!("objects at teardown: {live:?}");
    println!("Live objects after teardown: {}", live.total());
    Ok(())
}

/// Walks forward for the first third of the session, sweeps the cursor to
/// the right throughout and zooms in once at the halfway mark.
fn script_input(input: &InputState, frame: usize, frames: usize) {
    if frame == 0 {
        input.set_key_down(KeyCode::W);
    }
    if frame == frames / 3 {
        input.set_key_up(KeyCode::W);
    }
    if frame == frames / 2 {
        input.add_scroll(3.0);
    }
    let x = SCREEN_WIDTH / 2.0 + frame as f32 * 2.0;
    input.set_cursor_position(Vec2::new(x, SCREEN_HEIGHT / 2.0));
}

struct CliOptions {
    vertex_path: String,
    fragment_path: String,
    frames: usize,
    strict: bool,
    diffuse: Option<String>,
    specular: Option<String>,
}

impl CliOptions {
    fn parse() -> Result<Self> {
        const USAGE: &str = "Usage: lit-cube <vertex.glsl> <fragment.glsl> [--frames N] [--strict] \
                             [--diffuse <image>] [--specular <image>]";
        let mut args = env::args().skip(1);
        let (Some(vertex_path), Some(fragment_path)) = (args.next(), args.next()) else {
            return Err(anyhow!(USAGE));
        };
        let mut frames = DEFAULT_FRAMES;
        let mut strict = false;
        let mut diffuse = None;
        let mut specular = None;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--strict" => strict = true,
                "--frames" => {
                    let value = args.next().ok_or_else(|| anyhow!("--frames expects a value"))?;
                    frames = value
                        .parse()
                        .with_context(|| format!("invalid frame count {value}"))?;
                }
                "--diffuse" => {
                    diffuse = Some(args.next().ok_or_else(|| anyhow!("--diffuse expects a path"))?);
                }
                "--specular" => {
                    let path = args.next().ok_or_else(|| anyhow!("--specular expects a path"))?;
                    specular = Some(path);
                }
                other => {
                    return Err(anyhow!("Unknown argument: {other}. {USAGE}"));
                }
            }
        }
        Ok(Self {
            vertex_path,
            fragment_path,
            frames,
            strict,
            diffuse,
            specular,
        })
    }
}
