//! # Spinning Cube
//!
//! Renders a red cube a few frames offscreen through wgpu, resizing once to
//! show the explicit projection update, and logs what each frame did.
//!
//! Run with `RUST_LOG=debug cargo run --bin spinning_cube` for engine detail.

use anyhow::Context;
use tartan::prelude::*;

const FRAMES: usize = 4;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let engine = WgpuEngine::new().context("no usable wgpu adapter")?;
    let config = RendererConfig::new().with_clear_color([0.05, 0.05, 0.08, 1.0]);
    let mut renderer = Renderer::with_config(engine, config)?;
    let mut host = SurfaceRegistry::new();

    let (width, height) = (640, 360);
    renderer.set_size(width, height)?;
    renderer.attach_to_host_surface(&mut host)?;

    let scene = Scene::new();
    let camera = PerspectiveCamera::new(75.0, width as f32 / height as f32, 0.1, 1000.0)?;
    camera.set_position(0.0, 0.0, 5.0);

    let cube = Mesh::new(
        box_geometry(2.0, 2.0, 2.0)?,
        Material::mesh_basic(MaterialParameters::new().color(0xff0000)),
    );
    scene.add_child(&cube)?;

    for frame in 0..FRAMES {
        let angle = frame as f32 * 0.4;
        cube.set_rotation(angle, angle, 0.0);

        if frame == FRAMES / 2 {
            renderer.set_size(480, 480)?;
            camera.set_aspect(1.0)?;
            camera.update_projection_matrix();
        }

        let info = renderer.render(&scene, &camera)?;
        log::info!(
            "frame {}: {} draw(s), {} vertices, {} upload(s)",
            info.frame,
            info.calls,
            info.vertices,
            info.uploads
        );
    }

    let surface = renderer.surface().id();
    let pixels = renderer.engine().read_pixels(surface)?;
    let (w, h) = renderer.surface().drawing_buffer_size();
    let centre = ((h / 2 * w + w / 2) * 4) as usize;
    log::info!(
        "centre pixel of {}x{} surface: {:?}",
        w,
        h,
        &pixels[centre..centre + 4]
    );

    Ok(())
}
