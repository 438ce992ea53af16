use anyhow::Context;
use log::*;
use sdl3::sys::timer::SDL_DelayPrecise;

use ash_sdl_model_viewer::util::{display_name, load_image};
use ash_sdl_model_viewer::*;

fn main() -> Result<(), anyhow::Error> {
    pretty_env_logger::init();

    let config = AppConfig::load()?;

    let sdl = sdl3::init()?;
    let video_subsystem = sdl.video()?;
    let window = video_subsystem
        .window(&config.window_title, config.window_width, config.window_height)
        .position_centered()
        .resizable()
        .vulkan()
        .build()?;

    let model_file = config.model_file();
    let (vertices, indices) = ObjLoader.load(&model_file)?.into_indexed();
    info!(
        "loaded {}: {} vertices, {} indices",
        display_name(&model_file),
        vertices.len(),
        indices.len()
    );

    let texture_file = config.texture_file();
    let texture = load_image(&texture_file)?;
    let texture_name = display_name(&texture_file);

    let shaders = load_shader_code(
        &SpvFileLoader,
        &config.vertex_shader_file(),
        &config.fragment_shader_file(),
    )
    .context("run the prepare_shaders binary to compile the GLSL sources")?;

    let scene = SceneDescription {
        shaders,
        vertices: &vertices,
        indices: &indices,
        texture: &texture,
        texture_name: &texture_name,
        rotation_degrees_per_second: config.rotation_degrees_per_second,
    };
    let renderer = Renderer::init(Box::new(window), &config.renderer_config(), scene)?;
    info!(
        "rendering at {:?} with {:?} msaa",
        renderer.swapchain_extent(),
        renderer.msaa_samples()
    );
    let mut app = App::new(renderer);

    let frame_delay = config.frame_delay();
    let mut event_pump = sdl.event_pump()?;
    loop {
        app.handle_events(&mut event_pump);
        if app.state.quit {
            break;
        }

        app.frame()?;

        unsafe { SDL_DelayPrecise(frame_delay.as_nanos() as u64) };
    }

    app.renderer.drain_gpu()?;

    Ok(())
}
