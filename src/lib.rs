pub mod app;
pub mod config;
pub mod mesh;
pub mod renderer;
pub mod shaders;
pub mod util;

pub use app::App;
pub use config::AppConfig;
pub use mesh::{MeshLoader, ObjLoader, Vertex};
pub use renderer::{Renderer, RendererConfig, SceneDescription};
pub use shaders::{ShaderLoader, SpvFileLoader, load_shader_code};
