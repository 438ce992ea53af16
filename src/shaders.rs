use std::io::Cursor;
use std::path::{Path, PathBuf};

use log::*;

use crate::renderer::{RendererError, ShaderCode};

/// Produces SPIR-V words for a compiled shader
pub trait ShaderLoader {
    fn load(&self, path: &Path) -> Result<Vec<u32>, RendererError>;
}

/// Reads precompiled `.spv` files, as written by the `prepare_shaders` binary
pub struct SpvFileLoader;

impl ShaderLoader for SpvFileLoader {
    fn load(&self, path: &Path) -> Result<Vec<u32>, RendererError> {
        let shader_error = |source| RendererError::Shader {
            path: path.to_path_buf(),
            source,
        };

        let bytes = std::fs::read(path).map_err(shader_error)?;
        let words = parse_spv(&bytes).map_err(shader_error)?;

        debug!("loaded shader {path:?} ({} words)", words.len());

        Ok(words)
    }
}

/// Checks the magic number and realigns the bytes into words
pub fn parse_spv(bytes: &[u8]) -> Result<Vec<u32>, std::io::Error> {
    ash::util::read_spv(&mut Cursor::new(bytes))
}

pub fn load_shader_code(
    loader: &impl ShaderLoader,
    vertex_path: &Path,
    fragment_path: &Path,
) -> Result<ShaderCode, RendererError> {
    Ok(ShaderCode {
        vertex: loader.load(vertex_path)?,
        fragment: loader.load(fragment_path)?,
    })
}

/// `shaders/compiled/<name>.<stage>.spv`, the layout `prepare_shaders` writes
pub fn compiled_shader_path(compiled_dir: &Path, name: &str, stage: &str) -> PathBuf {
    compiled_dir.join(format!("{name}.{stage}.spv"))
}
