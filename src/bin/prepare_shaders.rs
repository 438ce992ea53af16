use std::path::Path;
use std::process::Command;

use anyhow::{Context, bail};
use log::*;

use ash_sdl_model_viewer::util::manifest_path;

/// Compiles each `shaders/source/*.glsl` into `shaders/compiled/*.spv`
/// requires glslc on the path (ie, from the vulkan sdk)
pub fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let source_dir = manifest_path(["shaders", "source"]);
    let compiled_dir = manifest_path(["shaders", "compiled"]);
    std::fs::create_dir_all(&compiled_dir)?;

    let entries = std::fs::read_dir(&source_dir)
        .with_context(|| format!("failed to read shader sources: {source_dir:?}"))?;

    for entry in entries {
        let in_path = entry?.path();
        let Some(file_name) = in_path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if !file_name.ends_with(".glsl") {
            continue;
        }

        let stage = shader_stage(file_name)?;
        let out_path = compiled_dir.join(file_name.replace(".glsl", ".spv"));

        compile(&in_path, stage, &out_path)?;
        info!("compiled {file_name}");
    }

    Ok(())
}

fn shader_stage(file_name: &str) -> anyhow::Result<&'static str> {
    if file_name.contains(".vert") {
        Ok("vert")
    } else if file_name.contains(".frag") {
        Ok("frag")
    } else {
        bail!("unable to determine shader stage for {file_name}")
    }
}

fn compile(in_path: &Path, stage: &str, out_path: &Path) -> anyhow::Result<()> {
    let output = Command::new("glslc")
        .arg(format!("-fshader-stage={stage}"))
        .arg(in_path)
        .arg("-o")
        .arg(out_path)
        .output()
        .context("failed to run glslc")?;

    if !output.status.success() {
        bail!(
            "failed to compile {in_path:?}:\n{}",
            String::from_utf8_lossy(&output.stderr)
        );
    }

    Ok(())
}
