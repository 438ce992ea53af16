use std::path::{Path, PathBuf};

use anyhow::Context;
use image::{DynamicImage, ImageReader};

pub fn manifest_path<'a>(segments: impl IntoIterator<Item = &'a str>) -> PathBuf {
    let segments = segments.into_iter();
    let full_path = [env!("CARGO_MANIFEST_DIR")].into_iter().chain(segments);
    full_path.collect()
}

/// Absolute paths pass through; anything else is taken relative to the crate root
pub fn resolve_asset_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        Path::new(env!("CARGO_MANIFEST_DIR")).join(path)
    }
}

pub fn load_image(file_path: &Path) -> anyhow::Result<DynamicImage> {
    let image = ImageReader::open(file_path)
        .with_context(|| format!("failed to open image: {file_path:?}"))?
        .decode()
        .with_context(|| format!("failed to decode image: {file_path:?}"))?;

    Ok(image)
}

/// The file name for log messages and debug names
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_paths_start_at_the_crate_root() {
        let path = manifest_path(["shaders", "compiled"]);
        assert_eq!(
            path,
            Path::new(env!("CARGO_MANIFEST_DIR")).join("shaders/compiled")
        );
    }

    #[test]
    fn absolute_paths_are_kept() {
        let path = Path::new("/tmp/texture.png");
        assert_eq!(resolve_asset_path(path), path);
    }

    #[test]
    fn display_name_is_the_file_name() {
        assert_eq!(display_name(Path::new("textures/viking_room.png")), "viking_room.png");
    }

    #[test]
    fn missing_image_is_an_error() {
        assert!(load_image(Path::new("/definitely/not/here.png")).is_err());
    }
}
