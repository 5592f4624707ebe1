use std::path::Path;

use image::{DynamicImage, ImageFormat, RgbaImage};
use tiny_skia::Pixmap;

use crate::error::MapError;
use crate::map::Map;
use crate::render::Renderer;

/// Image format of the output file, chosen by its extension (`png`, `jpg` or `jpeg`).
pub fn output_format(path: &Path) -> Result<ImageFormat, MapError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "png" => Ok(ImageFormat::Png),
        "jpg" | "jpeg" => Ok(ImageFormat::Jpeg),
        _ => Err(MapError::UnsupportedFormat(path.display().to_string())),
    }
}

/// Converts premultiplied pixmap pixels into a straight-alpha RGBA image.
pub fn pixmap_to_image(pixmap: &Pixmap) -> Result<RgbaImage, MapError> {
    let data: Vec<u8> = pixmap
        .pixels()
        .iter()
        .flat_map(|pixel| {
            let color = pixel.demultiply();
            [color.red(), color.green(), color.blue(), color.alpha()]
        })
        .collect();

    RgbaImage::from_raw(pixmap.width(), pixmap.height(), data).ok_or(MapError::InvalidSize {
        width: pixmap.width(),
        height: pixmap.height(),
    })
}

/// Renders the map and writes the image to `path`, replacing an existing file.
///
/// The format is chosen by the file extension. JPEG has no alpha channel, so transparent areas
/// come out black.
pub fn render_to_file(map: &Map, path: impl AsRef<Path>) -> Result<(), MapError> {
    let path = path.as_ref();
    let format = output_format(path)?;

    let pixmap = Renderer::new(map)?.render()?;
    let image = pixmap_to_image(&pixmap)?;

    match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgba8(image)
            .to_rgb8()
            .save_with_format(path, format)?,
        _ => image.save_with_format(path, format)?,
    }

    log::info!(
        "Map image {}x{} written to {path:?}",
        pixmap.width(),
        pixmap.height()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use stylemap_types::Rect;

    use super::*;
    use crate::color::Color;

    #[test]
    fn format_by_extension() {
        assert_eq!(output_format(Path::new("map.png")).unwrap(), ImageFormat::Png);
        assert_eq!(output_format(Path::new("map.JPG")).unwrap(), ImageFormat::Jpeg);
        assert_eq!(output_format(Path::new("a/map.jpeg")).unwrap(), ImageFormat::Jpeg);
        assert_matches!(
            output_format(Path::new("map.tiff")),
            Err(MapError::UnsupportedFormat(_))
        );
        assert_matches!(
            output_format(Path::new("map")),
            Err(MapError::UnsupportedFormat(_))
        );
    }

    #[test]
    fn write_png_and_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let mut map = Map::new(40, 30).unwrap();
        map.set_background(Color::rgba(0, 128, 255, 255));
        map.zoom_to_box(Rect::new(0.0, 0.0, 4.0, 3.0)).unwrap();

        let png = dir.path().join("map.png");
        render_to_file(&map, &png).unwrap();
        let decoded = image::open(&png).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (40, 30));
        assert_eq!(decoded.get_pixel(20, 15).0, [0, 128, 255, 255]);

        let jpeg = dir.path().join("map.jpg");
        render_to_file(&map, &jpeg).unwrap();
        assert_eq!(image::open(&jpeg).unwrap().to_rgb8().dimensions(), (40, 30));
    }

    #[test]
    fn nothing_is_written_without_extent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.png");
        let map = Map::new(40, 30).unwrap();

        assert_matches!(render_to_file(&map, &path), Err(MapError::ExtentNotSet));
        assert!(!path.exists());
    }

    #[test]
    fn unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut map = Map::new(4, 3).unwrap();
        map.zoom_to_box(Rect::new(0.0, 0.0, 4.0, 3.0)).unwrap();

        assert_matches!(
            render_to_file(&map, dir.path().join("missing/dir/map.png")),
            Err(MapError::Image(_))
        );
    }
}
