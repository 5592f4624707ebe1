//! Raster images drawn by point and pattern symbolizers.

use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use tiny_skia::{ColorU8, IntSize, Pixmap};

use crate::error::MapError;

/// Image loaded from a file, kept as a premultiplied pixmap ready for drawing.
///
/// Two images are equal if they were loaded from the same path.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "PathBuf", into = "PathBuf")]
pub struct SymbolImage {
    path: PathBuf,
    pixmap: Arc<Pixmap>,
}

impl Debug for SymbolImage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SymbolImage({:?}, {}x{})",
            self.path,
            self.width(),
            self.height()
        )
    }
}

impl PartialEq for SymbolImage {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl TryFrom<PathBuf> for SymbolImage {
    type Error = MapError;

    fn try_from(value: PathBuf) -> Result<Self, Self::Error> {
        Self::load(value)
    }
}

impl From<SymbolImage> for PathBuf {
    fn from(val: SymbolImage) -> Self {
        val.path
    }
}

impl SymbolImage {
    /// Reads and decodes an image file. The format is detected from the file content.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MapError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|err| MapError::io(path, err))?;
        let image = image::load_from_memory(&bytes)?.to_rgba8();

        log::debug!(
            "Loaded symbol image {path:?} ({}x{})",
            image.width(),
            image.height()
        );

        Self::from_image(path, &image)
    }

    /// Creates a symbol from decoded straight-alpha pixels. `path` identifies the image.
    pub fn from_image(path: impl Into<PathBuf>, image: &RgbaImage) -> Result<Self, MapError> {
        let invalid_size = MapError::InvalidSize {
            width: image.width(),
            height: image.height(),
        };
        let Some(size) = IntSize::from_wh(image.width(), image.height()) else {
            return Err(invalid_size);
        };

        let data = image
            .pixels()
            .flat_map(|pixel| {
                let [r, g, b, a] = pixel.0;
                let color = ColorU8::from_rgba(r, g, b, a).premultiply();
                [color.red(), color.green(), color.blue(), color.alpha()]
            })
            .collect();
        let pixmap = Pixmap::from_vec(data, size).ok_or(invalid_size)?;

        Ok(Self {
            path: path.into(),
            pixmap: Arc::new(pixmap),
        })
    }

    /// File the image was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub(crate) fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use image::Rgba;

    use super::*;

    #[test]
    fn load_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dot.png");
        let mut image = RgbaImage::from_pixel(3, 2, Rgba([255, 0, 0, 255]));
        image.put_pixel(0, 0, Rgba([0, 0, 255, 128]));
        image.save(&path).unwrap();

        let symbol = SymbolImage::load(&path).unwrap();
        assert_eq!((symbol.width(), symbol.height()), (3, 2));
        assert_eq!(symbol.path(), path);

        // Pixels are premultiplied.
        let corner = symbol.pixmap().pixel(0, 0).unwrap();
        assert_eq!((corner.blue(), corner.alpha()), (128, 128));
        let color = symbol.pixmap().pixel(2, 1).unwrap().demultiply();
        assert_eq!(
            [color.red(), color.green(), color.blue(), color.alpha()],
            [255, 0, 0, 255]
        );
    }

    #[test]
    fn load_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert_matches!(
            SymbolImage::load(dir.path().join("missing.png")),
            Err(MapError::Io { .. })
        );

        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not an image").unwrap();
        assert_matches!(SymbolImage::load(&path), Err(MapError::Image(_)));

        assert_matches!(
            SymbolImage::from_image("empty", &RgbaImage::new(0, 0)),
            Err(MapError::InvalidSize { .. })
        );
    }
}
