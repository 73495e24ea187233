//! Texture sources and decoded RGBA8 pixel data.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

/// Texture data in CPU-friendly format before GPU upload.
#[derive(Clone, Debug)]
pub struct TextureData {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
}

/// Supported texture formats.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TextureFormat {
    Rgba8,
}

/// Where the surface texture of the mesh comes from.
#[derive(Clone, Debug, PartialEq)]
pub enum TextureSource {
    /// PNG file on disk.
    File(PathBuf),
    /// Generated checkerboard of the given edge length.
    Checkerboard(u32),
}

impl TextureSource {
    /// Decode the source into RGBA8 pixels.
    pub fn decode(&self) -> Result<TextureData> {
        match self {
            TextureSource::File(path) => TextureData::load_png(path),
            TextureSource::Checkerboard(size) => TextureData::create_test_texture(*size),
        }
    }

    /// Short human-readable description for logs.
    pub fn describe(&self) -> String {
        match self {
            TextureSource::File(path) => path.display().to_string(),
            TextureSource::Checkerboard(size) => format!("checkerboard {size}x{size}"),
        }
    }
}

impl TextureData {
    /// Wrap RGBA8 pixels, checking the byte count against the dimensions.
    pub fn new_rgba8(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            bail!(
                "RGBA8 texture {}x{} needs {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            );
        }
        Ok(Self {
            data,
            width,
            height,
            format: TextureFormat::Rgba8,
        })
    }

    /// Load texture from PNG file.
    pub fn load_png<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        log::info!("Loading texture from {:?}", path);

        let img = image::open(path).with_context(|| format!("Failed to open image {:?}", path))?;

        // Image rows run top-down while texture coordinates grow upwards.
        let rgba = img.flipv().to_rgba8();
        let (width, height) = rgba.dimensions();
        let data = rgba.into_raw();

        log::info!("Loaded texture {}x{} with {} bytes", width, height, data.len());

        Self::new_rgba8(width, height, data)
    }

    /// Create a simple test texture (checkerboard pattern).
    pub fn create_test_texture(size: u32) -> Result<Self> {
        if size == 0 {
            bail!("Checkerboard texture size must be non-zero");
        }
        let mut data = Vec::with_capacity(size as usize * size as usize * 4);

        for y in 0..size {
            for x in 0..size {
                let checker = ((x / 8) + (y / 8)) % 2;
                if checker == 0 {
                    // Orange square
                    data.extend_from_slice(&[255, 140, 0, 255]);
                } else {
                    // Gray square
                    data.extend_from_slice(&[128, 128, 128, 255]);
                }
            }
        }

        Self::new_rgba8(size, size, data)
    }

    /// Get the number of bytes per pixel for the format.
    pub fn bytes_per_pixel(&self) -> u32 {
        match self.format {
            TextureFormat::Rgba8 => 4,
        }
    }

    /// Check if the texture data is valid.
    pub fn is_valid(&self) -> bool {
        let expected_size = (self.width * self.height * self.bytes_per_pixel()) as usize;
        self.data.len() == expected_size && self.width > 0 && self.height > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkerboard_is_valid() {
        let tex = TextureSource::Checkerboard(16).decode().unwrap();
        assert!(tex.is_valid());
        assert_eq!((tex.width, tex.height), (16, 16));
        assert_eq!(&tex.data[..4], &[255, 140, 0, 255]);
        // Second 8x8 cell starts at x = 8.
        assert_eq!(&tex.data[8 * 4..8 * 4 + 4], &[128, 128, 128, 255]);
    }

    #[test]
    fn zero_sized_checkerboard_is_rejected() {
        assert!(TextureSource::Checkerboard(0).decode().is_err());
    }

    #[test]
    fn size_mismatch_is_rejected() {
        assert!(TextureData::new_rgba8(2, 2, vec![0; 15]).is_err());
    }

    #[test]
    fn missing_file_fails_with_path() {
        let source = TextureSource::File(PathBuf::from("no/such/orange.png"));
        let err = source.decode().unwrap_err();
        assert!(format!("{err}").contains("orange.png"));
    }
}
