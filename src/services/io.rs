//! Image I/O operations service

use crate::{
    error::{Result, SnapEraseError},
    types::{ResultImage, SourceImage},
};
use image::GrayImage;
use std::path::{Path, PathBuf};

/// Input extensions accepted by [`ImageIo::is_supported_image`]
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// Suffix appended to the input stem for the default output file
const OUTPUT_SUFFIX: &str = "_no_bg";

/// Suffix appended to the input stem for the mask file
const MASK_SUFFIX: &str = "_mask";

/// Service for loading photographs and writing results
pub struct ImageIo;

impl ImageIo {
    /// Load and decode an image file
    ///
    /// The extension picks the decoder first; when that fails the format is
    /// guessed from the file contents.
    ///
    /// # Errors
    /// - `Io` when the file does not exist or cannot be read
    /// - `Image` when neither decoder accepts the data
    ///
    /// # Examples
    /// ```rust,no_run
    /// use snap_erase::services::ImageIo;
    ///
    /// let image = ImageIo::load("portrait.jpg")?;
    /// println!("{}x{}", image.width(), image.height());
    /// # Ok::<(), snap_erase::SnapEraseError>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<SourceImage> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SnapEraseError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("image file does not exist: {}", path.display()),
            )));
        }

        match image::open(path) {
            Ok(image) => Ok(SourceImage::from_dynamic(&image)),
            Err(e) => {
                log::debug!(
                    "Extension-based loading failed for {}: {e}. Attempting content-based detection.",
                    path.display()
                );
                let data = std::fs::read(path)?;
                Self::load_from_bytes(&data)
            },
        }
    }

    /// Decode an image held in memory, guessing the format from its contents
    ///
    /// # Errors
    /// - `Image` when the data is not a decodable image
    pub fn load_from_bytes(bytes: &[u8]) -> Result<SourceImage> {
        let image = image::load_from_memory(bytes)?;
        Ok(SourceImage::from_dynamic(&image))
    }

    /// Whether the path has one of the accepted photograph extensions
    /// (case-insensitive)
    #[must_use]
    pub fn is_supported_image<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                SUPPORTED_EXTENSIONS
                    .iter()
                    .any(|supported| ext.eq_ignore_ascii_case(supported))
            })
    }

    /// `dir/photo.jpg` → `dir/photo_no_bg.png`
    #[must_use]
    pub fn default_output_path<P: AsRef<Path>>(input: P) -> PathBuf {
        Self::sibling_png(input.as_ref(), OUTPUT_SUFFIX)
    }

    /// `dir/photo.jpg` → `dir/photo_mask.png`
    #[must_use]
    pub fn default_mask_path<P: AsRef<Path>>(input: P) -> PathBuf {
        Self::sibling_png(input.as_ref(), MASK_SUFFIX)
    }

    /// Save a result as PNG, creating missing parent directories
    ///
    /// # Errors
    /// - `Io` when the directory or file cannot be created
    /// - `Image` on PNG encoder failure
    pub fn save_result<P: AsRef<Path>>(result: &ResultImage, path: P) -> Result<()> {
        let path = path.as_ref();
        Self::create_parent(path)?;
        result.save_png(path)
    }

    /// Save the alpha channel of a result as a grayscale PNG
    ///
    /// # Errors
    /// - `Io` when the directory or file cannot be created
    /// - `Image` on PNG encoder failure
    pub fn save_alpha_mask<P: AsRef<Path>>(result: &ResultImage, path: P) -> Result<()> {
        let path = path.as_ref();
        Self::create_parent(path)?;
        let (width, height) = result.dimensions();
        let alpha = GrayImage::from_fn(width, height, |x, y| {
            image::Luma([result.image().get_pixel(x, y)[3]])
        });
        alpha.save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }

    fn sibling_png(input: &Path, suffix: &str) -> PathBuf {
        let stem = input
            .file_stem()
            .map_or_else(|| "output".into(), |s| s.to_string_lossy());
        input.with_file_name(format!("{stem}{suffix}.png"))
    }

    fn create_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}
