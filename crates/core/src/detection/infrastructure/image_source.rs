use std::path::Path;

use image::RgbImage;

use crate::detection::domain::face_engine::DetectionError;

/// Decodes an image file into 8-bit RGB.
pub fn load_rgb(path: &Path) -> Result<RgbImage, DetectionError> {
    image::open(path)
        .map(|img| img.to_rgb8())
        .map_err(|source| DetectionError::Image {
            path: path.to_path_buf(),
            source,
        })
}

/// Reads only the header to get `(width, height)`.
pub fn dimensions(path: &Path) -> Result<(u32, u32), DetectionError> {
    image::image_dimensions(path).map_err(|source| DetectionError::Image {
        path: path.to_path_buf(),
        source,
    })
}

pub fn read_bytes(path: &Path) -> Result<Vec<u8>, DetectionError> {
    std::fs::read(path).map_err(|source| DetectionError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_test_image(dir: &Path, width: u32, height: u32) -> PathBuf {
        let path = dir.join("test.png");
        let mut img = RgbImage::new(width, height);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgb([50, 100, 200]);
        }
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn test_load_rgb_reads_pixels() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_image(dir.path(), 40, 30);
        let img = load_rgb(&path).unwrap();
        assert_eq!(img.dimensions(), (40, 30));
        assert_eq!(img.get_pixel(0, 0).0, [50, 100, 200]);
    }

    #[test]
    fn test_dimensions_matches_decoded_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_image(dir.path(), 100, 80);
        assert_eq!(dimensions(&path).unwrap(), (100, 80));
    }

    #[test]
    fn test_missing_file_is_image_error() {
        let err = load_rgb(Path::new("/nonexistent/test.png")).unwrap_err();
        assert!(matches!(err, DetectionError::Image { .. }));
    }

    #[test]
    fn test_non_image_file_fails_to_decode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.png");
        std::fs::write(&path, b"definitely not a png").unwrap();
        assert!(load_rgb(&path).is_err());
        assert!(dimensions(&path).is_err());
    }

    #[test]
    fn test_read_bytes_missing_file_is_io_error() {
        let err = read_bytes(Path::new("/nonexistent/test.png")).unwrap_err();
        assert!(matches!(err, DetectionError::Io { .. }));
    }
}
