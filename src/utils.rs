use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

// Raster extensions recognized when scanning image folders
pub const IMG_FORMATS: &[&str] = &["bmp", "jpeg", "jpg", "png", "tif", "tiff", "webp"];

/// Create a progress bar with the given length and label
pub fn create_progress_bar(len: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::default_bar()
        .template(&format!(
            "{{spinner:.green}} [{}] [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}})",
            label
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb
}

/// Whether a path carries one of the known raster extensions (case-insensitive)
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMG_FORMATS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Final path component as a string, if it is valid UTF-8
pub fn file_name_str(path: &Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_image_file() {
        assert!(is_image_file(Path::new("a.jpg")));
        assert!(is_image_file(Path::new("dir/b.PNG")));
        assert!(!is_image_file(Path::new("a.txt")));
        assert!(!is_image_file(Path::new("noext")));
    }
}
