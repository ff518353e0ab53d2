use eframe::egui::ColorImage;

use crate::error::DownloadError;

/// Fetches the video thumbnail and decodes it for on-screen display.
/// Performs blocking I/O; call it from a blocking-capable thread.
pub fn fetch_thumbnail(url: &str) -> Result<ColorImage, DownloadError> {
    // Blocking HTTP GET; a non-2xx status is an error like any other
    let bytes = reqwest::blocking::get(url)?.error_for_status()?.bytes()?;
    decode_thumbnail(&bytes)
}

// Decode and bound the image to the 300x200 preview pane, then convert
// the raw RGBA bytes for egui without premultiplying alpha.
fn decode_thumbnail(bytes: &[u8]) -> Result<ColorImage, DownloadError> {
    let img = image::load_from_memory(bytes)?.thumbnail(300, 200).to_rgba8();
    let size = [img.width() as usize, img.height() as usize];
    Ok(ColorImage::from_rgba_unmultiplied(size, &img))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(decode_thumbnail(b"definitely not an image").is_err());
    }

    #[test]
    fn decoded_image_fits_the_preview_pane() {
        use std::io::Cursor;

        let img = image::DynamicImage::new_rgba8(640, 480);
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
            .unwrap();

        let decoded = decode_thumbnail(&bytes).unwrap();
        assert!(decoded.size[0] <= 300);
        assert!(decoded.size[1] <= 200);
    }
}
