//! Cutting the month's image into the 4x4 grid of collectable pieces.

use std::io::Cursor;

use image::ImageFormat;

/// Cells per grid row and column.
pub const GRID_SIDE: u32 = 4;
/// Pieces per puzzle, indexed row-major from 0.
pub const PIECE_COUNT: u8 = 16;

#[derive(Debug, thiserror::Error)]
pub enum TileError {
    #[error("piece index {0} is outside the 4x4 grid")]
    OutOfRange(u8),

    #[error("image could not be processed: {0}")]
    Image(#[from] image::ImageError),

    #[error("image is too small to cut into a 4x4 grid")]
    TooSmall,
}

/// MIME type of the encoded image, `None` when the bytes are not a
/// recognised image format.
pub fn image_content_type(bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes).ok().map(|f| f.to_mime_type())
}

/// PNG of grid cell `index`. Cells are `width/4 x height/4`; leftover
/// pixels on the right and bottom edges belong to no piece.
pub fn piece_tile(image_bytes: &[u8], index: u8) -> Result<Vec<u8>, TileError> {
    if index >= PIECE_COUNT {
        return Err(TileError::OutOfRange(index));
    }
    let img = image::load_from_memory(image_bytes)?;
    let (cell_w, cell_h) = (img.width() / GRID_SIDE, img.height() / GRID_SIDE);
    if cell_w == 0 || cell_h == 0 {
        return Err(TileError::TooSmall);
    }

    let row = u32::from(index) / GRID_SIDE;
    let col = u32::from(index) % GRID_SIDE;
    let tile = img.crop_imm(col * cell_w, row * cell_h, cell_w, cell_h);

    let mut out = Cursor::new(Vec::new());
    tile.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

#[cfg(test)]
pub(crate) fn sample_png(width: u32, height: u32) -> Vec<u8> {
    // each grid cell gets its own red value so tiles can be told apart
    let img = image::RgbaImage::from_fn(width, height, |x, y| {
        let cell = (y / (height / GRID_SIDE).max(1)) * GRID_SIDE + x / (width / GRID_SIDE).max(1);
        image::Rgba([(cell * 10) as u8, 0, 200, 255])
    });
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut out, ImageFormat::Png)
        .expect("encode sample png");
    out.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_png_content_type() {
        assert_eq!(image_content_type(&sample_png(8, 8)), Some("image/png"));
        assert_eq!(image_content_type(b"definitely not an image"), None);
    }

    #[test]
    fn tile_is_the_requested_cell() {
        let png = sample_png(16, 8);
        let tile = piece_tile(&png, 6).unwrap();

        let decoded = image::load_from_memory(&tile).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (4, 2));
        // index 6 is row 1, column 2
        assert_eq!(decoded.get_pixel(0, 0)[0], 60);
        assert_eq!(decoded.get_pixel(3, 1)[0], 60);
    }

    #[test]
    fn leftover_pixels_are_dropped() {
        let png = sample_png(10, 10);
        let tile = piece_tile(&png, 15).unwrap();
        let decoded = image::load_from_memory(&tile).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (2, 2));
    }

    #[test]
    fn rejects_out_of_range_index() {
        let err = piece_tile(&sample_png(8, 8), 16).unwrap_err();
        assert!(matches!(err, TileError::OutOfRange(16)));
    }

    #[test]
    fn rejects_images_smaller_than_the_grid() {
        let err = piece_tile(&sample_png(3, 3), 0).unwrap_err();
        assert!(matches!(err, TileError::TooSmall));
    }

    #[test]
    fn rejects_garbage_bytes() {
        let err = piece_tile(b"nope", 0).unwrap_err();
        assert!(matches!(err, TileError::Image(_)));
    }
}
