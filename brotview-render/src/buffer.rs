use crate::tile::Tile;

/// Pre-fill color of a fresh frame. Pixels of tiles that failed to render
/// keep this color.
pub const PLACEHOLDER_COLOR: [u8; 4] = [48, 48, 48, 255];

/// An RGBA pixel buffer representing a rendered image.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderBuffer {
    pub width: u32,
    pub height: u32,
    /// RGBA pixel data, 4 bytes per pixel, row-major order.
    pub pixels: Vec<u8>,
}

impl RenderBuffer {
    /// Create a buffer filled with [`PLACEHOLDER_COLOR`].
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, PLACEHOLDER_COLOR)
    }

    pub fn filled(width: u32, height: u32, color: [u8; 4]) -> Self {
        let pixels = color.repeat(width as usize * height as usize);
        Self {
            width,
            height,
            pixels,
        }
    }

    /// RGBA of the pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }

    /// Copy a tile's RGBA data into the correct position in the buffer.
    pub fn blit_tile(&mut self, tile: &Tile, tile_pixels: &[u8]) {
        debug_assert_eq!(tile_pixels.len(), tile.pixel_count() * 4);
        let stride = self.width as usize * 4;
        let row_len = tile.width as usize * 4;
        for row in 0..tile.height as usize {
            let src_start = row * row_len;
            let dst_start = (tile.y as usize + row) * stride + tile.x as usize * 4;
            self.pixels[dst_start..dst_start + row_len]
                .copy_from_slice(&tile_pixels[src_start..src_start + row_len]);
        }
    }
}
