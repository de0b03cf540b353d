/// Default tile edge in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 32;

/// A rectangular unit of parallel work within the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    /// Pixel x of the top-left corner.
    pub x: u32,
    /// Pixel y of the top-left corner.
    pub y: u32,
    /// Tile width in pixels (may be smaller at the right edge).
    pub width: u32,
    /// Tile height in pixels (may be smaller at the bottom edge).
    pub height: u32,
}

impl Tile {
    /// Number of pixels in this tile.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Split a `width × height` image into a row-major grid of
/// `tile_size × tile_size` tiles.
///
/// The last column and row are clipped to the image rather than padded, so
/// the tiles are disjoint and cover the image exactly. Any zero argument
/// yields no tiles.
pub fn partition(width: u32, height: u32, tile_size: u32) -> Vec<Tile> {
    if width == 0 || height == 0 || tile_size == 0 {
        return Vec::new();
    }
    let mut tiles =
        Vec::with_capacity(width.div_ceil(tile_size) as usize * height.div_ceil(tile_size) as usize);
    let mut y = 0;
    while y < height {
        let th = tile_size.min(height - y);
        let mut x = 0;
        while x < width {
            let tw = tile_size.min(width - x);
            tiles.push(Tile {
                x,
                y,
                width: tw,
                height: th,
            });
            x += tw;
        }
        y += th;
    }
    tiles
}
