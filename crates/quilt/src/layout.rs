//! Quilt tile-grid geometry.

pub const MIN_QUILT_SIZE: u32 = 256;
pub const MAX_QUILT_SIZE: u32 = 16384;
pub const MIN_GRID: u32 = 1;
pub const MAX_GRID: u32 = 32;

/// Pixel rectangle inside the quilt, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl TileRect {
    #[inline]
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    #[inline]
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn overlaps(&self, other: &TileRect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

/// Quilt settings. All constructors clamp into the supported ranges, so every
/// value of this type is valid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuiltLayout {
    quilt_width: u32,
    quilt_height: u32,
    columns: u32,
    rows: u32,
    tile_count: u32,
    /// Aspect of the full-screen camera render, not of a tile.
    render_aspect: f32,
}

impl Default for QuiltLayout {
    fn default() -> Self {
        Self::new(3360, 3360, 8, 6, 0.75)
    }
}

impl QuiltLayout {
    /// Layout using every tile of the grid.
    pub fn new(quilt_width: u32, quilt_height: u32, columns: u32, rows: u32, render_aspect: f32) -> Self {
        let columns = columns.clamp(MIN_GRID, MAX_GRID);
        let rows = rows.clamp(MIN_GRID, MAX_GRID);
        let render_aspect = if render_aspect.is_finite() && render_aspect > 0.0 {
            render_aspect
        } else {
            1.0
        };

        Self {
            quilt_width: quilt_width.clamp(MIN_QUILT_SIZE, MAX_QUILT_SIZE),
            quilt_height: quilt_height.clamp(MIN_QUILT_SIZE, MAX_QUILT_SIZE),
            columns,
            rows,
            tile_count: columns * rows,
            render_aspect,
        }
    }

    /// Same grid with fewer views than tiles; clamped to `[1, columns * rows]`.
    pub fn with_tile_count(mut self, tile_count: u32) -> Self {
        self.tile_count = tile_count.clamp(1, self.grid_size());
        self
    }

    #[inline]
    pub fn quilt_width(&self) -> u32 {
        self.quilt_width
    }

    #[inline]
    pub fn quilt_height(&self) -> u32 {
        self.quilt_height
    }

    #[inline]
    pub fn columns(&self) -> u32 {
        self.columns
    }

    #[inline]
    pub fn rows(&self) -> u32 {
        self.rows
    }

    #[inline]
    pub fn tile_count(&self) -> u32 {
        self.tile_count
    }

    #[inline]
    pub fn render_aspect(&self) -> f32 {
        self.render_aspect
    }

    #[inline]
    pub fn grid_size(&self) -> u32 {
        self.columns * self.rows
    }

    #[inline]
    pub fn tile_width(&self) -> u32 {
        self.quilt_width / self.columns
    }

    #[inline]
    pub fn tile_height(&self) -> u32 {
        self.quilt_height / self.rows
    }

    #[inline]
    pub fn padding_horizontal(&self) -> u32 {
        self.quilt_width - self.columns * self.tile_width()
    }

    #[inline]
    pub fn padding_vertical(&self) -> u32 {
        self.quilt_height - self.rows * self.tile_height()
    }

    /// Fraction of the quilt width covered by tiles.
    pub fn view_portion_horizontal(&self) -> f32 {
        (self.columns * self.tile_width()) as f32 / self.quilt_width as f32
    }

    /// Fraction of the quilt height covered by tiles.
    pub fn view_portion_vertical(&self) -> f32 {
        (self.rows * self.tile_height()) as f32 / self.quilt_height as f32
    }

    /// Pixel rect of a view's tile.
    ///
    /// Tile rows are counted bottom-up while quilt pixel rows run top-down,
    /// hence the reversed index for `y`. The formula is tied to the texture
    /// origin convention of the display shader; keep it as is.
    pub fn tile_rect(&self, view_index: u32) -> TileRect {
        debug_assert!(view_index < self.grid_size(), "view {view_index} outside the grid");

        let reversed_view_index = self.grid_size() - view_index - 1;
        let tile_width = self.tile_width();
        let tile_height = self.tile_height();

        TileRect {
            x: (view_index % self.columns) * tile_width,
            y: (reversed_view_index / self.columns) * tile_height + self.padding_vertical(),
            width: tile_width,
            height: tile_height,
        }
    }

    /// Top-left pixel of a view's tile.
    #[inline]
    pub fn tile_origin(&self, view_index: u32) -> [u32; 2] {
        let rect = self.tile_rect(view_index);
        [rect.x, rect.y]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn portrait_example() {
        let q = QuiltLayout::new(3360, 3360, 8, 6, 0.75);
        assert_eq!(q.tile_width(), 420);
        assert_eq!(q.tile_height(), 560);
        assert_eq!(q.tile_count(), 48);
        assert_eq!(q.padding_horizontal(), 0);
        assert_eq!(q.padding_vertical(), 0);
        assert_eq!(q.view_portion_horizontal(), 1.0);
        assert_eq!(q.view_portion_vertical(), 1.0);
    }

    #[test]
    fn clamps_out_of_range_settings() {
        let q = QuiltLayout::new(10, 100_000, 0, 99, -2.0);
        assert_eq!(q.quilt_width(), MIN_QUILT_SIZE);
        assert_eq!(q.quilt_height(), MAX_QUILT_SIZE);
        assert_eq!(q.columns(), 1);
        assert_eq!(q.rows(), 32);
        assert_eq!(q.render_aspect(), 1.0);

        let q = QuiltLayout::new(1024, 1024, 4, 4, f32::NAN).with_tile_count(500);
        assert_eq!(q.tile_count(), 16);
        assert_eq!(q.render_aspect(), 1.0);
        assert_eq!(q.with_tile_count(0).tile_count(), 1);
    }

    #[test]
    fn padding_goes_right_and_top() {
        let q = QuiltLayout::new(5999, 5999, 7, 7, 1.777_78);
        assert_eq!(q.tile_width(), 857);
        assert_eq!(q.padding_horizontal(), 0);

        let q = QuiltLayout::new(1000, 1000, 3, 3, 1.0);
        assert_eq!(q.tile_width(), 333);
        assert_eq!(q.padding_horizontal(), 1);
        assert_eq!(q.padding_vertical(), 1);
        // View 0 is bottom-left; the top row starts below the margin.
        assert_eq!(q.tile_rect(0), TileRect { x: 0, y: 667, width: 333, height: 333 });
        assert_eq!(q.tile_rect(8), TileRect { x: 666, y: 1, width: 333, height: 333 });
        assert!(q.view_portion_horizontal() < 1.0);
    }

    #[test]
    fn first_row_is_bottom_row() {
        let q = QuiltLayout::new(3360, 3360, 8, 6, 0.75);
        assert_eq!(q.tile_origin(0), [0, 5 * 560]);
        assert_eq!(q.tile_origin(7), [7 * 420, 5 * 560]);
        assert_eq!(q.tile_origin(8), [0, 4 * 560]);
        assert_eq!(q.tile_origin(47), [7 * 420, 0]);
    }

    #[test]
    fn equality_is_structural() {
        let a = QuiltLayout::new(4096, 4096, 5, 9, 1.6);
        let b = QuiltLayout::new(4096, 4096, 5, 9, 1.6);
        assert_eq!(a, b);
        assert_ne!(a, b.with_tile_count(44));
    }
}
