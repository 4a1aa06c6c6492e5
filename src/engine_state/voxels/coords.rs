//! # Chunk Coordinates
//!
//! Conversions between world cells, chunk coordinates and grid indices.
//!
//! A chunk `(cx, cy)` owns the world cells `x` in `[cx * S - S/2, cx * S + S/2)` and `z` in
//! `[cy * S - S/2, cy * S + S/2)`, where `S` is the chunk width. Its block grid adds a
//! one-cell border ring on every horizontal side, and stores z mirrored: grid row `gz`
//! holds world `z = cy * S + S/2 - gz`. This is the same direction in which height windows
//! advance, so grid `(gx, gz)` reads height sample `(gx, gz)` directly.

use cgmath::{Point2, Point3, Vector2, Vector3};

/// Integer position of a chunk on the infinite 2D chunk grid.
pub type ChunkCoord = Point2<i32>;

/// Bias added to float positions before they are floored into cells, so a position
/// sitting exactly on a cell or chunk seam resolves the same way on every call.
pub const CELL_EPSILON: f32 = 0.01;

/// Dimensions shared by every chunk of a terrain.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChunkLayout {
    /// Width of a chunk in cells (`S`).
    pub chunk_width: i32,
    /// Number of block layers.
    pub chunk_height: i32,
    /// Width of a chunk in world units. Equal to `chunk_width` for block terrain.
    pub world_size: f32,
}

impl ChunkLayout {
    /// Creates a layout for chunks `world_size` units wide and `chunk_height` blocks tall.
    pub fn new(world_size: f32, chunk_height: usize) -> Self {
        Self {
            chunk_width: (world_size.round() as i32).max(2),
            chunk_height: chunk_height as i32,
            world_size,
        }
    }

    /// Half the chunk width, in cells.
    pub fn half_width(&self) -> i32 {
        self.chunk_width / 2
    }

    /// Side length of a block grid including its border ring.
    pub fn grid_width(&self) -> i32 {
        self.chunk_width + 2
    }

    /// World cell stored at grid index `grid` of chunk `coord`.
    pub fn grid_to_world(&self, coord: ChunkCoord, grid: Point3<i32>) -> Point3<i32> {
        let half = self.half_width();
        Point3::new(
            coord.x * self.chunk_width - half + (grid.x - 1),
            grid.y,
            coord.y * self.chunk_width + half - grid.z,
        )
    }

    /// Grid index of world cell `cell` in chunk `coord`. The exact inverse of
    /// `grid_to_world`; the result may lie outside the grid.
    pub fn world_to_grid(&self, coord: ChunkCoord, cell: Point3<i32>) -> Point3<i32> {
        let half = self.half_width();
        Point3::new(
            cell.x - coord.x * self.chunk_width + half + 1,
            cell.y,
            coord.y * self.chunk_width + half - cell.z,
        )
    }

    /// The chunk that owns world cell `cell`.
    pub fn chunk_of_cell(&self, cell: Point3<i32>) -> ChunkCoord {
        let half = self.half_width();
        ChunkCoord::new(
            (cell.x + half).div_euclid(self.chunk_width),
            (cell.z + half).div_euclid(self.chunk_width),
        )
    }

    /// Whether `grid` addresses a cell of the block grid, border ring included.
    pub fn in_grid(&self, grid: Point3<i32>) -> bool {
        let width = self.grid_width();
        (0..width).contains(&grid.x)
            && (0..width).contains(&grid.z)
            && (0..self.chunk_height).contains(&grid.y)
    }

    /// World offset of chunk `coord`'s local mesh origin.
    pub fn chunk_origin(&self, coord: ChunkCoord) -> Vector3<f32> {
        Vector3::new(
            coord.x as f32 * self.world_size,
            0.0,
            coord.y as f32 * self.world_size,
        )
    }

    /// Center of chunk `coord` in the horizontal plane (world x, world z).
    pub fn chunk_center(&self, coord: ChunkCoord) -> Vector2<f32> {
        Vector2::new(
            coord.x as f32 * self.world_size,
            coord.y as f32 * self.world_size,
        )
    }

    /// The chunk a viewer at horizontal position `(x, z)` stands closest to the center of.
    pub fn viewer_chunk(&self, viewer: Vector2<f32>) -> ChunkCoord {
        ChunkCoord::new(
            (viewer.x / self.world_size).round() as i32,
            (viewer.y / self.world_size).round() as i32,
        )
    }
}

/// The cell containing world position `position`, after the seam bias.
pub fn cell_of_position(position: Vector3<f32>) -> Point3<i32> {
    Point3::new(
        (position.x + CELL_EPSILON).floor() as i32,
        (position.y + CELL_EPSILON).floor() as i32,
        (position.z + CELL_EPSILON).floor() as i32,
    )
}

/// The minimum corner of `cell` in world space. `cell_of_position` maps it back to `cell`.
pub fn position_of_cell(cell: Point3<i32>) -> Vector3<f32> {
    Vector3::new(cell.x as f32, cell.y as f32, cell.z as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> ChunkLayout {
        ChunkLayout::new(18.0, 64)
    }

    #[test]
    fn test_grid_and_world_conversions_are_inverse() {
        let layout = layout();
        for coord in [ChunkCoord::new(0, 0), ChunkCoord::new(-3, 2), ChunkCoord::new(5, -7)] {
            for gx in 0..layout.grid_width() {
                for gz in 0..layout.grid_width() {
                    let grid = Point3::new(gx, 7, gz);
                    let cell = layout.grid_to_world(coord, grid);
                    assert_eq!(layout.world_to_grid(coord, cell), grid);
                }
            }
        }
    }

    #[test]
    fn test_interior_cells_belong_to_their_chunk() {
        let layout = layout();
        let coord = ChunkCoord::new(-2, 3);
        for gx in 1..=layout.chunk_width {
            for gz in 1..=layout.chunk_width {
                let cell = layout.grid_to_world(coord, Point3::new(gx, 0, gz));
                assert_eq!(layout.chunk_of_cell(cell), coord, "grid ({gx}, {gz})");
            }
        }
        let border = layout.grid_to_world(coord, Point3::new(0, 0, 5));
        assert_eq!(layout.chunk_of_cell(border), ChunkCoord::new(-3, 3));
        let border = layout.grid_to_world(coord, Point3::new(5, 0, 0));
        assert_eq!(layout.chunk_of_cell(border), ChunkCoord::new(-2, 4));
    }

    #[test]
    fn test_seam_positions_resolve_consistently() {
        // 8.999 and 9.0 both land in the first cell of the next chunk.
        let a = cell_of_position(Vector3::new(8.999, 3.0, 0.0));
        let b = cell_of_position(Vector3::new(9.0, 3.0, 0.0));
        assert_eq!(a, b);
        assert_eq!(layout().chunk_of_cell(a), ChunkCoord::new(1, 0));

        for cell in [Point3::new(-9, 0, 8), Point3::new(9, 12, -9), Point3::new(0, 63, 0)] {
            assert_eq!(cell_of_position(position_of_cell(cell)), cell);
        }
    }

    #[test]
    fn test_viewer_chunk_rounds_to_nearest_center() {
        let layout = layout();
        assert_eq!(layout.viewer_chunk(Vector2::new(8.9, -8.9)), ChunkCoord::new(0, 0));
        assert_eq!(layout.viewer_chunk(Vector2::new(9.1, -9.1)), ChunkCoord::new(1, -1));
    }
}
