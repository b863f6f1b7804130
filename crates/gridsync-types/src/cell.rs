//! Grid cells, positions, and query regions.
//!
//! A cell is identified by its `(x, y)` position. A position with no stored
//! color is simply absent; there is no "empty color" value.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Largest color value a cell may hold (24-bit RGB).
pub const MAX_COLOR: u32 = 0x00FF_FFFF;

/// The identity of a cell on the grid.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export, export_to = "bindings/")]
pub struct Position {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl Position {
    /// Create a position.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl core::fmt::Display for Position {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A grid position with a stored color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Cell {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
    /// 24-bit RGB color.
    pub color: u32,
}

impl Cell {
    /// Create a cell.
    pub const fn new(x: i32, y: i32, color: u32) -> Self {
        Self { x, y, color }
    }

    /// The position this cell occupies.
    pub const fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

/// An inclusive rectangular region of the grid.
///
/// Bounds are widened to `i64` so `x + width` never overflows for any
/// valid `i32` origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    /// Smallest column included.
    pub min_x: i64,
    /// Largest column included.
    pub max_x: i64,
    /// Smallest row included.
    pub min_y: i64,
    /// Largest row included.
    pub max_y: i64,
}

impl Bounds {
    /// Region `x..=x+width` by `y..=y+height`.
    pub fn rect(x: i32, y: i32, width: u32, height: u32) -> Self {
        let x = i64::from(x);
        let y = i64::from(y);
        Self {
            min_x: x,
            max_x: x.saturating_add(i64::from(width)),
            min_y: y,
            max_y: y.saturating_add(i64::from(height)),
        }
    }

    /// Square region `|dx| <= radius && |dy| <= radius` around `(x, y)`.
    ///
    /// This is a Chebyshev square, not a Euclidean disk.
    pub fn radius(x: i32, y: i32, radius: u32) -> Self {
        let x = i64::from(x);
        let y = i64::from(y);
        let r = i64::from(radius);
        Self {
            min_x: x.saturating_sub(r),
            max_x: x.saturating_add(r),
            min_y: y.saturating_sub(r),
            max_y: y.saturating_add(r),
        }
    }

    /// Whether `position` lies inside the region.
    pub fn contains(&self, position: Position) -> bool {
        let x = i64::from(position.x);
        let y = i64::from(position.y);
        (self.min_x..=self.max_x).contains(&x) && (self.min_y..=self.max_y).contains(&y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_is_inclusive_on_both_ends() {
        let b = Bounds::rect(0, 0, 0, 0);
        assert!(b.contains(Position::new(0, 0)));
        assert!(!b.contains(Position::new(1, 0)));

        let b = Bounds::rect(-2, 3, 4, 1);
        assert!(b.contains(Position::new(-2, 3)));
        assert!(b.contains(Position::new(2, 4)));
        assert!(!b.contains(Position::new(3, 4)));
        assert!(!b.contains(Position::new(2, 5)));
    }

    #[test]
    fn radius_is_a_square() {
        let b = Bounds::radius(0, 0, 2);
        // Corner is outside a disk of radius 2 but inside the square.
        assert!(b.contains(Position::new(2, 2)));
        assert!(b.contains(Position::new(-2, -2)));
        assert!(!b.contains(Position::new(3, 0)));
    }

    #[test]
    fn bounds_do_not_overflow_at_extremes() {
        let b = Bounds::rect(i32::MAX, i32::MAX, u32::MAX, u32::MAX);
        assert!(b.contains(Position::new(i32::MAX, i32::MAX)));

        let b = Bounds::radius(i32::MIN, i32::MIN, u32::MAX);
        assert!(b.contains(Position::new(i32::MIN, i32::MIN)));
    }
}
