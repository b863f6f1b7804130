//! Input validation for client-supplied numbers.
//!
//! Wire numbers arrive as JSON numbers. Every coordinate, color, and extent
//! must be finite, integral, and in range before the store or the bus is
//! touched.

use gridsync_types::{
    Bounds, Cell, ChunkParams, MAX_COLOR, Position, PositionParams, RadiusParams, SetCellParams,
};

/// Default upper bound on a chunk's width, height, or radius.
pub const DEFAULT_MAX_CHUNK_SPAN: u32 = 512;

/// Malformed or out-of-range input. Nothing was applied.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// The value is NaN or infinite.
    #[error("{field} must be a finite number, got {value}")]
    NotFinite {
        /// Offending parameter name.
        field: &'static str,
        /// The value received.
        value: f64,
    },

    /// The value has a fractional part.
    #[error("{field} must be an integer, got {value}")]
    NotInteger {
        /// Offending parameter name.
        field: &'static str,
        /// The value received.
        value: f64,
    },

    /// The value is integral but outside the accepted range.
    #[error("{field} = {value} is outside {min}..={max}")]
    OutOfRange {
        /// Offending parameter name.
        field: &'static str,
        /// The value received.
        value: f64,
        /// Smallest accepted value.
        min: i64,
        /// Largest accepted value.
        max: i64,
    },
}

/// Per-request size limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Largest width, height, or radius a chunk read may request.
    pub max_chunk_span: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_chunk_span: DEFAULT_MAX_CHUNK_SPAN,
        }
    }
}

/// A validated chunk region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkRegion {
    /// `x..=x+width` by `y..=y+height`.
    Rect {
        /// Left column.
        x: i32,
        /// Top row.
        y: i32,
        /// Extra columns.
        width: u32,
        /// Extra rows.
        height: u32,
    },
    /// Chebyshev square around a center.
    Radius {
        /// Center column.
        x: i32,
        /// Center row.
        y: i32,
        /// Half side length.
        radius: u32,
    },
}

impl ChunkRegion {
    /// The inclusive bounds this region covers.
    pub fn bounds(&self) -> Bounds {
        match *self {
            Self::Rect {
                x,
                y,
                width,
                height,
            } => Bounds::rect(x, y, width, height),
            Self::Radius { x, y, radius } => Bounds::radius(x, y, radius),
        }
    }
}

/// Check that `value` is a finite integer within `min..=max`.
fn integral(field: &'static str, value: f64, min: i64, max: i64) -> Result<f64, ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NotFinite { field, value });
    }
    if value.fract() != 0.0 {
        return Err(ValidationError::NotInteger { field, value });
    }
    // Bounds passed in are i32/u32 ranges, all exactly representable.
    #[allow(clippy::cast_precision_loss)]
    let in_range = (min as f64..=max as f64).contains(&value);
    if !in_range {
        return Err(ValidationError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(value)
}

/// A grid coordinate: any `i32`.
pub fn coordinate(field: &'static str, value: f64) -> Result<i32, ValidationError> {
    let value = integral(field, value, i64::from(i32::MIN), i64::from(i32::MAX))?;
    #[allow(clippy::cast_possible_truncation)]
    Ok(value as i32)
}

/// A 24-bit RGB color.
pub fn color(value: f64) -> Result<u32, ValidationError> {
    let value = integral("color", value, 0, i64::from(MAX_COLOR))?;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok(value as u32)
}

/// A width, height, or radius: `0..=max`.
pub fn extent(field: &'static str, value: f64, max: u32) -> Result<u32, ValidationError> {
    let value = integral(field, value, 0, i64::from(max))?;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok(value as u32)
}

/// Validate `setCell` parameters.
pub fn cell(params: &SetCellParams) -> Result<Cell, ValidationError> {
    Ok(Cell::new(
        coordinate("x", params.x)?,
        coordinate("y", params.y)?,
        color(params.color)?,
    ))
}

/// Validate `removeCell` parameters.
pub fn position(params: &PositionParams) -> Result<Position, ValidationError> {
    Ok(Position::new(
        coordinate("x", params.x)?,
        coordinate("y", params.y)?,
    ))
}

/// Validate `getChunk` parameters.
pub fn chunk(params: &ChunkParams, limits: &Limits) -> Result<ChunkRegion, ValidationError> {
    Ok(ChunkRegion::Rect {
        x: coordinate("x", params.x)?,
        y: coordinate("y", params.y)?,
        width: extent("width", params.width, limits.max_chunk_span)?,
        height: extent("height", params.height, limits.max_chunk_span)?,
    })
}

/// Validate `getChunkByRadius` parameters.
pub fn radius(params: &RadiusParams, limits: &Limits) -> Result<ChunkRegion, ValidationError> {
    Ok(ChunkRegion::Radius {
        x: coordinate("x", params.x)?,
        y: coordinate("y", params.y)?,
        radius: extent("radius", params.radius, limits.max_chunk_span)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_integral_values() {
        assert_eq!(coordinate("x", -7.0), Ok(-7));
        assert_eq!(coordinate("x", f64::from(i32::MAX)), Ok(i32::MAX));
        assert_eq!(color(f64::from(0x0083_6953)), Ok(0x0083_6953));
        assert_eq!(extent("width", 0.0, 10), Ok(0));
    }

    #[test]
    fn rejects_fractions_and_non_finite() {
        assert!(matches!(
            coordinate("x", 1.5),
            Err(ValidationError::NotInteger { field: "x", .. })
        ));
        assert!(matches!(
            coordinate("y", f64::NAN),
            Err(ValidationError::NotFinite { field: "y", .. })
        ));
        assert!(matches!(
            color(f64::INFINITY),
            Err(ValidationError::NotFinite { .. })
        ));
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(matches!(
            coordinate("x", f64::from(i32::MAX) + 1.0),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert!(matches!(color(-1.0), Err(ValidationError::OutOfRange { .. })));
        assert!(matches!(
            color(f64::from(MAX_COLOR) + 1.0),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert!(matches!(
            extent("radius", 11.0, 10),
            Err(ValidationError::OutOfRange { field: "radius", .. })
        ));
    }

    #[test]
    fn chunk_regions() {
        let limits = Limits::default();
        let rect = chunk(&ChunkParams::new(1, 2, 3, 4), &limits);
        assert_eq!(
            rect,
            Ok(ChunkRegion::Rect {
                x: 1,
                y: 2,
                width: 3,
                height: 4
            })
        );

        let square = radius(&RadiusParams::new(0, 0, 2), &limits);
        assert_eq!(
            square.map(|region| region.bounds()),
            Ok(Bounds::radius(0, 0, 2))
        );
    }
}
