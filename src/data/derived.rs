use std::f64::consts::PI;

use crate::error::DomainError;

/// How the base area of an agar plate is known.
#[derive(Debug, Clone, PartialEq)]
pub enum PlateBase {
    /// Measured area in mm².
    Area(f64),
    /// Petri dish, diameter in mm.
    Circular { diameter: f64 },
    /// Single-well rectangular plate, sides in mm.
    Rectangular { length: f64, width: f64 },
}

impl PlateBase {
    /// Build a base from a shape name and its dimensions.
    pub fn from_shape(shape: &str, dimensions: &[f64]) -> Result<Self, DomainError> {
        let expect = |expected: usize| {
            if dimensions.len() == expected {
                Ok(())
            } else {
                Err(DomainError::InvalidDimensions {
                    shape: shape.to_string(),
                    expected,
                    got: dimensions.len(),
                })
            }
        };
        match shape {
            "circular" => {
                expect(1)?;
                Ok(PlateBase::Circular {
                    diameter: dimensions[0],
                })
            }
            "rectangular" => {
                expect(2)?;
                Ok(PlateBase::Rectangular {
                    length: dimensions[0],
                    width: dimensions[1],
                })
            }
            other => Err(DomainError::InvalidShape(other.to_string())),
        }
    }

    pub fn area(&self) -> f64 {
        match *self {
            PlateBase::Area(area) => area,
            PlateBase::Circular { diameter } => PI * (diameter / 2.0).powi(2),
            PlateBase::Rectangular { length, width } => length * width,
        }
    }
}

/// Height of the liquid surface above the plate bottom, plus `offset`.
///
/// `material = full - empty`, `height = material / (area * density)`.
/// Weights in g, area in mm², density in g/mm³, result in mm.
pub fn agar_height(
    full_weight: f64,
    empty_weight: f64,
    base_area: f64,
    density: f64,
    offset: f64,
) -> Result<f64, DomainError> {
    for (name, value) in [
        ("plate weight", full_weight),
        ("empty plate weight", empty_weight),
        ("base area", base_area),
        ("agar density", density),
        ("height offset", offset),
    ] {
        if !value.is_finite() {
            return Err(DomainError::NonFinite { name, value });
        }
    }
    if full_weight < empty_weight {
        return Err(DomainError::NegativeMaterial {
            full: full_weight,
            empty: empty_weight,
        });
    }
    // each factor on its own, not just the product
    if base_area <= 0.0 || density <= 0.0 {
        return Err(DomainError::NonPositiveBase {
            area: base_area,
            density,
        });
    }
    Ok((full_weight - empty_weight) / (base_area * density) + offset)
}

/// Offsets along an Archimedean spiral reaching `max_radius` after
/// `rotations` full turns, sampled at `points` evenly spaced angles
/// (both ends included).
pub fn spiral_offsets(max_radius: f64, points: usize, rotations: f64) -> Vec<(f64, f64)> {
    let end_theta = rotations * 2.0 * PI;
    if points == 0 {
        return Vec::new();
    }
    if points == 1 || end_theta == 0.0 {
        return vec![(0.0, 0.0); points];
    }
    let b = max_radius / end_theta;
    let step = end_theta / (points - 1) as f64;
    (0..points)
        .map(|i| {
            let theta = step * i as f64;
            let r = b * theta;
            (r * theta.cos(), r * theta.sin())
        })
        .collect()
}
