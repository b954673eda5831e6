//! Masks select the candidate partners of a node from their displacement.
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::KernelError;

/// Geometric region, centered on the driving node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Mask {
    /// Disk in the xy-plane.
    Circular { radius: f64 },
    /// Ball in 3-D.
    Spherical { radius: f64 },
    /// Axis-aligned rectangle in the xy-plane.
    Rectangular {
        lower_left: [f64; 2],
        upper_right: [f64; 2],
    },
    /// Axis-aligned box in 3-D.
    Box {
        lower_left: [f64; 3],
        upper_right: [f64; 3],
    },
    /// Annulus in the xy-plane; the inner circle is excluded, the outer one included.
    Doughnut {
        inner_radius: f64,
        outer_radius: f64,
    },
}

impl Mask {
    fn check(&self) -> Result<(), KernelError> {
        let ok = match self {
            Mask::Circular { radius } | Mask::Spherical { radius } => {
                radius.is_finite() && *radius >= 0.0
            }
            Mask::Rectangular {
                lower_left,
                upper_right,
            } => lower_left.iter().zip(upper_right.iter()).all(|(l, u)| l.is_finite() && u.is_finite() && l < u),
            Mask::Box {
                lower_left,
                upper_right,
            } => lower_left.iter().zip(upper_right.iter()).all(|(l, u)| l.is_finite() && u.is_finite() && l < u),
            Mask::Doughnut {
                inner_radius,
                outer_radius,
            } => {
                inner_radius.is_finite()
                    && outer_radius.is_finite()
                    && *inner_radius >= 0.0
                    && inner_radius < outer_radius
            }
        };
        if ok {
            Ok(())
        } else {
            Err(KernelError::InvalidParameter(format!("invalid mask {:?}", self)))
        }
    }

    fn is_3d(&self) -> bool {
        matches!(self, Mask::Spherical { .. } | Mask::Box { .. })
    }

    fn contains(&self, d: &Vector3<f64>) -> bool {
        let planar = (d.x * d.x + d.y * d.y).sqrt();
        match self {
            Mask::Circular { radius } => planar <= *radius,
            Mask::Spherical { radius } => d.norm() <= *radius,
            Mask::Rectangular {
                lower_left,
                upper_right,
            } => (0..2).all(|i| lower_left[i] <= d[i] && d[i] <= upper_right[i]),
            Mask::Box {
                lower_left,
                upper_right,
            } => (0..3).all(|i| lower_left[i] <= d[i] && d[i] <= upper_right[i]),
            Mask::Doughnut {
                inner_radius,
                outer_radius,
            } => *inner_radius < planar && planar <= *outer_radius,
        }
    }

    /// Returns the largest distance from the center of a point inside the mask.
    fn radius(&self) -> f64 {
        match self {
            Mask::Circular { radius } | Mask::Spherical { radius } => *radius,
            Mask::Doughnut { outer_radius, .. } => *outer_radius,
            Mask::Rectangular {
                lower_left,
                upper_right,
            } => {
                let x = lower_left[0].abs().max(upper_right[0].abs());
                let y = lower_left[1].abs().max(upper_right[1].abs());
                (x * x + y * y).sqrt()
            }
            Mask::Box {
                lower_left,
                upper_right,
            } => (0..3)
                .map(|i| lower_left[i].abs().max(upper_right[i].abs()).powi(2))
                .sum::<f64>()
                .sqrt(),
        }
    }
}

/// A mask, possibly shifted away from the driving node by an anchor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskSpec {
    pub mask: Mask,
    #[serde(default)]
    pub anchor: [f64; 3],
}

impl MaskSpec {
    pub fn new(mask: Mask) -> Self {
        MaskSpec {
            mask,
            anchor: [0.0; 3],
        }
    }

    pub fn with_anchor(mut self, anchor: [f64; 3]) -> Self {
        self.anchor = anchor;
        self
    }

    /// Check the mask against the dimension of the layers it is used with.
    pub fn validate(&self, dims: usize) -> Result<(), KernelError> {
        self.mask.check()?;
        if self.mask.is_3d() != (dims == 3) {
            return Err(KernelError::InvalidParameter(format!(
                "mask {:?} cannot be used with {}-D layers",
                self.mask, dims
            )));
        }
        if !self.anchor.iter().all(|a| a.is_finite()) {
            return Err(KernelError::InvalidParameter(format!(
                "mask anchor must be finite, got {:?}",
                self.anchor
            )));
        }
        Ok(())
    }

    /// Returns true if a candidate at the given displacement from the driving node lies inside the mask.
    pub fn contains(&self, displacement: &Vector3<f64>) -> bool {
        self.mask.contains(&(displacement - Vector3::from(self.anchor)))
    }

    /// Returns the radius of a ball around the driving node containing the whole mask.
    pub fn reach(&self) -> f64 {
        Vector3::from(self.anchor).norm() + self.mask.radius()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_circular() {
        let mask = MaskSpec::new(Mask::Circular { radius: 0.5 });
        assert!(mask.validate(2).is_ok());
        assert!(mask.validate(3).is_err());
        assert!(mask.contains(&Vector3::new(0.3, 0.39, 0.0)));
        assert!(!mask.contains(&Vector3::new(0.3, 0.41, 0.0)));
        assert_relative_eq!(mask.reach(), 0.5);
    }

    #[test]
    fn test_rectangular_with_anchor() {
        let mask = MaskSpec::new(Mask::Rectangular {
            lower_left: [-0.1, -0.2],
            upper_right: [0.1, 0.2],
        })
        .with_anchor([1.0, 0.0, 0.0]);
        assert!(mask.contains(&Vector3::new(1.05, 0.2, 0.0)));
        assert!(!mask.contains(&Vector3::new(0.05, 0.0, 0.0)));
        assert_relative_eq!(mask.reach(), 1.0 + 0.05_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_doughnut() {
        let mask = MaskSpec::new(Mask::Doughnut {
            inner_radius: 0.1,
            outer_radius: 0.3,
        });
        assert!(!mask.contains(&Vector3::new(0.1, 0.0, 0.0)));
        assert!(mask.contains(&Vector3::new(0.0, -0.2, 0.0)));
        assert!(mask.contains(&Vector3::new(0.3, 0.0, 0.0)));
        assert!(!mask.contains(&Vector3::new(0.31, 0.0, 0.0)));
    }

    #[test]
    fn test_box_and_sphere() {
        let mask = MaskSpec::new(Mask::Box {
            lower_left: [-0.1, -0.1, 0.0],
            upper_right: [0.1, 0.1, 0.5],
        });
        assert!(mask.validate(3).is_ok());
        assert!(mask.contains(&Vector3::new(0.0, 0.0, 0.5)));
        assert!(!mask.contains(&Vector3::new(0.0, 0.0, -0.01)));

        let mask = MaskSpec::new(Mask::Spherical { radius: 1.0 });
        assert!(mask.contains(&Vector3::new(0.5, 0.5, 0.5)));
        assert!(!mask.contains(&Vector3::new(0.6, 0.6, 0.6)));
    }

    #[test]
    fn test_invalid_masks() {
        let inverted = MaskSpec::new(Mask::Rectangular {
            lower_left: [0.1, 0.1],
            upper_right: [-0.1, 0.2],
        });
        assert!(inverted.validate(2).is_err());
        let doughnut = MaskSpec::new(Mask::Doughnut {
            inner_radius: 0.5,
            outer_radius: 0.5,
        });
        assert!(doughnut.validate(2).is_err());
    }

    #[test]
    fn test_serde() {
        let mask: MaskSpec =
            serde_json::from_str(r#"{"mask": {"type": "circular", "radius": 0.2}}"#).unwrap();
        assert_eq!(mask, MaskSpec::new(Mask::Circular { radius: 0.2 }));
    }
}
