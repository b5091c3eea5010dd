//! Axis-aligned geometry extraction: rounded bounding boxes and
//! axis-aligned polygon detection.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Decimal places kept on every exported coordinate.
pub const COORD_DECIMALS: i32 = 5;

/// Maximum spread of a coordinate for a face to count as axis-aligned.
pub const AXIS_TOLERANCE: f64 = 1e-4;

/// Round a coordinate to [`COORD_DECIMALS`] places.
pub fn round_coord(value: f64) -> f64 {
    let scale = 10f64.powi(COORD_DECIMALS);
    let rounded = (value * scale).round() / scale;
    // avoid emitting "-0.0" into the grid and the generated script
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

pub fn round_point(p: &Vector3<f64>) -> Vector3<f64> {
    p.map(round_coord)
}

/// Coordinate axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }

    /// In-plane coordinate indices for a polygon normal to this axis.
    ///
    /// x → (y, z), y → (z, x), z → (x, y): the order CSXCAD expects for
    /// polygons with the matching `norm_dir`.
    pub fn plane_indices(self) -> (usize, usize) {
        match self {
            Axis::X => (1, 2),
            Axis::Y => (2, 0),
            Axis::Z => (0, 1),
        }
    }
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Axis-aligned bounding box with rounded corners
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Aabb {
    /// Reduce a set of corner points (usually the 8 corners of an object
    /// bounding box) to a component-wise min/max, rounded so that
    /// geometrically identical objects produce identical grid lines.
    pub fn from_corners<'a, I>(corners: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a [f64; 3]>,
    {
        let mut min = Vector3::repeat(f64::MAX);
        let mut max = Vector3::repeat(f64::MIN);
        let mut found_any = false;

        for c in corners {
            let p = Vector3::from(*c);
            min = min.inf(&p);
            max = max.sup(&p);
            found_any = true;
        }

        if !found_any {
            return None;
        }

        Some(Self {
            min: round_point(&min).into(),
            max: round_point(&max).into(),
        })
    }

}

/// The eight corners of the box spanned by `min`/`max`.
pub fn box_corners(min: [f64; 3], max: [f64; 3]) -> [[f64; 3]; 8] {
    let mut corners = [[0.0; 3]; 8];
    for (i, corner) in corners.iter_mut().enumerate() {
        corner[0] = if i & 1 == 0 { min[0] } else { max[0] };
        corner[1] = if i & 2 == 0 { min[1] } else { max[1] };
        corner[2] = if i & 4 == 0 { min[2] } else { max[2] };
    }
    corners
}

/// A face lying in a plane normal to one coordinate axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisPlane {
    pub axis: Axis,
    /// Position of the plane on `axis`
    pub elevation: f64,
    /// Face outline projected onto the plane, see [`Axis::plane_indices`]
    pub points: Vec<[f64; 2]>,
}

/// Detect whether a face is axis-aligned.
///
/// Returns `None` for oblique faces, for faces with fewer than one point and
/// for non-finite input. When a face qualifies on several axes (collinear or
/// single-point faces) the first of x, y, z wins.
pub fn get_axis(points: &[Vector3<f64>]) -> Option<AxisPlane> {
    if points.is_empty() || points.iter().any(|p| !p.iter().all(|c| c.is_finite())) {
        return None;
    }

    let n = points.len() as f64;
    for axis in Axis::ALL {
        let i = axis.index();
        let mean = points.iter().map(|p| p[i]).sum::<f64>() / n;
        let aligned = points.iter().all(|p| (p[i] - mean).abs() <= AXIS_TOLERANCE);
        if !aligned {
            continue;
        }

        let (u, v) = axis.plane_indices();
        return Some(AxisPlane {
            axis,
            elevation: round_coord(mean),
            points: points
                .iter()
                .map(|p| [round_coord(p[u]), round_coord(p[v])])
                .collect(),
        });
    }

    None
}
