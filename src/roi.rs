//! Counting-area polygon and point-in-polygon test.

use serde::{Deserialize, Serialize};

use crate::crossing::Direction;
use crate::error::Error;

/// Which crossing directions a counting area reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DirectionMode {
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "OUT")]
    Out,
    #[default]
    #[serde(rename = "BOTH")]
    Both,
}

impl DirectionMode {
    /// Whether events in `direction` should be emitted under this mode.
    pub fn allows(&self, direction: Direction) -> bool {
        match self {
            DirectionMode::Both => true,
            DirectionMode::In => direction == Direction::In,
            DirectionMode::Out => direction == Direction::Out,
        }
    }
}

/// An ordered polygon marking the counted region of the frame.
///
/// Fewer than 3 vertices means no boundary is configured: the whole frame
/// counts as inside and [`Roi::contains`] is always true.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Roi {
    points: Vec<[f32; 2]>,
}

impl Roi {
    pub fn new(points: Vec<[f32; 2]>) -> Self {
        Self { points }
    }

    /// The original deployment's fallback gate polygon, used when no
    /// counting area has been configured for a camera.
    pub fn default_gate() -> Self {
        Self::new(vec![
            [50.0, 50.0],
            [1230.0, 50.0],
            [1230.0, 670.0],
            [50.0, 670.0],
        ])
    }

    /// Parse a polygon delivered as JSON text, e.g. `[[50,50],[1230,50],...]`.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let points: Vec<[f32; 2]> = serde_json::from_str(text)?;
        Ok(Self::new(points))
    }

    pub fn points(&self) -> &[[f32; 2]] {
        &self.points
    }

    /// Whether a polygon with at least 3 vertices is configured.
    pub fn is_configured(&self) -> bool {
        self.points.len() >= 3
    }

    /// Point-in-polygon test by ray casting. Points on an edge or vertex
    /// count as inside. Without a configured polygon every point is inside.
    pub fn contains(&self, x: f32, y: f32) -> bool {
        if !self.is_configured() {
            return true;
        }

        let n = self.points.len();
        for i in 0..n {
            if on_segment(self.points[i], self.points[(i + 1) % n], x, y) {
                return true;
            }
        }

        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let [xi, yi] = self.points[i];
            let [xj, yj] = self.points[j];
            if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }
        inside
    }
}

fn on_segment(a: [f32; 2], b: [f32; 2], x: f32, y: f32) -> bool {
    const EPS: f32 = 1e-4;
    let cross = (b[0] - a[0]) * (y - a[1]) - (b[1] - a[1]) * (x - a[0]);
    if cross.abs() > EPS * ((b[0] - a[0]).abs() + (b[1] - a[1]).abs()).max(1.0) {
        return false;
    }
    x >= a[0].min(b[0]) - EPS
        && x <= a[0].max(b[0]) + EPS
        && y >= a[1].min(b[1]) - EPS
        && y <= a[1].max(b[1]) + EPS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Roi {
        Roi::new(vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]])
    }

    #[test]
    fn test_point_inside_square() {
        assert!(square().contains(5.0, 5.0));
    }

    #[test]
    fn test_point_outside_square() {
        assert!(!square().contains(15.0, 5.0));
        assert!(!square().contains(5.0, -1.0));
    }

    #[test]
    fn test_point_on_edge_is_inside() {
        assert!(square().contains(10.0, 5.0));
        assert!(square().contains(0.0, 0.0));
    }

    #[test]
    fn test_concave_polygon() {
        // U-shaped polygon; the notch between the arms is outside.
        let roi = Roi::new(vec![
            [0.0, 0.0],
            [10.0, 0.0],
            [10.0, 10.0],
            [7.0, 10.0],
            [7.0, 3.0],
            [3.0, 3.0],
            [3.0, 10.0],
            [0.0, 10.0],
        ]);
        assert!(roi.contains(1.0, 5.0));
        assert!(roi.contains(8.0, 5.0));
        assert!(!roi.contains(5.0, 8.0));
    }

    #[test]
    fn test_degenerate_polygon_counts_whole_frame() {
        let roi = Roi::new(vec![[0.0, 0.0], [10.0, 10.0]]);
        assert!(!roi.is_configured());
        assert!(roi.contains(-500.0, 9999.0));

        let empty = Roi::default();
        assert!(empty.contains(0.0, 0.0));
    }

    #[test]
    fn test_parse_json_polygon() {
        let roi = Roi::parse("[[50, 50], [1230, 50], [1230, 670], [50, 670]]").unwrap();
        assert_eq!(roi, Roi::default_gate());
        assert!(roi.contains(640.0, 360.0));
        assert!(!roi.contains(10.0, 10.0));
    }

    #[test]
    fn test_parse_rejects_malformed_json() {
        assert!(Roi::parse("not json").is_err());
        assert!(Roi::parse("{\"a\": 1}").is_err());
    }

    #[test]
    fn test_direction_mode_filtering() {
        assert!(DirectionMode::Both.allows(Direction::In));
        assert!(DirectionMode::Both.allows(Direction::Out));
        assert!(DirectionMode::In.allows(Direction::In));
        assert!(!DirectionMode::In.allows(Direction::Out));
        assert!(DirectionMode::Out.allows(Direction::Out));
        assert!(!DirectionMode::Out.allows(Direction::In));
    }
}
