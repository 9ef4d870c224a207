//! Keyframe data model
//!
//! These types match the recording file format: a keyframe is one detected
//! subject in one video frame, its points normalized to the source frame.

use serde::{Deserialize, Serialize};

/// A single detected landmark
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Landmark name as reported by the model (e.g. "left_wrist")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Confidence score (0.0 - 1.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    /// Normalized x, y (0.0 - 1.0) and an optional model-dependent z
    pub position: Vec<f64>,
}

impl Point {
    /// Create a 2D point
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            name: None,
            score: None,
            position: vec![x, y],
        }
    }

    /// Create a 3D point
    pub fn with_z(x: f64, y: f64, z: f64) -> Self {
        Self {
            name: None,
            score: None,
            position: vec![x, y, z],
        }
    }

    /// Normalize a pixel-space landmark against the source frame size
    pub fn from_pixels(x: f64, y: f64, z: Option<f64>, width: f64, height: f64) -> Self {
        let mut position = vec![x / width, y / height];
        if let Some(z) = z {
            position.push(z);
        }
        Self {
            name: None,
            score: None,
            position,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn scored(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn x(&self) -> f64 {
        self.position.first().copied().unwrap_or(0.0)
    }

    pub fn y(&self) -> f64 {
        self.position.get(1).copied().unwrap_or(0.0)
    }

    pub fn z(&self) -> Option<f64> {
        self.position.get(2).copied()
    }

    /// A position must carry 2 or 3 coordinates
    pub fn is_well_formed(&self) -> bool {
        matches!(self.position.len(), 2 | 3)
    }
}

/// Extent of a keyframe's points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseBounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    pub min_z: Option<f64>,
    pub max_z: Option<f64>,
}

/// One subject's points at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Keyframe {
    /// Milliseconds since the start of the recording or playback session
    pub time: f64,

    /// Subject index within the source frame
    pub pose: u32,

    /// Aggregate detection score
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    /// Width / height of the source frame at capture time
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: f64,

    pub points: Vec<Point>,
}

fn default_aspect_ratio() -> f64 {
    1.0
}

impl Keyframe {
    pub fn new(time: f64, pose: u32, aspect_ratio: f64, points: Vec<Point>) -> Self {
        Self {
            time,
            pose,
            score: None,
            aspect_ratio,
            points,
        }
    }

    /// Look up a point by landmark name
    pub fn point(&self, name: &str) -> Option<&Point> {
        self.points.iter().find(|pt| pt.name.as_deref() == Some(name))
    }

    /// Min/max of the point coordinates, `None` when there are no points
    pub fn bounds(&self) -> Option<PoseBounds> {
        let first = self.points.first()?;
        let mut bounds = PoseBounds {
            min_x: first.x(),
            max_x: first.x(),
            min_y: first.y(),
            max_y: first.y(),
            min_z: first.z(),
            max_z: first.z(),
        };

        for pt in &self.points[1..] {
            bounds.min_x = bounds.min_x.min(pt.x());
            bounds.max_x = bounds.max_x.max(pt.x());
            bounds.min_y = bounds.min_y.min(pt.y());
            bounds.max_y = bounds.max_y.max(pt.y());
            if let Some(z) = pt.z() {
                bounds.min_z = Some(bounds.min_z.map_or(z, |m| m.min(z)));
                bounds.max_z = Some(bounds.max_z.map_or(z, |m| m.max(z)));
            }
        }

        Some(bounds)
    }
}

/// Find a named point on the given subject among one frame's keyframes
pub fn find_part<'a>(keyframes: &'a [Keyframe], name: &str, pose_index: usize) -> Option<&'a Point> {
    keyframes.get(pose_index).and_then(|kf| kf.point(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Keyframe {
        Keyframe::new(
            0.0,
            0,
            16.0 / 9.0,
            vec![
                Point::new(0.2, 0.4).named("nose").scored(0.9),
                Point::with_z(0.6, 0.1, -0.5).named("left_wrist"),
                Point::new(0.4, 0.8),
            ],
        )
    }

    #[test]
    fn test_point_from_pixels() {
        let pt = Point::from_pixels(320.0, 120.0, Some(2.0), 640.0, 480.0);
        assert_eq!(pt.position, vec![0.5, 0.25, 2.0]);
        assert!(pt.is_well_formed());
    }

    #[test]
    fn test_find_part() {
        let frame = vec![sample()];
        let wrist = find_part(&frame, "left_wrist", 0).unwrap();
        assert_eq!(wrist.x(), 0.6);
        assert!(find_part(&frame, "left_wrist", 1).is_none());
        assert!(find_part(&frame, "tail", 0).is_none());
    }

    #[test]
    fn test_bounds() {
        let bounds = sample().bounds().unwrap();
        assert_eq!(bounds.min_x, 0.2);
        assert_eq!(bounds.max_x, 0.6);
        assert_eq!(bounds.min_y, 0.1);
        assert_eq!(bounds.max_y, 0.8);
        assert_eq!(bounds.min_z, Some(-0.5));
        assert_eq!(bounds.max_z, Some(-0.5));

        let empty = Keyframe::new(0.0, 0, 1.0, vec![]);
        assert!(empty.bounds().is_none());
    }

    #[test]
    fn test_keyframe_json_field_names() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!(json.get("aspectRatio").is_some());
        assert!(json.get("score").is_none());
        assert!(json["points"][2].get("name").is_none());
    }
}
