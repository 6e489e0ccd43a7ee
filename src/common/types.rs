//! Common types used throughout rosbot_mppic

use itertools::Itertools;
use nalgebra::{Vector2, Vector3};

use crate::common::error::{MppicError, MppicResult};

/// 2D point representation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn origin() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    pub fn distance(&self, other: &Point2D) -> f64 {
        self.squared_distance(other).sqrt()
    }

    pub fn squared_distance(&self, other: &Point2D) -> f64 {
        (self.x - other.x).powi(2) + (self.y - other.y).powi(2)
    }

    pub fn to_vector(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }
}

impl From<(f64, f64)> for Point2D {
    fn from(tuple: (f64, f64)) -> Self {
        Self { x: tuple.0, y: tuple.1 }
    }
}

/// 2D pose (position + orientation)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose2D {
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
}

impl Pose2D {
    pub fn new(x: f64, y: f64, yaw: f64) -> Self {
        Self { x, y, yaw }
    }

    pub fn origin() -> Self {
        Self { x: 0.0, y: 0.0, yaw: 0.0 }
    }

    pub fn position(&self) -> Point2D {
        Point2D::new(self.x, self.y)
    }

    pub fn to_vector(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.yaw)
    }
}

impl From<Vector3<f64>> for Pose2D {
    fn from(v: Vector3<f64>) -> Self {
        Self { x: v[0], y: v[1], yaw: v[2] }
    }
}

/// Full robot state as reported by odometry
///
/// `vx`/`vy` are body-frame linear velocities, `w` the yaw rate.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RobotState {
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
    pub vx: f64,
    pub vy: f64,
    pub w: f64,
}

impl RobotState {
    pub fn new(x: f64, y: f64, yaw: f64, vx: f64, vy: f64, w: f64) -> Self {
        Self { x, y, yaw, vx, vy, w }
    }

    /// Stationary state at the given pose
    pub fn at_pose(x: f64, y: f64, yaw: f64) -> Self {
        Self { x, y, yaw, ..Self::default() }
    }

    pub fn pose(&self) -> Pose2D {
        Pose2D::new(self.x, self.y, self.yaw)
    }

    pub fn position(&self) -> Point2D {
        Point2D::new(self.x, self.y)
    }
}

/// Reduced unicycle state used to anchor sampled trajectories
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct State {
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
    pub v: f64,
    pub w: f64,
}

impl State {
    pub fn new(x: f64, y: f64, yaw: f64, v: f64, w: f64) -> Self {
        Self { x, y, yaw, v, w }
    }

    pub fn pose(&self) -> Pose2D {
        Pose2D::new(self.x, self.y, self.yaw)
    }

    pub fn velocity(&self) -> Control {
        Control::new(self.v, self.w)
    }
}

impl From<RobotState> for State {
    fn from(s: RobotState) -> Self {
        // unicycle: no lateral slip, forward speed is vx
        Self { x: s.x, y: s.y, yaw: s.yaw, v: s.vx, w: s.w }
    }
}

/// Navigation goal
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Goal {
    pub x: f64,
    pub y: f64,
}

impl Goal {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<Point2D> for Goal {
    fn from(p: Point2D) -> Self {
        Self { x: p.x, y: p.y }
    }
}

/// Velocity command for a unicycle robot
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Control {
    /// linear velocity [m/s]
    pub v: f64,
    /// angular velocity [rad/s]
    pub w: f64,
}

impl Control {
    pub fn new(v: f64, w: f64) -> Self {
        Self { v, w }
    }

    pub fn zero() -> Self {
        Self { v: 0.0, w: 0.0 }
    }

    pub fn to_vector(&self) -> Vector2<f64> {
        Vector2::new(self.v, self.w)
    }
}

impl From<Vector2<f64>> for Control {
    fn from(v: Vector2<f64>) -> Self {
        Self { v: v[0], w: v[1] }
    }
}

/// Reference path the sampled trajectories are scored against
///
/// Holds the waypoints and the Euclidean spacing between consecutive
/// waypoints, so `intervals().len() == waypoints().len() - 1`.
#[derive(Debug, Clone)]
pub struct ReferenceTrajectory {
    waypoints: Vec<Pose2D>,
    intervals: Vec<f64>,
}

impl ReferenceTrajectory {
    /// Build a reference from waypoints, computing the intervals
    pub fn new(waypoints: Vec<Pose2D>) -> MppicResult<Self> {
        if waypoints.is_empty() {
            return Err(MppicError::InvalidReference(
                "reference trajectory has no waypoints".to_string(),
            ));
        }
        let intervals = waypoints
            .iter()
            .tuple_windows()
            .map(|(a, b)| a.position().distance(&b.position()))
            .collect();
        Ok(Self { waypoints, intervals })
    }

    /// Build a reference with externally supplied intervals
    pub fn with_intervals(waypoints: Vec<Pose2D>, intervals: Vec<f64>) -> MppicResult<Self> {
        if waypoints.is_empty() {
            return Err(MppicError::InvalidReference(
                "reference trajectory has no waypoints".to_string(),
            ));
        }
        if intervals.len() + 1 != waypoints.len() {
            return Err(MppicError::InvalidReference(format!(
                "expected {} intervals for {} waypoints, got {}",
                waypoints.len() - 1,
                waypoints.len(),
                intervals.len()
            )));
        }
        Ok(Self { waypoints, intervals })
    }

    /// Reference through the given coordinates, yaw pointing along the path
    pub fn from_xy(x: &[f64], y: &[f64]) -> MppicResult<Self> {
        if x.len() != y.len() {
            return Err(MppicError::InvalidReference(format!(
                "coordinate length mismatch: {} x vs {} y",
                x.len(),
                y.len()
            )));
        }
        let n = x.len();
        let waypoints = (0..n)
            .map(|i| {
                let (dx, dy) = if i + 1 < n {
                    (x[i + 1] - x[i], y[i + 1] - y[i])
                } else if i > 0 {
                    (x[i] - x[i - 1], y[i] - y[i - 1])
                } else {
                    (1.0, 0.0)
                };
                Pose2D::new(x[i], y[i], dy.atan2(dx))
            })
            .collect();
        Self::new(waypoints)
    }

    pub fn waypoints(&self) -> &[Pose2D] {
        &self.waypoints
    }

    pub fn intervals(&self) -> &[f64] {
        &self.intervals
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn last(&self) -> Pose2D {
        self.waypoints[self.waypoints.len() - 1]
    }

    pub fn total_length(&self) -> f64 {
        self.intervals.iter().sum()
    }

    /// Index of the waypoint closest to `point`
    pub fn nearest_index(&self, point: &Point2D) -> usize {
        let mut ind_min = 0;
        let mut d_min = f64::MAX;
        for (i, wp) in self.waypoints.iter().enumerate() {
            let d = wp.position().squared_distance(point);
            if d < d_min {
                d_min = d;
                ind_min = i;
            }
        }
        ind_min
    }

    /// Sub-path of at most `len` waypoints starting at `start`
    ///
    /// `start` is clamped to the last waypoint, so the window is never empty.
    pub fn window(&self, start: usize, len: usize) -> ReferenceTrajectory {
        let start = start.min(self.waypoints.len() - 1);
        let end = (start + len.max(1)).min(self.waypoints.len());
        ReferenceTrajectory {
            waypoints: self.waypoints[start..end].to_vec(),
            intervals: self.intervals[start..end - 1].to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_point2d_distance() {
        let p1 = Point2D::new(0.0, 0.0);
        let p2 = Point2D::new(3.0, 4.0);
        assert_relative_eq!(p1.distance(&p2), 5.0);
        assert_relative_eq!(p1.squared_distance(&p2), 25.0);
    }

    #[test]
    fn test_state_from_robot_state() {
        let odom = RobotState::new(1.0, 2.0, 0.3, 0.4, 0.1, -0.2);
        let state = State::from(odom);
        assert_eq!(state, State::new(1.0, 2.0, 0.3, 0.4, -0.2));
    }

    #[test]
    fn test_reference_intervals() {
        let reference = ReferenceTrajectory::from_xy(&[0.0, 1.0, 1.0], &[0.0, 0.0, 1.0]).unwrap();
        assert_eq!(reference.intervals().len(), 2);
        assert_relative_eq!(reference.total_length(), 2.0);
        assert_relative_eq!(reference.waypoints()[1].yaw, std::f64::consts::FRAC_PI_2);
    }

    #[test]
    fn test_reference_window() {
        let xs: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let reference = ReferenceTrajectory::from_xy(&xs, &[0.0; 10]).unwrap();
        assert_eq!(reference.nearest_index(&Point2D::new(3.2, 1.0)), 3);

        let window = reference.window(3, 4);
        assert_eq!(window.len(), 4);
        assert_eq!(window.intervals().len(), 3);
        assert_eq!(window.waypoints()[0].x, 3.0);

        let tail = reference.window(8, 5);
        assert_eq!(tail.len(), 2);
        let past_end = reference.window(42, 5);
        assert_eq!(past_end.len(), 1);
        assert!(past_end.intervals().is_empty());
    }

    #[test]
    fn test_reference_rejects_empty() {
        assert!(matches!(
            ReferenceTrajectory::new(vec![]),
            Err(MppicError::InvalidReference(_))
        ));
    }

    #[test]
    fn test_reference_interval_length_checked() {
        let waypoints = vec![Pose2D::origin(), Pose2D::new(1.0, 0.0, 0.0)];
        assert!(ReferenceTrajectory::with_intervals(waypoints.clone(), vec![1.0]).is_ok());
        assert!(ReferenceTrajectory::with_intervals(waypoints, vec![1.0, 2.0]).is_err());
    }
}
