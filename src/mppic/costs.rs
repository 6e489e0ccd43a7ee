//! Trajectory cost functions
//!
//! Both evaluators add a linear velocity tracking term to a path
//! following term. The nearest variant scores squared distances to the
//! closest reference waypoints; the triangle variant scores the exact
//! distance to the closest reference segment, classifying each
//! point/segment triangle by its angles so only points that project inside
//! the segment need Heron's formula.

use nalgebra::DVector;
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::Deserialize;

use crate::common::{MppicError, MppicResult, Pose2D, ReferenceTrajectory, TrajectoryCost};
use crate::mppic::batch::{TrajectoryBatch, TrajectoryPoint};

/// Weight of the linear velocity tracking term
const DESIRED_V_WEIGHT: f64 = 2.0;
/// Number of nearest waypoints considered by the nearest cost
const NEAREST_K: usize = 3;
/// Segments shorter than this are treated as a single point
const SEGMENT_EPS: f64 = 1e-5;

/// Selects the path-following metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostKind {
    Nearest,
    Triangle,
}

impl TrajectoryCost for CostKind {
    fn evaluate(
        &self,
        trajectories: &TrajectoryBatch,
        reference: &ReferenceTrajectory,
        desired_v: f64,
    ) -> MppicResult<DVector<f64>> {
        match self {
            CostKind::Nearest => nearest_cost(trajectories, reference, desired_v),
            CostKind::Triangle => triangle_cost(trajectories, reference, desired_v),
        }
    }
}

/// Velocity term plus weighted distance to the nearest waypoints
pub fn nearest_cost(
    trajectories: &TrajectoryBatch,
    reference: &ReferenceTrajectory,
    desired_v: f64,
) -> MppicResult<DVector<f64>> {
    let costs = linear_velocity_cost(trajectories, desired_v)
        + nearest_points_cost(trajectories, reference, NEAREST_K)?;
    Ok(costs)
}

/// Velocity term plus distance to the nearest reference segment
pub fn triangle_cost(
    trajectories: &TrajectoryBatch,
    reference: &ReferenceTrajectory,
    desired_v: f64,
) -> MppicResult<DVector<f64>> {
    let costs = linear_velocity_cost(trajectories, desired_v)
        + segment_distance_cost(trajectories, reference)?;
    Ok(costs)
}

/// `sum_t 2 * (v_t - desired_v)^2` per sample
pub fn linear_velocity_cost(trajectories: &TrajectoryBatch, desired_v: f64) -> DVector<f64> {
    per_sample(trajectories, |points| {
        DESIRED_V_WEIGHT * points.iter().map(|p| (p.v - desired_v).powi(2)).sum::<f64>()
    })
}

/// Squared distance to the `k` closest waypoints, weighted `1..=k`
///
/// Per step the `k` smallest squared distances are sorted ascending and
/// multiplied by their rank, the minimum of those is kept and summed over
/// the horizon.
pub fn nearest_points_cost(
    trajectories: &TrajectoryBatch,
    reference: &ReferenceTrajectory,
    k: usize,
) -> MppicResult<DVector<f64>> {
    let waypoints = checked_waypoints(reference)?;
    let k = k.min(waypoints.len()).max(1);

    Ok(per_sample(trajectories, |points| {
        let mut dists = vec![0.0; waypoints.len()];
        points
            .iter()
            .map(|p| {
                for (d, wp) in dists.iter_mut().zip(waypoints) {
                    *d = (p.x - wp.x).powi(2) + (p.y - wp.y).powi(2);
                }
                dists.select_nth_unstable_by_key(k - 1, |d| OrderedFloat(*d));
                let nearest = &mut dists[..k];
                nearest.sort_unstable_by_key(|d| OrderedFloat(*d));
                nearest
                    .iter()
                    .enumerate()
                    .map(|(i, d)| d * (i + 1) as f64)
                    .fold(f64::INFINITY, f64::min)
            })
            .sum()
    }))
}

/// Distance to the closest reference segment, summed over the horizon
///
/// A single-waypoint reference has no segments; the plain point distance
/// is used instead.
pub fn segment_distance_cost(
    trajectories: &TrajectoryBatch,
    reference: &ReferenceTrajectory,
) -> MppicResult<DVector<f64>> {
    let waypoints = checked_waypoints(reference)?;
    let intervals = reference.intervals();

    if waypoints.len() == 1 {
        let wp = waypoints[0];
        return Ok(per_sample(trajectories, |points| {
            points
                .iter()
                .map(|p| ((p.x - wp.x).powi(2) + (p.y - wp.y).powi(2)).sqrt())
                .sum()
        }));
    }

    Ok(per_sample(trajectories, |points| {
        points
            .iter()
            .map(|p| {
                let mut best = f64::INFINITY;
                let mut first = ((p.x - waypoints[0].x).powi(2) + (p.y - waypoints[0].y).powi(2)).sqrt();
                for (wp, &opposite) in waypoints[1..].iter().zip(intervals) {
                    let second = ((p.x - wp.x).powi(2) + (p.y - wp.y).powi(2)).sqrt();
                    best = best.min(distance_to_segment(opposite, first, second));
                    first = second;
                }
                best
            })
            .sum()
    }))
}

/// Distance from a point to a segment given the three triangle sides
///
/// `opposite` is the segment length, `b` and `c` the distances from the
/// point to the first and second endpoint.
pub fn distance_to_segment(opposite: f64, b: f64, c: f64) -> f64 {
    if opposite.abs() < SEGMENT_EPS {
        return b.min(c);
    }
    if is_angle_obtuse(c, b, opposite) {
        // obtuse at the first endpoint
        b
    } else if is_angle_obtuse(b, c, opposite) {
        c
    } else {
        heron_height(opposite, b, c)
    }
}

/// True when the angle facing `opposite` is obtuse (law of cosines)
pub fn is_angle_obtuse(opposite: f64, b: f64, c: f64) -> bool {
    opposite * opposite > b * b + c * c
}

/// Height onto side `base` of the triangle with sides `base`, `b`, `c`
pub fn heron_height(base: f64, b: f64, c: f64) -> f64 {
    if base.abs() < SEGMENT_EPS {
        return b.min(c);
    }
    let p = (base + b + c) / 2.0;
    // collinear points may round the radicand slightly below zero
    let area_sq = (p * (p - base) * (p - b) * (p - c)).max(0.0);
    2.0 / base * area_sq.sqrt()
}

fn checked_waypoints(reference: &ReferenceTrajectory) -> MppicResult<&[Pose2D]> {
    if reference.is_empty() {
        return Err(MppicError::InvalidReference(
            "cannot score against an empty reference".to_string(),
        ));
    }
    Ok(reference.waypoints())
}

fn per_sample<F>(trajectories: &TrajectoryBatch, f: F) -> DVector<f64>
where
    F: Fn(&[TrajectoryPoint]) -> f64 + Sync,
{
    let costs: Vec<f64> = trajectories.par_samples().map(|points| f(points)).collect();
    DVector::from_vec(costs)
}
