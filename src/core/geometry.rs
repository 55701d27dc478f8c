//! Planar primitives used by the arena.
//!
//! Lines are carried in general form `a·x + b·y + c = 0`.

use core::ops::{Add, AddAssign, Mul, Neg, Sub};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::GeometryError;

/// Below this, a length or determinant is treated as zero.
pub const EPSILON: f32 = 1.0e-6;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn dot(self, other: Vec2) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// z component of the 3D cross product.
    #[inline]
    pub fn cross(self, other: Vec2) -> f32 {
        self.x * other.y - self.y * other.x
    }

    #[inline]
    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    #[inline]
    pub fn distance(self, other: Vec2) -> f32 {
        (self - other).length()
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn approx_eq(self, other: Vec2, tol: f32) -> bool {
        (self.x - other.x).abs() <= tol && (self.y - other.y).abs() <= tol
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;
    fn mul(self, k: f32) -> Vec2 {
        Vec2::new(self.x * k, self.y * k)
    }
}

impl Neg for Vec2 {
    type Output = Vec2;
    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }
}

impl From<(f32, f32)> for Vec2 {
    fn from((x, y): (f32, f32)) -> Self {
        Vec2::new(x, y)
    }
}

/// Coefficients `(a, b, c)` of the line `a·x + b·y + c = 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LineCoefficients {
    pub a: f32,
    pub b: f32,
    pub c: f32,
}

impl LineCoefficients {
    /// Length of the normal `(a, b)`.
    #[inline]
    pub fn normal_length(&self) -> f32 {
        (self.a * self.a + self.b * self.b).sqrt()
    }

    /// Signed distance of `p` from the line; the sign tells the side.
    pub fn signed_distance(&self, p: Vec2) -> Result<f32, GeometryError> {
        let norm = self.normal_length();
        if norm < EPSILON {
            return Err(GeometryError::ZeroNormal);
        }
        Ok((self.a * p.x + self.b * p.y + self.c) / norm)
    }

    /// Foot of the perpendicular from `p`.
    pub fn project(&self, p: Vec2) -> Result<Vec2, GeometryError> {
        let d = self.signed_distance(p)?;
        let norm = self.normal_length();
        Ok(Vec2::new(p.x - self.a * d / norm, p.y - self.b * d / norm))
    }
}

/// Line through `p1` and `p2`: `a = y1 − y2`, `b = x2 − x1`, `c = −a·x1 − b·y1`.
pub fn general_form(p1: Vec2, p2: Vec2) -> LineCoefficients {
    let a = p1.y - p2.y;
    let b = p2.x - p1.x;
    let c = -a * p1.x - b * p1.y;
    LineCoefficients { a, b, c }
}

/// Shortest distance from `point` to the segment `p1–p2`.
///
/// Uses the perpendicular distance when the projection lands inside the
/// segment's bounding box on both axes, otherwise the nearer endpoint.
pub fn distance_to_segment(point: Vec2, p1: Vec2, p2: Vec2) -> f32 {
    let endpoints = point.distance(p1).min(point.distance(p2));
    let line = general_form(p1, p2);
    let (Ok(d_line), Ok(foot)) = (line.signed_distance(point), line.project(point)) else {
        // Degenerate segment: it is a point.
        return endpoints;
    };
    let between = |v: f32, lo: f32, hi: f32| {
        let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
        let tol = EPSILON.max(1.0e-5 * lo.abs().max(hi.abs()));
        lo - tol <= v && v <= hi + tol
    };
    if between(foot.x, p1.x, p2.x) && between(foot.y, p1.y, p2.y) {
        d_line.abs()
    } else {
        endpoints
    }
}

/// Whether `p1, p2, p3` turn counter-clockwise.
#[inline]
pub fn are_ccw(p1: Vec2, p2: Vec2, p3: Vec2) -> bool {
    (p3.y - p1.y) * (p2.x - p1.x) > (p2.y - p1.y) * (p3.x - p1.x)
}

/// Proper intersection test: each segment's endpoints lie on strictly
/// opposite sides of the other.
pub fn segments_intersect(p1: Vec2, p2: Vec2, q1: Vec2, q2: Vec2) -> bool {
    are_ccw(p1, q1, q2) != are_ccw(p2, q1, q2) && are_ccw(p1, p2, q1) != are_ccw(p1, p2, q2)
}

/// Intersection of the lines through `p1–p2` and `q1–q2` by Cramer's rule.
pub fn intersection_point(p1: Vec2, p2: Vec2, q1: Vec2, q2: Vec2) -> Result<Vec2, GeometryError> {
    let l1 = general_form(p1, p2);
    let l2 = general_form(q1, q2);
    let det = l1.a * l2.b - l2.a * l1.b;
    // Scale-aware: compare against the product of the two normals.
    let scale = (l1.normal_length() * l2.normal_length()).max(EPSILON);
    if det.abs() <= scale * EPSILON {
        return Err(GeometryError::ParallelLines);
    }
    let x = (l1.b * l2.c - l2.b * l1.c) / det;
    let y = (l1.c * l2.a - l2.c * l1.a) / det;
    Ok(Vec2::new(x, y))
}

/// Specular reflection of `v` off a wall with normal `(a, b)`; keeps `|v|`.
pub fn reflect_velocity(v: Vec2, a: f32, b: f32) -> Result<Vec2, GeometryError> {
    let norm = (a * a + b * b).sqrt();
    if norm < EPSILON {
        return Err(GeometryError::ZeroNormal);
    }
    let n = Vec2::new(a / norm, b / norm);
    let k = 2.0 * v.dot(n);
    Ok(v - n * k)
}

/// Mirror image of `p` across the line `a·x + b·y + c = 0`.
pub fn reflect_point_over_line(p: Vec2, a: f32, b: f32, c: f32) -> Result<Vec2, GeometryError> {
    let z = a * a + b * b;
    if z < EPSILON * EPSILON {
        return Err(GeometryError::ZeroNormal);
    }
    let x = p.x * (b * b - a * a) - 2.0 * a * (b * p.y + c);
    let y = p.y * (a * a - b * b) - 2.0 * b * (a * p.x + c);
    Ok(Vec2::new(x / z, y / z))
}
