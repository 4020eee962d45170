//! Geometry the tree consumes: axis-aligned boxes, finite segments and frustum
//! clip classification. Vectors and matrices come straight from glam.

use arrayvec::ArrayVec;
use glam::{Mat4, Vec3};

// clip plane flags for the 8-corner frustum test
const CLIP_LEFT: u8 = 1 << 0;
const CLIP_RIGHT: u8 = 1 << 1;
const CLIP_BOTTOM: u8 = 1 << 2;
const CLIP_TOP: u8 = 1 << 3;
const CLIP_NEAR: u8 = 1 << 4;
const CLIP_FAR: u8 = 1 << 5;

/// Direction components smaller than this are treated as parallel to the slab planes.
const PARALLEL_TOLERANCE: f32 = 1e-6;

/// Classification of a box against the view volume of a projection transform.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ClipStatus {
    /// The box lies entirely beyond at least one clip plane.
    Outside,
    /// Every corner of the box is inside all six clip planes.
    Inside,
    /// The box straddles the view volume boundary.
    Clipped,
}

/// A finite line segment, `origin + t * direction` for `t` in `[0, 1]`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Segment {
    origin: Vec3,
    direction: Vec3,
}

impl Segment {
    #[inline]
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// builds the segment running from `start` to `end`.
    #[inline]
    pub fn from_points(start: Vec3, end: Vec3) -> Self {
        Self {
            origin: start,
            direction: end - start,
        }
    }

    #[inline]
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    #[inline]
    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    /// the point at parameter `t`; `t = 0` is the origin, `t = 1` the far end.
    #[inline]
    pub fn point_at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Axis-aligned bounding box given by its two extreme corners.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    #[inline]
    pub fn new(min: Vec3, max: Vec3) -> Self {
        debug_assert!(min.cmple(max).all(), "Box corners are swapped");
        Self { min, max }
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Exact containment test: does `other` lie fully within this box on every axis?
    ///
    /// Rejection uses strict inequalities, so a box touching the boundary of
    /// this one still counts as contained. Containment queries on the tree
    /// rely on this direction of comparison to resolve cell-boundary ties.
    #[inline]
    pub fn contains_aabb(&self, other: &Aabb) -> bool {
        !(other.min.x < self.min.x
            || other.max.x > self.max.x
            || other.min.y < self.min.y
            || other.max.y > self.max.y
            || other.min.z < self.min.z
            || other.max.z > self.max.z)
    }

    /// Classifies this box against the view volume of `view_projection`.
    ///
    /// All 8 corners are transformed to clip space and tested against the six
    /// planes. A corner collects a flag per failed plane; if some plane fails
    /// for every corner the box is [ClipStatus::Outside], if no corner fails
    /// any plane it is [ClipStatus::Inside], anything in between is
    /// [ClipStatus::Clipped].
    pub fn clip_status(&self, view_projection: &Mat4) -> ClipStatus {
        let mut and_flags = 0xffu8;
        let mut or_flags = 0u8;

        for i in 0..8usize {
            let corner = Vec3::new(
                if i & 1 != 0 { self.min.x } else { self.max.x },
                if i & 2 != 0 { self.min.y } else { self.max.y },
                if i & 4 != 0 { self.min.z } else { self.max.z },
            );
            let v = *view_projection * corner.extend(1.0);

            let mut clip = 0u8;
            if v.x < -v.w {
                clip |= CLIP_LEFT;
            } else if v.x > v.w {
                clip |= CLIP_RIGHT;
            }
            if v.y < -v.w {
                clip |= CLIP_BOTTOM;
            } else if v.y > v.w {
                clip |= CLIP_TOP;
            }
            if v.z < -v.w {
                clip |= CLIP_FAR;
            } else if v.z > v.w {
                clip |= CLIP_NEAR;
            }

            and_flags &= clip;
            or_flags |= clip;
        }

        if or_flags == 0 {
            ClipStatus::Inside
        } else if and_flags != 0 {
            ClipStatus::Outside
        } else {
            ClipStatus::Clipped
        }
    }

    /// Slab-method interval of `line` against this box.
    ///
    /// Returns the raw `[t_near, t_far]` parameter interval in which the
    /// carrying line is inside all three slabs, or None when the slabs have
    /// no common interval. The interval is not clipped to the segment's own
    /// `[0, 1]` range; see [Aabb::test_intersection] for that.
    pub fn segment_interval(&self, line: &Segment) -> Option<(f32, f32)> {
        let mut t_near = f32::NEG_INFINITY;
        let mut t_far = f32::INFINITY;

        for i in 0..3usize {
            let dir = line.direction()[i];
            let origin = line.origin()[i];

            if dir.abs() < PARALLEL_TOLERANCE {
                // parallel to this slab: origin must already be inside it
                if origin < self.min[i] || origin > self.max[i] {
                    return None;
                }
            } else {
                let mut t1 = (self.min[i] - origin) / dir;
                let mut t2 = (self.max[i] - origin) / dir;
                if t1 > t2 {
                    std::mem::swap(&mut t1, &mut t2);
                }
                t_near = t_near.max(t1);
                t_far = t_far.min(t2);
                if t_near > t_far {
                    return None;
                }
            }
        }

        Some((t_near, t_far))
    }

    /// true when any part of the segment's `[0, 1]` range lies inside the box.
    #[inline]
    pub fn test_intersection(&self, line: &Segment) -> bool {
        match self.segment_interval(line) {
            Some((t_near, t_far)) => !(t_far < 0.0 || t_near > 1.0),
            None => false,
        }
    }

    /// The points where the segment enters and leaves the box, when those fall
    /// within the segment itself. A segment starting inside yields only the
    /// exit point, one ending inside only the entry point.
    pub fn intersection_points(&self, line: &Segment) -> ArrayVec<Vec3, 2> {
        let mut points = ArrayVec::new();
        let Some((t_near, t_far)) = self.segment_interval(line) else {
            return points;
        };

        let near_in_range = (0.0..=1.0).contains(&t_near);
        if near_in_range {
            points.push(line.point_at(t_near));
        }
        if (0.0..=1.0).contains(&t_far)
            && ((t_far - t_near).abs() > PARALLEL_TOLERANCE || !near_in_range)
        {
            points.push(line.point_at(t_far));
        }
        points
    }
}

/// uniform random point inside `bounds`.
#[cfg(feature = "rand")]
pub fn rand_point<R: rand::Rng>(rng: &mut R, bounds: &Aabb) -> Vec3 {
    Vec3::new(
        rng.random_range(bounds.min.x..=bounds.max.x),
        rng.random_range(bounds.min.y..=bounds.max.y),
        rng.random_range(bounds.min.z..=bounds.max.z),
    )
}

/// random box spanned by two random points inside `bounds`.
#[cfg(feature = "rand")]
pub fn rand_aabb<R: rand::Rng>(rng: &mut R, bounds: &Aabb) -> Aabb {
    let a = rand_point(rng, bounds);
    let b = rand_point(rng, bounds);
    Aabb::new(a.min(b), a.max(b))
}

/// random segment between two random points inside `bounds`.
#[cfg(feature = "rand")]
pub fn rand_segment<R: rand::Rng>(rng: &mut R, bounds: &Aabb) -> Segment {
    Segment::from_points(rand_point(rng, bounds), rand_point(rng, bounds))
}
