//! Closed polygonal arena: wall geometry, multi-bounce displacement
//! resolution and nearest-wall queries.

use tracing::{trace, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::agent::InputRing;
use crate::error::{GeometryError, Result, StynkerError};
use crate::geometry::{
    self, distance_to_segment, general_form, LineCoefficients, Vec2, EPSILON,
};
use crate::node::NodeId;

/// Index into [`Arena::segments`].
pub type SegmentId = usize;

/// Reflections allowed in one resolution before it is declared degenerate.
pub const MAX_REFLECTIONS: usize = 16;

/// Distance under which a point counts as lying on a wall, and two contacts
/// count as simultaneous.
pub const CONTACT_TOLERANCE: f32 = 1.0e-3;

/// Serializable description of an arena.
///
/// `winning_segment` / `losing_segment` index the polyline segments
/// `vertices[i] → vertices[i + 1]` (after closing the ring), before
/// deduplication.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ArenaDefinition {
    pub name: String,
    pub vertices: Vec<Vec2>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub winning_segment: Option<usize>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub losing_segment: Option<usize>,
}

impl Default for ArenaDefinition {
    fn default() -> Self {
        Self::simple_maze()
    }
}

impl ArenaDefinition {
    pub fn new(name: impl Into<String>, vertices: Vec<Vec2>) -> Self {
        Self {
            name: name.into(),
            vertices,
            winning_segment: None,
            losing_segment: None,
        }
    }

    pub fn with_terminals(mut self, winning: Option<usize>, losing: Option<usize>) -> Self {
        self.winning_segment = winning;
        self.losing_segment = losing;
        self
    }

    /// Axis-aligned square centred on the origin, no terminal walls.
    pub fn square(half: f32) -> Self {
        Self::new(
            "square",
            vec![
                Vec2::new(half, half),
                Vec2::new(half, -half),
                Vec2::new(-half, -half),
                Vec2::new(-half, half),
            ],
        )
    }

    /// Regular hexagon with a vertex on +x; the top edge wins, the bottom edge loses.
    pub fn hexagon(radius: f32) -> Self {
        let vertices = (0..6)
            .map(|k| {
                let alpha = (60.0 * k as f32).to_radians();
                Vec2::new(alpha.cos() * radius, alpha.sin() * radius)
            })
            .collect();
        Self::new("hexagon", vertices).with_terminals(Some(1), Some(4))
    }

    /// Two inner walls folding the square into an S-shaped corridor. The
    /// agent starts in the middle lane; the top-left edge wins, the
    /// bottom-right edge loses.
    pub fn simple_maze() -> Self {
        let v = |x: f32, y: f32| Vec2::new(x, y);
        Self::new(
            "simple_maze",
            vec![
                v(360.0, -360.0),
                v(360.0, 360.0),
                v(-120.0, 360.0),
                v(-120.0, -180.0),
                v(-120.0, 360.0),
                v(-360.0, 360.0),
                v(-360.0, -360.0),
                v(120.0, -360.0),
                v(120.0, 180.0),
                v(120.0, -360.0),
                v(360.0, -360.0),
            ],
        )
        .with_terminals(Some(4), Some(9))
    }

    pub fn preset(name: &str) -> Result<Self> {
        match name {
            "square" => Ok(Self::square(360.0)),
            "hexagon" => Ok(Self::hexagon(360.0)),
            "simple_maze" => Ok(Self::simple_maze()),
            other => Err(StynkerError::config(format!(
                "unknown arena '{other}' (expected square, hexagon or simple_maze)"
            ))),
        }
    }
}

/// One wall with its precomputed line.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub id: SegmentId,
    pub start: Vec2,
    pub end: Vec2,
    pub line: LineCoefficients,
    normal_length: f32,
}

impl Segment {
    fn new(id: SegmentId, start: Vec2, end: Vec2) -> Self {
        let line = general_form(start, end);
        Self {
            id,
            start,
            end,
            line,
            normal_length: line.normal_length(),
        }
    }

    /// Signed distance from the wall's line (non-zero normal by construction).
    #[inline]
    fn side(&self, p: Vec2) -> f32 {
        (self.line.a * p.x + self.line.b * p.y + self.line.c) / self.normal_length
    }

    pub fn distance(&self, p: Vec2) -> f32 {
        distance_to_segment(p, self.start, self.end)
    }

    fn same_wall(&self, a: Vec2, b: Vec2) -> bool {
        (self.start == a && self.end == b) || (self.start == b && self.end == a)
    }
}

/// Outcome of moving a body through the arena for one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub position: Vec2,
    pub velocity: Vec2,
    pub won: bool,
    pub lost: bool,
    /// Reflections performed.
    pub bounces: usize,
    /// First wall touched this tick.
    pub impacted: Option<SegmentId>,
    /// The reflection cap was hit; position is the last contact point.
    pub degenerate: bool,
    pub closest_input_node: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Arena {
    name: String,
    vertices: Vec<Vec2>,
    segments: Vec<Segment>,
    winning_segment: Option<SegmentId>,
    losing_segment: Option<SegmentId>,
}

impl Arena {
    pub fn new(def: &ArenaDefinition) -> Result<Self> {
        if def.vertices.iter().any(|v| !v.is_finite()) {
            return Err(StynkerError::config("arena vertices must be finite"));
        }
        let mut vertices = def.vertices.clone();
        if let (Some(first), Some(last)) = (vertices.first().copied(), vertices.last().copied()) {
            if first != last {
                vertices.push(first);
            }
        }

        let mut distinct: Vec<Vec2> = Vec::new();
        for v in &vertices {
            if !distinct.contains(v) {
                distinct.push(*v);
            }
        }
        if distinct.len() < 3 {
            return Err(StynkerError::config(format!(
                "arena '{}' needs at least 3 distinct vertices",
                def.name
            )));
        }

        // Polyline index -> deduplicated segment id (None for zero-length walls).
        let mut segments: Vec<Segment> = Vec::new();
        let mut polyline_to_segment: Vec<Option<SegmentId>> = Vec::new();
        for pair in vertices.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if a.distance(b) < EPSILON {
                polyline_to_segment.push(None);
                continue;
            }
            let id = match segments.iter().find(|s| s.same_wall(a, b)) {
                Some(existing) => existing.id,
                None => {
                    let id = segments.len();
                    segments.push(Segment::new(id, a, b));
                    id
                }
            };
            polyline_to_segment.push(Some(id));
        }

        let resolve = |which: &str, index: Option<usize>| -> Result<Option<SegmentId>> {
            let Some(index) = index else {
                return Ok(None);
            };
            match polyline_to_segment.get(index) {
                Some(Some(id)) => Ok(Some(*id)),
                Some(None) => Err(StynkerError::config(format!(
                    "{which} segment {index} of arena '{}' has zero length",
                    def.name
                ))),
                None => Err(StynkerError::config(format!(
                    "{which} segment {index} out of range for arena '{}' ({} segments)",
                    def.name,
                    polyline_to_segment.len()
                ))),
            }
        };
        let winning_segment = resolve("winning", def.winning_segment)?;
        let losing_segment = resolve("losing", def.losing_segment)?;
        if winning_segment.is_some() && winning_segment == losing_segment {
            return Err(StynkerError::config(
                "winning and losing segments must differ",
            ));
        }

        Ok(Self {
            name: def.name.clone(),
            vertices,
            segments,
            winning_segment,
            losing_segment,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Boundary ring; the last vertex repeats the first.
    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn segment(&self, id: SegmentId) -> Option<&Segment> {
        self.segments.get(id)
    }

    pub fn winning_segment(&self) -> Option<SegmentId> {
        self.winning_segment
    }

    pub fn losing_segment(&self) -> Option<SegmentId> {
        self.losing_segment
    }

    /// Closest wall to `point` and its distance; ties go to the lower id.
    pub fn nearest_segment(&self, point: Vec2) -> Option<(SegmentId, f32)> {
        self.segments
            .iter()
            .map(|s| (s.id, s.distance(point)))
            .fold(None, |best, (id, d)| match best {
                Some((_, bd)) if bd <= d => best,
                _ => Some((id, d)),
            })
    }

    /// Walls crossed first by the path `start → end`, with the contact point.
    ///
    /// Walls in `skip` and walls whose line already passes through `start`
    /// are ignored. Several walls come back when the path meets them at the
    /// same point (a vertex).
    fn first_crossings(
        &self,
        start: Vec2,
        end: Vec2,
        skip: &[SegmentId],
    ) -> Option<(Vec2, Vec<SegmentId>)> {
        let path = end - start;
        let path_len = path.length();
        if path_len < EPSILON {
            return None;
        }

        let mut best: Option<(f32, Vec2, Vec<SegmentId>)> = None;
        for seg in &self.segments {
            if skip.contains(&seg.id) {
                continue;
            }
            let s0 = seg.side(start);
            if s0.abs() <= CONTACT_TOLERANCE {
                continue;
            }
            let s1 = seg.side(end);
            let s1 = if s1.abs() <= CONTACT_TOLERANCE { 0.0 } else { s1 };
            if (s0 > 0.0 && s1 > 0.0) || (s0 < 0.0 && s1 < 0.0) {
                continue;
            }
            // The wall's endpoints must straddle (or touch) the path's line.
            let o1 = path.cross(seg.start - start) / path_len;
            let o2 = path.cross(seg.end - start) / path_len;
            if (o1 > CONTACT_TOLERANCE && o2 > CONTACT_TOLERANCE)
                || (o1 < -CONTACT_TOLERANCE && o2 < -CONTACT_TOLERANCE)
            {
                continue;
            }
            let contact = match geometry::intersection_point(start, end, seg.start, seg.end) {
                Ok(p) => p,
                Err(GeometryError::ParallelLines) => continue,
                Err(GeometryError::ZeroNormal) => continue,
            };
            let d = contact.distance(start);
            match &mut best {
                Some((bd, _, ids)) if (d - *bd).abs() <= CONTACT_TOLERANCE => ids.push(seg.id),
                Some((bd, _, _)) if d > *bd => {}
                _ => best = Some((d, contact, vec![seg.id])),
            }
        }
        best.map(|(_, contact, ids)| (contact, ids))
    }

    /// Moves a body from `start` along `velocity` for one tick, reflecting
    /// off walls until the remaining path is clear.
    ///
    /// Touching the winning or losing wall stops the body at the contact
    /// point with its pre-contact velocity. `sensors` (when given) picks the
    /// input node to excite: on contact, the inner ring placed around `start`
    /// is measured against the first impacted wall; without contact, a wall
    /// within the outer ring's reach is measured against every input placed
    /// around the final position.
    pub fn resolve_displacement(
        &self,
        start: Vec2,
        velocity: Vec2,
        sensors: Option<&InputRing>,
    ) -> Result<Resolution> {
        let mut from = start;
        let mut end = start + velocity;
        let mut vel = velocity;
        let mut skip: Vec<SegmentId> = Vec::new();

        let mut res = Resolution {
            position: end,
            velocity,
            won: false,
            lost: false,
            bounces: 0,
            impacted: None,
            degenerate: false,
            closest_input_node: None,
        };

        loop {
            let Some((contact, walls)) = self.first_crossings(from, end, &skip) else {
                res.position = end;
                break;
            };
            if res.impacted.is_none() {
                res.impacted = Some(walls[0]);
            }

            let hits = |terminal: Option<SegmentId>| terminal.is_some_and(|t| walls.contains(&t));
            if hits(self.winning_segment) || hits(self.losing_segment) {
                res.won = hits(self.winning_segment);
                res.lost = !res.won;
                res.position = contact;
                break;
            }

            if res.bounces >= MAX_REFLECTIONS {
                warn!(
                    arena = %self.name,
                    bounces = res.bounces,
                    x = from.x,
                    y = from.y,
                    "reflection cap reached; keeping last contact point"
                );
                res.degenerate = true;
                res.position = from;
                break;
            }

            for line in self.distinct_lines(&walls) {
                end = geometry::reflect_point_over_line(end, line.a, line.b, line.c)?;
                vel = geometry::reflect_velocity(vel, line.a, line.b)?;
            }
            trace!(walls = ?walls, x = contact.x, y = contact.y, "bounce");
            res.bounces += 1;
            from = contact;
            skip = walls;
        }
        res.velocity = vel;

        if let Some(ring) = sensors {
            res.closest_input_node = match res.impacted {
                Some(wall) => self.closest_input(start, wall, ring.inner()),
                None => self.nearest_segment(res.position).and_then(|(wall, d)| {
                    if d <= ring.outer_radius() {
                        self.closest_input(res.position, wall, ring.all())
                    } else {
                        None
                    }
                }),
            };
        }
        Ok(res)
    }

    /// Lines of `walls` with collinear walls folded together, so a wall split
    /// by a midpoint vertex reflects once.
    fn distinct_lines(&self, walls: &[SegmentId]) -> Vec<LineCoefficients> {
        let mut lines: Vec<(LineCoefficients, f32)> = Vec::with_capacity(walls.len());
        for &id in walls {
            let seg = &self.segments[id];
            let (line, len) = (seg.line, seg.normal_length);
            // Tied walls share the contact point, so parallel normals mean one line.
            let parallel = lines.iter().any(|(other, other_len)| {
                let cross = line.a * other.b - line.b * other.a;
                cross.abs() <= CONTACT_TOLERANCE * len * other_len
            });
            if !parallel {
                lines.push((line, len));
            }
        }
        lines.into_iter().map(|(line, _)| line).collect()
    }

    /// Input whose ring position (placed around `center`) is nearest `wall`.
    fn closest_input(
        &self,
        center: Vec2,
        wall: SegmentId,
        candidates: impl Iterator<Item = (NodeId, Vec2)>,
    ) -> Option<NodeId> {
        let seg = self.segment(wall)?;
        candidates
            .map(|(id, offset)| (id, seg.distance(center + offset)))
            .fold(None, |best: Option<(NodeId, f32)>, (id, d)| match best {
                Some((_, bd)) if bd <= d => best,
                _ => Some((id, d)),
            })
            .map(|(id, _)| id)
    }
}
