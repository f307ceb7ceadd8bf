//! Planar geometry for cut jobs: points, line segments, pieces and bounding
//! boxes, plus the path chainer that groups segments into pieces.
//!
//! All coordinates are millimetres in drawing space.

use serde::{Deserialize, Serialize};

/// Distance below which two segments count as overlapping in [`lines_overlap`].
pub const OVERLAP_TOLERANCE: f64 = 0.35;

/// A point in drawing space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance_to(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// A straight segment from `a` to `b`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Line {
    pub a: Point,
    pub b: Point,
}

impl Line {
    pub const fn new(a: Point, b: Point) -> Self {
        Self { a, b }
    }

    pub fn length(&self) -> f64 {
        self.a.distance_to(self.b)
    }

    /// The segment shifted by `(dx, dy)`.
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self {
            a: Point::new(self.a.x + dx, self.a.y + dy),
            b: Point::new(self.b.x + dx, self.b.y + dy),
        }
    }
}

/// A chain of segments where each segment starts where the previous one ends.
///
/// The chain is not re-checked here; [`chain_pieces`] is what guarantees the
/// continuity invariant.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Piece {
    lines: Vec<Line>,
}

impl Piece {
    /// Wraps `lines` as a piece without checking continuity.
    pub fn from_lines(lines: Vec<Line>) -> Self {
        Self { lines }
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// The path as points: the first segment's start, then every segment end.
    pub fn points(&self) -> impl Iterator<Item = Point> + '_ {
        self.lines
            .first()
            .map(|l| l.a)
            .into_iter()
            .chain(self.lines.iter().map(|l| l.b))
    }

    /// The piece shifted by `(dx, dy)`.
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self {
            lines: self.lines.iter().map(|l| l.translated(dx, dy)).collect(),
        }
    }

    /// Total path length.
    pub fn length(&self) -> f64 {
        self.lines.iter().map(Line::length).sum()
    }
}

/// Groups segments into pieces by exact endpoint continuity.
///
/// A new piece starts whenever a segment's start point differs from the
/// previous segment's end point.  Equality is exact; no tolerance is applied.
/// Segment order is preserved and an empty input yields no pieces.
///
/// # Examples
///
/// ```rust
/// use laser_core::domain::geometry::{chain_pieces, Line, Point};
///
/// let p = Point::new;
/// let pieces = chain_pieces(vec![
///     Line::new(p(0.0, 0.0), p(1.0, 1.0)),
///     Line::new(p(1.0, 1.0), p(2.0, 2.0)),
///     Line::new(p(5.0, 5.0), p(6.0, 6.0)),
/// ]);
/// assert_eq!(pieces.len(), 2);
/// assert_eq!(pieces[0].len(), 2);
/// ```
pub fn chain_pieces(lines: impl IntoIterator<Item = Line>) -> Vec<Piece> {
    let mut pieces: Vec<Piece> = Vec::new();
    for line in lines {
        match pieces.last_mut() {
            Some(current) if current.lines.last().is_some_and(|prev| prev.b == line.a) => {
                current.lines.push(line);
            }
            _ => pieces.push(Piece { lines: vec![line] }),
        }
    }
    pieces
}

// ── Bounding box ──────────────────────────────────────────────────────────────

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point,
    pub max: Point,
}

impl BoundingBox {
    /// Smallest box containing every point, or `None` for no points.
    pub fn of_points(points: impl IntoIterator<Item = Point>) -> Option<Self> {
        points.into_iter().fold(None, |acc, p| {
            Some(match acc {
                None => BoundingBox { min: p, max: p },
                Some(b) => BoundingBox {
                    min: Point::new(b.min.x.min(p.x), b.min.y.min(p.y)),
                    max: Point::new(b.max.x.max(p.x), b.max.y.max(p.y)),
                },
            })
        })
    }

    /// Box around every segment endpoint of every piece.
    pub fn of_pieces<'a>(pieces: impl IntoIterator<Item = &'a Piece>) -> Option<Self> {
        Self::of_points(
            pieces
                .into_iter()
                .flat_map(|piece| piece.lines.iter().flat_map(|l| [l.a, l.b])),
        )
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }
}

// ── Overlap utility ───────────────────────────────────────────────────────────
//
// Not used by the compiler.  Kept for detecting duplicated cut lines.

/// Shortest distance from `p` to the segment `line`.
///
/// A zero-length segment measures the distance to its end point.
pub fn point_to_segment_distance(line: &Line, p: Point) -> f64 {
    let dx = line.b.x - line.a.x;
    let dy = line.b.y - line.a.y;
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        return p.distance_to(line.b);
    }
    let t = (((p.x - line.a.x) * dx + (p.y - line.a.y) * dy) / len2).clamp(0.0, 1.0);
    p.distance_to(Point::new(line.a.x + t * dx, line.a.y + t * dy))
}

/// Whether `i` and `j` lie on top of each other within `tolerance`.
///
/// True when one segment lies entirely within `tolerance` of the other, or
/// when an endpoint of each lies near the other segment and those two
/// endpoints are further apart than 70 % of the shorter segment (a partial
/// overlap of significant length).
pub fn lines_overlap(i: &Line, j: &Line, tolerance: f64) -> bool {
    let near = |line: &Line, p: Point| point_to_segment_distance(line, p) < tolerance;

    if near(i, j.a) && near(i, j.b) {
        return true;
    }
    if near(j, i.a) && near(j, i.b) {
        return true;
    }

    let min_len = i.length().min(j.length());
    [(i.a, j.a), (i.b, j.b), (i.a, j.b), (i.b, j.a)]
        .into_iter()
        .any(|(a, b)| near(i, b) && near(j, a) && a.distance_to(b) > min_len * 0.7)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
