//! Polygon clipping for clipping attachments.
//!
//! The clip polygon is triangulated once when the clip starts; every later
//! triangle is clipped against each of those convex pieces (Sutherland-Hodgman)
//! and the surviving polygons are fanned back into triangles. Texture
//! coordinates are re-derived from the source triangle's barycentrics.

type Point = [f32; 2];

#[inline]
fn cross(o: Point, a: Point, b: Point) -> f32 {
    (a[0] - o[0]) * (b[1] - o[1]) - (a[1] - o[1]) * (b[0] - o[0])
}

/// Twice the signed area; positive for counter-clockwise polygons.
pub fn signed_area2(polygon: &[Point]) -> f32 {
    let n = polygon.len();
    (0..n)
        .map(|i| {
            let [x0, y0] = polygon[i];
            let [x1, y1] = polygon[(i + 1) % n];
            x0 * y1 - x1 * y0
        })
        .sum()
}

fn inside_triangle(p: Point, a: Point, b: Point, c: Point) -> bool {
    cross(a, b, p) >= 0.0 && cross(b, c, p) >= 0.0 && cross(c, a, p) >= 0.0
}

/// Ear-clip a simple polygon into counter-clockwise triangles. Degenerate or
/// self-intersecting input falls back to a fan over whatever is left.
pub fn triangulate(polygon: &[Point]) -> Vec<[Point; 3]> {
    let mut pts: Vec<Point> = polygon.to_vec();
    if signed_area2(&pts) < 0.0 {
        pts.reverse();
    }
    let mut ring: Vec<usize> = (0..pts.len()).collect();
    let mut out = Vec::with_capacity(pts.len().saturating_sub(2));
    while ring.len() > 3 {
        let m = ring.len();
        let ear = (0..m).find(|&i| {
            let (p, c, n) = (ring[(i + m - 1) % m], ring[i], ring[(i + 1) % m]);
            let (a, b, d) = (pts[p], pts[c], pts[n]);
            cross(a, b, d) > 0.0
                && !ring
                    .iter()
                    .filter(|&&j| j != p && j != c && j != n)
                    .any(|&j| pts[j] != a && pts[j] != b && pts[j] != d && inside_triangle(pts[j], a, b, d))
        });
        let Some(i) = ear else {
            break;
        };
        let (p, c, n) = (ring[(i + m - 1) % m], ring[i], ring[(i + 1) % m]);
        out.push([pts[p], pts[c], pts[n]]);
        ring.remove(i);
    }
    for k in 1..ring.len().saturating_sub(1) {
        let tri = [pts[ring[0]], pts[ring[k]], pts[ring[k + 1]]];
        if cross(tri[0], tri[1], tri[2]) > 0.0 {
            out.push(tri);
        }
    }
    out
}

/// Clip `subject` against the convex counter-clockwise polygon `clip`,
/// writing the intersection into `out`. `tmp` is scratch space.
pub fn clip_convex(subject: &[Point], clip: &[Point], out: &mut Vec<Point>, tmp: &mut Vec<Point>) {
    out.clear();
    out.extend_from_slice(subject);
    let n = clip.len();
    for e in 0..n {
        if out.is_empty() {
            return;
        }
        let (e0, e1) = (clip[e], clip[(e + 1) % n]);
        std::mem::swap(out, tmp);
        out.clear();
        let len = tmp.len();
        for i in 0..len {
            let prev = tmp[(i + len - 1) % len];
            let cur = tmp[i];
            let (sp, sc) = (cross(e0, e1, prev), cross(e0, e1, cur));
            if sc >= 0.0 {
                if sp < 0.0 {
                    out.push(intersect(prev, cur, sp, sc));
                }
                out.push(cur);
            } else if sp >= 0.0 {
                out.push(intersect(prev, cur, sp, sc));
            }
        }
    }
}

#[inline]
fn intersect(p: Point, q: Point, sp: f32, sq: f32) -> Point {
    let t = sp / (sp - sq);
    [p[0] + (q[0] - p[0]) * t, p[1] + (q[1] - p[1]) * t]
}

/// Texture coordinate at `p` inside triangle `pos` with corner coordinates `uv`.
pub fn interpolate_uv(p: Point, pos: &[Point; 3], uv: &[Point; 3]) -> Point {
    let [a, b, c] = *pos;
    let det = (b[1] - c[1]) * (a[0] - c[0]) + (c[0] - b[0]) * (a[1] - c[1]);
    if det.abs() <= f32::EPSILON {
        return uv[0];
    }
    let w0 = ((b[1] - c[1]) * (p[0] - c[0]) + (c[0] - b[0]) * (p[1] - c[1])) / det;
    let w1 = ((c[1] - a[1]) * (p[0] - c[0]) + (a[0] - c[0]) * (p[1] - c[1])) / det;
    let w2 = 1.0 - w0 - w1;
    [
        uv[0][0] * w0 + uv[1][0] * w1 + uv[2][0] * w2,
        uv[0][1] * w0 + uv[1][1] * w1 + uv[2][1] * w2,
    ]
}

/// Clip region active between a clipping attachment and its end slot.
#[derive(Debug, Default)]
pub struct ClipRegion {
    pieces: Vec<[Point; 3]>,
    end: Option<usize>,
    active: bool,
    polygon: Vec<Point>,
    tmp: Vec<Point>,
}

impl ClipRegion {
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Start clipping with a world-space polygon. Ignored while another clip is active.
    pub fn begin(&mut self, polygon: &[Point], end: Option<usize>) {
        if self.active {
            return;
        }
        self.pieces = triangulate(polygon);
        self.end = end;
        self.active = true;
    }

    /// Stop clipping if `slot` is the end slot.
    pub fn end_after(&mut self, slot: usize) {
        if self.active && self.end == Some(slot) {
            self.clear();
        }
    }

    pub fn clear(&mut self) {
        self.active = false;
        self.end = None;
        self.pieces.clear();
    }

    /// Clip one triangle and hand every output corner (position, uv) to `emit`,
    /// three per output triangle.
    pub fn clip_triangle(&mut self, pos: [Point; 3], uv: [Point; 3], mut emit: impl FnMut(Point, Point)) {
        for piece in &self.pieces {
            clip_convex(&pos, piece, &mut self.polygon, &mut self.tmp);
            let poly = &self.polygon;
            for k in 1..poly.len().saturating_sub(1) {
                for p in [poly[0], poly[k], poly[k + 1]] {
                    emit(p, interpolate_uv(p, &pos, &uv));
                }
            }
        }
    }
}
