use geo::{LineString, Simplify};

/// Length of a polyline, including the closing segment when `closed`.
pub fn arc_length(points: &[(f64, f64)], closed: bool) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    let open: f64 = points
        .windows(2)
        .map(|w| distance(w[0], w[1]))
        .sum();

    if closed {
        open + distance(points[points.len() - 1], points[0])
    } else {
        open
    }
}

pub fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    (b.0 - a.0).hypot(b.1 - a.1)
}

/// Douglas-Peucker simplification of a closed ring.
///
/// The ring is closed onto its first point before simplifying so the
/// closing segment is approximated like any other; the repeated point is
/// dropped again from the result.
pub fn simplify_ring(ring: &[(f64, f64)], epsilon: f64) -> Vec<(f64, f64)> {
    if ring.len() < 3 || !(epsilon > 0.0) {
        return ring.to_vec();
    }

    let line: LineString<f64> = ring
        .iter()
        .chain(std::iter::once(&ring[0]))
        .map(|&(x, y)| geo::coord! { x: x, y: y })
        .collect();

    let simplified = line.simplify(&epsilon);

    let mut points: Vec<(f64, f64)> = simplified.0.into_iter().map(|c| (c.x, c.y)).collect();
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    points
}

/// Drop vertices that sit on the straight segment between their neighbours,
/// treating the ring as cyclic.
pub fn compress_collinear(ring: &[(i32, i32)]) -> Vec<(i32, i32)> {
    let n = ring.len();
    if n < 3 {
        return ring.to_vec();
    }

    (0..n)
        .filter(|&i| {
            let prev = ring[(i + n - 1) % n];
            let cur = ring[i];
            let next = ring[(i + 1) % n];
            let incoming = (cur.0 - prev.0, cur.1 - prev.1);
            let outgoing = (next.0 - cur.0, next.1 - cur.1);
            let cross = incoming.0 as i64 * outgoing.1 as i64 - incoming.1 as i64 * outgoing.0 as i64;
            let dot = incoming.0 as i64 * outgoing.0 as i64 + incoming.1 as i64 * outgoing.1 as i64;
            // keep corners and reversals; drop straight continuations
            cross != 0 || dot <= 0
        })
        .map(|i| ring[i])
        .collect()
}
