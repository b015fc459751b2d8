//! Closest-approach geometry between an extrapolated track line and a CRT hit.
//!
//! The hit can be taken as a point ([`simple_dca`]) or as the rectangle spanned
//! by its position uncertainties ([`dist_to_crt_hit`]).
use super::constants::SMALL_NUMBER;
use super::crt_hit::CrtHit;
use super::vector::Vector3;

/// Distance between the infinite line through `start` along `direction` and the hit centre.
///
/// A zero direction degenerates to the distance from `start` to the hit.
pub fn simple_dca(hit: &CrtHit, start: &Vector3, direction: &Vector3) -> f64 {
    let pos = hit.position;
    let denominator = direction.norm();
    if denominator == 0.0 {
        return (pos - *start).norm();
    }
    let end = *start + *direction;
    let numerator = (pos - *start).cross(&(pos - end)).norm();
    numerator / denominator
}

/// Distance between the infinite line through `start` and `end` and the hit
/// rectangle. Zero when the line passes through the uncertainty box.
pub fn dist_to_crt_hit(hit: &CrtHit, start: &Vector3, end: &Vector3) -> f64 {
    let pos = hit.position;
    let err = hit.position_err;

    let min = pos - err;
    let max = pos + err;
    if cube_intersection(&min, &max, start, end).is_some() {
        return 0.0;
    }

    // The smallest uncertainty is the fixed coordinate of the tagger plane;
    // x unless y or z is strictly smaller than both others
    let (vertex1, vertex2, vertex3, vertex4) = if err.z < err.x && err.z < err.y {
        (
            Vector3::new(pos.x - err.x, pos.y - err.y, pos.z),
            Vector3::new(pos.x + err.x, pos.y - err.y, pos.z),
            Vector3::new(pos.x - err.x, pos.y + err.y, pos.z),
            Vector3::new(pos.x + err.x, pos.y + err.y, pos.z),
        )
    } else if err.y < err.x && err.y < err.z {
        (
            Vector3::new(pos.x - err.x, pos.y, pos.z - err.z),
            Vector3::new(pos.x + err.x, pos.y, pos.z - err.z),
            Vector3::new(pos.x - err.x, pos.y, pos.z + err.z),
            Vector3::new(pos.x + err.x, pos.y, pos.z + err.z),
        )
    } else {
        (
            Vector3::new(pos.x, pos.y - err.y, pos.z - err.z),
            Vector3::new(pos.x, pos.y + err.y, pos.z - err.z),
            Vector3::new(pos.x, pos.y - err.y, pos.z + err.z),
            Vector3::new(pos.x, pos.y + err.y, pos.z + err.z),
        )
    };

    let dist1 = line_segment_distance(&vertex1, &vertex2, start, end);
    let dist2 = line_segment_distance(&vertex1, &vertex3, start, end);
    let dist3 = line_segment_distance(&vertex4, &vertex2, start, end);
    let dist4 = line_segment_distance(&vertex4, &vertex3, start, end);

    dist1.min(dist2).min(dist3.min(dist4))
}

/// Distance between the segment (`start1`, `end1`) and the infinite line through
/// `start2` and `end2`.
///
/// See <http://geomalgorithms.com/a07-_distance.html>. Nearly parallel
/// directions fall back to the `s = 0` end of the segment.
pub fn line_segment_distance(start1: &Vector3, end1: &Vector3, start2: &Vector3, end2: &Vector3) -> f64 {
    let u = *end1 - *start1;
    let v = *end2 - *start2;
    let w = *start1 - *start2;

    let a = u.dot(&u);
    let b = u.dot(&v);
    let c = v.dot(&v);
    let d = u.dot(&w);
    let e = v.dot(&w);
    let denom = a * c - b * b;

    // (numerator, denominator) of the segment and line parameters
    let (s_n, s_d, t_n, t_d) = if denom < SMALL_NUMBER {
        (0.0, 1.0, e, c)
    } else {
        let s_n = b * e - c * d;
        let t_n = a * e - b * d;
        if s_n < 0.0 {
            // s = 0 end of the segment is closest
            (0.0, denom, e, c)
        } else if s_n > denom {
            // s = 1 end
            (denom, denom, e + b, c)
        } else {
            (s_n, denom, t_n, denom)
        }
    };

    let sc = if s_n.abs() < SMALL_NUMBER { 0.0 } else { s_n / s_d };
    let tc = if t_n.abs() < SMALL_NUMBER { 0.0 } else { t_n / t_d };

    let dp = w + u * sc - v * tc;
    dp.norm()
}

/// Entry and exit points of the infinite line through `start` and `end` with the
/// axis-aligned box `[min, max]` (slab method). None when they do not intersect.
pub fn cube_intersection(
    min: &Vector3,
    max: &Vector3,
    start: &Vector3,
    end: &Vector3,
) -> Option<(Vector3, Vector3)> {
    let dir = *end - *start;
    let inv_dir = Vector3::new(1.0 / dir.x, 1.0 / dir.y, 1.0 / dir.z);

    let slab = |inv: f64, low: f64, high: f64, origin: f64| -> (f64, f64) {
        if inv >= 0.0 {
            ((low - origin) * inv, (high - origin) * inv)
        } else {
            ((high - origin) * inv, (low - origin) * inv)
        }
    };

    let (mut tmin, mut tmax) = slab(inv_dir.x, min.x, max.x, start.x);
    let (tymin, tymax) = slab(inv_dir.y, min.y, max.y, start.y);

    if tmin > tymax || tymin > tmax {
        return None;
    }
    if tymin > tmin {
        tmin = tymin;
    }
    if tymax < tmax {
        tmax = tymax;
    }

    let (tzmin, tzmax) = slab(inv_dir.z, min.z, max.z, start.z);
    if tmin > tzmax || tzmin > tmax {
        return None;
    }
    if tzmin > tmin {
        tmin = tzmin;
    }
    if tzmax < tmax {
        tmax = tzmax;
    }

    let enter = *start + dir * tmin;
    let exit = *start + dir * tmax;
    Some((enter, exit))
}
