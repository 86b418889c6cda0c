//! Pure disc/box geometry used by the collision predictor.
//!
//! All functions are total: NaN never escapes, "no event" is
//! [`f64::INFINITY`].

use glam::DVec2;

/// Two discs significantly overlap below this fraction of their summed radii.
pub const SIGNIFICANT_OVERLAP: f64 = 0.99;
/// Upper edge of the apparent-collision band.
pub const APPARENT_COLLISION: f64 = 1.01;

/// Time until two discs moving at constant velocity first touch.
///
/// Solves `|dp + t * dv| = ra + rb` for the smallest root. Returns infinity
/// when the discs are receding or miss each other. Already-overlapping
/// discs yield a negative time; the event loop clamps it to zero.
pub fn time_to_collision(
    pa: DVec2,
    va: DVec2,
    ra: f64,
    pb: DVec2,
    vb: DVec2,
    rb: f64,
) -> f64 {
    let dp = pb - pa;
    let dv = vb - va;
    let dvdp = dv.dot(dp);
    if dvdp >= 0.0 {
        return f64::INFINITY;
    }
    let dvdv = dv.dot(dv);
    let sigma = ra + rb;
    let d = dvdp * dvdp - dvdv * (dp.dot(dp) - sigma * sigma);
    if d <= 0.0 {
        return f64::INFINITY;
    }
    let t = -(dvdp + d.sqrt()) / dvdv;
    if t.is_nan() {
        f64::INFINITY
    } else {
        t
    }
}

/// Point where two discs touch at their moment of collision: on the line
/// between the projected centres, one radius away from the first disc.
pub fn collision_point(
    pa: DVec2,
    va: DVec2,
    ra: f64,
    pb: DVec2,
    vb: DVec2,
    rb: f64,
) -> Option<DVec2> {
    let t = time_to_collision(pa, va, ra, pb, vb, rb);
    if !t.is_finite() {
        return None;
    }
    let ca = pa + va * t;
    let cb = pb + vb * t;
    Some(ca + (cb - ca) * (ra / (ra + rb)))
}

/// Contact point between two discs already advanced to their collision
/// positions.
pub fn contact_point(pa: DVec2, ra: f64, pb: DVec2, rb: f64) -> DVec2 {
    pa + (pb - pa) * (ra / (ra + rb))
}

/// Time until a disc inside an axis-aligned `[0, width] x [0, height]` box
/// touches a wall. A disc whose centre lies outside the box never produces
/// a boundary event.
pub fn time_to_boundary(p: DVec2, v: DVec2, r: f64, width: f64, height: f64) -> f64 {
    if p.x < 0.0 || p.x > width || p.y < 0.0 || p.y > height {
        return f64::INFINITY;
    }
    let tx = if v.x > 0.0 {
        (width - r - p.x) / v.x
    } else if v.x < 0.0 {
        (r - p.x) / v.x
    } else {
        f64::INFINITY
    };
    let ty = if v.y > 0.0 {
        (height - r - p.y) / v.y
    } else if v.y < 0.0 {
        (r - p.y) / v.y
    } else {
        f64::INFINITY
    };
    let t = tx.min(ty);
    if t.is_nan() {
        f64::INFINITY
    } else {
        t
    }
}

/// Which wall(s) a disc at `p` is nearest to. Corner contacts report both.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WallContact {
    pub vertical: bool,
    pub horizontal: bool,
}

/// Classify the nearest wall(s) for a disc touching the boundary.
pub fn nearest_wall(p: DVec2, r: f64, width: f64, height: f64) -> WallContact {
    let dx = (p.x - r).min(width - p.x - r);
    let dy = (p.y - r).min(height - p.y - r);
    WallContact {
        vertical: dx <= dy,
        horizontal: dy <= dx,
    }
}

/// Contact point of a disc with the wall it is nearest to. Corner contacts
/// report the corner itself.
pub fn boundary_contact(p: DVec2, r: f64, width: f64, height: f64) -> DVec2 {
    let wall = nearest_wall(p, r, width, height);
    let x = if wall.vertical {
        if p.x - r < width - p.x - r {
            p.x - r
        } else {
            p.x + r
        }
    } else {
        p.x
    };
    let y = if wall.horizontal {
        if p.y - r < height - p.y - r {
            p.y - r
        } else {
            p.y + r
        }
    } else {
        p.y
    };
    DVec2::new(x, y)
}
