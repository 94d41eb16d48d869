use crate::constants::EPSILON;
use crate::geometry::{distance, Point};

pub const NO_SOLUTION: Point = Point::ORIGIN;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShotSpec {
    pub shooter: Point,
    pub target: Point,
    pub target_dest: Point,
    pub target_speed: f64,
    pub projectile_speed: f64,
}

impl ShotSpec {
    fn target_velocity(&self) -> Point {
        let heading = self.target_dest - self.target;
        let length = heading.magnitude();
        if length <= EPSILON {
            return Point::ORIGIN;
        }
        heading.scale(self.target_speed / length)
    }
}

// (|v|^2 - s^2) t^2 + 2 (v . r) t + |r|^2 = 0, earliest t >= 0.
pub fn solve_time(spec: &ShotSpec) -> Option<f64> {
    let v = spec.target_velocity();
    let r = spec.target - spec.shooter;

    let a = v.dot(v) - spec.projectile_speed * spec.projectile_speed;
    let b = 2.0 * v.dot(r);
    let c = r.dot(r);

    if a.abs() <= EPSILON {
        if b.abs() > EPSILON {
            let t = -c / b;
            return (t >= 0.0 && t.is_finite()).then_some(t);
        }
        return (c.abs() <= EPSILON).then_some(0.0);
    }

    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return None;
    }
    let sqrt_disc = disc.sqrt();
    let t1 = (-b - sqrt_disc) / (2.0 * a);
    let t2 = (-b + sqrt_disc) / (2.0 * a);
    let (low, high) = if t1 <= t2 { (t1, t2) } else { (t2, t1) };
    if low >= 0.0 {
        Some(low)
    } else if high >= 0.0 {
        Some(high)
    } else {
        None
    }
}

pub fn solve(spec: &ShotSpec, hitbox: f64) -> Point {
    if distance(spec.target, spec.target_dest) <= EPSILON {
        return spec.target_dest;
    }
    let Some(t) = solve_time(spec) else {
        return NO_SOLUTION;
    };
    let half = hitbox * 0.5;
    spec.target + spec.target_velocity().scale(t) + Point::new(half, half)
}
