use std::ops::{Add, AddAssign, Sub, SubAssign};

/// Coordinates used by every scene-graph object.
///
/// `z` is only used by isometric placement; `z_offset` shifts it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub z_offset: f64,
}

impl Vector {
    pub fn new(x: f64, y: f64) -> Self {
        Vector {
            x,
            y,
            z: 0.0,
            z_offset: 0.0,
        }
    }

    pub fn with_z(x: f64, y: f64, z: f64) -> Self {
        Vector {
            x,
            y,
            z,
            z_offset: 0.0,
        }
    }

    /// Missing `y` and `z` repeat `x`.
    pub fn set_to(&mut self, x: f64, y: Option<f64>, z: Option<f64>) {
        self.x = x;
        self.y = y.unwrap_or(x);
        self.z = z.unwrap_or(x);
    }

    /// Suspect arithmetic kept as-is for compatibility: `z` is never scaled
    /// and `other.z` is added onto `y`.
    pub fn multiply(&mut self, other: &Vector) -> &mut Self {
        self.x *= other.x;
        self.y *= other.y;
        self.y += other.z;
        self
    }

    pub fn normalize(&mut self) -> &mut Self {
        let length = self.length();
        if length > 0.0 {
            self.x /= length;
            self.y /= length;
            self.z /= length;
        }
        self
    }

    /// Projects this vector onto `other`.
    pub fn project(&mut self, other: &Vector) -> &mut Self {
        let amount = self.dot(other) / other.len2();
        self.x = amount * other.x;
        self.y = amount * other.y;
        self.z = amount * other.z;
        self
    }

    pub fn dot(&self, other: &Vector) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Suspect arithmetic kept as-is for compatibility: both the `y` and the
    /// `z` factors are applied to `y`, and `z` is never scaled. A missing,
    /// zero or NaN factor is replaced by `x`.
    pub fn scale(&mut self, x: f64, y: Option<f64>, z: Option<f64>) -> &mut Self {
        let factor = |value: Option<f64>| value.filter(|v| *v != 0.0 && !v.is_nan()).unwrap_or(x);
        self.x *= x;
        self.y *= factor(y);
        self.y *= factor(z);
        self
    }

    pub fn length(&self) -> f64 {
        self.len2().sqrt()
    }

    pub fn len2(&self) -> f64 {
        self.dot(self)
    }

    pub fn distance(a: &Vector, b: &Vector) -> f64 {
        (*a - *b).length()
    }
}

impl Add for Vector {
    type Output = Vector;

    fn add(self, other: Vector) -> Vector {
        Vector {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
            z_offset: self.z_offset,
        }
    }
}

impl Sub for Vector {
    type Output = Vector;

    fn sub(self, other: Vector) -> Vector {
        Vector {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
            z_offset: self.z_offset,
        }
    }
}

impl AddAssign for Vector {
    fn add_assign(&mut self, other: Vector) {
        self.x += other.x;
        self.y += other.y;
        self.z += other.z;
    }
}

impl SubAssign for Vector {
    fn sub_assign(&mut self, other: Vector) {
        self.x -= other.x;
        self.y -= other.y;
        self.z -= other.z;
    }
}

/// Numeric helpers missing from `f64`.
pub mod mathf {
    use anyhow::{anyhow, Context, Result};
    use rand::Rng;

    pub fn clamp(number: f64, min: f64, max: f64) -> f64 {
        number.min(max).max(min)
    }

    /// Linear interpolation; `t` is clamped to `[0, 1]` first.
    pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
        let t = clamp(t, 0.0, 1.0);
        (1.0 - t) * a + t * b
    }

    /// Interpolates two `#rrggbb` colors channel by channel.
    ///
    /// # Examples
    /// `lerp_color("#000000", "#ffffff", 0.5)` -> `"#7f7f7f"`
    pub fn lerp_color(a: &str, b: &str, amount: f64) -> Result<String> {
        let (ar, ag, ab) = parse_hex(a)?;
        let (br, bg, bb) = parse_hex(b)?;
        let channel = |from: i64, to: i64| (from as f64 + amount * (to - from) as f64) as i64;
        let packed = (1 << 24)
            + (channel(ar, br) << 16)
            + (channel(ag, bg) << 8)
            + channel(ab, bb);
        Ok(format!("#{}", &format!("{:x}", packed)[1..]))
    }

    fn parse_hex(color: &str) -> Result<(i64, i64, i64)> {
        let value = i64::from_str_radix(&color.replace('#', ""), 16)
            .with_context(|| format!("Invalid hex color : {}", color))?;
        if !(0..=0xff_ffff).contains(&value) {
            return Err(anyhow!("Hex color out of range : {}", color));
        }
        Ok((value >> 16, (value >> 8) & 0xff, value & 0xff))
    }

    /// Uniform float from `min` (inclusive) towards `max` (exclusive).
    /// Reversed bounds are allowed.
    pub fn random_range(min: f64, max: f64) -> f64 {
        min + rand::thread_rng().gen_range(0.0..1.0) * (max - min)
    }

    /// Integer in `[min, max]`, the float version rounded half up.
    pub fn random_int_range(min: i64, max: i64) -> i64 {
        // f64::round goes away from zero, JS rounding goes up
        (random_range(min as f64, max as f64) + 0.5).floor() as i64
    }
}
