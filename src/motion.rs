//! Player movement simulation.
//!
//! A bounded random walk across a fictional 2000×2000 field with gently
//! rolling terrain. Each tunnel session owns one [`Walker`]; its coordinates
//! decorate the Player Position packet and the chunk coordinates of every
//! disguise packet, so the "player" appears to wander the world while the
//! tunnel runs.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use crate::crypto::SecureRandom;

/// Side length of the walkable field.
const FIELD_SIZE: f64 = 2000.0;
/// Ground level.
const MIN_Y: f64 = 85.0;
/// Hill tops.
const MAX_Y: f64 = 110.0;

/// A wandering fake player.
#[derive(Debug, Clone)]
pub struct Walker {
    x: f64,
    y: f64,
    z: f64,
    angle: f64,
    speed: f64,
}

impl Walker {
    /// Spawn at a random spot on the field, facing a random direction.
    pub fn new() -> Self {
        Self {
            x: SecureRandom::f64() * FIELD_SIZE,
            y: 95.0,
            z: SecureRandom::f64() * FIELD_SIZE,
            angle: SecureRandom::f64() * TAU,
            speed: SecureRandom::range_f64(2.0, 5.0),
        }
    }

    /// Advance one step of the random walk.
    pub fn update(&mut self) {
        // Small steering jitter every step.
        self.angle += SecureRandom::range_f64(-0.15, 0.15);

        // Occasional sharp turn.
        if SecureRandom::f64() < 0.05 {
            self.angle += SecureRandom::range_f64(-FRAC_PI_2, FRAC_PI_2);
        }

        // Occasional change of pace (running/walking).
        if SecureRandom::f64() < 0.10 {
            self.speed = SecureRandom::range_f64(2.0, 5.0);
        }

        self.x += self.angle.cos() * self.speed;
        self.z += self.angle.sin() * self.speed;

        // Bounce off the field edges.
        if self.x < 0.0 {
            self.x = 0.0;
            self.angle = PI - self.angle;
        } else if self.x > FIELD_SIZE {
            self.x = FIELD_SIZE;
            self.angle = PI - self.angle;
        }

        if self.z < 0.0 {
            self.z = 0.0;
            self.angle = -self.angle;
        } else if self.z > FIELD_SIZE {
            self.z = FIELD_SIZE;
            self.angle = -self.angle;
        }

        // Glide toward the terrain height under the new position.
        let target = terrain_height(self.x, self.z);
        self.y += 0.2 * (target - self.y);
        self.y = self.y.clamp(MIN_Y, MAX_Y);
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn z(&self) -> f64 {
        self.z
    }

    /// Heading in degrees, as the Player Position packet expects.
    pub fn yaw_degrees(&self) -> f32 {
        (self.angle * 180.0 / PI) as f32
    }

    /// Chunk coordinates of the current position.
    pub fn chunk(&self) -> (i32, i32) {
        ((self.x as i32) >> 4, (self.z as i32) >> 4)
    }
}

impl Default for Walker {
    fn default() -> Self {
        Self::new()
    }
}

/// Gentle hills from layered sine waves, centered between the Y bounds.
fn terrain_height(x: f64, z: f64) -> f64 {
    let mut height = MIN_Y + (MAX_Y - MIN_Y) / 2.0;
    height += (x / 100.0).sin() * 5.0 + (z / 100.0).cos() * 5.0;
    height += (x / 200.0).sin() * 3.0 + (z / 200.0).cos() * 3.0;
    height += ((x + z) / 50.0).sin() * 2.0;
    height
}
