use glam::DVec2;
use std::f64::consts::{PI, TAU};

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, RejectedEntity};
use crate::math;
use crate::program::Program;
use crate::world::EntityId;

/// Speed cap for every entity kind.
pub const MAX_SPEED: f64 = 300_000.0;

pub const SHIP_MIN_RADIUS: f64 = 10.0;
pub const BULLET_MIN_RADIUS: f64 = 1.0;
pub const ASTEROID_MIN_RADIUS: f64 = 5.0;
pub const PLANETOID_MIN_RADIUS: f64 = 5.0;

pub const SHIP_MIN_DENSITY: f64 = 1.42e12;
pub const BULLET_DENSITY: f64 = 7.8e12;
pub const ASTEROID_DENSITY: f64 = 2.65e12;
pub const PLANETOID_DENSITY: f64 = 0.917e12;

pub const DEFAULT_THRUST_FORCE: f64 = 1.1e18;
/// Speed a bullet leaves the magazine with.
pub const MUZZLE_SPEED: f64 = 250.0;
/// A bullet is destroyed on its third boundary hit.
pub const BULLET_MAX_BOUNCES: u32 = 3;
/// Planetoid radius lost per unit of distance travelled.
pub const PLANETOID_SHRINK_RATE: f64 = 1e-6;
/// A dying planetoid at least this large breaks into two asteroids.
pub const PLANETOID_SPLIT_RADIUS: f64 = 30.0;

fn mass_for(radius: f64, density: f64) -> f64 {
    4.0 / 3.0 * PI * radius.powi(3) * density
}

/// Ship-only state: thruster, magazine and the attached program.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct ShipState {
    pub(crate) thruster_on: bool,
    pub(crate) thrust_force: f64,
    pub(crate) magazine: Vec<Entity>,
    pub(crate) program: Option<Program>,
}

/// Bullet-only state: boundary bounces survived and the ship that fired it.
#[derive(Clone, Copy, Debug, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct BulletState {
    pub(crate) bounces: u32,
    pub(crate) source: Option<EntityId>,
}

#[derive(Clone, Copy, Debug, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct PlanetoidState {
    pub(crate) travelled: f64,
}

/// Closed set of entity kinds, with per-kind state inline.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum Kind {
    Ship(ShipState),
    Bullet(BulletState),
    Asteroid,
    Planetoid(PlanetoidState),
}

impl Kind {
    pub fn min_radius(&self) -> f64 {
        match self {
            Kind::Ship(_) => SHIP_MIN_RADIUS,
            Kind::Bullet(_) => BULLET_MIN_RADIUS,
            Kind::Asteroid => ASTEROID_MIN_RADIUS,
            Kind::Planetoid(_) => PLANETOID_MIN_RADIUS,
        }
    }

    pub fn density(&self) -> f64 {
        match self {
            Kind::Ship(_) => SHIP_MIN_DENSITY,
            Kind::Bullet(_) => BULLET_DENSITY,
            Kind::Asteroid => ASTEROID_DENSITY,
            Kind::Planetoid(_) => PLANETOID_DENSITY,
        }
    }
}

/// A mobile circular body.
///
/// Free-standing until added to a [`crate::world::World`]; the world then
/// owns it by value, so an entity can never belong to two worlds at once.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Entity {
    position: DVec2,
    velocity: DVec2,
    radius: f64,
    direction: f64,
    mass: f64,
    pub(crate) destroyed: bool,
    pub(crate) terminated: bool,
    kind: Kind,
}

impl Entity {
    fn validated(
        kind: Kind,
        position: DVec2,
        velocity: DVec2,
        radius: f64,
        direction: f64,
    ) -> Result<Self, Error> {
        if position.x.is_nan() || position.y.is_nan() {
            return Err(Error::InvalidPosition(position.x, position.y));
        }
        let min = kind.min_radius();
        if !(radius >= min) {
            return Err(Error::InvalidRadius { radius, min });
        }
        debug_assert!((0.0..=TAU).contains(&direction));
        let mass = mass_for(radius, kind.density());
        let mut entity = Self {
            position,
            velocity: DVec2::ZERO,
            radius,
            direction,
            mass,
            destroyed: false,
            terminated: false,
            kind,
        };
        entity.set_velocity(velocity);
        Ok(entity)
    }

    pub fn ship(
        position: DVec2,
        velocity: DVec2,
        radius: f64,
        direction: f64,
    ) -> Result<Self, Error> {
        Self::validated(
            Kind::Ship(ShipState {
                thrust_force: DEFAULT_THRUST_FORCE,
                ..Default::default()
            }),
            position,
            velocity,
            radius,
            direction,
        )
    }

    pub fn bullet(position: DVec2, velocity: DVec2, radius: f64) -> Result<Self, Error> {
        Self::validated(
            Kind::Bullet(BulletState::default()),
            position,
            velocity,
            radius,
            0.0,
        )
    }

    pub fn asteroid(position: DVec2, velocity: DVec2, radius: f64) -> Result<Self, Error> {
        Self::validated(Kind::Asteroid, position, velocity, radius, 0.0)
    }

    pub fn planetoid(position: DVec2, velocity: DVec2, radius: f64) -> Result<Self, Error> {
        Self::validated(
            Kind::Planetoid(PlanetoidState::default()),
            position,
            velocity,
            radius,
            0.0,
        )
    }

    pub fn position(&self) -> DVec2 {
        self.position
    }

    pub fn velocity(&self) -> DVec2 {
        self.velocity
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn direction(&self) -> f64 {
        self.direction
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// Explicit ship mass. Total: values below the minimum-density mass,
    /// NaN, or on a non-ship leave the mass unchanged.
    pub fn set_mass(&mut self, mass: f64) {
        if !self.is_ship() {
            return;
        }
        if mass.is_finite() && mass >= mass_for(self.radius, SHIP_MIN_DENSITY) {
            self.mass = mass;
        }
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    pub fn is_ship(&self) -> bool {
        matches!(self.kind, Kind::Ship(_))
    }

    pub fn is_bullet(&self) -> bool {
        matches!(self.kind, Kind::Bullet(_))
    }

    pub fn is_asteroid(&self) -> bool {
        matches!(self.kind, Kind::Asteroid)
    }

    pub fn is_planetoid(&self) -> bool {
        matches!(self.kind, Kind::Planetoid(_))
    }

    /// Asteroids and planetoids.
    pub fn is_minor_planet(&self) -> bool {
        self.is_asteroid() || self.is_planetoid()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Mark for removal; the owning world sweeps destroyed members after
    /// each resolved collision.
    pub fn destroy(&mut self) {
        self.destroyed = true;
    }

    /// Make the entity inert. A terminated entity can never rejoin a world.
    pub fn terminate(&mut self) {
        self.terminated = true;
    }

    /// Unit vector along the current direction.
    pub fn heading(&self) -> DVec2 {
        DVec2::from_angle(self.direction)
    }

    /// Defensive: fails on NaN, otherwise places the centre.
    pub fn set_position(&mut self, position: DVec2) -> Result<(), Error> {
        if position.x.is_nan() || position.y.is_nan() {
            return Err(Error::InvalidPosition(position.x, position.y));
        }
        self.position = position;
        Ok(())
    }

    // Caller guarantees a finite position.
    pub(crate) fn place_at(&mut self, position: DVec2) {
        self.position = position;
    }

    /// Total: NaN components collapse to zero, an over-cap magnitude is
    /// scaled back onto the cap without changing direction.
    pub fn set_velocity(&mut self, velocity: DVec2) {
        if velocity.x.is_nan() || velocity.y.is_nan() {
            self.velocity = DVec2::ZERO;
            return;
        }
        self.velocity = velocity.clamp_length_max(MAX_SPEED);
    }

    /// Nominal: the caller guarantees `0 <= direction <= 2 * PI`.
    pub fn set_direction(&mut self, direction: f64) {
        debug_assert!((0.0..=TAU).contains(&direction));
        self.direction = direction;
    }

    /// Nominal: the caller guarantees the turned direction stays in range.
    pub fn turn(&mut self, delta: f64) {
        self.set_direction(self.direction + delta);
    }

    /// Advance linearly for `dt` seconds. Ships integrate thrust, planetoids
    /// shrink with distance travelled and self-destruct below their minimum
    /// radius.
    pub fn advance(&mut self, dt: f64) -> Result<(), Error> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(Error::InvalidDuration(dt));
        }
        self.position += self.velocity * dt;
        if let Kind::Ship(state) = &self.kind {
            if state.thruster_on {
                let accel = state.thrust_force / self.mass;
                let velocity = self.velocity + self.heading() * accel * dt;
                self.set_velocity(velocity);
            }
        }
        if let Kind::Planetoid(state) = &mut self.kind {
            let travelled = self.velocity.length() * dt;
            state.travelled += travelled;
            self.radius -= PLANETOID_SHRINK_RATE * travelled;
            if self.radius < PLANETOID_MIN_RADIUS {
                self.destroyed = true;
            } else {
                self.mass = mass_for(self.radius, PLANETOID_DENSITY);
            }
        }
        Ok(())
    }

    pub fn distance_between(&self, other: &Entity) -> f64 {
        self.position.distance(other.position)
    }

    pub fn overlaps(&self, other: &Entity) -> bool {
        self.distance_between(other) < self.radius + other.radius
    }

    pub fn significantly_overlaps(&self, other: &Entity) -> bool {
        self.distance_between(other) <= math::SIGNIFICANT_OVERLAP * (self.radius + other.radius)
    }

    pub fn apparently_collides(&self, other: &Entity) -> bool {
        let d = self.distance_between(other);
        let sum = self.radius + other.radius;
        math::SIGNIFICANT_OVERLAP * sum <= d && d <= math::APPARENT_COLLISION * sum
    }

    /// Every wall at least `0.99 * radius` away.
    pub fn within_boundaries(&self, width: f64, height: f64) -> bool {
        let margin = math::SIGNIFICANT_OVERLAP * self.radius;
        self.position.x >= margin
            && self.position.x <= width - margin
            && self.position.y >= margin
            && self.position.y <= height - margin
    }

    // --- ship surface ---

    pub fn thruster_on(&self) -> bool {
        matches!(&self.kind, Kind::Ship(s) if s.thruster_on)
    }

    pub fn set_thruster(&mut self, on: bool) -> Result<(), Error> {
        match &mut self.kind {
            Kind::Ship(s) => {
                s.thruster_on = on;
                Ok(())
            }
            _ => Err(Error::NotAShip),
        }
    }

    pub fn thrust_force(&self) -> Option<f64> {
        match &self.kind {
            Kind::Ship(s) => Some(s.thrust_force),
            _ => None,
        }
    }

    /// Bullets waiting in the magazine, not part of any world.
    pub fn magazine(&self) -> &[Entity] {
        match &self.kind {
            Kind::Ship(s) => &s.magazine,
            _ => &[],
        }
    }

    /// Put a bullet into the magazine. On failure the bullet is handed
    /// back inside the error.
    pub fn load_bullet(&mut self, bullet: Entity) -> Result<(), RejectedEntity> {
        if !bullet.is_bullet() {
            return Err(RejectedEntity {
                error: Error::NotABullet,
                entity: bullet,
            });
        }
        match &mut self.kind {
            Kind::Ship(s) => {
                s.magazine.push(bullet);
                Ok(())
            }
            _ => Err(RejectedEntity {
                error: Error::NotAShip,
                entity: bullet,
            }),
        }
    }

    pub fn unload_bullet(&mut self) -> Option<Entity> {
        match &mut self.kind {
            Kind::Ship(s) => s.magazine.pop(),
            _ => None,
        }
    }

    pub fn set_program(&mut self, program: Program) -> Result<(), Error> {
        match &mut self.kind {
            Kind::Ship(s) => {
                s.program = Some(program);
                Ok(())
            }
            _ => Err(Error::NotAShip),
        }
    }

    pub fn program(&self) -> Option<&Program> {
        match &self.kind {
            Kind::Ship(s) => s.program.as_ref(),
            _ => None,
        }
    }

    pub(crate) fn take_program(&mut self) -> Option<Program> {
        match &mut self.kind {
            Kind::Ship(s) => s.program.take(),
            _ => None,
        }
    }

    pub(crate) fn put_program(&mut self, program: Program) {
        if let Kind::Ship(s) = &mut self.kind {
            s.program = Some(program);
        }
    }

    // --- bullet surface ---

    pub fn bounce_count(&self) -> Option<u32> {
        match &self.kind {
            Kind::Bullet(b) => Some(b.bounces),
            _ => None,
        }
    }

    /// Ship that fired this bullet, if it was ever fired.
    pub fn bullet_source(&self) -> Option<EntityId> {
        match &self.kind {
            Kind::Bullet(b) => b.source,
            _ => None,
        }
    }

    pub(crate) fn set_bullet_source(&mut self, source: Option<EntityId>) {
        if let Kind::Bullet(b) = &mut self.kind {
            b.source = source;
        }
    }

    pub(crate) fn reset_bounces(&mut self) {
        if let Kind::Bullet(b) = &mut self.kind {
            b.bounces = 0;
        }
    }

    // Returns the new count.
    pub(crate) fn bump_bounces(&mut self) -> u32 {
        match &mut self.kind {
            Kind::Bullet(b) => {
                b.bounces += 1;
                b.bounces
            }
            _ => 0,
        }
    }

    pub fn travelled(&self) -> Option<f64> {
        match &self.kind {
            Kind::Planetoid(p) => Some(p.travelled),
            _ => None,
        }
    }
}
