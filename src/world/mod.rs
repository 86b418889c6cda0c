//! The world: a bounded rectangle exclusively owning every entity inside it.
//!
//! Members live in a versioned slot arena; handles ([`EntityId`]) are
//! recycled ids whose version guards against stale use. Adding an entity
//! moves it into the world, removing moves it back out, so membership in
//! two worlds at once is unrepresentable.

use glam::DVec2;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::TAU;
use std::fmt;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

use crate::entity::{self, Entity};
use crate::error::{Error, RejectedEntity};
use crate::math;
use crate::program::Program;

mod evolve;
mod resolve;

pub use evolve::CollisionListener;

pub type IdSize = u32;

/// Dimensions used when the requested ones are out of range.
pub const DEFAULT_DIM: f64 = 1000.0;
/// Upper bound for world dimensions.
pub const MAX_DIM: f64 = f64::MAX;

const DEFAULT_SEED: u64 = 0x6b65_7373_6c65_72;

/// Versioned handle to a world member.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct EntityId {
    pub id: IdSize,
    pub version: IdSize,
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}v{}", self.id, self.version)
    }
}

/// The next collision the world will resolve.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Collision {
    Pair(EntityId, EntityId),
    Boundary(EntityId),
}

#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
struct Slot {
    version: IdSize,
    body: Option<Entity>,
}

fn default_rng() -> SmallRng {
    SmallRng::seed_from_u64(DEFAULT_SEED)
}

/// A rectangular universe of circular bodies.
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct World {
    width: f64,
    height: f64,
    slots: Vec<Slot>,
    free: Vec<IdSize>,
    #[cfg_attr(feature = "serialize", serde(skip, default = "default_rng"))]
    rng: SmallRng,
}

impl World {
    /// A world with the given dimensions and the default RNG seed.
    /// Out-of-range (negative, NaN or above [`MAX_DIM`]) dimensions fall
    /// back to [`DEFAULT_DIM`].
    pub fn new(width: f64, height: f64) -> Self {
        Self::with_seed(width, height, DEFAULT_SEED)
    }

    /// Same, but with an explicit seed for the world-owned RNG, so random
    /// outcomes (planetoid teleports, break-up headings) replay exactly.
    pub fn with_seed(width: f64, height: f64, seed: u64) -> Self {
        Self {
            width: sanitize_dim(width),
            height: sanitize_dim(height),
            slots: Vec::new(),
            free: Vec::new(),
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.body.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| s.body.is_none())
    }

    /// Move an entity into the world. It must lie within the boundaries and
    /// must not significantly overlap any member; on failure the entity is
    /// handed back untouched.
    pub fn add_entity(&mut self, entity: Entity) -> Result<EntityId, RejectedEntity> {
        if let Err(error) = self.check_admission(&entity) {
            return Err(RejectedEntity { error, entity });
        }
        let id = self.insert(entity);
        log::trace!("entity {} joined the world", id);
        Ok(id)
    }

    fn check_admission(&self, entity: &Entity) -> Result<(), Error> {
        if entity.is_terminated() {
            return Err(Error::Terminated);
        }
        if !entity.within_boundaries(self.width, self.height) {
            return Err(Error::OutOfBounds);
        }
        for (_, member) in self.entities() {
            if entity.significantly_overlaps(member) {
                return Err(Error::Overlapping);
            }
        }
        Ok(())
    }

    fn insert(&mut self, entity: Entity) -> EntityId {
        if let Some(id) = self.free.pop() {
            let slot = &mut self.slots[id as usize];
            slot.body = Some(entity);
            EntityId {
                id,
                version: slot.version,
            }
        } else {
            let id = self.slots.len() as IdSize;
            self.slots.push(Slot {
                version: 0,
                body: Some(entity),
            });
            EntityId { id, version: 0 }
        }
    }

    /// Move an entity back out of the world. Unknown or stale ids are a
    /// no-op returning `None`.
    pub fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
        let slot = self.slots.get_mut(id.id as usize)?;
        if slot.version != id.version || slot.body.is_none() {
            return None;
        }
        slot.version = slot.version.wrapping_add(1);
        self.free.push(id.id);
        log::trace!("entity {} left the world", id);
        slot.body.take()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        let slot = self.slots.get(id.id as usize)?;
        if slot.version != id.version {
            return None;
        }
        slot.body.as_ref()
    }

    pub(crate) fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        let slot = self.slots.get_mut(id.id as usize)?;
        if slot.version != id.version {
            return None;
        }
        slot.body.as_mut()
    }

    /// Members in slot order. The order is stable between mutations and is
    /// the iteration order every deterministic rule uses.
    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.body.as_ref().map(|e| {
                (
                    EntityId {
                        id: i as IdSize,
                        version: slot.version,
                    },
                    e,
                )
            })
        })
    }

    /// First member whose centre is exactly at `(x, y)`.
    pub fn entity_at(&self, x: f64, y: f64) -> Option<EntityId> {
        let at = DVec2::new(x, y);
        self.entities()
            .find(|(_, e)| e.position() == at)
            .map(|(id, _)| id)
    }

    /// Earliest upcoming collision: the argmin of time-to-impact over all
    /// entity pairs and entity-boundary combinations. Ties go to the first
    /// candidate in iteration order.
    pub fn next_collision(&self) -> Option<(f64, Collision)> {
        let members: Vec<(EntityId, &Entity)> = self.entities().collect();
        let mut best: Option<(f64, Collision)> = None;
        for (i, (id_a, a)) in members.iter().enumerate() {
            let t = math::time_to_boundary(
                a.position(),
                a.velocity(),
                a.radius(),
                self.width,
                self.height,
            );
            consider(&mut best, t, Collision::Boundary(*id_a));
            for (id_b, b) in &members[i + 1..] {
                let t = math::time_to_collision(
                    a.position(),
                    a.velocity(),
                    a.radius(),
                    b.position(),
                    b.velocity(),
                    b.radius(),
                );
                consider(&mut best, t, Collision::Pair(*id_a, *id_b));
            }
        }
        best
    }

    pub fn next_collision_time(&self) -> Option<f64> {
        self.next_collision().map(|(t, _)| t)
    }

    pub fn next_collision_pair(&self) -> Option<Collision> {
        self.next_collision().map(|(_, c)| c)
    }

    pub fn next_collision_position(&self) -> Option<DVec2> {
        let (t, collision) = self.next_collision()?;
        match collision {
            Collision::Pair(a, b) => {
                let a = self.get(a)?;
                let b = self.get(b)?;
                let pa = a.position() + a.velocity() * t;
                let pb = b.position() + b.velocity() * t;
                Some(math::contact_point(pa, a.radius(), pb, b.radius()))
            }
            Collision::Boundary(e) => {
                let e = self.get(e)?;
                let p = e.position() + e.velocity() * t;
                Some(math::boundary_contact(p, e.radius(), self.width, self.height))
            }
        }
    }

    // --- ship commands ---

    pub fn set_thruster(&mut self, id: EntityId, on: bool) -> Result<(), Error> {
        self.get_mut(id).ok_or(Error::UnknownEntity)?.set_thruster(on)
    }

    /// Turn a ship by `delta` radians; the resulting direction is
    /// normalized into `[0, 2 * PI)`.
    pub fn turn_ship(&mut self, id: EntityId, delta: f64) -> Result<(), Error> {
        let ship = self.get_mut(id).ok_or(Error::UnknownEntity)?;
        if !ship.is_ship() {
            return Err(Error::NotAShip);
        }
        let direction = (ship.direction() + delta).rem_euclid(TAU);
        ship.set_direction(direction);
        Ok(())
    }

    pub fn attach_program(&mut self, id: EntityId, program: Program) -> Result<(), Error> {
        self.get_mut(id).ok_or(Error::UnknownEntity)?.set_program(program)
    }

    pub fn load_bullet(&mut self, id: EntityId, bullet: Entity) -> Result<(), RejectedEntity> {
        match self.get_mut(id) {
            Some(ship) => ship.load_bullet(bullet),
            None => Err(RejectedEntity {
                error: Error::UnknownEntity,
                entity: bullet,
            }),
        }
    }

    pub fn unload_bullet(&mut self, id: EntityId) -> Result<Option<Entity>, Error> {
        let ship = self.get_mut(id).ok_or(Error::UnknownEntity)?;
        if !ship.is_ship() {
            return Err(Error::NotAShip);
        }
        Ok(ship.unload_bullet())
    }

    /// Fire a magazine bullet from the ship's rim along its direction.
    /// Returns `Ok(None)` when the magazine is empty or the muzzle position
    /// is invalid; in the latter case the bullet is destroyed.
    pub fn fire(&mut self, id: EntityId) -> Result<Option<EntityId>, Error> {
        let ship = self.get_mut(id).ok_or(Error::UnknownEntity)?;
        if !ship.is_ship() {
            return Err(Error::NotAShip);
        }
        let mut bullet = match ship.unload_bullet() {
            Some(bullet) => bullet,
            None => return Ok(None),
        };
        let heading = ship.heading();
        let muzzle = ship.position() + heading * (ship.radius() + bullet.radius());
        bullet.place_at(muzzle);
        bullet.set_velocity(heading * entity::MUZZLE_SPEED);
        bullet.set_bullet_source(Some(id));
        match self.add_entity(bullet) {
            Ok(bullet_id) => {
                log::trace!("ship {} fired bullet {}", id, bullet_id);
                Ok(Some(bullet_id))
            }
            Err(rejected) => {
                // no valid muzzle position; the bullet is lost
                log::debug!("bullet from ship {} destroyed: {}", id, rejected.error);
                Ok(None)
            }
        }
    }

    /// Mutable access to two distinct members at once.
    pub(crate) fn pair_mut(
        &mut self,
        a: EntityId,
        b: EntityId,
    ) -> Option<(&mut Entity, &mut Entity)> {
        if a.id == b.id || !self.contains(a) || !self.contains(b) {
            return None;
        }
        let (i, j) = (a.id as usize, b.id as usize);
        let (lo, hi) = if i < j { (i, j) } else { (j, i) };
        let (left, right) = self.slots.split_at_mut(hi);
        let first = left[lo].body.as_mut()?;
        let second = right[0].body.as_mut()?;
        if i < j {
            Some((first, second))
        } else {
            Some((second, first))
        }
    }

    pub(crate) fn random_unit(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

fn sanitize_dim(dim: f64) -> f64 {
    if (0.0..=MAX_DIM).contains(&dim) {
        dim
    } else {
        DEFAULT_DIM
    }
}

fn consider(best: &mut Option<(f64, Collision)>, t: f64, collision: Collision) {
    if !t.is_finite() {
        return;
    }
    match best {
        Some((bt, _)) if *bt <= t => {}
        _ => *best = Some((t, collision)),
    }
}
