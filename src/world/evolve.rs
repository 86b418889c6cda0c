//! The event loop: advance to the next collision, resolve it, sweep the
//! casualties, repeat until the requested time is used up.

use glam::DVec2;

use crate::entity::{self, Entity};
use crate::error::Error;
use crate::program::interp;

use super::{EntityId, World};

/// Receives collision notifications from [`World::evolve`].
///
/// `object_collision` fires only when both entities were destroyed by the
/// collision; `boundary_collision` fires for every wall hit.
pub trait CollisionListener {
    fn object_collision(&mut self, _a: EntityId, _b: EntityId, _at: DVec2) {}
    fn boundary_collision(&mut self, _entity: EntityId, _at: DVec2) {}
}

impl World {
    /// Advance the simulation by `dt` seconds.
    ///
    /// Repeatedly finds the earliest collision among all entity pairs and
    /// entity-boundary combinations; if it falls inside the remaining time
    /// the world advances exactly to it, the pair is resolved, destroyed
    /// members are swept, and the loop continues. Ship programs run inside
    /// every advancement, before the entities move.
    pub fn evolve(
        &mut self,
        dt: f64,
        mut listener: Option<&mut dyn CollisionListener>,
    ) -> Result<(), Error> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(Error::InvalidDuration(dt));
        }
        let mut remaining = dt;
        while remaining > 0.0 && !self.is_empty() {
            let (tau, collision) = match self.next_collision() {
                Some(next) if next.0 <= remaining => next,
                _ => {
                    self.advance(remaining)?;
                    return Ok(());
                }
            };
            // a glancing contact can report a slightly negative time
            let tau = tau.max(0.0);
            log::trace!("collision {:?} in {:.6}s", collision, tau);
            self.advance(tau)?;
            self.resolve(collision, listener.as_deref_mut());
            self.sweep();
            remaining -= tau;
        }
        Ok(())
    }

    /// Move the whole world forward by `dt` with no collision in between:
    /// first every ship program runs for the interval, then every entity
    /// moves.
    fn advance(&mut self, dt: f64) -> Result<(), Error> {
        let ships: Vec<EntityId> = self
            .entities()
            .filter(|(_, e)| e.is_ship())
            .map(|(id, _)| id)
            .collect();
        for id in ships {
            let Some(mut program) = self.get_mut(id).and_then(|s| s.take_program()) else {
                continue;
            };
            let result = interp::run(&mut program, self, id, dt);
            if let Some(ship) = self.get_mut(id) {
                ship.put_program(program);
            }
            result?;
        }
        for slot in &mut self.slots {
            if let Some(body) = slot.body.as_mut() {
                body.advance(dt)?;
            }
        }
        // planetoids may have shrunk themselves to death
        self.sweep();
        Ok(())
    }

    /// Remove and terminate every destroyed member. Dying planetoids large
    /// enough to split leave two asteroid fragments behind.
    pub(crate) fn sweep(&mut self) {
        let destroyed: Vec<EntityId> = self
            .entities()
            .filter(|(_, e)| e.is_destroyed())
            .map(|(id, _)| id)
            .collect();
        if destroyed.is_empty() {
            return;
        }
        log::debug!("sweeping {} destroyed entities", destroyed.len());
        let mut fragments: Vec<Entity> = Vec::new();
        for id in destroyed {
            if let Some(mut body) = self.remove_entity(id) {
                body.terminate();
                if body.is_planetoid() && body.radius() >= entity::PLANETOID_SPLIT_RADIUS {
                    fragments.extend(self.split_planetoid(&body));
                }
            }
        }
        for fragment in fragments {
            if let Err(rejected) = self.add_entity(fragment) {
                log::debug!("discarding planetoid fragment: {}", rejected.error);
            }
        }
    }
}
