//! Per-pair collision rules. Resolution only flips velocities and
//! `destroyed` flags; membership changes happen in the sweep that follows,
//! so the member set is never mutated mid-iteration (the one exception is
//! the bullet reload, which moves the bullet out of the world and into the
//! ship's magazine).

use glam::DVec2;
use std::f64::consts::TAU;

use crate::entity::{self, Entity, Kind};
use crate::math;

use super::{Collision, CollisionListener, EntityId, World};

/// What a given pair of kinds does on contact.
enum Rule {
    Bounce,
    Reload { ship: EntityId, bullet: EntityId },
    MutualDestruction,
    ShipDestroyed(EntityId),
    Teleport(EntityId),
}

impl World {
    pub(crate) fn resolve(
        &mut self,
        collision: Collision,
        listener: Option<&mut (dyn CollisionListener + '_)>,
    ) {
        match collision {
            Collision::Boundary(id) => self.resolve_boundary(id, listener),
            Collision::Pair(a, b) => self.resolve_pair(a, b, listener),
        }
    }

    fn resolve_boundary(&mut self, id: EntityId, listener: Option<&mut (dyn CollisionListener + '_)>) {
        let (width, height) = (self.width, self.height);
        let Some(body) = self.get_mut(id) else { return };
        let wall = math::nearest_wall(body.position(), body.radius(), width, height);
        let at = math::boundary_contact(body.position(), body.radius(), width, height);
        let mut velocity = body.velocity();
        if wall.vertical {
            velocity.x = -velocity.x;
        }
        if wall.horizontal {
            velocity.y = -velocity.y;
        }
        body.set_velocity(velocity);
        if body.is_bullet() && body.bump_bounces() >= entity::BULLET_MAX_BOUNCES {
            body.destroy();
            log::trace!("bullet {} spent after its third wall hit", id);
        }
        if let Some(listener) = listener {
            listener.boundary_collision(id, at);
        }
    }

    fn resolve_pair(
        &mut self,
        a: EntityId,
        b: EntityId,
        listener: Option<&mut (dyn CollisionListener + '_)>,
    ) {
        let (Some(ea), Some(eb)) = (self.get(a), self.get(b)) else {
            return;
        };
        let at = math::contact_point(ea.position(), ea.radius(), eb.position(), eb.radius());
        let rule = match (ea.kind(), eb.kind()) {
            (Kind::Ship(_), Kind::Ship(_)) => Rule::Bounce,
            (Kind::Asteroid | Kind::Planetoid(_), Kind::Asteroid | Kind::Planetoid(_)) => {
                Rule::Bounce
            }
            (Kind::Ship(_), Kind::Bullet(bullet)) => {
                if bullet.source == Some(a) {
                    Rule::Reload { ship: a, bullet: b }
                } else {
                    Rule::MutualDestruction
                }
            }
            (Kind::Bullet(bullet), Kind::Ship(_)) => {
                if bullet.source == Some(b) {
                    Rule::Reload { ship: b, bullet: a }
                } else {
                    Rule::MutualDestruction
                }
            }
            (Kind::Bullet(_), Kind::Bullet(_)) => Rule::MutualDestruction,
            (Kind::Bullet(_), Kind::Asteroid | Kind::Planetoid(_))
            | (Kind::Asteroid | Kind::Planetoid(_), Kind::Bullet(_)) => Rule::MutualDestruction,
            (Kind::Ship(_), Kind::Asteroid) => Rule::ShipDestroyed(a),
            (Kind::Asteroid, Kind::Ship(_)) => Rule::ShipDestroyed(b),
            (Kind::Ship(_), Kind::Planetoid(_)) => Rule::Teleport(a),
            (Kind::Planetoid(_), Kind::Ship(_)) => Rule::Teleport(b),
        };
        match rule {
            Rule::Bounce => self.bounce(a, b),
            Rule::Reload { ship, bullet } => self.reload(ship, bullet),
            Rule::MutualDestruction => {
                if let Some(body) = self.get_mut(a) {
                    body.destroy();
                }
                if let Some(body) = self.get_mut(b) {
                    body.destroy();
                }
                log::trace!("{} and {} destroyed each other", a, b);
                if let Some(listener) = listener {
                    listener.object_collision(a, b, at);
                }
            }
            Rule::ShipDestroyed(ship) => {
                if let Some(body) = self.get_mut(ship) {
                    body.destroy();
                }
                log::trace!("ship {} destroyed", ship);
            }
            Rule::Teleport(ship) => self.teleport(ship),
        }
    }

    /// Elastic impulse exchange between two discs of arbitrary mass.
    fn bounce(&mut self, a: EntityId, b: EntityId) {
        let Some((ea, eb)) = self.pair_mut(a, b) else { return };
        let dp = eb.position() - ea.position();
        let dv = eb.velocity() - ea.velocity();
        let sigma = ea.radius() + eb.radius();
        let (m1, m2) = (ea.mass(), eb.mass());
        let j = 2.0 * m1 * m2 * dv.dot(dp) / (sigma * (m1 + m2));
        let impulse = dp * (j / sigma);
        let va = ea.velocity() + impulse / m1;
        let vb = eb.velocity() - impulse / m2;
        ea.set_velocity(va);
        eb.set_velocity(vb);
    }

    /// A ship catching its own bullet takes it back into the magazine.
    fn reload(&mut self, ship_id: EntityId, bullet_id: EntityId) {
        let Some(mut bullet) = self.remove_entity(bullet_id) else {
            return;
        };
        bullet.reset_bounces();
        let Some(ship) = self.get_mut(ship_id) else { return };
        bullet.place_at(ship.position());
        if let Err(rejected) = ship.load_bullet(bullet) {
            log::debug!("reload failed: {}", rejected.error);
        } else {
            log::trace!("ship {} reloaded a bullet", ship_id);
        }
    }

    /// A ship brushing a planetoid is thrown to a random spot; if that spot
    /// significantly overlaps anyone else, the ship is destroyed instead.
    fn teleport(&mut self, ship_id: EntityId) {
        let radius = match self.get(ship_id) {
            Some(ship) => ship.radius(),
            None => return,
        };
        let margin = math::SIGNIFICANT_OVERLAP * radius;
        let x = margin + self.random_unit() * (self.width - 2.0 * margin);
        let y = margin + self.random_unit() * (self.height - 2.0 * margin);
        let target = DVec2::new(x, y);
        let blocked = self.entities().any(|(id, other)| {
            id != ship_id
                && other.position().distance(target)
                    <= math::SIGNIFICANT_OVERLAP * (radius + other.radius())
        });
        let Some(ship) = self.get_mut(ship_id) else { return };
        if blocked {
            ship.destroy();
            log::trace!("ship {} teleported into company and was destroyed", ship_id);
        } else {
            ship.place_at(target);
            log::trace!("ship {} teleported to ({:.1}, {:.1})", ship_id, x, y);
        }
    }

    /// Two asteroid fragments for a dying planetoid: half the radius each,
    /// thrown apart along a random heading at 1.5x the planetoid's speed.
    pub(crate) fn split_planetoid(&mut self, planetoid: &Entity) -> Vec<Entity> {
        let heading = DVec2::from_angle(self.random_unit() * TAU);
        let radius = planetoid.radius() / 2.0;
        let speed = planetoid.velocity().length() * 1.5;
        [1.0, -1.0]
            .into_iter()
            .filter_map(|side| {
                Entity::asteroid(
                    planetoid.position() + heading * radius * side,
                    heading * speed * side,
                    radius,
                )
                .ok()
            })
            .collect()
    }
}
