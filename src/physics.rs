//! Physics seam.
//!
//! `PhysicsEngine` is what the pond needs from a physics backend: attach and
//! detach bodies, seed their motion, read positions back. Contacts flow the
//! other way, through `ContactAdapter`, which turns them into `Collision`
//! events.
//!
//! `HeadlessWorld` is a small reference backend (linear drift with damping,
//! edge bounces, equal-mass elastic contacts) so the pond can run without a
//! game engine.

use crate::events::{EventPublisher, PondEvent};
use crate::pond::PondSimulation;
use crate::types::{BubbleId, SurfaceBounds, CATEGORY_BUBBLE, CATEGORY_EDGE};
use glam::Vec2;
use log::trace;
use std::collections::{BTreeMap, HashSet};

pub trait PhysicsEngine {
    fn attach(&mut self, id: BubbleId, radius: f32, category_mask: u32, contact_mask: u32);
    fn set_position(&mut self, id: BubbleId, position: Vec2);
    fn set_velocity(&mut self, id: BubbleId, velocity: Vec2);
    fn detach(&mut self, id: BubbleId);
    fn position(&self, id: BubbleId) -> Option<Vec2>;
}

// ─── Contacts ───────────────────────────────────────────────────────────────

/// One side of a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContactBody {
    Bubble(BubbleId),
    Edge,
}

/// A contact-begin notification. The order of `a` and `b` carries no meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contact {
    pub a: ContactBody,
    pub b: ContactBody,
}

/// Maps contacts to `Collision` events: every bubble in the contact
/// contributes its own note pair. Edges and bodies the pond no longer
/// knows contribute nothing.
pub struct ContactAdapter {
    publisher: EventPublisher,
}

impl ContactAdapter {
    pub fn new(publisher: EventPublisher) -> Self {
        Self { publisher }
    }

    /// Returns the number of collision events published.
    pub fn on_contact<P: PhysicsEngine>(&self, pond: &PondSimulation<P>, contact: Contact) -> usize {
        let mut published = 0;
        for body in [contact.a, contact.b] {
            let ContactBody::Bubble(id) = body else {
                continue;
            };
            if let Some((note_a, note_b)) = pond.collision_notes(id) {
                trace!("Contact {:?} ↔ {:?}: {} / {}", contact.a, contact.b, note_a, note_b);
                self.publisher.publish(PondEvent::Collision {
                    note_a: note_a.to_string(),
                    note_b: note_b.to_string(),
                });
                published += 1;
            }
        }
        published
    }
}

// ─── Headless world ─────────────────────────────────────────────────────────

/// Damping applied to bubble velocity, per second.
pub const LINEAR_DAMPING: f32 = 0.05;

#[derive(Debug, Clone)]
struct Body {
    position: Vec2,
    velocity: Vec2,
    radius: f32,
    category: u32,
    contact_mask: u32,
}

impl Body {
    fn reports_contact_with(&self, other_category: u32) -> bool {
        self.contact_mask & other_category != 0
    }
}

/// Minimal 2D world on a centered rectangular surface.
pub struct HeadlessWorld {
    bounds: SurfaceBounds,
    bodies: BTreeMap<BubbleId, Body>,
    /// Pairs (lower id first) that were overlapping after the last step.
    touching: HashSet<(BubbleId, BubbleId)>,
    /// Bodies that were against an edge after the last step.
    on_edge: HashSet<BubbleId>,
}

impl HeadlessWorld {
    pub fn new(bounds: SurfaceBounds) -> Self {
        Self {
            bounds,
            bodies: BTreeMap::new(),
            touching: HashSet::new(),
            on_edge: HashSet::new(),
        }
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn velocity(&self, id: BubbleId) -> Option<Vec2> {
        self.bodies.get(&id).map(|b| b.velocity)
    }

    /// Advance by `dt` seconds and return the contacts that began during the step.
    pub fn step(&mut self, dt: f32) -> Vec<Contact> {
        let mut contacts = Vec::new();
        let damping = (1.0 - LINEAR_DAMPING * dt).max(0.0);
        let half = self.bounds.half_extents();

        // Integrate and bounce off the edges
        let mut on_edge = HashSet::new();
        for (&id, body) in self.bodies.iter_mut() {
            body.velocity *= damping;
            body.position += body.velocity * dt;

            let mut hit = false;
            let reach = half - Vec2::splat(body.radius);
            if body.position.x < -reach.x {
                body.position.x = -reach.x;
                body.velocity.x = body.velocity.x.abs();
                hit = true;
            } else if body.position.x > reach.x {
                body.position.x = reach.x;
                body.velocity.x = -body.velocity.x.abs();
                hit = true;
            }
            if body.position.y < -reach.y {
                body.position.y = -reach.y;
                body.velocity.y = body.velocity.y.abs();
                hit = true;
            } else if body.position.y > reach.y {
                body.position.y = reach.y;
                body.velocity.y = -body.velocity.y.abs();
                hit = true;
            }

            if hit && body.reports_contact_with(CATEGORY_EDGE) {
                on_edge.insert(id);
                if !self.on_edge.contains(&id) {
                    contacts.push(Contact {
                        a: ContactBody::Bubble(id),
                        b: ContactBody::Edge,
                    });
                }
            }
        }
        self.on_edge = on_edge;

        // Pairwise contacts
        let ids: Vec<BubbleId> = self.bodies.keys().copied().collect();
        let mut touching = HashSet::new();
        for (i, &ia) in ids.iter().enumerate() {
            for &ib in &ids[i + 1..] {
                let (Some(a), Some(b)) = (self.bodies.get(&ia), self.bodies.get(&ib)) else {
                    continue;
                };
                let delta = b.position - a.position;
                let reach = a.radius + b.radius;
                if delta.length_squared() >= reach * reach {
                    continue;
                }

                let collides = a.category & b.category & CATEGORY_BUBBLE != 0;
                let reports = a.reports_contact_with(b.category) || b.reports_contact_with(a.category);
                if reports {
                    touching.insert((ia, ib));
                    if !self.touching.contains(&(ia, ib)) {
                        contacts.push(Contact {
                            a: ContactBody::Bubble(ia),
                            b: ContactBody::Bubble(ib),
                        });
                    }
                }
                if collides {
                    self.resolve(ia, ib, delta, reach);
                }
            }
        }
        self.touching = touching;

        contacts
    }

    /// Equal-mass elastic response: exchange the normal velocity components
    /// and push the bodies apart by half the overlap each.
    fn resolve(&mut self, ia: BubbleId, ib: BubbleId, delta: Vec2, reach: f32) {
        let normal = delta.normalize_or(Vec2::X);
        let overlap = reach - delta.length();
        let (va, vb) = match (self.bodies.get(&ia), self.bodies.get(&ib)) {
            (Some(a), Some(b)) => (a.velocity, b.velocity),
            _ => return,
        };
        let closing = (vb - va).dot(normal);
        let impulse = if closing < 0.0 { normal * closing } else { Vec2::ZERO };

        if let Some(a) = self.bodies.get_mut(&ia) {
            a.velocity = va + impulse;
            a.position -= normal * overlap / 2.0;
        }
        if let Some(b) = self.bodies.get_mut(&ib) {
            b.velocity = vb - impulse;
            b.position += normal * overlap / 2.0;
        }
    }
}

impl PhysicsEngine for HeadlessWorld {
    fn attach(&mut self, id: BubbleId, radius: f32, category_mask: u32, contact_mask: u32) {
        self.bodies.insert(
            id,
            Body {
                position: Vec2::ZERO,
                velocity: Vec2::ZERO,
                radius,
                category: category_mask,
                contact_mask,
            },
        );
    }

    fn set_position(&mut self, id: BubbleId, position: Vec2) {
        if let Some(body) = self.bodies.get_mut(&id) {
            body.position = position;
        }
    }

    fn set_velocity(&mut self, id: BubbleId, velocity: Vec2) {
        if let Some(body) = self.bodies.get_mut(&id) {
            body.velocity = velocity;
        }
    }

    fn detach(&mut self, id: BubbleId) {
        self.bodies.remove(&id);
        self.on_edge.remove(&id);
        self.touching.retain(|(a, b)| *a != id && *b != id);
    }

    fn position(&self, id: BubbleId) -> Option<Vec2> {
        self.bodies.get(&id).map(|b| b.position)
    }
}
