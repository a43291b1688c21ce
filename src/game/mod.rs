//! Entity simulation, reconciliation and hosting

pub mod animation;
pub mod body;
pub mod entity;
pub mod input;
pub mod motion;
pub mod peer;
pub mod reconcile;
pub mod snapshot;
pub mod spawn;

pub use entity::{AuthorityDriver, EntityView, NetworkEntity, ObserverProxy};
pub use peer::{Peer, PeerReport};
pub use spawn::{EntityDirectory, EntitySpawn, Role, Spawner};

use nalgebra::{UnitQuaternion, Vector2, Vector3};

/// One-shot action that must be observed exactly once per occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    Jump,
    Attack,
}

/// Pending one-shot events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventSet {
    jump: bool,
    attack: bool,
}

impl EventSet {
    pub fn raise(&mut self, event: Event) {
        *self.slot(event) = true;
    }

    pub fn contains(&self, event: Event) -> bool {
        match event {
            Event::Jump => self.jump,
            Event::Attack => self.attack,
        }
    }

    /// Consume `event`, returning whether it was pending
    pub fn take(&mut self, event: Event) -> bool {
        std::mem::take(self.slot(event))
    }

    /// Move every pending event out, leaving the set empty
    pub fn drain(&mut self) -> EventSet {
        std::mem::take(self)
    }

    /// Union with events from `other`
    pub fn merge(&mut self, other: EventSet) {
        self.jump |= other.jump;
        self.attack |= other.attack;
    }

    pub fn is_empty(&self) -> bool {
        !self.jump && !self.attack
    }

    fn slot(&mut self, event: Event) -> &mut bool {
        match event {
            Event::Jump => &mut self.jump,
            Event::Attack => &mut self.attack,
        }
    }
}

/// Control intents for a single tick (authoritative side only)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControlInput {
    /// Strafe axis, right positive
    pub horizontal: f32,
    /// Forward/back axis, forward positive
    pub forward: f32,
    /// True only on the tick the jump button went down
    pub jump_pressed: bool,
    pub crouch_held: bool,
    /// True only on the tick the attack button went down
    pub attack_pressed: bool,
    /// Yaw (x) and pitch (y) change in degrees for this tick
    pub look: Vector2<f32>,
}

/// Replicated state of one avatar
#[derive(Debug, Clone, PartialEq)]
pub struct EntityState {
    pub position: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
    /// World rotations of cosmetic parts; index 0 is the body model
    pub parts: Vec<UnitQuaternion<f32>>,
    /// Smoothed local move direction (x = strafe, y = forward)
    pub blend: Vector2<f32>,
    pub grounded: bool,
    pub crouching: bool,
    pub vertical_velocity: f32,
}

impl EntityState {
    /// Standing still at a spawn pose, parts aligned with the body
    pub fn at_rest(
        position: Vector3<f32>,
        rotation: UnitQuaternion<f32>,
        part_count: usize,
    ) -> Self {
        Self {
            position,
            rotation,
            parts: vec![rotation; part_count],
            blend: Vector2::zeros(),
            grounded: false,
            crouching: false,
            vertical_velocity: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_consumed_once() {
        let mut events = EventSet::default();
        events.raise(Event::Attack);
        assert!(events.take(Event::Attack));
        assert!(!events.take(Event::Attack));
        assert!(events.is_empty());
    }

    #[test]
    fn merge_keeps_events_from_both_sides() {
        let mut a = EventSet::default();
        a.raise(Event::Jump);
        let mut b = EventSet::default();
        b.raise(Event::Attack);
        a.merge(b);
        assert!(a.contains(Event::Jump) && a.contains(Event::Attack));

        let drained = a.drain();
        assert!(a.is_empty());
        assert!(drained.contains(Event::Jump));
    }
}
