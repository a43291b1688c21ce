//! Authority split for networked entities
//!
//! Which side of the split an entity is on is decided once at construction:
//! an [`AuthorityDriver`] simulates and writes snapshots, an
//! [`ObserverProxy`] only ever reads them.

use std::sync::Arc;

use bytes::Bytes;
use nalgebra::UnitQuaternion;
use tracing::debug;
use uuid::Uuid;

use crate::config::{Capabilities, Variant};
use crate::net::{Frame, ProtocolError, SchemaVersion, SnapshotRecord, SnapshotSchema};
use crate::util::time::SimClock;

use super::animation::{AnimationFrame, AnimationProjector, AnimationSink};
use super::body::CharacterBody;
use super::input::{InputDevice, InputSampler};
use super::motion::{CameraRig, MotionSimulator};
use super::reconcile::Reconciler;
use super::snapshot::SnapshotInbox;
use super::spawn::EntitySpawn;
use super::{EntityState, Event, EventSet};

/// Locally simulated entity owned by this process
pub struct AuthorityDriver {
    id: Uuid,
    variant: Variant,
    caps: Capabilities,
    schema: SnapshotSchema,
    sampler: InputSampler,
    motion: MotionSimulator,
    body: Box<dyn CharacterBody>,
    /// Part rotations relative to the entity rotation
    part_offsets: Vec<UnitQuaternion<f32>>,
    projector: AnimationProjector,
    camera: Option<CameraRig>,
    /// Events latched until the next captured snapshot
    latched: EventSet,
}

impl AuthorityDriver {
    pub fn new(
        spawn: &EntitySpawn,
        schema_version: SchemaVersion,
        device: Box<dyn InputDevice>,
        body: Box<dyn CharacterBody>,
        sink: Option<Box<dyn AnimationSink>>,
    ) -> Self {
        let caps = spawn.variant.capabilities();
        Self {
            id: spawn.id,
            variant: spawn.variant,
            caps,
            schema: SnapshotSchema::new(schema_version, caps),
            sampler: InputSampler::new(device, spawn.movement.look_sensitivity),
            motion: MotionSimulator::new(spawn.movement, caps, spawn.rotation),
            body,
            part_offsets: vec![UnitQuaternion::identity(); caps.part_count()],
            projector: AnimationProjector::new(sink),
            camera: None,
            latched: EventSet::default(),
        }
    }

    pub fn with_camera(mut self, camera: CameraRig) -> Self {
        self.camera = Some(camera);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn camera(&self) -> Option<&CameraRig> {
        self.camera.as_ref()
    }

    /// Set a cosmetic part's rotation relative to the entity
    pub fn set_part_offset(&mut self, part: usize, offset: UnitQuaternion<f32>) {
        if let Some(slot) = self.part_offsets.get_mut(part) {
            *slot = offset;
        }
    }

    /// Sample input, simulate and animate one tick.
    ///
    /// Returns the events raised this tick.
    pub fn tick(&mut self, clock: &SimClock) -> EventSet {
        let dt = clock.dt();
        let input = self.sampler.sample(dt);
        let events = self.motion.step(self.body.as_mut(), &input, clock.now(), dt);

        if let Some(camera) = self.camera.as_mut() {
            let state = self.motion.state();
            camera.update(self.motion.pivot_rotation(), state.crouching, dt);
        }

        if !events.is_empty() {
            debug!(entity_id = %self.id, ?events, "Events raised");
        }
        // Events the schema cannot carry stay local to this process.
        for event in [Event::Jump, Event::Attack] {
            if events.contains(event) && self.schema.carries(event) {
                self.latched.raise(event);
            }
        }

        let mut local = events;
        let frame = self.animation_frame();
        self.projector.project(&frame, &mut local);
        events
    }

    /// Current authoritative state
    pub fn state(&self) -> EntityState {
        let motion = self.motion.state();
        EntityState {
            position: self.body.position(),
            rotation: motion.rotation,
            parts: self
                .part_offsets
                .iter()
                .map(|offset| motion.rotation * offset)
                .collect(),
            blend: motion.blend,
            grounded: motion.grounded,
            crouching: motion.crouching,
            vertical_velocity: motion.vertical_velocity,
        }
    }

    /// Capture state plus latched events, clearing the latch
    pub fn capture_snapshot(&mut self) -> SnapshotRecord {
        SnapshotRecord {
            state: self.state(),
            events: self.latched.drain(),
        }
    }

    /// Capture a snapshot and encode it for the transport
    pub fn encode_frame(&mut self) -> Bytes {
        let record = self.capture_snapshot();
        self.schema.to_frame(self.id, &record).encode()
    }

    fn animation_frame(&self) -> AnimationFrame {
        let state = self.motion.state();
        AnimationFrame {
            blend: state.blend,
            grounded: state.grounded,
            crouch: self
                .caps
                .supports_crouch
                .then_some((state.crouch_blend, state.crouching)),
        }
    }
}

/// Remote entity reconstructed from received snapshots
pub struct ObserverProxy {
    id: Uuid,
    variant: Variant,
    caps: Capabilities,
    schema: SnapshotSchema,
    inbox: Arc<SnapshotInbox>,
    reconciler: Reconciler,
    projector: AnimationProjector,
}

impl ObserverProxy {
    pub fn new(
        spawn: &EntitySpawn,
        schema_version: SchemaVersion,
        serialization_interval: f32,
        sink: Option<Box<dyn AnimationSink>>,
    ) -> Self {
        let caps = spawn.variant.capabilities();
        let initial = EntityState::at_rest(spawn.position, spawn.rotation, caps.part_count());
        Self {
            id: spawn.id,
            variant: spawn.variant,
            caps,
            schema: SnapshotSchema::new(schema_version, caps),
            inbox: Arc::new(SnapshotInbox::new()),
            reconciler: Reconciler::new(
                initial,
                caps,
                serialization_interval,
                spawn.movement.crouch_transition_rate,
            ),
            projector: AnimationProjector::new(sink),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Handle for publishing records decoded off the tick path
    pub fn inbox(&self) -> Arc<SnapshotInbox> {
        self.inbox.clone()
    }

    /// Decode a received frame into the inbox.
    ///
    /// On error nothing is published and the previous state stays in effect.
    pub fn receive(&self, frame: &Frame) -> Result<(), ProtocolError> {
        let record = self.schema.from_frame(frame)?;
        self.inbox.publish(record);
        Ok(())
    }

    /// Apply any pending snapshot, reconcile and animate one tick
    pub fn tick(&mut self, dt: f32) {
        if let Some(record) = self.inbox.take() {
            self.reconciler.apply(record);
        }
        self.reconciler.tick(dt);

        let displayed = self.reconciler.displayed();
        let frame = AnimationFrame {
            blend: displayed.blend,
            grounded: displayed.grounded,
            crouch: self
                .caps
                .supports_crouch
                .then_some((self.reconciler.crouch_blend(), displayed.crouching)),
        };
        self.projector.project(&frame, self.reconciler.pending_events());
    }

    pub fn displayed(&self) -> &EntityState {
        self.reconciler.displayed()
    }

    pub fn tracking_error(&self) -> Option<f32> {
        self.reconciler.tracking_error()
    }
}

/// One networked avatar as seen by this process
pub enum NetworkEntity {
    Authority(AuthorityDriver),
    Observer(ObserverProxy),
}

impl NetworkEntity {
    pub fn id(&self) -> Uuid {
        match self {
            NetworkEntity::Authority(driver) => driver.id(),
            NetworkEntity::Observer(proxy) => proxy.id(),
        }
    }

    pub fn is_authority(&self) -> bool {
        matches!(self, NetworkEntity::Authority(_))
    }

    pub fn tick(&mut self, clock: &SimClock) {
        match self {
            NetworkEntity::Authority(driver) => {
                driver.tick(clock);
            }
            NetworkEntity::Observer(proxy) => proxy.tick(clock.dt()),
        }
    }

    pub fn view(&self) -> EntityView {
        match self {
            NetworkEntity::Authority(driver) => EntityView {
                id: driver.id(),
                variant: driver.variant(),
                authority: true,
                state: driver.state(),
                tracking_error: None,
            },
            NetworkEntity::Observer(proxy) => EntityView {
                id: proxy.id(),
                variant: proxy.variant(),
                authority: false,
                state: proxy.displayed().clone(),
                tracking_error: proxy.tracking_error(),
            },
        }
    }
}

/// Read-only summary of an entity for reporting
#[derive(Debug, Clone, PartialEq)]
pub struct EntityView {
    pub id: Uuid,
    pub variant: Variant,
    pub authority: bool,
    pub state: EntityState,
    /// Observer only: distance from the latest received position
    pub tracking_error: Option<f32>,
}
