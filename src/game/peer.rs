//! Per-process entity host and tick loop

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::net::{Frame, SchemaVersion, Transport};
use crate::util::time::{serialization_interval, SimClock};

use super::animation::AnimationSink;
use super::body::FlatGroundBody;
use super::entity::{AuthorityDriver, EntityView, NetworkEntity, ObserverProxy};
use super::input::InputDevice;
use super::snapshot::{SnapshotCadence, SnapshotStats};
use super::spawn::{EntityDirectory, EntitySpawn, SpawnError};

/// Builds an animation sink for each observer entity a peer creates
pub type SinkFactory = Box<dyn FnMut(&EntitySpawn) -> Box<dyn AnimationSink> + Send>;

/// Tick and wire settings shared by every peer in a session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeerSettings {
    pub simulation_tps: u32,
    pub serialization_rate: u32,
    pub schema_version: SchemaVersion,
}

impl PeerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            simulation_tps: config.simulation_tps,
            serialization_rate: config.serialization_rate,
            schema_version: config.schema_version,
        }
    }
}

impl Default for PeerSettings {
    fn default() -> Self {
        Self {
            simulation_tps: 60,
            serialization_rate: 10,
            schema_version: SchemaVersion::V1,
        }
    }
}

/// Summary returned when a peer stops
#[derive(Debug, Clone)]
pub struct PeerReport {
    pub peer_id: Uuid,
    pub ticks: u64,
    pub snapshots: SnapshotStats,
    /// Inbound frames that failed to decode
    pub frames_dropped: u64,
    pub entities: Vec<EntityView>,
}

/// One process in the session: hosts its own entities with authority and
/// observes everybody else's.
pub struct Peer {
    id: Uuid,
    settings: PeerSettings,
    directory: Arc<EntityDirectory>,
    transport: Box<dyn Transport>,
    entities: HashMap<Uuid, NetworkEntity>,
    cadence: SnapshotCadence,
    clock: SimClock,
    stats: SnapshotStats,
    frames_dropped: u64,
    observer_sinks: Option<SinkFactory>,
}

impl Peer {
    pub fn new(
        id: Uuid,
        settings: PeerSettings,
        directory: Arc<EntityDirectory>,
        transport: Box<dyn Transport>,
    ) -> Self {
        Self {
            id,
            settings,
            directory,
            transport,
            entities: HashMap::new(),
            cadence: SnapshotCadence::from_rates(
                settings.simulation_tps,
                settings.serialization_rate,
            ),
            clock: SimClock::new(settings.simulation_tps),
            stats: SnapshotStats::default(),
            frames_dropped: 0,
            observer_sinks: None,
        }
    }

    /// Give every observer created from now on an animation sink
    pub fn with_observer_sinks(mut self, factory: SinkFactory) -> Self {
        self.observer_sinks = Some(factory);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Take authority over `spawn`, driving it from `device`.
    ///
    /// Fails if another peer already registered the entity.
    pub fn host(
        &mut self,
        spawn: EntitySpawn,
        device: Box<dyn InputDevice>,
        sink: Option<Box<dyn AnimationSink>>,
    ) -> Result<Uuid, SpawnError> {
        self.directory.register(self.id, spawn.clone())?;

        let body = FlatGroundBody::new(spawn.position, 0.0, spawn.movement.standing_height);
        let driver = AuthorityDriver::new(
            &spawn,
            self.settings.schema_version,
            device,
            Box::new(body),
            sink,
        );
        self.entities
            .insert(spawn.id, NetworkEntity::Authority(driver));
        // Observers learn about the spawn pose without waiting a full interval.
        self.cadence.force_next();

        info!(peer_id = %self.id, entity_id = %spawn.id, "Hosting entity");
        Ok(spawn.id)
    }

    pub fn entity(&self, id: &Uuid) -> Option<&NetworkEntity> {
        self.entities.get(id)
    }

    pub fn views(&self) -> Vec<EntityView> {
        let mut views: Vec<EntityView> = self.entities.values().map(|e| e.view()).collect();
        views.sort_by_key(|v| (!v.authority, v.id));
        views
    }

    pub fn report(&self) -> PeerReport {
        PeerReport {
            peer_id: self.id,
            ticks: self.clock.tick(),
            snapshots: self.stats,
            frames_dropped: self.frames_dropped,
            entities: self.views(),
        }
    }

    /// One full tick: inbound frames, simulation, outbound snapshots
    pub fn step(&mut self) {
        self.process_inbound();
        self.run_tick();
        if self.cadence.should_send() {
            self.broadcast_snapshots();
        }
        self.clock.advance();
    }

    /// Run the tick loop until `shutdown` flips to true or its sender drops
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> PeerReport {
        info!(peer_id = %self.id, entities = self.entities.len(), "Peer started");

        let tick_duration =
            Duration::from_micros(1_000_000 / self.settings.simulation_tps.max(1) as u64);
        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick_interval.tick() => self.step(),
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        let report = self.report();
        info!(
            peer_id = %self.id,
            ticks = report.ticks,
            snapshots = report.snapshots.total_snapshots,
            frames_dropped = report.frames_dropped,
            "Peer stopped"
        );
        report
    }

    /// Drain every frame the transport has buffered
    fn process_inbound(&mut self) {
        while let Some(bytes) = self.transport.try_recv() {
            self.route(bytes);
        }
    }

    fn route(&mut self, bytes: Bytes) {
        let frame = match Frame::decode(&bytes) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(peer_id = %self.id, error = %e, "Dropping undecodable frame");
                self.frames_dropped += 1;
                return;
            }
        };

        if !self.entities.contains_key(&frame.entity_id) && !self.spawn_observer(frame.entity_id) {
            return;
        }

        match self.entities.get(&frame.entity_id) {
            Some(NetworkEntity::Observer(proxy)) => {
                if let Err(e) = proxy.receive(&frame) {
                    warn!(
                        peer_id = %self.id,
                        entity_id = %frame.entity_id,
                        error = %e,
                        "Dropping snapshot, keeping previous state"
                    );
                    self.frames_dropped += 1;
                }
            }
            // Our own snapshots echoed back by the bus.
            Some(NetworkEntity::Authority(_)) | None => {}
        }
    }

    /// Instantiate an observer for a registered remote entity
    fn spawn_observer(&mut self, entity_id: Uuid) -> bool {
        let Some(entry) = self.directory.get(&entity_id) else {
            debug!(peer_id = %self.id, entity_id = %entity_id, "Frame for unknown entity");
            return false;
        };
        if entry.owner == self.id {
            return false;
        }

        let sink = self.observer_sinks.as_mut().map(|factory| factory(&entry.spawn));
        let proxy = ObserverProxy::new(
            &entry.spawn,
            self.settings.schema_version,
            serialization_interval(self.settings.serialization_rate),
            sink,
        );
        self.entities
            .insert(entity_id, NetworkEntity::Observer(proxy));

        info!(
            peer_id = %self.id,
            entity_id = %entity_id,
            owner = %entry.owner,
            variant = ?entry.spawn.variant,
            "Observing remote entity"
        );
        true
    }

    fn run_tick(&mut self) {
        for entity in self.entities.values_mut() {
            entity.tick(&self.clock);
        }
    }

    fn broadcast_snapshots(&mut self) {
        for entity in self.entities.values_mut() {
            if let NetworkEntity::Authority(driver) = entity {
                let bytes = driver.encode_frame();
                self.stats.record(bytes.len());
                self.transport.send(bytes);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MovementConfig;
    use crate::game::animation::AnimatorRecorder;
    use crate::game::input::{RawInput, ScriptedDevice};
    use crate::game::spawn::{Role, Spawner};
    use crate::game::Event;
    use crate::net::transport::bus;
    use crate::net::ChannelTransport;

    fn walk_forward(ticks: usize) -> Box<ScriptedDevice> {
        let walk = RawInput {
            vertical: 1.0,
            ..RawInput::default()
        };
        Box::new(ScriptedDevice::default().hold(walk, ticks))
    }

    fn pair() -> (Peer, Peer, Arc<EntityDirectory>, tokio::sync::broadcast::Sender<Bytes>) {
        let bus = bus();
        let directory = Arc::new(EntityDirectory::new());
        let a = Peer::new(
            Uuid::new_v4(),
            PeerSettings::default(),
            directory.clone(),
            Box::new(ChannelTransport::connect(&bus)),
        );
        let b = Peer::new(
            Uuid::new_v4(),
            PeerSettings::default(),
            directory.clone(),
            Box::new(ChannelTransport::connect(&bus)),
        );
        (a, b, directory, bus)
    }

    #[test]
    fn remote_peer_observes_hosted_entity() {
        let (mut a, mut b, _directory, _bus) = pair();
        let spawn = Spawner::new(Vec::new(), 3).spawn(Role::Civilian, MovementConfig::default());
        let id = a.host(spawn, walk_forward(60), None).unwrap();

        for _ in 0..180 {
            a.step();
            b.step();
        }

        let Some(NetworkEntity::Authority(driver)) = a.entity(&id) else {
            panic!("host lost authority");
        };
        let Some(NetworkEntity::Observer(proxy)) = b.entity(&id) else {
            panic!("observer not created");
        };
        let error = (proxy.displayed().position - driver.state().position).norm();
        assert!(error < 0.1, "error {error}");
        assert!(a.report().snapshots.total_snapshots >= 30);
    }

    #[test]
    fn host_never_observes_its_own_entity() {
        let (mut a, _b, _directory, _bus) = pair();
        let spawn = Spawner::new(Vec::new(), 3).spawn(Role::Police, MovementConfig::default());
        let id = a.host(spawn, walk_forward(10), None).unwrap();

        for _ in 0..30 {
            a.step();
        }
        assert!(a.entity(&id).unwrap().is_authority());
        assert_eq!(a.views().len(), 1);
    }

    #[test]
    fn second_host_for_same_entity_is_rejected() {
        let (mut a, mut b, _directory, _bus) = pair();
        let spawn = Spawner::new(Vec::new(), 3).spawn(Role::Thief, MovementConfig::default());
        a.host(spawn.clone(), walk_forward(0), None).unwrap();
        assert!(matches!(
            b.host(spawn, walk_forward(0), None),
            Err(SpawnError::AlreadyOwned { .. })
        ));
    }

    #[test]
    fn unregistered_and_garbage_frames_are_ignored() {
        let (_a, mut b, _directory, bus) = pair();
        let stray = Frame {
            entity_id: Uuid::new_v4(),
            version: 1,
            values: Vec::new(),
        };
        let _ = bus.send(stray.encode());
        let _ = bus.send(Bytes::from_static(&[0xde, 0xad]));

        b.step();

        assert!(b.views().is_empty());
        assert_eq!(b.report().frames_dropped, 1);
    }

    #[test]
    fn remote_attack_pulses_observer_animation() {
        let (mut a, b, _directory, _bus) = pair();
        let recorder = AnimatorRecorder::new();
        let handle = recorder.clone();
        let mut b = b.with_observer_sinks(Box::new(
            move |_: &EntitySpawn| -> Box<dyn AnimationSink> { Box::new(handle.clone()) },
        ));

        let attack = RawInput {
            attack_held: true,
            ..RawInput::default()
        };
        let spawn = Spawner::new(Vec::new(), 3).spawn(Role::Police, MovementConfig::default());
        a.host(spawn, Box::new(ScriptedDevice::new([attack])), None)
            .unwrap();

        for _ in 0..30 {
            a.step();
            b.step();
        }
        assert_eq!(recorder.pulses(Event::Attack), 1);
    }

    #[test]
    fn zeroed_rotation_is_dropped_and_previous_state_kept() {
        let (mut a, mut b, _directory, bus) = pair();
        let spawn = Spawner::new(Vec::new(), 3).spawn(Role::Civilian, MovementConfig::default());
        let id = a.host(spawn, walk_forward(0), None).unwrap();

        a.step();
        b.step();
        let before = b.entity(&id).unwrap().view().state;

        // Rotation payload follows the id/version/count header and the position value.
        let Some(NetworkEntity::Authority(driver)) = a.entities.get_mut(&id) else {
            panic!("host lost authority");
        };
        let mut bytes = driver.encode_frame().to_vec();
        bytes[33..49].fill(0);
        let _ = bus.send(Bytes::from(bytes));

        b.process_inbound();
        for _ in 0..60 {
            b.run_tick();
        }

        assert_eq!(b.report().frames_dropped, 1);
        let after = b.entity(&id).unwrap().view().state;
        assert!((after.rotation.coords.norm() - 1.0).abs() < 1e-5);
        assert!(after.rotation.angle_to(&before.rotation) < 1e-5);
    }
}

