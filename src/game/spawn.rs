//! Spawning and the shared entity directory

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use nalgebra::{UnitQuaternion, Vector3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{MovementConfig, Variant};

/// Player role assigned in the lobby
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    Police,
    Thief,
    #[default]
    Civilian,
}

impl Role {
    /// Parse a lobby role name; anything unrecognized plays as a civilian
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "police" => Role::Police,
            "thief" => Role::Thief,
            "civilian" | "civi" => Role::Civilian,
            other => {
                debug!(role = other, "Unknown role, spawning as civilian");
                Role::Civilian
            }
        }
    }

    pub fn variant(self) -> Variant {
        match self {
            Role::Police => Variant::Police,
            Role::Thief => Variant::Thief,
            Role::Civilian => Variant::Generic,
        }
    }
}

/// Everything needed to instantiate one networked entity on any peer
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySpawn {
    pub id: Uuid,
    pub variant: Variant,
    pub movement: MovementConfig,
    pub position: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
}

/// Spawn point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnPoint {
    pub position: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
}

/// Host-side spawner: role to variant, random spawn point
pub struct Spawner {
    points: Vec<SpawnPoint>,
    rng: ChaCha8Rng,
}

impl Spawner {
    pub fn new(points: Vec<SpawnPoint>, seed: u64) -> Self {
        Self {
            points,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Evenly spaced points on a circle, facing the center
    pub fn ring(count: usize, radius: f32, seed: u64) -> Self {
        let points = (0..count)
            .map(|i| {
                let angle = i as f32 / count.max(1) as f32 * std::f32::consts::TAU;
                let position = Vector3::new(angle.cos() * radius, 0.0, angle.sin() * radius);
                let facing = -position;
                let yaw = facing.x.atan2(facing.z);
                SpawnPoint {
                    position,
                    rotation: UnitQuaternion::from_axis_angle(&Vector3::y_axis(), yaw),
                }
            })
            .collect();
        Self::new(points, seed)
    }

    /// Create the spawn description for a player of `role`
    pub fn spawn(&mut self, role: Role, movement: MovementConfig) -> EntitySpawn {
        let point = if self.points.is_empty() {
            SpawnPoint {
                position: Vector3::zeros(),
                rotation: UnitQuaternion::identity(),
            }
        } else {
            self.points[self.rng.gen_range(0..self.points.len())]
        };

        EntitySpawn {
            id: Uuid::new_v4(),
            variant: role.variant(),
            movement,
            position: point.position,
            rotation: point.rotation,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpawnError {
    #[error("entity {entity_id} already owned by peer {owner}")]
    AlreadyOwned { entity_id: Uuid, owner: Uuid },
}

/// Directory record: who holds authority and how to build an observer
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryEntry {
    pub owner: Uuid,
    pub spawn: EntitySpawn,
}

/// Shared registry of every spawned entity
pub struct EntityDirectory {
    entries: DashMap<Uuid, DirectoryEntry>,
}

impl EntityDirectory {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Record `owner` as the single authority for `spawn`
    pub fn register(&self, owner: Uuid, spawn: EntitySpawn) -> Result<(), SpawnError> {
        match self.entries.entry(spawn.id) {
            Entry::Occupied(existing) => Err(SpawnError::AlreadyOwned {
                entity_id: spawn.id,
                owner: existing.get().owner,
            }),
            Entry::Vacant(slot) => {
                info!(
                    entity_id = %spawn.id,
                    owner = %owner,
                    variant = ?spawn.variant,
                    "Entity registered"
                );
                slot.insert(DirectoryEntry { owner, spawn });
                Ok(())
            }
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<DirectoryEntry> {
        self.entries.get(id).map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn owned_by(&self, owner: &Uuid) -> Vec<Uuid> {
        self.entries
            .iter()
            .filter(|e| e.value().owner == *owner)
            .map(|e| *e.key())
            .collect()
    }
}

impl Default for EntityDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_map_to_variants() {
        assert_eq!(Role::from_name("Police").variant(), Variant::Police);
        assert_eq!(Role::from_name(" thief ").variant(), Variant::Thief);
        assert_eq!(Role::from_name("civi").variant(), Variant::Generic);
        assert_eq!(Role::from_name("pirate"), Role::Civilian);
        assert_eq!(Role::default(), Role::Civilian);
    }

    #[test]
    fn spawner_uses_origin_without_points() {
        let mut spawner = Spawner::new(Vec::new(), 1);
        let spawn = spawner.spawn(Role::Thief, MovementConfig::default());
        assert_eq!(spawn.position, Vector3::zeros());
        assert_eq!(spawn.variant, Variant::Thief);
    }

    #[test]
    fn spawner_picks_configured_points_deterministically() {
        let mut a = Spawner::ring(4, 10.0, 9);
        let mut b = Spawner::ring(4, 10.0, 9);
        for _ in 0..8 {
            let sa = a.spawn(Role::Police, MovementConfig::default());
            let sb = b.spawn(Role::Police, MovementConfig::default());
            assert_eq!(sa.position, sb.position);
            assert!((sa.position.norm() - 10.0).abs() < 1e-4);
            assert_ne!(sa.id, sb.id);
        }
    }

    #[test]
    fn ring_points_face_the_center() {
        let spawner = Spawner::ring(3, 5.0, 0);
        for point in &spawner.points {
            let forward = point.rotation * Vector3::z();
            let inward = -point.position.normalize();
            assert!((forward - inward).norm() < 1e-4);
        }
    }

    #[test]
    fn directory_rejects_second_authority() {
        let directory = EntityDirectory::new();
        let spawn = Spawner::new(Vec::new(), 0).spawn(Role::Civilian, MovementConfig::default());
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        directory.register(first, spawn.clone()).unwrap();
        assert_eq!(
            directory.register(second, spawn.clone()),
            Err(SpawnError::AlreadyOwned {
                entity_id: spawn.id,
                owner: first
            })
        );
        assert_eq!(directory.get(&spawn.id).unwrap().owner, first);
        assert_eq!(directory.owned_by(&first), vec![spawn.id]);
        assert!(directory.owned_by(&second).is_empty());

        assert_eq!(directory.len(), 1);
        assert!(!directory.is_empty());
    }
}
