use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use variantly::Variantly;

/// Server-assigned entity identifier. Bits 12..21 carry the zone the entity belongs to.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EntityId(pub u32);

impl EntityId {
    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn zone(self) -> ZoneId {
        ZoneId(((self.0 >> 12) & 0x1FF) as u16)
    }

    /// Manufactures an id in the unknown-id band for an entity that was only seen by
    /// index, e.g. through widescan.
    pub fn synthetic(zone: ZoneId, index: EntityIndex) -> EntityId {
        EntityId(((0x1000 + zone.raw() as u32) << 12) + index.raw() as u32)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for EntityId {
    fn from(v: u32) -> Self {
        EntityId(v)
    }
}

/// Zone (map) identifier. Zone 0 is reserved for entities that can't be attributed.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ZoneId(pub u16);

impl ZoneId {
    pub const UNKNOWN: ZoneId = ZoneId(0);

    pub fn raw(self) -> u16 {
        self.0
    }

    pub fn is_known(self) -> bool {
        self != Self::UNKNOWN
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-zone slot number. Slots are reused by different entities over time.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EntityIndex(pub u16);

impl EntityIndex {
    pub fn raw(self) -> u16 {
        self.0
    }
}

impl fmt::Display for EntityIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:03X}", self.0)
    }
}

/// Stable identity of an entity within one log: its slot index plus its id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityKey(String);

impl EntityKey {
    pub fn new(index: EntityIndex, id: EntityId) -> Self {
        EntityKey(format!("{index}-{id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The entity id half of the key.
    pub fn entity_id(&self) -> Option<EntityId> {
        let (_, id) = self.0.split_once('-')?;
        id.parse().ok().map(EntityId)
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityKey {
    fn from(v: &str) -> Self {
        EntityKey(v.to_string())
    }
}

/// Wall clock time of a packet, in milliseconds since the Unix epoch.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn millis(self) -> i64 {
        self.0
    }

    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.format("%H:%M:%S")),
            None => write!(f, "{}ms", self.0),
        }
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(v: DateTime<Utc>) -> Self {
        Timestamp(v.timestamp_millis())
    }
}

impl std::ops::Add<i64> for Timestamp {
    type Output = Timestamp;
    fn add(self, rhs: i64) -> Timestamp {
        Timestamp(self.0 + rhs)
    }
}

impl std::ops::Sub for Timestamp {
    type Output = i64;
    fn sub(self, rhs: Timestamp) -> i64 {
        self.0 - rhs.0
    }
}

/// World-space position. Y is height.
///
/// Rotation is an 8-bit angle where 256 is a full turn. Only entity position updates
/// carry it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<u8>,
}

impl Position {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Position {
            x,
            y,
            z,
            rotation: None,
        }
    }

    pub fn with_rotation(self, rotation: u8) -> Self {
        Position {
            rotation: Some(rotation),
            ..self
        }
    }

    pub fn distance_squared(&self, other: &Position) -> f32 {
        (self.x - other.x).powi(2) + (self.y - other.y).powi(2) + (self.z - other.z).powi(2)
    }

    /// Distance on the ground plane, ignoring height.
    pub fn planar_distance(&self, other: &Position) -> f32 {
        ((self.x - other.x).powi(2) + (self.z - other.z).powi(2)).sqrt()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1}, {:.1})", self.x, self.y, self.z)
    }
}

/// An entity (or the client) observed at a position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionUpdate {
    pub time: Timestamp,
    pub pos: Position,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// One entry of an entity's history. Lists are in log order, so `time` never decreases.
#[derive(Debug, Clone, PartialEq, Serialize, Variantly)]
#[serde(tag = "kind", content = "update")]
pub enum EntityUpdate {
    /// Observed position.
    Position(PositionUpdate),
    /// Position located by widescan, relative to the client at that time.
    Widescan(PositionUpdate),
    /// The entity left observable range, ending a tracked segment.
    OutOfRange(Timestamp),
    /// The entity was removed from the world.
    Despawn(Timestamp),
}

impl EntityUpdate {
    pub fn time(&self) -> Timestamp {
        match self {
            EntityUpdate::Position(update) | EntityUpdate::Widescan(update) => update.time,
            EntityUpdate::OutOfRange(time) | EntityUpdate::Despawn(time) => *time,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            EntityUpdate::Position(update) | EntityUpdate::Widescan(update) => update.name.as_deref(),
            EntityUpdate::OutOfRange(_) | EntityUpdate::Despawn(_) => None,
        }
    }
}

pub type EntityUpdates = BTreeMap<EntityKey, Vec<EntityUpdate>>;

pub type ZoneEntityUpdates = BTreeMap<ZoneId, EntityUpdates>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_from_entity_id() {
        assert_eq!(EntityId(0x00123456).zone(), ZoneId(0x123));
        assert_eq!(EntityId(0x00000456).zone(), ZoneId::UNKNOWN);
        assert_eq!(EntityId(0x01FFF000).zone(), ZoneId(0x1FF));
    }

    #[test]
    fn synthetic_id_keeps_zone() {
        let id = EntityId::synthetic(ZoneId(230), EntityIndex(0x42));
        assert_eq!(id.raw(), ((0x1000 + 230) << 12) + 0x42);
        assert_eq!(id.zone(), ZoneId(230));
    }

    #[test]
    fn entity_key_format() {
        let key = EntityKey::new(EntityIndex(0x1A), EntityId(0x00123456));
        assert_eq!(key.as_str(), "0x01A-1193046");
        assert_eq!(key.entity_id(), Some(EntityId(0x00123456)));
    }

    #[test]
    fn distances() {
        let a = Position::new(0.0, 10.0, 0.0);
        let b = Position::new(3.0, 0.0, 4.0);
        assert_eq!(a.planar_distance(&b), 5.0);
        assert_eq!(a.distance_squared(&b), 125.0);
    }
}
