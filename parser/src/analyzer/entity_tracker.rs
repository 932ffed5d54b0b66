use std::collections::HashMap;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use tracing::{Level, debug, span, trace, warn};

use crate::analyzer::decoder::{
    ClientPositionPacket, DecodedPacket, DecodedPacketPayload, EntityUpdateBody,
    EntityUpdatePacket, WidescanPacket,
};
use crate::analyzer::{Analyzer, process_log};
use crate::packet::Packet;
use crate::segment::PacketBlock;
use crate::types::{
    EntityId, EntityKey, EntityUpdate, Position, PositionUpdate, Timestamp, ZoneEntityUpdates,
    ZoneId,
};
use crate::{Error, Result};

/// Thresholds used while following entities through a log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(default)]
#[serde(default)]
pub struct TrackerConfig {
    /// Entities further than this from the client are out of range.
    pub range_distance: f32,
    /// Delay between an entity's last sighting and the moment it's considered lost,
    /// when the client moving away is what puts it out of range.
    pub range_loss_lag_ms: i64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            range_distance: 50.0,
            range_loss_lag_ms: 1000,
        }
    }
}

/// Counters describing how much of a log was usable.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ParseStats {
    /// Blocks with a readable header.
    pub packets: usize,
    /// Blocks whose header or timestamp could not be read.
    pub skipped: usize,
    /// Packets too short for their fields.
    pub invalid: usize,
    /// Packet kinds without a handler.
    pub ignored: usize,
    /// Packets that could not be attributed to a zone or a client position.
    pub dropped: usize,
}

/// Everything recovered from a packet log.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ParsedLog {
    pub zone_entity_updates: ZoneEntityUpdates,
    pub client_updates: Vec<PositionUpdate>,
    pub stats: ParseStats,
}

/// One row of the entity listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySummary {
    pub zone_id: ZoneId,
    pub key: EntityKey,
    pub entity_id: Option<EntityId>,
    /// First non-empty name seen for the entity.
    pub name: Option<String>,
    pub position_count: usize,
}

impl ParsedLog {
    /// Update history of one entity, whatever zone it was seen in.
    pub fn updates(&self, key: &EntityKey) -> Option<&[EntityUpdate]> {
        self.zone_entity_updates
            .values()
            .find_map(|entities| entities.get(key))
            .map(Vec::as_slice)
    }

    /// All entities, most observed positions first.
    pub fn entities(&self) -> Vec<EntitySummary> {
        let mut entities: Vec<EntitySummary> = self
            .zone_entity_updates
            .iter()
            .flat_map(|(zone_id, entities)| {
                entities.iter().map(|(key, updates)| EntitySummary {
                    zone_id: *zone_id,
                    key: key.clone(),
                    entity_id: key.entity_id(),
                    name: updates.iter().find_map(EntityUpdate::name).map(str::to_string),
                    position_count: updates.iter().filter(|u| u.is_position()).count(),
                })
            })
            .collect();
        entities.sort_by(|a, b| b.position_count.cmp(&a.position_count));
        entities
    }
}

/// Last sighting of an entity currently considered in range.
#[derive(Debug, Clone, Copy)]
struct ShownEntity {
    zone: ZoneId,
    time: Timestamp,
    pos: Position,
}

/// Session state carried from packet to packet. Owned by one tracker only.
#[derive(Debug, Default)]
struct SessionState {
    last_client_position: Option<Position>,
    /// Zone of the most recent attributable entity update. Widescan results carry
    /// no zone of their own.
    current_zone: ZoneId,
    shown: HashMap<EntityKey, ShownEntity>,
}

/// Single-pass, stateful reconstruction of per-entity update streams from a
/// packet log. Packets must be fed in log order.
pub struct EntityTracker {
    config: TrackerConfig,
    state: SessionState,
    output: ParsedLog,
}

impl EntityTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            state: SessionState::default(),
            output: ParsedLog::default(),
        }
    }

    pub fn into_parsed(self) -> ParsedLog {
        self.output
    }

    fn updates_mut(&mut self, zone: ZoneId, key: EntityKey) -> &mut Vec<EntityUpdate> {
        self.output
            .zone_entity_updates
            .entry(zone)
            .or_default()
            .entry(key)
            .or_default()
    }

    fn is_out_of_range(&self, pos: &Position) -> bool {
        match &self.state.last_client_position {
            Some(client) => client.distance_squared(pos) > self.config.range_distance.powi(2),
            None => false,
        }
    }

    fn handle_entity_update(&mut self, time: Timestamp, update: EntityUpdatePacket) {
        let zone = update.entity_id.zone();
        if !zone.is_known() {
            trace!("dropping entity {} without a zone", update.entity_id);
            self.output.stats.dropped += 1;
            return;
        }
        self.state.current_zone = zone;

        let key = EntityKey::new(update.index, update.entity_id);
        match update.body {
            EntityUpdateBody::Despawn => {
                self.state.shown.remove(&key);
                self.updates_mut(zone, key).push(EntityUpdate::Despawn(time));
            }
            EntityUpdateBody::Refresh => {
                if let Some(shown) = self.state.shown.get_mut(&key) {
                    shown.time = time;
                }
            }
            EntityUpdateBody::Position { pos, name } => {
                let out_of_range = self.is_out_of_range(&pos);
                let updates = self.updates_mut(zone, key.clone());
                updates.push(EntityUpdate::Position(PositionUpdate { time, pos, name }));
                if out_of_range {
                    updates.push(EntityUpdate::OutOfRange(time));
                    self.state.shown.remove(&key);
                } else {
                    self.state.shown.insert(key, ShownEntity { zone, time, pos });
                }
            }
        }
    }

    fn handle_widescan(&mut self, time: Timestamp, scan: WidescanPacket) {
        let zone = self.state.current_zone;
        let Some(client) = self.state.last_client_position else {
            trace!("dropping widescan result before any client position");
            self.output.stats.dropped += 1;
            return;
        };
        if !zone.is_known() {
            trace!("dropping widescan result before any zone");
            self.output.stats.dropped += 1;
            return;
        }

        let entity_id = EntityId::synthetic(zone, scan.index);
        let pos = Position::new(
            client.x + f32::from(scan.x_offset),
            client.y,
            client.z + f32::from(scan.z_offset),
        );
        self.updates_mut(zone, EntityKey::new(scan.index, entity_id))
            .push(EntityUpdate::Widescan(PositionUpdate {
                time,
                pos,
                name: scan.name,
            }));
    }

    /// Recorded whether or not a zone is known yet, so range checks work from the
    /// very first client packet.
    fn handle_client_position(&mut self, time: Timestamp, client: ClientPositionPacket) {
        let client_pos = client.pos;
        self.state.last_client_position = Some(client_pos);
        self.output.client_updates.push(PositionUpdate {
            time,
            pos: client_pos,
            name: None,
        });

        // The client moving away is enough to lose sight of an entity.
        let max_distance_squared = self.config.range_distance.powi(2);
        let lag = self.config.range_loss_lag_ms;
        let zones = &mut self.output.zone_entity_updates;
        self.state.shown.retain(|key, shown| {
            if client_pos.distance_squared(&shown.pos) <= max_distance_squared {
                return true;
            }
            trace!("{key} left range of the client");
            zones
                .entry(shown.zone)
                .or_default()
                .entry(key.clone())
                .or_default()
                .push(EntityUpdate::OutOfRange(shown.time + lag));
            false
        });
    }
}

impl Default for EntityTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

impl Analyzer for EntityTracker {
    fn process(&mut self, packet: &Packet<'_, '_>) {
        let span = span!(Level::TRACE, "packet processing");
        let _enter = span.enter();

        self.output.stats.packets += 1;
        let decoded = DecodedPacket::from(packet);
        let time = decoded.time;
        match decoded.payload {
            DecodedPacketPayload::EntityUpdate(update) => self.handle_entity_update(time, update),
            DecodedPacketPayload::Widescan(scan) => self.handle_widescan(time, scan),
            DecodedPacketPayload::ClientPosition(client) => {
                self.handle_client_position(time, client)
            }
            DecodedPacketPayload::Unknown => self.output.stats.ignored += 1,
            DecodedPacketPayload::Invalid { reason } => {
                warn!("invalid packet {} at {}: {reason}", decoded.kind, decoded.time);
                self.output.stats.invalid += 1;
            }
        }
    }

    fn skip(&mut self, _block: &PacketBlock<'_>, _error: &Error) {
        self.output.stats.skipped += 1;
    }

    fn finish(&mut self) {
        debug!(
            "parsed {} packets into {} zones and {} client updates ({:?})",
            self.output.stats.packets,
            self.output.zone_entity_updates.len(),
            self.output.client_updates.len(),
            self.output.stats
        );
    }
}

/// Parses a packet log with the default thresholds.
pub fn parse_log(content: &str) -> ParsedLog {
    parse_log_with(content, &TrackerConfig::default())
}

pub fn parse_log_with(content: &str, config: &TrackerConfig) -> ParsedLog {
    let mut tracker = EntityTracker::new(config.clone());
    process_log(content, &mut tracker);
    tracker.into_parsed()
}

/// Parses a packet log given as raw bytes, which must be UTF-8 text.
pub fn parse_log_bytes(content: &[u8]) -> Result<ParsedLog> {
    let content = std::str::from_utf8(content)?;
    Ok(parse_log(content))
}
