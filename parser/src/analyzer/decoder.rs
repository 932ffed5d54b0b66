use kinded::Kinded;
use serde::Serialize;

use crate::hexdump::HexDump;
use crate::packet::{Direction, Packet, PacketKind};
use crate::types::{EntityId, EntityIndex, Position, Timestamp};
use crate::Result;

#[allow(dead_code)]
mod update_mask {
    use modular_bitfield::prelude::*;

    /// Flags byte of an entity update describing which fields follow.
    #[bitfield]
    #[derive(Debug, Clone, Copy)]
    pub struct UpdateMask {
        pub has_position: bool,
        #[skip]
        __: B2,
        pub has_name: bool,
        #[skip]
        __: B1,
        pub despawn: bool,
        #[skip]
        __: B2,
    }
}
pub use update_mask::UpdateMask;

/// What an entity update says about the entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum EntityUpdateBody {
    /// The entity was removed from the world. No other fields are read.
    Despawn,
    /// Liveness refresh without a position.
    Refresh,
    Position {
        pos: Position,
        name: Option<String>,
    },
}

/// Incoming 0x00E.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityUpdatePacket {
    pub entity_id: EntityId,
    pub index: EntityIndex,
    pub update_mask: u8,
    pub body: EntityUpdateBody,
}

/// Incoming 0x0F4. Offsets are relative to the client's position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WidescanPacket {
    pub index: EntityIndex,
    pub x_offset: i16,
    pub z_offset: i16,
    pub name: Option<String>,
}

/// Outgoing 0x015.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientPositionPacket {
    pub pos: Position,
    pub target_index: EntityIndex,
}

#[derive(Debug, Clone, PartialEq, Serialize, Kinded)]
#[kinded(derive(Serialize))]
#[serde(tag = "type")]
pub enum DecodedPacketPayload {
    /// An entity moved, despawned or refreshed.
    EntityUpdate(EntityUpdatePacket),
    /// An entity located by widescan.
    Widescan(WidescanPacket),
    /// The client reporting its own position.
    ClientPosition(ClientPositionPacket),
    /// A packet kind nothing here decodes.
    Unknown,
    /// The packet was too short for its fields.
    Invalid { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct DecodedPacket {
    pub time: Timestamp,
    pub direction: Direction,
    pub kind: PacketKind,
    pub payload: DecodedPacketPayload,
}

impl DecodedPacket {
    pub fn from(packet: &Packet<'_, '_>) -> Self {
        let header = packet.header;
        let hex = packet.payload();
        let decoded = match (header.direction, header.kind) {
            (Direction::Incoming, PacketKind::ENTITY_UPDATE) => {
                decode_entity_update(&hex).map(DecodedPacketPayload::EntityUpdate)
            }
            (Direction::Incoming, PacketKind::WIDESCAN_RESULT) => {
                decode_widescan(&hex).map(DecodedPacketPayload::Widescan)
            }
            (Direction::Outgoing, PacketKind::CLIENT_POSITION) => {
                decode_client_position(&hex).map(DecodedPacketPayload::ClientPosition)
            }
            _ => Ok(DecodedPacketPayload::Unknown),
        };

        DecodedPacket {
            time: header.time,
            direction: header.direction,
            kind: header.kind,
            payload: decoded.unwrap_or_else(|e| DecodedPacketPayload::Invalid {
                reason: e.to_string(),
            }),
        }
    }
}

fn non_empty(name: String) -> Option<String> {
    if name.is_empty() { None } else { Some(name) }
}

fn decode_entity_update(hex: &HexDump<'_>) -> Result<EntityUpdatePacket> {
    let entity_id = EntityId(hex.u32(0x04)?);
    let index = EntityIndex(hex.u16(0x08)?);
    let update_mask = hex.u8(0x0A)?;
    let mask = UpdateMask::from_bytes([update_mask]);

    let body = if mask.despawn() {
        EntityUpdateBody::Despawn
    } else if !mask.has_position() {
        EntityUpdateBody::Refresh
    } else {
        let name = if mask.has_name() {
            non_empty(hex.cstring(0x34)?)
        } else {
            None
        };
        let rotation = hex.u8(0x0B)?;
        let pos = hex.position(0x0C)?.with_rotation(rotation);
        EntityUpdateBody::Position { pos, name }
    };

    Ok(EntityUpdatePacket {
        entity_id,
        index,
        update_mask,
        body,
    })
}

fn decode_widescan(hex: &HexDump<'_>) -> Result<WidescanPacket> {
    Ok(WidescanPacket {
        index: EntityIndex(hex.u16(0x04)?),
        x_offset: hex.i16(0x08)?,
        z_offset: hex.i16(0x0A)?,
        name: non_empty(hex.cstring(0x0C)?),
    })
}

fn decode_client_position(hex: &HexDump<'_>) -> Result<ClientPositionPacket> {
    Ok(ClientPositionPacket {
        pos: hex.position(0x04)?,
        target_index: EntityIndex(hex.u16(0x16)?),
    })
}
