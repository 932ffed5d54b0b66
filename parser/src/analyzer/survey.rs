use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, trace};

use crate::Error;
use crate::analyzer::Analyzer;
use crate::analyzer::decoder::{DecodedPacket, DecodedPacketPayload, DecodedPacketPayloadKind};
use crate::packet::{Direction, Packet, PacketKind};
use crate::segment::PacketBlock;

#[derive(Debug, Default, Clone, Serialize)]
pub struct SurveyStats {
    pub total_packets: usize,
    pub skipped_packets: usize,
    pub invalid_packets: usize,
    /// Packet counts keyed by `"{direction} {kind}"`.
    pub packet_kinds: BTreeMap<String, usize>,
    pub decoded: BTreeMap<String, usize>,
    /// Why packets were skipped or invalid, in log order.
    pub audits: Vec<String>,
}

impl SurveyStats {
    pub fn count(&self, direction: Direction, kind: PacketKind) -> usize {
        self.packet_kinds
            .get(&kind_key(direction, kind))
            .copied()
            .unwrap_or_default()
    }

    pub fn decoded_count(&self, kind: DecodedPacketPayloadKind) -> usize {
        self.decoded
            .get(&format!("{kind:?}"))
            .copied()
            .unwrap_or_default()
    }
}

fn kind_key(direction: Direction, kind: PacketKind) -> String {
    format!("{direction} {kind}")
}

/// Tallies what a log contains without tracking any entity state.
#[derive(Default)]
pub struct Survey {
    stats: SurveyStats,
}

impl Survey {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &SurveyStats {
        &self.stats
    }

    pub fn into_stats(self) -> SurveyStats {
        self.stats
    }
}

impl Analyzer for Survey {
    fn process(&mut self, packet: &Packet<'_, '_>) {
        let stats = &mut self.stats;
        stats.total_packets += 1;
        *stats
            .packet_kinds
            .entry(kind_key(packet.header.direction, packet.header.kind))
            .or_default() += 1;

        let decoded = DecodedPacket::from(packet);
        *stats
            .decoded
            .entry(format!("{:?}", decoded.payload.kind()))
            .or_default() += 1;
        if let DecodedPacketPayload::Invalid { reason } = decoded.payload {
            trace!("invalid {} at {}", decoded.kind, decoded.time);
            stats.invalid_packets += 1;
            stats.audits.push(format!("{} {}: {reason}", decoded.time, decoded.kind));
        }
    }

    fn skip(&mut self, block: &PacketBlock<'_>, error: &Error) {
        self.stats.skipped_packets += 1;
        self.stats
            .audits
            .push(format!("skipped {:?}: {error}", block.header()));
    }

    fn finish(&mut self) {
        debug!(
            "surveyed {} packets ({} skipped, {} invalid)",
            self.stats.total_packets, self.stats.skipped_packets, self.stats.invalid_packets
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::decoder::test_support::*;
    use crate::analyzer::process_log;

    #[test]
    fn counts_by_kind() {
        // Position flag set, but no row for the position itself.
        let mut truncated = [0u8; 12];
        truncated[0x0A] = 0x01;
        let log = [
            entity_update(1.0, 0x00123456, 0x1A, 0x01, 0, (1.0, 0.0, 1.0), None),
            entity_update(2.0, 0x00123456, 0x1A, 0x01, 0, (2.0, 0.0, 1.0), None),
            client_position(2.5, (0.0, 0.0, 0.0)),
            packet_text(3.0, "Incoming", 0x017, &[0u8; 8]),
            "[not a time] Incoming packet 0x00E: size 0x0\n".to_string(),
            packet_text(4.0, "Incoming", 0x00E, &truncated),
        ]
        .concat();

        let mut survey = Survey::new();
        process_log(&log, &mut survey);
        let stats = survey.into_stats();

        assert_eq!(stats.total_packets, 5);
        assert_eq!(stats.skipped_packets, 1);
        assert_eq!(stats.invalid_packets, 1);
        assert_eq!(stats.count(Direction::Incoming, PacketKind::ENTITY_UPDATE), 3);
        assert_eq!(stats.count(Direction::Outgoing, PacketKind::CLIENT_POSITION), 1);
        assert_eq!(stats.count(Direction::Incoming, PacketKind(0x017)), 1);
        assert_eq!(stats.count(Direction::Outgoing, PacketKind::ENTITY_UPDATE), 0);
        assert_eq!(stats.decoded_count(DecodedPacketPayloadKind::EntityUpdate), 2);
        assert_eq!(stats.decoded_count(DecodedPacketPayloadKind::Unknown), 1);
        assert_eq!(stats.decoded_count(DecodedPacketPayloadKind::Widescan), 0);
        assert_eq!(stats.audits.len(), 2);
        assert!(stats.packet_kinds.contains_key("Incoming 0x00E"));
    }
}
