use std::io::Write;

use tracing::warn;

use crate::analyzer::Analyzer;
use crate::analyzer::decoder::DecodedPacket;
use crate::packet::Packet;

/// Writes every decoded packet as one line of JSON.
pub struct PacketDump<W: Write> {
    output: W,
    written: usize,
}

impl<W: Write> PacketDump<W> {
    pub fn new(output: W) -> Self {
        Self { output, written: 0 }
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.output
    }
}

impl<W: Write> Analyzer for PacketDump<W> {
    fn process(&mut self, packet: &Packet<'_, '_>) {
        let decoded = DecodedPacket::from(packet);
        let result = serde_json::to_writer(&mut self.output, &decoded)
            .map_err(std::io::Error::from)
            .and_then(|_| self.output.write_all(b"\n"));
        match result {
            Ok(()) => self.written += 1,
            Err(e) => warn!("failed to write packet {} at {}: {e}", decoded.kind, decoded.time),
        }
    }

    fn finish(&mut self) {
        if let Err(e) = self.output.flush() {
            warn!("failed to flush packet dump: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::decoder::test_support::*;
    use crate::analyzer::process_log;

    #[test]
    fn one_json_line_per_packet() {
        let log = [
            entity_update(1.0, 0x00123456, 0x1A, 0x09, 0x40, (1.0, 2.0, 3.0), Some("Goblin")),
            client_position(2.0, (4.0, 5.0, 6.0)),
            packet_text(3.0, "Incoming", 0x017, &[0u8; 4]),
        ]
        .concat();

        let mut dump = PacketDump::new(Vec::new());
        process_log(&log, &mut dump);
        assert_eq!(dump.written(), 3);

        let text = String::from_utf8(dump.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);

        assert_eq!(lines[0]["direction"], "Incoming");
        assert_eq!(lines[0]["kind"], 0x00E);
        assert_eq!(lines[0]["payload"]["type"], "EntityUpdate");
        assert_eq!(lines[0]["payload"]["body"]["name"], "Goblin");
        assert_eq!(lines[0]["payload"]["body"]["pos"]["rotation"], 0x40);
        assert_eq!(lines[1]["payload"]["type"], "ClientPosition");
        assert_eq!(lines[1]["payload"]["pos"]["z"], 6.0);
        assert_eq!(lines[2]["payload"]["type"], "Unknown");
    }
}
