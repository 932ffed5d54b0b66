use tracing::{Level, span, warn};

use crate::Error;
use crate::packet::Packet;
use crate::segment::{PacketBlock, PacketBlocks};

pub trait Analyzer {
    fn process(&mut self, packet: &Packet<'_, '_>);

    /// Called for blocks whose header could not be read. They never reach `process`.
    fn skip(&mut self, _block: &PacketBlock<'_>, _error: &Error) {}

    fn finish(&mut self);
}

/// Feeds every packet of `content` to `analyzer` in log order, then finishes it.
pub fn process_log(content: &str, analyzer: &mut dyn Analyzer) {
    let span = span!(Level::DEBUG, "process_log", bytes = content.len());
    let _enter = span.enter();

    for block in PacketBlocks::new(content) {
        match Packet::parse(&block) {
            Ok(packet) => analyzer.process(&packet),
            Err(e) => {
                warn!("skipping packet: {e}");
                analyzer.skip(&block, &e);
            }
        }
    }
    analyzer.finish();
}
