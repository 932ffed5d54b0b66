use std::iter::Peekable;
use std::str::Lines;

/// Lines of a single packet: its header line followed by the descriptive and hex
/// dump lines up to the next packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketBlock<'a> {
    lines: Vec<&'a str>,
}

impl<'a> PacketBlock<'a> {
    pub fn header(&self) -> &'a str {
        self.lines[0]
    }

    pub fn lines(&self) -> &[&'a str] {
        &self.lines
    }
}

fn is_packet_start(line: &str) -> bool {
    line.starts_with('[')
}

/// Splits a packet log into [`PacketBlock`]s. A block starts at every line beginning
/// with `[`; lines before the first such line belong to no packet and are skipped.
pub struct PacketBlocks<'a> {
    lines: Peekable<Lines<'a>>,
}

impl<'a> PacketBlocks<'a> {
    pub fn new(content: &'a str) -> Self {
        Self {
            lines: content.lines().peekable(),
        }
    }
}

impl<'a> Iterator for PacketBlocks<'a> {
    type Item = PacketBlock<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let header = loop {
            let line = self.lines.next()?;
            if is_packet_start(line) {
                break line;
            }
        };

        let mut lines = vec![header];
        while let Some(line) = self.lines.next_if(|line| !is_packet_start(line)) {
            lines.push(line);
        }
        Some(PacketBlock { lines })
    }
}
