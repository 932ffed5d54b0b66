use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use nom::bytes::complete::{tag, tag_no_case, take_until};
use nom::character::complete::{alpha1, char, hex_digit1, space1};
use nom::combinator::map_res;
use nom::sequence::{delimited, tuple};
use serde::Serialize;
use strum_macros::{Display, EnumString};

use crate::hexdump::HexDump;
use crate::segment::PacketBlock;
use crate::types::Timestamp;
use crate::{Error, IResult, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, EnumString, Display)]
pub enum Direction {
    /// Server to client
    Incoming,
    /// Client to server
    Outgoing,
}

/// Packet type id as printed in the log header, e.g. `0x00E`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PacketKind(pub u16);

impl PacketKind {
    pub const ENTITY_UPDATE: PacketKind = PacketKind(0x00E);
    pub const WIDESCAN_RESULT: PacketKind = PacketKind(0x0F4);
    pub const CLIENT_POSITION: PacketKind = PacketKind(0x015);
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:03X}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PacketHeader {
    pub time: Timestamp,
    pub direction: Direction,
    pub kind: PacketKind,
}

/// A packet block whose header line has been parsed.
#[derive(Debug, Clone, Copy)]
pub struct Packet<'block, 'log> {
    pub header: PacketHeader,
    pub block: &'block PacketBlock<'log>,
}

impl<'block, 'log> Packet<'block, 'log> {
    pub fn parse(block: &'block PacketBlock<'log>) -> Result<Self> {
        let header = PacketHeader::parse(block.header())?;
        Ok(Packet { header, block })
    }

    pub fn payload(&self) -> HexDump<'block> {
        HexDump::new(self.block.lines())
    }

    pub fn is(&self, direction: Direction, kind: PacketKind) -> bool {
        self.header.direction == direction && self.header.kind == kind
    }
}

impl PacketHeader {
    /// Parses `[<timestamp>] <Incoming|Outgoing> packet 0x<kind> ...`.
    pub fn parse(line: &str) -> Result<Self> {
        let (_, (timestamp, direction, kind)) =
            header_line(line).map_err(|_| Error::MalformedHeader(line.to_string()))?;
        let time = parse_timestamp(timestamp)
            .ok_or_else(|| Error::InvalidTimestamp(timestamp.to_string()))?;
        Ok(PacketHeader {
            time,
            direction,
            kind,
        })
    }
}

fn header_line(i: &str) -> IResult<&str, (&str, Direction, PacketKind)> {
    let (i, timestamp) = delimited(char('['), take_until("]"), char(']'))(i)?;
    let (i, _) = space1(i)?;
    let (i, direction) = map_res(alpha1, Direction::from_str)(i)?;
    let (i, _) = tuple((space1, tag("packet"), space1, tag_no_case("0x")))(i)?;
    let (i, kind) = map_res(hex_digit1, |digits| u16::from_str_radix(digits, 16))(i)?;
    Ok((i, (timestamp, direction, PacketKind(kind))))
}

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
];

/// Parses a log timestamp. Times without an offset are taken as UTC.
pub fn parse_timestamp(text: &str) -> Option<Timestamp> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc).into());
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| naive.and_utc().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header() {
        let header = PacketHeader::parse("[2023-05-04 18:21:03] Incoming packet 0x00E: size 0x5C").unwrap();
        assert_eq!(header.direction, Direction::Incoming);
        assert_eq!(header.kind, PacketKind::ENTITY_UPDATE);
        assert_eq!(header.time, Timestamp(1_683_224_463_000));

        let header = PacketHeader::parse("[2023-05-04 18:21:03.250] Outgoing packet 0x015").unwrap();
        assert_eq!(header.direction, Direction::Outgoing);
        assert_eq!(header.kind, PacketKind::CLIENT_POSITION);
        assert_eq!(header.time, Timestamp(1_683_224_463_250));
    }

    #[test]
    fn timestamp_forms() {
        let expected = Some(Timestamp(1_683_224_463_000));
        assert_eq!(parse_timestamp("2023-05-04T18:21:03"), expected);
        assert_eq!(parse_timestamp("2023/05/04 18:21:03"), expected);
        assert_eq!(parse_timestamp("2023-05-04T20:21:03+02:00"), expected);
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn rejects_bad_headers() {
        assert!(matches!(
            PacketHeader::parse("[2023-05-04 18:21:03] Sideways packet 0x00E"),
            Err(Error::MalformedHeader(_))
        ));
        assert!(matches!(
            PacketHeader::parse("[not a time] Incoming packet 0x00E"),
            Err(Error::InvalidTimestamp(_))
        ));
        assert!(matches!(
            PacketHeader::parse("[2023-05-04 18:21:03"),
            Err(Error::MalformedHeader(_))
        ));
    }

    #[test]
    fn kind_display() {
        assert_eq!(PacketKind::WIDESCAN_RESULT.to_string(), "0x0F4");
        assert_eq!(Direction::Outgoing.to_string(), "Outgoing");
    }
}
