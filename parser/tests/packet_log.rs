use xi_packet_paths::types::{EntityId, EntityIndex, EntityKey, EntityUpdate, Position, Timestamp};
use xi_packet_paths::{PathPart, PathStats, parse_log, parse_path};

/// 2023-05-04 18:21:00 UTC
const BASE_MILLIS: i64 = 1_683_224_460_000;

const GOBLIN_ID: u32 = 0x00123456;
const BAT_ID: u32 = 0x00123457;

fn at(seconds: i64) -> Timestamp {
    Timestamp(BASE_MILLIS + seconds * 1000)
}

/// Renders a block the way the capture tool prints it, ASCII column included.
fn block(seconds: u32, direction: &str, kind: u16, payload: &[u8]) -> String {
    let mut text = format!(
        "[2023-05-04 18:21:{seconds:02}] {direction} packet 0x{kind:03X}: size 0x{:X}\n",
        payload.len()
    );
    text.push_str(
        "        |  0  1  2  3  4  5  6  7  8  9  A  B  C  D  E  F      | 0123456789ABCDEF\n",
    );
    text.push_str(&format!("    {}\n", "-".repeat(83)));
    for (row, chunk) in payload.chunks(16).enumerate() {
        let mut hex: Vec<String> = chunk.iter().map(|b| format!("{b:02X}")).collect();
        hex.resize(16, "--".to_string());
        let ascii: String = chunk
            .iter()
            .map(|&b| if b.is_ascii_graphic() { b as char } else { '.' })
            .collect();
        text.push_str(&format!("{row:>7X} | {}    {row:X} | {ascii}\n", hex.join(" ")));
    }
    text
}

fn put(payload: &mut [u8], offset: usize, bytes: &[u8]) {
    payload[offset..offset + bytes.len()].copy_from_slice(bytes);
}

fn put_position(payload: &mut [u8], offset: usize, (x, y, z): (f32, f32, f32)) {
    put(payload, offset, &x.to_le_bytes());
    put(payload, offset + 4, &y.to_le_bytes());
    put(payload, offset + 8, &z.to_le_bytes());
}

fn entity(seconds: u32, id: u32, index: u16, rot: u8, pos: (f32, f32, f32), name: Option<&str>) -> String {
    let mut payload = vec![0u8; 0x44];
    put(&mut payload, 0x04, &id.to_le_bytes());
    put(&mut payload, 0x08, &index.to_le_bytes());
    payload[0x0A] = if name.is_some() { 0x09 } else { 0x01 };
    payload[0x0B] = rot;
    put_position(&mut payload, 0x0C, pos);
    if let Some(name) = name {
        put(&mut payload, 0x34, name.as_bytes());
    }
    block(seconds, "Incoming", 0x00E, &payload)
}

fn client(seconds: u32, pos: (f32, f32, f32)) -> String {
    let mut payload = vec![0u8; 0x20];
    put_position(&mut payload, 0x04, pos);
    block(seconds, "Outgoing", 0x015, &payload)
}

fn widescan(seconds: u32, index: u16, x: i16, z: i16, name: &str) -> String {
    let mut payload = vec![0u8; 0x1C];
    put(&mut payload, 0x04, &index.to_le_bytes());
    put(&mut payload, 0x08, &x.to_le_bytes());
    put(&mut payload, 0x0A, &z.to_le_bytes());
    put(&mut payload, 0x0C, name.as_bytes());
    block(seconds, "Incoming", 0x0F4, &payload)
}

fn session() -> String {
    let mut log = String::from("capture started\n\n");
    log.push_str(&client(0, (0.0, 0.0, 0.0)));
    log.push_str(&entity(1, GOBLIN_ID, 0x1A, 0, (0.0, 0.0, 10.0), Some("Goblin")));
    log.push_str(&entity(2, GOBLIN_ID, 0x1A, 0, (0.0, 0.0, 12.0), None));
    log.push_str(&entity(3, GOBLIN_ID, 0x1A, 64, (0.0, 0.0, 14.0), None));
    log.push_str(&block(4, "Incoming", 0x017, &[0u8; 24]));
    log.push_str(&entity(5, GOBLIN_ID, 0x1A, 64, (0.0, 0.0, 14.0), None));
    log.push_str(&entity(8, GOBLIN_ID, 0x1A, 64, (0.0, 0.0, 14.0), None));
    log.push_str(&entity(9, GOBLIN_ID, 0x1A, 64, (3.0, 0.0, 14.0), None));
    log.push_str(&client(10, (200.0, 0.0, 0.0)));
    log.push_str(&entity(11, BAT_ID, 0x1B, 0, (0.0, 0.0, 0.0), Some("Bat")));
    log.push_str(&widescan(12, 0x30, -5, 7, "Crawler"));
    log
}

fn goblin_key() -> EntityKey {
    EntityKey::new(EntityIndex(0x1A), EntityId(GOBLIN_ID))
}

#[test]
fn session_is_split_into_entity_histories() {
    let parsed = parse_log(&session());

    assert_eq!(parsed.stats.packets, 11);
    assert_eq!(parsed.stats.skipped, 0);
    assert_eq!(parsed.stats.ignored, 1);
    assert_eq!(parsed.client_updates.len(), 2);
    assert_eq!(parsed.zone_entity_updates.len(), 1);

    let goblin_updates = parsed.updates(&goblin_key()).unwrap();
    assert_eq!(goblin_updates.len(), 7);
    assert_eq!(goblin_updates[0].name(), Some("Goblin"));
    assert_eq!(goblin_updates[1].name(), None);
    assert_eq!(goblin_updates.last(), Some(&EntityUpdate::OutOfRange(at(10))));
    assert!(goblin_updates.windows(2).all(|w| w[0].time() <= w[1].time()));

    let bat = parsed
        .updates(&EntityKey::new(EntityIndex(0x1B), EntityId(BAT_ID)))
        .unwrap();
    assert_eq!(bat, &[bat[0].clone(), EntityUpdate::OutOfRange(at(11))]);

    let crawler_key = "0x030-".to_string() + &(((0x1000 + 0x123) << 12) + 0x30).to_string();
    let crawler = parsed.updates(&EntityKey::from(crawler_key.as_str())).unwrap();
    let EntityUpdate::Widescan(scan) = &crawler[0] else {
        panic!("expected a widescan sighting, got {:?}", crawler[0]);
    };
    assert_eq!(scan.pos, Position::new(195.0, 0.0, 7.0));
    assert_eq!(scan.name.as_deref(), Some("Crawler"));

    let listing = parsed.entities();
    assert_eq!(listing[0].key, goblin_key());
    assert_eq!(listing[0].position_count, 6);
    assert_eq!(listing.len(), 3);
}

#[test]
fn goblin_path_has_a_turn_and_a_pause() {
    let parsed = parse_log(&session());
    let path = parse_path(parsed.updates(&goblin_key()).unwrap());

    assert_eq!(path.len(), 3);
    let PathPart::NewDirection(turn) = &path[0] else {
        panic!("expected a turn first, got {:?}", path[0]);
    };
    assert_eq!(turn.time, at(3));
    assert_eq!(turn.rot_diff, 64);
    assert_eq!(turn.walk_dist, 4.0);

    let PathPart::End(end) = &path[1] else {
        panic!("expected the leg to end, got {:?}", path[1]);
    };
    assert_eq!(end.time, at(3));
    assert_eq!(end.move_time, 2000);
    assert_eq!(end.path_dist, 4.0);

    let PathPart::Start(start) = &path[2] else {
        panic!("expected a new leg, got {:?}", path[2]);
    };
    assert_eq!(start.pause_time, 6000);
    assert_eq!(start.rot_diff, 0);

    let lines: Vec<String> = path.iter().map(ToString::to_string).collect();
    assert_eq!(lines[2], "18:21:03 - Waited 6s and now moving towards 64 (diff: 0)");

    let stats = PathStats::from_path(&path);
    assert_eq!(stats.turns_per_movement.total(), 1);
    assert_eq!(stats.pause_seconds.buckets, vec!["6"]);
    assert_eq!(stats.rot_diff_per_turn.total(), 2);
}
