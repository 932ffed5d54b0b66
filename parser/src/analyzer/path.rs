use std::fmt;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use variantly::Variantly;

use crate::types::{EntityUpdate, Position, PositionUpdate, Timestamp};

/// Thresholds separating real movement from jitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(default)]
#[serde(default)]
pub struct PathConfig {
    /// Planar distance between consecutive samples that counts as moving.
    pub move_threshold: f32,
    /// Time without movement that counts as a stop.
    pub pause_threshold_ms: i64,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            move_threshold: 0.1,
            pause_threshold_ms: 3000,
        }
    }
}

/// The entity started moving after a pause.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathStart {
    pub time: Timestamp,
    /// Milliseconds spent stationary.
    pub pause_time: i64,
    pub rot: u8,
    pub rot_diff: i16,
}

/// The entity came to rest, closing a leg.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathEnd {
    pub time: Timestamp,
    /// Milliseconds between the start of the leg and the stop.
    pub move_time: i64,
    /// Straight distance from where the leg started to where it stopped.
    pub path_dist: f32,
    /// Distance covered since the last direction change.
    pub leg_dist: f32,
    pub start_pos: Position,
    pub end_pos: Position,
}

/// The entity turned while moving.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathDirection {
    pub time: Timestamp,
    /// Milliseconds walked in the previous direction.
    pub walk_time: i64,
    pub walk_dist: f32,
    pub rot: u8,
    pub rot_diff: i16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Variantly)]
#[serde(tag = "kind")]
pub enum PathPart {
    Start(PathStart),
    End(PathEnd),
    NewDirection(PathDirection),
}

impl PathPart {
    pub fn time(&self) -> Timestamp {
        match self {
            PathPart::Start(start) => start.time,
            PathPart::End(end) => end.time,
            PathPart::NewDirection(direction) => direction.time,
        }
    }
}

fn seconds(millis: i64) -> f64 {
    millis as f64 / 1000.0
}

impl fmt::Display for PathPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathPart::Start(start) => write!(
                f,
                "{} - Waited {}s and now moving towards {} (diff: {})",
                start.time,
                seconds(start.pause_time),
                start.rot,
                start.rot_diff
            ),
            PathPart::End(end) => write!(
                f,
                "{} - Moved for {}s before stopping. Travelled {:.1} yalms since last. [{} -> {}]",
                end.time,
                seconds(end.move_time),
                end.leg_dist,
                end.start_pos,
                end.end_pos
            ),
            PathPart::NewDirection(direction) => write!(
                f,
                "{} - Changed direction after {}s and {:.1} yalms towards {} (diff: {})",
                direction.time,
                seconds(direction.walk_time),
                direction.walk_dist,
                direction.rot,
                direction.rot_diff
            ),
        }
    }
}

/// Signed change between two 8-bit angles along the shorter way round, in
/// `[-128, 128]`.
pub fn calc_rot_diff(start: u8, end: u8) -> i16 {
    let diff = i16::from(end) - i16::from(start);
    if diff > 128 {
        diff - 256
    } else if diff < -128 {
        diff + 256
    } else {
        diff
    }
}

fn rotation(update: &PositionUpdate) -> u8 {
    update.pos.rotation.unwrap_or_default()
}

/// Anchors of the current tracked segment. All unset, or all set.
struct Anchors<'a> {
    /// Last position seen.
    prev: &'a PositionUpdate,
    /// Last position that was part of a movement.
    moved: &'a PositionUpdate,
    /// Where the entity last came to rest.
    stopped: &'a PositionUpdate,
    /// Where the current direction started.
    turned: &'a PositionUpdate,
}

/// Derives stops, starts and turns from one entity's update history, using the
/// default thresholds.
pub fn parse_path(updates: &[EntityUpdate]) -> Vec<PathPart> {
    parse_path_with(updates, &PathConfig::default())
}

pub fn parse_path_with(updates: &[EntityUpdate], config: &PathConfig) -> Vec<PathPart> {
    let mut path = Vec::new();
    let mut anchors: Option<Anchors<'_>> = None;

    for update in updates {
        let update = match update {
            EntityUpdate::Position(update) => update,
            // Movement context does not carry across a tracking gap.
            EntityUpdate::OutOfRange(_) | EntityUpdate::Despawn(_) => {
                anchors = None;
                continue;
            }
            EntityUpdate::Widescan(_) => continue,
        };

        let Some(a) = anchors.as_mut() else {
            anchors = Some(Anchors {
                prev: update,
                moved: update,
                stopped: update,
                turned: update,
            });
            continue;
        };

        let dist_moved = update.pos.planar_distance(&a.prev.pos);
        if dist_moved > config.move_threshold {
            let time_since_last_move = update.time - a.moved.time;
            if time_since_last_move > config.pause_threshold_ms {
                path.push(PathPart::End(PathEnd {
                    time: a.moved.time,
                    move_time: a.moved.time - a.stopped.time,
                    path_dist: a.moved.pos.planar_distance(&a.stopped.pos),
                    leg_dist: a.turned.pos.planar_distance(&a.moved.pos),
                    start_pos: a.stopped.pos,
                    end_pos: a.moved.pos,
                }));
                path.push(PathPart::Start(PathStart {
                    time: a.moved.time,
                    pause_time: time_since_last_move,
                    rot: rotation(update),
                    rot_diff: calc_rot_diff(rotation(a.moved), rotation(update)),
                }));
                a.stopped = update;
                a.turned = update;
            }
            a.moved = update;
        }

        if update.pos.rotation != a.turned.pos.rotation {
            path.push(PathPart::NewDirection(PathDirection {
                time: update.time,
                walk_time: update.time - a.turned.time,
                walk_dist: a.turned.pos.planar_distance(&update.pos),
                rot: rotation(update),
                rot_diff: calc_rot_diff(rotation(a.turned), rotation(update)),
            }));
            a.turned = update;
        }

        a.prev = update;
    }

    path
}
