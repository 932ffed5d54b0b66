use serde::Serialize;

use crate::analyzer::path::PathPart;

/// Bucketed counts, ready for a bar chart.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub label: &'static str,
    pub buckets: Vec<String>,
    pub counts: Vec<usize>,
}

impl Histogram {
    fn empty(label: &'static str) -> Self {
        Histogram {
            label,
            ..Default::default()
        }
    }

    /// Buckets `step` wide starting at the smallest value, one per step up to the
    /// largest.
    fn stepped(
        label: &'static str,
        values: &[i64],
        step: i64,
        bucket_label: impl Fn(i64) -> String,
    ) -> Self {
        let (Some(&min), Some(&max)) = (values.iter().min(), values.iter().max()) else {
            return Self::empty(label);
        };
        let bucket_count = ((max - min) / step) as usize + 1;
        let mut counts = vec![0; bucket_count];
        for value in values {
            counts[((value - min) / step) as usize] += 1;
        }
        Histogram {
            label,
            buckets: (0..bucket_count as i64)
                .map(|i| bucket_label(min + i * step))
                .collect(),
            counts,
        }
    }

    /// `bucket_count` equal-width buckets spanning the observed range, labelled
    /// by their midpoints.
    fn spread(label: &'static str, values: &[f32], bucket_count: usize) -> Self {
        if values.is_empty() {
            return Self::empty(label);
        }
        let min = values.iter().copied().fold(f32::INFINITY, f32::min);
        let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let size = (max - min) / bucket_count as f32;

        let mut counts = vec![0; bucket_count];
        for value in values {
            let index = if size > 0.0 {
                ((value - min) / size) as usize
            } else {
                0
            };
            counts[index.min(bucket_count - 1)] += 1;
        }
        Histogram {
            label,
            buckets: (0..bucket_count)
                .map(|i| format!("{:.1}", min + (i as f32 + 0.5) * size))
                .collect(),
            counts,
        }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

const DISTANCE_BUCKETS: usize = 20;
const ROT_BUCKET_SIZE: i16 = 8;
const ROT_MIN: i16 = -128;

/// Distributions describing how an entity moves: how often it turns, how long it
/// rests, how far it walks and how sharply it turns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathStats {
    pub turns_per_movement: Histogram,
    pub pause_seconds: Histogram,
    pub distance_per_turn: Histogram,
    pub rot_diff_per_turn: Histogram,
}

impl PathStats {
    pub fn from_path(path: &[PathPart]) -> Self {
        let mut turn_counts = Vec::new();
        let mut turns = 0;
        let mut pauses = Vec::new();
        let mut distances = Vec::new();
        let mut rot_diffs = Vec::new();

        for part in path {
            match part {
                PathPart::Start(start) => {
                    turns = 0;
                    pauses.push(start.pause_time);
                    rot_diffs.push(start.rot_diff);
                }
                PathPart::End(end) => {
                    turn_counts.push(turns);
                    turns = 0;
                    distances.push(end.leg_dist);
                }
                PathPart::NewDirection(direction) => {
                    turns += 1;
                    distances.push(direction.walk_dist);
                    rot_diffs.push(direction.rot_diff);
                }
            }
        }

        PathStats {
            turns_per_movement: Histogram::stepped("Turns per movement", &turn_counts, 1, |turns| {
                turns.to_string()
            }),
            // One second wide, offset from the shortest pause.
            pause_seconds: Histogram::stepped("Pause times (seconds)", &pauses, 1000, |ms| {
                (ms as f64 / 1000.0).to_string()
            }),
            distance_per_turn: Histogram::spread("Distance per turn", &distances, DISTANCE_BUCKETS),
            rot_diff_per_turn: rot_diff_histogram(&rot_diffs),
        }
    }
}

/// Fixed buckets of 8 units over `[-128, 128)`; a diff of exactly 128 joins the last one.
fn rot_diff_histogram(rot_diffs: &[i16]) -> Histogram {
    let bucket_count = (256 / ROT_BUCKET_SIZE) as usize;
    let mut counts = vec![0; bucket_count];
    for diff in rot_diffs {
        let index = ((diff - ROT_MIN) / ROT_BUCKET_SIZE) as usize;
        counts[index.min(bucket_count - 1)] += 1;
    }
    Histogram {
        label: "Rotation diff per turn",
        buckets: (0..bucket_count as i16)
            .map(|i| {
                let low = ROT_MIN + i * ROT_BUCKET_SIZE;
                format!("{}-{}", low, low + ROT_BUCKET_SIZE)
            })
            .collect(),
        counts,
    }
}
