use std::collections::HashMap;

use serde::Serialize;

use crate::ml::Detection;

/// Keep detections strictly above the threshold. Boundary-equal confidence is
/// rejected.
pub fn filter_confident(
    detections: Vec<Detection>,
    threshold: f32,
) -> impl Iterator<Item = Detection> {
    detections.into_iter().filter(move |d| d.confidence > threshold)
}

#[derive(Debug)]
struct LabelEntry {
    count: u64,
    /// Ordinal of the label's first appearance in the processing stream;
    /// breaks count ties in the summary so output stays deterministic.
    first_seen: u64,
}

/// Running per-label occurrence counts across a video. The only cross-frame
/// mutable state in the pipeline; read out via [`summarize`](Self::summarize)
/// after the last frame.
#[derive(Debug, Default)]
pub struct ActivityTally {
    counts: HashMap<String, LabelEntry>,
}

impl ActivityTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one frame's accepted detections into the tally. Called once per
    /// processed frame; an empty batch is a no-op.
    pub fn accumulate(&mut self, detections: impl IntoIterator<Item = Detection>) {
        for detection in detections {
            let first_seen = self.counts.len() as u64;
            self.counts
                .entry(detection.label)
                .and_modify(|e| e.count += 1)
                .or_insert(LabelEntry {
                    count: 1,
                    first_seen,
                });
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Ranked summary: count descending, first-observed order on ties.
    pub fn summarize(&self) -> ActivitySummary {
        let mut ranked: Vec<(&String, &LabelEntry)> = self.counts.iter().collect();
        ranked.sort_by(|a, b| {
            b.1.count
                .cmp(&a.1.count)
                .then(a.1.first_seen.cmp(&b.1.first_seen))
        });

        ActivitySummary {
            entries: ranked
                .into_iter()
                .map(|(label, entry)| SummaryEntry {
                    label: label.clone(),
                    count: entry.count,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryEntry {
    pub label: String,
    pub count: u64,
}

/// Final ranked output, immutable once produced. Empty is a valid state and
/// must be rendered as "nothing detected", not treated as an error.
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ActivitySummary {
    pub entries: Vec<SummaryEntry>,
}

impl ActivitySummary {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
