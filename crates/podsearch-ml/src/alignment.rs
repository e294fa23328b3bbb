//! Segment-speaker alignment
//!
//! Attaches a diarization speaker to every transcription segment. A segment
//! gets the speaker of the first turn (in turn order) that fully contains
//! it; segments that no single turn contains are marked `Unknown`.

use podsearch_types::{DiarizationTurn, EnrichedSegment, Speaker, TranscriptionSegment};
use std::collections::BTreeMap;

/// Align transcription segments with diarization turns.
///
/// The output has the same length and order as `segments`.
pub fn align(segments: &[TranscriptionSegment], turns: &[DiarizationTurn]) -> Vec<EnrichedSegment> {
    let enriched: Vec<EnrichedSegment> = segments
        .iter()
        .map(|segment| EnrichedSegment {
            text: segment.text.clone(),
            start: segment.start,
            end: segment.end,
            speaker: find_containing_turn(turns, segment.start, segment.end)
                .map(|turn| Speaker::from(turn.speaker.as_str()))
                .unwrap_or(Speaker::Unknown),
        })
        .collect();

    tracing::debug!(
        "Aligned {} segments with {} turns ({} unknown)",
        segments.len(),
        turns.len(),
        enriched.iter().filter(|s| s.speaker.is_unknown()).count()
    );

    enriched
}

/// First turn whose interval fully contains `[start, end]`
pub fn find_containing_turn(
    turns: &[DiarizationTurn],
    start: f64,
    end: f64,
) -> Option<&DiarizationTurn> {
    turns.iter().find(|turn| turn.contains(start, end))
}

/// Per-speaker totals over an aligned transcript
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpeakerStats {
    pub segments: usize,
    /// Seconds of speech attributed to the speaker
    pub speaking_time: f64,
}

/// Segment count and speaking time per speaker label, `Unknown` included
pub fn speaker_stats(segments: &[EnrichedSegment]) -> BTreeMap<String, SpeakerStats> {
    let mut stats: BTreeMap<String, SpeakerStats> = BTreeMap::new();
    for segment in segments {
        let entry = stats.entry(segment.speaker.label().to_string()).or_default();
        entry.segments += 1;
        entry.speaking_time += (segment.end - segment.start).max(0.0);
    }
    stats
}
