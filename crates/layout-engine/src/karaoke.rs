//! Karaoke word timing.

use captionkit_caption_model::{Caption, WordTiming};

/// Word timings used to drive karaoke highlighting.
///
/// Transcript timings are used when they line up one-to-one with the
/// whitespace-separated words of the caption text. Otherwise the caption
/// duration is split evenly, with the last word ending exactly at the
/// caption end.
pub fn word_timings(caption: &Caption) -> Vec<WordTiming> {
    let words: Vec<&str> = caption.text.split_whitespace().collect();
    if words.is_empty() {
        return vec![];
    }

    if let Some(timings) = caption.words.as_ref() {
        if timings.len() == words.len() {
            return timings.clone();
        }
    }

    let count = words.len();
    let step = caption.duration_secs() / count as f64;
    words
        .iter()
        .enumerate()
        .map(|(i, word)| WordTiming {
            text: (*word).to_string(),
            start_secs: caption.start_secs + i as f64 * step,
            end_secs: if i + 1 == count {
                caption.end_secs
            } else {
                caption.start_secs + (i + 1) as f64 * step
            },
        })
        .collect()
}

/// Index of the word whose `[start, end)` contains `t`.
pub fn active_word(timings: &[WordTiming], t: f64) -> Option<usize> {
    timings.iter().position(|w| w.contains(t))
}
