use async_trait::async_trait;
use captionkit_caption_model::{
    Caption, CaptionStyle, ClipDescriptor, Position, TemplateStore, Transcript,
    TranscriptSegment, MIN_TRIM_SPAN,
};
use captionkit_timeline::{EditorPhase, TimelineError, TrimTimelineStore};
use captionkit_transcription::{TranscriptionError, TranscriptionService};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

fn segment(text: &str, start: f64, end: f64) -> TranscriptSegment {
    TranscriptSegment::new(text, start, end)
}

fn clip_with(segments: Vec<TranscriptSegment>, duration: f64, start: f64, end: f64) -> ClipDescriptor {
    ClipDescriptor {
        source_url: "clip.mp4".to_string(),
        source_duration: duration,
        start_secs: start,
        end_secs: end,
        transcription: Some(Transcript {
            segments,
            language: Some("en".to_string()),
        }),
    }
}

fn store_with(segments: Vec<TranscriptSegment>, duration: f64, start: f64, end: f64) -> TrimTimelineStore {
    let mut store = TrimTimelineStore::new();
    store
        .load_clip(clip_with(segments, duration, start, end))
        .unwrap();
    store
}

fn texts(store: &TrimTimelineStore) -> Vec<String> {
    store.captions().iter().map(|c| c.text.clone()).collect()
}

#[test]
fn trim_selects_overlapping_segments() {
    let store = store_with(
        vec![
            segment("a", 0.0, 5.0),
            segment("b", 12.0, 20.0),
            segment("c", 24.0, 40.0),
        ],
        60.0,
        10.0,
        25.0,
    );

    assert!(store.phase().is_ready());
    assert_eq!(texts(&store), vec!["b", "c"]);
    let ids: Vec<&str> = store.captions().iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["seg-1", "seg-2"]);
    assert_eq!(store.captions()[0].language.as_deref(), Some("en"));
}

#[test]
fn widening_trim_restores_segments_from_authoritative_list() {
    let mut store = store_with(
        vec![segment("a", 0.0, 5.0), segment("b", 12.0, 20.0)],
        60.0,
        10.0,
        25.0,
    );
    assert_eq!(texts(&store), vec!["b"]);

    store.set_trim_points(0.0, 30.0);
    assert_eq!(texts(&store), vec!["a", "b"]);
    assert_eq!(store.segments().len(), 2);
}

#[test]
fn edits_survive_trim_changes_and_gaps_are_refilled() {
    let mut store = store_with(
        vec![
            segment("a", 0.0, 5.0),
            segment("b", 12.0, 20.0),
            segment("c", 24.0, 40.0),
        ],
        60.0,
        10.0,
        25.0,
    );
    store.edit_caption_text("seg-1", "B edited").unwrap();

    store.set_trim_points(0.0, 30.0);
    assert_eq!(texts(&store), vec!["a", "B edited", "c"]);
    assert_eq!(store.caption("seg-1").unwrap().text, "B edited");

    // Trimming the edited caption out drops it.
    store.set_trim_points(21.0, 30.0);
    assert_eq!(texts(&store), vec!["c"]);
}

#[test]
fn edited_position_is_kept() {
    let mut store = store_with(vec![segment("a", 1.0, 3.0)], 10.0, 0.0, 10.0);
    store
        .set_caption_position("seg-0", Position::new(100.0, 200.0))
        .unwrap();
    store.set_trim_points(0.5, 9.0);
    assert_eq!(store.captions()[0].position, Position::new(100.0, 200.0));
}

#[test]
fn captions_without_segments_are_filtered() {
    let mut store = store_with(vec![], 60.0, 0.0, 60.0);
    store.restore_captions(vec![
        Caption::new("x", "early", 1.0, 2.0).unwrap(),
        Caption::new("y", "late", 40.0, 45.0).unwrap(),
    ]);
    assert_eq!(store.captions().len(), 2);

    store.set_trim_points(30.0, 50.0);
    assert_eq!(texts(&store), vec!["late"]);
}

#[test]
fn restored_captions_replace_generated_ones() {
    let mut store = store_with(
        vec![segment("orig", 1.0, 3.0), segment("later", 6.0, 8.0)],
        10.0,
        0.0,
        10.0,
    );
    assert_eq!(texts(&store), vec!["orig", "later"]);

    store.restore_captions(vec![
        Caption::new("saved-1", "restored text", 1.0, 4.0).unwrap(),
        Caption::new("saved-2", "outside", 20.0, 21.0).unwrap(),
    ]);
    assert_eq!(texts(&store), vec!["restored text"]);
    assert!(store.has_user_edits());

    // The restored caption is kept; only the uncovered tail is refilled.
    store.set_trim_points(0.0, 10.0);
    assert_eq!(texts(&store), vec!["restored text", "later"]);
    assert_eq!(store.captions()[0].id, "saved-1");
}

#[test]
fn per_caption_style_survives_trim_but_broadcast_regenerates() {
    let mut store = store_with(
        vec![segment("a", 0.0, 1.0), segment("b", 5.0, 6.0)],
        10.0,
        0.0,
        10.0,
    );
    let mut big = CaptionStyle::default();
    big.font_size = 99.0;
    let mut small = CaptionStyle::default();
    small.font_size = 20.0;

    store.apply_style_to_all(&small);
    assert!(!store.has_user_edits());

    store.apply_style(&["seg-0".to_string()], &big).unwrap();
    assert!(store.has_user_edits());

    store.set_trim_points(0.0, 8.0);
    assert_eq!(store.caption("seg-0").unwrap().style.font_size, 99.0);
    assert_eq!(store.caption("seg-1").unwrap().style.font_size, 20.0);
}

#[test]
fn trim_updates_clamp_against_each_other() {
    let mut store = store_with(vec![], 60.0, 10.0, 20.0);

    store.update_trim_start(25.0);
    assert!((store.trim().start_secs - (20.0 - MIN_TRIM_SPAN)).abs() < 1e-9);
    assert!((store.trim().end_secs - 20.0).abs() < 1e-9);

    store.update_trim_end(-3.0);
    assert!((store.trim().duration_secs() - MIN_TRIM_SPAN).abs() < 1e-9);

    store.update_trim_end(500.0);
    assert!((store.trim().end_secs - 60.0).abs() < 1e-9);
}

#[test]
fn source_duration_change_is_non_destructive() {
    let mut store = store_with(vec![segment("a", 1.0, 2.0)], 60.0, 0.0, 30.0);
    store.edit_caption_text("seg-0", "kept").unwrap();

    store.set_source_duration(45.0);
    assert!((store.trim().end_secs - 30.0).abs() < 1e-9);
    assert_eq!(texts(&store), vec!["kept"]);

    store.set_source_duration(20.0);
    assert!((store.trim().end_secs - 20.0).abs() < 1e-9);
    assert_eq!(texts(&store), vec!["kept"]);
}

#[test]
fn apply_style_is_atomic_and_independent() {
    let mut store = store_with(
        vec![segment("a", 0.0, 1.0), segment("b", 1.0, 2.0)],
        10.0,
        0.0,
        10.0,
    );
    let big = CaptionStyle {
        font_size: 99.0,
        ..CaptionStyle::default()
    };

    let err = store
        .apply_style(&["seg-0".to_string(), "nope".to_string()], &big)
        .unwrap_err();
    assert_eq!(err, TimelineError::UnknownCaption { id: "nope".into() });
    assert_eq!(store.captions()[0].style, CaptionStyle::default());

    store.apply_style(&["seg-0".to_string()], &big).unwrap();
    assert_eq!(store.captions()[0].style.font_size, 99.0);
    assert_eq!(store.captions()[1].style, CaptionStyle::default());
}

#[test]
fn apply_style_to_all_becomes_default_for_new_captions() {
    let mut store = store_with(
        vec![segment("a", 0.0, 1.0), segment("b", 5.0, 6.0)],
        10.0,
        0.0,
        2.0,
    );
    let style = CaptionStyle {
        font_size: 20.0,
        ..CaptionStyle::default()
    };
    store.apply_style_to_all(&style);
    store.set_trim_points(0.0, 10.0);
    assert!(store.captions().iter().all(|c| c.style.font_size == 20.0));
}

#[test]
fn apply_template_by_name() {
    let mut store = store_with(vec![segment("a", 0.0, 1.0)], 10.0, 0.0, 10.0);
    let templates = TemplateStore::with_builtins();
    store
        .apply_template("karaoke", &templates, &["seg-0".to_string()])
        .unwrap();
    assert!(store.captions()[0].style.active_karaoke().is_some());

    assert!(matches!(
        store.apply_template("missing", &templates, &["seg-0".to_string()]),
        Err(TimelineError::Model(_))
    ));
}

#[test]
fn hidden_captions_are_not_visible() {
    let mut store = store_with(
        vec![segment("a", 0.0, 1.0), segment("b", 1.0, 2.0)],
        10.0,
        0.0,
        10.0,
    );
    store.set_caption_visibility("seg-0", false).unwrap();
    let visible = store.visible_captions();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, "seg-1");
}

struct FlakyService {
    calls: AtomicUsize,
    fail_first: usize,
}

#[async_trait]
impl TranscriptionService for FlakyService {
    async fn transcribe(&self, _clip: &ClipDescriptor) -> Result<Transcript, TranscriptionError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_first {
            return Err(TranscriptionError::Provider {
                message: "provider unavailable".to_string(),
            });
        }
        Ok(Transcript {
            segments: vec![TranscriptSegment::new("hello", 1.0, 2.0)],
            language: None,
        })
    }
}

fn untranscribed_clip() -> ClipDescriptor {
    ClipDescriptor {
        source_url: "clip.mp4".to_string(),
        source_duration: 10.0,
        start_secs: 0.0,
        end_secs: 10.0,
        transcription: None,
    }
}

#[tokio::test]
async fn transcription_failure_is_recoverable_by_retry() {
    let service = FlakyService {
        calls: AtomicUsize::new(0),
        fail_first: 1,
    };
    let mut store = TrimTimelineStore::new();
    assert_eq!(
        store.load_clip(untranscribed_clip()).unwrap(),
        &EditorPhase::ClipLoaded
    );

    let phase = store.run_transcription(&service).await.unwrap().clone();
    assert!(matches!(phase, EditorPhase::TranscriptionFailed { .. }));
    assert!(store.captions().is_empty());

    let phase = store.run_transcription(&service).await.unwrap().clone();
    assert_eq!(phase, EditorPhase::Ready);
    assert_eq!(texts(&store), vec!["hello"]);
}

#[tokio::test]
async fn transcription_failure_can_be_skipped() {
    let service = FlakyService {
        calls: AtomicUsize::new(0),
        fail_first: usize::MAX,
    };
    let mut store = TrimTimelineStore::new();
    store.load_clip(untranscribed_clip()).unwrap();
    store.run_transcription(&service).await.unwrap();

    store.skip_transcription().unwrap();
    assert!(store.phase().is_ready());
    assert!(store.captions().is_empty());
}

#[tokio::test]
async fn transcription_requires_a_clip() {
    let service = FlakyService {
        calls: AtomicUsize::new(0),
        fail_first: 0,
    };
    let mut store = TrimTimelineStore::new();
    assert!(matches!(
        store.run_transcription(&service).await,
        Err(TimelineError::InvalidTransition { .. })
    ));
}

fn segments_strategy() -> impl Strategy<Value = Vec<TranscriptSegment>> {
    proptest::collection::vec((0.0f64..100.0, 0.1f64..15.0), 0..20).prop_map(|spans| {
        spans
            .into_iter()
            .enumerate()
            .map(|(i, (start, len))| segment(&format!("w{i}"), start, start + len))
            .collect()
    })
}

proptest! {
    #[test]
    fn prop_unedited_captions_are_exactly_overlapping_segments(
        segments in segments_strategy(),
        start in 0.0f64..120.0,
        end in 0.0f64..120.0,
    ) {
        let mut store = store_with(segments.clone(), 120.0, 0.0, 120.0);
        store.set_trim_points(start, end);
        let trim = store.trim();

        let mut expected: Vec<String> = segments
            .iter()
            .enumerate()
            .filter(|(_, s)| s.start_secs < trim.end_secs && s.end_secs > trim.start_secs)
            .map(|(i, _)| format!("seg-{i}"))
            .collect();
        let mut actual: Vec<String> = store.captions().iter().map(|c| c.id.clone()).collect();
        expected.sort();
        actual.sort();
        prop_assert_eq!(actual, expected);
        prop_assert!(store
            .captions()
            .windows(2)
            .all(|w| w[0].start_secs <= w[1].start_secs));
    }

    #[test]
    fn prop_set_trim_points_is_idempotent(
        segments in segments_strategy(),
        start in 0.0f64..120.0,
        end in 0.0f64..120.0,
        edit in any::<bool>(),
    ) {
        let mut store = store_with(segments, 120.0, 0.0, 120.0);
        if edit {
            if let Some(id) = store.captions().first().map(|c| c.id.clone()) {
                store.edit_caption_text(&id, "edited").unwrap();
            }
        }
        store.set_trim_points(start, end);
        let once = store.captions().to_vec();
        store.set_trim_points(start, end);
        prop_assert_eq!(store.captions(), once.as_slice());
    }

    #[test]
    fn prop_trim_always_clamped(
        ops in proptest::collection::vec((0u8..3, -50.0f64..200.0, -50.0f64..200.0), 1..20),
        duration in 1.0f64..150.0,
    ) {
        let mut store = store_with(vec![], duration, 0.0, duration);
        for (kind, a, b) in ops {
            match kind {
                0 => store.set_trim_points(a, b),
                1 => store.update_trim_start(a),
                _ => store.update_trim_end(b),
            }
            let trim = store.trim();
            prop_assert!(trim.start_secs >= 0.0);
            prop_assert!(trim.end_secs <= duration + 1e-9);
            prop_assert!(trim.end_secs - trim.start_secs >= MIN_TRIM_SPAN - 1e-9);
        }
    }
}
