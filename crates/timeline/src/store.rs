//! Trim timeline store.
//!
//! The authoritative transcript covers the whole source video and is never
//! modified by trimming. The active caption list is derived from it for the
//! current trim window. Once the user has edited captions, a trim change
//! keeps the edited captions that still overlap the window and only fills
//! the uncovered gaps from the authoritative list.

use std::collections::HashSet;

use captionkit_caption_model::{
    Caption, CaptionStyle, ClipDescriptor, Position, TemplateStore, Transcript,
    TranscriptSegment, TrimPoints, MIN_TRIM_SPAN,
};
use captionkit_transcription::TranscriptionService;
use tracing::{debug, info, warn};

use crate::error::{TimelineError, TimelineResult};
use crate::state::{EditorEvent, EditorPhase};

/// Id of the caption generated from the segment at `index`.
pub fn segment_caption_id(index: usize) -> String {
    format!("seg-{index}")
}

/// Editing session for one clip.
#[derive(Debug, Clone, Default)]
pub struct TrimTimelineStore {
    clip: Option<ClipDescriptor>,
    source_duration: f64,
    trim: TrimPoints,
    /// Full-video transcript segments.
    segments: Vec<TranscriptSegment>,
    captions: Vec<Caption>,
    /// Style given to newly generated captions.
    default_style: CaptionStyle,
    phase: EditorPhase,
}

impl TrimTimelineStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_style(mut self, style: CaptionStyle) -> Self {
        self.default_style = style;
        self
    }

    // --- Queries ---

    pub fn captions(&self) -> &[Caption] {
        &self.captions
    }

    /// Captions that are shown, in start order.
    pub fn visible_captions(&self) -> Vec<Caption> {
        self.captions.iter().filter(|c| c.visible).cloned().collect()
    }

    pub fn caption(&self, id: &str) -> Option<&Caption> {
        self.captions.iter().find(|c| c.id == id)
    }

    pub fn trim(&self) -> TrimPoints {
        self.trim
    }

    pub fn phase(&self) -> &EditorPhase {
        &self.phase
    }

    pub fn source_duration(&self) -> f64 {
        self.source_duration
    }

    pub fn segments(&self) -> &[TranscriptSegment] {
        &self.segments
    }

    pub fn clip(&self) -> Option<&ClipDescriptor> {
        self.clip.as_ref()
    }

    pub fn default_style(&self) -> &CaptionStyle {
        &self.default_style
    }

    pub fn has_user_edits(&self) -> bool {
        self.captions.iter().any(|c| c.edited)
    }

    // --- Clip lifecycle ---

    /// Replace the session with a new clip.
    ///
    /// Previous captions and segments are discarded. A clip that carries a
    /// transcript goes straight to `Ready`; otherwise the editor waits in
    /// `ClipLoaded` for transcription.
    pub fn load_clip(&mut self, clip: ClipDescriptor) -> TimelineResult<&EditorPhase> {
        let phase = self.phase.next(EditorEvent::LoadClip)?;

        info!(
            source = %clip.source_url,
            duration = clip.source_duration,
            start = clip.start_secs,
            end = clip.end_secs,
            "Loading clip"
        );

        self.source_duration = clip.source_duration;
        self.trim = TrimPoints::clamped(clip.start_secs, clip.end_secs, clip.source_duration);
        self.segments.clear();
        self.captions.clear();
        let transcript = clip.transcription.clone();
        self.clip = Some(clip);
        self.phase = phase;

        if let Some(transcript) = transcript {
            self.accept_transcript(transcript)?;
        }
        Ok(&self.phase)
    }

    pub fn begin_transcription(&mut self) -> TimelineResult<()> {
        self.phase = self.phase.next(EditorEvent::BeginTranscription)?;
        Ok(())
    }

    pub fn retry_transcription(&mut self) -> TimelineResult<()> {
        self.phase = self.phase.next(EditorEvent::RetryTranscription)?;
        Ok(())
    }

    /// Continue without captions.
    pub fn skip_transcription(&mut self) -> TimelineResult<()> {
        self.phase = self.phase.next(EditorEvent::SkipTranscription)?;
        self.segments.clear();
        self.captions.clear();
        Ok(())
    }

    /// Install a transcript and materialize captions for the trim window.
    pub fn accept_transcript(&mut self, transcript: Transcript) -> TimelineResult<()> {
        self.phase = self.phase.next(EditorEvent::TranscriptReady)?;
        self.segments = transcript.normalized_segments();
        self.captions.clear();
        self.rematerialize();
        info!(
            segments = self.segments.len(),
            captions = self.captions.len(),
            "Transcript accepted"
        );
        Ok(())
    }

    pub fn fail_transcription(&mut self, message: impl Into<String>) -> TimelineResult<()> {
        self.phase = self.phase.next(EditorEvent::TranscriptionFailed {
            message: message.into(),
        })?;
        Ok(())
    }

    /// Transcribe the loaded clip with `service`.
    ///
    /// Starts (or retries) transcription as needed. A service failure moves
    /// the editor to `TranscriptionFailed` and is not returned as an error.
    pub async fn run_transcription(
        &mut self,
        service: &dyn TranscriptionService,
    ) -> TimelineResult<&EditorPhase> {
        match self.phase {
            EditorPhase::ClipLoaded => self.begin_transcription()?,
            EditorPhase::TranscriptionFailed { .. } => self.retry_transcription()?,
            _ => {}
        }
        // Only `Transcribing` may proceed; anything else reports the
        // transition as invalid.
        if self.phase != EditorPhase::Transcribing {
            return Err(TimelineError::InvalidTransition {
                from: self.phase.label().to_string(),
                action: "run transcription".to_string(),
            });
        }
        let clip = self.clip.clone().ok_or(TimelineError::NoClip)?;

        match service.transcribe(&clip).await {
            Ok(transcript) => self.accept_transcript(transcript)?,
            Err(e) => {
                warn!(error = %e, source = %clip.source_url, "Transcription failed");
                self.fail_transcription(e.to_string())?;
            }
        }
        Ok(&self.phase)
    }

    /// Replace the caption list directly, e.g. with captions restored from
    /// a saved session. Captions outside the trim window are dropped; no
    /// captions are generated from the segments.
    ///
    /// Restored captions count as user edits, so later trim changes keep
    /// them where they still overlap and only refill the gaps.
    pub fn restore_captions(&mut self, captions: Vec<Caption>) {
        let trim = self.trim;
        let mut captions: Vec<Caption> = captions
            .into_iter()
            .filter(|c| c.overlaps(trim.start_secs, trim.end_secs))
            .map(|mut c| {
                c.edited = true;
                c
            })
            .collect();
        sort_captions(&mut captions);
        debug!(count = captions.len(), "Restored captions");
        self.captions = captions;
    }

    // --- Trim ---

    /// Set both trim points, clamped silently, and rematerialize captions.
    pub fn set_trim_points(&mut self, start_secs: f64, end_secs: f64) {
        self.trim = TrimPoints::clamped(start_secs, end_secs, self.source_duration);
        debug!(
            start = self.trim.start_secs,
            end = self.trim.end_secs,
            "Trim updated"
        );
        self.rematerialize();
    }

    /// Move the trim start, keeping it at least the minimum span before the end.
    pub fn update_trim_start(&mut self, start_secs: f64) {
        let end = self.trim.end_secs;
        let start = start_secs.min(end - MIN_TRIM_SPAN);
        self.set_trim_points(start, end);
    }

    /// Move the trim end, keeping it at least the minimum span after the start.
    pub fn update_trim_end(&mut self, end_secs: f64) {
        let start = self.trim.start_secs;
        let end = end_secs.max(start + MIN_TRIM_SPAN);
        self.set_trim_points(start, end);
    }

    /// Record the real source duration once metadata is known.
    ///
    /// Captions are only rematerialized when the trim window no longer
    /// fits the source.
    pub fn set_source_duration(&mut self, duration_secs: f64) {
        self.source_duration = duration_secs;
        if let Some(clip) = self.clip.as_mut() {
            clip.source_duration = duration_secs;
        }
        if !self.trim.is_within(duration_secs) {
            let start = self.trim.start_secs;
            let end = self.trim.end_secs;
            self.set_trim_points(start, end);
        }
    }

    // --- Editing ---

    pub fn edit_caption_text(&mut self, id: &str, text: impl Into<String>) -> TimelineResult<()> {
        let caption = self.caption_mut(id)?;
        caption.text = text.into();
        caption.edited = true;
        Ok(())
    }

    pub fn set_caption_position(&mut self, id: &str, position: Position) -> TimelineResult<()> {
        let caption = self.caption_mut(id)?;
        caption.position = position;
        caption.edited = true;
        Ok(())
    }

    pub fn set_caption_visibility(&mut self, id: &str, visible: bool) -> TimelineResult<()> {
        let caption = self.caption_mut(id)?;
        caption.visible = visible;
        caption.edited = true;
        Ok(())
    }

    /// Give each listed caption its own copy of `style`.
    ///
    /// The restyled captions are marked edited, so a later trim change keeps
    /// them instead of regenerating them with the default style. Fails
    /// without changing anything if any id is unknown.
    pub fn apply_style(&mut self, ids: &[String], style: &CaptionStyle) -> TimelineResult<()> {
        if let Some(missing) = ids.iter().find(|id| self.caption(id).is_none()) {
            return Err(TimelineError::UnknownCaption {
                id: missing.clone(),
            });
        }
        let targets: HashSet<&str> = ids.iter().map(String::as_str).collect();
        for caption in self.captions.iter_mut() {
            if targets.contains(caption.id.as_str()) {
                caption.style = style.clone();
                caption.edited = true;
            }
        }
        Ok(())
    }

    /// Restyle every caption and make `style` the default for captions
    /// generated later.
    ///
    /// Captions are not marked edited: regenerated captions pick up the new
    /// default, so a trim change still rebuilds the list from the segments.
    pub fn apply_style_to_all(&mut self, style: &CaptionStyle) {
        self.default_style = style.clone();
        for caption in self.captions.iter_mut() {
            caption.style = style.clone();
        }
    }

    /// Apply a named template to the listed captions.
    pub fn apply_template(
        &mut self,
        name: &str,
        templates: &TemplateStore,
        ids: &[String],
    ) -> TimelineResult<()> {
        let style = templates.get(name)?;
        self.apply_style(ids, &style)
    }

    fn caption_mut(&mut self, id: &str) -> TimelineResult<&mut Caption> {
        self.captions
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| TimelineError::UnknownCaption { id: id.to_string() })
    }

    // --- Materialization ---

    fn rematerialize(&mut self) {
        let trim = self.trim;

        if self.segments.is_empty() {
            self.captions
                .retain(|c| c.overlaps(trim.start_secs, trim.end_secs));
            return;
        }

        if !self.has_user_edits() {
            self.captions = self
                .segments
                .iter()
                .enumerate()
                .filter(|(_, s)| s.overlaps(trim.start_secs, trim.end_secs))
                .filter_map(|(i, s)| self.caption_from_segment(i, s))
                .collect();
            sort_captions(&mut self.captions);
            return;
        }

        let mut kept: Vec<Caption> = self
            .captions
            .iter()
            .filter(|c| c.overlaps(trim.start_secs, trim.end_secs))
            .cloned()
            .collect();
        sort_captions(&mut kept);

        let gaps = uncovered_gaps(&kept, trim);
        let mut ids: HashSet<String> = kept.iter().map(|c| c.id.clone()).collect();
        let mut filled = 0usize;

        for (gap_start, gap_end) in &gaps {
            for (i, segment) in self.segments.iter().enumerate() {
                if !segment.overlaps(*gap_start, *gap_end) {
                    continue;
                }
                let id = segment_caption_id(i);
                if ids.contains(&id) {
                    continue;
                }
                if let Some(caption) = self.caption_from_segment(i, segment) {
                    ids.insert(id);
                    kept.push(caption);
                    filled += 1;
                }
            }
        }

        sort_captions(&mut kept);
        debug!(
            kept = kept.len() - filled,
            filled,
            gaps = gaps.len(),
            "Rematerialized captions around user edits"
        );
        self.captions = kept;
    }

    fn caption_from_segment(&self, index: usize, segment: &TranscriptSegment) -> Option<Caption> {
        Caption::new(
            segment_caption_id(index),
            segment.text.trim(),
            segment.start_secs,
            segment.end_secs,
        )
        .ok()
        .map(|c| {
            c.with_style(self.default_style.clone())
                .with_language(segment.language.clone())
                .with_words(segment.words.clone())
        })
    }
}

/// Order by start, then end, then id, so every materialization path agrees.
fn sort_captions(captions: &mut [Caption]) {
    captions.sort_by(|a, b| {
        a.start_secs
            .total_cmp(&b.start_secs)
            .then(a.end_secs.total_cmp(&b.end_secs))
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Parts of the trim window not covered by any of `captions` (sorted by start).
fn uncovered_gaps(captions: &[Caption], trim: TrimPoints) -> Vec<(f64, f64)> {
    let mut gaps = Vec::new();
    let mut cursor = trim.start_secs;

    for caption in captions {
        if caption.start_secs > cursor {
            gaps.push((cursor, caption.start_secs.min(trim.end_secs)));
        }
        cursor = cursor.max(caption.end_secs);
    }
    if cursor < trim.end_secs {
        gaps.push((cursor, trim.end_secs));
    }
    gaps
}
