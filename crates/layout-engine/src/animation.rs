//! Entry animation state.

use captionkit_caption_model::{Animation, AnimationKind};

/// Distance in canonical pixels a `slide_up` caption travels.
pub const SLIDE_DISTANCE: f64 = 40.0;

/// Whole-caption transform at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationState {
    pub opacity: f64,
    pub scale: f64,
    pub offset_y: f64,
}

impl AnimationState {
    pub const IDENTITY: AnimationState = AnimationState {
        opacity: 1.0,
        scale: 1.0,
        offset_y: 0.0,
    };
}

/// Eased progress of the entry animation at time `t`.
///
/// A progress that is not positive (no animation, zero duration, or an
/// animation that has not started) reads as complete, so the caption is
/// never hidden by a missing or degenerate animation.
pub fn progress(animation: Option<&Animation>, caption_start: f64, t: f64) -> f64 {
    let Some(animation) = animation else {
        return 1.0;
    };
    if animation.duration_secs <= 0.0 {
        return 1.0;
    }
    let raw = (t - caption_start - animation.delay_secs) / animation.duration_secs;
    let eased = animation.easing.apply(raw.clamp(0.0, 1.0));
    if eased <= 0.0 {
        1.0
    } else {
        eased
    }
}

/// Transform for a caption starting at `caption_start`, with sizes in
/// output pixels via `size_scale`.
pub fn animation_state(
    animation: Option<&Animation>,
    caption_start: f64,
    t: f64,
    size_scale: f64,
) -> AnimationState {
    let Some(kind) = animation.map(|a| a.kind) else {
        return AnimationState::IDENTITY;
    };
    let p = progress(animation, caption_start, t);
    match kind {
        AnimationKind::Fade => AnimationState {
            opacity: p,
            ..AnimationState::IDENTITY
        },
        AnimationKind::SlideUp => AnimationState {
            offset_y: (1.0 - p) * SLIDE_DISTANCE * size_scale,
            ..AnimationState::IDENTITY
        },
        AnimationKind::Pop => AnimationState {
            scale: 0.5 + 0.5 * p,
            ..AnimationState::IDENTITY
        },
    }
}
