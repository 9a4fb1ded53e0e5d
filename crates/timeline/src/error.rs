//! Timeline errors.

use captionkit_caption_model::ModelError;
use captionkit_common::error::CaptionkitError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimelineError {
    #[error("Cannot {action} while {from}")]
    InvalidTransition { from: String, action: String },

    #[error("Unknown caption: {id}")]
    UnknownCaption { id: String },

    #[error("No clip loaded")]
    NoClip,

    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type TimelineResult<T> = Result<T, TimelineError>;

impl From<TimelineError> for CaptionkitError {
    fn from(err: TimelineError) -> Self {
        CaptionkitError::validation(err.to_string())
    }
}
