//! Greedy word wrapping over styled pieces.

use std::ops::Range;

/// Styling class of a piece of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunTag {
    Plain,
    /// Index into the style's keyword list.
    Keyword(usize),
    /// Karaoke word index; every word is its own run.
    Word(usize),
}

/// Contiguous text with one styling class.
#[derive(Debug, Clone, PartialEq)]
pub struct Piece {
    pub text: String,
    pub tag: RunTag,
}

/// A wrap unit: one or more pieces with no whitespace between them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Word {
    pub pieces: Vec<Piece>,
}

/// Break styled pieces into words at whitespace.
///
/// A piece boundary without whitespace (for example a highlighted keyword
/// followed by punctuation) stays inside one word.
pub fn words_from_pieces(pieces: &[Piece]) -> Vec<Word> {
    let mut words = Vec::new();
    let mut current = Word::default();

    for piece in pieces {
        let mut token = String::new();
        for c in piece.text.chars() {
            if c.is_whitespace() {
                if !token.is_empty() {
                    current.pieces.push(Piece {
                        text: std::mem::take(&mut token),
                        tag: piece.tag,
                    });
                }
                if !current.pieces.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            } else {
                token.push(c);
            }
        }
        if !token.is_empty() {
            current.pieces.push(Piece {
                text: token,
                tag: piece.tag,
            });
        }
    }

    if !current.pieces.is_empty() {
        words.push(current);
    }
    words
}

/// Greedy line breaking.
///
/// Returns ranges of word indices per line. A word wider than `max_width`
/// is placed on a line of its own.
pub fn wrap_lines(word_widths: &[f64], space_width: f64, max_width: f64) -> Vec<Range<usize>> {
    let mut lines = Vec::new();
    let mut line_start = 0;
    let mut line_width = 0.0;

    for (i, &width) in word_widths.iter().enumerate() {
        if i == line_start {
            line_width = width;
            continue;
        }
        let candidate = line_width + space_width + width;
        if candidate <= max_width {
            line_width = candidate;
        } else {
            lines.push(line_start..i);
            line_start = i;
            line_width = width;
        }
    }

    if line_start < word_widths.len() {
        lines.push(line_start..word_widths.len());
    }
    lines
}
