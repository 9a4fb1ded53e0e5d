//! Keyword highlight scanning.

use captionkit_caption_model::KeywordHighlight;

/// A stretch of caption text, either plain or matching a keyword.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordSegment {
    pub text: String,
    /// Index into the style's keyword list.
    pub keyword: Option<usize>,
}

fn char_eq_ignore_case(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

fn matches_at(haystack: &[char], at: usize, needle: &[char]) -> bool {
    haystack.len() - at >= needle.len()
        && haystack[at..at + needle.len()]
            .iter()
            .zip(needle)
            .all(|(&h, &n)| char_eq_ignore_case(h, n))
}

/// Split `text` into plain and highlighted segments.
///
/// Matching is case-insensitive. At each position the first keyword in
/// configuration order that matches wins and the scan resumes after it.
/// Empty keywords never match.
pub fn split_keywords(text: &str, keywords: &[KeywordHighlight]) -> Vec<KeywordSegment> {
    let needles: Vec<(usize, Vec<char>)> = keywords
        .iter()
        .enumerate()
        .filter(|(_, k)| !k.text.is_empty())
        .map(|(i, k)| (i, k.text.chars().collect()))
        .collect();

    let chars: Vec<char> = text.chars().collect();
    let mut segments = Vec::new();
    let mut plain = String::new();
    let mut i = 0;

    while i < chars.len() {
        let hit = needles
            .iter()
            .find(|(_, needle)| matches_at(&chars, i, needle));

        match hit {
            Some((index, needle)) => {
                if !plain.is_empty() {
                    segments.push(KeywordSegment {
                        text: std::mem::take(&mut plain),
                        keyword: None,
                    });
                }
                segments.push(KeywordSegment {
                    text: chars[i..i + needle.len()].iter().collect(),
                    keyword: Some(*index),
                });
                i += needle.len();
            }
            None => {
                plain.push(chars[i]);
                i += 1;
            }
        }
    }

    if !plain.is_empty() {
        segments.push(KeywordSegment {
            text: plain,
            keyword: None,
        });
    }
    segments
}

/// Whether any configured keyword can match.
pub fn has_keywords(keywords: &[KeywordHighlight]) -> bool {
    keywords.iter().any(|k| !k.text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use captionkit_caption_model::Rgba;

    fn keyword(text: &str) -> KeywordHighlight {
        KeywordHighlight {
            text: text.to_string(),
            color: Rgba::rgb(255, 0, 0),
            background_color: None,
            font_weight: None,
        }
    }

    #[test]
    fn test_case_insensitive_match_keeps_original_casing() {
        let segments = split_keywords("This is HUGE news", &[keyword("huge")]);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[1].text, "HUGE");
        assert_eq!(segments[1].keyword, Some(0));
        assert_eq!(segments[2].text, " news");
    }

    #[test]
    fn test_first_configured_keyword_wins() {
        let segments = split_keywords("foobar", &[keyword("foo"), keyword("foobar")]);
        assert_eq!(segments[0].text, "foo");
        assert_eq!(segments[0].keyword, Some(0));
        assert_eq!(segments[1].text, "bar");
        assert_eq!(segments[1].keyword, None);
    }

    #[test]
    fn test_empty_keyword_ignored() {
        let segments = split_keywords("abc", &[keyword(""), keyword("b")]);
        assert_eq!(
            segments,
            vec![
                KeywordSegment {
                    text: "a".into(),
                    keyword: None
                },
                KeywordSegment {
                    text: "b".into(),
                    keyword: Some(1)
                },
                KeywordSegment {
                    text: "c".into(),
                    keyword: None
                },
            ]
        );
    }

    #[test]
    fn test_no_keywords_single_plain_segment() {
        let segments = split_keywords("plain text", &[]);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].keyword, None);
        assert!(!has_keywords(&[keyword("")]));
    }

    #[test]
    fn test_repeated_matches() {
        let segments = split_keywords("go Go GO", &[keyword("go")]);
        let hits = segments.iter().filter(|s| s.keyword.is_some()).count();
        assert_eq!(hits, 3);
    }
}
