//! Whole-word keyword highlighting.
//!
//! Text is split into plain and matched segments without touching the text
//! itself: joining the segments back together always yields the input. A
//! keyword only matches when the characters on both sides of the hit are not
//! letters, digits or `_` in any script, so `carpet` never lights up inside
//! `carpentry` and Arabic or Cyrillic words behave the same way Latin ones do.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Plain,
    Matched,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub kind: SegmentKind,
    pub text: String,
}

impl Segment {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            kind: SegmentKind::Plain,
            text: text.into(),
        }
    }

    pub fn matched(text: impl Into<String>) -> Self {
        Self {
            kind: SegmentKind::Matched,
            text: text.into(),
        }
    }

    pub fn is_matched(&self) -> bool {
        self.kind == SegmentKind::Matched
    }
}

/// Compiled keyword set, reusable across texts.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    /// Case-insensitive alternation over every keyword, used to find
    /// candidate start positions.
    any: Option<Regex>,
    /// One `\A`-anchored pattern per keyword, longest keyword first.
    anchored: Vec<Regex>,
}

impl KeywordMatcher {
    /// Compiles the keyword set. Blank entries are dropped; an empty set
    /// yields a matcher that never matches.
    pub fn new<S: AsRef<str>>(keywords: &[S]) -> Result<Self, regex::Error> {
        let mut usable: Vec<&str> = keywords
            .iter()
            .map(AsRef::as_ref)
            .filter(|keyword| !keyword.trim().is_empty())
            .collect();
        if usable.is_empty() {
            return Ok(Self {
                any: None,
                anchored: Vec::new(),
            });
        }
        // Longest first so `tote bag` wins over `tote` at the same position.
        usable.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));

        let escaped: Vec<String> = usable.iter().map(|keyword| regex::escape(keyword)).collect();
        let any = RegexBuilder::new(&escaped.join("|"))
            .case_insensitive(true)
            .build()?;
        let anchored = escaped
            .iter()
            .map(|pattern| {
                RegexBuilder::new(&format!(r"\A(?:{pattern})"))
                    .case_insensitive(true)
                    .build()
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            any: Some(any),
            anchored,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.any.is_none()
    }

    /// Iterates over whole-word hits as byte ranges into `text`.
    pub fn find_iter<'m, 't>(&'m self, text: &'t str) -> Matches<'m, 't> {
        Matches {
            matcher: self,
            text,
            cursor: 0,
        }
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.find_iter(text).next().is_some()
    }

    /// Splits `text` into plain and matched segments, in order.
    pub fn segments(&self, text: &str) -> Vec<Segment> {
        if self.is_empty() || text.is_empty() {
            return vec![Segment::plain(text)];
        }
        let mut segments = Vec::new();
        let mut cursor = 0;
        for (start, end) in self.find_iter(text) {
            if start > cursor {
                segments.push(Segment::plain(&text[cursor..start]));
            }
            segments.push(Segment::matched(&text[start..end]));
            cursor = end;
        }
        if cursor < text.len() {
            segments.push(Segment::plain(&text[cursor..]));
        }
        segments
    }

    fn match_at(&self, text: &str, from: usize) -> Option<(usize, usize)> {
        let any = self.any.as_ref()?;
        let mut pos = from;
        while pos <= text.len() {
            let candidate = any.find_at(text, pos)?;
            let start = candidate.start();
            if is_boundary_before(text, start) {
                // The alternation only reports the first alternative that fits;
                // fall back to shorter keywords when the longer one runs into a
                // word character.
                for pattern in &self.anchored {
                    if let Some(hit) = pattern.find(&text[start..]) {
                        let end = start + hit.end();
                        if end > start && is_boundary_after(text, end) {
                            return Some((start, end));
                        }
                    }
                }
            }
            pos = start + text[start..].chars().next().map_or(1, char::len_utf8);
        }
        None
    }
}

pub struct Matches<'m, 't> {
    matcher: &'m KeywordMatcher,
    text: &'t str,
    cursor: usize,
}

impl Iterator for Matches<'_, '_> {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor > self.text.len() {
            return None;
        }
        let (start, end) = self.matcher.match_at(self.text, self.cursor)?;
        self.cursor = end;
        Some((start, end))
    }
}

/// Segments `text` against `keywords`.
pub fn annotate<S: AsRef<str>>(text: &str, keywords: &[S]) -> Vec<Segment> {
    match KeywordMatcher::new(keywords) {
        Ok(matcher) => matcher.segments(text),
        Err(err) => {
            warn!(error = %err, "keyword pattern rejected; rendering text unhighlighted");
            vec![Segment::plain(text)]
        }
    }
}

/// Returns the keywords that occur in `text` as whole words, in input order.
pub fn keywords_in_text<S: AsRef<str>>(text: &str, keywords: &[S]) -> Vec<String> {
    keywords
        .iter()
        .map(AsRef::as_ref)
        .filter(|keyword| !keyword.trim().is_empty())
        .filter(|keyword| {
            KeywordMatcher::new(std::slice::from_ref(keyword))
                .map(|matcher| matcher.is_match(text))
                .unwrap_or(false)
        })
        .map(str::to_string)
        .collect()
}

// General categories L and N only; combining marks such as Arabic tanween
// are not word characters.
static WORD_CHAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\A[\p{L}\p{N}_]\z").expect("valid word-character class"));

fn is_word_char(c: char) -> bool {
    let mut buf = [0u8; 4];
    WORD_CHAR.is_match(c.encode_utf8(&mut buf))
}

fn is_boundary_before(text: &str, start: usize) -> bool {
    text[..start]
        .chars()
        .next_back()
        .is_none_or(|c| !is_word_char(c))
}

fn is_boundary_after(text: &str, end: usize) -> bool {
    text[end..].chars().next().is_none_or(|c| !is_word_char(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined(segments: &[Segment]) -> String {
        segments.iter().map(|s| s.text.as_str()).collect()
    }

    fn matched(segments: &[Segment]) -> Vec<&str> {
        segments
            .iter()
            .filter(|s| s.is_matched())
            .map(|s| s.text.as_str())
            .collect()
    }

    #[test]
    fn segments_rebuild_the_input() {
        let cases: &[(&str, &[&str])] = &[
            ("Handmade leather tote bag, brass fittings.", &["leather", "tote bag", "brass"]),
            ("tote tote TOTE", &["tote"]),
            ("", &["tote"]),
            ("no keywords here", &[]),
            ("حقيبة جلدية مصنوعة يدويا", &["جلدية"]),
            ("  leading and trailing  ", &["leading", "trailing"]),
        ];
        for (text, keywords) in cases {
            let segments = annotate(text, keywords);
            assert_eq!(&joined(&segments), text, "round trip failed for {text:?}");
            assert!(
                segments.iter().all(|s| !s.text.is_empty()) || text.is_empty(),
                "empty segment produced for {text:?}"
            );
        }
    }

    #[test]
    fn partial_words_are_not_highlighted() {
        let segments = annotate("Carpentry", &["Carpet"]);
        assert!(matched(&segments).is_empty());

        let segments = annotate("I love Carpentry", &["Carpentry"]);
        assert_eq!(matched(&segments), vec!["Carpentry"]);
        assert_eq!(segments.len(), 2);
    }

    #[test]
    fn longer_keyword_wins() {
        let segments = annotate("leather tote bag", &["tote", "tote bag"]);
        assert_eq!(
            segments,
            vec![Segment::plain("leather "), Segment::matched("tote bag")]
        );
    }

    #[test]
    fn shorter_keyword_used_when_longer_hits_a_word_character() {
        let segments = annotate("leather tote bags", &["tote bag", "tote"]);
        assert_eq!(matched(&segments), vec!["tote"]);
        assert_eq!(joined(&segments), "leather tote bags");
    }

    #[test]
    fn source_casing_is_kept() {
        let segments = annotate("Handmade LEATHER tote", &["leather"]);
        assert_eq!(matched(&segments), vec!["LEATHER"]);
    }

    #[test]
    fn blank_keywords_behave_like_none() {
        let text = "Handmade leather tote";
        let blank = annotate(text, &["  ", "\t", ""]);
        let none = annotate::<&str>(text, &[]);
        assert_eq!(blank, none);
        assert_eq!(blank, vec![Segment::plain(text)]);
    }

    #[test]
    fn empty_text_is_one_plain_segment() {
        assert_eq!(annotate("", &["tote"]), vec![Segment::plain("")]);
    }

    #[test]
    fn non_latin_scripts_respect_word_boundaries() {
        let segments = annotate("حقيبة جلدية", &["جلد"]);
        assert!(matched(&segments).is_empty());

        let segments = annotate("حقيبة جلدية", &["جلدية"]);
        assert_eq!(matched(&segments), vec!["جلدية"]);

        let segments = annotate("Кожаная СУМКА ручной работы", &["сумка"]);
        assert_eq!(matched(&segments), vec!["СУМКА"]);
    }

    #[test]
    fn combining_marks_are_not_word_characters() {
        let segments = annotate("كتابٌ جميل", &["كتاب"]);
        assert_eq!(matched(&segments), vec!["كتاب"]);
        assert_eq!(joined(&segments), "كتابٌ جميل");

        assert!(!is_word_char('\u{064C}'));
        assert!(!is_word_char('\u{0301}'));
        assert!(is_word_char('ب'));
        assert!(is_word_char('٣'));
    }

    #[test]
    fn digits_and_underscores_are_word_characters() {
        assert!(matched(&annotate("tote2 tote_bag", &["tote"])).is_empty());
        assert_eq!(matched(&annotate("(tote), tote!", &["tote"])), vec!["tote", "tote"]);
    }

    #[test]
    fn metacharacters_match_literally() {
        let segments = annotate("learn c++ today, not c", &["c++"]);
        assert_eq!(matched(&segments), vec!["c++"]);
        assert!(matched(&annotate("a.b and axb", &["a.b"])).len() == 1);
    }

    #[test]
    fn adjacent_matches_are_separate_segments() {
        let segments = annotate("tote,tote", &["tote"]);
        assert_eq!(
            segments,
            vec![
                Segment::matched("tote"),
                Segment::plain(","),
                Segment::matched("tote"),
            ]
        );
    }

    #[test]
    fn keywords_in_text_keeps_input_order() {
        let title = "Leather Tote Bag with Brass Fittings";
        let keywords = ["brass fittings", "carpet", " ", "leather tote", "tote"];
        assert_eq!(
            keywords_in_text(title, &keywords),
            vec!["brass fittings", "leather tote", "tote"]
        );
    }

    #[test]
    fn matcher_is_reusable() {
        let matcher = KeywordMatcher::new(&["tote"]).unwrap();
        assert!(matcher.is_match("a tote"));
        assert!(!matcher.is_match("totes"));
        assert_eq!(matcher.find_iter("tote and tote").count(), 2);
    }
}
