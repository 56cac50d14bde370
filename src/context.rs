//! Positional context shared by both corpus adapters
//!
//! Every function here walks a document's token stream (punctuation included)
//! and derives values measured over non-punctuation tokens only. Adapters own
//! reference resolution; once a mention's first and last stream indices are
//! known, [`gather`] computes the rest.

use crate::types::Word;

/// Default context window size, in non-punctuation words
pub const DEFAULT_CONTEXT: usize = 5;

/// Reader switches shared by both corpus adapters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    /// Context window size, in non-punctuation words
    pub context: usize,

    /// Drop coreference sets already present in the input
    pub clear_sets: bool,

    /// Add every unclustered mention as its own cluster (TEI documents)
    pub singleton_clusters: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            context: DEFAULT_CONTEXT,
            clear_sets: false,
            singleton_clusters: true,
        }
    }
}

/// Everything about a mention that depends on its position in the stream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MentionContext {
    pub prec_context: Vec<Word>,
    pub follow_context: Vec<Word>,
    pub sentence: Vec<Word>,
    pub start_in_words: usize,
    pub end_in_words: usize,
    pub paragraph_id: usize,
    pub sentence_id: usize,
    pub first_in_sentence: bool,
    pub first_in_paragraph: bool,
}

/// Token whose position fixes a mention's sentence and paragraph ids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdAnchor {
    /// Count boundaries before the first token (TEI)
    First,

    /// Count boundaries before the last token (MMAX)
    Last,
}

/// Derive the positional context of a mention spanning `first..=last`
#[must_use]
pub fn gather(
    stream: &[Word],
    first: usize,
    last: usize,
    size: usize,
    anchor: IdAnchor,
) -> MentionContext {
    let before = match anchor {
        IdAnchor::First => &stream[..first],
        IdAnchor::Last => &stream[..last],
    };
    MentionContext {
        prec_context: preceding_context(stream, first, size),
        follow_context: following_context(stream, last, size),
        sentence: sentence_words(stream, last),
        start_in_words: token_offset(stream, first),
        end_in_words: token_offset(stream, last),
        paragraph_id: before.iter().filter(|w| w.last_in_paragraph).count(),
        sentence_id: before.iter().filter(|w| w.last_in_sentence).count(),
        first_in_sentence: first == 0 || stream[first - 1].last_in_sentence,
        first_in_paragraph: first == 0 || stream[first - 1].last_in_paragraph,
    }
}

/// Up to `size` non-punctuation words before `idx`, nearest last
#[must_use]
pub fn preceding_context(stream: &[Word], idx: usize, size: usize) -> Vec<Word> {
    let mut context: Vec<Word> = stream[..idx.min(stream.len())]
        .iter()
        .rev()
        .filter(|w| !w.is_punctuation())
        .take(size)
        .cloned()
        .collect();
    context.reverse();
    context
}

/// Up to `size` non-punctuation words after `idx`, nearest first
#[must_use]
pub fn following_context(stream: &[Word], idx: usize, size: usize) -> Vec<Word> {
    stream
        .iter()
        .skip(idx + 1)
        .filter(|w| !w.is_punctuation())
        .take(size)
        .cloned()
        .collect()
}

/// Number of non-punctuation tokens strictly before `idx`
#[must_use]
pub fn token_offset(stream: &[Word], idx: usize) -> usize {
    stream[..idx.min(stream.len())]
        .iter()
        .filter(|w| !w.is_punctuation())
        .count()
}

/// One past the nearest sentence boundary before `idx`, or the stream start
#[must_use]
pub fn sentence_start(stream: &[Word], idx: usize) -> usize {
    stream[..idx.min(stream.len())]
        .iter()
        .rposition(|w| w.last_in_sentence)
        .map_or(0, |boundary| boundary + 1)
}

/// The nearest sentence boundary at or after `idx`, or the stream end
#[must_use]
pub fn sentence_end(stream: &[Word], idx: usize) -> usize {
    stream
        .iter()
        .skip(idx)
        .position(|w| w.last_in_sentence)
        .map_or(stream.len().saturating_sub(1), |offset| idx + offset)
}

/// Non-punctuation words of the sentence containing `idx`
#[must_use]
pub fn sentence_words(stream: &[Word], idx: usize) -> Vec<Word> {
    if stream.is_empty() {
        return Vec::new();
    }
    let start = sentence_start(stream, idx);
    let end = sentence_end(stream, idx);
    stream[start..=end]
        .iter()
        .filter(|w| !w.is_punctuation())
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two sentences: "Ala ma kota . On śpi ."
    fn stream() -> Vec<Word> {
        vec![
            Word::new("w0", "Ala", "Ala", "subst", "sg:nom:f"),
            Word::new("w1", "ma", "mieć", "fin", "sg:ter:imperf"),
            Word::new("w2", "kota", "kot", "subst", "sg:acc:m2"),
            Word::new("w3", ".", ".", "interp", "").with_boundaries(true, false),
            Word::new("w4", "On", "on", "ppron3", "sg:nom:m1:ter"),
            Word::new("w5", ",", ",", "interp", ""),
            Word::new("w6", "śpi", "spać", "fin", "sg:ter:imperf"),
            Word::new("w7", ".", ".", "interp", "").with_boundaries(true, true),
        ]
    }

    fn ids(words: &[Word]) -> Vec<&str> {
        words.iter().map(|w| w.id.as_str()).collect()
    }

    #[test]
    fn test_context_windows_skip_punctuation() {
        let s = stream();
        assert_eq!(ids(&preceding_context(&s, 6, 5)), ["w0", "w1", "w2", "w4"]);
        assert_eq!(ids(&preceding_context(&s, 6, 2)), ["w2", "w4"]);
        assert_eq!(ids(&following_context(&s, 2, 5)), ["w4", "w6"]);
        assert!(following_context(&s, 7, 5).is_empty());
        assert!(preceding_context(&s, 0, 5).is_empty());
    }

    #[test]
    fn test_sentence_boundaries() {
        let s = stream();
        assert_eq!(sentence_start(&s, 1), 0);
        assert_eq!(sentence_end(&s, 1), 3);
        assert_eq!(sentence_start(&s, 4), 4);
        assert_eq!(sentence_end(&s, 4), 7);
        // a boundary token belongs to the sentence it closes
        assert_eq!(sentence_start(&s, 3), 0);
        assert_eq!(ids(&sentence_words(&s, 6)), ["w4", "w6"]);
    }

    #[test]
    fn test_gather_positions_and_flags() {
        let s = stream();
        let ctx = gather(&s, 4, 4, DEFAULT_CONTEXT, IdAnchor::First);
        assert_eq!(ctx.start_in_words, 3);
        assert_eq!(ctx.end_in_words, 3);
        assert_eq!(ctx.sentence_id, 1);
        assert_eq!(ctx.paragraph_id, 0);
        assert!(ctx.first_in_sentence);
        assert!(!ctx.first_in_paragraph);

        let ctx = gather(&s, 0, 2, DEFAULT_CONTEXT, IdAnchor::First);
        assert!(ctx.first_in_sentence && ctx.first_in_paragraph);
        assert_eq!((ctx.start_in_words, ctx.end_in_words), (0, 2));
        assert_eq!(ids(&ctx.follow_context), ["w4", "w6"]);
    }

    #[test]
    fn test_ids_follow_anchor_across_sentence_end() {
        // "Ala ma kota . On" read as one span
        let s = stream();
        let last = gather(&s, 0, 4, DEFAULT_CONTEXT, IdAnchor::Last);
        assert_eq!(last.sentence_id, 1);
        assert_eq!(last.paragraph_id, 0);
        assert!(last.first_in_sentence);

        let first = gather(&s, 0, 4, DEFAULT_CONTEXT, IdAnchor::First);
        assert_eq!(first.sentence_id, 0);

        let s: Vec<Word> = stream().into_iter().chain(stream()).collect();
        let ctx = gather(&s, 6, 10, DEFAULT_CONTEXT, IdAnchor::Last);
        assert_eq!(ctx.sentence_id, 2);
        assert_eq!(ctx.paragraph_id, 1);
    }

    #[test]
    fn test_unterminated_sentence_runs_to_stream_end() {
        let s: Vec<Word> = stream().into_iter().take(6).collect();
        assert_eq!(sentence_end(&s, 4), 5);
        assert_eq!(ids(&sentence_words(&s, 4)), ["w4"]);
    }
}
