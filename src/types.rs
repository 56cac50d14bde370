//! Core document model: words, mentions and texts

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::context::MentionContext;
use crate::features::FeatureExtractor;

/// Part-of-speech tag marking punctuation tokens
pub const PUNCTUATION_TAG: &str = "interp";

/// Separator placed between the fragments of a discontinuous mention
pub const FRAGMENT_SEPARATOR: &str = " [...] ";

/// Grammatical gender parsed from a morphological tag
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    M1,
    M2,
    M3,
    F,
    N,
    #[default]
    Unk,
}

impl Gender {
    /// First matching tag in priority order wins
    #[must_use]
    pub fn from_msd(msd: &str) -> Self {
        let tags: Vec<&str> = msd.split(':').collect();
        [
            ("m1", Self::M1),
            ("m2", Self::M2),
            ("m3", Self::M3),
            ("f", Self::F),
            ("n", Self::N),
        ]
        .into_iter()
        .find(|(tag, _)| tags.contains(tag))
        .map_or(Self::Unk, |(_, gender)| gender)
    }

    #[must_use]
    pub const fn is_masculine(self) -> bool {
        matches!(self, Self::M1 | Self::M2 | Self::M3)
    }

    #[must_use]
    pub const fn is_known(self) -> bool {
        !matches!(self, Self::Unk)
    }
}

/// Grammatical person parsed from a morphological tag
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Person {
    Pri,
    Sec,
    Ter,
    #[default]
    Unk,
}

impl Person {
    #[must_use]
    pub fn from_msd(msd: &str) -> Self {
        let tags: Vec<&str> = msd.split(':').collect();
        [("pri", Self::Pri), ("sec", Self::Sec), ("ter", Self::Ter)]
            .into_iter()
            .find(|(tag, _)| tags.contains(tag))
            .map_or(Self::Unk, |(_, person)| person)
    }

    #[must_use]
    pub const fn is_known(self) -> bool {
        !matches!(self, Self::Unk)
    }
}

/// Grammatical number parsed from a morphological tag
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Number {
    Sg,
    Pl,
    #[default]
    Unk,
}

impl Number {
    #[must_use]
    pub fn from_msd(msd: &str) -> Self {
        let tags: Vec<&str> = msd.split(':').collect();
        if tags.contains(&"sg") {
            Self::Sg
        } else if tags.contains(&"pl") {
            Self::Pl
        } else {
            Self::Unk
        }
    }

    #[must_use]
    pub const fn is_known(self) -> bool {
        !matches!(self, Self::Unk)
    }
}

/// An atomic token (MMAX word or TEI segment)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Word {
    /// Format-native identifier, unique within the document
    pub id: String,

    /// Surface form
    pub orth: String,

    /// Base form (lemma)
    pub base: String,

    /// Part-of-speech tag
    pub ctag: String,

    /// Morphological tag string, colon-delimited
    pub msd: String,

    /// No preceding space when the text is rebuilt
    pub has_nps: bool,

    pub last_in_sentence: bool,
    pub last_in_paragraph: bool,

    pub gender: Gender,
    pub person: Person,
    pub number: Number,
}

impl Word {
    /// Create a word, deriving gender, person and number from `msd`
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        orth: impl Into<String>,
        base: impl Into<String>,
        ctag: impl Into<String>,
        msd: impl Into<String>,
    ) -> Self {
        let msd = msd.into();
        Self {
            id: id.into(),
            orth: orth.into(),
            base: base.into(),
            ctag: ctag.into(),
            gender: Gender::from_msd(&msd),
            person: Person::from_msd(&msd),
            number: Number::from_msd(&msd),
            msd,
            has_nps: false,
            last_in_sentence: false,
            last_in_paragraph: false,
        }
    }

    #[must_use]
    pub const fn with_nps(mut self, has_nps: bool) -> Self {
        self.has_nps = has_nps;
        self
    }

    #[must_use]
    pub const fn with_boundaries(mut self, last_in_sentence: bool, last_in_paragraph: bool) -> Self {
        self.last_in_sentence = last_in_sentence;
        self.last_in_paragraph = last_in_paragraph;
        self
    }

    /// Punctuation tokens stay in the stream but never enter derived context
    #[must_use]
    pub fn is_punctuation(&self) -> bool {
        self.ctag == PUNCTUATION_TAG
    }
}

/// Which string of a word to use when rebuilding text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Form {
    Orth,
    Base,
}

/// Join words into text, honouring the no-preceding-space flag
#[must_use]
pub fn words_to_text<'a>(words: impl IntoIterator<Item = &'a Word>, form: Form) -> String {
    let mut text = String::new();
    for (idx, word) in words.into_iter().enumerate() {
        if idx > 0 && !word.has_nps {
            text.push(' ');
        }
        text.push_str(match form {
            Form::Orth => &word.orth,
            Form::Base => &word.base,
        });
    }
    text
}

/// Span-level data an adapter resolves before the mention is assembled
#[derive(Debug, Clone)]
pub struct MentionSpan {
    pub id: String,
    pub text: String,
    pub lemmatized_text: String,
    pub words: Vec<Word>,
    pub head_orth: String,
    pub head: Option<Word>,
    pub position_in_mentions: usize,
    pub set: Option<String>,
    pub dominant: Option<String>,
}

/// A span of tokens referring to an entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mention {
    pub id: String,

    /// Coreference set id, `None` when unassigned
    pub set: Option<String>,

    /// Dominant-mention marker carried over from the coreference layer
    pub dominant: Option<String>,

    pub text: String,
    pub lemmatized_text: String,

    /// Component words, never empty, never punctuation
    pub words: Vec<Word>,

    pub head_orth: String,
    pub head: Option<Word>,

    /// Up to `context` words before the mention, nearest last
    pub prec_context: Vec<Word>,

    /// Up to `context` words after the mention, nearest first
    pub follow_context: Vec<Word>,

    /// Non-punctuation words of the enclosing sentence
    pub sentence: Vec<Word>,

    /// Zero-based position among all mentions in reading order
    pub position_in_mentions: usize,

    /// Offsets counted over non-punctuation tokens only
    pub start_in_words: usize,
    pub end_in_words: usize,

    /// Least frequent component word
    pub rarest: Word,

    pub paragraph_id: usize,
    pub sentence_id: usize,
    pub first_in_sentence: bool,
    pub first_in_paragraph: bool,

    /// Mention-level feature vector, computed once at construction
    #[serde(skip)]
    pub features: Vec<f32>,
}

impl Mention {
    /// Assemble a mention and compute its cached feature vector
    #[must_use]
    pub fn build(span: MentionSpan, context: MentionContext, extractor: &FeatureExtractor) -> Self {
        let rarest = extractor
            .resources()
            .rarest_word(&span.words)
            .cloned()
            .unwrap_or_default();
        let mut mention = Self {
            id: span.id,
            set: span.set,
            dominant: span.dominant,
            text: span.text,
            lemmatized_text: span.lemmatized_text,
            words: span.words,
            head_orth: span.head_orth,
            head: span.head,
            prec_context: context.prec_context,
            follow_context: context.follow_context,
            sentence: context.sentence,
            position_in_mentions: span.position_in_mentions,
            start_in_words: context.start_in_words,
            end_in_words: context.end_in_words,
            rarest,
            paragraph_id: context.paragraph_id,
            sentence_id: context.sentence_id,
            first_in_sentence: context.first_in_sentence,
            first_in_paragraph: context.first_in_paragraph,
            features: Vec::new(),
        };
        mention.features = extractor.mention_features(&mention);
        mention
    }

    /// Whether the two mentions share at least one token
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.words
            .iter()
            .any(|word| other.words.iter().any(|o| o.id == word.id))
    }

    #[must_use]
    pub fn is_in_set(&self) -> bool {
        self.set.is_some()
    }
}

/// A coreference set: its id and members in reading order
#[derive(Debug, Clone)]
pub struct MentionSet<'a> {
    pub id: &'a str,
    pub mentions: Vec<&'a Mention>,
}

impl MentionSet<'_> {
    /// The member with the most component words; the first one wins ties
    #[must_use]
    pub fn dominant(&self) -> Option<&Mention> {
        self.mentions
            .iter()
            .copied()
            .reduce(|best, mnt| if mnt.words.len() > best.words.len() { mnt } else { best })
    }
}

/// One document: mentions in reading order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Text {
    pub id: String,
    pub mentions: Vec<Mention>,

    /// Surface forms of every token (TEI documents)
    pub segments: Vec<String>,

    /// Flattened `(start, end)` offsets per cluster, for evaluation (TEI documents)
    pub clusters: Vec<Vec<(usize, usize)>>,
}

impl Text {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn get_mention(&self, mention_id: &str) -> Option<&Mention> {
        self.mentions.iter().find(|mnt| mnt.id == mention_id)
    }

    pub fn get_mention_mut(&mut self, mention_id: &str) -> Option<&mut Mention> {
        self.mentions.iter_mut().find(|mnt| mnt.id == mention_id)
    }

    #[must_use]
    pub fn mention_set(&self, mention_id: &str) -> Option<&str> {
        self.get_mention(mention_id)?.set.as_deref()
    }

    /// Group mentions by set id, sets ordered by their first member
    #[must_use]
    pub fn sets(&self) -> Vec<MentionSet<'_>> {
        let mut sets: Vec<MentionSet<'_>> = Vec::new();
        for mnt in &self.mentions {
            let Some(set_id) = mnt.set.as_deref() else {
                continue;
            };
            match sets.iter_mut().find(|s| s.id == set_id) {
                Some(set) => set.mentions.push(mnt),
                None => sets.push(MentionSet {
                    id: set_id,
                    mentions: vec![mnt],
                }),
            }
        }
        sets
    }

    /// Dominant mention of set `set_id`
    #[must_use]
    pub fn dominant_of(&self, set_id: &str) -> Option<&Mention> {
        self.mentions
            .iter()
            .filter(|mnt| mnt.set.as_deref() == Some(set_id))
            .reduce(|best, mnt| if mnt.words.len() > best.words.len() { mnt } else { best })
    }

    /// Every set id currently carried by some mention
    #[must_use]
    pub fn set_ids(&self) -> HashSet<String> {
        self.mentions.iter().filter_map(|m| m.set.clone()).collect()
    }

    /// Relabel every mention of set `from` as set `into`
    pub fn merge_sets(&mut self, from: &str, into: &str) {
        for mnt in &mut self.mentions {
            if mnt.set.as_deref() == Some(from) {
                mnt.set = Some(into.to_string());
            }
        }
    }

    /// Drop every set assignment
    pub fn clear_sets(&mut self) {
        for mnt in &mut self.mentions {
            mnt.set = None;
            mnt.dominant = None;
        }
    }
}

/// Mints `set_N` identifiers that no mention of the document carries yet
#[derive(Debug, Clone, Default)]
pub struct SetIdAllocator {
    next: usize,
    taken: HashSet<String>,
}

impl SetIdAllocator {
    /// Start an allocator that avoids every set id already in `text`
    #[must_use]
    pub fn for_text(text: &Text) -> Self {
        Self {
            next: 0,
            taken: text.set_ids(),
        }
    }

    /// Return the next free id and reserve it
    pub fn mint(&mut self) -> String {
        loop {
            let candidate = format!("set_{}", self.next);
            self.next += 1;
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}
