//! Mention-level and pair-level feature vectors
//!
//! The concatenation order below is the schema the scorer was trained on.
//! Mention vector (with embedding width `D`):
//!
//! ```text
//! head | first word | last word | 1st after | 2nd after | 1st before | 2nd before   7 × D
//! mean(preceding) | mean(following) | mean(mention) | mean(sentence)              4 × D
//! mention type one-hot                                                            4
//! person, demonstratives ×3, reflexive, sentence-initial, pronoun-or-zero,
//! digit in head, digit in mention, letter in mention, post-modified              11
//! ```
//!
//! Pair vector: `ante mention vector | ana mention vector | pair features (60)`.

use std::sync::{Arc, LazyLock};

use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;
use regex::Regex;

use crate::kernel::normalized_sk;
use crate::resources::{EmbeddingProvider, LexicalResources};
use crate::types::{Gender, Mention, Number, Person, Word};

pub const NOUN_TAGS: &[&str] = &["subst", "ger", "depr"];
pub const PPRON_TAGS: &[&str] = &["ppron12", "ppron3"];
pub const ZERO_TAGS: &[&str] = &["fin", "praet", "bedzie", "impt", "winien", "aglt"];
pub const SIEBIE_TAGS: &[&str] = &["siebie"];

pub const INDICATIVE_PRONS_BASES: &[&str] = &[
    "ten", "ta", "to", "ci", "te", "tamten", "tamta", "tamto", "tamci", "tamte", "ów", "owa",
    "owo", "owi", "owe",
];

/// Width of each one-hot distance block: ten numeric bands plus the sentinel
pub const DISTANCE_BUCKETS: usize = 11;

/// Sentinel bucket for overlapping spans and negative distances
pub const OVERLAP_BUCKET: usize = 10;

/// Number of pair-level features
pub const PAIR_FEATURES: usize = 60;

const MENTION_EMBEDDING_SLOTS: usize = 11;
const MENTION_TYPE_WIDTH: usize = 4;
const MENTION_SCALARS: usize = 11;
const RANDOM_RANGE: f32 = 0.25;

/// Length of one mention's vector for embeddings of width `dim`
#[must_use]
pub const fn mention_vector_width(dim: usize) -> usize {
    MENTION_EMBEDDING_SLOTS * dim + MENTION_TYPE_WIDTH + MENTION_SCALARS
}

/// Length of a full pair vector for embeddings of width `dim`
#[must_use]
pub const fn pair_vector_width(dim: usize) -> usize {
    2 * mention_vector_width(dim) + PAIR_FEATURES
}

static DIGIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d").expect("valid regex"));

/// Builds feature vectors from mentions, lexical resources and embeddings
pub struct FeatureExtractor {
    resources: Arc<LexicalResources>,
    embeddings: Arc<dyn EmbeddingProvider>,
    random_word_vectors: bool,
    seed: Option<u64>,
}

impl std::fmt::Debug for FeatureExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureExtractor")
            .field("embedding_dim", &self.embeddings.dim())
            .field("random_word_vectors", &self.random_word_vectors)
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}

impl FeatureExtractor {
    #[must_use]
    pub fn new(resources: Arc<LexicalResources>, embeddings: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            resources,
            embeddings,
            random_word_vectors: true,
            seed: None,
        }
    }

    /// Whether unknown context words get a random vector instead of being skipped
    #[must_use]
    pub fn with_random_word_vectors(mut self, enabled: bool) -> Self {
        self.random_word_vectors = enabled;
        self
    }

    /// Derive fallback vectors from `seed` and the lemma instead of the thread RNG
    #[must_use]
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn resources(&self) -> &LexicalResources {
        &self.resources
    }

    #[must_use]
    pub fn embedding_dim(&self) -> usize {
        self.embeddings.dim()
    }

    /// Length of a single mention's feature vector
    #[must_use]
    pub fn mention_width(&self) -> usize {
        mention_vector_width(self.embedding_dim())
    }

    /// Length of the concatenated `ante | ana | pair` vector
    #[must_use]
    pub fn pair_vector_len(&self) -> usize {
        2 * self.mention_width() + PAIR_FEATURES
    }

    /// Length of each side of a siamese input, `mention | pair`
    #[must_use]
    pub fn siamese_vector_len(&self) -> usize {
        self.mention_width() + PAIR_FEATURES
    }

    /// Compute the mention-level vector; called once per mention
    #[must_use]
    pub fn mention_features(&self, mention: &Mention) -> Vec<f32> {
        let mut vec = Vec::with_capacity(self.mention_width());

        let head_lemma = mention
            .head
            .as_ref()
            .map_or(mention.head_orth.as_str(), |h| h.base.as_str());
        vec.extend(self.word_vec(head_lemma));
        vec.extend(self.optional_word_vec(mention.words.first()));
        vec.extend(self.optional_word_vec(mention.words.last()));
        vec.extend(self.optional_word_vec(mention.follow_context.first()));
        vec.extend(self.optional_word_vec(mention.follow_context.get(1)));
        vec.extend(self.optional_word_vec(mention.prec_context.last()));
        vec.extend(self.optional_word_vec(
            mention
                .prec_context
                .len()
                .checked_sub(2)
                .and_then(|i| mention.prec_context.get(i)),
        ));
        vec.extend(self.context_vec(&mention.prec_context));
        vec.extend(self.context_vec(&mention.follow_context));
        vec.extend(self.context_vec(&mention.words));
        vec.extend(self.context_vec(&mention.sentence));

        vec.extend(MentionType::of(mention).one_hot());

        vec.push(is_first_second_person(mention));
        vec.push(is_demonstrative(mention));
        vec.push(is_demonstrative_nominal(mention));
        vec.push(is_demonstrative_pronoun(mention));
        vec.push(is_refl_pronoun(mention));
        vec.push(flag(mention.first_in_sentence));
        vec.push(is_zero_or_pronoun(mention));
        vec.push(flag(DIGIT.is_match(&mention.head_orth)));
        vec.push(flag(DIGIT.is_match(&mention.text)));
        vec.push(flag(mention.text.chars().any(char::is_alphabetic)));
        vec.push(post_modified(mention));

        vec
    }

    /// Compute the pair-level features for `(ante, ana)`
    #[must_use]
    pub fn pair_features(&self, ante: &Mention, ana: &Mention) -> Vec<f32> {
        let res = self.resources();
        let mut vec = Vec::with_capacity(PAIR_FEATURES);

        vec.extend(distances_vec(ante, ana));
        vec.push(head_match(ante, ana));
        vec.push(exact_match(ante, ana));
        vec.push(base_match(ante, ana));

        vec.push(ante_contains_rarest_from_ana(ante, ana));
        vec.extend(Agreement::gender(ante, ana).one_hot());
        vec.extend(Agreement::number(ante, ana).one_hot());
        vec.extend(Agreement::person(ante, ana).one_hot());
        vec.push(is_acronym(ante, ana));
        vec.push(flag(same_sentence(ante, ana)));
        vec.push(flag(ante.paragraph_id == ana.paragraph_id));

        vec.push(flag(neighbouring_sentence(ante, ana)));
        vec.push(flag(sentence_gap(ante, ana) == 2));
        vec.push(flag(sentence_gap(ante, ana) > 2));
        vec.extend(Agreement::flat_gender(ante, ana).one_hot());
        vec.push(left_match(ante, ana));
        vec.push(right_match(ante, ana));
        vec.push(abbrev2(ante, ana));

        vec.push(kernel_similarity(&ante.text, &ana.text));
        vec.push(kernel_similarity(&ante.head_orth, &ana.head_orth));

        vec.push(wordnet_synonyms(res, ante, ana));
        vec.push(wordnet_ana_is_hypernym(res, ante, ana));
        vec.push(wordnet_ante_is_hypernym(res, ante, ana));

        vec.push(wikipedia_link(res, ante, ana));
        vec.push(wikipedia_mutual_link(res, ante, ana));
        vec.push(wikipedia_redirect(res, ante, ana));

        vec.push(samesent_anapron_antefirstinpar(ante, ana));
        vec.push(samesent_antefirstinpar_personnumbermatch(ante, ana));
        vec.push(adjsent_anapron_adjmen_personnumbermatch(ante, ana));
        vec.push(adjsent_anapron_adjmen(ante, ana));

        debug_assert_eq!(vec.len(), PAIR_FEATURES);
        vec
    }

    /// `ante.features | ana.features | pair features`
    #[must_use]
    pub fn pair_vector(&self, ante: &Mention, ana: &Mention) -> Vec<f32> {
        let pair = self.pair_features(ante, ana);
        let mut vec = Vec::with_capacity(ante.features.len() + ana.features.len() + pair.len());
        vec.extend_from_slice(&ante.features);
        vec.extend_from_slice(&ana.features);
        vec.extend(pair);
        vec
    }

    /// `(ante.features | pair, ana.features | pair)` for a siamese scorer
    #[must_use]
    pub fn siamese_vectors(&self, ante: &Mention, ana: &Mention) -> (Vec<f32>, Vec<f32>) {
        let pair = self.pair_features(ante, ana);
        let side = |mention: &Mention| {
            let mut vec = Vec::with_capacity(mention.features.len() + pair.len());
            vec.extend_from_slice(&mention.features);
            vec.extend_from_slice(&pair);
            vec
        };
        (side(ante), side(ana))
    }

    /// Embedding for `lemma`, or a random vector when unknown
    fn word_vec(&self, lemma: &str) -> Vec<f32> {
        self.embeddings
            .embed(lemma)
            .map_or_else(|| self.random_vec(lemma), <[f32]>::to_vec)
    }

    /// Embedding of an optional neighbour, zeros when there is none
    fn optional_word_vec(&self, word: Option<&Word>) -> Vec<f32> {
        word.map_or_else(|| vec![0.0; self.embedding_dim()], |w| self.word_vec(&w.base))
    }

    /// Mean embedding over `words`.
    ///
    /// Unknown lemmas get random vectors when `random_word_vectors` is on and
    /// are skipped otherwise; if every lemma was skipped the result is random.
    /// An empty pool yields zeros.
    fn context_vec(&self, words: &[Word]) -> Vec<f32> {
        let dim = self.embedding_dim();
        let mut sum = vec![0.0_f32; dim];
        if words.is_empty() {
            return sum;
        }

        let mut known = 0_usize;
        for word in words {
            let vec = match self.embeddings.embed(&word.base) {
                Some(v) => v.to_vec(),
                None if self.random_word_vectors => self.random_vec(&word.base),
                None => continue,
            };
            for (acc, v) in sum.iter_mut().zip(vec) {
                *acc += v;
            }
            known += 1;
        }

        if known == 0 {
            let key: Vec<&str> = words.iter().map(|w| w.base.as_str()).collect();
            return self.random_vec(&key.join(" "));
        }
        #[allow(clippy::cast_precision_loss)]
        let count = known as f32;
        sum.iter_mut().for_each(|v| *v /= count);
        sum
    }

    fn random_vec(&self, key: &str) -> Vec<f32> {
        let dist = Uniform::new_inclusive(-RANDOM_RANGE, RANDOM_RANGE);
        let dim = self.embedding_dim();
        match self.seed {
            Some(seed) => {
                let mut rng = StdRng::seed_from_u64(seed ^ fnv1a(key));
                (0..dim).map(|_| dist.sample(&mut rng)).collect()
            }
            None => {
                let mut rng = rand::thread_rng();
                (0..dim).map(|_| dist.sample(&mut rng)).collect()
            }
        }
    }
}

/// 64-bit FNV-1a over the UTF-8 bytes of `key`
fn fnv1a(key: &str) -> u64 {
    key.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

const fn flag(value: bool) -> f32 {
    if value {
        1.0
    } else {
        0.0
    }
}

fn head_ctag_in(mention: &Mention, tags: &[&str]) -> bool {
    mention
        .head
        .as_ref()
        .is_some_and(|h| tags.contains(&h.ctag.as_str()))
}

/// Coarse mention category from the head's part of speech
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MentionType {
    Noun,
    PersonalPronoun,
    Zero,
    Other,
}

impl MentionType {
    #[must_use]
    pub fn of(mention: &Mention) -> Self {
        let Some(head) = &mention.head else {
            return Self::Other;
        };
        let ctag = head.ctag.as_str();
        if NOUN_TAGS.contains(&ctag) {
            Self::Noun
        } else if PPRON_TAGS.contains(&ctag) {
            Self::PersonalPronoun
        } else if ZERO_TAGS.contains(&ctag) {
            Self::Zero
        } else {
            Self::Other
        }
    }

    #[must_use]
    pub const fn one_hot(self) -> [f32; 4] {
        match self {
            Self::Noun => [1.0, 0.0, 0.0, 0.0],
            Self::PersonalPronoun => [0.0, 1.0, 0.0, 0.0],
            Self::Zero => [0.0, 0.0, 1.0, 0.0],
            Self::Other => [0.0, 0.0, 0.0, 1.0],
        }
    }
}

// mention features

#[must_use]
pub fn is_first_second_person(mention: &Mention) -> f32 {
    flag(
        mention
            .head
            .as_ref()
            .is_some_and(|h| matches!(h.person, Person::Pri | Person::Sec)),
    )
}

#[must_use]
pub fn is_demonstrative(mention: &Mention) -> f32 {
    flag(mention.words.first().is_some_and(|w| {
        INDICATIVE_PRONS_BASES.contains(&w.base.to_lowercase().as_str())
    }))
}

#[must_use]
pub fn is_demonstrative_nominal(mention: &Mention) -> f32 {
    flag(is_demonstrative(mention) > 0.0 && head_ctag_in(mention, NOUN_TAGS))
}

#[must_use]
pub fn is_demonstrative_pronoun(mention: &Mention) -> f32 {
    flag(is_demonstrative(mention) > 0.0 && is_zero_or_pronoun(mention) > 0.0)
}

#[must_use]
pub fn is_refl_pronoun(mention: &Mention) -> f32 {
    flag(head_ctag_in(mention, SIEBIE_TAGS))
}

#[must_use]
pub fn is_zero_or_pronoun(mention: &Mention) -> f32 {
    flag(head_ctag_in(mention, PPRON_TAGS) || head_ctag_in(mention, ZERO_TAGS))
}

#[must_use]
pub fn post_modified(mention: &Mention) -> f32 {
    flag(mention.words.last().is_some_and(|w| w.orth != mention.head_orth))
}

// pair features

/// Map a distance onto one of the bands 0..=9; negative distances fall into the sentinel
#[must_use]
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
pub const fn distance_bucket(distance: i64) -> usize {
    match distance {
        0..=4 => distance as usize,
        5..=7 => 5,
        8..=15 => 6,
        16..=31 => 7,
        32..=63 => 8,
        64.. => 9,
        _ => OVERLAP_BUCKET,
    }
}

#[allow(clippy::cast_possible_wrap)]
const fn signed(value: usize) -> i64 {
    value as i64
}

/// Token-distance one-hot, mention-distance one-hot, overlap flag
#[must_use]
pub fn distances_vec(ante: &Mention, ana: &Mention) -> Vec<f32> {
    let overlap = ante.overlaps(ana);
    let (words_bucket, mentions_bucket) = if overlap {
        (OVERLAP_BUCKET, OVERLAP_BUCKET)
    } else {
        let words_bucket =
            distance_bucket(signed(ana.start_in_words) - signed(ante.end_in_words));
        let mentions_bucket = if words_bucket == OVERLAP_BUCKET {
            OVERLAP_BUCKET
        } else {
            distance_bucket(signed(ana.position_in_mentions) - signed(ante.position_in_mentions))
        };
        (words_bucket, mentions_bucket)
    };

    let mut vec = vec![0.0; 2 * DISTANCE_BUCKETS + 1];
    vec[words_bucket] = 1.0;
    vec[DISTANCE_BUCKETS + mentions_bucket] = 1.0;
    vec[2 * DISTANCE_BUCKETS] = flag(overlap);
    vec
}

/// 1.0 when the mentions share a token; such pairs are never scored
#[must_use]
pub fn pair_intersect(ante: &Mention, ana: &Mention) -> f32 {
    flag(ante.overlaps(ana))
}

#[allow(clippy::cast_possible_truncation)]
fn kernel_similarity(a: &str, b: &str) -> f32 {
    normalized_sk(a, b) as f32
}

#[must_use]
pub fn head_match(ante: &Mention, ana: &Mention) -> f32 {
    flag(ante.head_orth.to_lowercase() == ana.head_orth.to_lowercase())
}

#[must_use]
pub fn exact_match(ante: &Mention, ana: &Mention) -> f32 {
    flag(ante.text.to_lowercase() == ana.text.to_lowercase())
}

#[must_use]
pub fn base_match(ante: &Mention, ana: &Mention) -> f32 {
    flag(ante.lemmatized_text.to_lowercase() == ana.lemmatized_text.to_lowercase())
}

#[must_use]
pub fn ante_contains_rarest_from_ana(ante: &Mention, ana: &Mention) -> f32 {
    flag(ante.words.iter().any(|w| w.base == ana.rarest.base))
}

/// Three-way agreement between the heads of two mentions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Agreement {
    Agree,
    Disagree,
    Unknown,
}

impl Agreement {
    fn compare<T: Copy>(
        ante: &Mention,
        ana: &Mention,
        attr: fn(&Word) -> T,
        known: fn(T) -> bool,
        same: fn(T, T) -> bool,
    ) -> Self {
        match (&ante.head, &ana.head) {
            (Some(a), Some(b)) if known(attr(a)) && known(attr(b)) => {
                if same(attr(a), attr(b)) {
                    Self::Agree
                } else {
                    Self::Disagree
                }
            }
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub fn gender(ante: &Mention, ana: &Mention) -> Self {
        Self::compare(ante, ana, |w| w.gender, Gender::is_known, |a, b| a == b)
    }

    /// Gender agreement where all masculine subcategories agree with each other
    #[must_use]
    pub fn flat_gender(ante: &Mention, ana: &Mention) -> Self {
        Self::compare(
            ante,
            ana,
            |w| w.gender,
            Gender::is_known,
            |a: Gender, b: Gender| a == b || (a.is_masculine() && b.is_masculine()),
        )
    }

    #[must_use]
    pub fn number(ante: &Mention, ana: &Mention) -> Self {
        Self::compare(ante, ana, |w| w.number, Number::is_known, |a, b| a == b)
    }

    #[must_use]
    pub fn person(ante: &Mention, ana: &Mention) -> Self {
        Self::compare(ante, ana, |w| w.person, Person::is_known, |a, b| a == b)
    }

    #[must_use]
    pub const fn one_hot(self) -> [f32; 3] {
        match self {
            Self::Agree => [1.0, 0.0, 0.0],
            Self::Disagree => [0.0, 1.0, 0.0],
            Self::Unknown => [0.0, 0.0, 1.0],
        }
    }

    #[must_use]
    pub const fn agrees(self) -> bool {
        matches!(self, Self::Agree)
    }
}

/// An all-uppercase mention spelling out the initials of the other, either way round
#[must_use]
pub fn is_acronym(ante: &Mention, ana: &Mention) -> f32 {
    if ana.text.to_uppercase() == ana.text {
        return flag(ana.text == initials(&ante.text));
    }
    if ante.text.to_uppercase() == ante.text {
        return flag(ante.text == initials(&ana.text));
    }
    0.0
}

/// Uppercased first letter of every whitespace- or hyphen-delimited token
#[must_use]
pub fn initials(expression: &str) -> String {
    expression
        .split('-')
        .flat_map(str::split_whitespace)
        .filter_map(|token| token.chars().find(|c| c.is_alphabetic()))
        .flat_map(char::to_uppercase)
        .collect()
}

#[must_use]
pub fn same_sentence(ante: &Mention, ana: &Mention) -> bool {
    ante.sentence_id == ana.sentence_id
}

/// Signed sentence distance from antecedent to anaphor
#[must_use]
pub const fn sentence_gap(ante: &Mention, ana: &Mention) -> i64 {
    signed(ana.sentence_id) - signed(ante.sentence_id)
}

#[must_use]
pub const fn neighbouring_sentence(ante: &Mention, ana: &Mention) -> bool {
    sentence_gap(ante, ana) == 1
}

#[must_use]
pub fn left_match(ante: &Mention, ana: &Mention) -> f32 {
    let (a, b) = (ante.text.to_lowercase(), ana.text.to_lowercase());
    flag(a.starts_with(&b) || b.starts_with(&a))
}

#[must_use]
pub fn right_match(ante: &Mention, ana: &Mention) -> f32 {
    let (a, b) = (ante.text.to_lowercase(), ana.text.to_lowercase());
    flag(a.ends_with(&b) || b.ends_with(&a))
}

/// Capital initials of the mention's words, as written
#[must_use]
pub fn abbreviation(mention: &Mention) -> String {
    mention
        .words
        .iter()
        .filter_map(|w| w.orth.chars().next())
        .filter(|c| c.is_uppercase())
        .collect()
}

#[must_use]
pub fn abbrev2(ante: &Mention, ana: &Mention) -> f32 {
    flag(ante.head_orth == abbreviation(ana) || ana.head_orth == abbreviation(ante))
}

fn head_bases<'a>(ante: &'a Mention, ana: &'a Mention) -> Option<(&'a str, &'a str)> {
    Some((ante.head.as_ref()?.base.as_str(), ana.head.as_ref()?.base.as_str()))
}

#[must_use]
pub fn wordnet_synonyms(res: &LexicalResources, ante: &Mention, ana: &Mention) -> f32 {
    let Some((ante_base, ana_base)) = head_bases(ante, ana) else {
        return 0.0;
    };
    let listed = |lemma: &str, other: &str| res.synonyms(lemma).is_some_and(|s| s.contains(other));
    flag(listed(ante_base, ana_base) || listed(ana_base, ante_base))
}

/// `upper` is a hypernym of `lower`; both lemmas must have hypernym entries
fn is_hypernym_of(res: &LexicalResources, upper: &str, lower: &str) -> bool {
    match (res.hypernyms(lower), res.hypernyms(upper)) {
        (Some(lower_hyp), Some(upper_hyp)) if !lower_hyp.is_empty() && !upper_hyp.is_empty() => {
            lower_hyp.contains(upper)
        }
        _ => false,
    }
}

#[must_use]
pub fn wordnet_ana_is_hypernym(res: &LexicalResources, ante: &Mention, ana: &Mention) -> f32 {
    head_bases(ante, ana).map_or(0.0, |(ante_base, ana_base)| {
        flag(is_hypernym_of(res, ana_base, ante_base))
    })
}

#[must_use]
pub fn wordnet_ante_is_hypernym(res: &LexicalResources, ante: &Mention, ana: &Mention) -> f32 {
    head_bases(ante, ana).map_or(0.0, |(ante_base, ana_base)| {
        flag(is_hypernym_of(res, ante_base, ana_base))
    })
}

fn titles(ante: &Mention, ana: &Mention) -> (String, String) {
    (
        ante.lemmatized_text.to_lowercase(),
        ana.lemmatized_text.to_lowercase(),
    )
}

fn links_to(res: &LexicalResources, from: &str, to: &str) -> bool {
    res.wikilinks(from).is_some_and(|links| links.contains(to))
}

#[must_use]
pub fn wikipedia_link(res: &LexicalResources, ante: &Mention, ana: &Mention) -> f32 {
    let (a, b) = titles(ante, ana);
    flag(a == b || links_to(res, &a, &b) || links_to(res, &b, &a))
}

#[must_use]
pub fn wikipedia_mutual_link(res: &LexicalResources, ante: &Mention, ana: &Mention) -> f32 {
    let (a, b) = titles(ante, ana);
    flag(a == b || (links_to(res, &a, &b) && links_to(res, &b, &a)))
}

#[must_use]
pub fn wikipedia_redirect(res: &LexicalResources, ante: &Mention, ana: &Mention) -> f32 {
    let (a, b) = titles(ante, ana);
    flag(a == b || res.redirect(&a) == Some(b.as_str()) || res.redirect(&b) == Some(a.as_str()))
}

fn person_number_match(ante: &Mention, ana: &Mention) -> bool {
    Agreement::number(ante, ana).agrees() && Agreement::person(ante, ana).agrees()
}

fn adjacent_mentions(ante: &Mention, ana: &Mention) -> bool {
    signed(ana.position_in_mentions) - signed(ante.position_in_mentions) == 1
}

#[must_use]
pub fn samesent_anapron_antefirstinpar(ante: &Mention, ana: &Mention) -> f32 {
    flag(same_sentence(ante, ana) && is_zero_or_pronoun(ana) > 0.0 && ante.first_in_paragraph)
}

#[must_use]
pub fn samesent_antefirstinpar_personnumbermatch(ante: &Mention, ana: &Mention) -> f32 {
    flag(same_sentence(ante, ana) && ante.first_in_paragraph && person_number_match(ante, ana))
}

#[must_use]
pub fn adjsent_anapron_adjmen_personnumbermatch(ante: &Mention, ana: &Mention) -> f32 {
    flag(
        neighbouring_sentence(ante, ana)
            && is_zero_or_pronoun(ana) > 0.0
            && adjacent_mentions(ante, ana)
            && person_number_match(ante, ana),
    )
}

#[must_use]
pub fn adjsent_anapron_adjmen(ante: &Mention, ana: &Mention) -> f32 {
    flag(
        neighbouring_sentence(ante, ana)
            && is_zero_or_pronoun(ana) > 0.0
            && adjacent_mentions(ante, ana),
    )
}
