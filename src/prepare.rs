//! Training data preparation
//!
//! Every gold pair of mentions (both in the same set) becomes a positive
//! sample, and a random selection of the remaining pairs becomes negatives.
//! Samples are written as TSV lines: the pair vector, then the label.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::ops::AddAssign;
use std::path::Path;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::context::ReadOptions;
use crate::error::{Error, Result};
use crate::features::FeatureExtractor;
use crate::pipeline::InputFormat;
use crate::types::Text;

/// Default number of negatives sampled per positive
pub const DEFAULT_PROPORTION: usize = 5;

/// Index pair `(ante, ana)` into `Text::mentions`, `ante < ana`
pub type MentionPair = (usize, usize);

/// Samples written so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleCounts {
    pub positives: usize,
    pub negatives: usize,
}

impl AddAssign for SampleCounts {
    fn add_assign(&mut self, other: Self) {
        self.positives += other.positives;
        self.negatives += other.negatives;
    }
}

/// Positive and sampled negative pairs of one document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrainingPairs {
    pub positives: Vec<MentionPair>,
    pub negatives: Vec<MentionPair>,
}

/// Every unordered pair of mentions sharing a set
#[must_use]
pub fn positive_pairs(text: &Text) -> Vec<MentionPair> {
    let mut pairs = Vec::new();
    for set in text.sets() {
        let members: Vec<usize> = text
            .mentions
            .iter()
            .enumerate()
            .filter(|(_, mnt)| mnt.set.as_deref() == Some(set.id))
            .map(|(idx, _)| idx)
            .collect();
        for (i, &ante) in members.iter().enumerate() {
            for &ana in &members[i + 1..] {
                pairs.push((ante, ana));
            }
        }
    }
    pairs
}

/// Gold pairs plus `proportion` negatives per positive, drawn from `rng`.
///
/// When too few negatives exist every one of them is used; with a proportion
/// of one the positives are then down-sampled to the same count.
pub fn training_pairs<R: Rng + ?Sized>(text: &Text, proportion: usize, rng: &mut R) -> TrainingPairs {
    let mut positives = positive_pairs(text);
    let gold: HashSet<MentionPair> = positives.iter().copied().collect();

    let count = text.mentions.len();
    let mut negatives: Vec<MentionPair> = (0..count)
        .flat_map(|ante| (ante + 1..count).map(move |ana| (ante, ana)))
        .filter(|pair| !gold.contains(pair))
        .collect();

    let mut wanted = proportion * positives.len();
    if wanted > negatives.len() {
        wanted = negatives.len();
        warn!(
            text = %text.id,
            positives = positives.len(),
            negatives = negatives.len(),
            "more positive than negative samples available"
        );
        if proportion == 1 {
            positives = sample(&positives, wanted, rng);
        }
    }
    negatives = sample(&negatives, wanted, rng);
    TrainingPairs {
        positives,
        negatives,
    }
}

fn sample<R: Rng + ?Sized>(pairs: &[MentionPair], amount: usize, rng: &mut R) -> Vec<MentionPair> {
    let mut chosen: Vec<MentionPair> = pairs.choose_multiple(rng, amount).copied().collect();
    chosen.sort_unstable();
    chosen
}

/// Write one TSV line per sample and return what was written
///
/// # Errors
///
/// Returns an error if the writer fails
pub fn write_samples<W: Write>(
    writer: &mut W,
    extractor: &FeatureExtractor,
    text: &Text,
    pairs: &TrainingPairs,
) -> Result<SampleCounts> {
    for (label, group) in [(1.0_f32, &pairs.positives), (0.0, &pairs.negatives)] {
        for &(ante, ana) in group {
            let vector = extractor.pair_vector(&text.mentions[ante], &text.mentions[ana]);
            let line: Vec<String> = vector
                .iter()
                .chain(std::iter::once(&label))
                .map(|value| format!("{value:?}"))
                .collect();
            writeln!(writer, "{}", line.join("\t"))?;
        }
    }
    Ok(SampleCounts {
        positives: pairs.positives.len(),
        negatives: pairs.negatives.len(),
    })
}

/// Build a training file from a document or a corpus directory.
///
/// Gold sets are kept as read. Documents that cannot be read are logged and
/// left out; `seed` makes the negative sampling reproducible.
///
/// # Errors
///
/// Returns [`Error::Config`] if `input` does not exist and an I/O error if the
/// output file cannot be written
pub fn prepare_path(
    input: &Path,
    output: &Path,
    format: InputFormat,
    extractor: &FeatureExtractor,
    proportion: usize,
    seed: Option<u64>,
) -> Result<SampleCounts> {
    if !input.exists() {
        return Err(Error::Config(format!(
            "input path does not exist: {}",
            input.display()
        )));
    }
    let documents = if format.is_document(input) {
        vec![input.to_path_buf()]
    } else {
        format.documents(input)?
    };

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let options = ReadOptions {
        clear_sets: false,
        ..ReadOptions::default()
    };

    let mut writer = BufWriter::new(File::create(output)?);
    let mut counts = SampleCounts::default();
    for document in &documents {
        info!(document = %document.display(), "preparing text");
        let text = match format.read(document, extractor, &options) {
            Ok(text) => text,
            Err(err) if err.is_document_local() => {
                error!(document = %document.display(), error = %err, "skipping document");
                continue;
            }
            Err(err) => return Err(err),
        };
        let pairs = training_pairs(&text, proportion, &mut rng);
        counts += write_samples(&mut writer, extractor, &text, &pairs)?;
    }
    writer.flush()?;

    info!(
        positives = counts.positives,
        negatives = counts.negatives,
        output = %output.display(),
        "training data written"
    );
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MentionContext;
    use crate::resources::{LexicalResources, WordVectors};
    use crate::types::{Mention, MentionSpan, Word};
    use std::sync::Arc;

    fn extractor() -> FeatureExtractor {
        FeatureExtractor::new(Arc::new(LexicalResources::new()), Arc::new(WordVectors::empty(2)))
            .with_seed(Some(3))
    }

    fn text(ex: &FeatureExtractor, sets: &[Option<&str>]) -> Text {
        let mut text = Text::new("t");
        for (idx, set) in sets.iter().enumerate() {
            let word = Word::new(format!("w{idx}"), "kot", "kot", "subst", "sg:nom:m2");
            let span = MentionSpan {
                id: format!("m{idx}"),
                text: "kot".to_string(),
                lemmatized_text: "kot".to_string(),
                words: vec![word],
                head_orth: "kot".to_string(),
                head: None,
                position_in_mentions: idx,
                set: set.map(str::to_string),
                dominant: None,
            };
            let context = MentionContext {
                start_in_words: idx,
                end_in_words: idx,
                ..MentionContext::default()
            };
            text.mentions.push(Mention::build(span, context, ex));
        }
        text
    }

    #[test]
    fn test_positive_pairs() {
        let ex = extractor();
        let text = text(&ex, &[Some("a"), None, Some("a"), Some("b"), Some("a"), Some("b")]);
        assert_eq!(positive_pairs(&text), vec![(0, 2), (0, 4), (2, 4), (3, 5)]);
    }

    #[test]
    fn test_negatives_follow_proportion() {
        let ex = extractor();
        let text = text(&ex, &[Some("a"), Some("a"), None, None, None, None]);
        let mut rng = StdRng::seed_from_u64(1);
        let pairs = training_pairs(&text, 5, &mut rng);
        assert_eq!(pairs.positives, vec![(0, 1)]);
        assert_eq!(pairs.negatives.len(), 5);
        assert!(pairs.negatives.iter().all(|&(a, b)| a < b && (a, b) != (0, 1)));
    }

    #[test]
    fn test_capped_negatives_downsample_positives() {
        let ex = extractor();
        // three positives, no other mention: exactly zero negatives remain
        let text = text(&ex, &[Some("a"), Some("a"), Some("a")]);
        let mut rng = StdRng::seed_from_u64(1);
        let pairs = training_pairs(&text, 1, &mut rng);
        assert!(pairs.negatives.is_empty());
        assert!(pairs.positives.is_empty());

        let text = text_with_one_outsider(&ex);
        let pairs = training_pairs(&text, 2, &mut rng);
        assert_eq!(pairs.positives.len(), 3);
        assert_eq!(pairs.negatives.len(), 3);
    }

    fn text_with_one_outsider(ex: &FeatureExtractor) -> Text {
        text(ex, &[Some("a"), Some("a"), Some("a"), None])
    }

    #[test]
    fn test_write_samples() {
        let ex = extractor();
        let text = text(&ex, &[Some("a"), Some("a"), None]);
        let pairs = TrainingPairs {
            positives: vec![(0, 1)],
            negatives: vec![(0, 2), (1, 2)],
        };
        let mut out = Vec::new();
        let counts = write_samples(&mut out, &ex, &text, &pairs).unwrap();
        assert_eq!(
            counts,
            SampleCounts {
                positives: 1,
                negatives: 2
            }
        );

        let written = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 3);
        for line in &lines {
            assert_eq!(line.split('\t').count(), ex.pair_vector_len() + 1);
        }
        assert!(lines[0].ends_with("\t1.0"));
        assert!(lines[2].ends_with("\t0.0"));
    }

    #[test]
    fn test_counts_accumulate() {
        let mut total = SampleCounts::default();
        total += SampleCounts {
            positives: 2,
            negatives: 10,
        };
        total += SampleCounts {
            positives: 1,
            negatives: 5,
        };
        assert_eq!(total.positives, 3);
        assert_eq!(total.negatives, 15);
    }
}
