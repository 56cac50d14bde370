//! Clustering algorithms over a document's mentions
//!
//! Every algorithm walks `text.mentions` in reading order, asks the scorer
//! about candidate pairs and writes set ids back into the mentions. Pairs
//! that share a token are never scored.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::features::FeatureExtractor;
use crate::scorer::Scorer;
use crate::types::{Mention, SetIdAllocator, Text};

/// Clustering strategy, selected once from configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResolverKind {
    /// Nearest antecedent above threshold wins
    Closest,

    /// Best-scoring antecedent above threshold wins
    Incremental,

    /// Mentions are compared against whole sets
    EntityBased,

    /// Best-scoring later partner, merging sets when both sides have one
    #[default]
    All2All,

    /// Nearest antecedent whose siamese distance falls below threshold
    Siamese,
}

impl ResolverKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closest => "closest",
            Self::Incremental => "incremental",
            Self::EntityBased => "entity_based",
            Self::All2All => "all2all",
            Self::Siamese => "siamese",
        }
    }
}

impl fmt::Display for ResolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResolverKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "closest" => Ok(Self::Closest),
            "incremental" => Ok(Self::Incremental),
            "entity_based" | "entity-based" => Ok(Self::EntityBased),
            "all2all" => Ok(Self::All2All),
            "siamese" => Ok(Self::Siamese),
            other => Err(Error::Config(format!("unknown resolver: {other}"))),
        }
    }
}

/// Runs one clustering strategy with a fixed threshold and scorer
#[derive(Clone)]
pub struct Resolver {
    kind: ResolverKind,
    threshold: f32,
    extractor: Arc<FeatureExtractor>,
    scorer: Arc<dyn Scorer>,
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("kind", &self.kind)
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}

impl Resolver {
    #[must_use]
    pub fn new(
        kind: ResolverKind,
        threshold: f32,
        extractor: Arc<FeatureExtractor>,
        scorer: Arc<dyn Scorer>,
    ) -> Self {
        Self {
            kind,
            threshold,
            extractor,
            scorer,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ResolverKind {
        self.kind
    }

    #[must_use]
    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    /// Assign set ids to the mentions of `text`
    ///
    /// # Errors
    ///
    /// Returns an error if the scorer fails; `text` may then carry a partial
    /// clustering and should be discarded
    pub async fn resolve(&self, text: &mut Text) -> Result<()> {
        debug!(
            text = %text.id,
            resolver = %self.kind,
            mentions = text.mentions.len(),
            "resolving"
        );
        match self.kind {
            ResolverKind::Closest => self.closest(text).await,
            ResolverKind::Incremental => self.incremental(text).await,
            ResolverKind::EntityBased => self.entity_based(text).await,
            ResolverKind::All2All => self.all2all(text).await,
            ResolverKind::Siamese => self.siamese(text).await,
        }
    }

    /// Scorer output for `(ante, ana)`, `None` when the mentions overlap
    async fn score(&self, ante: &Mention, ana: &Mention) -> Result<Option<f32>> {
        if ante.overlaps(ana) {
            return Ok(None);
        }
        let vector = self.extractor.pair_vector(ante, ana);
        let prediction = self.scorer.score(&vector).await?;
        trace!(ante = %ante.id, ana = %ana.id, prediction, "scored pair");
        Ok(Some(prediction))
    }

    async fn siamese_distance(&self, ante: &Mention, ana: &Mention) -> Result<Option<f32>> {
        if ante.overlaps(ana) {
            return Ok(None);
        }
        let (left, right) = self.extractor.siamese_vectors(ante, ana);
        let distance = self.scorer.score_pair(&left, &right).await?;
        trace!(ante = %ante.id, ana = %ana.id, distance, "scored pair");
        Ok(Some(distance))
    }

    async fn closest(&self, text: &mut Text) -> Result<()> {
        let mut ids = SetIdAllocator::for_text(text);
        for i in 1..text.mentions.len() {
            let mut chosen = None;
            for j in (0..i).rev() {
                let prediction = self.score(&text.mentions[j], &text.mentions[i]).await?;
                if prediction.is_some_and(|p| p > self.threshold) {
                    chosen = Some(j);
                    break;
                }
            }
            if let Some(j) = chosen {
                link_to_antecedent(text, j, i, &mut ids);
            }
        }
        Ok(())
    }

    async fn siamese(&self, text: &mut Text) -> Result<()> {
        let mut ids = SetIdAllocator::for_text(text);
        for i in 1..text.mentions.len() {
            let mut chosen = None;
            for j in (0..i).rev() {
                let distance = self
                    .siamese_distance(&text.mentions[j], &text.mentions[i])
                    .await?;
                if distance.is_some_and(|d| d < self.threshold) {
                    chosen = Some(j);
                    break;
                }
            }
            if let Some(j) = chosen {
                link_to_antecedent(text, j, i, &mut ids);
            }
        }
        Ok(())
    }

    async fn incremental(&self, text: &mut Text) -> Result<()> {
        let mut ids = SetIdAllocator::for_text(text);
        for i in 1..text.mentions.len() {
            let mut best: Option<(usize, f32)> = None;
            for j in 0..i {
                let Some(prediction) = self.score(&text.mentions[j], &text.mentions[i]).await?
                else {
                    continue;
                };
                if prediction > self.threshold && best.is_none_or(|(_, b)| prediction > b) {
                    best = Some((j, prediction));
                }
            }
            if let Some((j, _)) = best {
                link_to_antecedent(text, j, i, &mut ids);
            }
        }
        Ok(())
    }

    /// Mean score of `ana` against the members of a set; overlapping members count as 0
    async fn predict_set(&self, text: &Text, members: &[usize], ana: usize) -> Result<f32> {
        let mut sum = 0.0_f32;
        for &member in members {
            sum += self
                .score(&text.mentions[member], &text.mentions[ana])
                .await?
                .unwrap_or(0.0);
        }
        #[allow(clippy::cast_precision_loss)]
        let count = members.len() as f32;
        Ok(sum / count)
    }

    async fn entity_based(&self, text: &mut Text) -> Result<()> {
        let mut ids = SetIdAllocator::for_text(text);
        let mut sets: Vec<(String, Vec<usize>)> = Vec::new();

        for i in 0..text.mentions.len() {
            let mut best: Option<(usize, f32)> = None;
            for (set_idx, (_, members)) in sets.iter().enumerate() {
                let prediction = self.predict_set(text, members, i).await?;
                if prediction > self.threshold && best.is_none_or(|(_, b)| prediction > b) {
                    best = Some((set_idx, prediction));
                }
            }
            match best {
                Some((set_idx, _)) => {
                    let (set_id, members) = &mut sets[set_idx];
                    text.mentions[i].set = Some(set_id.clone());
                    members.push(i);
                }
                None => {
                    let set_id = ids.mint();
                    text.mentions[i].set = Some(set_id.clone());
                    sets.push((set_id, vec![i]));
                }
            }
        }

        for (_, members) in sets.iter().filter(|(_, members)| members.len() == 1) {
            text.mentions[members[0]].set = None;
        }
        Ok(())
    }

    async fn all2all(&self, text: &mut Text) -> Result<()> {
        let mut ids = SetIdAllocator::for_text(text);
        for pos1 in 0..text.mentions.len() {
            let mut best: Option<(usize, f32)> = None;
            for pos2 in pos1 + 1..text.mentions.len() {
                let (mnt1, mnt2) = (&text.mentions[pos1], &text.mentions[pos2]);
                if mnt1.set.is_some() && mnt1.set == mnt2.set {
                    continue;
                }
                let Some(prediction) = self.score(mnt1, mnt2).await? else {
                    continue;
                };
                if prediction > self.threshold && best.is_none_or(|(_, b)| prediction > b) {
                    best = Some((pos2, prediction));
                }
            }

            let Some((pos2, _)) = best else {
                continue;
            };
            match (
                text.mentions[pos1].set.clone(),
                text.mentions[pos2].set.clone(),
            ) {
                (None, Some(link_set)) => text.mentions[pos1].set = Some(link_set),
                (Some(own_set), None) => text.mentions[pos2].set = Some(own_set),
                (Some(own_set), Some(link_set)) => text.merge_sets(&link_set, &own_set),
                (None, None) => {
                    let set_id = ids.mint();
                    text.mentions[pos1].set = Some(set_id.clone());
                    text.mentions[pos2].set = Some(set_id);
                }
            }
        }
        Ok(())
    }
}

/// Put `ana` into the antecedent's set, minting one when the antecedent has none
fn link_to_antecedent(text: &mut Text, ante: usize, ana: usize, ids: &mut SetIdAllocator) {
    let set_id = match &text.mentions[ante].set {
        Some(set_id) => set_id.clone(),
        None => {
            let set_id = ids.mint();
            text.mentions[ante].set = Some(set_id.clone());
            set_id
        }
    };
    text.mentions[ana].set = Some(set_id);
}
