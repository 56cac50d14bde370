//! # Mention Coreference Library
//!
//! Mention-pair coreference resolution for Polish corpora. Mentions are read
//! from MMAX or TEI (NKJP-style) annotations, every candidate pair is turned
//! into a fixed-width feature vector, an external compatibility scorer rates
//! the pairs, and one of five clustering strategies groups the mentions into
//! coreference sets that are written back in the input format.
//!
//! ## Features
//!
//! - Two corpus formats: MMAX word/markable layers and gzip TEI layers
//! - A 1190-wide pair vector (at 50-dimensional embeddings) combining word
//!   embeddings, morphology, distance buckets, string similarity, `WordNet`
//!   and Wikipedia lookups
//! - Pluggable scorers: a local linear model or an HTTP model server
//! - Five resolvers: `closest`, `incremental`, `entity_based`, `all2all`
//!   and `siamese`
//! - Environment variable support: configuration from `.env` files
//!
//! ## Example
//!
//! ```rust,no_run
//! use mention_coref::{process_path, CorefConfig};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CorefConfig::from_env()?;
//!     let resolver = Arc::new(config.build_resolver()?);
//!
//!     let summary = process_path(
//!         Path::new("corpus/"),
//!         Path::new("out/"),
//!         config.format,
//!         resolver,
//!         config.read_options(),
//!         config.workers,
//!     )
//!     .await?;
//!     println!("resolved {} documents", summary.resolved);
//!
//!     Ok(())
//! }
//! ```

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub mod context;
pub mod error;
pub mod features;
pub mod kernel;
pub mod mmax;
pub mod pipeline;
pub mod prepare;
pub mod resolve;
pub mod resources;
pub mod scorer;
pub mod tei;
pub mod types;
pub mod xml;

pub use context::{ReadOptions, DEFAULT_CONTEXT};
pub use error::{Error, Result};
pub use features::{pair_vector_width, FeatureExtractor, PAIR_FEATURES};
pub use pipeline::{process_path, BatchSummary, InputFormat};
pub use prepare::{prepare_path, SampleCounts};
pub use resolve::{Resolver, ResolverKind};
pub use resources::{EmbeddingProvider, LexicalResources, WordVectors};
pub use scorer::{LinearScorer, Scorer, SidecarScorer};
pub use types::{Mention, MentionSet, Text, Word};

/// Initialize the library by loading .env file
///
/// # Errors
///
/// Returns an error if the .env file exists but cannot be read or parsed
pub fn init() -> Result<()> {
    dotenvy::dotenv().ok(); // Ignore if .env doesn't exist
    Ok(())
}

/// Embedding width the default feature count is computed for
pub const DEFAULT_EMBEDDING_DIM: usize = 50;

/// Default decision threshold
pub const DEFAULT_THRESHOLD: f32 = 0.85;

/// Shape of the scoring model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    /// One probability per concatenated pair vector
    #[default]
    Simple,

    /// A distance between two embedded halves
    Siamese,
}

impl Architecture {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Siamese => "siamese",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Architecture {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(Self::Simple),
            "siamese" => Ok(Self::Siamese),
            other => Err(Error::Config(format!(
                "unknown architecture {other:?}; expected simple or siamese"
            ))),
        }
    }
}

/// Configuration for coreference resolution
#[derive(Debug, Clone, PartialEq)]
pub struct CorefConfig {
    /// Context window size in words (default: 5)
    pub context: usize,

    /// Give unknown context words a random vector instead of skipping them (default: true)
    pub random_word_vectors: bool,

    /// Drop coreference sets already present in the input (default: false)
    pub clear_input: bool,

    /// Word embedding width (default: 50)
    pub embedding_dim: usize,

    /// Expected pair vector width (default: 1190)
    pub number_of_features: usize,

    pub architecture: Architecture,

    /// Clustering strategy (default: all2all)
    pub resolver: ResolverKind,

    /// Decision threshold 0.0-1.0 (default: 0.85)
    pub threshold: f32,

    pub format: InputFormat,

    /// Directory holding the frequency list and lexical maps
    pub resources_dir: Option<PathBuf>,

    /// word2vec text file; without it every word falls back to random or zero vectors
    pub embeddings_path: Option<PathBuf>,

    /// Linear model JSON file
    pub model_path: Option<PathBuf>,

    /// Model server base URL; takes precedence over `model_path`
    pub scorer_url: Option<String>,

    /// Model server request timeout (default: 30s)
    pub scorer_timeout: Duration,

    /// Seed for random fallback vectors and negative sampling
    pub seed: Option<u64>,

    /// Documents processed concurrently (default: number of CPUs)
    pub workers: usize,

    /// Report unclustered TEI mentions as singleton clusters (default: true)
    pub singleton_clusters: bool,
}

impl Default for CorefConfig {
    fn default() -> Self {
        Self {
            context: DEFAULT_CONTEXT,
            random_word_vectors: true,
            clear_input: false,
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            number_of_features: pair_vector_width(DEFAULT_EMBEDDING_DIM),
            architecture: Architecture::Simple,
            resolver: ResolverKind::All2All,
            threshold: DEFAULT_THRESHOLD,
            format: InputFormat::Mmax,
            resources_dir: None,
            embeddings_path: None,
            model_path: None,
            scorer_url: None,
            scorer_timeout: Duration::from_secs(30),
            seed: None,
            workers: num_cpus::get(),
            singleton_clusters: true,
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

impl CorefConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables
    ///
    /// Automatically loads .env file if present. Supports these variables:
    /// - `COREF_CONTEXT`: Context window size (default: 5)
    /// - `COREF_RANDOM_WORD_VECTORS`: Random vectors for unknown words (default: true)
    /// - `COREF_CLEAR_INPUT`: Drop input coreference sets (default: false)
    /// - `COREF_EMBEDDING_DIM`: Word embedding width (default: 50)
    /// - `COREF_NUMBER_OF_FEATURES`: Expected pair vector width (default: 1190)
    /// - `COREF_ARCHITECTURE`: "simple" or "siamese" (default: "simple")
    /// - `COREF_RESOLVER`: "all2all", "`entity_based`", "incremental", "closest" or "siamese"
    /// - `COREF_THRESHOLD`: Decision threshold (default: 0.85)
    /// - `COREF_FORMAT`: "mmax" or "tei" (default: "mmax")
    /// - `COREF_RESOURCES_DIR`, `COREF_EMBEDDINGS_PATH`, `COREF_MODEL_PATH`: file locations
    /// - `COREF_SCORER_URL`: Model server URL
    /// - `COREF_SCORER_TIMEOUT_SECS`: Model server timeout (default: 30)
    /// - `COREF_SEED`: Random seed (default: unset)
    /// - `COREF_WORKERS`: Concurrent documents (default: number of CPUs)
    /// - `COREF_SINGLETON_CLUSTERS`: Singleton clusters for TEI (default: true)
    ///
    /// # Errors
    ///
    /// Returns an error if an enumerated variable holds an unknown value
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let architecture = env::var("COREF_ARCHITECTURE")
            .ok()
            .map(|v| v.parse::<Architecture>())
            .transpose()?
            .unwrap_or(defaults.architecture);

        let resolver = env::var("COREF_RESOLVER")
            .ok()
            .map(|v| v.parse::<ResolverKind>())
            .transpose()?
            .unwrap_or(defaults.resolver);

        let format = env::var("COREF_FORMAT")
            .ok()
            .map(|v| v.parse::<InputFormat>())
            .transpose()?
            .unwrap_or(defaults.format);

        let embedding_dim = env_parse("COREF_EMBEDDING_DIM").unwrap_or(defaults.embedding_dim);

        Ok(Self {
            context: env_parse("COREF_CONTEXT").unwrap_or(defaults.context),
            random_word_vectors: env_parse("COREF_RANDOM_WORD_VECTORS")
                .unwrap_or(defaults.random_word_vectors),
            clear_input: env_parse("COREF_CLEAR_INPUT").unwrap_or(defaults.clear_input),
            embedding_dim,
            number_of_features: env_parse("COREF_NUMBER_OF_FEATURES")
                .unwrap_or_else(|| pair_vector_width(embedding_dim)),
            architecture,
            resolver,
            threshold: env_parse("COREF_THRESHOLD").unwrap_or(defaults.threshold),
            format,
            resources_dir: env_path("COREF_RESOURCES_DIR"),
            embeddings_path: env_path("COREF_EMBEDDINGS_PATH"),
            model_path: env_path("COREF_MODEL_PATH"),
            scorer_url: env::var("COREF_SCORER_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            scorer_timeout: env_parse("COREF_SCORER_TIMEOUT_SECS")
                .map_or(defaults.scorer_timeout, Duration::from_secs),
            seed: env_parse("COREF_SEED"),
            workers: env_parse("COREF_WORKERS").unwrap_or(defaults.workers),
            singleton_clusters: env_parse("COREF_SINGLETON_CLUSTERS")
                .unwrap_or(defaults.singleton_clusters),
        })
    }

    /// Set the context window size
    #[must_use]
    pub const fn with_context(mut self, context: usize) -> Self {
        self.context = context;
        self
    }

    #[must_use]
    pub const fn with_random_word_vectors(mut self, enabled: bool) -> Self {
        self.random_word_vectors = enabled;
        self
    }

    #[must_use]
    pub const fn with_clear_input(mut self, clear: bool) -> Self {
        self.clear_input = clear;
        self
    }

    /// Set the embedding width and the matching feature count
    #[must_use]
    pub const fn with_embedding_dim(mut self, dim: usize) -> Self {
        self.embedding_dim = dim;
        self.number_of_features = pair_vector_width(dim);
        self
    }

    #[must_use]
    pub const fn with_architecture(mut self, architecture: Architecture) -> Self {
        self.architecture = architecture;
        self
    }

    #[must_use]
    pub const fn with_resolver(mut self, resolver: ResolverKind) -> Self {
        self.resolver = resolver;
        self
    }

    #[must_use]
    pub const fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    #[must_use]
    pub const fn with_format(mut self, format: InputFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_resources_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.resources_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_embeddings_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.embeddings_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_scorer_url(mut self, url: impl Into<String>) -> Self {
        self.scorer_url = Some(url.into());
        self
    }

    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    #[must_use]
    pub const fn with_singleton_clusters(mut self, enabled: bool) -> Self {
        self.singleton_clusters = enabled;
        self
    }

    /// Check the configuration for values no run can work with
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a threshold outside [0, 1], a zero
    /// embedding width or worker count, an invalid scorer URL, or a feature
    /// count that disagrees with the embedding width
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(Error::Config(format!(
                "threshold must be within [0, 1], got {}",
                self.threshold
            )));
        }
        if self.embedding_dim == 0 {
            return Err(Error::Config("embedding dimension must be positive".to_string()));
        }
        if self.workers == 0 {
            return Err(Error::Config("worker count must be positive".to_string()));
        }
        let expected = pair_vector_width(self.embedding_dim);
        if self.number_of_features != expected {
            return Err(Error::Config(format!(
                "number of features is {}, but {}-dimensional embeddings produce {expected}",
                self.number_of_features, self.embedding_dim
            )));
        }
        if let Some(url) = &self.scorer_url {
            url::Url::parse(url)
                .map_err(|e| Error::Config(format!("invalid scorer URL {url:?}: {e}")))?;
        }
        Ok(())
    }

    /// Reader switches derived from this configuration
    #[must_use]
    pub const fn read_options(&self) -> ReadOptions {
        ReadOptions {
            context: self.context,
            clear_sets: self.clear_input,
            singleton_clusters: self.singleton_clusters,
        }
    }

    /// The resolver to run; a siamese model only works with the siamese resolver
    #[must_use]
    pub fn effective_resolver(&self) -> ResolverKind {
        if self.architecture == Architecture::Siamese && self.resolver != ResolverKind::Siamese {
            warn!(
                requested = %self.resolver,
                "using siamese resolver because of the siamese model architecture"
            );
            return ResolverKind::Siamese;
        }
        self.resolver
    }

    /// Load lexical resources and embeddings
    ///
    /// # Errors
    ///
    /// Returns an error if a configured resource file cannot be loaded
    pub fn build_extractor(&self) -> Result<FeatureExtractor> {
        let resources = match &self.resources_dir {
            Some(dir) => LexicalResources::load(dir)?,
            None => LexicalResources::new(),
        };
        let embeddings = match &self.embeddings_path {
            Some(path) => WordVectors::load(path, self.embedding_dim)?,
            None => WordVectors::empty(self.embedding_dim),
        };
        Ok(
            FeatureExtractor::new(Arc::new(resources), Arc::new(embeddings))
                .with_random_word_vectors(self.random_word_vectors)
                .with_seed(self.seed),
        )
    }

    /// Connect to the configured scorer, checking its width against `extractor`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when neither a scorer URL nor a model path is
    /// set, or when the model does not fit the extractor
    pub fn build_scorer(&self, extractor: &FeatureExtractor) -> Result<Arc<dyn Scorer>> {
        if let Some(url) = &self.scorer_url {
            info!(url = %url, "using model server");
            return Ok(Arc::new(SidecarScorer::new(url, self.scorer_timeout)?));
        }
        let Some(path) = &self.model_path else {
            return Err(Error::Config(
                "no scorer configured; set COREF_MODEL_PATH or COREF_SCORER_URL".to_string(),
            ));
        };
        let width = match self.architecture {
            Architecture::Simple => extractor.pair_vector_len(),
            Architecture::Siamese => extractor.siamese_vector_len(),
        };
        Ok(Arc::new(LinearScorer::load(path, width)?))
    }

    /// Validate, then assemble extractor, scorer and resolver
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails or a component cannot be built
    pub fn build_resolver(&self) -> Result<Resolver> {
        self.validate()?;
        let extractor = Arc::new(self.build_extractor()?);
        let scorer = self.build_scorer(&extractor)?;
        Ok(Resolver::new(
            self.effective_resolver(),
            self.threshold,
            extractor,
            scorer,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CorefConfig::default();
        assert_eq!(config.context, 5);
        assert_eq!(config.number_of_features, 1190);
        assert_eq!(config.resolver, ResolverKind::All2All);
        assert!((config.threshold - 0.85).abs() < f32::EPSILON);
        assert!(config.workers > 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = CorefConfig::new()
            .with_embedding_dim(10)
            .with_threshold(0.5)
            .with_resolver(ResolverKind::Closest)
            .with_format(InputFormat::Tei)
            .with_clear_input(true);

        assert_eq!(config.number_of_features, 22 * 10 + 90);
        assert_eq!(config.format, InputFormat::Tei);
        let options = config.read_options();
        assert!(options.clear_sets);
        assert_eq!(options.context, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(CorefConfig::new().with_threshold(1.5).validate().is_err());
        assert!(CorefConfig::new().with_workers(0).validate().is_err());
        assert!(CorefConfig::new()
            .with_scorer_url("not a url")
            .validate()
            .is_err());

        let mut config = CorefConfig::new();
        config.number_of_features = 1000;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_siamese_architecture_forces_resolver() {
        let config = CorefConfig::new().with_resolver(ResolverKind::Closest);
        assert_eq!(config.effective_resolver(), ResolverKind::Closest);
        let config = config.with_architecture(Architecture::Siamese);
        assert_eq!(config.effective_resolver(), ResolverKind::Siamese);
    }

    #[test]
    fn test_architecture_names() {
        assert_eq!("Siamese".parse::<Architecture>().unwrap(), Architecture::Siamese);
        assert!("deep".parse::<Architecture>().is_err());
    }

    #[test]
    fn test_build_resolver_requires_scorer() {
        let err = CorefConfig::new().with_embedding_dim(4).build_resolver().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_build_resolver_with_linear_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let width = pair_vector_width(4);
        let model = LinearScorer::new(vec![0.0; width], 0.0);
        std::fs::write(&path, serde_json::to_string(&model).unwrap()).unwrap();

        let resolver = CorefConfig::new()
            .with_embedding_dim(4)
            .with_model_path(&path)
            .with_resolver(ResolverKind::Incremental)
            .build_resolver()
            .unwrap();
        assert_eq!(resolver.kind(), ResolverKind::Incremental);
        assert_eq!(resolver.extractor().pair_vector_len(), width);

        let wrong = CorefConfig::new().with_embedding_dim(5).with_model_path(&path);
        assert!(wrong.build_resolver().is_err());
    }

    #[test]
    fn test_init() {
        assert!(init().is_ok());
    }
}
