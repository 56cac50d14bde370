//! Pair compatibility scorers
//!
//! The resolution algorithms never look inside a model; they hand feature
//! vectors to a [`Scorer`] and compare the returned value with a threshold.
//!
//! Two implementations ship with the crate:
//!
//! - [`LinearScorer`]: logistic regression weights loaded from a JSON file
//! - [`SidecarScorer`]: an HTTP model server, for networks trained elsewhere

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Scores candidate mention pairs
#[async_trait]
pub trait Scorer: Send + Sync {
    /// Probability in `[0, 1]` that the pair behind `vector` corefers
    ///
    /// # Errors
    ///
    /// Returns an error if the model rejects the vector or cannot be reached
    async fn score(&self, vector: &[f32]) -> Result<f32>;

    /// Distance between the two halves of a siamese input; lower means closer
    ///
    /// # Errors
    ///
    /// The default implementation always fails: the model has no siamese head
    async fn score_pair(&self, _ante: &[f32], _ana: &[f32]) -> Result<f32> {
        Err(Error::Scorer(
            "model does not support siamese scoring".to_string(),
        ))
    }
}

/// Logistic regression over a fixed-width vector
///
/// In siamese mode the weights act as a diagonal projection and
/// [`Scorer::score_pair`] returns the Euclidean distance between the
/// projected halves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearScorer {
    pub weights: Vec<f32>,
    #[serde(default)]
    pub bias: f32,
}

impl LinearScorer {
    #[must_use]
    pub const fn new(weights: Vec<f32>, bias: f32) -> Self {
        Self { weights, bias }
    }

    /// Parse `{"weights": [...], "bias": ...}`
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a model file and check it against the expected input width
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if its width
    /// is not `expected_len`
    pub fn load(path: &Path, expected_len: usize) -> Result<Self> {
        let scorer = Self::from_json(&std::fs::read_to_string(path)?)?;
        if scorer.weights.len() != expected_len {
            return Err(Error::Config(format!(
                "model {} expects {} features, feature extractor produces {expected_len}",
                path.display(),
                scorer.weights.len()
            )));
        }
        debug!(path = %path.display(), width = expected_len, "loaded linear scorer");
        Ok(scorer)
    }

    fn check_width(&self, vector: &[f32]) -> Result<()> {
        if vector.len() == self.weights.len() {
            Ok(())
        } else {
            Err(Error::Scorer(format!(
                "expected {} features, got {}",
                self.weights.len(),
                vector.len()
            )))
        }
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[async_trait]
impl Scorer for LinearScorer {
    async fn score(&self, vector: &[f32]) -> Result<f32> {
        self.check_width(vector)?;
        let logit: f32 = self
            .weights
            .iter()
            .zip(vector)
            .map(|(w, x)| w * x)
            .sum::<f32>()
            + self.bias;
        Ok(sigmoid(logit))
    }

    async fn score_pair(&self, ante: &[f32], ana: &[f32]) -> Result<f32> {
        self.check_width(ante)?;
        self.check_width(ana)?;
        let squared: f32 = self
            .weights
            .iter()
            .zip(ante.iter().zip(ana))
            .map(|(w, (a, b))| (w * (a - b)).powi(2))
            .sum();
        Ok(squared.sqrt())
    }
}

/// Scorer backed by an HTTP model server.
///
/// `POST {url}/score` with `{"features": [...]}` and
/// `POST {url}/score_pair` with `{"a": [...], "b": [...]}`; both answer
/// `{"score": <float>}`.
pub struct SidecarScorer {
    url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ScoreRequest<'a> {
    features: &'a [f32],
}

#[derive(Serialize)]
struct ScorePairRequest<'a> {
    a: &'a [f32],
    b: &'a [f32],
}

#[derive(Deserialize)]
struct ScoreResponse {
    score: f32,
}

impl SidecarScorer {
    /// Create a client for the server at `url`
    ///
    /// # Errors
    ///
    /// Returns an error if `url` is not a valid URL or the HTTP client cannot
    /// be built
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let parsed = url::Url::parse(url)
            .map_err(|e| Error::Config(format!("invalid scorer URL {url:?}: {e}")))?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: parsed.as_str().trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn post<T: Serialize + Sync>(&self, endpoint: &str, body: &T) -> Result<f32> {
        let response = self
            .client
            .post(format!("{}/{endpoint}", self.url))
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Scorer(format!("scorer request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Scorer(format!(
                "scorer returned error: {}",
                response.status()
            )));
        }

        let response: ScoreResponse = response
            .json()
            .await
            .map_err(|e| Error::Scorer(format!("failed to parse scorer response: {e}")))?;
        Ok(response.score)
    }
}

#[async_trait]
impl Scorer for SidecarScorer {
    async fn score(&self, vector: &[f32]) -> Result<f32> {
        self.post("score", &ScoreRequest { features: vector }).await
    }

    async fn score_pair(&self, ante: &[f32], ana: &[f32]) -> Result<f32> {
        self.post("score_pair", &ScorePairRequest { a: ante, b: ana }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Constant(f32);

    #[async_trait]
    impl Scorer for Constant {
        async fn score(&self, _vector: &[f32]) -> Result<f32> {
            Ok(self.0)
        }
    }

    #[tokio::test]
    async fn test_linear_scorer() {
        let scorer = LinearScorer::from_json(r#"{"weights": [1.0, -1.0, 0.0], "bias": 0.0}"#).unwrap();
        let even = scorer.score(&[2.0, 2.0, 5.0]).await.unwrap();
        assert!((even - 0.5).abs() < 1e-6);
        assert!(scorer.score(&[4.0, 0.0, 0.0]).await.unwrap() > 0.9);
        assert!(scorer.score(&[0.0, 4.0, 0.0]).await.unwrap() < 0.1);
    }

    #[tokio::test]
    async fn test_linear_scorer_rejects_wrong_width() {
        let scorer = LinearScorer::new(vec![1.0; 3], 0.0);
        let err = scorer.score(&[1.0, 2.0]).await.unwrap_err();
        assert!(matches!(err, Error::Scorer(_)));
    }

    #[tokio::test]
    async fn test_linear_siamese_distance() {
        let scorer = LinearScorer::new(vec![1.0, 2.0], 0.0);
        let d = scorer.score_pair(&[0.0, 0.0], &[3.0, 2.0]).await.unwrap();
        assert!((d - 5.0).abs() < 1e-6);
        assert_eq!(scorer.score_pair(&[1.0, 1.0], &[1.0, 1.0]).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_default_score_pair_is_unsupported() {
        let err = Constant(0.3).score_pair(&[], &[]).await.unwrap_err();
        assert!(matches!(err, Error::Scorer(_)));
        assert_eq!(Constant(0.3).score(&[]).await.unwrap(), 0.3);
    }

    #[test]
    fn test_load_checks_width() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, r#"{"weights": [0.5, 0.5]}"#).unwrap();
        let scorer = LinearScorer::load(&path, 2).unwrap();
        assert_eq!(scorer.bias, 0.0);
        assert!(matches!(LinearScorer::load(&path, 3), Err(Error::Config(_))));
    }

    #[test]
    fn test_sidecar_rejects_bad_url() {
        assert!(matches!(
            SidecarScorer::new("not a url", Duration::from_secs(1)),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_sidecar_unreachable() {
        let scorer = SidecarScorer::new("http://127.0.0.1:1/", Duration::from_secs(2)).unwrap();
        let err = scorer.score(&[0.0]).await.unwrap_err();
        assert!(matches!(err, Error::Scorer(_)));
    }
}
