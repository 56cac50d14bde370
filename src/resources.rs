//! Read-only lexical resources and word embeddings
//!
//! Loaded once at startup and shared (behind `Arc`) by every document worker.
//!
//! File formats:
//! - frequency list: `count lemma` per line, first occurrence of a lemma wins
//! - one-to-many maps: `key<TAB>value<TAB>value...`
//! - one-to-one map: `key<TAB>value`
//! - embeddings: word2vec text format, optional `count dim` header

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::types::Word;

/// Default file names inside a resources directory
pub const FREQ_LIST_NAME: &str = "base.lst";
pub const LEMMA2SYNONYMS_NAME: &str = "lemma2synonyms.map";
pub const LEMMA2HYPERNYMS_NAME: &str = "lemma2hypernyms.map";
pub const TITLE2LINKS_NAME: &str = "link.map";
pub const TITLE2REDIRECT_NAME: &str = "redirect.map";

/// Frequency table, `WordNet`-style relations and Wikipedia-style links
#[derive(Debug, Clone, Default)]
pub struct LexicalResources {
    frequencies: HashMap<String, u64>,
    synonyms: HashMap<String, HashSet<String>>,
    hypernyms: HashMap<String, HashSet<String>>,
    links: HashMap<String, HashSet<String>>,
    redirects: HashMap<String, String>,
}

impl LexicalResources {
    /// Empty tables: every lookup misses
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every table from `dir` using the default file names.
    ///
    /// A missing file leaves its table empty and logs a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if a file exists but cannot be read or parsed
    pub fn load(dir: &Path) -> Result<Self> {
        let resources = Self {
            frequencies: load_optional(&dir.join(FREQ_LIST_NAME), parse_freq_list)?,
            synonyms: load_optional(&dir.join(LEMMA2SYNONYMS_NAME), parse_one2many)?,
            hypernyms: load_optional(&dir.join(LEMMA2HYPERNYMS_NAME), parse_one2many)?,
            links: load_optional(&dir.join(TITLE2LINKS_NAME), parse_one2many)?,
            redirects: load_optional(&dir.join(TITLE2REDIRECT_NAME), parse_one2one)?,
        };
        info!(
            dir = %dir.display(),
            frequencies = resources.frequencies.len(),
            synonyms = resources.synonyms.len(),
            hypernyms = resources.hypernyms.len(),
            links = resources.links.len(),
            redirects = resources.redirects.len(),
            "loaded lexical resources"
        );
        Ok(resources)
    }

    #[must_use]
    pub fn with_frequency(mut self, lemma: impl Into<String>, count: u64) -> Self {
        self.frequencies.entry(lemma.into()).or_insert(count);
        self
    }

    #[must_use]
    pub fn with_synonyms<I, S>(mut self, lemma: impl Into<String>, synonyms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.synonyms
            .insert(lemma.into(), synonyms.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_hypernyms<I, S>(mut self, lemma: impl Into<String>, hypernyms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hypernyms
            .insert(lemma.into(), hypernyms.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_links<I, S>(mut self, title: impl Into<String>, links: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.links
            .insert(title.into(), links.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_redirect(mut self, title: impl Into<String>, target: impl Into<String>) -> Self {
        self.redirects.insert(title.into(), target.into());
        self
    }

    /// Corpus count of a lemma, 0 when unlisted
    #[must_use]
    pub fn frequency(&self, lemma: &str) -> u64 {
        self.frequencies.get(lemma).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn synonyms(&self, lemma: &str) -> Option<&HashSet<String>> {
        self.synonyms.get(lemma)
    }

    #[must_use]
    pub fn hypernyms(&self, lemma: &str) -> Option<&HashSet<String>> {
        self.hypernyms.get(lemma)
    }

    #[must_use]
    pub fn wikilinks(&self, title: &str) -> Option<&HashSet<String>> {
        self.links.get(title)
    }

    #[must_use]
    pub fn redirect(&self, title: &str) -> Option<&str> {
        self.redirects.get(title).map(String::as_str)
    }

    /// The lowest-frequency word; the earliest one wins ties
    #[must_use]
    pub fn rarest_word<'a>(&self, words: &'a [Word]) -> Option<&'a Word> {
        words.iter().reduce(|rarest, word| {
            if self.frequency(&word.base) < self.frequency(&rarest.base) {
                word
            } else {
                rarest
            }
        })
    }
}

fn load_optional<T: Default>(path: &Path, parse: fn(&str) -> Result<T>) -> Result<T> {
    if !path.exists() {
        warn!(path = %path.display(), "lexical resource not found, using an empty table");
        return Ok(T::default());
    }
    let contents = fs::read_to_string(path)?;
    parse(&contents).map_err(|e| Error::Resource(format!("{}: {e}", path.display())))
}

/// Parse `count lemma` lines
///
/// # Errors
///
/// Returns an error if a count is not an integer
pub fn parse_freq_list(contents: &str) -> Result<HashMap<String, u64>> {
    let mut frequencies = HashMap::new();
    for (line_no, line) in contents.lines().enumerate() {
        let mut parts = line.split_whitespace();
        let (Some(count), Some(base)) = (parts.next(), parts.next()) else {
            continue;
        };
        let count = count.parse::<u64>().map_err(|e| {
            Error::Resource(format!("line {}: bad frequency {count:?}: {e}", line_no + 1))
        })?;
        frequencies.entry(base.to_string()).or_insert(count);
    }
    Ok(frequencies)
}

/// Parse `key<TAB>value...` lines
///
/// # Errors
///
/// Never fails today; the signature matches the other loaders
pub fn parse_one2many(contents: &str) -> Result<HashMap<String, HashSet<String>>> {
    Ok(contents
        .lines()
        .filter_map(|line| {
            let mut fields = line.split('\t');
            let key = fields.next().filter(|k| !k.is_empty())?;
            let values = fields.filter(|v| !v.is_empty()).map(str::to_string).collect();
            Some((key.to_string(), values))
        })
        .collect())
}

/// Parse `key<TAB>value` lines
///
/// # Errors
///
/// Returns an error if a non-empty line has no value column
pub fn parse_one2one(contents: &str) -> Result<HashMap<String, String>> {
    let mut map = HashMap::new();
    for (line_no, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let (key, value) = line
            .split_once('\t')
            .ok_or_else(|| Error::Resource(format!("line {}: expected key<TAB>value", line_no + 1)))?;
        map.insert(key.to_string(), value.to_string());
    }
    Ok(map)
}

/// Source of fixed-length word vectors keyed by lemma
pub trait EmbeddingProvider: Send + Sync {
    /// Vector width
    fn dim(&self) -> usize;

    /// Vector for `lemma`, `None` when unknown
    fn embed(&self, lemma: &str) -> Option<&[f32]>;
}

/// In-memory word vectors
#[derive(Debug, Clone, Default)]
pub struct WordVectors {
    dim: usize,
    vectors: HashMap<String, Vec<f32>>,
}

impl WordVectors {
    /// An empty vocabulary of the given width
    #[must_use]
    pub fn empty(dim: usize) -> Self {
        Self {
            dim,
            vectors: HashMap::new(),
        }
    }

    /// Build from an explicit map
    ///
    /// # Errors
    ///
    /// Returns an error if any vector's width differs from `dim`
    pub fn from_map(dim: usize, vectors: HashMap<String, Vec<f32>>) -> Result<Self> {
        if let Some((word, vec)) = vectors.iter().find(|(_, v)| v.len() != dim) {
            return Err(Error::Resource(format!(
                "vector for {word:?} has {} components, expected {dim}",
                vec.len()
            )));
        }
        Ok(Self { dim, vectors })
    }

    /// Load word2vec text format
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a row has the wrong width
    pub fn load(path: &Path, dim: usize) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let vectors = Self::parse(&contents, dim)
            .map_err(|e| Error::Resource(format!("{}: {e}", path.display())))?;
        info!(path = %path.display(), words = vectors.len(), dim, "loaded word vectors");
        Ok(vectors)
    }

    /// Parse word2vec text format
    ///
    /// # Errors
    ///
    /// Returns an error if a row has the wrong width or a bad number
    pub fn parse(contents: &str, dim: usize) -> Result<Self> {
        let mut vectors = HashMap::new();
        for (line_no, line) in contents.lines().enumerate() {
            let mut fields = line.split_whitespace();
            let Some(word) = fields.next() else {
                continue;
            };
            let values: Vec<&str> = fields.collect();
            // "count dim" header
            if line_no == 0 && values.len() == 1 && word.parse::<usize>().is_ok() {
                continue;
            }
            if values.len() != dim {
                return Err(Error::Resource(format!(
                    "line {}: {} components, expected {dim}",
                    line_no + 1,
                    values.len()
                )));
            }
            let vec = values
                .iter()
                .map(|v| v.parse::<f32>())
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| Error::Resource(format!("line {}: {e}", line_no + 1)))?;
            vectors.insert(word.to_string(), vec);
        }
        Ok(Self { dim, vectors })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

impl EmbeddingProvider for WordVectors {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, lemma: &str) -> Option<&[f32]> {
        self.vectors.get(lemma).map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_freq_list_first_occurrence_wins() {
        let freq = parse_freq_list("10 kot\n3 pies\n99 kot\n\n").unwrap();
        assert_eq!(freq["kot"], 10);
        assert_eq!(freq["pies"], 3);
        assert!(parse_freq_list("abc kot").is_err());
    }

    #[test]
    fn test_maps() {
        let one2many = parse_one2many("kot\tkocur\tkotek\npies\n").unwrap();
        assert!(one2many["kot"].contains("kotek"));
        assert!(one2many["pies"].is_empty());

        let one2one = parse_one2one("warszawa\tstolica polski\n").unwrap();
        assert_eq!(one2one["warszawa"], "stolica polski");
        assert!(parse_one2one("lonely").is_err());
    }

    #[test]
    fn test_rarest_word_ties_keep_first() {
        let resources = LexicalResources::new()
            .with_frequency("jan", 500)
            .with_frequency("kowalski", 20);
        let words = vec![
            Word::new("w1", "Jan", "jan", "subst", ""),
            Word::new("w2", "Kowalski", "kowalski", "subst", ""),
            Word::new("w3", "Nowak", "nowak", "subst", ""),
            Word::new("w4", "Iksiński", "iksiński", "subst", ""),
        ];
        // both unlisted lemmas count 0; the first of them wins
        assert_eq!(resources.rarest_word(&words).unwrap().id, "w3");
        assert!(resources.rarest_word(&[]).is_none());
    }

    #[test]
    fn test_word_vectors_parse() {
        let vectors = WordVectors::parse("2 3\nkot 0.1 0.2 0.3\npies 1 2 3\n", 3).unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors.embed("kot"), Some(&[0.1_f32, 0.2, 0.3][..]));
        assert!(vectors.embed("koń").is_none());
        assert!(WordVectors::parse("kot 0.1 0.2\n", 3).is_err());
    }

    #[test]
    fn test_load_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let resources = LexicalResources::load(dir.path()).unwrap();
        assert_eq!(resources.frequency("kot"), 0);
        assert!(resources.redirect("kot").is_none());
    }
}
