//! Batch processing: read, resolve and write every document under a path

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::context::ReadOptions;
use crate::error::{Error, Result};
use crate::features::FeatureExtractor;
use crate::resolve::Resolver;
use crate::types::Text;
use crate::{mmax, tei};

/// Corpus format of the input documents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    #[default]
    Mmax,
    Tei,
}

impl InputFormat {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mmax => "mmax",
            Self::Tei => "tei",
        }
    }

    /// Read one document
    ///
    /// # Errors
    ///
    /// Propagates the adapter's error
    pub fn read(self, path: &Path, extractor: &FeatureExtractor, options: &ReadOptions) -> Result<Text> {
        match self {
            Self::Mmax => mmax::read(path, extractor, options),
            Self::Tei => tei::read(path, extractor, options),
        }
    }

    /// Write one document next to a copy of its input layers
    ///
    /// # Errors
    ///
    /// Propagates the adapter's error
    pub fn write(self, input: &Path, out_dir: &Path, text: &Text) -> Result<()> {
        match self {
            Self::Mmax => mmax::write(input, out_dir, text),
            Self::Tei => tei::write(input, out_dir, text),
        }
    }

    /// Whether `path` is a single document rather than a directory of them
    #[must_use]
    pub fn is_document(self, path: &Path) -> bool {
        match self {
            Self::Mmax => path.is_file(),
            Self::Tei => {
                path.is_dir()
                    && [tei::SEGMENTATION_LAYER, tei::MORPHOSYNTAX_LAYER, tei::MENTIONS_LAYER]
                        .iter()
                        .any(|layer| {
                            path.join(format!("{layer}.xml.gz")).is_file()
                                || path.join(format!("{layer}.xml")).is_file()
                        })
            }
        }
    }

    /// Documents of a corpus directory in name order
    ///
    /// # Errors
    ///
    /// Returns an error if `dir` cannot be listed
    pub fn documents(self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut documents = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let wanted = match self {
                Self::Mmax => {
                    path.is_file()
                        && path
                            .extension()
                            .is_some_and(|ext| ext == mmax::MMAX_EXTENSION)
                }
                Self::Tei => path.is_dir(),
            };
            if wanted {
                documents.push(path);
            }
        }
        documents.sort();
        Ok(documents)
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mmax" => Ok(Self::Mmax),
            "tei" => Ok(Self::Tei),
            other => Err(Error::Config(format!(
                "unknown input format {other:?}; expected mmax or tei"
            ))),
        }
    }
}

/// Outcome counts of a batch run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Documents read, resolved and written
    pub resolved: usize,

    /// Documents lacking a required annotation layer
    pub skipped: usize,

    /// Documents whose annotation or files could not be processed
    pub failed: usize,
}

impl BatchSummary {
    #[must_use]
    pub const fn total(&self) -> usize {
        self.resolved + self.skipped + self.failed
    }

    fn record(&mut self, document: &Path, outcome: Result<()>) -> Result<()> {
        match outcome {
            Ok(()) => self.resolved += 1,
            Err(err @ Error::MissingLayer { .. }) => {
                warn!(document = %document.display(), error = %err, "skipping document");
                self.skipped += 1;
            }
            Err(err) if err.is_document_local() => {
                error!(document = %document.display(), error = %err, "failed to process document");
                self.failed += 1;
            }
            Err(err) => return Err(err),
        }
        Ok(())
    }
}

fn join_error(err: &tokio::task::JoinError) -> Error {
    Error::Io(io::Error::other(format!("worker task failed: {err}")))
}

/// Read, resolve and write a single document
///
/// # Errors
///
/// Returns the first error raised by the adapter, the resolver or the writer
pub async fn process_document(
    input: PathBuf,
    out_dir: PathBuf,
    format: InputFormat,
    resolver: Arc<Resolver>,
    options: ReadOptions,
) -> Result<()> {
    let started = Instant::now();

    let reader = Arc::clone(&resolver);
    let path = input.clone();
    let mut text = tokio::task::spawn_blocking(move || format.read(&path, reader.extractor(), &options))
        .await
        .map_err(|e| join_error(&e))??;
    let read_done = started.elapsed();

    resolver.resolve(&mut text).await?;
    let resolve_done = started.elapsed();

    let document = text.id.clone();
    tokio::task::spawn_blocking(move || format.write(&input, &out_dir, &text))
        .await
        .map_err(|e| join_error(&e))??;

    debug!(
        text = %document,
        read_ms = read_done.as_millis(),
        resolve_ms = (resolve_done - read_done).as_millis(),
        total_ms = started.elapsed().as_millis(),
        "processed document"
    );
    Ok(())
}

/// Process a document or every document of a corpus directory.
///
/// MMAX outputs land directly in `output`; TEI documents of a corpus get one
/// sub-directory each, named after the input directory. At most `workers`
/// documents are in flight at once.
///
/// # Errors
///
/// Returns [`Error::Config`] if `input` does not exist and aborts on the first
/// error that is not local to a document (scorer failures in particular)
pub async fn process_path(
    input: &Path,
    output: &Path,
    format: InputFormat,
    resolver: Arc<Resolver>,
    options: ReadOptions,
    workers: usize,
) -> Result<BatchSummary> {
    if !input.exists() {
        return Err(Error::Config(format!(
            "input path does not exist: {}",
            input.display()
        )));
    }

    let jobs: Vec<(PathBuf, PathBuf)> = if format.is_document(input) {
        vec![(input.to_path_buf(), output.to_path_buf())]
    } else {
        format
            .documents(input)?
            .into_iter()
            .map(|doc| {
                let out = match format {
                    InputFormat::Mmax => output.to_path_buf(),
                    InputFormat::Tei => output.join(doc.file_name().unwrap_or_default()),
                };
                (doc, out)
            })
            .collect()
    };

    info!(
        input = %input.display(),
        format = %format,
        resolver = %resolver.kind(),
        documents = jobs.len(),
        workers,
        "starting batch"
    );

    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let mut tasks = JoinSet::new();
    for (doc, out) in jobs {
        let semaphore = Arc::clone(&semaphore);
        let resolver = Arc::clone(&resolver);
        tasks.spawn(async move {
            let outcome = match semaphore.acquire_owned().await {
                Ok(_permit) => process_document(doc.clone(), out, format, resolver, options).await,
                Err(e) => Err(Error::Config(format!("worker pool closed: {e}"))),
            };
            (doc, outcome)
        });
    }

    let mut summary = BatchSummary::default();
    while let Some(joined) = tasks.join_next().await {
        let (doc, outcome) = joined.map_err(|e| join_error(&e))?;
        summary.record(&doc, outcome)?;
    }

    info!(
        resolved = summary.resolved,
        skipped = summary.skipped,
        failed = summary.failed,
        "batch finished"
    );
    Ok(summary)
}
