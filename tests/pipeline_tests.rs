//! End-to-end tests: corpus on disk, resolve, write, read back

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use mention_coref::{
    mmax, prepare_path, process_path, tei, BatchSummary, Error, FeatureExtractor, InputFormat,
    LexicalResources, ReadOptions, Resolver, ResolverKind, SampleCounts, Scorer, WordVectors,
};

const WORDS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE words SYSTEM "words.dtd">
<words>
<word id="word_1" base="Jan" ctag="subst" msd="sg:nom:m1">Jan</word>
<word id="word_2" base="Kowalski" ctag="subst" msd="sg:nom:m1">Kowalski</word>
<word id="word_3" base="przyjść" ctag="praet" msd="sg:m1:perf">przyszedł</word>
<word id="word_4" base="." ctag="interp" msd="" hasnps="true" lastinsent="true">.</word>
<word id="word_5" base="on" ctag="ppron3" msd="sg:nom:m1:ter:akc:npraep">On</word>
<word id="word_6" base="usiąść" ctag="praet" msd="sg:m1:perf">usiadł</word>
<word id="word_7" base="Kowalski" ctag="subst" msd="sg:nom:m1">Kowalski</word>
<word id="word_8" base="." ctag="interp" msd="" hasnps="true" lastinsent="true" lastinpar="true">.</word>
</words>
"#;

const MENTIONS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE markables SYSTEM "markables.dtd">
<markables xmlns="www.eml.org/NameSpaces/mention">
<markable id="markable_1" span="word_1..word_2" mention_head="Kowalski" mention_group="set_3"/>
<markable id="markable_2" span="word_5" mention_head="On" mention_group="empty"/>
<markable id="markable_3" span="word_7" mention_head="Kowalski" mention_group="set_3"/>
</markables>
"#;

struct Constant(f32);

#[async_trait]
impl Scorer for Constant {
    async fn score(&self, _vector: &[f32]) -> mention_coref::Result<f32> {
        Ok(self.0)
    }
}

struct Unavailable;

#[async_trait]
impl Scorer for Unavailable {
    async fn score(&self, _vector: &[f32]) -> mention_coref::Result<f32> {
        Err(Error::Scorer("connection refused".to_string()))
    }
}

fn extractor() -> Arc<FeatureExtractor> {
    Arc::new(
        FeatureExtractor::new(Arc::new(LexicalResources::new()), Arc::new(WordVectors::empty(3)))
            .with_seed(Some(11)),
    )
}

fn resolver(scorer: Arc<dyn Scorer>) -> Arc<Resolver> {
    Arc::new(Resolver::new(ResolverKind::All2All, 0.85, extractor(), scorer))
}

fn clearing() -> ReadOptions {
    ReadOptions {
        clear_sets: true,
        ..ReadOptions::default()
    }
}

fn mmax_document(dir: &Path, name: &str, with_mentions: bool) {
    fs::write(dir.join(format!("{name}.mmax")), "<mmax_project/>").unwrap();
    fs::write(dir.join(format!("{name}_words.xml")), WORDS).unwrap();
    if with_mentions {
        fs::write(dir.join(format!("{name}_mentions.xml")), MENTIONS).unwrap();
    }
}

fn write_gz(path: &Path, contents: &str) {
    let mut encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
    encoder.write_all(contents.as_bytes()).unwrap();
    encoder.finish().unwrap();
}

fn tei(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><teiCorpus xmlns="http://www.tei-c.org/ns/1.0"><TEI><text><body>{body}</body></text></TEI></teiCorpus>"#
    )
}

fn tei_segment(id: &str, orth: &str, interpretation: &str) -> String {
    format!(
        r#"<seg xml:id="{id}"><fs type="morph"><f name="orth"><string>{orth}</string></f><f name="disamb"><fs type="tool_report"><f name="interpretation"><string>{interpretation}</string></f></fs></f></fs></seg>"#
    )
}

fn tei_mention(id: &str, seg: &str) -> String {
    format!(
        r#"<seg xml:id="{id}"><fs type="mention"><f name="semh" fVal="ann_morphosyntax.xml#{seg}"/></fs><ptr target="ann_morphosyntax.xml#{seg}"/></seg>"#
    )
}

fn tei_document(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    write_gz(&dir.join("ann_segmentation.xml.gz"), &tei(""));
    write_gz(
        &dir.join("ann_morphosyntax.xml.gz"),
        &tei(&format!(
            r#"<p><s>{}{}{}</s><s>{}{}</s></p>"#,
            tei_segment("s1", "Anna", "Anna:subst:sg:nom:f"),
            tei_segment("s2", "czyta", "czytać:fin:sg:ter:imperf"),
            tei_segment("s3", ".", ".:interp"),
            tei_segment("s4", "Ona", "ona:ppron3:sg:nom:f:ter:akc:npraep"),
            tei_segment("s5", "śpi", "spać:fin:sg:ter:imperf"),
        )),
    );
    write_gz(
        &dir.join("ann_mentions.xml.gz"),
        &tei(&format!("<p>{}{}</p>", tei_mention("m1", "s1"), tei_mention("m2", "s4"))),
    );
    fs::write(dir.join("header.xml"), "<teiHeader/>").unwrap();
}

#[tokio::test]
async fn test_mmax_corpus_is_resolved_and_incomplete_documents_skipped() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    mmax_document(input.path(), "a", true);
    mmax_document(input.path(), "b", false);

    let summary = process_path(
        input.path(),
        output.path(),
        InputFormat::Mmax,
        resolver(Arc::new(Constant(0.9))),
        clearing(),
        2,
    )
    .await
    .unwrap();
    assert_eq!(
        summary,
        BatchSummary {
            resolved: 1,
            skipped: 1,
            failed: 0
        }
    );

    assert!(output.path().join("a.mmax").is_file());
    assert!(output.path().join("a_words.xml").is_file());
    assert!(!output.path().join("b_mentions.xml").exists());

    let text = mmax::read(&output.path().join("a.mmax"), &extractor(), &ReadOptions::default())
        .unwrap();
    let set = text.mention_set("markable_1").map(str::to_string);
    assert!(set.is_some());
    assert!(text.mentions.iter().all(|m| m.set == set));
    assert!(text
        .mentions
        .iter()
        .all(|m| m.dominant.as_deref() == Some("Jan Kowalski")));
}

#[tokio::test]
async fn test_low_scores_leave_mentions_unclustered() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    mmax_document(input.path(), "a", true);

    let summary = process_path(
        &input.path().join("a.mmax"),
        output.path(),
        InputFormat::Mmax,
        resolver(Arc::new(Constant(0.1))),
        clearing(),
        1,
    )
    .await
    .unwrap();
    assert_eq!(summary.resolved, 1);

    let written = fs::read_to_string(output.path().join("a_mentions.xml")).unwrap();
    assert!(!written.contains("set_"));
    assert!(written.contains("<!DOCTYPE markables"));
}

#[tokio::test]
async fn test_scorer_failure_aborts_batch() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    mmax_document(input.path(), "a", true);

    let err = process_path(
        input.path(),
        output.path(),
        InputFormat::Mmax,
        resolver(Arc::new(Unavailable)),
        clearing(),
        1,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::Scorer(_)));
}

#[tokio::test]
async fn test_missing_input_is_a_config_error() {
    let output = tempfile::tempdir().unwrap();
    let err = process_path(
        &output.path().join("nowhere"),
        output.path(),
        InputFormat::Tei,
        resolver(Arc::new(Constant(0.9))),
        ReadOptions::default(),
        1,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[tokio::test]
async fn test_tei_corpus_roundtrip() -> anyhow::Result<()> {
    let input = tempfile::tempdir()?;
    let output = tempfile::tempdir()?;
    tei_document(&input.path().join("doc_1"));
    fs::create_dir(input.path().join("doc_2")).unwrap();

    let summary = process_path(
        input.path(),
        output.path(),
        InputFormat::Tei,
        resolver(Arc::new(Constant(0.9))),
        ReadOptions::default(),
        4,
    )
    .await?;
    assert_eq!(summary.resolved, 1);
    assert_eq!(summary.skipped, 1);

    let out_doc = output.path().join("doc_1");
    assert!(out_doc.join("header.xml").is_file());
    assert!(out_doc.join("ann_coreference.xml.gz").is_file());

    let text = tei::read(&out_doc, &extractor(), &ReadOptions::default())?;
    assert_eq!(text.mention_set("m1"), Some("coreference_0"));
    assert_eq!(text.mention_set("m2"), Some("coreference_0"));
    assert_eq!(text.segments, ["Anna", "czyta", ".", "Ona", "śpi"]);
    assert_eq!(text.clusters, vec![vec![(0, 0), (2, 2)]]);
    Ok(())
}

#[test]
fn test_prepare_writes_gold_and_sampled_pairs() -> anyhow::Result<()> {
    let input = tempfile::tempdir()?;
    let output = tempfile::tempdir()?;
    mmax_document(input.path(), "a", true);
    let path = output.path().join("train.tsv");

    let counts = prepare_path(input.path(), &path, InputFormat::Mmax, &extractor(), 5, Some(7))?;
    assert_eq!(
        counts,
        SampleCounts {
            positives: 1,
            negatives: 2
        }
    );

    let written = fs::read_to_string(&path)?;
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines.len(), 3);
    let width = extractor().pair_vector_len() + 1;
    assert!(lines.iter().all(|line| line.split('\t').count() == width));
    assert!(lines[0].ends_with("1.0"));
    Ok(())
}
