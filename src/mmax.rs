//! MMAX corpus adapter
//!
//! A document is `<dir>/<name>.mmax` with two layers beside it:
//!
//! - `<name>_words.xml`: `<word>` elements carrying `id`, `base`, `ctag`,
//!   `msd` and the boundary flags as attributes, the surface form as text
//! - `<name>_mentions.xml`: `<markable>` elements with a `span` made of
//!   comma-separated fragments, each a word id or an `first..last` range,
//!   plus `mention_head`, `mention_group` (`empty` when unassigned) and
//!   an optional `dominant`

use std::collections::HashMap;
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use tracing::debug;

use crate::context::{gather, IdAnchor, ReadOptions};
use crate::error::{Error, Result};
use crate::features::FeatureExtractor;
use crate::types::{words_to_text, Form, Mention, MentionSpan, Text, Word, FRAGMENT_SEPARATOR};
use crate::xml::{attr, flag_attr, local_name, required_attr};

pub const MMAX_EXTENSION: &str = "mmax";
pub const WORDS_SUFFIX: &str = "_words.xml";
pub const MENTIONS_SUFFIX: &str = "_mentions.xml";

/// `mention_group` value of a markable outside every set
pub const EMPTY_GROUP: &str = "empty";

/// File names of one MMAX document
#[derive(Debug, Clone)]
struct Layout {
    name: String,
    dir: PathBuf,
}

impl Layout {
    fn of(path: &Path) -> Result<Self> {
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .ok_or_else(|| Error::Config(format!("not an MMAX file: {}", path.display())))?;
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(Self { name, dir })
    }

    fn mmax_name(&self) -> String {
        format!("{}.{MMAX_EXTENSION}", self.name)
    }

    fn words_name(&self) -> String {
        format!("{}{WORDS_SUFFIX}", self.name)
    }

    fn mentions_name(&self) -> String {
        format!("{}{MENTIONS_SUFFIX}", self.name)
    }

    fn layer(&self, file_name: &str, layer: &str) -> Result<PathBuf> {
        let path = self.dir.join(file_name);
        if path.is_file() {
            Ok(path)
        } else {
            Err(Error::missing_layer(&self.name, layer))
        }
    }
}

/// One `<markable>` before its span is resolved
#[derive(Debug, Clone, PartialEq)]
struct Markable {
    id: String,
    span: String,
    head_orth: String,
    group: Option<String>,
    dominant: Option<String>,
}

/// Read the document whose `.mmax` file is `path`
///
/// # Errors
///
/// Returns [`Error::MissingLayer`] if the words or mentions file is absent and
/// [`Error::MalformedAnnotation`] for dangling word ids or empty spans
pub fn read(path: &Path, extractor: &FeatureExtractor, options: &ReadOptions) -> Result<Text> {
    let layout = Layout::of(path)?;
    let words_xml = fs::read_to_string(layout.layer(&layout.words_name(), "words")?)?;
    let mentions_xml = fs::read_to_string(layout.layer(&layout.mentions_name(), "mentions")?)?;

    let stream = parse_words(&words_xml, &layout.name)?;
    let markables = parse_markables(&mentions_xml, &layout.name)?;
    let index: HashMap<&str, usize> = stream
        .iter()
        .enumerate()
        .map(|(idx, word)| (word.id.as_str(), idx))
        .collect();

    let mut text = Text::new(&layout.name);
    for (position, markable) in markables.into_iter().enumerate() {
        let mention = build_mention(
            markable, position, &stream, &index, &layout.name, extractor, options,
        )?;
        text.mentions.push(mention);
    }

    debug!(
        text = %text.id,
        words = stream.len(),
        mentions = text.mentions.len(),
        "read MMAX document"
    );
    Ok(text)
}

fn parse_words(xml: &str, document: &str) -> Result<Vec<Word>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut words = Vec::new();
    let mut current: Option<Word> = None;
    loop {
        match reader.read_event()? {
            Event::Start(e) if local_name(&e) == "word" => {
                current = Some(word_from_element(&e, document)?);
            }
            Event::Empty(e) if local_name(&e) == "word" => {
                words.push(word_from_element(&e, document)?);
            }
            Event::Text(t) => {
                if let Some(word) = current.as_mut() {
                    word.orth.push_str(&t.unescape()?);
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"word" => {
                if let Some(word) = current.take() {
                    words.push(word);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(words)
}

fn word_from_element(e: &BytesStart<'_>, document: &str) -> Result<Word> {
    let word = Word::new(
        required_attr(e, "id", document)?,
        String::new(),
        required_attr(e, "base", document)?,
        required_attr(e, "ctag", document)?,
        attr(e, "msd")?.unwrap_or_default(),
    )
    .with_nps(flag_attr(e, &["hasnps", "hasNps"])?)
    .with_boundaries(
        flag_attr(e, &["lastinsent", "lastInSent"])?,
        flag_attr(e, &["lastinpar", "lastInPar"])?,
    );
    Ok(word)
}

fn parse_markables(xml: &str, document: &str) -> Result<Vec<Markable>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut markables = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if local_name(&e) == "markable" => {
                let group = attr(&e, "mention_group")?
                    .filter(|group| !group.is_empty() && group != EMPTY_GROUP);
                markables.push(Markable {
                    id: required_attr(&e, "id", document)?,
                    span: required_attr(&e, "span", document)?,
                    head_orth: attr(&e, "mention_head")?.unwrap_or_default(),
                    group,
                    dominant: attr(&e, "dominant")?.filter(|d| !d.is_empty()),
                });
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(markables)
}

/// Stream ranges of every fragment of `span`, in span order
fn resolve_span(
    span: &str,
    index: &HashMap<&str, usize>,
    document: &str,
) -> Result<Vec<RangeInclusive<usize>>> {
    let lookup = |id: &str| {
        index
            .get(id.trim())
            .copied()
            .ok_or_else(|| Error::malformed(document, format!("span {span:?} points to unknown word {id:?}")))
    };

    span.split(',')
        .filter(|fragment| !fragment.trim().is_empty())
        .map(|fragment| match fragment.split_once("..") {
            Some((first, last)) => {
                let (first, last) = (lookup(first)?, lookup(last)?);
                if first > last {
                    return Err(Error::malformed(
                        document,
                        format!("span fragment {fragment:?} runs backwards"),
                    ));
                }
                Ok(first..=last)
            }
            None => lookup(fragment).map(|idx| idx..=idx),
        })
        .collect()
}

/// Text of one fragment; a single-word fragment keeps its token even if punctuation
fn fragment_text(stream: &[Word], fragment: &RangeInclusive<usize>, form: Form) -> String {
    let words = &stream[fragment.clone()];
    if let [word] = words {
        return match form {
            Form::Orth => word.orth.clone(),
            Form::Base => word.base.clone(),
        };
    }
    words_to_text(words.iter().filter(|w| !w.is_punctuation()), form)
}

fn build_mention(
    markable: Markable,
    position: usize,
    stream: &[Word],
    index: &HashMap<&str, usize>,
    document: &str,
    extractor: &FeatureExtractor,
    options: &ReadOptions,
) -> Result<Mention> {
    let fragments = resolve_span(&markable.span, index, document)?;
    let indices: Vec<usize> = fragments
        .iter()
        .flat_map(Clone::clone)
        .filter(|&idx| !stream[idx].is_punctuation())
        .collect();
    let (Some(&first), Some(&last)) = (indices.first(), indices.last()) else {
        return Err(Error::malformed(
            document,
            format!("mention {} has no words", markable.id),
        ));
    };

    let join = |form| {
        fragments
            .iter()
            .map(|fragment| fragment_text(stream, fragment, form))
            .collect::<Vec<_>>()
            .join(FRAGMENT_SEPARATOR)
    };
    let words: Vec<Word> = indices.iter().map(|&idx| stream[idx].clone()).collect();
    let head_lower = markable.head_orth.to_lowercase();
    let head = words
        .iter()
        .find(|w| w.orth.to_lowercase() == head_lower || w.orth == markable.head_orth)
        .cloned();

    let (set, dominant) = if options.clear_sets {
        (None, None)
    } else {
        (markable.group, markable.dominant)
    };

    let span = MentionSpan {
        id: markable.id,
        text: join(Form::Orth),
        lemmatized_text: join(Form::Base),
        words,
        head_orth: markable.head_orth,
        head,
        position_in_mentions: position,
        set,
        dominant,
    };
    let context = gather(stream, first, last.max(first), options.context, IdAnchor::Last);
    Ok(Mention::build(span, context, extractor))
}

/// Write `text` next to copies of its input layers in `out_dir`.
///
/// The words layer and the `.mmax` file are copied verbatim; the mentions
/// layer is rewritten with every markable's `mention_group` set to its set id
/// (or `empty`) and, for set members, `dominant` set to the text of the set's
/// dominant mention. All other markup passes through.
///
/// # Errors
///
/// Returns an error if an input layer is missing or a file cannot be written
pub fn write(input: &Path, out_dir: &Path, text: &Text) -> Result<()> {
    let layout = Layout::of(input)?;
    let mentions_xml = fs::read_to_string(layout.layer(&layout.mentions_name(), "mentions")?)?;
    fs::create_dir_all(out_dir)?;

    if !same_dir(&layout.dir, out_dir) {
        fs::copy(input, out_dir.join(layout.mmax_name()))?;
        fs::copy(
            layout.layer(&layout.words_name(), "words")?,
            out_dir.join(layout.words_name()),
        )?;
    }
    fs::write(
        out_dir.join(layout.mentions_name()),
        rewrite_mentions(&mentions_xml, text)?,
    )?;
    debug!(text = %text.id, out = %out_dir.display(), "wrote MMAX document");
    Ok(())
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn rewrite_mentions(xml: &str, text: &Text) -> Result<Vec<u8>> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::new());
    loop {
        match reader.read_event()? {
            Event::Start(e) if local_name(&e) == "markable" => {
                writer.write_event(Event::Start(relabel(&e, text)?))?;
            }
            Event::Empty(e) if local_name(&e) == "markable" => {
                writer.write_event(Event::Empty(relabel(&e, text)?))?;
            }
            Event::Eof => break,
            event => writer.write_event(event)?,
        }
    }
    Ok(writer.into_inner())
}

fn relabel(e: &BytesStart<'_>, text: &Text) -> Result<BytesStart<'static>> {
    let id = attr(e, "id")?.unwrap_or_default();
    let set = text.mention_set(&id);
    let dominant = set
        .and_then(|set_id| text.dominant_of(set_id))
        .map(|mnt| mnt.text.as_str());

    let mut elem = BytesStart::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
    let mut has_group = false;
    let mut has_dominant = false;
    for attribute in e.attributes() {
        let attribute = attribute?;
        match (attribute.key.as_ref(), dominant) {
            (b"mention_group", _) => {
                has_group = true;
                elem.push_attribute(("mention_group", set.unwrap_or(EMPTY_GROUP)));
            }
            (b"dominant", Some(dominant)) => {
                has_dominant = true;
                elem.push_attribute(("dominant", dominant));
            }
            _ => elem.push_attribute(attribute),
        }
    }
    if !has_group {
        elem.push_attribute(("mention_group", set.unwrap_or(EMPTY_GROUP)));
    }
    if let (false, Some(dominant)) = (has_dominant, dominant) {
        elem.push_attribute(("dominant", dominant));
    }
    Ok(elem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{LexicalResources, WordVectors};
    use std::sync::Arc;

    const WORDS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE words SYSTEM "words.dtd">
<words>
<word id="word_1" base="Jan" ctag="subst" msd="sg:nom:m1">Jan</word>
<word id="word_2" base="Kowalski" ctag="subst" msd="sg:nom:m1">Kowalski</word>
<word id="word_3" base="przyjść" ctag="praet" msd="sg:m1:perf">przyszedł</word>
<word id="word_4" base="." ctag="interp" msd="" hasnps="true" lastinsent="true">.</word>
<word id="word_5" base="on" ctag="ppron3" msd="sg:nom:m1:ter:akc:npraep">On</word>
<word id="word_6" base="," ctag="interp" msd="" hasNps="true">,</word>
<word id="word_7" base="Kowalski" ctag="subst" msd="sg:nom:m1">Kowalski</word>
<word id="word_8" base="." ctag="interp" msd="" hasnps="true" lastInSent="true" lastInPar="true">.</word>
</words>
"#;

    const MENTIONS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE markables SYSTEM "markables.dtd">
<markables xmlns="www.eml.org/NameSpaces/mention">
<markable id="markable_1" span="word_1..word_2" mention_head="Kowalski" mention_group="set_3" dominant="Jan Kowalski"/>
<markable id="markable_2" span="word_5" mention_head="on" mention_group="empty"/>
<markable id="markable_3" span="word_5..word_7" mention_head="Kowalski" mention_group="empty"/>
</markables>
"#;

    fn extractor() -> FeatureExtractor {
        FeatureExtractor::new(Arc::new(LexicalResources::new()), Arc::new(WordVectors::empty(2)))
            .with_seed(Some(3))
    }

    fn document(dir: &Path, mentions: &str) -> PathBuf {
        let path = dir.join("doc.mmax");
        fs::write(&path, "<mmax_project/>").unwrap();
        fs::write(dir.join("doc_words.xml"), WORDS).unwrap();
        fs::write(dir.join("doc_mentions.xml"), mentions).unwrap();
        path
    }

    #[test]
    fn test_parse_words() {
        let words = parse_words(WORDS, "doc").unwrap();
        assert_eq!(words.len(), 8);
        assert_eq!(words[2].orth, "przyszedł");
        assert!(words[3].has_nps && words[3].last_in_sentence && !words[3].last_in_paragraph);
        assert!(words[5].has_nps);
        assert!(words[7].last_in_sentence && words[7].last_in_paragraph);
    }

    #[test]
    fn test_resolve_span() {
        let words = parse_words(WORDS, "doc").unwrap();
        let index: HashMap<&str, usize> =
            words.iter().enumerate().map(|(i, w)| (w.id.as_str(), i)).collect();
        assert_eq!(resolve_span("word_1..word_3", &index, "doc").unwrap(), vec![0..=2]);
        assert_eq!(
            resolve_span("word_1,word_5..word_7", &index, "doc").unwrap(),
            vec![0..=0, 4..=6]
        );
        assert!(matches!(
            resolve_span("word_1..word_99", &index, "doc"),
            Err(Error::MalformedAnnotation { .. })
        ));
        assert!(resolve_span("word_3..word_1", &index, "doc").is_err());
    }

    #[test]
    fn test_read_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = document(dir.path(), MENTIONS);
        let text = read(&path, &extractor(), &ReadOptions::default()).unwrap();

        assert_eq!(text.id, "doc");
        assert_eq!(text.mentions.len(), 3);

        let jan = &text.mentions[0];
        assert_eq!(jan.text, "Jan Kowalski");
        assert_eq!(jan.set.as_deref(), Some("set_3"));
        assert_eq!(jan.dominant.as_deref(), Some("Jan Kowalski"));
        assert_eq!(jan.head.as_ref().map(|h| h.id.as_str()), Some("word_2"));
        assert!(jan.first_in_sentence && jan.first_in_paragraph);
        assert_eq!((jan.start_in_words, jan.end_in_words), (0, 1));

        let on = &text.mentions[1];
        assert_eq!(on.set, None);
        // case-insensitive head match
        assert_eq!(on.head.as_ref().map(|h| h.orth.as_str()), Some("On"));
        assert_eq!(on.sentence_id, 1);
        assert_eq!(on.position_in_mentions, 1);
        assert_eq!(on.start_in_words, 3);
        assert_eq!(on.prec_context.len(), 3);
        assert_eq!(on.follow_context.len(), 1);

        // punctuation inside a span is dropped from words and text
        let long = &text.mentions[2];
        assert_eq!(long.words.len(), 2);
        assert_eq!(long.text, "On Kowalski");
        assert_eq!(long.features.len(), extractor().mention_width());
    }

    #[test]
    fn test_clear_sets() {
        let dir = tempfile::tempdir().unwrap();
        let path = document(dir.path(), MENTIONS);
        let options = ReadOptions {
            clear_sets: true,
            ..ReadOptions::default()
        };
        let text = read(&path, &extractor(), &options).unwrap();
        assert!(text.mentions.iter().all(|m| m.set.is_none() && m.dominant.is_none()));
    }

    #[test]
    fn test_discontinuous_mention() {
        let dir = tempfile::tempdir().unwrap();
        let mentions = r#"<markables>
<markable id="m1" span="word_1,word_7" mention_head="Kowalski" mention_group="empty"/>
</markables>"#;
        let path = document(dir.path(), mentions);
        let text = read(&path, &extractor(), &ReadOptions::default()).unwrap();
        let mnt = &text.mentions[0];
        assert_eq!(mnt.text, "Jan [...] Kowalski");
        assert_eq!(mnt.head.as_ref().map(|h| h.id.as_str()), Some("word_7"));
        assert_eq!((mnt.start_in_words, mnt.end_in_words), (0, 4));
        // counted up to word_7, past the sentence end at word_4
        assert_eq!(mnt.sentence_id, 1);
        assert_eq!(mnt.paragraph_id, 0);
    }

    #[test]
    fn test_punctuation_only_span_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let mentions = r#"<markables><markable id="m1" span="word_4" mention_head="." mention_group="empty"/></markables>"#;
        let path = document(dir.path(), mentions);
        let err = read(&path, &extractor(), &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, Error::MalformedAnnotation { .. }));
    }

    #[test]
    fn test_missing_layer() {
        let dir = tempfile::tempdir().unwrap();
        let path = document(dir.path(), MENTIONS);
        fs::remove_file(dir.path().join("doc_mentions.xml")).unwrap();
        let err = read(&path, &extractor(), &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, Error::MissingLayer { ref layer, .. } if layer == "mentions"));
    }

    #[test]
    fn test_write_relabels_markables() {
        let dir = tempfile::tempdir().unwrap();
        let path = document(dir.path(), MENTIONS);
        let options = ReadOptions {
            clear_sets: true,
            ..ReadOptions::default()
        };
        let mut text = read(&path, &extractor(), &options).unwrap();
        text.mentions[1].set = Some("set_0".to_string());
        text.mentions[2].set = Some("set_0".to_string());

        let out = dir.path().join("out");
        write(&path, &out, &text).unwrap();
        assert!(out.join("doc.mmax").is_file());
        assert_eq!(fs::read_to_string(out.join("doc_words.xml")).unwrap(), WORDS);

        let written = fs::read_to_string(out.join("doc_mentions.xml")).unwrap();
        assert!(written.contains("<!DOCTYPE markables SYSTEM \"markables.dtd\">"));
        assert!(written.contains(r#"id="markable_1" span="word_1..word_2" mention_head="Kowalski" mention_group="empty" dominant="Jan Kowalski""#));
        assert!(written.contains(r#"id="markable_2" span="word_5" mention_head="on" mention_group="set_0" dominant="On Kowalski""#));

        let reread = read(&out.join("doc.mmax"), &extractor(), &ReadOptions::default()).unwrap();
        assert_eq!(reread.mention_set("markable_3"), Some("set_0"));
        assert_eq!(reread.mention_set("markable_1"), None);
    }
}
