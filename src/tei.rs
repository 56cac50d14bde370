//! TEI (NKJP-style) corpus adapter
//!
//! A document is a directory of gzip-compressed annotation layers:
//! `ann_segmentation`, `ann_morphosyntax` and `ann_mentions` are required,
//! `ann_coreference` is optional. Layers are looked up as `<layer>.xml.gz`
//! first and `<layer>.xml` second.
//!
//! Morphosyntax: `body/p/s/seg` with an `xml:id`; each segment carries
//! `f[name=orth]/string`, `f[name=nps]/binary[@value]` and
//! `f[name=interpretation]/string` holding `base:ctag:msd`.
//!
//! Mentions: `body/p/seg` with `ptr[@target]` pointing at segments
//! (`file#id`) and `f[name=semh][@fVal]` naming the semantic head.
//!
//! Coreference: `body/p/seg` with `f[name=type][@fVal=ident]`,
//! `f[name=dominant][@fVal]` and `ptr` targets naming mentions.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use tracing::debug;

use crate::context::{gather, IdAnchor, ReadOptions};
use crate::error::{Error, Result};
use crate::features::FeatureExtractor;
use crate::types::{words_to_text, Form, Mention, MentionSpan, Text, Word, PUNCTUATION_TAG};
use crate::xml::{attr, local_name, read_maybe_gz};

pub const TEI_NS: &str = "http://www.tei-c.org/ns/1.0";
pub const NKJP_NS: &str = "http://www.nkjp.pl/ns/1.0";
pub const XI_NS: &str = "http://www.w3.org/2001/XInclude";

pub const SEGMENTATION_LAYER: &str = "ann_segmentation";
pub const MORPHOSYNTAX_LAYER: &str = "ann_morphosyntax";
pub const MENTIONS_LAYER: &str = "ann_mentions";
pub const COREFERENCE_LAYER: &str = "ann_coreference";

/// Coreference type the reader accepts
const IDENT: &str = "ident";

fn layer_path(dir: &Path, layer: &str) -> Option<PathBuf> {
    [format!("{layer}.xml.gz"), format!("{layer}.xml")]
        .into_iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

fn required_layer(dir: &Path, layer: &str, document: &str) -> Result<PathBuf> {
    layer_path(dir, layer).ok_or_else(|| {
        Error::missing_layer(document, layer.trim_start_matches("ann_"))
    })
}

/// Last component of a `file#id` pointer
fn pointer_id(target: &str) -> &str {
    target.rsplit('#').next().unwrap_or(target)
}

/// Split `base:ctag:msd`; a leading colon is the colon token itself
#[must_use]
pub fn parse_interpretation(interpretation: &str) -> (String, String, String) {
    if interpretation.starts_with(':') {
        return (":".to_string(), PUNCTUATION_TAG.to_string(), String::new());
    }
    let mut parts = interpretation.splitn(3, ':');
    let base = parts.next().unwrap_or_default().to_string();
    let ctag = parts.next().unwrap_or_default().to_string();
    let msd = parts.next().unwrap_or_default().to_string();
    (base, ctag, msd)
}

/// Read the document stored in directory `dir`
///
/// # Errors
///
/// Returns [`Error::MissingLayer`] if a required layer is absent and
/// [`Error::MalformedAnnotation`] for dangling pointers or empty mentions
pub fn read(dir: &Path, extractor: &FeatureExtractor, options: &ReadOptions) -> Result<Text> {
    let document = dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    required_layer(dir, SEGMENTATION_LAYER, &document)?;
    let morphosyntax = required_layer(dir, MORPHOSYNTAX_LAYER, &document)?;
    let mentions = required_layer(dir, MENTIONS_LAYER, &document)?;

    let stream = parse_morphosyntax(&read_maybe_gz(&morphosyntax)?, &document)?;
    let index: HashMap<&str, usize> = stream
        .iter()
        .enumerate()
        .map(|(idx, word)| (word.id.as_str(), idx))
        .collect();

    let mut text = Text::new(&document);
    for (position, node) in parse_mentions(&read_maybe_gz(&mentions)?, &document)?
        .into_iter()
        .enumerate()
    {
        let mention = build_mention(node, position, &stream, &index, &document, extractor, options)?;
        text.mentions.push(mention);
    }

    if !options.clear_sets {
        if let Some(coreference) = layer_path(dir, COREFERENCE_LAYER) {
            apply_coreference(&read_maybe_gz(&coreference)?, &mut text)?;
        }
    }

    text.segments = stream.iter().map(|word| word.orth.clone()).collect();
    text.clusters = clusters(&text, options.singleton_clusters);

    debug!(
        text = %text.id,
        segments = stream.len(),
        mentions = text.mentions.len(),
        clusters = text.clusters.len(),
        "read TEI document"
    );
    Ok(text)
}

/// Flattened `(start, end)` offsets per cluster, clusters in order of first member
#[must_use]
pub fn clusters(text: &Text, singletons: bool) -> Vec<Vec<(usize, usize)>> {
    let mut order: Vec<&str> = Vec::new();
    let mut members: HashMap<&str, Vec<(usize, usize)>> = HashMap::new();
    for mnt in &text.mentions {
        let key = match mnt.set.as_deref() {
            Some(set_id) => set_id,
            None if singletons => mnt.id.as_str(),
            None => continue,
        };
        members
            .entry(key)
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push((mnt.start_in_words, mnt.end_in_words));
    }
    order
        .into_iter()
        .filter_map(|key| members.remove(key))
        .collect()
}

#[derive(Debug, Default)]
struct SegmentBuilder {
    id: String,
    orth: String,
    interpretation: String,
    has_nps: bool,
}

impl SegmentBuilder {
    fn build(self) -> Word {
        let (base, ctag, msd) = parse_interpretation(&self.interpretation);
        Word::new(self.id, self.orth, base, ctag, msd).with_nps(self.has_nps)
    }
}

fn parse_morphosyntax(xml: &str, document: &str) -> Result<Vec<Word>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stream: Vec<Word> = Vec::new();
    let mut in_body = false;
    let mut sentence_start = 0;
    let mut current: Option<SegmentBuilder> = None;
    let mut features: Vec<String> = Vec::new();
    let mut in_string = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match local_name(&e).as_str() {
                "body" => in_body = true,
                "s" if in_body => sentence_start = stream.len(),
                "seg" if in_body => {
                    let id = attr(&e, "xml:id")?
                        .ok_or_else(|| Error::malformed(document, "segment without xml:id"))?;
                    current = Some(SegmentBuilder {
                        id,
                        ..SegmentBuilder::default()
                    });
                }
                "f" if current.is_some() => {
                    features.push(attr(&e, "name")?.unwrap_or_default());
                }
                "string" if current.is_some() => in_string = true,
                "binary" => read_nps(&e, &features, current.as_mut())?,
                _ => {}
            },
            Event::Empty(e) => {
                if local_name(&e) == "binary" {
                    read_nps(&e, &features, current.as_mut())?;
                }
            }
            Event::Text(t) if in_string => {
                if let Some(segment) = current.as_mut() {
                    match features.last().map(String::as_str) {
                        Some("orth") => segment.orth.push_str(&t.unescape()?),
                        Some("interpretation") => segment.interpretation.push_str(&t.unescape()?),
                        _ => {}
                    }
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"string" => in_string = false,
                b"f" => {
                    features.pop();
                }
                b"seg" => {
                    if let Some(segment) = current.take() {
                        stream.push(segment.build());
                    }
                }
                b"s" if in_body && stream.len() > sentence_start => {
                    if let Some(last) = stream.last_mut() {
                        last.last_in_sentence = true;
                    }
                }
                b"p" if in_body => {
                    if let Some(last) = stream.last_mut().filter(|w| w.last_in_sentence) {
                        last.last_in_paragraph = true;
                    }
                }
                b"body" => in_body = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(stream)
}

fn read_nps(e: &BytesStart<'_>, features: &[String], segment: Option<&mut SegmentBuilder>) -> Result<()> {
    if let (Some(segment), Some("nps")) = (segment, features.last().map(String::as_str)) {
        segment.has_nps = attr(e, "value")?.as_deref() == Some("true");
    }
    Ok(())
}

/// A `seg` of the mentions or coreference layer
#[derive(Debug, Default, Clone, PartialEq)]
struct PointerNode {
    id: String,
    targets: Vec<String>,
    values: HashMap<String, String>,
}

/// Every `body//p//seg` with its `ptr` targets and `f[@fVal]` values
fn parse_pointer_nodes(xml: &str, document: &str) -> Result<Vec<PointerNode>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut nodes = Vec::new();
    let mut in_body = false;
    let mut current: Option<PointerNode> = None;

    loop {
        let event = reader.read_event()?;
        let element = match &event {
            Event::Start(e) | Event::Empty(e) => Some(e),
            _ => None,
        };
        if let Some(e) = element {
            match local_name(e).as_str() {
                "body" => in_body = true,
                "seg" if in_body => {
                    let id = attr(e, "xml:id")?
                        .ok_or_else(|| Error::malformed(document, "seg without xml:id"))?;
                    let node = PointerNode {
                        id,
                        ..PointerNode::default()
                    };
                    if matches!(event, Event::Empty(_)) {
                        nodes.push(node);
                    } else {
                        current = Some(node);
                    }
                }
                "ptr" => {
                    if let (Some(node), Some(target)) = (current.as_mut(), attr(e, "target")?) {
                        node.targets.push(pointer_id(&target).to_string());
                    }
                }
                "f" => {
                    if let (Some(node), Some(name), Some(value)) =
                        (current.as_mut(), attr(e, "name")?, attr(e, "fVal")?)
                    {
                        node.values.insert(name, value);
                    }
                }
                _ => {}
            }
            continue;
        }
        match event {
            Event::End(e) => match e.local_name().as_ref() {
                b"seg" => {
                    if let Some(node) = current.take() {
                        nodes.push(node);
                    }
                }
                b"body" => in_body = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(nodes)
}

fn parse_mentions(xml: &str, document: &str) -> Result<Vec<PointerNode>> {
    parse_pointer_nodes(xml, document)
}

fn build_mention(
    node: PointerNode,
    position: usize,
    stream: &[Word],
    index: &HashMap<&str, usize>,
    document: &str,
    extractor: &FeatureExtractor,
    options: &ReadOptions,
) -> Result<Mention> {
    let lookup = |id: &str| {
        index.get(id).copied().ok_or_else(|| {
            Error::malformed(document, format!("mention {} points to unknown segment {id:?}", node.id))
        })
    };

    let mut indices = Vec::with_capacity(node.targets.len());
    for target in &node.targets {
        let idx = lookup(target)?;
        if !stream[idx].is_punctuation() {
            indices.push(idx);
        }
    }
    let head_idx = node
        .values
        .get("semh")
        .map(|semh| lookup(pointer_id(semh)))
        .transpose()?;
    if indices.is_empty() {
        indices.extend(head_idx);
    }
    let (Some(&first), Some(&last)) = (indices.first(), indices.last()) else {
        return Err(Error::malformed(
            document,
            format!("mention {} has no segments", node.id),
        ));
    };

    let words: Vec<Word> = indices.iter().map(|&idx| stream[idx].clone()).collect();
    let head = head_idx.map(|idx| stream[idx].clone());
    let span = MentionSpan {
        id: node.id,
        text: words_to_text(&words, Form::Orth),
        lemmatized_text: words_to_text(&words, Form::Base),
        head_orth: head.as_ref().map(|h| h.orth.clone()).unwrap_or_default(),
        head,
        words,
        position_in_mentions: position,
        set: None,
        dominant: None,
    };
    let context = gather(stream, first, last.max(first), options.context, IdAnchor::First);
    Ok(Mention::build(span, context, extractor))
}

fn apply_coreference(xml: &str, text: &mut Text) -> Result<()> {
    let document = text.id.clone();
    for node in parse_pointer_nodes(xml, &document)? {
        if node.values.get("type").map(String::as_str) != Some(IDENT) {
            continue;
        }
        let dominant = node.values.get("dominant").cloned();
        for target in &node.targets {
            let mention = text.get_mention_mut(target).ok_or_else(|| {
                Error::malformed(
                    document.as_str(),
                    format!("coreference {} points to unknown mention {target:?}", node.id),
                )
            })?;
            mention.set = Some(node.id.clone());
            mention.dominant.clone_from(&dominant);
        }
    }
    Ok(())
}

/// Write `text` as a TEI document directory.
///
/// Every input layer except the coreference layer is copied verbatim; a fresh
/// `ann_coreference.xml.gz` describes the sets currently assigned in `text`.
///
/// # Errors
///
/// Returns an error if a layer cannot be copied or the output cannot be written
pub fn write(input: &Path, out_dir: &Path, text: &Text) -> Result<()> {
    fs::create_dir_all(out_dir)?;
    let same = match (fs::canonicalize(input), fs::canonicalize(out_dir)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    };
    if !same {
        for entry in fs::read_dir(input)? {
            let entry = entry?;
            let name = entry.file_name();
            if entry.file_type()?.is_file()
                && !name.to_string_lossy().starts_with(COREFERENCE_LAYER)
            {
                fs::copy(entry.path(), out_dir.join(&name))?;
            }
        }
    }

    let path = out_dir.join(format!("{COREFERENCE_LAYER}.xml.gz"));
    let encoder = GzEncoder::new(File::create(&path)?, Compression::default());
    let mut writer = Writer::new_with_indent(encoder, b' ', 1);
    write_coreference(&mut writer, text)?;
    writer.into_inner().finish()?.flush()?;
    debug!(text = %text.id, out = %out_dir.display(), "wrote TEI coreference layer");
    Ok(())
}

fn start<W: Write>(writer: &mut Writer<W>, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
    let mut elem = BytesStart::new(name);
    elem.extend_attributes(attrs.iter().copied());
    writer.write_event(Event::Start(elem))?;
    Ok(())
}

fn empty<W: Write>(writer: &mut Writer<W>, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
    let mut elem = BytesStart::new(name);
    elem.extend_attributes(attrs.iter().copied());
    writer.write_event(Event::Empty(elem))?;
    Ok(())
}

fn end<W: Write>(writer: &mut Writer<W>, name: &str) -> Result<()> {
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn write_coreference<W: Write>(writer: &mut Writer<W>, text: &Text) -> Result<()> {
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    start(
        writer,
        "teiCorpus",
        &[("xmlns", TEI_NS), ("xmlns:nkjp", NKJP_NS), ("xmlns:xi", XI_NS)],
    )?;
    empty(writer, "xi:include", &[("href", "PCC_header.xml")])?;
    start(writer, "TEI", &[])?;
    empty(writer, "xi:include", &[("href", "header.xml")])?;
    start(writer, "text", &[])?;
    start(writer, "body", &[])?;
    start(writer, "p", &[])?;

    for set in text.sets() {
        let texts: Vec<&str> = set.mentions.iter().map(|mnt| mnt.text.as_str()).collect();
        // "--" may not appear inside a comment
        let comment = format!("  {}  ", texts.join("; ")).replace("--", "- -");
        writer.write_event(Event::Comment(BytesText::from_escaped(comment)))?;

        let seg_id = set.id.replace("set", "coreference");
        start(writer, "seg", &[("xml:id", &seg_id)])?;
        start(writer, "fs", &[("type", "coreference")])?;
        empty(writer, "f", &[("name", "type"), ("fVal", IDENT)])?;
        let dominant = set.dominant().map(|mnt| mnt.text.as_str()).unwrap_or_default();
        empty(writer, "f", &[("name", "dominant"), ("fVal", dominant)])?;
        end(writer, "fs")?;
        for mnt in &set.mentions {
            let target = format!("{MENTIONS_LAYER}.xml#{}", mnt.id);
            empty(writer, "ptr", &[("target", &target)])?;
        }
        end(writer, "seg")?;
    }

    for name in ["p", "body", "text", "TEI", "teiCorpus"] {
        end(writer, name)?;
    }
    Ok(())
}
