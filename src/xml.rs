//! Small helpers over `quick-xml` shared by the corpus adapters

use std::fs::File;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use quick_xml::events::BytesStart;

use crate::error::{Error, Result};

/// Local element name, namespace prefix dropped
#[must_use]
pub fn local_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).into_owned()
}

/// Unescaped value of attribute `name`, if present
///
/// # Errors
///
/// Returns an error if the element's attributes are not well-formed
pub fn attr(element: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
    match element.try_get_attribute(name)? {
        Some(attr) => Ok(Some(attr.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

/// Unescaped value of a mandatory attribute
///
/// # Errors
///
/// Returns [`Error::MalformedAnnotation`] when the attribute is absent
pub fn required_attr(element: &BytesStart<'_>, name: &str, document: &str) -> Result<String> {
    attr(element, name)?.ok_or_else(|| {
        Error::malformed(
            document,
            format!("<{}> without {name} attribute", local_name(element)),
        )
    })
}

/// Whether any of `names` carries the literal value `true`
///
/// # Errors
///
/// Returns an error if the element's attributes are not well-formed
pub fn flag_attr(element: &BytesStart<'_>, names: &[&str]) -> Result<bool> {
    for name in names {
        if attr(element, name)?.as_deref() == Some("true") {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Read a whole file, gunzipping when the name ends in `.gz`
///
/// # Errors
///
/// Returns an error if the file cannot be read or decompressed
pub fn read_maybe_gz(path: &Path) -> Result<String> {
    let mut contents = String::new();
    if path.extension().is_some_and(|ext| ext == "gz") {
        GzDecoder::new(File::open(path)?).read_to_string(&mut contents)?;
    } else {
        File::open(path)?.read_to_string(&mut contents)?;
    }
    Ok(contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use quick_xml::events::Event;
    use quick_xml::Reader;
    use std::io::Write;

    fn first_element(xml: &str) -> BytesStart<'static> {
        let mut reader = Reader::from_str(xml);
        loop {
            match reader.read_event().unwrap() {
                Event::Start(e) | Event::Empty(e) => return e.into_owned(),
                Event::Eof => panic!("no element"),
                _ => {}
            }
        }
    }

    #[test]
    fn test_attributes() {
        let e = first_element(r#"<ns:word id="w1" base="a&amp;b" lastInSent="true"/>"#);
        assert_eq!(local_name(&e), "word");
        assert_eq!(attr(&e, "base").unwrap().as_deref(), Some("a&b"));
        assert!(attr(&e, "msd").unwrap().is_none());
        assert!(flag_attr(&e, &["lastinsent", "lastInSent"]).unwrap());
        assert!(!flag_attr(&e, &["hasnps", "hasNps"]).unwrap());
        assert!(matches!(
            required_attr(&e, "ctag", "doc"),
            Err(Error::MalformedAnnotation { .. })
        ));
    }

    #[test]
    fn test_read_maybe_gz() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("a.xml");
        std::fs::write(&plain, "<a/>").unwrap();
        assert_eq!(read_maybe_gz(&plain).unwrap(), "<a/>");

        let gz = dir.path().join("a.xml.gz");
        let mut encoder = GzEncoder::new(File::create(&gz).unwrap(), Compression::default());
        encoder.write_all(b"<b/>").unwrap();
        encoder.finish().unwrap();
        assert_eq!(read_maybe_gz(&gz).unwrap(), "<b/>");
    }
}
