use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Error, Result};

/// An element of a parsed OOXML part. Names are local names (namespace prefix stripped), namespace
/// declarations are not kept as attributes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
    /// Concatenation of the element's direct text and CDATA chunks, untrimmed.
    pub text: Option<String>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    fn push_text(&mut self, text: &str) {
        self.text.get_or_insert_with(String::new).push_str(text);
    }
}

/// Parses a whole XML part into its root element. Any well-formedness problem (mismatched or
/// unclosed tags, bad escapes, stray content after the root) fails the part.
pub fn parse_xml_part(part: &str, xml_bytes: &[u8]) -> Result<XmlElement> {
    let mut reader = Reader::from_reader(xml_bytes);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let ev = reader.read_event_into(&mut buf).map_err(|e| {
            Error::malformed(part, format!("{e} (near byte {})", reader.buffer_position()))
        })?;
        match ev {
            Event::Eof => break,
            Event::Start(s) => {
                if root.is_some() {
                    return Err(Error::malformed(part, "element after the root element"));
                }
                stack.push(element_from_start(part, &s)?);
            }
            Event::Empty(s) => {
                let el = element_from_start(part, &s)?;
                attach(part, &mut stack, &mut root, el)?;
            }
            Event::End(e) => {
                let el = stack.pop().ok_or_else(|| {
                    Error::malformed(
                        part,
                        format!("unmatched end tag </{}>", bytes_to_string(e.name().as_ref())),
                    )
                })?;
                attach(part, &mut stack, &mut root, el)?;
            }
            Event::Text(t) => {
                let raw = decode_dropping_invalid(&t);
                let txt = unescape(&raw).map_err(|e| Error::malformed(part, e))?;
                match stack.last_mut() {
                    Some(cur) => cur.push_text(&txt),
                    None if txt.trim().is_empty() => {}
                    None => return Err(Error::malformed(part, "text outside the root element")),
                }
            }
            Event::CData(t) => {
                let txt = decode_dropping_invalid(&t);
                match stack.last_mut() {
                    Some(cur) => cur.push_text(&txt),
                    None => return Err(Error::malformed(part, "cdata outside the root element")),
                }
            }
            Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(Error::malformed(part, format!("unclosed element <{}>", open.name)));
    }
    root.ok_or_else(|| Error::malformed(part, "no root element"))
}

fn attach(
    part: &str,
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    el: XmlElement,
) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(el);
        return Ok(());
    }
    if root.is_some() {
        return Err(Error::malformed(part, "more than one root element"));
    }
    *root = Some(el);
    Ok(())
}

fn element_from_start(part: &str, s: &BytesStart<'_>) -> Result<XmlElement> {
    let mut el = XmlElement::new(bytes_to_string(s.name().local_name().as_ref()));
    for a in s.attributes() {
        let a = a.map_err(|e| Error::malformed(part, e))?;
        if a.key.as_namespace_binding().is_some() {
            continue;
        }
        let key = bytes_to_string(a.key.local_name().as_ref());
        let raw = decode_dropping_invalid(a.value.as_ref());
        let val = unescape(&raw).map_err(|e| Error::malformed(part, e))?;
        el.attrs.push((key, val.into_owned()));
    }
    Ok(el)
}

fn bytes_to_string(bytes: impl AsRef<[u8]>) -> String {
    String::from_utf8_lossy(bytes.as_ref()).into_owned()
}

/// Decodes UTF-8, dropping (not replacing) invalid byte sequences.
pub fn decode_dropping_invalid(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
    }
    out
}
