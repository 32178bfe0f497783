//! SMIL parsing into a time-container [`Document`].
//!
//! Handles both DAISY 2.02 (SMIL 1.0, `clip-begin="npt=1.2s"`) and DAISY 3
//! (SMIL 2.0 subset, `clipBegin="0:00:01.200"`, `customTest`,
//! `end="DTBuserEscape;"`) documents.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{Error, Result};
use crate::model::{AudioRef, Document, ImageRef, MediaRef, Node, NodeId, TextRef};
use crate::skip::SkipOption;
use crate::util::local_name;

/// Attribute value marking a structure the user may escape from.
const USER_ESCAPE: &str = "DTBuserEscape;";

/// Parse a SMIL document.
///
/// The first `<seq>` directly under `<body>` becomes the document root; any
/// other top-level time containers are appended beneath it. Head `<meta>`
/// elements become document metadata, and the body sequence's `dur`
/// attribute is recorded under the `duration` key.
pub fn parse_smil(content: &str) -> Result<Document> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);
    reader.config_mut().check_end_names = false;

    let mut doc = Document::new();
    let mut seen_smil = false;
    let mut in_head = false;
    let mut in_body = false;
    let mut seen_body = false;
    let mut root_claimed = false;
    // Open time containers, innermost last.
    let mut stack: Vec<NodeId> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"smil" => seen_smil = true,
                    b"head" => in_head = true,
                    b"body" => {
                        in_body = true;
                        seen_body = true;
                    }
                    b"meta" if in_head => read_meta(&e, &mut doc)?,
                    b"customTest" if in_head => read_custom_test(&e, &mut doc)?,
                    b"seq" | b"par" if in_body => {
                        if !root_claimed && stack.is_empty() && local_name(name.as_ref()) == b"seq"
                        {
                            root_claimed = true;
                            claim_root(&e, &mut doc)?;
                            stack.push(NodeId::ROOT);
                        } else {
                            let parent = stack.last().copied().unwrap_or(NodeId::ROOT);
                            let node = container(&e)?;
                            stack.push(doc.push(parent, node));
                        }
                    }
                    other if in_body => {
                        if let Some(node) = content_node(other, &e)? {
                            let parent = stack.last().copied().unwrap_or(NodeId::ROOT);
                            doc.push(parent, node);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"smil" => seen_smil = true,
                    b"meta" if in_head => read_meta(&e, &mut doc)?,
                    b"customTest" if in_head => read_custom_test(&e, &mut doc)?,
                    b"seq" | b"par" if in_body => {
                        let parent = stack.last().copied().unwrap_or(NodeId::ROOT);
                        doc.push(parent, container(&e)?);
                    }
                    other if in_body => {
                        if let Some(node) = content_node(other, &e)? {
                            let parent = stack.last().copied().unwrap_or(NodeId::ROOT);
                            doc.push(parent, node);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"head" => in_head = false,
                    b"body" => in_body = false,
                    b"seq" | b"par" if in_body => {
                        stack.pop();
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(e)),
            _ => {}
        }
    }

    if !seen_smil {
        return Err(Error::MissingElement("smil".into()));
    }
    if !seen_body {
        return Err(Error::MissingElement("body".into()));
    }
    Ok(doc)
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for a in e.attributes() {
        let a = a?;
        if local_name(a.key.as_ref()) == key {
            let raw = String::from_utf8_lossy(&a.value).into_owned();
            let value = quick_xml::escape::unescape(&raw)
                .map(|v| v.into_owned())
                .unwrap_or(raw);
            return Ok(Some(value));
        }
    }
    Ok(None)
}

/// First of the given attribute spellings that is present.
fn attr_any(e: &BytesStart<'_>, keys: &[&[u8]]) -> Result<Option<String>> {
    for key in keys {
        if let Some(v) = attr(e, key)? {
            return Ok(Some(v));
        }
    }
    Ok(None)
}

fn read_meta(e: &BytesStart<'_>, doc: &mut Document) -> Result<()> {
    if let (Some(name), Some(content)) = (attr(e, b"name")?, attr(e, b"content")?) {
        doc.set_meta(name, content);
    }
    Ok(())
}

fn read_custom_test(e: &BytesStart<'_>, doc: &mut Document) -> Result<()> {
    let Some(id) = attr(e, b"id")? else {
        return Ok(());
    };
    let default_state = attr(e, b"defaultState")?
        .map(|s| s.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    doc.declare_skip_option(SkipOption::new(id, default_state));
    Ok(())
}

fn claim_root(e: &BytesStart<'_>, doc: &mut Document) -> Result<()> {
    if let Some(id) = attr(e, b"id")? {
        doc.set_root_id(id);
    }
    if let Some(dur) = attr(e, b"dur")? {
        doc.set_meta("duration", dur);
    }
    Ok(())
}

fn container(e: &BytesStart<'_>) -> Result<Node> {
    let name = e.name();
    let mut node = if local_name(name.as_ref()) == b"par" {
        Node::par()
    } else {
        Node::seq()
    };
    if let Some(id) = attr(e, b"id")? {
        node = node.with_id(id);
    }
    if let Some(test) = attr(e, b"customTest")?
        && let Some(first) = test.split_whitespace().next()
    {
        node = node.with_skip_option(first);
    }
    if attr(e, b"end")?.is_some_and(|end| end.trim() == USER_ESCAPE) {
        node = node.escapable();
    }
    Ok(node)
}

fn content_node(local: &[u8], e: &BytesStart<'_>) -> Result<Option<Node>> {
    let id = attr(e, b"id")?.unwrap_or_default();
    let src = attr(e, b"src")?.unwrap_or_default();

    let media = match local {
        b"audio" => {
            let begin = attr_any(e, &[b"clip-begin", b"clipBegin"])?.unwrap_or_default();
            let end = attr_any(e, &[b"clip-end", b"clipEnd"])?.unwrap_or_default();
            MediaRef::Audio(AudioRef::new(id, src, begin, end))
        }
        b"text" => MediaRef::Text(TextRef { id, src }),
        b"img" | b"image" => MediaRef::Image(ImageRef { id, src }),
        _ => return Ok(None),
    };
    Ok(Some(Node::content(media)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContainerKind, MediaGroup};

    const DAISY_202: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<!DOCTYPE smil PUBLIC "-//W3C//DTD SMIL 1.0//EN" "http://www.w3.org/TR/REC-smil/SMIL10.dtd">
<smil>
  <head>
    <meta name="dc:title" content="Sample" />
    <meta name="ncc:totalElapsedTime" content="0:00:10" />
    <meta name="ncc:timeInThisSmil" content="0:00:04.5" />
    <layout><region id="txtView" /></layout>
  </head>
  <body>
    <seq id="root_seq" dur="4.5s">
      <par endsync="last" id="par_1">
        <text src="ncc.html#h1" id="txt_1" />
        <seq id="aseq_1">
          <audio src="a.mp3" clip-begin="npt=0.000s" clip-end="npt=2.000s" id="aud_1" />
          <audio src="a.mp3" clip-begin="npt=2.000s" clip-end="npt=4.500s" id="aud_2" />
        </seq>
      </par>
    </seq>
  </body>
</smil>"#;

    const DAISY_3: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<smil xmlns="http://www.w3.org/2001/SMIL20/">
  <head>
    <meta name="dtb:uid" content="book-1"/>
    <meta name="dtb:totalElapsedTime" content="0:01:00"/>
    <customAttributes>
      <customTest id="pagenum" defaultState="false" override="visible"/>
      <customTest id="sidebar" defaultState="true" override="visible"/>
    </customAttributes>
  </head>
  <body>
    <seq id="mseq" dur="0:00:07.000" fill="remove">
      <par id="p1"><text src="book.xml#d1"/><audio src="b.mp3" clipBegin="0:00:00" clipEnd="0:00:03"/></par>
      <par id="pg1" customTest="pagenum"><text src="book.xml#pg1"/><audio src="b.mp3" clipBegin="0:00:03" clipEnd="0:00:04"/></par>
      <seq id="sb1" customTest="sidebar" end="DTBuserEscape;">
        <par id="p2"><text src="book.xml#d2"/><audio src="b.mp3" clipBegin="0:00:04" clipEnd="0:00:07"/></par>
      </seq>
      <seq id="tbl" end="DTBuserEscape;"/>
    </seq>
  </body>
</smil>"#;

    #[test]
    fn test_parse_daisy_202() {
        let doc = parse_smil(DAISY_202).unwrap();
        assert_eq!(doc.root().id, "root_seq");
        assert_eq!(doc.meta_by_suffix("totalelapsedtime"), Some("0:00:10"));
        assert_eq!(doc.meta_by_suffix("timeinthissmil"), Some("0:00:04.5"));
        assert_eq!(doc.meta("duration"), Some("4.5s"));

        let par = doc.find_by_id("par_1").unwrap();
        let group = MediaGroup::collect(&doc, par);
        assert_eq!(group.media_ids(), vec!["txt_1", "aud_1", "aud_2"]);
        assert_eq!(group.audio[1].begin_ms(), Some(2_000));
        assert_eq!(group.audio_duration_ms(), 4_500);
    }

    #[test]
    fn test_parse_daisy_3() {
        let doc = parse_smil(DAISY_3).unwrap();
        assert_eq!(doc.root().id, "mseq");
        assert_eq!(doc.children(NodeId::ROOT).len(), 4);

        let declared: Vec<(&str, bool)> = doc
            .skip_options()
            .iter()
            .map(|o| (o.id.as_str(), o.default_state))
            .collect();
        assert_eq!(declared, vec![("pagenum", false), ("sidebar", true)]);

        let pg = doc.container(doc.find_by_id("pg1").unwrap()).unwrap();
        assert_eq!(pg.kind, ContainerKind::Parallel);
        assert_eq!(pg.skip_option.as_deref(), Some("pagenum"));

        let tbl = doc.container(doc.find_by_id("tbl").unwrap()).unwrap();
        assert!(tbl.escapable);
        assert!(tbl.skip_option.is_none());

        let p1 = doc.find_by_id("p1").unwrap();
        let group = MediaGroup::collect(&doc, p1);
        assert_eq!(group.text.unwrap().src, "book.xml#d1");
        assert_eq!(group.audio[0].end_ms(), Some(3_000));
    }

    #[test]
    fn test_top_level_pars_hang_off_root() {
        let doc = parse_smil(
            r#"<smil><body><par id="a"><text src="x#1"/></par><par id="b"/></body></smil>"#,
        )
        .unwrap();
        assert_eq!(doc.children(NodeId::ROOT).len(), 2);
        assert_eq!(doc.root().id, "");
    }

    #[test]
    fn test_missing_body() {
        let err = parse_smil("<smil><head/></smil>").unwrap_err();
        assert!(matches!(err, Error::MissingElement(ref e) if e == "body"));
    }

    #[test]
    fn test_not_smil() {
        assert!(parse_smil("<html><body/></html>").is_err());
    }
}
