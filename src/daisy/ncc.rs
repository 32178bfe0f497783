//! DAISY 2.02 navigation control centre (`ncc.html`).

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::{Error, Result};
use crate::util::{local_name, split_fragment};

/// Reading order from an NCC: the SMIL file of every `<a href>` in
/// document order, fragments dropped, first occurrence wins.
pub fn parse_ncc_spine(content: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);
    reader.config_mut().check_end_names = false;

    let mut spine: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = e.name();
                if !local_name(name.as_ref()).eq_ignore_ascii_case(b"a") {
                    continue;
                }
                for attr in e.attributes().flatten() {
                    if !attr.key.as_ref().eq_ignore_ascii_case(b"href") {
                        continue;
                    }
                    let href = String::from_utf8_lossy(&attr.value).into_owned();
                    let (path, _) = split_fragment(&href);
                    if is_smil(path) && !spine.iter().any(|s| s.eq_ignore_ascii_case(path)) {
                        spine.push(path.to_string());
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(e)),
            _ => {}
        }
    }

    if spine.is_empty() {
        return Err(Error::InvalidDocument("NCC references no SMIL files".into()));
    }
    Ok(spine)
}

pub(crate) fn is_smil(path: &str) -> bool {
    path.to_ascii_lowercase().ends_with(".smil")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ncc_spine() {
        let ncc = r#"<?xml version="1.0" encoding="windows-1252"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><meta name="ncc:totalTime" content="0:00:30" /></head>
<body>
<h1 class="title" id="h1"><a href="bagw0001.smil#txt_1">Title</a></h1>
<span class="page-normal" id="p1"><a href="bagw0001.smil#txt_2">1</a></span>
<h2 id="h2"><a href="BAGW0002.SMIL#txt_1">Chapter</a></h2>
<h2 id="h3"><a href="bagw0003.smil#txt_1">Chapter</a></h2>
<p><a href="http://example.com">link</a></p>
</body></html>"#;
        let spine = parse_ncc_spine(ncc).unwrap();
        assert_eq!(spine, vec!["bagw0001.smil", "BAGW0002.SMIL", "bagw0003.smil"]);
    }

    #[test]
    fn test_ncc_without_smil() {
        let err = parse_ncc_spine("<html><body><p>empty</p></body></html>").unwrap_err();
        assert!(matches!(err, Error::InvalidDocument(_)));
    }
}
