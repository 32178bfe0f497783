//! DAISY 3 package file (`.opf`).

use std::collections::HashMap;

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::{Error, Result};
use crate::util::local_name;

use super::ncc::is_smil;

const SMIL_MEDIA_TYPE: &str = "application/smil";

/// Reading order from a package file: the `href` of every spine `itemref`
/// whose manifest item is a SMIL document, relative to the package file.
pub fn parse_opf_spine(content: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    // manifest id -> (href, media_type)
    let mut manifest: HashMap<String, (String, String)> = HashMap::new();
    let mut spine_ids: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"item" => {
                        let mut id = String::new();
                        let mut href = String::new();
                        let mut media_type = String::new();
                        for attr in e.attributes().flatten() {
                            let value = String::from_utf8_lossy(&attr.value).into_owned();
                            match attr.key.as_ref() {
                                b"id" => id = value,
                                b"href" => href = value,
                                b"media-type" => media_type = value,
                                _ => {}
                            }
                        }
                        if !id.is_empty() {
                            manifest.insert(id, (href, media_type));
                        }
                    }
                    b"itemref" => {
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"idref" {
                                spine_ids.push(String::from_utf8_lossy(&attr.value).into_owned());
                            }
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(e)),
            _ => {}
        }
    }

    let spine: Vec<String> = spine_ids
        .iter()
        .filter_map(|id| manifest.get(id))
        .filter(|(href, media_type)| media_type == SMIL_MEDIA_TYPE || is_smil(href))
        .map(|(href, _)| href.clone())
        .collect();

    if spine.is_empty() {
        return Err(Error::MissingElement("spine".into()));
    }
    Ok(spine)
}
