//! Camera overlay response parsing
//!
//! Dahua-family firmware answers `getConfig&name=VideoWidget` with
//! line-oriented `key=value` text; Hikvision-style firmware answers with an
//! XML `<TextOverlayList>` document. Both normalize to overlay id -> text.

use std::collections::HashMap;

use regex::Regex;

use crate::error::{Error, Result};

pub(crate) fn parse_overlay_config(body: &str) -> Result<HashMap<String, String>> {
    let body = body.trim();
    if body.is_empty() {
        return Err(Error::Parse("empty camera response".to_string()));
    }
    if body.starts_with('<') {
        parse_xml(body)
    } else {
        parse_plain_text(body)
    }
}

fn parse_plain_text(body: &str) -> Result<HashMap<String, String>> {
    let re = Regex::new(r"^table\.VideoWidget\[0\]\.CustomTitle\[(\d+)\]\.Text$").unwrap();

    let mut config = HashMap::new();
    let mut any_pairs = false;
    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        any_pairs = true;
        if let Some(caps) = re.captures(key.trim()) {
            config.insert(caps[1].to_string(), value.trim().to_string());
        }
    }

    if !any_pairs {
        return Err(Error::Parse(
            "camera response is neither key=value config nor XML".to_string(),
        ));
    }
    Ok(config)
}

fn parse_xml(body: &str) -> Result<HashMap<String, String>> {
    if !body.contains("TextOverlay") {
        return Err(Error::Parse(
            "XML response contains no overlay entries".to_string(),
        ));
    }

    let mut config = HashMap::new();
    let mut rest = body;
    while let Some(start) = rest.find("<TextOverlay") {
        let after = &rest[start..];
        if after.starts_with("<TextOverlayList") {
            rest = &after["<TextOverlayList".len()..];
            continue;
        }
        let Some(end) = after.find("</TextOverlay>") else {
            break;
        };
        let block = &after[..end];
        if let Some(id) = tag_text(block, "id") {
            let text = tag_text(block, "displayText").unwrap_or_default();
            config.insert(id.to_string(), text.to_string());
        }
        rest = &after[end + "</TextOverlay>".len()..];
    }
    Ok(config)
}

/// Text content of the first `<tag>...</tag>` occurrence
fn tag_text<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)? + start;
    Some(xml[start..end].trim())
}
