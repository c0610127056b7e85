//! Parses the tagged marker stream (`<<Name|json>>…<<NameEnd|{}>>`) templates
//! emit into an [`OutputElements`] tree. The tag grammar is regular (balanced
//! pairs, no recursion beyond nesting depth), so this is a stack scanner
//! rather than a LALR grammar, built on the same `lazy_static` + `Regex`
//! tokenizing idiom used elsewhere in this crate.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value as Json;

use crate::error::{GortError, Result};

#[derive(Clone, Debug, PartialEq)]
pub enum OutputElement {
    Divider,
    Header {
        color: Option<String>,
        title: String,
    },
    Image {
        url: String,
        thumbnail: bool,
    },
    Section {
        fields: Vec<String>,
        accessory: Option<String>,
    },
    Text {
        markdown: bool,
        monospace: bool,
        emoji: bool,
        inline: bool,
        title: Option<String>,
        text: String,
    },
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct OutputElements(pub Vec<OutputElement>);

lazy_static! {
    static ref TAG: Regex = Regex::new(r"<<(?P<name>[A-Za-z]+)(?P<end>End)?\|(?P<payload>\{[^>]*\})>>").unwrap();
}

struct OpenTag {
    name: String,
    payload: Json,
    body: String,
    line: usize,
}

/// Parse a rendered template's tagged-marker output into an element tree.
/// `<<NameEnd|{}>>` not matching the innermost open `<<Name|…>>` is an error
/// citing the 1-based line number.
pub fn parse(rendered: &str) -> Result<OutputElements> {
    let mut stack: Vec<OpenTag> = Vec::new();
    let mut top_level = Vec::new();

    for (line_idx, line) in rendered.lines().enumerate() {
        let line_no = line_idx + 1;
        let mut cursor = 0usize;
        for capture in TAG.captures_iter(line) {
            let whole = capture.get(0).unwrap();
            if whole.start() > cursor {
                append_body(&mut stack, &line[cursor..whole.start()]);
            }
            cursor = whole.end();

            let name = capture.name("name").unwrap().as_str().to_owned();
            let is_end = capture.name("end").is_some();
            let payload: Json = serde_json::from_str(capture.name("payload").unwrap().as_str())?;

            if is_end {
                let Some(open) = stack.pop() else {
                    return Err(GortError::parse(
                        format!("unmatched closing tag <<{name}End>>"),
                        line_no,
                    ));
                };
                if open.name != name {
                    return Err(GortError::parse(
                        format!("mismatched closing tag <<{name}End>>, expected <<{}End>>", open.name),
                        line_no,
                    ));
                }
                let element = build_element(&open, &open.body)?;
                match stack.last_mut() {
                    Some(parent) => parent.body.push_str(&format!("{element:?}")),
                    None => top_level.push(element),
                }
            } else {
                stack.push(OpenTag {
                    name,
                    payload,
                    body: String::new(),
                    line: line_no,
                });
            }
        }
        if cursor < line.len() {
            append_body(&mut stack, &line[cursor..]);
        }
        append_body(&mut stack, "\n");
    }

    if let Some(unclosed) = stack.pop() {
        return Err(GortError::parse(
            format!("unclosed tag <<{}>>", unclosed.name),
            unclosed.line,
        ));
    }

    Ok(OutputElements(top_level))
}

fn append_body(stack: &mut [OpenTag], text: &str) {
    if let Some(top) = stack.last_mut() {
        top.body.push_str(text);
    }
}

fn build_element(open: &OpenTag, body: &str) -> Result<OutputElement> {
    let body = body.trim_matches('\n');
    Ok(match open.name.as_str() {
        "Divider" => OutputElement::Divider,
        "Header" => OutputElement::Header {
            color: open.payload.get("color").and_then(Json::as_str).map(str::to_owned),
            title: open.payload.get("title").and_then(Json::as_str).unwrap_or_default().to_owned(),
        },
        "Image" => OutputElement::Image {
            url: open.payload.get("url").and_then(Json::as_str).unwrap_or_default().to_owned(),
            thumbnail: open.payload.get("thumbnail").and_then(Json::as_bool).unwrap_or(false),
        },
        "Section" => OutputElement::Section {
            fields: open
                .payload
                .get("fields")
                .and_then(Json::as_array)
                .map(|items| items.iter().filter_map(Json::as_str).map(str::to_owned).collect())
                .unwrap_or_default(),
            accessory: open.payload.get("accessory").and_then(Json::as_str).map(str::to_owned),
        },
        "Text" => OutputElement::Text {
            markdown: open.payload.get("markdown").and_then(Json::as_bool).unwrap_or(false),
            monospace: open.payload.get("monospace").and_then(Json::as_bool).unwrap_or(false),
            emoji: open.payload.get("emoji").and_then(Json::as_bool).unwrap_or(false),
            inline: open.payload.get("inline").and_then(Json::as_bool).unwrap_or(false),
            title: open.payload.get("title").and_then(Json::as_str).map(str::to_owned),
            text: body.to_owned(),
        },
        other => {
            return Err(GortError::parse(
                format!("unknown output tag '{other}'"),
                open.line,
            ))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_divider_and_header() {
        let rendered = "<<Divider|{}>><<DividerEnd|{}>>\n<<Header|{\"title\":\"Deploys\"}>><<HeaderEnd|{}>>";
        let tree = parse(rendered).unwrap();
        assert_eq!(tree.0[0], OutputElement::Divider);
        assert!(matches!(&tree.0[1], OutputElement::Header { title, .. } if title == "Deploys"));
    }

    #[test]
    fn parses_text_body_between_tags() {
        let rendered = "<<Text|{\"markdown\":true}>>hello *world*<<TextEnd|{}>>";
        let tree = parse(rendered).unwrap();
        match &tree.0[0] {
            OutputElement::Text { markdown, text, .. } => {
                assert!(*markdown);
                assert_eq!(text, "hello *world*");
            }
            other => panic!("expected Text, got {other:?}"),
        }
    }

    #[test]
    fn unmatched_closing_tag_cites_line_number() {
        let err = parse("line one\n<<HeaderEnd|{}>>").unwrap_err();
        match err {
            GortError::Parse { position, .. } => assert_eq!(position, 2),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn unclosed_tag_is_an_error() {
        assert!(parse("<<Header|{}>>no close").is_err());
    }
}
