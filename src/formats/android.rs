use std::collections::BTreeMap;

use anyhow::{Context, Result, anyhow};
use log::debug;
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use regex::Regex;

use crate::entry::Entry;
use crate::formats::{FormatHandler, ReconstructOptions, placeholder};

// @module: Android strings.xml handler

/// Top-level resource in document order
#[derive(Debug, Clone, PartialEq, Eq)]
enum Resource {
    String {
        name: String,
        value: String,
        translatable: bool,
    },
    Plurals {
        name: String,
        items: Vec<(String, String)>,
    },
    Array {
        name: String,
        items: Vec<String>,
    },
}

impl Resource {
    /// `(id, text)` for every translatable string of this resource
    fn entries(&self) -> Vec<(String, &str)> {
        match self {
            Resource::String {
                name,
                value,
                translatable: true,
            } => vec![(name.clone(), value.as_str())],
            Resource::String { .. } => Vec::new(),
            Resource::Plurals { name, items } => items
                .iter()
                .map(|(quantity, text)| (plural_id(name, quantity), text.as_str()))
                .collect(),
            Resource::Array { name, items } => items
                .iter()
                .enumerate()
                .map(|(i, text)| (format!("{}.{}", name, i), text.as_str()))
                .collect(),
        }
    }
}

fn plural_id(name: &str, quantity: &str) -> String {
    format!("{}#{}", name, quantity)
}

/// Android string escapes on top of XML entities
fn unescape_android(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other @ ('\'' | '"' | '\\' | '@' | '?')) => out.push(other),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn escape_android(text: &str) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\t', "\\t");
    let escaped = match escaped.strip_prefix('@') {
        Some(rest) => format!("\\@{}", rest),
        None => escaped,
    };
    partial_escape(&escaped).into_owned()
}

fn attribute(element: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for attr in element.attributes().with_checks(false) {
        let attr = attr.context("Invalid XML attribute")?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn required_name(element: &BytesStart<'_>) -> Result<String> {
    let tag = String::from_utf8_lossy(element.name().as_ref()).into_owned();
    attribute(element, b"name")?.ok_or_else(|| anyhow!("<{}> element is missing its 'name' attribute", tag))
}

/// Text content up to the matching end tag; inline markup contributes its text
fn read_text(reader: &mut Reader<&[u8]>) -> Result<String> {
    let mut text = String::new();
    let mut depth = 0usize;
    loop {
        match reader.read_event()? {
            Event::Text(e) => text.push_str(&e.unescape()?),
            Event::CData(e) => text.push_str(&String::from_utf8_lossy(&e.into_inner())),
            Event::Start(_) => depth += 1,
            Event::End(_) if depth == 0 => break,
            Event::End(_) => depth -= 1,
            Event::Eof => return Err(anyhow!("Unexpected end of XML inside an element")),
            _ => {}
        }
    }
    Ok(unescape_android(text.trim()))
}

/// `<item>` children of a `<plurals>` or `<string-array>` element
fn read_items(reader: &mut Reader<&[u8]>) -> Result<Vec<(Option<String>, String)>> {
    let mut items = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == b"item" => {
                let quantity = attribute(&e, b"quantity")?;
                items.push((quantity, read_text(reader)?));
            }
            Event::Empty(e) if e.name().as_ref() == b"item" => {
                items.push((attribute(&e, b"quantity")?, String::new()));
            }
            Event::Start(e) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                return Err(anyhow!("Unexpected <{}> inside a resource list", tag));
            }
            Event::End(_) => break,
            Event::Eof => return Err(anyhow!("Unexpected end of XML inside a resource list")),
            _ => {}
        }
    }
    Ok(items)
}

fn parse_resources(content: &str) -> Result<Vec<Resource>> {
    let mut reader = Reader::from_str(content);
    let mut resources = Vec::new();
    let mut saw_root = false;

    loop {
        match reader.read_event().context("Invalid XML")? {
            Event::Start(e) if e.name().as_ref() == b"resources" => saw_root = true,
            Event::Start(e) if e.name().as_ref() == b"string" => {
                let name = required_name(&e)?;
                let translatable = attribute(&e, b"translatable")?.as_deref() != Some("false");
                let value = read_text(&mut reader)?;
                resources.push(Resource::String {
                    name,
                    value,
                    translatable,
                });
            }
            Event::Empty(e) if e.name().as_ref() == b"string" => {
                let translatable = attribute(&e, b"translatable")?.as_deref() != Some("false");
                resources.push(Resource::String {
                    name: required_name(&e)?,
                    value: String::new(),
                    translatable,
                });
            }
            Event::Start(e) if e.name().as_ref() == b"plurals" => {
                let name = required_name(&e)?;
                let items = read_items(&mut reader)?
                    .into_iter()
                    .map(|(quantity, text)| {
                        quantity
                            .map(|q| (q, text))
                            .ok_or_else(|| anyhow!("<plurals name=\"{}\"> item is missing 'quantity'", name))
                    })
                    .collect::<Result<Vec<_>>>()?;
                resources.push(Resource::Plurals { name, items });
            }
            Event::Start(e) if e.name().as_ref() == b"string-array" => {
                let name = required_name(&e)?;
                let items = read_items(&mut reader)?.into_iter().map(|(_, text)| text).collect();
                resources.push(Resource::Array { name, items });
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(anyhow!("Root element must be <resources>"));
    }
    Ok(resources)
}

fn write_element<W: std::io::Write>(writer: &mut Writer<W>, start: BytesStart<'_>, text: &str) -> Result<()> {
    let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    writer.write_event(Event::Start(start))?;
    writer.write_event(Event::Text(BytesText::from_escaped(escape_android(text))))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

/// Android `res/values/strings.xml` files.
///
/// `<string>` entries use their name as id, `<plurals>` items use
/// `name#quantity` and `<string-array>` items use `name.index`. Strings
/// marked `translatable="false"` are not offered for translation and are
/// written back unchanged. XML comments are not preserved.
#[derive(Debug, Default, Clone, Copy)]
pub struct AndroidHandler;

impl AndroidHandler {
    pub fn new() -> Self {
        Self
    }
}

impl FormatHandler for AndroidHandler {
    fn name(&self) -> &'static str {
        "android"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["xml"]
    }

    fn supports_context(&self) -> bool {
        false
    }

    fn placeholder_patterns(&self) -> Vec<Regex> {
        placeholder::regexes(&["android", "printf"])
    }

    fn sniff(&self, content: &str) -> bool {
        content.contains("<resources")
    }

    fn parse(&self, content: &str) -> Result<Vec<Entry>> {
        let resources = parse_resources(content)?;
        let entries: Vec<Entry> = resources
            .iter()
            .flat_map(Resource::entries)
            .map(|(id, text)| Entry::new(id, text))
            .collect();
        debug!("Parsed {} resources into {} entries", resources.len(), entries.len());
        Ok(entries)
    }

    fn reconstruct(
        &self,
        _entries: &[Entry],
        translations: &BTreeMap<String, String>,
        options: &ReconstructOptions<'_>,
    ) -> Result<String> {
        let resources = parse_resources(options.source)?;
        let lookup = |id: &str, source: &str| -> String {
            translations.get(id).cloned().unwrap_or_else(|| source.to_string())
        };

        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        writer.write_event(Event::Start(BytesStart::new("resources")))?;

        for resource in &resources {
            match resource {
                Resource::String {
                    name,
                    value,
                    translatable,
                } => {
                    let mut start = BytesStart::new("string");
                    start.push_attribute(("name", name.as_str()));
                    if *translatable {
                        write_element(&mut writer, start, &lookup(name, value))?;
                    } else {
                        start.push_attribute(("translatable", "false"));
                        write_element(&mut writer, start, value)?;
                    }
                }
                Resource::Plurals { name, items } => {
                    let mut start = BytesStart::new("plurals");
                    start.push_attribute(("name", name.as_str()));
                    writer.write_event(Event::Start(start))?;
                    for (quantity, text) in items {
                        let mut item = BytesStart::new("item");
                        item.push_attribute(("quantity", quantity.as_str()));
                        write_element(&mut writer, item, &lookup(&plural_id(name, quantity), text))?;
                    }
                    writer.write_event(Event::End(BytesEnd::new("plurals")))?;
                }
                Resource::Array { name, items } => {
                    let mut start = BytesStart::new("string-array");
                    start.push_attribute(("name", name.as_str()));
                    writer.write_event(Event::Start(start))?;
                    for (i, text) in items.iter().enumerate() {
                        let id = format!("{}.{}", name, i);
                        write_element(&mut writer, BytesStart::new("item"), &lookup(&id, text))?;
                    }
                    writer.write_event(Event::End(BytesEnd::new("string-array")))?;
                }
            }
        }

        writer.write_event(Event::End(BytesEnd::new("resources")))?;
        let mut output = String::from_utf8(writer.into_inner()).context("Generated XML is not UTF-8")?;
        output.push('\n');
        Ok(output)
    }
}
