//! Streaming parser turning a configuration document into a [`Registry`]

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::HashMap;
use tracing::{trace, warn};

use super::Registry;
use crate::error::{Error, Result};
use crate::rules::{Action, Condition, Mode, Pattern, Subdir, TargetCheck, split_list};

/// Parser state carried between events
#[derive(Default)]
struct Handler {
    registry: Registry,
    /// Index of the SUBDIR currently open, if any
    subdir: Option<usize>,
    /// ACTION currently open and the text collected for it
    action: Option<(Action, String)>,
}

impl Handler {
    fn start(&mut self, name: &[u8], attrs: &Attrs) -> Result<()> {
        match name {
            b"OPTION" => {
                let option = attrs.require("OPTION", "name")?;
                self.registry
                    .options
                    .insert(option, attrs.get("help").unwrap_or_default());
            }
            b"ACTION" => {
                let action = Action::new(
                    attrs.require("ACTION", "name")?,
                    String::new(),
                    attrs.condition(),
                    Mode::from_attr(attrs.get("mode").as_deref()),
                );
                self.action = Some((action, String::new()));
            }
            b"ACTIONORDER" => {
                let order = attrs.require("ACTIONORDER", "order")?;
                self.registry.action_order = split_list(Some(&order));
            }
            b"SUBDIR" => {
                let subdir = Subdir::new(
                    attrs.require("SUBDIR", "name")?,
                    attrs.condition(),
                    split_list(attrs.get("actions").as_deref()),
                    attrs.get("recurse").as_deref() == Some("yes"),
                );
                self.registry.subdirs.push(subdir);
                self.subdir = Some(self.registry.subdirs.len() - 1);
            }
            b"UPDATE" => {
                let pattern = attrs.pattern("UPDATE")?;
                self.open_subdir("UPDATE")?.add_update(pattern);
            }
            b"EXCLUDE" => {
                let pattern = attrs.pattern("EXCLUDE")?;
                self.open_subdir("EXCLUDE")?.add_exclude(pattern);
            }
            b"CHECKTARGET" => {
                let check = TargetCheck::new(
                    &attrs.require("CHECKTARGET", "pattern")?,
                    &attrs.require("CHECKTARGET", "file")?,
                    attrs.condition(),
                    attrs.get("help"),
                )?;
                self.registry.target_checks.push(check);
            }
            other => trace!("Ignoring element <{}>", String::from_utf8_lossy(other)),
        }
        Ok(())
    }

    fn end(&mut self, name: &[u8]) {
        match name {
            b"ACTION" => {
                if let Some((mut action, text)) = self.action.take() {
                    action.command = text.replace(['\n', '\r'], "");
                    for var in action.unresolved_vars() {
                        warn!("Action '{}' uses ${var}, which is never set", action.name);
                    }
                    self.registry.actions.insert(action.name.clone(), action);
                }
            }
            b"SUBDIR" => self.subdir = None,
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if let Some((_, content)) = self.action.as_mut() {
            content.push_str(text);
        }
    }

    fn open_subdir(&mut self, element: &'static str) -> Result<&mut Subdir> {
        self.subdir
            .and_then(|i| self.registry.subdirs.get_mut(i))
            .ok_or(Error::Misplaced {
                element,
                parent: "SUBDIR",
            })
    }
}

/// Attributes of one element, unescaped
struct Attrs(HashMap<String, String>);

impl Attrs {
    fn read(element: &BytesStart<'_>, position: u64) -> Result<Self> {
        let mut map = HashMap::new();
        for attr in element.attributes() {
            let attr = attr.map_err(|e| Error::parse(position, e.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| Error::parse(position, e.to_string()))?;
            map.insert(key, value.into_owned());
        }
        Ok(Self(map))
    }

    fn get(&self, name: &str) -> Option<String> {
        self.0.get(name).cloned()
    }

    fn require(&self, element: &'static str, attribute: &'static str) -> Result<String> {
        self.get(attribute).ok_or(Error::MissingAttribute { element, attribute })
    }

    fn condition(&self) -> Condition {
        Condition::from_attrs(
            self.0.get("except").map(String::as_str),
            self.0.get("depends").map(String::as_str),
        )
    }

    fn pattern(&self, element: &'static str) -> Result<Pattern> {
        Pattern::new(
            &self.require(element, "pattern")?,
            self.0.get("target").map(String::as_str),
            self.condition(),
            self.get("options"),
        )
    }
}

/// Parse a configuration document
pub(super) fn parse(xml: &str) -> Result<Registry> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut handler = Handler::default();
    let mut open: Vec<Vec<u8>> = Vec::new();
    let mut seen_root = false;

    loop {
        let position = reader.buffer_position() as u64;
        let event = reader
            .read_event()
            .map_err(|e| Error::parse(position, e.to_string()))?;

        match event {
            Event::Start(ref e) => {
                if open.is_empty() && seen_root {
                    return Err(Error::parse(position, "more than one root element"));
                }
                seen_root = true;
                let attrs = Attrs::read(e, position)?;
                handler.start(e.name().as_ref(), &attrs)?;
                open.push(e.name().as_ref().to_vec());
            }
            Event::Empty(ref e) => {
                if open.is_empty() && seen_root {
                    return Err(Error::parse(position, "more than one root element"));
                }
                seen_root = true;
                let attrs = Attrs::read(e, position)?;
                handler.start(e.name().as_ref(), &attrs)?;
                handler.end(e.name().as_ref());
            }
            Event::End(ref e) => {
                open.pop();
                handler.end(e.name().as_ref());
            }
            Event::Text(ref e) => {
                let text = e
                    .unescape()
                    .map_err(|err| Error::parse(position, err.to_string()))?;
                if open.is_empty() && !text.trim().is_empty() {
                    return Err(Error::parse(position, "text outside the root element"));
                }
                handler.text(&text);
            }
            Event::CData(e) => {
                let data = e.into_inner();
                let text = std::str::from_utf8(&data)
                    .map_err(|err| Error::parse(position, err.to_string()))?;
                handler.text(text);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(name) = open.last() {
        return Err(Error::parse(
            reader.buffer_position() as u64,
            format!("unexpected end of document, <{}> not closed", String::from_utf8_lossy(name)),
        ));
    }
    if !seen_root {
        return Err(Error::parse(0, "no root element"));
    }

    Ok(handler.registry)
}
