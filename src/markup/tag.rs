//! Opening-tag parsing and attribute escaping

use regex::{Captures, Regex};
use std::borrow::Cow;
use std::fmt::Write as _;
use std::sync::LazyLock;

use crate::error::{ConsentError, Result};

static TAG_OPEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^<([A-Za-z][A-Za-z0-9-]*)").expect("invalid tag open pattern")
});

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^([^\s"'<>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
        .expect("invalid attribute pattern")
});

static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]{2,6});")
        .expect("invalid entity pattern")
});

/// An element's opening tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    attrs: Vec<(String, Option<String>)>,
    pub self_closing: bool,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().to_ascii_lowercase(),
            attrs: Vec::new(),
            self_closing: false,
        }
    }

    /// Parse an opening tag such as `<iframe src="x" allowfullscreen>`.
    ///
    /// Attribute names are lower-cased and values entity-decoded. Anything
    /// that is not a well-formed attribute (an unterminated quote, stray
    /// `<`) fails the whole tag.
    pub fn parse(source: &str) -> Result<Self> {
        let source = source.trim();
        let caps = TAG_OPEN
            .captures(source)
            .ok_or_else(|| ConsentError::markup("not an opening tag"))?;
        let name = caps[1].to_ascii_lowercase();
        let body = source[caps[0].len()..]
            .strip_suffix('>')
            .ok_or_else(|| ConsentError::markup(format!("unterminated <{name}> tag")))?;

        let mut tag = Tag::new(name);
        let mut rest = body;
        loop {
            rest = rest.trim_start();
            if rest.is_empty() {
                break;
            }
            if rest == "/" {
                tag.self_closing = true;
                break;
            }
            let caps = ATTRIBUTE.captures(rest).ok_or_else(|| {
                ConsentError::markup(format!("malformed attribute in <{}>: {rest:?}", tag.name))
            })?;
            let key = caps[1].to_ascii_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| unescape(m.as_str()).into_owned());
            rest = &rest[caps[0].len()..];
            if !rest.is_empty() && !rest.starts_with(char::is_whitespace) && !rest.starts_with('/')
            {
                return Err(ConsentError::markup(format!(
                    "malformed attribute in <{}>: {key}",
                    tag.name
                )));
            }
            // First occurrence wins, as in browsers.
            if !tag.has(&key) {
                tag.attrs.push((key, value));
            }
        }
        Ok(tag)
    }

    pub fn has(&self, name: &str) -> bool {
        self.attrs.iter().any(|(k, _)| k == name)
    }

    /// Attribute value; bare attributes read as the empty string.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_deref().unwrap_or(""))
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = Some(value.into());
        match self.attrs.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name.to_string(), value)),
        }
    }

    pub fn set_flag(&mut self, name: &str) {
        if !self.has(name) {
            self.attrs.push((name.to_string(), None));
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self.attrs.iter().position(|(k, _)| k == name)?;
        self.attrs.remove(index).1
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    /// Serialize back to an opening tag with escaped attribute values.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(16 + self.attrs.len() * 24);
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attrs {
            out.push(' ');
            out.push_str(key);
            if let Some(value) = value {
                let _ = write!(out, "=\"{}\"", escape_attr(value));
            }
        }
        if self.self_closing {
            out.push_str(" /");
        }
        out.push('>');
        out
    }
}

/// Escape text for use inside a double-quoted attribute value.
pub fn escape_attr(value: &str) -> Cow<'_, str> {
    if !value.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(value);
    }
    let mut out = String::with_capacity(value.len() + 16);
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Escape text content.
pub fn escape_text(value: &str) -> Cow<'_, str> {
    if !value.contains(['&', '<', '>']) {
        return Cow::Borrowed(value);
    }
    let mut out = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Decode character references. Unknown named references are left as-is.
pub fn unescape(value: &str) -> Cow<'_, str> {
    if !value.contains('&') {
        return Cow::Borrowed(value);
    }
    ENTITY.replace_all(value, |caps: &Captures<'_>| {
        let entity = &caps[1];
        let decoded = if let Some(hex) = entity
            .strip_prefix("#x")
            .or_else(|| entity.strip_prefix("#X"))
        {
            u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
        } else if let Some(dec) = entity.strip_prefix('#') {
            dec.parse::<u32>().ok().and_then(char::from_u32)
        } else {
            match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => None,
            }
        };
        match decoded {
            Some(c) => c.to_string(),
            None => caps[0].to_string(),
        }
    })
}
