#![forbid(unsafe_code)]

//! Slot templates: messages with `{{name}}` placeholders.
//!
//! A message is parsed into alternating literal and placeholder parts:
//! `"a{{b}}c{{d}}e"` becomes `[a, b, c, d, e]`, names at odd indices. A name
//! is one or more non-whitespace characters and the shortest closing `}}`
//! wins, so `"{{a}}}"` is the placeholder `a` followed by a literal `}`.
//! Whitespace is the ECMAScript `\s` set: U+FEFF counts, U+0085 does not.
//! Anything that does not form a token is literal text; parsing never fails.
//!
//! # Substitution rules
//!
//! | Placeholders | Keyed slot matches | Otherwise                                 |
//! |--------------|--------------------|-------------------------------------------|
//! | 0            | -                  | message returned unchanged, slots ignored |
//! | 1            | keyed content      | first supplied slot, or `{{name}}`        |
//! | 2+           | keyed content      | `{{name}}` passes through as text         |
//!
//! When several slots share a key, the last one wins.
//!
//! # Emission
//!
//! [`Emission`] keeps literal text and substituted content as separate
//! [`Fragment`]s in message order. Empty literals are not emitted, so an
//! empty message emits nothing.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// A parsed message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Template {
    /// Literal, name, literal, name, ..., literal. Always odd length.
    parts: Vec<String>,
}

/// A borrowed view of one template part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Literal(&'a str),
    Placeholder(&'a str),
}

impl Template {
    /// Parse `message`. Pure and deterministic.
    #[must_use]
    pub fn parse(message: &str) -> Self {
        let mut parts = Vec::new();
        let mut pointer = 0;
        let mut search = 0;
        while let Some((start, name_end)) = find_token(message, search) {
            parts.push(message[pointer..start].to_owned());
            parts.push(message[start + OPEN.len()..name_end].to_owned());
            pointer = name_end + CLOSE.len();
            search = pointer;
        }
        parts.push(message[pointer..].to_owned());
        Self { parts }
    }

    /// Segments in message order.
    pub fn segments(&self) -> impl Iterator<Item = Segment<'_>> + '_ {
        self.parts.iter().enumerate().map(|(i, part)| {
            if i % 2 == 0 {
                Segment::Literal(part)
            } else {
                Segment::Placeholder(part)
            }
        })
    }

    /// Placeholder names in message order, duplicates included.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> + '_ {
        self.parts.iter().skip(1).step_by(2).map(String::as_str)
    }

    #[must_use]
    pub fn placeholder_count(&self) -> usize {
        self.parts.len() / 2
    }

    /// True when the message has no placeholders.
    #[must_use]
    pub fn is_plain(&self) -> bool {
        self.parts.len() == 1
    }

    /// Rebuild the original message text.
    #[must_use]
    pub fn source(&self) -> String {
        let mut out = String::new();
        for segment in self.segments() {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => push_token(&mut out, name),
            }
        }
        out
    }

    /// Render to a string, replacing each placeholder `lookup` resolves and
    /// keeping the rest as `{{name}}`.
    pub fn fill<'a>(&self, lookup: impl Fn(&str) -> Option<&'a str>) -> String {
        let mut out = String::new();
        for segment in self.segments() {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => match lookup(name) {
                    Some(value) => out.push_str(value),
                    None => push_token(&mut out, name),
                },
            }
        }
        out
    }

    /// Substitute `slots` into this template.
    #[must_use]
    pub fn interpolate<T: Clone>(&self, slots: &[Slot<T>]) -> Emission<T> {
        if self.is_plain() {
            return Emission::text(&self.parts[0]);
        }

        let keyed: BTreeMap<&str, &T> = slots
            .iter()
            .filter_map(|slot| slot.key.as_deref().map(|key| (key, &slot.content)))
            .collect();
        let positional = if self.placeholder_count() == 1 {
            slots.first().map(|slot| &slot.content)
        } else {
            None
        };

        let mut fragments = Vec::with_capacity(self.parts.len());
        for segment in self.segments() {
            match segment {
                Segment::Literal("") => {}
                Segment::Literal(text) => fragments.push(Fragment::Text(text.to_owned())),
                Segment::Placeholder(name) => {
                    match keyed.get(name).copied().or(positional) {
                        Some(content) => fragments.push(Fragment::Content(content.clone())),
                        None => {
                            trace!(placeholder = name, "unresolved template slot");
                            let mut token = String::new();
                            push_token(&mut token, name);
                            fragments.push(Fragment::Text(token));
                        }
                    }
                }
            }
        }
        Emission { fragments }
    }
}

fn push_token(out: &mut String, name: &str) {
    out.push_str(OPEN);
    out.push_str(name);
    out.push_str(CLOSE);
}

/// Find the leftmost token at or after `from`.
///
/// Returns the byte offset of `{{` and of the closing `}}`.
fn find_token(message: &str, from: usize) -> Option<(usize, usize)> {
    let mut start = from;
    while let Some(offset) = message[start..].find(OPEN) {
        let open = start + offset;
        if let Some(close) = token_close(message, open + OPEN.len()) {
            return Some((open, close));
        }
        // Retry one character later: "{{ {{x}}" still finds "x".
        start = open + 1;
    }
    None
}

/// Shortest non-empty run of non-whitespace starting at `name_start` that is
/// followed by `}}`.
fn token_close(message: &str, name_start: usize) -> Option<usize> {
    let rest = &message[name_start..];
    let mut chars = rest.char_indices();
    let (_, first) = chars.next()?;
    if is_separator(first) {
        return None;
    }
    for (i, c) in chars {
        if rest[i..].starts_with(CLOSE) {
            return Some(name_start + i);
        }
        if is_separator(c) {
            return None;
        }
    }
    None
}

/// Characters that end a placeholder name: Unicode `White_Space` minus
/// NEL, plus the byte order mark.
fn is_separator(c: char) -> bool {
    match c {
        '\u{85}' => false,
        '\u{FEFF}' => true,
        _ => c.is_whitespace(),
    }
}

/// Caller-supplied content, optionally bound to a placeholder name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot<T> {
    pub key: Option<String>,
    pub content: T,
}

impl<T> Slot<T> {
    pub fn keyed(key: impl Into<String>, content: T) -> Self {
        Self {
            key: Some(key.into()),
            content,
        }
    }

    pub fn positional(content: T) -> Self {
        Self { key: None, content }
    }
}

/// One emitted unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment<T> {
    Text(String),
    Content(T),
}

/// Ordered output of one interpolation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emission<T> {
    fragments: Vec<Fragment<T>>,
}

impl<T> Emission<T> {
    fn text(message: &str) -> Self {
        let fragments = if message.is_empty() {
            Vec::new()
        } else {
            vec![Fragment::Text(message.to_owned())]
        };
        Self { fragments }
    }

    #[must_use]
    pub fn fragments(&self) -> &[Fragment<T>] {
        &self.fragments
    }

    #[must_use]
    pub fn into_fragments(self) -> Vec<Fragment<T>> {
        self.fragments
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Map substituted content, leaving text untouched.
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Emission<U> {
        Emission {
            fragments: self
                .fragments
                .into_iter()
                .map(|fragment| match fragment {
                    Fragment::Text(text) => Fragment::Text(text),
                    Fragment::Content(content) => Fragment::Content(f(content)),
                })
                .collect(),
        }
    }
}

impl<T: fmt::Display> fmt::Display for Emission<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for fragment in &self.fragments {
            match fragment {
                Fragment::Text(text) => f.write_str(text)?,
                Fragment::Content(content) => content.fmt(f)?,
            }
        }
        Ok(())
    }
}

/// Parse `message` and substitute `slots`.
#[must_use]
pub fn interpolate<T: Clone>(message: &str, slots: &[Slot<T>]) -> Emission<T> {
    Template::parse(message).interpolate(slots)
}

/// Interpolation with the last parsed template memoized by message text.
///
/// Re-rendering the same message with new content skips the parse.
#[derive(Debug, Default)]
pub struct Interpolator {
    cached: Option<(String, Rc<Template>)>,
    parses: u64,
}

impl Interpolator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Template for `message`, parsed only if the text changed.
    pub fn template(&mut self, message: &str) -> Rc<Template> {
        if let Some((text, template)) = &self.cached
            && text == message
        {
            return Rc::clone(template);
        }
        let template = Rc::new(Template::parse(message));
        self.parses += 1;
        self.cached = Some((message.to_owned(), Rc::clone(&template)));
        template
    }

    pub fn interpolate<T: Clone>(&mut self, message: &str, slots: &[Slot<T>]) -> Emission<T> {
        self.template(message).interpolate(slots)
    }

    /// How many times a message has actually been parsed.
    #[must_use]
    pub fn parses(&self) -> u64 {
        self.parses
    }
}
