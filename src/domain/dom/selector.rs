//! Compound CSS selectors used to locate feed containers, messages and links.
//!
//! Supported: comma-separated lists of compound selectors built from an
//! optional tag (or `*`), `.class`, `#id` and attribute conditions
//! (`[a]`, `[a=v]`, `[a^=v]`, `[a$=v]`, `[a*=v]`, `[a~=v]`). Combinators are
//! not supported; host-page selectors in practice never need them.

use std::str::FromStr;

use thiserror::Error;

use super::node::Node;

/// Selector parse failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,

    #[error("unexpected {found:?} at offset {offset} in selector {selector:?}")]
    Unexpected {
        selector: String,
        found: char,
        offset: usize,
    },

    #[error("unterminated {what} in selector {selector:?}")]
    Unterminated { selector: String, what: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrMatcher {
    Exists,
    Equals(String),
    Prefix(String),
    Suffix(String),
    Contains(String),
    Word(String),
}

impl AttrMatcher {
    fn matches(&self, value: &str) -> bool {
        match self {
            Self::Exists => true,
            Self::Equals(v) => value == v,
            Self::Prefix(v) => !v.is_empty() && value.starts_with(v.as_str()),
            Self::Suffix(v) => !v.is_empty() && value.ends_with(v.as_str()),
            Self::Contains(v) => !v.is_empty() && value.contains(v.as_str()),
            Self::Word(v) => value.split_whitespace().any(|w| w == v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Condition {
    Class(String),
    Id(String),
    Attribute { name: String, matcher: AttrMatcher },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct Compound {
    tag: Option<String>,
    conditions: Vec<Condition>,
}

impl Compound {
    fn matches(&self, node: &Node) -> bool {
        if let Some(tag) = &self.tag
            && tag != node.tag()
        {
            return false;
        }
        self.conditions.iter().all(|condition| match condition {
            Condition::Class(class) => node.has_class(class),
            Condition::Id(id) => node.attribute("id").is_some_and(|v| v == *id),
            Condition::Attribute { name, matcher } => node
                .attribute(name)
                .is_some_and(|value| matcher.matches(&value)),
        })
    }
}

/// A parsed selector list. Matches when any alternative matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    alternatives: Vec<Compound>,
}

impl Selector {
    /// Parses a selector list.
    ///
    /// # Errors
    /// Returns `SelectorError` on empty input or unsupported syntax.
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        let mut alternatives = Vec::new();
        for part in source.split(',') {
            alternatives.push(Parser::new(source, part).compound()?);
        }
        Ok(Self {
            source: source.trim().to_string(),
            alternatives,
        })
    }

    /// Returns the selector text as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns true if any compound selector of the list matches `node`.
    #[must_use]
    pub fn matches(&self, node: &Node) -> bool {
        self.alternatives.iter().any(|c| c.matches(node))
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

struct Parser<'a> {
    full: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(full: &'a str, part: &'a str) -> Self {
        Self {
            full,
            chars: part.trim().char_indices().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn unexpected(&self, found: char) -> SelectorError {
        SelectorError::Unexpected {
            selector: self.full.to_string(),
            found,
            offset: self.chars.get(self.pos).map_or(0, |(i, _)| *i),
        }
    }

    fn unterminated(&self, what: &'static str) -> SelectorError {
        SelectorError::Unterminated {
            selector: self.full.to_string(),
            what,
        }
    }

    fn ident(&mut self) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                out.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        out
    }

    fn required_ident(&mut self) -> Result<String, SelectorError> {
        let ident = self.ident();
        if ident.is_empty() {
            return Err(match self.peek() {
                Some(c) => self.unexpected(c),
                None => SelectorError::Empty,
            });
        }
        Ok(ident)
    }

    fn compound(mut self) -> Result<Compound, SelectorError> {
        if self.chars.is_empty() {
            return Err(SelectorError::Empty);
        }

        let mut compound = Compound::default();
        if self.peek() == Some('*') {
            self.pos += 1;
        } else if self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
            compound.tag = Some(self.ident().to_ascii_lowercase());
        }

        while let Some(c) = self.bump() {
            match c {
                '.' => compound
                    .conditions
                    .push(Condition::Class(self.required_ident()?)),
                '#' => compound.conditions.push(Condition::Id(self.required_ident()?)),
                '[' => compound.conditions.push(self.attribute()?),
                other => {
                    self.pos -= 1;
                    return Err(self.unexpected(other));
                }
            }
        }
        Ok(compound)
    }

    fn attribute(&mut self) -> Result<Condition, SelectorError> {
        let name = self.required_ident()?;
        let op = match self.bump() {
            Some(']') => {
                return Ok(Condition::Attribute {
                    name,
                    matcher: AttrMatcher::Exists,
                });
            }
            Some('=') => '=',
            Some(c @ ('^' | '$' | '*' | '~')) => {
                if self.bump() != Some('=') {
                    return Err(self.unexpected(c));
                }
                c
            }
            Some(c) => {
                self.pos -= 1;
                return Err(self.unexpected(c));
            }
            None => return Err(self.unterminated("attribute")),
        };

        let value = self.value()?;
        if self.bump() != Some(']') {
            return Err(self.unterminated("attribute"));
        }

        let matcher = match op {
            '^' => AttrMatcher::Prefix(value),
            '$' => AttrMatcher::Suffix(value),
            '*' => AttrMatcher::Contains(value),
            '~' => AttrMatcher::Word(value),
            _ => AttrMatcher::Equals(value),
        };
        Ok(Condition::Attribute { name, matcher })
    }

    fn value(&mut self) -> Result<String, SelectorError> {
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                let mut out = String::new();
                loop {
                    match self.bump() {
                        Some(c) if c == quote => return Ok(out),
                        Some(c) => out.push(c),
                        None => return Err(self.unterminated("string")),
                    }
                }
            }
            _ => self.required_ident(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dom::Document;
    use test_case::test_case;

    #[test_case(".chat-list" ; "class")]
    #[test_case("twitch-chat" ; "custom_tag")]
    #[test_case("[data-a-target=\"chat-scrollable-area\"]" ; "attr_equals")]
    #[test_case("section[aria-label*=\"chat\"]" ; "tag_and_contains")]
    #[test_case("a[href^=\"http\"]" ; "prefix")]
    #[test_case(".chat-line__message, [data-a-target=\"chat-line-message\"]" ; "list")]
    #[test_case(".Layout-sc-1xcs6mc-0.cUmVME" ; "double_class")]
    fn test_parses_host_selectors(source: &str) {
        assert!(Selector::parse(source).is_ok());
    }

    #[test_case("" ; "empty")]
    #[test_case("div > p" ; "combinator")]
    #[test_case("[href" ; "unterminated_attr")]
    #[test_case("[href=\"x]" ; "unterminated_string")]
    #[test_case("a,,b" ; "empty_alternative")]
    fn test_rejects_unsupported(source: &str) {
        assert!(Selector::parse(source).is_err());
    }

    #[test]
    fn test_matching() {
        let doc = Document::new();
        let link = doc
            .element("a")
            .attr("href", "https://example.com")
            .class("link-fragment")
            .build();
        let section = doc
            .element("section")
            .attr("aria-label", "Twitch chat room")
            .build();

        assert!(Selector::parse("a[href^=\"http\"]").unwrap().matches(&link));
        assert!(Selector::parse("a.link-fragment").unwrap().matches(&link));
        assert!(!Selector::parse("a[href^=\"ftp\"]").unwrap().matches(&link));
        assert!(!Selector::parse("span[href]").unwrap().matches(&link));
        assert!(
            Selector::parse("section[aria-label*=\"chat\"]")
                .unwrap()
                .matches(&section)
        );
        assert!(Selector::parse("*[aria-label~=room]").unwrap().matches(&section));
    }

    #[test]
    fn test_class_substring_is_not_a_match() {
        let doc = Document::new();
        let node = doc.element("div").class("chat-list--default").build();

        assert!(!Selector::parse(".chat-list").unwrap().matches(&node));
        assert!(
            Selector::parse("[class*=\"chat-list\"]")
                .unwrap()
                .matches(&node)
        );
    }
}
