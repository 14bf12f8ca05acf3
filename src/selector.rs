//! CSS selector parsing. Matching lives in [`Dom`](crate::Dom).

use super::*;

/// One comma-separated alternative: compounds joined by combinators, left to right.
pub(crate) type ComplexSelector = Vec<SelectorPart>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Combinator {
    Descendant,
    Child,
    Adjacent,
    Sibling,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SelectorPart {
    pub(crate) compound: Compound,
    /// Relation to the part on the left; `None` for the first part.
    pub(crate) combinator: Option<Combinator>,
}

/// Simple selectors that must all hold for one element. `tag: None` is `*`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Compound {
    pub(crate) tag: Option<String>,
    pub(crate) id: Option<String>,
    pub(crate) classes: Vec<String>,
    pub(crate) attrs: Vec<AttrTest>,
    pub(crate) pseudos: Vec<Pseudo>,
}

impl Compound {
    /// The id of a bare `#id` compound, which can be answered from the id index.
    pub(crate) fn id_only(&self) -> Option<&str> {
        let bare = self.tag.is_none()
            && self.classes.is_empty()
            && self.attrs.is_empty()
            && self.pseudos.is_empty();
        self.id.as_deref().filter(|_| bare)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AttrTest {
    pub(crate) name: String,
    pub(crate) op: AttrOp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AttrOp {
    Present,
    Equals(String),
    Prefix(String),
    Suffix(String),
    Substring(String),
    Word(String),
    DashPrefix(String),
}

impl AttrOp {
    pub(crate) fn test(&self, actual: &str) -> bool {
        match self {
            Self::Present => true,
            Self::Equals(value) => actual == value,
            Self::Prefix(value) => !value.is_empty() && actual.starts_with(value.as_str()),
            Self::Suffix(value) => !value.is_empty() && actual.ends_with(value.as_str()),
            Self::Substring(value) => !value.is_empty() && actual.contains(value.as_str()),
            Self::Word(value) => actual.split_whitespace().any(|word| word == value),
            Self::DashPrefix(value) => {
                actual == value
                    || actual
                        .strip_prefix(value.as_str())
                        .is_some_and(|rest| rest.starts_with('-'))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Pseudo {
    Checked,
    Disabled,
    Enabled,
    Empty,
    /// Every structural pseudo-class: `first-child` is `nth-child(1)`, `last-of-type`
    /// is `nth-last-of-type(1)`, and so on.
    Position(Nth),
    Not(Vec<ComplexSelector>),
    Is(Vec<ComplexSelector>),
    Has(Vec<ComplexSelector>),
}

/// `an+b` over 1-based element positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Nth {
    pub(crate) a: i64,
    pub(crate) b: i64,
    pub(crate) of_type: bool,
    pub(crate) from_end: bool,
}

impl Nth {
    const FIRST: Nth = Nth {
        a: 0,
        b: 1,
        of_type: false,
        from_end: false,
    };

    fn of_type(self) -> Self {
        Self {
            of_type: true,
            ..self
        }
    }

    fn from_end(self) -> Self {
        Self {
            from_end: true,
            ..self
        }
    }

    /// Parses `odd`, `even`, a positive integer or an `an+b` expression.
    fn parse(raw: &str) -> Option<Self> {
        let compact = raw
            .chars()
            .filter(|ch| !ch.is_ascii_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        let (a, b) = match compact.as_str() {
            "odd" => (2, 1),
            "even" => (2, 0),
            expr => match expr.split_once('n') {
                None => {
                    if expr.is_empty() || !expr.bytes().all(|byte| byte.is_ascii_digit()) {
                        return None;
                    }
                    (0, expr.parse::<i64>().ok().filter(|position| *position > 0)?)
                }
                Some((a, b)) => {
                    let a = match a {
                        "" => 1,
                        "-" => -1,
                        "+" => return None,
                        digits => digits.parse::<i64>().ok()?,
                    };
                    (a, parse_offset(b)?)
                }
            },
        };
        Some(Self {
            a,
            b,
            ..Self::FIRST
        })
    }

    pub(crate) fn matches(&self, position: usize) -> bool {
        let diff = position as i64 - self.b;
        if self.a == 0 {
            return diff == 0;
        }
        diff % self.a == 0 && diff / self.a >= 0
    }
}

fn parse_offset(raw: &str) -> Option<i64> {
    if raw.is_empty() {
        return Some(0);
    }
    let (sign, digits) = if let Some(digits) = raw.strip_prefix('+') {
        (1, digits)
    } else {
        (-1, raw.strip_prefix('-')?)
    };
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    Some(sign * digits.parse::<i64>().ok()?)
}

/// Parses a comma-separated selector list.
pub(crate) fn parse_selector_list(selector: &str) -> Result<Vec<ComplexSelector>> {
    let mut cursor = Cursor::new(selector);
    cursor.list(false)
}

struct Cursor<'a> {
    src: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            chars: src.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self) -> Error {
        Error::UnsupportedSelector(self.src.to_string())
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        Some(ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            return true;
        }
        false
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error())
        }
    }

    /// Returns whether any whitespace was skipped.
    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(|ch| ch.is_ascii_whitespace()) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn take_while(&mut self, accept: impl Fn(char) -> bool) -> String {
        let start = self.pos;
        while self.peek().is_some_and(&accept) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn ident(&mut self) -> Option<String> {
        let ident = self.take_while(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
        (!ident.is_empty()).then_some(ident)
    }

    /// A list ends at end of input, or at `)` when `nested`.
    fn list(&mut self, nested: bool) -> Result<Vec<ComplexSelector>> {
        let mut list = Vec::new();
        loop {
            list.push(self.complex()?);
            self.skip_whitespace();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some(')') if nested => return Ok(list),
                None if !nested => return Ok(list),
                _ => return Err(self.error()),
            }
        }
    }

    fn complex(&mut self) -> Result<ComplexSelector> {
        self.skip_whitespace();
        let mut parts = vec![SelectorPart {
            compound: self.compound()?,
            combinator: None,
        }];
        loop {
            let spaced = self.skip_whitespace();
            let combinator = match self.peek() {
                Some('>') => Combinator::Child,
                Some('+') => Combinator::Adjacent,
                Some('~') => Combinator::Sibling,
                Some(',' | ')') | None => return Ok(parts),
                Some(_) if spaced => Combinator::Descendant,
                Some(_) => return Err(self.error()),
            };
            if combinator != Combinator::Descendant {
                self.bump();
                self.skip_whitespace();
            }
            parts.push(SelectorPart {
                compound: self.compound()?,
                combinator: Some(combinator),
            });
        }
    }

    fn compound(&mut self) -> Result<Compound> {
        let start = self.pos;
        let mut compound = Compound::default();
        if !self.eat('*') {
            compound.tag = self.ident();
        }
        loop {
            match self.peek() {
                Some('#') => {
                    self.bump();
                    let id = self.ident().ok_or_else(|| self.error())?;
                    if compound.id.replace(id).is_some() {
                        return Err(self.error());
                    }
                }
                Some('.') => {
                    self.bump();
                    let class = self.ident().ok_or_else(|| self.error())?;
                    compound.classes.push(class);
                }
                Some('[') => {
                    self.bump();
                    let attr = self.attribute()?;
                    compound.attrs.push(attr);
                }
                Some(':') => {
                    self.bump();
                    self.pseudo(&mut compound.pseudos)?;
                }
                _ => break,
            }
        }
        if self.pos == start {
            return Err(self.error());
        }
        Ok(compound)
    }

    fn attribute(&mut self) -> Result<AttrTest> {
        self.skip_whitespace();
        let name = self
            .take_while(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | ':'))
            .to_ascii_lowercase();
        if name.is_empty() {
            return Err(self.error());
        }
        self.skip_whitespace();
        let op: fn(String) -> AttrOp = match self.bump() {
            Some(']') => {
                return Ok(AttrTest {
                    name,
                    op: AttrOp::Present,
                });
            }
            Some('=') => AttrOp::Equals,
            Some(prefix @ ('^' | '$' | '*' | '~' | '|')) if self.eat('=') => match prefix {
                '^' => AttrOp::Prefix,
                '$' => AttrOp::Suffix,
                '*' => AttrOp::Substring,
                '~' => AttrOp::Word,
                _ => AttrOp::DashPrefix,
            },
            _ => return Err(self.error()),
        };
        self.skip_whitespace();
        let value = self.attribute_value()?;
        self.skip_whitespace();
        self.expect(']')?;
        Ok(AttrTest {
            name,
            op: op(value),
        })
    }

    /// A quoted string or a bare run up to whitespace or `]`; backslash escapes the
    /// next character in both.
    fn attribute_value(&mut self) -> Result<String> {
        let quote = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.bump();
                Some(quote)
            }
            _ => None,
        };
        let mut value = String::new();
        loop {
            match (self.peek(), quote) {
                (None, Some(_)) => return Err(self.error()),
                (None, None) => return Ok(value),
                (Some(ch), Some(quote)) if ch == quote => {
                    self.bump();
                    return Ok(value);
                }
                (Some(ch), None) if ch == ']' || ch.is_ascii_whitespace() => return Ok(value),
                (Some('\\'), _) => {
                    self.bump();
                    if let Some(escaped) = self.bump() {
                        value.push(escaped);
                    }
                }
                (Some(ch), _) => {
                    self.bump();
                    value.push(ch);
                }
            }
        }
    }

    fn pseudo(&mut self, pseudos: &mut Vec<Pseudo>) -> Result<()> {
        let name = self.ident().ok_or_else(|| self.error())?.to_ascii_lowercase();
        match name.as_str() {
            "checked" | "selected" => pseudos.push(Pseudo::Checked),
            "disabled" => pseudos.push(Pseudo::Disabled),
            "enabled" => pseudos.push(Pseudo::Enabled),
            "empty" => pseudos.push(Pseudo::Empty),
            "first-child" => pseudos.push(Pseudo::Position(Nth::FIRST)),
            "last-child" => pseudos.push(Pseudo::Position(Nth::FIRST.from_end())),
            "only-child" => pseudos.extend([
                Pseudo::Position(Nth::FIRST),
                Pseudo::Position(Nth::FIRST.from_end()),
            ]),
            "first-of-type" => pseudos.push(Pseudo::Position(Nth::FIRST.of_type())),
            "last-of-type" => pseudos.push(Pseudo::Position(Nth::FIRST.of_type().from_end())),
            "only-of-type" => pseudos.extend([
                Pseudo::Position(Nth::FIRST.of_type()),
                Pseudo::Position(Nth::FIRST.of_type().from_end()),
            ]),
            "nth-child" | "nth-last-child" | "nth-of-type" | "nth-last-of-type" => {
                self.expect('(')?;
                let body = self.take_while(|ch| ch != ')');
                self.expect(')')?;
                let mut nth = Nth::parse(&body).ok_or_else(|| self.error())?;
                nth.of_type = name.ends_with("of-type");
                nth.from_end = name.starts_with("nth-last");
                pseudos.push(Pseudo::Position(nth));
            }
            "not" | "is" | "where" | "matches" | "has" => {
                self.expect('(')?;
                let inner = stacker::maybe_grow(32 * 1024, 1024 * 1024, || self.list(true))?;
                self.expect(')')?;
                pseudos.push(match name.as_str() {
                    "not" => Pseudo::Not(inner),
                    "has" => Pseudo::Has(inner),
                    _ => Pseudo::Is(inner),
                });
            }
            _ => return Err(self.error()),
        }
        Ok(())
    }
}
