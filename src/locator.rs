use super::*;
use std::fmt;

/// Identifies elements on the current page.
///
/// A raw string is tried as CSS first, then XPath. Strict locators pin the strategy:
///
/// ```
/// use inner_browser::Locator;
///
/// assert_eq!(Locator::id("login").to_string(), r#""id":"login""#);
/// assert!(Locator::is_css("form#f > input[name=q]"));
/// assert!(Locator::is_xpath("//form[@id='f']//input"));
/// assert!(!Locator::is_css("Sign in!") && !Locator::is_xpath("Sign in!"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    Raw(String),
    Strict { kind: String, value: String },
}

impl Locator {
    pub fn strict(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Strict {
            kind: kind.into(),
            value: value.into(),
        }
    }

    pub fn id(value: impl Into<String>) -> Self {
        Self::strict("id", value)
    }

    pub fn name(value: impl Into<String>) -> Self {
        Self::strict("name", value)
    }

    pub fn css(value: impl Into<String>) -> Self {
        Self::strict("css", value)
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Self::strict("xpath", value)
    }

    pub fn link(value: impl Into<String>) -> Self {
        Self::strict("link", value)
    }

    pub fn class(value: impl Into<String>) -> Self {
        Self::strict("class", value)
    }

    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Strict { .. })
    }

    /// The raw string, or the value of a strict locator.
    pub fn value(&self) -> &str {
        match self {
            Self::Raw(raw) => raw,
            Self::Strict { value, .. } => value,
        }
    }

    pub fn is_css(selector: &str) -> bool {
        !selector.trim().is_empty() && parse_selector_list(selector).is_ok()
    }

    pub fn is_xpath(selector: &str) -> bool {
        xpath::compile(selector).is_ok()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw(raw) => f.write_str(raw),
            Self::Strict { kind, value } => {
                write!(f, "{}:{}", json_string(kind), json_string(value))
            }
        }
    }
}

/// `value` as a quoted JSON string.
pub(crate) fn json_string(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}

impl From<&str> for Locator {
    fn from(value: &str) -> Self {
        Self::Raw(value.to_string())
    }
}

impl From<String> for Locator {
    fn from(value: String) -> Self {
        Self::Raw(value)
    }
}

impl From<&String> for Locator {
    fn from(value: &String) -> Self {
        Self::Raw(value.clone())
    }
}

impl From<&Locator> for Locator {
    fn from(value: &Locator) -> Self {
        value.clone()
    }
}

/// How [`InnerBrowser::select_option`](crate::InnerBrowser::select_option) picks options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionSpec {
    /// Option text, or radio value; falls back to the string itself as a value.
    Text(String),
    /// Exact option value, no lookup.
    Value(String),
    /// Several options of a multiple select, each looked up like `Text`.
    Many(Vec<String>),
}

impl OptionSpec {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn value(value: impl Into<String>) -> Self {
        Self::Value(value.into())
    }
}

impl From<&str> for OptionSpec {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for OptionSpec {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<&str>> for OptionSpec {
    fn from(values: Vec<&str>) -> Self {
        Self::Many(values.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for OptionSpec {
    fn from(values: Vec<String>) -> Self {
        Self::Many(values)
    }
}

/// Quotes `value` as a CSS attribute-selector string.
pub(crate) fn css_string(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Elements of `dom` that a query may return when narrowed to `scopes`, in
/// document order. The document root as scope means the whole page.
fn in_document_order(dom: &Dom, mut nodes: Vec<NodeId>) -> Vec<NodeId> {
    if nodes.len() < 2 {
        return nodes;
    }
    let order = dom.document_order();
    nodes.sort_by_key(|node| order.get(node).copied().unwrap_or(usize::MAX));
    nodes.dedup();
    nodes
}

pub(crate) fn filter_css(dom: &Dom, scopes: &[NodeId], selector: &str) -> Result<Vec<NodeId>> {
    if !Locator::is_css(selector) {
        return Err(Error::MalformedLocator {
            locator: selector.to_string(),
            syntax: "css".to_string(),
        });
    }
    let mut found = Vec::new();
    for scope in scopes {
        if *scope == dom.root {
            found.extend(dom.query_selector_all(selector)?);
            continue;
        }
        if dom.matches_selector(*scope, selector)? {
            found.push(*scope);
        }
        found.extend(dom.query_selector_all_from(scope, selector)?);
    }
    Ok(in_document_order(dom, found))
}

pub(crate) fn filter_xpath(dom: &Dom, scopes: &[NodeId], expr: &str) -> Result<Vec<NodeId>> {
    let compiled = xpath::compile(expr).map_err(|_| Error::MalformedLocator {
        locator: expr.to_string(),
        syntax: "xpath".to_string(),
    })?;
    let mut found = Vec::new();
    for scope in scopes {
        found.extend(compiled.select(dom, *scope, *scope)?);
    }
    Ok(in_document_order(dom, found))
}

/// Resolves any locator: strict kinds by their fixed rule, raw strings as CSS, else
/// XPath.
pub(crate) fn match_locator(dom: &Dom, scopes: &[NodeId], locator: &Locator) -> Result<Vec<NodeId>> {
    match locator {
        Locator::Strict { kind, value } => strict_match(dom, scopes, kind, value),
        Locator::Raw(raw) if Locator::is_css(raw) => filter_css(dom, scopes, raw),
        Locator::Raw(raw) if Locator::is_xpath(raw) => filter_xpath(dom, scopes, raw),
        Locator::Raw(raw) => Err(Error::MalformedLocator {
            locator: raw.clone(),
            syntax: "XPath or CSS".to_string(),
        }),
    }
}

pub(crate) fn strict_match(
    dom: &Dom,
    scopes: &[NodeId],
    kind: &str,
    value: &str,
) -> Result<Vec<NodeId>> {
    let literal = xpath::literal(value);
    match kind {
        "id" => filter_css(dom, scopes, &format!("#{value}")),
        "name" => filter_xpath(dom, scopes, &format!(".//*[@name={literal}]")),
        "css" => filter_css(dom, scopes, value),
        "xpath" => filter_xpath(dom, scopes, value),
        "link" => filter_xpath(
            dom,
            scopes,
            &format!(".//a[.={literal} or contains(./@title, {literal})]"),
        ),
        "class" => filter_css(dom, scopes, &format!(".{value}")),
        other => Err(Error::Usage(format!(
            "Locator type '{other}' is not defined. Use either: xpath, css, id, link, class, name"
        ))),
    }
}

/// Field lookup used by every form action: label text, then `name`, then CSS/XPath.
pub(crate) fn fields_by_label_or_css(
    dom: &Dom,
    scopes: &[NodeId],
    locator: &Locator,
) -> Result<Vec<NodeId>> {
    let raw = match locator {
        Locator::Strict { kind, value } => {
            let found = strict_match(dom, scopes, kind, value)?;
            if found.is_empty() {
                return Err(Error::not_found(locator.to_string(), "Element"));
            }
            return Ok(found);
        }
        Locator::Raw(raw) => raw.as_str(),
    };

    let label_query = format!(
        ".//label[descendant-or-self::node()[text()[normalize-space()={}]]]",
        xpath::literal(raw)
    );
    let mut input = None;
    if let Some(label) = filter_xpath(dom, scopes, &label_query)?.first().copied() {
        tracing::trace!(target: "inner_browser", locator = raw, "field located by label");
        input = Some(match dom.attr(label, "for").filter(|target| !target.is_empty()) {
            Some(target) => dom
                .by_id_all(target)
                .into_iter()
                .filter(|node| within_scopes(dom, scopes, *node))
                .collect(),
            None => filter_xpath(dom, scopes, &format!("{label_query}//input"))?,
        });
    }

    let mut input = match input {
        Some(input) => input,
        None => strict_match(dom, scopes, "name", raw)?,
    };
    if input.is_empty() {
        tracing::trace!(target: "inner_browser", locator = raw, "falling back to CSS/XPath");
        input = match_locator(dom, scopes, locator)?;
    }
    if input.is_empty() {
        return Err(Error::not_found(raw, "Form field by Label or CSS"));
    }
    Ok(input)
}

fn within_scopes(dom: &Dom, scopes: &[NodeId], node: NodeId) -> bool {
    scopes
        .iter()
        .any(|scope| *scope == dom.root || *scope == node || dom.is_descendant_of(node, *scope))
}
