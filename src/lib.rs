//! DOM-less browser emulation for functional tests.
//!
//! [`InnerBrowser`] drives a [`Transport`] (usually an [`InProcessClient`] wrapping the
//! application under test), parses every response into a queryable document and
//! rebuilds browser form-submission semantics on top of it.

use std::collections::{BTreeMap, HashMap, HashSet};

mod artifact;
mod browser;
mod client;
mod config;
mod constraint;
mod cookie;
mod debug;
mod dom;
mod field;
mod form;
mod history;
mod html;
pub mod http_code;
mod locator;
mod selector;
mod text;
mod transport;
mod xpath;

pub use browser::{Count, FieldExpectation, InnerBrowser};
pub use client::{Application, InProcessClient};
pub use config::{BrowserConfig, ConfiguredCookie};
pub use cookie::{Cookie, CookieJar, CookieParams};
pub use debug::{DebugSink, NoopSink, RecordingSink};
pub use field::FieldValue;
pub use form::{Param, Params};
pub use history::History;
pub use locator::{Locator, OptionSpec};
pub use transport::{Request, Response, Transport, UploadedFile};

pub(crate) use html::parse_html;
pub(crate) use selector::*;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("html parse error: {0}")]
    HtmlParse(String),
    #[error("unsupported selector: {0}")]
    UnsupportedSelector(String),
    #[error("xpath error: {0}")]
    XPath(String),
    #[error("invalid pattern: {0}")]
    Pattern(String),
    #[error("{description} '{locator}' was not found.")]
    ElementNotFound { locator: String, description: String },
    #[error("{locator} is not a valid {syntax} locator")]
    MalformedLocator { locator: String, syntax: String },
    #[error("can't open external URL: {uri}")]
    ExternalUrl { uri: String },
    #[error("{0}")]
    Usage(String),
    #[error("The maximum number ({max}) of redirections was reached.")]
    RedirectLimit { max: usize },
    #[error("{0}")]
    InvalidArgument(String),
    #[error(
        "numberOfSteps is set to {requested}, but there are only {available} pages in the history"
    )]
    HistoryExhausted { requested: usize, available: usize },
    #[error("{0}")]
    AssertionFailed(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("io error: {0}")]
    Io(String),
}

impl Error {
    pub(crate) fn not_found(locator: impl Into<String>, description: impl Into<String>) -> Self {
        Self::ElementNotFound {
            locator: locator.into(),
            description: description.into(),
        }
    }

    pub(crate) fn io(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<fancy_regex::Error> for Error {
    fn from(err: fancy_regex::Error) -> Self {
        Self::Pattern(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct NodeId(pub(crate) usize);

#[derive(Debug, Clone)]
pub(crate) enum NodeType {
    Document,
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) node_type: NodeType,
}

#[derive(Debug, Clone)]
pub(crate) struct Element {
    pub(crate) tag_name: String,
    pub(crate) attrs: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub(crate) struct Dom {
    pub(crate) nodes: Vec<Node>,
    pub(crate) root: NodeId,
    pub(crate) id_index: HashMap<String, Vec<NodeId>>,
}

pub(crate) fn has_class(element: &Element, class_name: &str) -> bool {
    element
        .attrs
        .get("class")
        .map(|classes| classes.split_whitespace().any(|c| c == class_name))
        .unwrap_or(false)
}

pub(crate) fn escape_html_text_for_serialization(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

pub(crate) fn escape_html_attr_for_serialization(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}
