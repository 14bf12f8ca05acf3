use super::*;
use form::{FormModel, form_key};
use locator::{fields_by_label_or_css, match_locator};
use std::path::PathBuf;

mod assertions;
mod click;
mod cookies;
mod forms;
mod grabs;
mod navigation;
mod status;

/// Expected element count for [`InnerBrowser::see_number_of_elements`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Count {
    Exact(usize),
    /// Inclusive on both ends.
    Between(usize, usize),
}

impl From<usize> for Count {
    fn from(count: usize) -> Self {
        Self::Exact(count)
    }
}

impl From<(usize, usize)> for Count {
    fn from((floor, ceil): (usize, usize)) -> Self {
        Self::Between(floor, ceil)
    }
}

impl From<std::ops::RangeInclusive<usize>> for Count {
    fn from(range: std::ops::RangeInclusive<usize>) -> Self {
        Self::Between(*range.start(), *range.end())
    }
}

/// What a field assertion expects to find.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldExpectation {
    Value(String),
    /// `true` passes when anything is checked or selected, `false` when nothing is.
    Checked(bool),
    /// Every item is checked against the same field.
    List(Vec<FieldExpectation>),
    /// Nested names; only meaningful for form-field maps, where `name[key]` is looked up.
    Map(Vec<(String, FieldExpectation)>),
}

impl From<&str> for FieldExpectation {
    fn from(value: &str) -> Self {
        Self::Value(value.to_string())
    }
}

impl From<String> for FieldExpectation {
    fn from(value: String) -> Self {
        Self::Value(value)
    }
}

impl From<bool> for FieldExpectation {
    fn from(value: bool) -> Self {
        Self::Checked(value)
    }
}

impl<T: Into<FieldExpectation>> From<Vec<T>> for FieldExpectation {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Clone)]
struct Page {
    dom: Dom,
    base_url: String,
}

/// A DOM-less browser session.
///
/// Owns the transport, the current document and the form models built from it. One
/// session belongs to one test; parallel tests use separate sessions.
///
/// ```
/// use inner_browser::{BrowserConfig, InProcessClient, InnerBrowser, Request, Response};
///
/// let app = |request: &Request| match request.path().as_str() {
///     "/" => Response::html(r#"<a href="/about">About us</a>"#),
///     _ => Response::html("<h1>About</h1>"),
/// };
/// let mut browser = InnerBrowser::new(InProcessClient::new(app), BrowserConfig::default())?;
/// browser.am_on_page("/")?;
/// browser.click("About us")?;
/// browser.see_in("About", "h1")?;
/// browser.see_current_url_equals("/about")?;
/// # Ok::<(), inner_browser::Error>(())
/// ```
pub struct InnerBrowser<T: Transport> {
    client: T,
    config: BrowserConfig,
    page: Option<Page>,
    headers: BTreeMap<String, String>,
    forms: HashMap<String, FormModel>,
    internal_domains: Option<Vec<fancy_regex::Regex>>,
    debug: Box<dyn DebugSink>,
}

const PAGE_NOT_LOADED: &str =
    "Page not loaded. Use `am_on_page` (or the `request`/`load_page` escape hatches) to open it";

impl<T: Transport> InnerBrowser<T> {
    /// Applies the redirect settings and configured cookies to `client`.
    pub fn new(mut client: T, config: BrowserConfig) -> Result<Self> {
        client.set_max_redirects(config.max_redirects);
        client.follow_redirects(config.follow_redirects);

        let host = config.host().unwrap_or_default();
        for configured in &config.cookies {
            if configured.name.is_empty() {
                return Err(Error::InvalidArgument(
                    "Cookie name is required in configuration".into(),
                ));
            }
            let mut cookie = Cookie::new(&configured.name, &configured.value);
            cookie.domain = configured.domain.clone().unwrap_or_else(|| host.clone());
            cookie.path = configured.path.clone().unwrap_or_else(|| "/".to_string());
            cookie.expires = configured.expires;
            cookie.secure = configured.secure;
            cookie.http_only = configured.http_only;
            client.cookie_jar_mut().set(cookie);
        }

        Ok(Self {
            client,
            config,
            page: None,
            headers: BTreeMap::new(),
            forms: HashMap::new(),
            internal_domains: None,
            debug: Box::new(NoopSink),
        })
    }

    pub fn with_debug_sink(mut self, sink: impl DebugSink + 'static) -> Self {
        self.debug = Box::new(sink);
        self
    }

    /// Installs a [`RecordingSink`] bounded by the configured log limit and returns a
    /// handle to it.
    pub fn record_debug(&mut self) -> RecordingSink {
        let sink = RecordingSink::new(self.config.debug_log_limit);
        self.debug = Box::new(sink.clone());
        sink
    }

    pub fn client(&self) -> &T {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut T {
        &mut self.client
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    /// Resets the memoized internal-domain patterns.
    pub fn before_suite(&mut self) {
        self.internal_domains = None;
    }

    /// Drops the document, form models and headers, and restarts the transport.
    pub fn after_test(&mut self) {
        self.page = None;
        self.forms.clear();
        self.headers.clear();
        self.client.restart();
    }

    /// Saves the last response for a failed test. Returns the written path, or `None`
    /// when no response exists.
    pub fn failed(&self, test_signature: &str) -> Result<Option<PathBuf>> {
        let Some(response) = self.client.internal_response() else {
            return Ok(None);
        };
        let file_name =
            artifact::failure_file_name(test_signature, response.header("Content-Type"))?;
        let path = artifact::write_artifact(&self.config.output_dir, &file_name, &response.content)?;
        Ok(Some(path))
    }

    /// Writes the current page source to `output_dir/debug/<name>.html`.
    pub fn make_html_snapshot(&mut self, name: Option<&str>) -> Result<PathBuf> {
        let name = match name.filter(|name| !name.is_empty()) {
            Some(name) => name.to_string(),
            None => artifact::snapshot_name(),
        };
        let content = self.response()?.content.clone();
        let path = artifact::write_artifact(
            &self.config.output_dir.join("debug"),
            &format!("{name}.html"),
            &content,
        )?;
        self.section("Snapshot Saved", &format!("file://{}", path.display()));
        Ok(path)
    }

    fn section(&mut self, name: &str, value: &str) {
        tracing::debug!(target: "inner_browser", section = name, "{value}");
        self.debug.section(name, value);
    }

    fn dom(&self) -> Result<&Dom> {
        self.page.as_ref().map(|page| &page.dom).ok_or_else(|| {
            Error::Usage("Crawler is null. Perhaps you forgot to call `am_on_page`?".into())
        })
    }

    fn dom_mut(&mut self) -> Result<&mut Dom> {
        self.page.as_mut().map(|page| &mut page.dom).ok_or_else(|| {
            Error::Usage("Crawler is null. Perhaps you forgot to call `am_on_page`?".into())
        })
    }

    fn base_url(&self) -> Result<&str> {
        self.page
            .as_ref()
            .map(|page| page.base_url.as_str())
            .ok_or_else(|| Error::Usage(PAGE_NOT_LOADED.into()))
    }

    fn request_snapshot(&self) -> Result<&Request> {
        self.client
            .internal_request()
            .ok_or_else(|| Error::Usage(PAGE_NOT_LOADED.into()))
    }

    fn response(&self) -> Result<&Response> {
        self.client
            .internal_response()
            .ok_or_else(|| Error::Usage(PAGE_NOT_LOADED.into()))
    }

    /// Absolute URL of the current history entry.
    fn current_url(&self) -> Result<String> {
        self.request_snapshot()?;
        self.client
            .history()
            .current()
            .map(|request| request.uri.clone())
            .ok_or_else(|| Error::Usage(PAGE_NOT_LOADED.into()))
    }

    /// Path, query and fragment of the current page.
    pub fn current_uri(&self) -> Result<String> {
        let current = self.current_url()?;
        Ok(match url::Url::parse(&current) {
            Ok(url) => {
                let mut uri = url.path().to_string();
                if let Some(query) = url.query() {
                    uri.push('?');
                    uri.push_str(query);
                }
                if let Some(fragment) = url.fragment() {
                    uri.push('#');
                    uri.push_str(fragment);
                }
                uri
            }
            Err(_) => current,
        })
    }

    /// Resolves `uri` against the current page; empty and fragment-only URIs mean the
    /// current page itself.
    fn absolute_url_for(&self, uri: &str) -> Result<String> {
        let current = self.current_url()?;
        if uri.is_empty() || uri.starts_with('#') {
            return Ok(current);
        }
        join_url(&current, uri)
    }

    fn match_nodes(&self, locator: &Locator) -> Result<Vec<NodeId>> {
        let dom = self.dom()?;
        match_locator(dom, &[dom.root], locator)
    }

    fn fields(&self, locator: &Locator) -> Result<Vec<NodeId>> {
        let dom = self.dom()?;
        fields_by_label_or_css(dom, &[dom.root], locator)
    }

    fn field(&self, locator: &Locator) -> Result<NodeId> {
        self.fields(locator)?
            .first()
            .copied()
            .ok_or_else(|| Error::not_found(locator.to_string(), "Form field by Label or CSS"))
    }

    /// The cached model of `form`, built on first use.
    fn form_model(&mut self, form: NodeId) -> Result<&mut FormModel> {
        let key = form_key(self.dom()?, form);
        if !self.forms.contains_key(&key) {
            let action = self
                .dom()?
                .attr(form, "action")
                .unwrap_or_default()
                .to_string();
            let action = if action.is_empty() || action.starts_with('#') {
                self.current_url()?
            } else {
                join_url(self.base_url()?, &action)?
            };
            let model = FormModel::build(self.dom()?, form, action)?;
            self.forms.insert(key.clone(), model);
        }
        self.forms
            .get_mut(&key)
            .ok_or_else(|| Error::Usage(format!("form {key} is not cached")))
    }
}

fn join_url(base: &str, uri: &str) -> Result<String> {
    let base = url::Url::parse(base)
        .map_err(|err| Error::InvalidArgument(format!("cannot parse URL {base}: {err}")))?;
    base.join(uri)
        .map(|url| url.to_string())
        .map_err(|err| Error::InvalidArgument(format!("cannot resolve {uri}: {err}")))
}

fn strip_fragment(uri: &str) -> &str {
    uri.split_once('#').map_or(uri, |(before, _)| before)
}

fn format_map<'a>(entries: impl IntoIterator<Item = (&'a String, &'a String)>) -> String {
    entries
        .into_iter()
        .map(|(name, value)| format!("{name}: {value}"))
        .collect::<Vec<_>>()
        .join("\n")
}
