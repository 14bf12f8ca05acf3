use super::*;

/// A file staged for upload by [`InnerBrowser::attach_file`](crate::InnerBrowser::attach_file).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub path: std::path::PathBuf,
    pub name: String,
    pub size: u64,
}

/// Request snapshot as seen by the application.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Request {
    pub method: String,
    /// Absolute URI. The application receives it with the fragment removed.
    pub uri: String,
    pub parameters: Vec<(String, String)>,
    pub files: Vec<(String, UploadedFile)>,
    /// CGI-style server variables (`HTTP_*`, `REQUEST_TIME`, `PHP_AUTH_USER`, ...).
    pub server: BTreeMap<String, String>,
    pub content: Option<String>,
    pub cookies: BTreeMap<String, String>,
}

impl Request {
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            ..Self::default()
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn server_var(&self, name: &str) -> Option<&str> {
        self.server.get(name).map(String::as_str)
    }

    /// The path and query of [`Request::uri`].
    pub fn path_and_query(&self) -> String {
        match url::Url::parse(&self.uri) {
            Ok(url) => match url.query() {
                Some(query) => format!("{}?{query}", url.path()),
                None => url.path().to_string(),
            },
            Err(_) => self.uri.clone(),
        }
    }

    pub fn path(&self) -> String {
        url::Url::parse(&self.uri)
            .map(|url| url.path().to_string())
            .unwrap_or_else(|_| self.uri.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub content: String,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            content: String::new(),
        }
    }
}

impl Response {
    pub fn new(status: u16, content: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            content: content.into(),
        }
    }

    pub fn html(content: impl Into<String>) -> Self {
        Self::new(200, content).with_header("Content-Type", "text/html; charset=UTF-8")
    }

    pub fn redirect(status: u16, location: impl Into<String>) -> Self {
        Self::new(status, "").with_header("Location", location)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// First header value with a case-insensitive name match.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn header_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
            .collect()
    }
}

/// The HTTP client capability [`InnerBrowser`](crate::InnerBrowser) drives.
///
/// One implementation exists per backend and is picked when the browser is built.
pub trait Transport {
    /// Issues a request and stores it as the internal request/response pair. When
    /// `change_history` is false the history stack is left alone.
    #[allow(clippy::too_many_arguments)]
    fn request(
        &mut self,
        method: &str,
        uri: &str,
        parameters: Vec<(String, String)>,
        files: Vec<(String, UploadedFile)>,
        server: BTreeMap<String, String>,
        content: Option<String>,
        change_history: bool,
    ) -> Result<()>;

    fn internal_request(&self) -> Option<&Request>;
    fn internal_response(&self) -> Option<&Response>;

    fn history(&self) -> &History;
    fn history_mut(&mut self) -> &mut History;

    fn cookie_jar(&self) -> &CookieJar;
    fn cookie_jar_mut(&mut self) -> &mut CookieJar;

    fn is_following_redirects(&self) -> bool;
    fn follow_redirects(&mut self, follow: bool);
    fn max_redirects(&self) -> usize;
    fn set_max_redirects(&mut self, max: usize);

    /// Follows the redirect recorded by the last response. Fails when there is none.
    fn follow_redirect(&mut self) -> Result<()>;

    fn set_server_parameter(&mut self, name: &str, value: &str);
    /// Replaces every persistent server parameter.
    fn set_server_parameters(&mut self, parameters: BTreeMap<String, String>);

    /// In-process transports get the external-URL guard and body synthesis.
    fn is_in_process(&self) -> bool {
        false
    }

    /// Extra host patterns this backend considers internal.
    fn internal_domains(&self) -> Vec<String> {
        Vec::new()
    }

    /// Drops history, cookies and the last request/response.
    fn restart(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_case() {
        let response = Response::redirect(302, "/next").with_header("set-cookie", "a=1");
        assert_eq!(response.header("location"), Some("/next"));
        assert_eq!(response.header("Set-Cookie"), Some("a=1"));
        assert_eq!(response.header("content-type"), None);
    }

    #[test]
    fn request_exposes_path_and_query() {
        let request = Request::new("GET", "http://localhost/submit?q=y");
        assert_eq!(request.path_and_query(), "/submit?q=y");
        assert_eq!(request.path(), "/submit");
    }
}
