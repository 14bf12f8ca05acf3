use std::path::PathBuf;

/// A cookie installed into the transport when the browser is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfiguredCookie {
    pub name: String,
    pub value: String,
    /// Defaults to the host of [`BrowserConfig::url`].
    pub domain: Option<String>,
    pub path: Option<String>,
    pub expires: Option<i64>,
    pub secure: bool,
    pub http_only: bool,
}

impl ConfiguredCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
            expires: None,
            secure: false,
            http_only: false,
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserConfig {
    pub url: String,
    /// Host patterns (regular expressions) an in-process browser may open.
    pub internal_domains: Vec<String>,
    pub max_redirects: usize,
    pub follow_redirects: bool,
    pub cookies: Vec<ConfiguredCookie>,
    pub output_dir: PathBuf,
    pub data_dir: PathBuf,
    pub debug_log_limit: usize,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost".to_string(),
            internal_domains: Vec::new(),
            max_redirects: 5,
            follow_redirects: true,
            cookies: Vec::new(),
            output_dir: PathBuf::from("tests/_output"),
            data_dir: PathBuf::from("tests/_data"),
            debug_log_limit: 1000,
        }
    }
}

impl BrowserConfig {
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_internal_domain(mut self, pattern: impl Into<String>) -> Self {
        self.internal_domains.push(pattern.into());
        self
    }

    pub fn with_max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }

    pub fn with_cookie(mut self, cookie: ConfiguredCookie) -> Self {
        self.cookies.push(cookie);
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_debug_log_limit(mut self, limit: usize) -> Self {
        self.debug_log_limit = limit;
        self
    }

    /// Host of [`BrowserConfig::url`], the default domain of configured cookies.
    pub(crate) fn host(&self) -> Option<String> {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
    }
}
