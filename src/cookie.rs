use super::*;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::fmt;

/// Earliest non-zero timestamp; a zero expiry means "session".
const EXPIRED: i64 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    /// Unix timestamp; `None` for a session cookie.
    pub expires: Option<i64>,
    pub path: String,
    pub domain: String,
    pub secure: bool,
    pub http_only: bool,
    /// `value` holds the percent-encoded form, as received in a `Set-Cookie` header.
    pub encoded_value: bool,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            expires: None,
            path: "/".to_string(),
            domain: String::new(),
            secure: false,
            http_only: true,
            encoded_value: false,
        }
    }

    /// The value the application reads.
    pub fn decoded_value(&self) -> String {
        if self.encoded_value {
            percent_decode(&self.value)
        } else {
            self.value.clone()
        }
    }

    /// The value as written on the wire.
    pub fn raw_value(&self) -> String {
        if self.encoded_value {
            self.value.clone()
        } else {
            url::form_urlencoded::byte_serialize(self.value.as_bytes()).collect()
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires
            .is_some_and(|expires| expires != 0 && expires <= Utc::now().timestamp())
    }

    /// Parses one `Set-Cookie` header value. Domain and path default to those of
    /// `uri`, the request that received it.
    pub fn from_set_cookie(header: &str, uri: &url::Url) -> Result<Self> {
        let mut parts = header.split(';');
        let pair = parts.next().unwrap_or_default();
        let Some((name, value)) = pair.split_once('=') else {
            return Err(Error::InvalidArgument(format!(
                "The cookie string \"{header}\" is not valid."
            )));
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "The cookie name in \"{header}\" is empty."
            )));
        }

        let default_path = match uri.path().rfind('/') {
            Some(0) | None => "/".to_string(),
            Some(pos) => uri.path()[..pos].to_string(),
        };
        let mut cookie = Cookie {
            name: name.to_string(),
            value: value.trim().to_string(),
            expires: None,
            path: default_path,
            domain: uri.host_str().unwrap_or_default().to_string(),
            secure: false,
            http_only: false,
            encoded_value: true,
        };

        for attribute in parts {
            let (key, value) = match attribute.split_once('=') {
                Some((key, value)) => (key.trim().to_ascii_lowercase(), value.trim()),
                None => (attribute.trim().to_ascii_lowercase(), ""),
            };
            match key.as_str() {
                "expires" => {
                    if cookie.expires.is_none() {
                        cookie.expires = parse_cookie_date(value);
                    }
                }
                "max-age" => {
                    if let Ok(seconds) = value.parse::<i64>() {
                        cookie.expires = Some(if seconds <= 0 {
                            EXPIRED
                        } else {
                            Utc::now().timestamp().saturating_add(seconds)
                        });
                    }
                }
                "path" if !value.is_empty() => cookie.path = value.to_string(),
                "domain" if !value.is_empty() => {
                    cookie.domain = value.trim_start_matches('.').to_string()
                }
                "secure" => cookie.secure = true,
                "httponly" => cookie.http_only = true,
                _ => {}
            }
        }
        Ok(cookie)
    }
}

/// `Set-Cookie` rendering used for debug output.
impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.raw_value())?;
        if let Some(date) = self
            .expires
            .and_then(|expires| DateTime::<Utc>::from_timestamp(expires, 0))
        {
            write!(f, "; expires={}", date.format("%a, %d %b %Y %H:%M:%S GMT"))?;
        }
        if !self.domain.is_empty() {
            write!(f, "; domain={}", self.domain)?;
        }
        write!(f, "; path={}", self.path)?;
        if self.secure {
            f.write_str("; secure")?;
        }
        if self.http_only {
            f.write_str("; httponly")?;
        }
        Ok(())
    }
}

fn parse_cookie_date(raw: &str) -> Option<i64> {
    if let Ok(date) = DateTime::parse_from_rfc2822(raw) {
        return Some(date.timestamp());
    }
    const FORMATS: &[&str] = &[
        "%A, %d-%b-%Y %H:%M:%S GMT",
        "%a, %d-%b-%Y %H:%M:%S GMT",
        "%a, %d %b %Y %H:%M:%S GMT",
        "%a %b %e %H:%M:%S %Y",
    ];
    FORMATS.iter().find_map(|format| {
        NaiveDateTime::parse_from_str(raw, format)
            .ok()
            .map(|date| date.and_utc().timestamp())
    })
}

fn percent_decode(raw: &str) -> String {
    url::form_urlencoded::parse(format!("v={raw}").as_bytes())
        .next()
        .map(|(_, value)| value.into_owned())
        .unwrap_or_else(|| raw.to_string())
}

/// Cookie store keyed by domain, then path, then name.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    cookies: BTreeMap<String, BTreeMap<String, BTreeMap<String, Cookie>>>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, cookie: Cookie) {
        self.cookies
            .entry(cookie.domain.clone())
            .or_default()
            .entry(cookie.path.clone())
            .or_default()
            .insert(cookie.name.clone(), cookie);
    }

    /// Finds a live cookie. Domains are compared only when both sides name one; the
    /// cookie path must be a prefix of `path`.
    pub fn get(&self, name: &str, path: &str, domain: &str) -> Option<&Cookie> {
        for (cookie_domain, paths) in &self.cookies {
            if !cookie_domain.is_empty()
                && !domain.is_empty()
                && !domain_matches(domain, cookie_domain)
            {
                continue;
            }
            for (cookie_path, named) in paths {
                if !path.starts_with(cookie_path.as_str()) {
                    continue;
                }
                if let Some(cookie) = named.get(name).filter(|cookie| !cookie.is_expired()) {
                    return Some(cookie);
                }
            }
        }
        None
    }

    /// Removes a cookie. An empty `domain` removes it from every domain.
    pub fn expire(&mut self, name: &str, path: &str, domain: &str) {
        let path = if path.is_empty() { "/" } else { path };
        let domains = if domain.is_empty() {
            self.cookies.keys().cloned().collect::<Vec<_>>()
        } else {
            vec![domain.to_string()]
        };
        for cookie_domain in domains {
            let Some(paths) = self.cookies.get_mut(&cookie_domain) else {
                continue;
            };
            if let Some(named) = paths.get_mut(path) {
                named.remove(name);
                if named.is_empty() {
                    paths.remove(path);
                }
            }
            if paths.is_empty() {
                self.cookies.remove(&cookie_domain);
            }
        }
    }

    pub fn clear(&mut self) {
        self.cookies.clear();
    }

    pub fn all(&self) -> Vec<&Cookie> {
        self.cookies
            .values()
            .flat_map(|paths| paths.values())
            .flat_map(|named| named.values())
            .filter(|cookie| !cookie.is_expired())
            .collect()
    }

    /// Name/value pairs a request to `uri` would carry.
    pub fn all_values(&self, uri: &url::Url) -> BTreeMap<String, String> {
        let host = uri.host_str().unwrap_or_default();
        let secure = uri.scheme() == "https";
        self.all()
            .into_iter()
            .filter(|cookie| cookie.domain.is_empty() || domain_matches(host, &cookie.domain))
            .filter(|cookie| uri.path().starts_with(cookie.path.as_str()))
            .filter(|cookie| !cookie.secure || secure)
            .map(|cookie| (cookie.name.clone(), cookie.decoded_value()))
            .collect()
    }

    /// Stores every `Set-Cookie` of a response received from `uri`; malformed headers
    /// are skipped.
    pub fn update_from_set_cookie(&mut self, headers: &[&str], uri: &url::Url) {
        for header in headers {
            match Cookie::from_set_cookie(header, uri) {
                Ok(cookie) => self.set(cookie),
                Err(err) => tracing::debug!(target: "inner_browser", "ignoring cookie: {err}"),
            }
        }
    }
}

fn domain_matches(host: &str, cookie_domain: &str) -> bool {
    let suffix = format!(".{}", cookie_domain.trim_start_matches('.'));
    format!(".{host}").ends_with(&suffix)
}

/// Path/domain/flag overrides for the cookie operations of
/// [`InnerBrowser`](crate::InnerBrowser).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieParams {
    pub path: String,
    pub domain: String,
    pub secure: bool,
    pub http_only: bool,
    pub expires: Option<i64>,
    pub encoded_value: bool,
}

impl Default for CookieParams {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            domain: String::new(),
            secure: false,
            http_only: true,
            expires: None,
            encoded_value: false,
        }
    }
}

impl CookieParams {
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_expires(mut self, expires: i64) -> Self {
        self.expires = Some(expires);
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(raw: &str) -> url::Url {
        url::Url::parse(raw).unwrap_or_else(|err| panic!("bad url {raw}: {err}"))
    }

    #[test]
    fn get_filters_by_domain_only_when_both_are_set() {
        let mut jar = CookieJar::new();
        let mut cookie = Cookie::new("sid", "abc");
        cookie.domain = "example.com".into();
        jar.set(cookie);

        assert!(jar.get("sid", "/", "").is_some());
        assert!(jar.get("sid", "/", "www.example.com").is_some());
        assert!(jar.get("sid", "/", "other.org").is_none());
        assert!(jar.get("sid", "/admin", "example.com").is_some());
    }

    #[test]
    fn path_must_prefix_the_lookup_path() {
        let mut jar = CookieJar::new();
        let mut cookie = Cookie::new("pref", "1");
        cookie.path = "/admin".into();
        jar.set(cookie);
        assert!(jar.get("pref", "/", "").is_none());
        assert!(jar.get("pref", "/admin/users", "").is_some());
    }

    #[test]
    fn expire_without_domain_clears_every_domain() {
        let mut jar = CookieJar::new();
        for domain in ["a.test", "b.test"] {
            let mut cookie = Cookie::new("sid", domain);
            cookie.domain = domain.into();
            jar.set(cookie);
        }
        jar.expire("sid", "/", "a.test");
        assert_eq!(jar.all().len(), 1);
        jar.expire("sid", "/", "");
        assert!(jar.all().is_empty());
    }

    #[test]
    fn set_cookie_headers_take_defaults_from_the_request() -> Result<()> {
        let cookie = Cookie::from_set_cookie(
            "token=a%20b; Path=/app; Expires=Wed, 21 Oct 2099 07:28:00 GMT; HttpOnly",
            &url("http://localhost/app/login"),
        )?;
        assert_eq!(cookie.value, "a%20b");
        assert_eq!(cookie.decoded_value(), "a b");
        assert_eq!(cookie.raw_value(), "a%20b");
        assert_eq!(cookie.domain, "localhost");
        assert_eq!(cookie.path, "/app");
        assert!(cookie.http_only);
        assert!(!cookie.is_expired());
        assert_eq!(cookie.expires, Some(4096250880));

        let expired = Cookie::from_set_cookie("old=1; Max-Age=-1", &url("http://localhost/"))?;
        assert!(expired.is_expired());
        assert!(Cookie::from_set_cookie("novalue", &url("http://localhost/")).is_err());
        Ok(())
    }

    #[test]
    fn max_age_is_clamped_and_non_positive_values_expire() -> Result<()> {
        let forever = Cookie::from_set_cookie(
            "sid=x; Max-Age=9223372036854775807",
            &url("http://localhost/"),
        )?;
        assert_eq!(forever.expires, Some(i64::MAX));
        assert!(!forever.is_expired());

        for header in ["sid=x; Max-Age=0", "sid=x; Max-Age=-9223372036854775808"] {
            let gone = Cookie::from_set_cookie(header, &url("http://localhost/"))?;
            assert_eq!(gone.expires, Some(EXPIRED));
            assert!(gone.is_expired());
        }
        Ok(())
    }

    #[test]
    fn encoded_values_are_decoded_for_the_application() {
        let mut jar = CookieJar::new();
        let mut received = Cookie::new("raw", "a%2Bb");
        received.encoded_value = true;
        jar.set(received);
        jar.set(Cookie::new("plain", "a+b c"));

        let values = jar.all_values(&url("http://localhost/"));
        assert_eq!(values.get("raw").map(String::as_str), Some("a+b"));
        assert_eq!(values.get("plain").map(String::as_str), Some("a+b c"));
        assert_eq!(Cookie::new("plain", "a+b c").to_string(), "plain=a%2Bb+c; path=/; httponly");
    }

    #[test]
    fn all_values_respects_secure_and_path() {
        let mut jar = CookieJar::new();
        let mut secure = Cookie::new("s", "1");
        secure.secure = true;
        jar.set(secure);
        jar.set(Cookie::new("plain", "2"));
        let values = jar.all_values(&url("http://localhost/page"));
        assert_eq!(values.get("plain").map(String::as_str), Some("2"));
        assert!(!values.contains_key("s"));
        assert_eq!(jar.all_values(&url("https://localhost/")).len(), 2);
    }
}
