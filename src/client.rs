//! The bundled transport: requests are dispatched to an application living in the
//! same process.

use super::*;

/// The application under test.
pub trait Application {
    fn handle(&mut self, request: &Request) -> Response;
}

impl<F> Application for F
where
    F: FnMut(&Request) -> Response,
{
    fn handle(&mut self, request: &Request) -> Response {
        self(request)
    }
}

const DEFAULT_ORIGIN: &str = "http://localhost/";

/// In-process HTTP client: resolves URIs, keeps cookies and history, and tracks the
/// redirect announced by the last response.
pub struct InProcessClient<A: Application> {
    app: A,
    history: History,
    cookie_jar: CookieJar,
    server: BTreeMap<String, String>,
    follow_redirects: bool,
    max_redirects: usize,
    redirect: Option<String>,
    request: Option<Request>,
    response: Option<Response>,
    internal_domains: Vec<String>,
}

impl<A: Application> InProcessClient<A> {
    pub fn new(app: A) -> Self {
        Self {
            app,
            history: History::new(),
            cookie_jar: CookieJar::new(),
            server: BTreeMap::new(),
            follow_redirects: true,
            max_redirects: 5,
            redirect: None,
            request: None,
            response: None,
            internal_domains: Vec::new(),
        }
    }

    /// Adds a host pattern this client treats as internal.
    pub fn with_internal_domain(mut self, pattern: impl Into<String>) -> Self {
        self.internal_domains.push(pattern.into());
        self
    }

    pub fn app(&self) -> &A {
        &self.app
    }

    pub fn app_mut(&mut self) -> &mut A {
        &mut self.app
    }

    /// Pending redirect target of the last response, if any.
    pub fn redirect_target(&self) -> Option<&str> {
        self.redirect.as_deref()
    }

    fn absolute_uri(&self, uri: &str) -> Result<url::Url> {
        let base = self
            .history
            .current()
            .map(|request| request.uri.as_str())
            .unwrap_or(DEFAULT_ORIGIN);
        let base = url::Url::parse(base)
            .or_else(|_| url::Url::parse(DEFAULT_ORIGIN))
            .map_err(|err| Error::Transport(err.to_string()))?;
        base.join(uri)
            .map_err(|err| Error::Transport(format!("cannot resolve {uri}: {err}")))
    }

    /// One request/response exchange, no redirect handling.
    #[allow(clippy::too_many_arguments)]
    fn exchange(
        &mut self,
        method: &str,
        uri: &str,
        mut parameters: Vec<(String, String)>,
        files: Vec<(String, UploadedFile)>,
        server: BTreeMap<String, String>,
        content: Option<String>,
        change_history: bool,
    ) -> Result<()> {
        let url = self.absolute_uri(uri)?;
        let method = method.to_ascii_uppercase();

        let mut merged = self.server.clone();
        if let Some(host) = url.host_str() {
            let host = match url.port() {
                Some(port) => format!("{host}:{port}"),
                None => host.to_string(),
            };
            merged.insert("HTTP_HOST".to_string(), host);
        }
        merged.insert(
            "HTTPS".to_string(),
            if url.scheme() == "https" { "on" } else { "off" }.to_string(),
        );
        if let Some(previous) = self.history.current() {
            merged.insert("HTTP_REFERER".to_string(), previous.uri.clone());
        }
        merged.extend(server);

        let mut sent = url.clone();
        sent.set_fragment(None);
        if parameters.is_empty() && matches!(method.as_str(), "GET" | "HEAD") {
            parameters = sent.query_pairs().into_owned().collect();
        }

        let request = Request {
            method,
            uri: url.to_string(),
            parameters,
            files,
            server: merged,
            content,
            cookies: self.cookie_jar.all_values(&sent),
        };
        if change_history {
            self.history.add(request.clone());
        }

        let dispatched = Request {
            uri: sent.to_string(),
            ..request.clone()
        };
        tracing::debug!(target: "inner_browser", method = %dispatched.method, uri = %dispatched.uri, "dispatching");
        let response = self.app.handle(&dispatched);

        self.cookie_jar
            .update_from_set_cookie(&response.header_all("Set-Cookie"), &sent);
        self.redirect = match response.header("Location") {
            Some(location) if (300..400).contains(&response.status) => Some(
                sent.join(location)
                    .map(|target| target.to_string())
                    .unwrap_or_else(|_| location.to_string()),
            ),
            _ => None,
        };
        self.request = Some(request);
        self.response = Some(response);
        Ok(())
    }

    fn follow_once(&mut self) -> Result<()> {
        let (Some(target), Some(request), Some(response)) =
            (self.redirect.clone(), self.request.as_ref(), self.response.as_ref())
        else {
            return Err(Error::Usage("The request was not redirected.".into()));
        };

        let (method, files, content) = if matches!(response.status, 301..=303) {
            ("GET".to_string(), Vec::new(), None)
        } else {
            (
                request.method.clone(),
                request.files.clone(),
                request.content.clone(),
            )
        };
        let parameters = if method == "GET" {
            Vec::new()
        } else {
            request.parameters.clone()
        };
        let mut server = request.server.clone();
        server.remove("HTTP_HOST");
        server.remove("HTTPS");
        server.remove("HTTP_REFERER");
        self.exchange(&method, &target, parameters, files, server, content, true)
    }

    fn follow_chain(&mut self) -> Result<()> {
        let mut hops = 0;
        while self.follow_redirects && self.redirect.is_some() {
            if hops >= self.max_redirects {
                return Err(Error::RedirectLimit {
                    max: self.max_redirects,
                });
            }
            hops += 1;
            self.follow_once()?;
        }
        Ok(())
    }
}

impl<A: Application> Transport for InProcessClient<A> {
    fn request(
        &mut self,
        method: &str,
        uri: &str,
        parameters: Vec<(String, String)>,
        files: Vec<(String, UploadedFile)>,
        server: BTreeMap<String, String>,
        content: Option<String>,
        change_history: bool,
    ) -> Result<()> {
        self.exchange(
            method,
            uri,
            parameters,
            files,
            server,
            content,
            change_history,
        )?;
        self.follow_chain()
    }

    fn internal_request(&self) -> Option<&Request> {
        self.request.as_ref()
    }

    fn internal_response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    fn history(&self) -> &History {
        &self.history
    }

    fn history_mut(&mut self) -> &mut History {
        &mut self.history
    }

    fn cookie_jar(&self) -> &CookieJar {
        &self.cookie_jar
    }

    fn cookie_jar_mut(&mut self) -> &mut CookieJar {
        &mut self.cookie_jar
    }

    fn is_following_redirects(&self) -> bool {
        self.follow_redirects
    }

    fn follow_redirects(&mut self, follow: bool) {
        self.follow_redirects = follow;
    }

    fn max_redirects(&self) -> usize {
        self.max_redirects
    }

    fn set_max_redirects(&mut self, max: usize) {
        self.max_redirects = max;
    }

    fn follow_redirect(&mut self) -> Result<()> {
        self.follow_once()?;
        self.follow_chain()
    }

    fn set_server_parameter(&mut self, name: &str, value: &str) {
        self.server.insert(name.to_string(), value.to_string());
    }

    fn set_server_parameters(&mut self, parameters: BTreeMap<String, String>) {
        self.server = parameters;
    }

    fn is_in_process(&self) -> bool {
        true
    }

    fn internal_domains(&self) -> Vec<String> {
        self.internal_domains.clone()
    }

    fn restart(&mut self) {
        self.history.clear();
        self.cookie_jar.clear();
        self.redirect = None;
        self.request = None;
        self.response = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(client: &mut InProcessClient<impl Application>, uri: &str) -> Result<()> {
        client.request("GET", uri, Vec::new(), Vec::new(), BTreeMap::new(), None, true)
    }

    #[test]
    fn relative_uris_resolve_against_the_current_page() -> Result<()> {
        let mut client = InProcessClient::new(|request: &Request| Response::html(request.uri.clone()));
        get(&mut client, "/a/b?x=1#top")?;
        assert_eq!(
            client.internal_response().map(|response| response.content.as_str()),
            Some("http://localhost/a/b?x=1")
        );
        assert_eq!(
            client.internal_request().map(|request| request.uri.as_str()),
            Some("http://localhost/a/b?x=1#top")
        );
        assert_eq!(
            client.internal_request().and_then(|request| request.parameter("x")),
            Some("1")
        );
        get(&mut client, "c")?;
        assert_eq!(
            client.internal_request().map(|request| request.uri.as_str()),
            Some("http://localhost/a/c")
        );
        assert_eq!(
            client
                .internal_request()
                .and_then(|request| request.server_var("HTTP_REFERER")),
            Some("http://localhost/a/b?x=1#top")
        );
        Ok(())
    }

    #[test]
    fn see_other_switches_to_get_and_temporary_keeps_the_method() -> Result<()> {
        let mut client = InProcessClient::new(|request: &Request| match request.path().as_str() {
            "/303" => Response::redirect(303, "/done"),
            "/307" => Response::redirect(307, "/done"),
            _ => Response::html(format!("{} {}", request.method, request.parameters.len())),
        });
        let params = vec![("a".to_string(), "1".to_string())];
        client.request("POST", "/303", params.clone(), Vec::new(), BTreeMap::new(), None, true)?;
        assert_eq!(client.internal_response().map(|r| r.content.as_str()), Some("GET 0"));
        client.request("POST", "/307", params, Vec::new(), BTreeMap::new(), None, true)?;
        assert_eq!(client.internal_response().map(|r| r.content.as_str()), Some("POST 1"));
        assert_eq!(client.history().len(), 4);
        Ok(())
    }

    #[test]
    fn native_following_is_bounded() -> Result<()> {
        let mut client =
            InProcessClient::new(|request: &Request| Response::redirect(302, request.path()));
        client.set_max_redirects(3);
        let err = get(&mut client, "/loop");
        assert_eq!(err, Err(Error::RedirectLimit { max: 3 }));

        client.follow_redirects(false);
        get(&mut client, "/loop")?;
        assert_eq!(client.redirect_target(), Some("http://localhost/loop"));
        Ok(())
    }

    #[test]
    fn cookies_round_trip_through_the_jar() -> Result<()> {
        let mut client = InProcessClient::new(|request: &Request| {
            if request.path() == "/login" {
                Response::html("ok").with_header("Set-Cookie", "sid=abc; Path=/")
            } else {
                Response::html(request.cookies.get("sid").cloned().unwrap_or_default())
            }
        });
        get(&mut client, "/login")?;
        get(&mut client, "/profile")?;
        assert_eq!(client.internal_response().map(|r| r.content.as_str()), Some("abc"));
        client.restart();
        assert!(client.internal_response().is_none());
        assert!(client.cookie_jar().all().is_empty());
        Ok(())
    }
}
