use super::*;

const EXTERNAL_URL: &str = r"^(//|https?://(?!localhost))";

impl<T: Transport> InnerBrowser<T> {
    /// Opens `page` with a GET.
    pub fn am_on_page(&mut self, page: &str) -> Result<()> {
        self.load_page("GET", page, Params::new(), Vec::new(), BTreeMap::new(), None)
    }

    /// Sends a request without loading the response as the current page and returns
    /// the response body.
    pub fn request(
        &mut self,
        method: &str,
        uri: &str,
        parameters: Params,
        files: Vec<(String, UploadedFile)>,
        server: BTreeMap<String, String>,
        content: Option<String>,
    ) -> Result<String> {
        self.client_request(
            method,
            uri,
            parameters.to_pairs(),
            files,
            server,
            content,
            true,
        )?;
        Ok(self.response()?.content.clone())
    }

    /// Sends a request and makes its response the current page.
    pub fn load_page(
        &mut self,
        method: &str,
        uri: &str,
        parameters: Params,
        files: Vec<(String, UploadedFile)>,
        server: BTreeMap<String, String>,
        content: Option<String>,
    ) -> Result<()> {
        self.load_pairs(method, uri, parameters.to_pairs(), files, server, content)
    }

    pub(super) fn load_pairs(
        &mut self,
        method: &str,
        uri: &str,
        parameters: Vec<(String, String)>,
        files: Vec<(String, UploadedFile)>,
        server: BTreeMap<String, String>,
        content: Option<String>,
    ) -> Result<()> {
        self.client_request(method, uri, parameters, files, server, content, true)?;
        self.refresh_page()
    }

    /// Parses the last response into the current page.
    fn refresh_page(&mut self) -> Result<()> {
        let dom = parse_html(&self.response()?.content)?;
        let base_href = dom
            .query_selector_all("base")?
            .first()
            .and_then(|base| dom.attr(*base, "href"))
            .filter(|href| !href.is_empty())
            .map(str::to_string);
        let base = match base_href {
            Some(href) => href,
            None => self.current_uri()?,
        };
        let base_url = self.absolute_url_for(&base)?;
        self.page = Some(Page { dom, base_url });
        self.forms.clear();
        Ok(())
    }

    pub fn send_ajax_get_request(&mut self, uri: &str, parameters: Params) -> Result<()> {
        self.send_ajax_request("GET", uri, parameters)
    }

    pub fn send_ajax_post_request(&mut self, uri: &str, parameters: Params) -> Result<()> {
        self.send_ajax_request("POST", uri, parameters)
    }

    /// Sends an `XMLHttpRequest`-flagged request. History and the current page stay
    /// as they are; the response is available through `grab_page_source`.
    pub fn send_ajax_request(&mut self, method: &str, uri: &str, parameters: Params) -> Result<()> {
        let server = BTreeMap::from([(
            "HTTP_X_REQUESTED_WITH".to_string(),
            "XMLHttpRequest".to_string(),
        )]);
        self.client_request(
            method,
            uri,
            parameters.to_pairs(),
            Vec::new(),
            server,
            None,
            false,
        )
    }

    /// Opens the `src` of the named iframe (or frame).
    pub fn switch_to_iframe(&mut self, name: &str) -> Result<()> {
        let src = {
            let dom = self.dom()?;
            let quoted = locator::css_string(name);
            let mut frames = dom.query_selector_all(&format!("iframe[name={quoted}]"))?;
            if frames.is_empty() {
                frames = dom.query_selector_all(&format!("frame[name={quoted}]"))?;
            }
            let Some(frame) = frames.first() else {
                return Err(Error::not_found(format!("name={name}"), "Iframe"));
            };
            dom.attr(*frame, "src").unwrap_or_default().to_string()
        };
        self.am_on_page(&src)
    }

    /// Replays the request `steps` entries back in history.
    pub fn move_back(&mut self, steps: usize) -> Result<()> {
        if steps == 0 {
            return Err(Error::InvalidArgument(
                "numberOfSteps must be positive integer".into(),
            ));
        }
        self.request_snapshot()?;
        let history = self.client.history_mut();
        if steps > history.position() {
            return Err(Error::HistoryExhausted {
                requested: steps,
                available: history.position() + 1,
            });
        }
        let mut target = None;
        for _ in 0..steps {
            target = Some(history.back()?.clone());
        }
        let Some(request) = target else {
            return Err(Error::Usage("You are already on the first page.".into()));
        };
        self.load_pairs(
            &request.method,
            &request.uri,
            request.parameters,
            request.files,
            request.server,
            request.content,
        )
    }

    /// Follows the pending redirect of the last response by hand.
    pub fn follow_redirect(&mut self) -> Result<()> {
        self.client.follow_redirect()?;
        self.refresh_page()
    }

    pub fn stop_following_redirects(&mut self) {
        self.client.follow_redirects(false);
    }

    pub fn start_following_redirects(&mut self) {
        self.client.follow_redirects(true);
    }

    pub fn set_max_redirects(&mut self, max: usize) {
        self.client.set_max_redirects(max);
    }

    /// Sends `name: value` with every following request. `X_Custom-id` is stored as
    /// `X-Custom-Id`.
    pub fn have_http_header(&mut self, name: &str, value: &str) {
        self.headers.insert(normalize_header_name(name), value.to_string());
    }

    pub fn delete_header(&mut self, name: &str) {
        self.headers.remove(&normalize_header_name(name));
    }

    pub fn am_http_authenticated(&mut self, user: &str, password: &str) {
        self.client.set_server_parameter("PHP_AUTH_USER", user);
        self.client.set_server_parameter("PHP_AUTH_PW", password);
    }

    /// Replaces every persistent server parameter.
    pub fn set_server_parameters(&mut self, parameters: BTreeMap<String, String>) {
        self.client.set_server_parameters(parameters);
    }

    pub fn have_server_parameter(&mut self, name: &str, value: &str) {
        self.client.set_server_parameter(name, value);
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) fn client_request(
        &mut self,
        method: &str,
        uri: &str,
        parameters: Vec<(String, String)>,
        files: Vec<(String, UploadedFile)>,
        mut server: BTreeMap<String, String>,
        mut content: Option<String>,
        change_history: bool,
    ) -> Result<()> {
        let headers = format_map(&self.headers);
        self.section("Request Headers", &headers);

        let in_process = self.client.is_in_process();
        for (name, value) in &self.headers {
            if value.is_empty() {
                continue;
            }
            let key = name.to_ascii_uppercase().replace('-', "_");
            server.insert(format!("HTTP_{key}"), value.clone());
            if in_process && key == "CONTENT_TYPE" {
                server.insert(key, value.clone());
            }
        }

        let now = chrono::Utc::now();
        server.insert("REQUEST_TIME".to_string(), now.timestamp().to_string());
        server.insert(
            "REQUEST_TIME_FLOAT".to_string(),
            format!("{:.6}", now.timestamp_micros() as f64 / 1_000_000.0),
        );

        if in_process {
            if fancy_regex::Regex::new(EXTERNAL_URL)?.is_match(uri)? {
                let host = host_of(uri).unwrap_or_default();
                if !self.is_internal_domain(&host)? {
                    return Err(Error::ExternalUrl {
                        uri: uri.to_string(),
                    });
                }
            }
            if !matches!(method, "GET" | "HEAD" | "OPTIONS")
                && content.is_none()
                && !parameters.is_empty()
            {
                content = Some(
                    url::form_urlencoded::Serializer::new(String::new())
                        .extend_pairs(&parameters)
                        .finish(),
                );
            }
        }

        if !self.client.is_following_redirects() {
            self.client.request(
                method,
                uri,
                parameters,
                files,
                server,
                content,
                change_history,
            )?;
            return self.debug_response(uri);
        }

        let max_redirects = self.client.max_redirects();
        self.client.follow_redirects(false);
        let outcome = self
            .client
            .request(
                method,
                uri,
                parameters,
                files,
                server,
                content,
                change_history,
            )
            .and_then(|()| self.debug_response(uri))
            .and_then(|()| self.redirect_if_necessary(max_redirects));
        self.client.follow_redirects(true);
        outcome
    }

    /// Follows 3xx responses carrying a `Location` until a final page, failing once
    /// `max_redirects` hops have been taken.
    fn redirect_if_necessary(&mut self, max_redirects: usize) -> Result<()> {
        let mut count = 0;
        loop {
            let response = self.response()?;
            let location = match response.header("Location") {
                Some(location)
                    if !location.is_empty() && (300..400).contains(&response.status) =>
                {
                    location.to_string()
                }
                _ => return Ok(()),
            };
            if count == max_redirects {
                return Err(Error::RedirectLimit { max: max_redirects });
            }
            self.section("Redirecting to", &location);
            self.client.follow_redirect()?;
            self.debug_response(&location)?;
            count += 1;
        }
    }

    fn debug_response(&mut self, uri: &str) -> Result<()> {
        let request = self.request_snapshot()?;
        let response = self.response()?;
        let status = response.status.to_string();
        let cookies = format_map(&request.cookies);
        let headers = response
            .headers
            .iter()
            .map(|(name, value)| format!("{name}: {value}"))
            .collect::<Vec<_>>()
            .join("\n");
        self.section("Page", uri);
        self.section("Response", &status);
        self.section("Request Cookies", &cookies);
        self.section("Response Headers", &headers);
        Ok(())
    }

    fn is_internal_domain(&mut self, host: &str) -> Result<bool> {
        if self.config.host().as_deref() == Some(host) {
            return Ok(true);
        }
        if self.internal_domains.is_none() {
            let mut patterns = self.config.internal_domains.clone();
            patterns.extend(self.client.internal_domains());
            let compiled = patterns
                .iter()
                .map(|pattern| text::user_regex(pattern))
                .collect::<Result<Vec<_>>>()?;
            self.internal_domains = Some(compiled);
        }
        let patterns = self.internal_domains.as_deref().unwrap_or_default();
        for pattern in patterns {
            if pattern.is_match(host)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

fn normalize_header_name(name: &str) -> String {
    name.replace('_', "-")
        .to_lowercase()
        .split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

fn host_of(uri: &str) -> Option<String> {
    let absolute = if uri.starts_with("//") {
        format!("http:{uri}")
    } else {
        uri.to_string()
    };
    url::Url::parse(&absolute)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_names_are_title_cased() {
        assert_eq!(normalize_header_name("x_custom-ID"), "X-Custom-Id");
        assert_eq!(normalize_header_name("content-type"), "Content-Type");
    }

    #[test]
    fn protocol_relative_hosts_are_extracted() {
        assert_eq!(host_of("//cdn.example.com/a.js").as_deref(), Some("cdn.example.com"));
        assert_eq!(host_of("https://example.org:8443/").as_deref(), Some("example.org"));
        assert_eq!(host_of("/local"), None);
    }
}
