use super::*;

impl<T: Transport> InnerBrowser<T> {
    /// Stores a cookie in the transport's jar.
    pub fn set_cookie(&mut self, name: &str, value: &str, params: CookieParams) {
        let cookie = Cookie {
            name: name.to_string(),
            value: value.to_string(),
            expires: params.expires,
            path: params.path,
            domain: params.domain,
            secure: params.secure,
            http_only: params.http_only,
            encoded_value: params.encoded_value,
        };
        tracing::trace!(target: "inner_browser", %cookie, "setting cookie");
        self.client.cookie_jar_mut().set(cookie);
    }

    pub fn grab_cookie(&self, name: &str, params: &CookieParams) -> Option<String> {
        self.client
            .cookie_jar()
            .get(name, &params.path, &params.domain)
            .map(Cookie::decoded_value)
    }

    pub fn see_cookie(&self, name: &str, params: &CookieParams) -> Result<()> {
        if self.grab_cookie(name, params).is_some() {
            return Ok(());
        }
        Err(Error::AssertionFailed(format!(
            "Failed asserting that cookie '{name}' is set (path '{}', domain '{}').",
            params.path, params.domain
        )))
    }

    pub fn dont_see_cookie(&self, name: &str, params: &CookieParams) -> Result<()> {
        if self.grab_cookie(name, params).is_none() {
            return Ok(());
        }
        Err(Error::AssertionFailed(format!(
            "Failed asserting that cookie '{name}' is not set (path '{}', domain '{}').",
            params.path, params.domain
        )))
    }

    /// Expires the cookie; an empty domain removes it from every domain.
    pub fn reset_cookie(&mut self, name: &str, params: &CookieParams) {
        self.client
            .cookie_jar_mut()
            .expire(name, &params.path, &params.domain);
    }
}
