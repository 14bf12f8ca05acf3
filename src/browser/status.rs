use super::*;
use http_code::description;

impl<T: Transport> InnerBrowser<T> {
    pub fn grab_response_code(&self) -> Result<u16> {
        Ok(self.response()?.status)
    }

    pub fn see_response_code_is(&self, code: u16) -> Result<()> {
        let actual = self.grab_response_code()?;
        if actual == code {
            return Ok(());
        }
        Err(Error::AssertionFailed(format!(
            "Expected HTTP Status Code: {}. Actual Status Code: {}",
            description(code),
            description(actual)
        )))
    }

    pub fn dont_see_response_code_is(&self, code: u16) -> Result<()> {
        if self.grab_response_code()? != code {
            return Ok(());
        }
        Err(Error::AssertionFailed(format!(
            "Expected HTTP status code other than {}",
            description(code)
        )))
    }

    /// Inclusive on both ends.
    pub fn see_response_code_is_between(&self, from: u16, to: u16) -> Result<()> {
        let actual = self.grab_response_code()?;
        if (from..=to).contains(&actual) {
            return Ok(());
        }
        Err(Error::AssertionFailed(format!(
            "Expected HTTP Status Code between {} and {}. Actual Status Code: {}",
            description(from),
            description(to),
            description(actual)
        )))
    }

    pub fn see_response_code_is_successful(&self) -> Result<()> {
        self.see_response_code_is_between(200, 299)
    }

    pub fn see_response_code_is_redirection(&self) -> Result<()> {
        self.see_response_code_is_between(300, 399)
    }

    pub fn see_response_code_is_client_error(&self) -> Result<()> {
        self.see_response_code_is_between(400, 499)
    }

    pub fn see_response_code_is_server_error(&self) -> Result<()> {
        self.see_response_code_is_between(500, 599)
    }

    pub fn see_page_not_found(&self) -> Result<()> {
        self.see_response_code_is(http_code::NOT_FOUND)
    }
}
