use inner_browser::{
    BrowserConfig, ConfiguredCookie, CookieParams, Error, InProcessClient, InnerBrowser, Request,
    Response, Result, Transport,
};

type Site = fn(&Request) -> Response;

fn site(request: &Request) -> Response {
    match request.path().as_str() {
        "/login" => Response::html("<p>welcome</p>").with_header("Set-Cookie", "sid=xyz; Path=/"),
        "/logout" => Response::html("<p>bye</p>")
            .with_header("Set-Cookie", "sid=; Expires=Thu, 01 Jan 1970 00:00:01 GMT; Path=/"),
        "/report.json" => {
            Response::new(500, r#"{"error":"boom"}"#).with_header("Content-Type", "application/json")
        }
        _ => {
            let cookies = request
                .cookies
                .iter()
                .map(|(name, value)| format!("<li>{name}={value}</li>"))
                .collect::<String>();
            Response::html(format!("<ul>{cookies}</ul>"))
        }
    }
}

fn browser_with(config: BrowserConfig) -> Result<InnerBrowser<InProcessClient<Site>>> {
    InnerBrowser::new(InProcessClient::new(site as Site), config)
}

fn sent_cookies(browser: &mut InnerBrowser<InProcessClient<Site>>) -> Result<Vec<String>> {
    browser.am_on_page("/whoami")?;
    browser.grab_multiple("li", None)
}

#[test]
fn cookies_set_by_the_test_reach_the_application() -> Result<()> {
    let mut browser = browser_with(BrowserConfig::default())?;
    browser.set_cookie("token", "abc", CookieParams::default());
    browser.see_cookie("token", &CookieParams::default())?;
    assert_eq!(
        browser.grab_cookie("token", &CookieParams::default()).as_deref(),
        Some("abc")
    );
    assert_eq!(sent_cookies(&mut browser)?, vec!["token=abc"]);

    browser.reset_cookie("token", &CookieParams::default());
    browser.dont_see_cookie("token", &CookieParams::default())?;
    assert!(sent_cookies(&mut browser)?.is_empty());
    Ok(())
}

#[test]
fn set_cookie_headers_are_stored_and_expired() -> Result<()> {
    let mut browser = browser_with(BrowserConfig::default())?;
    browser.am_on_page("/login")?;
    let local = CookieParams::default().with_domain("localhost");
    browser.see_cookie("sid", &local)?;
    assert_eq!(browser.grab_cookie("sid", &local).as_deref(), Some("xyz"));
    assert_eq!(
        browser.grab_cookie("sid", &CookieParams::default().with_domain("example.org")),
        None
    );
    assert_eq!(sent_cookies(&mut browser)?, vec!["sid=xyz"]);

    browser.am_on_page("/logout")?;
    browser.dont_see_cookie("sid", &local)?;
    Ok(())
}

#[test]
fn cookie_lookup_respects_path_and_expiry() -> Result<()> {
    let mut browser = browser_with(BrowserConfig::default())?;
    browser.set_cookie("scoped", "1", CookieParams::default().with_path("/admin"));
    assert_eq!(browser.grab_cookie("scoped", &CookieParams::default()), None);
    assert_eq!(
        browser
            .grab_cookie("scoped", &CookieParams::default().with_path("/admin/users"))
            .as_deref(),
        Some("1")
    );

    browser.set_cookie("old", "1", CookieParams::default().with_expires(1));
    browser.dont_see_cookie("old", &CookieParams::default())?;

    assert_eq!(
        browser.see_cookie("missing", &CookieParams::default()),
        Err(Error::AssertionFailed(
            "Failed asserting that cookie 'missing' is set (path '/', domain '').".into()
        ))
    );
    Ok(())
}

#[test]
fn configured_cookies_are_installed_up_front() -> Result<()> {
    let config = BrowserConfig::default()
        .with_cookie(ConfiguredCookie::new("lang", "en"))
        .with_cookie(ConfiguredCookie::new("beta", "1").with_domain("example.org"));
    let mut browser = browser_with(config)?;
    browser.see_cookie("lang", &CookieParams::default().with_domain("localhost"))?;
    assert_eq!(sent_cookies(&mut browser)?, vec!["lang=en"]);

    let unnamed = BrowserConfig::default().with_cookie(ConfiguredCookie::new("", "x"));
    assert!(matches!(
        browser_with(unnamed),
        Err(Error::InvalidArgument(message)) if message == "Cookie name is required in configuration"
    ));
    Ok(())
}

#[test]
fn after_test_drops_cookies_and_history() -> Result<()> {
    let mut browser = browser_with(BrowserConfig::default())?;
    browser.am_on_page("/login")?;
    browser.am_on_page("/whoami")?;
    assert_eq!(browser.client().history().len(), 2);
    assert_eq!(browser.client().history().position(), 1);

    browser.after_test();
    assert!(browser.client().history().is_empty());
    assert!(browser.client().cookie_jar().all().is_empty());
    assert!(sent_cookies(&mut browser)?.is_empty());
    Ok(())
}

#[test]
fn failed_tests_leave_the_last_response_behind() -> Result<()> {
    let output = tempfile::tempdir().map_err(|err| Error::Io(err.to_string()))?;
    let mut browser = browser_with(BrowserConfig::default().with_output_dir(output.path()))?;
    assert_eq!(browser.failed("ReportCest:export")?, None);

    browser.am_on_page("/report.json")?;
    browser.see_response_code_is_server_error()?;
    let saved = browser.failed("ReportCest:export")?;
    let expected = output.path().join("ReportCest.export.fail.json");
    assert_eq!(saved.as_deref(), Some(expected.as_path()));
    assert_eq!(
        std::fs::read_to_string(&expected).map_err(|err| Error::Io(err.to_string()))?,
        r#"{"error":"boom"}"#
    );

    let snapshot = browser.make_html_snapshot(Some("after-export"))?;
    assert_eq!(snapshot, output.path().join("debug").join("after-export.html"));
    Ok(())
}
