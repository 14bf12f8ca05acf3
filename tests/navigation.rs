use std::collections::BTreeMap;

use inner_browser::{
    BrowserConfig, Error, InProcessClient, InnerBrowser, Params, Request, Response, Result,
    Transport,
};

type Site = fn(&Request) -> Response;

fn site(request: &Request) -> Response {
    let path = request.path();
    match path.as_str() {
        "/" => Response::html(
            r#"<html><head><title>Home page</title></head><body>
                <h1>Welcome</h1>
                <a href="/a">A</a>
                <a href="/info#top">Info</a>
                <p class="note">Hello <b>World</b></p>
            </body></html>"#,
        ),
        "/a" | "/b" | "/c" => Response::html(format!("<h1>Page {}</h1>", &path[1..])),
        "/info" => Response::html(format!(r#"<p id="uri">{}</p>"#, request.uri)),
        "/loop" => Response::redirect(302, "/loop"),
        "/hop/1" => Response::redirect(302, "/hop/2"),
        "/hop/2" => Response::redirect(301, "/hop/3"),
        "/hop/3" => Response::redirect(302, "/a"),
        "/headers" => Response::html(format!(
            r#"<p id="h">{}</p><p id="auth">{}</p>"#,
            request.server_var("HTTP_X_CUSTOM_ID").unwrap_or("none"),
            request.server_var("PHP_AUTH_USER").unwrap_or("anonymous"),
        )),
        "/frame" => Response::html(r#"<iframe name="content" src="/b"></iframe>"#),
        "/ajax" => Response::html(
            request
                .server_var("HTTP_X_REQUESTED_WITH")
                .unwrap_or_default()
                .to_string(),
        ),
        "/missing" => Response::new(404, "<h1>Not here</h1>"),
        _ => Response::new(404, "not found"),
    }
}

fn browser_with(config: BrowserConfig) -> Result<InnerBrowser<InProcessClient<Site>>> {
    InnerBrowser::new(InProcessClient::new(site as Site), config)
}

fn browser() -> Result<InnerBrowser<InProcessClient<Site>>> {
    browser_with(BrowserConfig::default())
}

#[test]
fn opened_page_is_queryable() -> Result<()> {
    let mut browser = browser()?;
    browser.am_on_page("/")?;
    browser.see("Welcome")?;
    browser.see("hello world")?;
    browser.dont_see("Goodbye")?;
    browser.see_in("World", "p.note")?;
    browser.see_in_title("Home")?;
    browser.dont_see_in_title("Away")?;
    browser.see_element("h1")?;
    browser.dont_see_element("h2")?;
    browser.see_number_of_elements("a", 2)?;
    browser.see_number_of_elements("a", 1..=3)?;
    browser.see_current_url_equals("/")?;
    browser.see_response_code_is(200)?;
    browser.see_response_code_is_successful()?;
    Ok(())
}

#[test]
fn clicked_links_never_send_their_fragment() -> Result<()> {
    let mut browser = browser()?;
    browser.am_on_page("/")?;
    browser.click("Info")?;
    browser.see_in("http://localhost/info", "#uri")?;
    browser.dont_see_in("#top", "#uri")?;
    browser.see_current_url_equals("/info")?;

    browser.am_on_page("/info#section")?;
    browser.dont_see("section")?;
    assert_eq!(browser.grab_from_current_url(None)?, "/info#section");
    Ok(())
}

#[test]
fn redirect_chain_is_followed_up_to_the_limit() -> Result<()> {
    let mut browser = browser()?;
    browser.am_on_page("/hop/1")?;
    browser.see_in("Page a", "h1")?;
    browser.see_current_url_equals("/a")?;

    browser.set_max_redirects(2);
    assert_eq!(
        browser.am_on_page("/hop/1"),
        Err(Error::RedirectLimit { max: 2 })
    );

    browser.set_max_redirects(3);
    browser.am_on_page("/hop/1")?;
    browser.see_in("Page a", "h1")?;
    Ok(())
}

#[test]
fn redirects_can_be_followed_by_hand() -> Result<()> {
    let mut browser = browser()?;
    browser.stop_following_redirects();
    browser.am_on_page("/hop/3")?;
    browser.see_response_code_is(302)?;
    browser.see_response_code_is_redirection()?;

    browser.follow_redirect()?;
    browser.see_response_code_is(200)?;
    browser.see_in("Page a", "h1")?;

    browser.start_following_redirects();
    browser.am_on_page("/hop/2")?;
    browser.see_current_url_equals("/a")?;
    Ok(())
}

#[test]
fn moving_back_replays_history() -> Result<()> {
    let mut browser = browser()?;
    for page in ["/a", "/b", "/c"] {
        browser.am_on_page(page)?;
    }
    browser.move_back(2)?;
    browser.see_in("Page a", "h1")?;
    browser.see_current_url_equals("/a")?;
    Ok(())
}

#[test]
fn moving_back_too_far_reports_available_steps() -> Result<()> {
    let mut browser = browser()?;
    for page in ["/a", "/b", "/c"] {
        browser.am_on_page(page)?;
    }
    let err = browser.move_back(5);
    assert_eq!(
        err,
        Err(Error::HistoryExhausted {
            requested: 5,
            available: 3
        })
    );
    assert_eq!(
        err.err().map(|err| err.to_string()).unwrap_or_default(),
        "numberOfSteps is set to 5, but there are only 3 pages in the history"
    );
    assert!(matches!(browser.move_back(0), Err(Error::InvalidArgument(_))));
    browser.see_in("Page c", "h1")?;
    Ok(())
}

#[test]
fn headers_and_credentials_reach_the_application() -> Result<()> {
    let mut browser = browser()?;
    browser.have_http_header("x_custom-id", "42");
    browser.am_http_authenticated("davert", "123456");
    browser.am_on_page("/headers")?;
    browser.see_in("42", "#h")?;
    browser.see_in("davert", "#auth")?;

    browser.delete_header("X-Custom-ID");
    browser.am_on_page("/headers")?;
    browser.see_in("none", "#h")?;
    Ok(())
}

#[test]
fn external_hosts_need_an_allow_list_entry() -> Result<()> {
    let mut browser = browser()?;
    assert!(matches!(
        browser.am_on_page("http://example.com/a"),
        Err(Error::ExternalUrl { .. })
    ));
    assert!(matches!(
        browser.am_on_page("//example.com/a"),
        Err(Error::ExternalUrl { .. })
    ));

    let mut browser = browser_with(BrowserConfig::default().with_internal_domain(r"^example\.com$"))?;
    browser.am_on_page("http://example.com/a")?;
    browser.see_in("Page a", "h1")?;
    assert_eq!(
        browser
            .client()
            .internal_request()
            .and_then(|request| request.server_var("HTTP_HOST")),
        Some("example.com")
    );
    Ok(())
}

#[test]
fn iframes_are_opened_by_name() -> Result<()> {
    let mut browser = browser()?;
    browser.am_on_page("/frame")?;
    browser.switch_to_iframe("content")?;
    browser.see_in("Page b", "h1")?;

    browser.am_on_page("/frame")?;
    assert!(matches!(
        browser.switch_to_iframe("sidebar"),
        Err(Error::ElementNotFound { .. })
    ));
    Ok(())
}

#[test]
fn ajax_requests_leave_the_page_and_history_alone() -> Result<()> {
    let mut browser = browser()?;
    browser.am_on_page("/")?;
    browser.send_ajax_get_request("/ajax", Params::new())?;
    assert_eq!(browser.grab_page_source()?, "XMLHttpRequest");
    assert_eq!(browser.client().history().len(), 1);
    browser.see_current_url_equals("/")?;
    browser.see("Welcome")?;
    Ok(())
}

#[test]
fn raw_requests_return_the_body() -> Result<()> {
    let mut browser = browser()?;
    let body = browser.request(
        "GET",
        "/b",
        Params::new(),
        Vec::new(),
        BTreeMap::new(),
        None,
    )?;
    assert_eq!(body, "<h1>Page b</h1>");
    Ok(())
}

#[test]
fn status_assertions_describe_codes() -> Result<()> {
    let mut browser = browser()?;
    browser.am_on_page("/missing")?;
    browser.see_page_not_found()?;
    browser.see_response_code_is_client_error()?;
    browser.dont_see_response_code_is(200)?;
    assert_eq!(browser.grab_response_code()?, 404);
    assert_eq!(
        browser.see_response_code_is(200),
        Err(Error::AssertionFailed(
            "Expected HTTP Status Code: 200 (OK). Actual Status Code: 404 (Not Found)".into()
        ))
    );
    assert!(browser.see_response_code_is_server_error().is_err());
    Ok(())
}

#[test]
fn actions_before_the_first_page_are_usage_errors() -> Result<()> {
    let mut browser = browser()?;
    assert!(matches!(browser.see("anything"), Err(Error::Usage(_))));
    assert!(matches!(browser.grab_page_source(), Err(Error::Usage(_))));
    assert!(matches!(browser.click("Info"), Err(Error::Usage(_))));
    assert!(matches!(browser.move_back(1), Err(Error::Usage(_))));
    Ok(())
}

#[test]
fn debug_sections_trace_each_hop() -> Result<()> {
    let mut browser = browser()?;
    let sink = browser.record_debug();
    browser.am_on_page("/hop/1")?;
    assert_eq!(
        sink.sections("Redirecting to"),
        vec!["/hop/2", "/hop/3", "/a"]
    );
    assert_eq!(sink.sections("Response").last().map(String::as_str), Some("200"));
    assert_eq!(sink.sections("Request Headers").len(), 1);
    Ok(())
}

#[test]
fn after_test_forgets_the_session() -> Result<()> {
    let mut browser = browser()?;
    browser.have_http_header("X-Custom-Id", "7");
    browser.am_on_page("/a")?;
    browser.after_test();
    assert!(matches!(browser.see("Page"), Err(Error::Usage(_))));
    assert!(browser.client().history().is_empty());

    browser.am_on_page("/headers")?;
    browser.see_in("none", "#h")?;
    Ok(())
}

#[test]
fn requests_carry_content_type_and_request_time() -> Result<()> {
    let mut browser = browser()?;
    browser.have_http_header("content_type", "application/json");
    browser.have_http_header("X-Custom-Id", "7");
    browser.am_on_page("/headers")?;

    let server = browser
        .client()
        .internal_request()
        .map(|request| request.server.clone())
        .unwrap_or_default();
    assert_eq!(server.get("HTTP_CONTENT_TYPE").map(String::as_str), Some("application/json"));
    assert_eq!(server.get("CONTENT_TYPE").map(String::as_str), Some("application/json"));
    assert_eq!(server.get("HTTP_X_CUSTOM_ID").map(String::as_str), Some("7"));
    assert!(!server.contains_key("X_CUSTOM_ID"));

    let stamped = server
        .get("REQUEST_TIME")
        .and_then(|raw| raw.parse::<i64>().ok())
        .unwrap_or_default();
    assert!(stamped > 1_600_000_000, "REQUEST_TIME: {:?}", server.get("REQUEST_TIME"));
    let precise = server
        .get("REQUEST_TIME_FLOAT")
        .and_then(|raw| raw.parse::<f64>().ok())
        .unwrap_or_default();
    assert!((precise - stamped as f64).abs() < 2.0);

    browser.delete_header("Content-Type");
    browser.am_on_page("/headers")?;
    let server = browser
        .client()
        .internal_request()
        .map(|request| request.server.clone())
        .unwrap_or_default();
    assert!(!server.contains_key("CONTENT_TYPE"));
    assert!(!server.contains_key("HTTP_CONTENT_TYPE"));
    Ok(())
}
