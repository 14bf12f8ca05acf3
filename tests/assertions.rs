use inner_browser::{BrowserConfig, Error, InProcessClient, InnerBrowser, Request, Response, Result};

type Site = fn(&Request) -> Response;

const CATALOG: &str = r#"<html><head><title>Catalog</title></head><body>
<nav><a href="/products?page=2">Next page</a><a href="/about" title="Who we are">About us</a>
<a href="/cart"><img src="cart.png" alt="Shopping cart"></a></nav>
<ul id="items">
  <li class="item" data-sku="A1">Apple <span class="price">1.20</span></li>
  <li class="item" data-sku="B2">Banana <span class="price">0.50</span></li>
  <li class="item sold-out" data-sku="C3">Cherry</li>
</ul>
<form id="filter" action="/products">
  <select name="sort"><option value="name">By name</option><option value="price" selected>By price</option></select>
  <input type="radio" name="view" value="grid"><input type="radio" name="view" value="list" checked>
  <input type="checkbox" name="stock" id="stock" checked>
  <input name="q" value="fruit">
</form>
<script>var hidden = "secret";</script>
</body></html>"#;

fn site(request: &Request) -> Response {
    match request.path().as_str() {
        "/products" => Response::html(CATALOG),
        "/user/42/profile" => Response::html("<h1>Profile</h1>"),
        "/plain" => Response::html("<p>no title here</p>"),
        _ => Response::new(404, "missing"),
    }
}

fn catalog() -> Result<InnerBrowser<InProcessClient<Site>>> {
    let mut browser = InnerBrowser::new(InProcessClient::new(site as Site), BrowserConfig::default())?;
    browser.am_on_page("/products")?;
    Ok(browser)
}

fn message(result: Result<()>) -> String {
    match result {
        Err(Error::AssertionFailed(message)) => message,
        other => format!("{other:?}"),
    }
}

#[test]
fn links_match_by_word_and_href_suffix() -> Result<()> {
    let browser = catalog()?;
    browser.see_link("Next page", None)?;
    browser.see_link("Next", Some("page=2"))?;
    browser.see_link("cart", Some("/cart"))?;
    browser.dont_see_link("Previous", None)?;
    browser.dont_see_link("About us", Some("/contact"))?;

    assert_eq!(
        message(browser.see_link("About us", Some("/team"))),
        "No links containing text 'About us' and URL '/team' were found in page /products"
    );
    assert_eq!(
        message(browser.dont_see_link("About", None)),
        "Link containing text 'About' was found in page /products"
    );
    Ok(())
}

#[test]
fn page_text_ignores_markup_and_scripts() -> Result<()> {
    let browser = catalog()?;
    browser.see("apple 1.20")?;
    browser.dont_see("secret")?;
    browser.see_in_source("var hidden")?;
    browser.dont_see_in_source("<table")?;
    browser.see_in("Banana", "#items")?;
    browser.dont_see_in("Cherry", "li.price")?;

    let failure = message(browser.see("Durian"));
    assert!(failure.starts_with("Failed asserting that on page /products"));
    assert!(failure.ends_with("--> contains \"Durian\"."));
    Ok(())
}

#[test]
fn missing_elements_are_not_found_rather_than_failed() -> Result<()> {
    let browser = catalog()?;
    assert_eq!(
        browser.see_in("Anything", "table"),
        Err(Error::ElementNotFound {
            locator: "table".into(),
            description: "Element located either by name, CSS or XPath".into(),
        })
    );
    Ok(())
}

#[test]
fn elements_are_filtered_by_attributes() -> Result<()> {
    let browser = catalog()?;
    browser.see_element("li.item")?;
    browser.see_element_with("li", &[("data-sku", "B2")])?;
    browser.dont_see_element_with("li", &[("data-sku", "Z9")])?;
    browser.dont_see_element("table")?;
    browser.see_number_of_elements("li.item", 3)?;
    browser.see_number_of_elements("//li[contains(@class, 'sold-out')]", 1)?;
    browser.see_number_of_elements(".price", (1, 2))?;

    assert_eq!(
        browser.see_element_with("li", &[("data-sku", "Z9")]),
        Err(Error::ElementNotFound {
            locator: r#"li' with attribute(s) '"data-sku":"Z9""#.into(),
            description: "Element located either by name, CSS or XPath".into(),
        })
    );
    assert_eq!(
        message(browser.see_number_of_elements("li.item", 2)),
        "Number of elements counted differs from expected number\nexpected: 2\nactual: 3"
    );
    Ok(())
}

#[test]
fn field_values_and_selections_are_visible() -> Result<()> {
    let browser = catalog()?;
    browser.see_in_field("sort", "By price")?;
    browser.see_in_field("sort", "price")?;
    browser.dont_see_in_field("sort", "name")?;
    browser.see_in_field("q", "fruit")?;
    browser.see_in_field("#stock", true)?;

    browser.see_option_is_selected("sort", "By price")?;
    browser.see_option_is_selected("view", "list")?;
    browser.dont_see_option_is_selected("view", "grid")?;
    browser.see_checkbox_is_checked("#stock")?;

    assert_eq!(
        message(browser.see_in_field("q", "vegetables")),
        r#"Failed asserting that `vegetables` is in input's value: ["fruit"]"#
    );
    Ok(())
}

#[test]
fn grabbers_read_text_attributes_and_sources() -> Result<()> {
    let browser = catalog()?;
    assert_eq!(browser.grab_text_from("li.item")?, "Apple 1.20");
    assert_eq!(browser.grab_text_from(r"/data-sku=.(\w\d)/")?, "A1");
    assert_eq!(
        browser.grab_attribute_from("nav a", "title")?,
        None
    );
    assert_eq!(
        browser.grab_attribute_from("//a[@title]", "title")?.as_deref(),
        Some("Who we are")
    );
    assert_eq!(
        browser.grab_multiple("li.item", Some("data-sku"))?,
        vec!["A1", "B2", "C3"]
    );
    assert_eq!(browser.grab_multiple(".price", None)?, vec!["1.20", "0.50"]);
    assert!(browser.grab_page_source()?.contains("<ul id=\"items\">"));

    assert!(matches!(
        browser.grab_text_from("table"),
        Err(Error::ElementNotFound { description, .. })
            if description == "Element that matches CSS or XPath or Regex"
    ));
    Ok(())
}

#[test]
fn url_assertions_and_grabs() -> Result<()> {
    let mut browser = catalog()?;
    browser.am_on_page("/user/42/profile")?;
    browser.see_in_current_url("/user/42")?;
    browser.dont_see_in_current_url("/admin")?;
    browser.see_current_url_equals("/user/42/profile/")?;
    browser.dont_see_current_url_equals("/user/42")?;
    browser.see_current_url_matches(r"~^/user/\d+/profile$~")?;
    browser.see_current_url_matches(r"^/user/\d+")?;
    browser.dont_see_current_url_matches(r"/admin/")?;
    assert_eq!(browser.grab_from_current_url(Some(r"~/user/(\d+)/~"))?, "42");

    assert_eq!(
        message(browser.grab_from_current_url(Some("/team/(\\d+)/")).map(|_| ())),
        "Couldn't match /team/(\\d+)/ in /user/42/profile"
    );
    assert_eq!(
        message(browser.grab_from_current_url(Some("~/user/~")).map(|_| ())),
        "Nothing to grab. A regex parameter required. Ex: '/user/(\\d+)'"
    );
    Ok(())
}

#[test]
fn titles_are_optional() -> Result<()> {
    let mut browser = catalog()?;
    browser.see_in_title("Catalog")?;
    browser.dont_see_in_title("Checkout")?;

    browser.am_on_page("/plain")?;
    browser.dont_see_in_title("Catalog")?;
    assert_eq!(
        browser.see_in_title("Catalog"),
        Err(Error::ElementNotFound {
            locator: "<title>".into(),
            description: "Tag".into(),
        })
    );
    Ok(())
}
