//! Failure messages for the `see`/`dont_see` family.

use super::*;

const NODE_LIST_LIMIT: usize = 10;

fn uri_message(uri: Option<&str>) -> String {
    match uri {
        Some(uri) if !uri.is_empty() => format!("on page {uri}"),
        _ => String::new(),
    }
}

/// Whether any node's text contains `needle`; an empty needle only needs a node.
pub(crate) fn any_node_contains(dom: &Dom, nodes: &[NodeId], needle: &str) -> bool {
    if nodes.is_empty() {
        return false;
    }
    needle.is_empty()
        || nodes
            .iter()
            .any(|node| text::contains_ignore_case(&dom.text_content(*node), needle))
}

/// Checks that some node contains `needle`.
pub(crate) fn assert_dom_contains(
    dom: &Dom,
    nodes: &[NodeId],
    selector: &str,
    needle: &str,
    uri: Option<&str>,
) -> Result<()> {
    if any_node_contains(dom, nodes, needle) {
        return Ok(());
    }
    if nodes.is_empty() {
        return Err(Error::not_found(
            selector,
            "Element located either by name, CSS or XPath",
        ));
    }

    let mut output = format!(
        "Failed asserting that any element by '{selector}' {}",
        uri_message(uri)
    );
    if nodes.len() < NODE_LIST_LIMIT {
        for node in nodes {
            output.push_str("\n+ ");
            output.push_str(&dom.dump_node(*node));
        }
    } else {
        output = format!("{} [total {} elements]", output.trim_end(), nodes.len());
    }
    output.push_str(&format!("\ncontains text '{needle}'"));
    Err(Error::AssertionFailed(output))
}

/// Checks that no node contains `needle`.
pub(crate) fn assert_dom_not_contains(
    dom: &Dom,
    nodes: &[NodeId],
    selector: &str,
    needle: &str,
    uri: Option<&str>,
) -> Result<()> {
    if !any_node_contains(dom, nodes, needle) {
        return Ok(());
    }
    if needle.is_empty() {
        return Err(Error::AssertionFailed(format!(
            "Element '{selector}' was found"
        )));
    }

    let mut output = format!("There was '{selector}' element {}", uri_message(uri));
    for node in nodes {
        if text::contains_ignore_case(&dom.text_content(*node), needle) {
            output.push_str("\n+ ");
            output.push_str(&dom.dump_node(*node));
        }
    }
    output.push_str(&format!("\ncontaining '{needle}'"));
    Err(Error::AssertionFailed(output))
}

/// Whole-page containment, case-insensitive on normalized text.
pub(crate) fn assert_page_contains(
    haystack: &str,
    needle: &str,
    uri: Option<&str>,
    expected: bool,
) -> Result<()> {
    if text::contains_ignore_case(haystack, needle) == expected {
        return Ok(());
    }
    let verb = if expected { "contains" } else { "does not contain" };
    Err(Error::AssertionFailed(format!(
        "Failed asserting that {}\n--> {}\n--> {verb} \"{needle}\".",
        uri_message(uri),
        excerpt(haystack)
    )))
}

fn excerpt(haystack: &str) -> String {
    const LIMIT: usize = 500;
    if haystack.chars().count() <= LIMIT {
        return haystack.to_string();
    }
    let cut = haystack.chars().take(LIMIT).collect::<String>();
    format!("{cut}\n[Content too long to display. See complete response in output directory]")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraphs(html: &str) -> Result<(Dom, Vec<NodeId>)> {
        let dom = parse_html(html)?;
        let nodes = dom.query_selector_all("p")?;
        Ok((dom, nodes))
    }

    #[test]
    fn contains_lists_every_node_when_few() -> Result<()> {
        let (dom, nodes) = paragraphs("<p>Bye world</p><p>Bye warcraft</p>")?;
        let err = assert_dom_contains(&dom, &nodes, "selector", "hello", Some("/user"))
            .err()
            .map(|err| err.to_string())
            .unwrap_or_default();
        assert!(err.contains("Failed asserting that any element by 'selector' on page /user"));
        assert!(err.contains("+ <p>Bye world</p>"));
        assert!(err.contains("+ <p>Bye warcraft</p>"));
        assert!(err.ends_with("contains text 'hello'"));
        Ok(())
    }

    #[test]
    fn contains_summarizes_many_nodes() -> Result<()> {
        let html = (0..15).map(|i| format!("<p>item {i}</p>")).collect::<String>();
        let (dom, nodes) = paragraphs(&html)?;
        let err = assert_dom_contains(&dom, &nodes, "selector", "hello", Some("/user"))
            .err()
            .map(|err| err.to_string())
            .unwrap_or_default();
        assert!(err.contains("Failed asserting that any element by 'selector' on page /user"));
        assert!(!err.contains("+ <p>item 0</p>"));
        assert!(err.contains("[total 15 elements]"));
        Ok(())
    }

    #[test]
    fn contains_without_uri_omits_page() -> Result<()> {
        let (dom, nodes) = paragraphs("<p>Bye world</p>")?;
        let err = assert_dom_contains(&dom, &nodes, "selector", "hello", None)
            .err()
            .map(|err| err.to_string())
            .unwrap_or_default();
        assert!(err.contains("Failed asserting that any element by 'selector'"));
        assert!(!err.contains("on page"));
        assert!(assert_dom_contains(&dom, &nodes, "selector", "WORLD", None).is_ok());
        Ok(())
    }

    #[test]
    fn zero_nodes_is_element_not_found() -> Result<()> {
        let dom = parse_html("<div></div>")?;
        let err = assert_dom_contains(&dom, &[], "p.missing", "", None);
        assert!(matches!(err, Err(Error::ElementNotFound { .. })));
        assert!(assert_dom_not_contains(&dom, &[], "p.missing", "", None).is_ok());
        Ok(())
    }

    #[test]
    fn not_contains_lists_only_matching_nodes() -> Result<()> {
        let (dom, nodes) = paragraphs("<p>Bye world</p><p>Bye warcraft</p>")?;
        let err = assert_dom_not_contains(&dom, &nodes, "selector", "warcraft", Some("/user"))
            .err()
            .map(|err| err.to_string())
            .unwrap_or_default();
        assert!(err.contains("There was 'selector' element on page /user"));
        assert!(!err.contains("+ <p>Bye world</p>"));
        assert!(err.contains("+ <p>Bye warcraft</p>"));
        Ok(())
    }
}
