use super::*;
use unicode_normalization::UnicodeNormalization;

/// XPath `normalize-space()`: trims and collapses runs of whitespace to one space.
pub(crate) fn normalize_space(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn nfc(value: &str) -> String {
    value.nfc().collect()
}

/// Case-insensitive containment on NFC-normalized text.
pub(crate) fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    nfc(haystack)
        .to_lowercase()
        .contains(&nfc(needle).to_lowercase())
}

/// Whole-page text the way a reader sees it: script and style bodies dropped, tags
/// removed, entities decoded, whitespace collapsed.
pub(crate) fn page_text(dom: &Dom) -> String {
    let mut out = String::new();
    let mut stack = vec![dom.root];
    while let Some(node) = stack.pop() {
        match &dom.nodes[node.0].node_type {
            NodeType::Text(text) => {
                out.push_str(text);
            }
            NodeType::Element(element)
                if matches!(element.tag_name.as_str(), "script" | "style") => {}
            NodeType::Element(element) => {
                if is_block_boundary(&element.tag_name) {
                    out.push(' ');
                }
                for child in dom.children(node).iter().rev() {
                    stack.push(*child);
                }
            }
            NodeType::Document => {
                for child in dom.children(node).iter().rev() {
                    stack.push(*child);
                }
            }
        }
    }
    normalize_space(&out)
}

fn is_block_boundary(tag: &str) -> bool {
    matches!(tag, "br" | "p" | "div" | "li" | "tr" | "td" | "th" | "h1" | "h2" | "h3")
}

/// Parses a delimited pattern such as `/user\/(\d+)/i` or `~^/$~`. Returns `Ok(None)`
/// when `source` is not written in that form, so callers can treat it as a locator.
pub(crate) fn delimited_regex(source: &str) -> Result<Option<fancy_regex::Regex>> {
    let mut chars = source.char_indices();
    let Some((_, delimiter)) = chars.next() else {
        return Ok(None);
    };
    if delimiter.is_alphanumeric() || delimiter.is_whitespace() || delimiter == '\\' {
        return Ok(None);
    }

    let mut escaped = false;
    let mut end = None;
    for (index, ch) in chars {
        match ch {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            _ if ch == delimiter => {
                end = Some(index);
                break;
            }
            _ => {}
        }
    }
    let Some(end) = end else {
        return Ok(None);
    };

    let body = &source[delimiter.len_utf8()..end];
    let mut flags = String::new();
    for flag in source[end + delimiter.len_utf8()..].chars() {
        match flag {
            'i' | 'm' | 's' | 'x' => flags.push(flag),
            'u' => {}
            _ => return Ok(None),
        }
    }
    let pattern = if flags.is_empty() {
        body.to_string()
    } else {
        format!("(?{flags}){body}")
    };
    Ok(Some(fancy_regex::Regex::new(&pattern)?))
}

/// A user regular expression, delimited or bare.
pub(crate) fn user_regex(source: &str) -> Result<fancy_regex::Regex> {
    match delimited_regex(source)? {
        Some(regex) => Ok(regex),
        None => Ok(fancy_regex::Regex::new(source)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_text_skips_scripts_and_collapses_whitespace() -> Result<()> {
        let dom = parse_html(
            "<html><head><script>var hidden = 1;</script></head>\n<body><h1>Hello</h1>\n  <p>World &amp;   friends</p></body></html>",
        )?;
        assert_eq!(page_text(&dom), "Hello World & friends");
        Ok(())
    }

    #[test]
    fn containment_ignores_case_and_composition() {
        assert!(contains_ignore_case("Caf\u{0065}\u{0301} au lait", "CAFÉ"));
        assert!(!contains_ignore_case("tea", "coffee"));
    }

    #[test]
    fn delimited_patterns_are_told_apart_from_locators() -> Result<()> {
        let regex = delimited_regex(r"~/user/(\d+)~i")?;
        let captures = regex
            .as_ref()
            .map(|regex| regex.captures("/USER/42"))
            .transpose()?
            .flatten();
        assert_eq!(
            captures.and_then(|caps| caps.get(1)).map(|m| m.as_str()),
            Some("42")
        );
        assert!(delimited_regex("h1")?.is_none());
        assert!(delimited_regex("//h1")?.is_none());
        assert!(delimited_regex("#main")?.is_none());
        assert!(delimited_regex("/a(/").is_err());
        Ok(())
    }
}
