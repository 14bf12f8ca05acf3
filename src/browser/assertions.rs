use super::*;
use click::select_link;
use locator::{filter_css, filter_xpath, json_string};

impl<T: Transport> InnerBrowser<T> {
    /// Checks the page text (tags and scripts stripped, whitespace collapsed) contains
    /// `text`, ignoring case.
    pub fn see(&self, text: &str) -> Result<()> {
        let haystack = text::page_text(self.dom()?);
        constraint::assert_page_contains(&haystack, text, self.uri_for_message().as_deref(), true)
    }

    pub fn dont_see(&self, text: &str) -> Result<()> {
        let haystack = text::page_text(self.dom()?);
        constraint::assert_page_contains(&haystack, text, self.uri_for_message().as_deref(), false)
    }

    /// Checks some element matched by `selector` contains `text`. An empty `text` only
    /// requires a match.
    pub fn see_in(&self, text: &str, selector: impl Into<Locator>) -> Result<()> {
        let selector = selector.into();
        let nodes = self.match_nodes(&selector)?;
        constraint::assert_dom_contains(
            self.dom()?,
            &nodes,
            &selector.to_string(),
            text,
            self.uri_for_message().as_deref(),
        )
    }

    pub fn dont_see_in(&self, text: &str, selector: impl Into<Locator>) -> Result<()> {
        let selector = selector.into();
        let nodes = self.match_nodes(&selector)?;
        constraint::assert_dom_not_contains(
            self.dom()?,
            &nodes,
            &selector.to_string(),
            text,
            self.uri_for_message().as_deref(),
        )
    }

    /// Raw source containment, markup included.
    pub fn see_in_source(&self, raw: &str) -> Result<()> {
        let content = &self.response()?.content;
        constraint::assert_page_contains(content, raw, self.uri_for_message().as_deref(), true)
    }

    pub fn dont_see_in_source(&self, raw: &str) -> Result<()> {
        let content = &self.response()?.content;
        constraint::assert_page_contains(content, raw, self.uri_for_message().as_deref(), false)
    }

    /// Checks a link containing `text` exists and, when `url` is given, that one of
    /// those links has an `href` ending in `url`.
    pub fn see_link(&self, text: &str, url: Option<&str>) -> Result<()> {
        let dom = self.dom()?;
        let links = select_link(dom, &[dom.root], text)?;
        let page = self.uri_for_message().unwrap_or_default();
        if links.is_empty() {
            return Err(Error::AssertionFailed(format!(
                "No links containing text '{text}' were found in page {page}"
            )));
        }
        if let Some(url) = url.filter(|url| !url.is_empty()) {
            if !links.iter().any(|link| href_ends_with(dom, *link, url)) {
                return Err(Error::AssertionFailed(format!(
                    "No links containing text '{text}' and URL '{url}' were found in page {page}"
                )));
            }
        }
        Ok(())
    }

    pub fn dont_see_link(&self, text: &str, url: Option<&str>) -> Result<()> {
        let dom = self.dom()?;
        let links = select_link(dom, &[dom.root], text)?;
        let page = self.uri_for_message().unwrap_or_default();
        let url = url.unwrap_or_default();
        if url.is_empty() && !links.is_empty() {
            return Err(Error::AssertionFailed(format!(
                "Link containing text '{text}' was found in page {page}"
            )));
        }
        if links.iter().any(|link| href_ends_with(dom, *link, url)) {
            return Err(Error::AssertionFailed(format!(
                "Link containing text '{text}' and URL '{url}' was found in page {page}"
            )));
        }
        Ok(())
    }

    pub fn see_in_current_url(&self, uri: &str) -> Result<()> {
        let current = self.current_uri()?;
        if current.contains(uri) {
            return Ok(());
        }
        Err(Error::AssertionFailed(format!(
            "Failed asserting that '{current}' contains \"{uri}\"."
        )))
    }

    pub fn dont_see_in_current_url(&self, uri: &str) -> Result<()> {
        let current = self.current_uri()?;
        if !current.contains(uri) {
            return Ok(());
        }
        Err(Error::AssertionFailed(format!(
            "Failed asserting that '{current}' does not contain \"{uri}\"."
        )))
    }

    /// Compares path, query and fragment of the current page; trailing slashes are
    /// ignored on both sides.
    pub fn see_current_url_equals(&self, uri: &str) -> Result<()> {
        let current = self.current_uri()?;
        if current.trim_end_matches('/') == uri.trim_end_matches('/') {
            return Ok(());
        }
        Err(Error::AssertionFailed(format!(
            "Failed asserting that '{current}' is identical to '{uri}'."
        )))
    }

    pub fn dont_see_current_url_equals(&self, uri: &str) -> Result<()> {
        let current = self.current_uri()?;
        if current.trim_end_matches('/') != uri.trim_end_matches('/') {
            return Ok(());
        }
        Err(Error::AssertionFailed(format!(
            "Failed asserting that '{current}' is not identical to '{uri}'."
        )))
    }

    /// `pattern` may be delimited (`~^/users/\d+$~i`) or bare.
    pub fn see_current_url_matches(&self, pattern: &str) -> Result<()> {
        let current = self.current_uri()?;
        if text::user_regex(pattern)?.is_match(&current)? {
            return Ok(());
        }
        Err(Error::AssertionFailed(format!(
            "Failed asserting that '{current}' matches pattern \"{pattern}\"."
        )))
    }

    pub fn dont_see_current_url_matches(&self, pattern: &str) -> Result<()> {
        let current = self.current_uri()?;
        if !text::user_regex(pattern)?.is_match(&current)? {
            return Ok(());
        }
        Err(Error::AssertionFailed(format!(
            "Failed asserting that '{current}' does not match pattern \"{pattern}\"."
        )))
    }

    pub fn see_checkbox_is_checked(&self, checkbox: impl Into<Locator>) -> Result<()> {
        let checkbox = checkbox.into();
        if self.checked_count(&checkbox)? > 0 {
            return Ok(());
        }
        Err(Error::AssertionFailed(format!(
            "Failed asserting that checkbox '{checkbox}' is checked."
        )))
    }

    pub fn dont_see_checkbox_is_checked(&self, checkbox: impl Into<Locator>) -> Result<()> {
        let checkbox = checkbox.into();
        if self.checked_count(&checkbox)? == 0 {
            return Ok(());
        }
        Err(Error::AssertionFailed(format!(
            "Failed asserting that checkbox '{checkbox}' is not checked."
        )))
    }

    fn checked_count(&self, checkbox: &Locator) -> Result<usize> {
        let nodes = self.fields(checkbox)?;
        Ok(filter_css(self.dom()?, &nodes, "input[checked]")?.len())
    }

    /// Checks the field's value. Selects match on option value or text; checkboxes and
    /// radios on the checked values; `true`/`false` test whether anything is checked.
    pub fn see_in_field(
        &self,
        field: impl Into<Locator>,
        expected: impl Into<FieldExpectation>,
    ) -> Result<()> {
        let nodes = self.fields(&field.into())?;
        self.assert_in_field(&nodes, &expected.into(), true)
    }

    pub fn dont_see_in_field(
        &self,
        field: impl Into<Locator>,
        expected: impl Into<FieldExpectation>,
    ) -> Result<()> {
        let nodes = self.fields(&field.into())?;
        self.assert_in_field(&nodes, &expected.into(), false)
    }

    /// Checks several fields of one form at once. A name with no matching field but a
    /// list or map expectation is looked up as `name[index]` / `name[key]`.
    pub fn see_in_form_fields<K, V>(
        &self,
        form: impl Into<Locator>,
        fields: impl IntoIterator<Item = (K, V)>,
    ) -> Result<()>
    where
        K: Into<String>,
        V: Into<FieldExpectation>,
    {
        self.proceed_see_in_form_fields(form.into(), collect_expectations(fields), true)
    }

    pub fn dont_see_in_form_fields<K, V>(
        &self,
        form: impl Into<Locator>,
        fields: impl IntoIterator<Item = (K, V)>,
    ) -> Result<()>
    where
        K: Into<String>,
        V: Into<FieldExpectation>,
    {
        self.proceed_see_in_form_fields(form.into(), collect_expectations(fields), false)
    }

    fn proceed_see_in_form_fields(
        &self,
        form: Locator,
        fields: Vec<(String, FieldExpectation)>,
        expected: bool,
    ) -> Result<()> {
        let dom = self.dom()?;
        let Some(form) = self.match_nodes(&form)?.first().copied() else {
            return Err(Error::not_found(form.to_string(), "Form"));
        };

        let mut resolved = Vec::new();
        let mut pending = fields;
        pending.reverse();
        while let Some((name, expectation)) = pending.pop() {
            let literal = xpath::literal(&name);
            let nodes = filter_xpath(dom, &[form], &format!(".//*[@name={literal}]"))?;
            if !nodes.is_empty() {
                resolved.push((nodes, expectation));
                continue;
            }
            let nested = match expectation {
                FieldExpectation::List(items) => items
                    .into_iter()
                    .enumerate()
                    .map(|(index, item)| (format!("{name}[{index}]"), item))
                    .collect::<Vec<_>>(),
                FieldExpectation::Map(entries) => entries
                    .into_iter()
                    .map(|(key, item)| (format!("{name}[{key}]"), item))
                    .collect(),
                _ => return Err(Error::not_found(format!("//*[@name={literal}]"), "Form")),
            };
            pending.extend(nested.into_iter().rev());
        }

        for (nodes, expectation) in &resolved {
            self.assert_in_field(nodes, expectation, expected)?;
        }
        Ok(())
    }

    fn assert_in_field(
        &self,
        nodes: &[NodeId],
        expectation: &FieldExpectation,
        expected: bool,
    ) -> Result<()> {
        let dom = self.dom()?;
        let values = field::values_and_texts(dom, nodes).unwrap_or_default();
        let tag = nodes
            .first()
            .and_then(|node| dom.tag_name(*node))
            .unwrap_or_default();

        let mut pending = vec![expectation];
        while let Some(expectation) = pending.pop() {
            let needle = match expectation {
                FieldExpectation::Value(value) => value.clone(),
                FieldExpectation::Checked(true) => {
                    values.first().cloned().unwrap_or_else(|| "1".to_string())
                }
                FieldExpectation::Checked(false) => String::new(),
                FieldExpectation::List(items) => {
                    pending.extend(items.iter().rev());
                    continue;
                }
                FieldExpectation::Map(entries) => {
                    pending.extend(entries.iter().rev().map(|(_, item)| item));
                    continue;
                }
            };
            let haystack = if values.is_empty() {
                vec![String::new()]
            } else {
                values.clone()
            };
            if haystack.contains(&needle) != expected {
                let relation = if expected { "is" } else { "is not" };
                return Err(Error::AssertionFailed(format!(
                    "Failed asserting that `{needle}` {relation} in {tag}'s value: {haystack:?}"
                )));
            }
        }
        Ok(())
    }

    /// Checks an element matching `selector` exists.
    pub fn see_element(&self, selector: impl Into<Locator>) -> Result<()> {
        self.see_element_with(selector, &[])
    }

    /// Checks an element matching `selector` exists whose attributes equal every
    /// `(name, value)` pair.
    pub fn see_element_with(
        &self,
        selector: impl Into<Locator>,
        attributes: &[(&str, &str)],
    ) -> Result<()> {
        let (nodes, described) = self.elements_with(selector.into(), attributes)?;
        constraint::assert_dom_contains(
            self.dom()?,
            &nodes,
            &described,
            "",
            self.uri_for_message().as_deref(),
        )
    }

    pub fn dont_see_element(&self, selector: impl Into<Locator>) -> Result<()> {
        self.dont_see_element_with(selector, &[])
    }

    pub fn dont_see_element_with(
        &self,
        selector: impl Into<Locator>,
        attributes: &[(&str, &str)],
    ) -> Result<()> {
        let (nodes, described) = self.elements_with(selector.into(), attributes)?;
        constraint::assert_dom_not_contains(
            self.dom()?,
            &nodes,
            &described,
            "",
            self.uri_for_message().as_deref(),
        )
    }

    fn elements_with(
        &self,
        selector: Locator,
        attributes: &[(&str, &str)],
    ) -> Result<(Vec<NodeId>, String)> {
        let dom = self.dom()?;
        let mut nodes = self.match_nodes(&selector)?;
        let mut described = selector.to_string();
        if !attributes.is_empty() {
            nodes.retain(|node| {
                attributes
                    .iter()
                    .all(|(name, value)| dom.attr(*node, name) == Some(*value))
            });
            let listed = attributes
                .iter()
                .map(|(name, value)| format!("{}:{}", json_string(name), json_string(value)))
                .collect::<Vec<_>>()
                .join(",");
            described.push_str("' with attribute(s) '");
            described.push_str(&listed);
        }
        Ok((nodes, described))
    }

    pub fn see_number_of_elements(
        &self,
        selector: impl Into<Locator>,
        expected: impl Into<Count>,
    ) -> Result<()> {
        let counted = self.match_nodes(&selector.into())?.len();
        match expected.into() {
            Count::Exact(count) if count != counted => Err(Error::AssertionFailed(format!(
                "Number of elements counted differs from expected number\nexpected: {count}\nactual: {counted}"
            ))),
            Count::Between(floor, ceil) if counted < floor || counted > ceil => {
                Err(Error::AssertionFailed(format!(
                    "Number of elements counted differs from expected range\nexpected: {floor}..={ceil}\nactual: {counted}"
                )))
            }
            _ => Ok(()),
        }
    }

    /// Checks the selected option of a select (its text) or the checked radio of a
    /// group (its value) equals `option`.
    pub fn see_option_is_selected(&self, select: impl Into<Locator>, option: &str) -> Result<()> {
        let selected = self.selected_option(&select.into())?;
        let dom = self.dom()?;
        constraint::assert_dom_contains(
            dom,
            &selected,
            "selected option",
            "",
            self.uri_for_message().as_deref(),
        )?;
        let actual = selected
            .first()
            .map(|node| option_label(dom, *node))
            .unwrap_or_default();
        if actual == option {
            return Ok(());
        }
        Err(Error::AssertionFailed(format!(
            "Failed asserting that '{actual}' is identical to '{option}'."
        )))
    }

    pub fn dont_see_option_is_selected(
        &self,
        select: impl Into<Locator>,
        option: &str,
    ) -> Result<()> {
        let selected = self.selected_option(&select.into())?;
        let Some(first) = selected.first() else {
            return Ok(());
        };
        let actual = option_label(self.dom()?, *first);
        if actual != option {
            return Ok(());
        }
        Err(Error::AssertionFailed(format!(
            "Failed asserting that '{actual}' is not identical to '{option}'."
        )))
    }

    /// Selected options and checked radios; with none, the first option or input
    /// stands in.
    fn selected_option(&self, select: &Locator) -> Result<Vec<NodeId>> {
        let nodes = self.fields(select)?;
        let dom = self.dom()?;
        let selected = filter_css(dom, &nodes, "option[selected],input:checked")?;
        if !selected.is_empty() {
            return Ok(selected);
        }
        Ok(filter_css(dom, &nodes, "option,input")?
            .into_iter()
            .take(1)
            .collect())
    }

    pub fn see_in_title(&self, title: &str) -> Result<()> {
        let Some(actual) = self.title()? else {
            return Err(Error::not_found("<title>", "Tag"));
        };
        if actual.contains(title) {
            return Ok(());
        }
        Err(Error::AssertionFailed(format!(
            "page title contains {title}\nFailed asserting that '{actual}' contains \"{title}\"."
        )))
    }

    /// Passes when the page has no title at all.
    pub fn dont_see_in_title(&self, title: &str) -> Result<()> {
        let Some(actual) = self.title()? else {
            return Ok(());
        };
        if !actual.contains(title) {
            return Ok(());
        }
        Err(Error::AssertionFailed(format!(
            "page title contains {title}\nFailed asserting that '{actual}' does not contain \"{title}\"."
        )))
    }

    fn title(&self) -> Result<Option<String>> {
        let dom = self.dom()?;
        Ok(dom
            .query_selector_all("title")?
            .first()
            .map(|title| text::normalize_space(&dom.text_content(*title))))
    }

    /// Current URI for failure messages; absent before the first request.
    fn uri_for_message(&self) -> Option<String> {
        self.current_uri().ok()
    }
}

fn collect_expectations<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Vec<(String, FieldExpectation)>
where
    K: Into<String>,
    V: Into<FieldExpectation>,
{
    fields
        .into_iter()
        .map(|(name, expectation)| (name.into(), expectation.into()))
        .collect()
}

fn href_ends_with(dom: &Dom, link: NodeId, suffix: &str) -> bool {
    dom.attr(link, "href")
        .is_some_and(|href| href.ends_with(suffix))
}

/// Text of an option, value of a radio.
fn option_label(dom: &Dom, node: NodeId) -> String {
    if dom.is_tag(node, "option") {
        text::normalize_space(&dom.text_content(node))
    } else {
        dom.attr(node, "value").unwrap_or_default().to_string()
    }
}
