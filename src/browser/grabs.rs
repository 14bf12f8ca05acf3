use super::*;

impl<T: Transport> InnerBrowser<T> {
    /// Text of the first element matching a CSS or XPath locator.
    ///
    /// A delimited pattern such as `/<p>(.*?)<\/p>/` is matched against the page source
    /// first; its first capture group (or the whole match) is returned.
    pub fn grab_text_from(&self, locator: impl Into<Locator>) -> Result<String> {
        let locator = locator.into();
        if let Locator::Raw(raw) = &locator {
            // An unparsable pattern is tried as a locator instead.
            if let Some(regex) = text::delimited_regex(raw).unwrap_or(None) {
                if let Some(captures) = regex.captures(&self.response()?.content)? {
                    let grabbed = captures.get(1).or_else(|| captures.get(0));
                    return Ok(grabbed.map(|m| m.as_str().to_string()).unwrap_or_default());
                }
            }
        }

        let dom = self.dom()?;
        match self.match_nodes(&locator) {
            Ok(nodes) if !nodes.is_empty() => {
                Ok(text::normalize_space(&dom.text_content(nodes[0])))
            }
            Ok(_) | Err(Error::MalformedLocator { .. }) => Err(Error::not_found(
                locator.to_string(),
                "Element that matches CSS or XPath or Regex",
            )),
            Err(err) => Err(err),
        }
    }

    /// `attribute` of the first matching element; `None` when it lacks one.
    pub fn grab_attribute_from(
        &self,
        locator: impl Into<Locator>,
        attribute: &str,
    ) -> Result<Option<String>> {
        let locator = locator.into();
        let Some(node) = self.match_nodes(&locator)?.first().copied() else {
            return Err(Error::not_found(
                locator.to_string(),
                "Element that matches CSS or XPath",
            ));
        };
        Ok(self.dom()?.attr(node, attribute).map(str::to_string))
    }

    /// Text (or `attribute`) of every matching element. Elements without the attribute
    /// contribute an empty string.
    pub fn grab_multiple(
        &self,
        locator: impl Into<Locator>,
        attribute: Option<&str>,
    ) -> Result<Vec<String>> {
        let dom = self.dom()?;
        let nodes = self.match_nodes(&locator.into())?;
        Ok(nodes
            .into_iter()
            .map(|node| match attribute {
                Some(attribute) => dom.attr(node, attribute).unwrap_or_default().to_string(),
                None => dom.text_content(node),
            })
            .collect())
    }

    /// Current value of a form field. Checkbox and radio groups yield the checked
    /// values; a multiple select yields every selected value.
    pub fn grab_value_from(&self, field: impl Into<Locator>) -> Result<FieldValue> {
        let field = field.into();
        let nodes = self.match_nodes(&field)?;
        if nodes.is_empty() {
            return Err(Error::not_found(field.to_string(), "Field"));
        }
        let dom = self.dom()?;
        field::read_value(dom, &nodes).ok_or_else(|| {
            let dumped = nodes
                .iter()
                .map(|node| dom.dump_node(*node))
                .collect::<Vec<_>>()
                .join("\n");
            Error::AssertionFailed(format!(
                "Element {dumped} is not a form field or does not contain a form field"
            ))
        })
    }

    pub fn grab_page_source(&self) -> Result<String> {
        Ok(self.response()?.content.clone())
    }

    /// Without a pattern, the current URI. With one, its first capture group.
    pub fn grab_from_current_url(&self, pattern: Option<&str>) -> Result<String> {
        let current = self.current_uri()?;
        let Some(pattern) = pattern.filter(|pattern| !pattern.is_empty()) else {
            return Ok(current);
        };
        let Some(captures) = text::user_regex(pattern)?.captures(&current)? else {
            return Err(Error::AssertionFailed(format!(
                "Couldn't match {pattern} in {current}"
            )));
        };
        captures
            .get(1)
            .map(|group| group.as_str().to_string())
            .ok_or_else(|| {
                Error::AssertionFailed(
                    "Nothing to grab. A regex parameter required. Ex: '/user/(\\d+)'".into(),
                )
            })
    }
}
