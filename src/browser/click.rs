use super::*;
use locator::strict_match;
use locator::filter_xpath;

impl<T: Transport> InnerBrowser<T> {
    /// Clicks a link or button by its text, or any element a locator points at.
    ///
    /// Plain text is tried as an exact link, then as a word within link text or image
    /// alt, then as a button label, id or name; only then as CSS or XPath.
    pub fn click(&mut self, link: impl Into<Locator>) -> Result<()> {
        let scopes = vec![self.dom()?.root];
        self.click_within(link.into(), scopes)
    }

    /// Like [`InnerBrowser::click`], searching only inside the elements `context`
    /// matches.
    pub fn click_in(&mut self, link: impl Into<Locator>, context: impl Into<Locator>) -> Result<()> {
        let scopes = self.match_nodes(&context.into())?;
        self.click_within(link.into(), scopes)
    }

    fn click_within(&mut self, link: Locator, scopes: Vec<NodeId>) -> Result<()> {
        let text = match &link {
            Locator::Strict { .. } => return self.click_by_locator(&link, &scopes),
            Locator::Raw(text) => text.clone(),
        };

        let (anchor, button) = {
            let dom = self.dom()?;
            let mut anchors = strict_match(dom, &scopes, "link", &text)?;
            if anchors.is_empty() {
                anchors = select_link(dom, &scopes, &text)?;
            }
            let button = match anchors.first() {
                Some(_) => None,
                None => select_button(dom, &scopes, &text.replace('"', "'"))?
                    .first()
                    .copied(),
            };
            (anchors.first().copied(), button)
        };

        if let Some(anchor) = anchor {
            return self.open_href(anchor);
        }
        if let Some(button) = button {
            if self.click_button(button)? {
                return Ok(());
            }
        }

        match self.click_by_locator(&link, &scopes) {
            Err(Error::MalformedLocator { .. }) => Err(Error::not_found(
                format!("name={text}"),
                format!("'{text}' is invalid CSS and XPath selector and Link or Button"),
            )),
            other => other,
        }
    }

    fn click_by_locator(&mut self, link: &Locator, scopes: &[NodeId]) -> Result<()> {
        let target = {
            let dom = self.dom()?;
            let nodes = match_locator(dom, scopes, link)?;
            if nodes.is_empty() {
                return Err(Error::not_found(
                    link.to_string(),
                    "Link or Button by name or CSS or XPath",
                ));
            }
            nodes.into_iter().find_map(|node| {
                if dom.is_tag(node, "a") {
                    return Some((node, true));
                }
                let submits = match dom.tag_name(node) {
                    Some("input") => matches!(
                        dom.attr(node, "type").map(str::to_ascii_lowercase).as_deref(),
                        Some("submit" | "image")
                    ),
                    Some("button") => matches!(
                        dom.attr(node, "type").map(str::to_ascii_lowercase).as_deref(),
                        None | Some("submit" | "image")
                    ),
                    _ => false,
                };
                submits.then_some((node, false))
            })
        };

        match target {
            Some((anchor, true)) => self.open_href(anchor),
            Some((button, false)) => self.click_button(button).map(|_| ()),
            None => {
                tracing::trace!(target: "inner_browser", locator = %link, "nothing clickable matched");
                Ok(())
            }
        }
    }

    /// Submits the button's form, or follows the link the button sits in.
    fn click_button(&mut self, button: NodeId) -> Result<bool> {
        let (form, anchor) = {
            let dom = self.dom()?;
            let form = match dom.attr(button, "form") {
                Some(id) if id.is_empty() => None,
                Some(id) => dom.by_id(id).filter(|node| dom.is_tag(*node, "form")),
                None => dom.find_ancestor_by_tag(button, "form"),
            };
            (form, dom.find_ancestor_by_tag(button, "a"))
        };

        if let Some(form) = form {
            self.proceed_submit_form(form, Params::new(), Some(button))?;
            return Ok(true);
        }
        if let Some(anchor) = anchor {
            self.open_href(anchor)?;
            return Ok(true);
        }
        Err(Error::Usage("Button is not inside a link or a form".into()))
    }

    fn open_href(&mut self, anchor: NodeId) -> Result<()> {
        let href = self.dom()?.attr(anchor, "href").unwrap_or_default().to_string();
        let target = join_url(self.base_url()?, &href)?;
        self.am_on_page(strip_fragment(&target))
    }
}

/// Links whose text, or the alt text of an image inside them, contains `text` as a
/// whole word sequence.
pub(super) fn select_link(dom: &Dom, scopes: &[NodeId], text: &str) -> Result<Vec<NodeId>> {
    let padded = xpath::literal(&format!(" {text} "));
    filter_xpath(
        dom,
        scopes,
        &format!(
            "descendant-or-self::a[contains(concat(' ', normalize-space(string(.)), ' '), {padded})] \
             | descendant-or-self::a/img[contains(concat(' ', normalize-space(string(@alt)), ' '), {padded})]/ancestor::a"
        ),
    )
}

/// Submit-like inputs by value or alt, and buttons by text or value, plus either by
/// id or name.
fn select_button(dom: &Dom, scopes: &[NodeId], text: &str) -> Result<Vec<NodeId>> {
    let padded = xpath::literal(&format!(" {text} "));
    let exact = xpath::literal(text);
    let input_type = "translate(@type, 'ABCDEFGHIJKLMNOPQRSTUVWXYZ', 'abcdefghijklmnopqrstuvwxyz')";
    filter_xpath(
        dom,
        scopes,
        &format!(
            "descendant-or-self::input[((contains({input_type}, 'submit') or contains({input_type}, 'button')) \
             and contains(concat(' ', normalize-space(string(@value)), ' '), {padded})) \
             or (contains({input_type}, 'image') and contains(concat(' ', normalize-space(string(@alt)), ' '), {padded})) \
             or @id={exact} or @name={exact}] \
             | descendant-or-self::button[contains(concat(' ', normalize-space(string(.)), ' '), {padded}) \
             or contains(concat(' ', normalize-space(string(@value)), ' '), {padded}) \
             or @id={exact} or @name={exact}]"
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_match_by_word_or_image_alt() -> Result<()> {
        let dom = parse_html(
            r#"<a href="/1">Read more about us</a><a href="/2"><img alt="Company logo"></a><a href="/3">Usable</a>"#,
        )?;
        let root = [dom.root];
        let hrefs = |nodes: Vec<NodeId>| {
            nodes
                .into_iter()
                .filter_map(|node| dom.attr(node, "href").map(str::to_string))
                .collect::<Vec<_>>()
        };
        assert_eq!(hrefs(select_link(&dom, &root, "about")?), vec!["/1"]);
        assert_eq!(hrefs(select_link(&dom, &root, "logo")?), vec!["/2"]);
        assert!(select_link(&dom, &root, "us")?.len() == 1);
        Ok(())
    }

    #[test]
    fn buttons_match_by_label_id_or_name() -> Result<()> {
        let dom = parse_html(
            r#"<form><input type="SUBMIT" value="Save draft"><input type="image" alt="Go">
               <button id="send">Send <b>now</b></button><input type="text" value="Save"></form>"#,
        )?;
        let root = [dom.root];
        assert_eq!(select_button(&dom, &root, "Save")?.len(), 1);
        assert_eq!(select_button(&dom, &root, "Go")?.len(), 1);
        assert_eq!(select_button(&dom, &root, "Send now")?.len(), 1);
        assert_eq!(select_button(&dom, &root, "send")?.len(), 1);
        assert!(select_button(&dom, &root, "Publish")?.is_empty());
        Ok(())
    }
}
