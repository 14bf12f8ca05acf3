use super::*;
use form::{FormField, owning_form};
use locator::filter_xpath;

impl<T: Transport> InnerBrowser<T> {
    /// Submits the form `selector` matches with its current values overlaid by
    /// `params`. `button` names a submit button of the form whose value is sent too.
    ///
    /// A `true`/`false` param for a checkbox stands for its value / its absence.
    pub fn submit_form(
        &mut self,
        selector: impl Into<Locator>,
        params: Params,
        button: Option<&str>,
    ) -> Result<()> {
        let selector = selector.into();
        let (form, button) = {
            let dom = self.dom()?;
            let Some(form) = match_locator(dom, &[dom.root], &selector)?.first().copied() else {
                return Err(Error::not_found(selector.to_string(), "Form"));
            };
            let button = match button.filter(|name| !name.is_empty()) {
                Some(name) => filter_xpath(
                    dom,
                    &[form],
                    &format!(
                        "//*[not(@disabled) and @type=\"submit\" and @name={}]",
                        xpath::literal(name)
                    ),
                )?
                .first()
                .copied(),
                None => None,
            };
            (owning_form(dom, form)?, button)
        };
        self.proceed_submit_form(form, params, button)
    }

    pub(super) fn proceed_submit_form(
        &mut self,
        form: NodeId,
        params: Params,
        button: Option<NodeId>,
    ) -> Result<()> {
        let (method, action, files, mut request_params) = {
            let model = self.form_model(form)?;
            let mut merged = model.default_values()?;
            merged.merge(params);
            let resolved = model.resolve_checkbox_flags(merged)?;
            (
                model.method.clone(),
                model.action.clone(),
                model.files(),
                resolved,
            )
        };

        let mut url = action;
        if let Some(button) = button {
            let dom = self.dom()?;
            let name = dom.attr(button, "name").unwrap_or_default().to_string();
            let value = dom.attr(button, "value").unwrap_or_default().to_string();
            let formaction = dom
                .attr(button, "formaction")
                .filter(|formaction| !formaction.is_empty())
                .map(str::to_string);
            if !name.is_empty() {
                request_params.set(name, value);
            }
            if let Some(formaction) = formaction {
                url = join_url(self.base_url()?, &formaction)?;
            }
        }

        let pairs = request_params.to_pairs();
        if method == "GET" {
            let mut parsed = url::Url::parse(&url)
                .map_err(|err| Error::InvalidArgument(format!("cannot parse URL {url}: {err}")))?;
            parsed.set_query(None);
            if !pairs.is_empty() {
                parsed.query_pairs_mut().extend_pairs(&pairs);
            }
            url = parsed.to_string();
        }
        let url = strip_fragment(&url).to_string();

        self.section("Uri", &url);
        self.section("Method", &method);
        let listed = pairs
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("\n");
        self.section("Parameters", &listed);

        self.load_pairs(&method, &url, pairs, files, BTreeMap::new(), None)
    }

    /// Types `value` into a text field or textarea found by label, name, CSS or XPath.
    /// The live page is updated too, so a later read sees the value.
    pub fn fill_field(&mut self, field: impl Into<Locator>, value: &str) -> Result<()> {
        let input = self.field(&field.into())?;
        self.form_field(input)?.set_value(value)?;
        field::mirror_value(self.dom_mut()?, input, value);
        Ok(())
    }

    /// Selects options of a select, or a radio button by value.
    ///
    /// Text is looked up as option text (or radio value) and falls back to being the
    /// value itself. A list selects several options of a multiple select.
    pub fn select_option(
        &mut self,
        select: impl Into<Locator>,
        option: impl Into<OptionSpec>,
    ) -> Result<()> {
        let nodes = self.fields(&select.into())?;
        let Some(field) = nodes.first().copied() else {
            return Ok(());
        };
        // Fails on unreachable fields before the live page is touched.
        self.form_field(field)?;
        let values = match option.into() {
            OptionSpec::Value(value) => {
                self.mark_option_value(field, &value)?;
                vec![value]
            }
            OptionSpec::Text(text) => vec![self.match_option(&nodes, &text)?],
            OptionSpec::Many(items) => items
                .iter()
                .map(|item| self.match_option(&nodes, item))
                .collect::<Result<Vec<_>>>()?,
        };
        tracing::trace!(target: "inner_browser", ?values, "selecting options");
        self.form_field(field)?.select(&values)
    }

    pub fn check_option(&mut self, option: impl Into<Locator>) -> Result<()> {
        self.proceed_check_option(option.into(), true)
    }

    pub fn uncheck_option(&mut self, option: impl Into<Locator>) -> Result<()> {
        self.proceed_check_option(option.into(), false)
    }

    fn proceed_check_option(&mut self, option: Locator, on: bool) -> Result<()> {
        let field = self.field(&option)?;
        let radio_value = self
            .dom()?
            .attr(field, "value")
            .unwrap_or("on")
            .to_string();
        self.form_field(field)?.check(on, Some(&radio_value))?;

        let dom = self.dom_mut()?;
        if on {
            if dom.attr(field, "type").is_some_and(|kind| kind.eq_ignore_ascii_case("radio")) {
                uncheck_radio_group(dom, field);
            }
            dom.set_attr(field, "checked", "checked");
        } else {
            dom.remove_attr(field, "checked");
        }
        Ok(())
    }

    /// Stages `file_name` (relative to the configured data directory) for upload
    /// through a file input.
    pub fn attach_file(&mut self, field: impl Into<Locator>, file_name: &str) -> Result<()> {
        let input = self.field(&field.into())?;
        let path = self.config.data_dir.join(file_name);
        if !path.exists() {
            return Err(Error::InvalidArgument(format!(
                "File does not exist: {}",
                path.display()
            )));
        }
        let metadata = std::fs::File::open(&path)
            .and_then(|file| file.metadata())
            .map_err(|_| {
                Error::InvalidArgument(format!("File is not readable: {}", path.display()))
            })?;

        let name = self.dom()?.attr(input, "name").unwrap_or_default().to_string();
        if name.ends_with("[]") {
            return Err(Error::Usage(format!(
                "Field {name} is ignored on upload, field {name} is treated as array."
            )));
        }
        let upload = UploadedFile {
            name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            size: metadata.len(),
            path,
        };
        self.form_field(input)?.upload(upload)
    }

    /// The model field built from live node `node`, building the form model on first
    /// use.
    fn form_field(&mut self, node: NodeId) -> Result<&mut FormField> {
        let form = owning_form(self.dom()?, node)?;
        let name = self.dom()?.attr(node, "name").unwrap_or_default().to_string();
        let model = self.form_model(form)?;
        let index = model
            .field_for_node(node)
            .or_else(|| model.field_by_name(&name))
            .ok_or_else(|| Error::InvalidArgument(format!("Unreachable field \"{name}\"")))?;
        Ok(&mut model.fields[index])
    }

    /// Looks an option up by text (or a radio by value) among `fields`, marks it
    /// selected on the live page and returns its value.
    fn match_option(&mut self, fields: &[NodeId], text: &str) -> Result<String> {
        let literal = xpath::literal(text);
        let found = {
            let dom = self.dom()?;
            filter_xpath(
                dom,
                fields,
                &format!(
                    "descendant-or-self::option[text()=normalize-space({literal})] \
                     | descendant-or-self::input[@type=\"radio\" and @value=normalize-space({literal})]"
                ),
            )?
            .first()
            .copied()
        };
        let Some(found) = found else {
            return Ok(text.to_string());
        };

        let dom = self.dom_mut()?;
        if dom.is_tag(found, "option") {
            select_live_option(dom, found);
        } else {
            uncheck_radio_group(dom, found);
            dom.set_attr(found, "checked", "checked");
        }
        Ok(dom
            .attr(found, "value")
            .map(str::to_string)
            .unwrap_or_else(|| dom.text_content(found)))
    }

    fn mark_option_value(&mut self, field: NodeId, value: &str) -> Result<()> {
        let dom = self.dom_mut()?;
        let mut options = Vec::new();
        dom.collect_elements_dfs(field, &mut options);
        if let Some(option) = options
            .into_iter()
            .find(|node| dom.is_tag(*node, "option") && field::option_value(dom, *node) == value)
        {
            select_live_option(dom, option);
        }
        Ok(())
    }
}

/// Marks `option` selected; in a single select the other options lose the mark.
fn select_live_option(dom: &mut Dom, option: NodeId) {
    let select = dom.find_ancestor_by_tag(option, "select");
    if let Some(select) = select.filter(|select| !dom.has_attr(*select, "multiple")) {
        let mut options = Vec::new();
        dom.collect_elements_descendants_dfs(select, &mut options);
        for other in options {
            if dom.is_tag(other, "option") {
                dom.remove_attr(other, "selected");
            }
        }
    }
    dom.set_attr(option, "selected", "selected");
}

fn uncheck_radio_group(dom: &mut Dom, radio: NodeId) {
    let Some(name) = dom.attr(radio, "name").map(str::to_string) else {
        return;
    };
    let scope = dom.find_ancestor_by_tag(radio, "form").unwrap_or(dom.root);
    let selector = format!("input[type=radio][name={}]", locator::css_string(&name));
    let group = if scope == dom.root {
        dom.query_selector_all(&selector)
    } else {
        dom.query_selector_all_from(&scope, &selector)
    };
    for other in group.unwrap_or_default() {
        dom.remove_attr(other, "checked");
    }
}
