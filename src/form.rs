//! Submission-ready form models.
//!
//! A [`FormModel`] is built from a detached copy of a `<form>` subtree, so the quirk
//! fixes applied while building it never touch the page the caller is looking at.

use super::*;
use locator::css_string;

/// One submitted value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    Text(String),
    /// For checkboxes: `true` submits the box's own value, `false` drops it.
    Flag(bool),
    List(Vec<Param>),
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&String> for Param {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

impl From<bool> for Param {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl<T: Into<Param>> From<Vec<T>> for Param {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

/// Ordered name → value map. Setting an existing name replaces it in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(String, Param)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Param>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Param>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Param> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut Param> {
        self.entries
            .iter_mut()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn remove(&mut self, name: &str) -> Option<Param> {
        let index = self.entries.iter().position(|(key, _)| key == name)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Param)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Overlays `other`: its names win, new names are appended.
    pub(crate) fn merge(&mut self, other: Params) {
        for (name, value) in other.entries {
            self.set(name, value);
        }
    }

    /// Flattens into request pairs. List items are sent as `name[]`; a leftover flag
    /// becomes `1` or `0`.
    pub(crate) fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        let mut pending = self
            .entries
            .iter()
            .rev()
            .map(|(name, value)| (name.clone(), value))
            .collect::<Vec<_>>();
        while let Some((name, value)) = pending.pop() {
            match value {
                Param::Text(text) => pairs.push((name, text.clone())),
                Param::Flag(flag) => pairs.push((name, if *flag { "1" } else { "0" }.to_string())),
                Param::List(items) => {
                    let item_name = format!("{name}[]");
                    for item in items.iter().rev() {
                        pending.push((item_name.clone(), item));
                    }
                }
            }
        }
        pairs
    }
}

impl<K: Into<String>, V: Into<Param>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (name, value) in iter {
            params.set(name, value);
        }
        params
    }
}

/// Strips one trailing `[]` from a field name.
pub(crate) fn submission_name(name: &str) -> &str {
    name.strip_suffix("[]").unwrap_or(name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SelectOption {
    pub(crate) value: String,
    pub(crate) selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FieldKind {
    Text { input_type: String, value: String },
    Textarea { value: String },
    Checkbox { value: String, checked: bool },
    Radio { options: Vec<String>, selected: Option<String> },
    Select { multiple: bool, options: Vec<SelectOption> },
    File { upload: Option<UploadedFile> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FormField {
    pub(crate) name: String,
    pub(crate) kind: FieldKind,
    pub(crate) disabled: bool,
    /// Live-page nodes this field was built from; radios have one per button.
    pub(crate) origins: Vec<NodeId>,
}

impl FormField {
    /// Submitted value, or `None` when the field contributes nothing (unchecked box,
    /// unselected radio group, file input).
    pub(crate) fn value(&self) -> Option<Param> {
        match &self.kind {
            FieldKind::Text { value, .. } | FieldKind::Textarea { value } => {
                Some(Param::Text(value.clone()))
            }
            FieldKind::Checkbox { value, checked } => {
                checked.then(|| Param::Text(value.clone()))
            }
            FieldKind::Radio { selected, .. } => selected.clone().map(Param::Text),
            FieldKind::Select {
                multiple: true,
                options,
            } => Some(Param::List(
                options
                    .iter()
                    .filter(|option| option.selected)
                    .map(|option| Param::Text(option.value.clone()))
                    .collect(),
            )),
            FieldKind::Select {
                multiple: false,
                options,
            } => options
                .iter()
                .find(|option| option.selected)
                .or_else(|| options.first())
                .map(|option| Param::Text(option.value.clone())),
            FieldKind::File { .. } => None,
        }
    }

    fn choices(&self) -> Vec<&str> {
        match &self.kind {
            FieldKind::Checkbox { value, .. } => vec![value.as_str()],
            FieldKind::Radio { options, .. } => options.iter().map(String::as_str).collect(),
            FieldKind::Select { options, .. } => {
                options.iter().map(|option| option.value.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }

    fn cannot_take(&self, value: &str) -> Error {
        Error::InvalidArgument(format!(
            "Input \"{}\" cannot take \"{value}\" as a value (possible values: \"{}\").",
            self.name,
            self.choices().join("\", \"")
        ))
    }

    /// Sets a scalar value the way typing into the control would.
    pub(crate) fn set_value(&mut self, value: &str) -> Result<()> {
        match &mut self.kind {
            FieldKind::Text { value: current, .. } | FieldKind::Textarea { value: current } => {
                *current = value.to_string();
                Ok(())
            }
            FieldKind::File { .. } => Err(Error::Usage(format!(
                "Field {} is a file input; use attach_file.",
                self.name
            ))),
            _ => self.select(&[value.to_string()]),
        }
    }

    /// Chooses options of a select, the button of a radio group, or a checkbox by its
    /// value.
    pub(crate) fn select(&mut self, values: &[String]) -> Result<()> {
        if let Some(unknown) = values
            .iter()
            .find(|value| !self.choices().contains(&value.as_str()))
        {
            return Err(self.cannot_take(unknown));
        }
        let name = self.name.clone();
        match &mut self.kind {
            FieldKind::Select {
                multiple: true,
                options,
            } => {
                for option in options.iter_mut() {
                    option.selected = values.contains(&option.value);
                }
                Ok(())
            }
            FieldKind::Select { options, .. } => {
                let [value] = values else {
                    return Err(Error::InvalidArgument(format!(
                        "You cannot select more than one value on \"{name}\" as it is not a multiple select."
                    )));
                };
                let mut done = false;
                for option in options.iter_mut() {
                    option.selected = !done && option.value == *value;
                    done |= option.selected;
                }
                Ok(())
            }
            FieldKind::Radio { selected, .. } => {
                *selected = values.first().cloned();
                Ok(())
            }
            FieldKind::Checkbox { checked, .. } => {
                *checked = !values.is_empty();
                Ok(())
            }
            _ => Err(Error::Usage(format!("Form field {name} is not a choice field"))),
        }
    }

    /// Ticks or unticks. For a radio group `radio_value` names the button.
    pub(crate) fn check(&mut self, on: bool, radio_value: Option<&str>) -> Result<()> {
        match &mut self.kind {
            FieldKind::Checkbox { checked, .. } => {
                *checked = on;
                Ok(())
            }
            FieldKind::Radio { selected, .. } => {
                let value = radio_value.map(str::to_string);
                if on {
                    *selected = value;
                } else if *selected == value {
                    *selected = None;
                }
                Ok(())
            }
            _ => Err(Error::Usage(format!(
                "Form field {} is not a checkable",
                self.name
            ))),
        }
    }

    pub(crate) fn upload(&mut self, file: UploadedFile) -> Result<()> {
        match &mut self.kind {
            FieldKind::File { upload } => {
                *upload = Some(file);
                Ok(())
            }
            _ => Err(Error::Usage(format!(
                "Form field {} is not a file input",
                self.name
            ))),
        }
    }
}

/// A detached, mutable model of one form.
#[derive(Debug, Clone)]
pub(crate) struct FormModel {
    pub(crate) dom: Dom,
    /// Action resolved to an absolute URL.
    pub(crate) action: String,
    pub(crate) method: String,
    pub(crate) enctype: String,
    pub(crate) fields: Vec<FormField>,
}

const TRANSITIVELY_DISABLED: &str = "input:disabled:not([disabled]),\
select option:disabled,\
select optgroup:disabled option:not([disabled]),\
textarea:disabled:not([disabled]),\
select:disabled:not([disabled])";

impl FormModel {
    /// Builds the model for `form` of `page`. Controls elsewhere on the page that name
    /// this form through their `form` attribute are pulled in; controls disabled only
    /// through an ancestor are dropped.
    pub(crate) fn build(page: &Dom, form: NodeId, action: String) -> Result<Self> {
        let mut dom = Dom::new();
        let mut mapping = HashMap::new();
        let root = dom.root;
        let Some(clone) = dom.import_subtree(page, form, root, &mut mapping) else {
            return Err(Error::Usage(
                "The selected node is not a form and does not have a form ancestor.".into(),
            ));
        };

        let form_id = page
            .attr(form, "id")
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        if let Some(form_id) = &form_id {
            let quoted = css_string(form_id);
            let selector =
                format!("input[form={quoted}],select[form={quoted}],textarea[form={quoted}]");
            for field in page.query_selector_all(&selector)? {
                if !page.is_descendant_of(field, form) {
                    dom.import_subtree(page, field, clone, &mut mapping);
                }
            }
        }

        for node in dom.query_selector_all(TRANSITIVELY_DISABLED)? {
            dom.remove_node(node);
        }

        let origin_of = mapping
            .into_iter()
            .map(|(live, copy)| (copy, live))
            .collect::<HashMap<_, _>>();

        let mut model = Self {
            method: dom
                .attr(clone, "method")
                .filter(|method| !method.is_empty())
                .map(str::to_ascii_uppercase)
                .unwrap_or_else(|| "GET".to_string()),
            enctype: dom
                .attr(clone, "enctype")
                .unwrap_or("application/x-www-form-urlencoded")
                .to_string(),
            action,
            fields: Vec::new(),
            dom,
        };
        model.collect_fields(clone, form_id.as_deref(), &origin_of);
        Ok(model)
    }

    fn collect_fields(
        &mut self,
        form: NodeId,
        form_id: Option<&str>,
        origin_of: &HashMap<NodeId, NodeId>,
    ) {
        let mut elements = Vec::new();
        self.dom.collect_elements_descendants_dfs(form, &mut elements);

        for node in elements {
            let dom = &self.dom;
            let Some(tag) = dom.tag_name(node) else {
                continue;
            };
            if !matches!(tag, "input" | "select" | "textarea") {
                continue;
            }
            let Some(name) = dom.attr(node, "name").filter(|name| !name.is_empty()) else {
                continue;
            };
            if dom
                .attr(node, "form")
                .is_some_and(|owner| form_id != Some(owner))
            {
                continue;
            }
            let Some(kind) = field_kind(dom, node) else {
                continue;
            };
            let field = FormField {
                name: name.to_string(),
                kind,
                disabled: dom.has_attr(node, "disabled"),
                origins: origin_of.get(&node).copied().into_iter().collect(),
            };
            self.register(field);
        }
    }

    fn register(&mut self, field: FormField) {
        if field.name.ends_with("[]") {
            self.fields.push(field);
            return;
        }
        let Some(existing) = self.fields.iter_mut().find(|known| known.name == field.name) else {
            self.fields.push(field);
            return;
        };
        if let (
            FieldKind::Radio { options, selected },
            FieldKind::Radio {
                options: added,
                selected: added_selected,
            },
        ) = (&mut existing.kind, &field.kind)
        {
            options.extend(added.iter().cloned());
            if added_selected.is_some() {
                *selected = added_selected.clone();
            }
            existing.origins.extend(field.origins);
            return;
        }
        *existing = field;
    }

    /// Index of the field built from live node `origin`.
    pub(crate) fn field_for_node(&self, origin: NodeId) -> Option<usize> {
        self.fields
            .iter()
            .position(|field| field.origins.contains(&origin))
    }

    pub(crate) fn field_by_name(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|field| field.name == name)
            .or_else(|| {
                self.fields
                    .iter()
                    .position(|field| submission_name(&field.name) == name)
            })
    }

    /// Values a plain submit would send: file and disabled fields are skipped, a
    /// valueless field falls back to the last enabled hidden input of the same name,
    /// and `name[]` fields accumulate into a list under `name`.
    pub(crate) fn default_values(&self) -> Result<Params> {
        let mut values = Params::new();
        for field in &self.fields {
            if field.disabled || matches!(field.kind, FieldKind::File { .. }) {
                continue;
            }
            let value = match field.value() {
                Some(value) => value,
                None => match self.hidden_fallback(&field.name)? {
                    Some(value) => Param::Text(value),
                    None => continue,
                },
            };

            let name = submission_name(&field.name);
            if name.len() == field.name.len() {
                values.set(name, value);
                continue;
            }
            if !matches!(values.get(name), Some(Param::List(_))) {
                values.set(name, Param::List(Vec::new()));
            }
            if let Some(Param::List(items)) = values.get_mut(name) {
                match value {
                    Param::List(more) => items.extend(more),
                    single => items.push(single),
                }
            }
        }
        Ok(values)
    }

    fn hidden_fallback(&self, name: &str) -> Result<Option<String>> {
        let selector = format!(
            "input[type=hidden][name={}]:not([disabled])",
            css_string(name)
        );
        Ok(self
            .dom
            .query_selector_all(&selector)?
            .last()
            .and_then(|node| self.dom.attr(*node, "value"))
            .map(str::to_string))
    }

    /// Replaces checkbox booleans with the values they stand for. A scalar `true`
    /// becomes the box's value (or `on`), `false` removes the entry; in a list the
    /// Nth boolean maps to the Nth box of that name and a `false` item is spliced out.
    pub(crate) fn resolve_checkbox_flags(&self, mut params: Params) -> Result<Params> {
        let mut positions: HashMap<String, usize> = HashMap::new();
        for checkbox in self.dom.query_selector_all("input[type=checkbox]")? {
            let name = submission_name(self.dom.attr(checkbox, "name").unwrap_or_default());
            let position = positions.get(name).copied().unwrap_or(0);
            let declared = self.dom.attr(checkbox, "value").unwrap_or("on").to_string();

            match params.get_mut(name) {
                Some(Param::Flag(true)) => {
                    params.set(name, declared);
                    positions.insert(name.to_string(), position + 1);
                }
                Some(Param::Flag(false)) => {
                    params.remove(name);
                }
                Some(Param::List(items)) => match items.get(position) {
                    Some(Param::Flag(true)) => {
                        items[position] = Param::Text(declared);
                        positions.insert(name.to_string(), position + 1);
                    }
                    Some(Param::Flag(false)) => {
                        items.remove(position);
                    }
                    _ => {}
                },
                _ => {}
            }
        }
        Ok(params)
    }

    /// Staged uploads, keyed by submission name.
    pub(crate) fn files(&self) -> Vec<(String, UploadedFile)> {
        self.fields
            .iter()
            .filter(|field| !field.disabled)
            .filter_map(|field| match &field.kind {
                FieldKind::File {
                    upload: Some(upload),
                } => Some((field.name.clone(), upload.clone())),
                _ => None,
            })
            .collect()
    }
}

fn field_kind(dom: &Dom, node: NodeId) -> Option<FieldKind> {
    match dom.tag_name(node)? {
        "textarea" => Some(FieldKind::Textarea {
            value: dom.text_content(node),
        }),
        "select" => {
            let mut descendants = Vec::new();
            dom.collect_elements_descendants_dfs(node, &mut descendants);
            let options = descendants
                .into_iter()
                .filter(|candidate| dom.is_tag(*candidate, "option"))
                .map(|option| SelectOption {
                    value: dom
                        .attr(option, "value")
                        .map(str::to_string)
                        .unwrap_or_else(|| dom.text_content(option)),
                    selected: dom.has_attr(option, "selected"),
                })
                .collect();
            Some(FieldKind::Select {
                multiple: dom.has_attr(node, "multiple"),
                options,
            })
        }
        "input" => {
            let input_type = dom
                .attr(node, "type")
                .map(str::to_ascii_lowercase)
                .unwrap_or_else(|| "text".to_string());
            let value = dom.attr(node, "value");
            match input_type.as_str() {
                "submit" | "button" | "image" | "reset" => None,
                "checkbox" => Some(FieldKind::Checkbox {
                    value: value.unwrap_or("on").to_string(),
                    checked: dom.has_attr(node, "checked"),
                }),
                "radio" => {
                    let value = value.unwrap_or("on").to_string();
                    let selected = dom.has_attr(node, "checked").then(|| value.clone());
                    Some(FieldKind::Radio {
                        options: vec![value],
                        selected,
                    })
                }
                "file" => Some(FieldKind::File { upload: None }),
                _ => Some(FieldKind::Text {
                    value: value.unwrap_or_default().to_string(),
                    input_type,
                }),
            }
        }
        _ => None,
    }
}

/// The form a control submits with: its `form` attribute target, else the nearest
/// ancestor form. A form element resolves to itself.
pub(crate) fn owning_form(dom: &Dom, node: NodeId) -> Result<NodeId> {
    if dom.is_tag(node, "form") {
        return Ok(node);
    }
    if let Some(form) = dom
        .attr(node, "form")
        .filter(|id| !id.is_empty())
        .and_then(|id| dom.by_id(id))
        .filter(|form| dom.is_tag(*form, "form"))
    {
        return Ok(form);
    }
    dom.find_ancestor_by_tag(node, "form").ok_or_else(|| {
        Error::Usage("The selected node is not a form and does not have a form ancestor.".into())
    })
}

/// Cache key of a form: its `id`, else its `action`.
pub(crate) fn form_key(dom: &Dom, form: NodeId) -> String {
    dom.attr(form, "id")
        .filter(|id| !id.is_empty())
        .or_else(|| dom.attr(form, "action"))
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(html: &str) -> Result<FormModel> {
        let page = parse_html(html)?;
        let form = page
            .query_selector_all("form")?
            .first()
            .copied()
            .ok_or_else(|| Error::not_found("form", "Form"))?;
        FormModel::build(&page, form, "http://localhost/submit".into())
    }

    #[test]
    fn defaults_accumulate_bracket_names_in_document_order() -> Result<()> {
        let form = model(
            r#"<form><input name="tags[]" value="a"><input name="q" value="1">
               <input name="tags[]" value="b"><input name="q" value="2"></form>"#,
        )?;
        let values = form.default_values()?;
        assert_eq!(values.get("tags"), Some(&Param::from(vec!["a", "b"])));
        assert_eq!(values.get("q"), Some(&Param::from("2")));
        Ok(())
    }

    #[test]
    fn disabled_fieldset_and_own_disabled_fields_are_skipped() -> Result<()> {
        let form = model(
            r#"<form><fieldset disabled><input name="x" value="1"></fieldset>
               <input name="y" value="2" disabled><input name="z" value="3">
               <select name="s"><option value="a" disabled selected>A</option><option value="b">B</option></select>
               </form>"#,
        )?;
        let values = form.default_values()?;
        assert_eq!(values.get("x"), None);
        assert_eq!(values.get("y"), None);
        assert_eq!(values.get("z"), Some(&Param::from("3")));
        assert_eq!(values.get("s"), Some(&Param::from("b")));
        Ok(())
    }

    #[test]
    fn unchecked_checkbox_uses_hidden_fallback() -> Result<()> {
        let form = model(
            r#"<form><input type="hidden" name="agree" value="0">
               <input type="checkbox" name="agree" value="1">
               <input type="checkbox" name="news"></form>"#,
        )?;
        let values = form.default_values()?;
        assert_eq!(values.get("agree"), Some(&Param::from("0")));
        assert_eq!(values.get("news"), None);
        Ok(())
    }

    #[test]
    fn fields_outside_the_form_join_by_form_attribute() -> Result<()> {
        let form = model(
            r#"<form id="f"><input name="a" value="1"></form>
               <input name="b" value="2" form="f"><input name="c" value="3" form="other">"#,
        )?;
        let values = form.default_values()?;
        assert_eq!(values.len(), 2);
        assert_eq!(values.get("b"), Some(&Param::from("2")));
        Ok(())
    }

    #[test]
    fn radios_merge_and_selects_default_to_first_option() -> Result<()> {
        let mut form = model(
            r#"<form><input type="radio" name="r" value="x"><input type="radio" name="r" value="y" checked>
               <select name="s"><option>One</option><option value="2">Two</option></select>
               <select name="m[]" multiple><option value="a" selected>A</option><option value="b" selected>B</option></select>
               <input type="submit" name="go" value="Go"></form>"#,
        )?;
        assert_eq!(form.fields.len(), 3);
        let values = form.default_values()?;
        assert_eq!(values.get("r"), Some(&Param::from("y")));
        assert_eq!(values.get("s"), Some(&Param::from("One")));
        assert_eq!(values.get("m"), Some(&Param::from(vec!["a", "b"])));
        assert_eq!(values.get("go"), None);

        let radio = form.field_by_name("r").ok_or_else(|| Error::not_found("r", "Field"))?;
        form.fields[radio].select(&["x".to_string()])?;
        let err = form.fields[radio].select(&["z".to_string()]);
        assert!(matches!(err, Err(Error::InvalidArgument(msg)) if msg.contains("possible values")));
        assert_eq!(form.default_values()?.get("r"), Some(&Param::from("x")));
        Ok(())
    }

    #[test]
    fn checkbox_flags_resolve_positionally() -> Result<()> {
        let form = model(
            r#"<form><input type="checkbox" name="c"><input type="checkbox" name="v" value="yes">
               <input type="checkbox" name="l[]" value="a"><input type="checkbox" name="l[]" value="b">
               <input type="checkbox" name="l[]" value="c"></form>"#,
        )?;
        let params = Params::new()
            .with("c", true)
            .with("v", false)
            .with("l", vec![Param::Flag(false), Param::Flag(true)]);
        let resolved = form.resolve_checkbox_flags(params)?;
        assert_eq!(resolved.get("c"), Some(&Param::from("on")));
        assert_eq!(resolved.get("v"), None);
        assert_eq!(resolved.get("l"), Some(&Param::from(vec!["b"])));
        Ok(())
    }

    #[test]
    fn checkbox_flags_stop_applying_when_they_run_out() -> Result<()> {
        let form = model(
            r#"<form><input type="checkbox" name="l[]" value="a"><input type="checkbox" name="l[]" value="b">
               <input type="checkbox" name="l[]" value="c"></form>"#,
        )?;
        let first_only = form.resolve_checkbox_flags(Params::new().with("l", vec![Param::Flag(true)]))?;
        assert_eq!(first_only.get("l"), Some(&Param::from(vec!["a"])));

        let on_then_off = form.resolve_checkbox_flags(
            Params::new().with("l", vec![Param::Flag(true), Param::Flag(false)]),
        )?;
        assert_eq!(on_then_off.get("l"), Some(&Param::from(vec!["a"])));
        Ok(())
    }

    #[test]
    fn pairs_flatten_lists_and_flags() {
        let params = Params::new()
            .with("q", "y")
            .with("tags", vec!["a", "b"])
            .with("flag", true);
        assert_eq!(
            params.to_pairs(),
            vec![
                ("q".to_string(), "y".to_string()),
                ("tags[]".to_string(), "a".to_string()),
                ("tags[]".to_string(), "b".to_string()),
                ("flag".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn owning_form_prefers_form_attribute() -> Result<()> {
        let page = parse_html(
            r#"<form id="a"><button form="b" id="btn">x</button><input id="in"></form><form id="b"></form>"#,
        )?;
        let button = page.by_id("btn").ok_or_else(|| Error::not_found("btn", "Button"))?;
        let input = page.by_id("in").ok_or_else(|| Error::not_found("in", "Field"))?;
        assert_eq!(page.attr(owning_form(&page, button)?, "id"), Some("b"));
        assert_eq!(page.attr(owning_form(&page, input)?, "id"), Some("a"));
        Ok(())
    }
}
