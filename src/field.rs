//! Reading field values straight from the live document.

use super::*;

/// Value of a located field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Single(String),
    /// Checked boxes of a checkbox/radio group, or selected options of a multiple select.
    Multiple(Vec<String>),
}

impl FieldValue {
    /// Every value as a list; a single value becomes a one-item list.
    pub fn values(&self) -> Vec<String> {
        match self {
            Self::Single(value) => vec![value.clone()],
            Self::Multiple(values) => values.clone(),
        }
    }

    pub fn as_single(&self) -> Option<&str> {
        match self {
            Self::Single(value) => Some(value),
            Self::Multiple(_) => None,
        }
    }
}

impl PartialEq<&str> for FieldValue {
    fn eq(&self, other: &&str) -> bool {
        self.as_single() == Some(*other)
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single(value) => f.write_str(value),
            Self::Multiple(values) => write!(f, "[{}]", values.join(", ")),
        }
    }
}

/// The kind of control a set of matched nodes stands for, picked once from the first
/// matching tag in priority order textarea, input, select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Control {
    Textarea(NodeId),
    Input(NodeId),
    Select(NodeId),
}

pub(crate) fn control_of(dom: &Dom, nodes: &[NodeId]) -> Option<Control> {
    let first = |tag: &str| nodes.iter().copied().find(|node| dom.is_tag(*node, tag));
    first("textarea")
        .map(Control::Textarea)
        .or_else(|| first("input").map(Control::Input))
        .or_else(|| first("select").map(Control::Select))
}

pub(crate) fn option_value(dom: &Dom, option: NodeId) -> String {
    dom.attr(option, "value")
        .map(str::to_string)
        .unwrap_or_else(|| dom.text_content(option))
}

fn input_type(dom: &Dom, input: NodeId) -> String {
    dom.attr(input, "type")
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "text".to_string())
}

fn is_choice_input(dom: &Dom, input: NodeId) -> bool {
    matches!(input_type(dom, input).as_str(), "checkbox" | "radio")
}

fn checked_values(dom: &Dom, nodes: &[NodeId]) -> Vec<String> {
    nodes
        .iter()
        .filter(|node| dom.is_tag(**node, "input") && dom.is_checked(**node))
        .map(|node| dom.attr(*node, "value").unwrap_or("on").to_string())
        .collect()
}

fn selected_options(dom: &Dom, nodes: &[NodeId]) -> Vec<NodeId> {
    let mut options = Vec::new();
    for node in nodes {
        let mut descendants = Vec::new();
        dom.collect_elements_dfs(*node, &mut descendants);
        options.extend(
            descendants
                .into_iter()
                .filter(|candidate| dom.is_tag(*candidate, "option"))
                .filter(|option| dom.has_attr(*option, "selected")),
        );
    }
    options
}

/// Options a select currently submits: a single select with nothing marked
/// `selected` falls back to its first option.
fn current_options(dom: &Dom, select: NodeId, nodes: &[NodeId]) -> Vec<NodeId> {
    let selected = selected_options(dom, nodes);
    if !selected.is_empty() || dom.has_attr(select, "multiple") {
        return selected;
    }
    let mut descendants = Vec::new();
    dom.collect_elements_dfs(select, &mut descendants);
    descendants
        .into_iter()
        .find(|candidate| dom.is_tag(*candidate, "option"))
        .into_iter()
        .collect()
}

/// Current value of the matched nodes. `None` when none of them is a form control.
pub(crate) fn read_value(dom: &Dom, nodes: &[NodeId]) -> Option<FieldValue> {
    Some(match control_of(dom, nodes)? {
        Control::Textarea(node) => FieldValue::Single(dom.text_content(node)),
        Control::Input(input) if is_choice_input(dom, input) => {
            FieldValue::Multiple(checked_values(dom, nodes))
        }
        Control::Input(input) => {
            FieldValue::Single(dom.attr(input, "value").unwrap_or_default().to_string())
        }
        Control::Select(select) => {
            let values = current_options(dom, select, nodes)
                .into_iter()
                .map(|option| option_value(dom, option))
                .collect::<Vec<_>>();
            if dom.has_attr(select, "multiple") {
                FieldValue::Multiple(values)
            } else {
                FieldValue::Single(values.into_iter().next().unwrap_or_default())
            }
        }
    })
}

/// Every representation a field assertion may match against. A selected option
/// contributes its value, its raw text and its trimmed text.
pub(crate) fn values_and_texts(dom: &Dom, nodes: &[NodeId]) -> Option<Vec<String>> {
    let values = match control_of(dom, nodes)? {
        Control::Select(select) => current_options(dom, select, nodes)
            .into_iter()
            .flat_map(|option| {
                let text = dom.text_content(option);
                [
                    dom.attr(option, "value").unwrap_or_default().to_string(),
                    text.trim().to_string(),
                    text,
                ]
            })
            .collect(),
        _ => read_value(dom, nodes)?.values(),
    };
    Some(values)
}

/// Writes a typed value back onto the live node so a later read sees it.
pub(crate) fn mirror_value(dom: &mut Dom, node: NodeId, value: &str) {
    dom.set_attr(node, "value", value);
    if dom.is_tag(node, "textarea") {
        dom.set_text_content(node, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(html: &str, selector: &str) -> Result<Option<FieldValue>> {
        let dom = parse_html(html)?;
        let nodes = dom.query_selector_all(selector)?;
        Ok(read_value(&dom, &nodes))
    }

    #[test]
    fn reads_follow_the_control_kind() -> Result<()> {
        assert_eq!(
            read("<textarea name=t>hello\nthere</textarea>", "textarea")?,
            Some(FieldValue::Single("hello\nthere".into()))
        );
        assert_eq!(
            read(r#"<input name="q" value="x">"#, "input")?,
            Some(FieldValue::Single("x".into()))
        );
        assert_eq!(
            read(
                r#"<input type="checkbox" name="c" value="a" checked><input type="checkbox" name="c" value="b">
                   <input type="checkbox" name="c" checked>"#,
                "input"
            )?,
            Some(FieldValue::Multiple(vec!["a".into(), "on".into()]))
        );
        assert_eq!(read("<div>text</div>", "div")?, None);
        Ok(())
    }

    #[test]
    fn selects_read_selected_options() -> Result<()> {
        assert_eq!(
            read(
                "<select name=s><option value=1>One</option><option value=2 selected>Two</option></select>",
                "select"
            )?,
            Some(FieldValue::Single("2".into()))
        );
        assert_eq!(
            read(
                "<select name=s><option value=a>A</option><option value=b>B</option></select>",
                "select"
            )?,
            Some(FieldValue::Single("a".into()))
        );
        assert_eq!(
            read("<select name=s></select>", "select")?,
            Some(FieldValue::Single(String::new()))
        );
        assert_eq!(
            read("<select multiple name=m><option value=a>A</option></select>", "select")?,
            Some(FieldValue::Multiple(Vec::new()))
        );
        assert_eq!(
            read(
                "<select multiple name=m><option selected>A</option><option value=b selected>B</option></select>",
                "select"
            )?,
            Some(FieldValue::Multiple(vec!["A".into(), "b".into()]))
        );
        Ok(())
    }

    #[test]
    fn option_text_counts_for_assertions() -> Result<()> {
        let dom = parse_html(
            "<select name=s><option value=en selected> English </option></select>",
        )?;
        let nodes = dom.query_selector_all("select")?;
        let values = values_and_texts(&dom, &nodes).unwrap_or_default();
        assert_eq!(values, vec!["en", "English", " English "]);
        Ok(())
    }

    #[test]
    fn mirrored_textarea_value_is_read_back() -> Result<()> {
        let mut dom = parse_html("<textarea name=t>old</textarea>")?;
        let node = dom.query_selector_all("textarea")?[0];
        mirror_value(&mut dom, node, "new <b>");
        assert_eq!(read_value(&dom, &[node]), Some(FieldValue::Single("new <b>".into())));
        Ok(())
    }
}
