use super::*;

impl Dom {
    pub(crate) fn new() -> Self {
        let root = Node {
            parent: None,
            children: Vec::new(),
            node_type: NodeType::Document,
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
            id_index: HashMap::new(),
        }
    }

    pub(crate) fn create_node(&mut self, parent: Option<NodeId>, node_type: NodeType) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent,
            children: Vec::new(),
            node_type,
        });
        if let Some(parent_id) = parent {
            self.nodes[parent_id.0].children.push(id);
        }
        id
    }

    pub(crate) fn create_element(
        &mut self,
        parent: NodeId,
        tag_name: String,
        attrs: HashMap<String, String>,
    ) -> NodeId {
        let id_attr = attrs.get("id").cloned();
        let id = self.create_node(Some(parent), NodeType::Element(Element { tag_name, attrs }));
        if let Some(id_attr) = id_attr {
            self.index_id(&id_attr, id);
        }
        id
    }

    pub(crate) fn create_text(&mut self, parent: NodeId, text: String) -> NodeId {
        self.create_node(Some(parent), NodeType::Text(text))
    }

    pub(crate) fn element(&self, node_id: NodeId) -> Option<&Element> {
        match &self.nodes[node_id.0].node_type {
            NodeType::Element(element) => Some(element),
            _ => None,
        }
    }

    pub(crate) fn element_mut(&mut self, node_id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes[node_id.0].node_type {
            NodeType::Element(element) => Some(element),
            _ => None,
        }
    }

    pub(crate) fn tag_name(&self, node_id: NodeId) -> Option<&str> {
        self.element(node_id).map(|e| e.tag_name.as_str())
    }

    pub(crate) fn is_tag(&self, node_id: NodeId, tag: &str) -> bool {
        self.tag_name(node_id)
            .is_some_and(|name| name.eq_ignore_ascii_case(tag))
    }

    pub(crate) fn attr(&self, node_id: NodeId, name: &str) -> Option<&str> {
        self.element(node_id)
            .and_then(|element| element.attrs.get(name))
            .map(String::as_str)
    }

    pub(crate) fn has_attr(&self, node_id: NodeId, name: &str) -> bool {
        self.element(node_id)
            .is_some_and(|element| element.attrs.contains_key(name))
    }

    pub(crate) fn set_attr(&mut self, node_id: NodeId, name: &str, value: &str) {
        let old_id = if name == "id" {
            self.attr(node_id, "id").map(str::to_string)
        } else {
            None
        };
        if let Some(element) = self.element_mut(node_id) {
            element.attrs.insert(name.to_string(), value.to_string());
        }
        if name == "id" {
            if let Some(old_id) = old_id {
                self.unindex_id(&old_id, node_id);
            }
            self.index_id(value, node_id);
        }
    }

    pub(crate) fn remove_attr(&mut self, node_id: NodeId, name: &str) {
        let removed = self
            .element_mut(node_id)
            .and_then(|element| element.attrs.remove(name));
        if name == "id" {
            if let Some(old_id) = removed {
                self.unindex_id(&old_id, node_id);
            }
        }
    }

    pub(crate) fn parent(&self, node_id: NodeId) -> Option<NodeId> {
        self.nodes[node_id.0].parent
    }

    pub(crate) fn children(&self, node_id: NodeId) -> &[NodeId] {
        &self.nodes[node_id.0].children
    }

    pub(crate) fn is_descendant_of(&self, node_id: NodeId, ancestor: NodeId) -> bool {
        let mut cursor = self.parent(node_id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    pub(crate) fn find_ancestor_by_tag(&self, node_id: NodeId, tag: &str) -> Option<NodeId> {
        let mut cursor = self.parent(node_id);
        while let Some(current) = cursor {
            if self.is_tag(current, tag) {
                return Some(current);
            }
            cursor = self.parent(current);
        }
        None
    }

    pub(crate) fn by_id(&self, id: &str) -> Option<NodeId> {
        self.id_index.get(id).and_then(|ids| {
            ids.iter()
                .copied()
                .find(|node| self.is_connected(*node))
        })
    }

    pub(crate) fn by_id_all(&self, id: &str) -> Vec<NodeId> {
        self.id_index
            .get(id)
            .map(|ids| {
                ids.iter()
                    .copied()
                    .filter(|node| self.is_connected(*node))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn index_id(&mut self, id: &str, node_id: NodeId) {
        if id.is_empty() {
            return;
        }
        self.id_index
            .entry(id.to_string())
            .or_default()
            .push(node_id);
    }

    pub(crate) fn unindex_id(&mut self, id: &str, node_id: NodeId) {
        let Some(nodes) = self.id_index.get_mut(id) else {
            return;
        };
        nodes.retain(|candidate| *candidate != node_id);
        if nodes.is_empty() {
            self.id_index.remove(id);
        }
    }

    pub(crate) fn is_connected(&self, node_id: NodeId) -> bool {
        node_id == self.root || self.is_descendant_of(node_id, self.root)
    }

    /// Detaches `node_id` from its parent. The arena slot stays allocated.
    pub(crate) fn remove_node(&mut self, node_id: NodeId) {
        let Some(parent) = self.parent(node_id) else {
            return;
        };
        self.nodes[parent.0].children.retain(|child| *child != node_id);
        self.nodes[node_id.0].parent = None;
    }

    pub(crate) fn collect_elements_dfs(&self, node_id: NodeId, out: &mut Vec<NodeId>) {
        let mut stack = vec![node_id];
        while let Some(current) = stack.pop() {
            if self.element(current).is_some() {
                out.push(current);
            }
            for child in self.nodes[current.0].children.iter().rev() {
                stack.push(*child);
            }
        }
    }

    pub(crate) fn collect_elements_descendants_dfs(&self, node_id: NodeId, out: &mut Vec<NodeId>) {
        for child in &self.nodes[node_id.0].children {
            self.collect_elements_dfs(*child, out);
        }
    }

    pub(crate) fn collect_descendants_dfs(&self, node_id: NodeId, out: &mut Vec<NodeId>) {
        let mut stack = self.nodes[node_id.0]
            .children
            .iter()
            .rev()
            .copied()
            .collect::<Vec<_>>();
        while let Some(current) = stack.pop() {
            out.push(current);
            for child in self.nodes[current.0].children.iter().rev() {
                stack.push(*child);
            }
        }
    }

    pub(crate) fn text_content(&self, node_id: NodeId) -> String {
        match &self.nodes[node_id.0].node_type {
            NodeType::Text(text) => text.clone(),
            NodeType::Document | NodeType::Element(_) => {
                let mut descendants = Vec::new();
                self.collect_descendants_dfs(node_id, &mut descendants);
                let mut out = String::new();
                for node in descendants {
                    if let NodeType::Text(text) = &self.nodes[node.0].node_type {
                        out.push_str(text);
                    }
                }
                out
            }
        }
    }

    pub(crate) fn set_text_content(&mut self, node_id: NodeId, value: &str) {
        if self.element(node_id).is_none() {
            return;
        }
        let old_children = std::mem::take(&mut self.nodes[node_id.0].children);
        for child in old_children {
            self.nodes[child.0].parent = None;
        }
        if !value.is_empty() {
            self.create_text(node_id, value.to_string());
        }
    }

    /// Copies the subtree rooted at `source_node` of `source` under `parent`, recording
    /// every source-to-copy mapping in `mapping`.
    pub(crate) fn import_subtree(
        &mut self,
        source: &Dom,
        source_node: NodeId,
        parent: NodeId,
        mapping: &mut HashMap<NodeId, NodeId>,
    ) -> Option<NodeId> {
        let node_type = match &source.nodes[source_node.0].node_type {
            NodeType::Document => return None,
            other => other.clone(),
        };
        let node = self.create_node(Some(parent), node_type);
        if let Some(id_attr) = self.attr(node, "id").map(str::to_string) {
            self.index_id(&id_attr, node);
        }
        mapping.insert(source_node, node);
        for child in &source.nodes[source_node.0].children {
            stacker::maybe_grow(32 * 1024, 1024 * 1024, || {
                self.import_subtree(source, *child, node, mapping)
            });
        }
        Some(node)
    }

    pub(crate) fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>> {
        let groups = parse_selector_list(selector)?;

        if groups.len() == 1 && groups[0].len() == 1 {
            if let Some(id) = groups[0][0].compound.id_only() {
                return Ok(self.by_id_all(id));
            }
        }

        let mut ids = Vec::new();
        self.collect_elements_dfs(self.root, &mut ids);
        Ok(self.filter_by_groups(ids, &groups))
    }

    pub(crate) fn query_selector_all_from(
        &self,
        root: &NodeId,
        selector: &str,
    ) -> Result<Vec<NodeId>> {
        let groups = parse_selector_list(selector)?;
        let mut ids = Vec::new();
        self.collect_elements_descendants_dfs(*root, &mut ids);
        Ok(self.filter_by_groups(ids, &groups))
    }

    fn filter_by_groups(&self, candidates: Vec<NodeId>, groups: &[ComplexSelector]) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        let mut matched = Vec::new();
        for candidate in candidates {
            if groups
                .iter()
                .any(|steps| self.matches_selector_chain(candidate, steps))
                && seen.insert(candidate)
            {
                matched.push(candidate);
            }
        }
        matched
    }

    pub(crate) fn matches_selector(&self, node_id: NodeId, selector: &str) -> Result<bool> {
        if self.element(node_id).is_none() {
            return Ok(false);
        }
        let groups = parse_selector_list(selector)?;
        Ok(groups
            .iter()
            .any(|steps| self.matches_selector_chain(node_id, steps)))
    }

    pub(crate) fn dump_node(&self, node_id: NodeId) -> String {
        match &self.nodes[node_id.0].node_type {
            NodeType::Document => {
                let mut out = String::new();
                for child in &self.nodes[node_id.0].children {
                    out.push_str(&self.dump_node(*child));
                }
                out
            }
            NodeType::Text(text) => escape_html_text_for_serialization(text),
            NodeType::Element(element) => {
                let mut out = String::new();
                out.push('<');
                out.push_str(&element.tag_name);
                let mut attrs = element.attrs.iter().collect::<Vec<_>>();
                attrs.sort_by(|(left, _), (right, _)| left.cmp(right));
                for (k, v) in attrs {
                    out.push(' ');
                    out.push_str(k);
                    out.push_str("=\"");
                    out.push_str(&escape_html_attr_for_serialization(v));
                    out.push('"');
                }
                out.push('>');
                if html::is_void_tag(&element.tag_name) {
                    return out;
                }
                let raw_text_container = html::is_raw_text_tag(&element.tag_name);
                for child in &self.nodes[node_id.0].children {
                    match &self.nodes[child.0].node_type {
                        NodeType::Text(text) if raw_text_container => out.push_str(text),
                        _ => out.push_str(&stacker::maybe_grow(32 * 1024, 1024 * 1024, || {
                            self.dump_node(*child)
                        })),
                    }
                }
                out.push_str("</");
                out.push_str(&element.tag_name);
                out.push('>');
                out
            }
        }
    }

    pub(crate) fn matches_selector_chain(&self, node_id: NodeId, parts: &[SelectorPart]) -> bool {
        let Some((last, rest)) = parts.split_last() else {
            return false;
        };
        if !self.matches_compound(node_id, &last.compound) {
            return false;
        }

        // Walk right to left; each combinator relates a part to the one before it.
        let mut current = node_id;
        let mut combinator = last.combinator;
        for part in rest.iter().rev() {
            let compound = &part.compound;
            let found = match combinator.unwrap_or(Combinator::Descendant) {
                Combinator::Child => self
                    .parent(current)
                    .filter(|parent| self.matches_compound(*parent, compound)),
                Combinator::Descendant => {
                    std::iter::successors(self.parent(current), |ancestor| self.parent(*ancestor))
                        .find(|ancestor| self.matches_compound(*ancestor, compound))
                }
                Combinator::Adjacent => self
                    .previous_element_sibling(current)
                    .filter(|sibling| self.matches_compound(*sibling, compound)),
                Combinator::Sibling => {
                    std::iter::successors(self.previous_element_sibling(current), |sibling| {
                        self.previous_element_sibling(*sibling)
                    })
                    .find(|sibling| self.matches_compound(*sibling, compound))
                }
            };
            let Some(found) = found else {
                return false;
            };
            current = found;
            combinator = part.combinator;
        }
        true
    }

    fn matches_compound(&self, node_id: NodeId, compound: &Compound) -> bool {
        let Some(element) = self.element(node_id) else {
            return false;
        };
        if compound
            .tag
            .as_ref()
            .is_some_and(|tag| !element.tag_name.eq_ignore_ascii_case(tag))
        {
            return false;
        }
        if compound
            .id
            .as_ref()
            .is_some_and(|id| element.attrs.get("id") != Some(id))
        {
            return false;
        }
        if !compound
            .classes
            .iter()
            .all(|class_name| has_class(element, class_name))
        {
            return false;
        }
        if !compound.attrs.iter().all(|attr| {
            element
                .attrs
                .get(&attr.name)
                .is_some_and(|actual| attr.op.test(actual))
        }) {
            return false;
        }
        compound
            .pseudos
            .iter()
            .all(|pseudo| self.matches_pseudo(node_id, &element.tag_name, pseudo))
    }

    fn matches_pseudo(&self, node_id: NodeId, tag_name: &str, pseudo: &Pseudo) -> bool {
        match pseudo {
            Pseudo::Checked => self.is_checked(node_id),
            Pseudo::Disabled => self.is_disabled(node_id),
            Pseudo::Enabled => html::is_form_control_tag(tag_name) && !self.is_disabled(node_id),
            Pseudo::Empty => self.nodes[node_id.0].children.is_empty(),
            Pseudo::Position(nth) => {
                let position = if nth.of_type {
                    self.index_of_type(node_id)
                } else {
                    self.element_index(node_id)
                };
                position.is_some_and(|(index, total)| {
                    nth.matches(if nth.from_end { total + 1 - index } else { index })
                })
            }
            Pseudo::Is(inner) => inner
                .iter()
                .any(|parts| self.matches_selector_chain(node_id, parts)),
            Pseudo::Not(inner) => !inner
                .iter()
                .any(|parts| self.matches_selector_chain(node_id, parts)),
            Pseudo::Has(inner) => {
                let mut descendants = Vec::new();
                self.collect_elements_descendants_dfs(node_id, &mut descendants);
                descendants.into_iter().any(|target| {
                    inner
                        .iter()
                        .any(|parts| self.matches_selector_chain(target, parts))
                })
            }
        }
    }

    /// `:checked` covers checked checkables and selected options.
    pub(crate) fn is_checked(&self, node_id: NodeId) -> bool {
        let Some(element) = self.element(node_id) else {
            return false;
        };
        match element.tag_name.as_str() {
            "input" => {
                let kind = element
                    .attrs
                    .get("type")
                    .map(|t| t.to_ascii_lowercase())
                    .unwrap_or_default();
                (kind == "checkbox" || kind == "radio") && element.attrs.contains_key("checked")
            }
            "option" => element.attrs.contains_key("selected"),
            _ => false,
        }
    }

    /// `:disabled` the way HTML defines it: the attribute itself, an ancestor disabled
    /// fieldset (outside its first legend), or a disabled select/optgroup for options.
    pub(crate) fn is_disabled(&self, node_id: NodeId) -> bool {
        let Some(element) = self.element(node_id) else {
            return false;
        };
        let tag = element.tag_name.as_str();
        if !html::is_form_control_tag(tag) && tag != "option" && tag != "optgroup" {
            return false;
        }
        if element.attrs.contains_key("disabled") {
            return true;
        }
        if tag == "option" {
            return self.parent(node_id).is_some_and(|parent| {
                (self.is_tag(parent, "optgroup") || self.is_tag(parent, "select"))
                    && self.is_disabled(parent)
            });
        }
        if tag == "optgroup" {
            return false;
        }

        let mut child = node_id;
        let mut cursor = self.parent(node_id);
        while let Some(parent) = cursor {
            if self.is_tag(parent, "fieldset") && self.has_attr(parent, "disabled") {
                let first_legend = self
                    .children(parent)
                    .iter()
                    .copied()
                    .find(|candidate| self.element(*candidate).is_some())
                    .filter(|candidate| self.is_tag(*candidate, "legend"));
                if first_legend != Some(child) {
                    return true;
                }
            }
            child = parent;
            cursor = self.parent(parent);
        }
        false
    }

    fn element_index(&self, node_id: NodeId) -> Option<(usize, usize)> {
        let parent = self.parent(node_id)?;
        let mut index = 0usize;
        let mut target = None;
        for child in &self.nodes[parent.0].children {
            if self.element(*child).is_none() {
                continue;
            }
            index += 1;
            if *child == node_id {
                target = Some(index);
            }
        }
        target.map(|target| (target, index))
    }

    fn index_of_type(&self, node_id: NodeId) -> Option<(usize, usize)> {
        let parent = self.parent(node_id)?;
        let tag_name = self.tag_name(node_id)?;
        let mut index = 0usize;
        let mut target = None;
        for child in &self.nodes[parent.0].children {
            let Some(element) = self.element(*child) else {
                continue;
            };
            if element.tag_name != tag_name {
                continue;
            }
            index += 1;
            if *child == node_id {
                target = Some(index);
            }
        }
        target.map(|target| (target, index))
    }

    pub(crate) fn previous_element_sibling(&self, node_id: NodeId) -> Option<NodeId> {
        let parent = self.parent(node_id)?;
        let children = &self.nodes[parent.0].children;
        let pos = children.iter().position(|id| *id == node_id)?;
        children[..pos]
            .iter()
            .rev()
            .copied()
            .find(|sibling| self.element(*sibling).is_some())
    }

    /// Document position index, used to sort node sets from different query paths.
    pub(crate) fn document_order(&self) -> HashMap<NodeId, usize> {
        let mut order = HashMap::new();
        order.insert(self.root, 0);
        let mut all = Vec::new();
        self.collect_descendants_dfs(self.root, &mut all);
        for (index, node) in all.into_iter().enumerate() {
            order.insert(node, index + 1);
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_fieldset_disables_nested_controls_except_first_legend() -> Result<()> {
        let dom = parse_html(
            r#"<form><fieldset disabled>
              <legend><input id="in-legend"></legend>
              <input id="inner">
            </fieldset><input id="outer"></form>"#,
        )?;
        let inner = dom.by_id("inner").ok_or(Error::not_found("#inner", "node"))?;
        let legend = dom
            .by_id("in-legend")
            .ok_or(Error::not_found("#in-legend", "node"))?;
        let outer = dom.by_id("outer").ok_or(Error::not_found("#outer", "node"))?;
        assert!(dom.is_disabled(inner));
        assert!(!dom.is_disabled(legend));
        assert!(!dom.is_disabled(outer));
        Ok(())
    }

    #[test]
    fn import_subtree_keeps_mapping_and_id_index() -> Result<()> {
        let source = parse_html(r#"<div><form id="f"><input id="a" name="a"></form></div>"#)?;
        let form = source.by_id("f").ok_or(Error::not_found("#f", "form"))?;
        let mut copy = Dom::new();
        let mut mapping = HashMap::new();
        let root = copy.root;
        let cloned = copy.import_subtree(&source, form, root, &mut mapping);
        assert!(cloned.is_some());
        assert_eq!(mapping.len(), 2);
        assert!(copy.by_id("a").is_some());
        assert_eq!(copy.dump_node(copy.root), r#"<form id="f"><input id="a" name="a"></form>"#);
        Ok(())
    }

    #[test]
    fn removed_nodes_leave_queries_and_text() -> Result<()> {
        let mut dom = parse_html(r#"<p id="keep">a</p><p id="drop">b</p>"#)?;
        let drop = dom.by_id("drop").ok_or(Error::not_found("#drop", "p"))?;
        dom.remove_node(drop);
        assert_eq!(dom.query_selector_all("p")?.len(), 1);
        assert!(dom.by_id("drop").is_none());
        assert_eq!(dom.text_content(dom.root), "a");
        Ok(())
    }

    fn ids(dom: &Dom, selector: &str) -> Result<Vec<String>> {
        Ok(dom
            .query_selector_all(selector)?
            .into_iter()
            .filter_map(|node| dom.attr(node, "id").map(str::to_string))
            .collect())
    }

    #[test]
    fn structural_and_relational_selectors() -> Result<()> {
        let dom = parse_html(
            r#"<ul id="list"><li id="a">1</li><li id="b" class="x">2</li><li id="c">3</li></ul>
               <div id="d"><span id="s1"></span><em id="e1"></em><span id="s2"></span></div>"#,
        )?;
        assert_eq!(ids(&dom, "li:first-child")?, vec!["a"]);
        assert_eq!(ids(&dom, "li:last-child")?, vec!["c"]);
        assert_eq!(ids(&dom, "li:nth-child(odd)")?, vec!["a", "c"]);
        assert_eq!(ids(&dom, "li:nth-last-child(2)")?, vec!["b"]);
        assert_eq!(ids(&dom, "span:last-of-type")?, vec!["s2"]);
        assert_eq!(ids(&dom, "em:only-of-type")?, vec!["e1"]);
        assert_eq!(ids(&dom, "li:only-child")?, Vec::<String>::new());
        assert_eq!(ids(&dom, "li.x + li")?, vec!["c"]);
        assert_eq!(ids(&dom, "li.x ~ li, #list > li:not(.x):first-child")?, vec!["a", "c"]);
        assert_eq!(ids(&dom, "ul:has(li.x)")?, vec!["list"]);
        assert_eq!(ids(&dom, "ul li#c")?, vec!["c"]);
        assert_eq!(ids(&dom, "div > em ~ span")?, vec!["s2"]);
        Ok(())
    }
}
