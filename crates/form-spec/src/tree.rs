use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};

use crate::ids::IdAllocator;
use crate::spec::form::{
    Appearance, ChildKind, ChildRef, ContainerType, FormDetails, FormDetailsPatch, FormNode,
    FormSnapshot, RenderCondition,
};
use crate::spec::item::{
    ItemBody, ItemDetailsPatch, ItemKind, ItemNode, QuestionDetails, QuestionType, TextDetails,
};
use crate::visibility::RenderTable;

/// Where a new child lands in its parent's ordered child list.
///
/// An anchor that is not among the parent's children degrades to an append.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Placement {
    #[default]
    Append,
    Before(String),
    After(String),
}

/// Borrowed view of either node family.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeRef<'a> {
    Form(&'a FormNode),
    Item(&'a ItemNode),
}

impl NodeRef<'_> {
    pub fn id(&self) -> &str {
        match self {
            NodeRef::Form(form) => &form.id,
            NodeRef::Item(item) => &item.id,
        }
    }
}

/// Owned replacement for [`FormTree::replace_node`].
#[derive(Debug, Clone, PartialEq)]
pub enum NodeSnapshot {
    Form(FormSnapshot),
    Item(ItemNode),
}

/// The active detail record of any node, flattened for metadata queries.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeDetails {
    Form(FormDetails),
    Text(TextDetails),
    Question(QuestionDetails),
}

impl NodeDetails {
    pub fn output_key(&self) -> &str {
        match self {
            NodeDetails::Form(details) => &details.output_key,
            NodeDetails::Text(details) => &details.output_key,
            NodeDetails::Question(details) => &details.output_key,
        }
    }

    pub fn render_gate(&self) -> (bool, &RenderCondition) {
        match self {
            NodeDetails::Form(details) => (details.render_conditionally, &details.render_condition),
            NodeDetails::Text(details) => (details.render_conditionally, &details.render_condition),
            NodeDetails::Question(details) => {
                (details.render_conditionally, &details.render_condition)
            }
        }
    }

    pub fn as_question(&self) -> Option<&QuestionDetails> {
        match self {
            NodeDetails::Question(details) => Some(details),
            _ => None,
        }
    }
}

/// Flat id-to-details map consumed by visibility resolution and export.
pub type DetailsLookup = HashMap<String, NodeDetails>;

/// The authoring-time form hierarchy.
///
/// Nodes live in flat id-keyed maps with an explicit parent map, so every
/// operation locates its target without walking the tree. The ordered child
/// lists on each container node carry structure and ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct FormTree {
    root_id: String,
    forms: HashMap<String, FormNode>,
    items: HashMap<String, ItemNode>,
    parent: HashMap<String, String>,
    ids: IdAllocator,
}

impl FormTree {
    pub fn new() -> FormTree {
        let mut ids = IdAllocator::new();
        let root_id = ids.mint();
        let root = FormNode::new(root_id.clone(), ContainerType::Root);
        let mut forms = HashMap::new();
        forms.insert(root_id.clone(), root);
        FormTree {
            root_id,
            forms,
            items: HashMap::new(),
            parent: HashMap::new(),
            ids,
        }
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    pub fn root(&self) -> &FormNode {
        // The root entry is created in every constructor and never deleted.
        &self.forms[&self.root_id]
    }

    /// Locate any node by id.
    pub fn get(&self, target_id: &str) -> Option<NodeRef<'_>> {
        if let Some(form) = self.forms.get(target_id) {
            return Some(NodeRef::Form(form));
        }
        self.items.get(target_id).map(NodeRef::Item)
    }

    pub fn form(&self, target_id: &str) -> Option<&FormNode> {
        self.forms.get(target_id)
    }

    pub fn item(&self, target_id: &str) -> Option<&ItemNode> {
        self.items.get(target_id)
    }

    pub fn parent_id(&self, child_id: &str) -> Option<&str> {
        self.parent.get(child_id).map(String::as_str)
    }

    pub fn contains(&self, target_id: &str) -> bool {
        self.forms.contains_key(target_id) || self.items.contains_key(target_id)
    }

    // Create ----------------------------------------------------------------

    /// Create an empty subform under `parent_id`.
    ///
    /// The child takes the next container type in the fixed progression;
    /// subcards accept no further nesting. Returns the new id.
    pub fn insert_form(&mut self, parent_id: &str, placement: Placement) -> Option<String> {
        let child_type = self.forms.get(parent_id)?.container_type.child_type()?;
        let id = self.ids.mint();
        let node = FormNode::new(id.clone(), child_type);
        self.forms.insert(id.clone(), node);
        self.attach(parent_id, ChildKind::Form, &id, &placement);
        Some(id)
    }

    /// Create an empty item under `parent_id`. Returns the new id.
    pub fn insert_item(
        &mut self,
        parent_id: &str,
        kind: ItemKind,
        placement: Placement,
    ) -> Option<String> {
        if !self.forms.contains_key(parent_id) {
            return None;
        }
        let id = self.ids.mint();
        let node = ItemNode::new(id.clone(), kind);
        self.items.insert(id.clone(), node);
        self.attach(parent_id, ChildKind::Item, &id, &placement);
        Some(id)
    }

    fn attach(&mut self, parent_id: &str, kind: ChildKind, id: &str, placement: &Placement) {
        self.parent.insert(id.to_string(), parent_id.to_string());
        if let Some(parent) = self.forms.get_mut(parent_id) {
            let child = ChildRef {
                kind,
                id: id.to_string(),
            };
            let position = match placement {
                Placement::Append => None,
                Placement::Before(anchor) => {
                    parent.children.iter().position(|c| &c.id == anchor)
                }
                Placement::After(anchor) => parent
                    .children
                    .iter()
                    .position(|c| &c.id == anchor)
                    .map(|index| index + 1),
            };
            match position {
                Some(index) => parent.children.insert(index, child),
                None => parent.children.push(child),
            }
        }
    }

    // Delete ----------------------------------------------------------------

    /// Remove a node and its whole subtree, then clear every render condition
    /// pointing at the deleted id anywhere in the tree.
    ///
    /// Deleting an absent id (or the root) is a no-op.
    pub fn delete(&mut self, target_id: &str) {
        if target_id == self.root_id || !self.contains(target_id) {
            return;
        }
        if let Some(parent_id) = self.parent.get(target_id).cloned()
            && let Some(parent) = self.forms.get_mut(&parent_id)
        {
            parent.children.retain(|child| child.id != target_id);
        }
        for id in self.subtree_ids(target_id) {
            self.forms.remove(&id);
            self.items.remove(&id);
            self.parent.remove(&id);
            self.ids.release(&id);
        }
        self.clear_condition_references(target_id);
    }

    /// Ids of a node and all its descendants, in breadth-first order.
    fn subtree_ids(&self, root: &str) -> Vec<String> {
        let mut ids = vec![root.to_string()];
        let mut cursor = 0;
        while cursor < ids.len() {
            if let Some(form) = self.forms.get(&ids[cursor]) {
                ids.extend(form.children.iter().map(|child| child.id.clone()));
            }
            cursor += 1;
        }
        ids
    }

    fn clear_condition_references(&mut self, dep_id: &str) {
        for form in self.forms.values_mut() {
            if form.details.render_condition.question_id.as_deref() == Some(dep_id) {
                form.details.render_conditionally = false;
                form.details.render_condition = RenderCondition::default();
            }
        }
        for item in self.items.values_mut() {
            item.clear_condition_references(dep_id);
        }
    }

    // Update ----------------------------------------------------------------

    pub fn set_container_type(&mut self, target_id: &str, container_type: ContainerType) -> bool {
        match self.forms.get_mut(target_id) {
            Some(form) => {
                form.container_type = container_type;
                true
            }
            None => false,
        }
    }

    /// Merge-overwrite a container node's details. Untouched fields survive;
    /// the node always ends up with a fresh detail record.
    pub fn update_form_details(&mut self, target_id: &str, patch: &FormDetailsPatch) -> bool {
        match self.forms.get_mut(target_id) {
            Some(form) => {
                form.details = form.details.merged(patch);
                true
            }
            None => false,
        }
    }

    /// Merge-overwrite a leaf item's active detail record.
    pub fn update_item_details(&mut self, target_id: &str, patch: &ItemDetailsPatch) -> bool {
        match self.items.get_mut(target_id) {
            Some(item) => {
                item.body = item.body.merged(patch);
                true
            }
            None => false,
        }
    }

    /// Merge the supplied appearance keys into a node's appearance map.
    pub fn update_appearance(&mut self, target_id: &str, patch: &Appearance) -> bool {
        let appearance = if let Some(form) = self.forms.get_mut(target_id) {
            &mut form.appearance
        } else if let Some(item) = self.items.get_mut(target_id) {
            &mut item.appearance
        } else {
            return false;
        };
        for (key, value) in patch {
            appearance.insert(key.clone(), value.clone());
        }
        true
    }

    pub fn convert_question_type(&mut self, target_id: &str, target: QuestionType) -> bool {
        match self.items.get_mut(target_id) {
            Some(item) => {
                item.convert_question_type(target);
                true
            }
            None => false,
        }
    }

    /// Replace a node (and, for containers, its whole subtree) in place.
    ///
    /// The replacement keeps its own ids; its parent's child reference is
    /// rewritten to point at it. The root cannot be replaced.
    pub fn replace_node(&mut self, target_id: &str, replacement: NodeSnapshot) -> bool {
        let Some(parent_id) = self.parent.get(target_id).cloned() else {
            return false;
        };
        for id in self.subtree_ids(target_id) {
            self.forms.remove(&id);
            self.items.remove(&id);
            self.parent.remove(&id);
            self.ids.release(&id);
        }
        let (new_id, new_kind) = match replacement {
            NodeSnapshot::Form(snapshot) => {
                let id = snapshot.id.clone();
                self.adopt_form(snapshot, Some(parent_id.clone()));
                (id, ChildKind::Form)
            }
            NodeSnapshot::Item(item) => {
                let id = item.id.clone();
                self.ids.register(&id);
                self.parent.insert(id.clone(), parent_id.clone());
                self.items.insert(id.clone(), item);
                (id, ChildKind::Item)
            }
        };
        if let Some(parent) = self.forms.get_mut(&parent_id) {
            for child in parent.children.iter_mut() {
                if child.id == target_id {
                    child.id = new_id.clone();
                    child.kind = new_kind;
                }
            }
        }
        true
    }

    // Output skeleton -------------------------------------------------------

    /// Default answer document derived from the current tree.
    ///
    /// Branches that contribute no output are pruned recursively; repeatable
    /// groups wrap their skeleton in a one-element list.
    pub fn default_output_skeleton(&self) -> Value {
        self.form_output(&self.root_id)
            .unwrap_or_else(|| Value::Object(Map::new()))
    }

    fn form_output(&self, form_id: &str) -> Option<Value> {
        let node = self.forms.get(form_id)?;
        let mut output = Map::new();
        for child in &node.children {
            match child.kind {
                ChildKind::Item => {
                    if let Some(item) = self.items.get(&child.id)
                        && let Some(value) = item.default_output()
                    {
                        output.insert(child.id.clone(), value);
                    }
                }
                ChildKind::Form => {
                    if let Some(value) = self.form_output(&child.id) {
                        let repeatable = self
                            .forms
                            .get(&child.id)
                            .is_some_and(|form| form.details.max_instances > 1);
                        let value = if repeatable {
                            Value::Array(vec![value])
                        } else {
                            value
                        };
                        output.insert(child.id.clone(), value);
                    }
                }
            }
        }
        if output.is_empty() {
            None
        } else {
            Some(Value::Object(output))
        }
    }

    /// Flatten the tree into an id-to-details map.
    pub fn details_lookup(&self) -> DetailsLookup {
        let mut lookup = DetailsLookup::new();
        for (id, form) in &self.forms {
            lookup.insert(id.clone(), NodeDetails::Form(form.details.clone()));
        }
        for (id, item) in &self.items {
            let details = match &item.body {
                ItemBody::Text(text) => NodeDetails::Text(text.clone()),
                ItemBody::Question(question) => NodeDetails::Question(question.clone()),
            };
            lookup.insert(id.clone(), details);
        }
        lookup
    }

    // Pages -----------------------------------------------------------------

    /// Force exactly one top-level child visible for the current page,
    /// overriding the resolver's verdicts at that tier only.
    ///
    /// Does nothing unless this tree's root is of type root.
    pub fn apply_page_visibility(&self, table: &mut RenderTable, page_index: usize) {
        let root = self.root();
        if root.container_type != ContainerType::Root {
            return;
        }
        for (index, child) in root.children.iter().enumerate() {
            table.insert(child.id.clone(), index == page_index);
        }
    }

    // Import / export -------------------------------------------------------

    /// Rehydrate a tree from its serialized snapshot.
    pub fn from_snapshot(snapshot: FormSnapshot) -> FormTree {
        let mut tree = FormTree {
            root_id: snapshot.id.clone(),
            forms: HashMap::new(),
            items: HashMap::new(),
            parent: HashMap::new(),
            ids: IdAllocator::new(),
        };
        tree.adopt_form(snapshot, None);
        tree
    }

    fn adopt_form(&mut self, snapshot: FormSnapshot, parent_id: Option<String>) {
        let FormSnapshot {
            id,
            container_type,
            details,
            appearance,
            order,
            subforms,
            items,
            extra,
        } = snapshot;
        self.ids.register(&id);
        if let Some(parent_id) = parent_id {
            self.parent.insert(id.clone(), parent_id);
        }
        let node = FormNode {
            id: id.clone(),
            container_type,
            details,
            appearance,
            children: order,
            extra,
        };
        self.forms.insert(id.clone(), node);
        for (_, child) in subforms {
            self.adopt_form(child, Some(id.clone()));
        }
        for (_, item) in items {
            self.ids.register(&item.id);
            self.parent.insert(item.id.clone(), id.clone());
            self.items.insert(item.id.clone(), item);
        }
    }

    pub fn to_snapshot(&self) -> FormSnapshot {
        self.snapshot_of(&self.root_id).unwrap_or_else(|| FormSnapshot {
            id: self.root_id.clone(),
            container_type: ContainerType::Root,
            details: FormDetails::new(self.root_id.clone()),
            appearance: Appearance::new(),
            order: Vec::new(),
            subforms: BTreeMap::new(),
            items: BTreeMap::new(),
            extra: Map::new(),
        })
    }

    fn snapshot_of(&self, form_id: &str) -> Option<FormSnapshot> {
        let node = self.forms.get(form_id)?;
        let mut subforms = BTreeMap::new();
        let mut items = BTreeMap::new();
        for child in &node.children {
            match child.kind {
                ChildKind::Form => {
                    if let Some(snapshot) = self.snapshot_of(&child.id) {
                        subforms.insert(child.id.clone(), snapshot);
                    }
                }
                ChildKind::Item => {
                    if let Some(item) = self.items.get(&child.id) {
                        items.insert(child.id.clone(), item.clone());
                    }
                }
            }
        }
        Some(FormSnapshot {
            id: node.id.clone(),
            container_type: node.container_type,
            details: node.details.clone(),
            appearance: node.appearance.clone(),
            order: node.children.clone(),
            subforms,
            items,
            extra: node.extra.clone(),
        })
    }

    pub fn export(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.to_snapshot())
    }

    pub fn load(json: &str) -> serde_json::Result<FormTree> {
        let snapshot: FormSnapshot = serde_json::from_str(json)?;
        Ok(FormTree::from_snapshot(snapshot))
    }
}

impl Default for FormTree {
    fn default() -> Self {
        FormTree::new()
    }
}
