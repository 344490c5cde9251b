//! Path-indexed answer document with array replication and id aliasing.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde_json::{Map, Value};
use thiserror::Error;

use crate::ids::mint_unique;

/// One step of a path through the answer document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathStep {
    Key(String),
    Index(usize),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("id '{0}' is not present in the answer document")]
    UnknownId(String),
    #[error("id '{0}' does not address a repeatable group")]
    NotAnArray(String),
}

/// Mutable answer document seeded from a tree's default output skeleton.
///
/// Every id in the document is reachable through the path index. Repeatable
/// groups register the deep copy of their first skeleton element as a
/// template; replicated elements get freshly minted ids, with the alias table
/// mapping each one back to its canonical template id. Structural mutations
/// rebuild the whole path index before returning, since inserting or removing
/// a list element shifts the index component of every path through that list.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerStore {
    truth: Value,
    paths: HashMap<String, Vec<PathStep>>,
    id_order: Vec<String>,
    templates: HashMap<String, Value>,
    aliases: BTreeMap<String, String>,
}

impl AnswerStore {
    pub fn new(skeleton: Value) -> AnswerStore {
        let templates_source = skeleton.clone();
        AnswerStore::resume(&templates_source, skeleton, BTreeMap::new())
    }

    /// Rebuild a store from a saved answer document and alias table.
    ///
    /// Templates always come from the pristine skeleton: the first live
    /// element of a group may have been edited or deleted since.
    pub fn resume(
        skeleton: &Value,
        answers: Value,
        aliases: BTreeMap<String, String>,
    ) -> AnswerStore {
        let mut store = AnswerStore {
            truth: answers,
            paths: HashMap::new(),
            id_order: Vec::new(),
            templates: HashMap::new(),
            aliases,
        };
        store.register_templates(skeleton);
        store.rebuild_paths();
        store
    }

    /// The whole answer document.
    pub fn document(&self) -> &Value {
        &self.truth
    }

    pub fn contains(&self, id: &str) -> bool {
        self.paths.contains_key(id)
    }

    /// Every id currently in the path index, in document order.
    pub fn all_ids(&self) -> &[String] {
        &self.id_order
    }

    pub fn aliases(&self) -> &BTreeMap<String, String> {
        &self.aliases
    }

    pub fn template(&self, array_id: &str) -> Option<&Value> {
        self.templates.get(array_id)
    }

    // Initialization --------------------------------------------------------

    fn register_templates(&mut self, value: &Value) {
        let Value::Object(map) = value else { return };
        for (key, entry) in map {
            if let Some(first) = object_array_first(entry) {
                self.templates.insert(key.clone(), first.clone());
                self.register_templates(first);
            } else if entry.is_object() {
                self.register_templates(entry);
            }
        }
    }

    fn rebuild_paths(&mut self) {
        self.paths.clear();
        self.id_order.clear();
        if let Value::Object(map) = &self.truth {
            let mut prefix = Vec::new();
            index_object(map, &mut prefix, &mut self.paths, &mut self.id_order);
        }
    }

    // Read ------------------------------------------------------------------

    /// The value at `id`'s recorded path; a repeatable group's id yields the
    /// whole list.
    pub fn get(&self, id: &str) -> Option<&Value> {
        let path = self.paths.get(id)?;
        value_at(&self.truth, path)
    }

    /// The container one level above `id`.
    ///
    /// When the step above `id` is a list index, one further level is
    /// skipped, so the result is never a bare index position.
    pub fn get_parent(&self, id: &str) -> Option<&Value> {
        let path = self.paths.get(id)?;
        if path.is_empty() {
            return Some(&self.truth);
        }
        let mut end = path.len() - 1;
        if end > 0 && matches!(path[end - 1], PathStep::Index(_)) {
            end -= 1;
        }
        value_at(&self.truth, &path[..end])
    }

    // Write -----------------------------------------------------------------

    /// Point overwrite of the value at `id`.
    pub fn update(&mut self, id: &str, value: Value) -> Result<(), StoreError> {
        let path = self
            .paths
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::UnknownId(id.to_string()))?;
        let slot = value_at_mut(&mut self.truth, &path)
            .ok_or_else(|| StoreError::UnknownId(id.to_string()))?;
        *slot = value;
        Ok(())
    }

    /// Structural overwrite: commit the value, then resync the whole path
    /// index because list shape may have changed.
    pub fn update_array(&mut self, id: &str, value: Value) -> Result<(), StoreError> {
        self.update(id, value)?;
        self.rebuild_paths();
        Ok(())
    }

    /// Append a fresh instance to the repeatable group at `id`.
    ///
    /// The registered template is deep-cloned and every id inside the clone
    /// is replaced with a freshly minted one, unique against the full current
    /// path index plus the ids minted earlier in this same pass. Each
    /// replacement is recorded in the alias table.
    pub fn declare_new_array_item(&mut self, array_id: &str) -> Result<(), StoreError> {
        let canonical = self.convert_id(array_id);
        let template = self
            .templates
            .get(&canonical)
            .cloned()
            .ok_or_else(|| StoreError::NotAnArray(array_id.to_string()))?;
        let mut instances = match self.get(array_id) {
            Some(Value::Array(instances)) => instances.clone(),
            Some(_) => return Err(StoreError::NotAnArray(array_id.to_string())),
            None => return Err(StoreError::UnknownId(array_id.to_string())),
        };
        let mut used: HashSet<String> = self.paths.keys().cloned().collect();
        let clone = self.rewrite_ids(&template, &mut used);
        instances.push(clone);
        self.update_array(array_id, Value::Array(instances))
    }

    fn rewrite_ids(&mut self, value: &Value, used: &mut HashSet<String>) -> Value {
        match value {
            Value::Object(map) => {
                let mut out = Map::new();
                for (key, entry) in map {
                    let fresh = mint_unique(used);
                    self.aliases.insert(fresh.clone(), key.clone());
                    let rewritten = match entry {
                        Value::Object(_) => self.rewrite_ids(entry, used),
                        Value::Array(elements)
                            if elements.first().is_some_and(Value::is_object) =>
                        {
                            Value::Array(
                                elements
                                    .iter()
                                    .map(|element| self.rewrite_ids(element, used))
                                    .collect(),
                            )
                        }
                        other => other.clone(),
                    };
                    out.insert(fresh, rewritten);
                }
                Value::Object(out)
            }
            other => other.clone(),
        }
    }

    /// Remove one instance from the repeatable group at `id`.
    ///
    /// An out-of-range index removes nothing but still commits.
    pub fn delete_array_item(&mut self, array_id: &str, index: usize) -> Result<(), StoreError> {
        let mut instances = match self.get(array_id) {
            Some(Value::Array(instances)) => instances.clone(),
            Some(_) => return Err(StoreError::NotAnArray(array_id.to_string())),
            None => return Err(StoreError::UnknownId(array_id.to_string())),
        };
        if index < instances.len() {
            instances.remove(index);
        }
        self.update_array(array_id, Value::Array(instances))
    }

    // Id conversion ---------------------------------------------------------

    /// The canonical id behind an alias, or the id unchanged.
    pub fn convert_id(&self, id: &str) -> String {
        self.aliases
            .get(id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }

    /// Id-to-canonical map, optionally restricted to the ids reachable
    /// within one value subtree. Non-aliased ids map to themselves.
    pub fn conversion_table(&self, subtree: Option<&Value>) -> BTreeMap<String, String> {
        match subtree {
            None => self.aliases.clone(),
            Some(value) => {
                let mut table = BTreeMap::new();
                self.collect_conversions(value, &mut table);
                table
            }
        }
    }

    fn collect_conversions(&self, value: &Value, table: &mut BTreeMap<String, String>) {
        match value {
            Value::Array(elements) => {
                for element in elements {
                    self.collect_conversions(element, table);
                }
            }
            Value::Object(map) => {
                for (key, entry) in map {
                    table.insert(key.clone(), self.convert_id(key));
                    self.collect_conversions(entry, table);
                }
            }
            _ => {}
        }
    }

    /// Resolve a template-authored reference to the clone that is relevant
    /// inside `context_id`'s own replicated instance.
    ///
    /// Checks, in order: sibling keys of each enclosing array element from
    /// the innermost outward; the subtree below the context (stepping into
    /// the newest instance first when the context is itself a group); the
    /// direct children of the context's parent. With no match the target is
    /// treated as a global reference and returned unchanged.
    pub fn relevant_version_of(&self, target_id: &str, context_id: &str) -> String {
        let Some(path) = self.paths.get(context_id) else {
            return target_id.to_string();
        };
        if let Some(found) = self.find_upstream(target_id, path) {
            return found;
        }
        if let Some(context_value) = self.get(context_id) {
            let scope = if let Value::Array(elements) = context_value {
                elements.iter().rev().find(|element| element.is_object())
            } else {
                None
            }
            .unwrap_or(context_value);
            if let Some(found) = self.find_downstream(target_id, scope) {
                return found;
            }
        }
        if let Some(Value::Object(siblings)) = self.get_parent(context_id) {
            for key in siblings.keys() {
                if self.matches_target(key, target_id) {
                    return key.clone();
                }
            }
        }
        target_id.to_string()
    }

    fn matches_target(&self, key: &str, target_id: &str) -> bool {
        key == target_id
            || self
                .aliases
                .get(key)
                .is_some_and(|canonical| canonical == target_id)
    }

    fn find_upstream(&self, target_id: &str, path: &[PathStep]) -> Option<String> {
        for end in (0..path.len()).rev() {
            if !matches!(path[end], PathStep::Index(_)) {
                continue;
            }
            let Some(Value::Object(element)) = value_at(&self.truth, &path[..=end]) else {
                continue;
            };
            for key in element.keys() {
                if self.matches_target(key, target_id) {
                    return Some(key.clone());
                }
            }
        }
        None
    }

    fn find_downstream(&self, target_id: &str, value: &Value) -> Option<String> {
        match value {
            Value::Array(elements) => elements
                .iter()
                .find_map(|element| self.find_downstream(target_id, element)),
            Value::Object(map) => {
                for (key, entry) in map {
                    if self
                        .aliases
                        .get(key)
                        .is_some_and(|canonical| canonical == target_id)
                    {
                        return Some(key.clone());
                    }
                    if let Some(found) = self.find_downstream(target_id, entry) {
                        return Some(found);
                    }
                }
                None
            }
            _ => None,
        }
    }
}

fn object_array_first(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(elements) => elements.first().filter(|element| element.is_object()),
        _ => None,
    }
}

fn index_object(
    map: &Map<String, Value>,
    prefix: &mut Vec<PathStep>,
    paths: &mut HashMap<String, Vec<PathStep>>,
    order: &mut Vec<String>,
) {
    for (key, value) in map {
        let mut path = prefix.clone();
        path.push(PathStep::Key(key.clone()));
        if paths.insert(key.clone(), path).is_none() {
            order.push(key.clone());
        }
        match value {
            // The recorded path for a group stops at the list itself; every
            // element is recursed so replicated-instance ids stay addressable.
            Value::Array(elements) if elements.first().is_some_and(Value::is_object) => {
                for (index, element) in elements.iter().enumerate() {
                    if let Value::Object(inner) = element {
                        prefix.push(PathStep::Key(key.clone()));
                        prefix.push(PathStep::Index(index));
                        index_object(inner, prefix, paths, order);
                        prefix.pop();
                        prefix.pop();
                    }
                }
            }
            Value::Object(inner) => {
                prefix.push(PathStep::Key(key.clone()));
                index_object(inner, prefix, paths, order);
                prefix.pop();
            }
            // Scalar lists (multiple-choice answers) are leaves.
            _ => {}
        }
    }
}

fn value_at<'a>(root: &'a Value, path: &[PathStep]) -> Option<&'a Value> {
    let mut cursor = root;
    for step in path {
        cursor = match step {
            PathStep::Key(key) => cursor.get(key.as_str())?,
            PathStep::Index(index) => cursor.get(*index)?,
        };
    }
    Some(cursor)
}

fn value_at_mut<'a>(root: &'a mut Value, path: &[PathStep]) -> Option<&'a mut Value> {
    let mut cursor = root;
    for step in path {
        cursor = match step {
            PathStep::Key(key) => cursor.get_mut(key.as_str())?,
            PathStep::Index(index) => cursor.get_mut(*index)?,
        };
    }
    Some(cursor)
}
