use std::collections::BTreeMap;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::spec::item::{ChoiceType, QuestionKind};
use crate::store::{AnswerStore, StoreError};
use crate::tree::{DetailsLookup, FormTree, NodeDetails};
use crate::visibility::{RenderTable, answer_contains, resolve_render_table};

#[derive(Debug, Error)]
pub enum AnswerError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("id '{0}' does not address a multiple-choice question")]
    NotMultipleChoice(String),
}

/// Runtime binding of an answer store to the tree's flat node metadata.
///
/// All answer mutation goes through this type; reads may go straight to the
/// underlying [`AnswerStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct FormOutput {
    store: AnswerStore,
    details: DetailsLookup,
}

impl FormOutput {
    /// Instantiate a fresh output document from the tree's current skeleton.
    pub fn new(tree: &FormTree) -> FormOutput {
        FormOutput {
            store: AnswerStore::new(tree.default_output_skeleton()),
            details: tree.details_lookup(),
        }
    }

    /// Rebind a previously saved answer document and alias table.
    pub fn resume(
        tree: &FormTree,
        answers: Value,
        aliases: BTreeMap<String, String>,
    ) -> FormOutput {
        let skeleton = tree.default_output_skeleton();
        FormOutput {
            store: AnswerStore::resume(&skeleton, answers, aliases),
            details: tree.details_lookup(),
        }
    }

    pub fn store(&self) -> &AnswerStore {
        &self.store
    }

    /// Node metadata keyed by id, extended with every live alias.
    pub fn details_lookup(&self) -> DetailsLookup {
        let mut lookup = self.details.clone();
        for (alias, canonical) in self.store.aliases() {
            if let Some(details) = self.details.get(canonical) {
                lookup.insert(alias.clone(), details.clone());
            }
        }
        lookup
    }

    // Answering -------------------------------------------------------------

    /// Record a free-form answer for an input question.
    pub fn answer_input_question(&mut self, question_id: &str, value: Value) -> Result<(), AnswerError> {
        self.store.update(question_id, value)?;
        Ok(())
    }

    /// Apply one click on a multiple-choice option.
    ///
    /// `None` is the no-selection sentinel. The new selection list is
    /// resolved from the current one in strict priority order:
    /// clear-all, dropdown single pick, deselect, append, evict-oldest.
    /// Exactly one rule fires.
    pub fn answer_multiple_choice(
        &mut self,
        question_id: &str,
        choice: Option<&str>,
    ) -> Result<(), AnswerError> {
        // Clones carry their canonical id's settings.
        let details_id = if self.details.contains_key(question_id) {
            question_id.to_string()
        } else {
            self.store.convert_id(question_id)
        };
        let Some(QuestionKind::MultipleChoice {
            choice_type,
            min_selected,
            max_selected,
            ..
        }) = self
            .details
            .get(&details_id)
            .and_then(NodeDetails::as_question)
            .map(|question| question.kind.clone())
        else {
            return Err(AnswerError::NotMultipleChoice(question_id.to_string()));
        };

        let mut selected: Vec<String> = match self.store.get(question_id) {
            Some(Value::Array(entries)) => entries
                .iter()
                .filter_map(|entry| entry.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };

        match choice {
            None if min_selected == 0 => selected.clear(),
            None => return Ok(()),
            Some(choice) => {
                if choice_type == ChoiceType::Dropdown {
                    selected = vec![choice.to_string()];
                } else if let Some(position) = selected.iter().position(|entry| entry == choice)
                    && selected.len() - 1 >= min_selected
                {
                    selected.remove(position);
                } else if selected.len() < max_selected {
                    selected.push(choice.to_string());
                } else if selected.len() == max_selected {
                    if !selected.is_empty() {
                        selected.remove(0);
                    }
                    selected.push(choice.to_string());
                } else {
                    // Over-full selection (author lowered the cap): no rule fires.
                    return Ok(());
                }
            }
        }

        self.store.update(
            question_id,
            Value::Array(selected.into_iter().map(Value::String).collect()),
        )?;
        Ok(())
    }

    // Instances -------------------------------------------------------------

    pub fn declare_new_array_item(&mut self, array_id: &str) -> Result<(), AnswerError> {
        self.store.declare_new_array_item(array_id)?;
        Ok(())
    }

    pub fn delete_array_item(&mut self, array_id: &str, index: usize) -> Result<(), AnswerError> {
        self.store.delete_array_item(array_id, index)?;
        Ok(())
    }

    // Queries ---------------------------------------------------------------

    /// Whether `id` appears anywhere in the answer document.
    pub fn contains_id(&self, id: &str) -> bool {
        contains_key(self.store.document(), id)
    }

    /// Every id nested under `id`'s value, through lists and objects.
    pub fn child_ids(&self, id: &str) -> Vec<String> {
        let mut ids = Vec::new();
        if let Some(value) = self.store.get(id) {
            collect_keys(value, &mut ids);
        }
        ids
    }

    /// The canonical id plus every alias standing in for it.
    pub fn all_versions_of_id(&self, id: &str) -> Vec<String> {
        let canonical = self.store.convert_id(id);
        let mut versions = vec![canonical.clone()];
        versions.extend(
            self.store
                .aliases()
                .iter()
                .filter(|(_, mapped)| **mapped == canonical)
                .map(|(alias, _)| alias.clone()),
        );
        versions
    }

    /// Whether a question's answer, resolved inside `context_id`'s instance,
    /// contains `required`.
    pub fn answer_contains(&self, question_id: &str, context_id: &str, required: &str) -> bool {
        answer_contains(&self.store, question_id, context_id, required)
    }

    pub fn relevant_version_of(&self, target_id: &str, context_id: &str) -> String {
        self.store.relevant_version_of(target_id, context_id)
    }

    // Visibility ------------------------------------------------------------

    pub fn render_table(&self) -> RenderTable {
        resolve_render_table(&self.store, &self.details)
    }

    // Export ----------------------------------------------------------------

    /// The answer document with every id renamed to its author-facing output
    /// key, optionally dropping subtrees that resolved hidden.
    pub fn export_value(&self, filter_by_visibility: bool) -> Value {
        let document = if filter_by_visibility {
            let table = self.render_table();
            filter_unrendered(self.store.document(), &table)
        } else {
            self.store.document().clone()
        };
        self.rename_keys(&document)
    }

    pub fn export(&self, filter_by_visibility: bool) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.export_value(filter_by_visibility))
    }

    fn rename_keys(&self, value: &Value) -> Value {
        match value {
            Value::Array(elements) => Value::Array(
                elements
                    .iter()
                    .map(|element| self.rename_keys(element))
                    .collect(),
            ),
            Value::Object(map) => {
                let mut out = Map::new();
                for (key, entry) in map {
                    let canonical = self.store.convert_id(key);
                    let renamed = self
                        .details
                        .get(&canonical)
                        .map(|details| details.output_key().to_string())
                        .unwrap_or_else(|| key.clone());
                    out.insert(renamed, self.rename_keys(entry));
                }
                Value::Object(out)
            }
            other => other.clone(),
        }
    }
}

fn contains_key(value: &Value, id: &str) -> bool {
    match value {
        Value::Array(elements) => elements.iter().any(|element| contains_key(element, id)),
        Value::Object(map) => map
            .iter()
            .any(|(key, entry)| key == id || contains_key(entry, id)),
        _ => false,
    }
}

fn collect_keys(value: &Value, ids: &mut Vec<String>) {
    match value {
        Value::Array(elements) => {
            for element in elements {
                collect_keys(element, ids);
            }
        }
        Value::Object(map) => {
            for (key, entry) in map {
                ids.push(key.clone());
                collect_keys(entry, ids);
            }
        }
        _ => {}
    }
}

fn filter_unrendered(value: &Value, table: &RenderTable) -> Value {
    match value {
        Value::Array(elements) => Value::Array(
            elements
                .iter()
                .map(|element| filter_unrendered(element, table))
                .collect(),
        ),
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, entry) in map {
                if table.get(key).copied() == Some(true) {
                    out.insert(key.clone(), filter_unrendered(entry, table));
                }
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}
