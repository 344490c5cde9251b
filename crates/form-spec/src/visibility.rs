use std::collections::HashMap;

use serde_json::Value;

use crate::store::AnswerStore;
use crate::tree::DetailsLookup;

pub type RenderTable = std::collections::BTreeMap<String, bool>;

/// Resolve a visibility verdict for every id currently in the answer
/// document.
///
/// Runs the dependency table to a fixed point: unconditioned ids resolve
/// visible immediately, an id whose dependency resolved hidden inherits the
/// hidden verdict, and an id whose dependency resolved visible is checked
/// against the dependency's current answer (resolved instance-correctly
/// against the id under evaluation). An id whose dependency never resolves,
/// including a dependency cycle, is forced visible once its retry counter
/// exceeds the total id count.
pub fn resolve_render_table(store: &AnswerStore, details: &DetailsLookup) -> RenderTable {
    let ids = store.all_ids();
    let mut table = RenderTable::new();
    let mut attempts: HashMap<&str, usize> = HashMap::new();

    while table.len() < ids.len() {
        for id in ids {
            if table.contains_key(id) {
                continue;
            }
            let canonical = store.convert_id(id);
            let Some(node) = details.get(&canonical) else {
                // Missing metadata favors over-disclosure.
                table.insert(id.clone(), true);
                continue;
            };
            let (render_conditionally, condition) = node.render_gate();
            if !render_conditionally {
                table.insert(id.clone(), true);
                continue;
            }
            let (Some(dep_id), Some(required)) = (
                condition.question_id.as_deref(),
                condition.question_value.as_deref(),
            ) else {
                table.insert(id.clone(), true);
                continue;
            };
            match table.get(dep_id).copied() {
                Some(false) => {
                    table.insert(id.clone(), false);
                }
                Some(true) => {
                    let visible = answer_contains(store, dep_id, id, required);
                    table.insert(id.clone(), visible);
                }
                None => {
                    let tries = attempts.entry(id.as_str()).or_insert(0);
                    *tries += 1;
                    if *tries > ids.len() {
                        table.insert(id.clone(), true);
                    }
                }
            }
        }
    }

    table
}

/// Whether `question_id`'s current answer, resolved against `context_id`'s
/// replicated instance, contains `required`.
pub fn answer_contains(
    store: &AnswerStore,
    question_id: &str,
    context_id: &str,
    required: &str,
) -> bool {
    let resolved = store.relevant_version_of(question_id, context_id);
    match store.get(&resolved) {
        Some(Value::Array(selected)) => selected
            .iter()
            .any(|entry| entry.as_str() == Some(required)),
        Some(Value::String(answer)) => answer == required,
        _ => false,
    }
}
