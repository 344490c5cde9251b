use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

use form_spec::{AnswerError, FormOutput, FormSnapshot, FormTree};

const DEFAULT_FORM: &str = include_str!("../../form-spec/tests/fixtures/survey_form.json");

#[derive(Debug, Error)]
enum ComponentError {
    #[error("failed to parse form definition: {0}")]
    DefinitionParse(#[source] serde_json::Error),
    #[error("failed to parse session state: {0}")]
    SessionParse(#[source] serde_json::Error),
    #[error("failed to parse value: {0}")]
    ValueParse(#[source] serde_json::Error),
    #[error("json encode error: {0}")]
    JsonEncode(#[source] serde_json::Error),
    #[error("answer rejected: {0}")]
    Answer(#[from] AnswerError),
}

/// Everything a caller must hold between calls: the in-progress answers and
/// the alias table for replicated instances.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionState {
    answers: Value,
    #[serde(default)]
    aliases: BTreeMap<String, String>,
}

fn load_tree(form_json: &str) -> Result<FormTree, ComponentError> {
    let source = if form_json.trim().is_empty() {
        DEFAULT_FORM
    } else {
        form_json
    };
    FormTree::load(source).map_err(ComponentError::DefinitionParse)
}

fn load_session(tree: &FormTree, session_json: &str) -> Result<FormOutput, ComponentError> {
    if session_json.trim().is_empty() {
        return Ok(FormOutput::new(tree));
    }
    let state: SessionState =
        serde_json::from_str(session_json).map_err(ComponentError::SessionParse)?;
    Ok(FormOutput::resume(tree, state.answers, state.aliases))
}

fn session_to_value(output: &FormOutput) -> Result<Value, ComponentError> {
    let state = SessionState {
        answers: output.store().document().clone(),
        aliases: output.store().aliases().clone(),
    };
    serde_json::to_value(state).map_err(ComponentError::JsonEncode)
}

fn respond(result: Result<Value, ComponentError>) -> String {
    match result {
        Ok(value) => serde_json::to_string(&value).unwrap_or_else(|error| {
            json!({"error": format!("json encode: {}", error)}).to_string()
        }),
        Err(err) => json!({ "error": err.to_string() }).to_string(),
    }
}

/// Echo the canonical serialized form of a definition.
pub fn describe(form_json: &str) -> String {
    respond(load_tree(form_json).and_then(|tree| {
        serde_json::to_value(tree.to_snapshot()).map_err(ComponentError::JsonEncode)
    }))
}

/// JSON schema of the serialized form-definition format.
pub fn definition_schema() -> String {
    let schema = schemars::schema_for!(FormSnapshot);
    respond(serde_json::to_value(schema).map_err(ComponentError::JsonEncode))
}

/// The default answer skeleton a fresh session starts from.
pub fn default_output(form_json: &str) -> String {
    respond(load_tree(form_json).map(|tree| tree.default_output_skeleton()))
}

/// Open a session: seed the answers from the skeleton, no aliases yet.
pub fn start_session(form_json: &str) -> String {
    respond(load_tree(form_json).and_then(|tree| session_to_value(&FormOutput::new(&tree))))
}

/// Record a free-form answer and return the updated session.
pub fn answer_input(
    form_json: &str,
    session_json: &str,
    question_id: &str,
    value_json: &str,
) -> String {
    respond(load_tree(form_json).and_then(|tree| {
        let mut output = load_session(&tree, session_json)?;
        let value: Value = serde_json::from_str(value_json).map_err(ComponentError::ValueParse)?;
        output.answer_input_question(question_id, value)?;
        session_to_value(&output)
    }))
}

/// Apply one multiple-choice click and return the updated session.
///
/// `choice_json` is either a JSON string (the clicked choice) or `null` /
/// `false` for the no-selection sentinel.
pub fn answer_choice(
    form_json: &str,
    session_json: &str,
    question_id: &str,
    choice_json: &str,
) -> String {
    respond(load_tree(form_json).and_then(|tree| {
        let mut output = load_session(&tree, session_json)?;
        let value: Value = serde_json::from_str(choice_json).map_err(ComponentError::ValueParse)?;
        let choice = value.as_str().map(str::to_string);
        output.answer_multiple_choice(question_id, choice.as_deref())?;
        session_to_value(&output)
    }))
}

/// Append a fresh instance to a repeatable group and return the updated
/// session.
pub fn add_group_instance(form_json: &str, session_json: &str, group_id: &str) -> String {
    respond(load_tree(form_json).and_then(|tree| {
        let mut output = load_session(&tree, session_json)?;
        output.declare_new_array_item(group_id)?;
        session_to_value(&output)
    }))
}

/// Remove one instance from a repeatable group and return the updated
/// session.
pub fn remove_group_instance(
    form_json: &str,
    session_json: &str,
    group_id: &str,
    index: usize,
) -> String {
    respond(load_tree(form_json).and_then(|tree| {
        let mut output = load_session(&tree, session_json)?;
        output.delete_array_item(group_id, index)?;
        session_to_value(&output)
    }))
}

/// Per-id visibility verdicts for the current answers, optionally with the
/// page controller's override applied for `page`.
pub fn visibility(form_json: &str, session_json: &str, page: Option<usize>) -> String {
    respond(load_tree(form_json).and_then(|tree| {
        let output = load_session(&tree, session_json)?;
        let mut table = output.render_table();
        if let Some(page_index) = page {
            tree.apply_page_visibility(&mut table, page_index);
        }
        serde_json::to_value(table).map_err(ComponentError::JsonEncode)
    }))
}

/// The answer document renamed to author-facing output keys.
pub fn export_output(form_json: &str, session_json: &str, filter_by_visibility: bool) -> String {
    respond(load_tree(form_json).and_then(|tree| {
        let output = load_session(&tree, session_json)?;
        Ok(output.export_value(filter_by_visibility))
    }))
}
