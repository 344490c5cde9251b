use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::spec::form::{Appearance, RenderCondition};

/// Leaf families a container can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Text,
    Question,
}

/// Question families, used when converting a question from one to the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionType {
    Input,
    MultipleChoice,
}

/// Primitive type a free-text input coerces its answer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    Text,
    Number,
}

/// Presentation family of a multiple-choice question.
///
/// Dropdown-style questions always hold exactly one selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChoiceType {
    Standard,
    Dropdown,
}

/// Static text block; contributes nothing to the answer document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TextDetails {
    pub title: String,
    pub section_title: String,
    pub description: String,
    pub output_key: String,
    #[serde(default)]
    pub render_conditionally: bool,
    #[serde(default)]
    pub render_condition: RenderCondition,
}

/// Type-specific fields of a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "question_type", rename_all = "snake_case")]
pub enum QuestionKind {
    Input {
        input_type: InputType,
        prompt: String,
        default_value: String,
    },
    MultipleChoice {
        choice_type: ChoiceType,
        min_selected: usize,
        max_selected: usize,
        #[serde(default)]
        choices: Vec<String>,
    },
}

/// A question item: shared fields plus the kind-specific record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QuestionDetails {
    pub title: String,
    pub description: String,
    pub output_key: String,
    #[serde(default)]
    pub render_conditionally: bool,
    #[serde(default)]
    pub render_condition: RenderCondition,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

impl QuestionDetails {
    /// The default answer this question seeds into the output skeleton.
    ///
    /// Numeric inputs attempt coercion of the authored default and fall back
    /// to 0; multiple-choice contributes its first choice exactly when one
    /// selection is mandatory.
    pub fn default_output(&self) -> Value {
        match &self.kind {
            QuestionKind::Input {
                input_type: InputType::Number,
                default_value,
                ..
            } => coerce_number(default_value),
            QuestionKind::Input { default_value, .. } => Value::String(default_value.clone()),
            QuestionKind::MultipleChoice {
                min_selected,
                choices,
                ..
            } => {
                if *min_selected == 1
                    && let Some(first) = choices.first()
                {
                    Value::Array(vec![Value::String(first.clone())])
                } else {
                    Value::Array(Vec::new())
                }
            }
        }
    }
}

fn coerce_number(raw: &str) -> Value {
    let raw = raw.trim();
    if let Ok(whole) = raw.parse::<i64>() {
        return Value::from(whole);
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::from(0))
}

/// The active detail record of a leaf item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "item_type", rename_all = "snake_case")]
pub enum ItemBody {
    Text(TextDetails),
    Question(QuestionDetails),
}

impl ItemBody {
    pub fn output_key(&self) -> &str {
        match self {
            ItemBody::Text(text) => &text.output_key,
            ItemBody::Question(question) => &question.output_key,
        }
    }

    pub fn render_gate(&self) -> (bool, &RenderCondition) {
        match self {
            ItemBody::Text(text) => (text.render_conditionally, &text.render_condition),
            ItemBody::Question(question) => {
                (question.render_conditionally, &question.render_condition)
            }
        }
    }

    /// A fresh record with the patched fields overwritten and the rest kept.
    ///
    /// Fields that do not apply to the active record are ignored.
    pub fn merged(&self, patch: &ItemDetailsPatch) -> ItemBody {
        match self {
            ItemBody::Text(text) => ItemBody::Text(TextDetails {
                title: patch.title.clone().unwrap_or_else(|| text.title.clone()),
                section_title: patch
                    .section_title
                    .clone()
                    .unwrap_or_else(|| text.section_title.clone()),
                description: patch
                    .description
                    .clone()
                    .unwrap_or_else(|| text.description.clone()),
                output_key: patch
                    .output_key
                    .clone()
                    .unwrap_or_else(|| text.output_key.clone()),
                render_conditionally: patch
                    .render_conditionally
                    .unwrap_or(text.render_conditionally),
                render_condition: patch
                    .render_condition
                    .clone()
                    .unwrap_or_else(|| text.render_condition.clone()),
            }),
            ItemBody::Question(question) => ItemBody::Question(QuestionDetails {
                title: patch.title.clone().unwrap_or_else(|| question.title.clone()),
                description: patch
                    .description
                    .clone()
                    .unwrap_or_else(|| question.description.clone()),
                output_key: patch
                    .output_key
                    .clone()
                    .unwrap_or_else(|| question.output_key.clone()),
                render_conditionally: patch
                    .render_conditionally
                    .unwrap_or(question.render_conditionally),
                render_condition: patch
                    .render_condition
                    .clone()
                    .unwrap_or_else(|| question.render_condition.clone()),
                kind: merge_kind(&question.kind, patch),
            }),
        }
    }
}

fn merge_kind(kind: &QuestionKind, patch: &ItemDetailsPatch) -> QuestionKind {
    match kind {
        QuestionKind::Input {
            input_type,
            prompt,
            default_value,
        } => QuestionKind::Input {
            input_type: patch.input_type.unwrap_or(*input_type),
            prompt: patch.prompt.clone().unwrap_or_else(|| prompt.clone()),
            default_value: patch
                .default_value
                .clone()
                .unwrap_or_else(|| default_value.clone()),
        },
        QuestionKind::MultipleChoice {
            choice_type,
            min_selected,
            max_selected,
            choices,
        } => QuestionKind::MultipleChoice {
            choice_type: patch.choice_type.unwrap_or(*choice_type),
            min_selected: patch.min_selected.unwrap_or(*min_selected),
            max_selected: patch.max_selected.unwrap_or(*max_selected),
            choices: patch.choices.clone().unwrap_or_else(|| choices.clone()),
        },
    }
}

/// Partial overwrite of an item's detail record; absent fields are left
/// untouched.
#[derive(Debug, Clone, Default)]
pub struct ItemDetailsPatch {
    pub title: Option<String>,
    pub section_title: Option<String>,
    pub description: Option<String>,
    pub output_key: Option<String>,
    pub render_conditionally: Option<bool>,
    pub render_condition: Option<RenderCondition>,
    pub input_type: Option<InputType>,
    pub prompt: Option<String>,
    pub default_value: Option<String>,
    pub choice_type: Option<ChoiceType>,
    pub min_selected: Option<usize>,
    pub max_selected: Option<usize>,
    pub choices: Option<Vec<String>>,
}

/// A live leaf node as held by the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ItemNode {
    pub id: String,
    #[serde(flatten)]
    pub body: ItemBody,
    #[serde(default)]
    pub appearance: Appearance,
}

impl ItemNode {
    pub fn new(id: String, kind: ItemKind) -> Self {
        let body = match kind {
            ItemKind::Text => ItemBody::Text(TextDetails {
                title: "Title".into(),
                section_title: "Section Title".into(),
                description: "Description".into(),
                output_key: id.clone(),
                render_conditionally: false,
                render_condition: RenderCondition::default(),
            }),
            ItemKind::Question => ItemBody::Question(QuestionDetails {
                title: "Question Title".into(),
                description: "Description".into(),
                output_key: id.clone(),
                render_conditionally: false,
                render_condition: RenderCondition::default(),
                kind: default_input_kind(),
            }),
        };
        ItemNode {
            id,
            body,
            appearance: default_item_appearance(kind),
        }
    }

    /// What this item seeds into the output skeleton, if anything.
    pub fn default_output(&self) -> Option<Value> {
        match &self.body {
            ItemBody::Text(_) => None,
            ItemBody::Question(question) => Some(question.default_output()),
        }
    }

    /// Switch a question between its input and multiple-choice families.
    ///
    /// The old family's fields are dropped and the new family starts from its
    /// defaults. Text items and no-op conversions are left untouched.
    pub fn convert_question_type(&mut self, target: QuestionType) {
        let ItemBody::Question(question) = &mut self.body else {
            return;
        };
        match (&question.kind, target) {
            (QuestionKind::Input { .. }, QuestionType::MultipleChoice) => {
                question.kind = default_multiple_choice_kind();
            }
            (QuestionKind::MultipleChoice { .. }, QuestionType::Input) => {
                question.kind = default_input_kind();
            }
            _ => {}
        }
    }

    /// Clear this item's render condition if it points at `dep_id`.
    pub fn clear_condition_references(&mut self, dep_id: &str) {
        let (render_conditionally, condition) = match &mut self.body {
            ItemBody::Text(text) => (&mut text.render_conditionally, &mut text.render_condition),
            ItemBody::Question(question) => (
                &mut question.render_conditionally,
                &mut question.render_condition,
            ),
        };
        if condition.question_id.as_deref() == Some(dep_id) {
            *render_conditionally = false;
            *condition = RenderCondition::default();
        }
    }
}

fn default_input_kind() -> QuestionKind {
    QuestionKind::Input {
        input_type: InputType::Text,
        prompt: "prompt...".into(),
        default_value: String::new(),
    }
}

fn default_multiple_choice_kind() -> QuestionKind {
    QuestionKind::MultipleChoice {
        choice_type: ChoiceType::Standard,
        min_selected: 0,
        max_selected: 1,
        choices: Vec::new(),
    }
}

fn default_item_appearance(kind: ItemKind) -> Appearance {
    let mut appearance = Appearance::new();
    appearance.insert("padding_top".into(), "10".into());
    appearance.insert("padding_sides".into(), "10".into());
    appearance.insert("padding_bottom".into(), "10".into());
    match kind {
        ItemKind::Text => {
            appearance.insert("color_section_title_text".into(), "#f4f4f4".into());
            appearance.insert("color_title_text".into(), "#262626".into());
        }
        ItemKind::Question => {
            appearance.insert("color_title_text".into(), "#262626".into());
            appearance.insert("color_input_background".into(), "#ffffff".into());
        }
    }
    appearance
}
