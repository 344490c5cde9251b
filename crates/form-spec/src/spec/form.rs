use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::spec::item::ItemNode;

/// Cosmetic key/value hints consumed by a rendering layer.
pub type Appearance = BTreeMap<String, String>;

/// Fixed nesting progression for container nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ContainerType {
    Root,
    Page,
    Card,
    Subcard,
}

impl ContainerType {
    /// The container type a freshly created child takes, or `None` for the
    /// deepest tier.
    pub fn child_type(self) -> Option<ContainerType> {
        match self {
            ContainerType::Root => Some(ContainerType::Page),
            ContainerType::Page => Some(ContainerType::Card),
            ContainerType::Card => Some(ContainerType::Subcard),
            ContainerType::Subcard => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContainerType::Root => "root",
            ContainerType::Page => "page",
            ContainerType::Card => "card",
            ContainerType::Subcard => "subcard",
        }
    }
}

/// A (dependency question, required value) pair gating whether a node renders.
///
/// `None` in either slot means the condition is not fully configured and the
/// node renders unconditionally.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct RenderCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_value: Option<String>,
}

impl RenderCondition {
    pub fn is_configured(&self) -> bool {
        self.question_id.is_some() && self.question_value.is_some()
    }
}

/// Author-editable settings of a container node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FormDetails {
    /// Key this node's answers are exported under.
    pub output_key: String,
    /// Above 1 the node becomes a repeatable group, stored as a list.
    #[serde(default = "default_max_instances")]
    pub max_instances: u32,
    /// Label for the control that appends a new repeated instance.
    #[serde(default = "default_instance_label")]
    pub new_instance_label: String,
    #[serde(default)]
    pub render_conditionally: bool,
    #[serde(default)]
    pub render_condition: RenderCondition,
}

fn default_max_instances() -> u32 {
    1
}

fn default_instance_label() -> String {
    "Add New".to_string()
}

impl FormDetails {
    pub fn new(output_key: String) -> Self {
        FormDetails {
            output_key,
            max_instances: 1,
            new_instance_label: default_instance_label(),
            render_conditionally: false,
            render_condition: RenderCondition::default(),
        }
    }

    /// A fresh record with the patched fields overwritten and the rest kept.
    pub fn merged(&self, patch: &FormDetailsPatch) -> FormDetails {
        FormDetails {
            output_key: patch.output_key.clone().unwrap_or_else(|| self.output_key.clone()),
            max_instances: patch.max_instances.unwrap_or(self.max_instances),
            new_instance_label: patch
                .new_instance_label
                .clone()
                .unwrap_or_else(|| self.new_instance_label.clone()),
            render_conditionally: patch
                .render_conditionally
                .unwrap_or(self.render_conditionally),
            render_condition: patch
                .render_condition
                .clone()
                .unwrap_or_else(|| self.render_condition.clone()),
        }
    }
}

/// Partial overwrite of [`FormDetails`]; absent fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct FormDetailsPatch {
    pub output_key: Option<String>,
    pub max_instances: Option<u32>,
    pub new_instance_label: Option<String>,
    pub render_conditionally: Option<bool>,
    pub render_condition: Option<RenderCondition>,
}

/// Discriminates the two node families a container can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChildKind {
    Form,
    Item,
}

/// One slot in a container's ordered child list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChildRef {
    pub kind: ChildKind,
    pub id: String,
}

/// A live container node as held by the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct FormNode {
    pub id: String,
    pub container_type: ContainerType,
    pub details: FormDetails,
    pub appearance: Appearance,
    pub children: Vec<ChildRef>,
    /// Snapshot keys this crate does not recognize, carried verbatim.
    pub extra: Map<String, Value>,
}

impl FormNode {
    pub fn new(id: String, container_type: ContainerType) -> Self {
        let details = FormDetails::new(id.clone());
        FormNode {
            id,
            container_type,
            details,
            appearance: default_form_appearance(container_type),
            children: Vec::new(),
            extra: Map::new(),
        }
    }
}

fn default_form_appearance(container_type: ContainerType) -> Appearance {
    let mut appearance = Appearance::new();
    appearance.insert("padding_top".into(), "10".into());
    appearance.insert("padding_sides".into(), "20".into());
    appearance.insert("padding_bottom".into(), "10".into());
    match container_type {
        ContainerType::Root | ContainerType::Page | ContainerType::Subcard => {
            appearance.insert("color_background".into(), "#eaeaea".into());
        }
        ContainerType::Card => {
            appearance.insert("color_background".into(), "#f4f4f4".into());
            appearance.insert("color_card_shadow".into(), "#7c7c7c".into());
        }
    }
    appearance
}

/// Serialized form of a container subtree.
///
/// `order` carries the child ordering; `subforms` and `items` hold the child
/// nodes by id. Keys this crate does not recognize survive a load/export
/// round-trip through `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FormSnapshot {
    pub id: String,
    pub container_type: ContainerType,
    pub details: FormDetails,
    #[serde(default)]
    pub appearance: Appearance,
    #[serde(default)]
    pub order: Vec<ChildRef>,
    #[serde(default)]
    pub subforms: BTreeMap<String, FormSnapshot>,
    #[serde(default)]
    pub items: BTreeMap<String, ItemNode>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
