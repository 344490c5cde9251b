#![allow(missing_docs)]

pub mod ids;
pub mod output;
pub mod spec;
pub mod store;
pub mod tree;
pub mod visibility;

pub use ids::{ID_LENGTH, IdAllocator};
pub use output::{AnswerError, FormOutput};
pub use spec::{
    Appearance, ChildKind, ChildRef, ChoiceType, ContainerType, FormDetails, FormDetailsPatch,
    FormNode, FormSnapshot, InputType, ItemBody, ItemDetailsPatch, ItemKind, ItemNode,
    QuestionDetails, QuestionKind, QuestionType, RenderCondition, TextDetails,
};
pub use store::{AnswerStore, PathStep, StoreError};
pub use tree::{DetailsLookup, FormTree, NodeDetails, NodeRef, NodeSnapshot, Placement};
pub use visibility::{RenderTable, answer_contains, resolve_render_table};
