pub mod form;
pub mod item;

pub use form::{
    Appearance, ChildKind, ChildRef, ContainerType, FormDetails, FormDetailsPatch, FormNode,
    FormSnapshot, RenderCondition,
};
pub use item::{
    ChoiceType, InputType, ItemBody, ItemDetailsPatch, ItemKind, ItemNode, QuestionDetails,
    QuestionKind, QuestionType, TextDetails,
};
