//! Recipe system - field schemas, value modifiers and validation

pub mod modifier;
pub mod provider;
pub mod recipe;
pub mod validator;

pub use modifier::{ModifierKind, ValueModifier};
pub use provider::{
    seed_recipes, ApplicationInfo, DirectoryRecipeProvider, RecipeProvider, StaticRecipeProvider,
};
pub use recipe::{FieldConfig, Recipe, RecipeError, RecipeOutcome};
pub use validator::{binding, FieldValidator, ValidationResult, ValidationScope};
