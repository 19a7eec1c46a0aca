//! Recipe Core
//!
//! Network-free building blocks of the recipe gateway:
//! - `image`: decodes and sniffs uploaded photos
//! - `prompt`: renders the ingredient-extraction and recipe prompts
//! - `extractor`: coerces free-form model output into ingredient records

pub mod extractor;
pub mod image;
pub mod prompt;

pub use extractor::{
    extract_ingredients, ingredient_from_value, IngredientExtractor, JsonArrayStrategy,
    LineListStrategy, ParseOutcome, ParseStrategy, PlaceholderStrategy,
};
pub use image::{validate_batch, validate_image, ImageError, ImageFormat, ValidatedImage};
pub use prompt::{extraction_prompt, ingredient_list, recipe_prompt, RecipeStyle};
pub use recipe_common::Ingredient;
