//! Ingredient extraction from free-form model output
//!
//! The vision model is asked for a JSON array but its output format is not
//! guaranteed. Extraction runs an ordered chain of [`ParseStrategy`]s and
//! takes the first one that produces ingredients:
//!
//! 1. [`JsonArrayStrategy`]: the first bracketed substring that parses as a
//!    non-empty JSON array
//! 2. [`LineListStrategy`]: one ingredient per non-empty line, bullets stripped
//! 3. [`PlaceholderStrategy`]: a single "Unknown ingredient" record
//!
//! The last strategy cannot fail, so extraction always yields at least one
//! record.

use recipe_common::Ingredient;
use serde_json::{Map, Value};
use tracing::debug;

/// Result of running one strategy over model output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Parsed(Vec<Ingredient>),
    NotApplicable,
}

/// One way of reading ingredients out of model text
pub trait ParseStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn parse(&self, text: &str) -> ParseOutcome;
}

/// Parses the first embedded JSON array
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonArrayStrategy;

impl ParseStrategy for JsonArrayStrategy {
    fn name(&self) -> &'static str {
        "json_array"
    }

    fn parse(&self, text: &str) -> ParseOutcome {
        for candidate in bracketed_candidates(text) {
            match serde_json::from_str::<Value>(candidate) {
                Ok(Value::Array(items)) if !items.is_empty() => {
                    return ParseOutcome::Parsed(items.iter().map(ingredient_from_value).collect());
                }
                Ok(_) => continue,
                Err(e) => {
                    debug!("Bracketed candidate is not valid JSON: {}", e);
                    continue;
                }
            }
        }

        ParseOutcome::NotApplicable
    }
}

/// Treats each remaining line as an ingredient name
#[derive(Debug, Default, Clone, Copy)]
pub struct LineListStrategy;

impl ParseStrategy for LineListStrategy {
    fn name(&self) -> &'static str {
        "line_list"
    }

    fn parse(&self, text: &str) -> ParseOutcome {
        let ingredients: Vec<Ingredient> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with("```"))
            .map(strip_bullet)
            .filter(|name| name.chars().any(char::is_alphanumeric))
            .map(Ingredient::named)
            .collect();

        if ingredients.is_empty() {
            ParseOutcome::NotApplicable
        } else {
            ParseOutcome::Parsed(ingredients)
        }
    }
}

/// Final fallback; always parses
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderStrategy;

impl ParseStrategy for PlaceholderStrategy {
    fn name(&self) -> &'static str {
        "placeholder"
    }

    fn parse(&self, _text: &str) -> ParseOutcome {
        ParseOutcome::Parsed(vec![Ingredient::placeholder()])
    }
}

/// Ordered chain of parse strategies
pub struct IngredientExtractor {
    strategies: Vec<Box<dyn ParseStrategy>>,
}

impl Default for IngredientExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl IngredientExtractor {
    /// The standard chain: JSON array, then lines, then placeholder
    pub fn new() -> Self {
        Self::with_strategies(vec![
            Box::new(JsonArrayStrategy),
            Box::new(LineListStrategy),
            Box::new(PlaceholderStrategy),
        ])
    }

    /// A custom chain; a placeholder is still returned if every strategy
    /// declines
    pub fn with_strategies(strategies: Vec<Box<dyn ParseStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn extract(&self, text: &str) -> Vec<Ingredient> {
        for strategy in &self.strategies {
            match strategy.parse(text) {
                ParseOutcome::Parsed(ingredients) if !ingredients.is_empty() => {
                    debug!(
                        "Extracted {} ingredients with {} strategy",
                        ingredients.len(),
                        strategy.name()
                    );
                    return ingredients;
                }
                _ => debug!("Strategy {} not applicable", strategy.name()),
            }
        }

        vec![Ingredient::placeholder()]
    }
}

/// Extract ingredients with the standard chain
pub fn extract_ingredients(text: &str) -> Vec<Ingredient> {
    IngredientExtractor::new().extract(text)
}

/// Bracket-balanced `[...]` substrings in order of their opening bracket.
/// Brackets inside JSON string literals do not count.
///
/// One pass pairs each `]` with the innermost open `[`, so an unclosed
/// bracket never hides the arrays nested after it.
fn bracketed_candidates(text: &str) -> Vec<&str> {
    let mut open = Vec::new();
    let mut spans = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (idx, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '[' => open.push(idx),
            ']' => {
                if let Some(start) = open.pop() {
                    spans.push((start, idx + 1));
                }
            }
            _ => {}
        }
    }

    spans.sort_unstable_by_key(|&(start, _)| start);
    spans.into_iter().map(|(start, end)| &text[start..end]).collect()
}

/// Coerce one JSON element into an ingredient
///
/// Strings become names, objects contribute `name`, `quantity` and `unit`
/// (numbers are stringified), anything else is a placeholder.
pub fn ingredient_from_value(value: &Value) -> Ingredient {
    match value {
        Value::String(name) => Ingredient::named(name.as_str()),
        Value::Object(fields) => Ingredient::new(
            field_text(fields, "name"),
            field_text(fields, "quantity"),
            field_text(fields, "unit"),
        ),
        _ => Ingredient::placeholder(),
    }
}

fn field_text(fields: &Map<String, Value>, key: &str) -> String {
    match fields.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn strip_bullet(line: &str) -> &str {
    line.strip_prefix(&['-', '*', '•'][..])
        .map(str::trim_start)
        .unwrap_or(line)
}
