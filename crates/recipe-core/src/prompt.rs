//! Prompt templates sent to the generative model

use recipe_common::Ingredient;

/// Recipe styles offered by the app
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeStyle {
    HighProtein,
    Vegan,
    Keto,
    Mediterranean,
    Comfort,
    Quick,
}

impl RecipeStyle {
    pub const ALL: [RecipeStyle; 6] = [
        RecipeStyle::HighProtein,
        RecipeStyle::Vegan,
        RecipeStyle::Keto,
        RecipeStyle::Mediterranean,
        RecipeStyle::Comfort,
        RecipeStyle::Quick,
    ];

    /// Look up a style by its client identifier
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|style| style.id().eq_ignore_ascii_case(id.trim()))
    }

    pub fn id(&self) -> &'static str {
        match self {
            RecipeStyle::HighProtein => "high-protein",
            RecipeStyle::Vegan => "vegan",
            RecipeStyle::Keto => "keto",
            RecipeStyle::Mediterranean => "mediterranean",
            RecipeStyle::Comfort => "comfort",
            RecipeStyle::Quick => "quick",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            RecipeStyle::HighProtein => "High Protein",
            RecipeStyle::Vegan => "Vegan",
            RecipeStyle::Keto => "Keto",
            RecipeStyle::Mediterranean => "Mediterranean",
            RecipeStyle::Comfort => "Comfort Food",
            RecipeStyle::Quick => "Quick & Easy",
        }
    }

    /// Extra instruction appended to the recipe prompt
    pub fn guidance(&self) -> &'static str {
        match self {
            RecipeStyle::HighProtein => {
                "Focus on protein-rich preparation methods, include protein content per serving, and suggest high-protein variations."
            }
            RecipeStyle::Vegan => {
                "Use only plant-based ingredients and cooking methods. Ensure no animal products are used. Include nutritional info for vegans."
            }
            RecipeStyle::Keto => {
                "Create a low-carb, high-fat recipe. Limit carbs to under 20g per serving. Include net carb count."
            }
            RecipeStyle::Mediterranean => {
                "Use Mediterranean herbs, olive oil, and cooking techniques. Include fresh herbs and healthy fats."
            }
            RecipeStyle::Comfort => {
                "Create a hearty, satisfying comfort food recipe with rich flavors and warming spices."
            }
            RecipeStyle::Quick => {
                "Focus on quick cooking methods under 30 minutes. Include prep and cook times for each step."
            }
        }
    }
}

const EXTRACTION_FORMAT: &str = r#"Format the response as a JSON array where each item has exactly these properties:
[{"name": "chicken breast", "quantity": "2", "unit": "pieces"}, {"name": "onion", "quantity": "1", "unit": "medium"}, {"name": "garlic", "quantity": "3", "unit": "cloves"}]
Only include actual food ingredients, not containers, utensils, packaging, or other non-food items.
Be specific about ingredients and estimate realistic quantities.
Common units: pieces, cloves, cups, tablespoons, teaspoons, grams, ounces, pounds, ml, l, medium, large, small.
Return ONLY the JSON array, no additional text."#;

/// Prompt asking the vision model for an ingredient list
pub fn extraction_prompt(image_count: usize) -> String {
    let subject = if image_count > 1 {
        format!(
            "Analyze these {} images of food, a fridge or a pantry and identify all visible food ingredients across ALL images. \
             Combine them into a single list; if the same ingredient appears in several images, combine the quantities.",
            image_count
        )
    } else {
        "Analyze this image of food, a fridge or a pantry and identify all visible food ingredients.".to_string()
    };

    format!(
        "{}\nFor each ingredient, estimate a reasonable quantity and unit.\n{}",
        subject, EXTRACTION_FORMAT
    )
}

/// Flatten ingredients into `"2 pieces egg, 1 cup milk"`
pub fn ingredient_list(ingredients: &[Ingredient]) -> String {
    ingredients
        .iter()
        .map(|ingredient| ingredient.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Prompt asking the language model for a recipe in a fixed markdown layout
pub fn recipe_prompt(ingredients: &[Ingredient], style_id: &str) -> String {
    let style = RecipeStyle::from_id(style_id);
    let style_name = style
        .map(|s| s.title().to_lowercase())
        .unwrap_or_else(|| style_id.trim().to_string());
    let guidance = style.map(|s| s.guidance()).unwrap_or("");

    let mut prompt = format!(
        "Create a delicious {} recipe using these ingredients: {}.\nStyle: {}.\n",
        style_name,
        ingredient_list(ingredients),
        style_id.trim()
    );

    if !guidance.is_empty() {
        prompt.push_str(guidance);
        prompt.push('\n');
    }

    prompt.push_str(RECIPE_TEMPLATE);
    prompt
}

const RECIPE_TEMPLATE: &str = "
Format:
# [Recipe Name]
Prep: X min | Cook: X min | Serves: X

## Ingredients
- List with measurements

## Instructions
1. Clear step-by-step directions (3-5 steps)
2. Include temperatures and timing

## Nutritional information
| Nutrient | Amount |
|----------|--------|
| Calories | 450    |
| Protein  | 25g    |
| Carbs    | 35g    |
| Fat      | 20g    |
| Sugar    | 8g     |
| Fiber    | 5g     |
| Sodium   | 650mg  |

## Tips
- 2-3 cooking tips
- Substitutions if needed

Keep it concise but complete!";
