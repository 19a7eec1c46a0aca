pub mod ingredient;
pub mod record;

pub use ingredient::Ingredient;
pub use record::{GenerationLogRecord, RequestType};
