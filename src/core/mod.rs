pub mod models;
pub mod types;
pub mod value;

pub use models::*;
pub use types::*;
pub use value::{DateText, FieldValue, Record};
