pub mod schema;
pub mod token;
pub mod validation;
