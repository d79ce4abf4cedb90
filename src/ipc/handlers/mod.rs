pub mod core;
pub mod grading;
pub mod rules;
pub mod suggestions;
