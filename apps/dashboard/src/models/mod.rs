pub mod prompt;
pub mod teacher;
