pub mod checklist;
pub mod favorites;
pub mod follows;
pub mod import;
pub mod ingredients;
pub mod recipes;
pub mod tags;
pub mod users;
