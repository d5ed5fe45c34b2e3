pub mod admin;
pub mod analytics;
pub mod assessments;
pub mod attendance;
pub mod core;
pub mod export;
pub mod portal;
pub mod reports;
pub mod schools;
pub mod students;
pub mod teachers;
