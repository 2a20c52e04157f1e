pub mod chips;
pub mod health;
pub mod import;
