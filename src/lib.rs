pub mod config;
pub mod dynamic;
pub mod errors;
pub mod resource;
pub mod script;
pub mod shell;
