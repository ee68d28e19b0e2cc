pub mod cli;
pub mod config;
pub mod gemini_adapter;
pub mod input;
pub mod prompt_loader;
pub mod view;
