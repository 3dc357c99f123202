pub mod classify;
pub mod config;
pub mod depfinder;
pub mod error;
pub mod files;
pub mod flow;
pub mod har;
pub mod id;
pub mod materialize;
pub mod model;
pub mod translate;
pub mod validate;
pub mod wasm;

pub use translate::{translate, translate_with_defaults, TranslateOptions, TranslationResult};
