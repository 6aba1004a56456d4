//! # confd-renderer
//!
//! Tera templates keyed by `namespace:key` address, and the JSON data sets
//! they are rendered against.
//!
//! ## Usage
//!
//! ```rust
//! use confd_renderer::{DataStore, TemplateStore};
//!
//! let mut templates = TemplateStore::new();
//! templates.load("app:greeting", "hello {{ config.name }}").unwrap();
//!
//! let mut data = DataStore::new();
//! data.upsert("config", r#"{"name":"world"}"#).unwrap();
//!
//! let out = templates.render("app:greeting", &data.snapshot()).unwrap();
//! assert_eq!(out, "hello world");
//! ```

pub mod data_store;
pub mod error;
pub mod template_store;

pub use data_store::{DataSnapshot, DataStore};
pub use error::RenderError;
pub use template_store::TemplateStore;
