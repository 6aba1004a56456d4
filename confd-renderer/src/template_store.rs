//! Tera-backed template store — one template per serialized address.
//!
//! Templates are registered under their `namespace:key` address, so
//! `{% include "app:header" %}` resolves across entries. A partial that no
//! watch group renders is only refreshed when its namespace is fully loaded
//! (at startup); later remote edits to it are not picked up. The underlying [`Tera`]
//! instance sits behind an `Arc`; [`TemplateStore::clone`] is a cheap snapshot
//! and [`TemplateStore::load`] copies on write when a snapshot is still alive.

use std::sync::Arc;

use tera::{Context, Tera};

use crate::data_store::DataSnapshot;
use crate::error::{describe, RenderError};

/// Compiled templates keyed by address.
#[derive(Clone)]
pub struct TemplateStore {
    tera: Arc<Tera>,
}

impl Default for TemplateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TemplateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateStore")
            .field("addresses", &self.addresses())
            .finish()
    }
}

impl TemplateStore {
    pub fn new() -> Self {
        let mut tera = Tera::default();
        // Rendered files are config text; never HTML-escape, whatever the key's extension.
        tera.autoescape_on(vec![]);
        Self {
            tera: Arc::new(tera),
        }
    }

    /// Parse `text` and store it under `address`, replacing any prior definition.
    ///
    /// The template is added to a scratch copy first; on any error (syntax,
    /// a missing `extends` parent, a missing macro import) the store is left
    /// exactly as it was.
    pub fn load(&mut self, address: &str, text: &str) -> Result<(), RenderError> {
        let mut next = Tera::clone(&self.tera);
        next.add_raw_template(address, text)
            .map_err(|e| RenderError::TemplateParse {
                address: address.to_string(),
                detail: describe(&e),
            })?;
        self.tera = Arc::new(next);
        Ok(())
    }

    pub fn contains(&self, address: &str) -> bool {
        self.tera.get_template_names().any(|name| name == address)
    }

    /// Loaded addresses, sorted.
    pub fn addresses(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tera
            .get_template_names()
            .map(str::to_string)
            .collect();
        names.sort();
        names
    }

    /// Execute the template stored for `address` against `data`.
    pub fn render(&self, address: &str, data: &DataSnapshot) -> Result<String, RenderError> {
        if !self.contains(address) {
            return Err(RenderError::TemplateNotFound {
                address: address.to_string(),
            });
        }
        let execution = |e: tera::Error| RenderError::Execution {
            address: address.to_string(),
            detail: describe(&e),
        };
        let ctx = Context::from_serialize(data.as_map()).map_err(execution)?;
        self.tera.render(address, &ctx).map_err(execution)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
