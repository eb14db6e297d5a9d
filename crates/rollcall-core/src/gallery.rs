//! In-memory template gallery.
//!
//! Loaded from the durable store at startup and kept consistent through
//! explicit insert/remove calls; recognition scans it directly instead of
//! re-reading storage per probe.

use std::collections::BTreeMap;

use crate::types::Template;

/// All enrolled templates, at most one per identity.
///
/// Backed by a `BTreeMap` so scans run in ascending identity order, which
/// keeps matcher tie-breaks reproducible.
#[derive(Debug, Default)]
pub struct Gallery {
    templates: BTreeMap<String, Template>,
}

impl Gallery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a gallery from stored templates (startup load).
    pub fn from_templates(templates: impl IntoIterator<Item = Template>) -> Self {
        Self {
            templates: templates
                .into_iter()
                .map(|t| (t.identity_id.clone(), t))
                .collect(),
        }
    }

    /// Insert or replace the template for an identity.
    /// Returns the replaced template, if any.
    pub fn insert(&mut self, template: Template) -> Option<Template> {
        self.templates.insert(template.identity_id.clone(), template)
    }

    /// Remove an identity's template. Removing an absent identity is a no-op.
    pub fn remove(&mut self, identity_id: &str) -> Option<Template> {
        self.templates.remove(identity_id)
    }

    pub fn get(&self, identity_id: &str) -> Option<&Template> {
        self.templates.get(identity_id)
    }

    pub fn contains(&self, identity_id: &str) -> bool {
        self.templates.contains_key(identity_id)
    }

    /// Iterate all templates in ascending identity order.
    pub fn scan(&self) -> impl Iterator<Item = &Template> {
        self.templates.values()
    }

    /// Enrolled identity ids, ascending.
    pub fn identities(&self) -> Vec<String> {
        self.templates.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
