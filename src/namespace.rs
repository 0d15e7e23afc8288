//! Namespaces and entry ids.

use std::fmt;

use crate::error::RegistryError;

const TIERS: [&str; 3] = ["internal", "public", "experimental"];

/// A namespace prefix that starts with `kp.internal.`, `kp.public.` or
/// `kp.experimental.`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace(String);

impl Namespace {
    pub fn parse(value: &str) -> Result<Self, RegistryError> {
        let valid = value
            .strip_prefix("kp.")
            .map(|rest| {
                TIERS.iter().any(|tier| {
                    rest.strip_prefix(tier)
                        .is_some_and(|after| after.starts_with('.'))
                })
            })
            .unwrap_or(false);

        if valid {
            Ok(Self(value.to_string()))
        } else {
            Err(RegistryError::InvalidNamespace(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Id under which a server named `name` is published: `<namespace>/<slug>`.
    pub fn entry_id(&self, name: &str) -> String {
        format!("{}/{}", self.0, slugify(name))
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lowercase, with every run of whitespace replaced by a single `-`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut in_space = false;
    for c in name.chars() {
        if c.is_whitespace() {
            if !in_space {
                slug.push('-');
            }
            in_space = true;
        } else {
            slug.extend(c.to_lowercase());
            in_space = false;
        }
    }
    slug
}
