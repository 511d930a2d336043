//! Conversion between the local (display) and canonical (stored) form of a value

use crate::core::project::ProjectContext;

/// Affix a datatype adds to local values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifierKind {
    /// Value is stored as typed
    Identity,
    /// `{bucket_prefix}-{cluster}-` is prepended
    BucketPrefix,
    /// `.{subdomain}` is appended
    DomainSuffix,
}

/// A resolved `{apply, trim}` pair for one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueModifier {
    Identity,
    Prefix(String),
    Suffix(String),
}

impl ValueModifier {
    /// Resolve a modifier kind against the project metadata.
    ///
    /// Missing metadata degrades to identity so the field stays usable
    /// before the project context has loaded.
    pub fn resolve(kind: ModifierKind, project: &ProjectContext) -> Self {
        match kind {
            ModifierKind::Identity => ValueModifier::Identity,
            ModifierKind::BucketPrefix => match (project.bucket_prefix(), project.cluster()) {
                (Some(prefix), Some(cluster)) => {
                    ValueModifier::Prefix(format!("{}-{}-", prefix, cluster))
                }
                _ => ValueModifier::Identity,
            },
            ModifierKind::DomainSuffix => match project.subdomain() {
                Some(subdomain) => ValueModifier::Suffix(format!(".{}", subdomain)),
                None => ValueModifier::Identity,
            },
        }
    }

    /// Local -> canonical. An empty value is never decorated.
    pub fn apply(&self, local: &str) -> String {
        if local.is_empty() {
            return String::new();
        }
        match self {
            ValueModifier::Identity => local.to_string(),
            ValueModifier::Prefix(prefix) => format!("{}{}", prefix, local),
            ValueModifier::Suffix(suffix) => format!("{}{}", local, suffix),
        }
    }

    /// Canonical -> local. Values without the affix pass through unchanged.
    ///
    /// `apply(trim(x)) == x` for every `x` except the bare affix itself:
    /// `trim("acme-prod-")` is `""`, and an empty local value stays empty.
    pub fn trim(&self, canonical: &str) -> String {
        let trimmed = match self {
            ValueModifier::Identity => None,
            ValueModifier::Prefix(prefix) => canonical.strip_prefix(prefix.as_str()),
            ValueModifier::Suffix(suffix) => canonical.strip_suffix(suffix.as_str()),
        };
        trimmed.unwrap_or(canonical).to_string()
    }
}
