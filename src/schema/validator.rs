//! Field validation with per-datatype rule chains
//!
//! Every datatype is bound, through a single table, to the modifier that
//! decorates its values and to the ordered rules that check them. Rules run
//! in order and the first failure wins.

use regex::Regex;
use std::collections::BTreeSet;

use crate::core::context::StepContext;
use crate::core::datatype::Datatype;
use crate::core::registry::UniquenessRegistry;
use crate::schema::modifier::ModifierKind;
use crate::schema::recipe::{FieldConfig, RecipeError};

/// Message used when a recipe leaves `validation_message` unset
pub const DEFAULT_FORMAT_MESSAGE: &str = "Invalid value.";

/// A check that can be attached to a datatype
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// Recipe-provided regex
    Format,
    /// Value parses as a whole number
    Integer,
    /// Value is `true` or `false`
    Boolean,
    /// Value is not claimed by any other domain field or installed application
    UniqueDomain,
}

/// What a datatype resolves to
#[derive(Debug)]
pub struct DatatypeBinding {
    pub datatype: Datatype,
    pub modifier: ModifierKind,
    pub rules: &'static [RuleKind],
}

const BINDINGS: &[DatatypeBinding] = &[
    DatatypeBinding {
        datatype: Datatype::String,
        modifier: ModifierKind::Identity,
        rules: &[RuleKind::Format],
    },
    DatatypeBinding {
        datatype: Datatype::Int,
        modifier: ModifierKind::Identity,
        rules: &[RuleKind::Format, RuleKind::Integer],
    },
    DatatypeBinding {
        datatype: Datatype::Bool,
        modifier: ModifierKind::Identity,
        rules: &[RuleKind::Format, RuleKind::Boolean],
    },
    DatatypeBinding {
        datatype: Datatype::Password,
        modifier: ModifierKind::Identity,
        rules: &[RuleKind::Format],
    },
    DatatypeBinding {
        datatype: Datatype::Bucket,
        modifier: ModifierKind::BucketPrefix,
        rules: &[RuleKind::Format],
    },
    DatatypeBinding {
        datatype: Datatype::Domain,
        modifier: ModifierKind::DomainSuffix,
        rules: &[RuleKind::Format, RuleKind::UniqueDomain],
    },
    DatatypeBinding {
        datatype: Datatype::File,
        modifier: ModifierKind::Identity,
        rules: &[RuleKind::Format],
    },
];

const FALLBACK: DatatypeBinding = DatatypeBinding {
    datatype: Datatype::String,
    modifier: ModifierKind::Identity,
    rules: &[RuleKind::Format],
};

/// Look up the binding for a datatype
pub fn binding(datatype: Datatype) -> &'static DatatypeBinding {
    BINDINGS
        .iter()
        .find(|b| b.datatype == datatype)
        .unwrap_or(&FALLBACK)
}

/// Outcome of validating one value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub valid: bool,
    pub message: String,
}

impl ValidationResult {
    pub fn success() -> Self {
        Self {
            valid: true,
            message: String::new(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: message.into(),
        }
    }
}

/// Read-only state a validator consults for one call
#[derive(Debug, Clone, Copy)]
pub struct ValidationScope<'a> {
    pub step: &'a str,
    pub field: &'a str,
    /// Current values of the field's own step
    pub siblings: &'a StepContext,
    pub registry: &'a UniquenessRegistry,
    /// Domains taken by applications installed outside this run
    pub registered_domains: &'a BTreeSet<String>,
}

#[derive(Debug, Clone)]
enum Rule {
    Format { pattern: Option<Regex>, message: String },
    Integer,
    Boolean,
    UniqueDomain,
}

/// The compiled rule chain for one field
#[derive(Debug, Clone)]
pub struct FieldValidator {
    optional: bool,
    rules: Vec<Rule>,
}

impl FieldValidator {
    /// Build the chain for a field from its datatype binding
    pub fn build(config: &FieldConfig) -> Result<Self, RecipeError> {
        let rules = binding(config.datatype)
            .rules
            .iter()
            .map(|kind| Self::compile(*kind, config))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            optional: config.optional,
            rules,
        })
    }

    fn compile(kind: RuleKind, config: &FieldConfig) -> Result<Rule, RecipeError> {
        Ok(match kind {
            RuleKind::Format => {
                let pattern = config
                    .validation_pattern
                    .as_deref()
                    .filter(|p| !p.is_empty())
                    .map(Regex::new)
                    .transpose()
                    .map_err(|e| RecipeError::InvalidPattern {
                        field: config.name.clone(),
                        message: e.to_string(),
                    })?;
                Rule::Format {
                    pattern,
                    message: config
                        .validation_message
                        .clone()
                        .unwrap_or_else(|| DEFAULT_FORMAT_MESSAGE.to_string()),
                }
            }
            RuleKind::Integer => Rule::Integer,
            RuleKind::Boolean => Rule::Boolean,
            RuleKind::UniqueDomain => Rule::UniqueDomain,
        })
    }

    /// Validate a canonical value. Never mutates anything.
    pub fn validate(&self, value: &str, scope: &ValidationScope<'_>) -> ValidationResult {
        if self.optional && value.is_empty() {
            return ValidationResult::success();
        }

        for rule in &self.rules {
            let result = Self::check(rule, value, scope);
            if !result.valid {
                return result;
            }
        }
        ValidationResult::success()
    }

    fn check(rule: &Rule, value: &str, scope: &ValidationScope<'_>) -> ValidationResult {
        match rule {
            Rule::Format { pattern, message } => match pattern {
                Some(re) if !re.is_match(value) => ValidationResult::failure(message.clone()),
                _ => ValidationResult::success(),
            },
            Rule::Integer => {
                if value.trim().parse::<i64>().is_ok() {
                    ValidationResult::success()
                } else {
                    ValidationResult::failure("Value must be a whole number.")
                }
            }
            Rule::Boolean => match value.trim() {
                "true" | "false" => ValidationResult::success(),
                _ => ValidationResult::failure("Value must be true or false."),
            },
            Rule::UniqueDomain => {
                if value.is_empty() {
                    return ValidationResult::success();
                }
                let taken = Self::taken_domains(scope);
                if taken.contains(value) {
                    ValidationResult::failure(format!("Domain {} already used.", value))
                } else {
                    ValidationResult::success()
                }
            }
        }
    }

    /// Sibling domains, other claims, and pre-registered domains
    fn taken_domains<'a>(scope: &ValidationScope<'a>) -> BTreeSet<&'a str> {
        let mut taken: BTreeSet<&'a str> = scope
            .siblings
            .values_of(Datatype::Domain, Some(scope.field))
            .filter(|v| !v.is_empty())
            .collect();
        taken.extend(scope.registry.values_except(scope.step, scope.field));
        taken.extend(scope.registered_domains.iter().map(String::as_str));
        taken
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::FieldValue;

    struct Fixture {
        siblings: StepContext,
        registry: UniquenessRegistry,
        registered: BTreeSet<String>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                siblings: StepContext::new(),
                registry: UniquenessRegistry::new(),
                registered: BTreeSet::new(),
            }
        }

        fn scope<'a>(&'a self, step: &'a str, field: &'a str) -> ValidationScope<'a> {
            ValidationScope {
                step,
                field,
                siblings: &self.siblings,
                registry: &self.registry,
                registered_domains: &self.registered,
            }
        }
    }

    fn validator(config: FieldConfig) -> FieldValidator {
        FieldValidator::build(&config).unwrap()
    }

    #[test]
    fn test_every_datatype_has_a_binding() {
        for datatype in Datatype::all() {
            assert_eq!(binding(*datatype).datatype, *datatype);
            assert_eq!(binding(*datatype).rules[0], RuleKind::Format);
        }
        assert_eq!(binding(Datatype::Domain).modifier, ModifierKind::DomainSuffix);
        assert_eq!(binding(Datatype::Bucket).modifier, ModifierKind::BucketPrefix);
    }

    #[test]
    fn test_pattern_mismatch_fails_with_configured_message() {
        let fx = Fixture::new();
        let v = validator(
            FieldConfig::new("name", Datatype::String).with_pattern("[a-z]+", "Lowercase only."),
        );
        let result = v.validate("ABC", &fx.scope("app", "name"));
        assert_eq!(result, ValidationResult::failure("Lowercase only."));
        assert!(v.validate("abc", &fx.scope("app", "name")).valid);
    }

    #[test]
    fn test_missing_pattern_matches_anything() {
        let fx = Fixture::new();
        let v = validator(FieldConfig::new("name", Datatype::String));
        assert!(v.validate("", &fx.scope("app", "name")).valid);
        assert!(v.validate("Anything at all", &fx.scope("app", "name")).valid);
    }

    #[test]
    fn test_optional_empty_always_passes() {
        let fx = Fixture::new();
        let v = validator(
            FieldConfig::new("workers", Datatype::Int)
                .with_pattern("^[0-9]{2}$", "Two digits.")
                .optional(),
        );
        assert!(v.validate("", &fx.scope("app", "workers")).valid);
        assert!(!v.validate("7", &fx.scope("app", "workers")).valid);
    }

    #[test]
    fn test_required_empty_fails_pattern() {
        let fx = Fixture::new();
        let v = validator(FieldConfig::new("name", Datatype::String).with_pattern("[a-z]+", "Required."));
        assert_eq!(v.validate("", &fx.scope("app", "name")).message, "Required.");
    }

    #[test]
    fn test_int_and_bool_rules() {
        let fx = Fixture::new();
        let int = validator(FieldConfig::new("workers", Datatype::Int));
        let flag = validator(FieldConfig::new("enabled", Datatype::Bool));

        assert!(int.validate("12", &fx.scope("app", "workers")).valid);
        assert!(!int.validate("twelve", &fx.scope("app", "workers")).valid);
        assert!(flag.validate("false", &fx.scope("app", "enabled")).valid);
        assert!(!flag.validate("yes", &fx.scope("app", "enabled")).valid);
    }

    #[test]
    fn test_format_failure_short_circuits_uniqueness() {
        let mut fx = Fixture::new();
        fx.registered.insert("BAD".to_string());
        let v = validator(FieldConfig::new("domain", Datatype::Domain).with_pattern("^[a-z]+$", "Lowercase."));
        assert_eq!(v.validate("BAD", &fx.scope("app", "domain")).message, "Lowercase.");
    }

    #[test]
    fn test_domain_taken_by_other_step() {
        let mut fx = Fixture::new();
        fx.registry.claim("airflow", "domain", "shared");
        let v = validator(FieldConfig::new("domain", Datatype::Domain));

        let result = v.validate("shared", &fx.scope("console", "domain"));
        assert_eq!(result, ValidationResult::failure("Domain shared already used."));
    }

    #[test]
    fn test_own_claim_does_not_conflict() {
        let mut fx = Fixture::new();
        fx.registry.claim("airflow", "domain", "shared");
        let v = validator(FieldConfig::new("domain", Datatype::Domain));
        assert!(v.validate("shared", &fx.scope("airflow", "domain")).valid);
    }

    #[test]
    fn test_domain_taken_by_sibling() {
        let mut fx = Fixture::new();
        fx.siblings.set(
            "api_domain",
            FieldValue {
                value: "api".to_string(),
                valid: true,
                datatype: Datatype::Domain,
            },
        );
        fx.siblings.set(
            "title",
            FieldValue {
                value: "web".to_string(),
                valid: true,
                datatype: Datatype::String,
            },
        );
        let v = validator(FieldConfig::new("domain", Datatype::Domain));

        assert!(!v.validate("api", &fx.scope("app", "domain")).valid);
        // Only domain-typed siblings count
        assert!(v.validate("web", &fx.scope("app", "domain")).valid);
    }

    #[test]
    fn test_domain_taken_by_installed_application() {
        let mut fx = Fixture::new();
        fx.registered.insert("grafana.prod.acme.io".to_string());
        let v = validator(FieldConfig::new("domain", Datatype::Domain));
        assert!(!v.validate("grafana.prod.acme.io", &fx.scope("app", "domain")).valid);
    }
}
