//! Merging per-application contexts into the install payload

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::core::context::StepContext;
use crate::core::datatype::Datatype;
use crate::core::project::ProjectContext;

/// Resolved configuration of one application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    pub key: String,
    pub context: BTreeMap<String, Value>,
}

/// The single payload handed to the install invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    applications: Vec<ApplicationConfig>,
    domains: BTreeSet<String>,
    buckets: BTreeSet<String>,
}

impl Aggregate {
    pub fn applications(&self) -> &[ApplicationConfig] {
        &self.applications
    }

    pub fn application(&self, key: &str) -> Option<&ApplicationConfig> {
        self.applications.iter().find(|app| app.key == key)
    }

    pub fn domains(&self) -> &BTreeSet<String> {
        &self.domains
    }

    pub fn buckets(&self) -> &BTreeSet<String> {
        &self.buckets
    }
}

pub struct ConfigurationAggregator;

impl ConfigurationAggregator {
    /// Resolve each application as `defaults ⊕ edited` and collect the
    /// domains and buckets the install will claim.
    pub fn aggregate<'a, I>(project: &ProjectContext, steps: I) -> Aggregate
    where
        I: IntoIterator<Item = (&'a str, &'a StepContext)>,
    {
        let mut applications = Vec::new();
        let mut domains = BTreeSet::new();
        let mut buckets = BTreeSet::new();

        for (key, edited) in steps {
            applications.push(ApplicationConfig {
                key: key.to_string(),
                context: Self::resolve(project.defaults(key), edited),
            });

            for (_, field) in edited.iter() {
                if field.value.is_empty() {
                    continue;
                }
                match field.datatype {
                    Datatype::Domain => {
                        domains.insert(field.value.clone());
                    }
                    Datatype::Bucket => {
                        buckets.insert(field.value.clone());
                    }
                    _ => {}
                }
            }
        }

        Aggregate {
            applications,
            domains,
            buckets,
        }
    }

    /// Edited values override defaults key by key
    pub fn resolve(
        mut defaults: BTreeMap<String, Value>,
        edited: &StepContext,
    ) -> BTreeMap<String, Value> {
        for (name, field) in edited.iter() {
            defaults.insert(name.to_string(), field.datatype.to_payload(&field.value));
        }
        defaults
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::FieldValue;
    use serde_json::json;

    fn field(value: &str, datatype: Datatype) -> FieldValue {
        FieldValue {
            value: value.to_string(),
            valid: true,
            datatype,
        }
    }

    #[test]
    fn test_edited_value_overrides_default() {
        let mut project = ProjectContext::default();
        project
            .configuration
            .entry("airflow".to_string())
            .or_default()
            .insert("key".to_string(), json!("v1"));

        let mut edited = StepContext::new();
        edited.set("key", field("v2", Datatype::String));

        let aggregate = ConfigurationAggregator::aggregate(&project, [("airflow", &edited)]);
        let airflow = aggregate.application("airflow").unwrap();
        assert_eq!(airflow.context, BTreeMap::from([("key".to_string(), json!("v2"))]));
    }

    #[test]
    fn test_defaults_fill_missing_keys() {
        let mut project = ProjectContext::default();
        let defaults = project.configuration.entry("airflow".to_string()).or_default();
        defaults.insert("key".to_string(), json!("v1"));
        defaults.insert("replicas".to_string(), json!(2));

        let mut edited = StepContext::new();
        edited.set("key", field("v2", Datatype::String));
        edited.set("workers", field("4", Datatype::Int));

        let aggregate = ConfigurationAggregator::aggregate(&project, [("airflow", &edited)]);
        let context = &aggregate.application("airflow").unwrap().context;
        assert_eq!(context.get("key"), Some(&json!("v2")));
        assert_eq!(context.get("replicas"), Some(&json!(2)));
        assert_eq!(context.get("workers"), Some(&json!(4)));
    }

    #[test]
    fn test_collects_domains_and_buckets() {
        let project = ProjectContext::default();
        let mut airflow = StepContext::new();
        airflow.set("domain", field("flows.acme.io", Datatype::Domain));
        airflow.set("logs", field("acme-prod-logs", Datatype::Bucket));
        let mut console = StepContext::new();
        console.set("domain", field("console.acme.io", Datatype::Domain));
        console.set("extra_domain", field("", Datatype::Domain));

        let aggregate = ConfigurationAggregator::aggregate(
            &project,
            [("airflow", &airflow), ("console", &console)],
        );

        assert_eq!(aggregate.applications().len(), 2);
        assert_eq!(aggregate.applications()[0].key, "airflow");
        assert_eq!(
            aggregate.domains().iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["console.acme.io", "flows.acme.io"]
        );
        assert_eq!(aggregate.buckets().len(), 1);
    }
}
