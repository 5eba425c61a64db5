//! Attribute builders and flatten helpers shared by resources

use chrono::{DateTime, SecondsFormat, Utc};
use sakura_framework::{Attribute, AttributeKind, Diagnostic, Validator, Value};
use serde::{Deserialize, Serialize};

/// Tag prefixes the platform adds on its own
const SYSTEM_TAG_PREFIXES: [&str; 2] = ["@previous-id", "@appliance-"];

pub fn schema_id(name: &str) -> Attribute {
    Attribute::string()
        .computed()
        .description(format!("The ID of the {}.", name))
}

pub fn schema_name(name: &str) -> Attribute {
    Attribute::string()
        .required()
        .validator(Validator::LengthBetween(1, 64))
        .description(format!("The name of the {}.", name))
}

pub fn schema_description(name: &str) -> Attribute {
    Attribute::string()
        .optional()
        .computed()
        .validator(Validator::LengthBetween(1, 512))
        .description(format!(
            "The description of the {}. The length of this value must be in the range [1-512]",
            name
        ))
}

pub fn schema_tags(name: &str) -> Attribute {
    Attribute::set_of(AttributeKind::String)
        .optional()
        .computed()
        .description(format!("The tags of the {}.", name))
}

pub fn schema_icon_id(name: &str) -> Attribute {
    Attribute::string()
        .optional()
        .validator(Validator::SakuraId)
        .description(format!("The icon id to attach to the {}", name))
}

pub fn schema_zone(name: &str) -> Attribute {
    Attribute::string()
        .optional()
        .computed()
        .requires_replace()
        .description(format!(
            "The name of zone that the {} will be created (e.g. `is1a`, `tk1a`)",
            name
        ))
}

/// `timeouts` block
pub fn schema_timeouts() -> Attribute {
    let op = || Attribute::string().optional().validator(Validator::Duration);
    Attribute::object([
        ("create", op()),
        ("read", op()),
        ("update", op()),
        ("delete", op()),
    ])
    .optional()
    .description("Operation timeouts such as `20m` or `1h30m`")
}

pub fn schema_data_source_id(name: &str) -> Attribute {
    Attribute::string()
        .optional()
        .computed()
        .validator(Validator::SakuraId)
        .description(format!("The ID of the {}.", name))
}

pub fn schema_data_source_name(name: &str) -> Attribute {
    Attribute::string()
        .optional()
        .computed()
        .description(format!("The name of the {}.", name))
}

pub fn schema_data_source_computed(description: String) -> Attribute {
    Attribute::string().computed().description(description)
}

pub fn schema_data_source_tags(name: &str) -> Attribute {
    Attribute::set_of(AttributeKind::String)
        .computed()
        .description(format!("The tags of the {}.", name))
}

pub fn schema_data_source_zone(name: &str) -> Attribute {
    Attribute::string()
        .optional()
        .computed()
        .description(format!("The name of zone that the {} is in (e.g. `is1a`, `tk1a`)", name))
}

/// `filter { id, names, tags }` for IaaS data sources
pub fn schema_filter() -> Attribute {
    Attribute::object([
        (
            "id",
            Attribute::string()
                .optional()
                .description("The resource id on SakuraCloud used for filtering"),
        ),
        (
            "names",
            Attribute::list_of(AttributeKind::String).optional().description(
                "The resource names on SakuraCloud used for filtering. If multiple values are specified, they combined as AND condition",
            ),
        ),
        (
            "tags",
            Attribute::set_of(AttributeKind::String).optional().description(
                "The resource tags on SakuraCloud used for filtering. If multiple values are specified, they combined as AND condition",
            ),
        ),
    ])
    .optional()
    .description("One or more values used for filtering")
}

/// Data source `filter` block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterBlock {
    pub id: Value<String>,
    pub names: Value<Vec<String>>,
    pub tags: Value<Vec<String>>,
}

impl FilterBlock {
    pub fn to_condition(&self) -> sakura_api::FindCondition {
        let mut condition = sakura_api::FindCondition::new();
        if let Some(id) = self.id.as_str().filter(|id| !id.is_empty()) {
            condition = condition.with_id(id);
        }
        for name in self.names.as_known().into_iter().flatten() {
            condition = condition.with_name(name.clone());
        }
        if let Some(tags) = self.tags.as_known() {
            condition = condition.with_tags(tags.iter().cloned());
        }
        condition
    }
}

/// Find condition of an IaaS data source
pub fn find_condition(filter: &Value<FilterBlock>) -> sakura_api::FindCondition {
    filter
        .as_known()
        .map(FilterBlock::to_condition)
        .unwrap_or_default()
}

/// The single diagnostic reported when a lookup matches nothing
pub fn filter_no_result() -> Diagnostic {
    Diagnostic::error(
        "Filter No Result",
        "Your query returned no results. Please change your filter or selectors and try again",
    )
}

/// Tags as stored in state, without the ones the platform adds
pub fn flatten_tags(tags: &[String]) -> Value<Vec<String>> {
    Value::Known(
        tags.iter()
            .filter(|t| !SYSTEM_TAG_PREFIXES.iter().any(|p| t.starts_with(p)))
            .cloned()
            .collect(),
    )
}

pub fn expand_tags(tags: &Value<Vec<String>>) -> Vec<String> {
    tags.value_or_default()
}

/// Empty icon IDs are stored as null
pub fn flatten_icon_id(icon_id: &str) -> Value<String> {
    Value::string_or_null(icon_id)
}

pub fn expand_string(value: &Value<String>) -> String {
    value.value_or_default()
}

/// RFC 3339 timestamp as stored in state
pub fn flatten_time(time: &DateTime<Utc>) -> Value<String> {
    Value::Known(time.to_rfc3339_opts(SecondsFormat::Secs, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_tags_drops_system_tags() {
        let tags = vec![
            "web".to_string(),
            "@previous-id=113000000001".to_string(),
            "@appliance-nlb".to_string(),
            "prod".to_string(),
        ];
        assert_eq!(
            flatten_tags(&tags),
            Value::Known(vec!["web".to_string(), "prod".to_string()])
        );
    }

    #[test]
    fn test_flatten_icon_id() {
        assert_eq!(flatten_icon_id(""), Value::Null);
        assert_eq!(flatten_icon_id("1"), Value::known("1"));
    }

    #[test]
    fn test_filter_block_condition() {
        let filter: FilterBlock =
            serde_json::from_value(json!({"names": ["web", "front"], "tags": ["prod"]})).unwrap();
        let condition = filter.to_condition();
        assert_eq!(condition.names, vec!["web", "front"]);
        assert_eq!(condition.tags, vec!["prod"]);
        assert!(condition.id.is_none());

        assert_eq!(find_condition(&Value::Null), sakura_api::FindCondition::new());
    }

    #[test]
    fn test_flatten_time() {
        let t = DateTime::parse_from_rfc3339("2025-04-01T09:30:00+09:00")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(flatten_time(&t), Value::known("2025-04-01T00:30:00Z"));
    }

    #[test]
    fn test_name_attribute_limits() {
        let attr = schema_name("Bridge");
        assert!(attr.required);
        assert!(
            attr.validators[0]
                .validate("name", &json!("x".repeat(65)))
                .is_some()
        );
    }
}
