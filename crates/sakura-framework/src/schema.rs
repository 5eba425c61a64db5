//! Resource schemas
//!
//! A [`Schema`] describes the attributes of a resource or data source and
//! catches invalid configuration before any vendor call is made. It also
//! builds planned values the way the host does: defaults are filled in and
//! computed attributes the user left out become unknown.

use crate::diag::{Diagnostic, Diagnostics};
use crate::validator::Validator;
use crate::value::UNKNOWN_SENTINEL;
use serde_json::{Map, Value as Json};
use std::collections::BTreeMap;

/// Attribute type
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeKind {
    String,
    Int,
    Bool,
    List(Box<AttributeKind>),
    Set(Box<AttributeKind>),
    Map(Box<AttributeKind>),
    /// Single nested object
    Object(BTreeMap<String, Attribute>),
    /// List of nested objects
    ListNested(BTreeMap<String, Attribute>),
}

impl AttributeKind {
    fn name(&self) -> &'static str {
        match self {
            AttributeKind::String => "string",
            AttributeKind::Int => "number",
            AttributeKind::Bool => "bool",
            AttributeKind::List(_) | AttributeKind::ListNested(_) => "list",
            AttributeKind::Set(_) => "set",
            AttributeKind::Map(_) => "map",
            AttributeKind::Object(_) => "object",
        }
    }
}

/// A single attribute
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub kind: AttributeKind,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    /// Value planned when the configuration leaves the attribute out
    pub default: Option<Json>,
    /// Changing the attribute forces a new remote object
    pub requires_replace: bool,
    pub validators: Vec<Validator>,
    pub description: String,
}

impl Attribute {
    pub fn new(kind: AttributeKind) -> Self {
        Self {
            kind,
            required: false,
            optional: false,
            computed: false,
            sensitive: false,
            default: None,
            requires_replace: false,
            validators: Vec::new(),
            description: String::new(),
        }
    }

    pub fn string() -> Self {
        Self::new(AttributeKind::String)
    }

    pub fn int() -> Self {
        Self::new(AttributeKind::Int)
    }

    pub fn bool() -> Self {
        Self::new(AttributeKind::Bool)
    }

    pub fn list_of(kind: AttributeKind) -> Self {
        Self::new(AttributeKind::List(Box::new(kind)))
    }

    pub fn set_of(kind: AttributeKind) -> Self {
        Self::new(AttributeKind::Set(Box::new(kind)))
    }

    pub fn map_of(kind: AttributeKind) -> Self {
        Self::new(AttributeKind::Map(Box::new(kind)))
    }

    pub fn object<'a>(attributes: impl IntoIterator<Item = (&'a str, Attribute)>) -> Self {
        Self::new(AttributeKind::Object(collect(attributes)))
    }

    pub fn list_nested<'a>(attributes: impl IntoIterator<Item = (&'a str, Attribute)>) -> Self {
        Self::new(AttributeKind::ListNested(collect(attributes)))
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Planned default; implies optional + computed
    pub fn default_value(mut self, value: impl Into<Json>) -> Self {
        self.default = Some(value.into());
        self.optional = true;
        self.computed = true;
        self
    }

    pub fn requires_replace(mut self) -> Self {
        self.requires_replace = true;
        self
    }

    pub fn validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = text.into();
        self
    }

    /// Computed and not settable from configuration
    pub fn is_read_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }
}

fn collect<'a>(
    attributes: impl IntoIterator<Item = (&'a str, Attribute)>,
) -> BTreeMap<String, Attribute> {
    attributes
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// Schema of a resource or data source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    pub description: String,
    pub attributes: BTreeMap<String, Attribute>,
}

impl Schema {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn attribute(mut self, name: &str, attribute: Attribute) -> Self {
        self.attributes.insert(name.to_string(), attribute);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// Attributes that force replacement when changed
    pub fn replace_triggers(&self) -> impl Iterator<Item = &str> {
        self.attributes
            .iter()
            .filter(|(_, a)| a.requires_replace)
            .map(|(k, _)| k.as_str())
    }

    /// Validate user configuration
    pub fn validate(&self, config: &Json) -> Diagnostics {
        let mut diags = Diagnostics::new();
        match config {
            Json::Object(map) => validate_object(&self.attributes, map, "", &mut diags),
            Json::Null => validate_object(&self.attributes, &Map::new(), "", &mut diags),
            other => diags.add_error(
                "Invalid Configuration",
                format!("expected an object, got: {}", other),
            ),
        }
        diags
    }

    /// Planned values for a new object
    ///
    /// Computed attributes absent from the configuration are unknown.
    pub fn plan_create(&self, config: &Json) -> Result<Json, Diagnostics> {
        self.plan(config, None)
    }

    /// Planned values for an in-place update
    ///
    /// Computed attributes absent from the configuration keep their prior value.
    pub fn plan_update(&self, config: &Json, prior: &Json) -> Result<Json, Diagnostics> {
        self.plan(config, Some(prior))
    }

    fn plan(&self, config: &Json, prior: Option<&Json>) -> Result<Json, Diagnostics> {
        let diags = self.validate(config);
        if diags.has_error() {
            return Err(diags);
        }
        let empty = Map::new();
        let config = config.as_object().unwrap_or(&empty);
        let prior = prior.and_then(Json::as_object);
        Ok(Json::Object(plan_object(&self.attributes, config, prior)))
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

fn is_unknown(value: &Json) -> bool {
    value.as_str() == Some(UNKNOWN_SENTINEL)
}

fn validate_object(
    attributes: &BTreeMap<String, Attribute>,
    config: &Map<String, Json>,
    prefix: &str,
    diags: &mut Diagnostics,
) {
    for key in config.keys() {
        if !attributes.contains_key(key) {
            diags.push(
                Diagnostic::error(
                    "Unsupported argument",
                    format!("An argument named {:?} is not expected here.", key),
                )
                .with_attribute(join(prefix, key)),
            );
        }
    }

    for (name, attribute) in attributes {
        let path = join(prefix, name);
        let value = config.get(name).unwrap_or(&Json::Null);

        if value.is_null() {
            if attribute.required {
                diags.push(
                    Diagnostic::error(
                        "Missing required argument",
                        format!(
                            "The argument {:?} is required, but no definition was found.",
                            path
                        ),
                    )
                    .with_attribute(path),
                );
            }
            continue;
        }
        if attribute.is_read_only() {
            diags.push(
                Diagnostic::error(
                    "Invalid Configuration for Read-Only Attribute",
                    format!(
                        "Cannot set value for this attribute as the provider will compute it: {}",
                        path
                    ),
                )
                .with_attribute(path),
            );
            continue;
        }
        validate_value(attribute, &attribute.kind, value, &path, diags);
    }
}

fn validate_value(
    attribute: &Attribute,
    kind: &AttributeKind,
    value: &Json,
    path: &str,
    diags: &mut Diagnostics,
) {
    if is_unknown(value) || value.is_null() {
        return;
    }
    let type_ok = match kind {
        AttributeKind::String => value.is_string(),
        AttributeKind::Int => value.is_i64() || value.is_u64(),
        AttributeKind::Bool => value.is_boolean(),
        AttributeKind::List(_) | AttributeKind::Set(_) | AttributeKind::ListNested(_) => {
            value.is_array()
        }
        AttributeKind::Map(_) | AttributeKind::Object(_) => value.is_object(),
    };
    if !type_ok {
        diags.push(
            Diagnostic::error(
                "Incorrect attribute value type",
                format!("Inappropriate value for attribute {:?}: {} required.", path, kind.name()),
            )
            .with_attribute(path),
        );
        return;
    }

    // validators skip values of a shape they do not apply to, so list-level
    // and element-level checks can share one list
    for validator in &attribute.validators {
        if let Some(diag) = validator.validate(path, value) {
            diags.push(diag);
        }
    }

    match (kind, value) {
        (AttributeKind::List(inner) | AttributeKind::Set(inner), Json::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                validate_value(attribute, inner, item, &format!("{}[{}]", path, i), diags);
            }
        }
        (AttributeKind::Map(inner), Json::Object(map)) => {
            for (k, item) in map {
                validate_value(attribute, inner, item, &format!("{}[{:?}]", path, k), diags);
            }
        }
        (AttributeKind::Object(nested), Json::Object(map)) => {
            validate_object(nested, map, path, diags);
        }
        (AttributeKind::ListNested(nested), Json::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                let item_path = format!("{}[{}]", path, i);
                match item {
                    Json::Object(map) => validate_object(nested, map, &item_path, diags),
                    _ => diags.push(
                        Diagnostic::error("Incorrect attribute value type", "object required")
                            .with_attribute(item_path),
                    ),
                }
            }
        }
        _ => {}
    }
}

fn plan_object(
    attributes: &BTreeMap<String, Attribute>,
    config: &Map<String, Json>,
    prior: Option<&Map<String, Json>>,
) -> Map<String, Json> {
    let mut planned = Map::new();
    for (name, attribute) in attributes {
        let configured = config.get(name).filter(|v| !v.is_null());
        let prior_value = prior.and_then(|p| p.get(name)).filter(|v| !v.is_null());

        let value = match (configured, &attribute.kind) {
            (Some(Json::Object(map)), AttributeKind::Object(nested)) => {
                let prior_nested = prior_value.and_then(Json::as_object);
                Json::Object(plan_object(nested, map, prior_nested))
            }
            (Some(Json::Array(items)), AttributeKind::ListNested(nested)) => Json::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        let prior_item = prior_value
                            .and_then(Json::as_array)
                            .and_then(|a| a.get(i))
                            .and_then(Json::as_object);
                        match item.as_object() {
                            Some(map) => Json::Object(plan_object(nested, map, prior_item)),
                            None => item.clone(),
                        }
                    })
                    .collect(),
            ),
            (Some(v), _) => v.clone(),
            (None, _) => match (&attribute.default, prior_value) {
                (Some(default), _) => default.clone(),
                (None, Some(prior)) if attribute.computed => prior.clone(),
                (None, None) if attribute.computed => Json::String(UNKNOWN_SENTINEL.to_string()),
                _ => Json::Null,
            },
        };
        planned.insert(name.clone(), value);
    }
    planned
}
