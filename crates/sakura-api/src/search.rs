//! Search conditions for IaaS list APIs

use serde::{Deserialize, Serialize};

/// Records that can be matched by a [`FindCondition`]
pub trait Searchable {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn tags(&self) -> &[String] {
        &[]
    }
}

/// Filter accepted by the `find` operations
///
/// Names match partially and every given name must match. Tags must all be
/// present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindCondition {
    #[serde(rename = "ID", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "Name", default, skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<String>,

    #[serde(rename = "Tags", default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl FindCondition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn matches<T: Searchable>(&self, item: &T) -> bool {
        if let Some(id) = &self.id {
            if item.id() != id {
                return false;
            }
        }
        let names_ok = self.names.iter().all(|n| item.name().contains(n.as_str()));
        let tags_ok = self.tags.iter().all(|t| item.tags().contains(t));
        names_ok && tags_ok
    }

    pub fn apply<'a, T: Searchable>(&self, items: impl IntoIterator<Item = &'a T>) -> Vec<&'a T>
    where
        T: 'a,
    {
        items.into_iter().filter(|item| self.matches(*item)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Rec {
        id: &'static str,
        name: &'static str,
        tags: Vec<String>,
    }

    impl Searchable for Rec {
        fn id(&self) -> &str {
            self.id
        }
        fn name(&self) -> &str {
            self.name
        }
        fn tags(&self) -> &[String] {
            &self.tags
        }
    }

    fn records() -> Vec<Rec> {
        vec![
            Rec {
                id: "1",
                name: "web-front",
                tags: vec!["prod".into(), "web".into()],
            },
            Rec {
                id: "2",
                name: "web-back",
                tags: vec!["dev".into()],
            },
        ]
    }

    #[test]
    fn test_partial_name_match() {
        let recs = records();
        let cond = FindCondition::new().with_name("web");
        assert_eq!(cond.apply(&recs).len(), 2);

        let cond = FindCondition::new().with_name("web").with_name("front");
        let found = cond.apply(&recs);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "1");
    }

    #[test]
    fn test_tags_and_id() {
        let recs = records();
        let cond = FindCondition::new().with_tags(["prod", "web"]);
        assert_eq!(cond.apply(&recs).len(), 1);

        let cond = FindCondition::new().with_id("2").with_tags(["prod"]);
        assert!(cond.apply(&recs).is_empty());
    }
}
