//! Exact name lookup over listed records
//!
//! Services without server-side search are listed and filtered here. An
//! ambiguous name is an error rather than a silent pick.

use thiserror::Error;

/// Records that carry a display name
pub trait Named {
    fn name(&self) -> &str;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("no result")]
    NoResult,

    #[error("multiple {kind} resources found with the same condition. name={name:?}")]
    Multiple { kind: String, name: String },
}

/// Return the single record named `name`
///
/// `kind` names the resource in the ambiguity error, e.g. `CloudHSM`.
pub fn filter_by_name<'a, T: Named>(
    items: &'a [T],
    name: &str,
    kind: &str,
) -> Result<&'a T, FilterError> {
    let mut matches = items.iter().filter(|item| item.name() == name);
    let first = matches.next().ok_or(FilterError::NoResult)?;
    if matches.next().is_some() {
        return Err(FilterError::Multiple {
            kind: kind.to_string(),
            name: name.to_string(),
        });
    }
    Ok(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Item(&'static str, u32);

    impl Named for Item {
        fn name(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn test_single_match() {
        let items = [Item("a", 1), Item("b", 2)];
        assert_eq!(filter_by_name(&items, "b", "Item").unwrap().1, 2);
    }

    #[test]
    fn test_no_match() {
        let items = [Item("a", 1)];
        assert_eq!(
            filter_by_name(&items, "c", "Item").unwrap_err(),
            FilterError::NoResult
        );
        assert_eq!(FilterError::NoResult.to_string(), "no result");
    }

    #[test]
    fn test_multiple_matches() {
        let items = [Item("a", 1), Item("a", 2)];
        let err = filter_by_name(&items, "a", "Item").unwrap_err();
        assert_eq!(
            err.to_string(),
            "multiple Item resources found with the same condition. name=\"a\""
        );
    }
}
