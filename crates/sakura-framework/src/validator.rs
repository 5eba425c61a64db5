//! Attribute validators

use crate::diag::Diagnostic;
use serde_json::Value as Json;
use std::net::IpAddr;

/// Accepted IP address families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpVersion {
    V4,
    V6,
    Any,
}

/// Plan-time check on a single known attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum Validator {
    /// String length in characters, inclusive
    LengthBetween(usize, usize),
    /// String must be one of the listed values
    OneOf {
        values: Vec<String>,
        case_insensitive: bool,
    },
    /// Integer range, inclusive
    IntBetween(i64, i64),
    /// Number of list elements, inclusive
    SizeBetween(usize, usize),
    /// Sakura Cloud resource ID (decimal digits)
    SakuraId,
    /// IP address; the empty string passes
    IpAddress(IpVersion),
    /// IPv4/IPv6 network in CIDR notation
    Cidr,
    /// String must match the regular expression
    Regex { pattern: String, message: String },
    /// Duration string such as `20m`
    Duration,
}

impl Validator {
    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Validator::OneOf {
            values: values.into_iter().map(Into::into).collect(),
            case_insensitive: false,
        }
    }

    pub fn one_of_case_insensitive<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Validator::OneOf {
            values: values.into_iter().map(Into::into).collect(),
            case_insensitive: true,
        }
    }

    pub fn regex(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Validator::Regex {
            pattern: pattern.into(),
            message: message.into(),
        }
    }

    /// Check `value`, returning a diagnostic on failure
    pub fn validate(&self, path: &str, value: &Json) -> Option<Diagnostic> {
        let failure = match self {
            Validator::LengthBetween(min, max) => {
                let s = value.as_str()?;
                let len = s.chars().count();
                (len < *min || len > *max).then(|| {
                    format!(
                        "Attribute {} string length must be between {} and {}, got: {}",
                        path, min, max, len
                    )
                })
            }
            Validator::OneOf {
                values,
                case_insensitive,
            } => {
                let s = value.as_str()?;
                let found = values.iter().any(|v| {
                    if *case_insensitive {
                        v.eq_ignore_ascii_case(s)
                    } else {
                        v == s
                    }
                });
                (!found).then(|| {
                    format!(
                        "Attribute {} value must be one of: {:?}, got: {:?}",
                        path, values, s
                    )
                })
            }
            Validator::IntBetween(min, max) => {
                let n = value.as_i64()?;
                (n < *min || n > *max).then(|| {
                    format!(
                        "Attribute {} value must be between {} and {}, got: {}",
                        path, min, max, n
                    )
                })
            }
            Validator::SizeBetween(min, max) => {
                let items = value.as_array()?;
                (items.len() < *min || items.len() > *max).then(|| {
                    format!(
                        "Attribute {} list must contain between {} and {} elements, got: {}",
                        path,
                        min,
                        max,
                        items.len()
                    )
                })
            }
            Validator::SakuraId => {
                let s = value.as_str()?;
                (s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()))
                    .then(|| format!("Attribute {} must be a Sakura Cloud ID, got: {:?}", path, s))
            }
            Validator::IpAddress(version) => {
                let s = value.as_str()?;
                if s.is_empty() {
                    return None;
                }
                let ok = match s.parse::<IpAddr>() {
                    Ok(IpAddr::V4(_)) => *version != IpVersion::V6,
                    Ok(IpAddr::V6(_)) => *version != IpVersion::V4,
                    Err(_) => false,
                };
                (!ok).then(|| {
                    format!("Attribute {} must be a valid IP address, got: {:?}", path, s)
                })
            }
            Validator::Cidr => {
                let s = value.as_str()?;
                (!is_cidr(s)).then(|| {
                    format!(
                        "Attribute {} must be a network in CIDR notation, got: {:?}",
                        path, s
                    )
                })
            }
            Validator::Regex { pattern, message } => {
                let s = value.as_str()?;
                match regex::Regex::new(pattern) {
                    Ok(re) => (!re.is_match(s))
                        .then(|| format!("Attribute {} {}, got: {:?}", path, message, s)),
                    Err(e) => Some(format!("invalid pattern for {}: {}", path, e)),
                }
            }
            Validator::Duration => {
                let s = value.as_str()?;
                crate::timeouts::parse_duration(s)
                    .err()
                    .map(|e| format!("Attribute {} {}", path, e))
            }
        };

        failure.map(|detail| {
            Diagnostic::error("Invalid Attribute Value", detail).with_attribute(path)
        })
    }
}

fn is_cidr(s: &str) -> bool {
    let Some((addr, prefix)) = s.split_once('/') else {
        return false;
    };
    let Ok(prefix) = prefix.parse::<u8>() else {
        return false;
    };
    match addr.parse::<IpAddr>() {
        Ok(IpAddr::V4(_)) => prefix <= 32,
        Ok(IpAddr::V6(_)) => prefix <= 128,
        Err(_) => false,
    }
}
