//! Instance-count specification
//!
//! A folder or service may carry an `instances` key that is either a bare
//! integer or a mapping with an optional `prefix` and exactly one of
//! `number` or `size-of`.

use serde_yaml::Value;

/// Parsed `instances` value of a folder or service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceCount {
    /// Fixed number of instances
    Number {
        /// Requested instance count
        count: u32,
        /// Optional naming stem
        prefix: Option<String>,
    },
    /// As many instances as a group has members
    SizeOf {
        /// Referenced group
        group: String,
        /// Optional naming stem
        prefix: Option<String>,
    },
    /// Shape the engine cannot interpret; materializing the branch fails
    Malformed(String),
}

impl Default for InstanceCount {
    fn default() -> Self {
        Self::single()
    }
}

impl InstanceCount {
    /// One unprefixed instance, the value used when `instances` is absent
    #[inline]
    #[must_use]
    pub fn single() -> Self {
        Self::Number {
            count: 1,
            prefix: None,
        }
    }

    /// Fixed count without prefix
    #[inline]
    #[must_use]
    pub fn fixed(count: u32) -> Self {
        Self::Number {
            count,
            prefix: None,
        }
    }

    /// Read an `instances` value
    ///
    /// Never fails: shapes that cannot be interpreted become
    /// [`InstanceCount::Malformed`] so that only the affected branch is
    /// rejected at materialization time.
    #[must_use]
    pub fn from_yaml(value: &Value) -> Self {
        match value {
            Value::Number(n) => match n.as_u64().and_then(|n| u32::try_from(n).ok()) {
                Some(count) => Self::fixed(count),
                None => Self::Malformed(format!("instance count {n} is not a non-negative integer")),
            },
            Value::Mapping(map) => {
                let prefix = match map.get("prefix") {
                    None | Some(Value::Null) => None,
                    Some(Value::String(s)) => Some(s.clone()),
                    Some(Value::Number(n)) => Some(n.to_string()),
                    Some(other) => {
                        return Self::Malformed(format!("prefix must be a string, got {other:?}"))
                    }
                };
                match (map.get("number"), map.get("size-of")) {
                    (Some(_), Some(_)) => {
                        Self::Malformed("both 'number' and 'size-of' are set".to_string())
                    }
                    (Some(number), None) => {
                        match number.as_u64().and_then(|n| u32::try_from(n).ok()) {
                            Some(count) => Self::Number { count, prefix },
                            None => Self::Malformed(format!(
                                "'number' must be a non-negative integer, got {number:?}"
                            )),
                        }
                    }
                    (None, Some(Value::String(group))) => Self::SizeOf {
                        group: group.clone(),
                        prefix,
                    },
                    (None, Some(other)) => {
                        Self::Malformed(format!("'size-of' must name a group, got {other:?}"))
                    }
                    (None, None) => {
                        Self::Malformed("neither 'number' nor 'size-of' is set".to_string())
                    }
                }
            }
            other => Self::Malformed(format!("unknown instances specification: {other:?}")),
        }
    }

    /// Configured naming prefix, if any and non-empty
    #[must_use]
    pub fn prefix(&self) -> Option<&str> {
        match self {
            Self::Number { prefix, .. } | Self::SizeOf { prefix, .. } => {
                prefix.as_deref().filter(|p| !p.is_empty())
            }
            Self::Malformed(_) => None,
        }
    }
}
