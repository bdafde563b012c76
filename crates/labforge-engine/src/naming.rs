//! Name and path policy
//!
//! Pure functions deriving folder, VM and network names from specification
//! keys, instance indices and prefixes.

/// Prefix of every master folder and master VM
pub const MASTER_PREFIX: &str = "(MASTER) ";

/// Name of the folder holding the master tree, under the exercise root
pub const MASTER_FOLDER_NAME: &str = "MASTER-FOLDERS";

/// Separator between a generic network's name and its instance index
pub const GENERIC_SUFFIX: &str = "-GENERIC-";

/// Minimum width of numeric suffixes
pub const PAD_WIDTH: usize = 2;

/// Zero-pad `value` to two digits
#[inline]
#[must_use]
pub fn pad(value: u32) -> String {
    pad_to(value, PAD_WIDTH)
}

/// Zero-pad `value` to at least `width` digits
#[inline]
#[must_use]
pub fn pad_to(value: u32, width: usize) -> String {
    format!("{value:0width$}")
}

/// Name of the master of `service`
#[inline]
#[must_use]
pub fn master_name(service: &str) -> String {
    format!("{MASTER_PREFIX}{service}")
}

/// Diagnostic path of a master-phase segment below `path`
#[inline]
#[must_use]
pub fn master_path(path: &str, segment: &str) -> String {
    format!("{path}/{MASTER_PREFIX}{segment}")
}

/// Name of instance `index` of a folder multiplied `count` times
///
/// A single instance keeps the folder name, or the prefix when one is set.
/// Multiple instances get a zero-padded suffix: appended directly to an
/// explicit prefix, or after a space to the folder name.
#[must_use]
pub fn folder_instance_name(name: &str, prefix: Option<&str>, index: u32, count: u32) -> String {
    match (prefix, count > 1) {
        (Some(prefix), false) => prefix.to_string(),
        (None, false) => name.to_string(),
        (Some(prefix), true) => format!("{prefix}{}", pad(index)),
        (None, true) => format!("{name} {}", pad(index)),
    }
}

/// Name of instance `index` of a service multiplied `count` times
#[must_use]
pub fn service_instance_name(name: &str, prefix: Option<&str>, index: u32, count: u32) -> String {
    let prefix = prefix.unwrap_or_default();
    if count > 1 {
        format!("{prefix}{name} {}", pad(index))
    } else {
        format!("{prefix}{name}")
    }
}

/// Realized name of a generic network for one instance
#[inline]
#[must_use]
pub fn generic_network_name(name: &str, index: u32) -> String {
    format!("{name}{GENERIC_SUFFIX}{}", pad(index))
}

/// Join non-empty '/'-separated path parts
#[must_use]
pub fn join_path(parts: &[&str]) -> String {
    parts
        .iter()
        .flat_map(|part| part.split('/'))
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}
