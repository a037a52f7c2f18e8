//! Cross-component detection.
//!
//! A component is the first path segment below the source prefix. A change
//! touching more than one component is flagged for the release engineer.

use tracing::debug;

/// The top-level component of `file` below `from_prefix`.
pub fn component_of<'f>(file: &'f str, from_prefix: &str) -> &'f str {
    let rest = file
        .strip_prefix(from_prefix)
        .map(|r| r.trim_start_matches('/'))
        .unwrap_or(file);
    rest.split('/').next().unwrap_or("")
}

/// Whether `files` span more than one component, ignoring any component that
/// contains one of `excluded`.
pub fn is_cross_component<'f, I>(files: I, from_prefix: &str, excluded: &[String]) -> bool
where
    I: IntoIterator<Item = &'f str>,
{
    let mut first: Option<&str> = None;
    for file in files {
        let component = component_of(file, from_prefix);
        debug!(component, "component compared");
        if excluded.iter().any(|x| component.contains(x.as_str())) {
            continue;
        }
        match first {
            None => first = Some(component),
            Some(seen) if seen != component => {
                debug!(seen, component, "components do not match");
                return true;
            }
            Some(_) => {}
        }
    }
    false
}
