//! Dependency resolution: filters a blueprint's dependency entries by their
//! conditions and deduplicates the survivors. No filesystem access happens here.

use indexmap::IndexMap;
use log::debug;
use std::fmt;

use crate::blueprint::DependencyEntry;
use crate::context::GenerationContext;
use crate::error::{Error, Result};

/// An active dependency: identifier plus the single version it resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDependency {
    pub identifier: String,
    pub version: String,
}

impl fmt::Display for ResolvedDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.identifier, self.version)
    }
}

/// Returns the entries whose condition holds, one per identifier, in declaration order.
///
/// # Errors
/// * `Error::UndefinedVariable` / `Error::TypeMismatch` from condition evaluation
/// * `Error::DependencyConflict` if two active entries share an identifier but not a version
pub fn resolve(
    entries: &[DependencyEntry],
    context: &GenerationContext,
) -> Result<Vec<ResolvedDependency>> {
    let mut resolved: IndexMap<&str, &str> = IndexMap::new();

    for entry in entries {
        if let Some(condition) = &entry.condition {
            if !condition.evaluate(context)? {
                debug!("Dependency '{}' inactive: '{}' is false", entry.identifier, condition);
                continue;
            }
        }

        match resolved.get(entry.identifier.as_str()) {
            Some(&version) if version == entry.version => {
                debug!("Dependency '{}' declared more than once", entry.identifier);
            }
            Some(&version) => {
                return Err(Error::DependencyConflict {
                    identifier: entry.identifier.clone(),
                    first: version.to_string(),
                    second: entry.version.clone(),
                });
            }
            None => {
                resolved.insert(&entry.identifier, &entry.version);
            }
        }
    }

    Ok(resolved
        .into_iter()
        .map(|(identifier, version)| ResolvedDependency {
            identifier: identifier.to_string(),
            version: version.to_string(),
        })
        .collect())
}
