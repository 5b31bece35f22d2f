//! Logic program scanner (spec.md §4.5): extracts `(relation_name,
//! location_type)` pairs a program references, in source order, duplicates
//! permitted.

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

use crate::relations::registry;

#[derive(Debug, Error, PartialEq)]
pub enum ScannerError {
    #[error("relation '{name}' has unsupported arity {arity} (only 1 and 2 are supported)")]
    UnsupportedArity { name: String, arity: usize },
}

/// One occurrence of a relation in a program: its name and, for arity-2
/// relations, the referenced location type.
pub type Mention = (String, Option<String>);

fn occurrence_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r#"([A-Za-z_][A-Za-z0-9_]*)\s*\(\s*X\s*(?:,\s*(?:'([^']*)'|"([^"]*)"|([A-Za-z_][A-Za-z0-9_]*)))?\s*\)"#,
        )
        .expect("literal regex is valid")
    })
}

/// Scans `program` for mentions of registered relations, in source order.
pub fn scan(program: &str) -> Result<Vec<Mention>, ScannerError> {
    let mut mentions = Vec::new();

    for captures in occurrence_pattern().captures_iter(program) {
        let name = &captures[1];
        if name == "landscape" {
            continue;
        }

        let Some(definition) = registry::lookup(name) else {
            continue;
        };

        let location_type = captures
            .get(2)
            .or_else(|| captures.get(3))
            .or_else(|| captures.get(4))
            .map(|m| m.as_str().to_string());

        match definition.arity() {
            1 if location_type.is_none() => mentions.push((name.to_string(), None)),
            2 if location_type.is_some() => mentions.push((name.to_string(), location_type)),
            1 | 2 => continue, // argument count doesn't match this relation's arity; not a mention
            arity => {
                return Err(ScannerError::UnsupportedArity { name: name.to_string(), arity })
            }
        }
    }

    Ok(mentions)
}
