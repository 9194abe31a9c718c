//! Name-based gender inference.
//!
//! The first token of a display name is looked up in a reference table of
//! first names. The table is loaded once at startup and shared read-only;
//! a name that is missing or marked androgynous maps to
//! [`GenderLabel::Unknown`], which is a normal outcome rather than an error.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Gender signal derived from a display name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenderLabel {
    Male,
    Female,
    Unknown,
}

impl GenderLabel {
    /// Ordinal encoding fixed at training time
    pub fn ordinal(self) -> f32 {
        match self {
            GenderLabel::Female => -1.0,
            GenderLabel::Unknown => 0.0,
            GenderLabel::Male => 1.0,
        }
    }

    /// Parse a reference-table marker.
    ///
    /// Androgynous markers map to `Unknown`; unrecognised markers yield `None`.
    fn from_marker(marker: &str) -> Option<Self> {
        match marker.trim().to_lowercase().as_str() {
            "m" | "male" => Some(GenderLabel::Male),
            "f" | "female" => Some(GenderLabel::Female),
            "?" | "u" | "unisex" | "unknown" | "andy" => Some(GenderLabel::Unknown),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct NameRow {
    name: String,
    gender: String,
}

/// First name → gender reference table
#[derive(Debug, Clone, Default)]
pub struct NameTable {
    names: HashMap<String, GenderLabel>,
}

impl NameTable {
    /// Build a table from `(name, label)` pairs
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, GenderLabel)>,
    {
        let names = pairs
            .into_iter()
            .map(|(name, label)| (normalize_token(name), label))
            .filter(|(name, _)| !name.is_empty())
            .collect();
        Self { names }
    }

    /// Load a `name,gender` CSV file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open name table {}", path.display()))?;
        let table = Self::from_reader(file)
            .with_context(|| format!("Failed to read name table {}", path.display()))?;

        info!(path = %path.display(), names = table.len(), "Name table loaded");
        Ok(table)
    }

    /// Parse CSV with a `name,gender` header. Malformed rows are skipped.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .flexible(true)
            .comment(Some(b'#'))
            .from_reader(reader);

        let mut names = HashMap::new();
        for (line, row) in csv_reader.deserialize::<NameRow>().enumerate() {
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    warn!(row = line + 1, error = %e, "Skipping malformed name table row");
                    continue;
                }
            };

            let Some(label) = GenderLabel::from_marker(&row.gender) else {
                warn!(row = line + 1, marker = %row.gender, "Skipping unknown gender marker");
                continue;
            };

            let key = normalize_token(&row.name);
            if !key.is_empty() {
                names.insert(key, label);
            }
        }

        Ok(Self { names })
    }

    /// Look up an already normalised token
    pub fn get(&self, token: &str) -> Option<GenderLabel> {
        self.names.get(token).copied()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Lowercase a token and strip surrounding punctuation
fn normalize_token(token: &str) -> String {
    token
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

const FEMALE_ENDINGS: [char; 4] = ['a', 'e', 'i', 'y'];
const MALE_ENDINGS: [char; 5] = ['o', 'r', 's', 't', 'n'];

/// Derives a [`GenderLabel`] from a display name
#[derive(Debug, Clone)]
pub struct GenderInferer {
    table: Arc<NameTable>,
    /// Guess from name endings when the token is not in the table
    suffix_fallback: bool,
}

impl GenderInferer {
    pub fn new(table: Arc<NameTable>) -> Self {
        Self {
            table,
            suffix_fallback: false,
        }
    }

    pub fn with_suffix_fallback(mut self, enabled: bool) -> Self {
        self.suffix_fallback = enabled;
        self
    }

    /// Infer gender from a display name. Never fails.
    pub fn infer(&self, name: &str) -> GenderLabel {
        let Some(first) = name.split_whitespace().next() else {
            return GenderLabel::Unknown;
        };

        let token = normalize_token(first);
        if token.is_empty() {
            return GenderLabel::Unknown;
        }

        match self.table.get(&token) {
            Some(label) => label,
            None if self.suffix_fallback => guess_from_ending(&token),
            None => GenderLabel::Unknown,
        }
    }

    pub fn table(&self) -> &NameTable {
        &self.table
    }
}

fn guess_from_ending(token: &str) -> GenderLabel {
    match token.chars().last() {
        Some(c) if FEMALE_ENDINGS.contains(&c) => GenderLabel::Female,
        Some(c) if MALE_ENDINGS.contains(&c) => GenderLabel::Male,
        _ => GenderLabel::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inferer() -> GenderInferer {
        let table = NameTable::from_pairs([
            ("John", GenderLabel::Male),
            ("maria", GenderLabel::Female),
            ("alex", GenderLabel::Unknown),
            ("Zoë", GenderLabel::Female),
            ("Юлия", GenderLabel::Female),
        ]);
        GenderInferer::new(Arc::new(table))
    }

    #[test]
    fn test_first_token_lookup() {
        let inferer = inferer();
        assert_eq!(inferer.infer("John Smith"), GenderLabel::Male);
        assert_eq!(inferer.infer("  MARIA   de la Cruz"), GenderLabel::Female);
        assert_eq!(inferer.infer("zoë"), GenderLabel::Female);
        assert_eq!(inferer.infer("ЮЛИЯ Иванова"), GenderLabel::Female);
        assert_eq!(inferer.infer("john,"), GenderLabel::Male);
    }

    #[test]
    fn test_unmatched_is_unknown() {
        let inferer = inferer();
        assert_eq!(inferer.infer(""), GenderLabel::Unknown);
        assert_eq!(inferer.infer("   "), GenderLabel::Unknown);
        assert_eq!(inferer.infer("🙂 🙂"), GenderLabel::Unknown);
        assert_eq!(inferer.infer("Bartholomew"), GenderLabel::Unknown);
        assert_eq!(inferer.infer("Alex Turner"), GenderLabel::Unknown);
    }

    #[test]
    fn test_pure_across_calls() {
        let inferer = inferer();
        let first = inferer.infer("Maria");
        for _ in 0..10 {
            assert_eq!(inferer.infer("Maria"), first);
        }
    }

    #[test]
    fn test_suffix_fallback_only_for_missing_names() {
        let inferer = inferer().with_suffix_fallback(true);
        assert_eq!(inferer.infer("Priya"), GenderLabel::Female);
        assert_eq!(inferer.infer("Carlos"), GenderLabel::Male);
        assert_eq!(inferer.infer("Xiu"), GenderLabel::Unknown);
        // androgynous table entries are never overridden
        assert_eq!(inferer.infer("Alex"), GenderLabel::Unknown);
    }

    #[test]
    fn test_csv_table() {
        let csv = "name,gender\n# comment\nJohn,M\nMaria,female\nSam,?\nBroken\nKim,x\n";
        let table = NameTable::from_reader(csv.as_bytes()).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.get("john"), Some(GenderLabel::Male));
        assert_eq!(table.get("maria"), Some(GenderLabel::Female));
        assert_eq!(table.get("sam"), Some(GenderLabel::Unknown));
        assert_eq!(table.get("kim"), None);
    }

    #[test]
    fn test_ordinal_encoding() {
        assert_eq!(GenderLabel::Female.ordinal(), -1.0);
        assert_eq!(GenderLabel::Unknown.ordinal(), 0.0);
        assert_eq!(GenderLabel::Male.ordinal(), 1.0);
    }
}
