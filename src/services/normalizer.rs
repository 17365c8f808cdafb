use std::collections::HashMap;

use crate::models::{PipelineError, Result};

/// Raw-to-canonical team name aliases used by the match source.
const PREMIER_LEAGUE_ALIASES: [(&str, &str); 6] = [
    ("Brighton and Hove Albion", "Brighton"),
    ("Manchester United", "Manchester Utd"),
    ("Newcastle United", "Newcastle Utd"),
    ("Tottenham Hotspur", "Tottenham"),
    ("West Ham United", "West Ham"),
    ("Wolverhampton Wanderers", "Wolves"),
];

/// Immutable team name lookup. Every alias points directly at a name that
/// is not itself an alias, so `normalize` is idempotent.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamNameTable {
    aliases: HashMap<String, String>,
}

impl TeamNameTable {
    /// Build a table, collapsing alias chains (`a -> b`, `b -> c` becomes
    /// `a -> c`). Cycles are rejected.
    pub fn new<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let raw: HashMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(k, v)| k != v)
            .collect();

        let mut aliases = HashMap::with_capacity(raw.len());
        for key in raw.keys() {
            let mut target = &raw[key];
            let mut hops = 0;
            while let Some(next) = raw.get(target) {
                hops += 1;
                if hops > raw.len() {
                    return Err(PipelineError::Config(format!(
                        "team alias cycle starting at '{}'",
                        key
                    )));
                }
                target = next;
            }
            aliases.insert(key.clone(), target.clone());
        }

        Ok(Self { aliases })
    }

    pub fn premier_league() -> Self {
        Self {
            aliases: PREMIER_LEAGUE_ALIASES
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Premier League defaults plus extra aliases; extras win on conflict.
    pub fn with_extra_aliases(extra: &[(String, String)]) -> Result<Self> {
        let mut pairs: HashMap<String, String> = PREMIER_LEAGUE_ALIASES
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        for (k, v) in extra {
            pairs.insert(k.clone(), v.clone());
        }
        Self::new(pairs)
    }

    /// Canonical form of `name`; unmapped names pass through unchanged.
    pub fn normalize(&self, name: &str) -> String {
        self.aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }
}

impl Default for TeamNameTable {
    fn default() -> Self {
        Self::premier_league()
    }
}

/// Parse `"Raw Name=Canonical;Other=Short"` into alias pairs.
pub fn parse_alias_list(input: &str) -> Result<Vec<(String, String)>> {
    input
        .split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (raw, canonical) = entry.split_once('=').ok_or_else(|| {
                PipelineError::Config(format!("team alias '{}' is missing '='", entry))
            })?;
            let (raw, canonical) = (raw.trim(), canonical.trim());
            if raw.is_empty() || canonical.is_empty() {
                return Err(PipelineError::Config(format!(
                    "team alias '{}' has an empty side",
                    entry
                )));
            }
            Ok((raw.to_string(), canonical.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maps_known_names() {
        let table = TeamNameTable::premier_league();
        assert_eq!(table.normalize("Manchester United"), "Manchester Utd");
        assert_eq!(table.normalize("Wolverhampton Wanderers"), "Wolves");
    }

    #[test]
    fn test_unmapped_names_pass_through() {
        let table = TeamNameTable::premier_league();
        assert_eq!(table.normalize("Arsenal"), "Arsenal");
        assert_eq!(table.normalize(""), "");
        assert_eq!(table.normalize("manchester united"), "manchester united");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let table = TeamNameTable::premier_league();
        for name in [
            "Manchester United",
            "Manchester Utd",
            "Tottenham Hotspur",
            "Arsenal",
            "",
            "Some Unknown FC",
        ] {
            let once = table.normalize(name);
            assert_eq!(table.normalize(&once), once);
        }
    }

    #[test]
    fn test_chains_collapse_to_final_name() {
        let table = TeamNameTable::new([("Spurs FC", "Tottenham Hotspur"), ("Tottenham Hotspur", "Tottenham")])
            .unwrap();
        assert_eq!(table.normalize("Spurs FC"), "Tottenham");
        assert_eq!(table.normalize(&table.normalize("Spurs FC")), "Tottenham");
    }

    #[test]
    fn test_cycle_is_rejected() {
        let err = TeamNameTable::new([("A", "B"), ("B", "A")]).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_extra_aliases_override_defaults() {
        let extra = parse_alias_list("Manchester United=Man Utd; Leeds United = Leeds").unwrap();
        let table = TeamNameTable::with_extra_aliases(&extra).unwrap();
        assert_eq!(table.normalize("Manchester United"), "Man Utd");
        assert_eq!(table.normalize("Leeds United"), "Leeds");
        assert_eq!(table.normalize("West Ham United"), "West Ham");
    }

    #[test]
    fn test_alias_list_requires_separator() {
        assert!(parse_alias_list("Leeds United").is_err());
        assert!(parse_alias_list("=Leeds").is_err());
        assert!(parse_alias_list("").unwrap().is_empty());
    }
}
