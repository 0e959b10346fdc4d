//! Alias table — maps unit alias strings to their owning converter.
//!
//! Two separate namespaces exist, one per position group: aliases that
//! appear *before* the number (`$5`) and aliases that appear *after*
//! it (`5kg`). A duplicate alias within one group is a configuration
//! error detected at build time, never at lookup time.
//!
//! Tables are immutable once built. The delayed-initialization path
//! (currency) produces a *new* table via [`AliasTable::adopt`] so the
//! owner can publish it with a single assignment; readers only ever
//! see a complete table.

use std::collections::HashMap;
use std::fmt;

/// Where a unit token sits relative to the number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PositionGroup {
    /// Unit precedes the number (`$5`, `€20`).
    Prefix,
    /// Unit follows the number (`5kg`, `12in`).
    Suffix,
}

impl fmt::Display for PositionGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionGroup::Prefix => write!(f, "prefix"),
            PositionGroup::Suffix => write!(f, "suffix"),
        }
    }
}

/// A unit plus the alias strings that resolve to it.
///
/// Used only at table-build time; the table stores normalized aliases
/// and [`AliasTarget`]s.
#[derive(Debug, Clone)]
pub struct UnitDefinition {
    /// Canonical unit id. Also registered as an implicit suffix alias.
    pub unit_id: String,
    /// Aliases accepted before the number.
    pub prefix_aliases: Vec<String>,
    /// Aliases accepted after the number.
    pub suffix_aliases: Vec<String>,
}

impl UnitDefinition {
    pub fn new(
        unit_id: impl Into<String>,
        prefix_aliases: &[&str],
        suffix_aliases: &[&str],
    ) -> Self {
        Self {
            unit_id: unit_id.into(),
            prefix_aliases: prefix_aliases.iter().map(|a| a.to_string()).collect(),
            suffix_aliases: suffix_aliases.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Resolution result: the unit an alias names and the converter that
/// owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasTarget {
    pub converter: &'static str,
    pub unit_id: String,
}

/// Alias registration errors. Fatal: a collision means two converters
/// would silently steal each other's matches, so startup must abort.
#[derive(Debug, thiserror::Error)]
pub enum AliasError {
    #[error("alias {alias:?} in the {group} group is claimed by both {first} and {second}")]
    Duplicate {
        alias: String,
        group: PositionGroup,
        first: &'static str,
        second: &'static str,
    },
}

/// Normalize an alias for lookup: lowercase, all whitespace removed.
pub fn normalize(alias: &str) -> String {
    alias
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Alias → (unit, converter) mapping, one namespace per position group.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    prefix: HashMap<String, AliasTarget>,
    suffix: HashMap<String, AliasTarget>,
}

impl AliasTable {
    /// Build a table from `(converter name, unit definitions)` sets.
    ///
    /// Every unit's canonical id is registered as an implicit suffix
    /// alias. Fails on any normalized-alias collision within a group.
    pub fn build(sets: &[(&'static str, Vec<UnitDefinition>)]) -> Result<Self, AliasError> {
        let mut table = AliasTable::default();
        for (converter, defs) in sets {
            table.insert_definitions(converter, defs)?;
        }
        Ok(table)
    }

    /// Produce a new table with `owner`'s previous registrations
    /// replaced by `defs`.
    ///
    /// Safe to call when `owner` never registered anything (plain
    /// insert). The caller publishes the returned table with a single
    /// assignment; on error the old table stays in effect untouched.
    pub fn adopt(
        &self,
        owner: &'static str,
        defs: &[UnitDefinition],
    ) -> Result<AliasTable, AliasError> {
        let mut next = AliasTable {
            prefix: self
                .prefix
                .iter()
                .filter(|(_, t)| t.converter != owner)
                .map(|(a, t)| (a.clone(), t.clone()))
                .collect(),
            suffix: self
                .suffix
                .iter()
                .filter(|(_, t)| t.converter != owner)
                .map(|(a, t)| (a.clone(), t.clone()))
                .collect(),
        };
        next.insert_definitions(owner, defs)?;
        Ok(next)
    }

    /// Look up a (raw, un-normalized) alias in the given group.
    pub fn resolve(&self, group: PositionGroup, alias: &str) -> Option<&AliasTarget> {
        let key = normalize(alias);
        match group {
            PositionGroup::Prefix => self.prefix.get(&key),
            PositionGroup::Suffix => self.suffix.get(&key),
        }
    }

    fn insert_definitions(
        &mut self,
        converter: &'static str,
        defs: &[UnitDefinition],
    ) -> Result<(), AliasError> {
        for def in defs {
            // Canonical id is an implicit suffix alias.
            self.insert(PositionGroup::Suffix, &def.unit_id, converter, &def.unit_id)?;
            for alias in &def.prefix_aliases {
                self.insert(PositionGroup::Prefix, alias, converter, &def.unit_id)?;
            }
            for alias in &def.suffix_aliases {
                self.insert(PositionGroup::Suffix, alias, converter, &def.unit_id)?;
            }
        }
        Ok(())
    }

    fn insert(
        &mut self,
        group: PositionGroup,
        alias: &str,
        converter: &'static str,
        unit_id: &str,
    ) -> Result<(), AliasError> {
        let key = normalize(alias);
        let map = match group {
            PositionGroup::Prefix => &mut self.prefix,
            PositionGroup::Suffix => &mut self.suffix,
        };
        if let Some(existing) = map.get(&key) {
            // The same converter may list an alias twice (e.g. the
            // canonical id repeated in the alias list); that is not a
            // collision as long as it names the same unit.
            if existing.converter == converter && existing.unit_id == unit_id {
                return Ok(());
            }
            return Err(AliasError::Duplicate {
                alias: key,
                group,
                first: existing.converter,
                second: converter,
            });
        }
        map.insert(
            key,
            AliasTarget {
                converter,
                unit_id: unit_id.to_string(),
            },
        );
        Ok(())
    }
}
