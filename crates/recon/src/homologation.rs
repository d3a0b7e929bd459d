//! Homologation table: translation from provider service codes to the
//! insurer's canonical product codes.
//!
//! Lookups are pure and never fail; every non-resolvable input yields `None`.
//! Per-insurer behaviour is expressed only through [`HomologationPolicy`] and
//! the two resolution capabilities, [`HomologationTable::resolve_direct`] and
//! [`HomologationTable::resolve_validated`].

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::config::{HomologationColumns, HomologationPolicy};
use crate::error::GlosaError;
use crate::model::Table;

/// Spreadsheet null markers, compared case-insensitively.
pub const NULL_MARKERS: [&str; 4] = ["nan", "none", "null", "<na>"];

pub fn is_null_marker(s: &str) -> bool {
    NULL_MARKERS.iter().any(|m| s.eq_ignore_ascii_case(m))
}

/// Canonical codes that mean "no translation".
fn is_absent(code: &str) -> bool {
    code.is_empty() || code == "0" || is_null_marker(code)
}

/// Significant decimal digits of `s`: ASCII digits concatenated, leading
/// zeros dropped. All-zero input yields `"0"`; digit-free input yields `""`.
pub fn digits(s: &str) -> String {
    let all: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
    if all.is_empty() {
        return all;
    }
    let trimmed = all.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

// ---------------------------------------------------------------------------
// Billing universe
// ---------------------------------------------------------------------------

/// Codes the insurer accepts on settlement, in first-encountered order.
#[derive(Debug, Clone, Default)]
pub struct BillingUniverse {
    codes: Vec<String>,
    members: HashSet<String>,
    by_digits: HashMap<String, usize>,
}

impl BillingUniverse {
    /// Stripped, non-empty, non-`"0"` codes; duplicates keep their first position.
    pub fn from_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut universe = Self::default();
        for code in codes {
            let code = code.as_ref().trim();
            if is_absent(code) || universe.members.contains(code) {
                continue;
            }
            let idx = universe.codes.len();
            let d = digits(code);
            if !d.is_empty() {
                universe.by_digits.entry(d).or_insert(idx);
            }
            universe.members.insert(code.to_string());
            universe.codes.push(code.to_string());
        }
        universe
    }

    pub fn contains(&self, code: &str) -> bool {
        self.members.contains(code)
    }

    /// Membership first, then the first code sharing its digits.
    pub fn validate(&self, canonical: &str) -> Option<&str> {
        if let Some(code) = self.members.get(canonical) {
            return Some(code.as_str());
        }
        let d = digits(canonical);
        if d.is_empty() {
            return None;
        }
        self.by_digits.get(&d).map(|&i| self.codes[i].as_str())
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.codes.iter().map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomologationEntry {
    pub source_code: String,
    pub canonical_code: String,
    /// Billing-facing code on the same row; empty when the sheet has none.
    pub billing_code: String,
}

#[derive(Debug, Clone)]
pub struct HomologationTable {
    entries: Vec<HomologationEntry>,
    exact: HashMap<String, usize>,
    by_digits: HashMap<String, usize>,
    ambiguous: Vec<(String, usize)>,
    billing: Option<BillingUniverse>,
}

impl HomologationTable {
    /// Index a loaded homologation sheet.
    ///
    /// With `validate_against_billing_universe` the billing column becomes
    /// required and its values form the [`BillingUniverse`].
    pub fn from_table(
        table: &Table,
        columns: &HomologationColumns,
        policy: HomologationPolicy,
    ) -> Result<Self, GlosaError> {
        let mut required = vec![columns.source_code.as_str(), columns.canonical_code.as_str()];
        if policy.validate_against_billing_universe {
            required.push(columns.billing_code.as_str());
        }
        let missing = table.missing_columns(&required[..]);
        if !missing.is_empty() {
            return Err(GlosaError::MissingHomologationColumns { columns: missing });
        }

        let src = table.column_index(&columns.source_code).unwrap_or_default();
        let canon = table.column_index(&columns.canonical_code).unwrap_or_default();
        let bill = table.column_index(&columns.billing_code);
        let entries = table
            .rows()
            .iter()
            .map(|row| HomologationEntry {
                source_code: row[src].as_key(),
                canonical_code: row[canon].as_key(),
                billing_code: bill.map(|b| row[b].as_key()).unwrap_or_default(),
            })
            .collect();

        let billing = if policy.validate_against_billing_universe {
            table
                .column_index(&columns.billing_code)
                .map(|b| BillingUniverse::from_codes(table.rows().iter().map(|row| row[b].as_key())))
        } else {
            None
        };

        Ok(Self::from_entries(entries, billing))
    }

    pub fn from_entries(entries: Vec<HomologationEntry>, billing: Option<BillingUniverse>) -> Self {
        let mut exact: HashMap<String, usize> = HashMap::new();
        let mut by_digits: HashMap<String, usize> = HashMap::new();
        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut first_seen: Vec<&str> = Vec::new();

        for (i, entry) in entries.iter().enumerate() {
            let code = entry.source_code.as_str();
            if code.is_empty() || is_null_marker(code) {
                continue;
            }
            exact.entry(code.to_string()).or_insert(i);
            let d = digits(code);
            if !d.is_empty() {
                by_digits.entry(d).or_insert(i);
            }
            let count = counts.entry(code).or_insert(0);
            if *count == 0 {
                first_seen.push(code);
            }
            *count += 1;
        }

        let ambiguous = first_seen
            .into_iter()
            .filter_map(|code| {
                let rows = counts[code];
                (rows > 1).then(|| (code.to_string(), rows))
            })
            .collect();

        Self {
            entries,
            exact,
            by_digits,
            ambiguous,
            billing,
        }
    }

    /// Exact match, then digits-only match; the row and its usable canonical code.
    fn canonical_for(&self, code: &str) -> Option<(&HomologationEntry, &str)> {
        let s = code.trim();
        if s.is_empty() || is_null_marker(s) {
            return None;
        }
        let row = match self.exact.get(s) {
            Some(&i) => i,
            None => {
                let d = digits(s);
                if d.is_empty() {
                    return None;
                }
                *self.by_digits.get(&d)?
            }
        };
        let entry = &self.entries[row];
        let canonical = entry.canonical_code.trim();
        if is_absent(canonical) {
            None
        } else {
            Some((entry, canonical))
        }
    }

    /// Translation without billing validation.
    pub fn resolve_direct(&self, code: &str) -> Option<String> {
        self.canonical_for(code).map(|(_, c)| c.to_string())
    }

    /// Translation validated against `universe`, allowing leading-zero and
    /// punctuation drift between the two catalogs.
    ///
    /// The canonical code is accepted as-is when it is itself billable or when
    /// its row carries a billable code; otherwise the first billing code
    /// sharing its digits replaces it.
    pub fn resolve_validated(&self, code: &str, universe: &BillingUniverse) -> Option<String> {
        let (entry, canonical) = self.canonical_for(code)?;
        if universe.contains(entry.billing_code.trim()) {
            return Some(canonical.to_string());
        }
        universe.validate(canonical).map(str::to_string)
    }

    pub fn billing_universe(&self) -> Option<&BillingUniverse> {
        self.billing.as_ref()
    }

    /// Source codes carried by more than one row, with their row counts.
    pub fn ambiguous_codes(&self) -> &[(String, usize)] {
        &self.ambiguous
    }

    pub fn ambiguity_errors(&self) -> Vec<GlosaError> {
        self.ambiguous
            .iter()
            .map(|(code, rows)| GlosaError::AmbiguousHomologation {
                code: code.clone(),
                rows: *rows,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Resolvers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HomologationMode {
    Validated,
    Direct,
    Disabled,
}

impl std::fmt::Display for HomologationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validated => write!(f, "validated"),
            Self::Direct => write!(f, "direct"),
            Self::Disabled => write!(f, "disabled"),
        }
    }
}

/// The lookup capability the consolidator consumes.
pub trait CodeResolver {
    fn lookup(&self, code: &str) -> Option<String>;
    fn mode(&self) -> HomologationMode;
}

pub struct DirectResolver<'a> {
    table: &'a HomologationTable,
}

impl CodeResolver for DirectResolver<'_> {
    fn lookup(&self, code: &str) -> Option<String> {
        self.table.resolve_direct(code)
    }

    fn mode(&self) -> HomologationMode {
        HomologationMode::Direct
    }
}

pub struct ValidatedResolver<'a> {
    table: &'a HomologationTable,
    universe: &'a BillingUniverse,
}

impl CodeResolver for ValidatedResolver<'_> {
    fn lookup(&self, code: &str) -> Option<String> {
        self.table.resolve_validated(code, self.universe)
    }

    fn mode(&self) -> HomologationMode {
        HomologationMode::Validated
    }
}

/// Resolver used when the homologation table could not be loaded.
pub struct NoHomologation;

impl CodeResolver for NoHomologation {
    fn lookup(&self, _code: &str) -> Option<String> {
        None
    }

    fn mode(&self) -> HomologationMode {
        HomologationMode::Disabled
    }
}

/// Wire the capability matching `policy`.
pub fn resolver_for<'a>(
    table: Option<&'a HomologationTable>,
    policy: HomologationPolicy,
) -> Box<dyn CodeResolver + 'a> {
    match table {
        None => Box::new(NoHomologation),
        Some(table) if policy.validate_against_billing_universe => match table.billing_universe() {
            Some(universe) => Box::new(ValidatedResolver { table, universe }),
            None => Box::new(NoHomologation),
        },
        Some(table) => Box::new(DirectResolver { table }),
    }
}
