//! Dimension normalization: dense local ids for form types, extensions and
//! companies, assigned in first-seen order.

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use crate::parse::FilingRecord;

/// Append-only string dictionary. The local id of an entry is its insertion
/// index plus one; entries are never removed or rewritten.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Dictionary {
    codes: IndexSet<String>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id for `code`, assigning the next one on first sighting.
    pub fn intern(&mut self, code: &str) -> u32 {
        let index = match self.codes.get_index_of(code) {
            Some(index) => index,
            None => self.codes.insert_full(code.to_string()).0,
        };
        local_id(index)
    }

    pub fn code(&self, id: u32) -> Option<&str> {
        let index = usize::try_from(id).ok()?.checked_sub(1)?;
        self.codes.get_index(index).map(String::as_str)
    }

    /// `(local_id, code)` in assignment order.
    pub fn entries(&self) -> impl Iterator<Item = (u32, &str)> + '_ {
        self.codes
            .iter()
            .enumerate()
            .map(|(i, code)| (local_id(i), code.as_str()))
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> + '_ {
        self.codes.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

fn local_id(index: usize) -> u32 {
    // Index files hold a few hundred distinct codes at most
    u32::try_from(index + 1).unwrap_or(u32::MAX)
}

/// Company keyed by its CIK. Serialized as sent to the bulk-insert endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Company {
    pub cik: u64,
    pub name: String,
}

/// Owns the three dictionaries for one processing run.
#[derive(Debug, Default)]
pub struct DimensionNormalizer {
    form_types: Dictionary,
    extensions: Dictionary,
    companies: IndexMap<u64, String>,
}

impl DimensionNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern_form_type(&mut self, code: &str) -> u32 {
        self.form_types.intern(code)
    }

    pub fn intern_extension(&mut self, ext: &str) -> u32 {
        self.extensions.intern(ext)
    }

    /// First-seen name wins.
    pub fn intern_company(&mut self, cik: u64, name: &str) {
        self.companies
            .entry(cik)
            .or_insert_with(|| name.to_string());
    }

    pub fn form_type_count(&self) -> usize {
        self.form_types.len()
    }

    pub fn extension_count(&self) -> usize {
        self.extensions.len()
    }

    pub fn company_count(&self) -> usize {
        self.companies.len()
    }

    /// Freeze the dictionaries together with the parsed filings.
    pub fn finish(self, filings: Vec<FilingRecord>) -> NormalizedIndex {
        NormalizedIndex {
            form_types: self.form_types,
            extensions: self.extensions,
            companies: self
                .companies
                .into_iter()
                .map(|(cik, name)| Company { cik, name })
                .collect(),
            filings,
        }
    }
}

/// Read-only result of the parsing pass.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct NormalizedIndex {
    pub form_types: Dictionary,
    pub extensions: Dictionary,
    /// First-seen order.
    pub companies: Vec<Company>,
    /// File order.
    pub filings: Vec<FilingRecord>,
}
