//! Identifier whitelists.
//!
//! An empty set means "no restriction". Once a set holds at least one name,
//! every identifier of that kind must be a member (the `*` column excepted).

use crate::error::{BlueprintError, BlueprintResult, IdentKind};
use crate::ident::STAR;
use indexmap::IndexSet;
use serde::Serialize;

/// One identifier or a list of them, as accepted by the whitelist setters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Names(Vec<String>);

impl IntoIterator for Names {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl From<&str> for Names {
    fn from(name: &str) -> Self {
        Names(vec![name.to_string()])
    }
}

impl From<String> for Names {
    fn from(name: String) -> Self {
        Names(vec![name])
    }
}

impl From<Vec<String>> for Names {
    fn from(names: Vec<String>) -> Self {
        Names(names)
    }
}

impl From<Vec<&str>> for Names {
    fn from(names: Vec<&str>) -> Self {
        Names(names.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for Names {
    fn from(names: &[&str]) -> Self {
        Names(names.iter().map(|n| n.to_string()).collect())
    }
}

impl From<&[String]> for Names {
    fn from(names: &[String]) -> Self {
        Names(names.to_vec())
    }
}

impl<const N: usize> From<[&str; N]> for Names {
    fn from(names: [&str; N]) -> Self {
        Names(names.into_iter().map(str::to_string).collect())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Whitelist {
    tables: IndexSet<String>,
    columns: IndexSet<String>,
}

impl Whitelist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_tables<I, S>(&mut self, tables: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables.extend(tables.into_iter().map(Into::into));
    }

    pub fn add_columns<I, S>(&mut self, columns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(columns.into_iter().map(Into::into));
    }

    pub fn tables(&self) -> &IndexSet<String> {
        &self.tables
    }

    pub fn columns(&self) -> &IndexSet<String> {
        &self.columns
    }

    pub fn allows_table(&self, name: &str) -> bool {
        self.tables.is_empty() || self.tables.contains(name)
    }

    pub fn allows_column(&self, name: &str) -> bool {
        name == STAR || self.columns.is_empty() || self.columns.contains(name)
    }

    pub(crate) fn check_table(&self, name: &str, clause: &'static str) -> BlueprintResult<()> {
        if self.allows_table(name) {
            return Ok(());
        }
        tracing::trace!(target: "blueprint.compile", table = name, clause, "rejected by table whitelist");
        Err(BlueprintError::whitelist(IdentKind::Table, name, clause))
    }

    pub(crate) fn check_column(&self, name: &str, clause: &'static str) -> BlueprintResult<()> {
        if self.allows_column(name) {
            return Ok(());
        }
        tracing::trace!(target: "blueprint.compile", column = name, clause, "rejected by column whitelist");
        Err(BlueprintError::whitelist(IdentKind::Column, name, clause))
    }

    /// Check an optional table qualifier; `None` defers to the primary table,
    /// which was checked when it was set.
    pub(crate) fn check_scope(&self, table: Option<&str>, clause: &'static str) -> BlueprintResult<()> {
        match table {
            Some(t) => self.check_table(t, clause),
            None => Ok(()),
        }
    }
}
