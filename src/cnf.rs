//! CNF encoding of a feature model.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::{self, Write};

use crate::error::{Error, Result};
use crate::model::RelationId;
use crate::types::{Lit, Var};

/// Part of the feature model a clause was generated from.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ClauseOrigin {
    /// The unit clause selecting the root.
    Root,
    Relation(RelationId),
    /// Index into the model's cross-tree constraints.
    Constraint(usize),
}

/// Bidirectional map between feature names and variables.
///
/// Feature variables come first (`1..=num_features`, in feature pre-order);
/// auxiliary variables introduced by the encoding follow and have no name.
#[derive(Debug, Clone, Default)]
pub struct VarMap {
    names: Vec<String>,
    by_name: HashMap<String, Var>,
    num_vars: u32,
}

impl VarMap {
    pub(crate) fn new(names: Vec<String>) -> Self {
        let by_name = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), Var::new(i as u32 + 1)))
            .collect();
        let num_vars = names.len() as u32;
        Self {
            names,
            by_name,
            num_vars,
        }
    }

    pub(crate) fn fresh(&mut self) -> Var {
        self.num_vars += 1;
        Var::new(self.num_vars)
    }

    pub fn var(&self, name: &str) -> Option<Var> {
        self.by_name.get(name).copied()
    }

    /// Name of a feature variable, `None` for auxiliary variables.
    pub fn name(&self, var: Var) -> Option<&str> {
        self.names.get(var.index() - 1).map(|s| s.as_str())
    }

    pub fn num_vars(&self) -> u32 {
        self.num_vars
    }

    pub fn num_features(&self) -> usize {
        self.names.len()
    }
}

/// A feature model translated to CNF. Immutable once built.
#[derive(Debug, Clone)]
pub struct SatModel {
    pub(crate) clauses: Vec<Vec<Lit>>,
    pub(crate) origins: Vec<ClauseOrigin>,
    pub(crate) vars: VarMap,
}

impl SatModel {
    pub fn clauses(&self) -> &[Vec<Lit>] {
        &self.clauses
    }

    /// Origin of each clause, parallel to [`SatModel::clauses`].
    pub fn origins(&self) -> &[ClauseOrigin] {
        &self.origins
    }

    pub fn vars(&self) -> &VarMap {
        &self.vars
    }

    pub fn num_vars(&self) -> u32 {
        self.vars.num_vars()
    }

    pub fn num_features(&self) -> usize {
        self.vars.num_features()
    }

    /// Feature variables in pre-order.
    pub fn feature_vars(&self) -> impl Iterator<Item = Var> {
        (1..=self.num_features() as u32).map(Var::new)
    }

    pub fn var(&self, name: &str) -> Result<Var> {
        self.vars.var(name).ok_or_else(|| Error::NotFound(name.to_string()))
    }

    pub fn feature_name(&self, var: Var) -> &str {
        self.vars.name(var).unwrap_or_default()
    }

    /// Writes the CNF in DIMACS format, with one `c <id> <name>` comment per feature.
    pub fn write_dimacs<W: Write>(&self, mut writer: W) -> io::Result<()> {
        for var in self.feature_vars() {
            writeln!(writer, "c {} {}", var.id(), self.feature_name(var))?;
        }
        writeln!(writer, "p cnf {} {}", self.num_vars(), self.clauses.len())?;
        for clause in &self.clauses {
            let mut line = String::new();
            for lit in clause {
                let _ = write!(line, "{} ", lit.to_dimacs());
            }
            writeln!(writer, "{}0", line)?;
        }
        Ok(())
    }

    pub fn to_dimacs(&self) -> String {
        let mut buf = Vec::new();
        // Writing to a Vec cannot fail.
        let _ = self.write_dimacs(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}
