//! Explanations for invalid configurations and void models.
//!
//! A [`DiagnosisModel`] is the CNF of a feature model in which every relation
//! and every cross-tree constraint is guarded by a selector variable, so it
//! can be switched off. The [`Diagnoser`] searches over *assertions* (either
//! the entries of a configuration, or the guarded clause groups themselves)
//! for a minimal conflict (QuickXplain) or a minimal diagnosis (FastDiag).

use std::collections::HashMap;
use std::fmt;

use log::{debug, info};

use crate::cnf::{ClauseOrigin, SatModel, VarMap};
use crate::configuration::Configuration;
use crate::error::{Error, Result};
use crate::model::FeatureModel;
use crate::solver::{Solver, SolverConfig};
use crate::types::{Lit, Var};

#[derive(Debug, Clone)]
struct ClauseGroup {
    label: String,
    selector: Var,
}

/// A feature model encoding whose clause groups can be relaxed individually.
#[derive(Debug, Clone)]
pub struct DiagnosisModel {
    clauses: Vec<Vec<Lit>>,
    num_vars: u32,
    vars: VarMap,
    groups: Vec<ClauseGroup>,
}

impl DiagnosisModel {
    /// Guards the relation and constraint clauses of `sat` with selectors.
    ///
    /// The root clause stays hard.
    pub fn new(fm: &FeatureModel, sat: &SatModel) -> Self {
        let mut num_vars = sat.num_vars();
        let mut groups = Vec::new();
        let mut selectors: HashMap<ClauseOrigin, Var> = HashMap::new();
        let mut clauses = Vec::with_capacity(sat.clauses().len());

        for (clause, &origin) in sat.clauses().iter().zip(sat.origins()) {
            if origin == ClauseOrigin::Root {
                clauses.push(clause.clone());
                continue;
            }
            let selector = *selectors.entry(origin).or_insert_with(|| {
                num_vars += 1;
                let selector = Var::new(num_vars);
                groups.push(ClauseGroup {
                    label: describe(fm, origin),
                    selector,
                });
                selector
            });
            let mut guarded = clause.clone();
            guarded.push(selector.neg());
            clauses.push(guarded);
        }

        debug!(
            "Diagnosis model with {} clause groups over {} variables",
            groups.len(),
            num_vars
        );
        Self {
            clauses,
            num_vars,
            vars: sat.vars().clone(),
            groups,
        }
    }

    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    fn solver(&self, config: SolverConfig) -> Solver {
        let mut solver = Solver::with_config(config);
        solver.reserve_vars(self.num_vars as usize);
        for clause in &self.clauses {
            if !solver.add_clause(clause) {
                break;
            }
        }
        solver
    }
}

fn describe(fm: &FeatureModel, origin: ClauseOrigin) -> String {
    match origin {
        ClauseOrigin::Root => fm.name(fm.root()).to_string(),
        ClauseOrigin::Relation(rid) => {
            let relation = &fm[rid];
            format!(
                "{} {}[{}..{}] ({})",
                fm.name(relation.parent),
                relation.kind,
                relation.card_min,
                relation.card_max,
                fm.names(relation.children.iter().copied()).join(", ")
            )
        }
        ClauseOrigin::Constraint(i) => fm.constraints()[i].to_string(),
    }
}

/// One relaxable statement: a configuration entry or a clause group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assertion {
    /// `Name` or `!Name` for configuration entries, the relation or constraint otherwise.
    pub label: String,
    pub lit: Lit,
}

impl fmt::Display for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// Consistency oracle: background literals plus a candidate subset.
struct Oracle {
    solver: Solver,
    background: Vec<Lit>,
    checks: usize,
}

impl Oracle {
    fn consistent(&mut self, lits: &[Lit]) -> Result<bool> {
        self.checks += 1;
        let mut assumptions = self.background.clone();
        assumptions.extend_from_slice(lits);
        Ok(self.solver.solve_with(&assumptions)?.is_sat())
    }
}

pub struct Diagnoser<'a> {
    model: &'a DiagnosisModel,
    config: SolverConfig,
}

impl<'a> Diagnoser<'a> {
    pub fn new(model: &'a DiagnosisModel) -> Self {
        Self::with_config(model, SolverConfig::default())
    }

    pub fn with_config(model: &'a DiagnosisModel, config: SolverConfig) -> Self {
        Self { model, config }
    }

    /// Assertions made by a configuration, in configuration order.
    ///
    /// A full configuration also asserts every unmentioned feature as
    /// deselected, in feature pre-order.
    pub fn assertions(&self, config: &Configuration) -> Result<Vec<Assertion>> {
        let mut assertions = Vec::new();
        for (name, selected) in config.elements() {
            let var = self
                .model
                .vars
                .var(name)
                .ok_or_else(|| Error::NotFound(name.clone()))?;
            assertions.push(entry_assertion(name, var, *selected));
        }
        if config.is_full() {
            for id in 1..=self.model.vars.num_features() as u32 {
                let var = Var::new(id);
                let name = self.model.vars.name(var).unwrap_or_default();
                if config.get(name).is_none() {
                    assertions.push(entry_assertion(name, var, false));
                }
            }
        }
        Ok(assertions)
    }

    /// The model's relations and constraints, one assertion per guarded group.
    pub fn group_assertions(&self) -> Vec<Assertion> {
        self.model
            .groups
            .iter()
            .map(|g| Assertion {
                label: g.label.clone(),
                lit: g.selector.pos(),
            })
            .collect()
    }

    fn all_selectors(&self) -> Vec<Lit> {
        self.model.groups.iter().map(|g| g.selector.pos()).collect()
    }

    fn oracle(&self, background: Vec<Lit>) -> Oracle {
        Oracle {
            solver: self.model.solver(self.config),
            background,
            checks: 0,
        }
    }

    /// A minimal subset of the configuration's assertions that cannot hold together.
    ///
    /// Empty when the configuration is valid.
    pub fn conflict(&self, config: &Configuration) -> Result<Vec<Assertion>> {
        let assertions = self.assertions(config)?;
        let mut oracle = self.oracle(self.all_selectors());
        let result = quick_xplain(&mut oracle, &assertions)?;
        info!("Conflict of size {} found with {} checks", result.len(), oracle.checks);
        Ok(result)
    }

    /// A minimal subset of the configuration's assertions whose removal makes it valid.
    ///
    /// Empty when the configuration is valid.
    pub fn diagnosis(&self, config: &Configuration) -> Result<Vec<Assertion>> {
        let assertions = self.assertions(config)?;
        let mut oracle = self.oracle(self.all_selectors());
        let result = fast_diag(&mut oracle, &assertions)?;
        info!("Diagnosis of size {} found with {} checks", result.len(), oracle.checks);
        Ok(result)
    }

    /// A minimal set of relations and constraints that make the model void.
    pub fn model_conflict(&self) -> Result<Vec<Assertion>> {
        let mut oracle = self.oracle(Vec::new());
        quick_xplain(&mut oracle, &self.group_assertions())
    }

    /// A minimal set of relations and constraints whose removal makes the model valid.
    pub fn model_diagnosis(&self) -> Result<Vec<Assertion>> {
        let mut oracle = self.oracle(Vec::new());
        fast_diag(&mut oracle, &self.group_assertions())
    }
}

fn entry_assertion(name: &str, var: Var, selected: bool) -> Assertion {
    Assertion {
        label: if selected { name.to_string() } else { format!("!{}", name) },
        lit: var.lit(selected),
    }
}

/// Maps literals back to their assertions, in assertion order.
fn select(assertions: &[Assertion], lits: &[Lit]) -> Vec<Assertion> {
    assertions
        .iter()
        .filter(|a| lits.contains(&a.lit))
        .cloned()
        .collect()
}

fn quick_xplain(oracle: &mut Oracle, assertions: &[Assertion]) -> Result<Vec<Assertion>> {
    let lits: Vec<Lit> = assertions.iter().map(|a| a.lit).collect();
    if lits.is_empty() || oracle.consistent(&lits)? {
        return Ok(Vec::new());
    }
    let conflict = qx(oracle, &[], false, &lits)?;
    Ok(select(assertions, &conflict))
}

fn qx(oracle: &mut Oracle, base: &[Lit], has_delta: bool, candidates: &[Lit]) -> Result<Vec<Lit>> {
    if has_delta && !oracle.consistent(base)? {
        return Ok(Vec::new());
    }
    if candidates.len() == 1 {
        return Ok(candidates.to_vec());
    }
    let (c1, c2) = candidates.split_at(candidates.len() / 2);

    let with_c1: Vec<Lit> = base.iter().chain(c1).copied().collect();
    let d2 = qx(oracle, &with_c1, !c1.is_empty(), c2)?;

    let with_d2: Vec<Lit> = base.iter().chain(&d2).copied().collect();
    let mut d1 = qx(oracle, &with_d2, !d2.is_empty(), c1)?;

    d1.extend(d2);
    Ok(d1)
}

fn fast_diag(oracle: &mut Oracle, assertions: &[Assertion]) -> Result<Vec<Assertion>> {
    let lits: Vec<Lit> = assertions.iter().map(|a| a.lit).collect();
    if lits.is_empty() || oracle.consistent(&lits)? || !oracle.consistent(&[])? {
        return Ok(Vec::new());
    }
    let diagnosis = fd(oracle, false, &lits, &lits)?;
    Ok(select(assertions, &diagnosis))
}

fn fd(oracle: &mut Oracle, has_delta: bool, candidates: &[Lit], all: &[Lit]) -> Result<Vec<Lit>> {
    if has_delta && oracle.consistent(all)? {
        return Ok(Vec::new());
    }
    if candidates.len() == 1 {
        return Ok(candidates.to_vec());
    }
    let (c1, c2) = candidates.split_at(candidates.len() / 2);

    let without_c2: Vec<Lit> = all.iter().filter(|l| !c2.contains(l)).copied().collect();
    let mut d1 = fd(oracle, !c2.is_empty(), c1, &without_c2)?;

    let without_d1: Vec<Lit> = all.iter().filter(|l| !d1.contains(l)).copied().collect();
    let d2 = fd(oracle, !d1.is_empty(), c2, &without_d1)?;

    d1.extend(d2);
    Ok(d1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::complete_configuration;
    use crate::encoder::build_sat_model;
    use crate::expr::Expr;
    use crate::error::SolverError;
    use crate::model::tests::{pigeonhole, pizza};
    use crate::model::FeatureModelBuilder;
    use test_log::test;

    fn labels(assertions: &[Assertion]) -> Vec<&str> {
        assertions.iter().map(|a| a.label.as_str()).collect()
    }

    fn invalid_pizza_config(fm: &FeatureModel) -> Configuration {
        let config = Configuration::from_selected(["Topping", "Mozzarella", "Dough", "Sicilian", "Size"]);
        complete_configuration(&config, fm).unwrap().with_full(true)
    }

    #[test]
    fn test_full_configuration_assertions() {
        let fm = pizza();
        let sat = build_sat_model(&fm);
        let model = DiagnosisModel::new(&fm, &sat);
        let assertions = Diagnoser::new(&model).assertions(&invalid_pizza_config(&fm)).unwrap();
        assert_eq!(
            labels(&assertions),
            vec![
                "Topping",
                "Mozzarella",
                "Dough",
                "Sicilian",
                "Size",
                "Pizza",
                "!Salami",
                "!Ham",
                "!Normal",
                "!Big",
                "!Neapolitan",
                "!CheesyCrust"
            ]
        );
    }

    #[test]
    fn test_conflict_and_diagnosis_of_invalid_pizza() {
        let fm = pizza();
        let sat = build_sat_model(&fm);
        let model = DiagnosisModel::new(&fm, &sat);
        let diagnoser = Diagnoser::new(&model);
        let config = invalid_pizza_config(&fm);

        let conflict = diagnoser.conflict(&config).unwrap();
        assert_eq!(labels(&conflict), vec!["!Normal", "!Big"]);

        let diagnosis = diagnoser.diagnosis(&config).unwrap();
        assert_eq!(diagnosis.len(), 1);
        assert!(["!Normal", "!Big"].contains(&diagnosis[0].label.as_str()));

        // Removing the diagnosis restores validity.
        let mut repaired = Configuration::new().with_full(false);
        for assertion in diagnoser.assertions(&config).unwrap() {
            if !diagnosis.contains(&assertion) {
                let name = assertion.label.trim_start_matches('!');
                repaired.set(name, assertion.lit.is_positive());
            }
        }
        assert!(diagnoser.conflict(&repaired).unwrap().is_empty());
    }

    #[test]
    fn test_valid_configuration_has_empty_results() {
        let fm = pizza();
        let sat = build_sat_model(&fm);
        let model = DiagnosisModel::new(&fm, &sat);
        let diagnoser = Diagnoser::new(&model);
        let config = Configuration::from_selected(["Mozzarella", "Big"]);
        assert!(diagnoser.conflict(&config).unwrap().is_empty());
        assert!(diagnoser.diagnosis(&config).unwrap().is_empty());
        assert!(diagnoser.model_conflict().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_feature() {
        let fm = pizza();
        let sat = build_sat_model(&fm);
        let model = DiagnosisModel::new(&fm, &sat);
        let config = Configuration::from_selected(["Pineapple"]);
        assert_eq!(
            Diagnoser::new(&model).conflict(&config),
            Err(Error::NotFound("Pineapple".to_string()))
        );
    }

    #[test]
    fn test_void_model_explanations() {
        let fm = FeatureModelBuilder::new("R")
            .optional("R", "A")
            .optional("R", "B")
            .add_constraint(Expr::var("A"))
            .add_constraint(Expr::implies(Expr::var("B"), Expr::var("A")))
            .add_constraint(Expr::implies(Expr::var("A"), Expr::not(Expr::var("R"))))
            .build()
            .unwrap();
        let sat = build_sat_model(&fm);
        let model = DiagnosisModel::new(&fm, &sat);
        assert_eq!(model.num_groups(), 5);
        let diagnoser = Diagnoser::new(&model);

        let conflict = diagnoser.model_conflict().unwrap();
        assert_eq!(labels(&conflict), vec!["A", "A => !R"]);

        let diagnosis = diagnoser.model_diagnosis().unwrap();
        assert_eq!(diagnosis.len(), 1);
        assert!(["A", "A => !R"].contains(&diagnosis[0].label.as_str()));
    }

    #[test]
    fn test_relation_labels() {
        let fm = pizza();
        let sat = build_sat_model(&fm);
        let model = DiagnosisModel::new(&fm, &sat);
        let groups = Diagnoser::new(&model).group_assertions();
        assert_eq!(groups.len(), 8);
        assert_eq!(groups[0].label, "Pizza MANDATORY[1..1] (Topping)");
        assert_eq!(groups[1].label, "Topping OR[1..3] (Salami, Ham, Mozzarella)");
        assert_eq!(groups[7].label, "CheesyCrust => Big");
    }

    #[test]
    fn test_solver_limits_surface_as_errors() {
        let fm = pigeonhole(6);
        let sat = build_sat_model(&fm);
        let model = DiagnosisModel::new(&fm, &sat);
        let diagnoser = Diagnoser::with_config(&model, SolverConfig::default().with_conflict_limit(1));

        assert_eq!(
            diagnoser.model_conflict(),
            Err(Error::Solver(SolverError::ConflictLimit(1)))
        );
        assert_eq!(
            diagnoser.model_diagnosis(),
            Err(Error::Solver(SolverError::ConflictLimit(1)))
        );
    }
}
