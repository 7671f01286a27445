//! SAT-based analyses of a feature model.
//!
//! Every operation loads the immutable [`SatModel`] into a fresh [`Solver`],
//! so an analyzer can be shared and its queries run in any order.

use log::info;

use crate::cnf::SatModel;
use crate::configuration::Configuration;
use crate::error::{Error, Result};
use crate::model::FeatureModel;
use crate::solver::{Solver, SolverConfig};
use crate::types::{Lit, Var};

/// Result of a bounded product count.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ProductCount {
    pub count: u64,
    /// Whether more products exist beyond `count`.
    pub truncated: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct SatAnalyzer<'a> {
    model: &'a SatModel,
    config: SolverConfig,
}

impl<'a> SatAnalyzer<'a> {
    pub fn new(model: &'a SatModel) -> Self {
        Self::with_config(model, SolverConfig::default())
    }

    pub fn with_config(model: &'a SatModel, config: SolverConfig) -> Self {
        Self { model, config }
    }

    pub fn model(&self) -> &'a SatModel {
        self.model
    }

    pub(crate) fn solver(&self) -> Solver {
        let mut solver = Solver::with_config(self.config);
        solver.reserve_vars(self.model.num_vars() as usize);
        for clause in self.model.clauses() {
            if !solver.add_clause(clause) {
                break;
            }
        }
        solver
    }

    /// Whether the model has at least one product.
    pub fn is_valid(&self) -> Result<bool> {
        let valid = self.solver().solve()?.is_sat();
        info!("Model is {}", if valid { "valid" } else { "void" });
        Ok(valid)
    }

    /// Literals fixing the features of a configuration.
    ///
    /// A full configuration also deselects every feature it does not mention.
    pub fn assumptions(&self, config: &Configuration) -> Result<Vec<Lit>> {
        let mut lits = Vec::with_capacity(self.model.num_features());
        for (name, selected) in config.elements() {
            lits.push(self.model.var(name)?.lit(*selected));
        }
        if config.is_full() {
            for var in self.model.feature_vars() {
                if config.get(self.model.feature_name(var)).is_none() {
                    lits.push(var.neg());
                }
            }
        }
        Ok(lits)
    }

    /// Whether the configuration can be extended to a product (or, when full, is one).
    pub fn is_valid_configuration(&self, config: &Configuration) -> Result<bool> {
        let assumptions = self.assumptions(config)?;
        Ok(self.solver().solve_with(&assumptions)?.is_sat())
    }

    /// Whether the configuration, read as a full product, is valid.
    pub fn is_valid_product(&self, config: &Configuration) -> Result<bool> {
        if config.is_full() {
            self.is_valid_configuration(config)
        } else {
            self.is_valid_configuration(&config.clone().with_full(true))
        }
    }

    /// Some product of the model, if any.
    pub fn find_product(&self) -> Result<Option<Vec<String>>> {
        self.products().next().transpose()
    }

    /// Lazily enumerates all products.
    ///
    /// Each product is the list of selected feature names in pre-order.
    /// Enumeration is exponential in general; bound it with `take`.
    pub fn products(&self) -> Products<'a> {
        Products {
            model: self.model,
            solver: self.solver(),
            done: false,
        }
    }

    pub fn count_products(&self) -> Result<u64> {
        let mut count = 0;
        for product in self.products() {
            product?;
            count += 1;
        }
        info!("Model has {} products", count);
        Ok(count)
    }

    /// Counts products, stopping after `limit`.
    pub fn count_products_up_to(&self, limit: u64) -> Result<ProductCount> {
        let mut count = 0;
        for product in self.products() {
            product?;
            if count == limit {
                return Ok(ProductCount { count, truncated: true });
            }
            count += 1;
        }
        Ok(ProductCount {
            count,
            truncated: false,
        })
    }

    /// Features selected in every product. Empty for a void model.
    pub fn core_features(&self) -> Result<Vec<String>> {
        let core = self.fixed_features(true)?;
        info!("Found {} core features", core.len());
        Ok(core)
    }

    /// Features selected in no product. Empty for a void model.
    pub fn dead_features(&self) -> Result<Vec<String>> {
        let dead = self.fixed_features(false)?;
        info!("Found {} dead features", dead.len());
        Ok(dead)
    }

    /// Features taking `value` in every product.
    ///
    /// Each model found rules out every candidate it disagrees with, so only
    /// the surviving candidates cost a solver call.
    fn fixed_features(&self, value: bool) -> Result<Vec<String>> {
        let mut solver = self.solver();
        if !solver.solve()?.is_sat() {
            return Ok(Vec::new());
        }
        let vars: Vec<Var> = self.model.feature_vars().collect();
        let mut candidate: Vec<bool> = vars.iter().map(|&v| solver.model_value(v) == Some(value)).collect();

        let mut fixed = Vec::new();
        for (i, &var) in vars.iter().enumerate() {
            if !candidate[i] {
                continue;
            }
            if solver.solve_with(&[var.lit(!value)])?.is_sat() {
                for (j, &other) in vars.iter().enumerate() {
                    if solver.model_value(other) != Some(value) {
                        candidate[j] = false;
                    }
                }
            } else {
                fixed.push(self.model.feature_name(var).to_string());
            }
        }
        Ok(fixed)
    }

    /// Optional features that every product selecting their parent also selects.
    pub fn false_optional_features(&self, fm: &FeatureModel) -> Result<Vec<String>> {
        let mut solver = self.solver();
        if !solver.solve()?.is_sat() {
            return Ok(Vec::new());
        }
        let mut result = Vec::new();
        for feature in fm.features().filter(|&f| fm.is_optional(f)) {
            let parent = fm
                .parent(feature)
                .ok_or_else(|| Error::Structural(format!("optional feature '{}' has no parent", fm.name(feature))))?;
            if !solver.solve_with(&[parent.var().pos(), feature.var().neg()])?.is_sat() {
                result.push(fm.name(feature).to_string());
            }
        }
        info!("Found {} false-optional features", result.len());
        Ok(result)
    }
}

/// Iterator over the products of a model, see [`SatAnalyzer::products`].
pub struct Products<'a> {
    model: &'a SatModel,
    solver: Solver,
    done: bool,
}

impl Iterator for Products<'_> {
    type Item = Result<Vec<String>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.solver.solve() {
            Err(e) => {
                self.done = true;
                Some(Err(e.into()))
            }
            Ok(result) if !result.is_sat() => {
                self.done = true;
                None
            }
            Ok(_) => {
                let lits = self.solver.model_lits(self.model.feature_vars());
                let product = lits
                    .iter()
                    .filter(|l| l.is_positive())
                    .map(|l| self.model.feature_name(l.var()).to_string())
                    .collect();
                let blocking: Vec<Lit> = lits.into_iter().map(|l| -l).collect();
                if !self.solver.add_clause(&blocking) {
                    self.done = true;
                }
                Some(Ok(product))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::build_sat_model;
    use crate::expr::Expr;
    use crate::error::SolverError;
    use crate::model::tests::{pigeonhole, pizza};
    use crate::model::FeatureModelBuilder;
    use std::collections::HashSet;
    use test_log::test;

    #[test]
    fn test_pizza_is_valid_with_42_products() {
        let sat = build_sat_model(&pizza());
        let analyzer = SatAnalyzer::new(&sat);
        assert!(analyzer.is_valid().unwrap());
        assert_eq!(analyzer.count_products().unwrap(), 42);
    }

    #[test]
    fn test_products_are_distinct_and_valid() {
        let fm = pizza();
        let sat = build_sat_model(&fm);
        let analyzer = SatAnalyzer::new(&sat);
        let products: Vec<Vec<String>> = analyzer.products().collect::<Result<_>>().unwrap();
        assert_eq!(products.len(), 42);
        let distinct: HashSet<_> = products.iter().cloned().collect();
        assert_eq!(distinct.len(), 42);
        for product in &products {
            let config = Configuration::from_selected(product.iter().cloned());
            assert!(analyzer.is_valid_product(&config).unwrap(), "{:?}", product);
            assert!(!product.contains(&"CheesyCrust".to_string()) || product.contains(&"Big".to_string()));
        }
    }

    #[test]
    fn test_bounded_enumeration() {
        let sat = build_sat_model(&pizza());
        let analyzer = SatAnalyzer::new(&sat);
        assert_eq!(analyzer.products().take(5).count(), 5);
        assert_eq!(
            analyzer.count_products_up_to(10).unwrap(),
            ProductCount {
                count: 10,
                truncated: true
            }
        );
        assert_eq!(
            analyzer.count_products_up_to(42).unwrap(),
            ProductCount {
                count: 42,
                truncated: false
            }
        );
        assert!(!analyzer.count_products_up_to(100).unwrap().truncated);
    }

    #[test]
    fn test_core_and_dead_features() {
        let sat = build_sat_model(&pizza());
        let analyzer = SatAnalyzer::new(&sat);
        assert_eq!(analyzer.core_features().unwrap(), vec!["Pizza", "Topping", "Size", "Dough"]);
        assert!(analyzer.dead_features().unwrap().is_empty());
    }

    #[test]
    fn test_dead_and_false_optional_detection() {
        let fm = FeatureModelBuilder::new("R")
            .optional("R", "A")
            .optional("R", "B")
            .optional("R", "C")
            .add_constraint(Expr::implies(Expr::var("A"), Expr::not(Expr::var("R"))))
            .add_constraint(Expr::var("B"))
            .build()
            .unwrap();
        let sat = build_sat_model(&fm);
        let analyzer = SatAnalyzer::new(&sat);
        assert_eq!(analyzer.dead_features().unwrap(), vec!["A"]);
        assert_eq!(analyzer.core_features().unwrap(), vec!["R", "B"]);
        assert_eq!(analyzer.false_optional_features(&fm).unwrap(), vec!["B"]);
        assert_eq!(analyzer.count_products().unwrap(), 2);
    }

    #[test]
    fn test_void_model() {
        let fm = FeatureModelBuilder::new("R")
            .optional("R", "A")
            .add_constraint(Expr::not(Expr::var("R")))
            .build()
            .unwrap();
        let sat = build_sat_model(&fm);
        let analyzer = SatAnalyzer::new(&sat);
        assert!(!analyzer.is_valid().unwrap());
        assert_eq!(analyzer.count_products().unwrap(), 0);
        assert!(analyzer.core_features().unwrap().is_empty());
        assert!(analyzer.dead_features().unwrap().is_empty());
        assert_eq!(analyzer.find_product().unwrap(), None);
    }

    #[test]
    fn test_configuration_validity_partial_vs_full() {
        let sat = build_sat_model(&pizza());
        let analyzer = SatAnalyzer::new(&sat);
        let config = Configuration::from_selected(["Pizza", "Topping", "Mozzarella", "Dough", "Sicilian", "Size"]);
        assert!(analyzer.is_valid_configuration(&config).unwrap());
        assert!(!analyzer.is_valid_product(&config).unwrap());

        let config: Configuration = [("CheesyCrust", true), ("Big", false)].into_iter().collect();
        assert!(!analyzer.is_valid_configuration(&config).unwrap());

        let config = Configuration::from_selected(["Pineapple"]);
        assert_eq!(
            analyzer.is_valid_configuration(&config),
            Err(Error::NotFound("Pineapple".to_string()))
        );
    }

    #[test]
    fn test_solver_limits_surface_as_errors() {
        let sat = build_sat_model(&pigeonhole(6));
        let analyzer = SatAnalyzer::with_config(&sat, SolverConfig::default().with_conflict_limit(1));
        let limit = Error::Solver(SolverError::ConflictLimit(1));

        assert_eq!(analyzer.is_valid(), Err(limit.clone()));
        assert_eq!(analyzer.count_products(), Err(limit.clone()));
        assert_eq!(analyzer.core_features(), Err(limit.clone()));

        let mut products = analyzer.products();
        assert_eq!(products.next(), Some(Err(limit)));
        assert_eq!(products.next(), None);

        // Without the limit the same model is simply void.
        assert_eq!(SatAnalyzer::new(&sat).count_products(), Ok(0));
    }
}
