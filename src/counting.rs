//! Counting-centric analyses on a BDD compilation of the feature model.
//!
//! The feature with pre-order position `i` is BDD variable `i + 1`, matching
//! the CNF numbering, so parents always sit above their children in the
//! variable order.

use std::collections::{HashMap, HashSet};

use log::{debug, info};
use num_bigint::{BigUint, RandBigInt};
use num_traits::{ToPrimitive, Zero};
use rand::Rng;

use crate::bdd::Bdd;
use crate::configuration::Configuration;
use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::model::{FeatureId, FeatureModel};
use crate::reference::Ref;
use crate::types::{Lit, Var};

/// Bits of precision kept when turning a ratio of big counts into a float.
const PROBABILITY_BITS: usize = 53;

#[derive(Debug)]
pub struct BddModel {
    bdd: Bdd,
    root: Ref,
    names: Vec<String>,
    vars: HashMap<String, Var>,
}

impl BddModel {
    /// Compiles the tree relations and cross-tree constraints into one BDD.
    pub fn from_feature_model(fm: &FeatureModel) -> Self {
        let bdd = Bdd::new();
        let var = |id: FeatureId| bdd.mk_var(id.var().id());

        let mut parts = vec![var(fm.root())];
        for rid in fm.relation_ids() {
            let relation = &fm[rid];
            let parent = var(relation.parent);
            let children: Vec<Ref> = relation.children.iter().map(|&c| var(c)).collect();

            let count = between(&bdd, &children, relation.card_min, relation.card_max);
            parts.push(bdd.apply_imply(parent, count));
            parts.extend(children.iter().map(|&child| bdd.apply_imply(child, parent)));
        }
        parts.extend(fm.constraints().iter().map(|c| compile_expr(&bdd, fm, &c.expr)));
        let root = bdd.apply_and_many(parts);

        debug!(
            "Compiled feature model into a BDD of {} nodes ({} allocated)",
            bdd.size(root),
            bdd.num_nodes()
        );
        Self {
            bdd,
            root,
            names: fm.names(fm.features()),
            vars: fm.features().map(|f| (fm.name(f).to_string(), f.var())).collect(),
        }
    }

    pub fn bdd(&self) -> &Bdd {
        &self.bdd
    }

    pub fn root(&self) -> Ref {
        self.root
    }

    pub fn num_features(&self) -> usize {
        self.names.len()
    }

    fn name(&self, v: u32) -> &str {
        &self.names[v as usize - 1]
    }

    pub fn is_valid(&self) -> bool {
        !self.bdd.is_zero(self.root)
    }

    /// Whether the configuration can be extended to a product (or, when full, is one).
    pub fn is_valid_configuration(&self, config: &Configuration) -> Result<bool> {
        let mut lits: Vec<Lit> = Vec::with_capacity(self.num_features());
        for (name, selected) in config.elements() {
            let var = self.vars.get(name).ok_or_else(|| Error::NotFound(name.clone()))?;
            lits.push(var.lit(*selected));
        }
        if config.is_full() {
            lits.extend(
                self.names
                    .iter()
                    .filter(|name| config.get(name).is_none())
                    .map(|name| self.vars[name.as_str()].neg()),
            );
        }
        let restricted = self.bdd.apply_and(self.root, self.bdd.cube(lits));
        Ok(!self.bdd.is_zero(restricted))
    }

    /// Some product of the model, as selected feature names in pre-order.
    pub fn find_product(&self) -> Option<Vec<String>> {
        let path = self.bdd.one_sat(self.root)?;
        Some(
            path.into_iter()
                .filter(|lit| lit.is_positive())
                .map(|lit| self.name(lit.var().id()).to_string())
                .collect(),
        )
    }

    pub fn count_products(&self) -> BigUint {
        let count = self.bdd.sat_count(self.root, self.num_features());
        info!("BDD counts {} products", count);
        count
    }

    /// Features selected in every product. Empty for a void model.
    pub fn core_features(&self) -> Vec<String> {
        self.fixed_features(true)
    }

    /// Features selected in no product. Empty for a void model.
    pub fn dead_features(&self) -> Vec<String> {
        self.fixed_features(false)
    }

    fn fixed_features(&self, value: bool) -> Vec<String> {
        if !self.is_valid() {
            return Vec::new();
        }
        (1..=self.num_features() as u32)
            .filter(|&v| self.bdd.is_zero(self.bdd.restrict(self.root, v, !value)))
            .map(|v| self.name(v).to_string())
            .collect()
    }

    /// Draws `size` products uniformly at random.
    ///
    /// Without replacement, at most the number of products is returned and
    /// no product appears twice.
    pub fn sample<R: Rng + ?Sized>(&self, size: usize, with_replacement: bool, rng: &mut R) -> Vec<Vec<String>> {
        let mut counter = Counter::new(&self.bdd, self.num_features());
        let total = counter.count(self.root, 1);
        if total.is_zero() {
            return Vec::new();
        }

        let ranks: Vec<BigUint> = if with_replacement {
            (0..size).map(|_| rng.gen_biguint_below(&total)).collect()
        } else if BigUint::from(size) >= total {
            let n = total.to_usize().unwrap_or(usize::MAX);
            (0..n).map(BigUint::from).collect()
        } else {
            let mut picked = HashSet::with_capacity(size);
            let mut ranks = Vec::with_capacity(size);
            while ranks.len() < size {
                let rank = rng.gen_biguint_below(&total);
                if picked.insert(rank.clone()) {
                    ranks.push(rank);
                }
            }
            ranks
        };

        ranks.into_iter().map(|rank| self.unrank(&mut counter, rank)).collect()
    }

    /// The product of the given rank, in the order where variable 1 is the
    /// most significant and `false` comes before `true`.
    fn unrank(&self, counter: &mut Counter<'_>, mut rank: BigUint) -> Vec<String> {
        let mut product = Vec::new();
        let mut node = self.root;
        for v in 1..=self.num_features() as u32 {
            let (low, high) = self.bdd.top_cofactors(node, v);
            let low_count = counter.count(low, v + 1);
            if rank < low_count {
                node = low;
            } else {
                rank -= low_count;
                node = high;
                product.push(self.name(v).to_string());
            }
        }
        product
    }

    /// Number of products per number of selected features.
    ///
    /// Entry `k` counts the products selecting exactly `k` features; the
    /// entries sum to [`BddModel::count_products`].
    pub fn product_distribution(&self) -> Vec<BigUint> {
        let n = self.num_features();
        let mut cache = HashMap::new();
        let mut dist = self.distribution(self.root, 1, &mut cache);
        dist.resize(n + 1, BigUint::ZERO);
        dist
    }

    /// Distribution over variables `from..=n` for a node whose top is not above `from`.
    fn distribution(&self, node: Ref, from: u32, cache: &mut HashMap<Ref, Vec<BigUint>>) -> Vec<BigUint> {
        let n = self.num_features() as u32;
        if self.bdd.is_zero(node) {
            return Vec::new();
        }
        let top = if self.bdd.is_one(node) {
            n + 1
        } else {
            self.bdd.variable(node)
        };

        let at_top = if self.bdd.is_one(node) {
            vec![BigUint::from(1u32)]
        } else if let Some(dist) = cache.get(&node) {
            dist.clone()
        } else {
            let low = self.distribution(self.bdd.low_node(node), top + 1, cache);
            let high = self.distribution(self.bdd.high_node(node), top + 1, cache);
            let mut dist = vec![BigUint::ZERO; low.len().max(high.len() + 1)];
            for (k, c) in low.into_iter().enumerate() {
                dist[k] += c;
            }
            for (k, c) in high.into_iter().enumerate() {
                dist[k + 1] += c;
            }
            cache.insert(node, dist.clone());
            dist
        };

        // Variables skipped between `from` and `top` are free.
        let gap = (top - from) as usize;
        if gap == 0 {
            return at_top;
        }
        let binomials = binomial_row(gap);
        let mut dist = vec![BigUint::ZERO; at_top.len() + gap];
        for (k, c) in at_top.iter().enumerate() {
            for (j, b) in binomials.iter().enumerate() {
                dist[k + j] += c * b;
            }
        }
        dist
    }

    /// For each feature, the fraction of products that select it.
    pub fn feature_inclusion_probabilities(&self) -> Vec<(String, f64)> {
        let n = self.num_features();
        let total = self.bdd.sat_count(self.root, n);
        (1..=n as u32)
            .map(|v| {
                let probability = if total.is_zero() {
                    0.0
                } else {
                    let with = self.bdd.sat_count(self.bdd.apply_and(self.root, self.bdd.mk_var(v)), n);
                    let scaled: BigUint = (with << PROBABILITY_BITS) / &total;
                    scaled.to_f64().unwrap_or(0.0) / (1u64 << PROBABILITY_BITS) as f64
                };
                (self.name(v).to_string(), probability)
            })
            .collect()
    }
}

/// BDD for "between `min` and `max` of `children` hold".
fn between(bdd: &Bdd, children: &[Ref], min: usize, max: usize) -> Ref {
    // layer[k]: the remaining children bring the count into range, given k so far.
    // Counts above max are clamped to max + 1.
    let cap = max + 1;
    let mut layer: Vec<Ref> = (0..=cap)
        .map(|k| if (min..=max).contains(&k) { bdd.one } else { bdd.zero })
        .collect();
    for &child in children.iter().rev() {
        layer = (0..=cap)
            .map(|k| bdd.apply_ite(child, layer[(k + 1).min(cap)], layer[k]))
            .collect();
    }
    layer[0]
}

fn compile_expr(bdd: &Bdd, fm: &FeatureModel, expr: &Expr) -> Ref {
    match expr {
        Expr::Var(name) => match fm.get(name) {
            Some(id) => bdd.mk_var(id.var().id()),
            // Names are validated when the model is built.
            None => bdd.zero,
        },
        Expr::Not(a) => -compile_expr(bdd, fm, a),
        Expr::And(a, b) => bdd.apply_and(compile_expr(bdd, fm, a), compile_expr(bdd, fm, b)),
        Expr::Or(a, b) => bdd.apply_or(compile_expr(bdd, fm, a), compile_expr(bdd, fm, b)),
        Expr::Implies(a, b) => bdd.apply_imply(compile_expr(bdd, fm, a), compile_expr(bdd, fm, b)),
        Expr::Equiv(a, b) => bdd.apply_eq(compile_expr(bdd, fm, a), compile_expr(bdd, fm, b)),
    }
}

fn binomial_row(n: usize) -> Vec<BigUint> {
    let mut row = vec![BigUint::from(1u32)];
    for k in 0..n {
        let next = &row[k] * (n - k) / (k + 1);
        row.push(next);
    }
    row
}

/// Memoized model counts of nodes over a suffix of the variable order.
struct Counter<'a> {
    bdd: &'a Bdd,
    num_vars: u32,
    cache: HashMap<Ref, BigUint>,
}

impl<'a> Counter<'a> {
    fn new(bdd: &'a Bdd, num_vars: usize) -> Self {
        Self {
            bdd,
            num_vars: num_vars as u32,
            cache: HashMap::new(),
        }
    }

    /// Assignments to variables `from..=num_vars` satisfying `node`, whose top is not above `from`.
    fn count(&mut self, node: Ref, from: u32) -> BigUint {
        if self.bdd.is_zero(node) {
            return BigUint::ZERO;
        }
        let top = if self.bdd.is_one(node) {
            self.num_vars + 1
        } else {
            self.bdd.variable(node)
        };
        let at_top = if self.bdd.is_one(node) {
            BigUint::from(1u32)
        } else if let Some(count) = self.cache.get(&node) {
            count.clone()
        } else {
            let low = self.count(self.bdd.low_node(node), top + 1);
            let high = self.count(self.bdd.high_node(node), top + 1);
            let count = low + high;
            self.cache.insert(node, count.clone());
            count
        };
        at_top << (top - from) as usize
    }
}
