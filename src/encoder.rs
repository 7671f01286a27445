//! Translation of a feature model into CNF.
//!
//! Tree relations become a handful of clauses each; cardinality groups use a
//! sequential counter. Cross-tree constraints are split into clauses where
//! their shape allows it and go through a Tseitin transformation otherwise.
//! Every auxiliary variable is defined by an equivalence, so it is a function
//! of the feature variables and counting models counts products.

use log::debug;

use crate::cnf::{ClauseOrigin, SatModel, VarMap};
use crate::expr::Expr;
use crate::model::{FeatureModel, RelationKind};
use crate::types::{Lit, Var};

/// Translates a feature model into its CNF encoding.
///
/// The result is deterministic: the same model always yields the same clauses
/// in the same order.
pub fn build_sat_model(fm: &FeatureModel) -> SatModel {
    let mut encoder = Encoder {
        fm,
        clauses: Vec::new(),
        origins: Vec::new(),
        vars: VarMap::new(fm.names(fm.features())),
        origin: ClauseOrigin::Root,
    };
    encoder.encode();

    let model = SatModel {
        clauses: encoder.clauses,
        origins: encoder.origins,
        vars: encoder.vars,
    };
    debug!(
        "Encoded {} features into {} clauses over {} variables",
        model.num_features(),
        model.clauses.len(),
        model.num_vars()
    );
    model
}

struct Encoder<'a> {
    fm: &'a FeatureModel,
    clauses: Vec<Vec<Lit>>,
    origins: Vec<ClauseOrigin>,
    vars: VarMap,
    origin: ClauseOrigin,
}

impl Encoder<'_> {
    fn encode(&mut self) {
        let fm = self.fm;

        self.origin = ClauseOrigin::Root;
        self.add(vec![fm.root().var().pos()]);

        for rid in fm.relation_ids() {
            self.origin = ClauseOrigin::Relation(rid);
            let relation = &fm[rid];
            let p = relation.parent.var().pos();
            let children: Vec<Lit> = relation.children.iter().map(|c| c.var().pos()).collect();

            match relation.kind {
                RelationKind::Mandatory => {
                    self.add(vec![-p, children[0]]);
                }
                RelationKind::Optional => {}
                RelationKind::Or => {
                    self.add_at_least_one(p, &children);
                }
                RelationKind::Alternative => {
                    self.add_at_least_one(p, &children);
                    self.add_at_most_one(&children);
                }
                RelationKind::Mutex => {
                    self.add_at_most_one(&children);
                }
                RelationKind::Cardinal => {
                    self.add_cardinality(p, &children, relation.card_min, relation.card_max);
                }
            }
            for &c in &children {
                self.add(vec![-c, p]);
            }
        }

        for (i, constraint) in fm.constraints().iter().enumerate() {
            self.origin = ClauseOrigin::Constraint(i);
            self.assert(&constraint.expr, true);
        }
    }

    fn add(&mut self, clause: Vec<Lit>) {
        self.clauses.push(clause);
        self.origins.push(self.origin);
    }

    fn add_at_least_one(&mut self, p: Lit, children: &[Lit]) {
        let mut clause = Vec::with_capacity(children.len() + 1);
        clause.push(-p);
        clause.extend_from_slice(children);
        self.add(clause);
    }

    fn add_at_most_one(&mut self, children: &[Lit]) {
        for (i, &a) in children.iter().enumerate() {
            for &b in &children[i + 1..] {
                self.add(vec![-a, -b]);
            }
        }
    }

    /// Sequential counter: `s[i][j]` holds iff at least `j` of the first `i + 1`
    /// children are selected. Only counts up to `max + 1` are tracked.
    fn add_cardinality(&mut self, p: Lit, children: &[Lit], min: usize, max: usize) {
        let n = children.len();
        let width = (max + 1).min(n);
        // prev[j - 1] is the literal of "at least j among the previous children".
        let mut prev: Vec<Lit> = Vec::new();

        for (i, &x) in children.iter().enumerate() {
            let mut row = Vec::with_capacity(width);
            for j in 1..=width.min(i + 1) {
                let s = self.vars.fresh().pos();
                // s <=> prev[j] | (x & prev[j - 1]), with prev[0] = true.
                let same = prev.get(j - 1).copied();
                let less = if j == 1 { None } else { Some(prev[j - 2]) };

                if let Some(a) = same {
                    self.add(vec![-a, s]);
                }
                match less {
                    Some(b) => {
                        self.add(vec![-x, -b, s]);
                        self.add(std::iter::once(-s).chain(same).chain([b]).collect());
                    }
                    None => self.add(vec![-x, s]),
                }
                self.add(std::iter::once(-s).chain(same).chain([x]).collect());
                row.push(s);
            }
            prev = row;
        }

        if min >= 1 {
            self.add(vec![-p, prev[min - 1]]);
        }
        if max < n {
            self.add(vec![-p, -prev[max]]);
        }
    }

    /// Adds clauses forcing `expr` to take the given polarity.
    fn assert(&mut self, expr: &Expr, positive: bool) {
        match (expr, positive) {
            (Expr::Not(a), _) => self.assert(a, !positive),
            (Expr::And(a, b), true) | (Expr::Or(a, b), false) => {
                self.assert(a, positive);
                self.assert(b, positive);
            }
            (Expr::Implies(a, b), false) => {
                self.assert(a, true);
                self.assert(b, false);
            }
            _ => {
                let mut clause = Vec::new();
                self.clause_of(expr, positive, &mut clause);
                self.add(clause);
            }
        }
    }

    /// Flattens `expr` (with the given polarity) into the literals of one clause.
    fn clause_of(&mut self, expr: &Expr, positive: bool, out: &mut Vec<Lit>) {
        match (expr, positive) {
            (Expr::Var(name), _) => out.push(self.feature_var(name).lit(positive)),
            (Expr::Not(a), _) => self.clause_of(a, !positive, out),
            (Expr::Or(a, b), true) | (Expr::And(a, b), false) => {
                self.clause_of(a, positive, out);
                self.clause_of(b, positive, out);
            }
            (Expr::Implies(a, b), true) => {
                self.clause_of(a, false, out);
                self.clause_of(b, true, out);
            }
            _ => {
                let t = self.define(expr);
                out.push(if positive { t } else { -t });
            }
        }
    }

    fn feature_var(&self, name: &str) -> Var {
        // Constraint names are validated when the model is built.
        self.vars
            .var(name)
            .unwrap_or_else(|| unreachable!("unknown feature '{}' in a validated model", name))
    }

    /// Tseitin definition: returns a literal equivalent to `expr`.
    fn define(&mut self, expr: &Expr) -> Lit {
        let (a, b) = match expr {
            Expr::Var(name) => return self.feature_var(name).pos(),
            Expr::Not(a) => return -self.define(a),
            Expr::And(a, b) | Expr::Or(a, b) | Expr::Implies(a, b) | Expr::Equiv(a, b) => (a, b),
        };
        let a = self.define(a);
        let b = self.define(b);
        let t = self.vars.fresh().pos();
        match expr {
            Expr::And(..) => {
                self.add(vec![-t, a]);
                self.add(vec![-t, b]);
                self.add(vec![t, -a, -b]);
            }
            Expr::Or(..) => {
                self.add(vec![-t, a, b]);
                self.add(vec![t, -a]);
                self.add(vec![t, -b]);
            }
            Expr::Implies(..) => {
                self.add(vec![-t, -a, b]);
                self.add(vec![t, a]);
                self.add(vec![t, -b]);
            }
            _ => {
                self.add(vec![-t, -a, b]);
                self.add(vec![-t, a, -b]);
                self.add(vec![t, a, b]);
                self.add(vec![t, -a, -b]);
            }
        }
        t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::pizza;
    use crate::model::FeatureModelBuilder;

    fn dimacs(clauses: &[Vec<Lit>]) -> Vec<Vec<i32>> {
        clauses
            .iter()
            .map(|c| c.iter().map(|l| l.to_dimacs()).collect())
            .collect()
    }

    /// Counts assignments of all variables satisfying every clause.
    fn brute_force_count(model: &SatModel) -> usize {
        let n = model.num_vars();
        (0u64..1 << n)
            .filter(|bits| {
                model.clauses().iter().all(|clause| {
                    clause.iter().any(|l| {
                        let value = bits >> (l.var().id() - 1) & 1 == 1;
                        value == l.is_positive()
                    })
                })
            })
            .count()
    }

    #[test]
    fn test_relation_clauses() {
        let fm = FeatureModelBuilder::new("A")
            .mandatory("A", "B")
            .optional("A", "C")
            .alternative("B", &["D", "E"])
            .build()
            .unwrap();
        let model = build_sat_model(&fm);
        // Pre-order numbering: A=1 B=2 D=3 E=4 C=5.
        assert_eq!(
            dimacs(model.clauses()),
            vec![
                vec![1],
                vec![-1, 2],
                vec![-2, 1],
                vec![-2, 3, 4],
                vec![-3, -4],
                vec![-3, 2],
                vec![-4, 2],
                vec![-5, 1],
            ]
        );
        assert_eq!(model.origins()[0], ClauseOrigin::Root);
        assert_eq!(model.num_vars(), 5);
        assert_eq!(brute_force_count(&model), 4);
    }

    #[test]
    fn test_pizza_count() {
        let model = build_sat_model(&pizza());
        assert_eq!(model.num_features(), 12);
        assert_eq!(model.num_vars(), 12);
        assert_eq!(*model.origins().last().unwrap(), ClauseOrigin::Constraint(0));
        assert_eq!(brute_force_count(&model), 42);
    }

    #[test]
    fn test_cardinal_counter_is_exact() {
        for (min, max) in [(2, 3), (0, 2), (3, 4), (0, 3)] {
            let fm = FeatureModelBuilder::new("R")
                .add_relation("R", ["A", "B", "C", "D"], min, max)
                .build()
                .unwrap();
            let model = build_sat_model(&fm);
            assert!(model.num_vars() > 5);
            // The root is always selected, so each allowed subset of children is one product.
            let subsets: usize = (min..=max).map(|k| binomial(4, k)).sum();
            assert_eq!(brute_force_count(&model), subsets, "[{}..{}]", min, max);
        }
    }

    fn binomial(n: usize, k: usize) -> usize {
        (0..k).fold(1, |acc, i| acc * (n - i) / (i + 1))
    }

    #[test]
    fn test_tseitin_keeps_model_count() {
        let fm = FeatureModelBuilder::new("R")
            .optional("R", "A")
            .optional("R", "B")
            .optional("R", "C")
            .add_constraint(Expr::equiv(
                Expr::var("A"),
                Expr::and(Expr::var("B"), Expr::not(Expr::var("C"))),
            ))
            .add_constraint(Expr::not(Expr::and(Expr::var("A"), Expr::var("C"))))
            .build()
            .unwrap();
        let model = build_sat_model(&fm);
        assert!(model.num_vars() > 4);
        // A <=> (B & !C): (A,B,C) in {000, 001, 011, 110}, all satisfy !(A & C).
        assert_eq!(brute_force_count(&model), 4);
    }

    #[test]
    fn test_clause_shaped_constraints_stay_direct() {
        let fm = FeatureModelBuilder::new("R")
            .optional("R", "A")
            .optional("R", "B")
            .add_constraint(Expr::implies(Expr::var("A"), Expr::not(Expr::var("B"))))
            .add_constraint(Expr::and(Expr::var("A"), Expr::or(Expr::var("A"), Expr::var("B"))))
            .build()
            .unwrap();
        let model = build_sat_model(&fm);
        assert_eq!(model.num_vars(), 3);
        let constraint_clauses: Vec<_> = model
            .clauses()
            .iter()
            .zip(model.origins())
            .filter(|(_, o)| matches!(o, ClauseOrigin::Constraint(_)))
            .map(|(c, _)| c.iter().map(|l| l.to_dimacs()).collect::<Vec<_>>())
            .collect();
        assert_eq!(constraint_clauses, vec![vec![-2, -3], vec![2], vec![2, 3]]);
    }

    #[test]
    fn test_dimacs_output() {
        let fm = FeatureModelBuilder::new("A").optional("A", "B").build().unwrap();
        let text = build_sat_model(&fm).to_dimacs();
        assert_eq!(text, "c 1 A\nc 2 B\np cnf 2 2\n1 0\n-2 1 0\n");
    }
}
