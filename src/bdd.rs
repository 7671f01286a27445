//! Reduced ordered BDDs with complement edges.
//!
//! Variable `1` is the top of the order. Node `1` is the terminal: `one` is a
//! regular edge to it and `zero` a complemented one. The high edge of a stored
//! node is never complemented, which keeps the representation canonical.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Debug;

use log::debug;
use num_bigint::BigUint;

use crate::reference::Ref;
use crate::types::{Lit, Var};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
struct Node {
    variable: u32,
    low: Ref,
    high: Ref,
}

pub struct Bdd {
    nodes: RefCell<Vec<Node>>,
    unique: RefCell<HashMap<Node, u32>>,
    cache: RefCell<HashMap<(Ref, Ref, Ref), Ref>>,
    pub zero: Ref,
    pub one: Ref,
}

impl Bdd {
    pub fn new() -> Self {
        let terminal = Node {
            variable: 0,
            low: Ref::positive(1),
            high: Ref::positive(1),
        };
        // Slot 0 is never referenced, so node ids start at 1.
        let nodes = vec![terminal, terminal];
        let one = Ref::positive(1);
        Self {
            nodes: RefCell::new(nodes),
            unique: RefCell::new(HashMap::new()),
            cache: RefCell::new(HashMap::new()),
            zero: -one,
            one,
        }
    }
}

impl Default for Bdd {
    fn default() -> Self {
        Bdd::new()
    }
}

impl Debug for Bdd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bdd")
            .field("nodes", &self.num_nodes())
            .field("cache", &self.cache.borrow().len())
            .finish()
    }
}

impl Bdd {
    /// Number of allocated nodes, terminal included.
    pub fn num_nodes(&self) -> usize {
        self.nodes.borrow().len() - 1
    }

    /// Variable of the node an edge points to; `0` for the terminal.
    pub fn variable(&self, node: Ref) -> u32 {
        self.nodes.borrow()[node.index()].variable
    }

    /// Position of a node in the variable order, terminals last.
    fn level(&self, node: Ref) -> u32 {
        if self.is_terminal(node) {
            u32::MAX
        } else {
            self.variable(node)
        }
    }

    pub fn low_node(&self, node: Ref) -> Ref {
        let low = self.nodes.borrow()[node.index()].low;
        if node.is_negated() {
            -low
        } else {
            low
        }
    }

    pub fn high_node(&self, node: Ref) -> Ref {
        let high = self.nodes.borrow()[node.index()].high;
        if node.is_negated() {
            -high
        } else {
            high
        }
    }

    pub fn is_zero(&self, node: Ref) -> bool {
        node == self.zero
    }

    pub fn is_one(&self, node: Ref) -> bool {
        node == self.one
    }

    pub fn is_terminal(&self, node: Ref) -> bool {
        node.id() == 1
    }

    pub fn mk_node(&self, v: u32, low: Ref, high: Ref) -> Ref {
        assert_ne!(v, 0, "variable 0 is reserved for the terminal");

        if high.is_negated() {
            return -self.mk_node(v, -low, -high);
        }
        if low == high {
            return low;
        }

        let node = Node { variable: v, low, high };
        if let Some(&id) = self.unique.borrow().get(&node) {
            return Ref::positive(id);
        }
        let mut nodes = self.nodes.borrow_mut();
        let id = nodes.len() as u32;
        nodes.push(node);
        self.unique.borrow_mut().insert(node, id);
        Ref::positive(id)
    }

    pub fn mk_var(&self, v: u32) -> Ref {
        self.mk_node(v, self.zero, self.one)
    }

    /// Conjunction of literals.
    pub fn cube(&self, literals: impl IntoIterator<Item = Lit>) -> Ref {
        let mut literals: Vec<Lit> = literals.into_iter().collect();
        literals.sort_by_key(|l| std::cmp::Reverse(l.var()));
        let mut current = self.one;
        for lit in literals {
            let v = lit.var().id();
            current = if lit.is_negated() {
                self.mk_node(v, current, self.zero)
            } else {
                self.mk_node(v, self.zero, current)
            };
        }
        current
    }

    /// Cofactors of `node` with respect to variable `v`, which must not be below its top.
    pub fn top_cofactors(&self, node: Ref, v: u32) -> (Ref, Ref) {
        if self.is_terminal(node) || v < self.variable(node) {
            return (node, node);
        }
        debug_assert_eq!(v, self.variable(node));
        (self.low_node(node), self.high_node(node))
    }

    /// If-then-else: `(f ∧ g) ∨ (¬f ∧ h)`.
    ///
    /// Every boolean operator of the manager reduces to this one.
    pub fn apply_ite(&self, f: Ref, g: Ref, h: Ref) -> Ref {
        if self.is_terminal(f) {
            return if self.is_one(f) { g } else { h };
        }
        if g == h {
            return g;
        }

        // Arguments equal to f (or to its negation) become constants.
        let g = if g == f {
            self.one
        } else if g == -f {
            self.zero
        } else {
            g
        };
        let h = if h == f {
            self.zero
        } else if h == -f {
            self.one
        } else {
            h
        };
        if g == h {
            return g;
        }
        if self.is_one(g) && self.is_zero(h) {
            return f;
        }
        if self.is_zero(g) && self.is_one(h) {
            return -f;
        }

        // Cache key has f and g regular: swap branches for ~f, push the
        // negation of g out of the result.
        let (f, g, h) = if f.is_negated() { (-f, h, g) } else { (f, g, h) };
        let (g, h, negate) = if g.is_negated() { (-g, -h, true) } else { (g, h, false) };
        let sign = |r: Ref| if negate { -r } else { r };

        let key = (f, g, h);
        if let Some(&cached) = self.cache.borrow().get(&key) {
            return sign(cached);
        }

        let top = self.level(f).min(self.level(g)).min(self.level(h));
        let (f_lo, f_hi) = self.top_cofactors(f, top);
        let (g_lo, g_hi) = self.top_cofactors(g, top);
        let (h_lo, h_hi) = self.top_cofactors(h, top);
        let low = self.apply_ite(f_lo, g_lo, h_lo);
        let high = self.apply_ite(f_hi, g_hi, h_hi);

        let res = self.mk_node(top, low, high);
        self.cache.borrow_mut().insert(key, res);
        sign(res)
    }

    pub fn apply_not(&self, f: Ref) -> Ref {
        -f
    }

    pub fn apply_and(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, v, self.zero)
    }

    pub fn apply_or(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, self.one, v)
    }

    pub fn apply_xor(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, -v, v)
    }

    pub fn apply_eq(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, v, -v)
    }

    pub fn apply_imply(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, v, self.one)
    }

    pub fn apply_and_many(&self, nodes: impl IntoIterator<Item = Ref>) -> Ref {
        let mut res = self.one;
        for node in nodes {
            res = self.apply_and(res, node);
            if self.is_zero(res) {
                break;
            }
        }
        res
    }

    /// Cofactor of `f` with variable `v` fixed to `value`.
    pub fn restrict(&self, f: Ref, v: u32, value: bool) -> Ref {
        let mut cache = HashMap::new();
        self.restrict_rec(f, v, value, &mut cache)
    }

    fn restrict_rec(&self, f: Ref, v: u32, value: bool, cache: &mut HashMap<Ref, Ref>) -> Ref {
        if self.is_terminal(f) || self.variable(f) > v {
            return f;
        }
        if let Some(&res) = cache.get(&f) {
            return res;
        }
        let res = if self.variable(f) == v {
            if value {
                self.high_node(f)
            } else {
                self.low_node(f)
            }
        } else {
            let low = self.restrict_rec(self.low_node(f), v, value, cache);
            let high = self.restrict_rec(self.high_node(f), v, value, cache);
            self.mk_node(self.variable(f), low, high)
        };
        cache.insert(f, res);
        res
    }

    /// Number of nodes reachable from `f`, terminal included.
    pub fn size(&self, f: Ref) -> usize {
        let mut seen = std::collections::HashSet::new();
        let mut stack = vec![f.regular()];
        while let Some(node) = stack.pop() {
            if !seen.insert(node) || self.is_terminal(node) {
                continue;
            }
            stack.push(self.low_node(node).regular());
            stack.push(self.high_node(node).regular());
        }
        seen.len()
    }

    /// One satisfying assignment along a path to `one`, preferring high branches.
    pub fn one_sat(&self, node: Ref) -> Option<Vec<Lit>> {
        if self.is_zero(node) {
            return None;
        }
        let mut path = Vec::new();
        let mut current = node;
        while !self.is_one(current) {
            let var = Var::new(self.variable(current));
            let high = self.high_node(current);
            if !self.is_zero(high) {
                path.push(var.pos());
                current = high;
            } else {
                path.push(var.neg());
                current = self.low_node(current);
            }
        }
        Some(path)
    }

    /// Number of assignments to variables `1..=num_vars` satisfying `node`.
    pub fn sat_count(&self, node: Ref, num_vars: usize) -> BigUint {
        let mut cache = HashMap::new();
        let max = BigUint::from(1u32) << num_vars;
        let count = self.sat_count_rec(node, &max, &mut cache);
        debug!("sat_count({}) = {} over {} variables", node, count, num_vars);
        count
    }

    fn sat_count_rec(&self, node: Ref, max: &BigUint, cache: &mut HashMap<Ref, BigUint>) -> BigUint {
        if self.is_zero(node) {
            return BigUint::ZERO;
        } else if self.is_one(node) {
            return max.clone();
        }

        if let Some(count) = cache.get(&node) {
            return count.clone();
        }

        // Each branch covers half of the assignments.
        let regular = node.regular();
        let count_low = self.sat_count_rec(self.low_node(regular), max, cache);
        let count_high = self.sat_count_rec(self.high_node(regular), max, cache);
        let count: BigUint = (count_low + count_high) >> 1;
        let count = if node.is_negated() { max - count } else { count };

        cache.insert(node, count.clone());
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminals() {
        let bdd = Bdd::default();
        assert_eq!(bdd.zero, -bdd.one);
        assert!(bdd.is_terminal(bdd.zero));
        assert_eq!(bdd.apply_and(bdd.one, bdd.zero), bdd.zero);
        assert_eq!(bdd.apply_or(bdd.one, bdd.zero), bdd.one);
    }

    #[test]
    fn test_canonicity() {
        let bdd = Bdd::default();
        let x = bdd.mk_var(1);
        let y = bdd.mk_var(2);
        let z = bdd.mk_var(3);

        let f = bdd.apply_and(x, bdd.apply_or(y, z));
        let g = bdd.apply_or(bdd.apply_and(x, y), bdd.apply_and(z, x));
        assert_eq!(f, g);

        let not_and = -bdd.apply_and(x, y);
        let or_not = bdd.apply_or(-x, -y);
        assert_eq!(not_and, or_not);

        assert_eq!(bdd.apply_xor(x, x), bdd.zero);
        assert_eq!(bdd.apply_eq(x, x), bdd.one);
        assert_eq!(bdd.apply_imply(bdd.apply_and(x, y), x), bdd.one);
        assert_eq!(bdd.apply_and_many([x, y, z]), bdd.apply_and(bdd.apply_and(x, y), z));
        assert_eq!(bdd.apply_and_many([x, -x, y]), bdd.zero);
        assert_eq!(bdd.apply_and_many([]), bdd.one);
    }

    #[test]
    fn test_ite_matches_definition() {
        let bdd = Bdd::default();
        let x = bdd.mk_var(1);
        let y = bdd.mk_var(2);
        let z = bdd.mk_var(3);
        let f = bdd.apply_ite(x, y, z);
        assert_eq!(f, bdd.mk_node(1, z, y));
        assert_eq!(f, bdd.apply_or(bdd.apply_and(x, y), bdd.apply_and(-x, z)));
    }

    #[test]
    fn test_sat_count() {
        let bdd = Bdd::default();
        assert_eq!(bdd.sat_count(bdd.zero, 3), BigUint::ZERO);
        assert_eq!(bdd.sat_count(bdd.one, 3), BigUint::from(8u32));

        let x = bdd.mk_var(1);
        let y = bdd.mk_var(2);
        let z = bdd.mk_var(3);
        let f = bdd.apply_or(x, bdd.apply_and(y, z));
        assert_eq!(bdd.sat_count(f, 3), BigUint::from(5u32));
        assert_eq!(bdd.sat_count(-f, 3), BigUint::from(3u32));
        assert_eq!(bdd.sat_count(f, 4), BigUint::from(10u32));
    }

    #[test]
    fn test_cube_restrict_and_one_sat() {
        let bdd = Bdd::default();
        let (a, b, c) = (Var::new(1), Var::new(2), Var::new(3));
        let cube = bdd.cube([c.neg(), a.pos(), b.pos()]);
        assert_eq!(bdd.sat_count(cube, 3), BigUint::from(1u32));
        assert_eq!(bdd.one_sat(cube), Some(vec![a.pos(), b.pos(), c.neg()]));
        assert_eq!(bdd.restrict(cube, 2, false), bdd.zero);
        assert_eq!(bdd.restrict(cube, 2, true), bdd.cube([a.pos(), c.neg()]));
        assert_eq!(bdd.one_sat(bdd.zero), None);
        assert_eq!(bdd.size(cube), 4);
    }
}
