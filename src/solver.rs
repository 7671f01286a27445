//! Incremental CDCL SAT solver.
//!
//! Conflict-driven clause learning with two watched literals, first-UIP
//! conflict analysis, VSIDS variable activities kept in a binary heap, phase
//! saving and Luby restarts. Clauses can be added between calls, and each call
//! may pass assumption literals that hold for that call only.

use std::time::{Duration, Instant};

use log::debug;

use crate::error::SolverError;
use crate::types::{Lit, Var};

const VAR_DECAY: f64 = 0.95;
const CLAUSE_DECAY: f64 = 0.999;
const RESTART_BASE: u64 = 100;
/// Learnt clauses tolerated before the first reduction, at least.
const LEARNT_FLOOR: f64 = 100.0;
const LEARNT_GROWTH: f64 = 1.1;

/// Resource limits applied to every solve call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolverConfig {
    pub conflict_limit: Option<u64>,
    pub time_limit: Option<Duration>,
}

impl SolverConfig {
    pub fn with_conflict_limit(mut self, limit: u64) -> Self {
        self.conflict_limit = Some(limit);
        self
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SolveResult {
    Sat,
    Unsat,
}

impl SolveResult {
    pub fn is_sat(self) -> bool {
        self == SolveResult::Sat
    }
}

#[derive(Debug, Clone)]
struct Clause {
    lits: Vec<Lit>,
    learnt: bool,
    activity: f64,
}

/// Max-heap of variables ordered by activity.
#[derive(Debug, Default)]
struct VarHeap {
    heap: Vec<usize>,
    positions: Vec<Option<usize>>,
}

impl VarHeap {
    fn grow(&mut self, num_vars: usize) {
        self.positions.resize(num_vars + 1, None);
    }

    fn contains(&self, v: usize) -> bool {
        self.positions[v].is_some()
    }

    fn insert(&mut self, v: usize, activity: &[f64]) {
        if self.contains(v) {
            return;
        }
        self.positions[v] = Some(self.heap.len());
        self.heap.push(v);
        self.sift_up(self.heap.len() - 1, activity);
    }

    fn increase(&mut self, v: usize, activity: &[f64]) {
        if let Some(i) = self.positions[v] {
            self.sift_up(i, activity);
        }
    }

    fn pop(&mut self, activity: &[f64]) -> Option<usize> {
        let top = *self.heap.first()?;
        let last = self.heap.len() - 1;
        self.heap.swap(0, last);
        self.positions[self.heap[0]] = Some(0);
        self.heap.pop();
        self.positions[top] = None;
        if !self.heap.is_empty() {
            self.sift_down(0, activity);
        }
        Some(top)
    }

    fn sift_up(&mut self, mut i: usize, activity: &[f64]) {
        let v = self.heap[i];
        while i > 0 {
            let parent = (i - 1) / 2;
            if activity[self.heap[parent]] >= activity[v] {
                break;
            }
            self.heap[i] = self.heap[parent];
            self.positions[self.heap[i]] = Some(i);
            i = parent;
        }
        self.heap[i] = v;
        self.positions[v] = Some(i);
    }

    fn sift_down(&mut self, mut i: usize, activity: &[f64]) {
        let v = self.heap[i];
        let n = self.heap.len();
        loop {
            let left = 2 * i + 1;
            if left >= n {
                break;
            }
            let right = left + 1;
            let child = if right < n && activity[self.heap[right]] > activity[self.heap[left]] {
                right
            } else {
                left
            };
            if activity[self.heap[child]] <= activity[v] {
                break;
            }
            self.heap[i] = self.heap[child];
            self.positions[self.heap[i]] = Some(i);
            i = child;
        }
        self.heap[i] = v;
        self.positions[v] = Some(i);
    }
}

/// The Luby sequence 1, 1, 2, 1, 1, 2, 4, 1, ...
#[derive(Debug, Clone)]
struct Luby {
    u: u64,
    v: u64,
}

impl Default for Luby {
    fn default() -> Self {
        Luby { u: 1, v: 1 }
    }
}

impl Iterator for Luby {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        let value = self.v;
        if self.u & self.u.wrapping_neg() == self.v {
            self.u += 1;
            self.v = 1;
        } else {
            self.v *= 2;
        }
        Some(value)
    }
}

enum Watch {
    Keep,
    Moved,
    Unit(Lit),
    Conflict,
}

#[derive(Debug)]
pub struct Solver {
    config: SolverConfig,
    ok: bool,
    clauses: Vec<Clause>,
    /// `watches[p.index()]` lists the clauses watching `-p`, visited when `p` becomes true.
    watches: Vec<Vec<usize>>,
    assigns: Vec<Option<bool>>,
    level: Vec<usize>,
    reason: Vec<Option<usize>>,
    trail: Vec<Lit>,
    trail_lim: Vec<usize>,
    qhead: usize,
    activity: Vec<f64>,
    var_inc: f64,
    cla_inc: f64,
    num_learnts: usize,
    max_learnts: f64,
    phase: Vec<bool>,
    seen: Vec<bool>,
    order: VarHeap,
    model: Vec<bool>,
    num_conflicts: u64,
    num_decisions: u64,
    num_reductions: u64,
}

fn lit_value(assigns: &[Option<bool>], lit: Lit) -> Option<bool> {
    assigns[lit.var().index()].map(|value| value == lit.is_positive())
}

impl Default for Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver {
    pub fn new() -> Self {
        Self::with_config(SolverConfig::default())
    }

    pub fn with_config(config: SolverConfig) -> Self {
        let mut solver = Solver {
            config,
            ok: true,
            clauses: Vec::new(),
            watches: Vec::new(),
            assigns: Vec::new(),
            level: Vec::new(),
            reason: Vec::new(),
            trail: Vec::new(),
            trail_lim: Vec::new(),
            qhead: 0,
            activity: Vec::new(),
            var_inc: 1.0,
            cla_inc: 1.0,
            num_learnts: 0,
            max_learnts: 0.0,
            phase: Vec::new(),
            seen: Vec::new(),
            order: VarHeap::default(),
            model: Vec::new(),
            num_conflicts: 0,
            num_decisions: 0,
            num_reductions: 0,
        };
        solver.reserve_vars(0);
        solver
    }

    /// Makes sure variables `1..=num_vars` exist.
    pub fn reserve_vars(&mut self, num_vars: usize) {
        let old = self.assigns.len();
        if num_vars < old {
            return;
        }
        self.assigns.resize(num_vars + 1, None);
        self.level.resize(num_vars + 1, 0);
        self.reason.resize(num_vars + 1, None);
        self.activity.resize(num_vars + 1, 0.0);
        self.phase.resize(num_vars + 1, false);
        self.seen.resize(num_vars + 1, false);
        self.watches.resize(2 * (num_vars + 1), Vec::new());
        self.order.grow(num_vars);
        for v in old.max(1)..=num_vars {
            self.order.insert(v, &self.activity);
        }
    }

    fn value(&self, lit: Lit) -> Option<bool> {
        lit_value(&self.assigns, lit)
    }

    fn decision_level(&self) -> usize {
        self.trail_lim.len()
    }

    /// Adds a clause. Returns `false` once the clause set is known to be unsatisfiable.
    pub fn add_clause(&mut self, lits: &[Lit]) -> bool {
        if !self.ok {
            return false;
        }
        if let Some(max) = lits.iter().map(|l| l.var().index()).max() {
            self.reserve_vars(max);
        }

        let mut clause = lits.to_vec();
        clause.sort_unstable();
        clause.dedup();
        if clause.windows(2).any(|w| w[0] == -w[1]) || clause.iter().any(|&l| self.value(l) == Some(true)) {
            return true;
        }
        clause.retain(|&l| self.value(l).is_none());

        match clause.len() {
            0 => self.ok = false,
            1 => {
                self.enqueue(clause[0], None);
                if self.propagate().is_some() {
                    self.ok = false;
                }
            }
            _ => {
                self.attach(clause, false);
            }
        }
        self.ok
    }

    fn attach(&mut self, lits: Vec<Lit>, learnt: bool) -> usize {
        let index = self.clauses.len();
        self.watches[(-lits[0]).index()].push(index);
        self.watches[(-lits[1]).index()].push(index);
        self.clauses.push(Clause {
            lits,
            learnt,
            activity: 0.0,
        });
        if learnt {
            self.num_learnts += 1;
        }
        index
    }

    fn enqueue(&mut self, lit: Lit, reason: Option<usize>) {
        let v = lit.var().index();
        self.assigns[v] = Some(lit.is_positive());
        self.level[v] = self.decision_level();
        self.reason[v] = reason;
        self.trail.push(lit);
    }

    fn new_decision_level(&mut self) {
        self.trail_lim.push(self.trail.len());
    }

    fn cancel_until(&mut self, level: usize) {
        if self.decision_level() <= level {
            return;
        }
        let start = self.trail_lim[level];
        for i in (start..self.trail.len()).rev() {
            let lit = self.trail[i];
            let v = lit.var().index();
            self.assigns[v] = None;
            self.reason[v] = None;
            self.phase[v] = lit.is_positive();
            self.order.insert(v, &self.activity);
        }
        self.trail.truncate(start);
        self.trail_lim.truncate(level);
        self.qhead = self.trail.len();
    }

    /// Unit propagation. Returns the index of a conflicting clause, if any.
    fn propagate(&mut self) -> Option<usize> {
        while self.qhead < self.trail.len() {
            let p = self.trail[self.qhead];
            self.qhead += 1;
            let false_lit = -p;

            let mut ws = std::mem::take(&mut self.watches[p.index()]);
            let mut conflict = None;
            let mut i = 0;
            let mut j = 0;
            while i < ws.len() {
                let ci = ws[i];
                i += 1;

                let watch = {
                    let lits = &mut self.clauses[ci].lits;
                    if lits[0] == false_lit {
                        lits.swap(0, 1);
                    }
                    let first = lits[0];
                    if lit_value(&self.assigns, first) == Some(true) {
                        Watch::Keep
                    } else if let Some(k) = (2..lits.len()).find(|&k| lit_value(&self.assigns, lits[k]) != Some(false)) {
                        lits.swap(1, k);
                        self.watches[(-lits[1]).index()].push(ci);
                        Watch::Moved
                    } else if lit_value(&self.assigns, first) == Some(false) {
                        Watch::Conflict
                    } else {
                        Watch::Unit(first)
                    }
                };

                match watch {
                    Watch::Moved => {}
                    Watch::Keep => {
                        ws[j] = ci;
                        j += 1;
                    }
                    Watch::Unit(first) => {
                        ws[j] = ci;
                        j += 1;
                        self.enqueue(first, Some(ci));
                    }
                    Watch::Conflict => {
                        ws[j] = ci;
                        j += 1;
                        while i < ws.len() {
                            ws[j] = ws[i];
                            j += 1;
                            i += 1;
                        }
                        conflict = Some(ci);
                    }
                }
            }
            ws.truncate(j);
            self.watches[p.index()] = ws;

            if conflict.is_some() {
                self.qhead = self.trail.len();
                return conflict;
            }
        }
        None
    }

    fn bump(&mut self, v: usize) {
        self.activity[v] += self.var_inc;
        if self.activity[v] > 1e100 {
            for a in self.activity.iter_mut() {
                *a *= 1e-100;
            }
            self.var_inc *= 1e-100;
        }
        self.order.increase(v, &self.activity);
    }

    fn bump_clause(&mut self, index: usize) {
        let clause = &mut self.clauses[index];
        if !clause.learnt {
            return;
        }
        clause.activity += self.cla_inc;
        if clause.activity > 1e20 {
            for c in self.clauses.iter_mut().filter(|c| c.learnt) {
                c.activity *= 1e-20;
            }
            self.cla_inc *= 1e-20;
        }
    }

    /// Drops the less active half of the learnt clauses longer than two literals.
    ///
    /// Must run at decision level 0, where no clause is the reason of a
    /// literal still needed by conflict analysis.
    fn reduce_learnts(&mut self) {
        debug_assert_eq!(self.decision_level(), 0);
        for lit in &self.trail {
            self.reason[lit.var().index()] = None;
        }

        let mut candidates: Vec<usize> = (0..self.clauses.len())
            .filter(|&i| self.clauses[i].learnt && self.clauses[i].lits.len() > 2)
            .collect();
        candidates.sort_by(|&a, &b| self.clauses[a].activity.total_cmp(&self.clauses[b].activity));
        let mut removed = vec![false; self.clauses.len()];
        for &i in &candidates[..candidates.len() / 2] {
            removed[i] = true;
        }

        let before = self.num_learnts;
        let clauses = std::mem::take(&mut self.clauses);
        self.clauses = clauses
            .into_iter()
            .zip(removed)
            .filter_map(|(clause, removed)| (!removed).then_some(clause))
            .collect();
        // Watched literals stay in positions 0 and 1, so the watch lists can be rebuilt as is.
        for ws in self.watches.iter_mut() {
            ws.clear();
        }
        for (i, clause) in self.clauses.iter().enumerate() {
            self.watches[(-clause.lits[0]).index()].push(i);
            self.watches[(-clause.lits[1]).index()].push(i);
        }

        self.num_learnts = self.clauses.iter().filter(|c| c.learnt).count();
        self.max_learnts *= LEARNT_GROWTH;
        self.num_reductions += 1;
        debug!(
            "Reduced learnt clauses from {} to {}, next reduction at {:.0}",
            before, self.num_learnts, self.max_learnts
        );
    }

    fn reduce_if_needed(&mut self) {
        if self.num_learnts as f64 >= self.max_learnts {
            self.reduce_learnts();
        }
    }

    /// First-UIP analysis. Returns the learnt clause, asserting literal first,
    /// and the level to backjump to.
    fn analyze(&mut self, mut conflict: usize) -> (Vec<Lit>, usize) {
        let mut learnt = vec![Lit::from_dimacs(1)];
        let mut pending = 0;
        let mut index = self.trail.len();
        let mut skip_first = false;

        loop {
            self.bump_clause(conflict);
            let lits = self.clauses[conflict].lits.clone();
            let start = usize::from(skip_first);
            for &q in &lits[start..] {
                let v = q.var().index();
                if !self.seen[v] && self.level[v] > 0 {
                    self.bump(v);
                    self.seen[v] = true;
                    if self.level[v] >= self.decision_level() {
                        pending += 1;
                    } else {
                        learnt.push(q);
                    }
                }
            }

            loop {
                index -= 1;
                if self.seen[self.trail[index].var().index()] {
                    break;
                }
            }
            let p = self.trail[index];
            self.seen[p.var().index()] = false;
            pending -= 1;
            if pending == 0 {
                learnt[0] = -p;
                break;
            }
            match self.reason[p.var().index()] {
                Some(r) => conflict = r,
                None => unreachable!("implied literal without a reason"),
            }
            skip_first = true;
        }

        // Drop literals whose reason is covered by the rest of the clause.
        let mut kept = Vec::with_capacity(learnt.len());
        kept.push(learnt[0]);
        for &q in &learnt[1..] {
            let redundant = match self.reason[q.var().index()] {
                Some(r) => self.clauses[r].lits[1..].iter().all(|l| {
                    let v = l.var().index();
                    self.seen[v] || self.level[v] == 0
                }),
                None => false,
            };
            if !redundant {
                kept.push(q);
            }
        }
        for q in &learnt[1..] {
            self.seen[q.var().index()] = false;
        }
        let mut learnt = kept;

        let backjump = if learnt.len() == 1 {
            0
        } else {
            let (i, level) = learnt[1..]
                .iter()
                .enumerate()
                .map(|(i, l)| (i + 1, self.level[l.var().index()]))
                .max_by_key(|&(_, level)| level)
                .unwrap_or((1, 0));
            learnt.swap(1, i);
            level
        };
        (learnt, backjump)
    }

    fn pick_branch(&mut self) -> Option<Lit> {
        while let Some(v) = self.order.pop(&self.activity) {
            if self.assigns[v].is_none() {
                return Some(Var::new(v as u32).lit(self.phase[v]));
            }
        }
        None
    }

    pub fn solve(&mut self) -> Result<SolveResult, SolverError> {
        self.solve_with(&[])
    }

    /// Solves under the given assumptions, which only hold for this call.
    pub fn solve_with(&mut self, assumptions: &[Lit]) -> Result<SolveResult, SolverError> {
        self.model.clear();
        if !self.ok {
            return Ok(SolveResult::Unsat);
        }
        if let Some(max) = assumptions.iter().map(|l| l.var().index()).max() {
            self.reserve_vars(max);
        }

        let originals = self.clauses.len() - self.num_learnts;
        self.max_learnts = self.max_learnts.max(originals as f64 / 3.0).max(LEARNT_FLOOR);
        self.reduce_if_needed();

        let start = Instant::now();
        let conflicts_before = self.num_conflicts;
        let mut luby = Luby::default();
        let mut restart_limit = luby.next().unwrap_or(1) * RESTART_BASE;
        let mut since_restart = 0;

        let result = 'search: loop {
            if let Some(conflict) = self.propagate() {
                self.num_conflicts += 1;
                since_restart += 1;
                if self.decision_level() == 0 {
                    self.ok = false;
                    break Ok(SolveResult::Unsat);
                }
                let (learnt, backjump) = self.analyze(conflict);
                self.cancel_until(backjump);
                let asserting = learnt[0];
                if learnt.len() == 1 {
                    self.enqueue(asserting, None);
                } else {
                    let index = self.attach(learnt, true);
                    self.enqueue(asserting, Some(index));
                }
                self.var_inc /= VAR_DECAY;
                self.cla_inc /= CLAUSE_DECAY;

                let used = self.num_conflicts - conflicts_before;
                if let Some(limit) = self.config.conflict_limit {
                    if used >= limit {
                        break Err(SolverError::ConflictLimit(limit));
                    }
                }
                if let Some(limit) = self.config.time_limit {
                    if start.elapsed() >= limit {
                        break Err(SolverError::TimeLimit(limit));
                    }
                }
                continue;
            }

            if since_restart >= restart_limit {
                self.cancel_until(0);
                self.reduce_if_needed();
                restart_limit = luby.next().unwrap_or(1) * RESTART_BASE;
                since_restart = 0;
                continue;
            }

            let mut next = None;
            while self.decision_level() < assumptions.len() {
                let a = assumptions[self.decision_level()];
                match self.value(a) {
                    Some(true) => self.new_decision_level(),
                    Some(false) => break 'search Ok(SolveResult::Unsat),
                    None => {
                        next = Some(a);
                        break;
                    }
                }
            }
            let lit = match next.or_else(|| self.pick_branch()) {
                Some(lit) => lit,
                None => {
                    self.model = self.assigns.iter().map(|a| a.unwrap_or(false)).collect();
                    break Ok(SolveResult::Sat);
                }
            };
            self.num_decisions += 1;
            self.new_decision_level();
            self.enqueue(lit, None);
        };

        self.cancel_until(0);
        debug!(
            "Solve call with {} assumptions finished in {:?}: {:?}, {} conflicts, {} decisions in total",
            assumptions.len(),
            start.elapsed(),
            result,
            self.num_conflicts - conflicts_before,
            self.num_decisions
        );
        result
    }

    /// Value of a variable in the model found by the last satisfiable call.
    pub fn model_value(&self, var: Var) -> Option<bool> {
        self.model.get(var.index()).copied()
    }

    /// The model of the last satisfiable call restricted to the given literals.
    pub fn model_lits(&self, vars: impl IntoIterator<Item = Var>) -> Vec<Lit> {
        vars.into_iter()
            .filter_map(|v| self.model_value(v).map(|value| v.lit(value)))
            .collect()
    }
}
