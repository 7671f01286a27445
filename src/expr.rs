//! Cross-tree constraint expressions.
//!
//! A constraint is a boolean formula over feature names. The tree is boxed
//! and built through the smart constructors below, which fold double
//! negations on the way in.

use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Var(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Implies(Box<Expr>, Box<Expr>),
    Equiv(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(name.into())
    }

    pub fn not(value: Self) -> Self {
        match value {
            Expr::Not(inner) => *inner,
            _ => Expr::Not(Box::new(value)),
        }
    }

    pub fn and(lhs: Self, rhs: Self) -> Self {
        Expr::And(Box::new(lhs), Box::new(rhs))
    }

    pub fn or(lhs: Self, rhs: Self) -> Self {
        Expr::Or(Box::new(lhs), Box::new(rhs))
    }

    pub fn implies(lhs: Self, rhs: Self) -> Self {
        Expr::Implies(Box::new(lhs), Box::new(rhs))
    }

    pub fn equiv(lhs: Self, rhs: Self) -> Self {
        Expr::Equiv(Box::new(lhs), Box::new(rhs))
    }

    /// Names of all features mentioned in the expression, sorted.
    pub fn features(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::new();
        self.collect_features(&mut names);
        names
    }

    fn collect_features<'a>(&'a self, names: &mut BTreeSet<&'a str>) {
        match self {
            Expr::Var(name) => {
                names.insert(name.as_str());
            }
            Expr::Not(a) => a.collect_features(names),
            Expr::And(a, b) | Expr::Or(a, b) | Expr::Implies(a, b) | Expr::Equiv(a, b) => {
                a.collect_features(names);
                b.collect_features(names);
            }
        }
    }

    /// Evaluates the expression under the given selection.
    pub fn eval<F>(&self, selected: &F) -> bool
    where
        F: Fn(&str) -> bool,
    {
        match self {
            Expr::Var(name) => selected(name),
            Expr::Not(a) => !a.eval(selected),
            Expr::And(a, b) => a.eval(selected) && b.eval(selected),
            Expr::Or(a, b) => a.eval(selected) || b.eval(selected),
            Expr::Implies(a, b) => !a.eval(selected) || b.eval(selected),
            Expr::Equiv(a, b) => a.eval(selected) == b.eval(selected),
        }
    }

    /// Binding strength used when printing; higher binds tighter.
    fn precedence(&self) -> u8 {
        match self {
            Expr::Var(_) | Expr::Not(_) => 5,
            Expr::And(..) => 4,
            Expr::Or(..) => 3,
            Expr::Implies(..) => 2,
            Expr::Equiv(..) => 1,
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, parent: u8, right: bool) -> fmt::Result {
        // Binary operators are left-associative, so a right operand of equal
        // precedence needs parentheses.
        let prec = self.precedence();
        if prec < parent || (right && prec == parent && parent < 5) {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (a, op, b) = match self {
            Expr::Var(name) => {
                return if is_plain_name(name) {
                    write!(f, "{}", name)
                } else {
                    write!(f, "\"{}\"", name)
                };
            }
            Expr::Not(a) => {
                write!(f, "!")?;
                return a.fmt_operand(f, 5, false);
            }
            Expr::And(a, b) => (a, "&", b),
            Expr::Or(a, b) => (a, "|", b),
            Expr::Implies(a, b) => (a, "=>", b),
            Expr::Equiv(a, b) => (a, "<=>", b),
        };
        let prec = self.precedence();
        a.fmt_operand(f, prec, false)?;
        write!(f, " {} ", op)?;
        b.fmt_operand(f, prec, true)
    }
}

pub(crate) fn is_plain_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => chars.all(|c| c.is_alphanumeric() || c == '_' || c == '.'),
        _ => false,
    }
}

/// A named cross-tree constraint of a feature model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub expr: Expr,
}

impl Constraint {
    pub fn new(expr: Expr) -> Self {
        Self { expr }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_negation_folds() {
        let e = Expr::not(Expr::not(Expr::var("A")));
        assert_eq!(e, Expr::var("A"));
    }

    #[test]
    fn test_features_sorted_and_unique() {
        let e = Expr::implies(
            Expr::and(Expr::var("B"), Expr::var("A")),
            Expr::or(Expr::var("A"), Expr::not(Expr::var("C"))),
        );
        let names: Vec<_> = e.features().into_iter().collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_eval() {
        let e = Expr::equiv(Expr::var("A"), Expr::not(Expr::var("B")));
        assert!(e.eval(&|name| name == "A"));
        assert!(!e.eval(&|_| true));
        assert!(!e.eval(&|_| false));
    }

    #[test]
    fn test_display_parenthesizes_by_precedence() {
        let e = Expr::implies(Expr::var("CheesyCrust"), Expr::var("Big"));
        assert_eq!(e.to_string(), "CheesyCrust => Big");

        let e = Expr::and(Expr::or(Expr::var("A"), Expr::var("B")), Expr::not(Expr::var("C")));
        assert_eq!(e.to_string(), "(A | B) & !C");

        let e = Expr::not(Expr::and(Expr::var("A"), Expr::var("B")));
        assert_eq!(e.to_string(), "!(A & B)");

        let e = Expr::and(Expr::var("A"), Expr::and(Expr::var("B"), Expr::var("C")));
        assert_eq!(e.to_string(), "A & (B & C)");

        let e = Expr::var("Extra Cheese");
        assert_eq!(e.to_string(), "\"Extra Cheese\"");
    }
}
