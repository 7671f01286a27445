//! Feature tree model.
//!
//! Features and relations live in two arenas owned by [`FeatureModel`] and
//! refer to each other through [`FeatureId`] and [`RelationId`] handles, so
//! the parent/child back-references never form ownership cycles. Features are
//! stored in pre-order: the root is always `FeatureId(0)`, and the feature
//! with id `i` is encoded by the propositional variable `i + 1`.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::Index;

use log::debug;

use crate::error::{Error, Result};
use crate::expr::{is_plain_name, Constraint, Expr};
use crate::types::Var;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FeatureId(u32);

impl FeatureId {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// The propositional variable encoding this feature.
    pub fn var(self) -> Var {
        Var::new(self.0 + 1)
    }

    /// Inverse of [`FeatureId::var`].
    pub fn from_var(var: Var) -> Self {
        FeatureId(var.id() - 1)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct RelationId(u32);

impl RelationId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Kind of a parent-children relation, derived from its cardinality.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum RelationKind {
    /// One child, `[1..1]`.
    Mandatory,
    /// One child, `[0..1]`.
    Optional,
    /// Two or more children, `[1..n]`.
    Or,
    /// Two or more children, `[1..1]`.
    Alternative,
    /// Two or more children, `[0..1]`.
    Mutex,
    /// Two or more children, any other `[a..b]`.
    Cardinal,
}

impl RelationKind {
    /// Classifies a relation with `children` children and bounds `[card_min..card_max]`.
    ///
    /// Returns `None` when the bounds are inconsistent with the number of
    /// children, so every accepted relation has exactly one kind.
    pub fn classify(children: usize, card_min: usize, card_max: usize) -> Option<Self> {
        if children == 0 || card_max == 0 || card_min > card_max || card_max > children {
            return None;
        }
        let kind = match (children, card_min, card_max) {
            (1, 1, 1) => RelationKind::Mandatory,
            (1, 0, 1) => RelationKind::Optional,
            (1, _, _) => return None,
            (n, 1, max) if max == n => RelationKind::Or,
            (_, 1, 1) => RelationKind::Alternative,
            (_, 0, 1) => RelationKind::Mutex,
            _ => RelationKind::Cardinal,
        };
        Some(kind)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RelationKind::Mandatory => "MANDATORY",
            RelationKind::Optional => "OPTIONAL",
            RelationKind::Or => "OR",
            RelationKind::Alternative => "XOR",
            RelationKind::Mutex => "MUX",
            RelationKind::Cardinal => "CARDINAL",
        }
    }

    pub fn is_group(self) -> bool {
        !matches!(self, RelationKind::Mandatory | RelationKind::Optional)
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Feature {
    pub name: String,
    pub parent: Option<FeatureId>,
    /// The relation of the parent this feature is a child of.
    pub parent_relation: Option<RelationId>,
    pub relations: Vec<RelationId>,
    pub is_abstract: bool,
    /// Raw UVL attributes other than `abstract`, in declaration order.
    pub attributes: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct Relation {
    pub parent: FeatureId,
    pub children: Vec<FeatureId>,
    pub card_min: usize,
    pub card_max: usize,
    pub kind: RelationKind,
}

#[derive(Debug, Clone)]
pub struct FeatureModel {
    features: Vec<Feature>,
    relations: Vec<Relation>,
    constraints: Vec<Constraint>,
    by_name: HashMap<String, FeatureId>,
}

impl Index<FeatureId> for FeatureModel {
    type Output = Feature;

    fn index(&self, id: FeatureId) -> &Self::Output {
        &self.features[id.index()]
    }
}

impl Index<RelationId> for FeatureModel {
    type Output = Relation;

    fn index(&self, id: RelationId) -> &Self::Output {
        &self.relations[id.index()]
    }
}

impl FeatureModel {
    pub fn root(&self) -> FeatureId {
        FeatureId(0)
    }

    pub fn num_features(&self) -> usize {
        self.features.len()
    }

    /// All features in pre-order, root first.
    pub fn features(&self) -> impl Iterator<Item = FeatureId> + '_ {
        (0..self.features.len() as u32).map(FeatureId)
    }

    pub fn relation_ids(&self) -> impl Iterator<Item = RelationId> + '_ {
        (0..self.relations.len() as u32).map(RelationId)
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Looks a feature up by name.
    pub fn feature(&self, name: &str) -> Result<FeatureId> {
        self.get(name).ok_or_else(|| Error::NotFound(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<FeatureId> {
        self.by_name.get(name).copied()
    }

    pub fn name(&self, id: FeatureId) -> &str {
        &self[id].name
    }

    pub fn names(&self, ids: impl IntoIterator<Item = FeatureId>) -> Vec<String> {
        ids.into_iter().map(|id| self.name(id).to_string()).collect()
    }

    pub fn parent(&self, id: FeatureId) -> Option<FeatureId> {
        self[id].parent
    }

    pub fn relations(&self, id: FeatureId) -> &[RelationId] {
        &self[id].relations
    }

    /// Children of a feature across all its relations, in declaration order.
    pub fn children(&self, id: FeatureId) -> Vec<FeatureId> {
        self[id]
            .relations
            .iter()
            .flat_map(|&r| self[r].children.iter().copied())
            .collect()
    }

    /// Ancestors of a feature, nearest first, ending with the root.
    pub fn ancestors(&self, id: FeatureId) -> Vec<FeatureId> {
        let mut res = Vec::new();
        let mut current = self.parent(id);
        while let Some(p) = current {
            res.push(p);
            current = self.parent(p);
        }
        res
    }

    /// Descendants reachable through chains of mandatory relations, in pre-order.
    pub fn mandatory_descendants(&self, id: FeatureId) -> Vec<FeatureId> {
        let mut res = Vec::new();
        self.collect_mandatory(id, &mut res);
        res
    }

    fn collect_mandatory(&self, id: FeatureId, res: &mut Vec<FeatureId>) {
        for child in self.children(id) {
            if self.is_mandatory(child) {
                res.push(child);
                self.collect_mandatory(child, res);
            }
        }
    }

    fn parent_kind(&self, id: FeatureId) -> Option<RelationKind> {
        self[id].parent_relation.map(|r| self[r].kind)
    }

    fn has_relation(&self, id: FeatureId, kind: RelationKind) -> bool {
        self[id].relations.iter().any(|&r| self[r].kind == kind)
    }

    pub fn is_root(&self, id: FeatureId) -> bool {
        self[id].parent.is_none()
    }

    /// The root, or a child of a mandatory relation.
    pub fn is_mandatory(&self, id: FeatureId) -> bool {
        self.is_root(id) || self.parent_kind(id) == Some(RelationKind::Mandatory)
    }

    pub fn is_optional(&self, id: FeatureId) -> bool {
        self.parent_kind(id) == Some(RelationKind::Optional)
    }

    pub fn is_leaf(&self, id: FeatureId) -> bool {
        self[id].relations.is_empty()
    }

    /// Whether the feature is the parent of an or-group.
    pub fn is_or_group(&self, id: FeatureId) -> bool {
        self.has_relation(id, RelationKind::Or)
    }

    /// Whether the feature is the parent of an alternative (xor) group.
    pub fn is_alternative_group(&self, id: FeatureId) -> bool {
        self.has_relation(id, RelationKind::Alternative)
    }

    /// Nested view of the tree: each feature with its relations and their children.
    pub fn to_display_tree(&self) -> DisplayFeature {
        self.display_feature(self.root())
    }

    fn display_feature(&self, id: FeatureId) -> DisplayFeature {
        DisplayFeature {
            name: self.name(id).to_string(),
            relations: self[id]
                .relations
                .iter()
                .map(|&r| {
                    let relation = &self[r];
                    DisplayRelation {
                        kind: relation.kind,
                        card_min: relation.card_min,
                        card_max: relation.card_max,
                        children: relation.children.iter().map(|&c| self.display_feature(c)).collect(),
                    }
                })
                .collect(),
        }
    }
}

/// Renders the model back as UVL.
impl fmt::Display for FeatureModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn quoted(name: &str) -> String {
            if is_plain_name(name) {
                name.to_string()
            } else {
                format!("\"{}\"", name)
            }
        }

        fn write_feature(model: &FeatureModel, f: &mut fmt::Formatter<'_>, id: FeatureId, depth: usize) -> fmt::Result {
            let feature = &model[id];
            write!(f, "{}{}", "    ".repeat(depth), quoted(&feature.name))?;
            let mut attributes = Vec::new();
            if feature.is_abstract {
                attributes.push("abstract".to_string());
            }
            for (key, value) in &feature.attributes {
                if value.is_empty() {
                    attributes.push(key.clone());
                } else {
                    attributes.push(format!("{} {}", key, value));
                }
            }
            if !attributes.is_empty() {
                write!(f, " {{{}}}", attributes.join(", "))?;
            }
            writeln!(f)?;
            for &r in &feature.relations {
                let relation = &model[r];
                let group = match relation.kind {
                    RelationKind::Mandatory => "mandatory".to_string(),
                    RelationKind::Optional => "optional".to_string(),
                    RelationKind::Or => "or".to_string(),
                    RelationKind::Alternative => "alternative".to_string(),
                    RelationKind::Mutex | RelationKind::Cardinal => {
                        format!("[{}..{}]", relation.card_min, relation.card_max)
                    }
                };
                writeln!(f, "{}{}", "    ".repeat(depth + 1), group)?;
                for &child in &relation.children {
                    write_feature(model, f, child, depth + 2)?;
                }
            }
            Ok(())
        }

        writeln!(f, "features")?;
        write_feature(self, f, self.root(), 1)?;
        if !self.constraints.is_empty() {
            writeln!(f)?;
            writeln!(f, "constraints")?;
            for constraint in &self.constraints {
                writeln!(f, "    {}", constraint)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayFeature {
    pub name: String,
    pub relations: Vec<DisplayRelation>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayRelation {
    pub kind: RelationKind,
    pub card_min: usize,
    pub card_max: usize,
    pub children: Vec<DisplayFeature>,
}

impl DisplayFeature {
    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        writeln!(f, "{}{}", "  ".repeat(depth), self.name)?;
        for relation in &self.relations {
            writeln!(
                f,
                "{}[{} {}..{}]",
                "  ".repeat(depth + 1),
                relation.kind,
                relation.card_min,
                relation.card_max
            )?;
            for child in &relation.children {
                child.fmt_indented(f, depth + 2)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for DisplayFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

#[derive(Debug, Default)]
struct PendingFeature {
    is_abstract: bool,
    attributes: Vec<(String, String)>,
}

#[derive(Debug)]
struct PendingRelation {
    parent: String,
    children: Vec<String>,
    card_min: usize,
    card_max: usize,
}

/// Incremental construction of a [`FeatureModel`].
///
/// Nothing is checked until [`FeatureModelBuilder::build`], which performs all
/// structural validation at once.
#[derive(Debug)]
pub struct FeatureModelBuilder {
    /// Feature names in declaration order, root first.
    names: Vec<String>,
    details: HashMap<String, PendingFeature>,
    relations: Vec<PendingRelation>,
    constraints: Vec<Constraint>,
}

impl FeatureModelBuilder {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            names: vec![root.into()],
            details: HashMap::new(),
            relations: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// Adds a relation from `parent` to freshly declared `children`.
    pub fn add_relation<S: Into<String>>(
        &mut self,
        parent: &str,
        children: impl IntoIterator<Item = S>,
        card_min: usize,
        card_max: usize,
    ) -> &mut Self {
        let children: Vec<String> = children.into_iter().map(Into::into).collect();
        self.names.extend(children.iter().cloned());
        self.relations.push(PendingRelation {
            parent: parent.to_string(),
            children,
            card_min,
            card_max,
        });
        self
    }

    pub fn mandatory(&mut self, parent: &str, child: &str) -> &mut Self {
        self.add_relation(parent, [child], 1, 1)
    }

    pub fn optional(&mut self, parent: &str, child: &str) -> &mut Self {
        self.add_relation(parent, [child], 0, 1)
    }

    pub fn or_group(&mut self, parent: &str, children: &[&str]) -> &mut Self {
        self.add_relation(parent, children.iter().copied(), 1, children.len())
    }

    pub fn alternative(&mut self, parent: &str, children: &[&str]) -> &mut Self {
        self.add_relation(parent, children.iter().copied(), 1, 1)
    }

    pub fn set_abstract(&mut self, name: &str, is_abstract: bool) -> &mut Self {
        self.details.entry(name.to_string()).or_default().is_abstract = is_abstract;
        self
    }

    pub fn add_attribute(&mut self, name: &str, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.details
            .entry(name.to_string())
            .or_default()
            .attributes
            .push((key.into(), value.into()));
        self
    }

    pub fn add_constraint(&mut self, expr: Expr) -> &mut Self {
        self.constraints.push(Constraint::new(expr));
        self
    }

    pub fn build(&mut self) -> Result<FeatureModel> {
        let mut seen = HashSet::new();
        for name in &self.names {
            if !seen.insert(name.as_str()) {
                return Err(Error::Structural(format!("duplicate feature name '{}'", name)));
            }
        }

        let mut by_parent: HashMap<&str, Vec<usize>> = HashMap::new();
        let mut kinds = Vec::with_capacity(self.relations.len());
        for (i, relation) in self.relations.iter().enumerate() {
            if !seen.contains(relation.parent.as_str()) {
                return Err(Error::Structural(format!(
                    "relation parent '{}' is not a feature",
                    relation.parent
                )));
            }
            let kind = RelationKind::classify(relation.children.len(), relation.card_min, relation.card_max)
                .ok_or_else(|| {
                    Error::Structural(format!(
                        "relation of '{}' with {} children has invalid cardinality [{}..{}]",
                        relation.parent,
                        relation.children.len(),
                        relation.card_min,
                        relation.card_max
                    ))
                })?;
            kinds.push(kind);
            by_parent.entry(relation.parent.as_str()).or_default().push(i);
        }

        let mut model = FeatureModel {
            features: Vec::with_capacity(self.names.len()),
            relations: Vec::with_capacity(self.relations.len()),
            constraints: Vec::new(),
            by_name: HashMap::with_capacity(self.names.len()),
        };
        self.visit(&self.names[0], None, None, &by_parent, &kinds, &mut model);

        if model.features.len() != self.names.len() {
            let unreachable: Vec<&str> = self
                .names
                .iter()
                .filter(|name| !model.by_name.contains_key(name.as_str()))
                .map(|name| name.as_str())
                .collect();
            return Err(Error::Structural(format!(
                "features not reachable from the root: {}",
                unreachable.join(", ")
            )));
        }

        for constraint in &self.constraints {
            for name in constraint.expr.features() {
                if !model.by_name.contains_key(name) {
                    return Err(Error::Structural(format!(
                        "constraint '{}' references unknown feature '{}'",
                        constraint, name
                    )));
                }
            }
        }
        model.constraints = self.constraints.clone();

        debug!(
            "Built feature model with {} features, {} relations and {} constraints",
            model.features.len(),
            model.relations.len(),
            model.constraints.len()
        );
        Ok(model)
    }

    fn visit(
        &self,
        name: &str,
        parent: Option<FeatureId>,
        parent_relation: Option<RelationId>,
        by_parent: &HashMap<&str, Vec<usize>>,
        kinds: &[RelationKind],
        model: &mut FeatureModel,
    ) -> FeatureId {
        let id = FeatureId(model.features.len() as u32);
        let details = self.details.get(name);
        model.features.push(Feature {
            name: name.to_string(),
            parent,
            parent_relation,
            relations: Vec::new(),
            is_abstract: details.is_some_and(|d| d.is_abstract),
            attributes: details.map(|d| d.attributes.clone()).unwrap_or_default(),
        });
        model.by_name.insert(name.to_string(), id);

        for &i in by_parent.get(name).map(|v| v.as_slice()).unwrap_or_default() {
            let pending = &self.relations[i];
            let rid = RelationId(model.relations.len() as u32);
            model.relations.push(Relation {
                parent: id,
                children: Vec::with_capacity(pending.children.len()),
                card_min: pending.card_min,
                card_max: pending.card_max,
                kind: kinds[i],
            });
            model.features[id.index()].relations.push(rid);
            for child in &pending.children {
                let child_id = self.visit(child, Some(id), Some(rid), by_parent, kinds, model);
                model.relations[rid.index()].children.push(child_id);
            }
        }
        id
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// The classic pizza model, built programmatically.
    pub(crate) fn pizza() -> FeatureModel {
        FeatureModelBuilder::new("Pizza")
            .set_abstract("Pizza", true)
            .mandatory("Pizza", "Topping")
            .mandatory("Pizza", "Size")
            .mandatory("Pizza", "Dough")
            .optional("Pizza", "CheesyCrust")
            .or_group("Topping", &["Salami", "Ham", "Mozzarella"])
            .alternative("Size", &["Normal", "Big"])
            .alternative("Dough", &["Neapolitan", "Sicilian"])
            .add_constraint(Expr::implies(Expr::var("CheesyCrust"), Expr::var("Big")))
            .build()
            .unwrap()
    }

    /// `pigeons` optional pigeon-in-hole features under the root, with one
    /// hole fewer than pigeons. Void, and hard for resolution.
    pub(crate) fn pigeonhole(pigeons: usize) -> FeatureModel {
        let holes = pigeons - 1;
        let name = |p: usize, h: usize| format!("P{}H{}", p, h);
        let mut builder = FeatureModelBuilder::new("Roost");
        for p in 0..pigeons {
            for h in 0..holes {
                builder.optional("Roost", &name(p, h));
            }
        }
        for p in 0..pigeons {
            let somewhere = (1..holes).fold(Expr::var(name(p, 0)), |acc, h| Expr::or(acc, Expr::var(name(p, h))));
            builder.add_constraint(somewhere);
        }
        for h in 0..holes {
            for a in 0..pigeons {
                for b in a + 1..pigeons {
                    builder.add_constraint(Expr::not(Expr::and(Expr::var(name(a, h)), Expr::var(name(b, h)))));
                }
            }
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_classify_is_total() {
        assert_eq!(RelationKind::classify(1, 1, 1), Some(RelationKind::Mandatory));
        assert_eq!(RelationKind::classify(1, 0, 1), Some(RelationKind::Optional));
        assert_eq!(RelationKind::classify(3, 1, 3), Some(RelationKind::Or));
        assert_eq!(RelationKind::classify(2, 1, 2), Some(RelationKind::Or));
        assert_eq!(RelationKind::classify(3, 1, 1), Some(RelationKind::Alternative));
        assert_eq!(RelationKind::classify(3, 0, 1), Some(RelationKind::Mutex));
        assert_eq!(RelationKind::classify(4, 2, 3), Some(RelationKind::Cardinal));
        assert_eq!(RelationKind::classify(3, 0, 3), Some(RelationKind::Cardinal));

        assert_eq!(RelationKind::classify(0, 0, 0), None);
        assert_eq!(RelationKind::classify(1, 0, 0), None);
        assert_eq!(RelationKind::classify(2, 2, 1), None);
        assert_eq!(RelationKind::classify(2, 1, 3), None);
    }

    #[test]
    fn test_preorder_and_lookup() {
        let fm = pizza();
        let names = fm.names(fm.features());
        assert_eq!(
            names,
            vec![
                "Pizza",
                "Topping",
                "Salami",
                "Ham",
                "Mozzarella",
                "Size",
                "Normal",
                "Big",
                "Dough",
                "Neapolitan",
                "Sicilian",
                "CheesyCrust"
            ]
        );
        assert_eq!(fm.root(), fm.feature("Pizza").unwrap());
        assert_eq!(fm.feature("Pineapple"), Err(Error::NotFound("Pineapple".to_string())));
        assert!(fm[fm.root()].is_abstract);
    }

    #[test]
    fn test_navigation() {
        let fm = pizza();
        let topping = fm.feature("Topping").unwrap();
        assert_eq!(fm.names(fm.children(topping)), vec!["Salami", "Ham", "Mozzarella"]);
        assert_eq!(fm.parent(topping), Some(fm.root()));
        assert_eq!(fm.parent(fm.root()), None);
        assert_eq!(fm.relations(fm.root()).len(), 4);

        let big = fm.feature("Big").unwrap();
        assert_eq!(fm.names(fm.ancestors(big)), vec!["Size", "Pizza"]);
        assert_eq!(fm.names(fm.mandatory_descendants(fm.root())), vec!["Topping", "Size", "Dough"]);
    }

    #[test]
    fn test_predicates() {
        let fm = pizza();
        let select = |pred: &dyn Fn(FeatureId) -> bool| fm.names(fm.features().filter(|&f| pred(f)));

        assert_eq!(select(&|f| fm.is_mandatory(f)), vec!["Pizza", "Topping", "Size", "Dough"]);
        assert_eq!(select(&|f| fm.is_optional(f)), vec!["CheesyCrust"]);
        assert_eq!(select(&|f| fm.is_or_group(f)), vec!["Topping"]);
        assert_eq!(select(&|f| fm.is_alternative_group(f)), vec!["Size", "Dough"]);
        assert_eq!(
            select(&|f| fm.is_leaf(f)),
            vec!["Salami", "Ham", "Mozzarella", "Normal", "Big", "Neapolitan", "Sicilian", "CheesyCrust"]
        );
        assert_eq!(select(&|f| !fm.is_leaf(f)), vec!["Pizza", "Topping", "Size", "Dough"]);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let res = FeatureModelBuilder::new("A")
            .optional("A", "B")
            .optional("A", "B")
            .build();
        assert!(matches!(res, Err(Error::Structural(_))));
    }

    #[test]
    fn test_invalid_cardinality_rejected() {
        let res = FeatureModelBuilder::new("A").add_relation("A", ["B", "C"], 1, 3).build();
        assert!(matches!(res, Err(Error::Structural(_))));

        let res = FeatureModelBuilder::new("A").add_relation("A", ["B"], 0, 0).build();
        assert!(matches!(res, Err(Error::Structural(_))));
    }

    #[test]
    fn test_unknown_parent_and_unreachable_rejected() {
        let res = FeatureModelBuilder::new("A").optional("X", "B").build();
        assert!(matches!(res, Err(Error::Structural(_))));

        let res = FeatureModelBuilder::new("A")
            .optional("A", "B")
            .optional("C", "D")
            .optional("D", "C")
            .build();
        assert!(matches!(res, Err(Error::Structural(_))));
    }

    #[test]
    fn test_constraint_with_unknown_feature_rejected() {
        let res = FeatureModelBuilder::new("A")
            .optional("A", "B")
            .add_constraint(Expr::implies(Expr::var("B"), Expr::var("Z")))
            .build();
        assert!(matches!(res, Err(Error::Structural(_))));
    }

    #[test]
    fn test_display_tree_shape() {
        let fm = pizza();
        let tree = fm.to_display_tree();
        assert_eq!(tree.name, "Pizza");
        assert_eq!(tree.relations.len(), 4);
        assert_eq!(tree.relations[0].kind, RelationKind::Mandatory);
        let topping = &tree.relations[0].children[0];
        assert_eq!(topping.name, "Topping");
        assert_eq!(topping.relations[0].kind, RelationKind::Or);
        assert_eq!((topping.relations[0].card_min, topping.relations[0].card_max), (1, 3));
        assert_eq!(topping.relations[0].children.len(), 3);
        assert_eq!(tree.relations[3].kind, RelationKind::Optional);
        assert!(tree.to_string().contains("[XOR 1..1]"));
    }
}
