//! Configurations and their completion along the feature tree.

use std::collections::HashMap;
use std::fmt;

use log::debug;

use crate::analysis::SatAnalyzer;
use crate::cnf::SatModel;
use crate::error::Result;
use crate::model::FeatureModel;

/// A (possibly partial) selection of features.
///
/// Entries keep their insertion order. A `full` configuration claims to be a
/// complete product: every feature it does not mention is deselected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Configuration {
    elements: Vec<(String, bool)>,
    index: HashMap<String, usize>,
    full: bool,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// A configuration selecting the given features.
    pub fn from_selected<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        names.into_iter().map(|name| (name.into(), true)).collect()
    }

    pub fn with_full(mut self, full: bool) -> Self {
        self.full = full;
        self
    }

    pub fn set_full(&mut self, full: bool) {
        self.full = full;
    }

    pub fn is_full(&self) -> bool {
        self.full
    }

    pub fn elements(&self) -> &[(String, bool)] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<bool> {
        self.index.get(name).map(|&i| self.elements[i].1)
    }

    /// Sets the state of a feature, overwriting an existing entry in place.
    pub fn set(&mut self, name: impl Into<String>, selected: bool) {
        let name = name.into();
        match self.index.get(&name) {
            Some(&i) => self.elements[i].1 = selected,
            None => {
                self.index.insert(name.clone(), self.elements.len());
                self.elements.push((name, selected));
            }
        }
    }

    /// Adds an entry unless the feature is already present. Returns whether it was added.
    pub fn insert_if_absent(&mut self, name: &str, selected: bool) -> bool {
        if self.index.contains_key(name) {
            return false;
        }
        self.set(name, selected);
        true
    }

    /// Names of the selected features, in insertion order.
    pub fn selected(&self) -> impl Iterator<Item = &str> {
        self.elements.iter().filter(|(_, s)| *s).map(|(name, _)| name.as_str())
    }
}

impl<S: Into<String>> FromIterator<(S, bool)> for Configuration {
    fn from_iter<I: IntoIterator<Item = (S, bool)>>(iter: I) -> Self {
        let mut config = Configuration::new();
        for (name, selected) in iter {
            config.set(name, selected);
        }
        config
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, selected)) in self.elements.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if !selected {
                write!(f, "!")?;
            }
            write!(f, "{}", name)?;
        }
        write!(f, "}}")?;
        if self.full {
            write!(f, " (full)")?;
        }
        Ok(())
    }
}

/// Adds the selections forced by the tree for every selected feature.
///
/// For each selected feature, its mandatory descendants, its ancestors and the
/// mandatory descendants of those ancestors are selected. Entries already in
/// the configuration are never changed, and the `full` flag is kept.
pub fn complete_configuration(config: &Configuration, fm: &FeatureModel) -> Result<Configuration> {
    let mut completed = config.clone();
    for name in config.selected() {
        let feature = fm.feature(name)?;
        let ancestors = fm.ancestors(feature);

        let mut forced = fm.mandatory_descendants(feature);
        for &ancestor in &ancestors {
            forced.extend(fm.mandatory_descendants(ancestor));
        }
        forced.extend(ancestors);

        for id in forced {
            completed.insert_if_absent(fm.name(id), true);
        }
    }
    debug!(
        "Completed configuration from {} to {} entries",
        config.len(),
        completed.len()
    );
    Ok(completed)
}

/// Checks whether a list of selected features, once completed, forms a valid product.
pub fn valid_config<S: AsRef<str>>(elements: &[S], fm: &FeatureModel, sat: &SatModel) -> Result<bool> {
    let config = Configuration::from_selected(elements.iter().map(|e| e.as_ref()));
    let config = complete_configuration(&config, fm)?.with_full(true);
    SatAnalyzer::new(sat).is_valid_configuration(&config)
}
