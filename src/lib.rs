//! # fm-rs: Automated Analysis of Feature Models
//!
//! **`fm-rs`** reads feature models written in UVL, encodes them into propositional logic,
//! and answers the classic analysis questions about them: is the model void, how many
//! products does it have, which features are core or dead, is a configuration valid,
//! and, when it is not, *why*.
//!
//! ## What is a Feature Model?
//!
//! A feature model is a tree of features. Each parent groups its children into
//! *relations* with a cardinality `[min..max]`: a mandatory child is `[1..1]` over one
//! child, an `or` group is `[1..n]`, an `alternative` group is `[1..1]` over many children.
//! Cross-tree constraints add arbitrary propositional formulas over feature names.
//! A *product* is a set of features satisfying all of it.
//!
//! ## Two Back Ends
//!
//! - **SAT**: [`build_sat_model`] produces a CNF, which the built-in CDCL [`Solver`][crate::solver::Solver]
//!   decides. [`SatAnalyzer`][crate::analysis::SatAnalyzer] runs validity, enumeration and core/dead
//!   queries on top of it, and [`Diagnoser`][crate::diagnosis::Diagnoser] explains inconsistencies.
//! - **BDD**: [`BddModel`][crate::counting::BddModel] compiles the model into a reduced ordered BDD
//!   with complement edges, which makes counting, uniform sampling and per-size distributions cheap.
//!
//! Both number features in pre-order starting at `1`, so a DIMACS variable and a BDD variable
//! with the same index denote the same feature.
//!
//! ## Basic Usage
//!
//! ```rust
//! use fm_rs::analysis::SatAnalyzer;
//! use fm_rs::{build_sat_model, parse_uvl};
//!
//! let text = "\
//! features
//!     Car
//!         mandatory
//!             Engine
//!         optional
//!             Radio
//! constraints
//!     Radio => Engine
//! ";
//! let fm = parse_uvl(text).unwrap();
//!
//! let sat = build_sat_model(&fm);
//! let analyzer = SatAnalyzer::new(&sat);
//! assert!(analyzer.is_valid().unwrap());
//! assert_eq!(analyzer.count_products().unwrap(), 2);
//! assert_eq!(analyzer.core_features().unwrap(), vec!["Car", "Engine"]);
//! ```
//!
//! ## Core Components
//!
//! - **[`model`]**: The feature tree arena and its builder.
//! - **[`uvl`]**: The UVL reader.
//! - **[`encoder`]** and **[`cnf`]**: CNF encoding with clause provenance and DIMACS output.
//! - **[`solver`]**: The CDCL SAT solver.
//! - **[`analysis`]**, **[`configuration`]**, **[`diagnosis`]**: SAT-based analyses.
//! - **[`bdd`]** and **[`counting`]**: The BDD manager and the counting analyses built on it.

pub mod analysis;
pub mod bdd;
pub mod cnf;
pub mod configuration;
pub mod counting;
pub mod diagnosis;
pub mod encoder;
pub mod error;
pub mod expr;
pub mod model;
pub mod reference;
pub mod solver;
pub mod types;
pub mod uvl;

pub use encoder::build_sat_model;
pub use error::{Error, Result, SolverError};
pub use model::{FeatureModel, FeatureModelBuilder};
pub use uvl::{load_model, parse_uvl};
