use std::collections::HashSet;
use std::path::PathBuf;

use num_bigint::BigUint;
use rand::rngs::StdRng;
use rand::SeedableRng;
use test_log::test;

use fm_rs::analysis::SatAnalyzer;
use fm_rs::configuration::{complete_configuration, valid_config, Configuration};
use fm_rs::counting::BddModel;
use fm_rs::diagnosis::{DiagnosisModel, Diagnoser};
use fm_rs::{build_sat_model, load_model, parse_uvl, FeatureModel};

fn pizzas() -> FeatureModel {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("models/Pizzas.uvl");
    load_model(path).unwrap()
}

fn config_from_labels(labels: &[String]) -> Configuration {
    labels
        .iter()
        .map(|label| match label.strip_prefix('!') {
            Some(name) => (name.to_string(), false),
            None => (label.clone(), true),
        })
        .collect()
}

#[test]
fn test_encoding_is_deterministic() {
    let fm = pizzas();
    let first = build_sat_model(&fm);
    let second = build_sat_model(&fm);
    assert_eq!(first.clauses(), second.clauses());
    assert_eq!(first.to_dimacs(), second.to_dimacs());
}

#[test]
fn test_root_alone_is_a_valid_partial_configuration() {
    let fm = pizzas();
    let sat = build_sat_model(&fm);
    let analyzer = SatAnalyzer::new(&sat);
    let config = Configuration::from_selected([fm.name(fm.root())]);
    assert!(analyzer.is_valid_configuration(&config).unwrap());
}

#[test]
fn test_enumeration_matches_count() {
    let fm = pizzas();
    let sat = build_sat_model(&fm);
    let analyzer = SatAnalyzer::new(&sat);
    let products: Vec<Vec<String>> = analyzer.products().collect::<Result<_, _>>().unwrap();
    assert_eq!(products.len(), 42);
    assert_eq!(analyzer.count_products().unwrap(), 42);
    assert_eq!(products.iter().collect::<HashSet<_>>().len(), 42);
}

#[test]
fn test_core_and_dead_are_consistent_with_products() {
    let fm = pizzas();
    let sat = build_sat_model(&fm);
    let analyzer = SatAnalyzer::new(&sat);
    let core = analyzer.core_features().unwrap();
    let dead = analyzer.dead_features().unwrap();
    assert!(core.iter().all(|f| !dead.contains(f)));

    for product in analyzer.products() {
        let product = product.unwrap();
        assert!(core.iter().all(|f| product.contains(f)));
        assert!(dead.iter().all(|f| !product.contains(f)));
    }
    assert!(analyzer.false_optional_features(&fm).unwrap().is_empty());
}

#[test]
fn test_completion_is_idempotent_and_monotone() {
    let fm = pizzas();
    let inputs = [
        vec!["Mozzarella", "Sicilian", "Big"],
        vec!["CheesyCrust"],
        vec!["Ham", "Salami"],
        vec!["Pizza"],
    ];
    for input in inputs {
        let config = Configuration::from_selected(input.iter().copied());
        let once = complete_configuration(&config, &fm).unwrap();
        let twice = complete_configuration(&once, &fm).unwrap();
        assert_eq!(once, twice);
        let selected: HashSet<&str> = once.selected().collect();
        assert!(input.iter().all(|f| selected.contains(f)));
    }
}

#[test]
fn test_partial_configuration_without_size_choice() {
    let fm = pizzas();
    let sat = build_sat_model(&fm);
    let analyzer = SatAnalyzer::new(&sat);
    let config = Configuration::from_selected(["Pizza", "Topping", "Mozzarella", "Dough", "Sicilian", "Size"]);
    assert!(analyzer.is_valid_configuration(&config).unwrap());
    assert!(!analyzer.is_valid_configuration(&config.with_full(true)).unwrap());
}

#[test]
fn test_completed_selection_is_a_valid_product() {
    let fm = pizzas();
    let sat = build_sat_model(&fm);
    assert!(valid_config(&["Mozzarella", "Sicilian", "Big"], &fm, &sat).unwrap());
    assert!(!valid_config(&["Mozzarella", "Sicilian", "Big", "Normal"], &fm, &sat).unwrap());
}

#[test]
fn test_diagnosis_of_selection_without_root_and_size_choice() {
    let fm = pizzas();
    let sat = build_sat_model(&fm);
    let analyzer = SatAnalyzer::new(&sat);
    let config = Configuration::from_selected(["Topping", "Mozzarella", "Dough", "Sicilian", "Size"]).with_full(true);
    assert!(!analyzer.is_valid_configuration(&config).unwrap());

    let model = DiagnosisModel::new(&fm, &sat);
    let diagnoser = Diagnoser::new(&model);
    let labels = |assertions: Vec<fm_rs::diagnosis::Assertion>| -> Vec<String> {
        assertions.into_iter().map(|a| a.label).collect()
    };

    let diagnosis = labels(diagnoser.diagnosis(&config).unwrap());
    assert_eq!(diagnosis.len(), 2, "{:?}", diagnosis);
    assert_eq!(diagnosis[0], "!Pizza");
    assert!(diagnosis[1] == "!Normal" || diagnosis[1] == "!Big", "{:?}", diagnosis);

    // Dropping the diagnosis from the assertions leaves a consistent configuration.
    let all = labels(diagnoser.assertions(&config).unwrap());
    let rest: Vec<String> = all.into_iter().filter(|l| !diagnosis.contains(l)).collect();
    assert!(analyzer.is_valid_configuration(&config_from_labels(&rest)).unwrap());

    // The conflict alone is inconsistent.
    let conflict = labels(diagnoser.conflict(&config).unwrap());
    assert!(!conflict.is_empty());
    assert!(!analyzer.is_valid_configuration(&config_from_labels(&conflict)).unwrap());
}

#[test]
fn test_bdd_agrees_with_sat() {
    let fm = pizzas();
    let sat = build_sat_model(&fm);
    let analyzer = SatAnalyzer::new(&sat);
    let bdd = BddModel::from_feature_model(&fm);

    assert_eq!(bdd.count_products(), BigUint::from(analyzer.count_products().unwrap()));
    assert_eq!(bdd.core_features(), analyzer.core_features().unwrap());
    assert_eq!(bdd.dead_features(), analyzer.dead_features().unwrap());

    let partial = Configuration::from_selected(["Pizza", "Topping", "Mozzarella", "Dough", "Sicilian", "Size"]);
    assert!(bdd.is_valid_configuration(&partial).unwrap());
    assert!(!bdd.is_valid_configuration(&partial.with_full(true)).unwrap());
    let found = Configuration::from_selected(bdd.find_product().unwrap()).with_full(true);
    assert!(analyzer.is_valid_configuration(&found).unwrap());

    let total: BigUint = bdd.product_distribution().iter().sum();
    assert_eq!(total, bdd.count_products());

    let mut rng = StdRng::seed_from_u64(42);
    for product in bdd.sample(20, true, &mut rng) {
        let config = Configuration::from_selected(product.iter().cloned());
        assert!(analyzer.is_valid_product(&config).unwrap(), "{:?}", product);
    }
}

#[test]
fn test_display_round_trip() {
    let fm = pizzas();
    let reparsed = parse_uvl(&fm.to_string()).unwrap();
    let count = |fm: &FeatureModel| SatAnalyzer::new(&build_sat_model(fm)).count_products().unwrap();
    assert_eq!(reparsed.num_features(), fm.num_features());
    assert_eq!(count(&reparsed), count(&fm));
}
