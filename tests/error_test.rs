//! Tests for error types

use synthpath::composition::Formula;
use synthpath::experiment::normalize_weight_fractions;
use synthpath::reactions::{balance, Atmosphere};
use synthpath::{BalanceError, Error};

#[test]
fn test_invalid_formula_error() {
    let error = Formula::parse("Xx2O").unwrap_err();
    let error_str = format!("{error}");
    assert!(error_str.contains("Invalid formula"));
    assert!(error_str.contains("Xx2O"));
}

#[test]
fn test_atmosphere_error() {
    let error = "vacuum".parse::<Atmosphere>().unwrap_err();
    assert!(matches!(error, Error::Atmosphere(_)));
    assert_eq!(error.to_string(), "Atmosphere must either be air or inert, got 'vacuum'");
}

#[test]
fn test_balance_error_converts() {
    let reactants = Formula::parse_all(&["BaO"]).unwrap();
    let products = Formula::parse_all(&["CuO"]).unwrap();
    let error: Error = balance(&reactants, &products).unwrap_err().into();
    assert!(matches!(error, Error::Balance(BalanceError::ElementMismatch { .. })));
    assert!(error.to_string().starts_with("Balance error: Element mismatch"));
}

#[test]
fn test_unused_precursor_error() {
    let reactants = Formula::parse_all(&["BaO", "CuO", "O2"]).unwrap();
    let products = Formula::parse_all(&["BaCuO2"]).unwrap();
    let error = balance(&reactants, &products).unwrap_err();
    assert_eq!(error, BalanceError::UnusedPrecursor);
    assert_eq!(error.to_string(), "Not all precursors participate in the reaction");
}

#[test]
fn test_weight_fraction_error() {
    let error = normalize_weight_fractions(&[40.0, 20.0]).unwrap_err();
    let error_str = format!("{error}");
    assert!(error_str.contains("Weight fractions sum to 60"));
}

#[test]
fn test_storage_error() {
    let error = Error::StorageError("file not found".to_string());
    let error_str = format!("{error}");
    assert!(error_str.contains("Storage error"));
    assert!(error_str.contains("file not found"));
}

#[test]
fn test_invalid_input_error() {
    let error = Error::InvalidInput("no temperatures given".to_string());
    assert_eq!(error.to_string(), "Invalid input: no temperatures given");
}

#[test]
fn test_io_error_conversion() {
    let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
    let error: Error = io_error.into();
    assert!(matches!(error, Error::Io(_)));
    assert!(error.to_string().contains("IO error"));
}

#[test]
fn test_json_error_conversion() {
    let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let error: Error = json_error.into();
    assert!(error.to_string().starts_with("JSON error"));
}
