//! End-to-end tests for the exposure update pipeline
//!
//! Every reference dataset is parsed from its JSON document, the updater is
//! assembled the way the binary does it, and the merged output is checked.

use exposure_update::core::config::UpdateConfig;
use exposure_update::core::error::ExposureError;
use exposure_update::exposure::document::{parse_exposure, parse_exposure_with_schema};
use exposure_update::exposure::Transition;
use exposure_update::fragility::document::parse_fragility;
use exposure_update::fragility::FragilityCurve;
use exposure_update::intensity::document::parse_intensity_points;
use exposure_update::intensity::{AliasIntensityProvider, IntensityProvider};
use exposure_update::loss::document::parse_loss;
use exposure_update::loss::LossEngine;
use exposure_update::schema::ConversionLibrary;
use exposure_update::update::output::merged_document;
use exposure_update::update::ExposureUpdater;

const EXPOSURE: &str = r#"{
    "type": "FeatureCollection",
    "schema": "S",
    "features": [
        {
            "type": "Feature",
            "geometry": {"type": "Polygon", "coordinates": [[
                [-71.02, -33.02], [-70.98, -33.02], [-70.98, -32.98],
                [-71.02, -32.98], [-71.02, -33.02]
            ]]},
            "properties": {
                "gid": "a",
                "name": "Valparaiso",
                "expo": {
                    "Taxonomy": ["MUR"],
                    "Damage": ["D0"],
                    "Buildings": [100.0]
                }
            }
        },
        {
            "type": "Feature",
            "geometry": {"type": "Point", "coordinates": [10.0, 10.0]},
            "properties": {"gid": "b", "MUR": 40.0, "MUR_D1": 10.0}
        }
    ]
}"#;

const FRAGILITY: &str = r#"{
    "meta": {"id": "S", "shape": "logncdf"},
    "data": [{
        "taxonomy": "MUR", "imt": "PGA", "imu": "g",
        "D1_mean": -1.6, "D1_stddev": 0.6,
        "D2_mean": -0.9, "D2_stddev": 0.6
    }]
}"#;

const LOSS: &str = r#"{
    "S": {
        "steps": {"D1": 0.25, "D2": 1.0},
        "replacementCosts": {"MUR": 1000.0}
    }
}"#;

fn intensity_document(field: &str, unit: &str) -> String {
    let mut sites = Vec::new();
    for lon in [-71.1, -71.0, -70.9] {
        for lat in [-33.1, -33.0, -32.9] {
            sites.push(format!(
                r#"{{"lon": {}, "lat": {}, "values": {{"{}": 0.5}}}}"#,
                lon, lat, field
            ));
        }
    }
    format!(
        r#"{{"units": {{"{}": "{}"}}, "sites": [{}]}}"#,
        field,
        unit,
        sites.join(",")
    )
}

fn updater_with(intensity: Box<dyn IntensityProvider>) -> ExposureUpdater {
    let loss = LossEngine::new(parse_loss(LOSS).unwrap(), "USD");
    ExposureUpdater::new(
        intensity,
        parse_fragility(FRAGILITY).unwrap(),
        loss,
        UpdateConfig::default(),
    )
    .unwrap()
}

fn updater() -> ExposureUpdater {
    let index = parse_intensity_points(&intensity_document("PGA", "g"), (2, 4)).unwrap();
    updater_with(Box::new(index))
}

fn p(mean: f64, stddev: f64) -> f64 {
    FragilityCurve::log_normal(mean, stddev).unwrap().probability(0.5)
}

// ============================================================================
// Full update cycle
// ============================================================================

#[test]
fn test_update_inside_footprint() {
    let cells = parse_exposure(EXPOSURE).unwrap();
    let outcomes = updater().update_all(&cells).unwrap();

    let moved_d2 = 100.0 * p(-0.9, 0.6);
    let moved_d1 = (100.0 - moved_d2) * p(-1.6, 0.6);
    let a = &outcomes[0];

    assert_eq!(a.exposure.gid(), "a");
    assert!((a.exposure.bag("MUR", 2).unwrap().buildings - moved_d2).abs() < 1e-9);
    assert!((a.exposure.bag("MUR", 1).unwrap().buildings - moved_d1).abs() < 1e-9);
    assert!((a.exposure.total_buildings() - 100.0).abs() < 1e-9);

    let expected_loss = moved_d2 * 1000.0 + moved_d1 * 250.0;
    assert!((a.loss.loss_value - expected_loss).abs() < 1e-6);
    assert_eq!(a.loss.loss_unit, "USD");
}

#[test]
fn test_cell_outside_footprint_is_untouched() {
    let cells = parse_exposure(EXPOSURE).unwrap();
    let outcomes = updater().update_all(&cells).unwrap();
    let b = &outcomes[1];

    assert_eq!(b.exposure.gid(), "b");
    assert!(b.transitions.is_empty());
    assert_eq!(b.loss.loss_value, 0.0);
    assert_eq!(b.exposure.bags(), cells[1].bags());
}

#[test]
fn test_merged_document() {
    let cells = parse_exposure(EXPOSURE).unwrap();
    let outcomes = updater().update_all(&cells).unwrap();
    let document = merged_document(&outcomes);

    assert_eq!(document["type"], "FeatureCollection");
    assert_eq!(document["summary"]["cells"], 2);
    assert!((document["summary"]["buildings_before"].as_f64().unwrap() - 150.0).abs() < 1e-9);
    assert!((document["summary"]["buildings_after"].as_f64().unwrap() - 150.0).abs() < 1e-9);

    let features = document["features"].as_array().unwrap();
    assert_eq!(features[0]["properties"]["gid"], "a");
    assert_eq!(features[0]["properties"]["name"], "Valparaiso");
    assert_eq!(features[0]["properties"]["transitions"].as_array().unwrap().len(), 2);
    assert_eq!(
        features[0]["properties"]["transitions"][0]["to_damage_state"],
        2
    );
    assert_eq!(features[1]["properties"]["loss_unit"], "USD");
}

// ============================================================================
// Reference data edge cases
// ============================================================================

#[test]
fn test_replacement_cost_step_loss() {
    let model = parse_loss(
        r#"{"S2": {"steps": {"1": 0.625, "2": 0.75, "3": 0.875, "4": 1.0},
                   "replacementCosts": {"URM": 800.0}}}"#,
    )
    .unwrap();
    let engine = LossEngine::new(model, "USD");

    let loss = engine
        .loss_for(&Transition::new("S2", "URM", 0, 3, 1.0))
        .unwrap();

    assert!((loss - 700.0).abs() < 1e-9);
}

#[test]
fn test_out_of_coverage_reads_zero_with_units() {
    let index = parse_intensity_points(&intensity_document("PGA", "g"), (2, 4)).unwrap();

    let sample = index.nearest(120.0, 45.0);

    assert_eq!(sample.value("PGA"), Some(0.0));
    assert_eq!(sample.unit("PGA"), Some("g"));
}

#[test]
fn test_unit_mismatch_aborts() {
    let index = parse_intensity_points(&intensity_document("PGA", "m/s2"), (2, 4)).unwrap();
    let cells = parse_exposure(EXPOSURE).unwrap();

    let result = updater_with(Box::new(index)).update_all(&cells);

    assert!(matches!(
        result,
        Err(ExposureError::UnitMismatch { ref expected, ref found, .. })
            if expected == "g" && found == "m/s2"
    ));
}

#[test]
fn test_missing_field_served_through_alias() {
    let index = parse_intensity_points(&intensity_document("pga_mean", "g"), (2, 4)).unwrap();
    let cells = parse_exposure(EXPOSURE).unwrap();

    let direct = updater_with(Box::new(index.clone())).update_all(&cells);
    assert!(matches!(direct, Err(ExposureError::MissingIntensity { .. })));

    let aliased = AliasIntensityProvider::new(index).alias("PGA", ["pga_mean"]);
    let outcomes = updater_with(Box::new(aliased)).update_all(&cells).unwrap();
    assert!(!outcomes[0].transitions.is_empty());
}

#[test]
fn test_exposure_in_foreign_schema_is_mapped() {
    let foreign = EXPOSURE.replace(r#""schema": "S","#, "");
    let cells = parse_exposure_with_schema(&foreign, Some("LOCAL")).unwrap();
    assert_eq!(cells[0].schema(), "LOCAL");

    let mut library = ConversionLibrary::new(1e-3);
    library
        .add_document(
            r#"{"source_schema": "LOCAL", "target_schema": "S",
                "conv_matrix": {"MUR": {"MUR": 1.0}}}"#,
        )
        .unwrap();
    library
        .add_document(
            r#"{"source_schema": "LOCAL", "target_schema": "S",
                "conv_matrix": {"D0": {"D0": 1.0}, "D1": {"D1": 1.0}}}"#,
        )
        .unwrap();

    let outcomes = updater()
        .with_mapper(library.into_mapper())
        .update_all(&cells)
        .unwrap();

    assert_eq!(outcomes[0].exposure.schema(), "S");
    assert!(outcomes[0].loss.loss_value > 0.0);
    assert!((outcomes[1].exposure.total_buildings() - 50.0).abs() < 1e-9);
}

#[test]
fn test_missing_schema_without_fallback_fails() {
    let foreign = EXPOSURE.replace(r#""schema": "S","#, "");
    assert!(matches!(
        parse_exposure(&foreign),
        Err(ExposureError::InvalidReference(_))
    ));
}
