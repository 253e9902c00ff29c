//! 校准换算集成测试


use proptest::prelude::*;
use signal_test_fixtures::assert_close;
use spcal::core::calibration::{
    atoms_per_particle, nebulisation_efficiency_from_concentration, particle_mass,
    particle_number_concentration, particle_size, particle_total_concentration,
    reference_particle_mass,
};
use spcal::core::limits::Threshold;
use spcal::input::{InstrumentParameters, ReferenceParameters, calibrate_reference};
use spcal::{CalibrationModel, CalibrationParameters, ElementTable, SpcalError, calibrate};

const SUMS: [f64; 4] = [120.0, 80.0, 200.0, 40.0];

fn neb_params() -> CalibrationParameters {
    CalibrationParameters {
        density: Some(19_320.0),
        dwelltime: Some(1e-4),
        efficiency: Some(0.05),
        flowrate: Some(1e-5),
        response: Some(2e10),
        time: Some(60.0),
        ..CalibrationParameters::default()
    }
}

#[test]
fn test_reference_values() {
    assert_close(
        nebulisation_efficiency_from_concentration(10, 10.0, 80.0, 20.0, 4.0),
        1.0,
        1e-12,
    );
    assert_close(
        particle_total_concentration(&[0.1, 0.2, 0.3, 0.4], 0.1, 2.0, 5.0),
        1.0,
        1e-12,
    );
    assert_close(particle_number_concentration(10, 0.5, 2.0, 5.0), 2.0, 1e-12);
}

#[test]
fn test_nebulisation_model_assembly() {
    let params = neb_params();
    let ld = Threshold::Scalar(10.0);
    let results = calibrate(&SUMS, Some(0.5), &ld, CalibrationModel::NebulisationEfficiency, &params)
        .unwrap();

    for (mass, sum) in results.masses.iter().zip(SUMS) {
        assert_close(*mass, particle_mass(sum, 1e-4, 0.05, 1e-5, 2e10, 1.0), 1e-12);
    }
    for (size, mass) in results.sizes.iter().zip(&results.masses) {
        assert_close(*size, particle_size(*mass, 19_320.0), 1e-12);
    }
    assert_eq!(results.lod, vec![10.0]);
    assert_close(results.lod_mass[0], particle_mass(10.0, 1e-4, 0.05, 1e-5, 2e10, 1.0), 1e-12);

    let expected_number = (4.0 / (0.05 * 1e-5 * 60.0_f64)).round();
    assert_eq!(results.number_concentration, Some(expected_number));
    assert_close(
        results.concentration.unwrap(),
        results.masses.iter().sum::<f64>() / (0.05 * 1e-5 * 60.0),
        1e-12,
    );
    assert_close(results.ionic_background.unwrap(), 0.5 / 2e10, 1e-12);
    assert!(results.background_size.is_some());
    assert!(results.atoms.is_none());
}

#[test]
fn test_models_agree_when_mass_response_matches() {
    let neb = neb_params();
    let mass = CalibrationParameters {
        density: neb.density,
        mass_response: Some(1e-4 * 1e-5 * 0.05 / 2e10),
        ..CalibrationParameters::default()
    };
    let ld = Threshold::Profile(vec![9.0, 11.0, 10.0, 12.0]);

    let a = calibrate(&SUMS, None, &ld, CalibrationModel::NebulisationEfficiency, &neb).unwrap();
    let b = calibrate(&SUMS, None, &ld, CalibrationModel::MassResponse, &mass).unwrap();

    assert_eq!(a.lod, vec![9.0, 12.0, 10.5, 10.5]);
    for (x, y) in a.masses.iter().zip(&b.masses) {
        assert_close(*x, *y, 1e-9);
    }
    for (x, y) in a.lod_size.iter().zip(&b.lod_size) {
        assert_close(*x, *y, 1e-9);
    }
    assert!(b.number_concentration.is_none());
    assert!(b.ionic_background.is_none());
}

#[test]
fn test_missing_and_invalid_parameters() {
    let params = CalibrationParameters {
        efficiency: None,
        ..neb_params()
    };
    assert!(matches!(
        calibrate(&SUMS, None, &1.0.into(), CalibrationModel::NebulisationEfficiency, &params),
        Err(SpcalError::MissingCalibration(name)) if name == "efficiency"
    ));
    assert_eq!(params.missing(CalibrationModel::NebulisationEfficiency), vec!["efficiency"]);
    assert_eq!(
        params.missing(CalibrationModel::MassResponse),
        vec!["mass_response"]
    );

    let negative = CalibrationParameters {
        flowrate: Some(-1.0),
        ..neb_params()
    };
    assert!(matches!(
        calibrate(&SUMS, None, &1.0.into(), CalibrationModel::NebulisationEfficiency, &negative),
        Err(SpcalError::InvalidParameters(_))
    ));
}

#[test]
fn test_element_table_feeds_atoms_and_cells() {
    let table = ElementTable::builtin();
    let gold = table.lookup("Au").unwrap();
    let params = CalibrationParameters {
        cell_diameter: Some(10e-6),
        ..neb_params()
    }
    .with_element(gold);

    let results = calibrate(&SUMS, None, &5.0.into(), CalibrationModel::NebulisationEfficiency, &params)
        .unwrap();
    let atoms = results.atoms.unwrap();
    assert_close(atoms[0], atoms_per_particle(results.masses[0], gold.molar_mass), 1e-12);
    assert_eq!(results.cell_concentrations.unwrap().len(), SUMS.len());
    assert_eq!(results.lod_cell_concentration.unwrap().len(), 1);
}

#[test]
fn test_reference_calibration_round_trip() {
    let reference = ReferenceParameters {
        density: 19_320.0,
        diameter: 60e-9,
        mass_fraction: 1.0,
        concentration: None,
    };
    let detections = [150.0, 170.0, 160.0];
    let result = calibrate_reference(&detections, &reference, &InstrumentParameters::default()).unwrap();
    assert_close(result.particle_mass, reference_particle_mass(19_320.0, 60e-9), 1e-12);

    // 用得到的质量响应换算参考颗粒自身，平均粒径应回到参考直径附近
    let params = CalibrationParameters {
        density: Some(19_320.0),
        mass_response: Some(result.mass_response),
        ..CalibrationParameters::default()
    };
    let results = calibrate(&[160.0], None, &1.0.into(), CalibrationModel::MassResponse, &params).unwrap();
    assert_close(results.sizes[0], 60e-9, 1e-9);
}

#[test]
fn test_models_agree_for_compound_reference() {
    // 氧化物参考颗粒：目标元素只占质量的一部分
    let fraction = 0.6;
    let reference = ReferenceParameters {
        density: 19_320.0,
        diameter: 50e-9,
        mass_fraction: fraction,
        concentration: None,
    };
    let instrument = InstrumentParameters {
        dwelltime: Some(1e-4),
        flowrate: Some(1e-5),
        response: Some(1e16),
        time: None,
    };
    let result = calibrate_reference(&[200.0], &reference, &instrument).unwrap();

    let neb = CalibrationParameters {
        density: Some(19_320.0),
        dwelltime: Some(1e-4),
        efficiency: result.efficiency,
        flowrate: Some(1e-5),
        response: Some(1e16),
        time: Some(60.0),
        mass_fraction: fraction,
        ..CalibrationParameters::default()
    };
    let mass = CalibrationParameters {
        density: Some(19_320.0),
        mass_response: Some(result.mass_response),
        mass_fraction: fraction,
        ..CalibrationParameters::default()
    };
    let a = calibrate(&[200.0], None, &1.0.into(), CalibrationModel::NebulisationEfficiency, &neb).unwrap();
    let b = calibrate(&[200.0], None, &1.0.into(), CalibrationModel::MassResponse, &mass).unwrap();

    assert_close(a.masses[0], result.particle_mass, 1e-9);
    assert_close(b.masses[0], result.particle_mass, 1e-9);
    assert_close(a.sizes[0], 50e-9, 1e-9);
    assert_close(b.sizes[0], 50e-9, 1e-9);
    assert_close(a.lod_mass[0], b.lod_mass[0], 1e-9);
}

proptest! {
    #[test]
    fn prop_size_inverts_reference_mass(density in 100.0f64..30_000.0, diameter in 1e-9f64..1e-5) {
        let size = particle_size(reference_particle_mass(density, diameter), density);
        prop_assert!((size - diameter).abs() <= 1e-9 * diameter);
    }
}
