//! 信号文件读取集成测试


use signal_test_fixtures::{DWELLTIME, SignalFixtures, assert_close, background};
use spcal::input::{
    ImportOptions, InputCollector, InputRole, Quantity, parse_quantity, read_signal_file, read_table_file,
};
use spcal::SpcalError;

#[test]
fn test_counts_file_with_time_column() {
    let fixtures = SignalFixtures::new();
    let values = background(64);
    let path = fixtures.write_counts("counts.csv", &values);

    let data = read_signal_file(&path, &ImportOptions::default()).unwrap();
    assert_eq!(data.response, values);
    assert_eq!(data.dwelltime, Some(DWELLTIME));
    assert!(!data.cps);
}

#[test]
fn test_cps_file_is_converted_and_trimmed() {
    let fixtures = SignalFixtures::new();
    let path = fixtures.write_text(
        "cps.csv",
        "Time (s),Au197 (cps)\n0.01,100\n0.02,200\n0.03,300\n0.04,400\n0.05,500\n",
    );

    let mut collector = InputCollector::load(InputRole::Sample, &path, &ImportOptions::default()).unwrap();
    collector.set_trim((1, 1)).unwrap();
    let counts = collector.response_as_counts().unwrap();
    assert_eq!(counts.len(), 3);
    for (count, expected) in counts.iter().zip([2.0, 3.0, 4.0]) {
        assert_close(*count, expected, 1e-12);
    }
    assert_close(collector.acquisition_time(None).unwrap(), 0.03, 1e-12);
}

#[test]
fn test_explicit_dwelltime_and_column_override() {
    let fixtures = SignalFixtures::new();
    let path = fixtures.write_text("cols.txt", "t\ta\tb\n1\t5\t7\n2\t6\t8\n");
    let options = ImportOptions {
        delimiter: "tab".to_string(),
        column: Some(2),
        dwelltime: Some(2e-3),
        ..ImportOptions::default()
    };

    let data = read_signal_file(&path, &options).unwrap();
    assert_eq!(data.response, vec![7.0, 8.0]);
    assert_eq!(data.dwelltime, Some(2e-3));
}

#[test]
fn test_decimal_comma_file() {
    let fixtures = SignalFixtures::new();
    let path = fixtures.write_text("comma.csv", "Time;Counts\n0,001;2,5\n0,002;3,5\n");
    let options = ImportOptions {
        delimiter: ";".to_string(),
        ..ImportOptions::default()
    };

    let data = read_signal_file(&path, &options).unwrap();
    assert_eq!(data.response, vec![2.5, 3.5]);
    assert_eq!(data.dwelltime, Some(0.001));
}

#[test]
fn test_infinite_values_are_dropped() {
    let fixtures = SignalFixtures::new();
    let path = fixtures.write_text("inf.csv", "Time,Counts\n0.1,3\n0.2,inf\n0.3,4\n0.4,-inf\n");
    let data = read_signal_file(&path, &ImportOptions::default()).unwrap();
    assert_eq!(data.response, vec![3.0, 4.0]);
}

#[test]
fn test_one_table_for_several_columns() {
    let fixtures = SignalFixtures::new();
    let path = fixtures.write_text("wide.csv", "Time,Ag,Au\n0.001,1,10\n0.002,2,20\n0.003,3,30\n");
    let table = read_table_file(&path, &ImportOptions::default()).unwrap();

    let ag = table.signal(Some(1), None).unwrap();
    let au = table.signal(Some(2), None).unwrap();
    assert_eq!(ag.response, vec![1.0, 2.0, 3.0]);
    assert_eq!(au.response, vec![10.0, 20.0, 30.0]);
    assert_eq!(au.dwelltime, Some(0.001));
}

#[test]
fn test_unreadable_inputs() {
    let fixtures = SignalFixtures::new();
    assert!(matches!(
        read_signal_file(&fixtures.dir().join("absent.csv"), &ImportOptions::default()),
        Err(SpcalError::IoError(_))
    ));

    let path = fixtures.write_text("header_only.csv", "Time,Counts\n");
    match read_signal_file(&path, &ImportOptions::default()) {
        Err(SpcalError::InvalidInput(msg)) => assert!(msg.contains("header_only.csv")),
        other => panic!("expected InvalidInput, got {other:?}"),
    }
}

#[test]
fn test_quantities_with_units() {
    assert_close(parse_quantity("50 nm", Quantity::Length).unwrap(), 50e-9, 1e-12);
    assert_close(parse_quantity("19.3 g/cm³", Quantity::Density).unwrap(), 19_300.0, 1e-12);
    assert_close(parse_quantity("0.6 ml/min", Quantity::Flowrate).unwrap(), 1e-5, 1e-12);
    assert!(matches!(
        parse_quantity("3 parsecs", Quantity::Length),
        Err(SpcalError::InvalidParameters(_))
    ));
}
