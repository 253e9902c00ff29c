//! 批处理集成测试
//!
//! 失败隔离、部分校准、并行/取消时每个作业恰好报告一次、参考颗粒校准。


use crossbeam_channel::unbounded;
use signal_test_fixtures::{SignalFixtures, assert_close, signal_with_particles};
use spcal::core::calibration::reference_particle_mass;
use spcal::input::ReferenceParameters;
use spcal::input::collector::InstrumentParameters;
use spcal::processing::{
    AnalysisSettings, BatchJob, BatchOrchestrator, BatchOutcome, ElementSettings, JobStage,
    JobStatus, ReferenceSettings, calibrate_from_reference, detect,
};
use spcal::{BatchSummary, CalibrationModel, ErrorCategory, SpcalError};
use std::fs;
use std::path::PathBuf;

const PARTICLES: [(usize, f64); 4] = [(100, 150.0), (350, 220.0), (600, 90.0), (900, 180.0)];

fn particle_signal() -> Vec<f64> {
    signal_with_particles(1000, &PARTICLES)
}

fn run(orchestrator: &BatchOrchestrator, jobs: Vec<BatchJob>) -> (Vec<BatchOutcome>, BatchSummary) {
    let (sender, receiver) = unbounded();
    let summary = orchestrator.run(jobs, &sender).unwrap();
    drop(sender);
    let mut outcomes: Vec<BatchOutcome> = receiver.iter().collect();
    outcomes.sort_by_key(|o| o.job_id);
    (outcomes, summary)
}

fn plan(files: &[PathBuf], elements: &[ElementSettings]) -> Vec<BatchJob> {
    BatchJob::plan(files, elements, "%_result.csv", None).unwrap()
}

#[test]
fn test_failures_are_isolated_per_file() {
    let fixtures = SignalFixtures::new();
    let good = fixtures.write_counts("good.csv", &particle_signal());
    let empty = fixtures.write_text("empty.csv", "Time,Counts\nn/a,n/a\n");
    let missing = fixtures.dir().join("missing.csv");

    let jobs = plan(
        &[empty.clone(), good.clone(), missing],
        &[ElementSettings::new("Au")],
    );
    let orchestrator = BatchOrchestrator::new(AnalysisSettings::default());
    let (outcomes, summary) = run(&orchestrator, jobs);

    assert_eq!(outcomes.len(), 3);
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.error_stats[&ErrorCategory::Input], vec!["empty.csv".to_string()]);
    assert_eq!(summary.error_stats[&ErrorCategory::Io], vec!["missing.csv".to_string()]);

    assert!(matches!(
        &outcomes[0].status,
        JobStatus::Failed {
            stage: JobStage::ReadAndLimit,
            error: SpcalError::InvalidInput(_)
        }
    ));
    match &outcomes[1].status {
        JobStatus::Done { outputs, detections } => {
            assert_eq!(detections, &vec![PARTICLES.len()]);
            assert_eq!(outputs, &vec![fixtures.dir().join("good_result.csv")]);
        }
        other => panic!("good.csv should succeed, got {other:?}"),
    }
    assert!(!fixtures.dir().join("empty_result.csv").exists());
}

#[test]
fn test_missing_calibration_keeps_detection_results() {
    let fixtures = SignalFixtures::new();
    let file = fixtures.write_counts("sample.csv", &particle_signal());
    let jobs = plan(&[file], &[ElementSettings::new("Au")]);

    let orchestrator = BatchOrchestrator::new(AnalysisSettings {
        model: CalibrationModel::MassResponse,
        ..AnalysisSettings::default()
    });
    let (outcomes, summary) = run(&orchestrator, jobs);
    assert!(outcomes[0].status.is_done());
    assert_eq!(summary.processed, 1);

    let text = fs::read_to_string(fixtures.dir().join("sample_result.csv")).unwrap();
    assert!(text.contains("# Calibration,omitted"));
    assert!(text.contains("# Detected particles,4,"));
    let rows: Vec<&str> = text.lines().filter(|l| !l.starts_with('#')).skip(1).collect();
    assert_eq!(rows.len(), PARTICLES.len());
    assert!(rows.iter().all(|row| row.ends_with(",,")));
}

#[test]
fn test_calibrated_export_with_units_from_dwelltime() {
    let fixtures = SignalFixtures::new();
    let file = fixtures.write_counts("sample.csv", &particle_signal());

    let mut element = ElementSettings::new("Au");
    element.calibration.density = Some(19_320.0);
    element.calibration.efficiency = Some(0.05);
    element.calibration.flowrate = Some(1e-5);
    element.calibration.response = Some(2e10);
    let jobs = plan(&[file], &[element]);

    let orchestrator = BatchOrchestrator::new(AnalysisSettings::default());
    let (outcomes, _) = run(&orchestrator, jobs);
    assert!(outcomes[0].status.is_done());

    let text = fs::read_to_string(fixtures.dir().join("sample_result.csv")).unwrap();
    assert!(text.contains("# Calibration model,Nebulisation Efficiency"));
    assert!(text.contains("# Input,dwelltime,1e-4,s"));
    assert!(text.contains("# Input,time,"));
    let rows: Vec<&str> = text.lines().filter(|l| !l.starts_with('#')).skip(1).collect();
    assert!(rows.iter().all(|row| !row.ends_with(",,")));
}

#[test]
fn test_multiple_elements_get_suffixed_outputs() {
    let fixtures = SignalFixtures::new();
    let a = particle_signal();
    let b = signal_with_particles(1000, &[(500, 300.0)]);
    let mut text = String::from("Time,A,B\n");
    for i in 0..a.len() {
        text.push_str(&format!("{:.6},{},{}\n", (i + 1) as f64 * 1e-4, a[i], b[i]));
    }
    let file = fixtures.write_text("multi.csv", &text);

    let mut first = ElementSettings::new("A");
    first.column = Some(1);
    let mut second = ElementSettings::new("B");
    second.column = Some(2);
    let jobs = plan(&[file], &[first, second]);

    let orchestrator = BatchOrchestrator::new(AnalysisSettings::default());
    let (outcomes, _) = run(&orchestrator, jobs);
    match &outcomes[0].status {
        JobStatus::Done { outputs, detections } => {
            assert_eq!(detections, &vec![4, 1]);
            assert!(outputs[0].ends_with("multi_result_A.csv"));
            assert!(outputs[1].ends_with("multi_result_B.csv"));
            assert!(outputs.iter().all(|p| p.exists()));
        }
        other => panic!("expected success, got {other:?}"),
    }
}

#[test]
fn test_failed_element_leaves_no_exports() {
    let fixtures = SignalFixtures::new();
    let a = particle_signal();
    let mut text = String::from("Time,A,B\n");
    for (i, v) in a.iter().enumerate() {
        text.push_str(&format!("{:.6},{v},n/a\n", (i + 1) as f64 * 1e-4));
    }
    let file = fixtures.write_text("broken.csv", &text);

    let mut first = ElementSettings::new("A");
    first.column = Some(1);
    let mut second = ElementSettings::new("B");
    second.column = Some(2);
    let jobs = plan(&[file], &[first, second]);

    let orchestrator = BatchOrchestrator::new(AnalysisSettings::default());
    let (outcomes, summary) = run(&orchestrator, jobs);
    assert_eq!(summary.failed, 1);
    assert!(matches!(
        &outcomes[0].status,
        JobStatus::Failed {
            stage: JobStage::ReadAndLimit,
            error: SpcalError::InvalidInput(_)
        }
    ));
    assert!(!fixtures.dir().join("broken_result_A.csv").exists());
    assert!(!fixtures.dir().join("broken_result_B.csv").exists());
}

#[test]
fn test_parallel_reports_every_job_once() {
    let fixtures = SignalFixtures::new();
    let files: Vec<PathBuf> = (0..8)
        .map(|i| fixtures.write_counts(&format!("s{i}.csv"), &particle_signal()))
        .collect();
    let jobs = plan(&files, &[ElementSettings::new("Au")]);

    let orchestrator = BatchOrchestrator::new(AnalysisSettings::default()).with_parallel_files(3);
    let (outcomes, summary) = run(&orchestrator, jobs);

    let ids: Vec<usize> = outcomes.iter().map(|o| o.job_id).collect();
    assert_eq!(ids, (0..8).collect::<Vec<_>>());
    assert_eq!(summary.processed, 8);
    assert!(summary.is_success());
}

#[test]
fn test_cancellation_at_job_boundaries() {
    let fixtures = SignalFixtures::new();
    let files: Vec<PathBuf> = (0..40)
        .map(|i| fixtures.write_counts(&format!("c{i}.csv"), &particle_signal()))
        .collect();
    let jobs = plan(&files, &[ElementSettings::new("Au")]);

    let handle = BatchOrchestrator::new(AnalysisSettings::default())
        .spawn(jobs)
        .unwrap();
    let first = handle.outcomes().recv().unwrap();
    assert!(first.status.is_done());
    handle.cancel();

    let rest: Vec<BatchOutcome> = handle.outcomes().iter().collect();
    let summary = handle.join().unwrap();

    assert_eq!(rest.len() + 1, 40);
    assert_eq!(summary.reported(), 40);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.processed + summary.cancelled, 40);
    // 取消后不再有作业开始：状态序列为若干完成后全部取消
    let first_cancelled = rest
        .iter()
        .position(|o| matches!(o.status, JobStatus::Cancelled))
        .unwrap_or(rest.len());
    assert!(rest[first_cancelled..].iter().all(|o| matches!(o.status, JobStatus::Cancelled)));
    for outcome in &rest {
        let output = fixtures.dir().join(format!("{}_result.csv", outcome.file.file_stem().unwrap().to_string_lossy()));
        assert_eq!(outcome.status.is_done(), output.exists());
    }
}

#[test]
fn test_reference_calibration_from_file() {
    let fixtures = SignalFixtures::new();
    let signal = particle_signal();
    let file = fixtures.write_counts("reference.csv", &signal);
    let settings = AnalysisSettings::default();

    let reference = ReferenceSettings {
        file,
        column: None,
        trim: (0, 0),
        particle: ReferenceParameters {
            density: 19_320.0,
            diameter: 50e-9,
            mass_fraction: 1.0,
            concentration: Some(1e-12),
        },
        instrument: InstrumentParameters {
            flowrate: Some(1e-5),
            ..InstrumentParameters::default()
        },
    };
    let result = calibrate_from_reference(&reference, &settings).unwrap();

    let (_, detections) = detect(&signal, &settings.limits).unwrap();
    let mean = detections.sums.iter().sum::<f64>() / detections.count() as f64;
    let mass = reference_particle_mass(19_320.0, 50e-9);
    assert_close(result.mass_response, mass / mean, 1e-12);

    // 采集时间由样本数×驻留时间得到：1000 × 1e-4 s
    let expected_efficiency = mass * 4.0 / (1e-5 * 0.1 * 1e-12);
    assert_close(result.efficiency.unwrap(), expected_efficiency, 1e-9);

    let mut element = ElementSettings::new("Au");
    element.apply_reference(&result);
    assert_eq!(element.calibration.mass_response, Some(result.mass_response));
}
