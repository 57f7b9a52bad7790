use approx::assert_relative_eq;
use chrono::NaiveDate;
use occupancy_forecast::metrics::{average, compute};
use occupancy_forecast::{
    ArtifactWriter, ForecastModel, ModelConfig, ModelConfigs, ModelKind, ModelMetrics,
    Orchestrator, Prediction, RunMode, RunRequest, Series,
};
use tempfile::tempdir;

/// Predicts a constant number of beds, standing in for the forest
#[derive(Debug)]
struct Constant(f64);

impl ForecastModel for Constant {
    fn kind(&self) -> ModelKind {
        ModelKind::TreeEnsemble
    }

    fn fit_and_predict(
        &self,
        train: &Series,
        horizon: usize,
        _config: &ModelConfig,
    ) -> occupancy_forecast::Result<Prediction> {
        Prediction::from_forecast(self.kind(), train.last_date(), &vec![self.0; horizon])
    }
}

fn flat_series(days: usize, beds: u32) -> Series {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    Series::from_start(start, vec![beds; days]).unwrap()
}

#[test]
fn test_metrics_of_constant_offset() {
    let out = tempdir().unwrap();
    let mut orchestrator =
        Orchestrator::new(ArtifactWriter::new(out.path())).with_adapter(Box::new(Constant(90.0)));
    let models = ModelConfigs::none().with_defaults(ModelKind::TreeEnsemble);

    for mode in [RunMode::Test, RunMode::Accurate] {
        let request = RunRequest::new(flat_series(60, 100), 10, mode, models.clone());
        let metrics = orchestrator.run(&request).unwrap();
        let m = metrics.get(ModelKind::TreeEnsemble).unwrap();
        assert_relative_eq!(m.rmse, 10.0);
        assert_relative_eq!(m.mae, 10.0);
        assert_relative_eq!(m.mape.unwrap(), 0.1);
    }
}

#[test]
fn test_zero_occupancy_leaves_mape_undefined() {
    let out = tempdir().unwrap();
    let mut orchestrator =
        Orchestrator::new(ArtifactWriter::new(out.path())).with_adapter(Box::new(Constant(2.0)));
    let models = ModelConfigs::none().with_defaults(ModelKind::TreeEnsemble);

    let request = RunRequest::new(flat_series(30, 0), 7, RunMode::Test, models);
    let metrics = orchestrator.run(&request).unwrap();
    let m = metrics.get(ModelKind::TreeEnsemble).unwrap();
    assert_eq!(m.mape, None);
    assert_relative_eq!(m.rmse, 2.0);

    let json = serde_json::to_value(&metrics).unwrap();
    assert_eq!(json["tree_ensemble"]["MAPE"], serde_json::Value::Null);
}

#[test]
fn test_compute_and_average() {
    let test = flat_series(4, 50);
    let last_train = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
    let prediction =
        Prediction::from_forecast(ModelKind::Autoregressive, last_train, &[40.0, 50.0, 60.0, 50.0])
            .unwrap();

    let metrics = compute(&test, &prediction).unwrap();
    assert_relative_eq!(metrics.mae, 5.0);
    assert_relative_eq!(metrics.rmse, 50.0f64.sqrt());
    assert_relative_eq!(metrics.mape.unwrap(), 0.1);

    let other = ModelMetrics {
        rmse: 1.0,
        mape: Some(0.3),
        mae: 3.0,
    };
    let avg = average(&[metrics, other]).unwrap();
    assert_relative_eq!(avg.mae, 4.0);
    assert_relative_eq!(avg.mape.unwrap(), 0.2);
}
