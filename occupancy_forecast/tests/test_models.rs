use chrono::NaiveDate;
use occupancy_forecast::config::{
    AutoregressiveConfig, ExponentialSmoothingConfig, TreeEnsembleConfig,
};
use occupancy_forecast::models::ExponentialSmoothingAdapter;
use occupancy_forecast::{adapter_for, ForecastError, ModelConfig, ModelKind, Series};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 2).unwrap()
}

/// Weekday base load with busier weekends and a little deterministic wobble
fn weekly_series(days: usize) -> Series {
    let occupancy = (0..days)
        .map(|i| {
            let weekend = if i % 7 >= 5 { 20 } else { 0 };
            100 + weekend + (i * 7 % 5) as u32
        })
        .collect();
    Series::from_start(start(), occupancy).unwrap()
}

fn small_forest() -> ModelConfig {
    ModelConfig::TreeEnsemble(TreeEnsembleConfig {
        n_estimators: 20,
        random_state: Some(7),
        ..TreeEnsembleConfig::default()
    })
}

#[rstest]
#[case(ModelKind::Autoregressive, 1)]
#[case(ModelKind::Autoregressive, 14)]
#[case(ModelKind::ExponentialSmoothing, 1)]
#[case(ModelKind::ExponentialSmoothing, 14)]
#[case(ModelKind::TreeEnsemble, 1)]
#[case(ModelKind::TreeEnsemble, 14)]
fn test_prediction_covers_exactly_the_horizon(#[case] kind: ModelKind, #[case] horizon: usize) {
    let train = weekly_series(140);
    let config = match kind {
        ModelKind::TreeEnsemble => small_forest(),
        other => ModelConfig::default_for(other),
    };

    let prediction = adapter_for(kind)
        .fit_and_predict(&train, horizon, &config)
        .unwrap();

    assert_eq!(prediction.len(), horizon);
    let dates = prediction.dates();
    assert_eq!(dates[0], train.last_date().succ_opt().unwrap());
    for pair in dates.windows(2) {
        assert_eq!(pair[0].succ_opt(), Some(pair[1]));
    }
}

#[test]
fn test_predictions_never_go_below_zero() {
    // steady decline that a trend model extrapolates through zero
    let occupancy = (0..84).map(|i| 84 - i as u32).collect();
    let train = Series::from_start(start(), occupancy).unwrap();

    let config = ModelConfig::ExponentialSmoothing(ExponentialSmoothingConfig {
        smoothing_level: Some(0.8),
        smoothing_trend: Some(0.5),
        ..ExponentialSmoothingConfig::default()
    });
    let prediction = adapter_for(ModelKind::ExponentialSmoothing)
        .fit_and_predict(&train, 30, &config)
        .unwrap();

    assert_eq!(prediction.len(), 30);
    assert_eq!(prediction.occupancy()[29], 0);
    assert!(prediction.values().iter().all(|v| *v >= 0.0));
}

#[test]
fn test_smoothing_grid_search_is_deterministic() {
    let train = weekly_series(210);
    let config = ExponentialSmoothingConfig::default();
    let adapter = ExponentialSmoothingAdapter;

    let first = adapter.select_smoothing(&train, 30, &config).unwrap();
    let second = adapter.select_smoothing(&train, 30, &config).unwrap();
    assert_eq!(first, second);
    assert!(first.level >= 0.0 && first.level <= 0.97);

    let model_config = ModelConfig::ExponentialSmoothing(config);
    let adapter = adapter_for(ModelKind::ExponentialSmoothing);
    let a = adapter.fit_and_predict(&train, 30, &model_config).unwrap();
    let b = adapter.fit_and_predict(&train, 30, &model_config).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_seeded_forest_is_reproducible() {
    let train = weekly_series(140);
    let adapter = adapter_for(ModelKind::TreeEnsemble);
    let a = adapter.fit_and_predict(&train, 14, &small_forest()).unwrap();
    let b = adapter.fit_and_predict(&train, 14, &small_forest()).unwrap();
    assert_eq!(a, b);

    // weekends stay busier than weekdays
    let occupancy = a.occupancy();
    let weekend_min = a
        .observations()
        .iter()
        .filter(|o| chrono::Datelike::weekday(&o.date).number_from_monday() >= 6)
        .map(|o| o.occupancy)
        .min()
        .unwrap();
    assert!(occupancy.iter().filter(|v| **v < weekend_min).count() >= 5);
}

#[test]
fn test_invalid_configuration_is_a_fit_error() {
    let train = weekly_series(140);

    let sarima = ModelConfig::Autoregressive(AutoregressiveConfig {
        seasonal_order: (1, 0, 0, 1),
        ..AutoregressiveConfig::default()
    });
    assert!(matches!(
        adapter_for(ModelKind::Autoregressive).fit_and_predict(&train, 7, &sarima),
        Err(ForecastError::ModelFit { .. })
    ));

    let forest = ModelConfig::TreeEnsemble(TreeEnsembleConfig {
        n_estimators: 0,
        ..TreeEnsembleConfig::default()
    });
    assert!(matches!(
        adapter_for(ModelKind::TreeEnsemble).fit_and_predict(&train, 7, &forest),
        Err(ForecastError::ModelFit { .. })
    ));
}

#[test]
fn test_adapter_rejects_other_family_config() {
    let train = weekly_series(60);
    let result = adapter_for(ModelKind::ExponentialSmoothing).fit_and_predict(
        &train,
        7,
        &ModelConfig::default_for(ModelKind::TreeEnsemble),
    );
    assert!(matches!(result, Err(ForecastError::InvalidParameter(_))));
}
