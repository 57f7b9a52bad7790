use occupancy_forecast::ForecastError;
use occupancy_math::MathError;
use std::io;

#[test]
fn test_error_conversion() {
    let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
    assert!(matches!(ForecastError::from(io_error), ForecastError::IoError(_)));

    let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    assert!(matches!(
        ForecastError::from(json_error),
        ForecastError::JsonError(_)
    ));

    let math_error = MathError::InsufficientData("need 3 points".to_string());
    assert!(matches!(ForecastError::from(math_error), ForecastError::Math(_)));
}

#[test]
fn test_error_display() {
    let error = ForecastError::model_fit("autoregressive", "seasonal period must be at least 2");
    let text = error.to_string();
    assert!(text.contains("autoregressive"));
    assert!(text.contains("seasonal period must be at least 2"));

    let error = ForecastError::InsufficientData("test mode needs 60 days, got 40".to_string());
    assert!(error.to_string().starts_with("Insufficient data"));

    let error = ForecastError::from(io::Error::new(
        io::ErrorKind::PermissionDenied,
        "permission denied",
    ));
    let text = error.to_string();
    assert!(text.contains("IO error"));
    assert!(text.contains("permission denied"));

    assert!(ForecastError::NoModelSelected
        .to_string()
        .contains("at least one model"));
}
