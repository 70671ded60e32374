use crate::utils::error::{AnalyzerError, Result};

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(AnalyzerError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(AnalyzerError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: u64, min_value: u64) -> Result<()> {
    if value < min_value {
        return Err(AnalyzerError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AnalyzerError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    // NaN 不在任何區間內
    if !(value >= min && value <= max) {
        return Err(AnalyzerError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

/// 上下限需嚴格遞增 (例如 min_pressure < max_pressure)
pub fn validate_ordered_limits(field_name: &str, low: f64, high: f64) -> Result<()> {
    if !(low < high) {
        return Err(AnalyzerError::ConfigValidationError {
            field: field_name.to_string(),
            message: format!("Lower limit {} must be below upper limit {}", low, high),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_path() {
        assert!(validate_path("data_log.path", "data/process_log.csv").is_ok());
        assert!(validate_path("data_log.path", "").is_err());
        assert!(validate_path("data_log.path", "bad\0path").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("controller.scan_time_ms", 100, 1).is_ok());
        assert!(validate_positive_number("controller.scan_time_ms", 0, 1).is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("controllers.flow.kp", 1.5, 0.0, 100.0).is_ok());
        assert!(validate_range("controllers.flow.kp", -0.1, 0.0, 100.0).is_err());
        assert!(validate_range("controllers.flow.kp", f64::NAN, 0.0, 100.0).is_err());
    }

    #[test]
    fn test_validate_ordered_limits() {
        assert!(validate_ordered_limits("safety.pressure", 5.0, 35.0).is_ok());
        assert!(validate_ordered_limits("safety.pressure", 35.0, 35.0).is_err());
    }

    #[test]
    fn test_validate_non_empty_string() {
        assert!(validate_non_empty_string("controller.workspace", "/srv/analyzer").is_ok());
        assert!(validate_non_empty_string("controller.workspace", "   ").is_err());
    }
}
