//! Settings validation.
//!
//! Problems split into errors (the run cannot proceed) and warnings
//! (suspicious but workable). Path existence is a warning because the
//! processed and interim roots are created on demand.

use crate::schema::Settings;

/// Outcome of validating a settings tree.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigValidation {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ConfigValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate settings, collecting every problem rather than stopping at the
/// first.
pub fn validate_settings(settings: &Settings) -> ConfigValidation {
    let mut out = ConfigValidation::default();

    if !settings.data.raw.exists() {
        out.warnings.push(format!(
            "raw data root {:?} does not exist; every invocation will fail file lookup",
            settings.data.raw
        ));
    }
    if settings.data.raw == settings.data.processed {
        out.errors
            .push("raw and processed roots must differ".to_string());
    }

    let remote = &settings.remote;
    if remote.bucket.trim().is_empty() {
        out.errors.push("remote.bucket must not be empty".to_string());
    }
    if remote.poll_interval_secs == 0 {
        out.errors
            .push("remote.poll_interval_secs must be positive".to_string());
    }
    if remote.deadline_secs < remote.poll_interval_secs {
        out.errors.push(format!(
            "remote.deadline_secs ({}) is below the poll interval ({})",
            remote.deadline_secs, remote.poll_interval_secs
        ));
    }

    let table = &settings.table;
    for (name, value) in [
        ("table.text_tolerance_x", table.text_tolerance_x),
        ("table.text_tolerance_y", table.text_tolerance_y),
        ("table.column_tolerance", table.column_tolerance),
        ("table.min_col_sep", table.min_col_sep),
        ("table.row_header_tolerance", table.row_header_tolerance),
    ] {
        if !value.is_finite() || value <= 0.0 {
            out.errors
                .push(format!("{name} must be a positive finite number"));
        }
    }
    if table.min_col_sep < table.column_tolerance {
        out.warnings.push(format!(
            "table.min_col_sep ({}) below table.column_tolerance ({}) rarely merges anything",
            table.min_col_sep, table.column_tolerance
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Settings;

    #[test]
    fn test_defaults_have_no_errors() {
        let settings = Settings::rooted_at("/nonexistent");
        let result = validate_settings(&settings);
        assert!(result.is_valid(), "{:?}", result.errors);
        // Missing raw root is only a warning.
        assert!(!result.warnings.is_empty());
    }

    #[test]
    fn test_bad_poll_settings_are_errors() {
        let mut settings = Settings::rooted_at("/data");
        settings.remote.poll_interval_secs = 0;
        settings.remote.deadline_secs = 0;
        let result = validate_settings(&settings);
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.contains("poll_interval")));
    }

    #[test]
    fn test_bad_tolerance_is_error() {
        let mut settings = Settings::rooted_at("/data");
        settings.table.min_col_sep = -1.0;
        assert!(!validate_settings(&settings).is_valid());
    }

    #[test]
    fn test_identical_roots_are_error() {
        let mut settings = Settings::rooted_at("/data");
        settings.data.processed = settings.data.raw.clone();
        assert!(!validate_settings(&settings).is_valid());
    }
}
