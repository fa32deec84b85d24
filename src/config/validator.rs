use crate::config::Config;
use crate::error::{ConfigIssue, Result, SrpaError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, collecting every issue before failing
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_storage(config, &mut errors);
        Self::validate_search(config, &mut errors);
        Self::validate_classifier(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SrpaError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ConfigIssue>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ConfigIssue::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_storage(config: &Config, errors: &mut Vec<ConfigIssue>) {
        if config.storage.data_dir.as_os_str().is_empty() {
            errors.push(ConfigIssue::new(
                "storage.data_dir",
                "Data directory cannot be empty",
            ));
        }
    }

    fn validate_search(config: &Config, errors: &mut Vec<ConfigIssue>) {
        if config.search.per_page == 0 {
            errors.push(ConfigIssue::new(
                "search.per_page",
                "Page size must be greater than 0",
            ));
        }

        let distance = config.search.max_distance;
        if !distance.is_finite() || distance <= 0.0 {
            errors.push(ConfigIssue::new(
                "search.max_distance",
                format!("Distance cutoff must be a positive number, got {}", distance),
            ));
        }

        if config.search.max_matched_terms == 0 {
            errors.push(ConfigIssue::new(
                "search.max_matched_terms",
                "Matched term limit must be greater than 0",
            ));
        }
    }

    fn validate_classifier(config: &Config, errors: &mut Vec<ConfigIssue>) {
        if config.classifier.min_topic_name_len == 0 {
            errors.push(ConfigIssue::new(
                "classifier.min_topic_name_len",
                "Minimum topic name length must be greater than 0",
            ));
        }
    }
}
