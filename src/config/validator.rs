use crate::config::{Config, SCHEMA_VERSION};
use crate::error::{ReqtraceError, Result, ValidationError};
use std::collections::HashSet;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, collecting every problem found
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_tracer(config, &mut errors);
        Self::validate_categories(config, &mut errors);
        Self::validate_seeds(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ReqtraceError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != SCHEMA_VERSION {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_tracer(config: &Config, errors: &mut Vec<ValidationError>) {
        let threshold = config.tracer.entropy_threshold;
        if !threshold.is_finite() || threshold < 0.0 {
            errors.push(ValidationError::new(
                "tracer.entropy_threshold",
                format!("Entropy threshold must be a non-negative number, got {}", threshold),
            ));
        }

        if config.tracer.min_token_length == 0 {
            errors.push(ValidationError::new(
                "tracer.min_token_length",
                "Minimum token length must be greater than 0",
            ));
        }

        if config.tracer.max_nodes == 0 {
            errors.push(ValidationError::new(
                "tracer.max_nodes",
                "Node budget must be greater than 0",
            ));
        }
    }

    fn validate_categories(config: &Config, errors: &mut Vec<ValidationError>) {
        let mut names = HashSet::new();

        for (i, category) in config.categories.iter().enumerate() {
            if category.name.is_empty() {
                errors.push(ValidationError::new(
                    format!("category[{}].name", i),
                    "Category name cannot be empty",
                ));
            } else if !names.insert(category.name.as_str()) {
                errors.push(ValidationError::new(
                    format!("category[{}].name", i),
                    format!("Duplicate category name: {}", category.name),
                ));
            }

            // Compilation is checked by the classifier; an empty rule matches everything
            if category.pattern.is_empty() {
                errors.push(ValidationError::new(
                    format!("category[{}].pattern", i),
                    "Pattern cannot be empty",
                ));
            }
        }
    }

    fn validate_seeds(config: &Config, errors: &mut Vec<ValidationError>) {
        let known: HashSet<&str> = config.categories.iter().map(|c| c.name.as_str()).collect();

        for name in &config.seeds.priority {
            if !known.contains(name.as_str()) {
                errors.push(ValidationError::new(
                    "seeds.priority",
                    format!("Unknown category in priority list: {}", name),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::CategoryConfig;

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_negative_threshold() {
        let mut config = Config::default();
        config.tracer.entropy_threshold = -1.0;
        assert!(ConfigValidator::validate(&config).is_err());

        config.tracer.entropy_threshold = f64::NAN;
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_zero_budgets() {
        let mut config = Config::default();
        config.tracer.max_nodes = 0;
        config.tracer.min_token_length = 0;

        match ConfigValidator::validate(&config) {
            Err(ReqtraceError::ConfigValidation { errors }) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_and_unknown_categories() {
        let mut config = Config::default();
        config
            .categories
            .push(CategoryConfig::new("match_ids", r"\d+", ""));
        config.seeds.priority.push("no_such_category".to_string());

        match ConfigValidator::validate(&config) {
            Err(ReqtraceError::ConfigValidation { errors }) => {
                let paths: Vec<&str> = errors.iter().map(|e| e.path.as_str()).collect();
                assert!(paths.contains(&"seeds.priority"));
                assert!(paths.iter().any(|p| p.ends_with(".name")));
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_schema() {
        let mut config = Config::default();
        config.meta.schema_version = "0.1".to_string();
        assert!(ConfigValidator::validate(&config).is_err());
    }
}
