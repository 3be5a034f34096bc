use crate::config::Config;
use crate::error::{JobMatchError, Result, ValidationError};

/// Providers reachable through an OpenAI-compatible chat completions endpoint
pub const SUPPORTED_PROVIDERS: [&str; 3] = ["openai", "groq", "ollama"];

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_storage(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);
        Self::validate_tiers(config, &mut errors);
        Self::validate_llm(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(JobMatchError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_storage(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.storage.data_dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.data_dir",
                "Data directory cannot be empty",
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        let backend = &config.embedding.backend;
        if backend != "fastembed" && backend != "hash" {
            errors.push(ValidationError::new(
                "embedding.backend",
                format!("Backend must be 'fastembed' or 'hash', got '{}'", backend),
            ));
        }

        if config.embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }

        if config.embedding.dimension == 0 {
            errors.push(ValidationError::new(
                "embedding.dimension",
                "Vector dimension must be greater than 0",
            ));
        }

        if config.embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        let retrieval = &config.retrieval;

        if retrieval.depth == 0 {
            errors.push(ValidationError::new(
                "retrieval.depth",
                "Depth must be greater than 0",
            ));
        }

        // k = 0 would divide by zero at the first rank
        if !(retrieval.rrf_k.is_finite() && retrieval.rrf_k > 0.0) {
            errors.push(ValidationError::new(
                "retrieval.rrf_k",
                format!("Fusion offset must be a positive number, got {}", retrieval.rrf_k),
            ));
        }

        if !retrieval.bm25_enabled && !retrieval.dense_enabled {
            errors.push(ValidationError::new(
                "retrieval",
                "At least one of bm25_enabled and dense_enabled must be true",
            ));
        }

        if retrieval.max_conditions == 0 {
            errors.push(ValidationError::new(
                "retrieval.max_conditions",
                "Maximum condition count must be greater than 0",
            ));
        }

        if retrieval.query_type.is_empty() {
            errors.push(ValidationError::new(
                "retrieval.query_type",
                "Query type cannot be empty",
            ));
        }
    }

    fn validate_tiers(config: &Config, errors: &mut Vec<ValidationError>) {
        let bounds = &config.tiers.bounds;

        if bounds.is_empty() {
            errors.push(ValidationError::new(
                "tiers.bounds",
                "At least one tier bound is required",
            ));
            return;
        }

        if bounds[0] == 0 || bounds.windows(2).any(|pair| pair[0] >= pair[1]) {
            errors.push(ValidationError::new(
                "tiers.bounds",
                format!("Tier bounds must be positive and strictly increasing, got {:?}", bounds),
            ));
        }
    }

    fn validate_llm(config: &Config, errors: &mut Vec<ValidationError>) {
        // The key itself is checked when the judge is constructed, so
        // `config validate` works on machines without credentials
        if config.llm.api_key_env.is_empty() && config.llm.provider != "ollama" {
            errors.push(ValidationError::new(
                "llm.api_key_env",
                "API key environment variable name cannot be empty",
            ));
        }

        let temp = config.llm.temperature;
        if !(0.0..=2.0).contains(&temp) {
            errors.push(ValidationError::new(
                "llm.temperature",
                format!("Temperature must be between 0.0 and 2.0, got {}", temp),
            ));
        }

        let provider = &config.llm.provider;
        if !SUPPORTED_PROVIDERS.contains(&provider.as_str()) {
            errors.push(ValidationError::new(
                "llm.provider",
                format!(
                    "Provider must be one of {:?}, got '{}'",
                    SUPPORTED_PROVIDERS, provider
                ),
            ));
        }

        if config.llm.timeout_secs == 0 {
            errors.push(ValidationError::new(
                "llm.timeout_secs",
                "Timeout must be greater than 0",
            ));
        }

        if config.llm.enabled && config.llm.model.is_empty() {
            errors.push(ValidationError::new("llm.model", "Model name cannot be empty"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error_paths(config: &Config) -> Vec<String> {
        match ConfigValidator::validate(config) {
            Err(JobMatchError::ConfigValidation { errors }) => {
                errors.into_iter().map(|e| e.path).collect()
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(()) => Vec::new(),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_zero_rrf_k_rejected() {
        let mut config = Config::default();
        config.retrieval.rrf_k = 0.0;
        assert_eq!(error_paths(&config), vec!["retrieval.rrf_k"]);

        config.retrieval.rrf_k = f64::NAN;
        assert_eq!(error_paths(&config), vec!["retrieval.rrf_k"]);
    }

    #[test]
    fn test_both_modalities_disabled() {
        let mut config = Config::default();
        config.retrieval.bm25_enabled = false;
        config.retrieval.dense_enabled = false;
        assert_eq!(error_paths(&config), vec!["retrieval"]);
    }

    #[test]
    fn test_tier_bounds_must_increase() {
        let mut config = Config::default();
        config.tiers.bounds = vec![5, 5, 30];
        assert_eq!(error_paths(&config), vec!["tiers.bounds"]);

        config.tiers.bounds = vec![];
        assert_eq!(error_paths(&config), vec!["tiers.bounds"]);
    }

    #[test]
    fn test_errors_are_collected() {
        let mut config = Config::default();
        config.embedding.backend = "invalid".to_string();
        config.llm.temperature = 3.0;
        config.retrieval.depth = 0;

        let paths = error_paths(&config);
        assert_eq!(paths.len(), 3);
        assert!(paths.contains(&"embedding.backend".to_string()));
        assert!(paths.contains(&"llm.temperature".to_string()));
        assert!(paths.contains(&"retrieval.depth".to_string()));
    }
}
