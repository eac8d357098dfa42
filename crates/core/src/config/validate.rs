use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Review pause reason is not blank
/// - Words per minute is not 0 (audio timing divides by it)
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    // Orchestrator validation
    if config.orchestrator.review_pause_reason.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "orchestrator.review_pause_reason cannot be empty".to_string(),
        ));
    }

    // Generation validation
    if config.generation.words_per_minute == 0 {
        return Err(ConfigError::ValidationError(
            "generation.words_per_minute cannot be 0".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = Config::default();
        config.server.port = 0;
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_blank_pause_reason_fails() {
        let mut config = Config::default();
        config.orchestrator.review_pause_reason = "  ".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_wpm_fails() {
        let mut config = Config::default();
        config.generation.words_per_minute = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("words_per_minute"));
    }
}
