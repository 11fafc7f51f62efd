use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Output geometry is non-zero and even (yuv420p needs even dimensions)
/// - Timeouts and parallelism limits are non-zero
/// - At least one attempt is allowed
/// - Artifact base URL is set
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let render = &config.render;
    if render.width == 0 || render.height == 0 {
        return Err(ConfigError::ValidationError(
            "render.width and render.height must be non-zero".to_string(),
        ));
    }
    if render.width % 2 != 0 || render.height % 2 != 0 {
        return Err(ConfigError::ValidationError(format!(
            "render geometry must be even, got {}x{}",
            render.width, render.height
        )));
    }
    if render.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "render.timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.fetch.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "fetch.timeout_secs cannot be 0".to_string(),
        ));
    }
    if config.fetch.max_parallel_downloads == 0 {
        return Err(ConfigError::ValidationError(
            "fetch.max_parallel_downloads cannot be 0".to_string(),
        ));
    }

    if config.composer.max_parallel_renders == 0 {
        return Err(ConfigError::ValidationError(
            "composer.max_parallel_renders cannot be 0".to_string(),
        ));
    }
    if config.composer.retry.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "composer.retry.max_attempts cannot be 0".to_string(),
        ));
    }

    if config.artifacts.base_url.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "artifacts.base_url cannot be empty".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_odd_geometry_fails() {
        let mut config = Config::default();
        config.render.width = 1081;
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_zero_parallelism_fails() {
        let mut config = Config::default();
        config.composer.max_parallel_renders = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.fetch.max_parallel_downloads = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_empty_base_url_fails() {
        let mut config = Config::default();
        config.artifacts.base_url = "  ".to_string();
        assert!(validate_config(&config).is_err());
    }
}
