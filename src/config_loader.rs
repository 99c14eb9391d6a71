use crate::config::LoggerConfig;
use crate::errors::StepLogResult;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::Path;

/// Environment prefix; nested keys are separated by `__`
/// (`STEPLOG_LOG__LEVEL=debug`).
pub const ENV_PREFIX: &str = "STEPLOG_";

/// Defaults, then the TOML file (if given), then the environment.
pub fn figment(path: Option<&Path>) -> Figment {
    let mut figment = Figment::from(Serialized::defaults(LoggerConfig::default()));
    if let Some(path) = path {
        figment = figment.merge(Toml::file(path));
    }
    figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Load and validate a logger configuration.
pub fn load_config(path: Option<&Path>) -> StepLogResult<LoggerConfig> {
    let config: LoggerConfig = figment(path).extract()?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_level::Severity;
    use figment::Jail;

    #[test]
    fn defaults_load_without_file() {
        Jail::expect_with(|_jail| {
            let config = load_config(None).map_err(|e| e.to_string())?;
            assert_eq!(config.print_interval, 1);
            assert_eq!(config.log.level, Severity::Info);
            Ok(())
        });
    }

    #[test]
    fn toml_file_and_env_are_layered() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "steplog.toml",
                r#"
                    name = "mnist"
                    print_interval = 3

                    [log]
                    level = "train"
                    save_as_json = true
                    timestamp_format = "short"

                    [tracker]
                    project = "demo"
                    tags = ["baseline"]
                "#,
            )?;
            jail.set_env("STEPLOG_LOG__LEVEL", "debug");

            let config =
                load_config(Some(Path::new("steplog.toml"))).map_err(|e| e.to_string())?;
            assert_eq!(config.name.as_deref(), Some("mnist"));
            assert_eq!(config.print_interval, 3);
            assert_eq!(config.log.level, Severity::Debug);
            assert!(config.log.save_as_json);
            let tracker = config.tracker.expect("tracker section");
            assert_eq!(tracker.project.as_deref(), Some("demo"));
            assert_eq!(tracker.tags, vec!["baseline".to_string()]);
            Ok(())
        });
    }

    #[test]
    fn invalid_values_are_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("STEPLOG_PRINT_INTERVAL", "0");
            let err = load_config(None).unwrap_err();
            assert!(err.is_configuration());

            jail.set_env("STEPLOG_PRINT_INTERVAL", "2");
            jail.set_env("STEPLOG_LOG__LEVEL", "chatty");
            assert!(load_config(None).is_err());
            Ok(())
        });
    }
}
