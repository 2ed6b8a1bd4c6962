use std::env;

use trialdesk_application::DEFAULT_MAX_CONFIGURATION_DEPTH;
use trialdesk_core::{AppError, AppResult};

/// Settings of one runner invocation, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    pub max_configuration_depth: usize,
    pub actor_name: String,
    pub validate_rules: bool,
}

impl RunnerConfig {
    pub fn load() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let max_configuration_depth = match lookup("TRIALDESK_MAX_CONFIGURATION_DEPTH") {
            Some(value) => value.trim().parse::<usize>().map_err(|error| {
                AppError::Validation(format!(
                    "invalid TRIALDESK_MAX_CONFIGURATION_DEPTH value '{value}': {error}"
                ))
            })?,
            None => DEFAULT_MAX_CONFIGURATION_DEPTH,
        };
        if max_configuration_depth == 0 {
            return Err(AppError::Validation(
                "TRIALDESK_MAX_CONFIGURATION_DEPTH must be greater than zero".to_owned(),
            ));
        }

        let actor_name = lookup("TRIALDESK_ACTOR_NAME")
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| "trialdesk-runner".to_owned());

        let validate_rules = match lookup("TRIALDESK_VALIDATE_RULES") {
            Some(value) => parse_flag("TRIALDESK_VALIDATE_RULES", &value)?,
            None => false,
        };

        Ok(Self {
            max_configuration_depth,
            actor_name,
            validate_rules,
        })
    }
}

fn parse_flag(name: &str, value: &str) -> AppResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AppError::Validation(format!(
            "invalid {name} value '{value}': expected a boolean"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use trialdesk_core::AppError;

    use super::RunnerConfig;

    fn config(values: &[(&str, &str)]) -> Result<RunnerConfig, AppError> {
        let values: HashMap<String, String> = values
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect();
        RunnerConfig::from_lookup(|name| values.get(name).cloned())
    }

    #[test]
    fn defaults_apply_without_environment() {
        let config = config(&[]).unwrap_or_else(|_| unreachable!());

        assert_eq!(config.max_configuration_depth, 8);
        assert_eq!(config.actor_name, "trialdesk-runner");
        assert!(!config.validate_rules);
    }

    #[test]
    fn values_are_trimmed_and_parsed() {
        let config = config(&[
            ("TRIALDESK_MAX_CONFIGURATION_DEPTH", " 3 "),
            ("TRIALDESK_ACTOR_NAME", " import robot "),
            ("TRIALDESK_VALIDATE_RULES", "Yes"),
        ])
        .unwrap_or_else(|_| unreachable!());

        assert_eq!(config.max_configuration_depth, 3);
        assert_eq!(config.actor_name, "import robot");
        assert!(config.validate_rules);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            config(&[("TRIALDESK_MAX_CONFIGURATION_DEPTH", "0")]),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            config(&[("TRIALDESK_MAX_CONFIGURATION_DEPTH", "deep")]),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            config(&[("TRIALDESK_VALIDATE_RULES", "maybe")]),
            Err(AppError::Validation(_))
        ));
    }
}
