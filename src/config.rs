use crate::components::google_calendar::time::parse_time_of_day;
use crate::error::{config_error, RescheduleResult};
use chrono::NaiveTime;
use dotenvy::dotenv;
use serde::Deserialize;
use serde_json::Value;
use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Calendar used when none is given
pub const DEFAULT_CALENDAR_ID: &str = "primary";
/// Where the authorized-user token is kept between runs
pub const DEFAULT_TOKEN_FILE: &str = "token.json";
/// Distance between two candidate slot starts
pub const DEFAULT_STEP_MINUTES: u32 = 15;
/// Optional settings file, overridable with `RESCHEDULER_CONFIG`
pub const DEFAULT_SETTINGS_FILE: &str = "config/rescheduler.toml";
/// Daily break no meeting is moved into
pub const DEFAULT_LUNCH_START: &str = "12:00";
pub const DEFAULT_LUNCH_END: &str = "13:00";

/// Scout platform connection details, read from the environment
#[derive(Debug, Clone, Default)]
pub struct ScoutSettings {
    pub api_url: Option<String>,
    pub api_access_token: Option<String>,
}

impl ScoutSettings {
    pub fn is_configured(&self) -> bool {
        self.api_url.is_some() && self.api_access_token.is_some()
    }
}

/// Values that can be set in the TOML settings file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileSettings {
    pub calendar_id: Option<String>,
    pub token_file: Option<PathBuf>,
    pub step_minutes: Option<u32>,
    pub lunch_break: Option<bool>,
    pub lunch_start: Option<String>,
    pub lunch_end: Option<String>,
}

/// Values given on the command line, applied last
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub calendar_id: Option<String>,
    pub token_file: Option<PathBuf>,
    pub step_minutes: Option<u32>,
    pub no_lunch: bool,
}

/// Main configuration structure
#[derive(Debug, Clone)]
pub struct Config {
    /// Calendar whose meetings are moved
    pub calendar_id: String,
    /// Authorized-user token file
    pub token_file: PathBuf,
    /// Minutes between candidate slot starts
    pub step_minutes: u32,
    /// Daily break to keep free, if any
    pub lunch_break: Option<(NaiveTime, NaiveTime)>,
    pub scout: ScoutSettings,
    /// Authorized-user token JSON handed over by the environment
    pub google_token_json: Option<String>,
    /// Installed-app client config JSON for the interactive flow
    pub google_client_config: Option<String>,
}

impl Config {
    /// Load configuration from `.env`, the environment, the settings file and CLI overrides
    pub fn load(overrides: &ConfigOverrides) -> RescheduleResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let settings_path = env::var("RESCHEDULER_CONFIG")
            .unwrap_or_else(|_| DEFAULT_SETTINGS_FILE.to_string());
        let file_content = read_settings_file(Path::new(&settings_path))?;

        Self::resolve(|key| env::var(key).ok(), file_content.as_deref(), overrides)
    }

    /// Build the configuration from explicit sources
    pub fn resolve<F>(
        lookup: F,
        settings_file: Option<&str>,
        overrides: &ConfigOverrides,
    ) -> RescheduleResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file: FileSettings = match settings_file {
            Some(content) => toml::from_str(content)?,
            None => FileSettings::default(),
        };

        let scout_context = match lookup("SCOUT_CONTEXT") {
            Some(raw) if !raw.trim().is_empty() => Some(
                serde_json::from_str::<Value>(&raw)
                    .map_err(|_| config_error("Invalid JSON format in SCOUT_CONTEXT"))?,
            ),
            _ => None,
        };

        // Scout context first, plain environment as fallback
        let from_context = |key: &str| {
            scout_context
                .as_ref()
                .and_then(|ctx| context_value(ctx, key))
                .or_else(|| lookup(key))
        };

        let google_token_json = from_context("GOOGLE_TOKEN_JSON");
        let google_client_config = from_context("GOOGLE_CLIENT_CONFIG");

        let scout = ScoutSettings {
            api_url: lookup("SCOUT_API_URL"),
            api_access_token: lookup("SCOUT_API_ACCESS_TOKEN"),
        };

        let calendar_id = overrides
            .calendar_id
            .clone()
            .or(file.calendar_id)
            .unwrap_or_else(|| DEFAULT_CALENDAR_ID.to_string());

        let token_file = overrides
            .token_file
            .clone()
            .or(file.token_file)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TOKEN_FILE));

        let step_minutes = overrides
            .step_minutes
            .or(file.step_minutes)
            .unwrap_or(DEFAULT_STEP_MINUTES);
        if step_minutes == 0 {
            return Err(config_error("step_minutes must be greater than zero"));
        }

        let lunch_enabled = !overrides.no_lunch && file.lunch_break.unwrap_or(true);
        let lunch_break = if lunch_enabled {
            let start = parse_time_of_day(file.lunch_start.as_deref().unwrap_or(DEFAULT_LUNCH_START))
                .map_err(|_| config_error("Invalid lunch_start, use HH:MM"))?;
            let end = parse_time_of_day(file.lunch_end.as_deref().unwrap_or(DEFAULT_LUNCH_END))
                .map_err(|_| config_error("Invalid lunch_end, use HH:MM"))?;
            if start >= end {
                return Err(config_error("lunch_start must be before lunch_end"));
            }
            Some((start, end))
        } else {
            None
        };

        Ok(Config {
            calendar_id,
            token_file,
            step_minutes,
            lunch_break,
            scout,
            google_token_json,
            google_client_config,
        })
    }
}

/// Read the settings file. A missing file means no file settings.
pub fn read_settings_file(path: &Path) -> RescheduleResult<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(config_error(&format!(
            "Failed to read settings file {}: {}",
            path.display(),
            e
        ))),
    }
}

/// Context values may be nested JSON or strings holding JSON
fn context_value(ctx: &Value, key: &str) -> Option<String> {
    match ctx.get(key)? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::resolve(lookup_from(&[]), None, &ConfigOverrides::default()).unwrap();

        assert_eq!(config.calendar_id, "primary");
        assert_eq!(config.token_file, PathBuf::from("token.json"));
        assert_eq!(config.step_minutes, 15);
        assert_eq!(
            config.lunch_break,
            Some((
                NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(13, 0, 0).unwrap()
            ))
        );
        assert!(config.google_token_json.is_none());
        assert!(!config.scout.is_configured());
    }

    #[test]
    fn test_scout_context_object_and_string() {
        let context = r#"{
            "GOOGLE_TOKEN_JSON": {"token": "abc", "refresh_token": "def"},
            "GOOGLE_CLIENT_CONFIG": "{\"installed\": {\"client_id\": \"id\"}}"
        }"#;
        let lookup = lookup_from(&[
            ("SCOUT_CONTEXT", context),
            ("SCOUT_API_URL", "https://scout.example"),
            ("SCOUT_API_ACCESS_TOKEN", "secret"),
        ]);

        let config = Config::resolve(lookup, None, &ConfigOverrides::default()).unwrap();

        let token: Value = serde_json::from_str(config.google_token_json.as_deref().unwrap()).unwrap();
        assert_eq!(token["token"], "abc");
        assert_eq!(
            config.google_client_config.as_deref(),
            Some(r#"{"installed": {"client_id": "id"}}"#)
        );
        assert!(config.scout.is_configured());
    }

    #[test]
    fn test_environment_fallback() {
        let lookup = lookup_from(&[("GOOGLE_CLIENT_CONFIG", "{}")]);
        let config = Config::resolve(lookup, None, &ConfigOverrides::default()).unwrap();
        assert_eq!(config.google_client_config.as_deref(), Some("{}"));
    }

    #[test]
    fn test_invalid_scout_context() {
        let lookup = lookup_from(&[("SCOUT_CONTEXT", "not json")]);
        assert!(Config::resolve(lookup, None, &ConfigOverrides::default()).is_err());
    }

    #[test]
    fn test_file_and_overrides() {
        let file = r#"
            calendar_id = "team@example.com"
            step_minutes = 30
            lunch_start = "11:30"
            lunch_end = "12:15"
        "#;

        let config = Config::resolve(lookup_from(&[]), Some(file), &ConfigOverrides::default()).unwrap();
        assert_eq!(config.calendar_id, "team@example.com");
        assert_eq!(config.step_minutes, 30);
        assert_eq!(
            config.lunch_break.map(|(s, e)| (s.to_string(), e.to_string())),
            Some(("11:30:00".to_string(), "12:15:00".to_string()))
        );

        let overrides = ConfigOverrides {
            calendar_id: Some("me@example.com".to_string()),
            step_minutes: Some(5),
            no_lunch: true,
            ..Default::default()
        };
        let config = Config::resolve(lookup_from(&[]), Some(file), &overrides).unwrap();
        assert_eq!(config.calendar_id, "me@example.com");
        assert_eq!(config.step_minutes, 5);
        assert!(config.lunch_break.is_none());
    }

    #[test]
    fn test_invalid_values() {
        let overrides = ConfigOverrides {
            step_minutes: Some(0),
            ..Default::default()
        };
        assert!(Config::resolve(lookup_from(&[]), None, &overrides).is_err());

        let file = "lunch_start = \"14:00\"\nlunch_end = \"13:00\"";
        assert!(Config::resolve(lookup_from(&[]), Some(file), &ConfigOverrides::default()).is_err());
    }

    #[test]
    fn test_settings_file_read_errors() {
        let missing = std::env::temp_dir().join(format!("rescheduler-{}.toml", uuid::Uuid::new_v4()));
        assert!(read_settings_file(&missing).unwrap().is_none());

        // A directory exists but cannot be read as a file
        let err = read_settings_file(&std::env::temp_dir()).unwrap_err();
        assert!(err.to_string().contains("Failed to read settings file"));

        let file = std::env::temp_dir().join(format!("rescheduler-{}.toml", uuid::Uuid::new_v4()));
        fs::write(&file, "step_minutes = 30").unwrap();
        assert_eq!(read_settings_file(&file).unwrap().as_deref(), Some("step_minutes = 30"));
        fs::remove_file(&file).unwrap();
    }
}
