use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::shared::constants::{DEFAULT_AZURE_REGION, DEFAULT_HTTP_TIMEOUT_SECS};

pub const ENGINE_ALL_KEY: &str = "FDA_ENGINE_ALL";

pub const YOLO_MODEL_FILE: &str = "FDA_YOLO_MODEL_FILE";
pub const BLAZEFACE_MODEL_FILE: &str = "FDA_BLAZEFACE_MODEL_FILE";
pub const AZURE_REGION: &str = "FDA_AZURE_REGION";
pub const AZURE_SUBSCRIPTION_KEY: &str = "FDA_AZURE_SUBSCRIPTION_KEY";
pub const GOOGLE_API_KEY: &str = "FDA_GOOGLE_API_KEY";
pub const FACEPLUSPLUS_API_KEY: &str = "FDA_FACEPLUSPLUS_API_KEY";
pub const FACEPLUSPLUS_API_SECRET: &str = "FDA_FACEPLUSPLUS_API_SECRET";
pub const CONFIDENCE: &str = "FDA_CONFIDENCE";
pub const HTTP_TIMEOUT_SECS: &str = "FDA_HTTP_TIMEOUT_SECS";

const VALUE_KEYS: &[&str] = &[
    YOLO_MODEL_FILE,
    BLAZEFACE_MODEL_FILE,
    AZURE_REGION,
    AZURE_SUBSCRIPTION_KEY,
    GOOGLE_API_KEY,
    FACEPLUSPLUS_API_KEY,
    FACEPLUSPLUS_API_SECRET,
    CONFIDENCE,
    HTTP_TIMEOUT_SECS,
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown engine name: [{0}]")]
    UnknownEngine(String),
    #[error("engine '{engine}' requires {key} to be set")]
    MissingSetting { engine: String, key: &'static str },
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },
}

/// The fixed set of engines this tool knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    Yolo,
    Blazeface,
    Azure,
    Google,
    FacePlusPlus,
}

impl EngineKind {
    pub const ALL: &'static [EngineKind] = &[
        EngineKind::Yolo,
        EngineKind::Blazeface,
        EngineKind::Azure,
        EngineKind::Google,
        EngineKind::FacePlusPlus,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EngineKind::Yolo => "yolo",
            EngineKind::Blazeface => "blazeface",
            EngineKind::Azure => "azure",
            EngineKind::Google => "google",
            EngineKind::FacePlusPlus => "faceplusplus",
        }
    }

    /// Environment toggle that enables this engine.
    pub fn toggle_key(self) -> &'static str {
        match self {
            EngineKind::Yolo => "FDA_ENGINE_YOLO",
            EngineKind::Blazeface => "FDA_ENGINE_BLAZEFACE",
            EngineKind::Azure => "FDA_ENGINE_AZURE",
            EngineKind::Google => "FDA_ENGINE_GOOGLE",
            EngineKind::FacePlusPlus => "FDA_ENGINE_FACEPLUSPLUS",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EngineKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        EngineKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownEngine(s.trim().to_string()))
    }
}

/// Engine toggles plus string parameters keyed by setting name.
///
/// Engines query the values they need by key; nothing here knows which
/// engine consumes which parameter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    requested: Vec<EngineKind>,
    env_enabled: Vec<EngineKind>,
    values: HashMap<&'static str, String>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads toggles and parameters from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup.
    ///
    /// Toggles that fail to parse count as disabled.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let use_all = lookup(ENGINE_ALL_KEY).is_some_and(|v| parse_bool(&v));
        let env_enabled = EngineKind::ALL
            .iter()
            .copied()
            .filter(|kind| use_all || lookup(kind.toggle_key()).is_some_and(|v| parse_bool(&v)))
            .collect();

        let values = VALUE_KEYS
            .iter()
            .filter_map(|&key| {
                lookup(key)
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .map(|v| (key, v))
            })
            .collect();

        Self {
            requested: Vec::new(),
            env_enabled,
            values,
        }
    }

    pub fn with_value(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.values.insert(key, value.into());
        self
    }

    pub fn select(&mut self, kind: EngineKind) {
        self.requested.push(kind);
    }

    pub fn select_all(&mut self) {
        self.requested.extend_from_slice(EngineKind::ALL);
    }

    /// Selects engines from a comma-separated list, e.g. `"yolo,azure"`.
    ///
    /// Empty entries are ignored; an unknown name fails the whole list.
    pub fn select_names(&mut self, list: &str) -> Result<(), ConfigError> {
        let kinds = list
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(EngineKind::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        self.requested.extend(kinds);
        Ok(())
    }

    /// Engines to run, in output column order: explicitly requested names
    /// first, then environment toggles, without duplicates.
    pub fn selected_engines(&self) -> Vec<EngineKind> {
        let mut selected: Vec<EngineKind> = Vec::new();
        for &kind in self.requested.iter().chain(self.env_enabled.iter()) {
            if !selected.contains(&kind) {
                selected.push(kind);
            }
        }
        selected
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn require(&self, engine: &str, key: &'static str) -> Result<&str, ConfigError> {
        self.get(key).ok_or_else(|| ConfigError::MissingSetting {
            engine: engine.to_string(),
            key,
        })
    }

    pub fn azure_region(&self) -> &str {
        self.get(AZURE_REGION).unwrap_or(DEFAULT_AZURE_REGION)
    }

    /// Confidence override for local classifiers, if configured.
    pub fn confidence(&self) -> Result<Option<f64>, ConfigError> {
        let Some(raw) = self.get(CONFIDENCE) else {
            return Ok(None);
        };
        match raw.parse::<f64>() {
            Ok(v) if (0.0..=1.0).contains(&v) => Ok(Some(v)),
            _ => Err(ConfigError::InvalidValue {
                key: CONFIDENCE,
                value: raw.to_string(),
            }),
        }
    }

    pub fn http_timeout(&self) -> Result<Duration, ConfigError> {
        let Some(raw) = self.get(HTTP_TIMEOUT_SECS) else {
            return Ok(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS));
        };
        match raw.parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
            _ => Err(ConfigError::InvalidValue {
                key: HTTP_TIMEOUT_SECS,
                value: raw.to_string(),
            }),
        }
    }
}

fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "1" | "t" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[rstest]
    #[case("yolo", EngineKind::Yolo)]
    #[case("BlazeFace", EngineKind::Blazeface)]
    #[case(" azure ", EngineKind::Azure)]
    #[case("google", EngineKind::Google)]
    #[case("faceplusplus", EngineKind::FacePlusPlus)]
    fn test_engine_kind_parses_known_names(#[case] raw: &str, #[case] expected: EngineKind) {
        assert_eq!(raw.parse::<EngineKind>().unwrap(), expected);
    }

    #[test]
    fn test_engine_kind_rejects_unknown_name() {
        let err = "dlib".parse::<EngineKind>().unwrap_err();
        assert_eq!(err, ConfigError::UnknownEngine("dlib".to_string()));
    }

    #[test]
    fn test_engine_kind_display_round_trips() {
        for &kind in EngineKind::ALL {
            assert_eq!(kind.to_string().parse::<EngineKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_env_toggles_enable_engines_in_enumeration_order() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("FDA_ENGINE_GOOGLE", "true"),
            ("FDA_ENGINE_YOLO", "1"),
            ("FDA_ENGINE_AZURE", "false"),
        ]));
        assert_eq!(
            settings.selected_engines(),
            vec![EngineKind::Yolo, EngineKind::Google]
        );
    }

    #[test]
    fn test_engine_all_toggle_enables_everything() {
        let settings = Settings::from_lookup(lookup_from(&[(ENGINE_ALL_KEY, "true")]));
        assert_eq!(settings.selected_engines(), EngineKind::ALL.to_vec());
    }

    #[test]
    fn test_unparseable_toggle_counts_as_disabled() {
        let settings = Settings::from_lookup(lookup_from(&[("FDA_ENGINE_YOLO", "maybe")]));
        assert!(settings.selected_engines().is_empty());
    }

    #[test]
    fn test_requested_names_come_before_env_toggles() {
        let mut settings = Settings::from_lookup(lookup_from(&[("FDA_ENGINE_YOLO", "true")]));
        settings.select_names("azure,yolo").unwrap();
        assert_eq!(
            settings.selected_engines(),
            vec![EngineKind::Azure, EngineKind::Yolo]
        );
    }

    #[test]
    fn test_select_names_keeps_requested_order() {
        let mut settings = Settings::new();
        settings.select_names("google, blazeface,,yolo").unwrap();
        assert_eq!(
            settings.selected_engines(),
            vec![EngineKind::Google, EngineKind::Blazeface, EngineKind::Yolo]
        );
    }

    #[test]
    fn test_select_names_rejects_unknown_entry() {
        let mut settings = Settings::new();
        let err = settings.select_names("yolo,opencv").unwrap_err();
        assert_eq!(err, ConfigError::UnknownEngine("opencv".to_string()));
        assert!(settings.selected_engines().is_empty());
    }

    #[test]
    fn test_select_all_deduplicates() {
        let mut settings = Settings::new();
        settings.select(EngineKind::Azure);
        settings.select_all();
        let selected = settings.selected_engines();
        assert_eq!(selected.len(), EngineKind::ALL.len());
        assert_eq!(selected[0], EngineKind::Azure);
    }

    #[test]
    fn test_values_are_trimmed_and_blank_values_dropped() {
        let settings = Settings::from_lookup(lookup_from(&[
            (GOOGLE_API_KEY, "  abc  "),
            (AZURE_SUBSCRIPTION_KEY, "   "),
        ]));
        assert_eq!(settings.get(GOOGLE_API_KEY), Some("abc"));
        assert_eq!(settings.get(AZURE_SUBSCRIPTION_KEY), None);
    }

    #[test]
    fn test_require_reports_engine_and_key() {
        let settings = Settings::new();
        let err = settings.require("azure", AZURE_SUBSCRIPTION_KEY).unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingSetting {
                engine: "azure".to_string(),
                key: AZURE_SUBSCRIPTION_KEY,
            }
        );
    }

    #[test]
    fn test_azure_region_defaults() {
        assert_eq!(Settings::new().azure_region(), "eastus");
        let settings = Settings::new().with_value(AZURE_REGION, "westeurope");
        assert_eq!(settings.azure_region(), "westeurope");
    }

    #[rstest]
    #[case("0.7", Some(0.7))]
    #[case("0", Some(0.0))]
    fn test_confidence_parses(#[case] raw: &str, #[case] expected: Option<f64>) {
        let settings = Settings::new().with_value(CONFIDENCE, raw);
        assert_eq!(settings.confidence().unwrap(), expected);
    }

    #[rstest]
    #[case("1.5")]
    #[case("high")]
    fn test_confidence_rejects_out_of_range(#[case] raw: &str) {
        let settings = Settings::new().with_value(CONFIDENCE, raw);
        assert!(matches!(
            settings.confidence(),
            Err(ConfigError::InvalidValue { key: CONFIDENCE, .. })
        ));
    }

    #[test]
    fn test_http_timeout_default_and_override() {
        assert_eq!(
            Settings::new().http_timeout().unwrap(),
            Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS)
        );
        let settings = Settings::new().with_value(HTTP_TIMEOUT_SECS, "5");
        assert_eq!(settings.http_timeout().unwrap(), Duration::from_secs(5));
        let settings = Settings::new().with_value(HTTP_TIMEOUT_SECS, "0");
        assert!(settings.http_timeout().is_err());
    }
}
