//! Configuration loaded from the environment
//!
//! A `.env` file in the working directory is loaded first (if present),
//! then values are read from the process environment.

use std::fmt;
use std::path::PathBuf;

/// Default OpenAI API root
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default Anthropic API root
pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Default folder for artifacts from public pages
pub const DEFAULT_DOWNLOADS_PUBLIC: &str = "downloads-publico";

/// Default folder for artifacts behind a login
pub const DEFAULT_DOWNLOADS_PRIVATE: &str = "downloads-privado";

/// Login credentials for a scraped site
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

/// Runtime settings for every pipeline step
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub openai_base_url: String,
    pub anthropic_base_url: String,
    pub suno: Option<Credentials>,
    pub meus_dividendos: Option<Credentials>,
    pub downloads_public: PathBuf,
    pub downloads_private: PathBuf,
    /// Run Chrome without a window
    pub headless: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            anthropic_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            anthropic_base_url: DEFAULT_ANTHROPIC_BASE_URL.to_string(),
            suno: None,
            meus_dividendos: None,
            downloads_public: PathBuf::from(DEFAULT_DOWNLOADS_PUBLIC),
            downloads_private: PathBuf::from(DEFAULT_DOWNLOADS_PRIVATE),
            headless: false,
        }
    }
}

impl Settings {
    /// Create a settings builder
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }

    /// Load `.env` (missing file is fine) and read the process environment
    pub fn from_env() -> Self {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, "Ignoring unreadable .env file");
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let credentials = |email: &str, password: &str| match (get(email), get(password)) {
            (Some(e), Some(p)) => Some(Credentials::new(e, p)),
            _ => None,
        };
        let defaults = Settings::default();

        Settings {
            openai_api_key: get("OPENAI_API_KEY"),
            anthropic_api_key: get("ANTHROPIC_API_KEY"),
            openai_base_url: get("OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
            anthropic_base_url: get("ANTHROPIC_BASE_URL").unwrap_or(defaults.anthropic_base_url),
            suno: credentials("SUNO_EMAIL", "SUNO_PASSWORD"),
            meus_dividendos: credentials("MEUS_DIVIDENDOS_EMAIL", "MEUS_DIVIDENDOS_PASSWORD"),
            downloads_public: get("DIGESTKIT_DOWNLOADS_PUBLIC")
                .map(PathBuf::from)
                .unwrap_or(defaults.downloads_public),
            downloads_private: get("DIGESTKIT_DOWNLOADS_PRIVATE")
                .map(PathBuf::from)
                .unwrap_or(defaults.downloads_private),
            headless: get("DIGESTKIT_HEADLESS")
                .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        }
    }
}

/// Builder for [`Settings`]
#[derive(Debug, Clone, Default)]
pub struct SettingsBuilder {
    settings: Settings,
}

impl SettingsBuilder {
    /// Set the OpenAI API key
    pub fn openai_api_key(mut self, key: impl Into<String>) -> Self {
        self.settings.openai_api_key = Some(key.into());
        self
    }

    /// Set the Anthropic API key
    pub fn anthropic_api_key(mut self, key: impl Into<String>) -> Self {
        self.settings.anthropic_api_key = Some(key.into());
        self
    }

    /// Override the OpenAI API root (mock servers, proxies)
    pub fn openai_base_url(mut self, url: impl Into<String>) -> Self {
        self.settings.openai_base_url = url.into();
        self
    }

    /// Override the Anthropic API root
    pub fn anthropic_base_url(mut self, url: impl Into<String>) -> Self {
        self.settings.anthropic_base_url = url.into();
        self
    }

    /// Set Suno credentials
    pub fn suno(mut self, credentials: Credentials) -> Self {
        self.settings.suno = Some(credentials);
        self
    }

    /// Set Meus Dividendos credentials
    pub fn meus_dividendos(mut self, credentials: Credentials) -> Self {
        self.settings.meus_dividendos = Some(credentials);
        self
    }

    /// Set the public downloads folder
    pub fn downloads_public(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings.downloads_public = path.into();
        self
    }

    /// Set the private downloads folder
    pub fn downloads_private(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings.downloads_private = path.into();
        self
    }

    /// Run Chrome headless
    pub fn headless(mut self, headless: bool) -> Self {
        self.settings.headless = headless;
        self
    }

    /// Build the settings
    pub fn build(self) -> Settings {
        self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_environment_empty() {
        let settings = Settings::from_lookup(lookup(&[]));
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.openai_base_url, DEFAULT_OPENAI_BASE_URL);
        assert!(!settings.headless);
    }

    #[test]
    fn test_reads_keys_and_paths() {
        let settings = Settings::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("ANTHROPIC_BASE_URL", "http://127.0.0.1:9000"),
            ("DIGESTKIT_DOWNLOADS_PRIVATE", "/data/private"),
            ("DIGESTKIT_HEADLESS", "true"),
        ]));
        assert_eq!(settings.openai_api_key.as_deref(), Some("sk-test"));
        assert!(settings.anthropic_api_key.is_none());
        assert_eq!(settings.anthropic_base_url, "http://127.0.0.1:9000");
        assert_eq!(settings.downloads_private, PathBuf::from("/data/private"));
        assert!(settings.headless);
    }

    #[test]
    fn test_credentials_need_both_halves() {
        let settings = Settings::from_lookup(lookup(&[
            ("SUNO_EMAIL", "me@example.com"),
            ("MEUS_DIVIDENDOS_EMAIL", "me@example.com"),
            ("MEUS_DIVIDENDOS_PASSWORD", "secret"),
        ]));
        assert!(settings.suno.is_none());
        assert_eq!(
            settings.meus_dividendos,
            Some(Credentials::new("me@example.com", "secret"))
        );
    }

    #[test]
    fn test_blank_values_are_unset() {
        let settings = Settings::from_lookup(lookup(&[("OPENAI_API_KEY", "  ")]));
        assert!(settings.openai_api_key.is_none());
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials::new("me@example.com", "hunter2");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("me@example.com"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_builder() {
        let settings = Settings::builder()
            .openai_api_key("sk-1")
            .openai_base_url("http://localhost:1234")
            .headless(true)
            .build();
        assert_eq!(settings.openai_api_key.as_deref(), Some("sk-1"));
        assert_eq!(settings.openai_base_url, "http://localhost:1234");
        assert!(settings.headless);
    }
}
