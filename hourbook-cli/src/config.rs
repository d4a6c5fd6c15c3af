use anyhow::{Context, Result};
use hourbook::domain::{DisplayHour, Role, Screen, TimeShifter};
use hourbook::projector::TotalsScope;
use hourbook::window::DisplayWindow;
use hourbook::SessionSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "HOURBOOK";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HourbookConfig {
    /// Base URL of the analytics API, e.g. "http://localhost:5000"
    pub api_url: String,
    /// Bearer token sent with every request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub role: Role,
    /// Hours added to stored hours to get the hours shown
    pub offset_hours: i32,
    /// Display-hour windows as "start-end", e.g. "10-21"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow_window: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heatmap_window: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_window: Option<String>,
    pub totals: TotalsScope,
}

impl Default for HourbookConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:5000".to_string(),
            token: None,
            role: Role::User,
            offset_hours: TimeShifter::default().offset_hours(),
            flow_window: None,
            heatmap_window: None,
            queue_window: None,
            totals: TotalsScope::FullDay,
        }
    }
}

impl HourbookConfig {
    pub fn config_path() -> Result<PathBuf> {
        Ok(dirs::config_dir()
            .context("Cannot determine config directory")?
            .join("hourbook")
            .join("config.toml"))
    }

    /// Defaults, then the config file if present, then `HOURBOOK_*` environment variables.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    fn load_from(path: &Path) -> Result<Self> {
        let builder = Self::base_builder()?
            .add_source(config::File::from(path).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).prefix_separator("_"));
        Self::build(builder)
            .with_context(|| format!("Failed to load config from {}", path.display()))
    }

    fn base_builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        let defaults = config::Config::try_from(&Self::default())
            .context("Failed to build default config")?;
        Ok(config::Config::builder().add_source(defaults))
    }

    fn build(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Writes the default config file if it does not exist yet.
    pub fn ensure_file() -> Result<PathBuf> {
        let path = Self::config_path()?;
        if path.exists() {
            return Ok(path);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = toml::to_string_pretty(&Self::default())?;
        std::fs::write(&path, raw)
            .with_context(|| format!("Failed to write config at {}", path.display()))?;
        Ok(path)
    }

    fn window_override(&self, screen: Screen) -> Option<&str> {
        match screen {
            Screen::CustomerFlow => self.flow_window.as_deref(),
            Screen::Heatmap => self.heatmap_window.as_deref(),
            Screen::Queue => self.queue_window.as_deref(),
        }
    }

    pub fn session_settings(&self, screen: Screen) -> Result<SessionSettings> {
        let mut settings = SessionSettings::for_screen(screen);
        settings.shifter = TimeShifter::new(self.offset_hours);
        settings.totals = self.totals;
        if let Some(raw) = self.window_override(screen) {
            settings.window = parse_window(raw)
                .with_context(|| format!("Invalid {screen} window {raw:?}"))?;
        }
        Ok(settings)
    }
}

/// Parses an inclusive display-hour range such as `"10-21"`.
pub fn parse_window(raw: &str) -> Result<DisplayWindow> {
    let (start, end) = raw
        .split_once('-')
        .context("expected a range like 10-21")?;
    let start: DisplayHour = start.trim().parse()?;
    let end: DisplayHour = end.trim().parse()?;
    Ok(DisplayWindow::new(start, end)?)
}
