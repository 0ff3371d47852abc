use super::Command;
use crate::error::Error;
use async_trait::async_trait;
use eyre::Result;
use std::io::Write;
use std::path::Path;
use sluice_core::config::{Settings, mask_secret};

pub struct ConfigCommand {
    pub action: ConfigAction,
}

pub enum ConfigAction {
    Show,
    Init { force: bool },
}

#[async_trait]
impl Command for ConfigCommand {
    async fn execute(&self) -> Result<()> {
        match &self.action {
            ConfigAction::Show => self.show().await.map_err(Into::into),
            ConfigAction::Init { force } => self.init(*force).await.map_err(Into::into),
        }
    }
}

impl ConfigCommand {
    async fn show(&self) -> std::result::Result<(), Error> {
        let settings = Settings::load()?;
        let path = Settings::config_path()?;

        let mut stdout = std::io::stdout();
        writeln!(stdout, "Settings file: {}", path.display())?;
        writeln!(stdout, "\n{}", toml::to_string_pretty(&masked(settings))?)?;
        Ok(())
    }

    async fn init(&self, force: bool) -> std::result::Result<(), Error> {
        let path = Settings::config_path()?;
        let message = write_defaults(&path, force)?;
        writeln!(std::io::stdout(), "{message}")?;
        Ok(())
    }
}

/// Secrets replaced by their masked form, for display.
fn masked(mut settings: Settings) -> Settings {
    settings.model.api_key = settings.model.masked_api_key();
    if let Some(key) = settings.tools.weather_api_key.as_mut() {
        *key = mask_secret(key);
    }
    settings
}

fn write_defaults(path: &Path, force: bool) -> std::result::Result<String, Error> {
    if path.exists() && !force {
        return Err(Error::Config(format!(
            "{} already exists; pass --force to overwrite it",
            path.display()
        )));
    }
    Settings::default().save_to(path)?;
    Ok(format!("Wrote default settings to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sluice").join("settings.toml");

        write_defaults(&path, false).unwrap();
        assert!(path.exists());
        assert!(matches!(write_defaults(&path, false), Err(Error::Config(_))));
        assert!(write_defaults(&path, true).is_ok());
        assert_eq!(Settings::load_from(&path).unwrap(), Settings::default());
    }

    #[test]
    fn show_masks_secrets() {
        let mut settings = Settings::default();
        settings.model.api_key = "sk-abcdef123456".to_string();
        settings.tools.weather_api_key = Some("qweather-9876".to_string());

        let shown = masked(settings);
        assert!(!shown.model.api_key.contains("abcdef"));
        assert!(shown.model.api_key.ends_with("3456"));
        assert_eq!(
            shown.tools.weather_api_key.as_deref(),
            Some("*********9876")
        );
    }

    #[test]
    fn short_weather_key_is_fully_hidden() {
        let mut settings = Settings::default();
        settings.tools.weather_api_key = Some("qw42".to_string());

        let shown = masked(settings);
        assert_eq!(shown.tools.weather_api_key.as_deref(), Some("****"));
    }
}
