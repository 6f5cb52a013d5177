//! Token command - prompt for a Mapbox access token and store it.

use std::path::Path;

use console::style;
use dialoguer::{theme::ColorfulTheme, Password};
use terrastitch::config::{config_file_path, ConfigFile, TOKEN_ENV_VAR};
use tracing::info;

use crate::error::CliError;

/// Run the token command.
pub fn run() -> Result<(), CliError> {
    let mut config = ConfigFile::load()?;
    let token = prompt_for_token()?;
    store_token(&mut config, &token, &config_file_path())?;
    print_saved();
    Ok(())
}

/// Reads a token from the terminal without echoing it.
pub fn prompt_for_token() -> Result<String, CliError> {
    println!(
        "A Mapbox access token is needed to download terrain tiles ({}).",
        style("https://account.mapbox.com/access-tokens/").cyan()
    );

    let token: String = Password::with_theme(&ColorfulTheme::default())
        .with_prompt("Please paste your token")
        .interact()
        .map_err(|e| CliError::Prompt(e.to_string()))?;

    let token = token.trim().to_string();
    if token.is_empty() {
        return Err(CliError::Prompt("token is empty".to_string()));
    }
    Ok(token)
}

/// Prompts for a token and saves it, returning the token.
pub fn prompt_and_store(config: &mut ConfigFile) -> Result<String, CliError> {
    let token = prompt_for_token()?;
    store_token(config, &token, &config_file_path())?;
    print_saved();
    Ok(token)
}

/// Saves `token` into `config` and writes the file at `path`.
pub fn store_token(config: &mut ConfigFile, token: &str, path: &Path) -> Result<(), CliError> {
    config.mapbox.access_token = Some(token.to_string());
    config.save_to(path)?;
    info!(path = %path.display(), "Saved access token");
    Ok(())
}

fn print_saved() {
    println!(
        "{} Token saved to {}",
        style("✓").green(),
        style(config_file_path().display()).cyan()
    );
    if std::env::var(TOKEN_ENV_VAR).is_ok_and(|v| !v.trim().is_empty()) {
        println!(
            "{} {} is set and takes precedence over the saved token",
            style("!").yellow(),
            TOKEN_ENV_VAR
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_store_token_persists() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        let mut config = ConfigFile::default();

        store_token(&mut config, "pk.stored", &path).unwrap();

        let reloaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(reloaded.mapbox.access_token.as_deref(), Some("pk.stored"));
        assert_eq!(reloaded.download, config.download);
    }
}
