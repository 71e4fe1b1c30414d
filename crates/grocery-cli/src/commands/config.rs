use grocery_core::config::EngineConfigFile;
use grocery_core::util::normalize_text_option;
use serde::Serialize;

use crate::cli::ConfigCommands;
use crate::config::{env_lookup, load_config_file, resolve_engine_config, save_config_file, Paths};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct ConfigView {
    pub config_path: String,
    pub db_path: String,
    pub api_base_url: String,
    pub user_id: String,
    pub request_timeout_secs: u64,
    pub min_sync_interval_secs: u64,
    pub mirror_concurrency: usize,
    pub max_mirror_attempts: u32,
}

pub fn run_config(paths: &Paths, command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            api_base_url,
            user_id,
            min_sync_interval_secs,
        } => {
            let file = init_config_file(
                load_config_file(&paths.config)?,
                api_base_url,
                user_id,
                min_sync_interval_secs,
            )?;
            save_config_file(&paths.config, &file)?;
            println!("Config written to {}", paths.config.display());
            Ok(())
        }
        ConfigCommands::Show { json } => {
            let view = config_view(paths)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                println!("Config file:        {}", view.config_path);
                println!("Database:           {}", view.db_path);
                println!("Backend:            {}", view.api_base_url);
                println!("User:               {}", view.user_id);
                println!("Request timeout:    {}s", view.request_timeout_secs);
                println!("Min sync interval:  {}s", view.min_sync_interval_secs);
                println!("Mirror concurrency: {}", view.mirror_concurrency);
                println!("Mirror attempts:    {}", view.max_mirror_attempts);
            }
            Ok(())
        }
    }
}

/// Merge explicit values into an existing file and make sure it resolves
pub fn init_config_file(
    existing: EngineConfigFile,
    api_base_url: Option<String>,
    user_id: Option<String>,
    min_sync_interval_secs: Option<u64>,
) -> Result<EngineConfigFile, CliError> {
    let file = EngineConfigFile {
        api_base_url: normalize_text_option(api_base_url).or(existing.api_base_url),
        user_id: normalize_text_option(user_id).or(existing.user_id),
        min_sync_interval_secs: min_sync_interval_secs.or(existing.min_sync_interval_secs),
        ..existing
    };

    let resolved = file
        .clone()
        .resolve()
        .map_err(|error| CliError::Config(error.to_string()))?;
    Ok(EngineConfigFile {
        api_base_url: Some(resolved.api_base_url),
        ..file
    })
}

pub fn config_view(paths: &Paths) -> Result<ConfigView, CliError> {
    let config = resolve_engine_config(&paths.config, env_lookup)?;
    Ok(ConfigView {
        config_path: paths.config.display().to_string(),
        db_path: paths.db.display().to_string(),
        api_base_url: config.api_base_url,
        user_id: config.user_id,
        request_timeout_secs: config.request_timeout.as_secs(),
        min_sync_interval_secs: config.min_sync_interval.as_secs(),
        mirror_concurrency: config.mirror_concurrency,
        max_mirror_attempts: config.max_mirror_attempts,
    })
}
