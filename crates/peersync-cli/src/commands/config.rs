use std::env;

use peersync_core::config::ClientConfig;
use peersync_core::util::{is_http_url, normalize_text_option};

use crate::cli::ConfigCommands;
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            storage_url,
            auth_token,
            client_id,
            client_name,
            no_activate,
        } => run_config_init(
            profile.as_deref().or(global_profile),
            ClientConfig {
                storage_url,
                auth_token,
                client_id,
                client_name,
            },
            no_activate,
        ),
        ConfigCommands::Show { profile } => run_config_show(profile.as_deref().or(global_profile)),
    }
}

pub fn run_config_init(
    profile_name: Option<&str>,
    explicit: ClientConfig,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let existing = config.profile(&profile_name).cloned().unwrap_or_default();

    let merged = merge_profile(explicit, &existing, |name| env::var(name).ok());
    validate_profile(&merged)?;
    *config.profile_mut_or_default(&profile_name) = merged;

    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save().map_err(CliError::Config)?;
    println!(
        "Profile '{}' initialized at {}",
        profile_name,
        path.display()
    );

    let profile = config
        .profile(&profile_name)
        .ok_or_else(|| CliError::Config("Failed to persist profile".to_string()))?;
    let missing = missing_fields(profile);
    if missing.is_empty() {
        println!("Profile '{profile_name}' is ready. Run `peersync sync`.");
    } else {
        println!(
            "Profile '{}' is missing: {}",
            profile_name,
            missing.join(", ")
        );
    }

    Ok(())
}

pub fn run_config_show(profile_name: Option<&str>) -> Result<(), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let profile = config
        .profile(&profile_name)
        .cloned()
        .unwrap_or_default()
        .with_env_overrides(|name| env::var(name).ok());

    println!("Profile: {profile_name}");
    println!(
        "storage_url: {}",
        profile.storage_url.as_deref().unwrap_or("(unset)")
    );
    println!(
        "auth_token: {}",
        if profile.auth_token.is_some() { "(set)" } else { "(unset)" }
    );
    println!(
        "client_id: {}",
        profile.client_id.as_deref().unwrap_or("(generated on first sync)")
    );
    println!(
        "client_name: {}",
        profile.client_name.as_deref().unwrap_or("(default)")
    );
    Ok(())
}

/// Explicit flags win over environment, which wins over the stored profile.
pub fn merge_profile<F>(explicit: ClientConfig, existing: &ClientConfig, lookup: F) -> ClientConfig
where
    F: Fn(&str) -> Option<String>,
{
    let from_env = ClientConfig::default().with_env_overrides(lookup);
    ClientConfig {
        storage_url: normalize_text_option(explicit.storage_url)
            .or(from_env.storage_url)
            .or_else(|| existing.storage_url.clone()),
        auth_token: normalize_text_option(explicit.auth_token)
            .or(from_env.auth_token)
            .or_else(|| existing.auth_token.clone()),
        client_id: normalize_text_option(explicit.client_id)
            .or(from_env.client_id)
            .or_else(|| existing.client_id.clone()),
        client_name: normalize_text_option(explicit.client_name)
            .or(from_env.client_name)
            .or_else(|| existing.client_name.clone()),
    }
}

fn validate_profile(profile: &ClientConfig) -> Result<(), CliError> {
    if let Some(url) = normalize_text_option(profile.storage_url.clone()) {
        if !is_http_url(&url) {
            return Err(CliError::Config(
                "storage_url must include http:// or https://".to_string(),
            ));
        }
    }
    Ok(())
}

pub fn missing_fields(profile: &ClientConfig) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if normalize_text_option(profile.storage_url.clone()).is_none() {
        missing.push("storage_url");
    }
    if normalize_text_option(profile.auth_token.clone()).is_none() {
        missing.push("auth_token");
    }
    missing
}
