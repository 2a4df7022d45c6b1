//! CLI configuration: thin wrapper around `trajeto_config`.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--profile, --server, --token, --history-file).

use std::path::PathBuf;

use secrecy::SecretString;

use trajeto_config::{default_history_path, history_path, profile_to_client_config, resolve_token};
use trajeto_core::ClientConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use trajeto_config::{Config, Profile, config_path, load_config_or_default, save_config};

/// Everything `listen` needs to open a session.
#[derive(Debug)]
pub struct ResolvedSession {
    pub profile_name: String,
    pub client: ClientConfig,
    pub token: SecretString,
    pub history_file: PathBuf,
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Comma-separated profile names, for error help text.
pub fn available_profiles(config: &Config) -> String {
    let mut names: Vec<&str> = config.profiles.keys().map(String::as_str).collect();
    if names.is_empty() {
        return "(none)".into();
    }
    names.sort_unstable();
    names.join(", ")
}

/// History file: `--history-file`, then the profile's setting, then the data dir.
pub fn history_file(global: &GlobalOpts, config: &Config) -> PathBuf {
    if let Some(ref path) = global.history_file {
        return path.clone();
    }
    let name = active_profile_name(global, config);
    config.profiles.get(&name).map_or_else(
        || default_history_path(&name),
        |profile| history_path(profile, &name),
    )
}

/// The profile `listen` runs with, after applying `--server`.
///
/// Without any profile, `--server` alone is enough to build one from defaults.
fn effective_profile(global: &GlobalOpts, config: &Config, name: &str) -> Result<Profile, CliError> {
    match (config.profiles.get(name), global.server.as_deref()) {
        (Some(profile), server) => {
            let mut profile = profile.clone();
            if let Some(server) = server {
                server.clone_into(&mut profile.server);
            }
            Ok(profile)
        }
        (None, Some(server)) => Ok(Profile::new(server)),
        (None, None) if global.profile.is_none() && config.profiles.is_empty() => {
            Err(CliError::NoConfig {
                path: config_path().display().to_string(),
            })
        }
        (None, None) => Err(CliError::ProfileNotFound {
            name: name.to_owned(),
            available: available_profiles(config),
        }),
    }
}

/// Build the client config, token and history location for this invocation.
pub fn resolve_session(global: &GlobalOpts, config: &Config) -> Result<ResolvedSession, CliError> {
    let profile_name = active_profile_name(global, config);
    let profile = effective_profile(global, config, &profile_name)?;
    let client = profile_to_client_config(&profile)?;

    let token = match global.token.as_deref().map(str::trim) {
        Some(token) if !token.is_empty() => SecretString::from(token.to_owned()),
        _ => resolve_token(&profile, &profile_name)?,
    };

    let history_file = match global.history_file {
        Some(ref path) => path.clone(),
        None => history_path(&profile, &profile_name),
    };

    Ok(ResolvedSession {
        profile_name,
        client,
        token,
        history_file,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::Parser;
    use secrecy::ExposeSecret;

    use super::*;
    use crate::cli::Cli;

    fn global(args: &[&str]) -> GlobalOpts {
        let mut argv = vec!["trajeto"];
        argv.extend_from_slice(args);
        argv.push("listen");
        Cli::try_parse_from(argv).unwrap().global
    }

    #[test]
    fn server_flag_alone_builds_a_session() {
        let global = global(&["--server", "wss://app.example.com/ws", "--token", "abc"]);
        let session = resolve_session(&global, &Config::default()).unwrap();

        assert_eq!(session.profile_name, "default");
        assert_eq!(session.client.server_url.as_str(), "wss://app.example.com/ws");
        assert_eq!(session.token.expose_secret(), "abc");
    }

    #[test]
    fn server_flag_overrides_profile() {
        let mut config = Config::default();
        let mut profile = Profile::new("wss://old.example.com/ws");
        profile.max_reconnect_attempts = 3;
        config.profiles.insert("escola".into(), profile);

        let global = global(&[
            "--profile",
            "escola",
            "--server",
            "ws://localhost:4000/ws",
            "--token",
            "t",
            "--history-file",
            "/tmp/h.json",
        ]);
        let session = resolve_session(&global, &config).unwrap();

        assert_eq!(session.client.server_url.as_str(), "ws://localhost:4000/ws");
        assert_eq!(session.client.max_reconnect_attempts, 3);
        assert_eq!(session.history_file, PathBuf::from("/tmp/h.json"));
    }

    #[test]
    fn unknown_profile_lists_available_ones() {
        let mut config = Config::default();
        config
            .profiles
            .insert("b".into(), Profile::new("wss://b.example.com/ws"));
        config
            .profiles
            .insert("a".into(), Profile::new("wss://a.example.com/ws"));

        let err = resolve_session(&global(&["--profile", "zz"]), &config).unwrap_err();
        assert!(
            matches!(err, CliError::ProfileNotFound { ref available, .. } if available == "a, b")
        );
    }

    #[test]
    fn nothing_configured_points_at_config_init() {
        let err = resolve_session(&global(&[]), &Config::default()).unwrap_err();
        assert!(matches!(err, CliError::NoConfig { .. }));
    }

    #[test]
    fn history_flag_wins_without_profile() {
        let global = global(&["--history-file", "/tmp/x.json"]);
        assert_eq!(
            history_file(&global, &Config::default()),
            PathBuf::from("/tmp/x.json")
        );
    }
}
