//! Config subcommand handlers.

use std::io::IsTerminal;

use dialoguer::{Confirm, Input, Password, Select};
use tabled::Tabled;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

const REDACTED: &str = "****";

/// Copy of `cfg` with plaintext tokens masked.
fn redacted(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    for profile in cfg.profiles.values_mut() {
        if profile.token.is_some() {
            profile.token = Some(REDACTED.into());
        }
    }
    cfg
}

/// TOML-like view of the config, masking tokens, with profiles sorted.
fn format_config_redacted(cfg: &Config) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);

    let mut names: Vec<_> = cfg.profiles.keys().collect();
    names.sort();
    for name in names {
        let p = &cfg.profiles[name];
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "server = \"{}\"", p.server);
        if let Some(ref poll) = p.poll_url {
            let _ = writeln!(out, "poll_url = \"{poll}\"");
        }
        if p.token.is_some() {
            let _ = writeln!(out, "token = \"{REDACTED}\"");
        }
        if let Some(ref env) = p.token_env {
            let _ = writeln!(out, "token_env = \"{env}\"");
        }
        let _ = writeln!(out, "reconnect_interval_ms = {}", p.reconnect_interval_ms);
        let _ = writeln!(out, "max_reconnect_attempts = {}", p.max_reconnect_attempts);
        let _ = writeln!(out, "heartbeat_interval_ms = {}", p.heartbeat_interval_ms);
        let _ = writeln!(out, "fallback_enabled = {}", p.fallback_enabled);
        let _ = writeln!(out, "fallback_interval_ms = {}", p.fallback_interval_ms);
        if p.debug {
            let _ = writeln!(out, "debug = true");
        }
        if let Some(ref path) = p.history_file {
            let _ = writeln!(out, "history_file = \"{}\"", path.display());
        }
    }

    out
}

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn require_terminal(command: &str) -> Result<(), CliError> {
    if std::io::stdin().is_terminal() {
        Ok(())
    } else {
        Err(CliError::Validation {
            field: "interactive".into(),
            reason: format!("`trajeto config {command}` needs an interactive terminal"),
        })
    }
}

fn prompt_token() -> Result<String, CliError> {
    let token = Password::new()
        .with_prompt("Session token")
        .interact()
        .map_err(prompt_err)?;
    if token.trim().is_empty() {
        return Err(CliError::Validation {
            field: "token".into(),
            reason: "token cannot be empty".into(),
        });
    }
    Ok(token)
}

/// Where `config init` should keep the token.
enum TokenStorage {
    Keyring(String),
    Plaintext(String),
    Env(String),
    Later,
}

fn prompt_token_storage() -> Result<TokenStorage, CliError> {
    let choices = &[
        "Store in system keyring (recommended)",
        "Read from an environment variable",
        "Save to config file (plaintext)",
        "Skip for now",
    ];
    let selection = Select::new()
        .with_prompt("Where should the session token come from?")
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    Ok(match selection {
        0 => TokenStorage::Keyring(prompt_token()?),
        1 => TokenStorage::Env(
            Input::new()
                .with_prompt("Environment variable name")
                .default(trajeto_config::TOKEN_ENV.into())
                .interact_text()
                .map_err(prompt_err)?,
        ),
        2 => TokenStorage::Plaintext(prompt_token()?),
        _ => TokenStorage::Later,
    })
}

fn profile_not_found(cfg: &Config, name: String) -> CliError {
    CliError::ProfileNotFound {
        name,
        available: config::available_profiles(cfg),
    }
}

// ── Profiles table ──────────────────────────────────────────────────

#[derive(serde::Serialize)]
struct ProfileSummary {
    name: String,
    server: String,
    default: bool,
}

#[derive(Tabled)]
struct ProfileRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Server")]
    server: String,
    #[tabled(rename = "Default")]
    default: String,
}

impl From<&ProfileSummary> for ProfileRow {
    fn from(p: &ProfileSummary) -> Self {
        Self {
            name: p.name.clone(),
            server: p.server.clone(),
            default: if p.default { "*".into() } else { String::new() },
        }
    }
}

fn profile_summaries(cfg: &Config) -> Vec<ProfileSummary> {
    let default = cfg.default_profile.as_deref().unwrap_or("default");
    let mut summaries: Vec<ProfileSummary> = cfg
        .profiles
        .iter()
        .map(|(name, p)| ProfileSummary {
            name: name.clone(),
            server: p.server.clone(),
            default: name == default,
        })
        .collect();
    summaries.sort_by(|a, b| a.name.cmp(&b.name));
    summaries
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init(global),

        ConfigCommand::Show => {
            let cfg = redacted(&config::load_config_or_default());
            let out = output::render_single(
                global.output,
                &cfg,
                format_config_redacted,
                format_config_redacted,
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            println!("{}", config::config_path().display());
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            if cfg.profiles.is_empty() {
                if !global.quiet {
                    eprintln!("No profiles configured. Run: trajeto config init");
                }
                return Ok(());
            }
            let summaries = profile_summaries(&cfg);
            let out = output::render_list(
                global.output,
                &summaries,
                |p| ProfileRow::from(p),
                |p| p.name.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();
            if !cfg.profiles.contains_key(&name) {
                return Err(profile_not_found(&cfg, name));
            }
            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            if !global.quiet {
                eprintln!("✓ Default profile set to '{name}'");
            }
            Ok(())
        }

        ConfigCommand::SetToken { profile } => {
            let cfg = config::load_config_or_default();
            let name = profile.unwrap_or_else(|| config::active_profile_name(global, &cfg));
            if !cfg.profiles.contains_key(&name) {
                return Err(profile_not_found(&cfg, name));
            }
            require_terminal("set-token")?;
            trajeto_config::store_token(&name, &prompt_token()?)?;
            if !global.quiet {
                eprintln!("✓ Token for '{name}' stored in system keyring");
            }
            Ok(())
        }
    }
}

/// Interactive wizard: adds (or replaces) one profile in the config file.
fn init(global: &GlobalOpts) -> Result<(), CliError> {
    require_terminal("init")?;
    let config_path = config::config_path();
    eprintln!("Trajeto configuration wizard");
    eprintln!("   Config path: {}\n", config_path.display());

    let mut cfg = config::load_config_or_default();

    // 1. Profile name
    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default(config::active_profile_name(global, &cfg))
        .interact_text()
        .map_err(prompt_err)?;

    if cfg.profiles.contains_key(&profile_name)
        && !Confirm::new()
            .with_prompt(format!("Profile '{profile_name}' exists. Replace it?"))
            .default(false)
            .interact()
            .map_err(prompt_err)?
    {
        return Ok(());
    }

    // 2. Server URL, validated the same way `listen` will read it
    let server: String = Input::new()
        .with_prompt("Real-time server URL")
        .with_initial_text("wss://")
        .interact_text()
        .map_err(prompt_err)?;
    let mut profile = Profile::new(server.trim());
    trajeto_config::profile_to_client_config(&profile)?;

    // 3. Token
    match prompt_token_storage()? {
        TokenStorage::Keyring(token) => {
            trajeto_config::store_token(&profile_name, &token)?;
            eprintln!("   ✓ Token stored in system keyring");
        }
        TokenStorage::Plaintext(token) => profile.token = Some(token),
        TokenStorage::Env(var) => profile.token_env = Some(var),
        TokenStorage::Later => {
            eprintln!("   Set one later with: trajeto config set-token --profile {profile_name}");
        }
    }

    // 4. Fallback polling
    profile.fallback_enabled = Confirm::new()
        .with_prompt("Poll over HTTP when the real-time channel is down?")
        .default(true)
        .interact()
        .map_err(prompt_err)?;

    // 5. Write config
    let first = cfg.profiles.is_empty();
    cfg.profiles.insert(profile_name.clone(), profile);
    if first || cfg.default_profile.is_none() {
        cfg.default_profile = Some(profile_name.clone());
    }
    let path = config::save_config(&cfg)?;

    eprintln!("\n✓ Configuration written to {}", path.display());
    eprintln!("  Profile: {profile_name}");
    eprintln!("\n  Try it: trajeto listen --profile {profile_name} --show-events");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        let mut cfg = Config::default();
        let mut escola = Profile::new("wss://escola.example.com/ws");
        escola.token = Some("very-secret".into());
        cfg.profiles.insert("escola".into(), escola);
        cfg.profiles
            .insert("default".into(), Profile::new("ws://localhost:4000/ws"));
        cfg
    }

    #[test]
    fn tokens_never_reach_the_display() {
        let cfg = sample();
        let text = format_config_redacted(&cfg);
        assert!(!text.contains("very-secret"));
        assert!(text.contains("token = \"****\""));
        assert!(text.find("[profiles.default]") < text.find("[profiles.escola]"));

        let masked = redacted(&cfg);
        assert_eq!(masked.profiles["escola"].token.as_deref(), Some(REDACTED));
        assert_eq!(masked.profiles["default"].token, None);
    }

    #[test]
    fn summaries_mark_the_default_profile() {
        let summaries = profile_summaries(&sample());
        let names: Vec<_> = summaries.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["default", "escola"]);
        assert!(summaries[0].default);
        assert!(!summaries[1].default);
    }
}
