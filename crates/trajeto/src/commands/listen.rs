//! `listen`: stream live notifications to stdout until interrupted.
//!
//! Notifications arrive through registry subscriptions (one per
//! `--type`, or the generic kind). Lifecycle events come from the
//! broadcast stream and go to stderr; a session that ends on its own
//! (auth rejected, forced disconnect, nothing left to fall back to)
//! turns into an error exit.

use std::sync::Arc;
use std::time::Duration;

use owo_colors::OwoColorize;
use secrecy::ExposeSecret;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;

use trajeto_core::{
    ClientEvent, ConfigOverrides, ConnectionState, EventKind, JsonFileHistoryStore, Notification,
    Priority, RealtimeClient,
};

use crate::cli::{GlobalOpts, ListenArgs, PriorityArg};
use crate::config;
use crate::error::CliError;
use crate::notifier::TerminalNotifier;
use crate::output;

pub async fn handle(args: ListenArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load_config_or_default();
    let session = config::resolve_session(global, &cfg)?;
    let color = output::should_color(global.color);

    tracing::debug!(
        profile = %session.profile_name,
        history = %session.history_file.display(),
        "Resolved listen session"
    );

    let client = RealtimeClient::builder(session.client)
        .with_notifier(Arc::new(TerminalNotifier::new(color, !args.no_bell)))
        .with_history_store(Box::new(JsonFileHistoryStore::new(session.history_file)))
        .build();

    let (tx, mut notifications) = mpsc::unbounded_channel();
    subscribe(&client, &args.kinds, &tx)?;
    let mut events = client.events();
    let mut state = client.connection_state();

    let connected = client
        .initialize_with(session.token.expose_secret(), &overrides(&args))
        .await?;
    if !connected && !global.quiet {
        status(color, "initial connection failed, retrying in the background");
    }
    state.borrow_and_update();

    let min_priority = args.min_priority.map(priority);
    let mut shown = 0usize;
    let mut last_reason: Option<String> = None;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let outcome = loop {
        tokio::select! {
            biased;

            _ = &mut ctrl_c => break Ok(()),

            Some(notification) = notifications.recv() => {
                if min_priority.is_some_and(|min| notification.priority < min) {
                    continue;
                }
                let line = output::render_notification(global.output, &notification, color);
                output::print_output(&line, global.quiet);
                shown += 1;
                if args.count.is_some_and(|limit| shown >= limit) {
                    break Ok(());
                }
            }

            event = events.recv() => match event {
                Ok(ClientEvent::AuthFailed { reason }) => {
                    break Err(CliError::AuthFailed {
                        profile: session.profile_name.clone(),
                        reason,
                    });
                }
                Ok(event) => {
                    match event {
                        ClientEvent::Disconnected { ref reason, .. } => {
                            last_reason = Some(reason.clone());
                        }
                        ClientEvent::Error { ref message } => last_reason = Some(message.clone()),
                        _ => {}
                    }
                    if let Some(line) = describe(&event, args.show_events).filter(|_| !global.quiet) {
                        status(color, &line);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event stream lagged");
                }
                Err(RecvError::Closed) => break Ok(()),
            },

            Ok(()) = state.changed() => {
                if *state.borrow_and_update() == ConnectionState::Disconnected {
                    break Err(CliError::SessionEnded {
                        reason: last_reason.take().unwrap_or_else(|| "disconnected".into()),
                    });
                }
            }
        }
    };

    client.disconnect().await;

    let stats = client.get_stats();
    tracing::debug!(
        received = stats.messages_received,
        reconnections = stats.reconnections,
        errors = stats.errors,
        "Listen finished"
    );
    if !global.quiet && args.show_events {
        status(
            color,
            &format!("{shown} shown, {} unread in history", client.unread_count()),
        );
    }

    outcome
}

/// Forward matching notifications into `tx`.
fn subscribe(
    client: &RealtimeClient,
    kinds: &[String],
    tx: &mpsc::UnboundedSender<Arc<Notification>>,
) -> Result<(), CliError> {
    let forward = {
        let tx = tx.clone();
        move |event: &ClientEvent| {
            if let ClientEvent::Notification(n) = event {
                let _ = tx.send(Arc::clone(n));
            }
        }
    };

    if kinds.is_empty() {
        client.on(EventKind::Notification, forward);
        return Ok(());
    }

    let mut kinds = kinds.to_vec();
    kinds.sort_unstable();
    kinds.dedup();
    for kind in kinds {
        client
            .on_named(&format!("notification:{kind}"), forward.clone())
            .map_err(|e| CliError::Validation {
                field: "type".into(),
                reason: e.to_string(),
            })?;
    }
    Ok(())
}

fn overrides(args: &ListenArgs) -> ConfigOverrides {
    ConfigOverrides {
        max_reconnect_attempts: args.max_reconnect_attempts,
        heartbeat_interval: args.heartbeat.map(Duration::from_secs),
        fallback_enabled: args.no_fallback.then_some(false),
        debug: args.debug.then_some(true),
        ..ConfigOverrides::default()
    }
}

fn priority(arg: PriorityArg) -> Priority {
    match arg {
        PriorityArg::Baixa => Priority::Baixa,
        PriorityArg::Media => Priority::Media,
        PriorityArg::Alta => Priority::Alta,
        PriorityArg::Critica => Priority::Critica,
    }
}

/// Status line for a lifecycle event. Server announcements are always
/// shown; connection churn only with `--show-events`.
fn describe(event: &ClientEvent, verbose: bool) -> Option<String> {
    let announcement = |payload: &Value, fallback: &str| {
        payload
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or(fallback)
            .to_owned()
    };

    match event {
        ClientEvent::Maintenance(payload) => Some(format!(
            "maintenance: {}",
            announcement(payload, "the server is entering maintenance")
        )),
        ClientEvent::UpdateAvailable(payload) => Some(format!(
            "update available: {}",
            announcement(payload, "a new version is available")
        )),
        _ if !verbose => None,
        ClientEvent::Connected { reconnected: false } => Some("connected".into()),
        ClientEvent::Connected { reconnected: true } => Some("reconnected".into()),
        ClientEvent::Disconnected { code, reason } => Some(match code {
            Some(code) => format!("disconnected ({code}): {reason}"),
            None => format!("disconnected: {reason}"),
        }),
        ClientEvent::Error { message } => Some(format!("error: {message}")),
        ClientEvent::AuthSuccess(_) => Some("authenticated".into()),
        ClientEvent::FallbackStarted => Some("channel unavailable, polling for notifications".into()),
        ClientEvent::FallbackStopped => Some("real-time channel restored".into()),
        ClientEvent::Message(_) | ClientEvent::Notification(_) | ClientEvent::AuthFailed { .. } => {
            None
        }
    }
}

fn status(color: bool, line: &str) {
    if color {
        eprintln!("{} {line}", "trajeto:".dimmed());
    } else {
        eprintln!("trajeto: {line}");
    }
}
