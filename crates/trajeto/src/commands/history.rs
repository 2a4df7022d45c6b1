//! History command handlers.

use tabled::Tabled;
use uuid::Uuid;

use trajeto_core::{HistoryEntry, HistoryStore, JsonFileHistoryStore, NotificationHistory};

use crate::cli::{GlobalOpts, HistoryArgs, HistoryCommand};
use crate::config;
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct EntryRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Received")]
    received: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Priority")]
    priority: String,
    #[tabled(rename = "Message")]
    message: String,
    #[tabled(rename = "Read")]
    read: String,
}

impl From<&HistoryEntry> for EntryRow {
    fn from(e: &HistoryEntry) -> Self {
        let mut id = e.id.to_string();
        id.truncate(8);
        Self {
            id,
            received: e
                .received_at
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M")
                .to_string(),
            kind: e.notification.kind.clone(),
            priority: e.notification.priority.to_string(),
            message: e.notification.display_text().to_owned(),
            read: if e.read { "yes".into() } else { String::new() },
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: HistoryArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load_config_or_default();
    let path = config::history_file(global, &cfg);
    tracing::debug!(path = %path.display(), "Using history file");

    match args.command {
        HistoryCommand::List { unread, limit } => {
            let entries = JsonFileHistoryStore::new(path).load()?;
            let shown: Vec<HistoryEntry> = entries
                .into_iter()
                .filter(|e| !unread || !e.read)
                .take(limit.unwrap_or(usize::MAX))
                .collect();

            let out = output::render_list(
                global.output,
                &shown,
                |e| EntryRow::from(e),
                |e| e.id.to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        HistoryCommand::Read { all: true, .. } => {
            let history = NotificationHistory::new(Box::new(JsonFileHistoryStore::new(path)));
            let marked = history.mark_all_read();
            if !global.quiet {
                eprintln!("Marked {marked} entries as read");
            }
            Ok(())
        }

        HistoryCommand::Read { id, all: false } => {
            let raw = id.ok_or_else(|| CliError::Validation {
                field: "id".into(),
                reason: "pass an entry ID or --all".into(),
            })?;
            let history = NotificationHistory::new(Box::new(JsonFileHistoryStore::new(path)));
            let id = resolve_entry_id(&history.entries(), &raw)?;
            if !history.mark_read(id) {
                return Err(CliError::EntryNotFound { id: raw });
            }
            if !global.quiet {
                eprintln!("Marked {id} as read");
            }
            Ok(())
        }

        HistoryCommand::Clear => {
            if !super::confirm(
                "history clear",
                &format!("Delete every notification in {}?", path.display()),
                global.yes,
            )? {
                return Ok(());
            }
            NotificationHistory::new(Box::new(JsonFileHistoryStore::new(path))).clear();
            if !global.quiet {
                eprintln!("History cleared");
            }
            Ok(())
        }
    }
}

/// A full UUID, or a prefix matching exactly one entry (as shown by `list`).
fn resolve_entry_id(entries: &[HistoryEntry], raw: &str) -> Result<Uuid, CliError> {
    if let Ok(id) = raw.parse::<Uuid>() {
        return Ok(id);
    }

    let prefix = raw.to_ascii_lowercase();
    let mut matches = entries
        .iter()
        .filter(|e| e.id.to_string().starts_with(&prefix));
    match (matches.next(), matches.next()) {
        (Some(entry), None) => Ok(entry.id),
        (Some(_), Some(_)) => Err(CliError::Validation {
            field: "id".into(),
            reason: format!("'{raw}' matches more than one entry"),
        }),
        (None, _) => Err(CliError::EntryNotFound { id: raw.into() }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use trajeto_core::{Notification, Priority};

    use super::*;

    fn entry(id: &str) -> HistoryEntry {
        let mut e = HistoryEntry::new(Notification::new("embarque", Priority::Media));
        e.id = id.parse().unwrap();
        e
    }

    #[test]
    fn short_prefix_resolves_unique_entry() {
        let entries = [
            entry("1b4e28ba-2fa1-11d2-883f-0016d3cca427"),
            entry("9f8e7d6c-2fa1-11d2-883f-0016d3cca427"),
        ];
        let id = resolve_entry_id(&entries, "1B4E28BA").unwrap();
        assert_eq!(id, entries[0].id);
    }

    #[test]
    fn ambiguous_prefix_is_rejected() {
        let entries = [
            entry("1b4e28ba-2fa1-11d2-883f-0016d3cca427"),
            entry("1b4e0000-2fa1-11d2-883f-0016d3cca427"),
        ];
        assert!(matches!(
            resolve_entry_id(&entries, "1b4e"),
            Err(CliError::Validation { .. })
        ));
        assert!(matches!(
            resolve_entry_id(&entries, "ffff"),
            Err(CliError::EntryNotFound { .. })
        ));
    }

    #[test]
    fn row_shortens_id_and_falls_back_to_type() {
        let row = EntryRow::from(&entry("1b4e28ba-2fa1-11d2-883f-0016d3cca427"));
        assert_eq!(row.id, "1b4e28ba");
        assert_eq!(row.message, "embarque");
        assert!(row.read.is_empty());
    }
}
