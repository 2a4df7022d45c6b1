//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one identifier per line.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use trajeto_core::{Notification, Priority};

use crate::cli::{ColorMode, OutputFormat};

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    }
}

/// Priority label, colored by urgency when `color` is set.
pub fn priority_label(priority: Priority, color: bool) -> String {
    let label = priority.to_string();
    if !color {
        return label;
    }
    match priority {
        Priority::Critica => label.red().bold().to_string(),
        Priority::Alta => label.yellow().to_string(),
        Priority::Media => label.cyan().to_string(),
        Priority::Baixa => label.dimmed().to_string(),
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable + tabled items in the chosen format.
pub fn render_list<T, R>(
    format: OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            render_table(&rows)
        }
        OutputFormat::Json => render_json_pretty(data),
        OutputFormat::JsonCompact => render_json_compact(data),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => data.iter().map(&id_fn).collect::<Vec<_>>().join("\n"),
    }
}

/// Render a single serde-serializable item in the chosen format.
///
/// Table rendering uses `detail_fn`, since single-item views don't use
/// the `Tabled` derive.
pub fn render_single<T>(
    format: OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize,
{
    match format {
        OutputFormat::Table => detail_fn(data),
        OutputFormat::Json => render_json_pretty(data),
        OutputFormat::JsonCompact => render_json_compact(data),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => id_fn(data),
    }
}

/// One live notification as a single line, for streaming.
///
/// Structured formats emit one compact JSON document per line so the
/// stream stays parseable; YAML emits one document per notification.
pub fn render_notification(format: OutputFormat, notification: &Notification, color: bool) -> String {
    match format {
        OutputFormat::Table => {
            let time = notification.timestamp.format("%H:%M:%S");
            let kind = if color {
                notification.kind.bold().to_string()
            } else {
                notification.kind.clone()
            };
            format!(
                "{time}  {:<8}  {kind}  {}",
                priority_label(notification.priority, color),
                notification.display_text()
            )
        }
        OutputFormat::Json | OutputFormat::JsonCompact => render_json_compact(notification),
        OutputFormat::Yaml => format!("---\n{}", render_yaml(notification).trim_end()),
        OutputFormat::Plain => notification.kind.clone(),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_json_pretty<T: serde::Serialize + ?Sized>(data: &T) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
}

fn render_json_compact<T: serde::Serialize + ?Sized>(data: &T) -> String {
    serde_json::to_string(data).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
}

fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> String {
    serde_yaml::to_string(data).unwrap_or_else(|e| format!("error: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Serialize)]
    struct Item {
        id: &'static str,
    }

    #[derive(Tabled)]
    struct ItemRow {
        #[tabled(rename = "ID")]
        id: String,
    }

    #[test]
    fn plain_lists_one_id_per_line() {
        let items = [Item { id: "a" }, Item { id: "b" }];
        let out = render_list(
            OutputFormat::Plain,
            &items,
            |i| ItemRow { id: i.id.into() },
            |i| i.id.into(),
        );
        assert_eq!(out, "a\nb");
    }

    #[test]
    fn streamed_json_is_single_line() {
        let mut n = Notification::new("embarque", Priority::Alta);
        n.message = Some("Aluno embarcou".into());
        let out = render_notification(OutputFormat::Json, &n, false);
        assert!(!out.contains('\n'));
        assert!(out.contains("\"type\":\"embarque\""));
    }

    #[test]
    fn uncolored_table_line_shows_priority_and_text() {
        let mut n = Notification::new("atraso", Priority::Critica);
        n.title = Some("Van atrasada".into());
        let out = render_notification(OutputFormat::Table, &n, false);
        assert!(out.contains("critica"));
        assert!(out.contains("atraso"));
        assert!(out.ends_with("Van atrasada"));
    }
}
