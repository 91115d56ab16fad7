use colored::Colorize;

use crate::app::UIConfig;
use crate::session::{ConversationEntry, MessageLog, Role, Turn};

/// One turn as a terminal line
pub fn format_turn(turn: &Turn, ui: &UIConfig) -> String {
    if turn.is_placeholder() {
        return format!("[{}] {}", turn.role.label(), ui.placeholder_text)
            .dimmed()
            .to_string();
    }

    let label = match turn.role {
        Role::User => format!("[{}]", turn.role.label()).cyan().bold(),
        Role::Assistant => format!("[{}]", turn.role.label()).green().bold(),
    };
    if ui.show_turn_ids {
        format!("{} {} {}", label, turn.id.dimmed(), turn.content)
    } else {
        format!("{} {}", label, turn.content)
    }
}

pub fn format_log(log: &MessageLog, ui: &UIConfig) -> String {
    if log.is_empty() {
        return "(empty conversation)".dimmed().to_string();
    }
    log.iter()
        .map(|turn| format_turn(turn, ui))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Numbered listing, newest first, with the active entry marked
pub fn format_conversation_list(entries: &[ConversationEntry], active_id: Option<&str>) -> String {
    if entries.is_empty() {
        return "No conversations yet.".to_string();
    }
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let marker = if Some(entry.id.as_str()) == active_id {
                "*"
            } else {
                " "
            };
            format!("{} {:>2}. {}", marker, i + 1, entry.summary())
        })
        .collect::<Vec<_>>()
        .join("\n")
}
