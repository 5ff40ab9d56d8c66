//! Terminal rendering of a transfer session

use crate::poller::PollSnapshot;
use crate::session::SessionView;
use crate::types::TransactionStatus;
use colored::{ColoredString, Colorize};

/// Abbreviate an address as `0x1234...abcd`
///
/// Values too short to abbreviate are returned unchanged.
///
/// # Examples
///
/// ```
/// use tokensend::display::short_address;
///
/// assert_eq!(
///     short_address("0x1234567890abcdef1234567890abcdef12345678"),
///     "0x1234...5678"
/// );
/// assert_eq!(short_address("0x12"), "0x12");
/// ```
pub fn short_address(address: &str) -> String {
    let address = address.trim();
    if address.len() <= 13 || !address.is_ascii() {
        return address.to_string();
    }
    format!("{}...{}", &address[..6], &address[address.len() - 4..])
}

/// Colored status label
pub fn status_label(status: TransactionStatus) -> ColoredString {
    match status {
        TransactionStatus::Pending => status.label().yellow(),
        TransactionStatus::Confirmed => status.label().green(),
        TransactionStatus::Failed => status.label().red(),
        TransactionStatus::Error => status.label().red().bold(),
    }
}

/// Human-readable estimate, always marked as rough
pub fn estimate_label(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("~{:.1}s (rough estimate)", seconds)
    } else if seconds < 3600.0 {
        format!("~{:.1} min (rough estimate)", seconds / 60.0)
    } else {
        format!("~{:.1} h (rough estimate)", seconds / 3600.0)
    }
}

fn or_dash(value: &str) -> String {
    if value.is_empty() {
        "-".dimmed().to_string()
    } else {
        value.to_string()
    }
}

/// Render the whole session as printable lines
pub fn render_session(view: &SessionView) -> String {
    let fields = &view.fields;
    let mut lines = Vec::new();

    let wallet = if !view.has_wallet {
        "no wallet detected".red().to_string()
    } else if view.connected {
        format!("connected as {}", short_address(&fields.sender_address).cyan())
    } else {
        "disconnected".yellow().to_string()
    };
    lines.push(format!("{:<10} {}", "Wallet:".bold(), wallet));
    lines.push(format!("{:<10} {}", "Sender:".bold(), or_dash(&fields.sender_address)));
    lines.push(format!("{:<10} {}", "Recipient:".bold(), or_dash(&fields.recipient_address)));
    lines.push(format!("{:<10} {}", "Amount:".bold(), or_dash(&fields.token_amount)));
    lines.push(format!("{:<10} {}", "Contract:".bold(), or_dash(&fields.contract_address)));

    if let Some(hash) = &fields.transaction_hash {
        lines.push(format!("{:<10} {}", "Tx hash:".bold(), hash.as_str().cyan()));
    }
    if let Some(status) = fields.transaction_status {
        let mut line = format!("{:<10} {}", "Status:".bold(), status_label(status));
        if view.polling {
            line.push_str(&format!(" {}", "(polling)".dimmed()));
        }
        lines.push(line);
    }
    if let Some(seconds) = fields.estimated_seconds {
        lines.push(format!("{:<10} {}", "Estimate:".bold(), estimate_label(seconds)));
    }
    if let Some(error) = &fields.error {
        lines.push(format!("{:<10} {}", "Error:".bold(), error.red()));
    }
    if view.has_wallet && !view.can_submit {
        lines.push(format!("{}", "Run `tokensend connect` before sending.".dimmed()));
    }

    lines.join("\n")
}

/// One-line progress update for `watch`
pub fn render_snapshot(snapshot: &PollSnapshot) -> String {
    let status = snapshot
        .status
        .map(|s| status_label(s).to_string())
        .unwrap_or_else(|| "-".to_string());
    let checked = snapshot
        .checked_at
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string());

    let mut line = format!("[{}] {} (attempt {})", checked, status, snapshot.attempts);
    if let Some(error) = &snapshot.error {
        line.push_str(&format!(": {}", error));
    }
    line
}
