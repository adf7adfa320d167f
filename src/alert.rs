use crate::model::units::{commify, format_units};
use crate::model::{Alert, AlertLevel, FetchState};
use crate::session::Session;
use chrono::Utc;
use uuid::Uuid;

/// Compare the session before and after a fetch cycle and describe what the
/// user should notice. Snapshots of different watched addresses are only
/// checked for new failures.
pub fn check_alerts(previous: &Session, current: &Session) -> Vec<Alert> {
    let mut alerts = Vec::new();

    check_failure(&mut alerts, "Balance", &previous.balance, &current.balance);
    check_failure(&mut alerts, "Vault", &previous.vault, &current.vault);
    check_failure(&mut alerts, "Position", &previous.position, &current.position);

    if previous.generation() != current.generation() {
        if let Some(position) = current.position.ready() {
            if position.summary.net_return.is_negative() {
                alerts.push(create_alert(
                    AlertLevel::Warning,
                    "Net Return",
                    "Position is currently at a loss".to_string(),
                ));
            }
        }
        return alerts;
    }

    if let (Some(before), Some(after)) = (previous.vault.ready(), current.vault.ready()) {
        if after.share_price < before.share_price {
            alerts.push(create_alert(
                AlertLevel::Critical,
                "Share Price",
                format!(
                    "{} share price fell from {} to {}",
                    after.name,
                    commify(&format_units(before.share_price, before.decimals)),
                    commify(&format_units(after.share_price, after.decimals)),
                ),
            ));
        }
    }

    if let Some(after) = current.position.ready() {
        let before = previous.position.ready();

        let was_negative = before.map(|p| p.summary.net_return.is_negative()).unwrap_or(false);
        if after.summary.net_return.is_negative() && !was_negative {
            alerts.push(create_alert(
                AlertLevel::Warning,
                "Net Return",
                "Position is currently at a loss".to_string(),
            ));
        }

        if let Some(before) = before {
            if after.records.len() > before.records.len() {
                alerts.push(create_alert(
                    AlertLevel::Info,
                    "Deposits",
                    format!("{} new deposit(s) found", after.records.len() - before.records.len()),
                ));
            }
        }

        let skipped_before = before.map(|p| p.skipped).unwrap_or(0);
        if after.skipped > 0 && after.skipped != skipped_before {
            alerts.push(create_alert(
                AlertLevel::Info,
                "Ledger",
                format!("{} incoming share transfer(s) are not deposits and were left out", after.skipped),
            ));
        }
    }

    alerts
}

/// Critical alerts appended after the alert with id `last_seen`, oldest first.
/// With no `last_seen`, or one already trimmed away, every critical alert counts.
pub fn unseen_critical<'a>(alerts: &'a [Alert], last_seen: Option<&str>) -> Vec<&'a Alert> {
    let mut fresh: Vec<&Alert> = alerts
        .iter()
        .rev()
        .take_while(|a| Some(a.id.as_str()) != last_seen)
        .filter(|a| a.level == AlertLevel::Critical)
        .collect();
    fresh.reverse();
    fresh
}

fn check_failure<T>(alerts: &mut Vec<Alert>, topic: &str, previous: &FetchState<T>, current: &FetchState<T>) {
    if let FetchState::Failed(reason) = current {
        if !previous.is_failed() {
            alerts.push(create_alert(
                AlertLevel::Warning,
                topic,
                format!("Fetch failed: {}", reason),
            ));
        }
    }
}

fn create_alert(level: AlertLevel, topic: &str, message: String) -> Alert {
    Alert {
        id: Uuid::new_v4().to_string(),
        level,
        topic: topic.to_string(),
        message,
        timestamp: Utc::now(),
    }
}
