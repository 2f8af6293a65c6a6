//! User-facing notification text for each lifecycle stage.

use std::time::Duration;

use crate::domain::{ErrorKind, NotificationMessage, TransactionHandle};

pub fn submitting(label: &str) -> NotificationMessage {
    NotificationMessage::new(format!("Submitting {}", label))
        .with_description("Preparing transaction")
}

pub fn awaiting_approval(label: &str, address: Option<&str>) -> NotificationMessage {
    let message = NotificationMessage::new(format!("Confirm {} in your wallet", label));
    match address {
        Some(address) => message.with_description(format!("Waiting for approval from {}", address)),
        None => message.with_description("Waiting for wallet approval"),
    }
}

pub fn confirming(label: &str, handle: &TransactionHandle) -> NotificationMessage {
    NotificationMessage::new(format!("Confirming {}", label)).with_description(format!(
        "Transaction {} submitted, waiting for confirmation",
        handle.short()
    ))
}

pub fn confirmed(label: &str, correlation_hash: &str) -> NotificationMessage {
    NotificationMessage::new(format!("{} confirmed", label))
        .with_description(format!("Transaction hash: {}", correlation_hash))
}

/// Headline is the kind's; the original failure message is kept verbatim
pub fn failed(label: &str, kind: ErrorKind, raw_message: &str) -> NotificationMessage {
    NotificationMessage::new(kind.headline()).with_description(format!("{}: {}", label, raw_message))
}

pub fn timed_out(label: &str, waited: Duration) -> NotificationMessage {
    NotificationMessage::new(format!("{} is taking longer than expected", label)).with_description(
        format!(
            "No confirmation after {}. The transaction may still complete; check again later.",
            format_wait(waited)
        ),
    )
}

/// Whole seconds as `30s`, anything finer as `1500ms`
fn format_wait(waited: Duration) -> String {
    let millis = waited.as_millis();
    if millis % 1000 == 0 {
        format!("{}s", millis / 1000)
    } else {
        format!("{}ms", millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_keeps_original_message() {
        let message = failed(
            "Register battery",
            ErrorKind::ValidationFailed,
            "execution reverted: Battery does not exist",
        );
        assert_eq!(message.title, ErrorKind::ValidationFailed.headline());
        assert_eq!(
            message.description.as_deref(),
            Some("Register battery: execution reverted: Battery does not exist")
        );
    }

    #[test]
    fn test_confirmed_retains_label() {
        let message = confirmed("Register battery NV-1", "0xabc");
        assert_eq!(message.title, "Register battery NV-1 confirmed");
    }

    #[test]
    fn test_timed_out_reports_wait() {
        let message = timed_out("Register battery", Duration::from_secs(30));
        assert!(message.description.unwrap().contains("30s"));
    }

    #[test]
    fn test_timed_out_keeps_sub_second_precision() {
        let description = timed_out("Register", Duration::from_millis(500)).description.unwrap();
        assert!(description.contains("after 500ms"), "{}", description);

        let description = timed_out("Register", Duration::from_millis(1500)).description.unwrap();
        assert!(description.contains("after 1500ms"), "{}", description);

        assert_eq!(format_wait(Duration::from_secs(2)), "2s");
    }
}
