//! Standard notifications for content workflow events.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::binder::{EventBus, MessageTemplate};
use crate::format::{Document, FormatArg};
use crate::Dispatcher;

pub const AFTER_COMMIT: &str = "apostrophe-workflow:afterCommit";
pub const AFTER_EXPORT: &str = "apostrophe-workflow:afterExport";
pub const AFTER_FORCE_EXPORT: &str = "apostrophe-workflow:afterForceExport";

const DRAFT_SUFFIX: &str = "-draft";

#[derive(Debug, Deserialize)]
struct CommitPayload {
    from: Document,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportPayload {
    from: Document,
    #[serde(default)]
    to_locales: Vec<String>,
}

/// Map a draft locale to its live counterpart (`en-draft` becomes `en`).
#[must_use]
pub fn liveify(locale: &str) -> &str {
    locale.strip_suffix(DRAFT_SUFFIX).unwrap_or(locale)
}

fn live_locale(doc: &Document) -> FormatArg {
    doc.workflow_locale
        .as_deref()
        .map(liveify)
        .map_or(FormatArg::Missing, FormatArg::from)
}

fn parse<T: DeserializeOwned>(event: &str, payload: &Value) -> Option<T> {
    match serde_json::from_value(payload.clone()) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            debug!(event, error = %e, "Unexpected workflow payload");
            None
        }
    }
}

fn commit_template(payload: &Value) -> Option<MessageTemplate> {
    let CommitPayload { from } = parse(AFTER_COMMIT, payload)?;
    Some(
        MessageTemplate::new("{user} committed the {type} {title} in {string}")
            .arg(&from)
            .arg(&from)
            .arg(live_locale(&from)),
    )
}

fn export_template(event: &str, verb: &str, payload: &Value) -> Option<MessageTemplate> {
    let ExportPayload { from, to_locales } = parse(event, payload)?;
    let to: Vec<String> = to_locales.iter().map(|l| liveify(l).to_string()).collect();
    Some(
        MessageTemplate::new(format!(
            "{{user}} {verb} the {{type}} {{title}} from {{string}} to {{string}}"
        ))
        .arg(&from)
        .arg(&from)
        .arg(live_locale(&from))
        .arg(to),
    )
}

/// Subscribe the standard commit, export and force-export notifications.
pub fn bind_workflow_events<B: EventBus + ?Sized>(dispatcher: &Dispatcher, bus: &B) {
    dispatcher.notify_on(bus, AFTER_COMMIT, |_, payload| commit_template(payload));
    dispatcher.notify_on(bus, AFTER_EXPORT, |_, payload| {
        export_template(AFTER_EXPORT, "exported", payload)
    });
    dispatcher.notify_on(bus, AFTER_FORCE_EXPORT, |_, payload| {
        export_template(AFTER_FORCE_EXPORT, "force-exported", payload)
    });
}
