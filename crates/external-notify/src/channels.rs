//! Destination channel resolution.

use crate::config::NotifyConfig;

/// Channels a message for `event` goes to on `platform`.
///
/// Default channels come first, then the event-specific ones. Duplicates are
/// removed keeping the first occurrence. An unconfigured platform resolves to
/// no channels.
#[must_use]
pub fn resolve_channels(config: &NotifyConfig, platform: &str, event: &str) -> Vec<String> {
    let Some(options) = config.platform(platform) else {
        return vec![];
    };

    let defaults = options.channel.iter().flat_map(|c| c.as_slice());
    let specific = options.events.get(event).into_iter().flat_map(|c| c.as_slice());

    let mut channels: Vec<String> = vec![];
    for channel in defaults.chain(specific) {
        if !channels.contains(channel) {
            channels.push(channel.clone());
        }
    }
    channels
}
