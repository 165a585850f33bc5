// Audio feed / mixer / sink codec.
//
// Info detail layout, shared by all three kinds:
//   state, rate, channels, bytespersample, signess, volume x channels,
//   mute, buffersize, delay, queue
// The volume run is as long as the channel count.

use tracing::warn;

use crate::kind::CommandPlan;
use crate::model::{AudioPatch, AudioState, MixerSource};

/// Render a pending change. Only client-settable fields produce commands.
pub(crate) fn render(tag: &str, id: u32, pending: &AudioPatch, on_server: bool) -> CommandPlan {
    let create = if on_server {
        if let Some(name) = &pending.name {
            warn!(kind = tag, id, %name, "server objects cannot be renamed; keeping name local");
        }
        None
    } else {
        let name = pending
            .name
            .clone()
            .unwrap_or_else(|| format!("{}_{id}", tag.replace(' ', "_")));
        Some(format!("{tag} add {id} {name}"))
    };

    let mut updates = Vec::new();
    if let Some(channels) = pending.channels {
        updates.push(format!("{tag} channels {id} {channels}"));
    }
    if let Some(rate) = pending.rate {
        updates.push(format!("{tag} rate {id} {rate}"));
    }
    if let Some(volume) = pending.volume.as_ref().filter(|v| !v.is_empty()) {
        let levels: Vec<String> = volume.iter().map(ToString::to_string).collect();
        updates.push(format!("{tag} volume {id} {}", levels.join(" ")));
    }
    if let Some(muted) = pending.muted {
        let flag = if muted { "on" } else { "off" };
        updates.push(format!("{tag} mute {flag} {id}"));
    }
    if let Some(delay) = pending.delay_ms {
        updates.push(format!("{tag} delay {id} {delay}"));
    }

    CommandPlan { create, updates }
}

/// `add` with an id and no name removes the object.
pub(crate) fn render_delete(tag: &str, id: u32) -> Vec<String> {
    vec![format!("{tag} add {id}")]
}

pub(crate) fn render_start(tag: &str, id: u32) -> String {
    format!("{tag} start {id}")
}

pub(crate) fn render_stop(tag: &str, id: u32) -> String {
    format!("{tag} stop {id}")
}

pub(crate) fn render_source(mixer_id: u32, source: MixerSource) -> String {
    format!("audio mixer source {} {mixer_id} {}", source.kind, source.id)
}

/// Parse the comma-separated field list of one detail line.
///
/// Fields beyond the known layout are ignored so newer servers can append
/// columns. Anything missing or non-numeric rejects the whole line.
pub(crate) fn parse_detail(fields: &str) -> Option<AudioPatch> {
    let mut it = fields.split(',').map(str::trim);

    let state = AudioState::from_token(it.next().filter(|s| !s.is_empty())?);
    let rate = it.next()?.parse().ok()?;
    let channels: u32 = it.next()?.parse().ok()?;
    let bytes_per_sample = it.next()?.parse().ok()?;
    let signed = it.next()? == "signed";

    let mut volume = Vec::new();
    for _ in 0..channels {
        volume.push(it.next()?.parse().ok()?);
    }

    // Anything other than the literal `unmuted` counts as muted.
    let muted = it.next()? != "unmuted";
    let buffer_size = it.next()?.parse().ok()?;
    let delay_ms = it.next()?.parse().ok()?;
    let queue_depth = it.next()?.parse().ok()?;

    Some(AudioPatch {
        name: None,
        state: Some(state),
        rate: Some(rate),
        channels: Some(channels),
        bytes_per_sample: Some(bytes_per_sample),
        signed: Some(signed),
        volume: Some(volume),
        muted: Some(muted),
        buffer_size: Some(buffer_size),
        delay_ms: Some(delay_ms),
        queue_depth: Some(queue_depth),
    })
}
