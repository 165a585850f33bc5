// ── Audio object attributes ──
//
// Feeds, mixers and sinks report the same column layout, so they share
// one attribute record.

use serde::Serialize;
use strum::EnumString;

use crate::kind::{Attributes, Patch};

/// Processing state reported in the first info column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, EnumString)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[non_exhaustive]
pub enum AudioState {
    #[default]
    Setup,
    Ready,
    Pending,
    Running,
    Stalled,
    Disconnected,
    /// Token this client does not know yet.
    #[strum(default)]
    Other(String),
}

impl AudioState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Parse a state token; unknown tokens are kept verbatim.
    pub fn from_token(token: &str) -> Self {
        token
            .parse()
            .unwrap_or_else(|_| Self::Other(token.to_owned()))
    }
}

/// Full attribute set of one audio feed, mixer or sink.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AudioAttributes {
    pub name: String,
    pub state: AudioState,
    /// Sample rate in Hz.
    pub rate: u32,
    pub channels: u32,
    pub bytes_per_sample: u32,
    pub signed: bool,
    /// One volume value per channel.
    pub volume: Vec<u32>,
    pub muted: bool,
    pub buffer_size: u32,
    pub delay_ms: u32,
    pub queue_depth: u32,
}

impl AudioAttributes {
    /// Volume of one channel (0-based), if that channel exists.
    pub fn channel_volume(&self, channel: usize) -> Option<u32> {
        self.volume.get(channel).copied()
    }
}

/// Partial update of [`AudioAttributes`]; `None` fields are left alone.
///
/// `state`, `bytes_per_sample`, `signed`, `buffer_size` and `queue_depth`
/// are reported by the server and never rendered into commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AudioPatch {
    pub name: Option<String>,
    pub state: Option<AudioState>,
    pub rate: Option<u32>,
    pub channels: Option<u32>,
    pub bytes_per_sample: Option<u32>,
    pub signed: Option<bool>,
    pub volume: Option<Vec<u32>>,
    pub muted: Option<bool>,
    pub buffer_size: Option<u32>,
    pub delay_ms: Option<u32>,
    pub queue_depth: Option<u32>,
}

impl AudioPatch {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_rate(mut self, rate: u32) -> Self {
        self.rate = Some(rate);
        self
    }

    pub fn with_channels(mut self, channels: u32) -> Self {
        self.channels = Some(channels);
        self
    }

    pub fn with_volume(mut self, volume: Vec<u32>) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn with_muted(mut self, muted: bool) -> Self {
        self.muted = Some(muted);
        self
    }

    pub fn with_delay_ms(mut self, delay_ms: u32) -> Self {
        self.delay_ms = Some(delay_ms);
        self
    }
}

impl Patch for AudioPatch {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn set_name(&mut self, name: String) {
        self.name = Some(name);
    }

    fn absorb(&mut self, newer: Self) {
        overwrite(&mut self.name, newer.name);
        overwrite(&mut self.state, newer.state);
        overwrite(&mut self.rate, newer.rate);
        overwrite(&mut self.channels, newer.channels);
        overwrite(&mut self.bytes_per_sample, newer.bytes_per_sample);
        overwrite(&mut self.signed, newer.signed);
        overwrite(&mut self.volume, newer.volume);
        overwrite(&mut self.muted, newer.muted);
        overwrite(&mut self.buffer_size, newer.buffer_size);
        overwrite(&mut self.delay_ms, newer.delay_ms);
        overwrite(&mut self.queue_depth, newer.queue_depth);
    }

    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Attributes for AudioAttributes {
    type Patch = AudioPatch;

    fn merge(&mut self, patch: AudioPatch) -> AudioPatch {
        let mut changed = AudioPatch::default();
        merge_field(&mut self.name, patch.name, &mut changed.name);
        merge_field(&mut self.state, patch.state, &mut changed.state);
        merge_field(&mut self.rate, patch.rate, &mut changed.rate);
        merge_field(&mut self.channels, patch.channels, &mut changed.channels);
        merge_field(
            &mut self.bytes_per_sample,
            patch.bytes_per_sample,
            &mut changed.bytes_per_sample,
        );
        merge_field(&mut self.signed, patch.signed, &mut changed.signed);
        merge_field(&mut self.volume, patch.volume, &mut changed.volume);
        merge_field(&mut self.muted, patch.muted, &mut changed.muted);
        merge_field(&mut self.buffer_size, patch.buffer_size, &mut changed.buffer_size);
        merge_field(&mut self.delay_ms, patch.delay_ms, &mut changed.delay_ms);
        merge_field(&mut self.queue_depth, patch.queue_depth, &mut changed.queue_depth);
        changed
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn overwrite<T>(slot: &mut Option<T>, newer: Option<T>) {
    if newer.is_some() {
        *slot = newer;
    }
}

/// Store `incoming` if it differs, recording it in `changed`.
fn merge_field<T: Clone + PartialEq>(slot: &mut T, incoming: Option<T>, changed: &mut Option<T>) {
    if let Some(value) = incoming {
        if *slot != value {
            *slot = value.clone();
            *changed = Some(value);
        }
    }
}
