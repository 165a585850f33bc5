// ── Object kinds ──
//
// A `Kind` is the capability set a collection needs for one type of
// server object: its wire tag, its attribute record, how pending changes
// become commands, and how one info detail line becomes a patch.
// Collections and entities are generic over it; nothing in them knows
// which kind they hold.

use std::fmt::Debug;

use crate::codec::audio;
use crate::model::{AudioAttributes, AudioPatch};

/// Partial update of an attribute record.
pub trait Patch: Clone + Debug + Default + PartialEq + Send + Sync + 'static {
    fn name(&self) -> Option<&str>;
    fn set_name(&mut self, name: String);
    /// Fold a newer patch into this one; fields set in `newer` win.
    fn absorb(&mut self, newer: Self);
    fn is_empty(&self) -> bool;
}

/// Full attribute record of one object.
pub trait Attributes: Clone + Debug + Default + PartialEq + Send + Sync + 'static {
    type Patch: Patch;

    /// Field-by-field merge. Returns the fields that actually changed.
    fn merge(&mut self, patch: Self::Patch) -> Self::Patch;
    fn name(&self) -> &str;
}

pub type PatchOf<K> = <<K as Kind>::Attributes as Attributes>::Patch;

/// Whether an attribute change is a local edit or server truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tracking {
    /// Local edit: an actual change marks the entity dirty.
    Track,
    /// Server-reported state: never marks the entity dirty.
    Authoritative,
}

/// Commands that push one pending change to the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandPlan {
    /// Creates the object; present only when the server does not hold it yet.
    pub create: Option<String>,
    /// Setter commands, one per changed field group.
    pub updates: Vec<String>,
}

impl CommandPlan {
    pub fn is_empty(&self) -> bool {
        self.create.is_none() && self.updates.is_empty()
    }

    pub fn len(&self) -> usize {
        usize::from(self.create.is_some()) + self.updates.len()
    }

    /// All commands in send order.
    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.create
            .iter()
            .chain(self.updates.iter())
            .map(String::as_str)
    }
}

/// Capability set of one server object kind.
pub trait Kind: Send + Sync + 'static {
    /// Wire tag, e.g. `audio mixer`.
    const TAG: &'static str;

    type Attributes: Attributes;

    /// Render the pending change of object `id`.
    fn render(id: u32, pending: &PatchOf<Self>, on_server: bool) -> CommandPlan;

    fn render_delete(id: u32) -> Vec<String>;

    /// Parse the field list of one info detail line.
    /// `None` when the line does not have the layout this kind expects.
    fn parse_detail(fields: &str) -> Option<PatchOf<Self>>;

    /// Name given to objects created without one.
    fn default_name(id: u32) -> String {
        format!("{}_{id}", Self::TAG.replace(' ', "_"))
    }
}

/// Kinds that share the audio column layout and command set.
pub trait AudioKind: Kind<Attributes = AudioAttributes> {}

/// `audio feed`: an audio input.
#[derive(Debug)]
pub struct AudioFeed;

/// `audio mixer`: combines feeds (and other mixers) into one stream.
#[derive(Debug)]
pub struct AudioMixer;

/// `audio sink`: an audio output.
#[derive(Debug)]
pub struct AudioSink;

impl Kind for AudioFeed {
    const TAG: &'static str = "audio feed";
    type Attributes = AudioAttributes;

    fn render(id: u32, pending: &AudioPatch, on_server: bool) -> CommandPlan {
        audio::render(Self::TAG, id, pending, on_server)
    }

    fn render_delete(id: u32) -> Vec<String> {
        audio::render_delete(Self::TAG, id)
    }

    fn parse_detail(fields: &str) -> Option<AudioPatch> {
        audio::parse_detail(fields)
    }
}

impl Kind for AudioMixer {
    const TAG: &'static str = "audio mixer";
    type Attributes = AudioAttributes;

    fn render(id: u32, pending: &AudioPatch, on_server: bool) -> CommandPlan {
        audio::render(Self::TAG, id, pending, on_server)
    }

    fn render_delete(id: u32) -> Vec<String> {
        audio::render_delete(Self::TAG, id)
    }

    fn parse_detail(fields: &str) -> Option<AudioPatch> {
        audio::parse_detail(fields)
    }
}

impl Kind for AudioSink {
    const TAG: &'static str = "audio sink";
    type Attributes = AudioAttributes;

    fn render(id: u32, pending: &AudioPatch, on_server: bool) -> CommandPlan {
        audio::render(Self::TAG, id, pending, on_server)
    }

    fn render_delete(id: u32) -> Vec<String> {
        audio::render_delete(Self::TAG, id)
    }

    fn parse_detail(fields: &str) -> Option<AudioPatch> {
        audio::parse_detail(fields)
    }
}

impl AudioKind for AudioFeed {}
impl AudioKind for AudioMixer {}
impl AudioKind for AudioSink {}
