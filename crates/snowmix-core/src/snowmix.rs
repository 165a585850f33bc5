// ── Snowmix facade ──
//
// Owns one session and the collections mirrored over it. Mixer source
// attachments are kept as weak references (kind + id) and resolved through
// the owning collection on every use.

use std::sync::{Arc, Mutex};

use snowmix_api::{SendOptions, Session, TcpSession};
use tracing::{debug, info};

use crate::codec::audio;
use crate::config::SnowmixConfig;
use crate::error::CoreError;
use crate::kind::{AudioFeed, AudioMixer, AudioSink, Kind};
use crate::model::{MixerSource, SourceKind};
use crate::store::{Collection, Entity, PopulateReport};

/// A mixer source resolved to its live entity.
#[derive(Debug)]
pub enum ResolvedSource<S: Session> {
    Feed(Arc<Entity<AudioFeed, S>>),
    Mixer(Arc<Entity<AudioMixer, S>>),
}

/// Populate outcome for every collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PopulateSummary {
    pub audio_feeds: PopulateReport,
    pub audio_mixers: PopulateReport,
    pub audio_sinks: PopulateReport,
}

/// Client-side mirror of one Snowmix server.
pub struct Snowmix<S: Session> {
    session: Arc<S>,
    audio_feeds: Collection<AudioFeed, S>,
    audio_mixers: Collection<AudioMixer, S>,
    audio_sinks: Collection<AudioSink, S>,
    sources: Mutex<Vec<(u32, MixerSource)>>,
}

impl Snowmix<TcpSession> {
    /// Open a control session and build empty collections over it.
    ///
    /// Nothing is discovered yet; call [`populate_all`](Self::populate_all).
    pub async fn connect(config: &SnowmixConfig) -> Result<Self, CoreError> {
        let session = TcpSession::connect(&config.host, config.port, config.transport()).await?;
        info!(addr = session.addr(), version = session.version(), "connected");
        Ok(Self::new(Arc::new(session)))
    }
}

impl<S: Session> Snowmix<S> {
    pub fn new(session: Arc<S>) -> Self {
        Self {
            audio_feeds: Collection::new(Arc::clone(&session)),
            audio_mixers: Collection::new(Arc::clone(&session)),
            audio_sinks: Collection::new(Arc::clone(&session)),
            sources: Mutex::new(Vec::new()),
            session,
        }
    }

    pub fn session(&self) -> &Arc<S> {
        &self.session
    }

    pub fn audio_feeds(&self) -> &Collection<AudioFeed, S> {
        &self.audio_feeds
    }

    pub fn audio_mixers(&self) -> &Collection<AudioMixer, S> {
        &self.audio_mixers
    }

    pub fn audio_sinks(&self) -> &Collection<AudioSink, S> {
        &self.audio_sinks
    }

    /// Discover every collection, one after another.
    pub async fn populate_all(&self) -> Result<PopulateSummary, CoreError> {
        Ok(PopulateSummary {
            audio_feeds: self.audio_feeds.populate().await?,
            audio_mixers: self.audio_mixers.populate().await?,
            audio_sinks: self.audio_sinks.populate().await?,
        })
    }

    // ── Mixer sources ────────────────────────────────────────────────

    /// Feed audio feed `feed_id` into mixer `mixer_id`.
    pub async fn attach_feed(&self, mixer_id: u32, feed_id: u32) -> Result<(), CoreError> {
        self.attach(mixer_id, MixerSource::feed(feed_id)).await
    }

    /// Feed the output of mixer `source_id` into mixer `mixer_id`.
    pub async fn attach_mixer(&self, mixer_id: u32, source_id: u32) -> Result<(), CoreError> {
        self.attach(mixer_id, MixerSource::mixer(source_id)).await
    }

    async fn attach(&self, mixer_id: u32, source: MixerSource) -> Result<(), CoreError> {
        self.audio_mixers.require(mixer_id)?;
        if self.resolve(source).is_none() {
            return Err(CoreError::NotFound {
                kind: source_tag(source.kind),
                id: source.id,
            });
        }

        let command = audio::render_source(mixer_id, source);
        self.session
            .send_command(&command, SendOptions::command())
            .await?;

        let mut sources = self.sources.lock().expect("source table lock poisoned");
        if !sources.contains(&(mixer_id, source)) {
            sources.push((mixer_id, source));
        }
        debug!(mixer_id, source_kind = %source.kind, source_id = source.id, "source attached");
        Ok(())
    }

    /// Sources attached to `mixer_id`, in attach order. Entries may be stale.
    pub fn sources_of(&self, mixer_id: u32) -> Vec<MixerSource> {
        self.sources
            .lock()
            .expect("source table lock poisoned")
            .iter()
            .filter(|(mixer, _)| *mixer == mixer_id)
            .map(|(_, source)| *source)
            .collect()
    }

    /// Look a source up in its collection. `None` for a stale reference.
    pub fn resolve(&self, source: MixerSource) -> Option<ResolvedSource<S>> {
        match source.kind {
            SourceKind::Feed => self.audio_feeds.by_id(source.id).map(ResolvedSource::Feed),
            SourceKind::Mixer => self.audio_mixers.by_id(source.id).map(ResolvedSource::Mixer),
        }
    }
}

fn source_tag(kind: SourceKind) -> &'static str {
    match kind {
        SourceKind::Feed => AudioFeed::TAG,
        SourceKind::Mixer => AudioMixer::TAG,
    }
}
