// ── Two-phase discovery ──
//
// Phase 1 asks for the name listing, phase 2 for the info dump. Details
// are merged as server truth; anything the grammar does not understand is
// logged and skipped. Afterwards entities the server no longer reports are
// pruned (upsert then prune, never clear-then-insert).

use std::collections::HashSet;

use chrono::Utc;
use snowmix_api::{SendOptions, Session};
use tracing::{debug, info, warn};

use super::collection::{Collection, CollectionMeta};
use crate::codec::InfoLine;
use crate::error::CoreError;
use crate::kind::{Kind, Patch, Tracking};

/// Outcome of one populate run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PopulateReport {
    /// Detail lines merged into the collection.
    pub materialized: usize,
    /// Details whose id was missing from the name listing.
    pub inconsistent: usize,
    /// Lines that matched no known layout.
    pub unrecognized: usize,
    /// Previously known entities the server no longer reports.
    pub pruned: usize,
}

impl<K: Kind, S: Session> Collection<K, S> {
    /// Discover what the server holds and merge it into the collection.
    ///
    /// Fails only when the session does; parse problems are logged and
    /// counted in the report.
    pub async fn populate(&self) -> Result<PopulateReport, CoreError> {
        let options = SendOptions::listing().silly();
        let mut report = PopulateReport::default();

        // Phase 1: id -> name.
        let listing = self
            .session()
            .send_command(&format!("{} add", K::TAG), options)
            .await?
            .into_lines();
        let names = self.shared.grammar.parse_names(&listing);
        debug!(kind = K::TAG, count = names.len(), "names listed");

        // Phase 2: attribute details and collection metadata.
        let details = self
            .session()
            .send_command(&format!("{} info", K::TAG), options)
            .await?
            .into_lines();

        let mut meta = CollectionMeta::default();
        let mut seen = HashSet::new();

        for line in &details {
            match self.shared.grammar.classify(line) {
                InfoLine::Header => {}
                InfoLine::MaxCount(n) => meta.max_count = Some(n),
                InfoLine::VerboseLevel(n) => meta.verbose_level = Some(n),
                InfoLine::Detail { id, fields } => {
                    let Some(mut patch) = K::parse_detail(fields) else {
                        warn!(kind = K::TAG, id, line = %line, "malformed detail line");
                        report.unrecognized += 1;
                        continue;
                    };
                    let Some(name) = names.get(&id).cloned() else {
                        warn!(kind = K::TAG, id, "detail for an id missing from the name listing");
                        report.inconsistent += 1;
                        continue;
                    };
                    patch.set_name(name);
                    self.upsert(Some(id), patch, Tracking::Authoritative);
                    seen.insert(id);
                    report.materialized += 1;
                }
                InfoLine::Unrecognized => {
                    warn!(kind = K::TAG, line = %line, "unrecognized info line");
                    report.unrecognized += 1;
                }
            }
        }

        for (id, name) in &names {
            if !seen.contains(id) {
                debug!(kind = K::TAG, id, %name, "listed without details");
            }
        }

        // Listed names count as present even when their detail was unusable.
        let present: HashSet<u32> = names.keys().copied().collect();
        report.pruned = self.prune_missing(&present);
        *self.shared.meta.lock().expect("collection meta lock poisoned") = meta;
        self.shared.last_populate.send_replace(Some(Utc::now()));

        info!(
            kind = K::TAG,
            materialized = report.materialized,
            inconsistent = report.inconsistent,
            unrecognized = report.unrecognized,
            pruned = report.pruned,
            "populate complete"
        );
        Ok(report)
    }
}
