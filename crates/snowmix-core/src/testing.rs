#![allow(clippy::unwrap_used)]
// In-memory session double for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use snowmix_api::{Error, Response, SendOptions, Session};

#[derive(Debug, Default)]
struct Script {
    sent: Vec<String>,
    listings: HashMap<String, Vec<String>>,
    failing: HashSet<String>,
}

/// Records every command and replays canned listings.
///
/// Commands marked failing are rejected. With a gate installed every
/// command waits on it before answering, so tests can interleave work
/// with an exchange that is in flight.
#[derive(Debug, Default)]
pub(crate) struct ScriptedSession {
    script: Mutex<Script>,
    gate: Mutex<Option<Arc<tokio::sync::Mutex<()>>>>,
}

impl ScriptedSession {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Reply to `command` with `lines`, already tidied.
    pub(crate) fn listing(&self, command: &str, lines: &[&str]) {
        self.lock()
            .listings
            .insert(command.to_owned(), lines.iter().map(|l| (*l).to_owned()).collect());
    }

    pub(crate) fn fail(&self, command: &str) {
        self.lock().failing.insert(command.to_owned());
    }

    pub(crate) fn heal(&self, command: &str) {
        self.lock().failing.remove(command);
    }

    pub(crate) fn install_gate(&self, gate: Arc<tokio::sync::Mutex<()>>) {
        *self.gate.lock().unwrap() = Some(gate);
    }

    pub(crate) fn sent(&self) -> Vec<String> {
        self.lock().sent.clone()
    }

    /// Sent commands, excluding the discovery listings.
    pub(crate) fn sent_setters(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|c| !c.ends_with(" info") && !c.ends_with(" add"))
            .collect()
    }

    pub(crate) fn clear_sent(&self) {
        self.lock().sent.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }
}

impl Session for ScriptedSession {
    async fn send_command(&self, command: &str, options: SendOptions) -> Result<Response, Error> {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let _held = gate.lock().await;
        }
        tokio::task::yield_now().await;

        let mut script = self.lock();
        script.sent.push(command.to_owned());
        if script.failing.contains(command) {
            return Err(Error::Rejected {
                command: command.to_owned(),
                message: "Unknown command".into(),
            });
        }
        if options.expect_multiline {
            let lines = script.listings.get(command).cloned().unwrap_or_default();
            return Ok(Response::Lines(lines));
        }
        Ok(Response::Line(String::new()))
    }
}
