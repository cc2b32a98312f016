/*
** This file is a part of xmpp-session (XMPP client session engine)
** Copyright (C) 2000-2025 Gurer Ozen
**
** xmpp-session is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::sync::Arc;
use std::sync::Condvar;
use std::sync::Mutex;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;
use std::time::Instant;

use tracing::debug;
use tracing::error;
use tracing::warn;
use uuid::Uuid;

use super::error::XmppError;
use super::outgoing::OutgoingStanza;
use super::writer::StanzaWriter;

/// Periodic ping settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepaliveConfig {
    pub enabled: bool,
    pub period: Duration,
    /// How long a ping may stay unanswered before the session is closed.
    pub timeout: Duration,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        KeepaliveConfig {
            enabled: false,
            period: Duration::from_secs(60),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Default)]
struct PingState {
    outstanding: Option<(String, Instant)>,
    stopped: bool,
    timed_out: bool,
}

struct Shared {
    state: Mutex<PingState>,
    wakeup: Condvar,
}

/// Background thread sending XEP-0199 pings to the server.
///
/// At most one ping is outstanding. A ping which is not acknowledged in
/// time closes the session through the writer.
pub struct LivenessMonitor {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl LivenessMonitor {
    pub fn start(
        writer: StanzaWriter,
        from: String,
        to: String,
        config: KeepaliveConfig,
    ) -> Result<Self, XmppError> {
        let shared = Arc::new(Shared {
            state: Mutex::new(PingState::default()),
            wakeup: Condvar::new(),
        });
        let thread_shared = Arc::clone(&shared);
        let thread = thread::Builder::new()
            .name("xmpp-keepalive".to_string())
            .spawn(move || run(&thread_shared, &writer, &from, &to, config))?;
        debug!(
            "Keepalive started, period {:?}, timeout {:?}",
            config.period, config.timeout
        );
        Ok(LivenessMonitor {
            shared,
            thread: Some(thread),
        })
    }

    /// Marks the outstanding ping as answered if the id matches it.
    pub fn acknowledge(&self, id: &str) -> bool {
        let Ok(mut state) = self.shared.state.lock() else {
            return false;
        };
        let matched = matches!(&state.outstanding, Some((pending, _)) if pending == id);
        if matched {
            debug!("Ping {id} acknowledged");
            state.outstanding = None;
        }
        matched
    }

    /// Id of the ping waiting for an answer.
    pub fn outstanding(&self) -> Option<String> {
        let state = self.shared.state.lock().ok()?;
        state.outstanding.as_ref().map(|(id, _)| id.clone())
    }

    /// True once the session was closed because a ping was not answered.
    pub fn timed_out(&self) -> bool {
        self.shared
            .state
            .lock()
            .map(|state| state.timed_out)
            .unwrap_or(false)
    }

    /// Stops the thread and waits for it to exit.
    pub fn stop(&mut self) {
        if let Ok(mut state) = self.shared.state.lock() {
            state.stopped = true;
        }
        self.shared.wakeup.notify_all();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Keepalive thread panicked");
            }
        }
    }
}

impl Drop for LivenessMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(shared: &Shared, writer: &StanzaWriter, from: &str, to: &str, config: KeepaliveConfig) {
    let mut next_tick = Instant::now() + config.period;
    let Ok(mut state) = shared.state.lock() else {
        return;
    };
    loop {
        if state.stopped || writer.is_closed() {
            return;
        }
        let now = Instant::now();
        if let Some((id, deadline)) = &state.outstanding {
            if now >= *deadline {
                warn!(
                    "Ping {id} was not answered in {:?}, closing the session",
                    config.timeout
                );
                state.timed_out = true;
                drop(state);
                if let Err(err) = writer.close() {
                    debug!("Closing after ping timeout: {err}");
                }
                return;
            }
        }
        if now >= next_tick {
            // Other traffic proves the connection alive for one more period.
            let deferred = writer
                .last_write()
                .map(|last| last + config.period)
                .filter(|tick| *tick > now);
            if let Some(tick) = deferred {
                next_tick = tick;
                continue;
            }
            next_tick = now + config.period;
            if state.outstanding.is_none() {
                let id = Uuid::new_v4().to_string();
                state.outstanding = Some((id.clone(), now + config.timeout));
                drop(state);
                debug!("Sending ping {id}");
                if let Err(err) = writer.send(&OutgoingStanza::ping(from, to, &id)) {
                    debug!("Keepalive stops, cannot send ping: {err}");
                    return;
                }
                state = match shared.state.lock() {
                    Ok(state) => state,
                    Err(_) => return,
                };
                continue;
            }
        }
        let mut wake_at = next_tick;
        if let Some((_, deadline)) = &state.outstanding {
            wake_at = wake_at.min(*deadline);
        }
        let wait = wake_at.saturating_duration_since(Instant::now());
        state = match shared.wakeup.wait_timeout(state, wait) {
            Ok((state, _)) => state,
            Err(_) => return,
        };
    }
}
