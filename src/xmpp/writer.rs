/*
** This file is a part of xmpp-session (XMPP client session engine)
** Copyright (C) 2000-2025 Gurer Ozen
**
** xmpp-session is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::io;
use std::io::Write;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::TryLockError;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Instant;

use tracing::debug;
use tracing::trace;

use super::constants::STREAM_END;
use super::error::XmppError;
use super::outgoing::OutgoingStanza;
use super::transport::ShutdownHandle;

struct WriterState {
    stream: Box<dyn Write + Send>,
    last_write: Instant,
}

struct Shared {
    state: Mutex<WriterState>,
    shutdown: Box<dyn ShutdownHandle>,
    closed: AtomicBool,
}

/// Cloneable handle for sending stanzas on a session.
///
/// Every stanza is written while holding the writer lock, so stanzas from
/// different threads never interleave.
#[derive(Clone)]
pub struct StanzaWriter {
    shared: Arc<Shared>,
}

impl StanzaWriter {
    pub fn new(stream: Box<dyn Write + Send>, shutdown: Box<dyn ShutdownHandle>) -> Self {
        StanzaWriter {
            shared: Arc::new(Shared {
                state: Mutex::new(WriterState {
                    stream,
                    last_write: Instant::now(),
                }),
                shutdown,
                closed: AtomicBool::new(false),
            }),
        }
    }

    fn write_locked(state: &mut WriterState, xml: &str) -> Result<(), XmppError> {
        trace!("Sending bytes: {xml}");
        state.stream.write_all(xml.as_bytes())?;
        state.stream.flush()?;
        state.last_write = Instant::now();
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, WriterState>, XmppError> {
        self.shared
            .state
            .lock()
            .map_err(|_| XmppError::Io(io::Error::other("writer lock is poisoned")))
    }

    /// Writes already serialized XML.
    pub fn send_raw(&self, xml: &str) -> Result<(), XmppError> {
        if self.is_closed() {
            return Err(XmppError::Io(io::Error::new(
                io::ErrorKind::NotConnected,
                "session is closed",
            )));
        }
        let mut state = self.lock()?;
        Self::write_locked(&mut state, xml)
    }

    pub fn send(&self, stanza: &OutgoingStanza) -> Result<(), XmppError> {
        self.send_raw(&stanza.to_string())
    }

    /// Ends the stream and shuts the connection down.
    ///
    /// Only the first call does anything. A blocked reader wakes up with
    /// an end of stream or an error. If another thread is stuck in a write,
    /// the connection is shut down without the closing tag.
    pub fn close(&self) -> Result<(), XmppError> {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        debug!("Closing the session");
        let result = match self.shared.state.try_lock() {
            Ok(mut state) => Self::write_locked(&mut state, STREAM_END),
            Err(TryLockError::WouldBlock) => {
                debug!("A write is in progress, shutting down without ending the stream");
                Ok(())
            }
            Err(TryLockError::Poisoned(_)) => Err(XmppError::Io(io::Error::other(
                "writer lock is poisoned",
            ))),
        };
        let shutdown = self.shared.shutdown.shutdown();
        result?;
        shutdown?;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Time of the last successful write.
    pub fn last_write(&self) -> Option<Instant> {
        self.shared.state.lock().ok().map(|state| state.last_write)
    }
}
