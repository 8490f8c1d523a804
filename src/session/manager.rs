//! Registry of live calls.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{info, warn};

use crate::config::{Config, SessionRuntimeConfig};
use crate::error::SessionError;
use crate::rtp::Codec;
use crate::session::coordinator::{Collaborators, Session};
use crate::session::types::{CallId, CallSetup, SessionStats};

type SessionMap = HashMap<CallId, Arc<Session>>;

pub struct SessionManager {
    sessions: Mutex<SessionMap>,
    config: Config,
    runtime: Arc<SessionRuntimeConfig>,
    collaborators: Collaborators,
    codec: Codec,
}

impl SessionManager {
    pub fn new(
        config: Config,
        runtime: Arc<SessionRuntimeConfig>,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            config,
            runtime,
            collaborators,
            codec: Codec::Pcmu,
        }
    }

    /// Outbound codec for sessions registered from now on.
    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    fn lock(&self) -> MutexGuard<'_, SessionMap> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts a session for `setup` and adds it to the registry. A call id
    /// that is already registered returns the existing session.
    pub async fn register(&self, setup: CallSetup) -> Result<Arc<Session>, SessionError> {
        if let Some(existing) = self.get(&setup.call_id) {
            warn!("[manager] call {} already registered", setup.call_id);
            return Ok(existing);
        }

        let call_id = setup.call_id.clone();
        let session = Session::start(
            setup,
            self.config.engine_config(self.codec),
            self.runtime.clone(),
            self.collaborators.clone(),
        )
        .await
        .map_err(|e| {
            warn!("[manager] call {} not answered: {}", call_id, e);
            e
        })?;

        let raced = {
            let mut sessions = self.lock();
            match sessions.get(&call_id) {
                Some(existing) => Some(existing.clone()),
                None => {
                    sessions.insert(call_id.clone(), session.clone());
                    None
                }
            }
        };
        if let Some(existing) = raced {
            session.stop().await;
            return Ok(existing);
        }

        info!(
            "[manager] registered call {} (rtp {}), {} active",
            call_id,
            session.local_addr(),
            self.len()
        );
        Ok(session)
    }

    pub fn get(&self, call_id: &str) -> Option<Arc<Session>> {
        self.lock().get(call_id).cloned()
    }

    /// Stops and removes a call. Unknown ids are ignored; returns whether a
    /// session was removed.
    pub async fn end(&self, call_id: &str) -> bool {
        let removed = self.lock().remove(call_id);
        match removed {
            Some(session) => {
                session.stop().await;
                info!("[manager] ended call {}, {} active", call_id, self.len());
                true
            }
            None => false,
        }
    }

    /// Ends every session older than `max_age`, returning their ids.
    pub async fn sweep(&self, max_age: Duration) -> Vec<CallId> {
        let expired: Vec<(CallId, Arc<Session>)> = {
            let mut sessions = self.lock();
            let ids: Vec<CallId> = sessions
                .iter()
                .filter(|(_, session)| session.age() >= max_age)
                .map(|(id, _)| id.clone())
                .collect();
            ids.into_iter()
                .filter_map(|id| sessions.remove(&id).map(|s| (id, s)))
                .collect()
        };

        let mut ended = Vec::with_capacity(expired.len());
        for (call_id, session) in expired {
            warn!(
                "[manager] call {} exceeded max age {:?}, ending",
                call_id, max_age
            );
            session.stop().await;
            ended.push(call_id);
        }
        ended.sort();
        ended
    }

    pub fn snapshot(&self) -> BTreeMap<CallId, SessionStats> {
        let sessions: Vec<Arc<Session>> = self.lock().values().cloned().collect();
        sessions
            .into_iter()
            .map(|session| (session.call_id().to_string(), session.stats()))
            .collect()
    }

    pub fn active_calls(&self) -> Vec<CallId> {
        let mut ids: Vec<CallId> = self.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// SDP answer for a registered call, using the advertised address.
    pub fn local_sdp(&self, call_id: &str) -> Option<String> {
        self.get(call_id)
            .map(|session| session.local_sdp(&self.config.advertised_ip))
    }

    pub async fn shutdown_all(&self) {
        let sessions: Vec<Arc<Session>> = self.lock().drain().map(|(_, s)| s).collect();
        if sessions.is_empty() {
            return;
        }
        info!("[manager] shutting down {} call(s)", sessions.len());
        for session in sessions {
            session.stop().await;
        }
    }
}
