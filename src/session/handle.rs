use std::sync::{Arc, Mutex, MutexGuard};

use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use super::SessionData;
use crate::http::ApiResponse;

#[derive(Debug)]
pub(super) struct SessionState {
    pub(super) id: String,
    pub(super) data: SessionData,
    pub(super) is_new: bool,
    pub(super) modified: bool,
    pub(super) destroyed: bool,
}

/// The current request's session.
///
/// Clones share state with the copy the session middleware persists once
/// the handler returns.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<Mutex<SessionState>>,
}

impl Session {
    pub(super) fn new(id: String, data: SessionData, is_new: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionState {
                id,
                data,
                is_new,
                modified: false,
                destroyed: false,
            })),
        }
    }

    pub(super) fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn id(&self) -> String {
        self.lock().id.clone()
    }

    /// Whether the session was created by this request.
    pub fn is_new(&self) -> bool {
        self.lock().is_new
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.lock().data.get(key).cloned()?;
        serde_json::from_value(value).ok()
    }

    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.lock().data.get(key).cloned()
    }

    pub fn insert<T: Serialize>(
        &self,
        key: impl Into<String>,
        value: T,
    ) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(value)?;
        let mut state = self.lock();
        state.data.insert(key.into(), value);
        state.modified = true;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        let mut state = self.lock();
        let removed = state.data.remove(key);
        if removed.is_some() {
            state.modified = true;
        }
        removed
    }

    /// Drop all data; the session is deleted from the store after the
    /// response and its cookie expired.
    pub fn destroy(&self) {
        let mut state = self.lock();
        state.data.clear();
        state.destroyed = true;
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = ApiResponse;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Session>().cloned().ok_or_else(|| {
            tracing::error!("Session extractor used without the session capability");
            ApiResponse::InternalServerError("session capability is not installed".into())
        })
    }
}
