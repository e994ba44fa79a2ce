use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use super::login::LoginPayload;
use super::storage::{keys, SessionStorage};
use super::SessionError;
use crate::authz::GrantedPermissions;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub user_id: String,
    pub name: String,
    pub role: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub permissions: GrantedPermissions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    /// Storage has not been read yet.
    #[default]
    Hydrating,
    Anonymous,
    Authenticated(Arc<SessionInfo>),
}

impl SessionState {
    pub fn is_hydrating(&self) -> bool {
        matches!(self, SessionState::Hydrating)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    /// `None` until hydrated; anonymous sessions hold the empty set.
    pub fn granted(&self) -> Option<&GrantedPermissions> {
        match self {
            SessionState::Hydrating => None,
            SessionState::Anonymous => Some(GrantedPermissions::empty()),
            SessionState::Authenticated(info) => Some(&info.permissions),
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            SessionState::Authenticated(info) => Some(info.user_id.as_str()),
            _ => None,
        }
    }

    pub fn info(&self) -> Option<&SessionInfo> {
        match self {
            SessionState::Authenticated(info) => Some(info),
            _ => None,
        }
    }
}

/// Marks which session generation a hydration read belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HydrationTicket {
    generation: u64,
}

/// Injectable session context holding the granted permission set.
///
/// Written by login, refresh, hydration and logout only; everything else
/// reads snapshots or subscribes to changes. Login, refresh and logout hold
/// `writer` across their storage write and publish, so they apply in order.
pub struct SessionStore {
    storage: Arc<dyn SessionStorage>,
    state: watch::Sender<SessionState>,
    generation: AtomicU64,
    writer: Mutex<()>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        let (state, _) = watch::channel(SessionState::Hydrating);
        Self {
            storage,
            state,
            generation: AtomicU64::new(0),
            writer: Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn granted(&self) -> Option<GrantedPermissions> {
        self.state.borrow().granted().cloned()
    }

    pub fn begin_hydration(&self) -> HydrationTicket {
        HydrationTicket {
            generation: self.generation.load(Ordering::SeqCst),
        }
    }

    /// Apply a hydration result unless a login or logout happened since the ticket was taken.
    pub fn finish_hydration(&self, ticket: HydrationTicket, state: SessionState) -> bool {
        let applied = self.state.send_if_modified(|current| {
            if self.generation.load(Ordering::SeqCst) != ticket.generation {
                return false;
            }
            *current = state;
            true
        });

        if !applied {
            tracing::debug!(generation = ticket.generation, "discarding stale session hydration");
        }
        applied
    }

    pub async fn read_persisted(&self) -> Result<SessionState, SessionError> {
        let access_token = match self.storage.get(keys::ACCESS_TOKEN).await? {
            Some(token) if !token.trim().is_empty() => token,
            _ => return Ok(SessionState::Anonymous),
        };

        let permissions = self
            .storage
            .get(keys::PERMISSIONS)
            .await?
            .map(|raw| GrantedPermissions::from_storage(&raw))
            .unwrap_or_default();

        let info = SessionInfo {
            user_id: self.storage.get(keys::USER_ID).await?.unwrap_or_default(),
            name: self.storage.get(keys::NAME).await?.unwrap_or_default(),
            role: self.storage.get(keys::ROLE).await?.unwrap_or_default(),
            access_token,
            refresh_token: self.storage.get(keys::REFRESH_TOKEN).await?,
            permissions,
        };

        Ok(SessionState::Authenticated(Arc::new(info)))
    }

    /// Read storage and publish the result. Returns whether the result was applied.
    pub async fn hydrate(&self) -> Result<bool, SessionError> {
        let ticket = self.begin_hydration();
        let state = self.read_persisted().await?;
        Ok(self.finish_hydration(ticket, state))
    }

    pub async fn login(&self, payload: LoginPayload) -> Result<Arc<SessionInfo>, SessionError> {
        let info = Arc::new(SessionInfo {
            user_id: payload.id.to_string(),
            name: payload.name.unwrap_or_default(),
            role: payload.user_role,
            access_token: payload.access_token,
            refresh_token: payload.refresh_token,
            permissions: payload.permissions.to_granted(),
        });

        let _writer = self.writer.lock().await;
        self.persist(&info).await?;
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.state.send_replace(SessionState::Authenticated(Arc::clone(&info)));

        tracing::info!(user_id = %info.user_id, permissions = info.permissions.len(), "session started");
        Ok(info)
    }

    /// Replace tokens and permissions after an explicit refresh.
    pub async fn refresh(
        &self,
        access_token: String,
        permissions: GrantedPermissions,
    ) -> Result<Arc<SessionInfo>, SessionError> {
        let _writer = self.writer.lock().await;
        let current = self.snapshot();
        let Some(previous) = current.info() else {
            return Err(SessionError::NotAuthenticated);
        };

        let info = Arc::new(SessionInfo {
            access_token,
            permissions,
            ..previous.clone()
        });

        self.persist(&info).await?;
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.state.send_replace(SessionState::Authenticated(Arc::clone(&info)));
        Ok(info)
    }

    /// Clear memory first, then storage; in-flight hydrations become stale.
    ///
    /// Waits for a login or refresh that is still writing, so its keys are
    /// removed too.
    pub async fn logout(&self) -> Result<(), SessionError> {
        let _writer = self.writer.lock().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.state.send_replace(SessionState::Anonymous);

        if let Err(err) = self.storage.clear().await {
            tracing::warn!(error = %err, "clearing session storage failed, removing keys one by one");
            for key in keys::ALL {
                self.storage.remove(key).await?;
            }
        }

        tracing::info!("session cleared");
        Ok(())
    }

    async fn persist(&self, info: &SessionInfo) -> Result<(), SessionError> {
        let mut entries = vec![
            (keys::ACCESS_TOKEN, info.access_token.clone()),
            (keys::ROLE, info.role.clone()),
            (keys::USER_ID, info.user_id.clone()),
            (keys::PERMISSIONS, info.permissions.to_storage()),
            (keys::NAME, info.name.clone()),
        ];
        if let Some(refresh) = &info.refresh_token {
            entries.push((keys::REFRESH_TOKEN, refresh.clone()));
        }

        self.storage.set_many(&entries).await
    }
}
