// @zen-component: QB-RefreshGuard
//
//! Refresh-before-use guard for QuickBooks credentials.
//!
//! Every data path passes its credential through [`RefreshGuard::ensure_valid`]
//! before touching the access token. A still-valid credential is returned
//! as-is with no network call. An expired one is exchanged for a fresh one
//! exactly once per account: concurrent callers share the in-flight refresh
//! future instead of issuing their own, which would invalidate each other's
//! rotated refresh tokens.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, warn};

use super::AuthError;
use super::oauth::TokenExchange;
use crate::credential::{Credential, CredentialStore};

type RefreshFuture = Shared<BoxFuture<'static, Result<Credential, AuthError>>>;

pub struct RefreshGuard {
    exchanger: Arc<dyn TokenExchange>,
    store: Arc<dyn CredentialStore>,
    /// Pending refreshes keyed by account id.
    in_flight: DashMap<String, RefreshFuture>,
}

impl RefreshGuard {
    pub fn new(exchanger: Arc<dyn TokenExchange>, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            exchanger,
            store,
            in_flight: DashMap::new(),
        }
    }

    /// Return a credential whose access token is usable now.
    ///
    /// On refresh failure the credential is dead: the error is
    /// [`AuthError::CredentialExpired`] and the caller must restart
    /// authorization.
    pub async fn ensure_valid(&self, credential: &Credential) -> Result<Credential, AuthError> {
        if !credential.is_expired() {
            debug!(account_id = %credential.account_id, "credential still valid");
            return Ok(credential.clone());
        }

        // Another turn may already have stored a refreshed credential.
        if let Ok(Some(stored)) = self.store.load().await
            && stored.account_id == credential.account_id
            && !stored.is_expired()
        {
            debug!(account_id = %credential.account_id, "using credential refreshed by another turn");
            return Ok(stored);
        }

        let (refresh, leader) = match self.in_flight.entry(credential.account_id.clone()) {
            Entry::Occupied(entry) if entry.get().peek().is_none() => (entry.get().clone(), false),
            Entry::Occupied(mut entry) => {
                // Finished but never collected; its leader went away.
                let refresh = self.start_refresh(credential);
                entry.insert(refresh.clone());
                (refresh, true)
            }
            Entry::Vacant(entry) => {
                let refresh = self.start_refresh(credential);
                entry.insert(refresh.clone());
                (refresh, true)
            }
        };

        let result = refresh.clone().await;
        if leader {
            // A later caller may already have replaced a settled entry.
            self.in_flight
                .remove_if(&credential.account_id, |_, pending| pending.ptr_eq(&refresh));
        }
        result
    }

    fn start_refresh(&self, credential: &Credential) -> RefreshFuture {
        let exchanger = Arc::clone(&self.exchanger);
        let store = Arc::clone(&self.store);
        let expired = credential.clone();

        async move {
            let refreshed = match exchanger.exchange_refresh_token(&expired).await {
                Ok(refreshed) => refreshed,
                Err(e) => {
                    warn!(account_id = %expired.account_id, error = %e, "credential refresh failed");
                    return Err(AuthError::CredentialExpired(e.to_string()));
                }
            };
            if let Err(e) = store.save(&refreshed).await {
                warn!(account_id = %refreshed.account_id, error = %e, "refreshed credential not saved");
            }
            info!(
                account_id = %refreshed.account_id,
                expires_at = %refreshed.expires_at,
                "credential refreshed"
            );
            Ok(refreshed)
        }
        .boxed()
        .shared()
    }
}
