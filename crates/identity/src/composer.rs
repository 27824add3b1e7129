//! Identity composition: one fatal read, the rest best-effort.

use tracing::{debug, info, instrument, warn};

use bazaar_auth::Role;
use bazaar_core::UserId;
use bazaar_infra::record_store::{fetch, fetch_owned};
use bazaar_infra::RecordStore;

use crate::error::{EnrichmentWarning, IdentityError};
use crate::records::{
    ExtendedIdentity, ResellerRecord, RoleRecord, SupplierRecord, UserProfile, UserRecord,
};

/// Assembles an [`ExtendedIdentity`] from the record store.
///
/// The user record is authoritative: without it there is no identity. The
/// profile and role-specific record only enrich it, so their absence or
/// failure yields a partial identity instead of an error.
#[derive(Debug, Clone)]
pub struct IdentityComposer<S> {
    store: S,
}

impl<S> IdentityComposer<S>
where
    S: RecordStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[instrument(skip(self), fields(principal_id = %principal_id))]
    pub async fn compose(&self, principal_id: UserId) -> Result<ExtendedIdentity, IdentityError> {
        // The user and profile reads are independent; the role record needs
        // the user's role first.
        let (user, profile) = tokio::join!(
            fetch::<UserRecord, _>(&self.store, *principal_id.as_uuid()),
            fetch_owned::<UserProfile, _>(&self.store, principal_id),
        );

        let user = match user {
            Ok(Some(user)) => user,
            Ok(None) => {
                info!("no user record for principal; treating as signed out");
                return Err(IdentityError::NotFound(principal_id));
            }
            Err(err) => {
                warn!(error = %err, "user record fetch failed");
                return Err(IdentityError::Transient(err));
            }
        };

        let profile = absorb(profile.map_err(EnrichmentWarning::Profile));
        let role_record = absorb(self.role_record(&user).await);

        debug!(
            role = %user.role,
            has_profile = profile.is_some(),
            has_role_record = role_record.is_some(),
            "identity composed"
        );
        Ok(ExtendedIdentity::new(user, profile, role_record))
    }

    async fn role_record(&self, user: &UserRecord) -> Result<Option<RoleRecord>, EnrichmentWarning> {
        let wrap = |source| EnrichmentWarning::RoleRecord {
            role: user.role,
            source,
        };

        match user.role {
            Role::Supplier => fetch_owned::<SupplierRecord, _>(&self.store, user.id)
                .await
                .map(|r| r.map(RoleRecord::Supplier))
                .map_err(wrap),
            Role::Reseller => fetch_owned::<ResellerRecord, _>(&self.store, user.id)
                .await
                .map(|r| r.map(RoleRecord::Reseller))
                .map_err(wrap),
            Role::Client | Role::Admin | Role::Moderator | Role::Analyst | Role::Support => Ok(None),
        }
    }
}

fn absorb<T>(result: Result<Option<T>, EnrichmentWarning>) -> Option<T> {
    match result {
        Ok(value) => value,
        Err(warning) => {
            warn!(warning = %warning, "identity enrichment skipped");
            None
        }
    }
}
