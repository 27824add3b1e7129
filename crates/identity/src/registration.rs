//! Registration orchestration.
//!
//! Strictly ordered steps with differentiated failure semantics:
//!
//! | Step | Record | On failure |
//! |------|--------|------------|
//! | 1 | credential (provider) | fatal (`AlreadyRegistered` distinguished) |
//! | 2 | user record | fatal (`OrphanedCredential`) |
//! | 3 | profile | warning |
//! | 4 | supplier / reseller record | warning |
//! | 5 | sign-in hand-off | warning |
//!
//! Registration never composes an identity itself; the sign-in in step 5
//! goes through the session manager's normal transition path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, error, info, instrument, warn};

use bazaar_auth::{Credential, Role};
use bazaar_core::{DomainError, DomainResult, ProfileId, ResellerId, SupplierId, UserId};
use bazaar_infra::record_store::insert;
use bazaar_infra::{AuthProvider, IdentityConfig, Record, RecordStore};

use crate::error::{EnrichmentWarning, RegistrationError};
use crate::records::{
    KycStatus, PerformanceTier, ResellerRecord, SupplierRecord, UserProfile, UserRecord,
};
use crate::slug::{self, SuffixSource};

/// Attempts at a unique store slug / referral code before giving up.
const MAX_HANDLE_ATTEMPTS: usize = 3;

// ─────────────────────────────────────────────────────────────────────────────
// Signup Data
// ─────────────────────────────────────────────────────────────────────────────

/// Role-agnostic signup form.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct SignupData {
    pub email: String,
    pub secret: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub company_name: Option<String>,
    /// Free-form attributes stored on the profile.
    #[serde(default)]
    pub attributes: Map<String, JsonValue>,
}

impl core::fmt::Debug for SignupData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SignupData")
            .field("email", &self.email)
            .field("secret", &"<redacted>")
            .field("name", &self.name)
            .field("company_name", &self.company_name)
            .field("attributes", &self.attributes)
            .finish()
    }
}

impl SignupData {
    pub fn new(email: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            secret: secret.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_company(mut self, company_name: impl Into<String>) -> Self {
        self.company_name = Some(company_name.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn validate(&self, role: Role) -> DomainResult<()> {
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(DomainError::validation("invalid email format"));
        }
        if self.secret.is_empty() {
            return Err(DomainError::validation("password cannot be empty"));
        }
        if role == Role::Supplier && self.company().is_none() {
            return Err(DomainError::validation("suppliers must provide a company name"));
        }
        Ok(())
    }

    fn company(&self) -> Option<&str> {
        self.company_name
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    /// Explicit name, else company name, else the email's local part.
    fn display_name(&self) -> String {
        let name = self.name.trim();
        if !name.is_empty() {
            return name.to_string();
        }
        if let Some(company) = self.company() {
            return company.to_string();
        }
        self.email
            .trim()
            .split('@')
            .next()
            .unwrap_or_default()
            .to_string()
    }

    fn string_attribute(&self, key: &str) -> Option<String> {
        self.attributes
            .get(key)
            .and_then(JsonValue::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Report
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of a completed registration.
#[derive(Debug, Clone)]
pub struct RegistrationReport {
    pub credential: Credential,
    pub user: UserRecord,
    pub profile_created: bool,
    /// Store slug (suppliers) or referral code (resellers) when created.
    pub role_handle: Option<String>,
    /// Whether the provider signed the new account in.
    pub signed_in: bool,
    /// Non-fatal steps that did not complete.
    pub warnings: Vec<EnrichmentWarning>,
}

impl RegistrationReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Orchestrator
// ─────────────────────────────────────────────────────────────────────────────

/// Turns signup data into a credential plus its cascade of records.
#[derive(Debug)]
pub struct RegistrationOrchestrator<P, S> {
    provider: P,
    store: S,
    config: IdentityConfig,
    suffixes: SuffixSource,
}

impl<P, S> RegistrationOrchestrator<P, S>
where
    P: AuthProvider,
    S: RecordStore,
{
    pub fn new(provider: P, store: S, config: IdentityConfig) -> Self {
        Self::with_suffix_source(provider, store, config, SuffixSource::time_seeded())
    }

    pub fn with_suffix_source(
        provider: P,
        store: S,
        config: IdentityConfig,
        suffixes: SuffixSource,
    ) -> Self {
        Self {
            provider,
            store,
            config,
            suffixes,
        }
    }

    #[instrument(skip(self, data))]
    pub async fn register(
        &self,
        data: SignupData,
        role: Role,
    ) -> Result<RegistrationReport, RegistrationError> {
        data.validate(role)?;

        // 1) Credential.
        let credential = self
            .provider
            .sign_up(data.email.trim(), &data.secret)
            .await
            .map_err(RegistrationError::from_auth)?;
        let user_id = UserId::from(credential.id);
        let now = Utc::now();

        // 2) User record: the authorization-defining fact.
        let user = UserRecord::new(user_id, credential.email.clone(), data.display_name(), role, now);
        if let Err(source) = insert(&self.store, &user).await {
            error!(
                principal_id = %credential.id,
                error = %source,
                "credential created without a user record; needs reconciliation"
            );
            return Err(RegistrationError::OrphanedCredential {
                principal_id: credential.id,
                source,
            });
        }

        let mut warnings = Vec::new();

        // 3) Profile.
        let profile = self.new_profile(user_id, &data, now);
        let profile_created = match insert(&self.store, &profile).await {
            Ok(()) => true,
            Err(err) => {
                warnings.push(EnrichmentWarning::Profile(err));
                false
            }
        };

        // 4) Role-specific record.
        let role_handle = match self.create_role_record(&user, &data, now).await {
            Ok(handle) => handle,
            Err(warning) => {
                warnings.push(warning);
                None
            }
        };

        // 5) Hand off to the normal sign-in transition.
        let mut signed_in = false;
        if self.config.sign_in_after_registration {
            match self.provider.sign_in(data.email.trim(), &data.secret).await {
                Ok(_) => signed_in = true,
                Err(err) => warnings.push(EnrichmentWarning::AutoSignIn(err)),
            }
        }

        for warning in &warnings {
            warn!(principal_id = %credential.id, warning = %warning, "registration step skipped");
        }
        info!(
            principal_id = %credential.id,
            verified = user.is_verified,
            warnings = warnings.len(),
            "registration completed"
        );

        Ok(RegistrationReport {
            credential,
            user,
            profile_created,
            role_handle,
            signed_in,
            warnings,
        })
    }

    fn new_profile(&self, user_id: UserId, data: &SignupData, now: DateTime<Utc>) -> UserProfile {
        UserProfile {
            id: ProfileId::new(),
            user_id,
            locale: data
                .string_attribute("locale")
                .unwrap_or_else(|| self.config.default_locale.clone()),
            currency: data
                .string_attribute("currency")
                .map(|c| c.to_ascii_uppercase())
                .unwrap_or_else(|| self.config.default_currency.clone()),
            kyc_status: KycStatus::Pending,
            metadata: data.attributes.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    async fn create_role_record(
        &self,
        user: &UserRecord,
        data: &SignupData,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, EnrichmentWarning> {
        match user.role {
            Role::Supplier => {
                let company = data.company().unwrap_or(user.name.as_str()).to_string();
                self.insert_with_handle(user.role, |suffix| {
                    let store_slug = slug::store_slug(&company, suffix);
                    let record = SupplierRecord {
                        id: SupplierId::new(),
                        user_id: user.id,
                        company_name: company.clone(),
                        store_slug: store_slug.clone(),
                        performance_tier: PerformanceTier::default(),
                        created_at: now,
                    };
                    (record, store_slug)
                })
                .await
                .map(Some)
            }
            Role::Reseller => {
                let commission_bps = self.config.reseller_commission_bps;
                self.insert_with_handle(user.role, |suffix| {
                    let referral_code = slug::referral_code(&user.name, suffix);
                    let record = ResellerRecord {
                        id: ResellerId::new(),
                        user_id: user.id,
                        referral_code: referral_code.clone(),
                        commission_bps,
                        performance_tier: PerformanceTier::default(),
                        created_at: now,
                    };
                    (record, referral_code)
                })
                .await
                .map(Some)
            }
            Role::Client | Role::Admin | Role::Moderator | Role::Analyst | Role::Support => Ok(None),
        }
    }

    /// Insert a record carrying a generated handle, regenerating the handle
    /// on uniqueness conflicts.
    async fn insert_with_handle<R, F>(&self, role: Role, build: F) -> Result<String, EnrichmentWarning>
    where
        R: Record,
        F: Fn(u16) -> (R, String) + Send + Sync,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let (record, handle) = build(self.suffixes.next());
            match insert(&self.store, &record).await {
                Ok(()) => return Ok(handle),
                Err(err) if err.is_conflict() && attempt < MAX_HANDLE_ATTEMPTS => {
                    debug!(role = %role, handle = %handle, attempt, "handle taken; regenerating");
                }
                Err(source) => return Err(EnrichmentWarning::RoleRecord { role, source }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bazaar_infra::record_store::{fetch, fetch_owned};
    use bazaar_infra::{InMemoryAuthProvider, InMemoryRecordStore, SessionChange, Table};
    use serde_json::json;

    use super::*;

    type Orchestrator = RegistrationOrchestrator<Arc<InMemoryAuthProvider>, Arc<InMemoryRecordStore>>;

    fn setup(config: IdentityConfig) -> (Orchestrator, Arc<InMemoryAuthProvider>, Arc<InMemoryRecordStore>) {
        let provider = Arc::new(InMemoryAuthProvider::new());
        let store = Arc::new(InMemoryRecordStore::new());
        let orchestrator = RegistrationOrchestrator::with_suffix_source(
            provider.clone(),
            store.clone(),
            config,
            SuffixSource::starting_at(5),
        );
        (orchestrator, provider, store)
    }

    fn acme() -> SignupData {
        SignupData::new("a@x.com", "s").with_company("Acme")
    }

    #[tokio::test]
    async fn supplier_signup_creates_full_cascade() {
        let (orchestrator, _provider, store) = setup(IdentityConfig::default());

        let report = orchestrator.register(acme(), Role::Supplier).await.unwrap();
        assert!(report.is_clean());
        assert_eq!(report.user.role, Role::Supplier);
        assert!(!report.user.is_verified);
        assert_eq!(report.user.name, "Acme");
        assert_eq!(report.role_handle.as_deref(), Some("acme-0005"));

        let user: UserRecord = fetch(store.as_ref(), *report.user.id.as_uuid()).await.unwrap().unwrap();
        assert_eq!(user, report.user);

        let supplier: SupplierRecord = fetch_owned(store.as_ref(), user.id).await.unwrap().unwrap();
        assert_eq!(supplier.store_slug, "acme-0005");
        assert_eq!(supplier.company_name, "Acme");

        let profile: UserProfile = fetch_owned(store.as_ref(), user.id).await.unwrap().unwrap();
        assert_eq!(profile.kyc_status, KycStatus::Pending);
        assert_eq!(profile.locale, "en");
        assert_eq!(profile.currency, "USD");
    }

    #[tokio::test]
    async fn reseller_signup_gets_referral_code_and_commission() {
        let config = IdentityConfig {
            reseller_commission_bps: 750,
            ..Default::default()
        };
        let (orchestrator, _provider, store) = setup(config);

        let data = SignupData::new("ada@x.com", "s").with_name("Ada Lovelace");
        let report = orchestrator.register(data, Role::Reseller).await.unwrap();
        assert!(report.user.is_verified);
        assert_eq!(report.role_handle.as_deref(), Some("ADALOVEL0005"));

        let reseller: ResellerRecord = fetch_owned(store.as_ref(), report.user.id).await.unwrap().unwrap();
        assert_eq!(reseller.commission_bps, 750);
        assert_eq!(store.len(Table::Suppliers), 0);
    }

    #[tokio::test]
    async fn client_signup_has_no_role_record() {
        let (orchestrator, _provider, store) = setup(IdentityConfig::default());

        let report = orchestrator
            .register(SignupData::new("c@x.com", "s"), Role::Client)
            .await
            .unwrap();
        assert_eq!(report.user.name, "c");
        assert_eq!(report.role_handle, None);
        assert_eq!(store.len(Table::Suppliers) + store.len(Table::Resellers), 0);
    }

    #[tokio::test]
    async fn signup_attributes_override_profile_defaults() {
        let (orchestrator, _provider, store) = setup(IdentityConfig::default());
        let data = SignupData::new("c@x.com", "s")
            .with_attribute("locale", "fr")
            .with_attribute("currency", "eur")
            .with_attribute("referrer", "newsletter");

        let report = orchestrator.register(data, Role::Client).await.unwrap();
        let profile: UserProfile = fetch_owned(store.as_ref(), report.user.id).await.unwrap().unwrap();
        assert_eq!(profile.locale, "fr");
        assert_eq!(profile.currency, "EUR");
        assert_eq!(profile.metadata.get("referrer"), Some(&json!("newsletter")));
    }

    #[tokio::test]
    async fn duplicate_signup_is_already_registered() {
        let (orchestrator, _provider, _store) = setup(IdentityConfig::default());
        orchestrator.register(acme(), Role::Supplier).await.unwrap();

        let err = orchestrator.register(acme(), Role::Supplier).await.unwrap_err();
        assert_eq!(err, RegistrationError::AlreadyRegistered);
    }

    #[tokio::test]
    async fn user_record_failure_is_orphaned_credential() {
        let (orchestrator, _provider, store) = setup(IdentityConfig::default());
        store.fail_writes(Table::Users, true);

        let err = orchestrator.register(acme(), Role::Supplier).await.unwrap_err();
        assert!(matches!(err, RegistrationError::OrphanedCredential { .. }));
        assert_eq!(store.len(Table::Profiles), 0);
        assert_eq!(store.len(Table::Suppliers), 0);
    }

    #[tokio::test]
    async fn profile_failure_is_non_fatal() {
        let (orchestrator, _provider, store) = setup(IdentityConfig::default());
        store.fail_writes(Table::Profiles, true);

        let report = orchestrator.register(acme(), Role::Supplier).await.unwrap();
        assert!(!report.profile_created);
        assert!(matches!(report.warnings.as_slice(), [EnrichmentWarning::Profile(_)]));
        assert_eq!(store.len(Table::Suppliers), 1);
    }

    #[tokio::test]
    async fn role_record_failure_is_non_fatal() {
        let (orchestrator, _provider, store) = setup(IdentityConfig::default());
        store.fail_writes(Table::Resellers, true);

        let report = orchestrator
            .register(SignupData::new("r@x.com", "s"), Role::Reseller)
            .await
            .unwrap();
        assert_eq!(report.role_handle, None);
        assert!(matches!(
            report.warnings.as_slice(),
            [EnrichmentWarning::RoleRecord { role: Role::Reseller, .. }]
        ));
        assert_eq!(store.len(Table::Users), 1);
    }

    #[tokio::test]
    async fn taken_slug_is_regenerated() {
        let (orchestrator, _provider, store) = setup(IdentityConfig::default());
        store
            .insert(
                Table::Suppliers,
                json!({ "id": SupplierId::new(), "user_id": UserId::new(), "store_slug": "acme-0005" }),
            )
            .await
            .unwrap();

        let report = orchestrator.register(acme(), Role::Supplier).await.unwrap();
        assert_eq!(report.role_handle.as_deref(), Some("acme-0006"));
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn invalid_signup_never_reaches_provider() {
        let (orchestrator, provider, _store) = setup(IdentityConfig::default());

        let err = orchestrator
            .register(SignupData::new("a@x.com", "s"), Role::Supplier)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrationError::Invalid(_)));

        // The email is still free.
        provider.sign_up("a@x.com", "s").await.unwrap();
    }

    #[tokio::test]
    async fn registration_hands_off_through_sign_in() {
        let (orchestrator, provider, _store) = setup(IdentityConfig::default());
        let mut changes = provider.on_session_change();

        let report = orchestrator.register(acme(), Role::Supplier).await.unwrap();
        assert!(report.signed_in);
        match changes.recv().await.unwrap() {
            SessionChange::SignedIn(session) => {
                assert_eq!(session.principal_id, report.credential.id)
            }
            other => panic!("expected SignedIn, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn sign_in_hand_off_can_be_disabled() {
        let config = IdentityConfig {
            sign_in_after_registration: false,
            ..Default::default()
        };
        let (orchestrator, provider, _store) = setup(config);

        let report = orchestrator.register(acme(), Role::Supplier).await.unwrap();
        assert!(!report.signed_in);
        assert_eq!(provider.get_current_session().await.unwrap(), None);
    }

    #[test]
    fn debug_output_redacts_secret() {
        let data = SignupData::new("a@x.com", "hunter2");
        let rendered = format!("{data:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
