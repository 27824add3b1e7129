//! Walks the identity lifecycle against in-memory collaborators:
//! register a supplier, sign in, approve, sign out.

use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::Duration;
use tracing::info;

use bazaar_auth::Role;
use bazaar_infra::record_store::insert;
use bazaar_infra::{IdentityConfig, InMemoryAuthProvider, InMemoryRecordStore, Table};
use bazaar_identity::{SessionManager, SessionPhase, SignupData, UserRecord};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = IdentityConfig::from_env().context("loading configuration")?;
    bazaar_observability::init_with_filter(&config.log_filter);

    let session_ttl = Duration::from_std(config.session_ttl).context("session TTL out of range")?;
    let provider = Arc::new(InMemoryAuthProvider::with_session_ttl(session_ttl));
    let store = Arc::new(InMemoryRecordStore::new());
    let manager = SessionManager::new(provider.clone(), store.clone(), config);

    manager.start().await?;

    let signup = SignupData::new("owner@acme.test", "correct horse")
        .with_name("Ada Owner")
        .with_company("Acme Trading")
        .with_attribute("locale", "fr");
    let report = manager.register(signup, Role::Supplier).await?;
    info!(
        principal_id = %report.credential.id,
        store_slug = report.role_handle.as_deref().unwrap_or("-"),
        warnings = report.warnings.len(),
        "supplier registered"
    );

    let snapshot = manager.settled().await;
    if snapshot.phase() != SessionPhase::ResolvedIdentified {
        bail!("expected a signed-in supplier, got {:?}", snapshot.phase());
    }
    let Some(identity) = snapshot.identity() else {
        bail!("identified snapshot without an identity");
    };
    println!("{}", serde_json::to_string_pretty(identity.as_ref())?);
    println!("landing route: {}", manager.route_for_current());

    // An administrator approves the supplier out of band.
    let approved = UserRecord {
        is_verified: true,
        ..identity.user().clone()
    };
    store.remove(Table::Users, *approved.id.as_uuid());
    insert(store.as_ref(), &approved).await?;
    if let Some(identity) = manager.refresh_identity().await? {
        println!("verified after approval: {}", identity.user().is_verified);
    }

    let outcome = manager.logout().await;
    println!("signed out, redirect to {}", outcome.redirect_to);

    manager.shutdown().await;
    Ok(())
}
