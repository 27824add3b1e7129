//! Normalized identity records and the composed [`ExtendedIdentity`] view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tracing::warn;

use bazaar_auth::{route_for, Principal, Role};
use bazaar_core::{Entity, ProfileId, ResellerId, SupplierId, UserId};
use bazaar_infra::{Record, Table};

// ─────────────────────────────────────────────────────────────────────────────
// User Record
// ─────────────────────────────────────────────────────────────────────────────

/// Core, authorization-relevant identity record.
///
/// # Invariants
/// - `id` equals the credential's principal id (exactly one per credential).
/// - `role` is fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub is_verified: bool,
    pub is_active: bool,
    pub is_locked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    /// A fresh, active account. Roles that need approval start unverified.
    pub fn new(
        id: UserId,
        email: impl Into<String>,
        name: impl Into<String>,
        role: Role,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            email: email.into(),
            name: name.into(),
            role,
            is_verified: !role.requires_verification(),
            is_active: true,
            is_locked: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn principal(&self) -> Principal {
        Principal {
            principal_id: self.id.into(),
            role: self.role,
            is_verified: self.is_verified,
            is_active: self.is_active,
            is_locked: self.is_locked,
        }
    }
}

impl Entity for UserRecord {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Record for UserRecord {
    const TABLE: Table = Table::Users;
}

// ─────────────────────────────────────────────────────────────────────────────
// User Profile
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum KycStatus {
    #[default]
    Pending,
    Submitted,
    Verified,
    Rejected,
}

/// Optional locale/currency/KYC enrichment (0 or 1 per user).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: ProfileId,
    pub user_id: UserId,
    pub locale: String,
    pub currency: String,
    pub kyc_status: KycStatus,
    /// Free-form signup attributes.
    #[serde(default)]
    pub metadata: Map<String, JsonValue>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for UserProfile {
    type Id = ProfileId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Record for UserProfile {
    const TABLE: Table = Table::Profiles;
}

// ─────────────────────────────────────────────────────────────────────────────
// Role-specific Records
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceTier {
    #[default]
    Bronze,
    Silver,
    Gold,
    Platinum,
}

/// Storefront data; exists iff the user's role is `supplier`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierRecord {
    pub id: SupplierId,
    pub user_id: UserId,
    pub company_name: String,
    /// URL-safe, unique store identifier.
    pub store_slug: String,
    pub performance_tier: PerformanceTier,
    pub created_at: DateTime<Utc>,
}

impl Entity for SupplierRecord {
    type Id = SupplierId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Record for SupplierRecord {
    const TABLE: Table = Table::Suppliers;
}

/// Referral/commission data; exists iff the user's role is `reseller`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResellerRecord {
    pub id: ResellerId,
    pub user_id: UserId,
    pub referral_code: String,
    /// Commission in basis points (1000 = 10%).
    pub commission_bps: u32,
    pub performance_tier: PerformanceTier,
    pub created_at: DateTime<Utc>,
}

impl Entity for ResellerRecord {
    type Id = ResellerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Record for ResellerRecord {
    const TABLE: Table = Table::Resellers;
}

/// The single role-specific record a user may carry.
///
/// Modeled as one enum so an identity can never hold both kinds at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoleRecord {
    Supplier(SupplierRecord),
    Reseller(ResellerRecord),
}

impl RoleRecord {
    pub fn role(&self) -> Role {
        match self {
            RoleRecord::Supplier(_) => Role::Supplier,
            RoleRecord::Reseller(_) => Role::Reseller,
        }
    }

    pub fn owner(&self) -> UserId {
        match self {
            RoleRecord::Supplier(s) => s.user_id,
            RoleRecord::Reseller(r) => r.user_id,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Extended Identity
// ─────────────────────────────────────────────────────────────────────────────

/// Composed, read-only runtime view of a signed-in user.
///
/// # Invariants
/// - `supplier()` is `Some` only if `role == supplier`; `reseller()` only if
///   `role == reseller`; never both.
/// - Auxiliary records always belong to `user`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtendedIdentity {
    user: UserRecord,
    profile: Option<UserProfile>,
    role_record: Option<RoleRecord>,
}

impl ExtendedIdentity {
    /// Assemble an identity, discarding auxiliary records that do not belong
    /// to `user` or do not match its role.
    pub fn new(
        user: UserRecord,
        profile: Option<UserProfile>,
        role_record: Option<RoleRecord>,
    ) -> Self {
        let profile = profile.filter(|p| {
            let owned = p.user_id == user.id;
            if !owned {
                warn!(principal_id = %user.id, profile_owner = %p.user_id, "dropping foreign profile");
            }
            owned
        });

        let role_record = role_record.filter(|r| {
            let matches = r.role() == user.role && r.owner() == user.id;
            if !matches {
                warn!(
                    principal_id = %user.id,
                    role = %user.role,
                    record_role = %r.role(),
                    "dropping role record that does not match the user"
                );
            }
            matches
        });

        Self {
            user,
            profile,
            role_record,
        }
    }

    pub fn user(&self) -> &UserRecord {
        &self.user
    }

    pub fn id(&self) -> UserId {
        self.user.id
    }

    pub fn role(&self) -> Role {
        self.user.role
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    pub fn role_record(&self) -> Option<&RoleRecord> {
        self.role_record.as_ref()
    }

    pub fn supplier(&self) -> Option<&SupplierRecord> {
        match &self.role_record {
            Some(RoleRecord::Supplier(s)) => Some(s),
            _ => None,
        }
    }

    pub fn reseller(&self) -> Option<&ResellerRecord> {
        match &self.role_record {
            Some(RoleRecord::Reseller(r)) => Some(r),
            _ => None,
        }
    }

    pub fn principal(&self) -> Principal {
        self.user.principal()
    }

    pub fn landing_route(&self) -> &'static str {
        route_for(Some(self.user.role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn user(role: Role) -> UserRecord {
        UserRecord::new(UserId::new(), "a@x.com", "Ada", role, Utc::now())
    }

    fn supplier_for(owner: UserId) -> RoleRecord {
        RoleRecord::Supplier(SupplierRecord {
            id: SupplierId::new(),
            user_id: owner,
            company_name: "Acme".to_string(),
            store_slug: "acme-0001".to_string(),
            performance_tier: PerformanceTier::default(),
            created_at: Utc::now(),
        })
    }

    fn reseller_for(owner: UserId) -> RoleRecord {
        RoleRecord::Reseller(ResellerRecord {
            id: ResellerId::new(),
            user_id: owner,
            referral_code: "ADA0001".to_string(),
            commission_bps: 1_000,
            performance_tier: PerformanceTier::default(),
            created_at: Utc::now(),
        })
    }

    fn profile_for(owner: UserId) -> UserProfile {
        UserProfile {
            id: ProfileId::new(),
            user_id: owner,
            locale: "en".to_string(),
            currency: "USD".to_string(),
            kyc_status: KycStatus::Pending,
            metadata: Map::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn only_suppliers_start_unverified() {
        assert!(!user(Role::Supplier).is_verified);
        assert!(user(Role::Client).is_verified);
        assert!(user(Role::Reseller).is_verified);
    }

    #[test]
    fn matching_role_record_is_kept() {
        let u = user(Role::Supplier);
        let identity = ExtendedIdentity::new(u.clone(), Some(profile_for(u.id)), Some(supplier_for(u.id)));
        assert!(identity.supplier().is_some());
        assert!(identity.reseller().is_none());
        assert!(identity.profile().is_some());
        assert_eq!(identity.landing_route(), "/supplier/dashboard");
    }

    #[test]
    fn mismatched_role_record_is_dropped() {
        let u = user(Role::Client);
        let identity = ExtendedIdentity::new(u.clone(), None, Some(supplier_for(u.id)));
        assert!(identity.role_record().is_none());
    }

    #[test]
    fn foreign_records_are_dropped() {
        let u = user(Role::Reseller);
        let other = UserId::new();
        let identity = ExtendedIdentity::new(u, Some(profile_for(other)), Some(reseller_for(other)));
        assert!(identity.profile().is_none());
        assert!(identity.reseller().is_none());
    }

    #[test]
    fn role_record_serializes_with_kind_tag() {
        let owner = UserId::new();
        let json = serde_json::to_value(supplier_for(owner)).unwrap();
        assert_eq!(json["kind"], "supplier");
        assert_eq!(json["store_slug"], "acme-0001");
    }

    proptest! {
        #[test]
        fn role_records_are_exclusive(role_idx in 0usize..7, offer_supplier: bool, offer_reseller: bool, pick_supplier: bool) {
            let u = user(Role::ALL[role_idx]);
            let offered = match (offer_supplier, offer_reseller) {
                (true, true) if pick_supplier => Some(supplier_for(u.id)),
                (true, true) => Some(reseller_for(u.id)),
                (true, false) => Some(supplier_for(u.id)),
                (false, true) => Some(reseller_for(u.id)),
                (false, false) => None,
            };
            let identity = ExtendedIdentity::new(u, None, offered);

            prop_assert!(identity.supplier().is_none() || identity.role() == Role::Supplier);
            prop_assert!(identity.reseller().is_none() || identity.role() == Role::Reseller);
            prop_assert!(identity.supplier().is_none() || identity.reseller().is_none());
        }
    }
}
