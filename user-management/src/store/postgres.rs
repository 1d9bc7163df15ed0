//! PostgreSQL-backed stores.
//!
//! Consumption relies on conditional `UPDATE ... WHERE used_utc IS NULL` (plus
//! a revision match for invitations), and
//! merging relies on an upsert against the partial unique index on pending
//! emails, so concurrent requests never need an explicit lock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use uuid::Uuid;

use super::{AccessInvitationsStore, SecurityCodeStore};
use crate::models::{AccessInvitations, OrgId, Role, SecurityCode, SpaceId};
use crate::services::ServiceError;

const ORG_KIND: &str = "org";
const SPACE_KIND: &str = "space";

#[derive(Debug, FromRow)]
struct SecurityCodeRow {
    code: String,
    email: String,
    created_utc: DateTime<Utc>,
    expiry_utc: DateTime<Utc>,
    used_utc: Option<DateTime<Utc>>,
}

impl From<SecurityCodeRow> for SecurityCode {
    fn from(row: SecurityCodeRow) -> Self {
        Self {
            code: row.code,
            email: row.email,
            created_at: row.created_utc,
            expires_at: row.expiry_utc,
            used: row.used_utc.is_some(),
        }
    }
}

#[derive(Clone)]
pub struct PgSecurityCodeStore {
    pool: PgPool,
}

impl PgSecurityCodeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SecurityCodeStore for PgSecurityCodeStore {
    async fn insert(&self, code: &SecurityCode) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO security_codes (code, email, created_utc, expiry_utc, used_utc)
            VALUES ($1, $2, $3, $4, NULL)
            "#,
        )
        .bind(&code.code)
        .bind(&code.email)
        .bind(code.created_at)
        .bind(code.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find(&self, code: &str) -> Result<Option<SecurityCode>, ServiceError> {
        let row = sqlx::query_as::<_, SecurityCodeRow>(
            "SELECT code, email, created_utc, expiry_utc, used_utc FROM security_codes WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(SecurityCode::from))
    }

    async fn mark_used(&self, code: &str, now: DateTime<Utc>) -> Result<bool, ServiceError> {
        let result = sqlx::query(
            r#"
            UPDATE security_codes
            SET used_utc = $2
            WHERE code = $1 AND used_utc IS NULL
            "#,
        )
        .bind(code)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[derive(Debug, FromRow)]
struct InvitationRow {
    invitation_id: Uuid,
    email: String,
    org_creation_eligible: bool,
    revision: i64,
}

#[derive(Debug, FromRow)]
struct GrantRow {
    entity_kind: String,
    entity_id: Uuid,
    role_code: String,
}

#[derive(Clone)]
pub struct PgAccessInvitationsStore {
    pool: PgPool,
}

impl PgAccessInvitationsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccessInvitationsStore for PgAccessInvitationsStore {
    async fn find_pending(&self, email: &str) -> Result<Option<AccessInvitations>, ServiceError> {
        let Some(row) = sqlx::query_as::<_, InvitationRow>(
            r#"
            SELECT invitation_id, email, org_creation_eligible, revision
            FROM access_invitations
            WHERE email = $1 AND used_utc IS NULL
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let grants = sqlx::query_as::<_, GrantRow>(
            r#"
            SELECT entity_kind, entity_id, role_code
            FROM access_invitation_grants
            WHERE invitation_id = $1
            "#,
        )
        .bind(row.invitation_id)
        .fetch_all(&self.pool)
        .await?;

        let mut invitations = AccessInvitations::new(row.email);
        invitations.org_creation_eligible = row.org_creation_eligible;
        invitations.revision = row.revision;

        for grant in grants {
            let role: Role = grant
                .role_code
                .parse()
                .map_err(|e: String| ServiceError::Internal(anyhow::anyhow!(e)))?;
            match grant.entity_kind.as_str() {
                ORG_KIND => {
                    invitations
                        .org_access_invitations
                        .entry(OrgId(grant.entity_id))
                        .or_default()
                        .insert(role);
                }
                SPACE_KIND => {
                    invitations
                        .space_access_invitations
                        .entry(SpaceId(grant.entity_id))
                        .or_default()
                        .insert(role);
                }
                other => {
                    return Err(ServiceError::Internal(anyhow::anyhow!(
                        "Unknown grant entity kind: {}",
                        other
                    )));
                }
            }
        }

        Ok(Some(invitations))
    }

    async fn merge(&self, invitations: AccessInvitations) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;

        let invitation_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO access_invitations
                (invitation_id, email, org_creation_eligible, created_utc, revision)
            VALUES ($1, $2, $3, $4, 1)
            ON CONFLICT (email) WHERE used_utc IS NULL
            DO UPDATE SET
                org_creation_eligible =
                    access_invitations.org_creation_eligible OR EXCLUDED.org_creation_eligible,
                revision = access_invitations.revision + 1
            RETURNING invitation_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&invitations.email)
        .bind(invitations.org_creation_eligible)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        let grants = invitations
            .org_role_grants()
            .map(|(org, role)| (ORG_KIND, org.as_uuid(), role))
            .chain(
                invitations
                    .space_role_grants()
                    .map(|(space, role)| (SPACE_KIND, space.as_uuid(), role)),
            );

        for (kind, entity_id, role) in grants {
            sqlx::query(
                r#"
                INSERT INTO access_invitation_grants (invitation_id, entity_kind, entity_id, role_code)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(invitation_id)
            .bind(kind)
            .bind(entity_id)
            .bind(role.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn mark_used(
        &self,
        email: &str,
        revision: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, ServiceError> {
        let result = sqlx::query(
            r#"
            UPDATE access_invitations
            SET used_utc = $3
            WHERE email = $1 AND used_utc IS NULL AND revision = $2
            "#,
        )
        .bind(email)
        .bind(revision)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
