use crate::models::{
    Farmer, Investor, NewSubtype, NewUser, Role, UpdateFarmerRequest, UpdateInvestorRequest, User,
};
use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Row};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// RepoError
///
/// Failures the persistence layer can report. Uniqueness violations get their
/// own variant because the workflows treat them differently from
/// infrastructure failures (generic error on the public path, field error on
/// the trusted admin paths).
#[derive(Debug, Error)]
pub enum RepoError {
    /// The `users.email` uniqueness constraint rejected the write. This is
    /// the only cross-request invariant; it is enforced by the database, not
    /// by application-level locking.
    #[error("email already registered")]
    DuplicateEmail,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Repository Trait
///
/// The abstract contract for all persistence operations: the credential
/// store, the token store, and the role-scoped account management queries.
/// Handlers depend on this trait only, which keeps them testable against
/// in-memory mocks.
///
/// **Send + Sync + async_trait** make the trait object (`Arc<dyn Repository>`)
/// shareable across Axum's asynchronous task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Credential Store ---

    /// Inserts the user row and, in the same transaction, creates and links
    /// the subtype profile. All-or-nothing: a failure on either write leaves
    /// no partially-created user behind.
    async fn create_user(&self, new: NewUser, subtype: NewSubtype) -> Result<User, RepoError>;
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepoError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepoError>;

    // --- Token Store ---

    /// Persists a token digest for the user and returns the new token row id.
    async fn insert_token(&self, user_id: Uuid, token_digest: &str) -> Result<Uuid, RepoError>;
    /// Resolves an unrevoked token digest to its owner and the token row id.
    async fn find_user_by_token(
        &self,
        token_digest: &str,
    ) -> Result<Option<(User, Uuid)>, RepoError>;
    /// Revokes every live token for the user; returns how many were revoked.
    /// Idempotent; already-revoked tokens are simply not matched.
    async fn revoke_all_tokens(&self, user_id: Uuid) -> Result<u64, RepoError>;
    /// Revokes a single token. Idempotent.
    async fn revoke_token(&self, token_id: Uuid) -> Result<(), RepoError>;

    // --- Role-Scoped Account Management ---

    async fn list_users_by_role(&self, role: Role) -> Result<Vec<User>, RepoError>;
    /// Lookup scoped to a role: an id that exists under a different role is
    /// a miss, never a leak of the other record.
    async fn find_user_in_role(&self, id: Uuid, role: Role) -> Result<Option<User>, RepoError>;
    async fn get_farmer(&self, id: Uuid) -> Result<Option<Farmer>, RepoError>;
    async fn get_investor(&self, id: Uuid) -> Result<Option<Investor>, RepoError>;
    async fn update_farmer(
        &self,
        profile_id: Uuid,
        req: UpdateFarmerRequest,
    ) -> Result<Option<Farmer>, RepoError>;
    async fn update_investor(
        &self,
        profile_id: Uuid,
        req: UpdateInvestorRequest,
    ) -> Result<Option<Investor>, RepoError>;
    /// Deletes the user, its tokens and its subtype profile in one
    /// transaction (cascade-delete policy). Returns false when no user with
    /// that id exists under the given role.
    async fn delete_user(&self, id: Uuid, role: Role) -> Result<bool, RepoError>;
}

/// RepositoryState
///
/// The concrete type used to share persistence access across the application
/// state.
pub type RepositoryState = Arc<dyn Repository>;

const USER_COLUMNS: &str = "id, name, email, password_hash, phone, role, api_token, \
     userable_type, userable_id, created_at, updated_at";

const USER_COLUMNS_QUALIFIED: &str = "u.id, u.name, u.email, u.password_hash, u.phone, u.role, \
     u.api_token, u.userable_type, u.userable_id, u.created_at, u.updated_at";

const FARMER_COLUMNS: &str =
    "id, farmer_fname, farmer_lname, farmer_contact, created_at, updated_at";

const INVESTOR_COLUMNS: &str = "id, investor_name, investor_contact_no, investor_budget_range, \
     investor_type, created_at, updated_at";

fn map_insert_error(e: sqlx::Error) -> RepoError {
    if let sqlx::Error::Database(ref db) = e {
        if db.is_unique_violation() {
            return RepoError::DuplicateEmail;
        }
    }
    RepoError::Database(e)
}

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by a
/// Postgres connection pool. All mutations are persisted synchronously
/// before the call returns; there are no background writes.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    /// create_user
    ///
    /// User insert, subtype insert and the polymorphic link update run inside
    /// one transaction: a crash or error between the steps cannot leave an
    /// orphaned, subtype-less farmer/investor user visible to later logins.
    async fn create_user(&self, new: NewUser, subtype: NewSubtype) -> Result<User, RepoError> {
        let mut tx = self.pool.begin().await?;

        let user_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, phone, role, api_token, \
                 created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, NOW(), NOW())",
        )
        .bind(user_id)
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.phone)
        .bind(new.role.as_str())
        .bind(&new.api_token)
        .execute(&mut *tx)
        .await
        .map_err(map_insert_error)?;

        match subtype {
            NewSubtype::None => {}
            NewSubtype::Farmer {
                fname,
                lname,
                contact,
            } => {
                let profile_id = Uuid::new_v4();
                sqlx::query(
                    "INSERT INTO farmers (id, farmer_fname, farmer_lname, farmer_contact, \
                         created_at, updated_at) \
                     VALUES ($1, $2, $3, $4, NOW(), NOW())",
                )
                .bind(profile_id)
                .bind(&fname)
                .bind(&lname)
                .bind(&contact)
                .execute(&mut *tx)
                .await?;

                sqlx::query(
                    "UPDATE users SET userable_type = 'farmer', userable_id = $2, \
                         updated_at = NOW() WHERE id = $1",
                )
                .bind(user_id)
                .bind(profile_id)
                .execute(&mut *tx)
                .await?;
            }
            NewSubtype::Investor {
                name,
                contact_no,
                budget_range,
                investor_type,
            } => {
                let profile_id = Uuid::new_v4();
                sqlx::query(
                    "INSERT INTO investors (id, investor_name, investor_contact_no, \
                         investor_budget_range, investor_type, created_at, updated_at) \
                     VALUES ($1, $2, $3, $4, $5, NOW(), NOW())",
                )
                .bind(profile_id)
                .bind(&name)
                .bind(&contact_no)
                .bind(&budget_range)
                .bind(&investor_type)
                .execute(&mut *tx)
                .await?;

                sqlx::query(
                    "UPDATE users SET userable_type = 'investor', userable_id = $2, \
                         updated_at = NOW() WHERE id = $1",
                )
                .bind(user_id)
                .bind(profile_id)
                .execute(&mut *tx)
                .await?;
            }
        }

        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn insert_token(&self, user_id: Uuid, token_digest: &str) -> Result<Uuid, RepoError> {
        let token_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO access_tokens (id, user_id, token_hash, created_at) \
             VALUES ($1, $2, $3, NOW())",
        )
        .bind(token_id)
        .bind(user_id)
        .bind(token_digest)
        .execute(&self.pool)
        .await?;
        Ok(token_id)
    }

    async fn find_user_by_token(
        &self,
        token_digest: &str,
    ) -> Result<Option<(User, Uuid)>, RepoError> {
        let sql = format!(
            "SELECT {USER_COLUMNS_QUALIFIED}, t.id AS token_id \
             FROM access_tokens t \
             JOIN users u ON u.id = t.user_id \
             WHERE t.token_hash = $1 AND t.revoked_at IS NULL"
        );
        let row = sqlx::query(&sql)
            .bind(token_digest)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let token_id: Uuid = row.try_get("token_id")?;
                let user = User::from_row(&row)?;
                Ok(Some((user, token_id)))
            }
            None => Ok(None),
        }
    }

    async fn revoke_all_tokens(&self, user_id: Uuid) -> Result<u64, RepoError> {
        let result = sqlx::query(
            "UPDATE access_tokens SET revoked_at = NOW() \
             WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn revoke_token(&self, token_id: Uuid) -> Result<(), RepoError> {
        // Matching zero rows (already revoked, or never existed) is not an
        // error: revocation is idempotent.
        sqlx::query(
            "UPDATE access_tokens SET revoked_at = NOW() \
             WHERE id = $1 AND revoked_at IS NULL",
        )
        .bind(token_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_users_by_role(&self, role: Role) -> Result<Vec<User>, RepoError> {
        let sql =
            format!("SELECT {USER_COLUMNS} FROM users WHERE role = $1 ORDER BY created_at DESC");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(role.as_str())
            .fetch_all(&self.pool)
            .await?)
    }

    async fn find_user_in_role(&self, id: Uuid, role: Role) -> Result<Option<User>, RepoError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND role = $2");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(role.as_str())
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn get_farmer(&self, id: Uuid) -> Result<Option<Farmer>, RepoError> {
        let sql = format!("SELECT {FARMER_COLUMNS} FROM farmers WHERE id = $1");
        Ok(sqlx::query_as::<_, Farmer>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn get_investor(&self, id: Uuid) -> Result<Option<Investor>, RepoError> {
        let sql = format!("SELECT {INVESTOR_COLUMNS} FROM investors WHERE id = $1");
        Ok(sqlx::query_as::<_, Investor>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// update_farmer
    ///
    /// COALESCE keeps partial updates to one round trip: a column only
    /// changes when the corresponding request field is `Some`.
    async fn update_farmer(
        &self,
        profile_id: Uuid,
        req: UpdateFarmerRequest,
    ) -> Result<Option<Farmer>, RepoError> {
        let sql = format!(
            "UPDATE farmers \
             SET farmer_fname = COALESCE($2, farmer_fname), \
                 farmer_lname = COALESCE($3, farmer_lname), \
                 farmer_contact = COALESCE($4, farmer_contact), \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {FARMER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Farmer>(&sql)
            .bind(profile_id)
            .bind(req.farmer_fname)
            .bind(req.farmer_lname)
            .bind(req.farmer_contact)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_investor(
        &self,
        profile_id: Uuid,
        req: UpdateInvestorRequest,
    ) -> Result<Option<Investor>, RepoError> {
        let sql = format!(
            "UPDATE investors \
             SET investor_name = COALESCE($2, investor_name), \
                 investor_contact_no = COALESCE($3, investor_contact_no), \
                 investor_budget_range = COALESCE($4, investor_budget_range), \
                 investor_type = COALESCE($5, investor_type), \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {INVESTOR_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Investor>(&sql)
            .bind(profile_id)
            .bind(req.investor_name)
            .bind(req.investor_contact_no)
            .bind(req.investor_budget_range)
            .bind(req.investor_type)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// delete_user
    ///
    /// Cascade-delete: the subtype profile and all tokens go with the user,
    /// in one transaction, so no orphaned profile rows remain.
    async fn delete_user(&self, id: Uuid, role: Role) -> Result<bool, RepoError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT userable_type, userable_id FROM users WHERE id = $1 AND role = $2",
        )
        .bind(id)
        .bind(role.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(false);
        };
        let tag: Option<String> = row.try_get("userable_type")?;
        let profile_id: Option<Uuid> = row.try_get("userable_id")?;

        sqlx::query("DELETE FROM access_tokens WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        match (tag.as_deref(), profile_id) {
            (Some("farmer"), Some(profile_id)) => {
                sqlx::query("DELETE FROM farmers WHERE id = $1")
                    .bind(profile_id)
                    .execute(&mut *tx)
                    .await?;
            }
            (Some("investor"), Some(profile_id)) => {
                sqlx::query("DELETE FROM investors WHERE id = $1")
                    .bind(profile_id)
                    .execute(&mut *tx)
                    .await?;
            }
            _ => {}
        }

        tx.commit().await?;
        Ok(true)
    }
}
