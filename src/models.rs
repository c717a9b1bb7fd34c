use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Row, postgres::PgRow};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Application Schemas (Mapped to Database) ---

/// Role
///
/// The discriminator on `User` that selects behavior and which subtype profile
/// may be attached. Stored as lowercase text in the `role` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Admin,
    #[default]
    Farmer,
    Investor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Farmer => "farmer",
            Role::Investor => "investor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "farmer" => Ok(Role::Farmer),
            "investor" => Ok(Role::Investor),
            _ => Err(()),
        }
    }
}

/// SubtypeRef
///
/// The polymorphic "owns one of" reference from a `User` to its role-specific
/// profile record. Backed by the `userable_type` (tag) and `userable_id`
/// columns; expressed here as a sum type so the application never resolves the
/// association dynamically.
///
/// Invariant: the variant matches the user's role: admins carry `None`,
/// farmers carry `Farmer(id)`, investors carry `Investor(id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum SubtypeRef {
    #[default]
    None,
    Farmer(Uuid),
    Investor(Uuid),
}

impl SubtypeRef {
    /// Rebuilds the reference from the raw discriminator columns.
    /// A tag without an id (or vice versa) is treated as no attachment.
    pub fn from_columns(tag: Option<&str>, id: Option<Uuid>) -> Self {
        match (tag, id) {
            (Some("farmer"), Some(id)) => SubtypeRef::Farmer(id),
            (Some("investor"), Some(id)) => SubtypeRef::Investor(id),
            _ => SubtypeRef::None,
        }
    }

    /// The `(userable_type, userable_id)` column pair for persistence.
    pub fn columns(&self) -> (Option<&'static str>, Option<Uuid>) {
        match self {
            SubtypeRef::None => (None, None),
            SubtypeRef::Farmer(id) => (Some("farmer"), Some(*id)),
            SubtypeRef::Investor(id) => (Some("investor"), Some(*id)),
        }
    }
}

/// User
///
/// The canonical identity record stored in the `users` table. The password
/// hash and the legacy `api_token` column are never serialized into responses.
#[derive(Debug, Clone, Serialize, Deserialize, Default, TS, ToSchema)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    /// Globally unique; enforced by the database constraint, not app locking.
    pub email: String,
    #[serde(skip_serializing, default)]
    #[ts(skip)]
    pub password_hash: String,
    pub phone: String,
    pub role: Role,
    /// Legacy long-lived opaque token assigned at creation. Kept for
    /// compatibility with older clients; never returned in responses.
    #[serde(skip_serializing, default)]
    #[ts(skip)]
    pub api_token: String,
    pub subtype: SubtypeRef,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

// Manual FromRow: `role` is stored as text and the subtype reference spans
// two columns, so the derive cannot map either.
impl FromRow<'_, PgRow> for User {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        let role_str: String = row.try_get("role")?;
        let role = Role::from_str(&role_str).map_err(|_| sqlx::Error::ColumnDecode {
            index: "role".into(),
            source: format!("unknown role '{role_str}'").into(),
        })?;

        let tag: Option<String> = row.try_get("userable_type")?;
        let subtype_id: Option<Uuid> = row.try_get("userable_id")?;

        Ok(User {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            phone: row.try_get("phone")?,
            role,
            api_token: row.try_get("api_token")?,
            subtype: SubtypeRef::from_columns(tag.as_deref(), subtype_id),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Farmer
///
/// Role-specific profile owned 1:1 by a farmer user, created together with the
/// owning user in a single transaction.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default, TS, ToSchema)]
#[ts(export)]
pub struct Farmer {
    pub id: Uuid,
    pub farmer_fname: String,
    pub farmer_lname: String,
    pub farmer_contact: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Investor
///
/// Role-specific profile owned 1:1 by an investor user. The budget range is a
/// free-form range string (e.g. "1000-5000"); the investor type is
/// "individual" or "organization".
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default, TS, ToSchema)]
#[ts(export)]
pub struct Investor {
    pub id: Uuid,
    pub investor_name: String,
    pub investor_contact_no: String,
    pub investor_budget_range: String,
    pub investor_type: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

// --- Internal Write Payloads (Repository Input) ---

/// Field set for inserting a `users` row. Built by the workflow layer only;
/// the password has already been hashed by the time this struct exists.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub phone: String,
    pub role: Role,
    pub api_token: String,
}

/// Subtype profile created (and linked) inside the user-creation transaction.
/// Exactly one variant is selected by the requested role; `None` is only
/// valid for the admin role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewSubtype {
    None,
    Farmer {
        fname: String,
        lname: String,
        contact: String,
    },
    Investor {
        name: String,
        contact_no: String,
        budget_range: String,
        investor_type: String,
    },
}

// --- Request Payloads (Input Schemas) ---

// Request fields are `Option<String>` so that missing fields surface as
// "required" entries in the validation report instead of a serde rejection.
// The validation pass enumerates every field error in one response.

/// RegisterRequest
///
/// Input payload for the public registration endpoint (POST /register).
/// `role` must be "farmer" or "investor"; the optional profile fields fall
/// back to documented defaults when absent.
#[derive(Debug, Clone, Serialize, Deserialize, Default, TS, ToSchema)]
#[ts(export)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub investor_type: Option<String>,
}

/// LoginRequest
///
/// Input payload for POST /login.
#[derive(Debug, Clone, Serialize, Deserialize, Default, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// CreateAccountRequest
///
/// Input payload for the admin-side account creation endpoints
/// (POST /admin/admins, /admin/farmers, /admin/investors). The role is fixed
/// by the route, so there is no role field to validate. Profile fields are
/// honored only where the fixed role has a matching subtype; everything else
/// is ignored rather than written, an explicit allow-list per operation.
#[derive(Debug, Clone, Serialize, Deserialize, Default, TS, ToSchema)]
#[ts(export)]
pub struct CreateAccountRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub farmer_fname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub farmer_lname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub farmer_contact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub investor_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub investor_contact_no: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub investor_budget_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub investor_type: Option<String>,
}

/// UpdateFarmerRequest
///
/// Allow-listed partial update for a farmer profile (PUT /admin/farmers/{id}).
#[derive(Debug, Clone, Serialize, Deserialize, Default, TS, ToSchema)]
#[ts(export)]
pub struct UpdateFarmerRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub farmer_fname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub farmer_lname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub farmer_contact: Option<String>,
}

/// UpdateInvestorRequest
///
/// Allow-listed partial update for an investor profile.
#[derive(Debug, Clone, Serialize, Deserialize, Default, TS, ToSchema)]
#[ts(export)]
pub struct UpdateInvestorRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub investor_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub investor_contact_no: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub investor_budget_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub investor_type: Option<String>,
}

// --- Response Schemas (Output) ---

/// AuthPayload
///
/// The `data` payload returned by register and login: the user, the plaintext
/// bearer token (returned exactly once), a fixed token type label and the
/// expiry hint in minutes.
#[derive(Debug, Clone, Serialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthPayload {
    pub user: User,
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// ApiResponse
///
/// The stable success envelope every caller depends on:
/// `{status: "success", message?, data?}`. Error envelopes (with their
/// `errors` map) are rendered by `ApiError` instead.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        ApiResponse {
            status: "success",
            message: Some(message.into()),
            data: Some(data),
        }
    }

    /// Envelope without a message line, used by side-effect-free reads.
    pub fn data_only(data: T) -> Self {
        ApiResponse {
            status: "success",
            message: None,
            data: Some(data),
        }
    }

    /// Envelope with no payload, used by operations whose only output is
    /// their side effect (e.g. logout).
    pub fn message_only(message: impl Into<String>) -> Self {
        ApiResponse {
            status: "success",
            message: Some(message.into()),
            data: None,
        }
    }
}
