use crate::{
    AppState,
    auth::{self, AuthUser},
    error::ApiError,
    models::{
        ApiResponse, AuthPayload, CreateAccountRequest, LoginRequest, NewSubtype, NewUser,
        RegisterRequest, Role, SubtypeRef, UpdateFarmerRequest, UpdateInvestorRequest, User,
    },
    repository::RepoError,
    validate::{
        self, FieldErrors, ValidAccount, validate_create_account, validate_login,
        validate_registration,
    },
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::{Value, json};
use uuid::Uuid;

// --- Shared Workflow Steps ---

fn require_admin(auth: &AuthUser) -> Result<(), ApiError> {
    if auth.role != Role::Admin {
        return Err(ApiError::Forbidden);
    }
    Ok(())
}

/// Turns a validated account into the insert payload. The plaintext password
/// stops existing here: only the argon2 hash travels further.
fn build_new_user(
    account: &ValidAccount,
    role: Role,
) -> Result<NewUser, argon2::password_hash::Error> {
    Ok(NewUser {
        name: account.name.clone(),
        email: account.email.clone(),
        password_hash: auth::hash_password(&account.password)?,
        phone: account.phone.clone(),
        role,
        api_token: auth::generate_token(),
    })
}

/// Generates a fresh opaque token, stores its digest, and returns the
/// plaintext, the only time it is ever visible.
async fn issue_token(state: &AppState, user_id: Uuid) -> Result<String, RepoError> {
    let token = auth::generate_token();
    state
        .repo
        .insert_token(user_id, &auth::token_digest(&token))
        .await?;
    Ok(token)
}

fn auth_payload(state: &AppState, user: User, token: String) -> AuthPayload {
    AuthPayload {
        user,
        token,
        token_type: auth::TOKEN_TYPE.to_string(),
        expires_in: state.config.token_ttl_minutes,
    }
}

/// Account creation for the trusted admin-side paths. Unlike the public
/// registration path, a duplicate email here comes back as a field error;
/// admins already know which accounts exist.
async fn create_role_account(
    state: &AppState,
    account: ValidAccount,
    role: Role,
    subtype: NewSubtype,
    failure: &'static str,
) -> Result<User, ApiError> {
    let new_user = build_new_user(&account, role).map_err(|e| ApiError::internal(failure, e))?;
    match state.repo.create_user(new_user, subtype).await {
        Ok(user) => Ok(user),
        Err(RepoError::DuplicateEmail) => Err(ApiError::Validation(FieldErrors::single(
            "email",
            "The email has already been taken.",
        ))),
        Err(e) => Err(ApiError::internal(failure, e)),
    }
}

/// Selects the subtype profile for a public registration, applying the
/// documented defaults for absent optional fields. `role` is farmer or
/// investor here; validation has already rejected everything else.
fn registration_subtype(role: Role, req: &RegisterRequest, account: &ValidAccount) -> NewSubtype {
    match role {
        Role::Farmer => NewSubtype::Farmer {
            fname: account.name.clone(),
            lname: account.name.clone(),
            contact: req.contact.clone().unwrap_or_default(),
        },
        Role::Investor => NewSubtype::Investor {
            name: account.name.clone(),
            contact_no: req.contact.clone().unwrap_or_default(),
            budget_range: req.budget_range.clone().unwrap_or_else(|| "0-0".to_string()),
            investor_type: req
                .investor_type
                .clone()
                .unwrap_or_else(|| "individual".to_string()),
        },
        Role::Admin => NewSubtype::None,
    }
}

// --- Session Workflow ---

/// register
///
/// [Public Route] Validate → CreateUser → AttachSubtype → IssueToken →
/// Respond. The user and its subtype profile are written in one transaction;
/// the uniqueness race on email surfaces as a generic "Registration failed"
/// so the public endpoint never confirms whether an address is taken.
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = AuthPayload),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AuthPayload>>), ApiError> {
    let (account, role) = validate_registration(&payload).map_err(ApiError::Validation)?;
    let subtype = registration_subtype(role, &payload, &account);

    let new_user = build_new_user(&account, role)
        .map_err(|e| ApiError::internal("Registration failed", e))?;
    let user = state
        .repo
        .create_user(new_user, subtype)
        .await
        .map_err(|e| ApiError::internal("Registration failed", e))?;

    let token = issue_token(&state, user.id)
        .await
        .map_err(|e| ApiError::internal("Registration failed", e))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            "Registration successful",
            auth_payload(&state, user, token),
        )),
    ))
}

/// login
///
/// [Public Route] Authenticates credentials and rotates tokens: every
/// existing token for the user is revoked before exactly one new token is
/// issued, so older sessions die on every new login. Failures are a single
/// generic 401 with no hint about which field was wrong.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthPayload),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<AuthPayload>>, ApiError> {
    let (email, password) = validate_login(&payload).map_err(ApiError::Validation)?;

    let user = match state
        .repo
        .find_user_by_email(&email)
        .await
        .map_err(|e| ApiError::internal("Login failed", e))?
    {
        Some(user) => user,
        None => {
            // Burn a verification on a throwaway hash so an unknown email
            // costs the same as a wrong password; response timing must not
            // reveal which addresses are registered.
            auth::verify_password(&password, auth::dummy_hash());
            return Err(ApiError::InvalidCredentials);
        }
    };

    if !auth::verify_password(&password, &user.password_hash) {
        return Err(ApiError::InvalidCredentials);
    }

    // Revocation completes before the new token exists; the single-active-
    // session-per-login policy depends on this ordering.
    state
        .repo
        .revoke_all_tokens(user.id)
        .await
        .map_err(|e| ApiError::internal("Login failed", e))?;
    let token = issue_token(&state, user.id)
        .await
        .map_err(|e| ApiError::internal("Login failed", e))?;

    Ok(Json(ApiResponse::success(
        "Login successful",
        auth_payload(&state, user, token),
    )))
}

/// logout
///
/// [Authenticated Route] Revokes only the token used for this request; other
/// sessions for the same user remain valid.
#[utoipa::path(
    post,
    path = "/logout",
    responses((status = 200, description = "Logged out"))
)]
pub async fn logout(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    state
        .repo
        .revoke_token(auth.token_id)
        .await
        .map_err(|e| ApiError::internal("Logout failed", e))?;
    Ok(Json(ApiResponse::message_only("Logged out successfully")))
}

/// me
///
/// [Authenticated Route] Returns the authenticated user's record. No side
/// effects.
#[utoipa::path(
    get,
    path = "/me",
    responses((status = 200, description = "Current user", body = User))
)]
pub async fn me(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let user = state
        .repo
        .get_user(auth.id)
        .await
        .map_err(|e| ApiError::internal("Profile lookup failed", e))?
        // The token resolved but the user is gone: treat as a dead session.
        .ok_or(ApiError::Unauthenticated)?;
    Ok(Json(ApiResponse::data_only(user)))
}

// --- Admin Accounts ---

/// create_admin
///
/// [Admin Route] Admin-creation path: role is fixed to admin and no subtype
/// profile is attached (`SubtypeRef::None` is the one permitted exception to
/// the subtype invariant).
#[utoipa::path(
    post,
    path = "/admin/admins",
    request_body = CreateAccountRequest,
    responses(
        (status = 201, description = "Admin created", body = User),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn create_admin(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Value>>), ApiError> {
    require_admin(&auth)?;
    let account =
        validate_create_account(&payload, Role::Admin).map_err(ApiError::Validation)?;
    let user = create_role_account(
        &state,
        account,
        Role::Admin,
        NewSubtype::None,
        "Error creating admin user",
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            "Admin user created successfully",
            json!({ "admin": user }),
        )),
    ))
}

/// list_admins
///
/// [Admin Route] Lists all admin users.
#[utoipa::path(
    get,
    path = "/admin/admins",
    responses((status = 200, description = "Admin users", body = [User]))
)]
pub async fn list_admins(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    require_admin(&auth)?;
    let admins = state
        .repo
        .list_users_by_role(Role::Admin)
        .await
        .map_err(|e| ApiError::internal("Error retrieving admin list", e))?;
    Ok(Json(ApiResponse::data_only(json!({ "admins": admins }))))
}

// --- Farmer Accounts ---

/// list_farmers
///
/// [Admin Route] Lists all farmer users.
#[utoipa::path(
    get,
    path = "/admin/farmers",
    responses((status = 200, description = "Farmer users", body = [User]))
)]
pub async fn list_farmers(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    require_admin(&auth)?;
    let farmers = state
        .repo
        .list_users_by_role(Role::Farmer)
        .await
        .map_err(|e| ApiError::internal("Error retrieving farmers list", e))?;
    Ok(Json(ApiResponse::data_only(json!({ "farmers": farmers }))))
}

/// get_farmer_details
///
/// [Admin Route] Role-scoped lookup: an id that exists under a different role
/// is a 404, never a leak of the other record. Returns the user together
/// with its linked profile.
#[utoipa::path(
    get,
    path = "/admin/farmers/{id}",
    params(("id" = Uuid, Path, description = "Farmer user ID")),
    responses(
        (status = 200, description = "Farmer", body = User),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_farmer_details(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    require_admin(&auth)?;
    let user = state
        .repo
        .find_user_in_role(id, Role::Farmer)
        .await
        .map_err(|e| ApiError::internal("Error retrieving farmer details", e))?
        .ok_or(ApiError::NotFound("Farmer"))?;

    let profile = match user.subtype {
        SubtypeRef::Farmer(profile_id) => state
            .repo
            .get_farmer(profile_id)
            .await
            .map_err(|e| ApiError::internal("Error retrieving farmer details", e))?,
        _ => None,
    };

    Ok(Json(ApiResponse::data_only(
        json!({ "farmer": user, "profile": profile }),
    )))
}

/// store_farmer
///
/// [Admin Route] Creates a farmer account plus profile through the same
/// transactional path as public registration, but with every writable field
/// named explicitly, no raw request passthrough.
#[utoipa::path(
    post,
    path = "/admin/farmers",
    request_body = CreateAccountRequest,
    responses(
        (status = 201, description = "Farmer created", body = User),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn store_farmer(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Value>>), ApiError> {
    require_admin(&auth)?;
    let account =
        validate_create_account(&payload, Role::Farmer).map_err(ApiError::Validation)?;

    let subtype = NewSubtype::Farmer {
        fname: payload
            .farmer_fname
            .clone()
            .unwrap_or_else(|| account.name.clone()),
        lname: payload
            .farmer_lname
            .clone()
            .unwrap_or_else(|| account.name.clone()),
        contact: payload.farmer_contact.clone().unwrap_or_default(),
    };
    let user =
        create_role_account(&state, account, Role::Farmer, subtype, "Error creating farmer")
            .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            "Farmer created successfully",
            json!({ "farmer": user }),
        )),
    ))
}

/// update_farmer
///
/// [Admin Route] Partial update of the farmer's profile fields. Only the
/// allow-listed profile columns can change; identity fields are untouchable
/// through this endpoint.
#[utoipa::path(
    put,
    path = "/admin/farmers/{id}",
    params(("id" = Uuid, Path, description = "Farmer user ID")),
    request_body = UpdateFarmerRequest,
    responses(
        (status = 200, description = "Updated"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_farmer(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateFarmerRequest>,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    require_admin(&auth)?;
    validate::validate_farmer_update(
        payload.farmer_fname.as_ref(),
        payload.farmer_lname.as_ref(),
        payload.farmer_contact.as_ref(),
    )
    .map_err(ApiError::Validation)?;

    let user = state
        .repo
        .find_user_in_role(id, Role::Farmer)
        .await
        .map_err(|e| ApiError::internal("Error updating farmer", e))?
        .ok_or(ApiError::NotFound("Farmer"))?;
    let SubtypeRef::Farmer(profile_id) = user.subtype else {
        return Err(ApiError::NotFound("Farmer profile"));
    };

    let profile = state
        .repo
        .update_farmer(profile_id, payload)
        .await
        .map_err(|e| ApiError::internal("Error updating farmer", e))?
        .ok_or(ApiError::NotFound("Farmer profile"))?;

    Ok(Json(ApiResponse::success(
        "Farmer updated successfully",
        json!({ "farmer": user, "profile": profile }),
    )))
}

/// delete_farmer
///
/// [Admin Route] Deletes the farmer user, its tokens and its profile in one
/// transaction (cascade-delete). 204 carries no body.
#[utoipa::path(
    delete,
    path = "/admin/farmers/{id}",
    params(("id" = Uuid, Path, description = "Farmer user ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_farmer(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    require_admin(&auth)?;
    let deleted = state
        .repo
        .delete_user(id, Role::Farmer)
        .await
        .map_err(|e| ApiError::internal("Error deleting farmer", e))?;
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Farmer"))
    }
}

// --- Investor Accounts ---

/// list_investors
///
/// [Admin Route] Lists all investor users.
#[utoipa::path(
    get,
    path = "/admin/investors",
    responses((status = 200, description = "Investor users", body = [User]))
)]
pub async fn list_investors(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    require_admin(&auth)?;
    let investors = state
        .repo
        .list_users_by_role(Role::Investor)
        .await
        .map_err(|e| ApiError::internal("Error retrieving investors list", e))?;
    Ok(Json(ApiResponse::data_only(
        json!({ "investors": investors }),
    )))
}

/// get_investor_details
///
/// [Admin Route] Role-scoped lookup, symmetric with the farmer path.
#[utoipa::path(
    get,
    path = "/admin/investors/{id}",
    params(("id" = Uuid, Path, description = "Investor user ID")),
    responses(
        (status = 200, description = "Investor", body = User),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_investor_details(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    require_admin(&auth)?;
    let user = state
        .repo
        .find_user_in_role(id, Role::Investor)
        .await
        .map_err(|e| ApiError::internal("Error retrieving investor details", e))?
        .ok_or(ApiError::NotFound("Investor"))?;

    let profile = match user.subtype {
        SubtypeRef::Investor(profile_id) => state
            .repo
            .get_investor(profile_id)
            .await
            .map_err(|e| ApiError::internal("Error retrieving investor details", e))?,
        _ => None,
    };

    Ok(Json(ApiResponse::data_only(
        json!({ "investor": user, "profile": profile }),
    )))
}

/// store_investor
///
/// [Admin Route] Creates an investor account plus profile, allow-listed
/// fields only, with the same defaulting policy as public registration.
#[utoipa::path(
    post,
    path = "/admin/investors",
    request_body = CreateAccountRequest,
    responses(
        (status = 201, description = "Investor created", body = User),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn store_investor(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Value>>), ApiError> {
    require_admin(&auth)?;
    let account =
        validate_create_account(&payload, Role::Investor).map_err(ApiError::Validation)?;

    let subtype = NewSubtype::Investor {
        name: payload
            .investor_name
            .clone()
            .unwrap_or_else(|| account.name.clone()),
        contact_no: payload.investor_contact_no.clone().unwrap_or_default(),
        budget_range: payload
            .investor_budget_range
            .clone()
            .unwrap_or_else(|| "0-0".to_string()),
        investor_type: payload
            .investor_type
            .clone()
            .unwrap_or_else(|| "individual".to_string()),
    };
    let user = create_role_account(
        &state,
        account,
        Role::Investor,
        subtype,
        "Error creating investor",
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            "Investor created successfully",
            json!({ "investor": user }),
        )),
    ))
}

/// update_investor
///
/// [Admin Route] Partial update of the investor's profile fields.
#[utoipa::path(
    put,
    path = "/admin/investors/{id}",
    params(("id" = Uuid, Path, description = "Investor user ID")),
    request_body = UpdateInvestorRequest,
    responses(
        (status = 200, description = "Updated"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_investor(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateInvestorRequest>,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    require_admin(&auth)?;
    validate::validate_investor_update(
        payload.investor_name.as_ref(),
        payload.investor_contact_no.as_ref(),
    )
    .map_err(ApiError::Validation)?;

    let user = state
        .repo
        .find_user_in_role(id, Role::Investor)
        .await
        .map_err(|e| ApiError::internal("Error updating investor", e))?
        .ok_or(ApiError::NotFound("Investor"))?;
    let SubtypeRef::Investor(profile_id) = user.subtype else {
        return Err(ApiError::NotFound("Investor profile"));
    };

    let profile = state
        .repo
        .update_investor(profile_id, payload)
        .await
        .map_err(|e| ApiError::internal("Error updating investor", e))?
        .ok_or(ApiError::NotFound("Investor profile"))?;

    Ok(Json(ApiResponse::success(
        "Investor updated successfully",
        json!({ "investor": user, "profile": profile }),
    )))
}

/// delete_investor
///
/// [Admin Route] Cascade-deletes the investor user. 204 carries no body.
#[utoipa::path(
    delete,
    path = "/admin/investors/{id}",
    params(("id" = Uuid, Path, description = "Investor user ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_investor(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    require_admin(&auth)?;
    let deleted = state
        .repo
        .delete_user(id, Role::Investor)
        .await
        .map_err(|e| ApiError::internal("Error deleting investor", e))?;
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Investor"))
    }
}
