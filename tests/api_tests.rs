use async_trait::async_trait;
use audissey_api::{
    AppState, auth, create_router,
    config::AppConfig,
    models::{
        Farmer, Investor, NewSubtype, NewUser, Role, SubtypeRef, UpdateFarmerRequest,
        UpdateInvestorRequest, User,
    },
    repository::{RepoError, Repository, RepositoryState},
};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use uuid::Uuid;

// --- Mock repository backing the full router ---

// Token digests map to their owning users, which is enough state to exercise
// the routing, the auth middleware and the role gate end to end.
#[derive(Default)]
struct MockApiRepo {
    sessions: Mutex<HashMap<String, (User, Uuid)>>,
    users_by_role: Vec<User>,
}

impl MockApiRepo {
    /// Registers a live session and returns the plaintext bearer token.
    fn seed_session(&self, role: Role) -> String {
        let token = auth::generate_token();
        let user = User {
            id: Uuid::new_v4(),
            role,
            ..Default::default()
        };
        self.sessions
            .lock()
            .unwrap()
            .insert(auth::token_digest(&token), (user, Uuid::new_v4()));
        token
    }
}

#[async_trait]
impl Repository for MockApiRepo {
    async fn create_user(&self, new: NewUser, subtype: NewSubtype) -> Result<User, RepoError> {
        let subtype_ref = match subtype {
            NewSubtype::None => SubtypeRef::None,
            NewSubtype::Farmer { .. } => SubtypeRef::Farmer(Uuid::new_v4()),
            NewSubtype::Investor { .. } => SubtypeRef::Investor(Uuid::new_v4()),
        };
        Ok(User {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            phone: new.phone,
            role: new.role,
            api_token: new.api_token,
            subtype: subtype_ref,
            ..Default::default()
        })
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .values()
            .find(|(user, _)| user.id == id)
            .map(|(user, _)| user.clone()))
    }

    async fn find_user_by_email(&self, _email: &str) -> Result<Option<User>, RepoError> {
        Ok(None)
    }

    async fn insert_token(&self, _user_id: Uuid, _digest: &str) -> Result<Uuid, RepoError> {
        Ok(Uuid::new_v4())
    }

    async fn find_user_by_token(
        &self,
        digest: &str,
    ) -> Result<Option<(User, Uuid)>, RepoError> {
        Ok(self.sessions.lock().unwrap().get(digest).cloned())
    }

    async fn revoke_all_tokens(&self, _user_id: Uuid) -> Result<u64, RepoError> {
        Ok(0)
    }

    async fn revoke_token(&self, _token_id: Uuid) -> Result<(), RepoError> {
        Ok(())
    }

    async fn list_users_by_role(&self, _role: Role) -> Result<Vec<User>, RepoError> {
        Ok(self.users_by_role.clone())
    }

    async fn find_user_in_role(&self, _id: Uuid, _role: Role) -> Result<Option<User>, RepoError> {
        Ok(None)
    }

    async fn get_farmer(&self, _id: Uuid) -> Result<Option<Farmer>, RepoError> {
        Ok(None)
    }

    async fn get_investor(&self, _id: Uuid) -> Result<Option<Investor>, RepoError> {
        Ok(None)
    }

    async fn update_farmer(
        &self,
        _id: Uuid,
        _req: UpdateFarmerRequest,
    ) -> Result<Option<Farmer>, RepoError> {
        Ok(None)
    }

    async fn update_investor(
        &self,
        _id: Uuid,
        _req: UpdateInvestorRequest,
    ) -> Result<Option<Investor>, RepoError> {
        Ok(None)
    }

    async fn delete_user(&self, _id: Uuid, _role: Role) -> Result<bool, RepoError> {
        Ok(false)
    }
}

// --- Harness ---

fn app(mock: Arc<MockApiRepo>) -> Router {
    create_router(AppState {
        repo: mock as RepositoryState,
        config: AppConfig::default(),
    })
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// --- Tests ---

#[tokio::test]
async fn test_health_check() {
    let response = app(Arc::new(MockApiRepo::default()))
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn test_register_returns_created_envelope() {
    let response = app(Arc::new(MockApiRepo::default()))
        .oneshot(json_request(
            "POST",
            "/register",
            json!({
                "name": "Alice Mwangi",
                "email": "alice@example.com",
                "password": "password123",
                "phone": "0712345678",
                "role": "investor",
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "Registration successful");
    assert_eq!(body["data"]["token_type"], "Bearer");
    assert_eq!(body["data"]["token"].as_str().unwrap().len(), auth::TOKEN_LEN);
    assert_eq!(body["data"]["user"]["role"], "investor");
    // Secrets stay out of the wire format.
    assert!(body["data"]["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn test_register_empty_body_reports_all_fields() {
    let response = app(Arc::new(MockApiRepo::default()))
        .oneshot(json_request("POST", "/register", json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "Validation failed");
    for field in ["name", "email", "password", "phone", "role"] {
        assert!(
            body["errors"][field].is_array(),
            "field '{field}' must be reported"
        );
    }
}

#[tokio::test]
async fn test_me_without_token_is_401() {
    let response = app(Arc::new(MockApiRepo::default()))
        .oneshot(Request::builder().uri("/me").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Unauthenticated");
}

#[tokio::test]
async fn test_me_resolves_seeded_session() {
    let mock = Arc::new(MockApiRepo::default());
    let token = mock.seed_session(Role::Farmer);

    let response = app(mock)
        .oneshot(
            Request::builder()
                .uri("/me")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["role"], "farmer");
}

#[tokio::test]
async fn test_admin_routes_reject_farmer_tokens() {
    let mock = Arc::new(MockApiRepo::default());
    let token = mock.seed_session(Role::Farmer);

    let response = app(mock)
        .oneshot(
            Request::builder()
                .uri("/admin/farmers")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Forbidden");
}

#[tokio::test]
async fn test_admin_routes_serve_admin_tokens() {
    let mock = Arc::new(MockApiRepo {
        users_by_role: vec![User::default()],
        ..Default::default()
    });
    let token = mock.seed_session(Role::Admin);

    let response = app(mock)
        .oneshot(
            Request::builder()
                .uri("/admin/farmers")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["farmers"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_logout_with_seeded_session() {
    let mock = Arc::new(MockApiRepo::default());
    let token = mock.seed_session(Role::Investor);

    let response = app(mock)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/logout")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Logged out successfully");
}

#[tokio::test]
async fn test_login_unknown_email_is_401_envelope() {
    let response = app(Arc::new(MockApiRepo::default()))
        .oneshot(json_request(
            "POST",
            "/login",
            json!({"email": "ghost@example.com", "password": "password123"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Invalid credentials");
    assert_eq!(body["error"], "The provided credentials are incorrect.");
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let response = app(Arc::new(MockApiRepo::default()))
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    // The request-id layer generates and propagates the correlation header.
    assert!(response.headers().contains_key("x-request-id"));
}
