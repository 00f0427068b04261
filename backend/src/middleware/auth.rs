//! Authentication middleware
//!
//! Validates bearer tokens issued by the platform's auth service and turns
//! their claims into the [`ScopeContext`] every ledger call runs under

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult, ErrorDetail, ErrorResponse};
use crate::scope::ScopeContext;
use crate::AppState;

/// Authenticated user information extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    /// `None` for head-office accounts
    pub branch_id: Option<Uuid>,
    pub permissions: Vec<String>,
}

impl AuthUser {
    /// Check if user has a specific permission
    pub fn has_permission(&self, resource: &str, action: &str) -> bool {
        let permission = format!("{}:{}", resource, action);
        self.permissions.contains(&permission)
    }

    /// Scoping context for one unit of work on behalf of this user
    pub fn scope(&self) -> ScopeContext {
        ScopeContext::new(self.tenant_id, self.branch_id, self.user_id)
    }
}

/// JWT claims structure
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub sub: String,
    pub tenant_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub exp: i64,
    pub iat: i64,
}

/// Authentication middleware that validates JWT tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
    {
        Some(token) => token,
        None => return unauthorized_response("Missing or invalid Authorization header"),
    };

    let auth_user = match decode_jwt(token, &state.config.jwt.secret).and_then(auth_user_from) {
        Ok(user) => user,
        Err(msg) => return unauthorized_response(&msg),
    };

    request.extensions_mut().insert(auth_user);

    next.run(request).await
}

/// Decode and validate JWT token
pub fn decode_jwt(token: &str, secret: &str) -> Result<Claims, String> {
    use jsonwebtoken::{decode, DecodingKey, Validation};

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| format!("Invalid token: {}", e))
}

fn auth_user_from(claims: Claims) -> Result<AuthUser, String> {
    let user_id =
        Uuid::parse_str(&claims.sub).map_err(|_| "Invalid user ID in token".to_string())?;
    let tenant_id =
        Uuid::parse_str(&claims.tenant_id).map_err(|_| "Invalid tenant ID in token".to_string())?;
    let branch_id = claims
        .branch_id
        .as_deref()
        .map(Uuid::parse_str)
        .transpose()
        .map_err(|_| "Invalid branch ID in token".to_string())?;

    Ok(AuthUser {
        user_id,
        tenant_id,
        branch_id,
        permissions: claims.permissions,
    })
}

fn unauthorized_response(message: &str) -> Response {
    let error = ErrorResponse {
        error: ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message_en: message.to_string(),
            message_id: "Tidak diizinkan".to_string(),
            field: None,
        },
    };

    (StatusCode::UNAUTHORIZED, Json(error)).into_response()
}

/// Extractor for authenticated user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}

/// Permission guard for use in handlers
pub fn check_permission(user: &AuthUser, resource: &str, action: &str) -> AppResult<()> {
    if user.has_permission(resource, action) {
        Ok(())
    } else {
        Err(AppError::InsufficientPermissions(format!(
            "{}:{}",
            resource, action
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(claims: &Claims, secret: &str) -> String {
        encode(&Header::default(), claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    fn claims(branch_id: Option<Uuid>) -> Claims {
        let now = chrono::Utc::now().timestamp();
        Claims {
            sub: Uuid::new_v4().to_string(),
            tenant_id: Uuid::new_v4().to_string(),
            branch_id: branch_id.map(|b| b.to_string()),
            permissions: vec!["sales:create".to_string()],
            exp: now + 3600,
            iat: now,
        }
    }

    #[test]
    fn branch_claim_becomes_scope() {
        let branch = Uuid::new_v4();
        let decoded = decode_jwt(&token(&claims(Some(branch)), "secret"), "secret").unwrap();
        let user = auth_user_from(decoded).unwrap();
        assert_eq!(user.scope().branch_id, Some(branch));
        assert!(user.has_permission("sales", "create"));
        assert!(check_permission(&user, "transfers", "approve").is_err());
    }

    #[test]
    fn missing_branch_claim_is_head_office() {
        let decoded = decode_jwt(&token(&claims(None), "secret"), "secret").unwrap();
        let user = auth_user_from(decoded).unwrap();
        assert!(user.scope().can_access_branch(Uuid::new_v4()));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        assert!(decode_jwt(&token(&claims(None), "secret"), "other").is_err());
    }
}
