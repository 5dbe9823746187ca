use super::error::ApiError;
use crate::domain::ports::TokenIssuerRef;
use crate::domain::{Principal, Role};
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;

/// Resolves the bearer token into a [`Principal`] request extension.
pub async fn authenticate(
    State(tokens): State<TokenIssuerRef>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::unauthorized("missing bearer token"))?;

    let principal = tokens
        .verify(token.trim())
        .inspect_err(|err| warn!(error = %err, "rejected access token"))?;

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

/// Fails with 403 unless the caller holds one of `allowed`.
pub fn require_role(principal: &Principal, allowed: &[Role]) -> Result<(), ApiError> {
    if allowed.contains(&principal.role) {
        Ok(())
    } else {
        warn!(user_id = %principal.user_id, role = %principal.role, "role not permitted");
        Err(ApiError::forbidden())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use uuid::Uuid;

    #[test]
    fn test_require_role() {
        let employee = Principal {
            user_id: Uuid::new_v4(),
            role: Role::Employee,
        };

        assert!(require_role(&employee, &Role::ALL).is_ok());
        assert_eq!(
            require_role(&employee, &[Role::Moderator])
                .unwrap_err()
                .status(),
            StatusCode::FORBIDDEN
        );
    }
}
