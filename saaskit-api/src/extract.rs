/// Request extractors
///
/// [`Session`] is the per-request tenant context: it authenticates the
/// caller and owns the database transaction whose RLS parameters match
/// them. Handlers run every query on `session.tx` and call
/// [`Session::commit`] once the work succeeded; dropping the session rolls
/// the transaction back.
///
/// # Example
///
/// ```no_run
/// use axum::Json;
/// use saaskit_api::error::ApiResult;
/// use saaskit_api::extract::Session;
/// use saaskit_shared::models::item::Item;
///
/// async fn list(mut session: Session) -> ApiResult<Json<Vec<Item>>> {
///     let items = Item::list(&mut session.tx, 0, 100).await?;
///     session.commit().await?;
///     Ok(Json(items))
/// }
/// ```

use async_trait::async_trait;
use axum::{
    extract::{FromRequest, FromRequestParts, Request},
    http::request::Parts,
    Json,
};
use saaskit_shared::auth::authorization::{require_tenant, require_terms_accepted};
use saaskit_shared::auth::context::{
    resolve, verify, AuthError, AuthenticatedUser, Credentials, VerifiedCredentials,
};
use serde::de::DeserializeOwned;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::{ApiError, ApiResult};

/// Authenticated caller plus their RLS-scoped transaction
///
/// Rejects callers that haven't accepted the Terms of Service.
pub struct Session {
    pub user: AuthenticatedUser,
    pub tx: Transaction<'static, Postgres>,
}

impl Session {
    /// Commits the request's transaction
    pub async fn commit(self) -> ApiResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    /// The caller's tenant
    ///
    /// # Errors
    ///
    /// 403 for a superadmin acting without a tenant profile.
    pub fn tenant_id(&self) -> ApiResult<Uuid> {
        Ok(require_tenant(&self.user)?)
    }
}

/// Authenticates the request and opens its scoped transaction
async fn open_session(parts: &Parts, state: &AppState) -> ApiResult<Session> {
    // Signature and format checks happen before a connection is taken
    let verified = verify(Credentials::from_headers(&parts.headers)?, &state.auth)?;

    let mut tx = state.db.begin().await?;
    let user = resolve(&mut tx, verified, &state.auth).await?;

    Ok(Session { user, tx })
}

#[async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = open_session(parts, state).await?;
        require_terms_accepted(&session.user)?;
        Ok(session)
    }
}

/// Like [`Session`], but admits callers that haven't accepted the Terms of
/// Service yet (invited users completing their account setup)
pub struct PreTermsSession(pub Session);

#[async_trait]
impl FromRequestParts<AppState> for PreTermsSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(Self(open_session(parts, state).await?))
    }
}

/// Identity of a bearer token, without any profile lookup
///
/// Used by onboarding, where the caller has no profile yet. API keys are
/// rejected since they always belong to an existing profile.
#[derive(Debug, Clone)]
pub struct TokenIdentity {
    pub user_id: Uuid,
    pub email: Option<String>,
}

#[async_trait]
impl FromRequestParts<AppState> for TokenIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match Credentials::from_headers(&parts.headers)? {
            credentials @ Credentials::Bearer(_) => match verify(credentials, &state.auth)? {
                VerifiedCredentials::Jwt { user_id, email } => Ok(Self { user_id, email }),
                VerifiedCredentials::ApiKey { .. } => Err(AuthError::InvalidFormat.into()),
            },
            Credentials::ApiKey(_) => Err(ApiError::Unauthorized(
                "Onboarding requires a user access token".to_string(),
            )),
        }
    }
}

/// JSON body that has passed its `validator` rules
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(Self(value))
    }
}
