use super::AppState;
use super::auth::require_role;
use super::dto::{
    AddProductRequest, CreatePvzRequest, CreateReceptionRequest, DummyLoginRequest, LoginRequest,
    ProductDto, PvzDto, PvzInfoDto, PvzInfoQuery, ReceptionDto, RegisterRequest, TokenResponse,
    UserResponse,
};
use super::error::ApiError;
use super::extract::{JsonBody, PathParam, QueryParams};
use crate::domain::ports::TxManager;
use crate::domain::{Page, Principal, PvzId, Role, TimeRange};
use axum::Json;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};

pub const DEFAULT_PAGE_LIMIT: u64 = 10;
pub const MAX_PAGE_LIMIT: u64 = 30;

const EMPLOYEE: &[Role] = &[Role::Employee];
const MODERATOR: &[Role] = &[Role::Moderator];
const STAFF: &[Role] = &[Role::Employee, Role::Moderator];

pub async fn dummy_login<M: TxManager + 'static>(
    State(state): State<AppState<M>>,
    JsonBody(body): JsonBody<DummyLoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let mut ctx = state.context();
    let token = state.identity.dummy_login(&mut ctx, &body.role).await?;
    Ok(Json(TokenResponse { token }))
}

pub async fn register<M: TxManager + 'static>(
    State(state): State<AppState<M>>,
    JsonBody(body): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let mut ctx = state.context();
    let id = state
        .identity
        .register(&mut ctx, &body.email, &body.password, &body.role)
        .await?;
    let role = body.role.parse::<Role>()?;
    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            id,
            email: body.email,
            role,
        }),
    ))
}

pub async fn login<M: TxManager + 'static>(
    State(state): State<AppState<M>>,
    JsonBody(body): JsonBody<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let mut ctx = state.context();
    let token = state
        .identity
        .login(&mut ctx, &body.email, &body.password)
        .await?;
    Ok(Json(TokenResponse { token }))
}

pub async fn create_pvz<M: TxManager + 'static>(
    State(state): State<AppState<M>>,
    Extension(principal): Extension<Principal>,
    JsonBody(body): JsonBody<CreatePvzRequest>,
) -> Result<(StatusCode, Json<PvzDto>), ApiError> {
    require_role(&principal, MODERATOR)?;
    let mut ctx = state.context();
    let pvz = state.pickup_points.create_pvz(&mut ctx, &body.city).await?;
    Ok((StatusCode::CREATED, Json(pvz.into())))
}

pub async fn get_pvz_info<M: TxManager + 'static>(
    State(state): State<AppState<M>>,
    Extension(principal): Extension<Principal>,
    QueryParams(query): QueryParams<PvzInfoQuery>,
) -> Result<Json<Vec<PvzInfoDto>>, ApiError> {
    require_role(&principal, STAFF)?;
    let (range, page) = window(&query, Utc::now())?;
    let mut ctx = state.context();
    let infos = state
        .pickup_points
        .get_pvz_info(&mut ctx, range, page)
        .await?;
    Ok(Json(infos.into_iter().map(Into::into).collect()))
}

pub async fn get_pvz_list<M: TxManager + 'static>(
    State(state): State<AppState<M>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<PvzDto>>, ApiError> {
    require_role(&principal, STAFF)?;
    let mut ctx = state.context();
    let pvzs = state.pickup_points.get_pvz_list(&mut ctx).await?;
    Ok(Json(pvzs.into_iter().map(Into::into).collect()))
}

pub async fn start_reception<M: TxManager + 'static>(
    State(state): State<AppState<M>>,
    Extension(principal): Extension<Principal>,
    JsonBody(body): JsonBody<CreateReceptionRequest>,
) -> Result<(StatusCode, Json<ReceptionDto>), ApiError> {
    require_role(&principal, EMPLOYEE)?;
    let mut ctx = state.context();
    let reception = state
        .pickup_points
        .start_reception(&mut ctx, body.pvz_id)
        .await?;
    Ok((StatusCode::CREATED, Json(reception.into())))
}

pub async fn add_product<M: TxManager + 'static>(
    State(state): State<AppState<M>>,
    Extension(principal): Extension<Principal>,
    JsonBody(body): JsonBody<AddProductRequest>,
) -> Result<(StatusCode, Json<ProductDto>), ApiError> {
    require_role(&principal, EMPLOYEE)?;
    let mut ctx = state.context();
    let product = state
        .pickup_points
        .add_product(&mut ctx, body.pvz_id, &body.product_type)
        .await?;
    Ok((StatusCode::CREATED, Json(product.into())))
}

pub async fn delete_last_product<M: TxManager + 'static>(
    State(state): State<AppState<M>>,
    Extension(principal): Extension<Principal>,
    PathParam(pvz_id): PathParam<PvzId>,
) -> Result<StatusCode, ApiError> {
    require_role(&principal, EMPLOYEE)?;
    let mut ctx = state.context();
    state
        .pickup_points
        .delete_last_product(&mut ctx, pvz_id)
        .await?;
    Ok(StatusCode::OK)
}

pub async fn close_last_reception<M: TxManager + 'static>(
    State(state): State<AppState<M>>,
    Extension(principal): Extension<Principal>,
    PathParam(pvz_id): PathParam<PvzId>,
) -> Result<Json<ReceptionDto>, ApiError> {
    require_role(&principal, EMPLOYEE)?;
    let mut ctx = state.context();
    let reception = state
        .pickup_points
        .close_reception(&mut ctx, pvz_id)
        .await?;
    Ok(Json(reception.into()))
}

/// Resolves the time window and page of a `GET /pvz` query.
fn window(query: &PvzInfoQuery, now: DateTime<Utc>) -> Result<(TimeRange, Page), ApiError> {
    let page = query.page.unwrap_or(1);
    if page < 1 {
        return Err(ApiError::bad_request("page must be at least 1"));
    }
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
        return Err(ApiError::bad_request(format!(
            "limit must be between 1 and {MAX_PAGE_LIMIT}"
        )));
    }

    let start = query.start_date.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    let end = query.end_date.unwrap_or(now);
    if start > end {
        return Err(ApiError::bad_request("startDate must not be after endDate"));
    }

    Ok((TimeRange::new(start, end), Page::from_number(page, limit)))
}
