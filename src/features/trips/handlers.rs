use crate::features::auth::handlers::{authenticate, ensure_owner};
use crate::features::trips::models::{CreateTripRequest, TripDeleteResponse, UpdateTripRequest};
use crate::features::trips::repository;
use crate::server::{request, response};
use crate::shared::errors::{AppError, AppResult};
use crate::AppState;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::http::request::Parts;
use hyper::{Response, StatusCode};

/// GET /api/trips - 自分の旅行一覧
pub fn list(state: &AppState, parts: &Parts) -> AppResult<Response<Full<Bytes>>> {
    let user = authenticate(state, parts)?;

    let trips = {
        let conn = state.db.lock().unwrap();
        repository::find_all_by_user(&conn, user.id)?
    };

    Ok(response::json(StatusCode::OK, &trips))
}

/// POST /api/trips - 旅行の作成
pub fn create(state: &AppState, parts: &Parts, body: &Bytes) -> AppResult<Response<Full<Bytes>>> {
    let user = authenticate(state, parts)?;
    let req: CreateTripRequest = request::parse_json(body)?;

    if req.name.trim().is_empty() {
        return Err(AppError::validation("旅行名は必須です"));
    }

    let trip = {
        let conn = state.db.lock().unwrap();
        repository::create(&conn, user.id, &req)?
    };

    log::info!("旅行を作成しました: trip_id={}, user_id={}", trip.id, user.id);
    Ok(response::json(StatusCode::CREATED, &trip))
}

/// GET /api/trips/{id} - 旅行の取得
pub fn get(state: &AppState, parts: &Parts, id: i64) -> AppResult<Response<Full<Bytes>>> {
    let user = authenticate(state, parts)?;

    let trip = {
        let conn = state.db.lock().unwrap();
        repository::find_by_id(&conn, id)?
    };
    ensure_owner(&user, trip.user_id, "旅行")?;

    Ok(response::json(StatusCode::OK, &trip))
}

/// PUT /api/trips/{id} - 旅行の部分更新
pub fn update(
    state: &AppState,
    parts: &Parts,
    id: i64,
    body: &Bytes,
) -> AppResult<Response<Full<Bytes>>> {
    let user = authenticate(state, parts)?;
    let req: UpdateTripRequest = request::parse_json(body)?;

    if let Some(name) = &req.name {
        if name.trim().is_empty() {
            return Err(AppError::validation("旅行名を空にはできません"));
        }
    }

    let updated = {
        let mut conn = state.db.lock().unwrap();
        let trip = repository::find_by_id(&conn, id)?;
        ensure_owner(&user, trip.user_id, "旅行")?;
        repository::update(&mut conn, id, &req)?
    };

    Ok(response::json(StatusCode::OK, &updated))
}

/// DELETE /api/trips/{id} - 旅行の削除（所属する経費も同一トランザクションで削除）
pub fn delete(state: &AppState, parts: &Parts, id: i64) -> AppResult<Response<Full<Bytes>>> {
    let user = authenticate(state, parts)?;

    let deleted_expenses = {
        let mut conn = state.db.lock().unwrap();
        let trip = repository::find_by_id(&conn, id)?;
        ensure_owner(&user, trip.user_id, "旅行")?;
        repository::delete_with_expenses(&mut conn, id)?
    };

    Ok(response::json(
        StatusCode::OK,
        &TripDeleteResponse {
            id,
            deleted_expenses,
        },
    ))
}
