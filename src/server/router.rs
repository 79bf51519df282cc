use crate::features::{auth, expenses, receipts, trips};
use crate::server::{request, response};
use crate::shared::errors::{AppError, AppResult};
use crate::AppState;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Bytes;
use hyper::http::request::Parts;
use hyper::{Method, Request, Response, StatusCode};
use std::sync::Arc;

/// リクエストボディの上限（領収書10MB + multipartオーバーヘッド）
const MAX_BODY_SIZE: usize = 12 * 1024 * 1024;

/// リクエストを振り分けて、エラーはJSONレスポンスに変換する
pub async fn route<B>(state: Arc<AppState>, req: Request<B>) -> Response<Full<Bytes>>
where
    B: hyper::body::Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (parts, body) = req.into_parts();

    let body = match collect_body(body).await {
        Ok(bytes) => bytes,
        Err(e) => return response::error_response(&e),
    };

    match dispatch(&state, &parts, body).await {
        Ok(res) => res,
        Err(e) => response::error_response(&e),
    }
}

/// ボディを上限付きでメモリに読み込む
async fn collect_body<B>(body: B) -> AppResult<Bytes>
where
    B: hyper::body::Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    Limited::new(body, MAX_BODY_SIZE)
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|_| AppError::validation("リクエストボディが大きすぎるか、読み込みに失敗しました"))
}

async fn dispatch(
    state: &AppState,
    parts: &Parts,
    body: Bytes,
) -> AppResult<Response<Full<Bytes>>> {
    let path = parts.uri.path().trim_matches('/');
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    match (&parts.method, segments.as_slice()) {
        // ヘルスチェック
        (&Method::GET, ["api", "health"]) => {
            Ok(response::json(StatusCode::OK, &serde_json::json!({ "status": "ok" })))
        }

        // ユーザー登録
        (&Method::POST, ["api", "users"]) => auth::handlers::register(state, &body),

        // セッション
        (&Method::POST, ["api", "session"]) => auth::handlers::login(state, &body),
        (&Method::DELETE, ["api", "session"]) => auth::handlers::logout(state, parts),
        (&Method::GET, ["api", "session"]) => auth::handlers::current_user(state, parts),

        // 旅行
        (&Method::GET, ["api", "trips"]) => trips::handlers::list(state, parts),
        (&Method::POST, ["api", "trips"]) => trips::handlers::create(state, parts, &body),
        (&Method::GET, ["api", "trips", id]) => {
            trips::handlers::get(state, parts, request::parse_id(id)?)
        }
        (&Method::PUT, ["api", "trips", id]) => {
            trips::handlers::update(state, parts, request::parse_id(id)?, &body)
        }
        (&Method::DELETE, ["api", "trips", id]) => {
            trips::handlers::delete(state, parts, request::parse_id(id)?)
        }

        // 経費
        (&Method::GET, ["api", "expenses"]) => expenses::handlers::list(state, parts),
        (&Method::POST, ["api", "expenses"]) => expenses::handlers::create(state, parts, &body),
        (&Method::GET, ["api", "expenses", id]) => {
            expenses::handlers::get(state, parts, request::parse_id(id)?)
        }
        (&Method::PUT, ["api", "expenses", id]) => {
            expenses::handlers::update(state, parts, request::parse_id(id)?, &body)
        }
        (&Method::DELETE, ["api", "expenses", id]) => {
            expenses::handlers::delete(state, parts, request::parse_id(id)?).await
        }

        // 領収書
        (&Method::POST, ["api", "expenses", id, "receipt"]) => {
            receipts::handlers::upload(state, parts, request::parse_id(id)?, body).await
        }
        (&Method::GET, ["api", "expenses", id, "receipt"]) => {
            receipts::handlers::get_url(state, parts, request::parse_id(id)?).await
        }
        (&Method::DELETE, ["api", "expenses", id, "receipt"]) => {
            receipts::handlers::delete(state, parts, request::parse_id(id)?).await
        }

        _ => Err(AppError::not_found("エンドポイント")),
    }
}
