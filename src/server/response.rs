use crate::shared::errors::{AppError, ErrorSeverity};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde::Serialize;

/// JSONレスポンスを構築する
pub fn json<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let payload = serde_json::to_vec(body).unwrap_or_else(|e| {
        log::error!("レスポンスのJSONシリアライズに失敗しました: {e}");
        r#"{"error":"内部エラー"}"#.as_bytes().to_vec()
    });

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json; charset=utf-8")
        .body(Full::new(Bytes::from(payload)))
        .unwrap()
}

/// Set-Cookieヘッダー付きのJSONレスポンスを構築する
pub fn json_with_cookie<T: Serialize>(
    status: StatusCode,
    body: &T,
    cookie: &str,
) -> Response<Full<Bytes>> {
    let mut response = json(status, body);
    match cookie.parse() {
        Ok(value) => {
            response.headers_mut().insert(hyper::header::SET_COOKIE, value);
        }
        Err(e) => log::error!("Cookieヘッダーの構築に失敗しました: {e}"),
    }
    response
}

/// ボディなしのレスポンスを構築する
pub fn empty(status: StatusCode) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// エラーをHTTPステータスと統一JSONボディ `{"error": "..."}` に変換する
pub fn error_response(error: &AppError) -> Response<Full<Bytes>> {
    // 重要度に応じてログレベルを変える
    match error.severity() {
        ErrorSeverity::Low => log::debug!("リクエストエラー: {error}"),
        ErrorSeverity::Medium => log::warn!("リクエストエラー: {error}"),
        ErrorSeverity::High | ErrorSeverity::Critical => log::error!("リクエストエラー: {error}"),
    }

    #[derive(Serialize)]
    struct ErrorBody {
        error: String,
    }

    json(
        error.status_code(),
        &ErrorBody {
            error: error.user_message(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_response() {
        #[derive(Serialize)]
        struct Body {
            message: String,
        }

        let response = json(
            StatusCode::OK,
            &Body {
                message: "こんにちは".to_string(),
            },
        );

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("Content-Type").unwrap(),
            "application/json; charset=utf-8"
        );
    }

    #[test]
    fn test_error_response_status_and_shape() {
        let error = AppError::not_found("旅行");
        let response = error_response(&error);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let error = AppError::unauthorized("トークンなし");
        let response = error_response(&error);
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_json_with_cookie() {
        #[derive(Serialize)]
        struct Empty {}

        let response = json_with_cookie(
            StatusCode::OK,
            &Empty {},
            "session=abc; Path=/; HttpOnly",
        );
        assert_eq!(
            response.headers().get(hyper::header::SET_COOKIE).unwrap(),
            "session=abc; Path=/; HttpOnly"
        );
    }
}
