use crate::shared::errors::{AppError, AppResult};
use hyper::body::Bytes;
use hyper::http::request::Parts;
use serde::de::DeserializeOwned;
use url::Url;

/// JSONリクエストボディを解析する
pub fn parse_json<T: DeserializeOwned>(body: &Bytes) -> AppResult<T> {
    if body.is_empty() {
        return Err(AppError::validation("リクエストボディが空です"));
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::validation(format!("リクエストボディの解析に失敗しました: {e}")))
}

/// クエリ文字列をキーと値のペアに解析する
pub fn parse_query(parts: &Parts) -> Vec<(String, String)> {
    let query = parts.uri.query().unwrap_or("");
    let url = Url::parse(&format!("http://localhost/?{query}")).unwrap_or_else(|_| {
        log::warn!("無効なクエリパラメータ: {query}");
        Url::parse("http://localhost/").unwrap()
    });

    url.query_pairs()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// クエリパラメータから値を取得する
pub fn query_param(parts: &Parts, name: &str) -> Option<String> {
    parse_query(parts)
        .into_iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v)
}

/// Cookieヘッダーから指定した名前のCookie値を取得する
pub fn cookie_value(parts: &Parts, name: &str) -> Option<String> {
    let header = parts.headers.get(hyper::header::COOKIE)?.to_str().ok()?;

    for pair in header.split(';') {
        if let Some((key, value)) = pair.trim().split_once('=') {
            if key == name {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// パス末尾のIDセグメントを解析する
pub fn parse_id(segment: &str) -> AppResult<i64> {
    segment
        .parse::<i64>()
        .map_err(|_| AppError::validation(format!("IDが不正です: {segment}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::Request;

    fn parts_for(uri: &str, cookie: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(hyper::header::COOKIE, cookie);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_parse_json() {
        #[derive(Debug, serde::Deserialize)]
        struct Body {
            name: String,
        }

        let body: Body = parse_json(&Bytes::from(r#"{"name":"大阪出張"}"#)).unwrap();
        assert_eq!(body.name, "大阪出張");

        // 空ボディと壊れたJSONはバリデーションエラー
        assert!(matches!(
            parse_json::<Body>(&Bytes::new()).unwrap_err(),
            AppError::Validation(_)
        ));
        assert!(matches!(
            parse_json::<Body>(&Bytes::from("{")).unwrap_err(),
            AppError::Validation(_)
        ));
    }

    #[test]
    fn test_query_param() {
        let parts = parts_for("/api/expenses?trip=%E5%87%BA%E5%BC%B5&month=2024-01", None);

        assert_eq!(query_param(&parts, "trip").as_deref(), Some("出張"));
        assert_eq!(query_param(&parts, "month").as_deref(), Some("2024-01"));
        assert_eq!(query_param(&parts, "category"), None);
    }

    #[test]
    fn test_cookie_value() {
        let parts = parts_for("/", Some("theme=dark; session=abc123; lang=ja"));

        assert_eq!(cookie_value(&parts, "session").as_deref(), Some("abc123"));
        assert_eq!(cookie_value(&parts, "theme").as_deref(), Some("dark"));
        assert_eq!(cookie_value(&parts, "missing"), None);
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("42").unwrap(), 42);
        assert!(parse_id("abc").is_err());
        assert!(parse_id("").is_err());
    }
}
