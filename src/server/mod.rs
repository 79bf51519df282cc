pub mod request;
pub mod response;
pub mod router;

use crate::shared::errors::{AppError, AppResult};
use crate::AppState;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::sync::Arc;
use tokio::net::TcpListener;

/// HTTPサーバーを起動して接続を受け付ける
pub async fn serve(state: Arc<AppState>, port: u16) -> AppResult<()> {
    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .map_err(|e| AppError::configuration(format!("ポート{port}にバインドできません: {e}")))?;

    log::info!("サーバーを起動しました: http://0.0.0.0:{port}");

    loop {
        let (stream, remote) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                log::warn!("接続の受け付けに失敗しました: {e}");
                continue;
            }
        };

        let state = Arc::clone(&state);
        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(move |req| {
                let state = Arc::clone(&state);
                async move { Ok::<_, std::convert::Infallible>(router::route(state, req).await) }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                log::debug!("接続処理でエラーが発生しました: remote={remote}, {e}");
            }
        });
    }
}
