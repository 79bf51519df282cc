use serde::{Deserialize, Serialize};

/// 旅行（経費をまとめる単位）を表す構造体
#[derive(Debug, Clone, Serialize)]
pub struct Trip {
    /// 旅行ID
    pub id: i64,
    /// 所有ユーザーID
    pub user_id: i64,
    /// 旅行名（同一ユーザー内で一意）
    pub name: String,
    /// 説明
    pub description: Option<String>,
    /// 作成日時
    pub created_at: String,
    /// 更新日時
    pub updated_at: String,
}

/// 旅行作成リクエスト
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTripRequest {
    pub name: String,
    pub description: Option<String>,
}

/// 旅行更新リクエスト（部分更新）
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTripRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// 旅行削除のレスポンス
#[derive(Debug, Clone, Serialize)]
pub struct TripDeleteResponse {
    /// 削除された旅行ID
    pub id: i64,
    /// 一緒に削除された経費の件数
    pub deleted_expenses: usize,
}
