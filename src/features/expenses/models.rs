use crate::shared::errors::{AppError, AppResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// 経費を表す構造体
#[derive(Debug, Clone, Serialize)]
pub struct Expense {
    /// 経費ID
    pub id: i64,
    /// 所有ユーザーID
    pub user_id: i64,
    /// 費目（交通費・宿泊費など）
    pub category: String,
    /// 発生日（YYYY-MM-DD）
    pub date: String,
    /// 支払先
    pub vendor: String,
    /// 場所
    pub location: Option<String>,
    /// 金額（非負）
    pub cost: f64,
    /// 所属する旅行名
    pub trip_name: String,
    /// 領収書オブジェクトのキー（外部ストレージ上の名前）
    pub receipt_key: Option<String>,
    /// 備考
    pub comments: Option<String>,
    /// 作成日時
    pub created_at: String,
    /// 更新日時
    pub updated_at: String,
}

/// 経費作成リクエスト
#[derive(Debug, Clone, Deserialize)]
pub struct CreateExpenseRequest {
    pub category: String,
    pub date: String,
    pub vendor: String,
    pub location: Option<String>,
    pub cost: f64,
    pub trip_name: String,
    pub comments: Option<String>,
}

/// 経費更新リクエスト（部分更新）
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateExpenseRequest {
    pub category: Option<String>,
    pub date: Option<String>,
    pub vendor: Option<String>,
    pub location: Option<String>,
    pub cost: Option<f64>,
    pub trip_name: Option<String>,
    pub comments: Option<String>,
}

static DATE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("日付パターンが不正"));

static MONTH_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}$").expect("月パターンが不正"));

/// 金額を検証する（非負の有限値のみ許可）
pub fn validate_cost(cost: f64) -> AppResult<()> {
    if !cost.is_finite() || cost < 0.0 {
        return Err(AppError::validation("金額は0以上の数値である必要があります"));
    }
    Ok(())
}

/// 日付形式（YYYY-MM-DD）を検証する
pub fn validate_date(date: &str) -> AppResult<()> {
    if !DATE_PATTERN.is_match(date) {
        return Err(AppError::validation(format!(
            "日付はYYYY-MM-DD形式である必要があります: {date}"
        )));
    }
    Ok(())
}

/// 月フィルター形式（YYYY-MM）を検証する
///
/// LIKE検索に渡す前に検証し、`%`や`_`がワイルドカードとして
/// 働かないようにする。
pub fn validate_month(month: &str) -> AppResult<()> {
    if !MONTH_PATTERN.is_match(month) {
        return Err(AppError::validation(format!(
            "月はYYYY-MM形式である必要があります: {month}"
        )));
    }
    Ok(())
}

impl CreateExpenseRequest {
    /// 作成リクエスト全体を検証する
    pub fn validate(&self) -> AppResult<()> {
        if self.category.trim().is_empty() {
            return Err(AppError::validation("費目は必須です"));
        }
        if self.vendor.trim().is_empty() {
            return Err(AppError::validation("支払先は必須です"));
        }
        if self.trip_name.trim().is_empty() {
            return Err(AppError::validation("旅行名は必須です"));
        }
        validate_date(&self.date)?;
        validate_cost(self.cost)?;
        Ok(())
    }
}

impl UpdateExpenseRequest {
    /// 更新リクエストに含まれるフィールドを検証する
    pub fn validate(&self) -> AppResult<()> {
        if let Some(date) = &self.date {
            validate_date(date)?;
        }
        if let Some(cost) = self.cost {
            validate_cost(cost)?;
        }
        if let Some(category) = &self.category {
            if category.trim().is_empty() {
                return Err(AppError::validation("費目を空にはできません"));
            }
        }
        if let Some(trip_name) = &self.trip_name {
            if trip_name.trim().is_empty() {
                return Err(AppError::validation("旅行名を空にはできません"));
            }
        }
        Ok(())
    }
}
