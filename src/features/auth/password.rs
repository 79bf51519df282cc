use crate::shared::errors::{AppError, AppResult};
use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

/// パスワードの最小文字数
const MIN_PASSWORD_LENGTH: usize = 8;

/// パスワードをArgon2idでハッシュ化する
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::security(format!("パスワードハッシュ化エラー: {e}")))?;

    Ok(hash.to_string())
}

/// パスワードをハッシュと照合する
pub fn verify_password(password: &str, password_hash: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| AppError::security(format!("パスワードハッシュ解析エラー: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// パスワードの強度を検証する
pub fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::validation(format!(
            "パスワードは{MIN_PASSWORD_LENGTH}文字以上である必要があります"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let password = "correct_horse_battery";
        let hash = hash_password(password).unwrap();

        // Argon2id形式であること
        assert!(hash.starts_with("$argon2id$"));

        // 正しいパスワードは照合成功
        assert!(verify_password(password, &hash).unwrap());

        // 誤ったパスワードは照合失敗
        assert!(!verify_password("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_hashes_are_salted() {
        let password = "same_password_twice";
        let hash1 = hash_password(password).unwrap();
        let hash2 = hash_password(password).unwrap();

        // ソルトにより毎回異なるハッシュになること
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("12345678").is_ok());
        assert!(validate_password("1234567").is_err());
        assert!(validate_password("").is_err());
    }

    #[test]
    fn test_verify_rejects_invalid_hash() {
        let result = verify_password("password", "not_a_valid_hash");
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), AppError::Security(_)));
    }
}
