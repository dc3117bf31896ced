use sqlx::{postgres::PgRow, FromRow, Row};

use crate::domain::models::{login_token::LoginToken, one_time_token::OneTimeToken};

impl FromRow<'_, PgRow> for LoginToken {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(LoginToken {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            token_value: row.try_get("token_value")?,
            created_at: row.try_get("created_at")?,
            expires_at: row.try_get("expires_at")?,
        })
    }
}

impl FromRow<'_, PgRow> for OneTimeToken {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(OneTimeToken {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            token_value: row.try_get("token_value")?,
            is_used: row.try_get("is_used")?,
            created_at: row.try_get("created_at")?,
            expires_at: row.try_get("expires_at")?,
        })
    }
}
