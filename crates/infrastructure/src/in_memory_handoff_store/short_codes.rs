use async_trait::async_trait;
use chrono::{DateTime, Utc};
use handoff_application::ShortCodeRepository;

use super::*;

#[async_trait]
impl ShortCodeRepository for InMemoryHandoffStore {
    async fn insert_short_code(&self, record: &ShortCodeRecord) -> AppResult<()> {
        self.ensure_available()?;
        let mut short_codes = self.short_codes.write().await;

        if short_codes.contains_key(&record.code_hash) {
            return Err(AppError::Internal("short code hash collision".to_owned()));
        }

        short_codes.insert(record.code_hash.clone(), record.clone());
        Ok(())
    }

    async fn find_short_code(&self, code_hash: &str) -> AppResult<Option<ShortCodeRecord>> {
        self.ensure_available()?;
        Ok(self.short_codes.read().await.get(code_hash).cloned())
    }

    async fn mark_short_code_used(&self, code_hash: &str, now: DateTime<Utc>) -> AppResult<bool> {
        self.ensure_available()?;
        let mut short_codes = self.short_codes.write().await;

        match short_codes.get_mut(code_hash) {
            Some(record) if !record.used && !record.is_expired_at(now) => {
                record.used = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_expired_short_codes(&self, before: DateTime<Utc>) -> AppResult<u64> {
        self.ensure_available()?;
        let mut short_codes = self.short_codes.write().await;
        let initial = short_codes.len();
        short_codes.retain(|_, record| record.expires_at >= before);
        Ok((initial - short_codes.len()) as u64)
    }
}
