// ABOUTME: DashMap-backed record store with lazy expiry at read time
// ABOUTME: Keeps pending authorizations and issued tokens plus a refresh-token index
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 ConnectingIB

use super::RecordStore;
use crate::errors::StoreError;
use crate::models::{IssuedToken, PendingAuthorization};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

/// In-memory record store.
///
/// Tokens are double-indexed: the primary map is keyed by access token and
/// `refresh_index` maps refresh token to access token, so both lookups stay
/// O(1). The two maps are kept consistent by always writing the index entry
/// together with the primary record and removing both on delete.
#[derive(Default)]
pub struct MemoryRecordStore {
    pending: DashMap<String, PendingAuthorization>,
    tokens: DashMap<String, IssuedToken>,
    refresh_index: DashMap<String, String>,
}

impl MemoryRecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn remove_token_entry(&self, access_token: &str) -> Option<IssuedToken> {
        let removed = self.tokens.remove(access_token).map(|(_, record)| record);
        if let Some(record) = &removed {
            self.refresh_index.remove(&record.refresh_token);
        }
        removed
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn put_pending(&self, record: PendingAuthorization) -> Result<(), StoreError> {
        self.pending.insert(record.key.clone(), record);
        Ok(())
    }

    async fn get_pending(&self, key: &str) -> Result<PendingAuthorization, StoreError> {
        let record = self
            .pending
            .get(key)
            .map(|entry| entry.clone())
            .ok_or(StoreError::NotFound)?;

        if record.expires_at <= Utc::now() {
            self.pending.remove(key);
            return Err(StoreError::Expired);
        }

        Ok(record)
    }

    async fn consume_pending(&self, key: &str) -> Result<(), StoreError> {
        self.pending
            .remove(key)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn promote_pending(
        &self,
        old_key: &str,
        new_key: &str,
        record: PendingAuthorization,
    ) -> Result<(), StoreError> {
        // Write the code record before deleting the poll record: a crash in
        // between leaves a retryable duplicate, never a lost login.
        self.pending.insert(new_key.to_owned(), record);

        if self.pending.remove(old_key).is_none() {
            // Lost the race with a concurrent promotion. Roll back our code
            // record so only one authorization code is ever minted per login.
            self.pending.remove(new_key);
            return Err(StoreError::NotFound);
        }

        Ok(())
    }

    async fn put_token(&self, record: IssuedToken) -> Result<(), StoreError> {
        self.refresh_index
            .insert(record.refresh_token.clone(), record.access_token.clone());
        self.tokens.insert(record.access_token.clone(), record);
        Ok(())
    }

    async fn get_token(&self, access_token: &str) -> Result<IssuedToken, StoreError> {
        let record = self
            .tokens
            .get(access_token)
            .map(|entry| entry.clone())
            .ok_or(StoreError::NotFound)?;

        if record.expires_at <= Utc::now() {
            self.remove_token_entry(access_token);
            return Err(StoreError::Expired);
        }

        Ok(record)
    }

    async fn get_token_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<IssuedToken, StoreError> {
        let access_token = self
            .refresh_index
            .get(refresh_token)
            .map(|entry| entry.clone())
            .ok_or(StoreError::NotFound)?;

        let record = self
            .tokens
            .get(&access_token)
            .map(|entry| entry.clone())
            .ok_or(StoreError::NotFound)?;

        if record.expires_at <= Utc::now() {
            self.remove_token_entry(&access_token);
            return Err(StoreError::Expired);
        }

        Ok(record)
    }

    async fn delete_token(&self, access_token: &str) -> Result<(), StoreError> {
        self.remove_token_entry(access_token);
        Ok(())
    }
}
