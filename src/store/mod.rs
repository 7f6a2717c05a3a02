// ABOUTME: Record store abstraction for pending authorizations and issued tokens
// ABOUTME: Declares the async RecordStore trait implemented by the in-memory backend
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 ConnectingIB

/// DashMap-backed store, the default backend
pub mod memory;

pub use memory::MemoryRecordStore;

use crate::errors::StoreError;
use crate::models::{IssuedToken, PendingAuthorization};
use async_trait::async_trait;

/// Storage contract for the bridge's two record families.
///
/// Every read enforces expiry lazily: an expired record is deleted during the
/// lookup and reported as `StoreError::Expired`, so no background sweeper is
/// required and no caller can act on stale state.
///
/// Implementations must be safe under concurrent access; the promotion and
/// rotation operations in particular are racing with duplicate client
/// requests and must keep single-use semantics.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert or replace a pending authorization under its `key`
    async fn put_pending(&self, record: PendingAuthorization) -> Result<(), StoreError>;

    /// Fetch a pending authorization by key, deleting it first if expired
    async fn get_pending(&self, key: &str) -> Result<PendingAuthorization, StoreError>;

    /// Remove a pending authorization, reporting `NotFound` when nothing was
    /// removed. Single-use code consumption hinges on this: of two racing
    /// consumers, exactly one sees `Ok`.
    async fn consume_pending(&self, key: &str) -> Result<(), StoreError>;

    /// Re-key a pending record from poll-token to authorization code.
    ///
    /// Writes `record` (already carrying the new key and session) under
    /// `new_key` before removing `old_key`, so a crash between the two steps
    /// leaves a retryable duplicate rather than a lost login. Exactly one of
    /// two concurrent promotions of the same `old_key` may succeed; the loser
    /// gets `StoreError::NotFound` and must not have minted a code.
    async fn promote_pending(
        &self,
        old_key: &str,
        new_key: &str,
        record: PendingAuthorization,
    ) -> Result<(), StoreError>;

    /// Insert an issued token, indexed by access token and refresh token
    async fn put_token(&self, record: IssuedToken) -> Result<(), StoreError>;

    /// Fetch an issued token by access token, deleting it first if expired
    async fn get_token(&self, access_token: &str) -> Result<IssuedToken, StoreError>;

    /// Fetch an issued token by refresh token, deleting it first if expired
    async fn get_token_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<IssuedToken, StoreError>;

    /// Delete an issued token pair; `Ok` whether or not it existed
    async fn delete_token(&self, access_token: &str) -> Result<(), StoreError>;
}
