//! Collection - typed accessor for documents of one kind.

use std::marker::PhantomData;

use crate::actor::StoreHandle;
use crate::doc::{Document, VersionedDoc, NO_DOCUMENT};
use crate::error::StoreError;

/// Typed wrapper for reading and writing documents of a specific type.
///
/// Keys are `"COLLECTION:id"`, so different document types with the same id
/// never collide inside one store.
pub struct Collection<'a, D> {
    handle: &'a StoreHandle,
    _marker: PhantomData<D>,
}

impl<'a, D: Document> Collection<'a, D> {
    pub fn new(handle: &'a StoreHandle) -> Self {
        Self {
            handle,
            _marker: PhantomData,
        }
    }

    pub fn key(id: &str) -> String {
        format!("{}:{}", D::COLLECTION, id)
    }

    fn prefix() -> String {
        format!("{}:", D::COLLECTION)
    }

    /// Get a document by id.
    pub async fn get(&self, id: &str) -> Result<Option<VersionedDoc<D>>, StoreError> {
        self.handle.get_doc(&Self::key(id)).await
    }

    /// Insert a new document. Fails with `Conflict` if the id is taken.
    pub async fn insert(&self, doc: &D) -> Result<VersionedDoc<D>, StoreError> {
        let version = self
            .handle
            .cas_put_strict(&Self::key(doc.id()), NO_DOCUMENT, doc)
            .await?;
        Ok(VersionedDoc::new(version, doc.clone()))
    }

    /// Upsert without a version check (last writer wins).
    pub async fn save(&self, doc: &D) -> Result<VersionedDoc<D>, StoreError> {
        let version = self.handle.put(&Self::key(doc.id()), doc).await?;
        Ok(VersionedDoc::new(version, doc.clone()))
    }

    /// Update an existing document with optimistic concurrency control.
    pub async fn update(
        &self,
        doc: &D,
        expected_version: u64,
    ) -> Result<VersionedDoc<D>, StoreError> {
        let version = self
            .handle
            .cas_put_strict(&Self::key(doc.id()), expected_version, doc)
            .await?;
        Ok(VersionedDoc::new(version, doc.clone()))
    }

    /// Delete a document by id. Returns true if it existed.
    pub async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        self.handle.del(&Self::key(id)).await
    }

    pub async fn exists(&self, id: &str) -> Result<bool, StoreError> {
        self.handle.has(&Self::key(id)).await
    }

    /// All documents in the collection, in store order, up to `limit`.
    pub async fn list(&self, limit: Option<usize>) -> Result<Vec<D>, StoreError> {
        self.handle.list_prefix(&Self::prefix(), limit).await
    }

    /// Documents matching a predicate.
    pub async fn find(&self, predicate: impl Fn(&D) -> bool) -> Result<Vec<D>, StoreError> {
        let docs = self.list(None).await?;
        Ok(docs.into_iter().filter(|doc| predicate(doc)).collect())
    }
}
