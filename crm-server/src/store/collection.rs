//! A single in-memory document collection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::model::Document;

/// Insertion-ordered documents with an id index.
///
/// Every read-modify-write runs under one write guard, so concurrent
/// writers to the same document are serialized.
#[derive(Clone)]
pub struct Collection<T: Document> {
    inner: Arc<CollectionInner<T>>,
}

struct CollectionInner<T> {
    name: &'static str,
    closed: AtomicBool,
    docs: RwLock<Docs<T>>,
}

struct Docs<T> {
    items: Vec<T>,
    index: HashMap<Uuid, usize>,
}

impl<T: Document> Collection<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            inner: Arc::new(CollectionInner {
                name,
                closed: AtomicBool::new(false),
                docs: RwLock::new(Docs {
                    items: Vec::new(),
                    index: HashMap::new(),
                }),
            }),
        }
    }

    /// Reject all further reads and writes.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }

    fn ensure_open(&self) -> AppResult<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(AppError::Storage(format!(
                "collection '{}' is closed",
                self.inner.name
            )));
        }
        Ok(())
    }

    pub async fn insert(&self, doc: T) -> AppResult<T> {
        self.ensure_open()?;
        let mut docs = self.inner.docs.write().await;
        docs.push(doc.clone());
        Ok(doc)
    }

    /// Insert `doc` unless an existing document satisfies `conflicts`.
    ///
    /// Returns `None` when a conflicting document was found. The check and
    /// the insert happen under the same guard.
    pub async fn insert_unless<F>(&self, doc: T, conflicts: F) -> AppResult<Option<T>>
    where
        F: Fn(&T) -> bool,
    {
        self.ensure_open()?;
        let mut docs = self.inner.docs.write().await;
        if docs.items.iter().any(|d| conflicts(d)) {
            return Ok(None);
        }
        docs.push(doc.clone());
        Ok(Some(doc))
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Option<T>> {
        self.ensure_open()?;
        let docs = self.inner.docs.read().await;
        Ok(docs.index.get(&id).map(|&i| docs.items[i].clone()))
    }

    /// All documents, in insertion order.
    pub async fn all(&self) -> AppResult<Vec<T>> {
        self.ensure_open()?;
        Ok(self.inner.docs.read().await.items.clone())
    }

    /// Documents matching `filter`, in insertion order.
    pub async fn find<F>(&self, filter: F) -> AppResult<Vec<T>>
    where
        F: Fn(&T) -> bool,
    {
        self.ensure_open()?;
        let docs = self.inner.docs.read().await;
        Ok(docs.items.iter().filter(|&d| filter(d)).cloned().collect())
    }

    pub async fn count<F>(&self, filter: F) -> AppResult<usize>
    where
        F: Fn(&T) -> bool,
    {
        self.ensure_open()?;
        let docs = self.inner.docs.read().await;
        Ok(docs.items.iter().filter(|&d| filter(d)).count())
    }

    /// Overwrite the stored document with the same id.
    pub async fn replace(&self, doc: T) -> AppResult<T> {
        self.ensure_open()?;
        let mut docs = self.inner.docs.write().await;
        let slot = docs.index.get(&doc.id()).copied().ok_or_else(|| {
            AppError::Storage(format!(
                "document {} missing from '{}'",
                doc.id(),
                self.inner.name
            ))
        })?;
        docs.items[slot] = doc.clone();
        Ok(doc)
    }

    /// Apply `update` to the document with `id` and return the new version.
    pub async fn update<F>(&self, id: Uuid, update: F) -> AppResult<Option<T>>
    where
        F: FnOnce(&mut T),
    {
        self.ensure_open()?;
        let mut docs = self.inner.docs.write().await;
        let Some(&slot) = docs.index.get(&id) else {
            return Ok(None);
        };
        let doc = &mut docs.items[slot];
        update(&mut *doc);
        Ok(Some(doc.clone()))
    }

    /// Apply `update` to the first document matching `filter`.
    pub async fn find_one_and_update<F, U>(&self, filter: F, update: U) -> AppResult<Option<T>>
    where
        F: Fn(&T) -> bool,
        U: FnOnce(&mut T),
    {
        self.ensure_open()?;
        let mut docs = self.inner.docs.write().await;
        let Some(doc) = docs.items.iter_mut().find(|d| filter(&**d)) else {
            return Ok(None);
        };
        update(&mut *doc);
        Ok(Some(doc.clone()))
    }
}

impl<T: Document> Docs<T> {
    fn push(&mut self, doc: T) {
        self.index.insert(doc.id(), self.items.len());
        self.items.push(doc);
    }
}
