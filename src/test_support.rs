//! In-memory doubles for the capability traits.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::{DiscussionItem, Document, DocumentKind, DocumentStamp};
use crate::error::{AppError, AppResult};
use crate::services::rag::EvidenceCache;
use crate::services::JobDeps;
use crate::traits::{DocumentStore, Embedder, KvStore, Mailer, TextGenerator};

pub fn document(id: &str, title: &str) -> Document {
    Document {
        id: id.to_string(),
        title: title.to_string(),
        body: format!("Body of {id}"),
        kind: DocumentKind::Text,
        tags: vec!["test".to_string()],
        updated_at: Utc::now(),
        embeddings: None,
    }
}

/// Letter-frequency vector: equal text gives equal vectors.
#[derive(Default)]
pub struct MockEmbedder {
    calls: AtomicUsize,
    fail_on: Mutex<Option<String>>,
}

impl MockEmbedder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_on(&self, text: &str) {
        *self.fail_on.lock().unwrap() = Some(text.to_string());
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    fn model_name(&self) -> &str {
        "mock-letters"
    }

    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on.lock().unwrap().as_deref() == Some(text) {
            return Err(AppError::Dependency(format!("embedding refused for {text:?}")));
        }

        let mut vector = vec![0.0f32; 27];
        for ch in text.chars() {
            let slot = match ch.to_ascii_lowercase() {
                c @ 'a'..='z' => (c as u8 - b'a') as usize,
                _ => 26,
            };
            vector[slot] += 1.0;
        }
        Ok(vector)
    }
}

pub struct MockGenerator {
    reply: String,
    failing: AtomicBool,
    delay: Mutex<Duration>,
    prompts: Mutex<Vec<String>>,
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self {
            reply: "generated answer".to_string(),
            failing: AtomicBool::new(false),
            delay: Mutex::new(Duration::ZERO),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

impl MockGenerator {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, prompt: &str) -> AppResult<String> {
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Dependency("generation unavailable".to_string()));
        }
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.reply.clone())
    }
}

/// Document store that counts every read.
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<HashMap<String, Document>>,
    discussion: Mutex<HashMap<String, Vec<DiscussionItem>>>,
    reads: AtomicUsize,
    fail_discussion: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn insert(&self, document: Document) {
        self.documents
            .lock()
            .unwrap()
            .insert(document.id.clone(), document);
    }

    pub fn add_comment(&self, document_id: &str, content: &str) {
        let mut discussion = self.discussion.lock().unwrap();
        let items = discussion.entry(document_id.to_string()).or_default();
        items.push(DiscussionItem {
            id: format!("{document_id}-c{}", items.len() + 1),
            document_id: document_id.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        });
    }

    pub fn touch(&self, document_id: &str, updated_at: DateTime<Utc>) {
        if let Some(doc) = self.documents.lock().unwrap().get_mut(document_id) {
            doc.updated_at = updated_at;
        }
    }

    pub fn embeddings(&self, document_id: &str) -> Option<Vec<f32>> {
        self.documents
            .lock()
            .unwrap()
            .get(document_id)
            .and_then(|d| d.embeddings.clone())
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn fail_discussion(&self, fail: bool) {
        self.fail_discussion.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn find_document(&self, document_id: &str) -> AppResult<Document> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.documents
            .lock()
            .unwrap()
            .get(document_id)
            .cloned()
            .ok_or_else(|| AppError::not_found("document", document_id))
    }

    async fn find_discussion_items(&self, document_id: &str) -> AppResult<Vec<DiscussionItem>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_discussion.load(Ordering::SeqCst) {
            return Err(AppError::Dependency("discussion backend down".to_string()));
        }
        Ok(self
            .discussion
            .lock()
            .unwrap()
            .get(document_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn update_document_embeddings(&self, document_id: &str, embeddings: &[f32]) -> AppResult<()> {
        let mut documents = self.documents.lock().unwrap();
        let doc = documents
            .get_mut(document_id)
            .ok_or_else(|| AppError::not_found("document", document_id))?;
        doc.embeddings = Some(embeddings.to_vec());
        Ok(())
    }

    async fn list_document_stamps(&self) -> AppResult<Vec<DocumentStamp>> {
        let mut stamps: Vec<DocumentStamp> = self
            .documents
            .lock()
            .unwrap()
            .values()
            .map(|d| DocumentStamp {
                id: d.id.clone(),
                updated_at: d.updated_at,
            })
            .collect();
        stamps.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(stamps)
    }
}

#[derive(Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, (Vec<u8>, Instant)>>,
    writes: AtomicUsize,
}

impl MemoryKvStore {
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .get(key)
            .filter(|(_, expires_at)| *expires_at > Instant::now())
            .map(|(value, _)| value.clone()))
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> AppResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_vec(), Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Every operation fails.
pub struct FailingKvStore;

#[async_trait]
impl KvStore for FailingKvStore {
    async fn get(&self, _key: &str) -> AppResult<Option<Vec<u8>>> {
        Err(AppError::Cache("connection refused".to_string()))
    }

    async fn set(&self, _key: &str, _value: &[u8], _ttl: Duration) -> AppResult<()> {
        Err(AppError::Cache("connection refused".to_string()))
    }

    async fn delete(&self, _key: &str) -> AppResult<()> {
        Err(AppError::Cache("connection refused".to_string()))
    }
}

#[derive(Default)]
pub struct MockMailer {
    sent: Mutex<Vec<(String, String)>>,
    failing: AtomicBool,
}

impl MockMailer {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, to: &str, subject: &str, _html: &str) -> AppResult<String> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Dependency("mail provider unavailable".to_string()));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push((to.to_string(), subject.to_string()));
        Ok(format!("msg-{}", sent.len()))
    }
}

pub struct JobHarness {
    pub deps: JobDeps,
    pub store: Arc<MemoryDocumentStore>,
    pub embedder: Arc<MockEmbedder>,
    pub generator: Arc<MockGenerator>,
    pub mailer: Arc<MockMailer>,
}

pub fn job_harness() -> JobHarness {
    let store = Arc::new(MemoryDocumentStore::default());
    let embedder = Arc::new(MockEmbedder::default());
    let generator = Arc::new(MockGenerator::default());
    let mailer = Arc::new(MockMailer::default());
    let deps = JobDeps {
        store: store.clone(),
        embedder: embedder.clone(),
        generator: generator.clone(),
        mailer: mailer.clone(),
        cache: EvidenceCache::new(Arc::new(MemoryKvStore::default()), Duration::from_secs(60)),
    };
    JobHarness {
        deps,
        store,
        embedder,
        generator,
        mailer,
    }
}
