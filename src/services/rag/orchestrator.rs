//! Query answering over one document's evidence

use std::future::Future;
use std::sync::Arc;

use super::cache::EvidenceCache;
use super::chunker::chunk_document;
use super::ranker::{rank, select_top_k};
use super::types::{Chunk, EvidenceSet, RagAnswer};
use crate::db::{DiscussionItem, Document};
use crate::error::{AppError, AppResult};
use crate::services::{build_answer_prompt, build_summary_prompt, RagPolicy};
use crate::traits::{DocumentStore, Embedder, TextGenerator};
use crate::utils::{compute_sha256, validate_not_empty};

pub struct RagOrchestrator {
    store: Arc<dyn DocumentStore>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn TextGenerator>,
    cache: EvidenceCache,
    policy: RagPolicy,
}

impl RagOrchestrator {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn TextGenerator>,
        cache: EvidenceCache,
        policy: RagPolicy,
    ) -> Self {
        Self {
            store,
            embedder,
            generator,
            cache,
            policy,
        }
    }

    /// Answers `query` from the document's title and discussion.
    ///
    /// Scores of every ranked chunk come back with the answer, highest first;
    /// only the top-K above `min_score` reach the prompt.
    pub async fn answer(&self, document_id: &str, query: &str) -> AppResult<RagAnswer> {
        self.with_deadline("answer", self.answer_inner(document_id, query))
            .await
    }

    /// One-shot summary of a document and its discussion.
    pub async fn summarize(&self, document_id: &str) -> AppResult<String> {
        self.with_deadline("summarize", self.summarize_inner(document_id))
            .await
    }

    /// Drops the cached evidence so the next query recomputes it.
    pub async fn invalidate(&self, document_id: &str) {
        self.cache.invalidate(document_id).await
    }

    async fn with_deadline<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = AppResult<T>>,
    ) -> AppResult<T> {
        let limit = self.policy.request_timeout();
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(operation, timeout_secs = limit.as_secs(), "Request timed out");
                Err(AppError::Dependency(format!(
                    "{operation} timed out after {}s",
                    limit.as_secs()
                )))
            }
        }
    }

    async fn answer_inner(&self, document_id: &str, query: &str) -> AppResult<RagAnswer> {
        let document_id = validate_not_empty(document_id, "document_id")?;
        let query = validate_not_empty(query, "query")?;

        let query_vector = self.embedder.embed(query).await?;

        let chunks = match self.cache.get(document_id).await {
            Some(set) => {
                tracing::debug!(document_id, chunks = set.chunks.len(), "Evidence cache hit");
                set.chunks
            }
            None => self.build_evidence(document_id).await?,
        };

        let ranked = rank(chunks, &query_vector)?;
        let selected = select_top_k(&ranked, self.policy.top_k, self.policy.min_score);
        let evidence: Vec<&str> = selected.iter().map(|c| c.text.as_str()).collect();

        tracing::info!(
            document_id,
            ranked = ranked.len(),
            selected = evidence.len(),
            "Answering query"
        );

        let prompt = build_answer_prompt(query, &evidence);
        let answer = self.generator.generate(&prompt).await?;

        Ok(RagAnswer {
            ranked_scores: ranked.iter().map(|c| c.score).collect(),
            answer,
        })
    }

    async fn summarize_inner(&self, document_id: &str) -> AppResult<String> {
        let document_id = validate_not_empty(document_id, "document_id")?;
        let (document, discussion) = self.load(document_id).await?;

        let prompt = build_summary_prompt(&document, &discussion);
        let summary = self.generator.generate(&prompt).await?;
        tracing::info!(document_id, chars = summary.len(), "Summary generated");
        Ok(summary)
    }

    async fn load(&self, document_id: &str) -> AppResult<(Document, Vec<DiscussionItem>)> {
        let document = self.store.find_document(document_id).await?;
        let discussion = self
            .store
            .find_discussion_items(document_id)
            .await
            .map_err(|err| {
                tracing::warn!(document_id, error = %err, "Discussion fetch failed");
                AppError::not_found("discussion", document_id)
            })?;
        Ok((document, discussion))
    }

    /// Chunks and embeds the document, then caches the complete set.
    async fn build_evidence(&self, document_id: &str) -> AppResult<Vec<Chunk>> {
        let (document, discussion) = self.load(document_id).await?;
        let mut chunks = chunk_document(&document, &discussion);

        for chunk in chunks.iter_mut().filter(|c| !c.has_embedding()) {
            let embedding = self.embedder.embed(&chunk.text).await?;
            chunk.attach_embedding(embedding);
        }

        let set = EvidenceSet::new(document_id, chunks);
        let fingerprint = compute_sha256(
            &set.chunks
                .iter()
                .map(|c| c.text.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        );
        tracing::debug!(
            document_id,
            chunks = set.chunks.len(),
            model = self.embedder.model_name(),
            fingerprint = %fingerprint,
            "Evidence set built"
        );

        if set.chunks.is_empty() {
            tracing::debug!(document_id, "No evidence to cache");
        } else {
            self.cache.put(&set).await;
        }
        Ok(set.chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        document, MemoryDocumentStore, MemoryKvStore, MockEmbedder, MockGenerator,
    };
    use std::time::Duration;

    struct Harness {
        store: Arc<MemoryDocumentStore>,
        kv: Arc<MemoryKvStore>,
        embedder: Arc<MockEmbedder>,
        generator: Arc<MockGenerator>,
        cache: EvidenceCache,
        orchestrator: RagOrchestrator,
    }

    fn harness(policy: RagPolicy) -> Harness {
        let store = Arc::new(MemoryDocumentStore::default());
        let embedder = Arc::new(MockEmbedder::default());
        let generator = Arc::new(MockGenerator::default());
        let kv = Arc::new(MemoryKvStore::default());
        let cache = EvidenceCache::new(kv.clone(), Duration::from_secs(60));
        let orchestrator = RagOrchestrator::new(
            store.clone(),
            embedder.clone(),
            generator.clone(),
            cache.clone(),
            policy,
        );
        Harness {
            store,
            kv,
            embedder,
            generator,
            cache,
            orchestrator,
        }
    }

    fn seeded() -> Harness {
        let h = harness(RagPolicy::default());
        h.store.insert(document("p1", "Hello world"));
        h.store.add_comment("p1", "Nice post\nThanks");
        h
    }

    #[tokio::test]
    async fn miss_builds_and_caches_evidence() {
        let h = seeded();

        let result = h.orchestrator.answer("p1", "Thanks").await.unwrap();
        assert_eq!(result.ranked_scores.len(), 3);
        assert!(result.ranked_scores.windows(2).all(|w| w[0] >= w[1]));
        assert!((result.ranked_scores[0] - 1.0).abs() < 1e-6);
        assert_eq!(result.answer, "generated answer");

        let cached = h.cache.get("p1").await.unwrap();
        let texts: Vec<&str> = cached.chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["Hello world", "Nice post", "Thanks"]);
        // query + one embedding per chunk
        assert_eq!(h.embedder.calls(), 4);

        let prompt = h.generator.last_prompt().unwrap();
        assert!(prompt.contains("Thanks"));
    }

    #[tokio::test]
    async fn hit_skips_store_and_chunk_embedding() {
        let h = seeded();
        h.orchestrator.answer("p1", "Hello").await.unwrap();
        let reads = h.store.reads();

        h.orchestrator.answer("p1", "Nice post").await.unwrap();
        assert_eq!(h.store.reads(), reads);
        assert_eq!(h.embedder.calls(), 5);
    }

    #[tokio::test]
    async fn low_scoring_chunks_stay_out_of_prompt() {
        let h = harness(RagPolicy {
            min_score: 0.999,
            ..RagPolicy::default()
        });
        h.store.insert(document("p1", "Hello world"));
        h.store.add_comment("p1", "Completely unrelated remark");

        h.orchestrator.answer("p1", "Hello world").await.unwrap();
        let prompt = h.generator.last_prompt().unwrap();
        assert!(prompt.contains(r#"Relevant content chunks: ["Hello world"]"#));
    }

    #[tokio::test]
    async fn blank_inputs_are_rejected_before_any_call() {
        let h = seeded();
        assert!(matches!(
            h.orchestrator.answer("", "q").await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            h.orchestrator.answer("p1", "   ").await,
            Err(AppError::Validation(_))
        ));
        assert_eq!(h.embedder.calls(), 0);
        assert_eq!(h.store.reads(), 0);
    }

    #[tokio::test]
    async fn unknown_document_is_not_found() {
        let h = seeded();
        assert!(matches!(
            h.orchestrator.answer("missing", "q").await,
            Err(AppError::NotFound { entity: "document", .. })
        ));
        assert!(h.generator.last_prompt().is_none());
    }

    #[tokio::test]
    async fn discussion_fetch_failure_is_not_found() {
        let h = seeded();
        h.store.fail_discussion(true);
        assert!(matches!(
            h.orchestrator.answer("p1", "q").await,
            Err(AppError::NotFound { entity: "discussion", .. })
        ));
        assert!(h.cache.get("p1").await.is_none());
    }

    #[tokio::test]
    async fn embedding_failure_fails_and_caches_nothing() {
        let h = seeded();
        h.embedder.fail_on("Thanks");
        assert!(matches!(
            h.orchestrator.answer("p1", "Hello").await,
            Err(AppError::Dependency(_))
        ));
        assert!(h.cache.get("p1").await.is_none());
    }

    #[tokio::test]
    async fn generation_failure_propagates() {
        let h = seeded();
        h.generator.set_failing(true);
        assert!(matches!(
            h.orchestrator.answer("p1", "Hello").await,
            Err(AppError::Dependency(_))
        ));
    }

    #[tokio::test]
    async fn slow_generation_times_out() {
        let h = harness(RagPolicy {
            request_timeout_secs: 1,
            ..RagPolicy::default()
        });
        h.store.insert(document("p1", "Hello world"));
        h.generator.set_delay(Duration::from_secs(5));

        let err = h.orchestrator.answer("p1", "Hello").await.unwrap_err();
        assert!(matches!(err, AppError::Dependency(ref msg) if msg.contains("timed out")));
    }

    #[tokio::test]
    async fn concurrent_answers_on_uncached_document() {
        let h = seeded();
        let (a, b) = tokio::join!(
            h.orchestrator.answer("p1", "Hello"),
            h.orchestrator.answer("p1", "Thanks")
        );
        assert_eq!(a.unwrap().ranked_scores.len(), 3);
        assert_eq!(b.unwrap().ranked_scores.len(), 3);

        let cached = h.cache.get("p1").await.unwrap();
        assert!(cached.is_complete());
        assert_eq!(cached.chunks.len(), 3);
    }

    #[tokio::test]
    async fn invalidate_forces_recompute() {
        let h = seeded();
        h.orchestrator.answer("p1", "Hello").await.unwrap();
        h.store.add_comment("p1", "Late reply");

        h.orchestrator.invalidate("p1").await;
        let result = h.orchestrator.answer("p1", "Hello").await.unwrap();
        assert_eq!(result.ranked_scores.len(), 4);
    }

    #[tokio::test]
    async fn summarize_uses_document_and_discussion() {
        let h = seeded();
        let summary = h.orchestrator.summarize("p1").await.unwrap();
        assert_eq!(summary, "generated answer");

        let prompt = h.generator.last_prompt().unwrap();
        assert!(prompt.contains(r#"Title: "Hello world""#));
        assert!(prompt.contains("Nice post"));
        assert!(matches!(
            h.orchestrator.summarize("missing").await,
            Err(AppError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn document_without_evidence_is_answered_and_never_cached() {
        let h = harness(RagPolicy::default());
        let mut doc = document("p1", "   ");
        doc.body = String::new();
        h.store.insert(doc);

        for _ in 0..2 {
            let result = h.orchestrator.answer("p1", "anything").await.unwrap();
            assert!(result.ranked_scores.is_empty());
        }
        assert_eq!(h.kv.writes(), 0);
        assert!(h.generator.last_prompt().unwrap().contains("Relevant content chunks: []"));
    }
}
