// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Operation coordinator — one transformation request, end-to-end.
//
// Record bookkeeping is crash-consistent: the record is inserted as Pending
// and immediately moved to Processing, so a crash between the two steps is
// observable as pending-stuck rather than silently lost. Transformation
// failures are terminal and never retried — the transforms are deterministic,
// so a retry with the same bytes and options would fail identically.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};

use falzwerk_core::PipelineConfig;
use falzwerk_core::error::{FalzwerkError, Result, TransformError};
use falzwerk_core::types::{
    ArtifactId, ArtifactLocator, ArtifactOrigin, ArtifactRecord, LifecycleEvent, OperationId,
    OperationKind, OperationOptions, OperationRecord, OperationRequest, OperationStatus,
};
use falzwerk_document::TransformRegistry;
use falzwerk_store::{
    ArtifactStore, EventPublisher, MetadataCatalog, OperationUpdate, hash_bytes,
};

/// Raw artifact bytes plus the response metadata a front-door needs.
#[derive(Debug, Clone)]
pub struct DownloadPayload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub filename: String,
}

/// Orchestrates transformation requests against the artifact store, metadata
/// catalog, transformation registry, and event publisher.
///
/// All collaborators are shared handles; the coordinator itself is cheap to
/// clone and holds no per-request state, so any number of requests may run
/// concurrently. Operations on the same source artifact deliberately run in
/// parallel — artifacts are immutable, so each derivation is independent.
#[derive(Clone)]
pub struct OperationCoordinator {
    store: Arc<dyn ArtifactStore>,
    catalog: Arc<dyn MetadataCatalog>,
    publisher: Arc<dyn EventPublisher>,
    registry: TransformRegistry,
    config: PipelineConfig,
}

impl OperationCoordinator {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        catalog: Arc<dyn MetadataCatalog>,
        publisher: Arc<dyn EventPublisher>,
        config: PipelineConfig,
    ) -> Self {
        let registry = TransformRegistry::from_config(&config);
        Self {
            store,
            catalog,
            publisher,
            registry,
            config,
        }
    }

    /// Run one transformation request to completion.
    ///
    /// Returns the final operation record: `Completed` with a result artifact,
    /// or `Failed` with the failure message. Only request-level problems
    /// (invalid options, unavailable dependencies) surface as `Err` — a
    /// failing transform is a successfully recorded failure, not an error.
    #[instrument(skip(self, request), fields(
        source = %request.source_artifact_id,
        kind = %request.options.kind(),
    ))]
    pub async fn execute(&self, request: OperationRequest) -> Result<OperationRecord> {
        self.registry.validate(&request.options)?;
        if let OperationOptions::Merge { sources } = &request.options
            && sources.first() != Some(&request.source_artifact_id)
        {
            return Err(FalzwerkError::Validation(
                "merge source list must start with the request's source artifact".into(),
            ));
        }

        let record = OperationRecord::new(
            request.source_artifact_id,
            request.options.clone(),
            request.requested_by.clone(),
        );
        let operation_id = record.operation_id;
        self.catalog.insert_operation(&record).await?;
        self.catalog
            .update_operation(operation_id, OperationUpdate::status(OperationStatus::Processing))
            .await?;

        // Resolve every input. A missing source is a terminal failure for
        // this operation, not a request error — the record already exists.
        let source_ids: Vec<ArtifactId> = match &request.options {
            OperationOptions::Merge { sources } => sources.clone(),
            _ => vec![request.source_artifact_id],
        };
        let mut inputs = Vec::with_capacity(source_ids.len());
        for source_id in source_ids {
            match self.load_artifact(source_id).await {
                Ok(bytes) => inputs.push(bytes),
                Err(FalzwerkError::ArtifactNotFound(_) | FalzwerkError::ObjectMissing(_)) => {
                    return self
                        .fail(operation_id, record.kind, format!("source artifact {source_id} not found"))
                        .await;
                }
                Err(other) => return Err(other),
            }
        }

        // lopdf work is CPU-bound; keep it off the async workers.
        let registry = self.registry.clone();
        let options = request.options.clone();
        let outcome: std::result::Result<Vec<u8>, TransformError> =
            match tokio::task::spawn_blocking(move || registry.apply(&inputs, &options)).await {
                Ok(result) => result,
                Err(join_error) => Err(TransformError::Pdf(format!(
                    "transform task failed: {join_error}"
                ))),
            };

        let bytes = match outcome {
            Ok(bytes) => bytes,
            Err(transform_error) => {
                return self
                    .fail(operation_id, record.kind, transform_error.to_string())
                    .await;
            }
        };

        let result = self.persist_result(&record, bytes).await?;
        self.catalog
            .update_operation(operation_id, OperationUpdate::completed(result.artifact_id))
            .await?;
        self.publish_quietly(LifecycleEvent::OperationCompleted {
            operation_id,
            kind: record.kind,
            result_artifact_id: result.artifact_id,
        })
        .await;

        let final_record = self
            .catalog
            .find_operation(operation_id)
            .await?
            .ok_or(FalzwerkError::OperationNotFound(operation_id))?;
        info!(%operation_id, result_artifact = %result.artifact_id, "operation completed");
        Ok(final_record)
    }

    /// Current record for `operation_id`, verbatim.
    pub async fn status(&self, operation_id: OperationId) -> Result<OperationRecord> {
        self.catalog
            .find_operation(operation_id)
            .await?
            .ok_or(FalzwerkError::OperationNotFound(operation_id))
    }

    /// Stream the result artifact of a completed operation.
    ///
    /// Any non-completed status is a "not ready" error naming the current
    /// status; the caller decides whether to poll again or give up.
    #[instrument(skip(self), fields(%operation_id))]
    pub async fn download(&self, operation_id: OperationId) -> Result<DownloadPayload> {
        let record = self.status(operation_id).await?;
        if record.status != OperationStatus::Completed {
            return Err(FalzwerkError::NotReady(record.status));
        }
        let result_id = record.result_artifact_id.ok_or_else(|| {
            FalzwerkError::Catalog(format!(
                "completed operation {operation_id} has no result artifact"
            ))
        })?;
        let artifact = self
            .catalog
            .find_file(result_id)
            .await?
            .ok_or(FalzwerkError::ArtifactNotFound(result_id))?;
        let bytes = self.store.get(&artifact.locator).await?;

        Ok(DownloadPayload {
            bytes,
            mime_type: artifact.mime_type,
            filename: format!("{operation_id}.pdf"),
        })
    }

    // -- Internals -----------------------------------------------------------

    async fn load_artifact(&self, artifact_id: ArtifactId) -> Result<Vec<u8>> {
        let record = self
            .catalog
            .find_file(artifact_id)
            .await?
            .ok_or(FalzwerkError::ArtifactNotFound(artifact_id))?;
        self.store.get(&record.locator).await
    }

    /// Persist transform output as a new immutable artifact derived from the
    /// operation's source.
    async fn persist_result(
        &self,
        record: &OperationRecord,
        bytes: Vec<u8>,
    ) -> Result<ArtifactRecord> {
        let artifact_id = ArtifactId::new();
        let locator = ArtifactLocator::new(
            self.config.derived_container.as_str(),
            format!("{}/processed.pdf", record.operation_id),
        );
        self.store.put(&locator, &bytes, "application/pdf").await?;

        let artifact = ArtifactRecord {
            artifact_id,
            locator,
            mime_type: "application/pdf".into(),
            size_bytes: bytes.len() as u64,
            sha256: hash_bytes(&bytes),
            created_at: Utc::now(),
            owner_id: record.requested_by.clone(),
            lineage_parent_id: Some(record.source_artifact_id),
            origin: ArtifactOrigin::Derived {
                operation_id: record.operation_id,
            },
            pdf_info: None,
        };
        self.catalog.insert_file(&artifact).await?;
        Ok(artifact)
    }

    /// Settle the record as Failed and announce it.
    async fn fail(
        &self,
        operation_id: OperationId,
        kind: OperationKind,
        message: String,
    ) -> Result<OperationRecord> {
        warn!(%operation_id, %message, "operation failed");
        self.catalog
            .update_operation(operation_id, OperationUpdate::failed(message.clone()))
            .await?;
        self.publish_quietly(LifecycleEvent::OperationFailed {
            operation_id,
            kind,
            error: message,
        })
        .await;
        self.catalog
            .find_operation(operation_id)
            .await?
            .ok_or(FalzwerkError::OperationNotFound(operation_id))
    }

    /// Publish failures never affect the operation outcome.
    async fn publish_quietly(&self, event: LifecycleEvent) {
        if let Err(err) = self.publisher.publish(&event).await {
            warn!(%err, routing_key = event.routing_key(), "event publish failed; continuing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::UploadIntake;
    use falzwerk_store::{FsArtifactStore, SqliteCatalog};
    use lopdf::{Document, Object, Stream, dictionary};
    use std::sync::Mutex;

    /// Publisher that records everything it is given.
    #[derive(Default)]
    struct RecordingPublisher {
        events: Mutex<Vec<LifecycleEvent>>,
    }

    impl RecordingPublisher {
        fn events(&self) -> Vec<LifecycleEvent> {
            self.events.lock().expect("events lock").clone()
        }
    }

    #[async_trait::async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish(&self, event: &LifecycleEvent) -> Result<()> {
            self.events.lock().expect("events lock").push(event.clone());
            Ok(())
        }
    }

    /// Publisher whose broker is permanently down.
    struct FailingPublisher;

    #[async_trait::async_trait]
    impl EventPublisher for FailingPublisher {
        async fn publish(&self, _event: &LifecycleEvent) -> Result<()> {
            Err(FalzwerkError::Publish("broker unreachable".into()))
        }
    }

    struct TestEnv {
        coordinator: OperationCoordinator,
        intake: UploadIntake,
        catalog: Arc<dyn MetadataCatalog>,
        publisher: Arc<RecordingPublisher>,
        _dir: tempfile::TempDir,
    }

    fn env() -> TestEnv {
        let dir = tempfile::tempdir().expect("tempdir");
        let store: Arc<dyn ArtifactStore> = Arc::new(FsArtifactStore::new(dir.path()));
        let catalog: Arc<dyn MetadataCatalog> =
            Arc::new(SqliteCatalog::open_in_memory().expect("catalog"));
        let publisher = Arc::new(RecordingPublisher::default());
        let config = PipelineConfig::default();

        let coordinator = OperationCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&catalog),
            publisher.clone(),
            config.clone(),
        );
        let intake = UploadIntake::new(store, Arc::clone(&catalog), publisher.clone(), config);
        TestEnv {
            coordinator,
            intake,
            catalog,
            publisher,
            _dir: dir,
        }
    }

    /// Minimal one-or-more-page PDF fixture.
    fn sample_pdf(pages: usize) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let mut kids = Vec::new();
        let mut page_ids = Vec::new();
        for index in 0..pages {
            let content = format!("BT /F1 24 Tf 72 720 Td (Page {}) Tj ET", index + 1);
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ],
                "Contents" => Object::Reference(content_id),
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => Object::Reference(font_id) },
                },
            });
            kids.push(Object::Reference(page_id));
            page_ids.push(page_id);
        }

        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(pages as i64),
        });
        for page_id in page_ids {
            if let Ok(page_obj) = doc.get_object_mut(page_id)
                && let Ok(dict) = page_obj.as_dict_mut()
            {
                dict.set("Parent", Object::Reference(pages_id));
            }
        }
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut buf = Vec::new();
        doc.save_to(&mut buf).expect("serialise fixture");
        buf
    }

    fn pdf_page_count(bytes: &[u8]) -> usize {
        Document::load_mem(bytes).expect("load").get_pages().len()
    }

    async fn seed_pdf(env: &TestEnv, pages: usize) -> ArtifactId {
        env.intake
            .ingest(&sample_pdf(pages), "source.pdf", None, Some("tester"))
            .await
            .expect("ingest fixture")
            .artifact_id
    }

    #[tokio::test]
    async fn sanitize_completes_and_links_lineage() {
        let env = env();
        let source = seed_pdf(&env, 2).await;

        let record = env
            .coordinator
            .execute(OperationRequest::new(
                source,
                OperationOptions::Sanitize {
                    remove_metadata: true,
                },
            ))
            .await
            .expect("execute");

        assert_eq!(record.status, OperationStatus::Completed);
        assert!(record.error.is_none());
        let result_id = record.result_artifact_id.expect("result artifact");

        // The derived artifact points back at its source.
        let derived = env
            .catalog
            .find_file(result_id)
            .await
            .expect("find")
            .expect("present");
        assert_eq!(derived.lineage_parent_id, Some(source));
        assert_eq!(
            derived.origin,
            ArtifactOrigin::Derived {
                operation_id: record.operation_id
            }
        );

        let routing_keys: Vec<&'static str> = env
            .publisher
            .events()
            .iter()
            .map(LifecycleEvent::routing_key)
            .collect();
        assert!(routing_keys.contains(&"file.operation.completed"));
    }

    #[tokio::test]
    async fn status_is_stable_across_queries() {
        let env = env();
        let source = seed_pdf(&env, 1).await;

        let record = env
            .coordinator
            .execute(OperationRequest::new(
                source,
                OperationOptions::Rotate {
                    pages: vec![1],
                    angle: 90,
                },
            ))
            .await
            .expect("execute");

        let first = env.coordinator.status(record.operation_id).await.expect("status");
        let second = env.coordinator.status(record.operation_id).await.expect("status");
        assert_eq!(first.status, OperationStatus::Completed);
        assert_eq!(first.result_artifact_id, second.result_artifact_id);
    }

    #[tokio::test]
    async fn download_returns_the_result_bytes() {
        let env = env();
        let source = seed_pdf(&env, 3).await;

        let record = env
            .coordinator
            .execute(OperationRequest::new(
                source,
                OperationOptions::DeletePages { pages: vec![2] },
            ))
            .await
            .expect("execute");

        let payload = env
            .coordinator
            .download(record.operation_id)
            .await
            .expect("download");
        assert_eq!(payload.mime_type, "application/pdf");
        assert_eq!(payload.filename, format!("{}.pdf", record.operation_id));
        assert_eq!(pdf_page_count(&payload.bytes), 2);
    }

    #[tokio::test]
    async fn wrong_password_settles_as_failed_record() {
        let env = env();
        let source = seed_pdf(&env, 1).await;

        let encrypted = env
            .coordinator
            .execute(OperationRequest::new(
                source,
                OperationOptions::Encrypt {
                    password: "correct".into(),
                    allow_printing: true,
                    allow_copying: true,
                },
            ))
            .await
            .expect("encrypt");
        assert_eq!(encrypted.status, OperationStatus::Completed);

        let record = env
            .coordinator
            .execute(OperationRequest::new(
                encrypted.result_artifact_id.expect("result"),
                OperationOptions::Decrypt {
                    password: "incorrect".into(),
                },
            ))
            .await
            .expect("execute returns the failed record");

        assert_eq!(record.status, OperationStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("wrong password"));
        assert!(record.result_artifact_id.is_none());

        let failed_events: Vec<LifecycleEvent> = env
            .publisher
            .events()
            .into_iter()
            .filter(|event| event.routing_key() == "file.operation.failed")
            .collect();
        assert_eq!(failed_events.len(), 1);

        // Downloading a failed operation names the current status.
        let download = env.coordinator.download(record.operation_id).await;
        assert!(matches!(
            download,
            Err(FalzwerkError::NotReady(OperationStatus::Failed))
        ));
    }

    #[tokio::test]
    async fn missing_source_is_a_terminal_failure() {
        let env = env();
        let ghost = ArtifactId::new();

        let record = env
            .coordinator
            .execute(OperationRequest::new(
                ghost,
                OperationOptions::Sanitize {
                    remove_metadata: true,
                },
            ))
            .await
            .expect("execute");

        assert_eq!(record.status, OperationStatus::Failed);
        assert!(record.error.as_deref().unwrap_or_default().contains("not found"));
    }

    #[tokio::test]
    async fn invalid_options_never_create_a_record() {
        let env = env();
        let source = seed_pdf(&env, 1).await;

        let result = env
            .coordinator
            .execute(OperationRequest::new(
                source,
                OperationOptions::Rotate {
                    pages: vec![1],
                    angle: 30,
                },
            ))
            .await;
        assert!(matches!(result, Err(FalzwerkError::Validation(_))));

        // No operation event was published for the rejected request.
        assert!(
            env.publisher
                .events()
                .iter()
                .all(|event| event.routing_key() == "file.uploaded")
        );
    }

    #[tokio::test]
    async fn merge_concatenates_both_sources() {
        let env = env();
        let first = seed_pdf(&env, 2).await;
        let second = seed_pdf(&env, 3).await;

        let record = env
            .coordinator
            .execute(OperationRequest::new(
                first,
                OperationOptions::Merge {
                    sources: vec![first, second],
                },
            ))
            .await
            .expect("execute");

        assert_eq!(record.status, OperationStatus::Completed);
        let payload = env
            .coordinator
            .download(record.operation_id)
            .await
            .expect("download");
        assert_eq!(pdf_page_count(&payload.bytes), 5);
    }

    #[tokio::test]
    async fn merge_source_list_must_start_with_the_request_source() {
        let env = env();
        let first = seed_pdf(&env, 1).await;
        let second = seed_pdf(&env, 1).await;

        let result = env
            .coordinator
            .execute(OperationRequest::new(
                first,
                OperationOptions::Merge {
                    sources: vec![second, first],
                },
            ))
            .await;
        assert!(matches!(result, Err(FalzwerkError::Validation(_))));
    }

    #[tokio::test]
    async fn publisher_failure_never_fails_the_operation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store: Arc<dyn ArtifactStore> = Arc::new(FsArtifactStore::new(dir.path()));
        let catalog: Arc<dyn MetadataCatalog> =
            Arc::new(SqliteCatalog::open_in_memory().expect("catalog"));
        let config = PipelineConfig::default();

        let intake = UploadIntake::new(
            Arc::clone(&store),
            Arc::clone(&catalog),
            Arc::new(FailingPublisher),
            config.clone(),
        );
        let coordinator =
            OperationCoordinator::new(store, catalog, Arc::new(FailingPublisher), config);

        let source = intake
            .ingest(&sample_pdf(1), "source.pdf", None, None)
            .await
            .expect("ingest despite failing publisher")
            .artifact_id;

        let record = coordinator
            .execute(OperationRequest::new(
                source,
                OperationOptions::Sanitize {
                    remove_metadata: true,
                },
            ))
            .await
            .expect("execute despite failing publisher");
        assert_eq!(record.status, OperationStatus::Completed);
    }

    #[tokio::test]
    async fn unknown_operation_id_is_not_found() {
        let env = env();
        let result = env.coordinator.status(OperationId::new()).await;
        assert!(matches!(result, Err(FalzwerkError::OperationNotFound(_))));
    }
}
