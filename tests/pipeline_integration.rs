//! End-to-end pipeline tests over the in-memory backends.
//!
//! These exercise the full open → dispatch → flush → export → cleanup →
//! upload sequence and the fail-fast / unconditional-cleanup contracts.

use std::sync::Arc;

use appforge::platform::memory::ExportedPackage;
use appforge::{
    ChangeDescriptor, ImageAsset, ImageCollection, ImageFormat, InMemoryArtifactStore,
    InMemoryModelBackend, PipelineError, PipelineOrchestrator, PipelineRequest, SessionError,
};

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

const APP: &str = "template-app";
const BUCKET: &str = "wizard-bucket";
const EXPORT_KEY: &str = "generated.mpk";

fn seeded_backend() -> Arc<InMemoryModelBackend> {
    let backend = InMemoryModelBackend::new();
    backend.add_app(APP);
    backend.add_template_file(
        APP,
        "theme/vars.scss",
        b"$brand-color: #fff;\n$font-size: 14px;\n".to_vec(),
    );
    backend.add_template_collection(
        APP,
        ImageCollection::with_assets(
            "App.Images",
            vec![
                ImageAsset::new("logo", vec![0xAA, 0xBB], ImageFormat::Gif),
                ImageAsset::new("icon", vec![0xCC], ImageFormat::Png),
            ],
        ),
    );
    Arc::new(backend)
}

fn pipeline(
    backend: &Arc<InMemoryModelBackend>,
) -> (
    Arc<InMemoryArtifactStore>,
    PipelineOrchestrator<InMemoryModelBackend, InMemoryArtifactStore>,
) {
    let store = Arc::new(InMemoryArtifactStore::new());
    let orchestrator = PipelineOrchestrator::new(Arc::clone(backend), Arc::clone(&store));
    (store, orchestrator)
}

fn request(changes: Vec<ChangeDescriptor>) -> PipelineRequest {
    let mut request = PipelineRequest::new(APP, EXPORT_KEY, BUCKET);
    request.changes = changes;
    request
}

fn exported_package(store: &InMemoryArtifactStore) -> ExportedPackage {
    let bytes = store
        .object(BUCKET, EXPORT_KEY)
        .expect("artifact should have been uploaded");
    serde_json::from_slice(&bytes).expect("exported package should be valid JSON")
}

// ─────────────────────────────────────────────────────────────────────────────
// Success paths
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_change_list_still_exports_and_uploads() {
    let backend = seeded_backend();
    let (store, orchestrator) = pipeline(&backend);

    let outcome = orchestrator.run(&request(Vec::new())).await.unwrap();
    assert_eq!(outcome.artifact_key, EXPORT_KEY);
    assert_eq!(outcome.changes_applied, 0);
    assert_eq!(outcome.changes_skipped, 0);
    assert!(outcome.cleanup_warning.is_none());

    // The full tail ran, in order.
    let ops = backend.ops();
    let pos = |needle: &str| {
        ops.iter()
            .position(|op| op.starts_with(needle))
            .unwrap_or_else(|| panic!("missing op {needle}"))
    };
    assert!(pos("flush_changes") < pos("export_package"));
    assert!(pos("export_package") < pos("delete_working_copy"));

    // Artifact uploaded and working copy gone.
    assert!(store.object(BUCKET, EXPORT_KEY).is_some());
    assert_eq!(backend.num_working_copies(), 0);
}

#[tokio::test]
async fn brand_color_change_lands_in_exported_package() {
    let backend = seeded_backend();
    let (store, orchestrator) = pipeline(&backend);

    let outcome = orchestrator
        .run(&request(vec![ChangeDescriptor::text_variable(
            "theme/vars.scss",
            "brand-color",
            "#000",
        )]))
        .await
        .unwrap();
    assert_eq!(outcome.changes_applied, 1);

    let package = exported_package(&store);
    assert_eq!(
        package.files["theme/vars.scss"],
        b"$brand-color: #000;\n$font-size: 14px;\n"
    );
}

#[tokio::test]
async fn logo_replacement_lands_in_exported_package() {
    let backend = seeded_backend();
    let (store, orchestrator) = pipeline(&backend);
    store.insert(BUCKET, "logo2.png", vec![1, 2, 3, 4]);

    orchestrator
        .run(&request(vec![ChangeDescriptor::image(
            "App.Images",
            "logo",
            "logo2.png",
            ImageFormat::Png,
        )]))
        .await
        .unwrap();

    let package = exported_package(&store);
    let collection = &package.collections["App.Images"];

    // Exactly one old asset removed, exactly one new one added.
    assert_eq!(collection.count_named("logo"), 1);
    let logo = collection.asset("logo").unwrap();
    assert_eq!(logo.data, vec![1, 2, 3, 4]);
    assert_eq!(logo.format, ImageFormat::Png);

    // The untouched asset survives.
    assert_eq!(collection.count_named("icon"), 1);
}

#[tokio::test]
async fn mixed_change_sequence_applies_in_order() {
    let backend = seeded_backend();
    let (store, orchestrator) = pipeline(&backend);
    store.insert(BUCKET, "logo2.png", vec![9]);

    let outcome = orchestrator
        .run(&request(vec![
            ChangeDescriptor::text_variable("theme/vars.scss", "brand-color", "#123456"),
            ChangeDescriptor::image("App.Images", "logo", "logo2.png", ImageFormat::Png),
            ChangeDescriptor::text_variable("theme/vars.scss", "font-size", "16px"),
        ]))
        .await
        .unwrap();
    assert_eq!(outcome.changes_applied, 3);

    let package = exported_package(&store);
    assert_eq!(
        package.files["theme/vars.scss"],
        b"$brand-color: #123456;\n$font-size: 16px;\n"
    );
    assert_eq!(
        package.collections["App.Images"].asset("logo").unwrap().data,
        vec![9]
    );
}

#[tokio::test]
async fn unsupported_change_type_is_skipped_and_counted() {
    let backend = seeded_backend();
    let (store, orchestrator) = pipeline(&backend);

    // Deserialize from the wire to hit the serde(other) branch.
    let raw = r#"{"ChangeType": "Workflow_Change", "Location": "x", "ItemName": "y"}"#;
    let unsupported: ChangeDescriptor = serde_json::from_str(raw).unwrap();

    let outcome = orchestrator
        .run(&request(vec![
            unsupported,
            ChangeDescriptor::text_variable("theme/vars.scss", "brand-color", "#000"),
        ]))
        .await
        .unwrap();

    assert_eq!(outcome.changes_applied, 1);
    assert_eq!(outcome.changes_skipped, 1);
    assert!(store.object(BUCKET, EXPORT_KEY).is_some());
}

// ─────────────────────────────────────────────────────────────────────────────
// Failure paths
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_collection_aborts_without_upload() {
    let backend = seeded_backend();
    let (store, orchestrator) = pipeline(&backend);
    store.insert(BUCKET, "logo2.png", vec![1]);

    let err = orchestrator
        .run(&request(vec![ChangeDescriptor::image(
            "Missing.Images",
            "logo",
            "logo2.png",
            ImageFormat::Png,
        )]))
        .await
        .unwrap_err();

    match err {
        PipelineError::Dispatch(e) => {
            assert_eq!(e.index, 0);
            assert!(e.to_string().contains("Missing.Images"));
        }
        other => panic!("expected dispatch error, got {other}"),
    }

    // No artifact, no leaked working copy.
    assert!(store.object(BUCKET, EXPORT_KEY).is_none());
    assert_eq!(backend.num_working_copies(), 0);
}

#[tokio::test]
async fn missing_blob_object_aborts_before_model_mutation() {
    let backend = seeded_backend();
    let (store, orchestrator) = pipeline(&backend);
    // "logo2.png" deliberately absent from the store.

    let err = orchestrator
        .run(&request(vec![ChangeDescriptor::image(
            "App.Images",
            "logo",
            "logo2.png",
            ImageFormat::Png,
        )]))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Dispatch(_)));

    let ops = backend.ops();
    assert!(!ops.iter().any(|op| op.starts_with("delete_image")));
    assert!(!ops.iter().any(|op| op.starts_with("create_image")));
    assert!(!ops.iter().any(|op| op.starts_with("flush_changes")));
    assert!(store.object(BUCKET, EXPORT_KEY).is_none());
}

#[tokio::test]
async fn failure_at_index_k_never_attempts_later_changes() {
    let backend = seeded_backend();
    let (store, orchestrator) = pipeline(&backend);
    store.insert(BUCKET, "logo2.png", vec![1]);

    let err = orchestrator
        .run(&request(vec![
            ChangeDescriptor::text_variable("theme/vars.scss", "brand-color", "#000"),
            ChangeDescriptor::text_variable("missing/file.scss", "x", "1"),
            ChangeDescriptor::image("App.Images", "logo", "logo2.png", ImageFormat::Png),
        ]))
        .await
        .unwrap_err();

    match err {
        PipelineError::Dispatch(e) => assert_eq!(e.index, 1),
        other => panic!("expected dispatch error, got {other}"),
    }

    // Change 2 was never attempted.
    let ops = backend.ops();
    assert!(!ops.iter().any(|op| op.starts_with("load_collection")));
    assert!(!ops.iter().any(|op| op.starts_with("create_image")));
}

#[tokio::test]
async fn dispatch_failure_still_deletes_working_copy() {
    let backend = seeded_backend();
    let (_store, orchestrator) = pipeline(&backend);

    let err = orchestrator
        .run(&request(vec![ChangeDescriptor::text_variable(
            "missing/file.scss",
            "x",
            "1",
        )]))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Dispatch(_)));

    // Cleanup ran even though flush was never reached.
    assert_eq!(backend.num_working_copies(), 0);
    assert!(backend
        .ops()
        .iter()
        .any(|op| op.starts_with("delete_working_copy")));
}

#[tokio::test]
async fn open_failure_leaves_no_working_copy() {
    let backend = seeded_backend();
    backend.fail_open_model(true);
    let (store, orchestrator) = pipeline(&backend);

    let err = orchestrator.run(&request(Vec::new())).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Session(SessionError::Open { .. })
    ));

    assert_eq!(backend.num_working_copies(), 0);
    assert!(store.object(BUCKET, EXPORT_KEY).is_none());
}

#[tokio::test]
async fn flush_failure_is_fatal_and_cleaned_up() {
    let backend = seeded_backend();
    backend.fail_flush(true);
    let (store, orchestrator) = pipeline(&backend);

    let err = orchestrator
        .run(&request(vec![ChangeDescriptor::text_variable(
            "theme/vars.scss",
            "brand-color",
            "#000",
        )]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Session(SessionError::Flush { .. })
    ));

    // The staged change is lost with the working copy; nothing uploaded.
    assert!(store.object(BUCKET, EXPORT_KEY).is_none());
    assert_eq!(backend.num_working_copies(), 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire contract
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn wire_request_drives_full_run() {
    let backend = seeded_backend();
    let (store, orchestrator) = pipeline(&backend);
    store.insert(BUCKET, "logo2.png", vec![5, 6]);

    // r## because the value "#000" contains the "# sequence.
    let raw = format!(
        r##"{{
            "TemplateAppId": "{APP}",
            "MpkObjectName": "{EXPORT_KEY}",
            "Bucket": "{BUCKET}",
            "RequestId": "req-42",
            "version": "1",
            "Changes": [
                {{
                    "ChangeType": "CSS_Variable_Change",
                    "Location": "theme/vars.scss",
                    "ItemName": "brand-color",
                    "NewValue": "#000"
                }},
                {{
                    "ChangeType": "ImageCollection_Image_Change",
                    "Location": "App.Images",
                    "ItemName": "logo",
                    "ObjectName": "logo2.png",
                    "Format": "PNG"
                }}
            ]
        }}"##
    );
    let request: PipelineRequest = serde_json::from_str(&raw).unwrap();

    let outcome = orchestrator.run(&request).await.unwrap();
    assert_eq!(outcome.artifact_key, EXPORT_KEY);
    assert_eq!(outcome.version, "1");
    assert_eq!(outcome.changes_applied, 2);
    assert!(outcome.finished_at >= outcome.started_at);

    let package = exported_package(&store);
    assert_eq!(
        package.files["theme/vars.scss"],
        b"$brand-color: #000;\n$font-size: 14px;\n"
    );
    assert_eq!(
        package.collections["App.Images"].asset("logo").unwrap().data,
        vec![5, 6]
    );
}
