//! End-to-end orchestration against a scripted backend.

mod test_utils;

use atelier_core::{
    ArtifactKind, FlatGraph, GenerationKind, GenerationRequest, ReferenceImage, Role,
    WorkflowGraph,
};
use atelier_error::{BackendErrorKind, FailureKind};
use atelier_generation::{GenerationStage, Orchestrator, OrchestratorOptions, ProgressUpdate};
use atelier_workflow::{InMemoryWorkflowStore, SeedSource, WorkflowTemplate};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use test_utils::{MockBackend, MockHistory, MockSubmit, MockUpload};

const PORTRAIT_GRAPH: &str = r#"{
    "4": {"class_type": "CheckpointLoaderSimple", "inputs": {"ckpt_name": "sdxl.safetensors"}},
    "6": {"class_type": "CLIPTextEncode", "inputs": {"text": "{prompt}", "clip": ["4", 1]}},
    "7": {"class_type": "CLIPTextEncode", "inputs": {"text": "blurry", "clip": ["4", 1]}},
    "10": {"class_type": "LoadImage", "inputs": {"image": "example.png"}},
    "3": {"class_type": "KSampler", "inputs": {
        "seed": 0, "positive": ["6", 0], "negative": ["7", 0], "model": ["4", 0]
    }},
    "9": {"class_type": "SaveImage", "inputs": {"filename_prefix": "ComfyUI", "images": ["3", 0]}}
}"#;

const SHOT_VIDEO_GRAPH: &str = r#"{
    "6": {"class_type": "CLIPTextEncode", "inputs": {"text": "", "clip": ["4", 1]}},
    "4": {"class_type": "CheckpointLoaderSimple", "inputs": {"ckpt_name": "wan.safetensors"}},
    "20": {"class_type": "LoadImage", "inputs": {"image": "example.png"}},
    "40": {"class_type": "VHS_VideoCombine", "inputs": {"filename_prefix": "ComfyUI", "frame_rate": 16}}
}"#;

fn options() -> OrchestratorOptions {
    OrchestratorOptions::builder()
        .poll_interval(Duration::from_millis(10))
        .image_timeout(Duration::from_secs(5))
        .video_timeout(Duration::from_secs(5))
        .seed_source(SeedSource::Fixed(42))
        .build()
        .unwrap()
}

fn orchestrator(backend: &Arc<MockBackend>) -> Orchestrator {
    Orchestrator::new(backend.clone()).with_options(options())
}

fn image_done(filename: &str) -> Value {
    json!({
        "outputs": {"9": {"images": [{"filename": filename, "subfolder": "", "type": "output"}]}},
        "status": {"status_str": "success", "completed": true, "messages": []}
    })
}

fn reference_file(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"\x89PNG fake").unwrap();
    path
}

fn literal<'a>(graph: &'a FlatGraph, node: &str, input: &str) -> &'a str {
    graph.get(node).unwrap().literal_str(input).unwrap()
}

#[tokio::test]
async fn portrait_success_binds_uploads_and_collects() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let backend = Arc::new(MockBackend::completed_with(image_done("portrait_00001_.png")));
    let template = WorkflowTemplate::from_json("portrait", PORTRAIT_GRAPH, None)?;
    let request = GenerationRequest::builder()
        .prompt("an old sailor, oil painting")
        .references(vec![ReferenceImage::new(
            Role::CharacterReferenceImage,
            reference_file(dir.path(), "x.png"),
        )])
        .build()?;

    let outcome = orchestrator(&backend).portrait(&template, &request).await;

    assert!(outcome.success, "{:?}", outcome.message);
    assert_eq!(outcome.job_id.as_deref(), Some("job-1"));
    let artifact = outcome.artifact.unwrap();
    assert_eq!(artifact.kind(), &ArtifactKind::Image);
    assert_eq!(artifact.filename(), "portrait_00001_.png");

    let submitted = backend.submitted();
    assert_eq!(submitted.len(), 1);
    let graph = &submitted[0];
    assert_eq!(literal(graph, "6", "text"), "an old sailor, oil painting");
    assert_eq!(literal(graph, "7", "text"), "blurry");
    assert_eq!(literal(graph, "9", "filename_prefix"), "portrait");
    assert_eq!(literal(graph, "10", "image"), "refs/x.png");
    assert_eq!(
        graph.get("3").unwrap().input("seed").and_then(|v| v.as_u64()),
        Some(42)
    );
    assert_eq!(outcome.bound_graph.unwrap().graph(), graph);
    Ok(())
}

#[tokio::test]
async fn required_upload_failure_never_submits() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let backend =
        Arc::new(MockBackend::new(vec![MockHistory::Pending]).with_upload(MockUpload::Reject(500)));
    let template = WorkflowTemplate::from_json("shot-video", SHOT_VIDEO_GRAPH, None)?;
    let request = GenerationRequest::builder()
        .prompt("the ship leaves the harbor")
        .references(vec![ReferenceImage::new(
            Role::FirstFrameImage,
            reference_file(dir.path(), "frame.png"),
        )])
        .build()?;

    let outcome = orchestrator(&backend).shot_video(&template, &request).await;

    assert!(!outcome.success);
    assert_eq!(outcome.failure, Some(FailureKind::ReferenceUploadFailed));
    assert!(outcome.bound_graph.is_some());
    assert!(outcome.job_id.is_none());
    assert_eq!(backend.submit_count(), 0);
    assert_eq!(backend.history_count(), 0);
    Ok(())
}

#[tokio::test]
async fn best_effort_upload_failure_still_submits() -> anyhow::Result<()> {
    let backend = Arc::new(
        MockBackend::completed_with(image_done("scene_00001_.png"))
            .with_upload(MockUpload::Reject(500)),
    );
    let template = WorkflowTemplate::from_json("scene", PORTRAIT_GRAPH, None)?;
    let request = GenerationRequest::builder()
        .prompt("a harbor at dawn")
        .references(vec![ReferenceImage::new(
            Role::SceneReferenceImage,
            "/nonexistent/reference.png",
        )])
        .build()?;

    let outcome = orchestrator(&backend).scene_image(&template, &request).await;

    assert!(outcome.success, "{:?}", outcome.message);
    assert_eq!(backend.submit_count(), 1);
    let graph = &backend.submitted()[0];
    assert_eq!(literal(graph, "10", "image"), "example.png");
    assert_eq!(literal(graph, "9", "filename_prefix"), "scene");
    Ok(())
}

#[tokio::test]
async fn missing_reference_file_fails_required_upload() -> anyhow::Result<()> {
    let backend = Arc::new(MockBackend::new(vec![MockHistory::Pending]));
    let template = WorkflowTemplate::from_json("transition", SHOT_VIDEO_GRAPH, None)?;
    let request = GenerationRequest::builder()
        .prompt("dusk becomes night")
        .references(vec![ReferenceImage::new(
            Role::FirstFrameImage,
            "/nonexistent/first.png",
        )])
        .build()?;

    let outcome = orchestrator(&backend)
        .transition_video(&template, &request)
        .await;

    assert_eq!(outcome.failure, Some(FailureKind::ReferenceUploadFailed));
    assert!(backend.uploaded().is_empty());
    assert_eq!(backend.submit_count(), 0);
    Ok(())
}

#[tokio::test]
async fn rejected_submission_keeps_the_bound_graph() -> anyhow::Result<()> {
    let backend = Arc::new(
        MockBackend::new(vec![MockHistory::Pending]).with_submit(MockSubmit::Error(
            BackendErrorKind::SubmissionRejected("Prompt outputs failed validation".into()),
        )),
    );
    let template = WorkflowTemplate::from_json("shot", PORTRAIT_GRAPH, None)?;
    let request = GenerationRequest::builder().prompt("close-up").build()?;

    let outcome = orchestrator(&backend).shot_image(&template, &request).await;

    assert_eq!(outcome.failure, Some(FailureKind::SubmissionRejected));
    assert!(outcome.message.unwrap().contains("failed validation"));
    let bound = outcome.bound_graph.unwrap();
    assert_eq!(literal(bound.graph(), "6", "text"), "close-up");
    assert_eq!(backend.history_count(), 0);
    Ok(())
}

#[tokio::test]
async fn unreachable_backend_is_a_connection_error() -> anyhow::Result<()> {
    let backend = Arc::new(MockBackend::new(vec![MockHistory::Pending]).with_submit(
        MockSubmit::Error(BackendErrorKind::Connection("connection refused".into())),
    ));
    let template = WorkflowTemplate::from_json("portrait", PORTRAIT_GRAPH, None)?;
    let request = GenerationRequest::builder().prompt("anything").build()?;

    let outcome = orchestrator(&backend).portrait(&template, &request).await;

    assert_eq!(outcome.failure, Some(FailureKind::ConnectionError));
    Ok(())
}

#[tokio::test]
async fn empty_graph_fails_before_binding() {
    let backend = Arc::new(MockBackend::new(vec![MockHistory::Pending]));
    let request = GenerationRequest::builder().prompt("x").build().unwrap();

    let outcome = orchestrator(&backend)
        .generate_graph(
            GenerationKind::Portrait,
            &WorkflowGraph::Flat(FlatGraph::new()),
            None,
            &request,
        )
        .await;

    assert_eq!(outcome.failure, Some(FailureKind::EmptyGraph));
    assert!(outcome.bound_graph.is_none());
    assert_eq!(backend.submit_count(), 0);
}

#[tokio::test]
async fn execution_error_is_reported_with_job_id() -> anyhow::Result<()> {
    let backend = Arc::new(MockBackend::completed_with(json!({
        "outputs": {},
        "status": {
            "status_str": "error",
            "completed": false,
            "messages": [["execution_error", {"node_id": "3", "exception_message": "CUDA out of memory"}]]
        }
    })));
    let template = WorkflowTemplate::from_json("portrait", PORTRAIT_GRAPH, None)?;
    let request = GenerationRequest::builder().prompt("x").build()?;

    let outcome = orchestrator(&backend).portrait(&template, &request).await;

    assert_eq!(outcome.failure, Some(FailureKind::ExecutionError));
    assert!(outcome.message.unwrap().contains("CUDA out of memory"));
    assert_eq!(outcome.job_id.as_deref(), Some("job-1"));
    assert!(outcome.artifact.is_none());
    Ok(())
}

#[tokio::test]
async fn stages_are_reported_in_order() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let backend = Arc::new(MockBackend::new(vec![
        MockHistory::Pending,
        MockHistory::Entry(image_done("portrait_00001_.png")),
    ]));
    let updates = Arc::new(Mutex::new(Vec::<ProgressUpdate>::new()));
    let sink = updates.clone();
    let orchestrator = orchestrator(&backend).with_progress(Arc::new(
        move |update: ProgressUpdate| sink.lock().unwrap().push(update),
    ));
    let template = WorkflowTemplate::from_json("portrait", PORTRAIT_GRAPH, None)?;
    let request = GenerationRequest::builder()
        .prompt("x")
        .references(vec![ReferenceImage::new(
            Role::CharacterReferenceImage,
            reference_file(dir.path(), "x.png"),
        )])
        .build()?;

    let outcome = orchestrator.portrait(&template, &request).await;
    assert!(outcome.success);

    let updates = updates.lock().unwrap();
    let stages: Vec<&GenerationStage> = updates.iter().map(|u| u.stage()).collect();
    assert!(matches!(stages[0], GenerationStage::Binding));
    assert!(matches!(stages[1], GenerationStage::Uploading));
    assert!(matches!(stages[2], GenerationStage::Submitting));
    assert!(matches!(stages[3], GenerationStage::Polling { .. }));
    assert!(matches!(
        stages.last().unwrap(),
        GenerationStage::Finished { success: true }
    ));
    assert!(updates.windows(2).all(|w| w[0].percent() <= w[1].percent()));
    Ok(())
}

#[tokio::test]
async fn missing_default_template_is_a_configuration_failure() {
    let backend = Arc::new(MockBackend::new(vec![MockHistory::Pending]));
    let store = InMemoryWorkflowStore::new();
    let request = GenerationRequest::builder().prompt("x").build().unwrap();

    let outcome = orchestrator(&backend)
        .generate_default(&store, GenerationKind::SceneImage, &request)
        .await;

    assert_eq!(outcome.failure, Some(FailureKind::Configuration));
    assert_eq!(backend.submit_count(), 0);
}

#[tokio::test]
async fn default_template_is_used_when_registered() -> anyhow::Result<()> {
    let backend = Arc::new(MockBackend::completed_with(image_done("portrait_00001_.png")));
    let store = InMemoryWorkflowStore::new();
    store
        .insert_default(
            GenerationKind::Portrait,
            WorkflowTemplate::from_json("portrait", PORTRAIT_GRAPH, Some(r#"{"prompt": "6"}"#))?,
        )
        .await;
    let request = GenerationRequest::builder().prompt("x").build()?;

    let outcome = orchestrator(&backend)
        .generate_default(&store, GenerationKind::Portrait, &request)
        .await;

    assert!(outcome.success, "{:?}", outcome.message);
    Ok(())
}

#[tokio::test]
async fn cancel_dequeues_then_interrupts() -> anyhow::Result<()> {
    let backend = Arc::new(MockBackend::new(vec![MockHistory::Pending]));

    orchestrator(&backend).cancel("job-7").await?;

    assert_eq!(backend.deleted(), vec!["job-7".to_string()]);
    assert_eq!(backend.interrupt_count(), 1);
    Ok(())
}
