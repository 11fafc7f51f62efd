//! Video pipeline integration tests.
//!
//! These tests drive the pipeline builder against the mock probe and runner:
//! - Single-stream, concatenated and self-concatenated graphs
//! - Illegal call sequences and impossible trims never reach the transcoder
//! - Output cleanup when the transcoder fails
//! - The compiled graph is exactly what the runner receives

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tokio::sync::mpsc;

use reelsmith_core::{
    render::{PipelineOptions, RenderError},
    testing::fixtures::mock_engine,
};

const W: u32 = 1080;
const H: u32 = 1920;

fn out(dir: &TempDir) -> PathBuf {
    dir.path().join("renders").join("out.mp4")
}

#[tokio::test]
async fn test_single_clip_rotated_once() {
    let dir = TempDir::new().unwrap();
    let (engine, probe, runner) = mock_engine();
    probe.set_media("/clips/a.mp4", 10.0, true).await;

    let master = engine.pipeline(PipelineOptions::master(W, H));
    master.init("/clips/a.mp4").unwrap().rotate(1).unwrap();

    let graph = master.complex_filters().await.unwrap();
    assert_eq!(graph.streams, 1);
    assert_eq!(graph.concat_nodes(), 0);
    assert_eq!(graph.filter_graph.matches("transpose=1").count(), 1);

    let result = master.run(out(&dir)).await.unwrap();
    assert!(out(&dir).exists());
    assert_eq!(result.streams, 1);
    assert!((result.duration_secs - 10.0).abs() < 1e-9);
    assert_eq!(runner.execution_count().await, 1);
}

#[tokio::test]
async fn test_master_and_member_concat() {
    let dir = TempDir::new().unwrap();
    let (engine, probe, _runner) = mock_engine();
    probe.set_media("/clips/a.mp4", 5.0, true).await;
    probe.set_media("/clips/b.mp4", 5.0, true).await;

    let a = engine.pipeline(PipelineOptions::master(W, H));
    let b = engine.pipeline(PipelineOptions::member(W, H));
    a.init("/clips/a.mp4").unwrap();
    b.init("/clips/b.mp4").unwrap();
    a.concat(&b).unwrap();

    let graph = a.complex_filters().await.unwrap();
    assert_eq!(graph.concat_nodes(), 1);
    assert!(graph.filter_graph.contains("concat=n=2:v=1:a=1"));
    assert_eq!(
        graph.inputs,
        vec![PathBuf::from("/clips/a.mp4"), PathBuf::from("/clips/b.mp4")]
    );

    let result = a.run(out(&dir)).await.unwrap();
    assert!((result.duration_secs - 10.0).abs() < 0.1);
}

#[tokio::test]
async fn test_self_concat_uses_chain_at_compile_time() {
    let (engine, _probe, _runner) = mock_engine();
    let master = engine.pipeline(PipelineOptions::master(W, H));
    master.init("/clips/a.mp4").unwrap();
    master.concat(&master).unwrap();
    // Appended after attachment, still seen by both streams.
    master.rotate(1).unwrap();

    let graph = master.complex_filters().await.unwrap();
    assert_eq!(graph.streams, 2);
    assert_eq!(
        graph.inputs,
        vec![PathBuf::from("/clips/a.mp4"), PathBuf::from("/clips/a.mp4")]
    );
    assert_eq!(graph.filter_graph.matches("transpose=1").count(), 2);
}

#[tokio::test]
async fn test_member_concat_is_rejected() {
    let (engine, _probe, runner) = mock_engine();
    let member = engine.pipeline(PipelineOptions::member(W, H));
    let other = engine.pipeline(PipelineOptions::member(W, H));
    member.init("/clips/a.mp4").unwrap();
    other.init("/clips/b.mp4").unwrap();

    let err = member.concat(&other).unwrap_err();
    assert!(matches!(err, RenderError::InvalidState { .. }));
    assert_eq!(runner.execution_count().await, 0);
}

#[tokio::test]
async fn test_double_init_keeps_first_binding() {
    let (engine, _probe, _runner) = mock_engine();
    let master = engine.pipeline(PipelineOptions::master(W, H));
    master.init("/clips/a.mp4").unwrap();

    let err = master.init("/clips/b.mp4").unwrap_err();
    assert!(matches!(err, RenderError::InvalidState { .. }));

    let graph = master.complex_filters().await.unwrap();
    assert_eq!(graph.inputs, vec![PathBuf::from("/clips/a.mp4")]);
}

#[tokio::test]
async fn test_split_rotations_compile_like_one() {
    for k in 0..4 {
        for j in 0..4 {
            let (engine, _probe, _runner) = mock_engine();

            let split = engine.pipeline(PipelineOptions::master(W, H));
            split.init("/clips/a.mp4").unwrap().rotate(k).unwrap().rotate(j).unwrap();

            let merged = engine.pipeline(PipelineOptions::master(W, H));
            merged.init("/clips/a.mp4").unwrap().rotate((k + j) % 4).unwrap();

            assert_eq!(
                split.complex_filters().await.unwrap().filter_graph,
                merged.complex_filters().await.unwrap().filter_graph,
                "rotate({k}) then rotate({j})"
            );
        }
    }
}

#[tokio::test]
async fn test_n_concats_yield_n_plus_one_ordered_streams() {
    let (engine, _probe, _runner) = mock_engine();
    let master = engine.pipeline(PipelineOptions::master(W, H));
    master.init("/clips/0.mp4").unwrap();

    for i in 1..=3 {
        let member = engine.pipeline(PipelineOptions::member(W, H));
        member.init(format!("/clips/{i}.mp4")).unwrap();
        master.concat(&member).unwrap();
    }

    let graph = master.complex_filters().await.unwrap();
    assert_eq!(graph.streams, 4);
    let expected: Vec<PathBuf> = (0..4).map(|i| PathBuf::from(format!("/clips/{i}.mp4"))).collect();
    assert_eq!(graph.inputs, expected);
    assert!(graph.filter_graph.contains("[v0][a0][v1][a1][v2][a2][v3][a3]concat=n=4"));
}

#[tokio::test]
async fn test_nested_members_flatten_pre_order() {
    let (engine, _probe, _runner) = mock_engine();
    let a = engine.pipeline(PipelineOptions::master(W, H));
    let b = engine.pipeline(PipelineOptions::master(W, H));
    let c = engine.pipeline(PipelineOptions::member(W, H));
    let d = engine.pipeline(PipelineOptions::member(W, H));
    a.init("/a.mp4").unwrap();
    b.init("/b.mp4").unwrap();
    c.init("/c.mp4").unwrap();
    d.init("/d.mp4").unwrap();

    b.concat(&c).unwrap();
    a.concat(&b).unwrap();
    a.concat(&d).unwrap();

    let graph = a.complex_filters().await.unwrap();
    let inputs: Vec<&Path> = graph.inputs.iter().map(|p| p.as_path()).collect();
    assert_eq!(
        inputs,
        vec![
            Path::new("/a.mp4"),
            Path::new("/b.mp4"),
            Path::new("/c.mp4"),
            Path::new("/d.mp4")
        ]
    );
}

#[tokio::test]
async fn test_calls_before_init_spawn_nothing() {
    let dir = TempDir::new().unwrap();
    let (engine, _probe, runner) = mock_engine();
    let master = engine.pipeline(PipelineOptions::master(W, H));
    let other = engine.pipeline(PipelineOptions::member(W, H));
    other.init("/clips/b.mp4").unwrap();

    assert!(matches!(master.rotate(1), Err(RenderError::InvalidState { .. })));
    assert!(matches!(master.concat(&other), Err(RenderError::InvalidState { .. })));
    assert!(matches!(
        master.run(out(&dir)).await,
        Err(RenderError::InvalidState { .. })
    ));
    assert_eq!(runner.execution_count().await, 0);
}

#[tokio::test]
async fn test_process_failure_removes_output() {
    let dir = TempDir::new().unwrap();
    let (engine, _probe, runner) = mock_engine();
    runner
        .push_error(RenderError::process_failed(Some(1), "Error initializing filter 'eq'"))
        .await;
    runner.set_partial_output_on_error(true).await;

    let master = engine.pipeline(PipelineOptions::master(W, H));
    master.init("/clips/a.mp4").unwrap().color_adjust().unwrap();

    let err = master.run(out(&dir)).await.unwrap_err();
    assert_eq!(err.diagnostics(), Some("Error initializing filter 'eq'"));
    assert!(!out(&dir).exists());
}

#[tokio::test]
async fn test_clean_exit_without_output_is_a_failure() {
    let dir = TempDir::new().unwrap();
    let (engine, _probe, runner) = mock_engine();
    runner.set_write_output(false).await;

    let master = engine.pipeline(PipelineOptions::master(W, H));
    master.init("/clips/a.mp4").unwrap();

    let err = master.run(out(&dir)).await.unwrap_err();
    assert!(matches!(err, RenderError::ProcessFailed { exit_code: Some(0), .. }));
}

#[tokio::test]
async fn test_probe_failure_spawns_nothing() {
    let dir = TempDir::new().unwrap();
    let (engine, probe, runner) = mock_engine();
    probe.fail_path("/clips/broken.mp4").await;

    let master = engine.pipeline(PipelineOptions::master(W, H));
    master.init("/clips/broken.mp4").unwrap();

    let err = master.run(out(&dir)).await.unwrap_err();
    assert!(matches!(err, RenderError::ProbeFailed { .. }));
    assert_eq!(runner.execution_count().await, 0);
}

#[tokio::test]
async fn test_trim_beyond_clip_never_reaches_transcoder() {
    let dir = TempDir::new().unwrap();
    let (engine, probe, runner) = mock_engine();
    probe.set_media("/clips/a.mp4", 10.0, true).await;

    let master = engine.pipeline(PipelineOptions::master(W, H));
    master.init("/clips/a.mp4").unwrap().trim(50.0, 5.0).unwrap();

    let err = master.run(out(&dir)).await.unwrap_err();
    assert!(matches!(err, RenderError::InvalidArgument { .. }));
    assert_eq!(runner.execution_count().await, 0);
    assert!(!out(&dir).exists());
}

#[tokio::test]
async fn test_compiled_graph_matches_submitted_args() {
    let dir = TempDir::new().unwrap();
    let (engine, probe, runner) = mock_engine();
    probe.set_media("/clips/b.mp4", 3.0, false).await;

    let master = engine.pipeline(PipelineOptions::master(W, H));
    let banner = engine.pipeline(PipelineOptions::member(W, H));
    master
        .init("/clips/a.mp4")
        .and_then(|p| p.trim(1.0, 4.0))
        .and_then(|p| p.rotate(-1))
        .unwrap();
    banner.init("/clips/b.mp4").unwrap();
    master.concat(&banner).unwrap();

    let graph = master.complex_filters().await.unwrap();
    master.run(out(&dir)).await.unwrap();

    let expected = graph.to_args(&out(&dir), engine.config());
    assert_eq!(runner.last_args().await, Some(expected));
}

#[tokio::test]
async fn test_run_with_progress_reports() {
    let dir = TempDir::new().unwrap();
    let (engine, _probe, _runner) = mock_engine();
    let master = engine.pipeline(PipelineOptions::master(W, H));
    master.init("/clips/a.mp4").unwrap();

    let (tx, mut rx) = mpsc::channel(8);
    master.run_with_progress(out(&dir), tx).await.unwrap();

    let progress = rx.recv().await.unwrap();
    assert_eq!(progress.duration_secs, Some(10.0));
    assert_eq!(progress.percent, 100.0);
}
