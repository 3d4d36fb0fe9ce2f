//! Integration tests for the staged pipeline
//!
//! Drives full runs over a scripted runner and asserts on the exact set
//! and ordering of external commands the pipeline produces.

mod common;

use common::PipelineTestBuilder;
use stackalign::error::PipelineError;
use stackalign::pipeline::{Stage, StageStatus};

fn count_of(programs: &[String], name: &str) -> usize {
    programs.iter().filter(|p| *p == name).count()
}

fn first_index(labels: &[String], prefix: &str) -> usize {
    labels
        .iter()
        .position(|l| l.starts_with(prefix))
        .unwrap_or_else(|| panic!("no label starting with {prefix:?}"))
}

fn last_index(labels: &[String], prefix: &str) -> usize {
    labels
        .iter()
        .rposition(|l| l.starts_with(prefix))
        .unwrap_or_else(|| panic!("no label starting with {prefix:?}"))
}

#[tokio::test]
async fn full_run_produces_the_complete_command_census() {
    // Five slices: one preparation, one registration and one composition
    // each, two reslices each, plus the two stacking commands.
    let mut ctx = PipelineTestBuilder::new().build().unwrap();
    ctx.pipeline.launch().await.unwrap();

    let programs = ctx.runner.programs();
    assert_eq!(programs.len(), 27);
    assert_eq!(count_of(&programs, "slice_preprocess"), 5);
    assert_eq!(count_of(&programs, "ANTS"), 5);
    assert_eq!(count_of(&programs, "ComposeMultiTransform"), 5);
    assert_eq!(count_of(&programs, "c2d"), 10);
    assert_eq!(count_of(&programs, "stack_sections"), 2);
}

#[tokio::test]
async fn batches_complete_in_stage_order() {
    let mut ctx = PipelineTestBuilder::new().build().unwrap();
    ctx.pipeline.launch().await.unwrap();

    let labels = ctx.runner.labels();
    let phases = [
        "prepare slice",
        "register slice",
        "compose slice",
        "reslice gray",
        "reslice color",
        "stack",
    ];
    for pair in phases.windows(2) {
        assert!(
            last_index(&labels, pair[0]) < first_index(&labels, pair[1]),
            "{} commands ran after {} started",
            pair[0],
            pair[1]
        );
    }
}

#[tokio::test]
async fn every_slice_composes_against_the_reference() {
    let mut ctx = PipelineTestBuilder::new().with_range(50, 54, 52).build().unwrap();
    ctx.pipeline.launch().await.unwrap();

    let composites: Vec<_> = ctx
        .runner
        .history()
        .into_iter()
        .filter(|c| c.program() == "ComposeMultiTransform")
        .collect();
    assert_eq!(composites.len(), 5);
    for command in composites {
        assert!(
            command.args()[1].ends_with("_f0052_Affine.txt"),
            "composite target {} does not map onto the reference",
            command.args()[1]
        );
    }
}

#[tokio::test]
async fn skipped_stages_contribute_no_commands() {
    let mut ctx = PipelineTestBuilder::new()
        .configured(|o| {
            o.skip.slice_generation = true;
            o.skip.transforms = true;
            o.skip.reslice = true;
        })
        .build()
        .unwrap();
    ctx.pipeline.launch().await.unwrap();

    let programs = ctx.runner.programs();
    assert_eq!(programs, vec!["stack_sections", "stack_sections"]);
    assert_eq!(
        ctx.pipeline.stage_status(Stage::SourceSlices),
        StageStatus::Skipped
    );
    assert_eq!(
        ctx.pipeline.stage_status(Stage::Volumes),
        StageStatus::Completed
    );
}

#[tokio::test]
async fn failed_batch_stops_the_stage_sequence() {
    let mut ctx = PipelineTestBuilder::new().build().unwrap();
    ctx.runner
        .fail_matching("reslice gray 0053", "could not read transform");
    let err = ctx.pipeline.launch().await.unwrap_err();

    match err {
        PipelineError::Batch { stage, failures } => {
            assert_eq!(stage, Stage::Reslice);
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].label, "reslice gray 0053");
            assert!(failures[0].detail.contains("could not read transform"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let labels = ctx.runner.labels();
    assert!(labels.iter().all(|l| !l.starts_with("reslice color")));
    assert!(labels.iter().all(|l| !l.starts_with("stack")));
    assert_eq!(ctx.pipeline.stage_status(Stage::Reslice), StageStatus::Failed);
    assert_eq!(ctx.pipeline.stage_status(Stage::Volumes), StageStatus::Pending);
}

#[tokio::test]
async fn failure_labels_name_the_moving_and_fixed_slices() {
    let mut ctx = PipelineTestBuilder::new().build().unwrap();
    ctx.runner
        .fail_matching("register slice 0051 -> 0052", "metric overflow");
    let err = ctx.pipeline.launch().await.unwrap_err();

    match err {
        PipelineError::Batch { failures, .. } => {
            assert_eq!(failures[0].label, "register slice 0051 -> 0052");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(count_of(&ctx.runner.programs(), "ComposeMultiTransform"), 0);
}

#[tokio::test]
async fn independent_commands_overlap_up_to_the_job_limit() {
    let mut ctx = PipelineTestBuilder::new()
        .with_range(0, 11, 5)
        .with_jobs(3)
        .with_delay(std::time::Duration::from_millis(10))
        .build()
        .unwrap();
    ctx.pipeline.launch().await.unwrap();

    assert!(ctx.runner.max_in_flight() <= 3);
    assert_eq!(count_of(&ctx.runner.programs(), "ANTS"), 12);
}

#[tokio::test]
async fn execution_report_lands_on_disk() {
    let mut ctx = PipelineTestBuilder::new()
        .configured(|o| {
            o.execution.report = Some(o.work_dir.join("report.json"));
        })
        .build()
        .unwrap();
    ctx.pipeline.launch().await.unwrap();

    let path = ctx.root().join("work").join("report.json");
    let text = std::fs::read_to_string(path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["outcome"], "completed");
    assert_eq!(value["stages"].as_array().unwrap().len(), 4);
    assert_eq!(value["stages"][0]["status"], "completed");
    // Partials and composites are separate batches of the same stage.
    assert_eq!(value["stages"][1]["batches"].as_array().unwrap().len(), 2);
}
