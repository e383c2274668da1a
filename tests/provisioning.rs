//! Full pipeline runs against a mock storage origin

mod common;

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::ResponseTemplate;

use common::{TONE_BYTES, TestEnv, provisioning};
use tonebox::assignment::CONTACT_NOT_FOUND;
use tonebox::config::RawProvisioning;
use tonebox::directory::ContactDirectory;
use tonebox::download::DownloadError;
use tonebox::pipeline::{AssignmentStatus, Phase, PipelineError, sanitize_error};
use tonebox::registry::AssetHandle;
use tonebox::scheduler::{CompletedJob, JobOutcome, RetryPolicy, RunScheduler, TriggerOutcome};

async fn ringtone_of(env: &TestEnv, identifier: &str) -> Option<String> {
    let entity = env
        .directory
        .lookup_by_identifier(identifier)
        .await
        .unwrap()
        .expect("contact exists");
    env.directory.get(&entity.id).await.unwrap().custom_ringtone
}

#[tokio::test]
async fn test_run_registers_and_assigns() {
    let env = TestEnv::start("+14155552671, +442079460958").await;

    let report = env
        .orchestrator
        .run(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.status(), AssignmentStatus::Complete);
    assert_eq!(report.rounds, 1);
    assert_eq!(report.outcome.content_type, "audio/mpeg");
    assert_eq!(report.outcome.bytes_written, TONE_BYTES.len() as u64);
    assert_eq!(
        report.results[1].resolved_name.as_deref(),
        Some("Alan Turing")
    );

    let record = env.assets.get_visible(&report.handle).unwrap().unwrap();
    assert_eq!(record.display_name, "Brand Tone");
    assert_eq!(record.mime_type, "audio/mpeg");
    assert_eq!(env.assets.read(&report.handle).await.unwrap(), TONE_BYTES);

    let uri = report.handle.uri();
    assert_eq!(ringtone_of(&env, "+14155552671").await, Some(uri.clone()));
    assert_eq!(ringtone_of(&env, "+442079460958").await, Some(uri.clone()));
    assert_eq!(AssetHandle::parse_uri(&uri), Some(report.handle));
    assert_eq!(env.orchestrator.phase(), Phase::Done);
}

#[tokio::test]
async fn test_rerun_replaces_entry_with_same_name() {
    let env = TestEnv::start("+14155552671").await;
    let cancel = CancellationToken::new();

    let first = env.orchestrator.run(&cancel).await.unwrap();
    let second = env.orchestrator.run(&cancel).await.unwrap();

    assert_ne!(first.handle, second.handle);
    let visible = env.assets.visible_entries().unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].handle, second.handle);
    assert_eq!(
        ringtone_of(&env, "+14155552671").await,
        Some(second.handle.uri())
    );
}

#[tokio::test]
async fn test_unknown_recipient_is_partial_failure() {
    let env = TestEnv::start("+14155552671,+15550001111").await;

    let report = env
        .orchestrator
        .run(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.status(), AssignmentStatus::Partial);
    assert_eq!(report.rounds, 4);
    assert!(report.results[0].success);
    assert_eq!(report.results[1].error.as_deref(), Some(CONTACT_NOT_FOUND));
    assert_eq!(report.summary_error(), None);
    assert!(matches!(
        report.into_result(),
        Err(PipelineError::PartialAssignmentFailure { failed: 1, total: 2 })
    ));
}

#[tokio::test]
async fn test_no_recipient_found_keeps_registration() {
    let env = TestEnv::start("+15550001111").await;

    let report = env
        .orchestrator
        .run(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.status(), AssignmentStatus::Failed);
    assert!(report.summary_error().is_some());
    assert!(env.assets.get_visible(&report.handle).unwrap().is_some());
}

#[tokio::test]
async fn test_html_response_leaves_no_entry() {
    let env = TestEnv::with_response(
        "+14155552671",
        ResponseTemplate::new(200)
            .insert_header("content-type", "text/html; charset=utf-8")
            .set_body_string("<html>login</html>"),
    )
    .await;

    let err = env
        .orchestrator
        .run(&CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Transport(DownloadError::UnsupportedContentType(_))
    ));
    assert!(env.assets.all_entries().unwrap().is_empty());
    assert_eq!(ringtone_of(&env, "+14155552671").await, None);
    assert_eq!(env.orchestrator.phase(), Phase::Idle);
}

#[tokio::test]
async fn test_http_error_is_reported_without_url() {
    let env = TestEnv::with_response("+14155552671", ResponseTemplate::new(403)).await;

    let err = env
        .orchestrator
        .run(&CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Transport(DownloadError::HttpStatus(403))
    ));
    let message = sanitize_error(&err);
    assert!(!message.contains("sig=secret"));
    assert!(env.assets.all_entries().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_configuration_never_contacts_origin() {
    let env = TestEnv::start("+14155552671").await;
    env.source.set(RawProvisioning {
        ringtone_url: Some("http://acct.blob.core.windows.net/tones/brand.mp3".to_string()),
        contact_phone_numbers: Some("0800 FLOWERS".to_string()),
        ringtone_display_name: None,
    });

    let err = env
        .orchestrator
        .run(&CancellationToken::new())
        .await
        .unwrap_err();

    let PipelineError::ConfigurationInvalid(errors) = err else {
        panic!("expected invalid configuration, got {err:?}");
    };
    assert_eq!(errors.len(), 2);
    assert!(env.server.received_requests().await.unwrap().is_empty());
    assert!(env.assets.all_entries().unwrap().is_empty());
}

#[tokio::test]
async fn test_configuration_is_reread_each_run() {
    let env = TestEnv::start("+15550001111").await;
    let cancel = CancellationToken::new();

    let before = env.orchestrator.run(&cancel).await.unwrap();
    assert_eq!(before.status(), AssignmentStatus::Failed);

    env.source.set(provisioning("+14155552671"));
    let after = env.orchestrator.run(&cancel).await.unwrap();
    assert_eq!(after.status(), AssignmentStatus::Complete);
    assert_eq!(after.results[0].identifier, "+14155552671");
}

async fn wait_for_job(scheduler: &RunScheduler, sequence: u64) -> CompletedJob {
    let mut rx = scheduler.subscribe();
    let job = tokio::time::timeout(
        Duration::from_secs(10),
        rx.wait_for(|job| job.as_ref().is_some_and(|job| job.sequence >= sequence)),
    )
    .await
    .expect("job finished in time")
    .expect("scheduler running");
    job.clone().unwrap()
}

fn quick_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        backoff: Duration::ZERO,
    }
}

#[tokio::test]
async fn test_scheduler_runs_triggered_job() {
    let env = TestEnv::start("+14155552671").await;
    let scheduler = RunScheduler::spawn(env.orchestrator.clone(), quick_policy(3));

    assert_eq!(scheduler.trigger().await, TriggerOutcome::Queued);
    let job = wait_for_job(&scheduler, 1).await;

    let JobOutcome::Succeeded { attempts, report } = job.outcome else {
        panic!("expected success, got {:?}", job.outcome);
    };
    assert_eq!(attempts, 1);
    assert_eq!(report.succeeded(), 1);
    assert!(!scheduler.is_busy().await);

    scheduler.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_scheduler_retries_transport_failures() {
    let env = TestEnv::with_response("+14155552671", ResponseTemplate::new(503)).await;
    let scheduler = RunScheduler::spawn(env.orchestrator.clone(), quick_policy(2));

    scheduler.trigger().await;
    let job = wait_for_job(&scheduler, 1).await;

    let JobOutcome::Failed {
        attempts,
        error,
        report,
    } = job.outcome
    else {
        panic!("expected failure, got {:?}", job.outcome);
    };
    assert_eq!(attempts, 2);
    assert!(error.contains("503"));
    assert!(report.is_none());
    assert_eq!(env.server.received_requests().await.unwrap().len(), 2);

    scheduler.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_scheduler_does_not_retry_assignment_failures() {
    let env = TestEnv::start("+15550001111").await;
    let scheduler = RunScheduler::spawn(env.orchestrator.clone(), quick_policy(3));

    scheduler.trigger().await;
    let job = wait_for_job(&scheduler, 1).await;

    assert!(matches!(
        job.outcome,
        JobOutcome::Failed { attempts: 1, report: Some(_), .. }
    ));
    assert_eq!(env.server.received_requests().await.unwrap().len(), 1);

    scheduler.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_trigger_during_run_queues_one_replacement() {
    let env = TestEnv::with_response(
        "+14155552671",
        ResponseTemplate::new(200)
            .insert_header("content-type", "audio/mpeg")
            .set_body_bytes(TONE_BYTES)
            .set_delay(Duration::from_millis(300)),
    )
    .await;
    let scheduler = RunScheduler::spawn(env.orchestrator.clone(), quick_policy(1));

    let mut phase = env.orchestrator.subscribe();
    assert_eq!(scheduler.trigger().await, TriggerOutcome::Queued);
    phase
        .wait_for(|phase| *phase == Phase::Downloading)
        .await
        .unwrap();

    assert_eq!(scheduler.trigger().await, TriggerOutcome::Replacing);
    assert_eq!(scheduler.trigger().await, TriggerOutcome::Coalesced);
    assert!(scheduler.is_busy().await);

    let job = wait_for_job(&scheduler, 2).await;
    assert_eq!(job.sequence, 2);
    assert!(matches!(job.outcome, JobOutcome::Succeeded { .. }));
    assert!(!scheduler.is_busy().await);
    // One request for the replaced run, one for its replacement
    assert_eq!(env.server.received_requests().await.unwrap().len(), 2);
    assert_eq!(env.assets.visible_entries().unwrap().len(), 1);

    scheduler.shutdown().await.unwrap();
}
