//! End-to-end behaviour of the batch driver against a scripted client.

mod common;

use common::{Reply, ScriptedClient, driver, ids, logged_ids, read_log, records, seed_log, title};
use solace::{RecordId, RunOutcome, SolaceError, StreamFragment};
use std::fs;
use tempfile::TempDir;

#[tokio::test]
async fn test_checkpointed_records_are_not_requested() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("output.jsonl");
    seed_log(&output, &[1, 2]);

    let driver = driver(ScriptedClient::new(), &output);
    let report = driver.run(&records(&[1, 2, 3])).await.unwrap();

    assert_eq!(driver.client().calls(), vec![title(3)]);
    assert_eq!(report.already_done, 2);
    assert_eq!(report.processed, 1);
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(logged_ids(&output), ids(&[1, 2, 3]));
}

#[tokio::test]
async fn test_fatal_error_preserves_partial_progress() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("output.jsonl");

    let client = ScriptedClient::new().reply(3, Reply::Timeout);
    let driver = driver(client, &output);
    let report = driver.run(&records(&[1, 2, 3, 4])).await.unwrap();

    assert!(report.is_fatal());
    match &report.outcome {
        RunOutcome::Aborted { record_id, error } => {
            assert_eq!(record_id, &RecordId::Int(3));
            assert!(error.contains("timeout"), "{error}");
        }
        other => panic!("expected fatal stop, got {other:?}"),
    }
    assert_eq!(logged_ids(&output), ids(&[1, 2]));
    // Record 4 is never attempted.
    assert_eq!(driver.client().calls(), vec![title(1), title(2), title(3)]);
    assert_eq!(report.remaining(), 2);
}

#[tokio::test]
async fn test_content_policy_rejection_skips_record() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("output.jsonl");

    let client = ScriptedClient::new().reply(2, Reply::Reject);
    let driver = driver(client, &output);
    let report = driver.run(&records(&[1, 2, 3])).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.processed, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(logged_ids(&output), ids(&[1, 3]));
}

#[tokio::test]
async fn test_mid_stream_rejection_leaves_no_partial_result() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("output.jsonl");

    let client = ScriptedClient::new().reply(
        2,
        Reply::RejectMidStream(vec![StreamFragment::answer("half an ans")]),
    );
    let driver = driver(client, &output);
    let report = driver.run(&records(&[1, 2, 3])).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.skipped, 1);
    assert_eq!(logged_ids(&output), ids(&[1, 3]));
    assert!(!fs::read_to_string(&output).unwrap().contains("half an ans"));
}

#[tokio::test]
async fn test_malformed_stream_is_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("output.jsonl");

    let client = ScriptedClient::new().reply(
        1,
        Reply::BreakMidStream(vec![StreamFragment::answer("A")]),
    );
    let driver = driver(client, &output);
    let report = driver.run(&records(&[1, 2])).await.unwrap();

    assert!(report.is_fatal());
    assert!(logged_ids(&output).is_empty());
    assert_eq!(driver.client().calls().len(), 1);
}

#[tokio::test]
async fn test_corrupt_log_fails_before_any_request() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("output.jsonl");
    seed_log(&output, &[1]);
    let mut content = fs::read_to_string(&output).unwrap();
    content.push_str("this is not json\n");
    fs::write(&output, &content).unwrap();

    let driver = driver(ScriptedClient::new(), &output);
    let err = driver.run(&records(&[1, 2, 3])).await.unwrap_err();

    assert!(matches!(err, SolaceError::CorruptLog { line: 2, .. }), "{err:?}");
    assert!(driver.client().calls().is_empty());
    assert_eq!(fs::read_to_string(&output).unwrap(), content);
}

#[tokio::test]
async fn test_resume_matches_uninterrupted_run() {
    let temp_dir = TempDir::new().unwrap();
    let interrupted = temp_dir.path().join("interrupted.jsonl");
    let single = temp_dir.path().join("single.jsonl");
    let source = records(&[1, 2, 3, 4, 5]);

    // First run dies at record 3; second run picks up the tail.
    let first = driver(ScriptedClient::new().reply(3, Reply::Timeout), &interrupted)
        .run(&source)
        .await
        .unwrap();
    assert!(first.is_fatal());

    let resumed = driver(ScriptedClient::new(), &interrupted);
    let second = resumed.run(&source).await.unwrap();
    assert_eq!(second.outcome, RunOutcome::Completed);
    assert_eq!(second.already_done, 2);
    assert_eq!(resumed.client().calls(), vec![title(3), title(4), title(5)]);

    driver(ScriptedClient::new(), &single).run(&source).await.unwrap();

    assert_eq!(read_log(&interrupted), read_log(&single));
    assert_eq!(logged_ids(&interrupted), ids(&[1, 2, 3, 4, 5]));
}

#[tokio::test]
async fn test_rerun_of_complete_log_is_noop() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("output.jsonl");
    let source = records(&[1, 2]);

    driver(ScriptedClient::new(), &output).run(&source).await.unwrap();
    let before = fs::read_to_string(&output).unwrap();

    let again = driver(ScriptedClient::new(), &output);
    let report = again.run(&source).await.unwrap();

    assert!(again.client().calls().is_empty());
    assert_eq!(report.already_done, 2);
    assert_eq!(report.processed, 0);
    assert_eq!(fs::read_to_string(&output).unwrap(), before);
}

#[tokio::test]
async fn test_reasoning_is_not_persisted() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("output.jsonl");

    let client = ScriptedClient::new().reply(
        1,
        Reply::Fragments(vec![
            StreamFragment::reasoning("private"),
            StreamFragment::answer("A"),
            StreamFragment::reasoning("still private"),
            StreamFragment::answer("B"),
        ]),
    );
    driver(client, &output).run(&records(&[1])).await.unwrap();

    let log = read_log(&output);
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].answer, "AB");
    assert_eq!(log[0].title, title(1));
    assert_eq!(log[0].description, "description 1");
}

#[tokio::test]
async fn test_empty_answer_persisted_by_default() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("output.jsonl");

    let client = ScriptedClient::new().reply(1, Reply::Fragments(vec![StreamFragment::reasoning("only")]));
    let report = driver(client, &output).run(&records(&[1, 2])).await.unwrap();

    assert_eq!(report.processed, 2);
    assert_eq!(report.empty_answers, 1);
    assert_eq!(read_log(&output)[0].answer, "");
}

#[tokio::test]
async fn test_empty_answer_skipped_when_configured() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("output.jsonl");

    let client = ScriptedClient::new().reply(1, Reply::Fragments(vec![]));
    let report = driver(client, &output)
        .skip_empty_answers(true)
        .run(&records(&[1, 2]))
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.processed, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(logged_ids(&output), ids(&[2]));
}

#[tokio::test]
async fn test_repeated_dataset_id_processed_once() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("output.jsonl");

    let driver = driver(ScriptedClient::new(), &output);
    let report = driver.run(&records(&[1, 2, 1])).await.unwrap();

    assert_eq!(driver.client().calls(), vec![title(1), title(2)]);
    assert_eq!(report.already_done, 0);
    assert_eq!(report.duplicates, 1);
    assert_eq!(report.remaining(), 0);
    assert_eq!(logged_ids(&output), ids(&[1, 2]));
}
