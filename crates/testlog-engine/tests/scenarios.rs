use testlog_engine::{TestResultManager, read_message};
use testlog_error::ErrorCategory;
use testlog_ledger_sqlite::SqliteLedger;
use testlog_merge::duplicate_message;
use testlog_ports::ContentStore;
use testlog_schema::diagnostic::Diagnostic;
use testlog_schema::failure::FailureReasonCode;
use testlog_schema::outcome::Outcome;
use testlog_schema::result::ParsedTestResult;
use testlog_schema::stat::{StatName, StepStats};
use testlog_schema::step::StepRef;
use testlog_storage::InMemoryContentStore;
use testlog_testkit::{MemoryLedger, ResultBuilder, source_artifact, step};

fn save_sqlite(
    ledger: &mut SqliteLedger,
    content: &InMemoryContentStore,
    step: &StepRef,
    batch: &[ParsedTestResult],
) -> testlog_error::Result<testlog_engine::SaveReport> {
    let source = source_artifact(step, "junit.xml");
    TestResultManager::new(ledger, content, step.clone(), source).save(batch)
}

#[test]
fn duplicate_within_one_batch_counts_once_and_fails() {
    let mut ledger = SqliteLedger::open_in_memory().unwrap();
    let content = InMemoryContentStore::new();
    let s1 = step("job-1", "step-1", "STEP1");

    let report = save_sqlite(
        &mut ledger,
        &content,
        &s1,
        &[
            ResultBuilder::new("p", "a").duration(12).build(),
            ResultBuilder::new("p", "b").duration(13).build(),
            ResultBuilder::new("p", "a").duration(11).build(),
        ],
    )
    .unwrap();
    assert_eq!((report.fresh, report.repeats), (2, 1));

    assert_eq!(
        ledger.step_stats(&s1.id).unwrap(),
        StepStats {
            test_count: 2,
            test_failures: 1,
            test_duration: 25,
            test_rerun_count: 0,
        }
    );

    let a = ledger.test_case(&s1.job_id, "p.a").unwrap().unwrap();
    assert_eq!(a.outcome, Outcome::Failed);
    assert_eq!(a.duration_ms, 12);
    assert_eq!(a.repeat_count, 1);
    assert_eq!(a.message.as_deref(), Some(duplicate_message(&["STEP1"]).as_str()));

    let reasons = ledger.failure_reasons(&s1.id).unwrap();
    assert_eq!(reasons.len(), 1);
    assert_eq!(reasons[0].reason, FailureReasonCode::DuplicateTestName);
}

#[test]
fn duplicate_across_steps_corrects_the_owner() {
    let mut ledger = SqliteLedger::open_in_memory().unwrap();
    let content = InMemoryContentStore::new();
    let s1 = step("job-1", "step-1", "STEP1");
    let s2 = step("job-1", "step-2", "STEP2");

    save_sqlite(
        &mut ledger,
        &content,
        &s1,
        &[ResultBuilder::new("p", "a").duration(12).build()],
    )
    .unwrap();
    let report = save_sqlite(
        &mut ledger,
        &content,
        &s2,
        &[
            ResultBuilder::new("p", "a").duration(7).build(),
            ResultBuilder::new("p", "b").duration(18).reruns(1).build(),
        ],
    )
    .unwrap();

    assert_eq!(
        report.diagnostics,
        vec![Diagnostic::DuplicateTestName {
            test: "p.a".to_string(),
            owner_step: s1.id.clone(),
            reported_by: s2.id.clone(),
        }]
    );
    assert_eq!(
        ledger.step_stats(&s1.id).unwrap(),
        StepStats {
            test_count: 1,
            test_failures: 1,
            test_duration: 12,
            test_rerun_count: 0,
        }
    );
    assert_eq!(
        ledger.step_stats(&s2.id).unwrap(),
        StepStats {
            test_count: 1,
            test_failures: 0,
            test_duration: 18,
            test_rerun_count: 1,
        }
    );

    let a = ledger.test_case(&s1.job_id, "p.a").unwrap().unwrap();
    assert_eq!(a.step_id, s1.id);
    assert_eq!(a.outcome, Outcome::Failed);
    assert_eq!(a.duration_ms, 12);
    assert_eq!(
        a.message.as_deref(),
        Some("Error: Duplicate Test Name, reported at:\nSTEP1\nSTEP2\n")
    );

    // The reason goes to the step that saw the repeat, not the owner.
    assert!(ledger.failure_reasons(&s1.id).unwrap().is_empty());
    assert_eq!(ledger.failure_reasons(&s2.id).unwrap().len(), 1);
}

#[test]
fn third_sighting_does_not_correct_owner_again() {
    let mut ledger = SqliteLedger::open_in_memory().unwrap();
    let content = InMemoryContentStore::new();
    let s1 = step("job-1", "step-1", "STEP1");
    let s2 = step("job-1", "step-2", "STEP2");
    let s3 = step("job-1", "step-3", "STEP3");
    for s in [&s1, &s2, &s3] {
        save_sqlite(&mut ledger, &content, s, &[ResultBuilder::new("p", "a").build()]).unwrap();
    }

    assert_eq!(ledger.stat(&s1.id, StatName::TestFailures).unwrap(), Some(1));
    let a = ledger.test_case(&s1.job_id, "p.a").unwrap().unwrap();
    assert_eq!(a.repeat_count, 2);
    assert_eq!(a.sightings, vec!["STEP1", "STEP2", "STEP3"]);
}

#[test]
fn failed_owner_is_not_counted_twice() {
    let mut ledger = SqliteLedger::open_in_memory().unwrap();
    let content = InMemoryContentStore::new();
    let s1 = step("job-1", "step-1", "STEP1");
    let s2 = step("job-1", "step-2", "STEP2");

    save_sqlite(&mut ledger, &content, &s1, &[ResultBuilder::new("p", "a").failed().build()])
        .unwrap();
    save_sqlite(&mut ledger, &content, &s2, &[ResultBuilder::new("p", "a").build()]).unwrap();

    assert_eq!(ledger.stat(&s1.id, StatName::TestFailures).unwrap(), Some(1));
}

#[test]
fn out_of_range_duration_is_stored_as_zero() {
    let mut ledger = SqliteLedger::open_in_memory().unwrap();
    let content = InMemoryContentStore::new();
    let s1 = step("job-1", "step-1", "STEP1");

    let report = save_sqlite(
        &mut ledger,
        &content,
        &s1,
        &[
            ResultBuilder::new("p", "slow").duration(2_147_483_647 * 2).build(),
            ResultBuilder::new("p", "negative").duration(-5).build(),
            ResultBuilder::new("p", "edge").duration(2_147_483_647).build(),
        ],
    )
    .unwrap();

    let slow = ledger.test_case(&s1.job_id, "p.slow").unwrap().unwrap();
    assert_eq!(slow.duration_ms, 0);
    let edge = ledger.test_case(&s1.job_id, "p.edge").unwrap().unwrap();
    assert_eq!(edge.duration_ms, 2_147_483_647);

    let flagged: Vec<&str> = report.diagnostics.iter().map(|d| d.test_name()).collect();
    assert_eq!(flagged, vec!["p.slow", "p.negative"]);
    assert_eq!(
        ledger.stat(&s1.id, StatName::TestDuration).unwrap(),
        Some(2_147_483_647)
    );
}

#[test]
fn repeat_artifacts_accumulate_on_the_canonical_case() {
    let mut ledger = SqliteLedger::open_in_memory().unwrap();
    let content = InMemoryContentStore::new();
    let s1 = step("job-1", "step-1", "STEP1");
    let s2 = step("job-1", "step-2", "STEP2");

    save_sqlite(
        &mut ledger,
        &content,
        &s1,
        &[ResultBuilder::new("p", "a").artifact("log", "text", b"first").build()],
    )
    .unwrap();
    save_sqlite(
        &mut ledger,
        &content,
        &s2,
        &[ResultBuilder::new("p", "a")
            .artifact("log", "text", b"second")
            .artifact("shot", "image/png", &[0x89, 0x50])
            .build()],
    )
    .unwrap();

    let a = ledger.test_case(&s1.job_id, "p.a").unwrap().unwrap();
    let artifacts = ledger.artifacts(&a.id).unwrap();
    let names: Vec<&str> = artifacts.iter().map(|x| x.name.as_str()).collect();
    assert_eq!(names, vec!["log", "log", "shot"]);
    assert_eq!(content.get(&artifacts[0].blob).unwrap(), b"first");
    assert_eq!(content.get(&artifacts[1].blob).unwrap(), b"second");
}

#[test]
fn bad_base64_rolls_back_the_whole_batch() {
    let mut ledger = SqliteLedger::open_in_memory().unwrap();
    let content = InMemoryContentStore::new();
    let s1 = step("job-1", "step-1", "STEP1");

    let err = save_sqlite(
        &mut ledger,
        &content,
        &s1,
        &[
            ResultBuilder::new("p", "a").duration(5).build(),
            ResultBuilder::new("p", "b").raw_artifact("log", "text", "not base64!").build(),
        ],
    )
    .unwrap_err();

    assert!(err.is_decode_error());
    assert!(ledger.test_cases_for_job(&s1.job_id).unwrap().is_empty());
    assert_eq!(ledger.stat(&s1.id, StatName::TestCount).unwrap(), None);
    assert_eq!(
        ledger.source_artifact(&source_artifact(&s1, "junit.xml").id).unwrap(),
        None
    );
}

#[test]
fn failed_stat_write_rolls_back() {
    let mut ledger = MemoryLedger::new().failing_stat_writes();
    let content = InMemoryContentStore::new();
    let s1 = step("job-1", "step-1", "STEP1");
    let source = source_artifact(&s1, "junit.xml");

    let err = TestResultManager::new(&mut ledger, &content, s1.clone(), source)
        .save(&[ResultBuilder::new("p", "a").build()])
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Storage);
    assert_eq!(ledger.commits(), 0);
    assert!(ledger.state().cases.is_empty());
}

#[test]
fn failed_batch_can_be_retried() {
    let mut ledger = SqliteLedger::open_in_memory().unwrap();
    let content = InMemoryContentStore::new();
    let s1 = step("job-1", "step-1", "STEP1");
    let good = ResultBuilder::new("p", "a").duration(5).build();

    save_sqlite(
        &mut ledger,
        &content,
        &s1,
        &[good.clone(), ResultBuilder::new("p", "b").raw_artifact("x", "text", "%%").build()],
    )
    .unwrap_err();
    let report = save_sqlite(&mut ledger, &content, &s1, &[good]).unwrap();

    assert_eq!(report.fresh, 1);
    assert!(report.diagnostics.is_empty());
    assert_eq!(ledger.stat(&s1.id, StatName::TestCount).unwrap(), Some(1));
}

#[test]
fn package_less_results_use_bare_name() {
    let mut ledger = MemoryLedger::new();
    let content = InMemoryContentStore::new();
    let s1 = step("job-1", "step-1", "STEP1");
    let source = source_artifact(&s1, "junit.xml");

    TestResultManager::new(&mut ledger, &content, s1.clone(), source)
        .save(&[ResultBuilder::bare("test_flat").build()])
        .unwrap();

    assert!(ledger.state().case(&s1.job_id, "test_flat").is_some());
    assert_eq!(ledger.commits(), 1);
}

#[test]
fn empty_batch_still_writes_zero_stats() {
    let mut ledger = SqliteLedger::open_in_memory().unwrap();
    let content = InMemoryContentStore::new();
    let s1 = step("job-1", "step-1", "STEP1");

    let report = save_sqlite(&mut ledger, &content, &s1, &[]).unwrap();
    assert_eq!(report, testlog_engine::SaveReport::default());
    assert_eq!(ledger.stat(&s1.id, StatName::TestCount).unwrap(), Some(0));
}

#[test]
fn message_windows_read_back_from_the_source_artifact() {
    let mut ledger = SqliteLedger::open_in_memory().unwrap();
    let content = InMemoryContentStore::new();
    let s1 = step("job-1", "step-1", "STEP1");

    let raw = b"<testsuite><system-out>hello world</system-out></testsuite>";
    let mut source = source_artifact(&s1, "junit.xml");
    source.blob = Some(content.put(raw).unwrap());

    TestResultManager::new(&mut ledger, &content, s1.clone(), source.clone())
        .save(&[ResultBuilder::new("p", "a")
            .message_offset("system-out", 23, 11)
            .message_offset("system-err", 23, 500)
            .build()])
        .unwrap();

    let a = ledger.test_case(&s1.job_id, "p.a").unwrap().unwrap();
    let messages = ledger.messages(&a.id).unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(read_message(&content, &source, &messages[0]).unwrap(), "hello world");

    let err = read_message(&content, &source, &messages[1]).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Validation);

    let stored = ledger.source_artifact(&source.id).unwrap().unwrap();
    assert_eq!(stored.blob, source.blob);
}

#[test]
fn repeat_message_windows_land_on_the_canonical_case_in_order() {
    let mut ledger = SqliteLedger::open_in_memory().unwrap();
    let content = InMemoryContentStore::new();
    let s1 = step("job-1", "step-1", "STEP1");
    let source = source_artifact(&s1, "junit.xml");

    save_sqlite(
        &mut ledger,
        &content,
        &s1,
        &[
            ResultBuilder::new("p", "a").message_offset("system-out", 123, 10).build(),
            ResultBuilder::new("p", "a").message_offset("system-err", 555, 25).build(),
        ],
    )
    .unwrap();

    let a = ledger.test_case(&s1.job_id, "p.a").unwrap().unwrap();
    let windows: Vec<_> = ledger
        .messages(&a.id)
        .unwrap()
        .into_iter()
        .map(|m| (m.artifact_id, m.label, m.start_offset, m.length))
        .collect();
    assert_eq!(
        windows,
        vec![
            (source.id.clone(), "system-out".to_string(), 123, 10),
            (source.id.clone(), "system-err".to_string(), 555, 25),
        ]
    );
}

#[test]
fn repeat_message_windows_keep_their_own_source_artifact() {
    let mut ledger = SqliteLedger::open_in_memory().unwrap();
    let content = InMemoryContentStore::new();
    let s1 = step("job-1", "step-1", "STEP1");
    let s2 = step("job-1", "step-2", "STEP2");

    save_sqlite(
        &mut ledger,
        &content,
        &s1,
        &[ResultBuilder::new("p", "a").message_offset("system-out", 123, 10).build()],
    )
    .unwrap();
    save_sqlite(
        &mut ledger,
        &content,
        &s2,
        &[ResultBuilder::new("p", "a").message_offset("system-err", 555, 25).build()],
    )
    .unwrap();

    let a = ledger.test_case(&s1.job_id, "p.a").unwrap().unwrap();
    let messages = ledger.messages(&a.id).unwrap();
    let owners: Vec<_> = messages.iter().map(|m| m.artifact_id.clone()).collect();
    assert_eq!(
        owners,
        vec![
            source_artifact(&s1, "junit.xml").id,
            source_artifact(&s2, "junit.xml").id,
        ]
    );
    assert_eq!(messages[1].label, "system-err");
    assert_eq!((messages[1].start_offset, messages[1].length), (555, 25));
}

#[test]
fn retried_shard_duplicate_is_charged_to_the_first_step() {
    let mut ledger = SqliteLedger::open_in_memory().unwrap();
    let content = InMemoryContentStore::new();
    let s1 = step("job-1", "step-1", "STEP1");
    let s2 = step("job-1", "step-2", "STEP2");

    save_sqlite(
        &mut ledger,
        &content,
        &s1,
        &[
            ResultBuilder::new("p", "a").build(),
            ResultBuilder::new("p", "b").build(),
        ],
    )
    .unwrap();
    save_sqlite(
        &mut ledger,
        &content,
        &s2,
        &[
            ResultBuilder::new("p", "a").build(),
            ResultBuilder::new("p", "c").reruns(2).build(),
        ],
    )
    .unwrap();

    assert_eq!(ledger.stat(&s1.id, StatName::TestCount).unwrap(), Some(2));
    assert_eq!(ledger.stat(&s1.id, StatName::TestFailures).unwrap(), Some(1));
    assert_eq!(ledger.stat(&s2.id, StatName::TestCount).unwrap(), Some(1));
    assert_eq!(ledger.stat(&s2.id, StatName::TestFailures).unwrap(), Some(0));
    assert_eq!(ledger.stat(&s2.id, StatName::TestRerunCount).unwrap(), Some(1));

    let a = ledger.test_case(&s1.job_id, "p.a").unwrap().unwrap();
    assert_eq!(a.step_id, s1.id);
    assert_eq!(a.outcome, Outcome::Failed);
    let c = ledger.test_case(&s1.job_id, "p.c").unwrap().unwrap();
    assert_eq!((c.step_id, c.reruns), (s2.id.clone(), 2));
}

#[test]
fn message_window_past_i64_is_rejected_before_writing() {
    let mut ledger = SqliteLedger::open_in_memory().unwrap();
    let content = InMemoryContentStore::new();
    let s1 = step("job-1", "step-1", "STEP1");

    let err = save_sqlite(
        &mut ledger,
        &content,
        &s1,
        &[
            ResultBuilder::new("p", "a").build(),
            ResultBuilder::new("p", "b").message_offset("system-out", u64::MAX - 1, 1).build(),
        ],
    )
    .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Validation);
    assert!(ledger.test_cases_for_job(&s1.job_id).unwrap().is_empty());
    assert_eq!(
        ledger.source_artifact(&source_artifact(&s1, "junit.xml").id).unwrap(),
        None
    );

    let err = save_sqlite(
        &mut ledger,
        &content,
        &s1,
        &[ResultBuilder::new("p", "c").message_offset("system-out", i64::MAX as u64, 1).build()],
    )
    .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Validation);
}

#[test]
fn message_from_another_artifact_is_rejected() {
    let content = InMemoryContentStore::new();
    let s1 = step("job-1", "step-1", "STEP1");
    let mut source = source_artifact(&s1, "junit.xml");
    source.blob = Some(content.put(b"output").unwrap());
    let message = testlog_schema::case::TestMessage {
        artifact_id: source_artifact(&s1, "other.xml").id,
        label: "system-out".to_string(),
        start_offset: 0,
        length: 1,
    };

    let err = read_message(&content, &source, &message).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Validation);
}
