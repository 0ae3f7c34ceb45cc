//! Tests for `src/heartbeat/daily_report.rs`: config selection, fan-out and
//! per-recipient isolation.

use std::sync::Arc;
use std::time::Duration;

use whatsapp_gateway::heartbeat::daily_report::{
    default_greeting, ReportSummary, RunOutcome, SkipReason, Trigger,
};

use crate::common::{
    daily_report, fast_settings, manager, member, ready_manager, report_config, FakeDataStore,
    FakeFactory, InitScript,
};

fn completed(outcome: RunOutcome) -> ReportSummary {
    match outcome {
        RunOutcome::Completed(summary) => summary,
        RunOutcome::Skipped { reason } => panic!("run was skipped: {reason:?}"),
    }
}

#[tokio::test]
async fn skipped_when_not_connected() {
    let factory = FakeFactory::new(InitScript::Silent);
    let (_tmp, manager) = manager(&factory, fast_settings());
    manager.start().await;
    let store = Arc::new(FakeDataStore::new(
        vec![report_config(Some("Hello"), None)],
        vec![member("Alice", "Manager", Some("1234567890"))],
    ));
    let report = daily_report(&manager, store.clone());

    let outcome = report.run(Trigger::Scheduled).await;

    assert_eq!(
        outcome,
        RunOutcome::Skipped {
            reason: SkipReason::NotConnected
        }
    );
    assert!(store.role_queries().is_empty());
    assert!(factory.sent().is_empty());
}

#[tokio::test]
async fn no_active_configs_sends_nothing() {
    let factory = FakeFactory::default();
    let (_tmp, manager) = ready_manager(&factory).await;
    let store = Arc::new(FakeDataStore::new(
        Vec::new(),
        vec![member("Alice", "Manager", Some("1234567890"))],
    ));
    let report = daily_report(&manager, store);

    let outcome = report.run(Trigger::Scheduled).await;

    assert_eq!(
        outcome,
        RunOutcome::Skipped {
            reason: SkipReason::NoActiveConfigs
        }
    );
    assert!(factory.sent().is_empty());
}

#[tokio::test]
async fn inactive_or_foreign_configs_are_ignored() {
    let factory = FakeFactory::default();
    let (_tmp, manager) = ready_manager(&factory).await;
    let mut inactive = report_config(Some("Hello"), None);
    inactive.is_active = false;
    let mut other_kind = report_config(Some("Hello"), None);
    other_kind.kind = "weekly_digest".to_owned();
    let store = Arc::new(FakeDataStore::new(
        vec![inactive, other_kind],
        vec![member("Alice", "Manager", Some("1234567890"))],
    ));
    let report = daily_report(&manager, store);

    let outcome = report.run(Trigger::Manual).await;

    assert_eq!(
        outcome,
        RunOutcome::Skipped {
            reason: SkipReason::NoActiveConfigs
        }
    );
    assert!(factory.sent().is_empty());
}

#[tokio::test]
async fn config_query_failure_skips_the_run() {
    let factory = FakeFactory::default();
    let (_tmp, manager) = ready_manager(&factory).await;
    let report = daily_report(&manager, Arc::new(FakeDataStore::failing_configs()));

    let outcome = report.run(Trigger::Scheduled).await;

    assert_eq!(
        outcome,
        RunOutcome::Skipped {
            reason: SkipReason::DataStoreUnavailable
        }
    );
}

#[tokio::test]
async fn custom_message_goes_to_default_roles() {
    let factory = FakeFactory::default();
    let (_tmp, manager) = ready_manager(&factory).await;
    let store = Arc::new(FakeDataStore::new(
        vec![report_config(Some("Hello"), None)],
        vec![
            member("Alice", "Manager", Some("1234567890")),
            member("Dan", "Driver", Some("11999990000")),
        ],
    ));
    let report = daily_report(&manager, store.clone());

    let summary = completed(report.run(Trigger::Scheduled).await);

    assert_eq!(summary.configs, 1);
    assert_eq!(summary.sent, 1);
    assert_eq!(
        factory.sent(),
        vec![("551234567890@c.us".to_owned(), "Hello".to_owned())]
    );
    assert_eq!(
        store.role_queries(),
        vec![vec!["Manager".to_owned(), "Owner".to_owned()]]
    );
}

#[tokio::test]
async fn default_greeting_names_each_recipient() {
    let factory = FakeFactory::default();
    let (_tmp, manager) = ready_manager(&factory).await;
    let store = Arc::new(FakeDataStore::new(
        vec![report_config(None, Some(&["Owner"]))],
        vec![member("Bia", "Owner", Some("21 98888-7777"))],
    ));
    let report = daily_report(&manager, store);

    let summary = completed(report.run(Trigger::Manual).await);

    assert_eq!(summary.sent, 1);
    let sent = factory.sent();
    assert_eq!(sent[0].0, "5521988887777@c.us");
    assert_eq!(sent[0].1, default_greeting("Bia"));
    assert!(sent[0].1.starts_with("Olá Bia!"));
}

#[tokio::test]
async fn recipients_without_phone_are_skipped() {
    let factory = FakeFactory::default();
    let (_tmp, manager) = ready_manager(&factory).await;
    let store = Arc::new(FakeDataStore::new(
        vec![report_config(Some("Hello"), None)],
        vec![
            member("Alice", "Manager", Some("1234567890")),
            member("Bruno", "Manager", None),
            member("Carla", "Owner", Some("   ")),
        ],
    ));
    let report = daily_report(&manager, store);

    let summary = completed(report.run(Trigger::Scheduled).await);

    assert_eq!(summary.sent, 1);
    assert_eq!(summary.skipped_no_phone, 2);
    assert!(summary.failures.is_empty());
    assert_eq!(factory.sent().len(), 1);
}

#[tokio::test]
async fn one_failed_send_does_not_stop_the_rest() {
    let factory = FakeFactory::default();
    factory.fail_chat("5511911112222@c.us");
    let (_tmp, manager) = ready_manager(&factory).await;
    let store = Arc::new(FakeDataStore::new(
        vec![report_config(Some("Hello"), None)],
        vec![
            member("Alice", "Manager", Some("1234567890")),
            member("Bob", "Manager", Some("11 91111-2222")),
            member("Carol", "Owner", Some("11 93333-4444")),
        ],
    ));
    let report = daily_report(&manager, store);

    let summary = completed(report.run(Trigger::Scheduled).await);

    assert_eq!(summary.sent, 2);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].recipient, "Bob");
    let chats: Vec<String> = factory.sent().into_iter().map(|(chat, _)| chat).collect();
    assert_eq!(
        chats,
        vec!["551234567890@c.us".to_owned(), "5511933334444@c.us".to_owned()]
    );
}

#[tokio::test]
async fn each_active_config_is_processed() {
    let factory = FakeFactory::default();
    let (_tmp, manager) = ready_manager(&factory).await;
    let store = Arc::new(FakeDataStore::new(
        vec![
            report_config(Some("For managers"), Some(&["Manager"])),
            report_config(Some("For owners"), Some(&["Owner"])),
        ],
        vec![
            member("Alice", "Manager", Some("1234567890")),
            member("Olga", "Owner", Some("0987654321")),
        ],
    ));
    let report = daily_report(&manager, store);

    let summary = completed(report.run(Trigger::Scheduled).await);

    assert_eq!(summary.configs, 2);
    assert_eq!(
        factory.sent(),
        vec![
            ("551234567890@c.us".to_owned(), "For managers".to_owned()),
            ("550987654321@c.us".to_owned(), "For owners".to_owned()),
        ]
    );
}

#[tokio::test]
async fn recipient_query_failure_is_counted() {
    let factory = FakeFactory::default();
    let (_tmp, manager) = ready_manager(&factory).await;
    let store = Arc::new(
        FakeDataStore::new(
            vec![report_config(Some("Hello"), None)],
            vec![member("Alice", "Manager", Some("1234567890"))],
        )
        .with_failing_recipients(),
    );
    let report = daily_report(&manager, store);

    let summary = completed(report.run(Trigger::Scheduled).await);

    assert_eq!(summary.config_errors, 1);
    assert_eq!(summary.sent, 0);
    assert!(factory.sent().is_empty());
}

#[tokio::test]
async fn overlapping_runs_are_rejected() {
    let factory = FakeFactory::default();
    factory.set_send_delay(Duration::from_millis(200));
    let (_tmp, manager) = ready_manager(&factory).await;
    let store = Arc::new(FakeDataStore::new(
        vec![report_config(Some("Hello"), None)],
        vec![member("Alice", "Manager", Some("1234567890"))],
    ));
    let report = daily_report(&manager, store);

    let (first, second) = tokio::join!(report.run(Trigger::Scheduled), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        report.run(Trigger::Manual).await
    });

    assert_eq!(completed(first).sent, 1);
    assert_eq!(
        second,
        RunOutcome::Skipped {
            reason: SkipReason::AlreadyRunning
        }
    );
    assert_eq!(factory.sent().len(), 1);
}
