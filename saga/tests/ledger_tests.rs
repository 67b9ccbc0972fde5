//! Saga ledger flows against the in-memory registry backend.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use atlas_core::MessageBuffer;
use atlas_core::emit::emit;
use atlas_core::registry::MemoryBackend;
use atlas_saga::action::{AwardMesosPayload, ChangeStylePayload, ValidateCharacterStatePayload};
use atlas_saga::ledger::EVENT_TOPIC_SAGA_STATUS;
use atlas_saga::{Directive, Saga, SagaLedger, SagaType, StepPayload, saga_key};
use atlas_testing::{RecordingProducer, test_clock, test_context};
use proptest::prelude::*;
use serde_json::Value;
use std::sync::Arc;

fn ledger() -> SagaLedger {
    SagaLedger::new(Arc::new(MemoryBackend::new()), Arc::new(test_clock()))
}

fn mesos(amount: i32) -> StepPayload {
    StepPayload::AwardMesos(AwardMesosPayload {
        character_id: 7,
        world_id: 0,
        channel_id: 1,
        actor_id: 9_010_000,
        actor_type: "NPC".into(),
        amount,
    })
}

fn hair(style: u32, old: u32) -> StepPayload {
    StepPayload::ChangeHair(ChangeStylePayload {
        character_id: 7,
        world_id: 0,
        channel_id: 1,
        style_id: style,
        old_style_id: Some(old),
    })
}

fn three_steps() -> Saga {
    Saga::builder()
        .saga_type(SagaType::CashShopOperation)
        .initiated_by("cashshop")
        .add_step("pay", mesos(-1_000))
        .add_step("style", hair(30_040, 30_030))
        .add_step("bonus", mesos(10))
        .build()
        .unwrap()
}

#[tokio::test]
async fn completes_steps_in_order_and_reports_completion() {
    let ledger = ledger();
    let producer = RecordingProducer::new();
    let ctx = test_context();
    let saga = three_steps();
    let id = saga.transaction_id;

    let first = emit(&producer, &ctx, |mut buffer| {
        let (ledger, ctx) = (&ledger, &ctx);
        async move {
            let r = ledger.begin(ctx, &mut buffer, saga).await;
            (buffer, r)
        }
    })
    .await
    .unwrap();
    assert!(matches!(first, Directive::Dispatch(ref s) if s.step_id == "pay"));

    let mut buffer = MessageBuffer::new();
    let next = ledger.step_completed(&ctx, &mut buffer, id, "pay").await.unwrap();
    assert!(matches!(next, Directive::Dispatch(ref s) if s.step_id == "style"));
    assert_eq!(
        ledger.step_completed(&ctx, &mut buffer, id, "pay").await.unwrap(),
        Directive::Duplicate
    );
    ledger.step_completed(&ctx, &mut buffer, id, "style").await.unwrap();
    assert!(buffer.is_empty());

    let done = emit(&producer, &ctx, |mut buffer| {
        let (ledger, ctx) = (&ledger, &ctx);
        async move {
            let r = ledger.step_completed(ctx, &mut buffer, id, "bonus").await;
            (buffer, r)
        }
    })
    .await
    .unwrap();
    assert_eq!(done, Directive::Finished);
    assert!(ledger.in_flight(&ctx).await.unwrap().is_empty());

    let records = producer.on_topic(EVENT_TOPIC_SAGA_STATUS);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].key(), Some(saga_key(&id)));
    let event: Value = records[0].message.decode().unwrap();
    assert_eq!(event["type"], "COMPLETED");
    assert_eq!(event["body"]["sagaType"], "cash_shop_operation");
}

#[tokio::test]
async fn failure_compensates_completed_steps_in_reverse() {
    let ledger = ledger();
    let ctx = test_context();
    let saga = three_steps();
    let id = saga.transaction_id;
    let mut buffer = MessageBuffer::new();

    ledger.begin(&ctx, &mut buffer, saga).await.unwrap();
    ledger.step_completed(&ctx, &mut buffer, id, "pay").await.unwrap();
    ledger.step_completed(&ctx, &mut buffer, id, "style").await.unwrap();

    let directive = ledger
        .step_failed(&ctx, &mut buffer, id, "bonus", "inventory full")
        .await
        .unwrap();
    let Directive::Compensate(undo) = directive else {
        panic!("expected compensation, got {directive:?}");
    };
    assert_eq!(undo.len(), 2);
    assert_eq!(undo[0].payload, hair(30_030, 30_040));
    assert_eq!(undo[1].payload, mesos(1_000));

    let events = buffer.get_all().unwrap();
    let failed: Value = events[EVENT_TOPIC_SAGA_STATUS][0].decode().unwrap();
    assert_eq!(failed["type"], "FAILED");
    assert_eq!(failed["body"]["failedStep"], "bonus");
    assert_eq!(failed["body"]["reason"], "inventory full");
    assert!(ledger.get(&ctx, id).await.is_err());

    // late outcome for a finished saga
    assert_eq!(
        ledger.step_failed(&ctx, &mut buffer, id, "bonus", "again").await.unwrap(),
        Directive::Duplicate
    );
}

#[tokio::test]
async fn failed_state_check_aborts_without_compensation() {
    let ledger = ledger();
    let ctx = test_context();
    let saga = Saga::builder()
        .saga_type(SagaType::QuestComplete)
        .initiated_by("quest-service")
        .add_step(
            "check",
            StepPayload::ValidateCharacterState(ValidateCharacterStatePayload {
                character_id: 7,
                conditions: vec![],
            }),
        )
        .add_step("pay", mesos(5))
        .build()
        .unwrap();
    let id = saga.transaction_id;
    let mut buffer = MessageBuffer::new();

    ledger.begin(&ctx, &mut buffer, saga).await.unwrap();
    let directive = ledger
        .step_failed(&ctx, &mut buffer, id, "check", "level too low")
        .await
        .unwrap();
    assert_eq!(directive, Directive::Aborted { step_id: "check".into() });
}

#[tokio::test]
async fn sagas_are_tenant_scoped() {
    let ledger = ledger();
    let a = test_context();
    let b = test_context();
    let saga = three_steps();
    let id = saga.transaction_id;
    let mut buffer = MessageBuffer::new();

    ledger.begin(&a, &mut buffer, saga.clone()).await.unwrap();
    assert_eq!(
        ledger.begin(&a, &mut buffer, saga).await.unwrap(),
        Directive::Duplicate
    );
    assert!(ledger.get(&b, id).await.is_err());
    assert!(ledger.in_flight(&b).await.unwrap().is_empty());
    assert_eq!(
        ledger.step_completed(&b, &mut buffer, id, "pay").await.unwrap(),
        Directive::Duplicate
    );
    assert_eq!(ledger.get(&a, id).await.unwrap().steps[0].status, atlas_saga::Status::Pending);
}

#[tokio::test]
async fn unknown_step_is_not_found() {
    let ledger = ledger();
    let ctx = test_context();
    let saga = three_steps();
    let id = saga.transaction_id;
    let mut buffer = MessageBuffer::new();

    ledger.begin(&ctx, &mut buffer, saga).await.unwrap();
    let err = ledger
        .step_completed(&ctx, &mut buffer, id, "nope")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
}

proptest! {
    #[test]
    fn completing_a_prefix_keeps_ordering_valid(completed in 0usize..=3) {
        let mut saga = three_steps();
        for i in 0..completed {
            saga.set_step_status(i, atlas_saga::Status::Completed, chrono::Utc::now()).unwrap();
        }
        prop_assert!(saga.validate_ordering());
        prop_assert_eq!(saga.furthest_completed_index(), completed.checked_sub(1));
        prop_assert_eq!(saga.earliest_pending_index(), (completed < 3).then_some(completed));
    }
}
