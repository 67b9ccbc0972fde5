//! Messenger processor behaviour against the in-memory backend.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use atlas_core::consumer::{Delivery, Dispatcher};
use atlas_core::envelope::{Headers, entity_key};
use atlas_core::registry::MemoryBackend;
use atlas_core::{Context, Error, MessageBuffer};
use atlas_messengers::events::{
    COMMAND_TOPIC_INVITE, COMMAND_TOPIC_MESSENGER, EVENT_TOPIC_CHARACTER_STATUS, EVENT_TOPIC_MESSENGER_STATUS,
};
use atlas_messengers::{CAPACITY, CharacterStatusHandler, CommandHandler, MessengerProcessor, registry};
use atlas_testing::{RecordingProducer, test_context};
use proptest::prelude::*;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

fn processor() -> MessengerProcessor {
    MessengerProcessor::new(registry(Arc::new(MemoryBackend::new())))
}

#[tokio::test]
async fn full_messenger_rejects_fourth_member() {
    let processor = processor();
    let producer = RecordingProducer::new();
    let ctx = test_context();
    let tx = Uuid::new_v4();

    let messenger = processor.create_and_emit(&producer, &ctx, tx, 0, 1).await.unwrap();
    processor.join_and_emit(&producer, &ctx, tx, 0, messenger.id(), 2).await.unwrap();
    processor.join_and_emit(&producer, &ctx, tx, 0, messenger.id(), 3).await.unwrap();
    let before = processor.get_by_id(&ctx, messenger.id()).await.unwrap();
    producer.clear();

    let err = processor
        .join_and_emit(&producer, &ctx, tx, 0, messenger.id(), 4)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AtCapacity { capacity: 3, .. }));
    assert_eq!(processor.get_by_id(&ctx, messenger.id()).await.unwrap(), before);
    assert!(processor.get_by_member(&ctx, 4).await.is_err());

    let records = producer.on_topic(EVENT_TOPIC_MESSENGER_STATUS);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].key(), Some(4));
    let event: Value = records[0].message.decode().unwrap();
    assert_eq!(event["type"], "MESSENGER_ERROR");
    assert_eq!(event["body"]["type"], "AT_CAPACITY");
    assert_eq!(event["transactionId"], tx.to_string());
}

#[tokio::test]
async fn slots_are_reported_and_reused() {
    let processor = processor();
    let ctx = test_context();
    let tx = Uuid::new_v4();
    let mut buffer = MessageBuffer::new();

    let messenger = processor.create(&ctx, &mut buffer, tx, 0, 1).await.unwrap();
    processor.join(&ctx, &mut buffer, tx, messenger.id(), 2).await.unwrap();
    processor.leave(&ctx, &mut buffer, tx, messenger.id(), 1).await.unwrap();
    let messenger = processor.join(&ctx, &mut buffer, tx, messenger.id(), 3).await.unwrap();

    assert_eq!(messenger.member(3).unwrap().slot, 0);
    assert_eq!(messenger.member(2).unwrap().slot, 1);

    let staged = buffer.get_all().unwrap();
    let events: Vec<Value> = staged[EVENT_TOPIC_MESSENGER_STATUS]
        .iter()
        .map(|m| m.decode().unwrap())
        .collect();
    let summary: Vec<(String, Value)> = events
        .iter()
        .map(|e| (e["type"].as_str().unwrap().to_string(), e["body"]["slot"].clone()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("MESSENGER_CREATED".to_string(), Value::Null),
            ("MESSENGER_JOINED".to_string(), json!(1)),
            ("MESSENGER_LEFT".to_string(), json!(0)),
            ("MESSENGER_JOINED".to_string(), json!(0)),
        ]
    );
}

#[tokio::test]
async fn last_member_leaving_closes_messenger() {
    let processor = processor();
    let ctx = test_context();
    let tx = Uuid::new_v4();
    let mut buffer = MessageBuffer::new();

    let messenger = processor.create(&ctx, &mut buffer, tx, 0, 1).await.unwrap();
    let after = processor.leave(&ctx, &mut buffer, tx, messenger.id(), 1).await.unwrap();

    assert!(after.is_empty());
    assert!(matches!(
        processor.get_by_id(&ctx, messenger.id()).await,
        Err(Error::NotFound { .. })
    ));
    assert!(processor.get_by_member(&ctx, 1).await.is_err());
}

#[tokio::test]
async fn membership_error_codes() {
    let processor = processor();
    let producer = RecordingProducer::new();
    let ctx = test_context();
    let tx = Uuid::new_v4();

    let messenger = processor.create_and_emit(&producer, &ctx, tx, 0, 1).await.unwrap();
    producer.clear();

    let _ = processor.create_and_emit(&producer, &ctx, tx, 0, 1).await;
    let _ = processor.join_and_emit(&producer, &ctx, tx, 0, messenger.id(), 1).await;
    let _ = processor.leave_and_emit(&producer, &ctx, tx, 0, messenger.id(), 9).await;
    let _ = processor.join_and_emit(&producer, &ctx, tx, 0, 42, 9).await;

    let codes: Vec<String> = producer
        .events::<Value>(EVENT_TOPIC_MESSENGER_STATUS)
        .iter()
        .map(|e| e["body"]["type"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(codes, vec!["ALREADY_JOINED_1", "ALREADY_JOINED_2", "NOT_IN", "NOT_FOUND"]);
}

#[tokio::test]
async fn invite_opens_messenger_for_actor() {
    let processor = processor();
    let ctx = test_context();
    let tx = Uuid::new_v4();
    let mut buffer = MessageBuffer::new();

    let messenger = processor
        .request_invite(&ctx, &mut buffer, tx, 3, 1, 2)
        .await
        .unwrap();
    assert_eq!(processor.get_by_member(&ctx, 1).await.unwrap().id(), messenger.id());
    assert!(processor.get_by_member(&ctx, 2).await.is_err());
    assert_eq!(buffer.staged(EVENT_TOPIC_MESSENGER_STATUS), 1);

    let staged = buffer.get_all().unwrap();
    let invites = &staged[COMMAND_TOPIC_INVITE];
    assert_eq!(invites.len(), 1);
    assert_eq!(invites[0].key, entity_key(2));
    let invite: Value = invites[0].decode().unwrap();
    assert_eq!(invite["inviteType"], "MESSENGER");
    assert_eq!(invite["worldId"], 3);
    assert_eq!(invite["body"]["originatorId"], 1);
    assert_eq!(invite["body"]["referenceId"], messenger.id());

    // the second invite reuses the actor's messenger
    let again = processor
        .request_invite(&ctx, &mut buffer, tx, 3, 1, 5)
        .await
        .unwrap();
    assert_eq!(again.id(), messenger.id());
    assert_eq!(buffer.staged(EVENT_TOPIC_MESSENGER_STATUS), 1);
}

#[tokio::test]
async fn invite_preconditions() {
    let processor = processor();
    let ctx = test_context();
    let tx = Uuid::new_v4();
    let mut buffer = MessageBuffer::new();

    let messenger = processor.create(&ctx, &mut buffer, tx, 0, 1).await.unwrap();
    processor.create(&ctx, &mut buffer, tx, 0, 9).await.unwrap();
    assert!(matches!(
        processor.request_invite(&ctx, &mut buffer, tx, 0, 1, 9).await,
        Err(Error::AlreadyIn { .. })
    ));

    processor.join(&ctx, &mut buffer, tx, messenger.id(), 2).await.unwrap();
    processor.join(&ctx, &mut buffer, tx, messenger.id(), 3).await.unwrap();
    assert!(matches!(
        processor.request_invite(&ctx, &mut buffer, tx, 0, 1, 4).await,
        Err(Error::AtCapacity { .. })
    ));
}

#[tokio::test]
async fn messengers_are_tenant_scoped() {
    let processor = processor();
    let a = test_context();
    let b = test_context();
    let tx = Uuid::new_v4();
    let mut buffer = MessageBuffer::new();

    let messenger = processor.create(&a, &mut buffer, tx, 0, 1).await.unwrap();
    assert!(processor.get_by_id(&b, messenger.id()).await.is_err());
    assert!(processor.get_all(&b).await.unwrap().is_empty());

    let other = processor.create(&b, &mut buffer, tx, 0, 1).await.unwrap();
    assert_eq!(other.id(), messenger.id());
}

fn delivery(ctx: &Context, value: Value) -> Delivery {
    delivery_on(COMMAND_TOPIC_MESSENGER, ctx, value)
}

fn delivery_on(topic: &str, ctx: &Context, value: Value) -> Delivery {
    Delivery {
        topic: topic.into(),
        partition: 0,
        offset: 0,
        key: None,
        headers: Headers::from_context(ctx),
        payload: serde_json::to_vec(&value).unwrap(),
    }
}

#[tokio::test]
async fn commands_drive_the_processor() {
    let processor = processor();
    let producer = Arc::new(RecordingProducer::new());
    let ctx = test_context();
    let dispatcher = Dispatcher::new().register(
        COMMAND_TOPIC_MESSENGER,
        Arc::new(CommandHandler::new(processor.clone(), producer.clone())),
    );

    dispatcher
        .dispatch(&delivery(&ctx, json!({"actorId": 5, "worldId": 1, "type": "CREATE"})))
        .await;
    let messenger = processor.get_by_member(&ctx, 5).await.unwrap();
    assert_eq!(messenger.world_id(), 1);

    let handled = dispatcher
        .dispatch(&delivery(
            &ctx,
            json!({"actorId": 6, "type": "JOIN", "body": {"messengerId": messenger.id()}}),
        ))
        .await;
    assert_eq!(handled, 1);
    dispatcher
        .dispatch(&delivery(
            &ctx,
            json!({"actorId": 5, "type": "REQUEST_INVITE", "body": {"characterId": 6}}),
        ))
        .await;
    dispatcher
        .dispatch(&delivery(
            &ctx,
            json!({"actorId": 6, "type": "LEAVE", "body": {"messengerId": messenger.id()}}),
        ))
        .await;

    let kinds: Vec<String> = producer
        .events::<Value>(EVENT_TOPIC_MESSENGER_STATUS)
        .iter()
        .map(|e| e["type"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        kinds,
        vec!["MESSENGER_CREATED", "MESSENGER_JOINED", "MESSENGER_ERROR", "MESSENGER_LEFT"]
    );
}

#[tokio::test]
async fn logout_leaves_the_messenger() {
    let processor = processor();
    let producer = Arc::new(RecordingProducer::new());
    let ctx = test_context();
    let tx = Uuid::new_v4();
    let messenger = processor.create_and_emit(producer.as_ref(), &ctx, tx, 2, 1).await.unwrap();
    processor
        .join_and_emit(producer.as_ref(), &ctx, tx, 2, messenger.id(), 2)
        .await
        .unwrap();
    producer.clear();

    let dispatcher = Dispatcher::new().register(
        EVENT_TOPIC_CHARACTER_STATUS,
        Arc::new(CharacterStatusHandler::new(processor.clone(), producer.clone())),
    );
    let logout_tx = Uuid::new_v4();
    let status = |character_id: u32, kind: &str| {
        delivery_on(
            EVENT_TOPIC_CHARACTER_STATUS,
            &ctx,
            json!({"transactionId": logout_tx, "worldId": 2, "characterId": character_id, "type": kind, "body": {}}),
        )
    };

    assert_eq!(dispatcher.dispatch(&status(2, "LOGIN")).await, 1);
    assert_eq!(processor.get_by_id(&ctx, messenger.id()).await.unwrap().members().len(), 2);

    assert_eq!(dispatcher.dispatch(&status(2, "LOGOUT")).await, 1);
    assert!(processor.get_by_member(&ctx, 2).await.is_err());
    assert_eq!(processor.get_by_id(&ctx, messenger.id()).await.unwrap().members().len(), 1);

    // duplicate logout finds no messenger
    assert_eq!(dispatcher.dispatch(&status(2, "LOGOUT")).await, 1);

    assert_eq!(dispatcher.dispatch(&status(1, "LOGOUT")).await, 1);
    assert!(processor.get_by_id(&ctx, messenger.id()).await.is_err());

    let events = producer.events::<Value>(EVENT_TOPIC_MESSENGER_STATUS);
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e["type"] == "MESSENGER_LEFT"));
    assert_eq!(events[0]["transactionId"], json!(logout_tx));
    assert_eq!(events[0]["actorId"], 2);
    assert_eq!(events[0]["worldId"], 2);
}

proptest! {
    #[test]
    fn slots_stay_unique_under_any_sequence(
        ops in proptest::collection::vec((any::<bool>(), 1u32..8), 1..40)
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let processor = processor();
            let ctx = test_context();
            let tx = Uuid::new_v4();
            let mut buffer = MessageBuffer::new();
            let id = processor.create(&ctx, &mut buffer, tx, 0, 100).await.unwrap().id();

            for (join, character) in ops {
                let _ = if join {
                    processor.join(&ctx, &mut buffer, tx, id, character).await
                } else {
                    processor.leave(&ctx, &mut buffer, tx, id, character).await
                };
                let current = processor.get_by_id(&ctx, id).await.unwrap();
                prop_assert!(current.members().len() <= CAPACITY);
                let slots: HashSet<u8> = current.members().iter().map(|m| m.slot).collect();
                prop_assert_eq!(slots.len(), current.members().len());
                prop_assert!(slots.iter().all(|s| usize::from(*s) < CAPACITY));
            }
            Ok(())
        })?;
    }
}
