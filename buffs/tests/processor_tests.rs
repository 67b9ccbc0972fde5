//! Buff processor and expiration sweep against the in-memory backend.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use atlas_buffs::events::{
    ApplyBody, COMMAND_TOPIC_CHARACTER, COMMAND_TOPIC_CHARACTER_BUFF, EVENT_TOPIC_CHARACTER_BUFF_STATUS,
};
use atlas_buffs::{
    BuffProcessor, CommandHandler, ExpirationSweep, HOLY_SHIELD, POISON, POISON_TICK, PoisonSweep, Poisoned,
    StatChange, poison_registry, registry,
};
use atlas_core::consumer::{Delivery, Dispatcher};
use atlas_core::environment::Clock;
use atlas_core::envelope::Headers;
use atlas_core::registry::MemoryBackend;
use atlas_core::{Error, MessageBuffer};
use atlas_runtime::sweep::run_once;
use atlas_testing::{ManualClock, RecordingProducer, test_clock, test_context};
use chrono::Duration;
use serde_json::{Value, json};
use std::sync::Arc;

const HOLY_SHIELD_SKILL: i32 = 2_311_003;

fn processor(clock: &ManualClock) -> BuffProcessor {
    BuffProcessor::new(registry(Arc::new(MemoryBackend::new())), Arc::new(clock.clone()))
}

fn request(source_id: i32, duration: i32, kind: &str) -> ApplyBody {
    ApplyBody {
        from_id: 1,
        source_id,
        level: 1,
        duration,
        changes: vec![StatChange::new(kind, 1)],
    }
}

fn poison(source_id: i32, duration: i32, amount: i32) -> ApplyBody {
    ApplyBody {
        from_id: 1,
        source_id,
        level: 1,
        duration,
        changes: vec![StatChange::new(POISON, amount)],
    }
}

#[tokio::test]
async fn holy_shield_blocks_disease() {
    let clock = ManualClock::new(test_clock().now());
    let processor = processor(&clock);
    let producer = RecordingProducer::new();
    let ctx = test_context();

    processor
        .apply_and_emit(&producer, &ctx, 0, 1, 7, request(HOLY_SHIELD_SKILL, 60, HOLY_SHIELD))
        .await
        .unwrap();
    producer.clear();

    let outcome = processor
        .apply_and_emit(&producer, &ctx, 0, 1, 7, request(100, 10, "STUN"))
        .await
        .unwrap();

    assert!(outcome.is_none());
    let character = processor.get(&ctx, 7).await.unwrap();
    let sources: Vec<i32> = character.buffs().map(|b| b.source_id()).collect();
    assert_eq!(sources, vec![HOLY_SHIELD_SKILL]);
    assert!(producer.is_empty());
}

#[tokio::test]
async fn disease_lands_once_shield_expires() {
    let clock = ManualClock::new(test_clock().now());
    let processor = processor(&clock);
    let ctx = test_context();
    let mut buffer = MessageBuffer::new();

    processor
        .apply(&ctx, &mut buffer, 0, 1, 7, request(HOLY_SHIELD_SKILL, 60, HOLY_SHIELD))
        .await
        .unwrap();
    clock.advance(Duration::seconds(61));

    let applied = processor
        .apply(&ctx, &mut buffer, 0, 1, 7, request(100, 10, "POISON"))
        .await
        .unwrap();
    assert!(applied.is_some());
    assert_eq!(buffer.staged(EVENT_TOPIC_CHARACTER_BUFF_STATUS), 2);
}

#[tokio::test]
async fn reapplying_replaces_and_reports() {
    let clock = ManualClock::new(test_clock().now());
    let processor = processor(&clock);
    let producer = RecordingProducer::new();
    let ctx = test_context();

    processor
        .apply_and_emit(&producer, &ctx, 0, 1, 7, request(5, 10, "SPEED"))
        .await
        .unwrap();
    processor
        .apply_and_emit(&producer, &ctx, 0, 2, 7, request(5, 90, "SPEED"))
        .await
        .unwrap();

    let character = processor.get(&ctx, 7).await.unwrap();
    assert_eq!(character.buffs().count(), 1);
    assert_eq!(character.buff(5).unwrap().duration(), 90);
    assert_eq!(character.channel_id(), 2);

    let events = producer.events::<Value>(EVENT_TOPIC_CHARACTER_BUFF_STATUS);
    assert_eq!(events.len(), 2);
    assert_eq!(events[1]["type"], "BUFF_APPLIED");
    assert_eq!(events[1]["body"]["duration"], 90);
    assert_eq!(producer.records()[0].key(), Some(7));
}

#[tokio::test]
async fn cancel_reports_expiry_and_rejects_unknown_source() {
    let clock = ManualClock::new(test_clock().now());
    let processor = processor(&clock);
    let ctx = test_context();
    let mut buffer = MessageBuffer::new();

    processor.apply(&ctx, &mut buffer, 0, 1, 7, request(5, 10, "SPEED")).await.unwrap();
    processor.apply(&ctx, &mut buffer, 0, 1, 7, request(6, 10, "JUMP")).await.unwrap();

    let cancelled = processor.cancel(&ctx, &mut buffer, 7, 5).await.unwrap();
    assert_eq!(cancelled.source_id(), 5);
    assert!(matches!(
        processor.cancel(&ctx, &mut buffer, 7, 5).await,
        Err(Error::NotFound { .. })
    ));
    assert!(processor.get(&ctx, 7).await.unwrap().buff(6).is_some());

    let all = processor.cancel_all(&ctx, &mut buffer, 7).await.unwrap();
    assert_eq!(all.len(), 1);
    assert!(processor.cancel_all(&ctx, &mut buffer, 99).await.unwrap().is_empty());
    assert_eq!(processor.get(&ctx, 7).await.unwrap().buffs().count(), 0);
}

#[tokio::test]
async fn sweep_expires_across_tenants() {
    let clock = ManualClock::new(test_clock().now());
    let processor = processor(&clock);
    let producer = Arc::new(RecordingProducer::new());
    let (a, b) = (test_context(), test_context());

    let mut buffer = MessageBuffer::new();
    processor.apply(&a, &mut buffer, 0, 1, 7, request(5, 10, "SPEED")).await.unwrap();
    processor.apply(&a, &mut buffer, 0, 1, 7, request(6, 600, "JUMP")).await.unwrap();
    processor.apply(&b, &mut buffer, 0, 1, 8, request(5, 10, "SPEED")).await.unwrap();

    let sweep = ExpirationSweep::new(processor.clone(), producer.clone(), std::time::Duration::from_secs(1));
    assert_eq!(run_once(&sweep).await, Some(0));

    clock.advance(Duration::seconds(11));
    assert_eq!(run_once(&sweep).await, Some(2));

    assert!(processor.get(&a, 7).await.unwrap().buff(6).is_some());
    assert_eq!(processor.get(&b, 8).await.unwrap().buffs().count(), 0);
    let events = producer.events::<Value>(EVENT_TOPIC_CHARACTER_BUFF_STATUS);
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e["type"] == "BUFF_EXPIRED"));
}

#[tokio::test]
async fn buffs_are_tenant_scoped() {
    let clock = ManualClock::new(test_clock().now());
    let processor = processor(&clock);
    let (a, b) = (test_context(), test_context());
    let mut buffer = MessageBuffer::new();

    processor.apply(&a, &mut buffer, 0, 1, 7, request(5, 10, "SPEED")).await.unwrap();
    assert!(matches!(processor.get(&b, 7).await, Err(Error::NotFound { .. })));
}

#[tokio::test]
async fn commands_drive_the_processor() {
    let clock = ManualClock::new(test_clock().now());
    let processor = processor(&clock);
    let producer = Arc::new(RecordingProducer::new());
    let ctx = test_context();
    let dispatcher = Dispatcher::new().register(
        COMMAND_TOPIC_CHARACTER_BUFF,
        Arc::new(CommandHandler::new(processor.clone(), producer.clone())),
    );
    let delivery = |value: Value| Delivery {
        topic: COMMAND_TOPIC_CHARACTER_BUFF.into(),
        partition: 0,
        offset: 0,
        key: None,
        headers: Headers::from_context(&ctx),
        payload: serde_json::to_vec(&value).unwrap(),
    };

    dispatcher
        .dispatch(&delivery(json!({
            "worldId": 0, "channelId": 1, "characterId": 7, "type": "APPLY",
            "body": {"fromId": 7, "sourceId": 5, "level": 1, "duration": 30,
                     "changes": [{"type": "SPEED", "amount": 20}]}
        })))
        .await;
    dispatcher
        .dispatch(&delivery(json!({"characterId": 7, "type": "CANCEL", "body": {"sourceId": 5}})))
        .await;
    // duplicate cancel is a no-op
    let handled = dispatcher
        .dispatch(&delivery(json!({"characterId": 7, "type": "CANCEL", "body": {"sourceId": 5}})))
        .await;
    assert_eq!(handled, 1);

    let kinds: Vec<String> = producer
        .events::<Value>(EVENT_TOPIC_CHARACTER_BUFF_STATUS)
        .iter()
        .map(|e| e["type"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(kinds, vec!["BUFF_APPLIED", "BUFF_EXPIRED"]);
}

#[tokio::test]
async fn poisoned_lists_only_active_poison() {
    let clock = ManualClock::new(test_clock().now());
    let processor = processor(&clock);
    let ctx = test_context();
    let mut buffer = MessageBuffer::new();

    processor.apply(&ctx, &mut buffer, 0, 1, 7, poison(100, 10, 25)).await.unwrap();
    processor.apply(&ctx, &mut buffer, 0, 2, 8, request(5, 10, "SPEED")).await.unwrap();

    assert_eq!(
        processor.poisoned(&ctx).await.unwrap(),
        vec![Poisoned {
            world_id: 0,
            channel_id: 1,
            character_id: 7,
            amount: 25,
        }]
    );
    clock.advance(Duration::seconds(11));
    assert!(processor.poisoned(&ctx).await.unwrap().is_empty());
}

#[tokio::test]
async fn poison_damages_once_per_tick() {
    let clock = ManualClock::new(test_clock().now());
    let processor = processor(&clock);
    let ctx = test_context();
    let mut buffer = MessageBuffer::new();
    processor.apply(&ctx, &mut buffer, 0, 1, 7, poison(100, 30, 25)).await.unwrap();

    // first sighting starts the clock
    let mut buffer = MessageBuffer::new();
    assert_eq!(processor.tick_poison(&ctx, &mut buffer).await.unwrap(), 0);
    let started = processor.last_poison_tick(&ctx, 7).await.unwrap();
    assert_eq!(started, Some(clock.now()));

    clock.advance(Duration::milliseconds(500));
    assert_eq!(processor.tick_poison(&ctx, &mut buffer).await.unwrap(), 0);
    assert_eq!(processor.last_poison_tick(&ctx, 7).await.unwrap(), started);

    clock.advance(POISON_TICK);
    assert_eq!(processor.tick_poison(&ctx, &mut buffer).await.unwrap(), 1);
    assert_eq!(buffer.staged(COMMAND_TOPIC_CHARACTER), 1);
    assert_eq!(processor.last_poison_tick(&ctx, 7).await.unwrap(), Some(clock.now()));
}

#[tokio::test]
async fn poison_tick_clears_when_poison_ends() {
    let clock = ManualClock::new(test_clock().now());
    let processor = processor(&clock);
    let ctx = test_context();
    let mut buffer = MessageBuffer::new();

    processor.apply(&ctx, &mut buffer, 0, 1, 7, poison(100, 10, 25)).await.unwrap();
    processor.apply(&ctx, &mut buffer, 0, 1, 8, poison(100, 60, 25)).await.unwrap();
    processor.tick_poison(&ctx, &mut buffer).await.unwrap();
    assert!(processor.last_poison_tick(&ctx, 7).await.unwrap().is_some());

    clock.advance(Duration::seconds(11));
    processor.expire(&ctx, &mut buffer).await.unwrap();
    assert!(processor.last_poison_tick(&ctx, 7).await.unwrap().is_none());
    assert!(processor.last_poison_tick(&ctx, 8).await.unwrap().is_some());

    processor.cancel(&ctx, &mut buffer, 8, 100).await.unwrap();
    assert!(processor.last_poison_tick(&ctx, 8).await.unwrap().is_none());
}

#[tokio::test]
async fn poison_tick_survives_unrelated_cancel() {
    let clock = ManualClock::new(test_clock().now());
    let processor = processor(&clock);
    let ctx = test_context();
    let mut buffer = MessageBuffer::new();

    processor.apply(&ctx, &mut buffer, 0, 1, 7, poison(100, 60, 25)).await.unwrap();
    processor.apply(&ctx, &mut buffer, 0, 1, 7, request(5, 60, "SPEED")).await.unwrap();
    processor.tick_poison(&ctx, &mut buffer).await.unwrap();

    processor.cancel(&ctx, &mut buffer, 7, 5).await.unwrap();
    assert!(processor.last_poison_tick(&ctx, 7).await.unwrap().is_some());

    processor.cancel_all(&ctx, &mut buffer, 7).await.unwrap();
    assert!(processor.last_poison_tick(&ctx, 7).await.unwrap().is_none());
}

#[tokio::test]
async fn poison_ticks_are_tenant_scoped() {
    let clock = ManualClock::new(test_clock().now());
    let processor = processor(&clock);
    let (a, b) = (test_context(), test_context());

    processor.update_poison_tick(&a, 7, clock.now()).await.unwrap();
    assert!(processor.last_poison_tick(&b, 7).await.unwrap().is_none());
    processor.clear_poison_tick(&b, 7).await.unwrap();
    assert!(processor.last_poison_tick(&a, 7).await.unwrap().is_some());
    processor.clear_poison_tick(&a, 7).await.unwrap();
    assert!(processor.last_poison_tick(&a, 7).await.unwrap().is_none());
}

#[tokio::test]
async fn poison_sweep_sends_hp_commands() {
    let clock = ManualClock::new(test_clock().now());
    let backend = Arc::new(MemoryBackend::new());
    let processor = BuffProcessor::new(registry(backend.clone()), Arc::new(clock.clone()))
        .with_poison_ticks(poison_registry(backend));
    let producer = Arc::new(RecordingProducer::new());
    let (a, b) = (test_context(), test_context());

    let mut buffer = MessageBuffer::new();
    processor.apply(&a, &mut buffer, 3, 1, 7, poison(100, 30, 40)).await.unwrap();
    processor.apply(&b, &mut buffer, 3, 2, 8, poison(100, 30, 70_000)).await.unwrap();

    let sweep = PoisonSweep::new(processor.clone(), producer.clone(), std::time::Duration::from_secs(1));
    assert_eq!(run_once(&sweep).await, Some(0));
    clock.advance(POISON_TICK);
    assert_eq!(run_once(&sweep).await, Some(2));

    let mut commands = producer.events::<Value>(COMMAND_TOPIC_CHARACTER);
    commands.sort_by_key(|c| c["characterId"].as_u64());
    assert_eq!(commands.len(), 2);
    assert_eq!(commands[0]["type"], "CHANGE_HP");
    assert_eq!(commands[0]["worldId"], 3);
    assert_eq!(commands[0]["body"], json!({"channelId": 1, "amount": -40}));
    assert_eq!(commands[1]["body"]["amount"], i64::from(-i16::MAX));
    assert_ne!(commands[0]["transactionId"], commands[1]["transactionId"]);
}
