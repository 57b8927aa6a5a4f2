use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use tabletop_core::{
    Cost, Encounter, EntityId, GameConfig, GridMap, MapDimensions, Position, TerrainCell,
    TerrainKind, Token, TokenId, TokenKind, TurnKind,
};
use tabletop_runtime::{
    CommitBatch, ErrorKind, FileSessionStore, InMemorySessionStore, InitiativeParticipant,
    Notification, RepositoryError, Runtime, RuntimeConfig, SessionRepository, StoredSession, Topic,
};

const HERO: EntityId = EntityId(1);
const HERO_TOKEN: TokenId = TokenId(1);
const DM: EntityId = EntityId(100);
const DM_TOKEN: TokenId = TokenId(2);

fn encounter() -> Encounter {
    let map = GridMap::filled(
        MapDimensions::new(10, 10),
        TerrainCell::new(TerrainKind::Grass),
    )
    .unwrap();
    let mut encounter = Encounter::new(map, &GameConfig::default());
    encounter
        .place_token(Token::new(HERO_TOKEN, TokenKind::Player, Position::ORIGIN).with_entity(HERO))
        .unwrap();
    encounter
        .place_token(Token::new(DM_TOKEN, TokenKind::Npc, Position::new(9, 9)).with_entity(DM))
        .unwrap();
    encounter.set_speed(HERO, Cost::squares(5));
    encounter
}

fn seeded_config() -> RuntimeConfig {
    RuntimeConfig {
        initiative_seed: Some(7),
        ..RuntimeConfig::default()
    }
}

/// In-memory store whose next commit can be made to fail.
#[derive(Default)]
struct FlakyStore {
    inner: InMemorySessionStore,
    fail_next: AtomicBool,
}

#[async_trait]
impl SessionRepository for FlakyStore {
    async fn commit(&self, batch: &CommitBatch) -> tabletop_runtime::repository::Result<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(RepositoryError::Io(std::io::Error::other("disk unavailable")));
        }
        self.inner.commit(batch).await
    }

    async fn load(&self) -> tabletop_runtime::repository::Result<Option<StoredSession>> {
        self.inner.load().await
    }
}

#[tokio::test]
async fn over_budget_move_is_rejected_until_overridden() {
    let runtime = Runtime::builder()
        .encounter(encounter())
        .build()
        .await
        .unwrap();
    let handle = runtime.handle();

    let err = handle
        .move_token(HERO_TOKEN, Position::new(6, 0), false)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientBudget);

    let snapshot = handle.refresh().await.unwrap();
    assert_eq!(snapshot.encounter.budget(HERO).used, Cost::ZERO);
    assert_eq!(
        snapshot.encounter.token(HERO_TOKEN).unwrap().position,
        Position::ORIGIN
    );

    let outcome = handle
        .move_token(HERO_TOKEN, Position::new(6, 0), true)
        .await
        .unwrap();
    assert_eq!(outcome.cost, Cost::squares(6));
    assert_eq!(outcome.budget.unwrap().used, Cost::squares(6));
    assert!(outcome.budget.unwrap().is_exceeded());
    assert_eq!(outcome.token.position, Position::new(6, 0));
    assert_eq!(outcome.token.metadata.path.len(), 7);

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn validation_does_not_mutate() {
    let runtime = Runtime::builder()
        .encounter(encounter())
        .build()
        .await
        .unwrap();
    let handle = runtime.handle();
    let before = handle.refresh().await.unwrap();

    let validation = handle
        .validate_movement(HERO_TOKEN, Position::ORIGIN, Position::new(2, 2))
        .await
        .unwrap();
    assert!(validation.valid);
    assert_eq!(validation.cost, Some(Cost::squares(4)));
    assert_eq!(validation.remaining_budget, Cost::squares(5));

    let after = handle.refresh().await.unwrap();
    assert_eq!(before, after);
    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn failed_commit_leaves_state_untouched() {
    let store = Arc::new(FlakyStore::default());
    let runtime = Runtime::builder()
        .encounter(encounter())
        .repository(store.clone())
        .build()
        .await
        .unwrap();
    let handle = runtime.handle();
    let before = handle.refresh().await.unwrap();
    let mut tokens = handle.subscribe(Topic::Token);

    store.fail_next.store(true, Ordering::SeqCst);
    let err = handle
        .move_token(HERO_TOKEN, Position::new(2, 0), false)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);

    let after = handle.refresh().await.unwrap();
    assert_eq!(before.digest().unwrap(), after.digest().unwrap());
    assert!(tokens.try_recv().is_err());

    let persisted = store.load().await.unwrap().unwrap();
    assert_eq!(persisted.revision, before.revision);

    handle
        .move_token(HERO_TOKEN, Position::new(2, 0), false)
        .await
        .unwrap();
    let persisted = store
        .load()
        .await
        .unwrap()
        .unwrap()
        .into_encounter(&GameConfig::default())
        .unwrap();
    assert_eq!(persisted.token(HERO_TOKEN).unwrap().position, Position::new(2, 0));
    assert_eq!(persisted.budget(HERO).used, Cost::squares(2));

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn interrupted_turn_resumes_with_its_budget() {
    let runtime = Runtime::builder()
        .encounter(encounter())
        .build()
        .await
        .unwrap();
    let handle = runtime.handle();

    let original = handle.start_turn(TurnKind::Player, HERO).await.unwrap();
    handle
        .move_token(HERO_TOKEN, Position::new(2, 0), false)
        .await
        .unwrap();

    let paused = handle.interrupt_turn().await.unwrap();
    assert_eq!(paused.record, original);
    assert_eq!(handle.active_turn().await.unwrap(), None);

    let reaction = handle.start_turn(TurnKind::Dm, DM).await.unwrap();
    assert!(reaction.turn_number > original.turn_number);
    handle.end_turn().await.unwrap();

    let resumed = handle.resume_turn().await.unwrap();
    assert_eq!(resumed, original);
    assert_eq!(handle.active_turn().await.unwrap(), Some(original));

    let snapshot = handle.refresh().await.unwrap();
    assert_eq!(snapshot.encounter.budget(HERO).used, Cost::squares(2));
    assert!(snapshot.paused_turns().is_empty());

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn invalid_transitions_are_reported() {
    let runtime = Runtime::builder()
        .encounter(encounter())
        .build()
        .await
        .unwrap();
    let handle = runtime.handle();

    let err = handle.resume_turn().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    assert_eq!(err.error_code(), "TURN_INVALID_TRANSITION");

    handle.start_turn(TurnKind::Player, HERO).await.unwrap();
    let err = handle.start_turn(TurnKind::Npc, DM).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn stale_version_is_a_concurrent_modification() {
    let runtime = Runtime::builder()
        .encounter(encounter())
        .build()
        .await
        .unwrap();
    let handle = runtime.handle();
    let seen = handle
        .refresh()
        .await
        .unwrap()
        .encounter
        .token(HERO_TOKEN)
        .unwrap()
        .version;

    handle
        .move_token_expecting(HERO_TOKEN, Position::new(1, 0), false, seen)
        .await
        .unwrap();
    let err = handle
        .move_token_expecting(HERO_TOKEN, Position::new(2, 0), false, seen)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConcurrentModification);

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn confirmed_moves_are_broadcast() {
    let runtime = Runtime::builder()
        .encounter(encounter())
        .build()
        .await
        .unwrap();
    let handle = runtime.handle();
    let mut tokens = handle.subscribe(Topic::Token);
    let mut budgets = handle.subscribe(Topic::Budget);

    let outcome = handle
        .move_token(HERO_TOKEN, Position::new(0, 3), false)
        .await
        .unwrap();

    match tokens.recv().await.unwrap() {
        Notification::TokenMoved { token, revision } => {
            assert_eq!(token.position, Position::new(0, 3));
            assert_eq!(revision, outcome.revision);
        }
        other => panic!("unexpected notification: {other:?}"),
    }
    match budgets.recv().await.unwrap() {
        Notification::BudgetUpdated { actor, budget, .. } => {
            assert_eq!(actor, HERO);
            assert_eq!(budget.used, Cost::squares(3));
        }
        other => panic!("unexpected notification: {other:?}"),
    }

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn refresh_is_idempotent() {
    let runtime = Runtime::builder()
        .encounter(encounter())
        .build()
        .await
        .unwrap();
    let handle = runtime.handle();
    handle
        .move_token(HERO_TOKEN, Position::new(1, 1), false)
        .await
        .unwrap();

    let first = handle.refresh().await.unwrap();
    let second = handle.refresh().await.unwrap();
    assert_eq!(first.to_bytes().unwrap(), second.to_bytes().unwrap());
    assert_eq!(first.digest().unwrap(), second.digest().unwrap());

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn seeded_initiative_drives_next_turn() {
    let runtime = Runtime::builder()
        .config(seeded_config())
        .encounter(encounter())
        .build()
        .await
        .unwrap();
    let handle = runtime.handle();

    let order = handle
        .roll_initiative(vec![
            InitiativeParticipant {
                entity_id: HERO,
                kind: TurnKind::Player,
                modifier: 2,
            },
            InitiativeParticipant {
                entity_id: DM,
                kind: TurnKind::Npc,
                modifier: 0,
            },
        ])
        .await
        .unwrap();
    assert_eq!(order.len(), 2);
    let entries = order.entries();
    assert!(entries[0].total >= entries[1].total);

    let first = handle.next_turn().await.unwrap();
    assert_eq!(first.entity_id, entries[0].entity_id);
    let second = handle.next_turn().await.unwrap();
    assert_eq!(second.entity_id, entries[1].entity_id);
    let wrapped = handle.next_turn().await.unwrap();
    assert_eq!(wrapped.entity_id, entries[0].entity_id);

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn tokens_can_be_placed_and_removed() {
    let runtime = Runtime::builder()
        .encounter(encounter())
        .build()
        .await
        .unwrap();
    let handle = runtime.handle();

    let crate_token = Token::new(TokenId(50), TokenKind::Object, Position::new(4, 4))
        .with_label("Supply crate");
    handle.place_token(crate_token.clone()).await.unwrap();
    let err = handle.place_token(crate_token).await.unwrap_err();
    assert_eq!(err.error_code(), "MAP_DUPLICATE_TOKEN");

    let err = handle
        .move_token(TokenId(50), Position::new(4, 5), false)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "MOVE_NO_ACTOR");

    let removed = handle.remove_token(TokenId(50)).await.unwrap();
    assert_eq!(removed.label, "Supply crate");
    assert!(handle.refresh().await.unwrap().encounter.token(TokenId(50)).is_none());

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn file_backed_session_recovers_after_restart() {
    let dir = tempfile::tempdir().unwrap();

    let digest = {
        let store = Arc::new(FileSessionStore::new(dir.path()).unwrap());
        let runtime = Runtime::builder()
            .encounter(encounter())
            .repository(store)
            .build()
            .await
            .unwrap();
        let handle = runtime.handle();
        handle.start_turn(TurnKind::Player, HERO).await.unwrap();
        handle
            .move_token(HERO_TOKEN, Position::new(3, 0), false)
            .await
            .unwrap();
        let digest = handle.refresh().await.unwrap().digest().unwrap();
        runtime.shutdown().await.unwrap();
        digest
    };

    let store = Arc::new(FileSessionStore::new(dir.path()).unwrap());
    let runtime = Runtime::builder().repository(store).build().await.unwrap();
    let snapshot = runtime.handle().refresh().await.unwrap();
    assert_eq!(snapshot.digest().unwrap(), digest);
    assert_eq!(
        snapshot.encounter.token(HERO_TOKEN).unwrap().position,
        Position::new(3, 0)
    );
    assert_eq!(snapshot.active_turn().unwrap().entity_id, HERO);

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn building_without_encounter_or_session_fails() {
    let result = Runtime::builder().build().await;
    assert!(matches!(
        result.map(|_| ()).unwrap_err().kind(),
        ErrorKind::Validation
    ));
}
