//! End-to-end smoke tests for the full roomstated stack.
//!
//! Each test wires the complete application (in-memory state store, static
//! settings, TOML definitions, real event bus, real rule engine) and drives it
//! through the bus the way the daemon does, under paused time.

use std::sync::Arc;
use std::time::Duration;

use roomstate_adapter_memory::{
    InMemoryStateStore, RecordingActionSink, StaticSettings, TomlDefinitionSource,
};
use roomstate_app::clock::MonotonicClock;
use roomstate_app::event_bus::InProcessEventBus;
use roomstate_app::ports::EventPublisher;
use roomstate_app::rule_engine::{EngineConfig, RuleEngine};
use roomstate_domain::cooldown::ActionDirection;
use roomstate_domain::entity::EntitySnapshot;
use roomstate_domain::event::StateChange;
use roomstate_domain::id::{AreaId, EntityId};

const DEFINITIONS: &str = r#"
    [[areas]]
    id = "hall"
    name = "Hallway"

    [[catalog.activities]]
    id = "movement"
    timeout = 10
    transition_to = "leaving"

    [[catalog.activities.detection]]
    type = "predicate"
    target = { domain = "binary_sensor", subcategory = "motion" }
    test = "active"

    [[catalog.activities]]
    id = "leaving"
    is_transition_state = true
    timeout = 2
    transition_to = "empty"

    [[apps]]
    id = "lights"
    name = "Lights"

    [apps.action_sets.movement]
    actions = [{ service = "light.turn_on", data = { brightness = 80 } }]

    [apps.action_sets.empty]
    actions = [{ service = "light.turn_off" }]

    [assignments.hall]
    app_id = "lights"
"#;

struct Stack {
    store: Arc<InMemoryStateStore>,
    settings: Arc<StaticSettings>,
    sink: Arc<RecordingActionSink>,
    bus: Arc<InProcessEventBus>,
    engine: RuleEngine<Arc<RecordingActionSink>>,
}

fn entity(id: &str, device_class: Option<&str>, state: &str) -> EntitySnapshot {
    let mut builder = EntitySnapshot::builder()
        .entity_id(id)
        .area_id("hall")
        .state(state);
    if let Some(class) = device_class {
        builder = builder.device_class(class);
    }
    builder.build().unwrap()
}

/// Build a fully-wired engine fed by an in-process bus.
fn stack() -> Stack {
    let store = Arc::new(InMemoryStateStore::new());
    store.upsert(entity("binary_sensor.hall_motion", Some("motion"), "off"));
    store.upsert(entity("light.hall", None, "off"));
    let settings = Arc::new(StaticSettings::new());
    let sink = Arc::new(RecordingActionSink::new());
    let bus = Arc::new(InProcessEventBus::new(64));
    let engine = RuleEngine::new(
        EngineConfig::default(),
        store.clone(),
        settings.clone(),
        sink.clone(),
        bus.clone(),
        Arc::new(MonotonicClock::new()),
    );
    let definitions = TomlDefinitionSource::new("definitions.toml")
        .parse(DEFINITIONS)
        .unwrap();
    engine.load(definitions).unwrap();
    Stack {
        store,
        settings,
        sink,
        bus,
        engine,
    }
}

impl Stack {
    async fn report(&self, id: &str, state: &str) {
        let change = StateChange::new(id, state);
        assert!(self.store.apply(&change));
        self.bus.publish(change).await.unwrap();
    }
}

async fn advance(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

// ---------------------------------------------------------------------------
// Activity lifecycle
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn should_turn_lights_on_and_off_with_movement() {
    let s = stack();
    let handle = s.engine.start(s.bus.subscribe());
    let hall = AreaId::new("hall");

    s.report("binary_sensor.hall_motion", "on").await;
    advance(3).await;
    assert_eq!(s.engine.activity(&hall).as_str(), "movement");

    s.report("binary_sensor.hall_motion", "off").await;
    advance(3).await;
    assert_eq!(s.engine.activity(&hall).as_str(), "movement");

    advance(10).await;
    assert_eq!(s.engine.activity(&hall).as_str(), "leaving");

    // Leaving the transition state skips the activity-enter cooldown.
    advance(3).await;
    assert_eq!(s.engine.activity(&hall).as_str(), "empty");

    let requests = s.sink.requests();
    let services: Vec<&str> = requests
        .iter()
        .map(|r| r.actions[0].service.as_str())
        .collect();
    assert_eq!(services, vec!["light.turn_on", "light.turn_off"]);
    assert_eq!(requests[0].actions[0].entity_ids, vec![EntityId::new("light.hall")]);
    assert_eq!(requests[0].actions[0].data["brightness"], 80);
    assert!(requests.iter().all(|r| r.direction == ActionDirection::Enter));

    s.engine.stop();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn should_track_activity_without_dispatch_when_area_disabled() {
    let s = stack();
    let handle = s.engine.start(s.bus.subscribe());
    let hall = AreaId::new("hall");
    s.settings.set_automation_enabled(&hall, false);

    s.report("binary_sensor.hall_motion", "on").await;
    advance(3).await;

    assert_eq!(s.engine.activity(&hall).as_str(), "movement");
    assert!(s.sink.requests().is_empty());

    s.engine.stop();
    handle.await.unwrap();
}

// ---------------------------------------------------------------------------
// Observers
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn should_publish_area_updates_on_bus() {
    let s = stack();
    let mut updates = s.bus.subscribe_updates();
    let handle = s.engine.start(s.bus.subscribe());

    s.report("binary_sensor.hall_motion", "on").await;
    advance(3).await;

    assert_eq!(updates.try_recv().unwrap(), AreaId::new("hall"));
    let stats = s.engine.statistics();
    assert_eq!(stats.events_received, 1);
    assert_eq!(stats.dispatches, 1);

    s.engine.stop();
    handle.await.unwrap();
}
