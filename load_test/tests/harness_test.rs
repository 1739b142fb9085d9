use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use load_test::harness::Harness;
use load_test::metrics::collector::{MetricsCollector, SESSION_LENGTH};
use moleculer_engine::events::{SPAWN_RESPONSE_TIME, STOP_RESPONSE_TIME};
use moleculer_engine::runtime::{Broker, BrokerRunner, RunnerFactory, RuntimeError};
use moleculer_engine::script::ScriptParser;

struct FakeFactory {
    fail_start: bool,
}

impl RunnerFactory for FakeFactory {
    fn create(&self) -> Box<dyn BrokerRunner> {
        Box::new(FakeRunner {
            fail_start: self.fail_start,
        })
    }
}

struct FakeRunner {
    fail_start: bool,
}

#[async_trait]
impl BrokerRunner for FakeRunner {
    async fn start(
        &mut self,
        _argv: Vec<String>,
        _node_id: &str,
    ) -> Result<Box<dyn Broker>, RuntimeError> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        if self.fail_start {
            return Err(RuntimeError::Other("no transporter".to_string()));
        }
        Ok(Box::new(FakeBroker))
    }
}

struct FakeBroker;

#[async_trait]
impl Broker for FakeBroker {
    async fn stop(&mut self) -> Result<(), RuntimeError> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(())
    }
}

const SCRIPT: &str = r#"
config:
  phases:
    - name: ramp
      duration: 2
      arrivalRate: 3
    - duration: 1
      arrivalRate: 1
scenarios:
  - name: spawn-stop
    flow:
      - spawn:
          name: vu
      - think: 1
      - stop: true
"#;

#[tokio::test(start_paused = true)]
async fn test_phases_launch_expected_users() {
    let script = ScriptParser::parse_yaml(SCRIPT).expect("script should parse");
    let collector = MetricsCollector::new();
    let harness = Harness::new(
        &script,
        Arc::new(FakeFactory { fail_start: false }),
        collector.clone(),
    )
    .expect("harness");

    harness.run().await.expect("run should finish");

    let snapshot = collector.get_snapshot();
    assert_eq!(snapshot.users.launched, 7);
    assert_eq!(snapshot.users.completed, 7);
    assert_eq!(snapshot.users.failed, 0);
    assert_eq!(snapshot.users.in_flight, 0);
    assert_eq!(snapshot.engine.started, 7);
    assert_eq!(snapshot.engine.error_count(), 0);

    let spawn = collector
        .get_latency_percentiles(SPAWN_RESPONSE_TIME)
        .expect("spawn histogram");
    assert_eq!(spawn.count, 7);
    assert!(spawn.min >= 50);

    let stop = collector
        .get_latency_percentiles(STOP_RESPONSE_TIME)
        .expect("stop histogram");
    assert_eq!(stop.count, 7);

    let sessions = collector
        .get_latency_percentiles(SESSION_LENGTH)
        .expect("session histogram");
    assert!(sessions.min >= 1000);
}

#[tokio::test(start_paused = true)]
async fn test_failed_spawns_are_counted() {
    let script = ScriptParser::parse_yaml(SCRIPT).expect("script should parse");
    let collector = MetricsCollector::new();
    let harness = Harness::new(
        &script,
        Arc::new(FakeFactory { fail_start: true }),
        collector.clone(),
    )
    .expect("harness");

    harness.run().await.expect("run should finish");

    let snapshot = collector.get_snapshot();
    assert_eq!(snapshot.users.launched, 7);
    assert_eq!(snapshot.users.failed, 7);
    assert_eq!(snapshot.users.completed, 0);
    assert_eq!(snapshot.engine.error_count(), 7);
    assert!(collector
        .get_latency_percentiles(SPAWN_RESPONSE_TIME)
        .is_none());
    assert!(collector
        .get_latency_percentiles(STOP_RESPONSE_TIME)
        .is_none());
}

#[tokio::test(start_paused = true)]
async fn test_script_without_phases_runs_one_user() {
    let script = ScriptParser::parse_yaml(
        "scenarios:\n  - flow:\n      - spawn: true\n      - stop: true\n",
    )
    .expect("script should parse");
    let collector = MetricsCollector::new();
    let harness = Harness::new(
        &script,
        Arc::new(FakeFactory { fail_start: false }),
        collector.clone(),
    )
    .expect("harness");

    let names: Vec<_> = harness
        .scenarios()
        .map(|(weight, scenario)| (weight, scenario.name().to_string()))
        .collect();
    assert_eq!(names, vec![(1, "scenario-1".to_string())]);

    harness.run().await.expect("run should finish");

    let snapshot = collector.get_snapshot();
    assert_eq!(snapshot.users.launched, 1);
    assert_eq!(snapshot.users.completed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_weights_near_u32_max_run() {
    let script = ScriptParser::parse_yaml(
        r#"
config:
  phases:
    - duration: 2
      arrivalRate: 2
scenarios:
  - name: heavy
    weight: 4294967295
    flow:
      - spawn: true
      - stop: true
  - name: light
    weight: 1
    flow:
      - log: "light"
"#,
    )
    .expect("script should parse");
    let collector = MetricsCollector::new();
    let harness = Harness::new(
        &script,
        Arc::new(FakeFactory { fail_start: false }),
        collector.clone(),
    )
    .expect("harness");

    harness.run().await.expect("run should finish");

    let snapshot = collector.get_snapshot();
    assert_eq!(snapshot.users.launched, 4);
    assert_eq!(snapshot.users.completed, 4);
}
