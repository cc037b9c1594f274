//! Integration tests for the end-to-end scenarios seeded in spec.md §8
//! (S1–S6), run against the real `Orchestrator` wiring rather than a single
//! module in isolation.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use etl_core::cluster::{ClusterImpl, Config, EtReceiver, EtSender, TlReceiver, TlSender};
use etl_core::database::{DatabaseBackend, InMemoryDatabase};
use etl_core::helper::Helper;
use etl_core::orchestrator::Orchestrator;
use etl_core::supervisor::Response;
use etl_shared::config::NodeConfig;
use etl_shared::messages::{DataType, ProvisionerAction, ProvisionerRequest};

struct RecordingEcho {
    loaded: Arc<Mutex<Vec<serde_json::Value>>>,
}
impl ClusterImpl for RecordingEcho {
    fn extract(&self, out: EtSender, _: &Helper) {
        for i in [1, 2, 3] {
            out.push(serde_json::json!(i)).unwrap();
        }
    }
    fn transform(&self, input: EtReceiver, out: TlSender, _: &Helper) {
        while let Ok(v) = input.pull() {
            out.push(v).unwrap();
        }
    }
    fn load(&self, input: TlReceiver, _: &Helper) {
        while let Ok(v) = input.pull() {
            self.loaded.lock().unwrap().push(v);
        }
    }
}

struct Echo;
impl ClusterImpl for Echo {
    fn extract(&self, out: EtSender, _: &Helper) {
        for i in [1, 2, 3] {
            out.push(serde_json::json!(i)).unwrap();
        }
    }
    fn transform(&self, input: EtReceiver, out: TlSender, _: &Helper) {
        while let Ok(v) = input.pull() {
            out.push(v).unwrap();
        }
    }
    fn load(&self, input: TlReceiver, _: &Helper) {
        while input.pull().is_ok() {}
    }
}

struct SlowTransform;
impl ClusterImpl for SlowTransform {
    fn extract(&self, out: EtSender, _: &Helper) {
        for i in 0..100 {
            out.push(serde_json::json!(i)).unwrap();
        }
    }
    fn transform(&self, input: EtReceiver, out: TlSender, _: &Helper) {
        while let Ok(v) = input.pull() {
            std::thread::sleep(Duration::from_millis(5));
            out.push(v).unwrap();
        }
    }
    fn load(&self, input: TlReceiver, _: &Helper) {
        while input.pull().is_ok() {}
    }
}

struct Panicky;
impl ClusterImpl for Panicky {
    fn extract(&self, out: EtSender, _: &Helper) {
        out.push(serde_json::json!(1)).unwrap();
    }
    fn transform(&self, input: EtReceiver, _out: TlSender, _: &Helper) {
        let _ = input.pull();
        panic!("boom");
    }
    fn load(&self, input: TlReceiver, _: &Helper) {
        while input.pull().is_ok() {}
    }
}

struct CacheRoundTrip {
    first_load: Arc<Mutex<Option<serde_json::Value>>>,
    post_expiry_miss: Arc<Mutex<Option<bool>>>,
}
impl ClusterImpl for CacheRoundTrip {
    fn extract(&self, out: EtSender, helper: &Helper) {
        let id = helper
            .save_to_cache_with_expiry(serde_json::json!("payload"), Duration::from_millis(50))
            .unwrap();
        let loaded = helper.load_from_cache(id).unwrap();
        *self.first_load.lock().unwrap() = Some(loaded);

        std::thread::sleep(Duration::from_millis(200));
        let post = helper.load_from_cache(id);
        *self.post_expiry_miss.lock().unwrap() = Some(post.is_err());

        drop(out);
    }
    fn transform(&self, input: EtReceiver, out: TlSender, _: &Helper) {
        while let Ok(v) = input.pull() {
            out.push(v).unwrap();
        }
    }
    fn load(&self, input: TlReceiver, _: &Helper) {
        while input.pull().is_ok() {}
    }
}

fn build_orchestrator() -> (Arc<Orchestrator>, Arc<InMemoryDatabase>) {
    let config = NodeConfig::new("test-node");
    let database = Arc::new(InMemoryDatabase::new());
    let orchestrator = Arc::new(Orchestrator::new(
        config,
        Arc::clone(&database) as Arc<dyn DatabaseBackend>,
    ));
    (orchestrator, database)
}

async fn mount_and_provision(orchestrator: &Orchestrator, cluster: &str, nonce: u32) {
    orchestrator
        .handles()
        .provisioner_requests
        .send(ProvisionerRequest {
            action: ProvisionerAction::Mount,
            nonce: 0,
            cluster: cluster.to_string(),
        })
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    orchestrator
        .handles()
        .provisioner_requests
        .send(ProvisionerRequest {
            action: ProvisionerAction::Provision,
            nonce,
            cluster: cluster.to_string(),
        })
        .unwrap();
}

/// Polls `InMemoryDatabase` for the `statistics` record a finished
/// supervisor run stores (see `services::provisioner_thread`), up to 10s.
async fn await_stats(database: &InMemoryDatabase, cluster: &str) -> Response {
    let data_type = DataType::new("statistics");
    for _ in 0..200 {
        if let Ok(Some(value)) = database.get(&data_type, cluster).await {
            return serde_json::from_value(value).expect("stored statistics should deserialize");
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("timed out waiting for '{cluster}' statistics to be stored");
}

#[tokio::test]
async fn s1_one_shot_etl_delivers_messages_in_order() {
    let (orchestrator, database) = build_orchestrator();
    let loaded = Arc::new(Mutex::new(Vec::new()));
    orchestrator.register_cluster(
        "echo",
        Arc::new(RecordingEcho {
            loaded: Arc::clone(&loaded),
        }),
        None,
    );

    mount_and_provision(&orchestrator, "echo", 1).await;

    let response = await_stats(&database, "echo").await;
    assert!(!response.panicked);
    assert_eq!(response.stats.num_provisioned_extract_routines, 1);
    assert_eq!(
        *loaded.lock().unwrap(),
        vec![serde_json::json!(1), serde_json::json!(2), serde_json::json!(3)]
    );
}

#[tokio::test]
async fn s3_unmounted_provision_is_rejected() {
    let (orchestrator, _database) = build_orchestrator();
    orchestrator.register_cluster("x", Arc::new(Echo), None);
    let mut responses = orchestrator.handles().take_provisioner_responses();

    orchestrator
        .handles()
        .provisioner_requests
        .send(ProvisionerRequest {
            action: ProvisionerAction::Provision,
            nonce: 1,
            cluster: "x".to_string(),
        })
        .unwrap();

    let response = tokio::time::timeout(Duration::from_secs(2), responses.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(!response.success);
    assert!(response.supervisor_id.is_none());
}

#[tokio::test]
async fn s4_panic_in_transform_does_not_affect_other_clusters() {
    let (orchestrator, database) = build_orchestrator();
    orchestrator.register_cluster("panicky", Arc::new(Panicky), None);
    orchestrator.register_cluster("echo", Arc::new(Echo), None);

    mount_and_provision(&orchestrator, "panicky", 1).await;
    mount_and_provision(&orchestrator, "echo", 2).await;

    let panicky_response = await_stats(&database, "panicky").await;
    assert!(panicky_response.panicked);

    let echo_response = await_stats(&database, "echo").await;
    assert!(!echo_response.panicked);
}

#[tokio::test]
async fn s2_congestion_triggers_scale_out() {
    let (orchestrator, database) = build_orchestrator();
    let config = Config {
        identifier: "slow".to_string(),
        start_with_n_transform_clusters: 1,
        start_with_n_load_clusters: 1,
        et_channel_threshold: 5,
        et_channel_growth_factor: 2,
        tl_channel_threshold: 10,
        tl_channel_growth_factor: 2,
    };
    orchestrator.register_cluster("slow", Arc::new(SlowTransform), Some(config));

    mount_and_provision(&orchestrator, "slow", 1).await;

    // Fast extraction against a slow single transform worker should breach
    // the ET threshold well within a couple of watcher ticks and scale out.
    let response = await_stats(&database, "slow").await;
    assert!(!response.panicked);
    assert!(response.stats.num_et_threshold_breaches >= 1);
    assert!(response.stats.num_provisioned_transform_routines >= 2);
}

#[tokio::test]
async fn s5_cache_round_trip_then_expiry_miss() {
    let (orchestrator, database) = build_orchestrator();
    let first_load = Arc::new(Mutex::new(None));
    let post_expiry_miss = Arc::new(Mutex::new(None));
    orchestrator.register_cluster(
        "cache-rt",
        Arc::new(CacheRoundTrip {
            first_load: Arc::clone(&first_load),
            post_expiry_miss: Arc::clone(&post_expiry_miss),
        }),
        None,
    );

    mount_and_provision(&orchestrator, "cache-rt", 1).await;

    let response = await_stats(&database, "cache-rt").await;
    assert!(!response.panicked);
    assert_eq!(*first_load.lock().unwrap(), Some(serde_json::json!("payload")));
    assert_eq!(*post_expiry_miss.lock().unwrap(), Some(true));
}

#[tokio::test]
async fn s6_orderly_shutdown_lets_in_flight_supervisors_finish() {
    let (orchestrator, database) = build_orchestrator();
    orchestrator.register_cluster("echo", Arc::new(Echo), None);
    mount_and_provision(&orchestrator, "echo", 1).await;

    let interrupts = orchestrator.handles().interrupts.clone();
    let orchestrator_for_run = Arc::clone(&orchestrator);
    let run = tokio::spawn(async move { orchestrator_for_run.run().await });

    tokio::time::sleep(Duration::from_millis(20)).await;
    interrupts
        .send(etl_shared::messages::InterruptEvent::Shutdown)
        .unwrap();

    tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("orderly shutdown should complete well within the hard-terminate bound")
        .unwrap();

    // Teardown waits for in-flight supervisors to drain before returning, so
    // the echo cluster's statistics record must already be present.
    let data_type = DataType::new("statistics");
    let stored = database.get(&data_type, "echo").await.unwrap();
    assert!(stored.is_some());
}
