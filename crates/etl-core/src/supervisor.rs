//! # Supervisor
//!
//! Runs one E/T/L cluster instance; autoscales via channel congestion
//! (spec.md §4.2). Workers are native `std::thread`s — the "thread mesh" is
//! literal here, since `ManagedChannel::push`/`pull` are blocking calls.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::channel::ManagedChannel;
use crate::cluster::{ClusterImpl, Config, Message};
use crate::helper::Helper;
use crate::stats::{Statistics, StatisticsSnapshot};
use crate::wait_group::WaitGroup;

/// Default interval at which the runtime watcher checks for congestion.
pub const DEFAULT_MONITOR_REFRESH: Duration = Duration::from_secs(1);

/// A supervisor's lifecycle status (spec.md §4.2 transition table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    UnTouched,
    Running,
    Provisioning,
    Failed,
    Terminated,
}

/// Events that drive the [`Status`] state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Startup,
    StartProvision,
    EndProvision,
    Error,
    TearedDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Extract,
    Transform,
    Load,
}

/// Aggregated outcome of one full `Start()` ETL cycle.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Response {
    pub config: Config,
    pub stats: StatisticsSnapshot,
    pub elapsed: Duration,
    pub panicked: bool,
}

/// Runs one `ClusterImpl` instance under an adaptive worker pool.
pub struct Supervisor {
    id: AtomicU64,
    cluster_impl: Arc<dyn ClusterImpl>,
    config: Config,
    stats: Arc<Statistics>,
    et_channel: Arc<ManagedChannel<Message>>,
    tl_channel: Arc<ManagedChannel<Message>>,
    wait_group: WaitGroup,
    /// Tracks only Transform workers, separately from `wait_group` (which
    /// also counts Load). The TL channel's producer side must seal the
    /// moment every Transform worker has exited — not when the whole
    /// pipeline finishes, since Load workers block on TL until it does
    /// (spec.md §9's channel-close-ownership rule).
    transform_group: WaitGroup,
    status: Mutex<Status>,
    start_time: Mutex<Option<Instant>>,
    panicked: Arc<AtomicBool>,
    helper: Helper,
    monitor_refresh: Duration,
}

impl Supervisor {
    #[must_use]
    pub fn new(cluster_impl: Arc<dyn ClusterImpl>, config: Config, helper: Helper) -> Arc<Self> {
        let et_channel = Arc::new(ManagedChannel::new(
            config.et_channel_threshold,
            config.et_channel_growth_factor,
        ));
        let tl_channel = Arc::new(ManagedChannel::new(
            config.tl_channel_threshold,
            config.tl_channel_growth_factor,
        ));

        Arc::new(Self {
            id: AtomicU64::new(0),
            cluster_impl,
            config,
            stats: Arc::new(Statistics::new()),
            et_channel,
            tl_channel,
            wait_group: WaitGroup::new(),
            transform_group: WaitGroup::new(),
            status: Mutex::new(Status::UnTouched),
            start_time: Mutex::new(None),
            panicked: Arc::new(AtomicBool::new(false)),
            helper,
            monitor_refresh: DEFAULT_MONITOR_REFRESH,
        })
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id.load(Ordering::SeqCst)
    }

    /// Called exactly once by the owning [`crate::registry::Registry`] right
    /// after `CreateSupervisor`.
    pub fn assign_id(&self, id: u64) {
        self.id.store(id, Ordering::SeqCst);
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn stats(&self) -> &Arc<Statistics> {
        &self.stats
    }

    #[must_use]
    pub fn status(&self) -> Status {
        *self.status.lock().expect("supervisor status mutex poisoned")
    }

    /// Advances the status machine per spec.md §4.2's transition table.
    /// Returns whether the status actually changed.
    pub fn event(&self, event: Event) -> bool {
        let mut status = self.status.lock().expect("supervisor status mutex poisoned");
        let next = match (*status, event) {
            (Status::UnTouched, Event::Startup) => Status::Running,
            (Status::Running, Event::StartProvision) => Status::Provisioning,
            (Status::Running, Event::Error) => Status::Failed,
            (Status::Running, Event::TearedDown) => Status::Terminated,
            (Status::Provisioning, Event::EndProvision) => Status::Running,
            (Status::Provisioning, Event::Error) => Status::Failed,
            _ => return false,
        };
        *status = next;
        true
    }

    /// Blocking call that runs one full ETL cycle: provisions the
    /// configured starting worker counts, launches the runtime watcher, and
    /// waits for every worker to drain before returning a [`Response`].
    pub fn start(self: &Arc<Self>) -> Response {
        self.event(Event::Startup);
        *self.start_time.lock().expect("start_time mutex poisoned") = Some(Instant::now());

        self.provision(Stage::Extract);
        for _ in 0..self.config.start_with_n_transform_clusters {
            self.provision(Stage::Transform);
        }
        for _ in 0..self.config.start_with_n_load_clusters {
            self.provision(Stage::Load);
        }

        // Once every Transform worker provisioned so far (or later, via
        // scale-out) has exited, seal the TL channel's producer side so
        // Load workers learn there is nothing left to drain. This must not
        // wait on the whole-pipeline `wait_group`: Load workers are part of
        // that group too, and they can't exit until TL seals.
        let tl_closer_handle = {
            let supervisor = Arc::clone(self);
            thread::Builder::new()
                .name(format!("etl-tl-closer-{}", self.config.identifier))
                .spawn(move || {
                    supervisor.transform_group.wait();
                    supervisor.tl_channel.seal();
                })
                .expect("failed to spawn tl-channel closer thread")
        };

        let watcher_handle = {
            let supervisor = Arc::clone(self);
            thread::Builder::new()
                .name(format!("etl-watcher-{}", self.config.identifier))
                .spawn(move || supervisor.runtime_watch())
                .expect("failed to spawn runtime watcher thread")
        };

        self.wait_group.wait();
        // The watcher polls the wait group itself and exits on its own once
        // it observes zero; join it so Start() doesn't return while it is
        // still mid-tick.
        let _ = watcher_handle.join();
        let _ = tl_closer_handle.join();

        self.event(Event::TearedDown);

        let elapsed = self
            .start_time
            .lock()
            .expect("start_time mutex poisoned")
            .map(|t| t.elapsed())
            .unwrap_or_default();

        Response {
            config: self.config.clone(),
            stats: self.stats.snapshot(),
            elapsed,
            panicked: self.panicked.load(Ordering::SeqCst),
        }
    }

    /// Spawns one worker for `stage`, tracked by the wait group, with its
    /// panic caught and folded into `self.panicked`. Transform workers are
    /// additionally tracked by `transform_group`, which governs when the TL
    /// channel's producer side seals (see `start`).
    fn provision(self: &Arc<Self>, stage: Stage) {
        self.event(Event::StartProvision);
        self.wait_group.add(1);
        if stage == Stage::Transform {
            self.transform_group.add(1);
        }

        let supervisor = Arc::clone(self);
        let name = format!("etl-{:?}-{}", stage, self.config.identifier);
        let spawn_result = thread::Builder::new().name(name).spawn(move || {
            let cluster_impl = Arc::clone(&supervisor.cluster_impl);
            let helper = supervisor.helper.clone();

            let outcome = match stage {
                Stage::Extract => {
                    supervisor.stats.incr_extract();
                    match supervisor.et_channel.sender_handle() {
                        Some(sender) => {
                            // Extract is provisioned exactly once per run, so
                            // the one mint can be sealed immediately: no
                            // further producer will ever be requested.
                            supervisor.et_channel.seal();
                            std::panic::catch_unwind(AssertUnwindSafe(|| {
                                cluster_impl.extract(sender, &helper);
                            }))
                        }
                        None => {
                            warn!(
                                cluster = %supervisor.config.identifier,
                                "et_channel already sealed; skipping duplicate extract provision"
                            );
                            Ok(())
                        }
                    }
                }
                Stage::Transform => {
                    supervisor.stats.incr_transform();
                    let receiver = supervisor.et_channel.receiver_handle();
                    match supervisor.tl_channel.sender_handle() {
                        Some(sender) => std::panic::catch_unwind(AssertUnwindSafe(|| {
                            cluster_impl.transform(receiver, sender, &helper);
                        })),
                        None => {
                            warn!(
                                cluster = %supervisor.config.identifier,
                                "tl_channel already sealed; skipping transform provision"
                            );
                            Ok(())
                        }
                    }
                }
                Stage::Load => {
                    supervisor.stats.incr_load();
                    let receiver = supervisor.tl_channel.receiver_handle();
                    std::panic::catch_unwind(AssertUnwindSafe(|| {
                        cluster_impl.load(receiver, &helper);
                    }))
                }
            };

            if outcome.is_err() {
                warn!(
                    cluster = %supervisor.config.identifier,
                    stage = ?stage,
                    "worker panicked; marking supervisor response as panicked"
                );
                supervisor.panicked.store(true, Ordering::SeqCst);
            }

            if stage == Stage::Transform {
                supervisor.transform_group.done();
            }
            supervisor.wait_group.done();
        });

        if spawn_result.is_err() {
            // Thread spawn itself failed (resource exhaustion): count the
            // worker as never having started and release its wait-group slot.
            self.panicked.store(true, Ordering::SeqCst);
            if stage == Stage::Transform {
                self.transform_group.done();
            }
            self.wait_group.done();
        }

        self.event(Event::EndProvision);
    }

    /// Polls channel congestion every `monitor_refresh` and multiplicatively
    /// provisions additional workers; exits once the wait group reaches
    /// zero (spec.md §9's fix for the original's unbounded watcher).
    fn runtime_watch(self: Arc<Self>) {
        loop {
            if self.wait_group.count() == 0 {
                break;
            }

            if self.et_channel.is_congested() {
                self.stats.incr_et_breach();
                let k = self.stats.num_provisioned_transform_routines.load(Ordering::SeqCst);
                debug!(cluster = %self.config.identifier, additional = k, "ET channel congested, scaling transform workers");
                for _ in 0..k {
                    self.provision(Stage::Transform);
                }
            }

            if self.tl_channel.is_congested() {
                self.stats.incr_tl_breach();
                let k = self.stats.num_provisioned_load_routines.load(Ordering::SeqCst);
                debug!(cluster = %self.config.identifier, additional = k, "TL channel congested, scaling load workers");
                for _ in 0..k {
                    self.provision(Stage::Load);
                }
            }

            thread::sleep(self.monitor_refresh);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{EtReceiver, EtSender, TlReceiver, TlSender};
    use tokio::sync::mpsc;

    fn test_helper() -> Helper {
        let (cache_tx, _cache_rx) = mpsc::unbounded_channel();
        let (msg_tx, _msg_rx) = mpsc::unbounded_channel();
        let table = Arc::new(crate::response_table::ResponseTable::new());
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let handle = runtime.handle().clone();
        std::mem::forget(runtime); // keep the runtime alive for the test's duration
        Helper::new("test", cache_tx, table, msg_tx, handle, false)
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

    #[test]
    fn event_transitions_follow_the_spec_table() {
        let sup = Supervisor::new(Arc::new(Echo), Config::defaults("echo"), test_helper());
        assert_eq!(sup.status(), Status::UnTouched);
        assert!(sup.event(Event::Startup));
        assert_eq!(sup.status(), Status::Running);
        assert!(!sup.event(Event::Startup)); // no transition defined from Running
        assert!(sup.event(Event::StartProvision));
        assert_eq!(sup.status(), Status::Provisioning);
        assert!(sup.event(Event::EndProvision));
        assert_eq!(sup.status(), Status::Running);
        assert!(sup.event(Event::TearedDown));
        assert_eq!(sup.status(), Status::Terminated);
        assert!(!sup.event(Event::Startup)); // terminal: no transitions out
    }

    #[test]
    fn one_shot_etl_delivers_messages_in_order() {
        let sup = Supervisor::new(Arc::new(Echo), Config::defaults("echo"), test_helper());
        let response = sup.start();
        assert!(!response.panicked);
        assert_eq!(response.stats.num_provisioned_extract_routines, 1);
    }

    #[test]
    fn panic_in_transform_sets_panicked_flag() {
        let sup = Supervisor::new(Arc::new(Panicky), Config::defaults("panicky"), test_helper());
        let response = sup.start();
        assert!(response.panicked);
    }
}
