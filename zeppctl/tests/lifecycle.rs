//! End-to-end lifecycle walk: install, configure/start, notebook sync,
//! upstream change, release — against a stubbed daemon and a fake init
//! system.

mod common;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::{Route, StubDaemon};
use flate2::Compression;
use flate2::write::GzEncoder;
use serde_json::json;
use zeppctl::{
    Ack, DistArtifact, DistLayout, Event, InitSystem, LifecycleController, NotebookRequest,
    PollConfig, PortExposure, ProcessController, ProcessProbe, ResourceFetcher, SparkSettings,
    StateStore, Status, ZeppResult, ZeppelinApi,
};

/// Build a minimal distribution tarball with the usual nested top dir.
fn make_dist_tarball(dir: &Path) -> PathBuf {
    let path = dir.join("zeppelin-0.7.0.tar.gz");
    let file = std::fs::File::create(&path).unwrap();
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::fast()));

    let mut add = |name: &str, content: &str| {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder
            .append_data(&mut header, name, content.as_bytes())
            .unwrap();
    };
    add("zeppelin-0.7.0/bin/zeppelin-daemon.sh", "#!/bin/sh\n");
    add("zeppelin-0.7.0/conf/zeppelin-env.sh.template", "# defaults\n");
    add(
        "zeppelin-0.7.0/conf/zeppelin-site.xml.template",
        "<?xml version=\"1.0\"?>\n<configuration>\n  <property>\n    <name>zeppelin.server.port</name>\n    <value>8080</value>\n  </property>\n</configuration>\n",
    );
    add(
        "zeppelin-0.7.0/notebook/2A94M5J1Z/note.json",
        "{\"name\": \"bundled tutorial\"}\n",
    );
    builder.into_inner().unwrap().finish().unwrap();
    path
}

/// Fake init system: records actions and drives the shared liveness flag.
struct FakeInit {
    alive: Arc<AtomicBool>,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl InitSystem for FakeInit {
    async fn start(&self, _unit: &str) -> ZeppResult<()> {
        self.log.lock().unwrap().push("start".to_string());
        self.alive.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self, _unit: &str) -> ZeppResult<()> {
        self.log.lock().unwrap().push("stop".to_string());
        self.alive.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn enable(&self, _unit: &str) -> ZeppResult<()> {
        self.log.lock().unwrap().push("enable".to_string());
        Ok(())
    }
}

struct FlagProbe {
    alive: Arc<AtomicBool>,
}

impl ProcessProbe for FlagProbe {
    fn daemon_pid(&self) -> Option<u32> {
        self.alive.load(Ordering::SeqCst).then_some(4242)
    }
}

/// Port exposure recorder.
#[derive(Default)]
struct RecordingPorts {
    log: Mutex<Vec<String>>,
}

impl PortExposure for RecordingPorts {
    fn open_port(&self, port: u16) {
        self.log.lock().unwrap().push(format!("open {port}"));
    }

    fn close_port(&self, port: u16) {
        self.log.lock().unwrap().push(format!("close {port}"));
    }
}

struct Harness {
    controller: LifecycleController,
    init_log: Arc<Mutex<Vec<String>>>,
    ports: Arc<RecordingPorts>,
    layout: DistLayout,
    _tmp: tempfile::TempDir,
}

/// Wire a controller against the stub daemon. The stub's own port doubles
/// as the daemon port, so the readiness poll's TCP connect succeeds as soon
/// as the fake init "starts" the process.
async fn harness(stub: &StubDaemon) -> Harness {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("deploy");
    std::fs::create_dir_all(&root).unwrap();

    let layout = DistLayout::new(root, stub.port)
        .with_system_env_file(tmp.path().join("environment"))
        .with_unit_file(tmp.path().join("zeppelin.service"));
    std::fs::write(layout.system_env_file(), "PATH=\"/usr/bin:/bin\"\n").unwrap();

    let tarball = make_dist_tarball(tmp.path());
    let fetcher = ResourceFetcher::new(Some(DistArtifact::Attached(tarball)), layout.cache_dir());
    let store = StateStore::open(&layout.state_db_path()).unwrap();

    let alive = Arc::new(AtomicBool::new(false));
    let init_log: Arc<Mutex<Vec<String>>> = Arc::default();
    let init = Arc::new(FakeInit {
        alive: alive.clone(),
        log: init_log.clone(),
    });
    let probe = Arc::new(FlagProbe { alive });
    let process = ProcessController::new(layout.unit_name(), stub.port, init, probe)
        .with_poll_config(PollConfig {
            start_interval: Duration::from_millis(5),
            start_ceiling: Duration::from_millis(500),
            stop_interval: Duration::from_millis(5),
            stop_ceiling: Duration::from_millis(500),
        });

    let tutorial = tmp.path().join("hdfs-tutorial");
    std::fs::create_dir_all(&tutorial).unwrap();
    std::fs::write(tutorial.join("note.json"), "{\"name\": \"hdfs\"}\n").unwrap();

    let ports = Arc::new(RecordingPorts::default());
    let ports_handle = ports.clone();

    struct SharedPorts(Arc<RecordingPorts>);
    impl PortExposure for SharedPorts {
        fn open_port(&self, port: u16) {
            self.0.open_port(port);
        }
        fn close_port(&self, port: u16) {
            self.0.close_port(port);
        }
    }

    let controller = LifecycleController::new(
        layout.clone(),
        store,
        fetcher,
        process,
        ZeppelinApi::with_base(&stub.base_url),
    )
    .with_ports(Box::new(SharedPorts(ports_handle)))
    .with_tutorial_sets(vec![tutorial]);

    Harness {
        controller,
        init_log,
        ports,
        layout,
        _tmp: tmp,
    }
}

fn daemon_routes() -> Vec<Route> {
    vec![
        Route::new(
            "POST",
            "/api/notebook",
            201,
            json!({"status": "CREATED", "body": "2A94M5J1Z"}).to_string(),
        ),
        Route::new("DELETE", "/api/notebook/", 200, "{}"),
        Route::new(
            "GET",
            "/api/interpreter/setting",
            200,
            json!({
                "body": [{
                    "id": "2ANGGHHMQ",
                    "name": "spark",
                    "properties": {"master": "local[*]"},
                    "options": {},
                    "interpreterGroup": []
                }]
            })
            .to_string(),
        ),
        Route::new("PUT", "/api/interpreter/setting/", 200, "{}"),
    ]
}

#[tokio::test]
async fn relation_status_before_install() {
    let stub = StubDaemon::spawn(daemon_routes()).await;
    let h = harness(&stub).await;

    let outcome = h.controller.handle(Event::UpstreamAbsent).await.unwrap();
    assert!(matches!(outcome.status, Status::Blocked(_)));

    let outcome = h.controller.handle(Event::UpstreamWaiting).await.unwrap();
    assert!(matches!(outcome.status, Status::Waiting(_)));
}

#[tokio::test]
async fn upstream_ready_installs_without_starting() {
    let stub = StubDaemon::spawn(daemon_routes()).await;
    let h = harness(&stub).await;

    let outcome = h
        .controller
        .handle(Event::UpstreamReady(SparkSettings::default()))
        .await
        .unwrap();

    assert!(matches!(outcome.status, Status::Maintenance(_)));
    let state = h.controller.store().snapshot().unwrap();
    assert!(state.installed);
    assert!(!state.started);
    // install must not touch the init system
    assert!(h.init_log.lock().unwrap().is_empty());
    // distribution and default config are in place
    assert!(h.layout.home_dir().join("bin/zeppelin-daemon.sh").is_file());
    assert!(h.layout.env_file().is_file());
}

#[tokio::test]
async fn second_ready_event_configures_and_starts() {
    let stub = StubDaemon::spawn(daemon_routes()).await;
    let h = harness(&stub).await;

    h.controller
        .handle(Event::UpstreamReady(SparkSettings::default()))
        .await
        .unwrap();
    let outcome = h
        .controller
        .handle(Event::UpstreamReady(SparkSettings {
            master: "spark://leader:7077".to_string(),
            ..Default::default()
        }))
        .await
        .unwrap();

    assert_eq!(outcome.status, Status::Active("ready".to_string()));
    let state = h.controller.store().snapshot().unwrap();
    assert!(state.installed && state.started);

    assert_eq!(
        h.init_log.lock().unwrap().clone(),
        vec!["enable".to_string(), "start".to_string()]
    );
    assert_eq!(
        h.ports.log.lock().unwrap().clone(),
        vec![format!("open {}", stub.port)]
    );

    // configure left its trace: master in the env script, port in the site
    let env = std::fs::read_to_string(h.layout.env_file()).unwrap();
    assert!(env.contains("export MASTER=spark://leader:7077"));
    let site = std::fs::read_to_string(h.layout.site_file()).unwrap();
    assert!(site.contains(&stub.port.to_string()));

    // unit rendered, tutorial store linked
    assert!(h.layout.unit_file().is_file());
    assert!(
        h.layout
            .dist_notebook_dir()
            .symlink_metadata()
            .unwrap()
            .file_type()
            .is_symlink()
    );
    assert!(
        h.layout
            .notebooks_dir()
            .join("hdfs-tutorial/note.json")
            .is_file()
    );
}

async fn bring_up(h: &Harness) {
    h.controller
        .handle(Event::UpstreamReady(SparkSettings::default()))
        .await
        .unwrap();
    h.controller
        .handle(Event::UpstreamReady(SparkSettings::default()))
        .await
        .unwrap();
}

#[tokio::test]
async fn notebook_round_trip_empties_id_map() {
    let stub = StubDaemon::spawn(daemon_routes()).await;
    let h = harness(&stub).await;
    bring_up(&h).await;

    let outcome = h
        .controller
        .handle(Event::RegisterNotebooks(vec![NotebookRequest {
            key: "hash-1".to_string(),
            content: "{\"name\": \"mine\"}".to_string(),
        }]))
        .await
        .unwrap();
    assert_eq!(
        outcome.acks,
        vec![Ack::Accepted {
            key: "hash-1".to_string(),
            daemon_id: Some("2A94M5J1Z".to_string()),
        }]
    );
    assert_eq!(h.controller.store().notebook_count().unwrap(), 1);

    let outcome = h
        .controller
        .handle(Event::RemoveNotebooks(vec!["hash-1".to_string()]))
        .await
        .unwrap();
    assert!(matches!(outcome.acks[0], Ack::Accepted { .. }));
    assert_eq!(h.controller.store().notebook_count().unwrap(), 0);

    let deletes = stub.requests_matching("DELETE", "/api/notebook/2A94M5J1Z");
    assert_eq!(deletes.len(), 1);
}

#[tokio::test]
async fn removing_unknown_notebook_is_silent_skip() {
    let stub = StubDaemon::spawn(daemon_routes()).await;
    let h = harness(&stub).await;
    bring_up(&h).await;

    let outcome = h
        .controller
        .handle(Event::RemoveNotebooks(vec!["never-imported".to_string()]))
        .await
        .unwrap();

    assert_eq!(
        outcome.acks,
        vec![Ack::Accepted {
            key: "never-imported".to_string(),
            daemon_id: None,
        }]
    );
    // no DELETE went out
    assert!(stub.requests_matching("DELETE", "/api/notebook").is_empty());
}

#[tokio::test]
async fn notebook_requests_rejected_while_stopped() {
    let stub = StubDaemon::spawn(daemon_routes()).await;
    let h = harness(&stub).await;

    let outcome = h
        .controller
        .handle(Event::RegisterNotebooks(vec![NotebookRequest {
            key: "hash-1".to_string(),
            content: "{}".to_string(),
        }]))
        .await
        .unwrap();

    assert!(matches!(outcome.status, Status::Waiting(_)));
    assert!(matches!(outcome.acks[0], Ack::Rejected { .. }));
    assert!(stub.requests().is_empty());
}

#[tokio::test]
async fn upstream_change_updates_interpreter_and_restarts() {
    let stub = StubDaemon::spawn(daemon_routes()).await;
    let h = harness(&stub).await;
    bring_up(&h).await;

    let outcome = h
        .controller
        .handle(Event::UpstreamChanged(SparkSettings {
            master: "spark://new-leader:7077".to_string(),
            ..Default::default()
        }))
        .await
        .unwrap();
    assert_eq!(outcome.status, Status::Active("ready".to_string()));

    let puts = stub.requests_matching("PUT", "/api/interpreter/setting/2ANGGHHMQ");
    assert_eq!(puts.len(), 1);
    let sent: serde_json::Value = serde_json::from_str(&puts[0].body).unwrap();
    assert_eq!(sent["properties"]["master"], "spark://new-leader:7077");

    // restart is stop-then-start after the initial enable/start
    assert_eq!(
        h.init_log.lock().unwrap().clone(),
        vec!["enable", "start", "stop", "start"]
    );
}

#[tokio::test]
async fn reconfigure_cycle_does_not_duplicate_env_exports() {
    let stub = StubDaemon::spawn(daemon_routes()).await;
    let h = harness(&stub).await;
    bring_up(&h).await;

    h.controller.handle(Event::UpstreamLost).await.unwrap();
    h.controller
        .handle(Event::UpstreamReady(SparkSettings {
            master: "spark://leader:7077".to_string(),
            ..Default::default()
        }))
        .await
        .unwrap();

    // Each configure starts from the template defaults, so the env script
    // holds exactly one export block.
    let env = std::fs::read_to_string(h.layout.env_file()).unwrap();
    assert_eq!(env.matches("export MASTER=").count(), 1);
    assert!(env.contains("export MASTER=spark://leader:7077"));

    // The notebook store survives the cycle.
    assert!(
        h.layout
            .notebooks_dir()
            .join("hdfs-tutorial/note.json")
            .is_file()
    );
}

#[tokio::test]
async fn upstream_loss_releases_ports_and_stops() {
    let stub = StubDaemon::spawn(daemon_routes()).await;
    let h = harness(&stub).await;
    bring_up(&h).await;

    let outcome = h.controller.handle(Event::UpstreamLost).await.unwrap();
    assert!(matches!(outcome.status, Status::Waiting(_)));

    let state = h.controller.store().snapshot().unwrap();
    assert!(state.installed, "install survives upstream loss");
    assert!(!state.started);

    assert_eq!(
        h.ports.log.lock().unwrap().clone(),
        vec![
            format!("open {}", stub.port),
            format!("close {}", stub.port)
        ]
    );
    assert_eq!(
        h.init_log.lock().unwrap().clone(),
        vec!["enable", "start", "stop"]
    );
}
