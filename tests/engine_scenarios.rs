//! End-to-end scenarios driving the engine against a mock HTTP backend.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use credcheck::checker::pipeline::{run_pipeline, PipelineContext};
use credcheck::checker::types::{CheckConfig, HttpMethod, Task};
use credcheck::combo::Combo;
use credcheck::config::{EngineConfig, OutputFormat};
use credcheck::proxy::{ProxyRegistry, Scheme, Strategy};
use credcheck::transport::HttpTransport;
use credcheck::Engine;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn login_config(name: &str, url: String) -> CheckConfig {
    CheckConfig {
        name: Arc::from(name),
        method: HttpMethod::Post,
        url_template: url,
        header_templates: HashMap::new(),
        body_fields: HashMap::from([
            ("username".to_string(), "{USER}".to_string()),
            ("password".to_string(), "{PASS}".to_string()),
        ]),
        success_statuses: HashSet::from([200]),
        failure_statuses: HashSet::from([401]),
        success_markers: vec![],
        failure_markers: vec![],
        requires_proxy: false,
        may_use_proxy: false,
        capture_steps: vec![],
    }
}

async fn run_engine_with(
    config: EngineConfig,
    combos: Vec<&str>,
    configs: Vec<CheckConfig>,
    proxies: Vec<(String, u16, Scheme)>,
) -> credcheck::checker::types::Stats {
    // Scenarios don't exercise the status API; skip binding a real port.
    let config = EngineConfig {
        management_enabled: false,
        ..config
    };
    let mut engine = Engine::new(config).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let combo_file = dir.path().join("combos.txt");
    tokio::fs::write(&combo_file, combos.join("\n")).await.unwrap();
    engine.load_combos(&combo_file).await.unwrap();
    engine.load_configs(configs);
    for (host, port, scheme) in proxies {
        engine.add_proxy(host, port, scheme).await;
    }

    engine.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;
    engine.stop().await;
    engine.stats().await
}

/// Scenario: a basic combo succeeds against a 200 response and another
/// fails against a 401, classified purely by status.
#[tokio::test]
async fn basic_success_and_failure_classification() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(|req: &wiremock::Request| {
            let body = String::from_utf8_lossy(&req.body);
            if body.contains("password=good") {
                ResponseTemplate::new(200)
            } else {
                ResponseTemplate::new(401)
            }
        })
        .mount(&server)
        .await;

    let config = EngineConfig {
        max_workers: 4,
        ..EngineConfig::default()
    };
    let configs = vec![login_config("site", format!("{}/login", server.uri()))];

    let stats = run_engine_with(
        config,
        vec!["alice:good", "bob:bad"],
        configs,
        vec![],
    )
    .await;

    assert_eq!(stats.valid, 1);
    assert_eq!(stats.invalid, 1);
    assert_eq!(stats.errors, 0);
}

/// Scenario: a config that requires a proxy, with no proxies registered,
/// drops every task instead of running without one.
#[tokio::test]
async fn requires_proxy_with_empty_registry_drops_tasks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let mut config = login_config("site", format!("{}/login", server.uri()));
    config.requires_proxy = true;

    let engine_config = EngineConfig {
        max_workers: 4,
        ..EngineConfig::default()
    };

    let stats = run_engine_with(engine_config, vec!["alice:good"], vec![config], vec![]).await;

    assert_eq!(stats.total_processed(), 0);
}

/// Scenario: retry_count = 3 recovers after two consecutive transport
/// timeouts, finishing with a success on the third attempt.
#[tokio::test]
async fn retries_past_two_timeouts_then_succeeds() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200))
        .with_priority(2)
        .mount(&server)
        .await;

    let transport = Arc::new(HttpTransport::new().unwrap());
    let registry = Arc::new(ProxyRegistry::new());
    let ctx = PipelineContext {
        transport,
        registry,
        strategy: Strategy::BestScore,
        request_timeout: Duration::from_millis(200),
        retry_count: 3,
    };

    let config = Arc::new(login_config("site", format!("{}/login", server.uri())));
    let task = Task {
        task_id: 1,
        combo: Combo::parse("alice:good").unwrap(),
        config,
        assigned_proxy: None,
    };

    let result = run_pipeline(&ctx, task).await;
    assert_eq!(result.status, credcheck::checker::types::AttemptStatus::Success);
}

/// Scenario: repeated timeouts against a proxy degrade its score until it
/// is marked dead, independent of any successful direct attempt.
#[tokio::test]
async fn repeated_timeouts_degrade_proxy_to_dead() {
    let registry = Arc::new(ProxyRegistry::new());
    let handle = registry
        .add("127.0.0.1".to_string(), 1, Scheme::Http, None, None, None)
        .await
        .unwrap();

    let transport = Arc::new(HttpTransport::new().unwrap());
    let ctx = PipelineContext {
        transport,
        registry: registry.clone(),
        strategy: Strategy::BestScore,
        request_timeout: Duration::from_millis(200),
        retry_count: 1,
    };

    let config = Arc::new(login_config("site", "http://127.0.0.1:9/login".to_string()));

    for i in 0..10 {
        let task = Task {
            task_id: i,
            combo: Combo::parse("alice:good").unwrap(),
            config: config.clone(),
            assigned_proxy: Some(handle),
        };
        let result = run_pipeline(&ctx, task).await;
        assert_eq!(result.status, credcheck::checker::types::AttemptStatus::Error);
    }

    let snapshot = registry.snapshot().await;
    let view = snapshot.iter().find(|p| p.handle == handle).unwrap();
    assert_eq!(view.quality, credcheck::proxy::Quality::Dead);
}

/// Scenario: 1000 combos against one config with a 50-worker pool all
/// complete and are classified.
#[tokio::test]
async fn throughput_1000_combos_single_config() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let combos: Vec<String> = (0..1000).map(|i| format!("user{i}:pw{i}")).collect();
    let combo_refs: Vec<&str> = combos.iter().map(String::as_str).collect();

    let config = EngineConfig {
        max_workers: 50,
        output_format: OutputFormat::Txt,
        ..EngineConfig::default()
    };
    let configs = vec![login_config("site", format!("{}/login", server.uri()))];

    let mut engine = Engine::new(config).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let combo_file = dir.path().join("combos.txt");
    tokio::fs::write(&combo_file, combo_refs.join("\n")).await.unwrap();
    engine.load_combos(&combo_file).await.unwrap();
    engine.load_configs(configs);

    engine.start().await.unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(20);
    loop {
        let stats = engine.stats().await;
        if stats.total_processed() >= 1000 || tokio::time::Instant::now() > deadline {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    engine.stop().await;
    let stats = engine.stats().await;
    assert_eq!(stats.total_processed(), 1000);
    assert_eq!(stats.valid, 1000);
}

/// Scenario: stopping the engine mid-run emits at most a worker-pool's
/// worth of additional results after the cut, not the full combo list.
#[tokio::test]
async fn cancellation_mid_run_bounds_extra_results() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(50)))
        .mount(&server)
        .await;

    let combos: Vec<String> = (0..500).map(|i| format!("user{i}:pw{i}")).collect();

    let max_workers = 8;
    let config = EngineConfig {
        max_workers,
        ..EngineConfig::default()
    };
    let configs = vec![login_config("site", format!("{}/login", server.uri()))];

    let mut engine = Engine::new(config).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let combo_file = dir.path().join("combos.txt");
    tokio::fs::write(&combo_file, combos.join("\n")).await.unwrap();
    engine.load_combos(&combo_file).await.unwrap();
    engine.load_configs(configs);

    engine.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    let before = engine.stats().await.total_processed();
    engine.stop().await;
    let after = engine.stats().await.total_processed();

    assert!(after - before <= max_workers as u64 + 1);
    assert!(after < 500);
}
