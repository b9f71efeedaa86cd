//! End-to-end tests over a live swarm.

use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use switchboard_core::agents::OrchestratorAgent;
use switchboard_core::models::TemplateModel;
use switchboard_core::skills::agent_definitions::{
    create_standard_agents, orchestrator_agent, ORCHESTRATOR_ID,
};
use switchboard_core::skills::{
    ExecutionContext, StepInput, StepOutput, StepResult, ToolAgent, ToolPlanStep, ValidationResult,
};
use switchboard_core::swarm::{
    correlation, message_types, AgentMessage, LegacyAgentAdapter, MessageBus, MessageClass,
    MessagePayload, Swarm,
};
use switchboard_core::{FabricConfig, FileAccessConfig};

const TIMEOUT: Duration = Duration::from_secs(5);

fn config(base_dir: &std::path::Path) -> FabricConfig {
    FabricConfig {
        file_access: FileAccessConfig {
            base_dir: base_dir.to_path_buf(),
            ..FileAccessConfig::default()
        },
        ..FabricConfig::default()
    }
}

async fn standard_swarm(base_dir: &std::path::Path) -> (Swarm, Arc<OrchestratorAgent>) {
    let mut swarm = Swarm::new(MessageBus::new(), config(base_dir));
    let orchestrator = orchestrator_agent();
    swarm.spawn(orchestrator.clone()).unwrap();
    for agent in create_standard_agents(swarm.config(), Arc::new(TemplateModel)) {
        swarm.spawn(agent).unwrap();
    }
    swarm.wait_until_ready().await.unwrap();
    (swarm, orchestrator)
}

fn request(message_type: &str, input: Value) -> AgentMessage {
    AgentMessage::request("test", message_type, MessagePayload::custom_input("input", input))
}

fn data(response: &AgentMessage) -> &serde_json::Map<String, Value> {
    &response
        .payload()
        .and_then(MessagePayload::as_custom)
        .expect("custom payload")
        .data
}

fn cause(response: &AgentMessage) -> Option<&str> {
    match response.payload() {
        Some(MessagePayload::Error(e)) => e.cause.as_deref(),
        _ => None,
    }
}

fn project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("Cargo.toml"), "[package]\nname = \"demo\"").unwrap();
    std::fs::create_dir(dir.path().join("src")).unwrap();
    for name in ["lib.rs", "bus.rs", "agent.rs", "message.rs"] {
        std::fs::write(dir.path().join("src").join(name), format!("// {}", name)).unwrap();
    }
    dir
}

#[tokio::test]
async fn test_code_generation_in_requested_language() {
    let dir = project();
    let (mut swarm, _) = standard_swarm(dir.path()).await;

    let response = correlation::request(
        swarm.bus(),
        request(
            message_types::CODE_GENERATION_REQUEST,
            json!({"request": "reverse a string", "language": "go"}),
        ),
        TIMEOUT,
    )
    .await
    .unwrap();

    assert!(response.is_success(), "{:?}", response.error());
    let data = data(&response);
    assert_eq!(data["language"], "go");
    assert!(!data["generated_code"].as_str().unwrap().is_empty());
    assert_eq!(data["metadata"]["request_subtype"], "code");
    assert_eq!(data["metadata"]["legacy_class"], "CodeGeneratorAgent");

    swarm.shutdown_all().await;
}

#[tokio::test]
async fn test_open_file_without_path_fails_cleanly() {
    let dir = project();
    let (mut swarm, _) = standard_swarm(dir.path()).await;

    let response = correlation::request(
        swarm.bus(),
        request(message_types::OPEN_FILE_REQUEST, json!({})),
        TIMEOUT,
    )
    .await
    .unwrap();

    assert!(!response.is_success());
    assert!(!response.error().unwrap_or_default().is_empty());
    match response.payload() {
        Some(MessagePayload::Error(e)) => assert_eq!(e.cause.as_deref(), Some("validation_failed")),
        other => panic!("unexpected payload {:?}", other),
    }

    swarm.shutdown_all().await;
}

#[tokio::test]
async fn test_open_file_reads_content() {
    let dir = project();
    let (mut swarm, _) = standard_swarm(dir.path()).await;

    let response = correlation::request(
        swarm.bus(),
        request(message_types::OPEN_FILE_REQUEST, json!({"request": "src/bus.rs"})),
        TIMEOUT,
    )
    .await
    .unwrap();

    assert!(response.is_success(), "{:?}", response.error());
    assert_eq!(data(&response)["content"], "// bus.rs");

    swarm.shutdown_all().await;
}

#[tokio::test]
async fn test_concurrent_file_data_requests_keep_their_limits() {
    let dir = project();
    let (mut swarm, _) = standard_swarm(dir.path()).await;

    let first = request(message_types::FILE_DATA_REQUEST, json!({"max_files": 1}));
    let second = request(message_types::FILE_DATA_REQUEST, json!({"max_files": 3}));
    let (first_id, second_id) = (first.id().to_string(), second.id().to_string());

    let (a, b) = tokio::join!(
        correlation::request(swarm.bus(), first, TIMEOUT),
        correlation::request(swarm.bus(), second, TIMEOUT),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.request_id(), Some(first_id.as_str()));
    assert_eq!(b.request_id(), Some(second_id.as_str()));
    assert_eq!(data(&a)["total_files"], 1);
    assert_eq!(data(&a)["max_files"], 1);
    assert_eq!(data(&b)["total_files"], 3);
    assert_eq!(data(&b)["max_files"], 3);

    swarm.shutdown_all().await;
}

#[tokio::test]
async fn test_identical_requests_get_independent_responses() {
    let dir = project();
    let (mut swarm, _) = standard_swarm(dir.path()).await;

    let first = request(message_types::PROJECT_STRUCTURE_REQUEST, json!({}));
    let second = request(message_types::PROJECT_STRUCTURE_REQUEST, json!({}));
    let (first_id, second_id) = (first.id().to_string(), second.id().to_string());
    assert_ne!(first_id, second_id);

    let a = correlation::request(swarm.bus(), first, TIMEOUT).await.unwrap();
    let b = correlation::request(swarm.bus(), second, TIMEOUT).await.unwrap();

    assert_eq!(a.request_id(), Some(first_id.as_str()));
    assert_eq!(b.request_id(), Some(second_id.as_str()));
    assert_ne!(a.id(), b.id());
    for response in [&a, &b] {
        match response.payload() {
            Some(MessagePayload::ProjectStructure(p)) => {
                assert_eq!(p.project_type, "rust");
                assert_eq!(p.total_files, 5);
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    swarm.shutdown_all().await;
}

struct FragileTool;

impl ToolAgent for FragileTool {
    fn agent_type(&self) -> &str {
        "fragile"
    }

    fn legacy_class(&self) -> &str {
        "FragileAgent"
    }

    fn validate_input(&self, _input: &StepInput) -> ValidationResult {
        ValidationResult::ok()
    }

    fn execute_step(&self, step: &ToolPlanStep, _context: &ExecutionContext) -> StepResult {
        if step.input.get_bool("explode") == Some(true) {
            panic!("fragile tool exploded");
        }
        StepResult::success(StepOutput::new().with("ok", true))
    }
}

#[tokio::test]
async fn test_panicking_tool_is_isolated() {
    let mut swarm = Swarm::new(MessageBus::new(), FabricConfig::default());
    swarm
        .spawn(Arc::new(LegacyAgentAdapter::new(
            "fragile",
            FragileTool,
            ["FRAGILE_REQUEST"],
        )))
        .unwrap();
    swarm.wait_until_ready().await.unwrap();

    let crashed = correlation::request(
        swarm.bus(),
        request("FRAGILE_REQUEST", json!({"explode": true})),
        TIMEOUT,
    )
    .await
    .unwrap();
    assert!(!crashed.is_success());
    assert!(crashed.error().unwrap().contains("panicked"));

    let recovered =
        correlation::request(swarm.bus(), request("FRAGILE_REQUEST", json!({})), TIMEOUT)
            .await
            .unwrap();
    assert!(recovered.is_success());
    assert_eq!(data(&recovered)["ok"], true);

    swarm.shutdown_all().await;
}

#[tokio::test]
async fn test_shutdown_stops_all_delivery() {
    let dir = project();
    let (mut swarm, _) = standard_swarm(dir.path()).await;
    let bus = swarm.bus().clone();

    swarm.shutdown_all().await;

    assert_eq!(bus.subscription_count(), 0);
    let delivered = bus
        .publish(request(message_types::FILE_DATA_REQUEST, json!({})))
        .unwrap();
    assert_eq!(delivered, 0);
}

#[tokio::test]
async fn test_orchestrator_discovers_and_dispatches() {
    let dir = project();
    let (mut swarm, orchestrator) = standard_swarm(dir.path()).await;

    let deadline = tokio::time::Instant::now() + TIMEOUT;
    while orchestrator.find_agent_for(message_types::OPEN_FILE_REQUEST).is_none() {
        assert!(tokio::time::Instant::now() < deadline, "no announcement arrived");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let response = orchestrator
        .dispatch(
            message_types::OPEN_FILE_REQUEST,
            json!({"request": "Cargo.toml"}),
            TIMEOUT,
        )
        .await
        .unwrap();
    assert!(response.is_success(), "{:?}", response.error());
    assert_eq!(response.sender_id(), "open-file");

    let directory = correlation::request(
        swarm.bus(),
        request(message_types::AGENT_DIRECTORY_REQUEST, json!({})).with_target(ORCHESTRATOR_ID),
        TIMEOUT,
    )
    .await
    .unwrap();
    match directory.payload() {
        Some(MessagePayload::AgentDirectory(d)) => {
            assert!(d.agents.iter().any(|a| a.agent_id == "open-file"));
        }
        other => panic!("unexpected payload {:?}", other),
    }

    swarm.shutdown_all().await;
}

#[tokio::test]
async fn test_requests_racing_shutdown_are_all_answered() {
    let dir = project();
    let (mut swarm, _) = standard_swarm(dir.path()).await;

    let requests: Vec<AgentMessage> = (0..3)
        .map(|_| request(message_types::FILE_DATA_REQUEST, json!({})))
        .collect();
    let ids: HashSet<String> = requests.iter().map(|r| r.id().to_string()).collect();
    let mut responses = swarm
        .bus()
        .subscribe(MessageClass::Response, move |m| {
            m.request_id().is_some_and(|id| ids.contains(id))
        })
        .unwrap();

    for request in requests {
        swarm.bus().publish(request).unwrap();
    }
    swarm.shutdown_all().await;

    let mut answered = 0;
    while let Some(response) = responses.try_recv() {
        assert!(response.is_success() || cause(&response) == Some("not_ready"));
        answered += 1;
    }
    assert_eq!(answered, 3);
}

struct SlowTool {
    started: Arc<AtomicBool>,
}

impl ToolAgent for SlowTool {
    fn agent_type(&self) -> &str {
        "slow"
    }

    fn legacy_class(&self) -> &str {
        "SlowAgent"
    }

    fn validate_input(&self, _input: &StepInput) -> ValidationResult {
        ValidationResult::ok()
    }

    fn execute_step(&self, _step: &ToolPlanStep, _context: &ExecutionContext) -> StepResult {
        self.started.store(true, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(800));
        StepResult::success(StepOutput::new().with("late", true))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_cancels_running_legacy_call_visibly() {
    let started = Arc::new(AtomicBool::new(false));
    let mut swarm = Swarm::new(MessageBus::new(), FabricConfig::default());
    swarm
        .spawn(Arc::new(LegacyAgentAdapter::new(
            "slow",
            SlowTool {
                started: Arc::clone(&started),
            },
            ["SLOW_REQUEST"],
        )))
        .unwrap();
    swarm.wait_until_ready().await.unwrap();

    let bus = swarm.bus().clone();
    let waiter = tokio::spawn(async move {
        correlation::request(&bus, request("SLOW_REQUEST", json!({})), TIMEOUT).await
    });
    while !started.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    swarm.shutdown_all().await;

    let response = waiter.await.unwrap().unwrap();
    assert!(!response.is_success());
    assert_eq!(cause(&response), Some("not_ready"));
    assert!(response.error().unwrap().contains("cancelled"));
}

#[tokio::test]
async fn test_orchestrator_forgets_departed_agents() {
    let dir = project();
    let (mut swarm, orchestrator) = standard_swarm(dir.path()).await;

    let deadline = tokio::time::Instant::now() + TIMEOUT;
    while orchestrator.find_agent_for(message_types::OPEN_FILE_REQUEST).is_none() {
        assert!(tokio::time::Instant::now() < deadline, "no announcement arrived");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert!(swarm.shutdown_agent("open-file").await);
    while orchestrator.find_agent_for(message_types::OPEN_FILE_REQUEST).is_some() {
        assert!(tokio::time::Instant::now() < deadline, "departure never arrived");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let err = orchestrator
        .dispatch(
            message_types::OPEN_FILE_REQUEST,
            json!({"request": "Cargo.toml"}),
            TIMEOUT,
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "unsupported_type");

    swarm.shutdown_all().await;
}
