//! Switchboard CLI
//!
//! Boots the fabric with the bundled agents and talks to it from the
//! command line.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use switchboard_core::models::TemplateModel;
use switchboard_core::skills::agent_definitions::{
    create_standard_agents, orchestrator_agent, ORCHESTRATOR_ID,
};
use switchboard_core::swarm::{
    correlation, message_types, routing, AgentMessage, MessageBus, MessagePayload, ReplyPolicy,
    Swarm,
};
use switchboard_core::FabricConfig;
use tracing_subscriber::EnvFilter;

const CLI_SENDER: &str = "cli";

#[derive(Parser, Clone)]
#[command(author, version, about = "Switchboard - in-process A2A message fabric")]
struct Args {
    /// JSON config file (defaults plus SWITCHBOARD_* environment otherwise)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Clone)]
enum CliCommand {
    /// Publish one request and print the response(s)
    Run {
        /// Message type, e.g. CODE_GENERATION_REQUEST, or its short form ("code", "open", ...)
        #[arg(short = 't', long = "type")]
        message_type: String,
        /// Step input as a JSON object
        #[arg(short, long, default_value = "{}")]
        input: String,
        /// Address a single agent instead of broadcasting
        #[arg(long)]
        target: Option<String>,
        /// Override the configured response timeout
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Gather every response until the timeout, whatever the configured policy
        #[arg(long)]
        collect: bool,
    },
    /// List the agents that announced themselves
    Agents,
    /// List the request types and their short forms
    Types,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<FabricConfig> {
    match path {
        Some(path) => FabricConfig::load(path),
        None => Ok(FabricConfig::from_env()),
    }
}

fn resolve_message_type(raw: &str) -> String {
    routing::message_type_for(raw)
        .map(str::to_string)
        .unwrap_or_else(|| raw.to_uppercase())
}

/// `--collect` forces collect-all; otherwise the configured policy applies
fn reply_policy(collect: bool, configured: ReplyPolicy) -> ReplyPolicy {
    if collect {
        ReplyPolicy::CollectAll
    } else {
        configured
    }
}

/// Start the orchestrator, then every bundled worker
async fn boot(config: FabricConfig) -> Result<(Swarm, usize)> {
    let mut swarm = Swarm::new(MessageBus::new(), config);
    swarm.spawn(orchestrator_agent())?;

    let agents = create_standard_agents(swarm.config(), Arc::new(TemplateModel));
    let count = agents.len();
    for agent in agents {
        swarm.spawn(agent)?;
    }
    swarm.wait_until_ready().await?;
    tracing::info!(agents = ?swarm.agent_ids(), "Fabric ready");
    Ok((swarm, count))
}

async fn run_request(
    swarm: &Swarm,
    message_type: &str,
    input: &str,
    target: Option<String>,
    timeout: Duration,
    policy: ReplyPolicy,
) -> Result<bool> {
    let input: Value = serde_json::from_str(input).context("--input must be valid JSON")?;
    if !input.is_object() {
        bail!("--input must be a JSON object");
    }

    let mut request = AgentMessage::request(
        CLI_SENDER,
        message_type,
        MessagePayload::custom_input(message_type, input),
    );
    if let Some(target) = target {
        request = request.with_target(target);
    }

    let responses = correlation::send_request(swarm.bus(), request, policy, timeout).await?;

    for response in &responses {
        println!("{}", serde_json::to_string_pretty(response)?);
    }
    Ok(responses.iter().all(AgentMessage::is_success))
}

async fn list_agents(swarm: &Swarm, expected: usize, timeout: Duration) -> Result<()> {
    // announcements are asynchronous; give them until the directory fills up
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let request = AgentMessage::request(
            CLI_SENDER,
            message_types::AGENT_DIRECTORY_REQUEST,
            MessagePayload::custom("directory", Default::default()),
        )
        .with_target(ORCHESTRATOR_ID);
        let response = correlation::request(swarm.bus(), request, timeout).await?;

        let agents = match response.payload() {
            Some(MessagePayload::AgentDirectory(directory)) => directory.agents.clone(),
            _ => bail!("orchestrator answered without a directory: {:?}", response.error()),
        };
        let workers = agents.iter().filter(|a| a.agent_id != ORCHESTRATOR_ID).count();
        if workers >= expected || tokio::time::Instant::now() >= deadline {
            for info in &agents {
                println!(
                    "{:<18} {:<18} {}",
                    info.agent_id,
                    info.agent_type,
                    info.supported_message_types.join(", ")
                );
            }
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing(args.verbose);

    if let CliCommand::Types = args.command {
        for (message_type, subtype) in routing::SUBTYPES {
            println!("{:<32} {}", message_type, subtype);
        }
        return Ok(());
    }

    let config = load_config(args.config.as_ref())?;
    let default_timeout = config.request_timeout();
    let default_policy = config.reply_policy;
    let (mut swarm, worker_count) = boot(config).await?;

    let outcome = match args.command {
        CliCommand::Run {
            message_type,
            input,
            target,
            timeout_ms,
            collect,
        } => {
            let message_type = resolve_message_type(&message_type);
            let timeout = timeout_ms.map(Duration::from_millis).unwrap_or(default_timeout);
            let policy = reply_policy(collect, default_policy);
            match run_request(&swarm, &message_type, &input, target, timeout, policy).await {
                Ok(true) => Ok(()),
                Ok(false) => Err(anyhow::anyhow!("{} did not succeed", message_type)),
                Err(e) => Err(e),
            }
        }
        CliCommand::Agents => list_agents(&swarm, worker_count, default_timeout).await,
        CliCommand::Types => Ok(()),
    };

    swarm.shutdown_all().await;
    outcome
}
