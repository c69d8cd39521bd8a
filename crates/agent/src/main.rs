use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use nav_agent::cli::{BatchRow, Cli};
use nav_agent::context::AgentContext;
use nav_agent::otp::{ConfiguredOtpFetcher, OtpFetcher};
use nav_agent::resolver::HttpConfiguredResolver;
use nav_agent::task_runner::run_task;
use nav_browser::manager::BrowserManager;
use nav_domain::config::{Config, ConfigSeverity};
use nav_domain::task::{RunOptions, Task};
use nav_mcp::McpManager;
use nav_providers::ProviderRegistry;
use nav_replay::{ReplayStore, StatsStore};
use nav_resolver::CredentialStore;
use nav_tools::ToolFabric;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            tracing::error!(error = %e, "fatal error");
            std::process::exit(1);
        }
    }
}

/// Initialize structured JSON tracing (spec.md §6 "machine event channel":
/// `NavEvent::emit` rides the same `tracing::info!` stream this sets up).
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,nav_agent=debug")))
        .json()
        .init();
}

/// Dispatches to introspection, batch, or single-task mode and returns the
/// process exit code (spec.md §6 "Exit codes").
async fn run(cli: Cli) -> anyhow::Result<i32> {
    let config = load_config(&cli.config)?;
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Error => tracing::error!("{issue}"),
            ConfigSeverity::Warning => tracing::warn!("{issue}"),
        }
    }
    if Config::has_errors(&issues) {
        bail!("configuration has {} error(s); see log output", issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count());
    }
    let config = Arc::new(config);

    let replay_store = Arc::new(ReplayStore::open(config.replay.replay_db_path.clone()).context("opening replay store")?);

    if cli.list_recorded_tasks {
        let recordings = replay_store.list_all().context("listing recordings")?;
        println!("{}", serde_json::to_string(&recordings)?);
        return Ok(0);
    }

    let browser = BrowserManager::get_instance(&config.browser, cli.attach.as_deref()).await.context("starting browser session manager")?;
    let providers = Arc::new(ProviderRegistry::from_config(&config.llm).context("constructing provider registry")?);
    let credentials = Arc::new(CredentialStore::open(config.replay.credentials_db_path.clone()).context("opening credential store")?);
    let stats_store = Arc::new(StatsStore::open(config.replay.stats_db_path.clone()).context("opening stats store")?);
    let mcp = Arc::new(McpManager::from_config(&config.mcp).await);
    let tools = Arc::new(build_tool_fabric(&mcp).await);
    let otp_fetcher: Option<Arc<dyn OtpFetcher>> =
        config.otp.source.as_ref().map(|_| Arc::new(ConfiguredOtpFetcher::new(config.otp.clone())) as Arc<dyn OtpFetcher>);
    let configured_resolver: Option<Arc<dyn nav_resolver::ConfiguredResolver>> = HttpConfiguredResolver::from_config(config.resolver.clone())
        .map(|r| Arc::new(r) as Arc<dyn nav_resolver::ConfiguredResolver>);

    let default_provider_id = cli.model.clone().unwrap_or_else(|| providers.list_providers().first().cloned().unwrap_or_default());

    let ctx = Arc::new(AgentContext::new(
        config.clone(),
        browser.clone(),
        providers,
        tools,
        mcp.clone(),
        credentials.clone(),
        replay_store,
        stats_store,
        otp_fetcher,
        configured_resolver,
        default_provider_id,
    ));

    let exit_code = if let Some(batch_path) = &cli.batch_file {
        run_batch(ctx.clone(), batch_path, cli.concurrency, &credentials).await?
    } else if let Some(goal) = &cli.task {
        run_single(ctx.clone(), &cli, goal, &credentials).await?
    } else {
        bail!("one of -t <goal>, -f <csv>, or --list_recorded_tasks is required");
    };

    mcp.shutdown().await;
    browser.stop().await;
    Ok(exit_code)
}

fn load_config(path: &str) -> anyhow::Result<Config> {
    let path = Path::new(path);
    if path.exists() {
        Config::load(path).with_context(|| format!("loading config from {}", path.display()))
    } else {
        tracing::warn!(path = %path.display(), "config file not found, using defaults");
        Ok(Config::default())
    }
}

/// Imports every discovered Remote Tool Session tool into the Tool Fabric,
/// proxying calls back through the owning server (spec.md §4.4).
async fn build_tool_fabric(mcp: &Arc<McpManager>) -> ToolFabric {
    let mut fabric = ToolFabric::new();
    let discovered = mcp.list_tools().await;

    let mut tool_server: HashMap<String, String> = HashMap::new();
    let defs: Vec<nav_domain::chat::ToolDefinition> = discovered
        .into_iter()
        .map(|(server_id, tool)| {
            tool_server.insert(tool.name.clone(), server_id);
            nav_domain::chat::ToolDefinition {
                name: tool.name,
                description: tool.description,
                parameters: tool.input_schema,
            }
        })
        .collect();

    let tool_server = Arc::new(tool_server);
    let mcp = mcp.clone();
    fabric.register_remote(defs, move |name, args| {
        let mcp = mcp.clone();
        let tool_server = tool_server.clone();
        Box::pin(async move {
            let server_id = tool_server.get(&name).cloned().ok_or_else(|| format!("no server found for tool {name:?}"))?;
            let result = mcp
                .call_tool(&server_id, &name, args, std::time::Duration::from_secs(60))
                .await
                .map_err(|e| e.to_string())?;
            if result.ok {
                Ok(result.data.unwrap_or(serde_json::Value::Null))
            } else {
                Err(result.error.unwrap_or_else(|| "tool call failed".to_string()))
            }
        })
    });
    fabric
}

fn run_options_from_cli(cli: &Cli) -> RunOptions {
    let defaults = RunOptions::default();
    RunOptions {
        mask_data: !cli.skip_mask,
        multi_action_per_turn: cli.multi_action,
        record_and_replay: cli.record,
        parameterize_replay: cli.parameterize,
        send_screenshot: cli.send_screenshot,
        save_screenshot: cli.save_screenshot,
        use_system_browser: cli.system_browser,
        attach_endpoint: cli.attach.clone(),
        ..defaults
    }
}

async fn run_single(ctx: Arc<AgentContext>, cli: &Cli, goal: &str, credentials: &CredentialStore) -> anyhow::Result<i32> {
    if let (Some(user), Some(pass)) = (&cli.username, &cli.password) {
        credentials.upsert(0, &cli.site, cli.url.as_deref().unwrap_or(""), user, pass).context("storing credentials")?;
    }

    let task = Task {
        goal: goal.to_string(),
        site_id: 0,
        site_name: cli.site.clone(),
        url: cli.url.clone(),
        options: run_options_from_cli(cli),
    };

    let outcome = run_task(ctx, task).await.context("running task")?;
    println!("{}", outcome.answer);
    Ok(0)
}

async fn run_batch(ctx: Arc<AgentContext>, csv_path: &str, concurrency: usize, credentials: &CredentialStore) -> anyhow::Result<i32> {
    let mut reader = csv::Reader::from_path(csv_path).with_context(|| format!("opening batch file {csv_path}"))?;
    let rows: Vec<BatchRow> = reader.deserialize().collect::<Result<_, _>>().context("parsing batch CSV")?;

    let mut site_counter: i64 = 1;
    let mut tasks = Vec::with_capacity(rows.len());
    for row in rows {
        let site_id = site_counter;
        site_counter += 1;
        let site_name = row.site_name.clone().unwrap_or_else(|| format!("site-{site_id}"));
        if let (Some(user), Some(pass)) = (&row.username, &row.password) {
            credentials.upsert(site_id, &site_name, row.url.as_deref().unwrap_or(""), user, pass).context("storing batch credentials")?;
        }
        tasks.push(Task {
            goal: row.task_goal.clone(),
            site_id,
            site_name,
            url: row.url.clone(),
            options: row.run_options(),
        });
    }

    let semaphore = Arc::new(tokio::sync::Semaphore::new(concurrency.max(1)));
    let mut handles = Vec::with_capacity(tasks.len());
    for task in tasks {
        let ctx = ctx.clone();
        let semaphore = semaphore.clone();
        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
            let site_name = task.site_name.clone();
            match run_task(ctx, task).await {
                Ok(outcome) => {
                    println!("{site_name}: {}", outcome.answer);
                    outcome.success
                }
                Err(e) => {
                    tracing::error!(site = %site_name, error = %e, "batch task failed");
                    false
                }
            }
        }));
    }

    let mut any_fatal = false;
    for handle in handles {
        if handle.await.is_err() {
            any_fatal = true;
        }
    }

    Ok(if any_fatal { 1 } else { 0 })
}
