use std::path::Path;
use std::process;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use shardnet::cli::{
    context_add, context_current, context_delete, context_list, context_use, demo_cluster,
    format_context_list, format_current_context, format_demo_summary, format_deploy_response,
    format_drain_report, format_name_list, format_node_list, format_not_ready,
    format_performance_report, format_route_decision, format_shard_list, gateway_from_config,
    parse_labels, parse_request_data, run_demo, Cli, Commands, ContextAction, NodesAction,
    ServeArgs, ShardApiClient,
};
use shardnet::cluster::{NodeLifecycleController, NodeRegistry};
use shardnet::context::{self, default_config_path, Config, Context};
use shardnet::gateway::SharedGateway;
use shardnet::server::{create_router, shutdown_on, ShardApiState};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    if let Some(ref env_file) = cli.env_file {
        if let Err(e) = dotenvy::from_path(env_file) {
            error!("Failed to load env file {}: {}", env_file.display(), e);
            process::exit(1);
        }
    }

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = context::load_config_from(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    // The env file may have provided the token after argument parsing
    let token = cli
        .token
        .clone()
        .or_else(|| std::env::var("SHARDNET_TOKEN").ok());
    let api = ShardApiClient::from_config(&config, cli.api.as_deref());

    match cli.command {
        Commands::Serve(args) => serve(&config, token.as_deref(), args).await?,

        Commands::Nodes(args) => {
            let (gateway, _) = gateway_from_config(&config, token.as_deref())?;
            let gateway: SharedGateway = Arc::new(gateway);
            nodes(gateway, args.action).await?;
        }

        Commands::Deploy(args) => {
            let request =
                ShardApiClient::deploy_request(&args.model, &args.version, &args.image, args.shards);
            let response = api.deploy(&request).await?;
            print!("{}", format_deploy_response(&response));
        }

        Commands::Status { model } => {
            let shards = api.status(model.as_deref()).await?;
            print!("{}", format_shard_list(&shards));
        }

        Commands::Infer { model, data } => {
            let request = parse_request_data(&data)?;
            let decision = api.infer(&model, &request).await?;
            print!("{}", format_route_decision(&decision));
        }

        Commands::Metrics { model, window } => {
            let report = api.metrics(&model, window).await?;
            print!("{}", format_performance_report(&report));
        }

        Commands::Cleanup { model } => {
            let status = api.cleanup(&model).await?;
            println!("{}", status.message);
        }

        Commands::Context(args) => {
            context_command(&mut config, &config_path, args.action)?;
        }

        Commands::Demo(args) => {
            let summary = run_demo(&args).await?;
            print!("{}", format_demo_summary(&summary));
        }
    }

    Ok(())
}

async fn serve(config: &Config, token: Option<&str>, args: ServeArgs) -> anyhow::Result<()> {
    let (gateway, ctx) = if args.simulated {
        info!("Serving against a simulated cluster");
        let gateway: SharedGateway = Arc::new(demo_cluster(4));
        (gateway, Context::local())
    } else {
        let (http, ctx) = gateway_from_config(config, token)?;
        info!("Serving against context {} ({})", ctx.name, ctx.server);
        let gateway: SharedGateway = Arc::new(http);
        (gateway, ctx)
    };

    let state = ShardApiState::new(gateway, ctx.orchestrator_config());
    let app = create_router(state);

    let bind_addr = args.bind_addr.unwrap_or_else(|| config.local.bind_addr.clone());
    let port = args.port.unwrap_or(config.local.port);
    let addr = format!("{}:{}", bind_addr, port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    info!("Shard API listening on {}", addr);
    info!("Endpoints:");
    info!("  GET    /health                      - Health check");
    info!("  GET    /v1/nodes[/available|/health] - Nodes");
    info!("  POST   /v1/nodes/{{name}}/<op>        - label, cordon, uncordon, drain");
    info!("  POST   /v1/models                   - Deploy a sharded model");
    info!("  GET    /v1/models/status            - Shard status");
    info!("  POST   /v1/models/{{model}}/infer     - Route an inference request");
    info!("  GET    /v1/models/{{model}}/metrics   - Synthetic performance");
    info!("  DELETE /v1/models/{{model}}           - Clean up a model");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_on(tokio::signal::ctrl_c()))
        .await?;
    Ok(())
}

async fn nodes(gateway: SharedGateway, action: NodesAction) -> anyhow::Result<()> {
    let registry = NodeRegistry::new(gateway.clone());
    let lifecycle = NodeLifecycleController::new(gateway);

    match action {
        NodesAction::List => {
            let nodes = registry.list_nodes().await?;
            print!("{}", format_node_list(&nodes));
        }
        NodesAction::Available => {
            let names = registry.list_available_worker_nodes().await?;
            print!("{}", format_name_list("NAME", &names));
        }
        NodesAction::Label { name, labels } => {
            lifecycle.label_node(&name, parse_labels(&labels)?).await?;
            println!("node/{} labeled", name);
        }
        NodesAction::Cordon { name } => {
            lifecycle.cordon_node(&name).await?;
            println!("node/{} cordoned", name);
        }
        NodesAction::Uncordon { name } => {
            lifecycle.uncordon_node(&name).await?;
            println!("node/{} uncordoned", name);
        }
        NodesAction::Drain { name } => {
            let report = lifecycle.drain_node(&name).await?;
            print!("{}", format_drain_report(&report));
        }
        NodesAction::Monitor => {
            let not_ready = lifecycle.monitor_nodes().await?;
            print!("{}", format_not_ready(&not_ready));
        }
    }
    Ok(())
}

fn context_command(
    config: &mut Config,
    path: &Path,
    action: ContextAction,
) -> anyhow::Result<()> {
    match action {
        ContextAction::List => print!("{}", format_context_list(&context_list(config))),
        ContextAction::Current => {
            let (name, server) = context_current(config)?;
            print!("{}", format_current_context(&name, &server));
        }
        ContextAction::Use { name } => {
            context_use(config, &name)?;
            context::save_config_to(config, path)?;
            println!("Switched to context \"{}\"", name);
        }
        ContextAction::Add {
            name,
            server,
            token,
            token_file,
            namespace,
            description,
        } => {
            let mut ctx = Context::new(&name, server).with_namespace(namespace);
            ctx.token = token;
            ctx.token_file = token_file;
            ctx.description = description;
            context_add(config, ctx)?;
            context::save_config_to(config, path)?;
            println!("Context \"{}\" added", name);
        }
        ContextAction::Delete { name } => {
            if context_delete(config, &name)? {
                context::save_config_to(config, path)?;
                println!("Context \"{}\" deleted", name);
            } else {
                println!("Context \"{}\" not found", name);
            }
        }
    }
    Ok(())
}
