use facet::Facet;
use figue as args;
use heapview_examples::Scenario;
use heapview_runtime::SnapshotConfig;
use heapview_runtime::sim::Delivery;
use heapview_web::app::AppState;
use heapview_web::http::router;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Facet, Debug)]
struct ServerCli {
    #[facet(flatten)]
    builtins: args::FigueBuiltins,
    /// Simulated heap to serve: parts-list, friends or inventory.
    #[facet(args::named, default)]
    scenario: Option<String>,
    /// Overrides HEAPVIEW_DEPTH.
    #[facet(args::named, default)]
    depth: Option<u32>,
}

#[derive(Facet, Debug)]
struct ClientCli {
    #[facet(flatten)]
    builtins: args::FigueBuiltins,
    #[facet(args::subcommand)]
    command: ClientCommand,
}

#[derive(Facet, Debug)]
#[repr(u8)]
enum ClientCommand {
    Snapshot {
        #[facet(args::named, default)]
        url: Option<String>,
    },
    Plantuml {
        #[facet(args::named, default)]
        url: Option<String>,
    },
    Expand {
        #[facet(args::named, default)]
        url: Option<String>,
        #[facet(args::named)]
        id: String,
    },
}

const HTTP_VAR: &str = "HEAPVIEW_HTTP";
const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:8080";

fn main() {
    let cli_args: Vec<String> = std::env::args().skip(1).collect();
    if cli_args
        .first()
        .map(String::as_str)
        .is_some_and(is_client_command)
    {
        if let Err(err) = run_client() {
            eprintln!("{err}");
            std::process::exit(1);
        }
        return;
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
        .block_on(async {
            if let Err(err) = run_server().await {
                eprintln!("{err}");
                std::process::exit(1);
            }
        });
}

fn is_client_command(value: &str) -> bool {
    matches!(value, "snapshot" | "plantuml" | "expand")
}

async fn run_server() -> Result<(), String> {
    let cli = parse_server_cli()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let scenario: Scenario = cli
        .scenario
        .as_deref()
        .unwrap_or(Scenario::PartsList.name())
        .parse()?;
    let mut config = SnapshotConfig::from_env();
    if let Some(depth) = cli.depth {
        config.max_depth = depth;
    }
    let http_addr = std::env::var(HTTP_VAR).unwrap_or_else(|_| DEFAULT_HTTP_ADDR.into());

    let heap = scenario.heap(Delivery::Scattered {
        max_delay: std::time::Duration::from_millis(1),
    });
    let state = AppState::new(config, heap);
    let diagram = state.snapshot().await?;
    info!(
        %scenario,
        objects = diagram.objects.len(),
        depth = state.session.config().max_depth,
        "initial snapshot taken"
    );

    let listener = TcpListener::bind(&http_addr)
        .await
        .map_err(|e| format!("failed to bind HTTP on {http_addr}: {e}"))?;
    info!(%http_addr, "heapview viewer server ready");
    println!();
    println!("  Viewer socket: ws://{http_addr}/debug");
    println!("  Diagram:       http://{http_addr}/api/diagram");
    println!("  PlantUML:      http://{http_addr}/api/diagram/plantuml");
    println!();

    axum::serve(listener, router(state))
        .await
        .map_err(|e| format!("HTTP server error: {e}"))
}

fn parse_server_cli() -> Result<ServerCli, String> {
    let figue_config = args::builder::<ServerCli>()
        .map_err(|e| format!("failed to build CLI schema: {e}"))?
        .cli(|cli| cli.strict())
        .help(|h| {
            h.program_name("heapview")
                .description("Serve heap snapshots of a simulated program to remote viewers")
                .version(option_env!("CARGO_PKG_VERSION").unwrap_or("dev"))
        })
        .build();
    let cli = args::Driver::new(figue_config)
        .run()
        .into_result()
        .map_err(|e| e.to_string())?;
    Ok(cli.value)
}

fn run_client() -> Result<(), String> {
    let cli = parse_client_cli()?;
    match cli.command {
        ClientCommand::Snapshot { url } => run_snapshot(url),
        ClientCommand::Plantuml { url } => run_plantuml(url),
        ClientCommand::Expand { url, id } => run_expand(url, id),
    }
}

fn parse_client_cli() -> Result<ClientCli, String> {
    let figue_config = args::builder::<ClientCli>()
        .map_err(|e| format!("failed to build CLI schema: {e}"))?
        .cli(|cli| cli.strict())
        .help(|h| {
            h.program_name("heapview")
                .description("CLI for a running heapview server")
                .version(option_env!("CARGO_PKG_VERSION").unwrap_or("dev"))
        })
        .build();
    let cli = args::Driver::new(figue_config)
        .run()
        .into_result()
        .map_err(|e| e.to_string())?;
    Ok(cli.value)
}

fn base_url(url: Option<String>) -> String {
    let url = url.unwrap_or_else(|| {
        let addr = std::env::var(HTTP_VAR).unwrap_or_else(|_| DEFAULT_HTTP_ADDR.into());
        format!("http://{addr}")
    });
    url.trim_end_matches('/').to_string()
}

fn run_snapshot(url: Option<String>) -> Result<(), String> {
    let url = format!("{}/api/snapshot", base_url(url));
    let response = ureq::post(&url)
        .send_string("")
        .map_err(|e| format!("POST {url}: {e}"))?
        .into_string()
        .map_err(|e| format!("read POST response body: {e}"))?;
    print_pretty(&response, "snapshot")
}

fn run_plantuml(url: Option<String>) -> Result<(), String> {
    let url = format!("{}/api/diagram/plantuml", base_url(url));
    print!("{}", http_get_text(&url)?);
    Ok(())
}

fn run_expand(url: Option<String>, id: String) -> Result<(), String> {
    let url = format!("{}/api/objects/{}/expand", base_url(url), id.trim());
    match ureq::get(&url).call() {
        Ok(response) => {
            let body = response
                .into_string()
                .map_err(|e| format!("read GET response body: {e}"))?;
            print_pretty(&body, "expansion")
        }
        Err(ureq::Error::Status(404, response)) => Err(response
            .into_string()
            .unwrap_or_else(|_| heapview_wire::not_found_message(&id))),
        Err(e) => Err(format!("GET {url}: {e}")),
    }
}

fn print_pretty(response: &str, what: &str) -> Result<(), String> {
    let pretty = facet_json::to_string_pretty(
        &facet_json::from_str::<facet_value::Value>(response)
            .map_err(|e| format!("decode {what} response as json: {e}"))?,
    )
    .map_err(|e| format!("pretty {what} response: {e}"))?;
    println!("{pretty}");
    Ok(())
}

fn http_get_text(url: &str) -> Result<String, String> {
    let response = ureq::get(url)
        .call()
        .map_err(|e| format!("GET {url}: {e}"))?;
    response
        .into_string()
        .map_err(|e| format!("read GET response body: {e}"))
}

