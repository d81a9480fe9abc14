use std::time::Duration;

use facet::Facet;
use figue as args;
use heapview_examples::{Scenario, plantuml};
use heapview_runtime::SnapshotConfig;
use heapview_runtime::sim::Delivery;

#[derive(Facet, Debug)]
struct Cli {
    #[facet(flatten)]
    builtins: args::FigueBuiltins,
    /// Overrides HEAPVIEW_DEPTH.
    #[facet(args::named, default)]
    depth: Option<u32>,
    /// Deliver children from worker threads in random batches.
    #[facet(args::named, default)]
    scattered: bool,
    #[facet(args::subcommand)]
    command: CommandKind,
}

#[derive(Facet, Debug)]
#[repr(u8)]
enum CommandKind {
    PartsList,
    Friends,
    Inventory,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let cli = parse_cli()?;
    let scenario = match cli.command {
        CommandKind::PartsList => Scenario::PartsList,
        CommandKind::Friends => Scenario::Friends,
        CommandKind::Inventory => Scenario::Inventory,
    };

    let mut config = SnapshotConfig::from_env();
    if let Some(depth) = cli.depth {
        config.max_depth = depth;
    }
    let delivery = if cli.scattered {
        Delivery::Scattered {
            max_delay: Duration::from_millis(2),
        }
    } else {
        Delivery::Inline
    };

    print!("{}", plantuml(scenario, config, delivery)?);
    Ok(())
}

fn parse_cli() -> Result<Cli, String> {
    let figue_config = args::builder::<Cli>()
        .map_err(|e| format!("failed to build CLI schema: {e}"))?
        .cli(|cli| cli.strict())
        .help(|h| {
            h.program_name("heapview-examples")
                .description("Snapshot a simulated heap and print it as PlantUML")
                .version(option_env!("CARGO_PKG_VERSION").unwrap_or("dev"))
        })
        .build();
    let cli = args::Driver::new(figue_config)
        .run()
        .into_result()
        .map_err(|e| e.to_string())?;
    Ok(cli.value)
}
