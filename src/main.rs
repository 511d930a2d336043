use clap::Parser;
use miette::Result;
use tracing_subscriber::EnvFilter;

use appconf::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Reset SIGPIPE to default behavior (terminate silently) for proper Unix piping.
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let global = cli.global;
    init_tracing(global.verbose);

    match cli.command {
        Commands::Init(args) => appconf::cli::commands::init::run(args, &global),
        Commands::Run(args) => appconf::cli::commands::run::run(args, &global).await,
        Commands::Apply(args) => appconf::cli::commands::apply::run(args, &global).await,
        Commands::Recipe(cmd) => appconf::cli::commands::recipe::run(cmd, &global).await,
        Commands::Completions(args) => appconf::cli::commands::completions::run(args),
    }
}

/// Logs go to stderr; `RUST_LOG` refines the level, `--verbose` raises it to debug
fn init_tracing(verbose: bool) {
    let level = if verbose { "appconf=debug" } else { "appconf=warn" };
    let filter = match level.parse::<tracing_subscriber::filter::Directive>() {
        Ok(directive) => EnvFilter::from_default_env().add_directive(directive),
        Err(_) => EnvFilter::from_default_env(),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
