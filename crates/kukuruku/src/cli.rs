use std::io::Write;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::WrapErr;
use kukuruku_k8s_backend::{KubeBackend, RemoteExit};
use kukuruku_session::{FileStore, StateStore};

use crate::commands::{CommandOutcome, Kukuruku};
use crate::config::Settings;
use crate::constants::KUKURUKU_VERSION;
use crate::error::KukurukuError;
use crate::exec::ExecOptions;
use crate::select::FzfSelector;
use crate::status::StatusFormat;
use crate::terminal::StdTerminal;

#[derive(Parser, Debug)]
#[command(name = "ku")]
#[command(about = "Kubernetes CLI helper - your k8s companion", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the current context and namespace
    Ctx,

    /// Choose a context
    Cctx {
        /// Context name or fuzzy query
        query: Option<String>,
    },

    /// Choose a namespace in the current context
    Cns {
        /// Namespace name or fuzzy query
        query: Option<String>,
    },

    /// Exec into a pod in the current namespace
    Exec(ExecArgs),

    /// Print the status line for the shell prompt
    Prompt,

    /// Refetch the cached context list
    Refresh,

    /// Print the version
    Version,
}

#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Pod name or fuzzy query
    pub pod: Option<String>,

    /// Container to attach to
    #[arg(short, long)]
    pub container: Option<String>,

    /// Do not allocate a tty (for non-interactive commands)
    #[arg(long)]
    pub no_tty: bool,

    /// Command to run instead of a shell
    #[arg(last = true)]
    pub command: Vec<String>,
}

impl From<ExecArgs> for ExecOptions {
    fn from(args: ExecArgs) -> Self {
        ExecOptions {
            pod_query: args.pod,
            container: args.container,
            command: args.command,
            tty: !args.no_tty,
        }
    }
}

/// Run a parsed command line and return the process exit code.
pub fn run(cli: Cli) -> i32 {
    let settings = Settings::from_env();

    match cli.command {
        // the prompt hook: no logging, no runtime, no cluster, always 0
        Commands::Prompt => {
            let store = FileStore::new(&settings.state_dir);
            print_prompt(&settings, &store, &mut std::io::stdout().lock())
        }
        Commands::Version => {
            println!("kukuruku {KUKURUKU_VERSION}");
            0
        }
        command => match run_command(command, cli.verbose, settings) {
            Ok(code) => code,
            Err(report) => {
                eprintln!("{report:?}");
                1
            }
        },
    }
}

/// Write the status line. A closed or broken stdout is ignored: the shell hook must
/// never fail.
fn print_prompt(settings: &Settings, store: &dyn StateStore, out: &mut dyn Write) -> i32 {
    let line = StatusFormat::new(settings.prompt_format.clone()).render(&store.get());
    let _ = writeln!(out, "{line}").and_then(|()| out.flush());
    0
}

fn run_command(command: Commands, verbose: bool, settings: Settings) -> color_eyre::Result<i32> {
    let _ = color_eyre::install();

    let _guard = match crate::tracing::init_tracing(&settings.log_dir(), verbose) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("warning: logging disabled: {e}");
            None
        }
    };
    for warning in &settings.warnings {
        tracing::warn!("{}", warning);
        eprintln!("warning: {warning}");
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .wrap_err("failed to start the async runtime")?;

    let store = FileStore::new(&settings.state_dir);
    let backend = KubeBackend::new();
    let selector = FzfSelector::new(&settings.selector);
    let app = Kukuruku::new(&settings, &store, &backend, &selector);
    tracing::debug!("session record at {:?}", store.path());

    let result = runtime.block_on(async {
        match command {
            Commands::Ctx => Ok(app.show_context()),
            Commands::Cctx { query } => app.choose_context(query.as_deref()).await,
            Commands::Cns { query } => app.choose_namespace(query.as_deref()).await,
            Commands::Exec(args) => {
                let mut terminal = StdTerminal::new();
                app.exec(&args.into(), &mut terminal).await
            }
            Commands::Refresh => app.refresh().await,
            Commands::Prompt | Commands::Version => Ok(CommandOutcome::Report(String::new())),
        }
    });

    // the stdin reader thread may still be parked on a read; do not wait for it
    runtime.shutdown_background();

    Ok(report(result))
}

fn report(result: Result<CommandOutcome, KukurukuError>) -> i32 {
    match result {
        Ok(outcome) => {
            match &outcome {
                CommandOutcome::Report(text) if !text.is_empty() => println!("{text}"),
                CommandOutcome::Switched(state) => println!(
                    "switched to {}/{}",
                    state.current_context, state.current_namespace
                ),
                CommandOutcome::Cancelled => tracing::info!("cancelled by user"),
                CommandOutcome::Exec(RemoteExit::Failed(msg)) => {
                    eprintln!("error: exec stream failed: {msg}")
                }
                CommandOutcome::Exec(RemoteExit::Detached) => eprintln!("\r\ndetached"),
                _ => {}
            }
            outcome.exit_code()
        }
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("error: {e}");
            e.exit_code()
        }
    }
}
