use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use loglens_core::{DEFAULT_DUMP_PATH, HubDesc, dump_path};
use loglens_server::{DEFAULT_PORT, DEFAULT_STATIC_DIR, ServerDesc, serve};
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};
use std::fs::File;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Parser, Debug)]
#[command(name = "loglens", version, about = "Structured log viewer")]
struct Cli {
    /// trace, debug, info, warn, error or off
    #[arg(long, global = true, default_value = "info")]
    log_level: LevelFilter,

    /// also write diagnostics to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pretty-print every record of an NDJSON file (default)
    Dump {
        #[arg(default_value = DEFAULT_DUMP_PATH)]
        path: PathBuf,
    },
    /// Accept uploads and stream records to connected viewers
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[arg(long, default_value_t = SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)))]
    addr: SocketAddr,

    #[arg(long, default_value = DEFAULT_STATIC_DIR)]
    static_dir: PathBuf,

    /// largest accepted upload
    #[arg(long, default_value_t = 64)]
    max_upload_mb: usize,

    /// drop a viewer whose frame write takes longer than this
    #[arg(long, default_value_t = 5000)]
    write_timeout_ms: u64,

    /// pending hub requests before submitters have to wait
    #[arg(long)]
    request_queue: Option<usize>,

    /// undelivered records per viewer before it is dropped
    #[arg(long)]
    viewer_outbox: Option<usize>,
}

impl ServeArgs {
    fn into_desc(self) -> ServerDesc {
        let mut hub = HubDesc::default();
        if let Some(request_queue) = self.request_queue {
            hub.request_queue = request_queue;
        }
        if let Some(viewer_outbox) = self.viewer_outbox {
            hub.viewer_outbox = viewer_outbox;
        }

        ServerDesc {
            bind_addr: self.addr,
            static_dir: self.static_dir,
            max_upload_bytes: self.max_upload_mb.saturating_mul(1024 * 1024),
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            hub,
        }
    }
}

fn setup_logger(level: LevelFilter, log_file: Option<&Path>) -> Result<()> {
    let config = ConfigBuilder::new()
        .add_filter_allow_str("loglens")
        .set_time_format_rfc3339()
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        config.clone(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];

    if let Some(path) = log_file {
        let file = File::create(path)
            .with_context(|| format!("failed to create log file {}", path.display()))?;
        loggers.push(WriteLogger::new(level, config, file));
    }

    CombinedLogger::init(loggers).context("failed to install logger")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn run_dump(path: &Path) -> Result<()> {
    let stdout = io::stdout();
    let report = dump_path(path, stdout.lock())?;
    log::debug!(
        "Dumped {} records from {} ({} malformed)",
        report.printed,
        path.display(),
        report.malformed
    );
    Ok(())
}

async fn run_server(desc: ServerDesc) -> Result<()> {
    let listener = TcpListener::bind(desc.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", desc.bind_addr))?;

    serve(listener, &desc, shutdown_signal()).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logger(cli.log_level, cli.log_file.as_deref())?;

    let command = cli.command.unwrap_or(Command::Dump {
        path: PathBuf::from(DEFAULT_DUMP_PATH),
    });

    match command {
        Command::Dump { path } => run_dump(&path),
        Command::Serve(args) => run_server(args.into_desc()).await,
    }
}
