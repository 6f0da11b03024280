use anyhow::Result;
use clap::Parser;
use cxl_emu::{CxlEmuConfig, Irq, IrqHandler, Supervisor};
use std::path::Path;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "cxl-emu")]
#[command(about = "CXL device emulation core: component lifecycle, interrupts and device clients")]
#[command(version)]
#[command(long_about = "Runs an emulated CXL device: a client attached to one switch port \
and an interrupt handler exchanging single-byte interrupts with its peer. \
Can also fire a single interrupt at a peer and exit.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "cxl-emu.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting the emulator")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Dry run mode - build components but don't start them
    #[arg(long, help = "Perform dry run - build components but don't start them")]
    dry_run: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH", help = "Append log output to a file")]
    log_file: Option<String>,

    /// Send one interrupt to a peer and exit
    #[arg(long, value_name = "IRQ", help = "Send an interrupt (host-ready, accel-ready, host-sent) and exit")]
    send: Option<Irq>,

    /// Index into irq.target_ports for --send
    #[arg(long, value_name = "N", default_value_t = 0, requires = "send")]
    target: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle special modes that don't require full initialization
    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    let _log_guard = init_logging(&args)?;

    info!("Starting CXL emulator v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match CxlEmuConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                info!("Configuration validation successful");
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    if let Some(irq) = args.send {
        let handler = IrqHandler::new(config.irq.clone());
        handler.send_to(irq, args.target).await.map_err(|e| {
            error!("Failed to send {}: {}", irq, e);
            e
        })?;
        info!("Sent {} to target {}", irq, args.target);
        return Ok(());
    }

    let mut supervisor = Supervisor::new(config).map_err(|e| {
        error!("Failed to build supervisor: {}", e);
        e
    })?;

    if let Some(irq_handler) = supervisor.irq_handler() {
        for irq in Irq::ALL {
            irq_handler.register(irq, move || info!("{} received", irq))?;
        }
    }

    if args.dry_run {
        info!("Dry run mode - components built but not started");
        for (label, status) in supervisor.component_states() {
            info!("{}: {}", label, status);
        }
        println!("✓ Dry run completed successfully - all components built");
        return Ok(());
    }

    if let Err(e) = supervisor.start().await {
        error!("Failed to start emulator: {}", e);
        let _ = supervisor.shutdown().await;
        std::process::exit(1);
    }

    let exit_code = supervisor.run().await.map_err(|e| {
        error!("System error during execution: {}", e);
        e
    })?;

    info!("CXL emulator exited with code: {}", exit_code);
    std::process::exit(exit_code);
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    // Determine log level based on flags
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("cxl_emu={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    let (file_layer, guard) = match args.log_file.as_deref() {
        Some(path) => {
            let path = Path::new(path);
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("Invalid log file path: {}", path.display()))?;

            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(file_layer)
        .with(env_filter)
        .init();

    Ok(guard)
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# CXL emulator configuration file");
    println!("# Every value below is the built-in default; environment variables");
    println!("# such as CXLEMU_IRQ__BIND_PORT=9001 override individual keys.");
    println!();
    println!("{}", CxlEmuConfig::default().to_toml_string()?);
    Ok(())
}
