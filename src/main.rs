use anyhow::Context;
use clap::Parser;
use gemkit::{init_logging, App, Config, PrinterState, PrinterStatus, StateChange, TerminalUi};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "gemkit", version, about = "Printer controller event dispatcher")]
struct Args {
    /// Configuration file (.toml or .json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the built-in configuration as TOML and exit
    #[arg(long)]
    print_default_config: bool,

    /// Override the configured log level
    #[arg(short, long)]
    log_level: Option<tracing::Level>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.print_default_config {
        print!("{}", Config::default().to_toml_string()?);
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => Config::load_or_default(&Config::default_path()?)?,
    };

    let level = match args.log_level {
        Some(level) => level,
        None => config.logging.level()?,
    };
    init_logging(level)?;
    tracing::info!("GemKit {} starting", gemkit::VERSION);

    let logger: Arc<dyn gemkit::Logger> = Arc::new(gemkit::TracingLogger);
    let ui = Arc::new(TerminalUi::new(std::io::stdout(), logger.clone()));
    let mut app = App::from_config(&config, logger, ui)?;

    // Held for the life of the loop; dropping it would close the status channel.
    let mut publisher = app.take_publisher();
    if let Some(publisher) = publisher.as_mut() {
        publisher.publish(
            &PrinterStatus::new(PrinterState::PrinterOn).with_change(StateChange::Entering),
        )?;
    }

    app.run().context("Event loop failed")?;
    drop(publisher);
    tracing::info!("GemKit stopped");
    Ok(())
}
