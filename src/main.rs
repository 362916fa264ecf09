use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod controller;
mod domain;
mod filter;
mod inputter;
mod model;
mod paginator;
mod session;
mod table;
mod ui;
mod workbook;

use controller::Controller;
use domain::{PAGE_SIZE, SVConfig, SVError};
use model::{Model, Status, expand_path};
use ui::TableUI;

/// Search and page through the rows of a spreadsheet
#[derive(Parser, Debug)]
#[command(name = "sv", version, about, long_about = None)]
struct Args {
    /// Workbook to open (xlsx, xls, ods, csv, parquet, arrow)
    #[arg(value_name = "PATH")]
    path: Option<PathBuf>,

    /// Sheet to show instead of the first one
    #[arg(short, long)]
    sheet: Option<String>,

    /// Restrict the search to this column
    #[arg(short, long)]
    category: Option<String>,

    /// Initial search term
    #[arg(short = 'f', long)]
    search: Option<String>,

    /// Rows per page
    #[arg(long, default_value_t = PAGE_SIZE)]
    page_size: usize,

    /// Event poll time in milliseconds
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,

    /// Maximum rendered column width
    #[arg(long, default_value_t = 30)]
    max_column_width: usize,

    /// Log file, the terminal is used by the UI
    #[arg(long, default_value = "sv.log")]
    log_file: PathBuf,
}

impl Args {
    fn into_config(self) -> Result<SVConfig, SVError> {
        let mut cfg = SVConfig::default()
            .page_size(self.page_size)
            .event_poll_time(self.poll_ms)
            .max_column_width(self.max_column_width)
            .log_file(self.log_file);
        cfg.path = self.path.map(|p| expand_path(&p.to_string_lossy()));
        cfg.sheet = self.sheet;
        cfg.category = self.category;
        cfg.search = self.search;
        cfg.validate()
    }
}

fn init_logging(cfg: &SVConfig) -> Result<(), SVError> {
    let file = File::create(&cfg.log_file)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn main() -> ExitCode {
    let result = Args::parse().into_config().and_then(|cfg| {
        init_logging(&cfg)?;
        run(&cfg)
    });
    match result {
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn run(cfg: &SVConfig) -> Result<(), SVError> {
    info!("Starting sv with {:?}", cfg);

    let model = Model::init(cfg);
    let mut terminal = ratatui::init();
    let result = event_loop(cfg, model, &mut terminal);
    ratatui::restore();

    info!("Quitting sv");
    result
}

fn event_loop(
    cfg: &SVConfig,
    mut model: Model,
    terminal: &mut ratatui::DefaultTerminal,
) -> Result<(), SVError> {
    let ui = TableUI::new(cfg);
    let controller = Controller::new(cfg);

    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Handle events and map to a Message
        let message = controller.handle_event(&model)?;
        model.update(message)?;
    }
    Ok(())
}
