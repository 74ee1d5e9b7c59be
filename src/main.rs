use std::path::PathBuf;
use std::sync::Arc;
use clap::Parser;
use tracing::{info, Level};
use josim_tools::{
    analysis::{AnalysisError, CancelToken},
    config::Config,
    run::Session,
    ErrorContext, JosimToolsError, JosimToolsResult,
};

fn main_result(args: Args) -> JosimToolsResult<()> {
    tracing_subscriber::fmt()
        .with_max_level(args.level())
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    let config = Config::load(&args.config)?;

    let threads = args.threads.or(config.simulator.threads);
    if let Some(threads) = threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("build thread pool")?;
    }
    info!("using {} worker threads", rayon::current_num_threads());

    let session = Session::new(config)?;
    let adapter = Arc::new(session.josim_adapter()?);
    let report = session.run(adapter, CancelToken::new())?;

    print!("{}", report);
    Ok(())
}

fn main() {
    let args = Args::parse();
    if let Err(e) = main_result(args) {
        eprintln!("Err: {}", e);
        if let JosimToolsError::Analysis(AnalysisError::Aborted { partial, .. }) = &e {
            eprint!("{}", partial);
        }
        std::process::exit(1);
    }
}

#[derive(Parser, Debug)]
#[command(name = "josim-tools")]
#[command(about = "Margin, yield and optimization analysis with JoSIM", long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Number of simulations run at once
    #[arg(short, long)]
    threads: Option<usize>,
}

impl Args {
    pub fn level(&self) -> Level {
        if self.verbose { Level::DEBUG } else { Level::INFO }
    }
}
