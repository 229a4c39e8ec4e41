mod aggregator;
mod analysis;
mod config;
mod error;
mod heatmap;
mod loader;
mod models;
mod pipeline;
mod prompt;
mod scraper;
mod storage;
mod utils;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::io::{self, IsTerminal};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::AppConfig;
use crate::models::DateRange;
use crate::pipeline::Pipeline;

#[derive(Parser)]
#[command(name = "ftse-corr", about = "FTSE 100 price download and correlation heatmap", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(clap::Args)]
struct RangeArgs {
    /// First day of history (YYYY-MM-DD); prompted for when omitted
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Last day of history (YYYY-MM-DD), default today
    #[arg(long, requires = "start")]
    end: Option<NaiveDate>,
}

#[derive(Subcommand)]
enum Command {
    /// Show the stored constituent list, scraping it first with --reload
    Tickers {
        #[arg(long)]
        reload: bool,
    },

    /// Download daily prices for every stored ticker
    Fetch {
        #[command(flatten)]
        range: RangeArgs,

        /// Delete all existing price files and download everything again
        #[arg(long)]
        refresh: bool,

        /// Re-scrape the constituent list before downloading
        #[arg(long)]
        reload_tickers: bool,
    },

    /// Join adjusted closes from the price files into the merged table
    Compile,

    /// Show the correlation heatmap of the merged table
    Render {
        /// Print the matrix as text instead of opening the interactive view
        #[arg(long)]
        print: bool,
    },

    /// Whole pipeline; asks which stages to reload unless told by flags
    Run {
        #[command(flatten)]
        range: RangeArgs,

        #[arg(long)]
        reload_tickers: Option<bool>,

        #[arg(long)]
        reload_data: Option<bool>,
    },
}

impl RangeArgs {
    fn resolve(&self) -> Result<DateRange> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Ok(DateRange::new(start, end)),
            (Some(start), None) => Ok(DateRange::until_today(start)),
            _ => prompt::prompt_date_range(&mut io::stdin().lock(), &mut io::stdout()),
        }
    }
}

fn ask(question: &str) -> Result<bool> {
    prompt::ask_yes_no(&mut io::stdin().lock(), &mut io::stdout(), question)
}

fn render(pipeline: &Pipeline, print: bool) -> Result<()> {
    let matrix = pipeline.load_matrix()?;
    if print || !io::stdout().is_terminal() {
        print!("{}", heatmap::render_text(&matrix));
        Ok(())
    } else {
        heatmap::view::run(matrix)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "ftse_corr=info,warn",
        1 => "ftse_corr=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false).with_writer(io::stderr))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;
    let pipeline = Pipeline::new(&config)?;

    match cli.command {
        Command::Tickers { reload } => {
            let tickers = pipeline.tickers(reload).await?;
            println!("{} tickers:", tickers.len());
            for t in &tickers {
                println!("  {}", t);
            }
        }

        Command::Fetch {
            range,
            refresh,
            reload_tickers,
        } => {
            let tickers = pipeline.tickers(reload_tickers).await?;
            let range = range.resolve()?;
            let _t = utils::Timer::start("Price download");
            let report = pipeline.fetch_all(&tickers, &range, refresh).await?;
            info!(
                "Done: {} fetched, {} already present, {} failed",
                report.fetched(),
                report.already_present(),
                report.failed()
            );
        }

        Command::Compile => {
            let tickers = pipeline.tickers(false).await?;
            let _t = utils::Timer::start("Compile");
            let report = pipeline.compile(&tickers)?;
            info!("Done: {} joined, {} skipped", report.joined(), report.skipped());
        }

        Command::Render { print } => render(&pipeline, print)?,

        Command::Run {
            range,
            reload_tickers,
            reload_data,
        } => {
            let reload_tickers = match reload_tickers {
                Some(v) => v,
                None => ask("\nReload list of FTSE100 tickers? (y/n): ")?,
            };
            let reload_data = match reload_data {
                Some(v) => v,
                None => ask("\nReload ticker data? (y/n): ")?,
            };

            let tickers = pipeline.tickers(reload_tickers).await?;
            if reload_data || pipeline.has_missing_prices(&tickers) {
                let range = range.resolve()?;
                let _t = utils::Timer::start("Price download");
                pipeline.fetch_all(&tickers, &range, reload_data).await?;
            }
            {
                let _t = utils::Timer::start("Compile");
                pipeline.compile(&tickers)?;
            }
            render(&pipeline, false)?;
        }
    }

    Ok(())
}
