use chrono::Local;
use clap::Parser;
use color_eyre::Result;
use env_logger::fmt::Color;
use env_logger::Builder;
use log::LevelFilter;
use std::io::Write;

pub mod aggregate;
pub mod locate;
pub mod parsers;
pub mod report;
pub use crate::cli::Cli;
pub mod cli;
pub mod seqsum;

use seqsum::Seqsum;

/// Initializes and configures the logger.
///
/// This function sets up the logger for the application. When verbosity is enabled, log messages
/// at the `Debug` level and above are output, else "Info" level is output.
///
/// # Arguments
///
/// * `verbose` - A boolean flag indicating whether verbose logging should be enabled.
fn init_logging(verbose: bool) {
    let level_filter = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    Builder::new()
        .format(|buf, record| {
            let mut style = buf.style();
            style.set_color(match record.level() {
                log::Level::Trace => Color::Magenta,
                log::Level::Debug => Color::Blue,
                log::Level::Info => Color::Green,
                log::Level::Warn => Color::Yellow,
                log::Level::Error => Color::Red,
            });

            writeln!(
                buf,
                "{} [{}] - {}",
                Local::now().format("[%H:%M:%S]"),
                style.value(record.level()),
                record.args()
            )
        })
        .filter(None, level_filter)
        .init();
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Cli::parse();
    init_logging(args.verbose);

    let mut app = Seqsum::new(args);
    app.run()?;

    Ok(())
}
