use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Summarise RNA-seq aligner and taxonomic classifier logs into cross-sample report tables."
)]
pub struct Cli {
    // Directory scanned recursively for tool logs
    #[arg(short = 'd', long = "dir", default_value = ".")]
    pub analysis_dir: PathBuf,
    #[arg(short, long, default_value = "seqsum_data")]
    pub output: PathBuf,
    /// Filename glob for aligner summary logs
    #[arg(long, default_value = "*Log.final.out")]
    pub alignment_glob: String,
    /// Filename glob for taxonomic classification reports
    #[arg(long, default_value = "*.kreport")]
    pub taxonomy_glob: String,
    /// Sample names (exact or glob) dropped from the final dataset
    #[arg(long = "ignore")]
    pub ignore: Vec<String>,
    #[arg(short, long)]
    pub verbose: bool,
}
