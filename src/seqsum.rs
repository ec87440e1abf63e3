use crate::aggregate::{Dataset, IgnoreList};
use crate::locate::{find_log_files, read_log};
use crate::parsers::kraken::{self, TaxonomySummary};
use crate::parsers::star::{self, AlignmentStats};
use crate::report::{self, GeneralStats};
use crate::Cli;
use color_eyre::Result;
use log::{debug, info, warn};

/// Batch pipeline over one analysis directory: locate logs, parse them,
/// aggregate per sample, then emit the report payloads. Runs to completion,
/// one file at a time.
pub struct Seqsum {
    args: Cli,
    alignment_data: Dataset<AlignmentStats>,
    taxonomy_data: Dataset<TaxonomySummary>,
    general_stats: GeneralStats,
}

impl Seqsum {
    pub fn new(args: Cli) -> Self {
        Self {
            args,
            alignment_data: Dataset::new(),
            taxonomy_data: Dataset::new(),
            general_stats: GeneralStats::new(),
        }
    }

    fn collect_alignment_reports(&mut self) -> Result<()> {
        let files = find_log_files(&self.args.analysis_dir, &self.args.alignment_glob)?;
        for file in files {
            let content = read_log(&file.path)?;
            match star::parse_alignment_log(&content) {
                Some(stats) => {
                    self.alignment_data.insert(&file.sample, stats);
                }
                None => debug!("No alignment fields found in {}", file.path.display()),
            }
        }
        Ok(())
    }

    fn collect_taxonomy_reports(&mut self) -> Result<()> {
        let files = find_log_files(&self.args.analysis_dir, &self.args.taxonomy_glob)?;
        for file in files {
            let content = read_log(&file.path)?;
            match kraken::parse_taxonomy_report(&content) {
                Some(tree) => {
                    for index in tree.validate_clade_counts() {
                        warn!(
                            "Clade count below the sum of its children for taxon '{}' in {}",
                            tree.nodes[index].name,
                            file.path.display()
                        );
                    }
                    self.taxonomy_data.insert(&file.sample, tree.summary());
                }
                None => debug!("No taxonomy records found in {}", file.path.display()),
            }
        }
        Ok(())
    }

    fn emit_alignment_report(&mut self) -> Result<()> {
        info!("Found {} alignment reports", self.alignment_data.len());
        report::alignment_general_stats(&self.alignment_data, &mut self.general_stats);
        let chart = report::alignment_bar_chart(&self.alignment_data);
        report::write_data_file(&self.alignment_data, &self.args.output, "seqsum_star.json")?;
        report::write_data_file(&chart, &self.args.output, "seqsum_star_alignment_plot.json")?;
        Ok(())
    }

    fn emit_taxonomy_report(&mut self) -> Result<()> {
        info!("Found {} classification reports", self.taxonomy_data.len());
        report::taxonomy_general_stats(&self.taxonomy_data, &mut self.general_stats);
        report::write_data_file(&self.taxonomy_data, &self.args.output, "seqsum_kraken.json")?;
        Ok(())
    }

    pub fn run(&mut self) -> Result<()> {
        info!(
            "Starting seqsum at {}",
            chrono::Local::now().format("%H:%M:%S")
        );

        self.collect_alignment_reports()?;
        self.collect_taxonomy_reports()?;

        let ignore = IgnoreList::new(&self.args.ignore);
        self.alignment_data.retain_not_ignored(&ignore);
        self.taxonomy_data.retain_not_ignored(&ignore);

        let duplicates = self.alignment_data.duplicates() + self.taxonomy_data.duplicates();
        if duplicates > 0 {
            info!("{duplicates} duplicate sample names were overwritten");
        }

        if self.alignment_data.is_empty() && self.taxonomy_data.is_empty() {
            info!("No tool logs found, nothing to report");
            return Ok(());
        }

        if self.alignment_data.is_empty() {
            info!("No aligner summary logs found, skipping the alignment report");
        } else {
            self.emit_alignment_report()?;
        }
        if self.taxonomy_data.is_empty() {
            info!("No classification reports found, skipping the taxonomy report");
        } else {
            self.emit_taxonomy_report()?;
        }
        report::write_data_file(
            &self.general_stats,
            &self.args.output,
            "seqsum_general_stats.json",
        )?;

        info!("Complete at {}", chrono::Local::now().format("%H:%M:%S"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    const ALIGNMENT_LOG: &str = "\
                                 Started job on |\tOct 30 12:00:01
                             Started mapping on |\tOct 30 12:00:05
                                    Finished on |\tOct 30 12:10:03
       Mapping speed, Million of reads per hour |\t211.10

                          Number of input reads |\t1000000
                      Average input read length |\t98
                                    UNIQUE READS:
                   Uniquely mapped reads number |\t900000
                        Uniquely mapped reads % |\t90.00%
                          Average mapped length |\t97.42
                       Number of splices: Total |\t71167
                      Mismatch rate per base, % |\t0.44%
                             MULTI-MAPPING READS:
        Number of reads mapped to multiple loci |\t0
             % of reads mapped to multiple loci |\t0.00%
        Number of reads mapped to too many loci |\t0
             % of reads mapped to too many loci |\t0.00%
                                  UNMAPPED READS:
       % of reads unmapped: too many mismatches |\t0.00%
                 % of reads unmapped: too short |\t9.50%
                     % of reads unmapped: other |\t0.50%
";

    const TAXONOMY_REPORT: &str = "\
 20.00\t200000\t200000\tU\t0\tunclassified
 80.00\t800000\t100\tR\t1\troot
 79.00\t790000\t5000\tD\t2\t  Bacteria
 60.00\t600000\t595000\tS\t1280\t    Staphylococcus aureus
";

    fn cli_for(dir: &Path, output: &Path, ignore: Vec<String>) -> Cli {
        Cli {
            analysis_dir: dir.to_path_buf(),
            output: output.to_path_buf(),
            alignment_glob: "*Log.final.out".to_string(),
            taxonomy_glob: "*.kreport".to_string(),
            ignore,
            verbose: false,
        }
    }

    #[test]
    fn test_full_run_produces_report_files() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("report_data");
        fs::write(dir.path().join("sample_1_Log.final.out"), ALIGNMENT_LOG).unwrap();
        fs::write(dir.path().join("sample_1.kreport"), TAXONOMY_REPORT).unwrap();

        let mut app = Seqsum::new(cli_for(dir.path(), &output, Vec::new()));
        app.run().unwrap();

        // the fixed log renders as 90.0% mapped and 0.9 million uniquely mapped
        assert_eq!(
            app.general_stats.get("sample_1", "uniquely_mapped_percent"),
            Some("90.0%")
        );
        assert_eq!(
            app.general_stats.get("sample_1", "uniquely_mapped"),
            Some("0.9")
        );
        assert_eq!(
            app.general_stats.get("sample_1", "percent_unclassified"),
            Some("20.0%")
        );

        for name in [
            "seqsum_star.json",
            "seqsum_star_alignment_plot.json",
            "seqsum_kraken.json",
            "seqsum_general_stats.json",
        ] {
            assert!(output.join(name).is_file(), "missing {name}");
        }

        let dump = fs::read_to_string(output.join("seqsum_star.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&dump).unwrap();
        assert_eq!(json["sample_1"]["total_reads"], 1000000.0);
        assert_eq!(json["sample_1"]["unmapped_tooshort"], 95000);
    }

    #[test]
    fn test_duplicate_sample_last_write_wins() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("report_data");
        // both files infer the same sample name; the later-sorted path wins
        fs::write(dir.path().join("sample_1_Log.final.out"), ALIGNMENT_LOG).unwrap();
        fs::create_dir(dir.path().join("second_pass")).unwrap();
        let rerun_log = ALIGNMENT_LOG.replace("1000000", "2000000");
        fs::write(
            dir.path().join("second_pass").join("sample_1.Log.final.out"),
            rerun_log,
        )
        .unwrap();

        let mut app = Seqsum::new(cli_for(dir.path(), &output, Vec::new()));
        app.run().unwrap();

        assert_eq!(app.alignment_data.len(), 1);
        assert_eq!(app.alignment_data.duplicates(), 1);
        let stats = app.alignment_data.get("sample_1").unwrap();
        assert_eq!(stats.total_reads, Some(2000000.0));
    }

    #[test]
    fn test_ignored_sample_never_reported() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("report_data");
        fs::write(dir.path().join("keep_me_Log.final.out"), ALIGNMENT_LOG).unwrap();
        fs::write(dir.path().join("drop_me_Log.final.out"), ALIGNMENT_LOG).unwrap();

        let ignore = vec!["drop_*".to_string()];
        let mut app = Seqsum::new(cli_for(dir.path(), &output, ignore));
        app.run().unwrap();

        assert!(app.alignment_data.get("keep_me").is_some());
        assert!(app.alignment_data.get("drop_me").is_none());
        assert_eq!(app.general_stats.get("drop_me", "uniquely_mapped"), None);
    }

    #[test]
    fn test_empty_run_is_not_an_error() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("report_data");

        let mut app = Seqsum::new(cli_for(dir.path(), &output, Vec::new()));
        app.run().unwrap();

        assert!(app.alignment_data.is_empty());
        assert!(app.taxonomy_data.is_empty());
        // nothing to report means nothing gets written
        assert!(!output.exists());
    }

    #[test]
    fn test_unparseable_log_skipped_without_error() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("report_data");
        fs::write(dir.path().join("good_Log.final.out"), ALIGNMENT_LOG).unwrap();
        fs::write(dir.path().join("bad_Log.final.out"), "not a real log\n").unwrap();

        let mut app = Seqsum::new(cli_for(dir.path(), &output, Vec::new()));
        app.run().unwrap();

        assert_eq!(app.alignment_data.len(), 1);
        assert!(app.alignment_data.get("good").is_some());
    }
}
