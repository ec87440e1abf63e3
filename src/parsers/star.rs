use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

/// Per-sample fields extracted from a STAR `Log.final.out` summary.
///
/// Every raw field is optional: a pattern that never matched leaves its field
/// `None`, which is also how the fields serialize (absent, not null or zero).
/// The three `unmapped_*` counts are not present in the log itself and are
/// reconstructed from the published percentages.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct AlignmentStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_reads: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_input_read_length: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uniquely_mapped: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uniquely_mapped_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_mapped_read_length: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_splices: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_annotated_splices: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_gtag_splices: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_gcag_splices: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_atac_splices: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_noncanonical_splices: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mismatch_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion_length: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insertion_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insertion_length: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multimapped: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multimapped_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multimapped_toomany: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multimapped_toomany_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unmapped_mismatches_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unmapped_tooshort_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unmapped_other_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unmapped_mismatches: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unmapped_tooshort: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unmapped_other: Option<u64>,
}

struct Patterns {
    total_reads: Regex,
    avg_input_read_length: Regex,
    uniquely_mapped: Regex,
    uniquely_mapped_percent: Regex,
    avg_mapped_read_length: Regex,
    num_splices: Regex,
    num_annotated_splices: Regex,
    num_gtag_splices: Regex,
    num_gcag_splices: Regex,
    num_atac_splices: Regex,
    num_noncanonical_splices: Regex,
    mismatch_rate: Regex,
    deletion_rate: Regex,
    deletion_length: Regex,
    insertion_rate: Regex,
    insertion_length: Regex,
    multimapped: Regex,
    multimapped_percent: Regex,
    multimapped_toomany: Regex,
    multimapped_toomany_percent: Regex,
    unmapped_mismatches_percent: Regex,
    unmapped_tooshort_percent: Regex,
    unmapped_other_percent: Regex,
}

lazy_static! {
    static ref PATTERNS: Patterns = Patterns {
        total_reads: Regex::new(r"Number of input reads \|\s+(\d+)").unwrap(),
        avg_input_read_length: Regex::new(r"Average input read length \|\s+([\d\.]+)").unwrap(),
        uniquely_mapped: Regex::new(r"Uniquely mapped reads number \|\s+(\d+)").unwrap(),
        uniquely_mapped_percent: Regex::new(r"Uniquely mapped reads % \|\s+([\d\.]+)").unwrap(),
        avg_mapped_read_length: Regex::new(r"Average mapped length \|\s+([\d\.]+)").unwrap(),
        num_splices: Regex::new(r"Number of splices: Total \|\s+(\d+)").unwrap(),
        num_annotated_splices: Regex::new(r"Number of splices: Annotated \(sjdb\) \|\s+(\d+)")
            .unwrap(),
        num_gtag_splices: Regex::new(r"Number of splices: GT/AG \|\s+(\d+)").unwrap(),
        num_gcag_splices: Regex::new(r"Number of splices: GC/AG \|\s+(\d+)").unwrap(),
        num_atac_splices: Regex::new(r"Number of splices: AT/AC \|\s+(\d+)").unwrap(),
        num_noncanonical_splices: Regex::new(r"Number of splices: Non-canonical \|\s+(\d+)")
            .unwrap(),
        mismatch_rate: Regex::new(r"Mismatch rate per base, % \|\s+([\d\.]+)").unwrap(),
        deletion_rate: Regex::new(r"Deletion rate per base \|\s+([\d\.]+)").unwrap(),
        deletion_length: Regex::new(r"Deletion average length \|\s+([\d\.]+)").unwrap(),
        insertion_rate: Regex::new(r"Insertion rate per base \|\s+([\d\.]+)").unwrap(),
        insertion_length: Regex::new(r"Insertion average length \|\s+([\d\.]+)").unwrap(),
        multimapped: Regex::new(r"Number of reads mapped to multiple loci \|\s+(\d+)").unwrap(),
        multimapped_percent: Regex::new(r"% of reads mapped to multiple loci \|\s+([\d\.]+)")
            .unwrap(),
        multimapped_toomany: Regex::new(r"Number of reads mapped to too many loci \|\s+(\d+)")
            .unwrap(),
        multimapped_toomany_percent: Regex::new(
            r"% of reads mapped to too many loci \|\s+([\d\.]+)"
        )
        .unwrap(),
        unmapped_mismatches_percent: Regex::new(
            r"% of reads unmapped: too many mismatches \|\s+([\d\.]+)"
        )
        .unwrap(),
        unmapped_tooshort_percent: Regex::new(r"% of reads unmapped: too short \|\s+([\d\.]+)")
            .unwrap(),
        unmapped_other_percent: Regex::new(r"% of reads unmapped: other \|\s+([\d\.]+)").unwrap(),
    };
}

fn capture_f64(re: &Regex, text: &str) -> Option<f64> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Extracts alignment summary fields from the full text of one log.
///
/// Returns `None` when not a single pattern matched, so callers can tell an
/// unrecognisable file apart from a log that genuinely reports zeros.
pub fn parse_alignment_log(text: &str) -> Option<AlignmentStats> {
    let p = &*PATTERNS;
    let mut stats = AlignmentStats {
        total_reads: capture_f64(&p.total_reads, text),
        avg_input_read_length: capture_f64(&p.avg_input_read_length, text),
        uniquely_mapped: capture_f64(&p.uniquely_mapped, text),
        uniquely_mapped_percent: capture_f64(&p.uniquely_mapped_percent, text),
        avg_mapped_read_length: capture_f64(&p.avg_mapped_read_length, text),
        num_splices: capture_f64(&p.num_splices, text),
        num_annotated_splices: capture_f64(&p.num_annotated_splices, text),
        num_gtag_splices: capture_f64(&p.num_gtag_splices, text),
        num_gcag_splices: capture_f64(&p.num_gcag_splices, text),
        num_atac_splices: capture_f64(&p.num_atac_splices, text),
        num_noncanonical_splices: capture_f64(&p.num_noncanonical_splices, text),
        mismatch_rate: capture_f64(&p.mismatch_rate, text),
        deletion_rate: capture_f64(&p.deletion_rate, text),
        deletion_length: capture_f64(&p.deletion_length, text),
        insertion_rate: capture_f64(&p.insertion_rate, text),
        insertion_length: capture_f64(&p.insertion_length, text),
        multimapped: capture_f64(&p.multimapped, text),
        multimapped_percent: capture_f64(&p.multimapped_percent, text),
        multimapped_toomany: capture_f64(&p.multimapped_toomany, text),
        multimapped_toomany_percent: capture_f64(&p.multimapped_toomany_percent, text),
        unmapped_mismatches_percent: capture_f64(&p.unmapped_mismatches_percent, text),
        unmapped_tooshort_percent: capture_f64(&p.unmapped_tooshort_percent, text),
        unmapped_other_percent: capture_f64(&p.unmapped_other_percent, text),
        unmapped_mismatches: None,
        unmapped_tooshort: None,
        unmapped_other: None,
    };

    if stats == AlignmentStats::default() {
        return None;
    }

    derive_unmapped_counts(&mut stats);
    Some(stats)
}

/// Reconstructs absolute unmapped-read counts from the published percentages.
///
/// The log only reports why reads went unmapped as percentages. The absolute
/// count per reason is the total unmapped count split proportionally across
/// the three reason percentages, rounded half away from zero. If any input
/// field is missing the derived fields are left absent.
fn derive_unmapped_counts(stats: &mut AlignmentStats) {
    let (Some(total_reads), Some(uniquely_mapped), Some(multimapped), Some(multimapped_toomany)) = (
        stats.total_reads,
        stats.uniquely_mapped,
        stats.multimapped,
        stats.multimapped_toomany,
    ) else {
        return;
    };
    let (Some(mismatches_percent), Some(tooshort_percent), Some(other_percent)) = (
        stats.unmapped_mismatches_percent,
        stats.unmapped_tooshort_percent,
        stats.unmapped_other_percent,
    ) else {
        return;
    };

    let total_mapped = uniquely_mapped + multimapped + multimapped_toomany;
    let unmapped_count = total_reads - total_mapped;
    let total_unmapped_percent = mismatches_percent + tooshort_percent + other_percent;
    if total_unmapped_percent <= 0.0 {
        return;
    }

    let share = |percent: f64| (unmapped_count * (percent / total_unmapped_percent)).round() as u64;
    stats.unmapped_mismatches = Some(share(mismatches_percent));
    stats.unmapped_tooshort = Some(share(tooshort_percent));
    stats.unmapped_other = Some(share(other_percent));
}
