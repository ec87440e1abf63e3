use color_eyre::{eyre::bail, eyre::eyre, eyre::Context, Result};
use log::warn;
use serde::Serialize;

/// Taxonomic rank letters used by Kraken-style classification reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RankCode {
    Unclassified,
    Root,
    Domain,
    Kingdom,
    Phylum,
    Class,
    Order,
    Family,
    Genus,
    Species,
    Unranked,
}

impl RankCode {
    fn from_letter(letter: char) -> Option<RankCode> {
        match letter {
            'U' => Some(RankCode::Unclassified),
            'R' => Some(RankCode::Root),
            'D' => Some(RankCode::Domain),
            'K' => Some(RankCode::Kingdom),
            'P' => Some(RankCode::Phylum),
            'C' => Some(RankCode::Class),
            'O' => Some(RankCode::Order),
            'F' => Some(RankCode::Family),
            'G' => Some(RankCode::Genus),
            'S' => Some(RankCode::Species),
            '-' => Some(RankCode::Unranked),
            _ => None,
        }
    }
}

/// A rank column value: a major rank letter plus an optional sub-rank digit,
/// e.g. `S` (species) or `S1` (below-species grouping). Sub-ranks stay
/// distinct nodes in the tree and are never folded into their major rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rank {
    pub code: RankCode,
    pub subrank: Option<u8>,
}

impl Rank {
    pub fn parse(field: &str) -> Option<Rank> {
        let field = field.trim();
        let mut chars = field.chars();
        let code = RankCode::from_letter(chars.next()?)?;
        let rest = chars.as_str();
        if rest.is_empty() {
            return Some(Rank {
                code,
                subrank: None,
            });
        }
        rest.parse::<u8>().ok().map(|sub| Rank {
            code,
            subrank: Some(sub),
        })
    }

    fn is_major(&self, code: RankCode) -> bool {
        self.code == code && self.subrank.is_none()
    }
}

/// One node of the reconstructed taxonomy, held in an arena.
/// Parent/child links are indices into [`TaxonomyReport::nodes`].
#[derive(Debug, Clone)]
pub struct TaxonNode {
    pub percent: f64,
    pub clade_count: u64,
    pub direct_count: u64,
    pub rank: Rank,
    pub taxon_id: u32,
    pub depth: usize,
    pub name: String,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct TaxonomyReport {
    pub nodes: Vec<TaxonNode>,
}

/// Flattened per-sample metrics for the cross-sample summary table.
/// Per-rank percentages count reads assigned at exactly that major rank.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaxonomySummary {
    pub total_reads: u64,
    pub classified_reads: u64,
    pub percent_unclassified: f64,
    pub percent_domain: f64,
    pub percent_kingdom: f64,
    pub percent_phylum: f64,
    pub percent_class: f64,
    pub percent_order: f64,
    pub percent_family: f64,
    pub percent_genus: f64,
    pub percent_species: f64,
}

struct ReportLine {
    percent: f64,
    clade_count: u64,
    direct_count: u64,
    rank: Rank,
    taxon_id: u32,
    depth: usize,
    name: String,
}

fn parse_report_line(line: &str) -> Result<ReportLine> {
    let mut fields = line.split('\t');

    let percent_field = fields
        .next()
        .ok_or_else(|| eyre!("Missing percent field in the classification report"))?;
    let clade_count_field = fields
        .next()
        .ok_or_else(|| eyre!("Missing clade count field in the classification report"))?;
    let direct_count_field = fields
        .next()
        .ok_or_else(|| eyre!("Missing direct count field in the classification report"))?;
    let rank_field = fields
        .next()
        .ok_or_else(|| eyre!("Missing rank code field in the classification report"))?;
    let taxon_id_field = fields
        .next()
        .ok_or_else(|| eyre!("Missing taxon ID field in the classification report"))?;
    let name_field = fields
        .next()
        .ok_or_else(|| eyre!("Missing taxon name field in the classification report"))?;
    if fields.next().is_some() {
        bail!("Invalid report line format: Expected 6 tab-separated fields, but got more");
    }

    let percent = percent_field
        .trim()
        .parse::<f64>()
        .wrap_err_with(|| format!("Error parsing percent value: '{percent_field}'"))?;
    let clade_count = clade_count_field
        .trim()
        .parse::<u64>()
        .wrap_err_with(|| format!("Error parsing clade count: '{clade_count_field}'"))?;
    let direct_count = direct_count_field
        .trim()
        .parse::<u64>()
        .wrap_err_with(|| format!("Error parsing direct count: '{direct_count_field}'"))?;
    let rank = Rank::parse(rank_field).ok_or_else(|| eyre!("Unknown rank code: '{rank_field}'"))?;
    let taxon_id = taxon_id_field
        .trim()
        .parse::<u32>()
        .wrap_err_with(|| format!("Error parsing taxon ID: '{taxon_id_field}'"))?;

    // two spaces of name indentation per tree level
    let depth = name_field.chars().take_while(|&c| c == ' ').count() / 2;

    Ok(ReportLine {
        percent,
        clade_count,
        direct_count,
        rank,
        taxon_id,
        depth,
        name: name_field.trim().to_string(),
    })
}

/// Reconstructs the taxonomy tree from the full text of one report.
///
/// Each line becomes a node attached to the most recent ancestor with a
/// smaller depth, so depth jumps in malformed input land on the nearest
/// valid ancestor instead of failing. Lines that do not parse are skipped
/// with a warning. Returns `None` when no line parsed at all, which is
/// distinct from a report that parsed but holds zero reads.
pub fn parse_taxonomy_report(text: &str) -> Option<TaxonomyReport> {
    let mut nodes: Vec<TaxonNode> = Vec::new();
    let mut prev_index: Option<usize> = None;

    for (line_idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record = match parse_report_line(line) {
            Ok(record) => record,
            Err(err) => {
                warn!(
                    "Skipping malformed classification report line {}: {err}",
                    line_idx + 1
                );
                continue;
            }
        };

        // walk up the ancestor chain until something shallower than the new node
        let mut parent_index = prev_index;
        while let Some(index) = parent_index {
            if nodes[index].depth < record.depth {
                break;
            }
            parent_index = nodes[index].parent;
        }

        let curr_index = nodes.len();
        nodes.push(TaxonNode {
            percent: record.percent,
            clade_count: record.clade_count,
            direct_count: record.direct_count,
            rank: record.rank,
            taxon_id: record.taxon_id,
            depth: record.depth,
            name: record.name,
            parent: parent_index,
            children: Vec::new(),
        });
        if let Some(parent_index) = parent_index {
            nodes[parent_index].children.push(curr_index);
        }
        prev_index = Some(curr_index);
    }

    if nodes.is_empty() {
        return None;
    }
    Some(TaxonomyReport { nodes })
}

impl TaxonomyReport {
    pub fn roots(&self) -> impl Iterator<Item = &TaxonNode> {
        self.nodes.iter().filter(|node| node.parent.is_none())
    }

    /// Checks the clade-count invariant: a node's clade count covers every
    /// read in its subtree, so it can never be below the sum of its direct
    /// children's clade counts. Returns the indices of violating nodes;
    /// upstream output is reported on, not corrected.
    pub fn validate_clade_counts(&self) -> Vec<usize> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(index, node)| {
                let child_sum: u64 = node
                    .children
                    .iter()
                    .map(|&child| self.nodes[child].clade_count)
                    .sum();
                (node.clade_count < child_sum).then_some(index)
            })
            .collect()
    }

    pub fn summary(&self) -> TaxonomySummary {
        let total_reads: u64 = self.roots().map(|node| node.clade_count).sum();
        let unclassified_reads: u64 = self
            .roots()
            .filter(|node| node.rank.code == RankCode::Unclassified)
            .map(|node| node.clade_count)
            .sum();
        let classified_reads = total_reads - unclassified_reads;

        let percent = |reads: u64| {
            if total_reads == 0 {
                0.0
            } else {
                reads as f64 * 100.0 / total_reads as f64
            }
        };
        let percent_at_rank = |code: RankCode| {
            let direct: u64 = self
                .nodes
                .iter()
                .filter(|node| node.rank.is_major(code))
                .map(|node| node.direct_count)
                .sum();
            percent(direct)
        };

        TaxonomySummary {
            total_reads,
            classified_reads,
            percent_unclassified: percent(unclassified_reads),
            percent_domain: percent_at_rank(RankCode::Domain),
            percent_kingdom: percent_at_rank(RankCode::Kingdom),
            percent_phylum: percent_at_rank(RankCode::Phylum),
            percent_class: percent_at_rank(RankCode::Class),
            percent_order: percent_at_rank(RankCode::Order),
            percent_family: percent_at_rank(RankCode::Family),
            percent_genus: percent_at_rank(RankCode::Genus),
            percent_species: percent_at_rank(RankCode::Species),
        }
    }
}
