use crate::aggregate::Dataset;
use crate::parsers::kraken::TaxonomySummary;
use crate::parsers::star::AlignmentStats;
use color_eyre::eyre::{Context, Result};
use fxhash::FxHashMap;
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use std::fs;
use std::path::{Path, PathBuf};

/// Display gradient for a table column, named after a colour-brewer scale.
#[derive(Debug, Clone, Serialize)]
pub struct ColorScale {
    pub name: &'static str,
    pub min: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnDef {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<ColorScale>,
}

/// The shared cross-module general-statistics table.
///
/// Each module appends its column definitions and fills per-sample cells with
/// already-formatted values. Modules contribute sequentially through an
/// exclusive reference, so a cell is only ever written by one module.
#[derive(Debug, Default)]
pub struct GeneralStats {
    columns: Vec<ColumnDef>,
    order: Vec<String>,
    rows: FxHashMap<String, FxHashMap<&'static str, String>>,
}

impl GeneralStats {
    pub fn new() -> Self {
        GeneralStats::default()
    }

    pub fn add_column(&mut self, column: ColumnDef) {
        self.columns.push(column);
    }

    pub fn set(&mut self, sample: &str, column_id: &'static str, value: String) {
        if !self.rows.contains_key(sample) {
            self.order.push(sample.to_string());
        }
        self.rows
            .entry(sample.to_string())
            .or_default()
            .insert(column_id, value);
    }

    pub fn get(&self, sample: &str, column_id: &str) -> Option<&str> {
        self.rows
            .get(sample)
            .and_then(|row| row.get(column_id))
            .map(String::as_str)
    }
}

impl Serialize for GeneralStats {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("GeneralStats", 2)?;
        state.serialize_field("columns", &self.columns)?;
        state.serialize_field("rows", &Rows(self))?;
        state.end()
    }
}

struct Rows<'a>(&'a GeneralStats);

impl Serialize for Rows<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.order.len()))?;
        for sample in &self.0.order {
            map.serialize_entry(sample, &Row(self.0, sample))?;
        }
        map.end()
    }
}

struct Row<'a>(&'a GeneralStats, &'a str);

impl Serialize for Row<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // cells come out in declared column order
        let values = &self.0.rows[self.1];
        let mut map = serializer.serialize_map(None)?;
        for column in &self.0.columns {
            if let Some(value) = values.get(column.id) {
                map.serialize_entry(column.id, value)?;
            }
        }
        map.end()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartCategory {
    pub id: &'static str,
    pub name: &'static str,
    pub color: &'static str,
}

#[derive(Debug, Serialize)]
pub struct BarChartSample {
    pub sample: String,
    // one slot per category, absent fields stay absent
    pub values: Vec<Option<f64>>,
}

/// Stacked bar chart payload over a fixed, ordered category list.
#[derive(Debug, Serialize)]
pub struct BarChart {
    pub title: &'static str,
    pub ylab: &'static str,
    pub counts_label: &'static str,
    pub categories: Vec<ChartCategory>,
    pub samples: Vec<BarChartSample>,
}

pub fn format_percent(value: f64) -> String {
    format!("{value:.1}%")
}

pub fn format_millions(value: f64) -> String {
    format!("{:.1}", value / 1_000_000.0)
}

/// Adds the aligner columns to the general-statistics table.
pub fn alignment_general_stats(data: &Dataset<AlignmentStats>, table: &mut GeneralStats) {
    table.add_column(ColumnDef {
        id: "uniquely_mapped_percent",
        title: "% Mapped",
        description: "STAR: % Uniquely mapped reads",
        scale: Some(ColorScale {
            name: "YlGn",
            min: 0.0,
            max: Some(100.0),
        }),
    });
    table.add_column(ColumnDef {
        id: "uniquely_mapped",
        title: "M Mapped",
        description: "STAR: Uniquely mapped reads (millions)",
        scale: Some(ColorScale {
            name: "PuRd",
            min: 0.0,
            max: None,
        }),
    });

    for (sample, stats) in data.iter() {
        if let Some(percent) = stats.uniquely_mapped_percent {
            table.set(sample, "uniquely_mapped_percent", format_percent(percent));
        }
        if let Some(count) = stats.uniquely_mapped {
            table.set(sample, "uniquely_mapped", format_millions(count));
        }
    }
}

/// Adds the classification columns to the general-statistics table.
pub fn taxonomy_general_stats(data: &Dataset<TaxonomySummary>, table: &mut GeneralStats) {
    table.add_column(ColumnDef {
        id: "percent_unclassified",
        title: "% Unclassified",
        description: "Kraken: % of reads left unclassified",
        scale: Some(ColorScale {
            name: "OrRd",
            min: 0.0,
            max: Some(100.0),
        }),
    });
    table.add_column(ColumnDef {
        id: "taxonomy_total_reads",
        title: "M Reads",
        description: "Kraken: total reads in the report (millions)",
        scale: Some(ColorScale {
            name: "Blues",
            min: 0.0,
            max: None,
        }),
    });

    for (sample, summary) in data.iter() {
        table.set(
            sample,
            "percent_unclassified",
            format_percent(summary.percent_unclassified),
        );
        table.set(
            sample,
            "taxonomy_total_reads",
            format_millions(summary.total_reads as f64),
        );
    }
}

/// Builds the alignment-scores bar chart payload.
pub fn alignment_bar_chart(data: &Dataset<AlignmentStats>) -> BarChart {
    let categories = vec![
        ChartCategory {
            id: "uniquely_mapped",
            name: "Uniquely mapped",
            color: "#437bb1",
        },
        ChartCategory {
            id: "multimapped",
            name: "Mapped to multiple loci",
            color: "#7cb5ec",
        },
        ChartCategory {
            id: "multimapped_toomany",
            name: "Mapped to too many loci",
            color: "#f7a35c",
        },
        ChartCategory {
            id: "unmapped_mismatches",
            name: "Unmapped: too many mismatches",
            color: "#e63491",
        },
        ChartCategory {
            id: "unmapped_tooshort",
            name: "Unmapped: too short",
            color: "#b1084c",
        },
        ChartCategory {
            id: "unmapped_other",
            name: "Unmapped: other",
            color: "#7f0000",
        },
    ];

    let samples = data
        .iter()
        .map(|(sample, stats)| BarChartSample {
            sample: sample.to_string(),
            values: vec![
                stats.uniquely_mapped,
                stats.multimapped,
                stats.multimapped_toomany,
                stats.unmapped_mismatches.map(|count| count as f64),
                stats.unmapped_tooshort.map(|count| count as f64),
                stats.unmapped_other.map(|count| count as f64),
            ],
        })
        .collect();

    BarChart {
        title: "STAR Alignment Scores",
        ylab: "# Reads",
        counts_label: "Number of Reads",
        categories,
        samples,
    }
}

/// Writes one payload as pretty JSON into the output directory.
pub fn write_data_file<T: Serialize>(value: &T, dir: &Path, name: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .wrap_err_with(|| format!("Failed to create output directory: {}", dir.display()))?;
    let path = dir.join(name);
    let json = serde_json::to_string_pretty(value)?;
    fs::write(&path, json)
        .wrap_err_with(|| format!("Failed to write data file: {}", path.display()))?;
    Ok(path)
}
