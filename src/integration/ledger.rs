//! CSV export of the lineage ledger.

use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LineageError, Result};
use crate::tracker::{Frame, GlobalId, LocalLabel, Occurrence, TrackId, TrackTable};

/// One ledger row in the exported column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRow {
    pub frame: Frame,
    #[serde(rename = "labelID")]
    pub label_id: LocalLabel,
    #[serde(rename = "trackID")]
    pub track_id: TrackId,
    #[serde(rename = "lineageID")]
    pub lineage_id: TrackId,
    #[serde(rename = "trackID_d1")]
    pub track_id_d1: Option<TrackId>,
    #[serde(rename = "trackID_d2")]
    pub track_id_d2: Option<TrackId>,
    pub split: u8,
    #[serde(rename = "trackID_mother")]
    pub track_id_mother: Option<TrackId>,
    pub first_frame: Frame,
    pub last_frame: Option<Frame>,
}

impl TrackRow {
    pub const HEADER: [&'static str; 10] = [
        "frame",
        "labelID",
        "trackID",
        "lineageID",
        "trackID_d1",
        "trackID_d2",
        "split",
        "trackID_mother",
        "first_frame",
        "last_frame",
    ];

    fn fields(&self) -> Vec<String> {
        vec![
            self.frame.to_string(),
            self.label_id.to_string(),
            self.track_id.to_string(),
            self.lineage_id.to_string(),
            optional(self.track_id_d1),
            optional(self.track_id_d2),
            self.split.to_string(),
            optional(self.track_id_mother),
            self.first_frame.to_string(),
            optional(self.last_frame),
        ]
    }
}

impl From<&Occurrence> for TrackRow {
    fn from(occ: &Occurrence) -> Self {
        let [d1, d2] = match occ.daughter_track_ids {
            Some([d1, d2]) => [Some(d1), Some(d2)],
            None => [None, None],
        };
        Self {
            frame: occ.frame,
            label_id: occ.local_label,
            track_id: occ.track_id,
            lineage_id: occ.lineage_id,
            track_id_d1: d1,
            track_id_d2: d2,
            split: u8::from(occ.split()),
            track_id_mother: occ.mother_track_id,
            first_frame: occ.first_frame,
            last_frame: occ.last_frame,
        }
    }
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Which channel-end markers to add to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellMarker {
    #[default]
    None,
    /// Flag the occurrence with the smallest centroid row per frame
    Top,
    /// Flag the occurrence with the largest centroid row per frame
    Bottom,
    Both,
}

impl CellMarker {
    fn top(self) -> bool {
        matches!(self, CellMarker::Top | CellMarker::Both)
    }

    fn bottom(self) -> bool {
        matches!(self, CellMarker::Bottom | CellMarker::Both)
    }
}

/// Optional ledger columns beyond the fixed ten.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LedgerOptions {
    /// Add `area`, `centroid_row`, `centroid_col`
    pub region_props: bool,
    pub cell_markers: CellMarker,
    /// Add a `chamber` column, for ledgers combining several chambers
    pub chamber: bool,
}

/// Streams track tables into a CSV ledger.
pub struct LedgerWriter<W: io::Write> {
    writer: csv::Writer<W>,
    options: LedgerOptions,
    header_written: bool,
}

impl LedgerWriter<File> {
    /// Create (or truncate) a ledger file.
    pub fn from_path(path: impl AsRef<Path>, options: LedgerOptions) -> Result<Self> {
        Ok(Self {
            writer: csv::Writer::from_path(path)?,
            options,
            header_written: false,
        })
    }
}

impl<W: io::Write> LedgerWriter<W> {
    pub fn new(inner: W, options: LedgerOptions) -> Self {
        Self {
            writer: csv::Writer::from_writer(inner),
            options,
            header_written: false,
        }
    }

    /// Column names in output order.
    pub fn columns(&self) -> Vec<&'static str> {
        let mut columns = TrackRow::HEADER.to_vec();
        if self.options.region_props {
            columns.extend(["area", "centroid_row", "centroid_col"]);
        }
        if self.options.cell_markers.top() {
            columns.push("top_most");
        }
        if self.options.cell_markers.bottom() {
            columns.push("bottom_most");
        }
        if self.options.chamber {
            columns.push("chamber");
        }
        columns
    }

    /// Append every occurrence of `table`.
    pub fn write_table(&mut self, table: &TrackTable) -> Result<()> {
        self.write_rows(table, None)
    }

    /// Append every occurrence of `table`, tagged with `chamber`.
    pub fn write_chamber(&mut self, chamber: usize, table: &TrackTable) -> Result<()> {
        self.write_rows(table, Some(chamber))
    }

    fn write_rows(&mut self, table: &TrackTable, chamber: Option<usize>) -> Result<()> {
        if !self.header_written {
            let columns = self.columns();
            self.writer.write_record(columns)?;
            self.header_written = true;
        }

        let markers = ChannelEnds::of(table);
        let marker = self.options.cell_markers;
        for occ in table {
            let mut record = TrackRow::from(occ).fields();
            if self.options.region_props {
                record.push(occ.region.area.to_string());
                record.push(occ.region.centroid_row.to_string());
                record.push(occ.region.centroid_col.to_string());
            }
            if marker.top() {
                record.push(flag(markers.is_top(occ)));
            }
            if marker.bottom() {
                record.push(flag(markers.is_bottom(occ)));
            }
            if self.options.chamber {
                record.push(optional(chamber));
            }
            self.writer.write_record(&record)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| LineageError::Io(e.into_error()))
    }
}

fn flag(on: bool) -> String {
    String::from(if on { "1" } else { "0" })
}

/// Per frame, the occurrences nearest to either end of the channel.
struct ChannelEnds {
    top: HashMap<Frame, (f64, GlobalId)>,
    bottom: HashMap<Frame, (f64, GlobalId)>,
}

impl ChannelEnds {
    fn of(table: &TrackTable) -> Self {
        let mut top: HashMap<Frame, (f64, GlobalId)> = HashMap::new();
        let mut bottom: HashMap<Frame, (f64, GlobalId)> = HashMap::new();
        for occ in table {
            let row = occ.region.centroid_row;
            top.entry(occ.frame)
                .and_modify(|best| {
                    if row < best.0 {
                        *best = (row, occ.global_id);
                    }
                })
                .or_insert((row, occ.global_id));
            bottom
                .entry(occ.frame)
                .and_modify(|best| {
                    if row > best.0 {
                        *best = (row, occ.global_id);
                    }
                })
                .or_insert((row, occ.global_id));
        }
        Self { top, bottom }
    }

    fn is_top(&self, occ: &Occurrence) -> bool {
        self.top.get(&occ.frame).is_some_and(|&(_, id)| id == occ.global_id)
    }

    fn is_bottom(&self, occ: &Occurrence) -> bool {
        self.bottom.get(&occ.frame).is_some_and(|&(_, id)| id == occ.global_id)
    }
}

/// Read the fixed ledger columns back; extra columns are ignored.
pub fn read_ledger<R: io::Read>(reader: R) -> Result<Vec<TrackRow>> {
    let mut reader = csv::Reader::from_reader(reader);
    let rows = reader.deserialize().collect::<std::result::Result<Vec<TrackRow>, _>>()?;
    Ok(rows)
}
