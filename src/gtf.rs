//! GTF (Gene Transfer Format) reading
//!
//! Lines are split and attributes decoded by `noodles::gtf`; this module turns
//! each record into an owned [`GtfRecord`]. Coordinates are kept as written:
//! 1-based and inclusive.

use crate::region::Strand;
use log::debug;
use noodles::gff::feature::record::{Phase, Strand as GffStrand};
use noodles::{bgzf, gtf};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Error as IoError};
use std::path::Path;

#[derive(Debug)]
pub enum ParseErr {
    IoError(IoError),
    InvalidRecord(usize, IoError),
    InvalidInterval(usize, u64, u64),
}

impl std::fmt::Display for ParseErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseErr::IoError(e) => write!(f, "IO error: {}", e),
            ParseErr::InvalidRecord(line, e) => write!(f, "line {}: {}", line, e),
            ParseErr::InvalidInterval(line, start, end) => write!(
                f,
                "line {}: start ({}) is greater than end ({})",
                line, start, end
            ),
        }
    }
}

impl std::error::Error for ParseErr {}

/// One GTF line with the nine standard columns
#[derive(Debug, Clone, PartialEq)]
pub struct GtfRecord {
    pub seqname: String,
    pub source: String,
    pub ty: String,
    pub start: u64,
    pub end: u64,
    pub score: Option<f32>,
    pub strand: Strand,
    pub frame: Option<u8>,
    /// Attribute entries in file order; repeated keys keep every value
    pub attributes: Vec<(String, String)>,
}

impl GtfRecord {
    /// First value recorded for an attribute key
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

fn convert_record(record: &gtf::Record<'_>) -> io::Result<GtfRecord> {
    let strand = match record.strand()? {
        GffStrand::Forward => Strand::Forward,
        GffStrand::Reverse => Strand::Reverse,
        _ => Strand::Unstranded,
    };
    let frame = record.phase().transpose()?.map(|phase| match phase {
        Phase::Zero => 0,
        Phase::One => 1,
        Phase::Two => 2,
    });

    let mut attributes = Vec::new();
    for entry in record.attributes()?.iter() {
        let (key, value) = entry?;
        for v in value.iter() {
            attributes.push((key.to_string(), v.to_string()));
        }
    }

    Ok(GtfRecord {
        seqname: record.reference_sequence_name().to_string(),
        source: record.source().to_string(),
        ty: record.ty().to_string(),
        start: record.start()?.get() as u64,
        end: record.end()?.get() as u64,
        score: record.score().transpose()?,
        strand,
        frame,
        attributes,
    })
}

/// Read every record from a GTF stream, skipping comments and blank lines
pub fn parse_gtf<R: BufRead>(reader: R) -> Result<Vec<GtfRecord>, ParseErr> {
    let mut reader = gtf::io::Reader::new(reader);
    let mut line = gtf::Line::default();
    let mut records = Vec::new();
    let mut line_number = 0;

    while reader.read_line(&mut line).map_err(ParseErr::IoError)? != 0 {
        line_number += 1;
        if line.as_ref().is_empty() {
            continue;
        }
        let Some(result) = line.as_record() else {
            continue;
        };
        let record = result
            .and_then(|r| convert_record(&r))
            .map_err(|e| ParseErr::InvalidRecord(line_number, e))?;
        if record.start > record.end {
            return Err(ParseErr::InvalidInterval(line_number, record.start, record.end));
        }
        records.push(record);
    }
    Ok(records)
}

/// Parse a GTF file, reading `.gz`/`.bgz` files through a BGZF reader
pub fn parse_gtf_file(gtf_file: &Path) -> io::Result<Vec<GtfRecord>> {
    let file = File::open(gtf_file)?;
    let name = gtf_file.to_string_lossy();

    let records = if [".gz", ".bgz"].iter().any(|e| name.ends_with(e)) {
        debug!("Reading {} through a BGZF reader", name);
        parse_gtf(BufReader::new(bgzf::io::Reader::new(file)))
    } else {
        parse_gtf(BufReader::new(file))
    };

    records.map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Failed to parse GTF from {}: {}", name, e),
        )
    })
}
