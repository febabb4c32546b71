use crate::error::TrackError;
use crate::region::{Region, Strand};
use log::debug;
use rust_htslib::bam::{self, Read};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;
use std::path::Path;

/// One alignment record as needed for mate pairing
#[derive(Debug, Clone, PartialEq)]
pub struct MateRecord {
    pub name: Vec<u8>,
    /// 1-based leftmost aligned base
    pub start: u64,
    /// 1-based rightmost aligned base
    pub end: u64,
    pub strand: Strand,
    pub mapping_quality: u8,
    pub paired: bool,
    pub first_in_template: bool,
    /// Unmapped, secondary or supplementary records are not pairing candidates
    pub primary_mapped: bool,
    pub template_length: i64,
    /// 1-based start of the mate when it is mapped to the same chromosome
    pub mate_start: Option<u64>,
}

/// Mates that a region fetch did not return, keyed by their 1-based start.
/// Each entry holds the read name and the first-in-template flag the mate
/// must carry. Mates unmapped or on another chromosome cannot be looked up.
pub fn mate_lookups(records: &[MateRecord]) -> BTreeMap<u64, Vec<(Vec<u8>, bool)>> {
    let mut seen: FxHashMap<&[u8], usize> = FxHashMap::default();
    for record in records.iter().filter(|r| r.paired && r.primary_mapped) {
        *seen.entry(record.name.as_slice()).or_insert(0) += 1;
    }

    let mut lookups: BTreeMap<u64, Vec<(Vec<u8>, bool)>> = BTreeMap::new();
    for record in records.iter().filter(|r| r.paired && r.primary_mapped) {
        if seen.get(record.name.as_slice()) != Some(&1) {
            continue;
        }
        if let Some(mate_start) = record.mate_start {
            lookups
                .entry(mate_start)
                .or_default()
                .push((record.name.clone(), !record.first_in_template));
        }
    }
    lookups
}

// Trait for fetching alignment records in a region from different sources
pub trait MateSource: Sync {
    fn fetch_mates(&self, path: &Path, region: &Region) -> Result<Vec<MateRecord>, TrackError>;
}

/// Reads coordinate-sorted, indexed BAM files through htslib
#[derive(Debug, Default, Clone, Copy)]
pub struct HtslibSource;

impl HtslibSource {
    fn convert(record: &bam::Record) -> MateRecord {
        let start = (record.pos().max(0) as u64) + 1;
        // end_pos is 0-based exclusive, i.e. 1-based inclusive
        let end = (record.cigar().end_pos().max(0) as u64).max(start);
        MateRecord {
            name: record.qname().to_vec(),
            start,
            end,
            strand: if record.is_reverse() {
                Strand::Reverse
            } else {
                Strand::Forward
            },
            mapping_quality: record.mapq(),
            paired: record.is_paired(),
            first_in_template: record.is_first_in_template(),
            primary_mapped: !(record.is_unmapped()
                || record.is_secondary()
                || record.is_supplementary()),
            template_length: record.insert_size(),
            mate_start: (record.is_paired()
                && !record.is_mate_unmapped()
                && record.mtid() == record.tid())
            .then(|| (record.mpos().max(0) as u64) + 1),
        }
    }

    /// Fetch the mates of pairs that cross the region boundary
    fn fetch_outside_mates(
        reader: &mut bam::IndexedReader,
        path: &Path,
        tid: u32,
        mates: &[MateRecord],
    ) -> Result<Vec<MateRecord>, TrackError> {
        let mut rescued = Vec::new();
        for (start, wanted) in mate_lookups(mates) {
            let mut wanted: FxHashSet<(Vec<u8>, bool)> = wanted.into_iter().collect();
            let pos = start as i64 - 1;
            reader.fetch((tid, pos, pos + 1)).map_err(|e| {
                TrackError::alignment_load(path, format!("failed to fetch mates at {start}: {e}"))
            })?;
            for result in reader.records() {
                let record = result.map_err(|e| {
                    TrackError::alignment_load(path, format!("failed to read record: {e}"))
                })?;
                if record.pos() != pos {
                    continue;
                }
                let mate = Self::convert(&record);
                if mate.paired
                    && mate.primary_mapped
                    && wanted.remove(&(mate.name.clone(), mate.first_in_template))
                {
                    rescued.push(mate);
                }
            }
        }
        Ok(rescued)
    }
}

impl MateSource for HtslibSource {
    fn fetch_mates(&self, path: &Path, region: &Region) -> Result<Vec<MateRecord>, TrackError> {
        if !path.is_file() {
            return Err(TrackError::alignment_load(path, "file does not exist"));
        }

        let mut reader = bam::IndexedReader::from_path(path).map_err(|e| {
            TrackError::alignment_load(path, format!("failed to open indexed BAM: {e}"))
        })?;

        let tid = reader
            .header()
            .tid(region.chromosome().as_bytes())
            .ok_or_else(|| {
                TrackError::alignment_load(
                    path,
                    format!("chromosome '{}' not in BAM header", region.chromosome()),
                )
            })?;

        // htslib uses 0-based half-open coordinates
        let fetch_start = region.start().saturating_sub(1) as i64;
        let fetch_end = region.end() as i64;
        reader.fetch((tid, fetch_start, fetch_end)).map_err(|e| {
            TrackError::alignment_load(path, format!("failed to fetch {}: {e}", region))
        })?;

        let mut mates = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|e| {
                TrackError::alignment_load(path, format!("failed to read record: {e}"))
            })?;
            mates.push(Self::convert(&record));
        }

        let rescued = Self::fetch_outside_mates(&mut reader, path, tid, &mates)?;
        debug!(
            "Fetched {} records from {} in {} and {} mates outside it",
            mates.len(),
            path.display(),
            region,
            rescued.len()
        );
        mates.extend(rescued);
        Ok(mates)
    }
}
