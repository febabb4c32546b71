//! Paired alignment loading
//!
//! Every alignment file in a directory becomes one [`AlignmentTrackData`]:
//! the read pairs overlapping the region, each collapsed to a single interval
//! spanning both mates. Files are processed independently; a file that fails
//! is reported in [`AlignmentLoad::failures`] and does not affect its siblings.

use crate::bam::{MateRecord, MateSource};
use crate::error::TrackError;
use crate::region::{Region, Strand};
use log::{debug, info, warn};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};

/// Suffix identifying alignment files in the input directory
pub const ALIGNMENT_EXTENSION: &str = ".bam";

/// Per-pair values kept for rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PairAttributes {
    /// Lower of the two mates' mapping qualities
    pub mapping_quality: u8,
    /// Larger of the two mates' absolute template lengths
    pub template_length: u64,
}

/// Two mated reads collapsed into one interval, 1-based inclusive
#[derive(Debug, Clone, PartialEq)]
pub struct ReadPair {
    pub chromosome: String,
    pub start: u64,
    pub end: u64,
    pub strand: Strand,
    pub attributes: PairAttributes,
}

/// Read pairs loaded from one alignment file
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentTrackData {
    name: String,
    path: PathBuf,
    pairs: Vec<ReadPair>,
    unpaired: usize,
}

impl AlignmentTrackData {
    pub fn new(name: String, path: PathBuf, pairs: Vec<ReadPair>, unpaired: usize) -> Self {
        AlignmentTrackData {
            name,
            path,
            pairs,
            unpaired,
        }
    }

    /// Display name derived from the file name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pairs(&self) -> &[ReadPair] {
        &self.pairs
    }

    /// Number of records dropped because their mate was not found
    pub fn unpaired(&self) -> usize {
        self.unpaired
    }
}

/// A file that could not be turned into a track
#[derive(Debug, Clone, PartialEq)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: TrackError,
}

/// Outcome of loading an alignment directory: tracks in enumeration order
/// plus every per-file failure
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignmentLoad {
    pub tracks: Vec<AlignmentTrackData>,
    pub failures: Vec<FileFailure>,
}

/// Track name for an alignment file: the file name up to its first `.`
pub fn derive_track_name(path: &Path) -> Result<String, TrackError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    let prefix = file_name.split('.').next().unwrap_or("");
    if prefix.is_empty() {
        return Err(TrackError::Naming {
            path: path.to_path_buf(),
        });
    }
    Ok(prefix.to_string())
}

/// List the regular files in `dir` whose name ends with `extension`
/// (case-sensitive), in natural order of their names
pub fn list_alignment_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, TrackError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| TrackError::alignment_load(dir, format!("failed to list directory: {e}")))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry
            .map_err(|e| TrackError::alignment_load(dir, format!("failed to list directory: {e}")))?;
        let path = entry.path();
        // Byte comparison keeps files whose names are not valid UTF-8
        let matches = entry
            .file_name()
            .as_encoded_bytes()
            .ends_with(extension.as_bytes());
        if matches && path.is_file() {
            files.push(path);
        }
    }

    files.sort_by(|a, b| {
        let a = a.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        let b = b.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        natord::compare(&a, &b)
    });
    Ok(files)
}

/// Pair mates by read name and collapse each pair to one interval.
///
/// Only paired, primary, mapped records take part. A record whose mate never
/// shows up is dropped; the returned count says how many were dropped. Pairs
/// are emitted in the order their second mate is seen.
pub fn pair_mates<I>(chromosome: &str, records: I) -> (Vec<ReadPair>, usize)
where
    I: IntoIterator<Item = MateRecord>,
{
    let mut pending: FxHashMap<Vec<u8>, MateRecord> = FxHashMap::default();
    let mut pairs = Vec::new();

    for record in records {
        if !record.paired || !record.primary_mapped {
            continue;
        }
        match pending.remove(&record.name) {
            Some(mate) => pairs.push(collapse_pair(chromosome, &mate, &record)),
            None => {
                pending.insert(record.name.clone(), record);
            }
        }
    }

    (pairs, pending.len())
}

fn collapse_pair(chromosome: &str, a: &MateRecord, b: &MateRecord) -> ReadPair {
    let strand = if b.first_in_template && !a.first_in_template {
        b.strand
    } else {
        a.strand
    };
    ReadPair {
        chromosome: chromosome.to_string(),
        start: a.start.min(b.start),
        end: a.end.max(b.end),
        strand,
        attributes: PairAttributes {
            mapping_quality: a.mapping_quality.min(b.mapping_quality),
            template_length: a.template_length.unsigned_abs().max(b.template_length.unsigned_abs()),
        },
    }
}

fn load_alignment_file<S: MateSource>(
    path: &Path,
    region: &Region,
    source: &S,
) -> Result<AlignmentTrackData, TrackError> {
    let name = derive_track_name(path)?;
    let records = source.fetch_mates(path, region)?;
    let (pairs, unpaired) = pair_mates(region.chromosome(), records);
    if unpaired > 0 {
        debug!(
            "Dropped {} records without a mate in {}",
            unpaired,
            path.display()
        );
    }
    Ok(AlignmentTrackData::new(name, path.to_path_buf(), pairs, unpaired))
}

/// Load every given file. Failures are collected per file; the tracks keep
/// the order of `files` whether or not loading runs in parallel.
pub fn load_alignment_files<S: MateSource>(
    files: &[PathBuf],
    region: &Region,
    source: &S,
    parallel: bool,
) -> AlignmentLoad {
    let results: Vec<Result<AlignmentTrackData, TrackError>> = if parallel {
        files
            .par_iter()
            .map(|path| load_alignment_file(path, region, source))
            .collect()
    } else {
        files
            .iter()
            .map(|path| load_alignment_file(path, region, source))
            .collect()
    };

    let mut load = AlignmentLoad::default();
    for (path, result) in files.iter().zip(results) {
        match result {
            Ok(track) => {
                info!(
                    "Loaded {} read pairs for track '{}' from {}",
                    track.pairs().len(),
                    track.name(),
                    path.display()
                );
                load.tracks.push(track);
            }
            Err(error) => {
                warn!("Skipping {}: {}", path.display(), error);
                load.failures.push(FileFailure {
                    path: path.clone(),
                    error,
                });
            }
        }
    }
    load
}

/// Enumerate the alignment files of `dir` and load each of them for `region`
pub fn load_alignments<S: MateSource>(
    dir: &Path,
    region: &Region,
    source: &S,
    parallel: bool,
) -> Result<AlignmentLoad, TrackError> {
    let files = list_alignment_files(dir, ALIGNMENT_EXTENSION)?;
    if files.is_empty() {
        warn!(
            "No '{}' files found in {}",
            ALIGNMENT_EXTENSION,
            dir.display()
        );
    } else {
        info!("Found {} alignment files in {}", files.len(), dir.display());
    }
    Ok(load_alignment_files(&files, region, source, parallel))
}
