use crate::error::TrackError;
use crate::gtf::{parse_gtf_file, GtfRecord};
use crate::region::{Region, Strand};
use log::{debug, info, warn};
use rustc_hash::FxHashMap;
use std::path::Path;

/// Gene id to display symbol lookup used to label annotation features
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolMap {
    symbols: FxHashMap<String, String>,
}

impl SymbolMap {
    /// Build the mapping from two position-matched lists.
    /// A gene id listed more than once keeps its first symbol.
    pub fn from_lists(ids: &[String], symbols: &[String]) -> Result<Self, TrackError> {
        if ids.len() != symbols.len() {
            return Err(TrackError::configuration(
                "genes.symbol",
                format!(
                    "{} symbols given for {} gene ids (genes.solycids)",
                    symbols.len(),
                    ids.len()
                ),
            ));
        }

        let mut map = FxHashMap::default();
        for (id, symbol) in ids.iter().zip(symbols) {
            if map.contains_key(id) {
                warn!("Gene id '{}' listed more than once, keeping its first symbol", id);
                continue;
            }
            map.insert(id.clone(), symbol.clone());
        }
        Ok(SymbolMap { symbols: map })
    }

    pub fn get(&self, gene_id: &str) -> Option<&str> {
        self.symbols.get(gene_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// An annotation feature inside the plotted region
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationFeature {
    pub chromosome: String,
    pub start: u64,
    pub end: u64,
    pub strand: Strand,
    /// Feature type, e.g. `exon`, `CDS`, `five_prime_UTR`, `gene`
    pub feature: String,
    pub gene_id: Option<String>,
    pub transcript_id: Option<String>,
    pub symbol: Option<String>,
}

impl AnnotationFeature {
    fn from_record(record: GtfRecord, symbols: &SymbolMap) -> Self {
        let gene_id = record.attribute("gene_id").map(str::to_string);
        let transcript_id = record.attribute("transcript_id").map(str::to_string);
        let symbol = gene_id
            .as_deref()
            .and_then(|id| symbols.get(id))
            .map(str::to_string);
        AnnotationFeature {
            chromosome: record.seqname,
            start: record.start,
            end: record.end,
            strand: record.strand,
            feature: record.ty,
            gene_id,
            transcript_id,
            symbol,
        }
    }

    /// Text shown next to the feature: the symbol when known, else the gene id
    pub fn label(&self) -> Option<&str> {
        self.symbol.as_deref().or(self.gene_id.as_deref())
    }
}

/// Features fully contained in a region, in file order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationSubset {
    features: Vec<AnnotationFeature>,
}

impl AnnotationSubset {
    pub fn features(&self) -> &[AnnotationFeature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Keep the records lying entirely inside `region` and attach display symbols.
/// Features crossing a region boundary are dropped, not clipped.
pub fn subset_annotation<I>(records: I, region: &Region, symbols: &SymbolMap) -> AnnotationSubset
where
    I: IntoIterator<Item = GtfRecord>,
{
    let mut total = 0usize;
    let features: Vec<AnnotationFeature> = records
        .into_iter()
        .inspect(|_| total += 1)
        .filter(|record| region.contains(&record.seqname, record.start, record.end))
        .map(|record| AnnotationFeature::from_record(record, symbols))
        .collect();

    let filtered_out = total.saturating_sub(features.len());
    if filtered_out > 0 {
        debug!(
            "Filtered out {} annotation features outside {}",
            filtered_out, region
        );
    }

    AnnotationSubset { features }
}

/// Read an annotation file and subset it to `region`
pub fn load_annotation(
    path: &Path,
    region: &Region,
    symbols: &SymbolMap,
) -> Result<AnnotationSubset, TrackError> {
    let records = parse_gtf_file(path).map_err(|e| TrackError::annotation_load(path, e))?;
    info!(
        "Parsed {} annotation features from {}",
        records.len(),
        path.display()
    );

    let subset = subset_annotation(records, region, symbols);
    if subset.is_empty() {
        warn!("No annotation features lie entirely inside {}", region);
    } else {
        let labelled = subset
            .features()
            .iter()
            .filter(|f| f.symbol.is_some())
            .count();
        info!(
            "Kept {} annotation features in {} ({} with a symbol)",
            subset.len(),
            region,
            labelled
        );
    }
    Ok(subset)
}
