use crate::config::RegionConfig;
use crate::error::TrackError;
use std::fmt;

/// Strand orientation of a region, feature or read pair
#[derive(Default, PartialEq, Eq, Clone, Copy, Debug, Hash)]
#[repr(u8)]
pub enum Strand {
    Forward,
    Reverse,
    #[default]
    Unstranded,
}

impl Strand {
    /// Parse `+`, `-` or `*`. GTF also writes `.` for unstranded features.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "+" => Some(Strand::Forward),
            "-" => Some(Strand::Reverse),
            "*" | "." => Some(Strand::Unstranded),
            _ => None,
        }
    }

    pub fn symbol(&self) -> char {
        match self {
            Strand::Forward => '+',
            Strand::Reverse => '-',
            Strand::Unstranded => '*',
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Genomic window selected for plotting, 1-based and inclusive on both ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    genome: String,
    chromosome: String,
    start: u64,
    end: u64,
    strand: Strand,
}

impl Region {
    pub fn new(
        genome: &str,
        chromosome: &str,
        start: u64,
        end: u64,
        strand: Strand,
    ) -> Result<Self, TrackError> {
        if genome.trim().is_empty() {
            return Err(TrackError::configuration("region.genome", "must not be empty"));
        }
        if chromosome.trim().is_empty() {
            return Err(TrackError::configuration("region.chr", "must not be empty"));
        }
        if start > end {
            return Err(TrackError::configuration(
                "region.start",
                format!("start ({start}) must not exceed end ({end})"),
            ));
        }
        Ok(Region {
            genome: genome.to_string(),
            chromosome: chromosome.to_string(),
            start,
            end,
            strand,
        })
    }

    pub fn genome(&self) -> &str {
        &self.genome
    }

    pub fn chromosome(&self) -> &str {
        &self.chromosome
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn strand(&self) -> Strand {
        self.strand
    }

    /// Number of bases covered by the region
    pub fn width(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Whether `[start, end]` on `chromosome` lies entirely inside the region
    pub fn contains(&self, chromosome: &str, start: u64, end: u64) -> bool {
        chromosome == self.chromosome && start >= self.start && end <= self.end
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}({}) [{}]",
            self.chromosome, self.start, self.end, self.strand, self.genome
        )
    }
}

/// Build the region of interest from its configuration block
pub fn select_region(config: &RegionConfig) -> Result<Region, TrackError> {
    let genome = config
        .genome
        .as_deref()
        .ok_or_else(|| TrackError::configuration("region.genome", "missing field"))?;
    let chromosome = config
        .chr
        .as_deref()
        .ok_or_else(|| TrackError::configuration("region.chr", "missing field"))?;
    let start = config
        .start
        .ok_or_else(|| TrackError::configuration("region.start", "missing field"))?;
    let end = config
        .end
        .ok_or_else(|| TrackError::configuration("region.end", "missing field"))?;
    let strand_symbol = config
        .strand
        .as_deref()
        .ok_or_else(|| TrackError::configuration("region.strand", "missing field"))?;

    let start = u64::try_from(start)
        .map_err(|_| TrackError::configuration("region.start", "must not be negative"))?;
    let end = u64::try_from(end)
        .map_err(|_| TrackError::configuration("region.end", "must not be negative"))?;
    let strand = match strand_symbol {
        "+" | "-" | "*" => Strand::from_symbol(strand_symbol).unwrap_or_default(),
        other => {
            return Err(TrackError::configuration(
                "region.strand",
                format!("expected '+', '-' or '*', got '{other}'"),
            ))
        }
    };

    Region::new(genome, chromosome, start, end, strand)
}
