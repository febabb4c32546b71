use crate::alignment::AlignmentTrackData;
use crate::annotation::AnnotationSubset;
use crate::region::Region;

/// Display attributes shared by every track kind
#[derive(Debug, Clone, PartialEq)]
pub struct TrackStyle {
    pub title: String,
    /// Fill colour as RGB
    pub fill: (u8, u8, u8),
    /// Share of the plot height relative to the other tracks
    pub relative_height: f64,
}

/// Coordinate ruler spanning the region
#[derive(Debug, Clone, PartialEq)]
pub struct AxisTrack {
    region: Region,
    style: TrackStyle,
}

impl AxisTrack {
    pub fn new(region: &Region) -> Self {
        AxisTrack {
            region: region.clone(),
            style: TrackStyle {
                title: format!("{} {}", region.genome(), region.chromosome()),
                fill: (64, 64, 64),
                relative_height: 0.6,
            },
        }
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn style(&self) -> &TrackStyle {
        &self.style
    }
}

/// Gene models inside the region
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationTrack {
    subset: AnnotationSubset,
    style: TrackStyle,
}

impl AnnotationTrack {
    pub fn new(subset: AnnotationSubset) -> Self {
        AnnotationTrack {
            subset,
            style: TrackStyle {
                title: "Genes".to_string(),
                fill: (255, 211, 155),
                relative_height: 1.0,
            },
        }
    }

    pub fn subset(&self) -> &AnnotationSubset {
        &self.subset
    }

    pub fn style(&self) -> &TrackStyle {
        &self.style
    }
}

/// Read pairs of one alignment file, bounded by the region
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentTrack {
    data: AlignmentTrackData,
    region: Region,
    style: TrackStyle,
}

impl AlignmentTrack {
    pub fn new(data: AlignmentTrackData, region: &Region) -> Self {
        let title = data.name().to_string();
        AlignmentTrack {
            data,
            region: region.clone(),
            style: TrackStyle {
                title,
                fill: (135, 171, 201),
                relative_height: 2.0,
            },
        }
    }

    pub fn data(&self) -> &AlignmentTrackData {
        &self.data
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn style(&self) -> &TrackStyle {
        &self.style
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Track {
    Axis(AxisTrack),
    Annotation(AnnotationTrack),
    Alignment(AlignmentTrack),
}

impl Track {
    pub fn style(&self) -> &TrackStyle {
        match self {
            Track::Axis(t) => t.style(),
            Track::Annotation(t) => t.style(),
            Track::Alignment(t) => t.style(),
        }
    }
}

/// Ordered tracks of one plot, top to bottom. Built once, only borrowed afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackList {
    region: Region,
    tracks: Vec<Track>,
}

impl TrackList {
    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

/// Compose `[axis, annotation, alignment...]` keeping the alignment order
pub fn assemble_tracks(
    region: &Region,
    annotation: AnnotationSubset,
    alignments: Vec<AlignmentTrackData>,
) -> TrackList {
    let mut tracks = Vec::with_capacity(alignments.len() + 2);
    tracks.push(Track::Axis(AxisTrack::new(region)));
    tracks.push(Track::Annotation(AnnotationTrack::new(annotation)));
    tracks.extend(
        alignments
            .into_iter()
            .map(|data| Track::Alignment(AlignmentTrack::new(data, region))),
    );
    TrackList {
        region: region.clone(),
        tracks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::{PairAttributes, ReadPair};
    use crate::region::Strand;
    use std::path::PathBuf;

    fn alignment(name: &str) -> AlignmentTrackData {
        let pair = ReadPair {
            chromosome: "1".to_string(),
            start: 10,
            end: 90,
            strand: Strand::Forward,
            attributes: PairAttributes::default(),
        };
        AlignmentTrackData::new(
            name.to_string(),
            PathBuf::from(format!("{name}.bam")),
            vec![pair],
            0,
        )
    }

    #[test]
    fn test_assemble_order() {
        let region = Region::new("g", "1", 1, 100, Strand::Unstranded).unwrap();
        let tracks = assemble_tracks(
            &region,
            AnnotationSubset::default(),
            vec![alignment("b"), alignment("a"), alignment("c")],
        );

        assert_eq!(tracks.len(), 5);
        assert!(matches!(tracks.tracks()[0], Track::Axis(_)));
        assert!(matches!(tracks.tracks()[1], Track::Annotation(_)));
        let titles: Vec<&str> = tracks.tracks()[2..]
            .iter()
            .map(|t| t.style().title.as_str())
            .collect();
        assert_eq!(titles, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_assemble_is_deterministic() {
        let region = Region::new("g", "1", 1, 100, Strand::Unstranded).unwrap();
        let first = assemble_tracks(
            &region,
            AnnotationSubset::default(),
            vec![alignment("x"), alignment("y")],
        );
        let second = assemble_tracks(
            &region,
            AnnotationSubset::default(),
            vec![alignment("x"), alignment("y")],
        );
        assert_eq!(first.len(), 1 + 1 + 2);
        assert_eq!(first, second);
    }

    #[test]
    fn test_assemble_without_alignments() {
        let region = Region::new("g", "1", 1, 100, Strand::Unstranded).unwrap();
        let tracks = assemble_tracks(&region, AnnotationSubset::default(), Vec::new());
        assert_eq!(tracks.len(), 2);
        match &tracks.tracks()[0] {
            Track::Axis(axis) => assert_eq!(axis.region(), &region),
            other => panic!("unexpected first track: {:?}", other),
        }
    }
}
