use crate::alignment::{load_alignments, FileFailure};
use crate::annotation::load_annotation;
use crate::bam::MateSource;
use crate::config::Config;
use crate::error::TrackError;
use crate::region::select_region;
use crate::render::{render_png, render_svg};
use crate::track::{assemble_tracks, TrackList};
use log::info;
use std::path::PathBuf;

/// Where and how a run writes its plots
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Raster output, `plot.png` by default
    pub output: PathBuf,
    /// Optional file receiving the SVG preview
    pub preview: Option<PathBuf>,
    /// Load alignment files on the rayon pool
    pub parallel: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            output: PathBuf::from("plot.png"),
            preview: None,
            parallel: true,
        }
    }
}

/// Result of a completed run
#[derive(Debug)]
pub struct PipelineReport {
    pub tracks: TrackList,
    /// Alignment files that were skipped, with the reason
    pub failures: Vec<FileFailure>,
    /// SVG preview of the plot
    pub preview: String,
    pub output: PathBuf,
}

/// Select the region, load annotation and alignments, assemble the tracks and
/// render them as preview and as image file.
pub fn run<S: MateSource>(
    config: &Config,
    options: &RunOptions,
    source: &S,
) -> Result<PipelineReport, TrackError> {
    // Every configuration problem surfaces before any file is read
    let region = select_region(&config.region)?;
    let symbols = config.symbol_map()?;
    let annotation_path = config.annotation_path()?;
    let bam_dir = config.bam_dir()?;
    config.render.validate()?;
    info!("Plotting {}", region);

    let annotation = load_annotation(annotation_path, &region, &symbols)?;
    let alignments = load_alignments(bam_dir, &region, source, options.parallel)?;
    let tracks = assemble_tracks(&region, annotation, alignments.tracks);
    info!("Assembled {} tracks", tracks.len());

    let preview = render_svg(&tracks, &config.render)?;
    match &options.preview {
        Some(path) => {
            std::fs::write(path, &preview).map_err(|e| {
                TrackError::Render(format!("failed to write preview {}: {e}", path.display()))
            })?;
            info!("Wrote preview to {}", path.display());
        }
        None => info!("Rendered preview ({} bytes of SVG)", preview.len()),
    }

    render_png(&tracks, &options.output, &config.render)?;
    info!("Wrote plot to {}", options.output.display());

    Ok(PipelineReport {
        tracks,
        failures: alignments.failures,
        preview,
        output: options.output.clone(),
    })
}
