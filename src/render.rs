//! Track rendering
//!
//! A [`TrackList`] is drawn by one routine that is generic over the plotters
//! backend, so the SVG preview and the PNG file show the same picture.

use crate::alignment::ReadPair;
use crate::annotation::AnnotationFeature;
use crate::error::TrackError;
use crate::region::{Region, Strand};
use crate::track::{AlignmentTrack, AnnotationTrack, AxisTrack, Track, TrackList};
use log::{debug, warn};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use rustc_hash::FxHashMap;
use serde::Deserialize;
use std::path::Path;

/// Output geometry. Sizes are in inches; pixels = inches * dpi.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub width: f64,
    pub height: f64,
    pub dpi: u32,
    /// Font size in points
    pub pointsize: u32,
    /// Draw track titles, tick labels and feature labels
    pub labels: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        RenderSettings {
            width: 10.0,
            height: 6.0,
            dpi: 400,
            pointsize: 8,
            labels: true,
        }
    }
}

/// Largest accepted image side, in inches
pub const MAX_INCHES: f64 = 200.0;
pub const MAX_DPI: u32 = 2400;
/// Largest accepted image side, in pixels
pub const MAX_PIXELS: f64 = 40_000.0;

impl RenderSettings {
    /// Reject sizes that would give an empty or unreasonably large image
    pub fn validate(&self) -> Result<(), TrackError> {
        for (field, inches) in [("render.width", self.width), ("render.height", self.height)] {
            if !inches.is_finite() || inches <= 0.0 || inches > MAX_INCHES {
                return Err(TrackError::configuration(
                    field,
                    format!("{inches} is outside (0, {MAX_INCHES}] inches"),
                ));
            }
        }
        if self.dpi == 0 || self.dpi > MAX_DPI {
            return Err(TrackError::configuration(
                "render.dpi",
                format!("{} is outside [1, {MAX_DPI}]", self.dpi),
            ));
        }
        if self.width.max(self.height) * self.dpi as f64 > MAX_PIXELS {
            return Err(TrackError::configuration(
                "render.dpi",
                format!("image side exceeds {MAX_PIXELS} pixels"),
            ));
        }
        if self.pointsize == 0 {
            return Err(TrackError::configuration("render.pointsize", "must be positive"));
        }
        Ok(())
    }

    pub fn pixel_size(&self) -> (u32, u32) {
        let px = |inches: f64| ((inches * self.dpi as f64).round() as u32).max(1);
        (px(self.width), px(self.height))
    }

    pub fn font_px(&self) -> f64 {
        (self.pointsize as f64 * self.dpi as f64 / 72.0).max(1.0)
    }
}

fn render_err<E: std::fmt::Display>(e: E) -> TrackError {
    TrackError::Render(e.to_string())
}

/// Round `span / target` up to 1, 2 or 5 times a power of ten
pub fn tick_step(span: u64, target: u64) -> u64 {
    let raw = (span / target.max(1)).max(1);
    let mut magnitude = 1u64;
    while magnitude * 10 <= raw {
        magnitude *= 10;
    }
    [1, 2, 5, 10]
        .iter()
        .map(|m| m * magnitude)
        .find(|step| *step >= raw)
        .unwrap_or(10 * magnitude)
}

/// Assign each pair to the lowest row where it does not touch an earlier pair.
/// Returns the row of every pair (input order) and the number of rows used.
pub fn pack_rows(pairs: &[ReadPair]) -> (Vec<usize>, usize) {
    let mut order: Vec<usize> = (0..pairs.len()).collect();
    order.sort_by_key(|&i| (pairs[i].start, pairs[i].end));

    let mut row_ends: Vec<u64> = Vec::new();
    let mut rows = vec![0usize; pairs.len()];
    for i in order {
        let pair = &pairs[i];
        match row_ends.iter().position(|&end| end < pair.start) {
            Some(row) => {
                row_ends[row] = pair.end;
                rows[i] = row;
            }
            None => {
                row_ends.push(pair.end);
                rows[i] = row_ends.len() - 1;
            }
        }
    }
    (rows, row_ends.len())
}

/// Depth of read-pair spans over `bins` equal slices of the region
pub fn coverage(pairs: &[ReadPair], region: &Region, bins: usize) -> Vec<u32> {
    let bins = bins.max(1);
    let mut delta = vec![0i64; bins + 1];
    let width = region.width();
    let bin_of = |pos: u64| (((pos - region.start()) as u128 * bins as u128) / width as u128) as usize;

    for pair in pairs {
        if pair.chromosome != region.chromosome() || pair.end < region.start() || pair.start > region.end() {
            continue;
        }
        let first = bin_of(pair.start.max(region.start()));
        let last = bin_of(pair.end.min(region.end()));
        delta[first] += 1;
        delta[last + 1] -= 1;
    }

    let mut depth = 0i64;
    delta[..bins]
        .iter()
        .map(|d| {
            depth += d;
            depth.max(0) as u32
        })
        .collect()
}

/// Horizontal mapping from genomic positions to pixels
struct Frame<'a> {
    region: &'a Region,
    left: i32,
    right: i32,
}

impl Frame<'_> {
    /// Pixel of the left edge of base `pos`; `end + 1` gives the right edge of `end`
    fn x(&self, pos: u64) -> i32 {
        let pos = pos.clamp(self.region.start(), self.region.end() + 1);
        let frac = (pos - self.region.start()) as f64 / self.region.width() as f64;
        self.left + (frac * (self.right - self.left) as f64).round() as i32
    }

    fn span(&self, start: u64, end: u64) -> (i32, i32) {
        let x0 = self.x(start);
        let x1 = self.x(end.saturating_add(1)).max(x0 + 1);
        (x0, x1)
    }
}

struct Band {
    top: i32,
    bottom: i32,
}

impl Band {
    fn height(&self) -> i32 {
        self.bottom - self.top
    }

    fn middle(&self) -> i32 {
        (self.top + self.bottom) / 2
    }
}

fn rgb((r, g, b): (u8, u8, u8)) -> RGBColor {
    RGBColor(r, g, b)
}

fn darker((r, g, b): (u8, u8, u8)) -> RGBColor {
    RGBColor(r / 2, g / 2, b / 2)
}

/// Draw every track of `tracks` onto `root`
pub fn draw_tracks<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    tracks: &TrackList,
    settings: &RenderSettings,
) -> Result<(), TrackError> {
    root.fill(&WHITE).map_err(render_err)?;

    let (width, height) = root.dim_in_pixel();
    let (width, height) = (width as i32, height as i32);
    let pad = (height / 40).max(2);
    let title_width = if settings.labels { width / 8 } else { 0 };

    let frame = Frame {
        region: tracks.region(),
        left: title_width + pad,
        right: (width - pad).max(title_width + pad + 1),
    };

    let total_weight: f64 = tracks
        .tracks()
        .iter()
        .map(|t| t.style().relative_height)
        .sum();
    let usable = (height - 2 * pad).max(1) as f64;

    let mut top = pad as f64;
    for track in tracks.tracks() {
        let share = if total_weight > 0.0 {
            track.style().relative_height / total_weight
        } else {
            0.0
        };
        let bottom = top + share * usable;
        let band = Band {
            top: top.round() as i32,
            bottom: bottom.round() as i32,
        };
        top = bottom;

        if settings.labels {
            draw_title(root, track, &band, title_width, settings)?;
        }
        match track {
            Track::Axis(axis) => draw_axis(root, axis, &frame, &band, settings)?,
            Track::Annotation(annotation) => {
                draw_annotation(root, annotation, &frame, &band, settings)?
            }
            Track::Alignment(alignment) => draw_alignment(root, alignment, &frame, &band)?,
        }
    }
    Ok(())
}

fn draw_title<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    track: &Track,
    band: &Band,
    title_width: i32,
    settings: &RenderSettings,
) -> Result<(), TrackError> {
    let style = track.style();
    root.draw(&Rectangle::new(
        [(0, band.top), (title_width, band.bottom)],
        darker(style.fill).filled(),
    ))
    .map_err(render_err)?;
    let font = ("sans-serif", settings.font_px())
        .into_font()
        .color(&WHITE)
        .pos(Pos::new(HPos::Center, VPos::Center));
    root.draw(&Text::new(
        style.title.clone(),
        (title_width / 2, band.middle()),
        font,
    ))
    .map_err(render_err)?;
    Ok(())
}

fn draw_axis<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    axis: &AxisTrack,
    frame: &Frame,
    band: &Band,
    settings: &RenderSettings,
) -> Result<(), TrackError> {
    let region = axis.region();
    let colour = rgb(axis.style().fill);
    let y = band.middle();
    let line_width = (band.height() / 30).max(1) as u32;

    root.draw(&PathElement::new(
        vec![(frame.left, y), (frame.right, y)],
        colour.stroke_width(line_width),
    ))
    .map_err(render_err)?;

    let step = tick_step(region.width(), 5);
    let tick_len = (band.height() / 6).max(2);
    let mut tick = region.start().div_ceil(step) * step;
    let font = ("sans-serif", settings.font_px())
        .into_font()
        .color(&colour)
        .pos(Pos::new(HPos::Center, VPos::Top));
    while tick <= region.end() {
        let x = frame.x(tick);
        root.draw(&PathElement::new(
            vec![(x, y - tick_len), (x, y + tick_len)],
            colour.stroke_width(line_width),
        ))
        .map_err(render_err)?;
        if settings.labels {
            root.draw(&Text::new(
                tick.to_string(),
                (x, y + tick_len + 1),
                font.clone(),
            ))
            .map_err(render_err)?;
        }
        tick += step;
    }
    Ok(())
}

/// Group features into one row per transcript (or gene), in file order
fn annotation_rows(features: &[AnnotationFeature]) -> Vec<Vec<&AnnotationFeature>> {
    let mut index: FxHashMap<&str, usize> = FxHashMap::default();
    let mut rows: Vec<Vec<&AnnotationFeature>> = Vec::new();
    for feature in features {
        let key = feature
            .transcript_id
            .as_deref()
            .or(feature.gene_id.as_deref());
        match key.and_then(|k| index.get(k).copied()) {
            Some(row) => rows[row].push(feature),
            None => {
                if let Some(k) = key {
                    index.insert(k, rows.len());
                }
                rows.push(vec![feature]);
            }
        }
    }
    rows
}

fn draw_annotation<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    annotation: &AnnotationTrack,
    frame: &Frame,
    band: &Band,
    settings: &RenderSettings,
) -> Result<(), TrackError> {
    let rows = annotation_rows(annotation.subset().features());
    if rows.is_empty() {
        return Ok(());
    }
    let fill = rgb(annotation.style().fill);
    let outline = darker(annotation.style().fill);
    let row_height = (band.height() / rows.len() as i32).max(1);
    let font = ("sans-serif", settings.font_px())
        .into_font()
        .color(&BLACK)
        .pos(Pos::new(HPos::Right, VPos::Center));

    for (i, row) in rows.iter().enumerate() {
        let top = band.top + i as i32 * row_height;
        let middle = top + row_height / 2;
        let box_half = (row_height * 3 / 8).max(1);

        let start = row.iter().map(|f| f.start).min().unwrap_or(0);
        let end = row.iter().map(|f| f.end).max().unwrap_or(0);
        let (x0, x1) = frame.span(start, end);
        root.draw(&PathElement::new(vec![(x0, middle), (x1, middle)], &outline))
            .map_err(render_err)?;

        for feature in row {
            let half = match feature.feature.as_str() {
                "exon" | "CDS" => box_half,
                f if f.contains("UTR") => (box_half / 2).max(1),
                _ => continue,
            };
            let (fx0, fx1) = frame.span(feature.start, feature.end);
            root.draw(&Rectangle::new(
                [(fx0, middle - half), (fx1, middle + half)],
                fill.filled(),
            ))
            .map_err(render_err)?;
            root.draw(&Rectangle::new(
                [(fx0, middle - half), (fx1, middle + half)],
                &outline,
            ))
            .map_err(render_err)?;
        }

        if settings.labels {
            if let Some(label) = row.iter().find_map(|f| f.label()) {
                root.draw(&Text::new(label.to_string(), (x0 - 2, middle), font.clone()))
                    .map_err(render_err)?;
            }
        }
    }
    Ok(())
}

fn draw_alignment<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    alignment: &AlignmentTrack,
    frame: &Frame,
    band: &Band,
) -> Result<(), TrackError> {
    let region = alignment.region();
    let pairs = alignment.data().pairs();
    let style = alignment.style();
    let fill = rgb(style.fill);

    // Coverage profile in the upper third
    let coverage_bottom = band.top + band.height() / 3;
    let bins = (frame.right - frame.left).max(1) as usize;
    let depth = coverage(pairs, region, bins);
    let max_depth = depth.iter().copied().max().unwrap_or(0);
    if max_depth > 0 {
        let coverage_height = (coverage_bottom - band.top) as f64;
        for (bin, &d) in depth.iter().enumerate() {
            if d == 0 {
                continue;
            }
            let x = frame.left + bin as i32;
            let bar = (d as f64 / max_depth as f64 * coverage_height).round() as i32;
            root.draw(&Rectangle::new(
                [(x, coverage_bottom - bar.max(1)), (x + 1, coverage_bottom)],
                darker(style.fill).filled(),
            ))
            .map_err(render_err)?;
        }
    }

    // Pileup of read pairs below
    let (rows, row_count) = pack_rows(pairs);
    if row_count == 0 {
        return Ok(());
    }
    let pileup_top = coverage_bottom + 1;
    let pileup_height = (band.bottom - pileup_top).max(1);
    let row_height = (pileup_height / row_count as i32).clamp(1, (pileup_height / 4).max(1));
    let visible_rows = (pileup_height / row_height).max(1) as usize;
    if row_count > visible_rows {
        debug!(
            "Track '{}': showing {} of {} pileup rows",
            style.title, visible_rows, row_count
        );
    }

    let reverse = darker(style.fill);
    for (pair, &row) in pairs.iter().zip(&rows) {
        if row >= visible_rows {
            continue;
        }
        let top = pileup_top + row as i32 * row_height;
        let gap = if row_height > 3 { row_height / 4 } else { 0 };
        let (x0, x1) = frame.span(pair.start, pair.end);
        let colour = match pair.strand {
            Strand::Reverse => reverse,
            _ => fill,
        };
        root.draw(&Rectangle::new(
            [(x0, top + gap), (x1, top + row_height - gap)],
            colour.filled(),
        ))
        .map_err(render_err)?;
    }
    Ok(())
}

/// Render to an in-memory SVG document
pub fn render_svg(tracks: &TrackList, settings: &RenderSettings) -> Result<String, TrackError> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, settings.pixel_size()).into_drawing_area();
        draw_tracks(&root, tracks, settings)?;
        root.present().map_err(render_err)?;
    }
    Ok(svg)
}

fn write_bitmap(
    tracks: &TrackList,
    path: &Path,
    settings: &RenderSettings,
) -> Result<(), TrackError> {
    let root = BitMapBackend::new(path, settings.pixel_size()).into_drawing_area();
    draw_tracks(&root, tracks, settings)?;
    root.present().map_err(render_err)
}

/// Render to a raster image file; the format follows the file extension.
/// Text needs a system font; without one the image is drawn unlabelled.
pub fn render_png(
    tracks: &TrackList,
    path: &Path,
    settings: &RenderSettings,
) -> Result<(), TrackError> {
    match write_bitmap(tracks, path, settings) {
        Err(e) if settings.labels => {
            warn!("Drawing labels failed ({}), rendering {} without labels", e, path.display());
            let unlabelled = RenderSettings {
                labels: false,
                ..settings.clone()
            };
            write_bitmap(tracks, path, &unlabelled)?;
        }
        result => result?,
    }
    debug!(
        "Wrote {}x{} image to {}",
        settings.pixel_size().0,
        settings.pixel_size().1,
        path.display()
    );
    Ok(())
}
