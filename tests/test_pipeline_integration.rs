//! Integration tests for the full pipeline: config -> region -> GTF subset ->
//! indexed BAM loading -> track assembly -> rendering.
//! BAM files are written and indexed through rust-htslib.

use regiontracks::alignment::load_alignments;
use regiontracks::bam::HtslibSource;
use regiontracks::config::Config;
use regiontracks::error::TrackError;
use regiontracks::pipeline::{run, RunOptions};
use regiontracks::region::{Region, Strand};
use regiontracks::track::Track;
use rust_htslib::bam::{self, Format, Header, HeaderView, Record, Writer};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const SAM_HEADER: &[u8] = b"@HD\tVN:1.6\tSO:coordinate\n@SQ\tSN:1\tLN:10000\n@SQ\tSN:2\tLN:5000\n";

/// Three pairs; the mate of r3 is missing
const PAIRED_RECORDS: &[&str] = &[
    "r1\t99\t1\t100\t60\t50M\t=\t300\t250\t*\t*",
    "r2\t99\t1\t150\t60\t50M\t=\t400\t300\t*\t*",
    "r3\t99\t1\t200\t60\t50M\t=\t500\t350\t*\t*",
    "r1\t147\t1\t300\t60\t50M\t=\t100\t-250\t*\t*",
    "r2\t147\t1\t400\t40\t50M\t=\t150\t-300\t*\t*",
];

fn get_binary() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_regiontracks") {
        return PathBuf::from(path);
    }
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let candidates = [
        manifest_dir.join("target/release/regiontracks"),
        manifest_dir.join("target/debug/regiontracks"),
    ];
    for path in &candidates {
        if path.exists() {
            return path.clone();
        }
    }
    PathBuf::from("regiontracks")
}

fn write_bam(path: &Path, records: &[&str]) {
    let view = HeaderView::from_bytes(SAM_HEADER);
    let header = Header::from_template(&view);
    {
        let mut writer = Writer::from_path(path, &header, Format::Bam).unwrap();
        for line in records {
            let record = Record::from_sam(&view, line.as_bytes()).unwrap();
            writer.write(&record).unwrap();
        }
    }
    bam::index::build(path, None, bam::index::Type::Bai, 1).unwrap();
}

fn write_gtf(path: &Path) {
    let mut file = File::create(path).unwrap();
    let lines = [
        "#!genome-build test",
        "1\ttest\tgene\t120\t900\t.\t+\t.\tgene_id \"g1\";",
        "1\ttest\texon\t120\t300\t.\t+\t.\tgene_id \"g1\"; transcript_id \"g1.1\";",
        "1\ttest\tfive_prime_UTR\t120\t160\t.\t+\t.\tgene_id \"g1\"; transcript_id \"g1.1\";",
        "1\ttest\texon\t600\t900\t.\t+\t.\tgene_id \"g1\"; transcript_id \"g1.1\";",
        "1\ttest\texon\t50\t150\t.\t-\t.\tgene_id \"g2\"; transcript_id \"g2.1\";",
        "2\ttest\texon\t120\t300\t.\t+\t.\tgene_id \"g3\"; transcript_id \"g3.1\";",
    ];
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
}

/// Lay out a run directory with three BAMs, the second of which is corrupt
fn create_run_dir(work_dir: &Path) {
    write_gtf(&work_dir.join("genes.gtf"));

    let bam_dir = work_dir.join("bams");
    fs::create_dir(&bam_dir).unwrap();
    write_bam(&bam_dir.join("sample1.sorted.bam"), PAIRED_RECORDS);
    fs::write(bam_dir.join("sample2.bam"), b"this is not a BAM file").unwrap();
    write_bam(
        &bam_dir.join("sample10.bam"),
        &[PAIRED_RECORDS[0], PAIRED_RECORDS[3]],
    );
    fs::write(bam_dir.join("README.txt"), b"ignored").unwrap();

    let config = r#"{
        "region": {"genome": "test", "chr": "1", "start": 100, "end": 1000, "strand": "+"},
        "annotations": {"gtf": "genes.gtf"},
        "bamdir": "bams",
        "genes": {"solycids": ["g1"], "symbol": ["ONE"]},
        "render": {"width": 8, "height": 5, "dpi": 40, "labels": false}
    }"#;
    fs::write(work_dir.join("config.json"), config).unwrap();
}

#[test]
fn test_htslib_pairing_drops_missing_mate() {
    let temp_dir = TempDir::new().unwrap();
    let bam_dir = temp_dir.path().join("bams");
    fs::create_dir(&bam_dir).unwrap();
    write_bam(&bam_dir.join("leaf.bam"), PAIRED_RECORDS);

    let region = Region::new("test", "1", 1, 10000, Strand::Unstranded).unwrap();
    let load = load_alignments(&bam_dir, &region, &HtslibSource, false).unwrap();
    assert!(load.failures.is_empty());
    assert_eq!(load.tracks.len(), 1);

    let track = &load.tracks[0];
    assert_eq!(track.name(), "leaf");
    assert_eq!(track.unpaired(), 1);
    let pairs = track.pairs();
    assert_eq!(pairs.len(), 2);
    assert_eq!((pairs[0].start, pairs[0].end), (100, 349));
    assert_eq!(pairs[0].strand, Strand::Forward);
    assert_eq!((pairs[1].start, pairs[1].end), (150, 449));
    assert_eq!(pairs[1].attributes.mapping_quality, 40);
    assert_eq!(pairs[1].attributes.template_length, 300);
}

#[test]
fn test_htslib_pairs_crossing_region_edge_keep_both_mates() {
    let temp_dir = TempDir::new().unwrap();
    let bam_dir = temp_dir.path().join("bams");
    fs::create_dir(&bam_dir).unwrap();
    // r1 starts inside the region, its mate lies past the end; r3's mate is absent
    write_bam(
        &bam_dir.join("edge.bam"),
        &[PAIRED_RECORDS[0], PAIRED_RECORDS[2], PAIRED_RECORDS[3]],
    );

    let region = Region::new("test", "1", 50, 200, Strand::Unstranded).unwrap();
    let load = load_alignments(&bam_dir, &region, &HtslibSource, false).unwrap();
    assert!(load.failures.is_empty());

    let track = &load.tracks[0];
    assert_eq!(track.pairs().len(), 1);
    assert_eq!(track.unpaired(), 1);
    let pair = &track.pairs()[0];
    assert_eq!((pair.start, pair.end), (100, 349));
    assert_eq!(pair.strand, Strand::Forward);
    assert_eq!(pair.attributes.template_length, 250);
}

#[test]
fn test_htslib_mate_before_region_start_is_found() {
    let temp_dir = TempDir::new().unwrap();
    let bam_dir = temp_dir.path().join("bams");
    fs::create_dir(&bam_dir).unwrap();
    write_bam(&bam_dir.join("edge.bam"), &[PAIRED_RECORDS[0], PAIRED_RECORDS[3]]);

    let region = Region::new("test", "1", 320, 600, Strand::Unstranded).unwrap();
    let load = load_alignments(&bam_dir, &region, &HtslibSource, false).unwrap();
    let track = &load.tracks[0];
    assert_eq!(track.pairs().len(), 1);
    assert_eq!(track.unpaired(), 0);
    assert_eq!((track.pairs()[0].start, track.pairs()[0].end), (100, 349));
}

#[test]
fn test_htslib_unknown_chromosome_is_per_file_failure() {
    let temp_dir = TempDir::new().unwrap();
    let bam_dir = temp_dir.path().join("bams");
    fs::create_dir(&bam_dir).unwrap();
    write_bam(&bam_dir.join("leaf.bam"), PAIRED_RECORDS);

    let region = Region::new("test", "chrX", 1, 100, Strand::Unstranded).unwrap();
    let load = load_alignments(&bam_dir, &region, &HtslibSource, false).unwrap();
    assert!(load.tracks.is_empty());
    assert_eq!(load.failures.len(), 1);
    assert!(matches!(
        load.failures[0].error,
        TrackError::AlignmentLoad { .. }
    ));
}

#[test]
fn test_missing_index_is_per_file_failure() {
    let temp_dir = TempDir::new().unwrap();
    let bam_dir = temp_dir.path().join("bams");
    fs::create_dir(&bam_dir).unwrap();
    let bam_path = bam_dir.join("leaf.bam");
    write_bam(&bam_path, PAIRED_RECORDS);
    fs::remove_file(bam_dir.join("leaf.bam.bai")).unwrap();

    let region = Region::new("test", "1", 1, 1000, Strand::Unstranded).unwrap();
    let load = load_alignments(&bam_dir, &region, &HtslibSource, false).unwrap();
    assert!(load.tracks.is_empty());
    assert_eq!(load.failures.len(), 1);
    assert_eq!(load.failures[0].path, bam_path);
}

#[test]
fn test_full_pipeline_with_corrupt_file() {
    let temp_dir = TempDir::new().unwrap();
    let work_dir = temp_dir.path();
    create_run_dir(work_dir);

    let config = Config::from_path(&work_dir.join("config.json")).unwrap();
    let options = RunOptions {
        output: work_dir.join("plot.png"),
        preview: Some(work_dir.join("preview.svg")),
        parallel: true,
    };
    let report = run(&config, &options, &HtslibSource).unwrap();

    // axis + annotation + two loadable BAMs, in natural file order
    assert_eq!(report.tracks.len(), 4);
    let titles: Vec<&str> = report
        .tracks
        .tracks()
        .iter()
        .map(|t| t.style().title.as_str())
        .collect();
    assert_eq!(&titles[2..], &["sample1", "sample10"]);

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].path, work_dir.join("bams").join("sample2.bam"));

    match &report.tracks.tracks()[1] {
        Track::Annotation(annotation) => {
            let features = annotation.subset().features();
            // g2 starts before the region, g3 is on another chromosome
            assert_eq!(features.len(), 4);
            assert!(features.iter().all(|f| f.gene_id.as_deref() == Some("g1")));
            assert!(features.iter().all(|f| f.symbol.as_deref() == Some("ONE")));
            assert_eq!(features[0].feature, "gene");
        }
        other => panic!("unexpected track: {:?}", other),
    }
    match &report.tracks.tracks()[3] {
        Track::Alignment(alignment) => assert_eq!(alignment.data().pairs().len(), 1),
        other => panic!("unexpected track: {:?}", other),
    }

    assert!(work_dir.join("plot.png").exists());
    assert!(work_dir.join("preview.svg").exists());
}

#[test]
fn test_binary_renders_plot() -> std::io::Result<()> {
    let temp_dir = TempDir::new()?;
    let work_dir = temp_dir.path();
    create_run_dir(work_dir);

    let output = Command::new(get_binary())
        .current_dir(work_dir)
        .args(["-v", "1"])
        .output()?;
    assert!(
        output.status.success(),
        "Run failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let png = fs::read(work_dir.join("plot.png"))?;
    assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("sample2.bam"),
        "Failure summary missing: {}",
        stderr
    );

    // Same inputs give the same image
    let first = png;
    let output = Command::new(get_binary()).current_dir(work_dir).output()?;
    assert!(output.status.success());
    assert_eq!(first, fs::read(work_dir.join("plot.png"))?);
    Ok(())
}

#[test]
fn test_binary_default_render_settings() -> std::io::Result<()> {
    let temp_dir = TempDir::new()?;
    let work_dir = temp_dir.path();
    create_run_dir(work_dir);
    let config = r#"{
        "region": {"genome": "test", "chr": "1", "start": 100, "end": 1000, "strand": "+"},
        "annotations": {"gtf": "genes.gtf"},
        "bamdir": "bams",
        "genes": {"solycids": ["g1"], "symbol": ["ONE"]}
    }"#;
    fs::write(work_dir.join("labelled.json"), config)?;

    let output = Command::new(get_binary())
        .current_dir(work_dir)
        .args(["-c", "labelled.json", "-o", "labelled.png"])
        .output()?;
    assert!(
        output.status.success(),
        "Run failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let png = fs::read(work_dir.join("labelled.png"))?;
    assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));
    Ok(())
}

#[test]
fn test_binary_rejects_inverted_region() -> std::io::Result<()> {
    let temp_dir = TempDir::new()?;
    let work_dir = temp_dir.path();
    create_run_dir(work_dir);
    let config = r#"{
        "region": {"genome": "test", "chr": "1", "start": 5000, "end": 1000, "strand": "+"},
        "annotations": {"gtf": "genes.gtf"},
        "bamdir": "bams"
    }"#;
    fs::write(work_dir.join("bad.json"), config)?;

    let output = Command::new(get_binary())
        .current_dir(work_dir)
        .args(["-c", "bad.json", "-o", "bad.png"])
        .output()?;
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("region.start"));
    assert!(!work_dir.join("bad.png").exists());
    Ok(())
}
