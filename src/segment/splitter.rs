//! WAV splitting into fixed-length segments.

use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::constants::filenames;
use crate::error::{Error, Result};
use crate::segment::{SegmentIndex, SegmentIndexEntry, plan_segments};

/// Result of splitting a directory of recordings.
#[derive(Debug, Clone)]
pub struct SplitOutcome {
    /// Number of recordings split successfully.
    pub files: usize,
    /// Total number of segments written.
    pub segments: usize,
    /// Path of the written segment index, if any segments were produced.
    pub index_path: Option<PathBuf>,
}

/// Split every WAV file in `input_dir` into fixed-length segments.
///
/// Segment files are written to `output_dir` as `{stem}_seg{NNN}.wav` and
/// the index lands next to them as `segment_index.csv`. A recording that
/// cannot be read is skipped with a warning; the batch continues.
pub fn split_directory(
    input_dir: &Path,
    output_dir: &Path,
    segment_length_secs: u32,
    progress_enabled: bool,
) -> Result<SplitOutcome> {
    if !input_dir.is_dir() {
        warn!("Splitter input directory not found: {}", input_dir.display());
        return Ok(SplitOutcome {
            files: 0,
            segments: 0,
            index_path: None,
        });
    }

    std::fs::create_dir_all(output_dir).map_err(|e| Error::OutputDirCreate {
        path: output_dir.to_path_buf(),
        source: e,
    })?;

    let mut wav_files: Vec<PathBuf> = std::fs::read_dir(input_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
        })
        .collect();
    wav_files.sort();

    if wav_files.is_empty() {
        warn!("No WAV files found in {}", input_dir.display());
        return Ok(SplitOutcome {
            files: 0,
            segments: 0,
            index_path: None,
        });
    }

    info!(
        "Splitting {} recording(s) into {segment_length_secs}s segments",
        wav_files.len()
    );

    let progress = create_progress(wav_files.len(), progress_enabled);
    let mut index_entries = Vec::new();
    let mut files_ok = 0;

    for file in &wav_files {
        match split_file(file, output_dir, segment_length_secs) {
            Ok(mut entries) => {
                files_ok += 1;
                index_entries.append(&mut entries);
            }
            Err(e) => warn!("Skipping {}: {e}", file.display()),
        }
        if let Some(pb) = &progress {
            pb.inc(1);
        }
    }

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let index_path = if index_entries.is_empty() {
        None
    } else {
        let path = output_dir.join(filenames::SEGMENT_INDEX);
        SegmentIndex::write(&path, &index_entries)?;
        info!(
            "Segment index written to {} ({} segments)",
            path.display(),
            index_entries.len()
        );
        Some(path)
    };

    Ok(SplitOutcome {
        files: files_ok,
        segments: index_entries.len(),
        index_path,
    })
}

/// Split one recording into segments.
fn split_file(
    path: &Path,
    output_dir: &Path,
    segment_length_secs: u32,
) -> Result<Vec<SegmentIndexEntry>> {
    let mut reader = WavReader::open(path).map_err(|e| Error::WavOpen {
        path: path.to_path_buf(),
        source: e,
    })?;
    let spec = reader.spec();

    // Interleaved samples; slicing happens on frame boundaries.
    match spec.sample_format {
        SampleFormat::Int => {
            let samples = collect_samples::<i32>(&mut reader, path)?;
            split_samples(&samples, spec, path, output_dir, segment_length_secs)
        }
        SampleFormat::Float => {
            let samples = collect_samples::<f32>(&mut reader, path)?;
            split_samples(&samples, spec, path, output_dir, segment_length_secs)
        }
    }
}

fn collect_samples<S: hound::Sample>(
    reader: &mut WavReader<std::io::BufReader<std::fs::File>>,
    path: &Path,
) -> Result<Vec<S>> {
    reader
        .samples::<S>()
        .collect::<std::result::Result<Vec<S>, hound::Error>>()
        .map_err(|e| Error::WavOpen {
            path: path.to_path_buf(),
            source: e,
        })
}

fn split_samples<S: hound::Sample + Copy>(
    samples: &[S],
    spec: WavSpec,
    path: &Path,
    output_dir: &Path,
    segment_length_secs: u32,
) -> Result<Vec<SegmentIndexEntry>> {
    let channels = usize::from(spec.channels.max(1));
    let frames = samples.len() / channels;
    #[allow(clippy::cast_precision_loss)]
    let duration_sec = frames as f64 / f64::from(spec.sample_rate);

    let original_filename = path
        .file_name()
        .map_or_else(String::new, |n| n.to_string_lossy().into_owned());

    let mut entries = plan_segments(&original_filename, duration_sec, segment_length_secs);

    for entry in &mut entries {
        #[allow(clippy::cast_possible_truncation)]
        let start_frame = (entry.segment_start_sec * u64::from(spec.sample_rate)) as usize;
        let end_frame =
            (start_frame + segment_length_secs as usize * spec.sample_rate as usize).min(frames);

        let segment = &samples[start_frame * channels..end_frame * channels];
        let out_path = output_dir.join(&entry.segment_filename);
        write_segment(&out_path, spec, segment)?;

        // Frame-accurate duration for the index.
        #[allow(clippy::cast_precision_loss)]
        let actual = (end_frame - start_frame) as f64 / f64::from(spec.sample_rate);
        entry.segment_duration_sec = actual;
    }

    Ok(entries)
}

fn write_segment<S: hound::Sample + Copy>(path: &Path, spec: WavSpec, samples: &[S]) -> Result<()> {
    let mut writer = WavWriter::create(path, spec).map_err(|e| Error::WavWrite {
        path: path.to_path_buf(),
        source: e,
    })?;
    for &sample in samples {
        writer.write_sample(sample).map_err(|e| Error::WavWrite {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    writer.finalize().map_err(|e| Error::WavWrite {
        path: path.to_path_buf(),
        source: e,
    })
}

fn create_progress(total_files: usize, enabled: bool) -> Option<ProgressBar> {
    if !enabled || total_files == 0 {
        return None;
    }

    let pb = ProgressBar::new(total_files as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} files ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░ "),
    );
    Some(pb)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn write_test_wav(path: &Path, seconds: u32, sample_rate: u32) {
        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for i in 0..(seconds * sample_rate) {
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            writer.write_sample((i % 100) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_split_thirty_second_file_into_two_second_segments() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_test_wav(&input.path().join("rec1.wav"), 30, 1000);

        let outcome = split_directory(input.path(), output.path(), 2, false).unwrap();
        assert_eq!(outcome.files, 1);
        assert_eq!(outcome.segments, 15);

        let index = SegmentIndex::read(&outcome.index_path.unwrap()).unwrap();
        let starts: Vec<u64> = index.entries().iter().map(|e| e.segment_start_sec).collect();
        assert_eq!(starts, (0..15).map(|i| i * 2).collect::<Vec<u64>>());

        // Each segment holds exactly two seconds of audio.
        let seg = WavReader::open(output.path().join("rec1_seg001.wav")).unwrap();
        assert_eq!(seg.duration(), 2000);
        assert!(output.path().join("rec1_seg015.wav").exists());
        assert!(!output.path().join("rec1_seg016.wav").exists());
    }

    #[test]
    fn test_split_keeps_short_tail() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_test_wav(&input.path().join("rec2.wav"), 5, 1000);

        let outcome = split_directory(input.path(), output.path(), 2, false).unwrap();
        assert_eq!(outcome.segments, 3);

        let tail = WavReader::open(output.path().join("rec2_seg003.wav")).unwrap();
        assert_eq!(tail.duration(), 1000);
    }

    #[test]
    fn test_split_skips_unreadable_file() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        std::fs::write(input.path().join("broken.wav"), b"not a wav").unwrap();
        write_test_wav(&input.path().join("ok.wav"), 2, 1000);

        let outcome = split_directory(input.path(), output.path(), 2, false).unwrap();
        assert_eq!(outcome.files, 1);
        assert_eq!(outcome.segments, 1);
    }

    #[test]
    fn test_split_empty_directory_is_clean() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let outcome = split_directory(input.path(), output.path(), 2, false).unwrap();
        assert_eq!(outcome.segments, 0);
        assert!(outcome.index_path.is_none());
    }
}
