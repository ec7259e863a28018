use std::io::Write;
use std::path::Path;

use flate2::write::GzEncoder;
use mtcorpus::io::reader::LineReader;
use mtcorpus::io::writer::{LineWriter, WriteLine};
use mtcorpus::processing::mode::shuffle_file;
use mtcorpus::processing::{
    shuffle_in_temp_files, shuffle_with_max_lines, ChunkedShuffler, OutputMode, TotalByteSize,
};

fn sentences(nb: usize) -> Vec<String> {
    (0..nb)
        .map(|x| format!("english sentence number {}\n", x + 1))
        .collect()
}

fn create_gz(path: &Path, lines: &[String]) {
    let mut encoder = GzEncoder::new(std::fs::File::create(path).unwrap(), flate2::Compression::default());
    for line in lines {
        encoder.write_all(line.as_bytes()).unwrap();
    }
    encoder.finish().unwrap();
}

fn read_lines(path: &Path) -> Vec<String> {
    LineReader::open(path).unwrap().map(Result::unwrap).collect()
}

fn sorted(mut lines: Vec<String>) -> Vec<String> {
    lines.sort();
    lines
}

#[test_log::test]
fn sample_compressed_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("sentences.gz");
    let lines = sentences(5_000);
    create_gz(&input, &lines);
    let total_byte_size: u64 = lines.iter().map(|l| l.len() as u64).sum();

    let sample = shuffle_with_max_lines(
        LineReader::open(&input).unwrap(),
        "sample",
        500,
        TotalByteSize::Known(total_byte_size),
        None,
    )
    .unwrap();

    assert_eq!(sample.len(), 500);
    let mut unique = sample.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 500);
    assert!(sample.iter().all(|line| lines.contains(line)));
}

#[test_log::test]
fn external_shuffle_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let chunks = tempfile::tempdir().unwrap();
    let output = dir.path().join("shuffled.zst");
    let lines = sentences(5_000);

    let mut writer = LineWriter::create(&output).unwrap();
    let report = shuffle_in_temp_files(
        lines.iter().cloned().map(Ok),
        &mut writer,
        "shuffle",
        10_000,
        50_000,
        chunks.path(),
        false,
    )
    .unwrap();
    writer.finish().unwrap();

    assert_eq!(report.nb_lines, 5_000);
    assert!(report.nb_chunks > 1);
    let shuffled = read_lines(&output);
    assert_ne!(shuffled, lines);
    assert_eq!(sorted(shuffled), sorted(lines));
}

#[test]
fn shuffle_files() {
    let dir = tempfile::tempdir().unwrap();
    let chunks = tempfile::tempdir().unwrap();
    let input = dir.path().join("sentences.gz");
    let lines = sentences(1_000);
    create_gz(&input, &lines);

    let shuffler = ChunkedShuffler::new("shuffle", 1_000, 5_000)
        .unwrap()
        .chunk_dir(chunks.path());
    let modes = [
        OutputMode::Shuffle(shuffler),
        OutputMode::Truncate { max_lines: 100 },
        OutputMode::Stream,
    ];
    for (i, mode) in modes.iter().enumerate() {
        let output = dir.path().join(format!("output_{}.txt", i));
        let written = shuffle_file(
            &input,
            &output,
            "shuffle",
            mode,
            TotalByteSize::Known(std::fs::metadata(&input).unwrap().len()),
        )
        .unwrap();
        let result = read_lines(&output);
        assert_eq!(written as usize, result.len());

        match mode {
            OutputMode::Shuffle(_) => {
                assert_ne!(result, lines);
                assert_eq!(sorted(result), sorted(lines.clone()));
            }
            OutputMode::Truncate { .. } => assert_eq!(result.len(), 100),
            OutputMode::Stream => assert_eq!(result, lines),
        }
    }
}

#[test]
fn missing_input() {
    let dir = tempfile::tempdir().unwrap();
    let res = shuffle_file(
        &dir.path().join("missing.txt"),
        &dir.path().join("output.txt"),
        "shuffle",
        &OutputMode::Stream,
        TotalByteSize::Known(0),
    );
    assert!(matches!(res, Err(mtcorpus::error::Error::Io(_))));
}
