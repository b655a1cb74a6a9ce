use std::collections::BTreeSet;
use std::fs;

use assert_matches::assert_matches;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::NaiveDateTime;

use satfetch::error::SatfetchError;
use satfetch::integrity::{IntegritySettings, IntegrityValidator};
use satfetch::parser::FilePathParser;

struct Archive {
    _temp: tempfile::TempDir,
    root: Utf8PathBuf,
}

impl Archive {
    fn new() -> Self {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        Self { _temp: temp, root }
    }

    fn file(&self, name: &str, size: usize) -> Utf8PathBuf {
        let path = self.root.join(name);
        fs::write(&path, vec![0u8; size]).unwrap();
        path
    }
}

fn settings(nominal_size: Option<u64>) -> IntegritySettings {
    IntegritySettings {
        nominal_size,
        ..IntegritySettings::default()
    }
}

fn stamp(value: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M").unwrap()
}

#[test]
fn reports_reference_entries_without_a_candidate() {
    let archive = Archive::new();
    let candidates = vec![
        archive.file("a", 10),
        archive.file("b", 10),
        archive.file("c", 10),
    ];
    let reference = ["a", "b", "c", "d"]
        .iter()
        .map(|name| archive.root.join(name))
        .collect::<BTreeSet<_>>();
    let validator = IntegrityValidator::identity(settings(None), Some(reference)).unwrap();

    let result = validator.verify(&candidates).unwrap();

    assert_eq!(
        result.missing,
        Some(BTreeSet::from([archive.root.join("d")]))
    );
    assert_eq!(result.corrupted, None);
}

#[test]
fn flags_files_outside_the_size_tolerance() {
    let archive = Archive::new();
    let candidates = vec![
        archive.file("exact", 1000),
        archive.file("slightly_small", 995),
        archive.file("too_big", 1020),
        archive.file("empty", 0),
    ];
    let validator = IntegrityValidator::identity(settings(Some(1000)), None).unwrap();

    let result = validator.verify(&candidates).unwrap();

    assert_eq!(result.missing, None);
    assert_eq!(
        result.corrupted,
        Some(BTreeSet::from([
            archive.root.join("too_big"),
            archive.root.join("empty"),
        ]))
    );
}

#[test]
fn nothing_requested_means_both_halves_absent() {
    let archive = Archive::new();
    let candidates = vec![archive.file("a", 10)];
    let validator = IntegrityValidator::identity(settings(None), None).unwrap();

    let result = validator.verify(&candidates).unwrap();

    assert_eq!(result.missing, None);
    assert_eq!(result.corrupted, None);
}

#[test]
fn empty_candidates_give_empty_sets() {
    let validator =
        IntegrityValidator::identity(settings(Some(1000)), Some(BTreeSet::new())).unwrap();

    let result = validator.verify(&[]).unwrap();

    assert_eq!(result.missing, Some(BTreeSet::new()));
    assert_eq!(result.corrupted, Some(BTreeSet::new()));
}

#[test]
fn missing_is_a_subset_of_the_reference() {
    let archive = Archive::new();
    let candidates = vec![archive.file("a", 1), archive.file("x", 1)];
    let reference = BTreeSet::from([archive.root.join("a"), archive.root.join("b")]);
    let validator =
        IntegrityValidator::identity(settings(None), Some(reference.clone())).unwrap();

    let missing = validator.find_missing(&candidates).unwrap();

    assert!(missing.is_subset(&reference));
    assert_eq!(missing, BTreeSet::from([archive.root.join("b")]));
}

#[test]
fn repeated_verification_is_identical() {
    let archive = Archive::new();
    let candidates = vec![archive.file("a", 990), archive.file("b", 1000)];
    let reference = BTreeSet::from([archive.root.join("a"), archive.root.join("c")]);
    let validator = IntegrityValidator::identity(settings(Some(1000)), Some(reference)).unwrap();

    let first = validator.verify(&candidates).unwrap();
    let second = validator.verify(&candidates).unwrap();

    assert_eq!(first, second);
}

#[test]
fn parallel_size_lookup_matches_sequential() {
    let archive = Archive::new();
    let candidates = (0..32)
        .map(|index| archive.file(&format!("file_{index:02}"), if index % 5 == 0 { 10 } else { 1000 }))
        .collect::<Vec<_>>();
    let sequential = IntegrityValidator::identity(settings(Some(1000)), None).unwrap();
    let parallel = IntegrityValidator::identity(
        IntegritySettings {
            parallelism: 4,
            ..settings(Some(1000))
        },
        None,
    )
    .unwrap();

    let expected = sequential.find_corrupted(&candidates).unwrap();
    let actual = parallel.find_corrupted(&candidates).unwrap();

    assert_eq!(actual, expected);
    assert_eq!(actual.unwrap().len(), 7);
}

#[test]
fn unreadable_candidate_counts_as_corrupted() {
    let archive = Archive::new();
    let gone = archive.root.join("gone");
    let validator = IntegrityValidator::identity(settings(Some(1000)), None).unwrap();

    let corrupted = validator.find_corrupted(&[gone.clone()]).unwrap();

    assert_eq!(corrupted, Some(BTreeSet::from([gone])));
}

#[test]
fn transform_maps_file_names_to_timestamps() {
    let archive = Archive::new();
    let candidates = vec![
        archive.file("seviri_20220101_00_12.nc", 10),
        archive.file("seviri_20220101_00_27.nc", 10),
        archive.file("readme.txt", 10),
    ];
    let reference = BTreeSet::from([
        stamp("2022-01-01 00:12"),
        stamp("2022-01-01 00:27"),
        stamp("2022-01-01 00:42"),
    ]);
    let validator = IntegrityValidator::with_transform(
        settings(None),
        Some(reference),
        |path: &Utf8Path| FilePathParser::parse_path(path),
    )
    .unwrap();

    let result = validator.verify(&candidates).unwrap();

    assert_eq!(
        result.missing,
        Some(BTreeSet::from([stamp("2022-01-01 00:42")]))
    );
}

#[test]
fn invalid_settings_are_rejected() {
    assert_matches!(
        IntegrityValidator::identity(
            IntegritySettings {
                tolerance: -0.1,
                ..IntegritySettings::default()
            },
            None,
        )
        .err(),
        Some(SatfetchError::Configuration(_))
    );
    assert_matches!(
        IntegrityValidator::identity(
            IntegritySettings {
                parallelism: 0,
                ..IntegritySettings::default()
            },
            None,
        )
        .err(),
        Some(SatfetchError::Configuration(_))
    );
}
