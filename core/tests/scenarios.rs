use indicatif::ProgressBar;
use stackdealer_core::{
    decide, group_folder, Action, GroupError, GroupOutcome, MaterializeError, Settings,
    TimestampError, TimestampReader, WorkFolder, EXIT_GROUPED, EXIT_NO_FILES, EXIT_NO_GROUPS,
};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use tempfile::tempdir;
use time::macros::datetime;
use time::{Duration, PrimitiveDateTime};

/// Serves capture times by file name; unknown names have no metadata.
#[derive(Default)]
struct Shoot {
    times: HashMap<String, PrimitiveDateTime>,
    cursor: Option<PrimitiveDateTime>,
}

impl Shoot {
    fn next_name(&self) -> String {
        format!("IMG_{:04}.jpg", self.times.len() + 1)
    }

    fn at(&mut self, gap: Duration) {
        let time = match self.cursor {
            Some(cursor) => cursor + gap,
            None => datetime!(2024-06-01 09:00:00),
        };
        let name = self.next_name();
        self.times.insert(name, time);
        self.cursor = Some(time);
    }

    /// Isolated shots, each ten seconds after the previous photo.
    fn sparse(&mut self, count: usize) {
        for _ in 0..count {
            self.at(Duration::seconds(10));
        }
    }

    /// A burst one second apart, starting ten seconds after the previous photo.
    fn burst(&mut self, count: usize) {
        self.at(Duration::seconds(10));
        for _ in 1..count {
            self.at(Duration::seconds(1));
        }
    }

    fn write_files(&self, folder: &Path) {
        for name in self.times.keys() {
            fs::write(folder.join(name), b"jpeg").unwrap();
        }
    }
}

impl TimestampReader for Shoot {
    fn read_timestamp(&self, path: &Path) -> Result<PrimitiveDateTime, TimestampError> {
        let name = path.file_name().unwrap().to_string_lossy();
        self.times
            .get(name.as_ref())
            .copied()
            .ok_or_else(|| TimestampError::MissingMetadata {
                path: path.to_path_buf(),
            })
    }
}

fn top_level_files(folder: &Path) -> usize {
    fs::read_dir(folder)
        .unwrap()
        .filter(|entry| entry.as_ref().unwrap().path().is_file())
        .count()
}

fn subfolders(folder: &Path) -> Vec<String> {
    let mut names: Vec<_> = fs::read_dir(folder)
        .unwrap()
        .map(|entry| entry.unwrap())
        .filter(|entry| entry.path().is_dir())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn mixed_session_groups_bursts_and_leaves_strays() {
    let mut shoot = Shoot::default();
    shoot.sparse(6);
    for size in [5, 6, 7, 8, 5, 9, 8, 6, 10] {
        shoot.burst(size);
        shoot.sparse(3);
    }
    assert_eq!(shoot.times.len(), 97);

    let dir = tempdir().unwrap();
    shoot.write_files(dir.path());

    let outcome = group_folder(
        dir.path(),
        &Settings::default(),
        &shoot,
        &ProgressBar::hidden(),
    )
    .unwrap();
    assert_eq!(outcome.exit_code(), EXIT_GROUPED);

    let report = outcome.report();
    assert_eq!(report.image_files, 97);
    assert_eq!(report.clustering.stacks.len(), 9);
    assert_eq!(report.stats.folders_created, 9);
    assert_eq!(report.stats.files_moved, 64);
    assert!(report.clustering.oversized.is_empty());
    let expected: BTreeMap<usize, usize> =
        [(5, 2), (6, 2), (7, 1), (8, 2), (9, 1), (10, 1)].into_iter().collect();
    assert_eq!(report.clustering.size_histogram, expected);

    let grouped = dir.path().join("fs");
    let folders = subfolders(&grouped);
    assert_eq!(folders.len(), 9);
    assert!(folders.contains(&String::from("IMG_0007_to_IMG_0011")));
    let moved: usize = folders
        .iter()
        .map(|name| top_level_files(&grouped.join(name)))
        .sum();
    assert_eq!(moved, 64);
    assert_eq!(top_level_files(dir.path()), 33);
}

#[test]
fn sparse_session_creates_nothing() {
    let mut shoot = Shoot::default();
    shoot.sparse(33);
    let dir = tempdir().unwrap();
    shoot.write_files(dir.path());

    let outcome = group_folder(
        dir.path(),
        &Settings::default(),
        &shoot,
        &ProgressBar::hidden(),
    )
    .unwrap();
    assert!(matches!(outcome, GroupOutcome::NoGroups(_)));
    assert_eq!(outcome.exit_code(), EXIT_NO_GROUPS);
    assert_eq!(outcome.report().clustering.discarded_runs, 33);
    assert!(!dir.path().join("fs").exists());
    assert_eq!(top_level_files(dir.path()), 33);
}

#[test]
fn long_burst_stays_in_one_flagged_folder() {
    let mut shoot = Shoot::default();
    shoot.burst(16);
    let dir = tempdir().unwrap();
    shoot.write_files(dir.path());

    let outcome = group_folder(
        dir.path(),
        &Settings::default(),
        &shoot,
        &ProgressBar::hidden(),
    )
    .unwrap();
    let report = outcome.report();
    assert_eq!(report.clustering.stacks.len(), 1);
    assert_eq!(report.clustering.oversized, vec![0]);

    let stack_dir = dir.path().join("fs").join("IMG_0001_to_IMG_0016");
    assert_eq!(top_level_files(&stack_dir), 16);
    assert_eq!(top_level_files(dir.path()), 0);
}

#[test]
fn unreadable_metadata_everywhere_means_no_files() {
    let dir = tempdir().unwrap();
    for n in 0..8 {
        fs::write(dir.path().join(format!("scan_{}.jpg", n)), b"jpeg").unwrap();
    }
    fs::write(dir.path().join("notes.txt"), b"not an image").unwrap();

    let outcome = group_folder(
        dir.path(),
        &Settings::default(),
        &Shoot::default(),
        &ProgressBar::hidden(),
    )
    .unwrap();
    assert!(matches!(outcome, GroupOutcome::NoFiles(_)));
    assert_eq!(outcome.exit_code(), EXIT_NO_FILES);
    assert_eq!(outcome.report().image_files, 8);
    assert_eq!(outcome.report().skipped.len(), 8);
    assert_eq!(top_level_files(dir.path()), 9);
    assert!(!dir.path().join("fs").exists());
}

#[test]
fn regrouping_a_processed_folder_leaves_it_alone() {
    let mut shoot = Shoot::default();
    shoot.burst(6);
    shoot.sparse(2);
    let dir = tempdir().unwrap();
    shoot.write_files(dir.path());
    let settings = Settings::default();

    group_folder(dir.path(), &settings, &shoot, &ProgressBar::hidden()).unwrap();
    let again = group_folder(dir.path(), &settings, &shoot, &ProgressBar::hidden()).unwrap();
    assert!(matches!(again, GroupOutcome::NoGroups(_)));
    assert_eq!(subfolders(&dir.path().join("fs")).len(), 1);
    assert_eq!(top_level_files(dir.path()), 2);
}

#[test]
fn new_burst_beside_existing_grouped_folder_is_refused() {
    let mut shoot = Shoot::default();
    shoot.burst(5);
    let dir = tempdir().unwrap();
    shoot.write_files(dir.path());
    fs::create_dir(dir.path().join("fs")).unwrap();

    let error = group_folder(
        dir.path(),
        &Settings::default(),
        &shoot,
        &ProgressBar::hidden(),
    )
    .unwrap_err();
    assert!(matches!(
        error,
        GroupError::Materialize(MaterializeError::AlreadyProcessed { .. })
    ));
    assert_eq!(top_level_files(dir.path()), 5);
}

#[test]
fn missing_source_folder_is_reported() {
    let dir = tempdir().unwrap();
    let error = group_folder(
        &dir.path().join("absent"),
        &Settings::default(),
        &Shoot::default(),
        &ProgressBar::hidden(),
    )
    .unwrap_err();
    assert!(matches!(error, GroupError::SourceNotFound { .. }));
}

#[test]
fn workflow_cycles_through_numbered_folders() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("storage");
    let settings = Settings::default();
    let next = || {
        decide(
            &root,
            &settings.folder_base_pattern,
            &settings.grouped_folder_name,
            &settings.supported_extensions,
        )
        .unwrap()
    };

    let (action, folder) = next();
    assert_eq!(action, Action::AcquirePhotos);
    assert_eq!(folder, WorkFolder::new(&root, "!newstack", 0));
    assert!(root.is_dir());

    folder.ensure_exists().unwrap();
    let (action, same) = next();
    assert_eq!(action, Action::AcquirePhotos);
    assert_eq!(same.path, folder.path);

    let mut shoot = Shoot::default();
    shoot.burst(5);
    shoot.write_files(&folder.path);
    let (action, same) = next();
    assert_eq!(action, Action::GroupPhotos);
    assert_eq!(same.path, folder.path);

    group_folder(&folder.path, &settings, &shoot, &ProgressBar::hidden()).unwrap();
    let (action, following) = next();
    assert_eq!(action, Action::AcquirePhotos);
    assert_eq!(following.name(), "!newstack_1");
    assert!(!following.path.exists());
}
