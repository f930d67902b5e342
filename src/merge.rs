//! Merge converted YOLO datasets into one tree
//!
//! Every file is prefixed with its source dataset's folder name. Label lines
//! keep their geometry tokens and get the class id assigned to their source,
//! so each source collapses onto a single class.

use log::{info, warn};
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use crate::error::{Coco2YoloError, Result};
use crate::io::{copy_file, ensure_dir, write_summary, DatasetSummary, SUMMARY_FILE_NAME};
use crate::labels::LABEL_EXTENSION;
use crate::types::{ClassTable, DatasetRole};
use crate::utils::{create_progress_bar, file_name_str};

/// Subsets visited by the merger, in order
pub const MERGE_SUBSETS: [DatasetRole; 3] = [
    DatasetRole::Train,
    DatasetRole::Test,
    DatasetRole::Validation,
];

/// One dataset to merge and the class id its labels collapse onto
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSource {
    pub root: PathBuf,
    pub class_id: u32,
}

impl MergeSource {
    pub fn new(root: impl Into<PathBuf>, class_id: u32) -> Self {
        Self {
            root: root.into(),
            class_id,
        }
    }

    /// Last normal component of the root, used as the file name prefix
    pub fn dataset_name(&self) -> Result<String> {
        self.root
            .components()
            .rev()
            .find_map(|component| match component {
                Component::Normal(name) => name.to_str().map(str::to_string),
                _ => None,
            })
            .ok_or_else(|| {
                Coco2YoloError::InvalidArgument(format!(
                    "cannot derive a dataset name from {}",
                    self.root.display()
                ))
            })
    }
}

/// `<source_dataset_dirname>_<original_filename>`
pub fn merged_file_name(dataset_name: &str, file_name: &str) -> String {
    format!("{}_{}", dataset_name, file_name)
}

/// Replace the class id of one label line; `None` for blank lines.
pub fn rewrite_label_line(line: &str, class_id: u32) -> Option<String> {
    let mut tokens = line.split_whitespace();
    tokens.next()?;
    let mut rewritten = class_id.to_string();
    for token in tokens {
        rewritten.push(' ');
        rewritten.push_str(token);
    }
    Some(rewritten)
}

// Struct to hold merge statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeStats {
    pub files_copied: usize,
    pub label_files_rewritten: usize,
    pub lines_rewritten: usize,
    pub blank_lines_dropped: usize,
    pub missing_folders: usize,
}

impl MergeStats {
    pub fn absorb(&mut self, other: &MergeStats) {
        self.files_copied += other.files_copied;
        self.label_files_rewritten += other.label_files_rewritten;
        self.lines_rewritten += other.lines_rewritten;
        self.blank_lines_dropped += other.blank_lines_dropped;
        self.missing_folders += other.missing_folders;
    }

    pub fn files_written(&self) -> usize {
        self.files_copied + self.label_files_rewritten
    }

    pub fn print_summary(&self, scope: &str) {
        info!("=== Merge Summary ({}) ===", scope);
        info!("Files copied: {}", self.files_copied);
        info!("Label files rewritten: {}", self.label_files_rewritten);
        info!("Label lines rewritten: {}", self.lines_rewritten);
        if self.blank_lines_dropped > 0 {
            warn!("Blank label lines dropped: {}", self.blank_lines_dropped);
        }
        if self.missing_folders > 0 {
            warn!("Source folders not found: {}", self.missing_folders);
        }
    }
}

/// Outcome of merging one source
#[derive(Debug, Clone)]
pub struct SourceReport {
    pub dataset_name: String,
    pub class_id: u32,
    pub stats: MergeStats,
}

/// Rewrite a label file into `target`, truncating it.
pub fn rewrite_label_file(source: &Path, target: &Path, class_id: u32) -> Result<MergeStats> {
    let content = fs::read_to_string(source).map_err(|e| Coco2YoloError::io(source, e))?;
    let file = File::create(target).map_err(|e| Coco2YoloError::io(target, e))?;
    let mut writer = BufWriter::new(file);
    let mut stats = MergeStats {
        label_files_rewritten: 1,
        ..Default::default()
    };
    for line in content.lines() {
        match rewrite_label_line(line, class_id) {
            Some(rewritten) => {
                writeln!(writer, "{}", rewritten).map_err(|e| Coco2YoloError::io(target, e))?;
                stats.lines_rewritten += 1;
            }
            None => stats.blank_lines_dropped += 1,
        }
    }
    writer.flush().map_err(|e| Coco2YoloError::io(target, e))?;
    Ok(stats)
}

fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| Coco2YoloError::io(dir, e))? {
        let path = entry.map_err(|e| Coco2YoloError::io(dir, e))?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Copy every file of `source_dir` into `target_dir` under the prefixed name.
///
/// With `class_id` set, `.txt` files are rewritten line by line; every other
/// file is byte-copied.
pub fn merge_folder(
    source_dir: &Path,
    target_dir: &Path,
    dataset_name: &str,
    class_id: Option<u32>,
) -> Result<MergeStats> {
    if !source_dir.is_dir() {
        warn!("Folder not found, skipping: {}", source_dir.display());
        return Ok(MergeStats {
            missing_folders: 1,
            ..Default::default()
        });
    }
    ensure_dir(target_dir)?;

    list_files(source_dir)?
        .par_iter()
        .map(|source| {
            let file_name = file_name_str(source).ok_or_else(|| {
                Coco2YoloError::InvalidArgument(format!(
                    "file name is not valid UTF-8: {}",
                    source.display()
                ))
            })?;
            let target = target_dir.join(merged_file_name(dataset_name, file_name));
            let is_label = source
                .extension()
                .is_some_and(|ext| ext == LABEL_EXTENSION);
            match class_id {
                Some(class_id) if is_label => rewrite_label_file(source, &target, class_id),
                _ => copy_file(source, &target).map(|_| MergeStats {
                    files_copied: 1,
                    ..Default::default()
                }),
            }
        })
        .try_reduce(MergeStats::default, |mut total, part| {
            total.absorb(&part);
            Ok(total)
        })
}

/// Label folders of a subset: split `bboxes`/`masks` when present, otherwise `labels` itself
pub fn label_folders(subset_dir: &Path) -> Vec<PathBuf> {
    let labels_dir = subset_dir.join("labels");
    let split = [labels_dir.join("bboxes"), labels_dir.join("masks")];
    if split.iter().any(|dir| dir.is_dir()) {
        split.to_vec()
    } else {
        vec![labels_dir]
    }
}

/// Merge one source into `target`
pub fn merge_source(source: &MergeSource, target: &Path) -> Result<SourceReport> {
    let dataset_name = source.dataset_name()?;
    info!(
        "Merging '{}' with class id {} into {}",
        dataset_name,
        source.class_id,
        target.display()
    );

    let pb = create_progress_bar(MERGE_SUBSETS.len() as u64, &dataset_name);
    let mut stats = MergeStats::default();
    for subset in MERGE_SUBSETS {
        let source_subset = source.root.join(subset.dir_name());
        let target_subset = target.join(subset.dir_name());

        stats.absorb(&merge_folder(
            &source_subset.join("images"),
            &target_subset.join("images"),
            &dataset_name,
            None,
        )?);
        for labels_dir in label_folders(&source_subset) {
            let relative = labels_dir
                .strip_prefix(&source_subset)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| PathBuf::from("labels"));
            stats.absorb(&merge_folder(
                &labels_dir,
                &target_subset.join(relative),
                &dataset_name,
                Some(source.class_id),
            )?);
        }
        pb.inc(1);
    }
    pb.finish_with_message(format!("{} merged", dataset_name));
    stats.print_summary(&dataset_name);

    Ok(SourceReport {
        dataset_name,
        class_id: source.class_id,
        stats,
    })
}

/// Merge all sources in order; a later source overwrites same-named files of an earlier one.
pub fn merge_datasets(sources: &[MergeSource], target: &Path) -> Result<Vec<SourceReport>> {
    ensure_dir(target)?;
    sources
        .iter()
        .map(|source| merge_source(source, target))
        .collect()
}

/// Class table naming each source at its class id; `None` unless the ids are exactly `0..n`.
pub fn merged_class_table(reports: &[SourceReport]) -> Option<ClassTable> {
    let mut names: Vec<Option<String>> = vec![None; reports.len()];
    for report in reports {
        let slot = names.get_mut(report.class_id as usize)?;
        if slot.is_some() {
            return None;
        }
        *slot = Some(report.dataset_name.clone());
    }
    names
        .into_iter()
        .collect::<Option<Vec<String>>>()
        .map(ClassTable::new)
}

/// Write `data.yaml` for the merged tree
pub fn write_merged_summary(target: &Path, reports: &[SourceReport]) -> Result<Option<PathBuf>> {
    let Some(names) = merged_class_table(reports) else {
        warn!("Class ids are not 0..n, not writing {}", SUMMARY_FILE_NAME);
        return Ok(None);
    };
    let summary = DatasetSummary::for_root(target, names)?;
    let path = target.join(SUMMARY_FILE_NAME);
    write_summary(&path, &summary)?;
    Ok(Some(path))
}
