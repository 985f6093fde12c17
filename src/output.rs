//! Tab-separated output with all-or-nothing variant publication.
//!
//! A variant is written into a staging directory under the output root and
//! renamed into `<root>/<variant>` only after all three tables are flushed.
//! A failed write leaves any previously published variant in place.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::info;

use crate::constants::output::{
    DELIMITER, DEV_FILE, EVAL_HEADER, RETIRED_DIR, STAGED_DIR, STAGING_PREFIX, TEST_FILE,
    TRAIN_FILE, TRAIN_HEADER,
};
use crate::data::{DatasetVariant, EvalRow, Interaction};
use crate::errors::PipelineError;

fn tsv_writer(path: &Path) -> Result<csv::Writer<fs::File>, PipelineError> {
    Ok(csv::WriterBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(false)
        .from_path(path)?)
}

/// Write `user_id, item_id, time` rows.
pub fn write_train_table(path: &Path, rows: &[Interaction]) -> Result<(), PipelineError> {
    let mut writer = tsv_writer(path)?;
    writer.write_record(TRAIN_HEADER)?;
    for row in rows {
        writer.write_record([
            row.user_id.to_string(),
            row.item_id.to_string(),
            row.timestamp.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Write `user_id, item_id, time, neg_items` rows.
pub fn write_eval_table(path: &Path, rows: &[EvalRow]) -> Result<(), PipelineError> {
    let mut writer = tsv_writer(path)?;
    writer.write_record(EVAL_HEADER)?;
    for row in rows {
        writer.write_record([
            row.target.user_id.to_string(),
            row.target.item_id.to_string(),
            row.target.timestamp.to_string(),
            row.negatives.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn validate_variant_dir_name(name: &str) -> Result<(), PipelineError> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !name.starts_with(STAGING_PREFIX) => Ok(()),
        _ => Err(PipelineError::Configuration(format!(
            "variant name '{name}' is not a plain directory name"
        ))),
    }
}

/// Write the three tables of `variant` under `root/<variant.name>`.
///
/// Returns the published directory.
pub fn write_variant(root: &Path, variant: &DatasetVariant) -> Result<PathBuf, PipelineError> {
    validate_variant_dir_name(&variant.name)?;
    fs::create_dir_all(root)?;
    let staging = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(root)?;
    let staged = staging.path().join(STAGED_DIR);
    fs::create_dir(&staged)?;
    write_train_table(&staged.join(TRAIN_FILE), &variant.train)?;
    write_eval_table(&staged.join(DEV_FILE), &variant.dev)?;
    write_eval_table(&staged.join(TEST_FILE), &variant.test)?;

    let target = root.join(&variant.name);
    publish(&staged, &target, staging.path())?;
    info!(
        variant = %variant.name,
        dir = %target.display(),
        train = variant.train.len(),
        dev = variant.dev.len(),
        test = variant.test.len(),
        "[evalset:output] variant published"
    );
    Ok(target)
}

/// Swap `staged` into `target`, parking any previous content under `scratch`.
fn publish(staged: &Path, target: &Path, scratch: &Path) -> Result<(), PipelineError> {
    if !target.exists() {
        fs::rename(staged, target)?;
        return Ok(());
    }
    if !target.is_dir() {
        return Err(PipelineError::Io(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("'{}' exists and is not a directory", target.display()),
        )));
    }
    let retired = scratch.join(RETIRED_DIR);
    fs::rename(target, &retired)?;
    if let Err(err) = fs::rename(staged, target) {
        fs::rename(&retired, target)?;
        return Err(err.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::NegativeSampleSet;
    use tempfile::tempdir;

    fn variant(name: &str) -> DatasetVariant {
        DatasetVariant {
            name: name.to_string(),
            train: vec![Interaction::new(1, 10, 1), Interaction::new(2, 20, 1)],
            dev: vec![EvalRow {
                target: Interaction::new(1, 11, 2),
                negatives: NegativeSampleSet(vec![20, 40]),
            }],
            test: vec![EvalRow {
                target: Interaction::new(2, 30, 3),
                negatives: NegativeSampleSet(vec![10, 11]),
            }],
        }
    }

    #[test]
    fn writes_headers_and_neg_item_lists() {
        let dir = tempdir().unwrap();
        let published = write_variant(dir.path(), &variant("Original")).unwrap();
        let train = fs::read_to_string(published.join(TRAIN_FILE)).unwrap();
        assert_eq!(train, "user_id\titem_id\ttime\n1\t10\t1\n2\t20\t1\n");
        let dev = fs::read_to_string(published.join(DEV_FILE)).unwrap();
        assert_eq!(dev, "user_id\titem_id\ttime\tneg_items\n1\t11\t2\t[20, 40]\n");
        let test = fs::read_to_string(published.join(TEST_FILE)).unwrap();
        assert!(test.ends_with("2\t30\t3\t[10, 11]\n"));
    }

    #[test]
    fn republishing_replaces_previous_tables_and_cleans_staging() {
        let dir = tempdir().unwrap();
        write_variant(dir.path(), &variant("V")).unwrap();
        let mut second = variant("V");
        second.train.truncate(1);
        let published = write_variant(dir.path(), &second).unwrap();
        let train = fs::read_to_string(published.join(TRAIN_FILE)).unwrap();
        assert_eq!(train.lines().count(), 2);
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(STAGING_PREFIX))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn variants_named_like_scratch_dirs_can_be_republished() {
        let dir = tempdir().unwrap();
        for name in ["previous", STAGED_DIR, RETIRED_DIR] {
            write_variant(dir.path(), &variant(name)).unwrap();
            let mut second = variant(name);
            second.train.truncate(1);
            let published = write_variant(dir.path(), &second).unwrap();
            assert_eq!(published, dir.path().join(name));
            let train = fs::read_to_string(published.join(TRAIN_FILE)).unwrap();
            assert_eq!(train, "user_id\titem_id\ttime\n1\t10\t1\n");
        }
    }

    #[test]
    fn path_like_names_are_rejected() {
        let dir = tempdir().unwrap();
        for name in ["../escape", "a/b", "", ".staging-x"] {
            let err = write_variant(dir.path(), &variant(name)).unwrap_err();
            assert!(matches!(err, PipelineError::Configuration(_)), "{name}");
        }
    }
}
