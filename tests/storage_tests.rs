use anyhow::Result;
use dashboard::storage::{FileSystemStorage, LEDGER_FILE, UPLOAD_DIR};
use std::fs;

#[test]
fn test_save_writes_file_and_reports_location() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let storage = FileSystemStorage::new(temp_dir.path(), "/media/")?;

    let dataset = storage.save("cars.csv", b"a,b\n1,2\n")?;

    assert_eq!(dataset.name, "cars.csv");
    assert_eq!(dataset.file.name, "datasets/cars.csv");
    assert_eq!(dataset.file.url, "/media/datasets/cars.csv");
    assert!(dataset.file.path.is_absolute());
    assert_eq!(fs::read(&dataset.file.path)?, b"a,b\n1,2\n");
    assert!(storage.exists("datasets/cars.csv"));

    Ok(())
}

#[test]
fn test_collisions_get_a_unique_name() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let storage = FileSystemStorage::new(temp_dir.path(), "/media")?;

    let first = storage.save("cars.csv", b"first")?;
    let second = storage.save("cars.csv", b"second")?;

    assert_ne!(first.file.path, second.file.path);
    assert!(second.file.name.starts_with("datasets/cars_"));
    assert!(second.file.name.ends_with(".csv"));
    assert_eq!(fs::read(&first.file.path)?, b"first");
    assert_eq!(fs::read(&second.file.path)?, b"second");

    let stored = fs::read_dir(temp_dir.path().join(UPLOAD_DIR))?.count();
    assert_eq!(stored, 2);

    Ok(())
}

#[test]
fn test_names_are_sanitised_and_urls_encoded() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let storage = FileSystemStorage::new(temp_dir.path(), "/media/")?;

    let dataset = storage.save("../my cars.csv", b"x\n1\n")?;

    assert_eq!(dataset.file.name, "datasets/my_cars.csv");
    assert!(dataset.file.path.starts_with(storage.location()));
    assert_eq!(storage.url("datasets/a b.csv"), "/media/datasets/a%20b.csv");

    Ok(())
}

#[test]
fn test_every_upload_is_recorded() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let storage = FileSystemStorage::new(temp_dir.path(), "/media/")?;
    assert!(storage.datasets()?.is_empty());

    let first = storage.save("one.csv", b"a\n1\n")?;
    let second = storage.save("two.csv", b"a\n2\n")?;

    let recorded = storage.datasets()?;
    assert_eq!(recorded, vec![first, second]);
    assert!(recorded[0].uploaded_at <= recorded[1].uploaded_at);

    Ok(())
}

#[test]
fn test_unusable_name_is_refused() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let storage = FileSystemStorage::new(temp_dir.path(), "/media/")?;

    assert!(storage.save("..", b"data").is_err());
    assert_eq!(fs::read_dir(temp_dir.path().join(UPLOAD_DIR))?.count(), 0);

    Ok(())
}

#[test]
fn test_damaged_ledger_does_not_block_uploads() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let storage = FileSystemStorage::new(temp_dir.path(), "/media/")?;
    fs::write(temp_dir.path().join(LEDGER_FILE), "{oops\n")?;

    let first = storage.save("cars.csv", b"a\n1\n")?;
    let second = storage.save("cars.csv", b"a\n2\n")?;

    assert_eq!(storage.datasets()?, vec![first, second]);

    Ok(())
}

#[test]
fn test_unrecorded_upload_is_removed() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let storage = FileSystemStorage::new(temp_dir.path(), "/media/")?;
    // A directory in the ledger's place cannot be appended to
    fs::create_dir(temp_dir.path().join(LEDGER_FILE))?;

    assert!(storage.save("cars.csv", b"a\n1\n").is_err());
    assert_eq!(fs::read_dir(temp_dir.path().join(UPLOAD_DIR))?.count(), 0);

    Ok(())
}

#[test]
fn test_ledger_is_one_record_per_line() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let storage = FileSystemStorage::new(temp_dir.path(), "/media/")?;

    storage.save("one.csv", b"a\n1\n")?;
    storage.save("two.csv", b"a\n2\n")?;

    let ledger = fs::read_to_string(temp_dir.path().join(LEDGER_FILE))?;
    let lines: Vec<&str> = ledger.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("one.csv"));
    assert!(lines[1].contains("two.csv"));

    Ok(())
}
