use geostore_core::store::DataStore;
use geostore_core::{ErrorKind, Field, FieldType, Progress};
use std::fs;
use std::path::Path;

fn file_store(dir: &Path) -> DataStore {
    let store = DataStore::create(dir.join("att.gst")).unwrap();
    store
        .create_table(
            "docs",
            &[Field::new("title", FieldType::Text)],
            &Progress::default(),
        )
        .unwrap();
    store
}

fn blob(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn add_and_list_attachments() {
    let dir = tempfile::tempdir().unwrap();
    let store = file_store(dir.path());
    let docs = store.table("docs").unwrap();

    let fid = docs.insert_feature(&docs.create_feature()).unwrap();
    let source = blob(dir.path(), "photo.jpg", "not really a jpeg");

    let aid = docs
        .add_attachment(fid, "photo.jpg", "site photo", &source, false, -1)
        .unwrap();

    let attachments = docs.attachments(fid).unwrap();
    assert_eq!(attachments.len(), 1);
    let info = &attachments[0];
    assert_eq!(info.id, aid);
    assert_eq!(info.feature_id, fid);
    assert_eq!(info.name, "photo.jpg");
    assert_eq!(info.description, "site photo");
    assert_eq!(info.size, "not really a jpeg".len() as u64);
    assert!(info.path.is_file());
    // Copy mode leaves the source in place.
    assert!(source.is_file());
}

#[test]
fn attachment_path_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let store = file_store(dir.path());

    let first = store.attachment_path("docs", 12, 3);
    let second = store.attachment_path("docs", 12, 3);
    assert_eq!(first, second);

    // Keyed by table, then feature id, then attachment id.
    let relative = first.strip_prefix(store.data_path()).unwrap();
    assert_eq!(relative, Path::new("docs/12/3"));
}

#[test]
fn move_mode_consumes_the_source_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = file_store(dir.path());
    let docs = store.table("docs").unwrap();

    let fid = docs.insert_feature(&docs.create_feature()).unwrap();
    let source = blob(dir.path(), "scan.pdf", "pdf bytes");
    let aid = docs
        .add_attachment(fid, "scan.pdf", "", &source, true, -1)
        .unwrap();

    assert!(!source.exists());
    assert!(store.attachment_path("docs", fid, aid).is_file());
}

#[test]
fn delete_attachment_removes_row_and_blob() {
    let dir = tempfile::tempdir().unwrap();
    let store = file_store(dir.path());
    let docs = store.table("docs").unwrap();

    let fid = docs.insert_feature(&docs.create_feature()).unwrap();
    let source = blob(dir.path(), "note.txt", "x");
    let aid = docs
        .add_attachment(fid, "note.txt", "", &source, false, -1)
        .unwrap();
    let path = store.attachment_path("docs", fid, aid);
    assert!(path.is_file());

    docs.delete_attachment(aid).unwrap();
    assert!(docs.attachments(fid).unwrap().is_empty());
    assert!(!path.exists());

    let err = docs.delete_attachment(aid).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn update_attachment_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let store = file_store(dir.path());
    let docs = store.table("docs").unwrap();

    let fid = docs.insert_feature(&docs.create_feature()).unwrap();
    let source = blob(dir.path(), "a.txt", "x");
    let aid = docs
        .add_attachment(fid, "a.txt", "old", &source, false, -1)
        .unwrap();

    docs.update_attachment(aid, "b.txt", "new description")
        .unwrap();
    let info = &docs.attachments(fid).unwrap()[0];
    assert_eq!(info.name, "b.txt");
    assert_eq!(info.description, "new description");
}

#[test]
fn attachment_remote_ids() {
    let dir = tempfile::tempdir().unwrap();
    let store = file_store(dir.path());
    let docs = store.table("docs").unwrap();

    let fid = docs.insert_feature(&docs.create_feature()).unwrap();
    let source = blob(dir.path(), "r.txt", "x");
    let aid = docs
        .add_attachment(fid, "r.txt", "", &source, false, -1)
        .unwrap();
    assert_eq!(docs.attachments(fid).unwrap()[0].rid, -1);

    docs.set_attachment_remote_id(aid, 900).unwrap();
    assert_eq!(docs.attachments(fid).unwrap()[0].rid, 900);
}

#[test]
fn feature_delete_does_not_cascade_to_attachments() {
    let dir = tempfile::tempdir().unwrap();
    let store = file_store(dir.path());
    let docs = store.table("docs").unwrap();

    let fid = docs.insert_feature(&docs.create_feature()).unwrap();
    let source = blob(dir.path(), "kept.txt", "survivor");
    docs.add_attachment(fid, "kept.txt", "", &source, false, -1)
        .unwrap();

    docs.delete_feature(fid).unwrap();

    // Attachment rows and blobs are managed independently; cleanup is the
    // caller's explicit operation.
    let orphaned = docs.attachments(fid).unwrap();
    assert_eq!(orphaned.len(), 1);
    assert!(orphaned[0].path.is_file());
}

#[test]
fn in_memory_store_has_no_attachment_folder() {
    let store = DataStore::create_in_memory().unwrap();
    store
        .create_table("t", &[Field::new("x", FieldType::Integer)], &Progress::default())
        .unwrap();
    let table = store.table("t").unwrap();
    let fid = table.insert_feature(&table.create_feature()).unwrap();

    let err = table
        .add_attachment(fid, "f", "", Path::new("/tmp/none"), false, -1)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CreateFailed);
}
