#![allow(non_snake_case)]

use super::*;

#[test]
fn ArchiveError___closed___displays_name() {
    let err = ArchiveError::Closed("bundle.jar".into());

    assert_eq!(err.to_string(), "already closed bundle.jar");
}

#[test]
fn ArchiveError___closed___is_not_io() {
    let err = ArchiveError::Closed("x".into());

    assert!(err.is_closed());
    assert!(!err.is_io());
}

#[test]
fn ArchiveError___from_io_error___converts() {
    let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");

    let err: ArchiveError = io_err.into();

    assert!(matches!(err, ArchiveError::Io(_)));
    assert!(err.is_io());
}

#[test]
fn ArchiveError___corrupted___names_the_file() {
    let err = ArchiveError::Corrupted {
        path: "/tmp/broken.jar".into(),
        source: zip::result::ZipError::InvalidArchive("bad central directory".into()),
    };

    let msg = err.to_string();

    assert!(msg.contains("/tmp/broken.jar"));
    assert!(msg.contains("seems corrupted"));
    assert!(err.is_io());
}

#[test]
fn ArchiveError___in_resource___keeps_classification() {
    let closed = ArchiveError::Closed("inner".into()).in_resource("lib/inner.jar");
    let io = ArchiveError::unavailable("gone").in_resource("a.txt");

    assert!(closed.is_closed());
    assert!(io.is_io());
    assert!(closed.to_string().contains("lib/inner.jar"));
}

#[test]
fn ArchiveError___command___displays_all_fields() {
    let err = ArchiveError::Command {
        command: "false".into(),
        status: "exit status: 1".into(),
        stderr: "boom".into(),
    };

    let msg = err.to_string();

    assert!(msg.contains("false"));
    assert!(msg.contains("exit status: 1"));
    assert!(msg.contains("boom"));
}

#[test]
fn ArchiveError___unavailable___has_not_found_kind() {
    let err = ArchiveError::unavailable("nested archive closed");

    match err {
        ArchiveError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
        other => panic!("unexpected error {other:?}"),
    }
}
