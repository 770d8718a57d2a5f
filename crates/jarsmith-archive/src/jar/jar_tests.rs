#![allow(non_snake_case)]

use super::*;
use crate::manifest::{BUNDLE_SYMBOLICNAME, MULTI_RELEASE};
use crate::module_info::tests::module_info_class;
use jarsmith_core::PatternInstruction;
use sha2::Digest;
use std::io::Cursor;
use tempfile::TempDir;

fn text(content: &str) -> Resource {
    Resource::from_bytes(content.as_bytes().to_vec(), 1_000_000)
}

fn manifest_with(headers: &[(&str, &str)]) -> Manifest {
    let mut manifest = Manifest::new();
    for (k, v) in headers {
        manifest.main_attributes_mut().insert(*k, *v);
    }
    manifest
}

fn manifest_resource(headers: &[(&str, &str)]) -> Resource {
    Resource::from_bytes(manifest_with(headers).to_bytes(), 0)
}

fn write_to_vec(jar: &mut Jar) -> Vec<u8> {
    let mut out = Vec::new();
    jar.write(&mut out).unwrap();
    out
}

fn manifest_of(bytes: &[u8]) -> Manifest {
    let jar = Jar::from_reader("probe", Cursor::new(bytes.to_vec()), 0).unwrap();
    jar.manifest().unwrap().unwrap()
}

fn file_entries(bytes: &[u8]) -> Vec<String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .filter(|name| !name.ends_with('/'))
        .collect()
}

// ============================================================================
// Manifest cache
// ============================================================================

#[test]
fn Jar___manifest___absent___returns_none() {
    let jar = Jar::new("t");

    assert_eq!(jar.manifest().unwrap(), None);
    assert_eq!(jar.bsn().unwrap(), None);
}

#[test]
fn Jar___manifest___reflects_replaced_resource() {
    let mut jar = Jar::new("t");
    jar.put_resource(DEFAULT_MANIFEST_NAME, manifest_resource(&[(BUNDLE_VERSION, "1.0.0")]), true)
        .unwrap();
    assert_eq!(jar.version().unwrap().as_deref(), Some("1.0.0"));

    jar.put_resource(DEFAULT_MANIFEST_NAME, manifest_resource(&[(BUNDLE_VERSION, "2.0.0")]), true)
        .unwrap();

    assert_eq!(jar.version().unwrap().as_deref(), Some("2.0.0"));
}

#[test]
fn Jar___manifest___removed_resource___returns_none() {
    let mut jar = Jar::new("t");
    jar.put_resource(DEFAULT_MANIFEST_NAME, manifest_resource(&[(BUNDLE_VERSION, "1")]), true)
        .unwrap();
    assert!(jar.manifest().unwrap().is_some());

    jar.remove(DEFAULT_MANIFEST_NAME).unwrap();

    assert_eq!(jar.manifest().unwrap(), None);
}

#[test]
fn Jar___set_manifest___wins_until_resource_is_replaced() {
    let mut jar = Jar::new("t");
    jar.put_resource(DEFAULT_MANIFEST_NAME, manifest_resource(&[(BUNDLE_VERSION, "1")]), true)
        .unwrap();

    jar.set_manifest(manifest_with(&[(BUNDLE_VERSION, "5")])).unwrap();
    assert_eq!(jar.version().unwrap().as_deref(), Some("5"));
    assert!(jar.is_manifest_first());

    jar.put_resource(DEFAULT_MANIFEST_NAME, manifest_resource(&[(BUNDLE_VERSION, "9")]), true)
        .unwrap();
    assert_eq!(jar.version().unwrap().as_deref(), Some("9"));
}

#[test]
fn Jar___set_manifest___do_not_touch___is_rejected() {
    let mut jar = Jar::new("signed");
    jar.set_do_not_touch_manifest();

    let err = jar.set_manifest(Manifest::new()).unwrap_err();

    assert!(matches!(err, ArchiveError::Policy(_)));
}

#[test]
fn Jar___set_manifest_name___empty___is_rejected() {
    let mut jar = Jar::new("t");

    let err = jar.set_manifest_name("").unwrap_err();

    assert!(matches!(err, ArchiveError::Policy(_)));
    assert_eq!(jar.manifest_name(), DEFAULT_MANIFEST_NAME);
}

#[test]
fn Jar___set_manifest_name___reads_manifest_from_new_path() {
    let mut jar = Jar::new("t");
    jar.put_resource("OSGI-INF/MANIFEST.MF", manifest_resource(&[(BUNDLE_VERSION, "3")]), true)
        .unwrap();

    jar.set_manifest_name("OSGI-INF/MANIFEST.MF").unwrap();

    assert_eq!(jar.version().unwrap().as_deref(), Some("3"));
}

#[test]
fn Jar___ensure_manifest___creates_empty_manifest() {
    let mut jar = Jar::new("t");

    jar.ensure_manifest().unwrap();

    assert_eq!(jar.manifest().unwrap(), Some(Manifest::new()));
}

#[test]
fn Jar___is_manifest_first___follows_insertion_order() {
    let mut first = Jar::new("first");
    first.put_resource(DEFAULT_MANIFEST_NAME, manifest_resource(&[]), true).unwrap();
    first.put_resource("a.txt", text("a"), true).unwrap();
    let mut later = Jar::new("later");
    later.put_resource("a.txt", text("a"), true).unwrap();
    later.put_resource(DEFAULT_MANIFEST_NAME, manifest_resource(&[]), true).unwrap();

    assert!(first.is_manifest_first());
    assert!(!later.is_manifest_first());
}

#[test]
fn Jar___bsn___ignores_directives() {
    let mut jar = Jar::new("t");
    jar.set_manifest(manifest_with(&[(BUNDLE_SYMBOLICNAME, "com.acme.api;singleton:=true")]))
        .unwrap();

    assert_eq!(jar.bsn().unwrap().as_deref(), Some("com.acme.api"));
}

// ============================================================================
// Module descriptor
// ============================================================================

#[test]
fn Jar___module_name___prefers_module_descriptor() {
    let mut jar = Jar::new("t");
    jar.set_manifest(manifest_with(&[(AUTOMATIC_MODULE_NAME, "auto.name")])).unwrap();
    assert_eq!(jar.module_name().unwrap().as_deref(), Some("auto.name"));

    jar.put_resource(
        MODULE_INFO_CLASS,
        Resource::from_bytes(module_info_class("real.name", Some("4.1")), 0),
        true,
    )
    .unwrap();

    assert_eq!(jar.module_name().unwrap().as_deref(), Some("real.name"));
    assert_eq!(jar.module_version().unwrap().as_deref(), Some("4.1"));
}

#[test]
fn Jar___module_name___none_without_descriptor_or_header() {
    let jar = Jar::new("t");

    assert_eq!(jar.module_name().unwrap(), None);
    assert_eq!(jar.module_version().unwrap(), None);
}

// ============================================================================
// Write ordering
// ============================================================================

#[test]
fn Jar___write___manifest_then_signatures_first() {
    let mut jar = Jar::new("t");
    jar.put_resource("a/A.class", text("A"), true).unwrap();
    jar.put_resource("META-INF/SIGNER.RSA", text("rsa"), true).unwrap();
    jar.put_resource("META-INF/LICENSE", text("l"), true).unwrap();
    jar.put_resource("META-INF/SIGNER.SF", text("sf"), true).unwrap();
    jar.put_resource(DEFAULT_MANIFEST_NAME, manifest_resource(&[(BUNDLE_VERSION, "1")]), true)
        .unwrap();

    let out = write_to_vec(&mut jar);

    assert_eq!(
        file_entries(&out),
        vec![
            DEFAULT_MANIFEST_NAME,
            "META-INF/SIGNER.RSA",
            "META-INF/SIGNER.SF",
            "META-INF/LICENSE",
            "a/A.class",
        ]
    );
}

#[test]
fn Jar___write___uses_canonical_manifest() {
    let mut jar = Jar::new("t");
    let raw = b"Manifest-Version: 1.0\nzeta: 1\nAlpha: 2\n".to_vec();
    jar.put_resource(DEFAULT_MANIFEST_NAME, Resource::from_bytes(raw, 0), true).unwrap();

    let out = write_to_vec(&mut jar);

    let reread = Jar::from_reader("r", Cursor::new(out), 0).unwrap();
    let bytes = reread.get_resource(DEFAULT_MANIFEST_NAME).unwrap().unwrap().read_all().unwrap();
    assert_eq!(bytes, &b"Manifest-Version: 1.0\r\nAlpha: 2\r\nzeta: 1\r\n\r\n"[..]);
}

#[test]
fn Jar___write___do_not_touch___keeps_raw_manifest_bytes() {
    let mut jar = Jar::new("signed");
    let raw = b"Manifest-Version: 1.0\nzeta: 1\n".to_vec();
    jar.put_resource("z.txt", text("z"), true).unwrap();
    jar.put_resource(DEFAULT_MANIFEST_NAME, Resource::from_bytes(raw.clone(), 0), true).unwrap();
    jar.set_do_not_touch_manifest();

    let out = write_to_vec(&mut jar);

    assert_eq!(file_entries(&out)[0], DEFAULT_MANIFEST_NAME);
    let reread = Jar::from_reader("r", Cursor::new(out), 0).unwrap();
    let bytes = reread.get_resource(DEFAULT_MANIFEST_NAME).unwrap().unwrap().read_all().unwrap();
    assert_eq!(bytes, raw);
}

#[test]
fn Jar___write___no_manifest___keeps_manifest_in_path_order() {
    let mut jar = Jar::new("t");
    jar.put_resource("A.txt", text("a"), true).unwrap();
    jar.put_resource(DEFAULT_MANIFEST_NAME, manifest_resource(&[]), true).unwrap();
    jar.set_no_manifest(true);

    let out = write_to_vec(&mut jar);

    assert_eq!(file_entries(&out), vec!["A.txt", DEFAULT_MANIFEST_NAME]);
}

#[test]
fn Jar___write___without_manifest___writes_no_manifest_entry() {
    let mut jar = Jar::new("t");
    jar.put_resource("A.txt", text("a"), true).unwrap();

    let out = write_to_vec(&mut jar);

    assert_eq!(file_entries(&out), vec!["A.txt"]);
}

#[test]
fn Jar___write___records_length_and_sha256() {
    let mut jar = Jar::new("t");
    jar.put_resource("A.txt", text("a"), true).unwrap();
    assert_eq!(jar.sha256(), None);

    let out = write_to_vec(&mut jar);

    assert_eq!(jar.length(), Some(out.len() as u64));
    let expected: [u8; 32] = sha2::Sha256::digest(&out).into();
    assert_eq!(jar.sha256(), Some(expected));
}

#[test]
fn Jar___write_file___stamps_modification_time() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("out.jar");
    let mut jar = Jar::new("t");
    jar.put_resource("A.txt", Resource::from_bytes(&b"a"[..], 1_600_000_000_000), true)
        .unwrap();

    jar.write_file(&path).unwrap();

    let modified = fs::metadata(&path).unwrap().modified().unwrap();
    assert_eq!(modified, UNIX_EPOCH + Duration::from_millis(1_600_000_000_000));
}

// ============================================================================
// Digests
// ============================================================================

#[test]
fn Jar___calc_checksums___buffer_and_stream_agree() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("data.bin");
    fs::write(&path, vec![9u8; 1000]).unwrap();
    let mut buffered = Jar::new("b");
    buffered.put_resource("data.bin", Resource::from_file(&path), true).unwrap();
    let mut streamed = Jar::new("s");
    streamed.put_resource("data.bin", Resource::from_file_with_limit(&path, 10), true).unwrap();

    buffered.calc_checksums(None).unwrap();
    streamed.calc_checksums(None).unwrap();

    let a = buffered.manifest().unwrap().unwrap();
    let b = streamed.manifest().unwrap().unwrap();
    assert_eq!(a.section("data.bin"), b.section("data.bin"));
    let section = a.section("data.bin").unwrap();
    assert!(section.get("SHA-Digest").is_some());
    assert!(section.get("MD5-Digest").is_some());
}

#[test]
fn Jar___calc_checksums___encodes_base64_digest() {
    let mut jar = Jar::new("t");
    jar.put_resource("a.txt", text("hello world"), true).unwrap();

    jar.calc_checksums(Some(&["SHA-256".to_string()])).unwrap();

    let manifest = jar.manifest().unwrap().unwrap();
    assert_eq!(
        manifest.section("a.txt").unwrap().get("SHA-256-Digest"),
        Some("uU0nuZNNPgilLlLX2n2r+sSE7+N6U4DukIj3rOLvzek=")
    );
}

#[test]
fn Jar___calc_checksums___unknown_algorithm___returns_error() {
    let mut jar = Jar::new("t");
    jar.put_resource("a.txt", text("x"), true).unwrap();

    let err = jar.calc_checksums(Some(&["CRC".to_string()])).unwrap_err();

    assert!(matches!(err, ArchiveError::UnsupportedDigest(_)));
}

#[test]
fn Jar___write___with_digests___embeds_sections() {
    let mut jar = Jar::new("t");
    jar.set_manifest(manifest_with(&[(BUNDLE_VERSION, "1.0.0")])).unwrap();
    jar.put_resource("a.txt", text("a"), true).unwrap();
    jar.set_digest_algorithms(Some(vec!["SHA-256".into()]));

    let out = write_to_vec(&mut jar);

    let manifest = manifest_of(&out);
    assert!(manifest.section("a.txt").unwrap().get("SHA-256-Digest").is_some());
    assert_eq!(manifest.version().as_deref(), Some("1.0.0"));
    assert_eq!(file_entries(&out)[0], DEFAULT_MANIFEST_NAME);
}

#[test]
fn Jar___write___with_digests___keeps_folded_non_ascii_headers() {
    let name = format!("{}étail", "a".repeat(56));
    let mut jar = Jar::new("t");
    jar.set_manifest(manifest_with(&[("Bundle-Name", name.as_str())])).unwrap();
    jar.put_resource("a.txt", text("a"), true).unwrap();
    jar.set_digest_algorithms(Some(vec!["SHA-256".into()]));

    let out = write_to_vec(&mut jar);

    let manifest = manifest_of(&out);
    assert_eq!(manifest.main_attributes().get("Bundle-Name"), Some(name.as_str()));
}

#[test]
fn Jar___write_file___summary_matches_written_bytes() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("out.jar");
    let mut jar = Jar::new("t");
    jar.ensure_manifest().unwrap();
    jar.put_resource("a.txt", text("a"), true).unwrap();
    jar.set_digest_algorithms(Some(vec!["SHA-256".into()]));

    let summary = jar.write_file(&path).unwrap();

    let bytes = fs::read(&path).unwrap();
    let expected: [u8; 32] = sha2::Sha256::digest(&bytes).into();
    assert_eq!(summary.length, bytes.len() as u64);
    assert_eq!(jar.sha256(), Some(expected));
}

#[cfg(unix)]
#[test]
fn Jar___write___with_digests___evaluates_commands_once() {
    let temp_dir = TempDir::new().unwrap();
    let mut jar = Jar::new("t");
    jar.ensure_manifest().unwrap();
    jar.put_resource("out.txt", Resource::command("echo run >> runs.log; echo hi", temp_dir.path(), 0), true)
        .unwrap();
    jar.set_digest_algorithms(Some(vec!["MD5".into()]));

    write_to_vec(&mut jar);

    let runs = fs::read_to_string(temp_dir.path().join("runs.log")).unwrap();
    assert_eq!(runs.lines().count(), 1);
}

#[test]
fn Jar___timeless_digest___ignores_build_time_and_qualifier() {
    let mut first = Jar::new("a");
    first
        .set_manifest(manifest_with(&[(BUNDLE_VERSION, "1.2.3.202401010000"), (BND_LASTMODIFIED, "1")]))
        .unwrap();
    first.put_resource("x.txt", text("x"), true).unwrap();
    let mut second = Jar::new("b");
    second
        .set_manifest(manifest_with(&[(BUNDLE_VERSION, "1.2.3.202501010000"), (BND_LASTMODIFIED, "2")]))
        .unwrap();
    second.put_resource("x.txt", Resource::from_bytes(&b"x"[..], 5), true).unwrap();

    assert_eq!(first.timeless_digest().unwrap(), second.timeless_digest().unwrap());
}

#[test]
fn Jar___timeless_digest___changes_with_content() {
    let mut first = Jar::new("a");
    first.put_resource("x.txt", text("x"), true).unwrap();
    let mut second = Jar::new("b");
    second.put_resource("x.txt", text("y"), true).unwrap();

    assert_ne!(first.timeless_digest().unwrap(), second.timeless_digest().unwrap());
}

#[test]
fn version_without_qualifier___normalizes() {
    assert_eq!(version_without_qualifier("1").as_deref(), Some("1.0.0"));
    assert_eq!(version_without_qualifier("1.2.3.beta").as_deref(), Some("1.2.3"));
    assert_eq!(version_without_qualifier("x.y"), None);
}

// ============================================================================
// Signatures
// ============================================================================

#[test]
fn Jar___strip_signatures___removes_only_signature_files() {
    let mut jar = Jar::new("t");
    for path in ["META-INF/A.SF", "META-INF/a.dsa", "META-INF/SIG-X", "META-INF/LICENSE", "other/B.SF"] {
        jar.put_resource(path, text(path), true).unwrap();
    }

    assert!(jar.strip_signatures().unwrap());

    assert_eq!(
        jar.resource_names(|_| true).unwrap(),
        vec!["META-INF/LICENSE", "other/B.SF"]
    );
    assert!(!jar.strip_signatures().unwrap());
}

// ============================================================================
// Content helpers
// ============================================================================

#[test]
fn Jar___add_all___honors_filter_and_destination() {
    let mut source = Jar::new("s");
    source.put_resource(DEFAULT_MANIFEST_NAME, manifest_resource(&[]), true).unwrap();
    source.put_resource("com/acme/A.class", text("A"), true).unwrap();
    source.put_resource("com/acme/impl/B.class", text("B"), true).unwrap();
    let mut target = Jar::new("t");
    let filter = PatternInstruction::new("!com/acme/impl/*").unwrap();

    target.add_all(&source, Some(&filter), "lib").unwrap();

    assert_eq!(target.resource_names(|_| true).unwrap(), vec!["lib/com/acme/A.class"]);
}

#[test]
fn Jar___add_all___reports_duplicates() {
    let mut source = Jar::new("s");
    source.put_resource("a.txt", text("new"), true).unwrap();
    let mut target = Jar::new("t");
    target.put_resource("a.txt", text("old"), true).unwrap();

    assert!(target.add_all(&source, None, "").unwrap());

    let content = target.get_resource("a.txt").unwrap().unwrap().read_all().unwrap();
    assert_eq!(content, &b"new"[..]);
}

#[test]
fn Jar___data_uri___encodes_small_resources_only() {
    let mut jar = Jar::new("t");
    jar.put_resource("icon.png", text("abc"), true).unwrap();
    jar.put_resource("empty.png", text(""), true).unwrap();

    assert_eq!(
        jar.data_uri("icon.png", "image/png", 100).unwrap().as_deref(),
        Some("data:image/png;base64,YWJj")
    );
    assert_eq!(jar.data_uri("icon.png", "image/png", 3).unwrap(), None);
    assert_eq!(jar.data_uri("empty.png", "image/png", 100).unwrap(), None);
    assert_eq!(jar.data_uri("missing.png", "image/png", 100).unwrap(), None);
}

#[test]
fn Jar___pom_xml_resources___matches_maven_layout() {
    let mut jar = Jar::new("t");
    jar.put_resource("META-INF/maven/org.acme/core/pom.xml", text("<p/>"), true).unwrap();
    jar.put_resource("META-INF/maven/org.acme/core/pom.properties", text(""), true).unwrap();
    jar.put_resource("META-INF/maven/pom.xml", text(""), true).unwrap();

    let poms: Vec<String> = jar.pom_xml_resources().unwrap().into_iter().map(|(p, _)| p).collect();

    assert_eq!(poms, vec!["META-INF/maven/org.acme/core/pom.xml"]);
}

#[test]
fn Jar___localization___falls_back_to_less_specific_locale() {
    let mut jar = Jar::new("t");
    jar.set_manifest(manifest_with(&[(BUNDLE_LOCALIZATION, "OSGI-INF/l10n/texts")])).unwrap();
    jar.put_resource("OSGI-INF/l10n/texts_de.properties", text("name=Name"), true).unwrap();
    jar.put_resource("OSGI-INF/l10n/texts.properties", text("name=name"), true).unwrap();

    let german = jar.localization("de_CH").unwrap().unwrap();
    let french = jar.localization("fr").unwrap().unwrap();

    assert_eq!(german.read_all().unwrap(), &b"name=Name"[..]);
    assert_eq!(french.read_all().unwrap(), &b"name=name"[..]);
}

// ============================================================================
// Construction and expansion
// ============================================================================

#[test]
fn Jar___from_reader___stamps_entries_with_given_time() {
    let mut jar = Jar::new("t");
    jar.put_resource("a.txt", text("a"), true).unwrap();
    let out = write_to_vec(&mut jar);

    let reread = Jar::from_reader("r", Cursor::new(out), 1_234_000).unwrap();

    assert_eq!(reread.get_resource("a.txt").unwrap().unwrap().last_modified(), 1_234_000);
    assert_eq!(reread.last_modified(), 1_234_000);
}

#[test]
fn Jar___from_resource___reads_nested_archive_bytes() {
    let mut inner = Jar::new("inner");
    inner.put_resource("n.txt", text("nested"), true).unwrap();
    let bytes = write_to_vec(&mut inner);

    let jar = Jar::from_resource("outer", &Resource::from_bytes(bytes, 0)).unwrap();

    let content = jar.get_resource("n.txt").unwrap().unwrap().read_all().unwrap();
    assert_eq!(content, &b"nested"[..]);
}

#[test]
fn Jar___discover_manifest___reads_manifest_of_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("m.jar");
    let mut jar = Jar::new("m");
    jar.set_manifest(manifest_with(&[(MULTI_RELEASE, "true")])).unwrap();
    jar.put_resource("a.txt", text("a"), true).unwrap();
    jar.write_file(&path).unwrap();

    let manifest = Jar::discover_manifest(&path).unwrap().unwrap();

    assert!(manifest.is_multi_release());
}

#[test]
fn Jar___write_folder___writes_manifest_and_resources() {
    let temp_dir = TempDir::new().unwrap();
    let mut jar = Jar::new("t");
    jar.set_manifest(manifest_with(&[(BUNDLE_VERSION, "1")])).unwrap();
    jar.put_resource("a/b.txt", text("b"), true).unwrap();

    jar.expand(temp_dir.path()).unwrap();

    let manifest = fs::read(temp_dir.path().join(DEFAULT_MANIFEST_NAME)).unwrap();
    assert_eq!(Manifest::parse(&manifest).unwrap().version().as_deref(), Some("1"));
    assert_eq!(fs::read(temp_dir.path().join("a/b.txt")).unwrap(), b"b");
}

#[test]
fn Jar___close___is_idempotent() {
    let mut jar = Jar::new("t");
    jar.put_resource("a.txt", text("a"), true).unwrap();

    jar.close();
    jar.close();

    assert!(jar.manifest().unwrap_err().is_closed());
}

#[test]
fn Jar___configure___applies_settings() {
    let mut jar = Jar::new("t");
    let config = ArchiveConfig {
        compression: jarsmith_core::Compression::Store,
        reproducible: Some("true".into()),
        digest_algorithms: vec!["SHA-256".into()],
        ..ArchiveConfig::default()
    };

    jar.configure(&config).unwrap();

    assert!(jar.is_reproducible());
    assert_eq!(jar.compression(), jarsmith_core::Compression::Store);
    assert_eq!(jar.digest_algorithms.as_deref(), Some(&["SHA-256".to_string()][..]));
}

