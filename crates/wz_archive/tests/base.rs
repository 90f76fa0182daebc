//! Composer suites: the `Base.wz` single-file and `Base/` indexed-group
//! layouts, exercised through real files in a scratch directory.

mod common;

use std::fs;
use std::path::PathBuf;

use pretty_assertions::assert_eq;
use tracing_test::traced_test;
use wz_archive::{Archive, Error, Iv, OpenOptions};

use common::{build_file, property_body, Entry, VERSION};

fn options(iv: Iv) -> OpenOptions {
    OpenOptions::builder().version(VERSION).iv(iv).build()
}

/// A scratch folder that cleans up after itself.
struct Scratch(PathBuf);

impl Scratch {
    fn new(name: &str) -> Scratch {
        let dir = std::env::temp_dir().join(format!("wz_archive_{}_{name}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        Scratch(dir)
    }

    fn write(&self, rel: &str, bytes: &[u8]) {
        let path = self.0.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, bytes).unwrap();
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.0);
    }
}

#[traced_test]
#[test]
fn single_base_file_opens_siblings() {
    let iv = Iv::GMS;
    let scratch = Scratch::new("single");

    // Base.wz lists "Mob" as a directory; the composer resolves it to the
    // sibling file Mob.wz
    scratch.write(
        "Base.wz",
        &build_file(VERSION, iv, vec![("Mob", Entry::dir(vec![]))]),
    );
    scratch.write(
        "Mob.wz",
        &build_file(
            VERSION,
            iv,
            vec![(
                "slime",
                Entry::Image(property_body(iv, |p| p.int32("level", 3))),
            )],
        ),
    );

    let archive = Archive::open(&scratch.0, options(iv)).unwrap();
    assert_eq!(
        archive
            .get("Mob/slime/level")
            .unwrap()
            .unwrap()
            .int32()
            .unwrap(),
        Some(3)
    );
    archive.close().unwrap();
}

#[traced_test]
#[test]
fn indexed_groups_mount_member_families() {
    let iv = Iv::GMS;
    let scratch = Scratch::new("group");

    // Base/ holds the index members; the first lists "Mob", which resolves
    // to the sibling folder Mob/ as its own indexed family
    scratch.write("Base/Base.ini", b"LastWzIndex|0\n");
    scratch.write(
        "Base/Base_-001.wz",
        &build_file(VERSION, iv, vec![("Mob", Entry::dir(vec![]))]),
    );
    scratch.write(
        "Base/Base_000.wz",
        &build_file(
            VERSION,
            iv,
            vec![
                (
                    "meta",
                    Entry::Image(property_body(iv, |p| p.int32("patch", 7))),
                ),
                (
                    "untouched",
                    Entry::Image(property_body(iv, |p| p.int32("x", 1))),
                ),
            ],
        ),
    );

    scratch.write("Mob/Mob.ini", b"LastWzIndex|-1\n");
    scratch.write(
        "Mob/Mob_-001.wz",
        &build_file(
            VERSION,
            iv,
            vec![(
                "slime",
                Entry::Image(property_body(iv, |p| p.int32("level", 5))),
            )],
        ),
    );

    let archive = Archive::open(&scratch.0, options(iv)).unwrap();

    // probing falls through the group members in mount order
    assert_eq!(
        archive
            .get("Mob/slime/level")
            .unwrap()
            .unwrap()
            .int32()
            .unwrap(),
        Some(5)
    );
    assert_eq!(
        archive
            .get("meta/patch")
            .unwrap()
            .unwrap()
            .int32()
            .unwrap(),
        Some(7)
    );

    archive.close().unwrap();
    // bodies parsed before the close stay readable; anything that still
    // needs the sources does not
    assert_eq!(
        archive
            .get("meta/patch")
            .unwrap()
            .unwrap()
            .int32()
            .unwrap(),
        Some(7)
    );
    assert!(matches!(archive.get("untouched"), Err(Error::Io(_))));
}

#[test]
fn missing_sidecar_key_is_rejected() {
    let iv = Iv::EMPTY;
    let scratch = Scratch::new("badini");

    scratch.write("Base/Base.ini", b"SomethingElse|1\n");
    scratch.write("Base/Base_-001.wz", &build_file(VERSION, iv, vec![]));

    assert!(matches!(
        Archive::open(&scratch.0, options(iv)),
        Err(Error::InvalidConfig(_))
    ));
}

#[test]
fn malformed_sidecar_lines_are_rejected() {
    let iv = Iv::EMPTY;
    let scratch = Scratch::new("badline");

    scratch.write("Base/Base.ini", b"LastWzIndex|0|extra\n");

    assert!(matches!(
        Archive::open(&scratch.0, options(iv)),
        Err(Error::InvalidConfig(_))
    ));
}

#[test]
fn missing_member_files_surface_as_io_errors() {
    let iv = Iv::EMPTY;
    let scratch = Scratch::new("missing");

    // the sidecar promises two members but only one exists
    scratch.write("Base/Base.ini", b"LastWzIndex|0\n");
    scratch.write("Base/Base_-001.wz", &build_file(VERSION, iv, vec![]));

    assert!(matches!(
        Archive::open(&scratch.0, options(iv)),
        Err(Error::Io(_))
    ));
}

#[test]
fn open_file_mounts_one_archive_with_plain_directories() {
    let iv = Iv::GMS;
    let scratch = Scratch::new("plain");

    // a nested directory inside a plainly-mounted file stays in-file, it
    // does not try to open siblings
    scratch.write(
        "Mob.wz",
        &build_file(
            VERSION,
            iv,
            vec![(
                "inner",
                Entry::dir(vec![(
                    "slime",
                    Entry::Image(property_body(iv, |p| p.int32("level", 9))),
                )]),
            )],
        ),
    );

    let archive = Archive::open_file(scratch.0.join("Mob.wz"), options(iv)).unwrap();
    assert_eq!(
        archive
            .get("inner/slime/level")
            .unwrap()
            .unwrap()
            .int32()
            .unwrap(),
        Some(9)
    );
}
