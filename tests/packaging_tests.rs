//! End-to-end packaging tests over a representative project tree


use anyhow::Result;
use fastpack::{
    compute_digest, compute_digest_for, package, CompressionBackend, CustomIgnore, IgnoreGroup,
    IgnoreKind, PackageOptions, PackagingError, FAST_FILE_ENDING, FAST_PREFIX,
};
use pretty_assertions::assert_eq;
use std::fs;
use tar::EntryType;
use tempfile::TempDir;
use test_utils::{archive_names, gunzip, make_tree, pigz_available, read_archive, TestProject};

fn ignore_utils() -> CustomIgnore {
    CustomIgnore::new("utils", |rel_path| rel_path.starts_with("utils"))
}

#[cfg(unix)]
#[test]
fn test_package_with_default_ignores() -> Result<()> {
    let project = TestProject::new()?;
    let out = TempDir::new()?;

    let packaged = package(project.path(), out.path(), &PackageOptions::default())?;

    let name = packaged
        .archive_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    assert!(name.starts_with(FAST_PREFIX));
    assert!(name.ends_with(FAST_FILE_ENDING));
    assert_eq!(
        name,
        format!("{}{}{}", FAST_PREFIX, packaged.digest, FAST_FILE_ENDING)
    );

    assert_eq!(
        archive_names(&packaged.archive_path)?,
        vec![
            ".dockerignore",
            ".gitignore",
            "keep.foo",
            "src",
            "src/util",
            "src/workflows",
            "src/workflows/__pycache__",
            "src/workflows/hello_world.py",
            "utils",
            "utils/util.py",
        ]
    );

    let entries = read_archive(&packaged.archive_path)?;
    let link = entries
        .iter()
        .find(|e| e.name == "src/util")
        .expect("src/util entry");
    assert_eq!(link.entry_type, EntryType::Symlink);
    let expected_target = project.join("utils/util.py").to_string_lossy().into_owned();
    assert_eq!(link.link_target.as_deref(), Some(expected_target.as_str()));

    assert_eq!(packaged.stats.symlinks, 1);
    assert_eq!(packaged.stats.total(), entries.len());
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_package_with_custom_ignore_and_defaults() -> Result<()> {
    let project = TestProject::new()?;
    let out = TempDir::new()?;

    let options = PackageOptions::default().with_custom_ignore(ignore_utils());
    let packaged = package(project.path(), out.path(), &options)?;

    assert_eq!(
        archive_names(&packaged.archive_path)?,
        vec![
            ".dockerignore",
            ".gitignore",
            "keep.foo",
            "src",
            "src/util",
            "src/workflows",
            "src/workflows/__pycache__",
            "src/workflows/hello_world.py",
        ]
    );
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_package_with_explicit_ignores_only() -> Result<()> {
    let project = TestProject::new()?;
    let out = TempDir::new()?;

    let mut options = PackageOptions::default().with_custom_ignore(ignore_utils());
    options.ignores = vec![IgnoreKind::GitIgnore, IgnoreKind::DockerIgnore];
    options.keep_default_ignores = false;
    let packaged = package(project.path(), out.path(), &options)?;

    // Without the standard table, compiled python files survive
    assert_eq!(
        archive_names(&packaged.archive_path)?,
        vec![
            ".dockerignore",
            ".gitignore",
            "keep.foo",
            "src",
            "src/util",
            "src/workflows",
            "src/workflows/__pycache__",
            "src/workflows/__pycache__/some.pyc",
            "src/workflows/hello_world.py",
        ]
    );
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_package_dereferences_symlinks() -> Result<()> {
    let project = TestProject::new()?;
    let out = TempDir::new()?;

    let options = PackageOptions::default().with_deref_symlinks(true);
    let packaged = package(&project.join("src"), out.path(), &options)?;

    let entries = read_archive(&packaged.archive_path)?;
    let mut names: Vec<_> = entries.iter().map(|e| e.name.clone()).collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "util",
            "workflows",
            "workflows/__pycache__",
            "workflows/hello_world.py",
        ]
    );

    let util = entries
        .iter()
        .find(|e| e.name == "util")
        .expect("util entry");
    assert_eq!(util.entry_type, EntryType::Regular);
    assert_eq!(util.content, b"print('Hello from utils!')");
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_relative_symlink_target_is_kept_verbatim() -> Result<()> {
    let source = TempDir::new()?;
    let out = TempDir::new()?;
    make_tree(source.path(), &[("lib/impl.py", "x = 1")])?;
    std::os::unix::fs::symlink("lib/impl.py", source.path().join("alias.py"))?;

    let packaged = package(source.path(), out.path(), &PackageOptions::default())?;
    let entries = read_archive(&packaged.archive_path)?;

    let alias = entries
        .iter()
        .find(|e| e.name == "alias.py")
        .expect("alias entry");
    assert_eq!(alias.entry_type, EntryType::Symlink);
    assert_eq!(alias.link_target.as_deref(), Some("lib/impl.py"));
    assert!(alias.content.is_empty());
    Ok(())
}

#[test]
fn test_digest_ignores_changes_to_ignored_files() -> Result<()> {
    let project = TestProject::new()?;
    let group = IgnoreGroup::new(project.path(), IgnoreKind::DEFAULTS);

    let before = compute_digest(project.path(), &group)?;
    fs::write(project.join("data/large.file"), "a great deal of new data")?;
    fs::write(project.join(".env"), "rotated")?;
    fs::write(project.join("some.foo"), "changed")?;
    assert_eq!(compute_digest(project.path(), &group)?, before);

    fs::write(project.join("keep.foo"), "changed")?;
    assert_ne!(compute_digest(project.path(), &group)?, before);
    Ok(())
}

#[test]
fn test_digest_changes_when_included_file_is_added() -> Result<()> {
    let project = TestProject::new()?;
    let group = IgnoreGroup::new(project.path(), IgnoreKind::DEFAULTS);

    let before = compute_digest(project.path(), &group)?;
    fs::write(project.join("src/workflows/new.py"), "")?;
    assert_ne!(compute_digest(project.path(), &group)?, before);
    Ok(())
}

#[test]
fn test_digest_for_matches_packaged_digest() -> Result<()> {
    let project = TestProject::new()?;
    let out = TempDir::new()?;
    let options = PackageOptions::default().with_custom_ignore(ignore_utils());

    let packaged = package(project.path(), out.path(), &options)?;
    assert_eq!(compute_digest_for(project.path(), &options)?, packaged.digest);
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_broken_symlink_never_fails_packaging() -> Result<()> {
    let project = TestProject::new()?;
    std::os::unix::fs::symlink(project.join("gone.py"), project.join("src/dangling"))?;

    // Kept as a dangling link when links are preserved
    let out = TempDir::new()?;
    let packaged = package(project.path(), out.path(), &PackageOptions::default())?;
    assert!(archive_names(&packaged.archive_path)?.contains(&"src/dangling".to_string()));

    // Silently dropped when links are followed
    let out = TempDir::new()?;
    let options = PackageOptions::default().with_deref_symlinks(true);
    let packaged = package(project.path(), out.path(), &options)?;
    assert!(!archive_names(&packaged.archive_path)?.contains(&"src/dangling".to_string()));
    assert_eq!(packaged.stats.skipped, 1);
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_broken_symlink_in_ignored_directory_is_never_visited() -> Result<()> {
    let project = TestProject::new()?;
    std::os::unix::fs::symlink(project.join("nowhere"), project.join("data/dangling"))?;

    let out = TempDir::new()?;
    let options = PackageOptions::default().with_deref_symlinks(true);
    let packaged = package(project.path(), out.path(), &options)?;
    assert_eq!(packaged.stats.skipped, 0);
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_socket_file_is_skipped() -> Result<()> {
    let project = TestProject::new()?;
    let _listener = std::os::unix::net::UnixListener::bind(project.join("src/test.sock"))?;

    let out = TempDir::new()?;
    let packaged = package(project.path(), out.path(), &PackageOptions::default())?;
    assert!(!archive_names(&packaged.archive_path)?.contains(&"src/test.sock".to_string()));
    assert_eq!(packaged.stats.skipped, 1);
    Ok(())
}

#[test]
fn test_package_is_reproducible_across_runs() -> Result<()> {
    let project = TestProject::new()?;
    let first_out = TempDir::new()?;
    let second_out = TempDir::new()?;

    let first = package(project.path(), first_out.path(), &PackageOptions::default())?;

    // Touch an included file without changing its content
    std::thread::sleep(std::time::Duration::from_millis(1100));
    let hello = project.join("src/workflows/hello_world.py");
    let content = fs::read(&hello)?;
    fs::write(&hello, content)?;

    let second = package(project.path(), second_out.path(), &PackageOptions::default())?;

    assert_eq!(first.digest, second.digest);
    assert_eq!(
        first.archive_path.file_name(),
        second.archive_path.file_name()
    );
    assert_eq!(fs::read(&first.archive_path)?, fs::read(&second.archive_path)?);
    Ok(())
}

#[test]
fn test_nested_rule_file_overrides_parent() -> Result<()> {
    let source = TempDir::new()?;
    let out = TempDir::new()?;
    make_tree(
        source.path(),
        &[
            (".gitignore", "*.log\n"),
            ("root.log", ""),
            ("pkg/.gitignore", "!keep.log\n"),
            ("pkg/keep.log", "kept"),
            ("pkg/drop.log", ""),
            ("pkg/main.py", ""),
        ],
    )?;

    let packaged = package(source.path(), out.path(), &PackageOptions::default())?;
    assert_eq!(
        archive_names(&packaged.archive_path)?,
        vec![".gitignore", "pkg", "pkg/.gitignore", "pkg/keep.log", "pkg/main.py"]
    );
    Ok(())
}

#[test]
fn test_package_loaded_modules_only() -> Result<()> {
    let project = TestProject::new()?;
    let out = TempDir::new()?;

    let options = PackageOptions::default().with_module_files(vec![
        project.join("src/workflows/hello_world.py"),
        "utils/util.py".into(),
    ]);
    let packaged = package(project.path(), out.path(), &options)?;

    assert_eq!(
        archive_names(&packaged.archive_path)?,
        vec![
            "src",
            "src/workflows",
            "src/workflows/hello_world.py",
            "utils",
            "utils/util.py",
        ]
    );
    Ok(())
}

#[test]
fn test_package_replaces_existing_archive() -> Result<()> {
    let project = TestProject::new()?;
    let out = TempDir::new()?;

    let first = package(project.path(), out.path(), &PackageOptions::default())?;
    fs::write(&first.archive_path, "stale leftovers")?;

    let second = package(project.path(), out.path(), &PackageOptions::default())?;
    assert_eq!(first.archive_path, second.archive_path);
    assert!(!read_archive(&second.archive_path)?.is_empty());

    let leftovers: Vec<_> = fs::read_dir(out.path())?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(leftovers.len(), 1, "unexpected files: {:?}", leftovers);
    Ok(())
}

#[test]
fn test_output_inside_source_is_not_packaged() -> Result<()> {
    let source = TempDir::new()?;
    make_tree(source.path(), &[("main.py", "print(1)"), ("dist/.keep", "")])?;
    let output = source.path().join("dist");

    let digest_before = compute_digest_for(source.path(), &PackageOptions::default())?;
    let packaged = package(source.path(), &output, &PackageOptions::default())?;

    assert_eq!(packaged.digest, digest_before);
    assert_eq!(
        archive_names(&packaged.archive_path)?,
        vec!["dist", "dist/.keep", "main.py"]
    );
    Ok(())
}

#[test]
fn test_precondition_failures() -> Result<()> {
    let source = TempDir::new()?;
    let out = TempDir::new()?;
    make_tree(source.path(), &[("main.py", "")])?;
    let options = PackageOptions::default();

    let err = package(&source.path().join("missing"), out.path(), &options).unwrap_err();
    assert!(matches!(err, PackagingError::SourceNotFound { .. }));
    assert!(err.is_precondition());

    let err = package(&source.path().join("main.py"), out.path(), &options).unwrap_err();
    assert!(matches!(err, PackagingError::SourceNotDirectory { .. }));

    let err = package(source.path(), &out.path().join("missing"), &options).unwrap_err();
    assert!(matches!(err, PackagingError::OutputNotDirectory { .. }));

    let mut invalid = PackageOptions::default();
    invalid.compression_level = 12;
    let err = package(source.path(), out.path(), &invalid).unwrap_err();
    assert!(matches!(err, PackagingError::InvalidOptions { .. }));
    Ok(())
}

#[test]
fn test_pigz_and_gzip_share_tar_stream() -> Result<()> {
    if !pigz_available() {
        eprintln!("pigz not installed, skipping");
        return Ok(());
    }

    let project = TestProject::new()?;
    let gzip_out = TempDir::new()?;
    let pigz_out = TempDir::new()?;

    let gzip = package(project.path(), gzip_out.path(), &PackageOptions::default())?;
    let mut options = PackageOptions::default();
    options.compression = CompressionBackend::Pigz;
    let pigz = package(project.path(), pigz_out.path(), &options)?;

    assert_eq!(gzip.digest, pigz.digest);
    assert_eq!(gunzip(&gzip.archive_path)?, gunzip(&pigz.archive_path)?);
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_digest_ignores_creation_order_and_permissions() -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let files = [
        ("src/workflows/hello_world.py", "print('Hello World!')"),
        ("src/lib/util.py", "def util(): pass"),
        ("README.md", "# readme"),
        ("setup.py", "from setuptools import setup"),
    ];

    let forward = TempDir::new()?;
    make_tree(forward.path(), &files)?;

    let reversed = TempDir::new()?;
    let mut backwards = files;
    backwards.reverse();
    make_tree(reversed.path(), &backwards)?;
    fs::set_permissions(
        reversed.path().join("setup.py"),
        fs::Permissions::from_mode(0o755),
    )?;
    fs::set_permissions(
        reversed.path().join("src/lib"),
        fs::Permissions::from_mode(0o700),
    )?;

    let options = PackageOptions::default();
    assert_eq!(
        compute_digest_for(forward.path(), &options)?,
        compute_digest_for(reversed.path(), &options)?
    );

    let first_out = TempDir::new()?;
    let second_out = TempDir::new()?;
    let first = package(forward.path(), first_out.path(), &options)?;
    let second = package(reversed.path(), second_out.path(), &options)?;
    assert_eq!(first.digest, second.digest);
    assert_eq!(fs::read(&first.archive_path)?, fs::read(&second.archive_path)?);
    Ok(())
}

#[cfg(target_os = "linux")]
#[test]
fn test_non_utf8_names_are_skipped_not_renamed() -> Result<()> {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let plain = TempDir::new()?;
    make_tree(plain.path(), &[("main.py", "print(1)")])?;

    let source = TempDir::new()?;
    make_tree(source.path(), &[("main.py", "print(1)")])?;
    fs::write(source.path().join(OsStr::from_bytes(b"name\xff")), "x")?;
    fs::write(source.path().join(OsStr::from_bytes(b"name\xfe")), "x")?;

    let out = TempDir::new()?;
    let packaged = package(source.path(), out.path(), &PackageOptions::default())?;

    assert_eq!(archive_names(&packaged.archive_path)?, vec!["main.py"]);
    assert_eq!(packaged.stats.skipped, 2);
    assert_eq!(
        packaged.digest,
        compute_digest_for(plain.path(), &PackageOptions::default())?
    );
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_unreadable_file_is_counted_once() -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let source = TempDir::new()?;
    make_tree(source.path(), &[("main.py", "print(1)"), ("secret.txt", "hidden")])?;
    let secret = source.path().join("secret.txt");
    fs::set_permissions(&secret, fs::Permissions::from_mode(0o000))?;

    // Privileged users can still open the file
    if fs::File::open(&secret).is_ok() {
        return Ok(());
    }

    let out = TempDir::new()?;
    let packaged = package(source.path(), out.path(), &PackageOptions::default())?;
    fs::set_permissions(&secret, fs::Permissions::from_mode(0o644))?;

    let entries = read_archive(&packaged.archive_path)?;
    assert_eq!(packaged.stats.files, 1);
    assert_eq!(packaged.stats.skipped, 1);
    assert_eq!(packaged.stats.total(), entries.len());
    Ok(())
}
