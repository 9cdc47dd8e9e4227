//! Checks that the crate version mentioned in the README and the package metadata are up to date.

#[test]
fn readme_is_in_sync() {
    version_sync::assert_markdown_deps_updated!("README.md");
}

#[test]
fn package_metadata_is_inherited_from_workspace() {
    assert_eq!(
        env!("CARGO_PKG_AUTHORS"),
        "Alex Ostrovski <ostrovski.alex@gmail.com>"
    );
    assert_eq!(
        env!("CARGO_PKG_REPOSITORY"),
        "https://github.com/slowli/font-tools"
    );
}
