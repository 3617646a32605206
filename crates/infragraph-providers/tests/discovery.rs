use infragraph_addrs::ProviderAddr;
use infragraph_providers::{search_local_directory, PackageLocation, Platform};
use pretty_assertions::assert_eq;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

fn mkdir(base: &Path, rel: &str) {
    fs::create_dir_all(base.join(rel)).unwrap();
}

fn touch(base: &Path, rel: &str, contents: &[u8]) {
    let path = base.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

#[test]
fn finds_both_layouts_sorted_newest_first() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path();
    mkdir(base, "registry.terraform.io/hashicorp/aws/2.0.0/linux_amd64");
    mkdir(base, "registry.terraform.io/hashicorp/aws/2.0.0/darwin_arm64");
    touch(
        base,
        "registry.terraform.io/hashicorp/aws/terraform-provider-aws_2.1.0_linux_amd64.zip",
        b"zip",
    );

    let found = search_local_directory(base).unwrap();
    let aws: ProviderAddr = "hashicorp/aws".parse().unwrap();
    let packages = &found[&aws];

    let summary: Vec<(String, String)> = packages
        .iter()
        .map(|p| (p.version.to_string(), p.target_platform.to_string()))
        .collect();
    assert_eq!(
        summary,
        [
            ("2.1.0".to_string(), "linux_amd64".to_string()),
            ("2.0.0".to_string(), "darwin_arm64".to_string()),
            ("2.0.0".to_string(), "linux_amd64".to_string()),
        ]
    );

    let packed = &packages[0];
    assert!(matches!(packed.location, PackageLocation::LocalArchive(_)));
    let expected = hex::encode(Sha256::digest(b"zip"));
    assert_eq!(packed.checksum.as_deref(), Some(expected.as_str()));

    let unpacked = &packages[1];
    assert_eq!(unpacked.filename, "terraform-provider-aws_2.0.0_darwin_arm64.zip");
    assert!(unpacked.checksum.is_none());
    assert_eq!(unpacked.target_platform, Platform::new("darwin", "arm64"));
}

#[test]
fn packed_names_match_case_insensitively() {
    let dir = tempfile::tempdir().unwrap();
    touch(
        dir.path(),
        "registry.terraform.io/hashicorp/null/Terraform-Provider-Null_3.0.0_Linux_AMD64.zip",
        b"",
    );
    let found = search_local_directory(dir.path()).unwrap();
    let null: ProviderAddr = "hashicorp/null".parse().unwrap();
    assert_eq!(found[&null][0].filename, "terraform-provider-null_3.0.0_linux_amd64.zip");
}

#[test]
fn legacy_namespace_needs_default_host() {
    let dir = tempfile::tempdir().unwrap();
    mkdir(dir.path(), "registry.terraform.io/-/null/1.0.0/linux_amd64");
    mkdir(dir.path(), "example.com/-/null/1.0.0/linux_amd64");
    let found = search_local_directory(dir.path()).unwrap();
    assert_eq!(found.len(), 1);
    assert!(found.contains_key(&ProviderAddr::legacy("null")));
}

#[test]
fn malformed_entries_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path();
    mkdir(base, "registry.terraform.io/hashicorp/aws/not-a-version/linux_amd64");
    mkdir(base, "registry.terraform.io/hashicorp/aws/1.0.0/linux");
    mkdir(base, "bad_host!/hashicorp/aws/1.0.0/linux_amd64");
    touch(base, "registry.terraform.io/hashicorp/aws/readme.txt", b"");
    touch(base, "registry.terraform.io/hashicorp/aws/terraform-provider-aws_1.0.0.zip", b"");
    touch(base, "registry.terraform.io/hashicorp/aws/terraform-provider-aws_1.0.0_linux_amd64.tar", b"");
    // Unpacked layout must be a directory.
    touch(base, "registry.terraform.io/hashicorp/aws/1.0.0/linux_arm64", b"");

    assert!(search_local_directory(base).unwrap().is_empty());
}
