//! Classification of the user-supplied source location and the flag
//! inference that reads the binary build output.

use std::path::{Path, PathBuf};

use snafu::{ensure, ResultExt, Snafu};
use strum::Display;
use url::Url;

use crate::build_type::{
    self, BinaryBuildType, RuntimeType, NATIVE_RUNNER_SUFFIX, RUNNER_JAR_SUFFIX,
};

/// Build tool output directory whose name marks a pre-built binary upload.
pub const BINARY_OUTPUT_DIR: &str = "target";

#[derive(Snafu, Debug)]
pub enum Error {
    #[snafu(display("invalid resource {resource:?}"))]
    InvalidResource { resource: String },

    #[snafu(display("failed to parse resource URL {resource:?}"))]
    ParseResourceUrl {
        source: url::ParseError,
        resource: String,
    },

    #[snafu(display("failed to stat resource {path:?}"))]
    StatResource {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to list binary output directory {path:?}"))]
    ListBinaryDir {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("specified native binary build but no native executable found in {path:?}"))]
    NoNativeExecutable { path: PathBuf },
}

/// What kind of source the user pointed the build at.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum ResourceType {
    /// No resource given, the artifacts arrive through a separate upload.
    Binary,
    /// Remote URL of a single supported source file.
    GitFile,
    /// Remote URL of a repository to be cloned server-side.
    GitRepository,
    LocalFile,
    LocalDirectory,
    /// Local build output directory, uploaded as a pre-built binary.
    LocalBinaryDirectory,
}

/// Classifies a resource string into a [`ResourceType`].
///
/// Anything starting with `http` must be an absolute URL; everything else is
/// treated as a local path and stat'ed.
pub fn classify(resource: &str) -> Result<ResourceType, Error> {
    if resource.is_empty() {
        return Ok(ResourceType::Binary);
    }
    if resource.starts_with("http") {
        return classify_url(resource);
    }

    let path = Path::new(resource);
    let metadata = path.metadata().context(StatResourceSnafu { path })?;
    if metadata.is_file() {
        ensure!(
            build_type::is_suffix_supported(resource, BinaryBuildType::SourceToImage),
            InvalidResourceSnafu { resource }
        );
        return Ok(ResourceType::LocalFile);
    }

    // trailing slashes are normalized away by file_name
    let dir_name = path.file_name().map(|name| name.to_string_lossy());
    if dir_name.as_deref() == Some(BINARY_OUTPUT_DIR) {
        Ok(ResourceType::LocalBinaryDirectory)
    } else {
        Ok(ResourceType::LocalDirectory)
    }
}

fn classify_url(resource: &str) -> Result<ResourceType, Error> {
    let url = Url::parse(resource).context(ParseResourceUrlSnafu { resource })?;
    ensure!(url.has_host(), InvalidResourceSnafu { resource });
    let last_segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    if build_type::is_suffix_supported(last_segment, BinaryBuildType::SourceToImage) {
        Ok(ResourceType::GitFile)
    } else {
        Ok(ResourceType::GitRepository)
    }
}

/// Reconciles the requested native flag with the binary build output.
///
/// Only a [`ResourceType::LocalBinaryDirectory`] is inspected; every other
/// resource type returns the flag unchanged. An explicitly requested native
/// build without a native executable on disk is an error, while a found
/// executable upgrades an unrequested flag.
pub fn infer_native(
    requested: bool,
    resource_type: ResourceType,
    path: &Path,
) -> Result<bool, Error> {
    if resource_type != ResourceType::LocalBinaryDirectory {
        return Ok(requested);
    }
    let found = dir_has_entry_with_suffix(path, NATIVE_RUNNER_SUFFIX)?;
    match (requested, found) {
        (true, false) => NoNativeExecutableSnafu { path }.fail(),
        (false, true) => {
            tracing::info!(
                path = %path.display(),
                "found a native executable, switching to a native build"
            );
            Ok(true)
        }
        _ => Ok(requested),
    }
}

/// Reconciles the requested runtime with the binary build output.
///
/// A runnable jar in a [`ResourceType::LocalBinaryDirectory`] marks a Quarkus
/// build regardless of the requested runtime.
pub fn infer_runtime(
    requested: RuntimeType,
    resource_type: ResourceType,
    path: &Path,
) -> Result<RuntimeType, Error> {
    if resource_type != ResourceType::LocalBinaryDirectory {
        return Ok(requested);
    }
    if dir_has_entry_with_suffix(path, RUNNER_JAR_SUFFIX)? {
        if requested != RuntimeType::Quarkus {
            tracing::info!(
                path = %path.display(),
                requested = %requested,
                "found a Quarkus runnable jar, overriding the requested runtime"
            );
        }
        return Ok(RuntimeType::Quarkus);
    }
    Ok(requested)
}

fn dir_has_entry_with_suffix(path: &Path, suffix: &str) -> Result<bool, Error> {
    for entry in path.read_dir().context(ListBinaryDirSnafu { path })? {
        let entry = entry.context(ListBinaryDirSnafu { path })?;
        if entry.file_name().to_string_lossy().ends_with(suffix) {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use rstest::rstest;

    use super::*;

    #[test]
    fn empty_resource_is_a_binary_build() {
        assert_eq!(classify("").unwrap(), ResourceType::Binary);
    }

    #[rstest]
    #[case("https://github.com/org/repo/blob/main/file.dmn", ResourceType::GitFile)]
    #[case(
        "https://raw.githubusercontent.com/org/repo/main/orders.sw.json",
        ResourceType::GitFile
    )]
    #[case("https://github.com/org/repo", ResourceType::GitRepository)]
    #[case("https://github.com/org/repo.git", ResourceType::GitRepository)]
    #[case("http://git.example.com/org/repo/", ResourceType::GitRepository)]
    fn url_resources(#[case] resource: &str, #[case] expected: ResourceType) {
        assert_eq!(classify(resource).unwrap(), expected);
    }

    #[test]
    fn malformed_urls_are_rejected() {
        // no scheme separator, so not an absolute URL
        assert!(matches!(
            classify("http//missing-colon.example.com"),
            Err(Error::ParseResourceUrl { .. })
        ));
        // http requires a host to parse at all
        assert!(matches!(
            classify("http://"),
            Err(Error::ParseResourceUrl { .. })
        ));
        // parses as an opaque non-special scheme, but carries no host
        assert!(matches!(
            classify("httpmem:opaque"),
            Err(Error::InvalidResource { .. })
        ));
    }

    #[test]
    fn local_file_with_supported_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("decision.dmn");
        fs::write(&file, b"<definitions/>").unwrap();
        assert_eq!(
            classify(file.to_str().unwrap()).unwrap(),
            ResourceType::LocalFile
        );
    }

    #[test]
    fn local_file_with_unsupported_suffix_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        fs::write(&file, b"notes").unwrap();
        assert!(matches!(
            classify(file.to_str().unwrap()),
            Err(Error::InvalidResource { .. })
        ));
    }

    #[test]
    fn missing_local_path_propagates_the_stat_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        assert!(matches!(
            classify(missing.to_str().unwrap()),
            Err(Error::StatResource { .. })
        ));
    }

    #[test]
    fn target_directory_is_a_binary_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target");
        fs::create_dir(&target).unwrap();
        assert_eq!(
            classify(target.to_str().unwrap()).unwrap(),
            ResourceType::LocalBinaryDirectory
        );
        // trailing slash does not change the outcome
        assert_eq!(
            classify(&format!("{}/", target.to_str().unwrap())).unwrap(),
            ResourceType::LocalBinaryDirectory
        );
    }

    #[test]
    fn other_directories_are_source_directories() {
        let dir = tempfile::tempdir().unwrap();
        let sources = dir.path().join("sources");
        fs::create_dir(&sources).unwrap();
        assert_eq!(
            classify(sources.to_str().unwrap()).unwrap(),
            ResourceType::LocalDirectory
        );
    }

    #[test]
    fn native_flag_passes_through_for_source_resources() {
        let nowhere = Path::new("/does/not/exist");
        assert!(infer_native(true, ResourceType::LocalDirectory, nowhere).unwrap());
        assert!(!infer_native(false, ResourceType::GitRepository, nowhere).unwrap());
    }

    #[test]
    fn requested_native_build_without_executable_fails() {
        let target = tempfile::tempdir().unwrap();
        fs::write(target.path().join("service.jar"), b"jar").unwrap();
        assert!(matches!(
            infer_native(true, ResourceType::LocalBinaryDirectory, target.path()),
            Err(Error::NoNativeExecutable { .. })
        ));
    }

    #[test]
    fn found_native_executable_upgrades_the_flag() {
        let target = tempfile::tempdir().unwrap();
        fs::write(target.path().join("service-runner"), b"\x7fELF").unwrap();
        assert!(infer_native(false, ResourceType::LocalBinaryDirectory, target.path()).unwrap());
        assert!(infer_native(true, ResourceType::LocalBinaryDirectory, target.path()).unwrap());
    }

    #[test]
    fn runnable_jar_overrides_the_requested_runtime() {
        let target = tempfile::tempdir().unwrap();
        fs::write(target.path().join("service-runner.jar"), b"jar").unwrap();
        assert_eq!(
            infer_runtime(
                RuntimeType::SpringBoot,
                ResourceType::LocalBinaryDirectory,
                target.path()
            )
            .unwrap(),
            RuntimeType::Quarkus
        );
    }

    #[test]
    fn runtime_is_unchanged_without_a_runnable_jar() {
        let target = tempfile::tempdir().unwrap();
        // a native runner is not a runnable jar
        fs::write(target.path().join("service-runner"), b"\x7fELF").unwrap();
        assert_eq!(
            infer_runtime(
                RuntimeType::SpringBoot,
                ResourceType::LocalBinaryDirectory,
                target.path()
            )
            .unwrap(),
            RuntimeType::SpringBoot
        );
        assert_eq!(
            infer_runtime(RuntimeType::SpringBoot, ResourceType::LocalDirectory, target.path())
                .unwrap(),
            RuntimeType::SpringBoot
        );
    }

    #[test]
    fn unreadable_binary_directory_propagates_the_list_error() {
        let target = tempfile::tempdir().unwrap();
        let missing = target.path().join("target");
        assert!(matches!(
            infer_native(false, ResourceType::LocalBinaryDirectory, &missing),
            Err(Error::ListBinaryDir { .. })
        ));
    }
}
