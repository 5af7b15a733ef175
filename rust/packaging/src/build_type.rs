//! Build type tags and the per-type packaging rules keyed off them.

use std::path::{Path, PathBuf};

use snafu::{ResultExt, Snafu};
use strum::{Display, EnumIter, EnumString};

use crate::resource::ResourceType;

/// Directory created by the Quarkus fast-jar packaging inside the build output.
pub const FAST_JAR_DIR: &str = "quarkus-app";

/// Suffix of a native executable produced by a Quarkus native build.
pub const NATIVE_RUNNER_SUFFIX: &str = "-runner";

/// Suffix of the runnable jar produced by the Quarkus legacy-jar packaging.
pub const RUNNER_JAR_SUFFIX: &str = "-runner.jar";

#[derive(Snafu, Debug)]
pub enum Error {
    #[snafu(display("failed to list binary output directory {path:?}"))]
    ListBinaryDir {
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Runtime a Kogito service is built for.
#[derive(Clone, Copy, Debug, Default, Display, EnumIter, EnumString, Eq, PartialEq)]
#[strum(serialize_all = "lowercase")]
pub enum RuntimeType {
    #[default]
    Quarkus,
    SpringBoot,
}

/// Strategy used to package and trigger a single build.
///
/// Decides both which file suffixes are accepted and which directories of the
/// build output are scanned, see [`BinaryBuildType::supported_suffixes`] and
/// [`BinaryBuildType::scan_layout`].
#[derive(Clone, Copy, Debug, Display, EnumIter, Eq, PartialEq)]
pub enum BinaryBuildType {
    /// Upload raw source assets for server-side compilation.
    SourceToImage,
    SpringBootJvm,
    QuarkusJvm,
    QuarkusNativeBuild,
    QuarkusFastJarJvm,
    QuarkusLegacyJarJvm,
}

const SOURCE_TO_IMAGE_SUFFIXES: &[&str] = &[
    ".dmn",
    ".drl",
    ".bpmn",
    ".bpmn2",
    ".properties",
    ".sw.json",
    ".sw.yaml",
];
const SPRING_BOOT_JVM_SUFFIXES: &[&str] = &[".jar"];
const QUARKUS_JVM_SUFFIXES: &[&str] = &[".jar"];
const QUARKUS_NATIVE_SUFFIXES: &[&str] = &[NATIVE_RUNNER_SUFFIX, ".json"];
const QUARKUS_FAST_JAR_SUFFIXES: &[&str] = &[".jar", ".dat"];
const QUARKUS_LEGACY_JAR_SUFFIXES: &[&str] = &[".jar"];

/// How [`crate::archive::build_archive`] visits the build output for one build type.
#[derive(Clone, Copy, Debug)]
pub enum ScanLayout {
    /// Walk the whole tree, flattening entry names to their base name.
    Recursive,
    /// Visit a fixed list of root-relative directories, each non-recursively,
    /// keeping entry names relative to the root.
    Fixed(&'static [&'static str]),
}

impl BinaryBuildType {
    /// File name suffixes accepted into the archive for this build type.
    pub fn supported_suffixes(self) -> &'static [&'static str] {
        match self {
            Self::SourceToImage => SOURCE_TO_IMAGE_SUFFIXES,
            Self::SpringBootJvm => SPRING_BOOT_JVM_SUFFIXES,
            Self::QuarkusJvm => QUARKUS_JVM_SUFFIXES,
            Self::QuarkusNativeBuild => QUARKUS_NATIVE_SUFFIXES,
            Self::QuarkusFastJarJvm => QUARKUS_FAST_JAR_SUFFIXES,
            Self::QuarkusLegacyJarJvm => QUARKUS_LEGACY_JAR_SUFFIXES,
        }
    }

    pub fn scan_layout(self) -> ScanLayout {
        match self {
            Self::SourceToImage => ScanLayout::Recursive,
            Self::SpringBootJvm | Self::QuarkusNativeBuild => ScanLayout::Fixed(&[""]),
            Self::QuarkusJvm => ScanLayout::Fixed(&["", "lib"]),
            Self::QuarkusFastJarJvm => ScanLayout::Fixed(&[
                "",
                "lib",
                "quarkus-app",
                "quarkus-app/lib/main",
                "quarkus-app/lib/boot",
                "quarkus-app/quarkus",
            ]),
            Self::QuarkusLegacyJarJvm => ScanLayout::Fixed(&["", "lib", "quarkus-app/lib"]),
        }
    }

    /// Picks the build type for a classified resource.
    ///
    /// Source resources always compile server-side. Binary resources follow
    /// the requested runtime and native flag; for a JVM Quarkus build the
    /// packaging flavor is read off the binary directory layout when one is
    /// available, falling back to the plain jar layout.
    pub fn derive(
        runtime: RuntimeType,
        native: bool,
        resource_type: ResourceType,
        binary_dir: Option<&Path>,
    ) -> Result<Self, Error> {
        match resource_type {
            ResourceType::GitFile
            | ResourceType::GitRepository
            | ResourceType::LocalFile
            | ResourceType::LocalDirectory => Ok(Self::SourceToImage),
            ResourceType::Binary | ResourceType::LocalBinaryDirectory => match runtime {
                RuntimeType::SpringBoot => Ok(Self::SpringBootJvm),
                RuntimeType::Quarkus if native => Ok(Self::QuarkusNativeBuild),
                RuntimeType::Quarkus => {
                    let Some(dir) = binary_dir else {
                        return Ok(Self::QuarkusJvm);
                    };
                    Self::derive_quarkus_jvm_flavor(dir)
                }
            },
        }
    }

    fn derive_quarkus_jvm_flavor(dir: &Path) -> Result<Self, Error> {
        if dir.join(FAST_JAR_DIR).is_dir() {
            return Ok(Self::QuarkusFastJarJvm);
        }
        for entry in dir.read_dir().context(ListBinaryDirSnafu { path: dir })? {
            let entry = entry.context(ListBinaryDirSnafu { path: dir })?;
            if entry
                .file_name()
                .to_string_lossy()
                .ends_with(RUNNER_JAR_SUFFIX)
            {
                return Ok(Self::QuarkusLegacyJarJvm);
            }
        }
        Ok(Self::QuarkusJvm)
    }
}

/// Returns true if the file name ends with one of the build type's supported
/// suffixes. Only the final path component is considered, so callers may pass
/// full paths regardless of separator style.
pub fn is_suffix_supported(name: &str, build_type: BinaryBuildType) -> bool {
    let name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    build_type
        .supported_suffixes()
        .iter()
        .any(|suffix| name.ends_with(suffix))
}
