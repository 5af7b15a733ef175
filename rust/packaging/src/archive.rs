//! Packages build sources or binary artifacts into a gzipped tar stream.

use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use flate2::write::GzEncoder;
use snafu::{ResultExt, Snafu};
use tar::{Builder, EntryType, Header, HeaderMode};
use walkdir::WalkDir;

use crate::build_type::{self, BinaryBuildType, ScanLayout};

#[derive(Snafu, Debug)]
pub enum Error {
    #[snafu(display("failed to walk source directory {path:?}"))]
    WalkSourceDir {
        source: walkdir::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to list layout directory {path:?}"))]
    ListLayoutDir {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to stat {path:?}"))]
    StatFile {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to read link target of {path:?}"))]
    ReadLinkTarget {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to open {path:?}"))]
    OpenFile {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to add {path:?} to the archive"))]
    AddFileToArchive {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to finish the archive"))]
    FinishArchive { source: std::io::Error },
}

/// Packages the files under `root` that the build type accepts into a
/// gzip-compressed tar stream.
///
/// Source-to-image builds walk the whole tree and flatten entry names to the
/// file's base name; binary builds visit the build type's fixed directory
/// layout and keep names relative to `root`. A layout directory the project
/// simply does not have contributes no files; any other filesystem error
/// aborts the build and no partial archive is returned.
pub fn build_archive(root: &Path, build_type: BinaryBuildType) -> Result<Vec<u8>, Error> {
    let mut tar = Builder::new(GzEncoder::new(Vec::new(), flate2::Compression::default()));

    let appended = match build_type.scan_layout() {
        ScanLayout::Recursive => append_tree_flattened(&mut tar, root, build_type)?,
        ScanLayout::Fixed(dirs) => {
            let mut appended = 0;
            for dir in dirs {
                appended += append_dir_entries(&mut tar, root, dir, build_type)?;
            }
            appended
        }
    };

    // both the tar trailer and the gzip footer must be flushed, otherwise the
    // stream is truncated and unreadable
    let archive = tar
        .into_inner()
        .context(FinishArchiveSnafu)?
        .finish()
        .context(FinishArchiveSnafu)?;
    tracing::info!(
        archive.files = appended,
        archive.bytes = archive.len(),
        %build_type,
        "finished building archive"
    );
    Ok(archive)
}

fn append_tree_flattened<W: Write>(
    tar: &mut Builder<W>,
    root: &Path,
    build_type: BinaryBuildType,
) -> Result<usize, Error> {
    let mut appended = 0;
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.context(WalkSourceDirSnafu { path: root })?;
        if entry.file_type().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !build_type::is_suffix_supported(&name, build_type) {
            continue;
        }
        append_file(tar, entry.path(), &name)?;
        appended += 1;
    }
    Ok(appended)
}

fn append_dir_entries<W: Write>(
    tar: &mut Builder<W>,
    root: &Path,
    sub_dir: &str,
    build_type: BinaryBuildType,
) -> Result<usize, Error> {
    let dir = if sub_dir.is_empty() {
        root.to_path_buf()
    } else {
        root.join(sub_dir)
    };
    let entries = match dir.read_dir() {
        Ok(entries) => entries,
        // projects without this part of the layout contribute no files
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %dir.display(), "layout directory absent, skipping");
            return Ok(0);
        }
        Err(error) => return Err(error).context(ListLayoutDirSnafu { path: dir }),
    };

    let mut appended = 0;
    for entry in entries {
        let entry = entry.context(ListLayoutDirSnafu { path: &dir })?;
        let file_type = entry.file_type().context(StatFileSnafu { path: entry.path() })?;
        if file_type.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !build_type::is_suffix_supported(&name, build_type) {
            continue;
        }
        let entry_name = if sub_dir.is_empty() {
            name
        } else {
            format!("{sub_dir}/{name}")
        };
        append_file(tar, &entry.path(), &entry_name)?;
        appended += 1;
    }
    Ok(appended)
}

fn append_file<W: Write>(tar: &mut Builder<W>, path: &Path, entry_name: &str) -> Result<(), Error> {
    let metadata = fs::symlink_metadata(path).context(StatFileSnafu { path })?;
    let mut header = Header::new_gnu();
    header.set_metadata_in_mode(&metadata, HeaderMode::Complete);

    // PAX records keep names and metadata intact past the classic ustar limits
    tar.append_pax_extensions([("path", entry_name.as_bytes())])
        .context(AddFileToArchiveSnafu { path })?;

    if metadata.file_type().is_symlink() {
        let target = fs::read_link(path).context(ReadLinkTargetSnafu { path })?;
        header.set_entry_type(EntryType::Symlink);
        header.set_size(0);
        tar.append_link(&mut header, entry_name, &target)
            .context(AddFileToArchiveSnafu { path })?;
    } else {
        let mut file = File::open(path).context(OpenFileSnafu { path })?;
        tar.append_data(&mut header, entry_name, &mut file)
            .context(AddFileToArchiveSnafu { path })?;
    }
    tracing::debug!(path = %path.display(), entry = entry_name, "appended file to archive");
    Ok(())
}
