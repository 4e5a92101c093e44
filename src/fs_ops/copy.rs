//! Copy helpers.
//! - `copy_file_no_clobber`: temp file in the destination directory, then rename into place.
//!   Used when a move has to cross filesystems.
//! - `copy_tree`: full recursive copy of a directory's contents (parallel file copies).
//!   Used to create backups and to restore from them.

use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

use super::atomic::rename_no_clobber;
use super::helpers::io_error_with_help_io;
use super::metadata::preserve_metadata;
use super::util::unique_temp_path;

/// Copy `src` to `dest` through a temp sibling; never replaces an existing `dest`.
pub fn copy_file_no_clobber(src: &Path, dest: &Path) -> io::Result<()> {
    let dest_dir = dest.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("destination has no parent: {}", dest.display()),
        )
    })?;
    let meta = fs::metadata(src).map_err(io_error_with_help_io("stat source", src))?;

    let tmp = unique_temp_path(dest_dir);
    fs::copy(src, &tmp).map_err(io_error_with_help_io("copy to temporary file", &tmp))?;
    preserve_metadata(&tmp, &meta);

    if let Err(e) = rename_no_clobber(&tmp, dest) {
        let _ = fs::remove_file(&tmp);
        return Err(io_error_with_help_io("rename temporary file", dest)(e));
    }
    Ok(())
}

/// What a tree copy produced.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CopyStats {
    pub dirs: usize,
    pub files: usize,
    pub links: usize,
}

/// Copy every entry under `src_root` into the existing directory `dst_root`.
/// Stops at the first error; the caller owns cleanup of a partial copy.
///
/// Only directories, regular files and symlinks can be copied. A FIFO, socket
/// or device anywhere in the tree is an `InvalidInput` error raised before
/// anything is written (opening a FIFO would block forever).
pub fn copy_tree(src_root: &Path, dst_root: &Path) -> io::Result<CopyStats> {
    let mut dirs: Vec<PathBuf> = Vec::new();
    let mut files: Vec<PathBuf> = Vec::new();
    let mut links: Vec<PathBuf> = Vec::new();

    for entry in WalkDir::new(src_root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.map_err(io::Error::from)?;
        let rel = entry
            .path()
            .strip_prefix(src_root)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?
            .to_path_buf();
        let ft = entry.file_type();
        if ft.is_dir() {
            dirs.push(rel);
        } else if ft.is_symlink() {
            links.push(rel);
        } else if ft.is_file() {
            files.push(rel);
        } else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot copy special file '{}'", entry.path().display()),
            ));
        }
    }

    // WalkDir yields parents before children, so a plain create_dir is enough.
    for rel in &dirs {
        let target = dst_root.join(rel);
        fs::create_dir(&target).map_err(io_error_with_help_io("create directory", &target))?;
    }

    for rel in &links {
        copy_link(&src_root.join(rel), &dst_root.join(rel))?;
    }

    files.par_iter().try_for_each(|rel| -> io::Result<()> {
        let from = src_root.join(rel);
        let to = dst_root.join(rel);
        let meta = fs::metadata(&from).map_err(io_error_with_help_io("stat file", &from))?;
        fs::copy(&from, &to).map_err(io_error_with_help_io("copy file", &from))?;
        preserve_metadata(&to, &meta);
        trace!(src = %from.display(), dest = %to.display(), "copied");
        Ok(())
    })?;

    let stats = CopyStats {
        dirs: dirs.len(),
        files: files.len(),
        links: links.len(),
    };
    debug!(src = %src_root.display(), dest = %dst_root.display(), ?stats, "tree copied");
    Ok(stats)
}

#[cfg(unix)]
fn copy_link(from: &Path, to: &Path) -> io::Result<()> {
    let target = fs::read_link(from).map_err(io_error_with_help_io("read symlink", from))?;
    std::os::unix::fs::symlink(&target, to).map_err(io_error_with_help_io("create symlink", to))
}

/// Without portable symlink creation, copy what the link points at.
#[cfg(not(unix))]
fn copy_link(from: &Path, to: &Path) -> io::Result<()> {
    let meta = fs::metadata(from).map_err(io_error_with_help_io("stat symlink target", from))?;
    if meta.is_dir() {
        fs::create_dir(to).map_err(io_error_with_help_io("create directory", to))?;
        copy_tree(from, to).map(|_| ())
    } else {
        fs::copy(from, to).map_err(io_error_with_help_io("copy file", from))?;
        Ok(())
    }
}
