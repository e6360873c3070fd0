//! Atomic file persistence for workbook blobs.
//!
//! Workbook persistence must be all-or-nothing: a crash mid-write may never
//! leave a half-encoded document behind. The recipe:
//! - write to a temp file in the destination directory (avoids cross-device
//!   renames)
//! - flush + `sync_all`
//! - rename into place with replace semantics (including on Windows)

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

/// Atomically replace `dest` with whatever `write_fn` writes.
///
/// Parent directories are created as needed. If `write_fn` or any I/O step
/// fails, `dest` is left untouched and the temp file is cleaned up.
pub fn atomic_write<T>(
    dest: impl AsRef<Path>,
    write_fn: impl FnOnce(&mut File) -> io::Result<T>,
) -> io::Result<T> {
    let dest = dest.as_ref();
    let dir = parent_dir_or_dot(dest);
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    let out = write_fn(tmp.as_file_mut())?;
    tmp.as_file_mut().flush()?;
    tmp.as_file().sync_all()?;

    let tmp_path = tmp.into_temp_path();
    replace_file(tmp_path.as_ref(), dest)?;

    // Directory metadata sync is best-effort; the file is already in place.
    let _ = sync_parent_dir(dest);

    Ok(out)
}

/// Atomically replace `dest` with `bytes`.
pub fn atomic_write_bytes(dest: impl AsRef<Path>, bytes: &[u8]) -> io::Result<()> {
    atomic_write(dest, |file| file.write_all(bytes))
}

fn parent_dir_or_dot(path: &Path) -> &Path {
    // `Path::parent` returns `Some("")` for bare relative names like
    // `doc.fwb`; treat that as the current directory.
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

fn sync_parent_dir(path: &Path) -> io::Result<()> {
    // Opening a directory as a file works on most Unix platforms and may
    // fail elsewhere; callers treat this as best-effort.
    let dir = File::open(parent_dir_or_dot(path))?;
    dir.sync_all()
}

fn replace_file(from: &Path, to: &Path) -> io::Result<()> {
    #[cfg(windows)]
    {
        use std::os::windows::ffi::OsStrExt as _;
        use windows_sys::Win32::Storage::FileSystem::{MoveFileExW, MOVEFILE_REPLACE_EXISTING};

        fn to_wide_null(path: &Path) -> Vec<u16> {
            let mut wide: Vec<u16> = path.as_os_str().encode_wide().collect();
            wide.push(0);
            wide
        }

        let from_w = to_wide_null(from);
        let to_w = to_wide_null(to);
        let ok = unsafe { MoveFileExW(from_w.as_ptr(), to_w.as_ptr(), MOVEFILE_REPLACE_EXISTING) };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    #[cfg(not(windows))]
    {
        fs::rename(from, to)
    }
}
