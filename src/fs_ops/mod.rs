//! Low-level filesystem operations shared by the engine.

mod atomic;
mod copy;
mod helpers;
mod lock;
mod metadata;
mod util;

pub use atomic::rename_no_clobber;
pub use copy::{CopyStats, copy_file_no_clobber, copy_tree};
pub use helpers::{io_error_with_help, io_error_with_help_io};
pub use lock::{RootLock, lock_file_path, try_acquire_root_lock};
pub use metadata::preserve_metadata;

pub(crate) use helpers::describe_io_error;
pub(crate) use util::is_cross_device;
