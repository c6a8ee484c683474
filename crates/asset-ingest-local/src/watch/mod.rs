mod notify_watcher;

pub use notify_watcher::{scan_existing, DirectoryWatcher};
