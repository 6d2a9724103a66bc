use crate::pages::{PageId, SlotId};

#[derive(Debug)]
pub enum Error {
    FileNotFound(String),
    FileHandleNotInit,
    WriteFailed(PageId),
    ReadNonExistingPage(PageId),
    BufferPoolFull,
    PageNotInBufferPool(PageId),
    PageAlreadyUnpinned(PageId),
    PageNotDirty(PageId),
    PagesStillPinned(usize),
    PoolSizeInvalid(usize),
    NoTupleWithGivenRid(PageId, SlotId),
    NoMoreTuples,
    ScanConditionNotFound,
    TableExists(String),
    NotBoolean(String),
    TypeMismatch(String, String),
    KeyNotFound,
    NoMoreEntries,
    FanoutTooLarge(usize),
    KeyTypeMismatch(String, String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::FileNotFound(path) => write!(f, "File {path} not found."),
            Error::FileHandleNotInit => write!(f, "File handle is not initialized."),
            Error::WriteFailed(page) => write!(f, "Writing page {page} failed."),
            Error::ReadNonExistingPage(page) => {
                write!(f, "Page {page} does not exist in the file.")
            }
            Error::BufferPoolFull => write!(f, "All frames in the buffer pool are pinned."),
            Error::PageNotInBufferPool(page) => {
                write!(f, "Page {page} is not resident in the buffer pool.")
            }
            Error::PageAlreadyUnpinned(page) => write!(f, "Page {page} is already unpinned."),
            Error::PageNotDirty(page) => write!(f, "Page {page} is not dirty."),
            Error::PagesStillPinned(count) => {
                write!(f, "{count} page(s) still pinned at shutdown.")
            }
            Error::PoolSizeInvalid(size) => write!(f, "Invalid buffer pool size {size}."),
            Error::NoTupleWithGivenRid(page, slot) => {
                write!(f, "No tuple at ({page}, {slot}).")
            }
            Error::NoMoreTuples => write!(f, "No more tuples."),
            Error::ScanConditionNotFound => write!(f, "Scan has no condition."),
            Error::TableExists(table) => write!(f, "Table {table} already exists."),
            Error::NotBoolean(expr) => write!(f, "Expression {expr} is not boolean."),
            Error::TypeMismatch(left, right) => {
                write!(f, "Cannot compare {left} against {right}.")
            }
            Error::KeyNotFound => write!(f, "Key not found in the index."),
            Error::NoMoreEntries => write!(f, "No more entries."),
            Error::FanoutTooLarge(n) => write!(f, "Branching factor {n} does not fit a page."),
            Error::KeyTypeMismatch(expected, actual) => {
                write!(f, "Index keyed by {expected}, but got a {actual} key.")
            }
        }
    }
}
