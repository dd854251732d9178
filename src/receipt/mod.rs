//! Receipt files attached to transactions.

mod core;
mod delete;
mod download;
mod storage;

pub use core::{
    Receipt, create_receipt, create_receipt_table, delete_receipt, get_receipt,
    get_receipts_for_transaction,
};
pub use delete::delete_receipt_endpoint;
pub use download::{ReceiptState, get_receipt_file};
pub use storage::{
    ALLOWED_EXTENSIONS, StoredFile, UploadedFile, remove_receipt_files, remove_stored_files,
    store_uploads,
};
