//! Cell addressing and raw cell values

mod address;
mod value;

pub use address::{CellAddress, CellRange};
pub use value::{CellValue, ErrorCode, UnknownErrorCode};
