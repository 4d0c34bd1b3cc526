pub mod pageresource;

pub use pageresource::{MmapPageProvider, PageProvider};
