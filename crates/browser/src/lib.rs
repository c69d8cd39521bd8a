//! Browser Session Manager (C9) and its one concrete Page Driver.

pub mod driver;
pub mod manager;
pub mod url;

pub use driver::CdpPageDriver;
pub use manager::BrowserManager;
pub use url::validate_url;
