mod eoka_page;
mod pool;

pub use eoka_page::EokaPage;
pub use pool::{EokaLauncher, Lease, PageFactory, PagePool};

/// JSON string literal for embedding a value in a script.
pub(crate) fn js_str(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}
