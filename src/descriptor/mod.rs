//! Handler results and declarative descriptors.
//!
//! # Data Flow
//! ```text
//! Handler → Outcome
//!     Value     → sent as-is unless the reply was already sent
//!     Response  → value.rs resolves status/headers/json/raw → reply
//!     Page      → value.rs resolves page fields → render::PageRenderer
//!     Empty     → 204 unless the reply was already sent
//! ```
//!
//! # Design Decisions
//! - Descriptor kind is the enum variant; no tag inspection
//! - Context-dependent fields resolve eagerly, all at once, per request

pub mod page;
pub mod response;
pub mod value;

use serde_json::Value;

pub use page::{MetaTag, PageDescriptor, ResolvedPage, ScriptTag};
pub use response::{ResolvedResponse, ResponseDescriptor};
pub use value::ContextValue;

/// What a handler produced.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Plain value, serialized as JSON.
    Value(Value),
    Response(ResponseDescriptor),
    Page(PageDescriptor),
    /// Nothing returned.
    Empty,
}

impl From<Value> for Outcome {
    fn from(value: Value) -> Self {
        Outcome::Value(value)
    }
}

impl From<ResponseDescriptor> for Outcome {
    fn from(response: ResponseDescriptor) -> Self {
        Outcome::Response(response)
    }
}

impl From<PageDescriptor> for Outcome {
    fn from(page: PageDescriptor) -> Self {
        Outcome::Page(page)
    }
}

impl From<()> for Outcome {
    fn from(_: ()) -> Self {
        Outcome::Empty
    }
}

impl From<String> for Outcome {
    fn from(text: String) -> Self {
        Outcome::Value(Value::String(text))
    }
}

impl From<&'static str> for Outcome {
    fn from(text: &'static str) -> Self {
        Outcome::Value(Value::from(text))
    }
}
