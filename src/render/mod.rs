//! HTML page rendering.
//!
//! # Data Flow
//! ```text
//! PageDescriptor + RequestContext
//!     → descriptor::page resolve (title, meta, status, ...)
//!     → static: component.rs render_to_markup
//!       spa:    bundle::BundleCache + PropsCache → script references
//!     → html.rs document assembly (escaped interpolation)
//! ```

pub mod component;
pub mod html;
pub mod page;

pub use component::{ClientComponent, Component, FnComponent, Markup};
pub use html::escape_html;
pub use page::{PageRenderer, RenderedPage};
