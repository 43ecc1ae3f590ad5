//! Layout catalog: page templates and stylesheets offered to the editor.
//!
//! Templates ship as PHP markup and are converted to Handlebars when the
//! catalog is built. See [`convert`] for the recognized forms.

mod catalog;
pub mod convert;

pub use catalog::{LayoutCatalog, LayoutResource};
