//! Graph algorithms supporting the component-wise hashers.

mod condensation;
mod post_order;

pub use condensation::Condensation;
pub use post_order::{postorder, postorder_filtered, PostOrder};
