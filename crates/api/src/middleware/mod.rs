//! Request-level middleware applied to every route.
//!
//! - [`trailing_slash::redirect_trailing_slash`] -- 301 from `/path/` to `/path`.
//! - [`method_guard::reject_unsupported_methods`] -- 405 with an empty body
//!   for anything other than GET and POST.

pub mod method_guard;
pub mod trailing_slash;
