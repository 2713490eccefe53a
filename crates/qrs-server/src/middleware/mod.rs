//! HTTP middleware.

pub(crate) mod security;
