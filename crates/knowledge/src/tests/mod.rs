//! Cross-module tests for the index lifecycle and query path.

pub(crate) mod support;
