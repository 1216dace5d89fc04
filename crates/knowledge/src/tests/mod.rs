//! End-to-end tests over the full index lifecycle.
