/// Router Module Index
///
/// HTTP surface of the application, split by what each route serves.

/// The dispatcher mount point: every GET and POST to it is routed by `action`/`ftl`.
pub mod app;

/// Bundled static resources and the catch-all redirect.
pub mod resources;
