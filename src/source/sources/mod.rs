/// Whitespace-separated adjacency-list reader.
pub mod adjacency;
/// Tab-separated feedback table reader.
pub mod feedback;
/// Per-user simulation page-log reader.
pub mod simulation_log;
