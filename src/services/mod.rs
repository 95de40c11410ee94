/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Session lifecycle, joining, host commands and answers.
pub mod session_service;
/// Server-Sent Events streaming of session events.
pub mod sse_service;
/// Storage connection supervisor driving degraded mode.
pub mod storage_supervisor;
/// Background eviction of idle and finished sessions.
pub mod sweeper;
