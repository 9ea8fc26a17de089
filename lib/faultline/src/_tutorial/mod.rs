//! # Tutorial: Serving Handler Failures with faultline
//!
//! Learn to write handlers that never leave a response half-done.
//!
//! ## Chapters
//!
//! 1. [Getting Started][chapter_0] - Handlers, writers and the error layer
//! 2. [Failures & Panics][chapter_1] - Status codes, classification, recovery
//! 3. [Customizing][chapter_2] - Error bodies, content types, diagnostics
//!
//! Ready? Start with [Chapter 0: Getting Started][chapter_0].

pub mod chapter_0;
pub mod chapter_1;
pub mod chapter_2;
