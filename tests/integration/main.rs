//! Integration tests for fgmerge.
//!
//! These tests run the `fgmerge` binary end to end on small generated inputs.

mod helpers;
mod test_error_paths;
mod test_merge_command;
mod test_streaming_input;
