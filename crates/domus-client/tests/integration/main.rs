mod common;
mod pipeline_tests;
mod publisher_tests;
mod source_tests;
