mod collector_tests;
mod common;
