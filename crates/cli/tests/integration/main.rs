mod common;
mod package_tests;
mod task_tests;
