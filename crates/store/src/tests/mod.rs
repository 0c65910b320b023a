//! Store-level scenario tests.

mod concurrency;
