//! Proxy groups

mod urltest;

pub use urltest::UrlTest;
