//! Integration tests across the harness crates.

#[cfg(test)]
mod scenarios;
#[cfg(test)]
mod support;
#[cfg(test)]
mod transports;
