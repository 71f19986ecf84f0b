//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the
//! `galsam` command-line tool. Each subcommand is defined in its own file to
//! keep the logic separated and maintainable.
//!
//! ## Structure
//!
//! Each command module typically contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and performs the
//!   command's logic, calling into the `galsam` library for core logic.

pub mod completions;
pub mod info;
pub mod run;
pub mod validate;
