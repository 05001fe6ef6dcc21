//! Shared fixtures for the per-module test submodules declared elsewhere in
//! this crate (`write::tests`, `read::tests`, `level::tests`, `run::tests`,
//! `compaction::tests`, `manifest::tests`). This module only exists to host
//! [`helpers`]; it carries no tests of its own.

pub(crate) mod helpers;
