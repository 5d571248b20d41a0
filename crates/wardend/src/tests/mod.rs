//! Behavioural and cross-module test suites for the dispatcher.

mod support;
