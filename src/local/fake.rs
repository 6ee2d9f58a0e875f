//! Recording host runner for unit tests

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::Path;

use super::HostRunner;
use crate::error::Result;

/// Records each invocation; exit codes come from `codes`, then 0
#[derive(Debug, Default)]
pub struct RecordingRunner {
    pub calls: RefCell<Vec<String>>,
    pub codes: RefCell<VecDeque<Option<i32>>>,
}

impl RecordingRunner {
    pub fn with_codes(codes: Vec<Option<i32>>) -> Self {
        Self {
            codes: RefCell::new(codes.into()),
            ..Self::default()
        }
    }
}

impl HostRunner for RecordingRunner {
    fn run(&self, program: &Path, args: &[String]) -> Result<Option<i32>> {
        let mut call = program.display().to_string();
        for arg in args {
            call.push(' ');
            call.push_str(arg);
        }
        self.calls.borrow_mut().push(call);
        Ok(self.codes.borrow_mut().pop_front().unwrap_or(Some(0)))
    }
}
