//! Call frames: one per active function invocation.

use std::rc::Rc;

use crate::value::Closure;

/// The runtime activation record for one function invocation.
#[derive(Debug, Clone)]
pub struct Frame {
    /// The closure being executed.
    pub closure: Rc<Closure>,
    /// Instruction pointer into the closure's instruction stream.
    pub ip: usize,
    /// Stack index where this invocation's locals begin. Arguments occupy
    /// the first `num_parameters` slots.
    pub base_pointer: usize,
}

impl Frame {
    pub fn new(closure: Rc<Closure>, base_pointer: usize) -> Self {
        Self {
            closure,
            ip: 0,
            base_pointer,
        }
    }

    /// The instruction stream this frame executes.
    pub fn instructions(&self) -> &[u8] {
        &self.closure.function.instructions
    }
}
