//! Processor state: typed stack, call frames, function table, console.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;

use bpl_common::{Config, Function, Instruction, Program, Type, ValidationLevel, Value};
use tracing::{debug, trace, warn};

use crate::console::{Console, StdConsole};
use crate::error::{RuntimeError, StackError};
use crate::stack::{Element, Stack};

/// Stack capacity used when the host does not choose one.
pub const DEFAULT_STACK_CAPACITY: usize = 1 << 20;

/// Maximum number of nested calls.
pub const MAX_CALL_DEPTH: usize = 1024;

/// A call in progress.
#[derive(Debug, Clone)]
pub struct CallFrame {
    /// Element index of the first argument; local slots count from here.
    pub first_element: usize,
    /// Declared return type of the callee.
    pub ret: Type,
}

/// A value carried out of a function body past the release of its scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnValue {
    /// Declared return type of the function that produced it.
    pub ty: Type,
    /// Stack encoding of the value.
    pub bytes: Vec<u8>,
}

/// How a block finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    /// Ran to the end; continue with the next instruction.
    Continue,
    /// A `return` is unwinding to the nearest call.
    Return(Option<ReturnValue>),
    /// A `terminate` is unwinding the whole program.
    Terminate(i64),
}

/// The BPL processor.
pub struct Processor<'a, C: Console = StdConsole> {
    /// The program being executed.
    pub(crate) program: &'a Program,
    pub(crate) config: Config,
    pub(crate) stack: Stack,
    pub(crate) frames: Vec<CallFrame>,
    /// Function literals seen so far; handle `n` is `functions[n - 1]`.
    pub(crate) functions: Vec<Function>,
    /// (body, signature) identity to handle.
    pub(crate) handles: HashMap<(usize, usize), u64>,
    pub(crate) console: C,
    pub(crate) non_blocking: bool,
    /// Stack generation the processor last observed.
    seen_generation: u64,
}

impl<'a> Processor<'a, StdConsole> {
    /// Creates a processor bound to the standard streams.
    ///
    /// At [`ValidationLevel::Basic`] and above the whole program tree is
    /// shape-checked before this returns.
    pub fn new(program: &'a Program, capacity: usize, config: Config) -> Result<Self, RuntimeError> {
        Self::with_console(program, capacity, config, StdConsole::new())
    }
}

impl<'a, C: Console> Processor<'a, C> {
    /// Creates a processor using `console` for I/O.
    pub fn with_console(
        program: &'a Program,
        capacity: usize,
        config: Config,
        console: C,
    ) -> Result<Self, RuntimeError> {
        if config.checks(ValidationLevel::Basic) {
            program.check_shape()?;
        }
        debug!(
            instructions = program.instruction_count(),
            capacity,
            validation = %config.validation,
            allow_stack_growth = config.allow_stack_growth,
            "processor created"
        );
        Ok(Self {
            program,
            config,
            stack: Stack::new(capacity, config.allow_stack_growth),
            frames: Vec::new(),
            functions: Vec::new(),
            handles: HashMap::new(),
            console,
            non_blocking: false,
            seen_generation: 0,
        })
    }

    /// Runs the program to completion.
    ///
    /// Returns the `terminate` exit code, or `None` when execution fell off
    /// the end of the program.
    pub fn run(&mut self) -> Result<Option<i64>, RuntimeError> {
        let program = self.program;
        match self.run_block(&program.instructions)? {
            Flow::Continue => Ok(None),
            Flow::Terminate(code) => Ok(Some(code)),
            Flow::Return(_) => Err(RuntimeError::ReturnOutsideFunction),
        }
    }

    /// The typed stack.
    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    /// The console.
    pub fn console(&self) -> &C {
        &self.console
    }

    /// Consumes the processor, returning its console.
    pub fn into_console(self) -> C {
        self.console
    }

    /// The policy this processor was created with.
    pub fn config(&self) -> Config {
        self.config
    }

    /// Decodes the whole element `n` positions below the top as a value.
    pub fn value_from_end(&self, n: usize) -> Option<Value> {
        let element = self.stack.whole_element_from_end(n)?;
        Value::from_bytes(element.ty.primitive()?, self.stack.bytes(element))
    }

    /// Executes instructions in order until the block ends or a control
    /// signal unwinds it.
    pub(crate) fn run_block(&mut self, instructions: &[Instruction]) -> Result<Flow, RuntimeError> {
        for instr in instructions {
            trace!(opcode = %instr.opcode, depth = self.stack.len(), "dispatch");
            let flow = self.step(instr)?;
            if self.stack.generation() != self.seen_generation {
                self.seen_generation = self.stack.generation();
                self.on_stack_resized();
            }
            if self.config.checks(ValidationLevel::Full) {
                self.stack.verify()?;
            }
            if flow != Flow::Continue {
                return Ok(flow);
            }
        }
        Ok(Flow::Continue)
    }

    /// Runs a block in a fresh scope level. The level is released whatever
    /// the outcome.
    pub(crate) fn run_scoped(&mut self, instructions: &[Instruction]) -> Result<Flow, RuntimeError> {
        self.stack.new_level();
        let flow = self.run_block(instructions);
        let released = self.stack.pop_level();
        let flow = flow?;
        released?;
        Ok(flow)
    }

    /// Evaluates a condition block. `Break` carries a control signal raised
    /// inside the condition.
    pub(crate) fn condition(
        &mut self,
        instructions: &[Instruction],
    ) -> Result<ControlFlow<Flow, bool>, RuntimeError> {
        self.stack.new_level();
        let outcome = self.run_block(instructions).and_then(|flow| {
            if flow != Flow::Continue {
                return Ok(ControlFlow::Break(flow));
            }
            let found = match self.stack.level_len() {
                1 => match self.value_from_end(0) {
                    Some(Value::Bool(b)) => return Ok(ControlFlow::Continue(b)),
                    _ => self.describe_top(),
                },
                0 => "nothing".to_string(),
                n => format!("{n} values"),
            };
            Err(RuntimeError::ConditionNotBoolean { found })
        });
        let released = self.stack.pop_level();
        let outcome = outcome?;
        released?;
        Ok(outcome)
    }

    /// Invoked after the stack buffer was reallocated. References hold leaf
    /// indices, never addresses, so nothing needs fixing up.
    fn on_stack_resized(&mut self) {
        warn!(
            capacity = self.stack.capacity(),
            generation = self.stack.generation(),
            "stack buffer reallocated"
        );
    }

    // ---- Stack helpers ----

    pub(crate) fn describe_top(&self) -> String {
        self.stack
            .whole_element_from_end(0)
            .map(|e| e.ty.to_string())
            .unwrap_or_else(|| "an empty stack".to_string())
    }

    pub(crate) fn push_value(&mut self, value: Value) -> Result<(), RuntimeError> {
        self.stack
            .push_bytes(&value.primitive().into(), &value.to_bytes())?;
        Ok(())
    }

    /// Decodes the element `n` below the top without popping it.
    pub(crate) fn peek_value(&self, n: usize, opcode: &'static str) -> Result<Value, RuntimeError> {
        let element = self
            .stack
            .whole_element_from_end(n)
            .ok_or(StackError::Empty)?;
        element
            .ty
            .primitive()
            .and_then(|p| Value::from_bytes(p, self.stack.bytes(element)))
            .ok_or_else(|| RuntimeError::UnsupportedOperand {
                opcode,
                found: element.ty.to_string(),
            })
    }

    /// Pushes a reference to leaf `leaf`.
    pub(crate) fn push_reference(&mut self, leaf: u64) -> Result<(), RuntimeError> {
        self.stack
            .push_bytes(&Type::Reference, &leaf.to_le_bytes())?;
        Ok(())
    }

    /// Reads the leaf index held by a reference element.
    pub(crate) fn reference_target(&self, element: &Element) -> Result<u64, RuntimeError> {
        if element.ty != Type::Reference {
            return Err(RuntimeError::NotAReference {
                found: element.ty.to_string(),
            });
        }
        self.stack
            .read_word(element)
            .ok_or_else(|| RuntimeError::NotAReference {
                found: element.ty.to_string(),
            })
    }

    /// Resolves the element a reference names.
    pub(crate) fn dereference(&self, leaf: u64) -> Result<Element, RuntimeError> {
        usize::try_from(leaf)
            .ok()
            .and_then(|l| self.stack.element_at(l))
            .ok_or(RuntimeError::DanglingReference { leaf })
    }

    /// Returns the handle for a function literal, registering it on first
    /// sight. Handle 0 is never issued; it is the value of a zero-filled
    /// function slot.
    pub(crate) fn function_handle(&mut self, function: &Function) -> u64 {
        let id = (function.body.id(), Arc::as_ptr(&function.signature) as usize);
        if let Some(&handle) = self.handles.get(&id) {
            return handle;
        }
        self.functions.push(function.clone());
        let handle = self.functions.len() as u64;
        self.handles.insert(id, handle);
        handle
    }

    pub(crate) fn function(&self, handle: u64) -> Result<Function, RuntimeError> {
        handle
            .checked_sub(1)
            .and_then(|i| usize::try_from(i).ok())
            .and_then(|i| self.functions.get(i))
            .cloned()
            .ok_or(RuntimeError::UnknownFunction { handle })
    }

    /// Reads the next input byte, honoring non-blocking mode. `None` when
    /// input is exhausted or, in non-blocking mode, not yet available.
    pub(crate) fn next_input(&mut self) -> Result<Option<u8>, RuntimeError> {
        if self.non_blocking && !self.console.has_input()? {
            return Ok(None);
        }
        Ok(self.console.read_byte()?)
    }
}
