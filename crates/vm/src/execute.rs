//! Opcode dispatch and instruction semantics for the BPL processor.

use std::ops::ControlFlow;

use bpl_common::{Argument, Instruction, Opcode, Primitive, Type, ValidationLevel, Value};
use tracing::debug;

use crate::console::Console;
use crate::error::{RuntimeError, StackError};
use crate::machine::{CallFrame, Flow, Processor, ReturnValue, MAX_CALL_DEPTH};
use crate::stack::Element;

impl<'a, C: Console> Processor<'a, C> {
    /// Executes one instruction.
    pub(crate) fn step(&mut self, instr: &Instruction) -> Result<Flow, RuntimeError> {
        match instr.opcode {
            // Variables & references
            Opcode::Declare => self.exec_declare(instr)?,
            Opcode::GetRef => self.exec_get_ref(instr)?,
            Opcode::Set => self.exec_set()?,
            Opcode::Deref => self.exec_deref()?,
            Opcode::SubRef => self.exec_sub_ref()?,
            Opcode::Literal => self.exec_literal(instr)?,

            // Functions & control flow
            Opcode::Call => return self.exec_call(),
            Opcode::Return => return self.exec_return(),
            Opcode::If => return self.exec_if(instr),
            Opcode::While => return self.exec_while(instr),
            Opcode::Block => return self.run_scoped(instr.block_arg(0)?),
            Opcode::Terminate => return self.exec_terminate(instr),

            // Arithmetic
            Opcode::Add => self.exec_binary_arith(Opcode::Add, i64::wrapping_add, u8::wrapping_add)?,
            Opcode::Sub => self.exec_binary_arith(Opcode::Sub, i64::wrapping_sub, u8::wrapping_sub)?,
            Opcode::Mul => self.exec_binary_arith(Opcode::Mul, i64::wrapping_mul, u8::wrapping_mul)?,
            Opcode::Div => self.exec_division(Opcode::Div, i64::wrapping_div, u8::wrapping_div)?,
            Opcode::Mod => self.exec_division(Opcode::Mod, i64::wrapping_rem, u8::wrapping_rem)?,
            Opcode::Shl => self.exec_binary_arith(
                Opcode::Shl,
                |a, b| a.wrapping_shl(b as u32),
                |a, b| a.wrapping_shl(u32::from(b)),
            )?,
            Opcode::Shr => self.exec_binary_arith(
                Opcode::Shr,
                |a, b| a.wrapping_shr(b as u32),
                |a, b| a.wrapping_shr(u32::from(b)),
            )?,

            // Logic
            Opcode::And => self.exec_logic(Opcode::And, |a, b| a && b)?,
            Opcode::Or => self.exec_logic(Opcode::Or, |a, b| a || b)?,
            Opcode::Not => self.exec_not()?,

            // Comparison
            Opcode::Lt => self.exec_comparison(Opcode::Lt, |a, b| a < b, false)?,
            Opcode::Lte => self.exec_comparison(Opcode::Lte, |a, b| a <= b, false)?,
            Opcode::Gt => self.exec_comparison(Opcode::Gt, |a, b| a > b, false)?,
            Opcode::Gte => self.exec_comparison(Opcode::Gte, |a, b| a >= b, false)?,
            Opcode::Eq => self.exec_comparison(Opcode::Eq, |a, b| a == b, true)?,
            Opcode::Neq => self.exec_comparison(Opcode::Neq, |a, b| a != b, true)?,

            // Console I/O
            Opcode::PrintChar => self.exec_print_char()?,
            Opcode::PrintNumber => self.exec_print_number()?,
            Opcode::ReadChar => self.exec_read_char()?,
            Opcode::ReadNumber => self.exec_read_number()?,
            Opcode::NonBlocking => self.non_blocking = instr.bool_arg(0)?,
            Opcode::InputAvailable => {
                let available = self.console.has_input()?;
                self.push_value(Value::Bool(available))?;
            }

            // Stack control
            Opcode::Grow => self.exec_grow(instr)?,
        }
        Ok(Flow::Continue)
    }

    // ---- Variables & references ----

    fn exec_declare(&mut self, instr: &Instruction) -> Result<(), RuntimeError> {
        let ty = instr.type_arg(0)?;
        self.stack.push(ty)?;
        Ok(())
    }

    fn exec_get_ref(&mut self, instr: &Instruction) -> Result<(), RuntimeError> {
        let slot = instr.slot_arg(0)?;
        let base = match self.frames.last() {
            Some(frame) if !slot.global => frame.first_element,
            _ => 0,
        };
        let leaf = self
            .stack
            .element(base + slot.index)
            .map(|e| e.leaf)
            .ok_or(RuntimeError::SlotOutOfRange {
                index: slot.index,
                global: slot.global,
                available: self.stack.len().saturating_sub(base),
            })?;
        self.push_reference(leaf as u64)
    }

    fn exec_set(&mut self) -> Result<(), RuntimeError> {
        let value = self.top_element(0)?;
        let reference = self.top_element(1)?;
        let leaf = self.reference_target(&reference)?;
        let target = self.dereference(leaf)?;
        if target.leaf >= reference.leaf {
            return Err(RuntimeError::DanglingReference { leaf });
        }

        let mismatch = || RuntimeError::AssignMismatch {
            expected: target.ty.to_string(),
            found: value.ty.to_string(),
        };
        if target.ty.size() != value.ty.size() {
            return Err(mismatch());
        }
        if self.config.checks(ValidationLevel::Light) && !target.ty.is_assignable_from(&value.ty) {
            return Err(mismatch());
        }

        self.stack.copy(value.offset, target.offset, value.ty.size())?;
        self.stack.pop_n(2)?;
        Ok(())
    }

    fn exec_deref(&mut self) -> Result<(), RuntimeError> {
        let reference = self.top_element(0)?;
        let leaf = self.reference_target(&reference)?;
        self.stack.pop()?;
        let target = self.dereference(leaf)?;
        self.stack.push_copy(&target)?;
        Ok(())
    }

    fn exec_sub_ref(&mut self) -> Result<(), RuntimeError> {
        let index = match self.peek_value(0, "subRef")? {
            Value::Int64(index) => index,
            other => return Err(unsupported(Opcode::SubRef, other)),
        };
        let reference = self.top_element(1)?;
        let leaf = self.reference_target(&reference)?;
        self.stack.pop_n(2)?;
        if index == 0 {
            return self.push_reference(leaf);
        }

        let target = self.dereference(leaf)?;
        let sub = usize::try_from(index)
            .ok()
            .filter(|&i| i < target.ty.leaf_count())
            .ok_or_else(|| RuntimeError::SubIndexOutOfRange {
                index,
                ty: target.ty.to_string(),
            })?;
        self.push_reference((target.leaf + sub) as u64)
    }

    fn exec_literal(&mut self, instr: &Instruction) -> Result<(), RuntimeError> {
        match instr.args.first() {
            Some(Argument::Function(function)) => {
                let handle = self.function_handle(function);
                self.stack.push_bytes(&function.ty(), &handle.to_le_bytes())?;
                Ok(())
            }
            _ => {
                let value = instr.literal_arg(0)?;
                self.push_value(value)
            }
        }
    }

    // ---- Functions ----

    fn exec_call(&mut self) -> Result<Flow, RuntimeError> {
        let callee = self.top_element(0)?;
        let holder = match &callee.ty {
            Type::Reference => {
                let leaf = self.reference_target(&callee)?;
                self.dereference(leaf)?
            }
            _ => callee,
        };
        if !matches!(holder.ty, Type::Function(_)) {
            return Err(RuntimeError::NotAFunction {
                found: holder.ty.to_string(),
            });
        }
        let handle = self
            .stack
            .read_word(&holder)
            .ok_or_else(|| RuntimeError::NotAFunction {
                found: holder.ty.to_string(),
            })?;
        let function = self.function(handle)?;
        self.stack.pop()?;

        let signature = &function.signature;
        let argc = signature.params().len();
        let available = self.stack.level_len();
        if available < argc {
            return Err(RuntimeError::MissingArguments {
                expected: argc,
                found: available,
            });
        }
        if self.config.checks(ValidationLevel::Light) {
            for (i, param) in signature.params().iter().enumerate() {
                let arg = self.top_element(argc - 1 - i)?;
                if !param.is_assignable_from(&arg.ty) {
                    return Err(RuntimeError::ArgumentMismatch {
                        index: i,
                        expected: param.to_string(),
                        found: arg.ty.to_string(),
                    });
                }
            }
        }
        if self.frames.len() >= MAX_CALL_DEPTH {
            return Err(RuntimeError::CallDepthExceeded {
                limit: MAX_CALL_DEPTH,
            });
        }

        self.stack.adopt_level(argc)?;
        let first_element = self.stack.len() - argc;
        self.frames.push(CallFrame {
            first_element,
            ret: signature.ret().clone(),
        });
        debug!(depth = self.frames.len(), first_element, args = argc, "call");

        let flow = self.run_block(&function.body);
        let released = self.stack.pop_level();
        self.frames.pop();
        let flow = flow?;
        released?;
        debug!(depth = self.frames.len(), "returned");

        match flow {
            Flow::Terminate(code) => Ok(Flow::Terminate(code)),
            Flow::Return(Some(value)) => {
                self.stack.push_bytes(&value.ty, &value.bytes)?;
                Ok(Flow::Continue)
            }
            Flow::Return(None) | Flow::Continue if signature.returns_void() => Ok(Flow::Continue),
            Flow::Return(None) | Flow::Continue => Err(RuntimeError::MissingReturnValue {
                expected: signature.ret().to_string(),
            }),
        }
    }

    fn exec_return(&mut self) -> Result<Flow, RuntimeError> {
        let frame = self.frames.last().ok_or(RuntimeError::ReturnOutsideFunction)?;
        if frame.ret.is(Primitive::Void) {
            return Ok(Flow::Return(None));
        }
        let ret = frame.ret.clone();
        if self.stack.len() <= frame.first_element {
            return Err(RuntimeError::ReturnMismatch {
                expected: ret.to_string(),
                found: "nothing".to_string(),
            });
        }

        let value = self.top_element(0)?;
        let mismatch = || RuntimeError::ReturnMismatch {
            expected: ret.to_string(),
            found: value.ty.to_string(),
        };
        if value.ty.size() != ret.size() {
            return Err(mismatch());
        }
        if self.config.checks(ValidationLevel::Light) && !ret.is_assignable_from(&value.ty) {
            return Err(mismatch());
        }

        let bytes = self.stack.bytes(&value).to_vec();
        self.stack.pop()?;
        Ok(Flow::Return(Some(ReturnValue { ty: ret, bytes })))
    }

    // ---- Control flow ----

    fn exec_if(&mut self, instr: &Instruction) -> Result<Flow, RuntimeError> {
        let cond = instr.block_arg(0)?;
        let then = instr.block_arg(1)?;
        let otherwise = match instr.args.len() {
            3 => Some(instr.block_arg(2)?),
            _ => None,
        };
        match self.condition(cond)? {
            ControlFlow::Break(flow) => Ok(flow),
            ControlFlow::Continue(true) => self.run_scoped(then),
            ControlFlow::Continue(false) => match otherwise {
                Some(block) => self.run_scoped(block),
                None => Ok(Flow::Continue),
            },
        }
    }

    fn exec_while(&mut self, instr: &Instruction) -> Result<Flow, RuntimeError> {
        let cond = instr.block_arg(0)?;
        let body = instr.block_arg(1)?;
        loop {
            match self.condition(cond)? {
                ControlFlow::Break(flow) => return Ok(flow),
                ControlFlow::Continue(false) => return Ok(Flow::Continue),
                ControlFlow::Continue(true) => match self.run_scoped(body)? {
                    Flow::Continue => {}
                    flow => return Ok(flow),
                },
            }
        }
    }

    fn exec_terminate(&mut self, instr: &Instruction) -> Result<Flow, RuntimeError> {
        let code = match instr.args.len() {
            0 => 0,
            _ => instr.int_arg(0)?,
        };
        Ok(Flow::Terminate(code))
    }

    // ---- Arithmetic, logic, comparison ----

    /// Pops two primitive operands of the same type, returning `(a, b)`
    /// where `b` was on top.
    fn pop_operands(&mut self, opcode: Opcode) -> Result<(Value, Value), RuntimeError> {
        let b = self.peek_value(0, opcode.mnemonic())?;
        let a = self.peek_value(1, opcode.mnemonic())?;
        if a.primitive() != b.primitive() {
            return Err(RuntimeError::OperandMismatch {
                opcode: opcode.mnemonic(),
                left: a.primitive().name().to_string(),
                right: b.primitive().name().to_string(),
            });
        }
        self.stack.pop_n(2)?;
        Ok((a, b))
    }

    /// Binary arithmetic on two int64 or two char operands; the result has
    /// the operand type.
    fn exec_binary_arith(
        &mut self,
        opcode: Opcode,
        int_op: fn(i64, i64) -> i64,
        char_op: fn(u8, u8) -> u8,
    ) -> Result<(), RuntimeError> {
        let (a, b) = self.pop_operands(opcode)?;
        let result = match (a, b) {
            (Value::Int64(x), Value::Int64(y)) => Value::Int64(int_op(x, y)),
            (Value::Char(x), Value::Char(y)) => Value::Char(char_op(x, y)),
            _ => return Err(unsupported(opcode, a)),
        };
        self.push_value(result)
    }

    fn exec_division(
        &mut self,
        opcode: Opcode,
        int_op: fn(i64, i64) -> i64,
        char_op: fn(u8, u8) -> u8,
    ) -> Result<(), RuntimeError> {
        let (a, b) = self.pop_operands(opcode)?;
        let result = match (a, b) {
            (Value::Int64(_), Value::Int64(0)) | (Value::Char(_), Value::Char(0)) => {
                return Err(RuntimeError::DivisionByZero)
            }
            (Value::Int64(x), Value::Int64(y)) => Value::Int64(int_op(x, y)),
            (Value::Char(x), Value::Char(y)) => Value::Char(char_op(x, y)),
            _ => return Err(unsupported(opcode, a)),
        };
        self.push_value(result)
    }

    /// Comparison on int64 or char operands, and on bools when
    /// `accepts_bool` is set. Chars compare as unsigned bytes.
    fn exec_comparison(
        &mut self,
        opcode: Opcode,
        op: fn(i64, i64) -> bool,
        accepts_bool: bool,
    ) -> Result<(), RuntimeError> {
        let (a, b) = self.pop_operands(opcode)?;
        let result = match (a, b) {
            (Value::Int64(x), Value::Int64(y)) => op(x, y),
            (Value::Char(x), Value::Char(y)) => op(i64::from(x), i64::from(y)),
            (Value::Bool(x), Value::Bool(y)) if accepts_bool => op(i64::from(x), i64::from(y)),
            _ => return Err(unsupported(opcode, a)),
        };
        self.push_value(Value::Bool(result))
    }

    fn exec_logic(&mut self, opcode: Opcode, op: fn(bool, bool) -> bool) -> Result<(), RuntimeError> {
        let (a, b) = self.pop_operands(opcode)?;
        match (a, b) {
            (Value::Bool(x), Value::Bool(y)) => self.push_value(Value::Bool(op(x, y))),
            _ => Err(unsupported(opcode, a)),
        }
    }

    fn exec_not(&mut self) -> Result<(), RuntimeError> {
        match self.peek_value(0, "not")? {
            Value::Bool(x) => {
                self.stack.pop()?;
                self.push_value(Value::Bool(!x))
            }
            other => Err(unsupported(Opcode::Not, other)),
        }
    }

    // ---- Console I/O ----

    fn exec_print_char(&mut self) -> Result<(), RuntimeError> {
        match self.peek_value(0, "printChar")? {
            Value::Char(c) => {
                self.stack.pop()?;
                self.console.write(&[c])?;
                Ok(())
            }
            other => Err(unsupported(Opcode::PrintChar, other)),
        }
    }

    fn exec_print_number(&mut self) -> Result<(), RuntimeError> {
        match self.peek_value(0, "printNumber")? {
            Value::Int64(n) => {
                self.stack.pop()?;
                self.console.write(n.to_string().as_bytes())?;
                Ok(())
            }
            other => Err(unsupported(Opcode::PrintNumber, other)),
        }
    }

    fn exec_read_char(&mut self) -> Result<(), RuntimeError> {
        let byte = self.next_input()?.unwrap_or(0);
        self.push_value(Value::Char(byte))
    }

    /// Skips whitespace, then reads an optional `-` and decimal digits. The
    /// byte that ends the number is consumed. Out-of-range numbers saturate
    /// at `i64::MIN` / `i64::MAX`; the remaining digits are still consumed.
    fn exec_read_number(&mut self) -> Result<(), RuntimeError> {
        let mut byte = self.next_input()?;
        while byte.is_some_and(|b| b.is_ascii_whitespace()) {
            byte = self.next_input()?;
        }
        let negative = byte == Some(b'-');
        if negative {
            byte = self.next_input()?;
        }
        let mut n: i64 = 0;
        while let Some(digit) = byte.filter(u8::is_ascii_digit) {
            let digit = i64::from(digit - b'0');
            n = n.saturating_mul(10);
            n = if negative {
                n.saturating_sub(digit)
            } else {
                n.saturating_add(digit)
            };
            byte = self.next_input()?;
        }
        self.push_value(Value::Int64(n))
    }

    // ---- Stack control ----

    fn exec_grow(&mut self, instr: &Instruction) -> Result<(), RuntimeError> {
        let requested = instr.int_arg(0)?;
        let capacity =
            usize::try_from(requested).map_err(|_| RuntimeError::InvalidCapacity { requested })?;
        self.stack.resize(capacity)?;
        Ok(())
    }

    /// Clone of the whole element `n` below the top.
    fn top_element(&self, n: usize) -> Result<Element, RuntimeError> {
        self.stack
            .whole_element_from_end(n)
            .cloned()
            .ok_or(RuntimeError::Stack(StackError::Empty))
    }
}

fn unsupported(opcode: Opcode, operand: Value) -> RuntimeError {
    RuntimeError::UnsupportedOperand {
        opcode: opcode.mnemonic(),
        found: operand.primitive().name().to_string(),
    }
}
