//! The execution context threaded through the interpreter: the frame
//! stack, the globals table, user-defined functions, the cursor, the
//! endianness flag, and the knobs a host gets to tune before a run.

use crate::ast::FuncDefn;
use crate::error::{Location, TemplateError};
use crate::frame::{FrameKind, StackFrame};
use crate::host::Host;
use crate::types::{TypeBase, TypeDescriptor};
use crate::value::Handle;
use std::collections::HashMap;
use std::rc::Rc;

/// Knobs a host picks before running a template. See the crate-level docs
/// for why these exist rather than being hardcoded constants.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// How many evaluated statements pass between calls to
    /// `Host::yield_now`. `1` yields on every statement.
    pub yield_every: u32,
    /// Frame-stack depth ceiling; a template that recurses past this
    /// (e.g. a self-referential struct with no base case) fails with
    /// `RecursionLimit` instead of exhausting the host's call stack.
    pub max_recursion_depth: usize,
    /// Initial endianness. `BigEndian()`/`LittleEndian()` toggle it at
    /// runtime; this only sets the value at the start of the run.
    pub big_endian: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            yield_every: 4096,
            max_recursion_depth: 512,
            big_endian: false,
        }
    }
}

pub struct ExecutionContext {
    frames: Vec<StackFrame>,
    pub globals: HashMap<String, (TypeDescriptor, Handle)>,
    /// Struct/enum/typedef names registered at template scope. Kept apart
    /// from frame-local `types` maps the same way `globals` is kept apart
    /// from frame-local `vars`, so a type named at template scope stays
    /// visible inside a function body even though the function frame
    /// blocks ascent into everything else declared there.
    pub global_types: HashMap<String, TypeDescriptor>,
    pub functions: HashMap<String, Rc<FuncDefn>>,
    pub next_variable: u64,
    pub big_endian: bool,
    pub config: RunConfig,
    yield_counter: u32,
}

impl ExecutionContext {
    pub fn new(config: RunConfig) -> Self {
        let big_endian = config.big_endian;
        Self {
            frames: vec![StackFrame::base()],
            globals: HashMap::new(),
            global_types: HashMap::new(),
            functions: HashMap::new(),
            next_variable: 0,
            big_endian,
            config,
            yield_counter: 0,
        }
    }

    /// Push a frame that does not recurse arbitrarily deep at runtime
    /// (loop/switch/transparent scopes): depth is bounded by the AST's own
    /// nesting, not by user data, so no recursion-limit check applies.
    pub fn push_frame(&mut self, frame: StackFrame) {
        self.frames.push(frame);
    }

    /// Push a struct or function frame, whose depth grows with the data
    /// being interpreted (struct instantiation, function calls) and can
    /// therefore recurse without bound. Enforces `max_recursion_depth`.
    pub fn push_frame_checked(
        &mut self,
        frame: StackFrame,
        loc: &Location,
        what: &str,
    ) -> Result<(), TemplateError> {
        if self.frames.len() > self.config.max_recursion_depth {
            return Err(TemplateError::RecursionLimit {
                what: what.to_owned(),
                limit: self.config.max_recursion_depth,
                location: loc.clone(),
            });
        }
        self.frames.push(frame);
        Ok(())
    }

    pub fn pop_frame(&mut self) -> StackFrame {
        self.frames.pop().expect("frame stack must never underflow")
    }

    pub fn current_frame(&self) -> &StackFrame {
        self.frames.last().expect("frame stack is never empty")
    }

    pub fn current_frame_mut(&mut self) -> &mut StackFrame {
        self.frames.last_mut().expect("frame stack is never empty")
    }

    /// Is any frame on the stack right now a function frame? Function
    /// bodies only ever push `Scope` frames for nested blocks, so this is
    /// equivalent to "are we lexically inside a function body".
    pub fn in_function(&self) -> bool {
        self.frames.iter().any(|f| f.kind == FrameKind::Function)
    }

    /// The nearest enclosing function frame, innermost first, if any.
    pub fn nearest_function_frame(&self) -> Option<&StackFrame> {
        self.frames.iter().rev().find(|f| f.kind == FrameKind::Function)
    }

    /// Frames visible to name lookup right now: innermost outwards,
    /// stopping at (and including) the first function frame encountered,
    /// per the name-lookup invariant.
    fn visible_frames(&self) -> impl Iterator<Item = &StackFrame> {
        let mut stop = false;
        self.frames.iter().rev().take_while(move |f| {
            if stop {
                return false;
            }
            if f.kind == FrameKind::Function {
                stop = true;
            }
            true
        })
    }

    pub fn find_var(&self, name: &str) -> Option<(TypeDescriptor, Handle)> {
        for frame in self.visible_frames() {
            if let Some(v) = frame.vars.get(name) {
                return Some(v.clone());
            }
        }
        self.globals.get(name).cloned()
    }

    pub fn find_type(&self, name: &str) -> Option<TypeDescriptor> {
        for frame in self.visible_frames() {
            if let Some(t) = frame.types.get(name) {
                return Some(t.clone());
            }
        }
        if let Some(t) = self.global_types.get(name) {
            return Some(t.clone());
        }
        // `string` has no `PrimitiveType` representation (it's not a fixed-size
        // wire type), so it isn't part of `primitive_alias`'s table -- it
        // resolves straight to `TypeBase::String` instead.
        if name == "string" {
            return Some(TypeDescriptor::scalar(TypeBase::String));
        }
        crate::types::primitive_alias(name)
            .map(|p| TypeDescriptor::scalar(TypeBase::Primitive(p)))
    }

    /// True when the innermost frame is a struct body being populated:
    /// the line dividing "declare into the struct's own member map" from
    /// "declare into globals/global_types" for var/type declarations (the
    /// caller has already ruled out being inside a function body).
    pub fn in_struct(&self) -> bool {
        self.current_frame().kind == FrameKind::Struct
    }

    /// Called once per evaluated statement; increments the yield counter
    /// and, every `config.yield_every` statements, calls into the host so
    /// it can pump its event loop and check for cancellation.
    pub fn tick(&mut self, host: &mut dyn Host) -> Result<(), TemplateError> {
        self.yield_counter += 1;
        log::trace!("statement #{}", self.yield_counter);
        if self.yield_counter % self.config.yield_every.max(1) == 0 {
            log::trace!("yielding to host (statement #{})", self.yield_counter);
            host.yield_now()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeBase;

    #[test]
    fn string_resolves_as_a_known_type() {
        let ctx = ExecutionContext::new(RunConfig::default());
        let ty = ctx.find_type("string").expect("`string` must resolve");
        assert_eq!(ty.base, TypeBase::String);
        assert!(!ty.is_array);
    }
}
