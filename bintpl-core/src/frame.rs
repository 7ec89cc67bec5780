//! Stack frames and the flow-control sentinel used to propagate
//! `return`/`break`/`continue` up the frame stack.

use crate::error::{Location, TemplateError};
use crate::types::TypeDescriptor;
use crate::value::{Handle, Scalar};
use std::collections::HashMap;

/// One of the three statement kinds that can unwind out of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    Return,
    Break,
    Continue,
}

/// A subset of `{Return, Break, Continue}`, used to describe which flow
/// kinds a frame consumes (`handles`) and which it forbids from crossing
/// it at all (`blocks`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowMask {
    pub return_: bool,
    pub break_: bool,
    pub continue_: bool,
}

impl FlowMask {
    pub const NONE: Self = Self {
        return_: false,
        break_: false,
        continue_: false,
    };

    pub const fn of(kinds: &[FlowKind]) -> Self {
        let mut m = Self::NONE;
        let mut i = 0;
        while i < kinds.len() {
            match kinds[i] {
                FlowKind::Return => m.return_ = true,
                FlowKind::Break => m.break_ = true,
                FlowKind::Continue => m.continue_ = true,
            }
            i += 1;
        }
        m
    }

    pub fn contains(&self, kind: FlowKind) -> bool {
        match kind {
            FlowKind::Return => self.return_,
            FlowKind::Break => self.break_,
            FlowKind::Continue => self.continue_,
        }
    }
}

/// The result of executing a statement or block: either nothing unusual
/// happened, or one of the three flow-control kinds is unwinding, carrying
/// its payload (a return value, if any and if the function isn't void).
#[derive(Debug, Clone)]
pub enum Flow {
    Normal,
    Return(Option<(TypeDescriptor, Scalar)>, Location),
    Break(Location),
    Continue(Location),
}

impl Flow {
    pub fn kind(&self) -> Option<FlowKind> {
        match self {
            Flow::Normal => None,
            Flow::Return(..) => Some(FlowKind::Return),
            Flow::Break(_) => Some(FlowKind::Break),
            Flow::Continue(_) => Some(FlowKind::Continue),
        }
    }

    pub fn location(&self) -> Option<&Location> {
        match self {
            Flow::Normal => None,
            Flow::Return(_, loc) | Flow::Break(loc) | Flow::Continue(loc) => Some(loc),
        }
    }

    /// Raise the user-facing error for a flow kind that reached a frame
    /// blocking it (see `StackFrame::blocks`).
    pub fn into_blocked_error(self) -> TemplateError {
        match self {
            Flow::Normal => unreachable!("Flow::Normal is never blocked"),
            Flow::Return(_, location) => TemplateError::ReturnOutsideFunction { location },
            Flow::Break(location) => TemplateError::BreakOutsideLoop { location },
            Flow::Continue(location) => TemplateError::ContinueOutsideLoop { location },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Base,
    Struct,
    Function,
    Scope,
}

/// One stack frame: local bindings, in-scope type names, and the
/// flow-control masks that govern how `return`/`break`/`continue` cross it.
pub struct StackFrame {
    pub kind: FrameKind,
    pub vars: HashMap<String, (TypeDescriptor, Handle)>,
    pub types: HashMap<String, TypeDescriptor>,
    pub handles: FlowMask,
    pub blocks: FlowMask,
    /// Function frames only: the declared return type.
    pub ret_type: Option<TypeDescriptor>,
    /// Struct frames only: members bound so far, in declaration order.
    pub struct_members: Vec<(String, TypeDescriptor, Handle)>,
}

impl StackFrame {
    pub fn new(kind: FrameKind, handles: FlowMask, blocks: FlowMask) -> Self {
        Self {
            kind,
            vars: HashMap::new(),
            types: HashMap::new(),
            handles,
            blocks,
            ret_type: None,
            struct_members: Vec::new(),
        }
    }

    pub fn base() -> Self {
        Self::new(
            FrameKind::Base,
            FlowMask::NONE,
            FlowMask::of(&[FlowKind::Return, FlowKind::Break, FlowKind::Continue]),
        )
    }

    pub fn transparent_scope() -> Self {
        Self::new(FrameKind::Scope, FlowMask::NONE, FlowMask::NONE)
    }

    pub fn loop_scope() -> Self {
        Self::new(
            FrameKind::Scope,
            FlowMask::of(&[FlowKind::Break, FlowKind::Continue]),
            FlowMask::NONE,
        )
    }

    pub fn switch_scope() -> Self {
        Self::new(
            FrameKind::Scope,
            FlowMask::of(&[FlowKind::Break]),
            FlowMask::NONE,
        )
    }

    pub fn function(ret_type: TypeDescriptor) -> Self {
        let mut f = Self::new(
            FrameKind::Function,
            FlowMask::of(&[FlowKind::Return]),
            FlowMask::of(&[FlowKind::Break, FlowKind::Continue]),
        );
        f.ret_type = Some(ret_type);
        f
    }

    pub fn struct_frame() -> Self {
        Self::new(
            FrameKind::Struct,
            FlowMask::NONE,
            FlowMask::of(&[FlowKind::Return, FlowKind::Break, FlowKind::Continue]),
        )
    }

    /// After running this frame's body, resolve the flow it produced
    /// against this frame's masks: consumed flows become `Flow::Normal`
    /// (or, for `Return` on a function frame, are returned to the caller
    /// separately), blocked flows become an error, anything else keeps
    /// propagating upward unchanged.
    pub fn resolve(&self, flow: Flow) -> Result<Flow, TemplateError> {
        let Some(kind) = flow.kind() else {
            return Ok(Flow::Normal);
        };
        if self.blocks.contains(kind) {
            return Err(flow.into_blocked_error());
        }
        if self.handles.contains(kind) {
            return Ok(Flow::Normal);
        }
        Ok(flow)
    }
}
