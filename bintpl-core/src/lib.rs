//! `bintpl-core` parses and runs binary template scripts: a small C-like
//! language that lays out a byte buffer by declaring typed variables at the
//! current cursor position, the way a hex editor's scripting layer does.
//!
//! The pipeline is a straight line: [`preprocess::process`] expands
//! `#include`s into one flat source plus a line table, [`parse::parse`]
//! turns that into an [`ast::Block`], and [`interp::run`] walks the tree
//! against a [`Host`] implementation, which owns the actual buffer and
//! receives `set_data_type`/`set_comment` calls as variables are bound.
//!
//! [`run_template`] wires all three stages together for the common case of
//! running a template rooted at a file on disk.

pub mod ast;
pub mod builtins;
pub mod context;
pub mod error;
pub mod expr;
pub mod frame;
pub mod host;
pub mod interp;
pub mod parse;
pub mod preprocess;
pub mod types;
pub mod value;

pub use context::RunConfig;
pub use error::{Location, TemplateError};
pub use host::Host;

use context::ExecutionContext;
use std::path::Path;

/// Preprocess, parse and run the template rooted at `root` against `host`.
pub fn run_template(root: &Path, host: &mut dyn Host, config: RunConfig) -> Result<(), TemplateError> {
    log::info!("running template {}", root.display());
    let pre = preprocess::process(root)?;
    let block = parse::parse(&pre)?;
    let mut ctx = ExecutionContext::new(config);
    interp::run(&block, &mut ctx, host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use host::testing::RecordingHost;
    use std::fs;

    #[test]
    fn run_template_end_to_end() {
        let dir = std::env::temp_dir().join(format!("bintpl-lib-e2e-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("t.bt");
        fs::write(&path, "uint32 magic; uchar payload[4];\n").unwrap();

        let mut host = RecordingHost::new(vec![1, 0, 0, 0, b'a', b'b', b'c', b'd']);
        run_template(&path, &mut host, RunConfig::default()).unwrap();

        assert!(host.calls.iter().any(|c| matches!(
            c,
            host::testing::HostCall::SetComment { text, .. } if text == "magic"
        )));
        assert!(host.calls.iter().any(|c| matches!(
            c,
            host::testing::HostCall::SetComment { text, .. } if text == "payload[3]"
        )));
    }
}
