//! Stage 1 of the pipeline: inlines `#include`d template files into a
//! single text stream and builds a line table mapping positions in that
//! stream back to `(original_file, original_line)`.
//!
//! The emitted stream carries `#file PATH LINE` markers at column 0 at
//! every point the active file changes, mirroring the wording of the
//! design: later stages could re-derive locations purely from the text.
//! In practice the parser queries the authoritative [`LineTable`] built
//! alongside the markers instead of re-parsing them.

use crate::error::{Location, PreprocessorError};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

const MAX_INCLUDE_DEPTH: usize = 64;

#[derive(Debug)]
struct TableEntry {
    start: usize,
    file: Rc<str>,
    first_line: u32,
}

/// Maps byte offsets in a preprocessed stream back to source locations.
/// Binary-searchable by position, per the design.
#[derive(Debug, Default)]
pub struct LineTable {
    entries: Vec<TableEntry>,
}

impl LineTable {
    fn push(&mut self, start: usize, file: Rc<str>, first_line: u32) {
        log::trace!("rebasing to {file}:{first_line} at offset {start}");
        self.entries.push(TableEntry {
            start,
            file,
            first_line,
        });
    }

    /// Resolve a byte offset into the text this table was built from.
    pub fn resolve(&self, text: &str, pos: usize) -> Location {
        if self.entries.is_empty() {
            return Location::new("<unknown>", 0);
        }
        let idx = self.entries.partition_point(|e| e.start <= pos);
        let entry = &self.entries[idx.saturating_sub(1)];
        let pos = pos.min(text.len());
        let advanced = text[entry.start..pos].bytes().filter(|&b| b == b'\n').count() as u32;
        Location::new(entry.file.clone(), entry.first_line + advanced)
    }
}

/// The concatenated, include-expanded template source plus its line table.
pub struct Preprocessed {
    pub text: String,
    pub line_table: LineTable,
}

/// Read `root` and recursively inline every `#include`, in the order a
/// straightforward top-to-bottom read of the root file would encounter
/// them.
pub fn process(root: &Path) -> Result<Preprocessed, PreprocessorError> {
    let mut out = String::new();
    let mut table = LineTable::default();
    let mut stack = Vec::new();
    inline(root, None, &mut out, &mut table, &mut stack)?;
    Ok(Preprocessed {
        text: out,
        line_table: table,
    })
}

fn inline(
    path: &Path,
    include_site: Option<Location>,
    out: &mut String,
    table: &mut LineTable,
    stack: &mut Vec<PathBuf>,
) -> Result<(), PreprocessorError> {
    let canon = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if stack.len() >= MAX_INCLUDE_DEPTH || stack.contains(&canon) {
        return Err(PreprocessorError::IncludeCycle {
            path: path.display().to_string(),
            location: include_site.unwrap_or_else(|| Location::new(path.display().to_string(), 0)),
        });
    }

    let content = fs::read_to_string(path).map_err(|source| match &include_site {
        Some(site) => PreprocessorError::MissingInclude {
            path: path.display().to_string(),
            location: site.clone(),
            source,
        },
        None => PreprocessorError::Io {
            path: path.display().to_string(),
            source,
        },
    })?;

    stack.push(canon);

    let file_name: Rc<str> = Rc::from(path.to_string_lossy().into_owned());
    let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

    push_file_directive(out, &file_name, 1);
    table.push(out.len(), file_name.clone(), 1);
    let mut line_no: u32 = 1;

    for line in content.split_inclusive('\n') {
        let trimmed = line.trim_end_matches(['\n', '\r']);
        if let Some(inc) = parse_include(trimmed) {
            let site = Location::new(file_name.clone(), line_no);
            inline(&dir.join(&inc), Some(site), out, table, stack)?;
            push_file_directive(out, &file_name, line_no + 1);
            table.push(out.len(), file_name.clone(), line_no + 1);
        } else {
            out.push_str(line);
            if !line.ends_with('\n') {
                out.push('\n');
            }
        }
        line_no += 1;
    }

    stack.pop();
    Ok(())
}

/// Emits a `#file PATH LINE` marker at column 0: the output stream's own
/// record of which source file and line the text that follows came from,
/// consumed (and discarded) by the parser's `file_directive` rule.
fn push_file_directive(out: &mut String, file: &str, line: u32) {
    out.push_str(&format!("#file {file} {line}\n"));
}

/// Recognizes `#include "path"` or `#include <path>` at column 0.
fn parse_include(line: &str) -> Option<String> {
    let rest = line.strip_prefix("#include")?;
    let rest = rest.trim_start();
    if let Some(rest) = rest.strip_prefix('"') {
        let end = rest.find('"')?;
        Some(rest[..end].to_owned())
    } else if let Some(rest) = rest.strip_prefix('<') {
        let end = rest.find('>')?;
        Some(rest[..end].to_owned())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tmp(dir: &Path, name: &str, content: &str) -> PathBuf {
        let p = dir.join(name);
        let mut f = fs::File::create(&p).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        p
    }

    #[test]
    fn single_file_no_includes() {
        let dir = std::env::temp_dir().join(format!("bintpl-pp-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let root = write_tmp(&dir, "root.bt", "int a;\nint b;\n");

        let pre = process(&root).unwrap();
        assert_eq!(
            pre.text,
            format!("#file {} 1\nint a;\nint b;\n", root.display())
        );
        let loc = pre.line_table.resolve(&pre.text, pre.text.find("int b").unwrap());
        assert_eq!(loc.line, 2);
    }

    #[test]
    fn single_level_include() {
        let dir = std::env::temp_dir().join(format!("bintpl-pp-inc-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        write_tmp(&dir, "header.bt", "int header_field;\n");
        let root = write_tmp(&dir, "root.bt", "#include \"header.bt\"\nint root_field;\n");

        let pre = process(&root).unwrap();
        assert!(pre.text.contains("int header_field;"));
        assert!(pre.text.contains("int root_field;"));

        // A marker reopens the root file at line 2 once the include's own
        // content (and its own opening marker) has been inlined.
        assert!(pre.text.contains("#file "));
        assert!(pre.text.contains(&format!("{} 2", root.display())));

        let header_pos = pre.text.find("header_field").unwrap();
        let header_loc = pre.line_table.resolve(&pre.text, header_pos);
        assert_eq!(header_loc.line, 1);
        assert!(header_loc.file.ends_with("header.bt"));

        let root_pos = pre.text.find("root_field").unwrap();
        let root_loc = pre.line_table.resolve(&pre.text, root_pos);
        assert_eq!(root_loc.line, 2);
        assert!(root_loc.file.ends_with("root.bt"));
    }

    #[test]
    fn file_directive_markers_are_well_formed() {
        let dir = std::env::temp_dir().join(format!("bintpl-pp-marker-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let root = write_tmp(&dir, "root.bt", "int a;\n");

        let pre = process(&root).unwrap();
        let first_line = pre.text.lines().next().unwrap();
        assert!(first_line.starts_with("#file "));
        let mut parts = first_line.trim_start_matches("#file ").rsplitn(2, ' ');
        let line_no: u32 = parts.next().unwrap().parse().unwrap();
        assert_eq!(line_no, 1);
    }

    #[test]
    fn missing_include_is_an_error() {
        let dir = std::env::temp_dir().join(format!("bintpl-pp-missing-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let root = write_tmp(&dir, "root.bt", "#include \"nope.bt\"\n");
        let err = process(&root).unwrap_err();
        assert!(matches!(err, PreprocessorError::MissingInclude { .. }));
    }
}
