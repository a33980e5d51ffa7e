use std::io::{self, Write};

use colored::Colorize;

use crate::embed::VirtualFileSet;
use crate::filesystem::is_hidden;

/// Prints the paths of `set` at or below `prefix`, one per line.
///
/// With `color`, paths with a hidden segment are dimmed. In long form each
/// line is prefixed with the file size and its digest.
pub fn write_listing(
    out: &mut impl Write,
    set: &VirtualFileSet,
    prefix: Option<&str>,
    long: bool,
    color: bool,
) -> io::Result<()> {
    for path in set.list(prefix.unwrap_or("")) {
        let shown = if color && path.split('/').any(is_hidden) {
            path.dimmed().to_string()
        } else {
            path.to_string()
        };
        if long {
            let file = set
                .get(path)
                .map_err(|err| io::Error::new(io::ErrorKind::NotFound, err))?;
            writeln!(out, "{:>10}  {:016x}  {shown}", file.len(), file.digest())?;
        } else {
            writeln!(out, "{shown}")?;
        }
    }
    out.flush()
}
