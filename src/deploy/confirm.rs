// ABOUTME: Operator confirmation for production deploys and rollbacks.
// ABOUTME: Only the exact token "yes" (surrounding whitespace ignored) confirms.

use std::io::{self, BufRead};

pub const CONFIRMATION_TOKEN: &str = "yes";

/// Read one line from `reader` and check it against the confirmation token.
/// End of input counts as a refusal.
pub fn read_confirmation<R: BufRead>(reader: &mut R) -> io::Result<bool> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(false);
    }
    Ok(line.trim() == CONFIRMATION_TOKEN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn exact_yes_confirms() {
        assert!(read_confirmation(&mut Cursor::new("yes\n")).unwrap());
        assert!(read_confirmation(&mut Cursor::new("  yes  \r\n")).unwrap());
    }

    #[test]
    fn anything_else_refuses() {
        for input in ["", "\n", "y\n", "YES\n", "yes please\n", "no\n"] {
            assert!(
                !read_confirmation(&mut Cursor::new(input)).unwrap(),
                "{:?} should not confirm",
                input
            );
        }
    }
}
