//! Identifier quoting.
//!
//! Every table, column and alias token that reaches SQL text goes through
//! [`write_ident`]. The dialect's quote character is doubled inside the name,
//! so an identifier can never terminate its own quoting.

/// The all-columns sentinel. Never quoted, never whitelisted.
pub const STAR: &str = "*";

/// Append `name` quoted with `quote`, escaping embedded quote characters.
pub(crate) fn write_ident(out: &mut String, name: &str, quote: char) {
    out.reserve(name.len() + 2);
    out.push(quote);
    for ch in name.chars() {
        if ch == quote {
            out.push(quote);
        }
        out.push(ch);
    }
    out.push(quote);
}

/// Append `table.column`; the `*` column is written bare.
pub(crate) fn write_qualified(out: &mut String, table: &str, column: &str, quote: char) {
    write_ident(out, table, quote);
    out.push('.');
    write_column(out, column, quote);
}

/// Append a column name; the `*` column is written bare.
pub(crate) fn write_column(out: &mut String, column: &str, quote: char) {
    if column == STAR {
        out.push_str(STAR);
    } else {
        write_ident(out, column, quote);
    }
}

/// Quote a single identifier into a new string.
pub fn quote_ident(name: &str, quote: char) -> String {
    let mut out = String::new();
    write_ident(&mut out, name, quote);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ident_simple() {
        assert_eq!(quote_ident("users", '"'), r#""users""#);
        assert_eq!(quote_ident("users", '`'), "`users`");
    }

    #[test]
    fn ident_with_embedded_quote() {
        assert_eq!(quote_ident(r#"has"quote"#, '"'), r#""has""quote""#);
        assert_eq!(quote_ident("back`tick", '`'), "`back``tick`");
    }

    #[test]
    fn ident_other_quote_untouched() {
        assert_eq!(quote_ident("it`s", '"'), "\"it`s\"");
    }

    #[test]
    fn qualified_star_is_bare() {
        let mut out = String::new();
        write_qualified(&mut out, "t", "*", '"');
        assert_eq!(out, r#""t".*"#);
    }

    #[test]
    fn qualified_column() {
        let mut out = String::new();
        write_qualified(&mut out, "t", "id", '`');
        assert_eq!(out, "`t`.`id`");
    }
}
