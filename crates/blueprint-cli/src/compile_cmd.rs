use crate::cli::CompileArgs;
use crate::description::Description;
use anyhow::Context;
use blueprint::source::to_positional;
use std::io::Read;

pub fn run(args: CompileArgs) -> anyhow::Result<()> {
    let raw = match &args.file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| anyhow::anyhow!("failed to read stdin: {e}"))?;
            if buf.trim().is_empty() {
                anyhow::bail!("no statement description provided (pass a file or pipe JSON to stdin)");
            }
            buf
        }
    };

    print!("{}", render(&raw, &args)?);
    Ok(())
}

/// Compile a description and format the command output.
pub fn render(raw: &str, args: &CompileArgs) -> anyhow::Result<String> {
    let description = Description::from_json_str(raw)?;
    let compiled = description.to_query(args.dialect)?.to_compiled()?;
    tracing::debug!(dialect = %args.dialect, bindings = compiled.bindings.len(), "compiled description");

    let mut out = String::new();
    out.push_str(compiled.sql.trim_end());
    out.push('\n');
    out.push_str(&serde_json::to_string_pretty(&compiled.bindings)?);
    out.push('\n');

    if args.positional {
        let style = args.dialect.spec().positional;
        let (sql, params) = to_positional(&compiled.sql, &compiled.bindings, style)?;
        out.push('\n');
        out.push_str(sql.trim_end());
        out.push('\n');
        out.push_str(&serde_json::to_string(&params)?);
        out.push('\n');
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use blueprint::Dialect;

    fn args(dialect: Dialect, positional: bool) -> CompileArgs {
        CompileArgs {
            dialect,
            positional,
            file: None,
        }
    }

    #[test]
    fn prints_sql_then_bindings() {
        let out = render(
            r#"{"type": "delete", "table": "users", "where": [{"conditions": {"id": 3}}]}"#,
            &args(Dialect::MySql, false),
        )
        .unwrap();
        assert_eq!(
            out,
            "DELETE FROM `users` WHERE (`users`.`id` = :wh0)\n{\n  \":wh0\": 3\n}\n"
        );
    }

    #[test]
    fn positional_form_is_appended() {
        let out = render(
            r#"{"type": "update", "table": "users", "set": {"name": "x"}, "where": [{"conditions": {"id": 3}}]}"#,
            &args(Dialect::Postgres, true),
        )
        .unwrap();
        let tail: Vec<&str> = out.lines().rev().take(2).collect();
        assert_eq!(tail[0], r#"["x",3]"#);
        assert_eq!(tail[1], r#"UPDATE "users" SET "name" = $1 WHERE ("users"."id" = $2)"#);
    }
}
