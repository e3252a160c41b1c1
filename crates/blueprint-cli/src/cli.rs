use blueprint::Dialect;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelpTopic {
    Root,
    Compile,
    Config,
    ConfigCheck,
}

#[derive(Debug, Clone)]
pub enum Command {
    Help(HelpTopic),
    Compile(CompileArgs),
    Config(ConfigCommand),
}

#[derive(Debug, Clone)]
pub struct CompileArgs {
    pub dialect: Dialect,
    pub positional: bool,
    /// `None` reads the description from stdin.
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub enum ConfigCommand {
    Check(ConfigCheckArgs),
}

#[derive(Debug, Clone)]
pub struct ConfigCheckArgs {
    pub config: PathBuf,
    pub connect: bool,
}

pub fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    let mut it = args.iter().skip(1);
    let Some(first) = it.next() else {
        return Ok(Command::Help(HelpTopic::Root));
    };

    match first.as_str() {
        "-h" | "--help" | "help" => Ok(Command::Help(HelpTopic::Root)),
        "compile" => parse_compile(it.map(|s| s.as_str())),
        "config" => parse_config(it.map(|s| s.as_str())),
        _ => anyhow::bail!("unknown command: {first}"),
    }
}

fn parse_compile<'a>(mut it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let mut dialect = Dialect::MySql;
    let mut positional = false;
    let mut file: Option<PathBuf> = None;

    while let Some(token) = it.next() {
        match token {
            "-h" | "--help" => return Ok(Command::Help(HelpTopic::Compile)),
            "--dialect" => {
                let Some(v) = it.next() else {
                    anyhow::bail!("--dialect requires a value");
                };
                dialect = parse_dialect(v)?;
            }
            _ if token.starts_with("--dialect=") => {
                dialect = parse_dialect(token.trim_start_matches("--dialect="))?;
            }
            "--positional" => positional = true,
            other if other.starts_with('-') && other != "-" => {
                anyhow::bail!("unknown argument: {other}")
            }
            other => {
                if file.is_some() {
                    anyhow::bail!("unexpected positional argument: {other}");
                }
                if other != "-" {
                    file = Some(PathBuf::from(other));
                }
            }
        }
    }

    Ok(Command::Compile(CompileArgs {
        dialect,
        positional,
        file,
    }))
}

fn parse_dialect(v: &str) -> anyhow::Result<Dialect> {
    v.parse::<Dialect>()
        .map_err(|_| anyhow::anyhow!("invalid --dialect value: {v} (expected mysql or postgres)"))
}

fn parse_config<'a>(mut it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let mut subcmd: Option<&str> = None;
    let mut config = PathBuf::from("blueprint.toml");
    let mut connect = false;

    while let Some(token) = it.next() {
        match token {
            "-h" | "--help" => {
                return Ok(Command::Help(match subcmd {
                    None => HelpTopic::Config,
                    Some("check") => HelpTopic::ConfigCheck,
                    Some(other) => anyhow::bail!("unknown subcommand: {other}"),
                }));
            }
            "check" if subcmd.is_none() => {
                subcmd = Some(token);
            }
            "--config" => {
                let Some(v) = it.next() else {
                    anyhow::bail!("--config requires a value");
                };
                config = PathBuf::from(v);
            }
            _ if token.starts_with("--config=") => {
                config = PathBuf::from(token.trim_start_matches("--config="));
            }
            "--connect" => connect = true,
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }

    let cmd = match subcmd {
        None => return Ok(Command::Help(HelpTopic::Config)),
        Some("check") => ConfigCommand::Check(ConfigCheckArgs { config, connect }),
        Some(other) => anyhow::bail!("unknown subcommand: {other}"),
    };

    Ok(Command::Config(cmd))
}

pub fn print_help(topic: HelpTopic) {
    match topic {
        HelpTopic::Root => {
            println!(
                "\
blueprint - whitelist-guarded SQL statement compiler

USAGE:
  blueprint <COMMAND> [OPTIONS]

COMMANDS:
  compile               Compile a JSON statement description to SQL
  config check          Validate a connection config file
  help                  Print this message

Run `blueprint <command> --help` for more."
            );
        }
        HelpTopic::Compile => {
            println!(
                "\
USAGE:
  blueprint compile [OPTIONS] [FILE]

NOTES:
  Reads the description from stdin when FILE is omitted or `-`.
  Keys: type, table, whitelist, columns, joins, where, order, group,
  aggregates, set, records, limit, count.

OPTIONS:
  --dialect <NAME>      mysql or postgres (default: mysql)
  --positional          Also print the driver form ($1 or ?) with ordered params
  -h, --help            Print help"
            );
        }
        HelpTopic::Config => {
            println!(
                "\
USAGE:
  blueprint config check [OPTIONS]

SUBCOMMANDS:
  check                 Load, expand and validate the [database] table

Run `blueprint config check --help` for more."
            );
        }
        HelpTopic::ConfigCheck => {
            println!(
                "\
USAGE:
  blueprint config check [OPTIONS]

NOTES:
  A .env file in the working directory is loaded before `${{VAR}}` expansion.

OPTIONS:
  --config <FILE>       Config file path (default: blueprint.toml)
  --connect             Open a connection and run `SELECT 1`
  -h, --help            Print help"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("blueprint")
            .chain(list.iter().copied())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn no_args_prints_root_help() {
        assert!(matches!(
            parse_args(&args(&[])).unwrap(),
            Command::Help(HelpTopic::Root)
        ));
        assert!(matches!(
            parse_args(&args(&["help"])).unwrap(),
            Command::Help(HelpTopic::Root)
        ));
    }

    #[test]
    fn parse_compile_with_dialect() {
        let cmd = parse_args(&args(&["compile", "--dialect=pgsql", "--positional", "q.json"])).unwrap();
        let Command::Compile(c) = cmd else {
            panic!("expected compile");
        };
        assert_eq!(c.dialect, Dialect::Postgres);
        assert!(c.positional);
        assert_eq!(c.file, Some(PathBuf::from("q.json")));
    }

    #[test]
    fn parse_compile_stdin() {
        let Command::Compile(c) = parse_args(&args(&["compile", "-"])).unwrap() else {
            panic!("expected compile");
        };
        assert_eq!(c.dialect, Dialect::MySql);
        assert_eq!(c.file, None);
    }

    #[test]
    fn parse_compile_rejects_bad_input() {
        assert!(parse_args(&args(&["compile", "--dialect", "oracle"])).is_err());
        assert!(parse_args(&args(&["compile", "--dialect"])).is_err());
        assert!(parse_args(&args(&["compile", "a.json", "b.json"])).is_err());
        assert!(parse_args(&args(&["compile", "--verbose"])).is_err());
    }

    #[test]
    fn parse_config_check() {
        let cmd = parse_args(&args(&["config", "check", "--config", "db.toml", "--connect"])).unwrap();
        let Command::Config(ConfigCommand::Check(c)) = cmd else {
            panic!("expected config check");
        };
        assert_eq!(c.config, PathBuf::from("db.toml"));
        assert!(c.connect);

        let Command::Config(ConfigCommand::Check(c)) =
            parse_args(&args(&["config", "check"])).unwrap()
        else {
            panic!("expected config check");
        };
        assert_eq!(c.config, PathBuf::from("blueprint.toml"));
        assert!(!c.connect);
    }

    #[test]
    fn parse_config_help_topics() {
        assert!(matches!(
            parse_args(&args(&["config"])).unwrap(),
            Command::Help(HelpTopic::Config)
        ));
        assert!(matches!(
            parse_args(&args(&["config", "check", "--help"])).unwrap(),
            Command::Help(HelpTopic::ConfigCheck)
        ));
        assert!(parse_args(&args(&["config", "push"])).is_err());
    }

    #[test]
    fn unknown_command() {
        assert!(parse_args(&args(&["migrate"])).is_err());
    }
}
