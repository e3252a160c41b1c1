mod cli;
mod compile_cmd;
mod config_check;
mod description;

pub use description::Description;

pub async fn run(args: Vec<String>) -> anyhow::Result<()> {
    let cmd = cli::parse_args(&args)?;
    match cmd {
        cli::Command::Help(topic) => {
            cli::print_help(topic);
            Ok(())
        }
        cli::Command::Compile(args) => compile_cmd::run(args),
        cli::Command::Config(cmd) => match cmd {
            cli::ConfigCommand::Check(args) => config_check::run(args).await,
        },
    }
}
