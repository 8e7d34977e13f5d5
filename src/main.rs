use clap::Parser;
use clidev::config::Settings;
use clidev::exec::{CommandInvocation, exec};
use log::error;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

/// clidev - command dispatcher
///
/// Each subcommand is implemented by an npm package. The package is
/// installed into a local cache on first use, kept up to date, and its entry
/// file is run with node.
///
/// Examples:
///   clidev init my-app          # Create a project named my-app
///   clidev init --force         # Initialize the current directory, overwriting files
#[derive(Parser, Debug)]
#[command(author, version = env!("CLIDEV_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(long, short = 'd', global = true)]
    pub debug: bool,

    /// Run the package found in this directory instead of the managed cache
    #[arg(
        long = "target-path",
        short = 't',
        env = "CLI_TARGET_PATH",
        value_name = "PATH",
        global = true
    )]
    pub target_path: Option<String>,

    /// Cache root (defaults to ~/.clidev, or ~/$CLI_HOME)
    #[arg(long = "home", env = "CLI_HOME_PATH", value_name = "PATH", global = true)]
    pub home_path: Option<PathBuf>,

    /// Custom registry URL
    #[arg(long = "registry", env = "CLI_REGISTRY", value_name = "URL", global = true)]
    pub registry: Option<String>,

    /// Install from the npm mirror registry
    #[arg(long, global = true)]
    pub mirror: bool,

    /// JavaScript runtime used to run commands
    #[arg(long = "node", env = "CLI_NODE", value_name = "PATH", global = true)]
    pub node: Option<String>,

    /// Kill the command if it runs longer than this many seconds
    #[arg(long, env = "CLI_EXEC_TIMEOUT", value_name = "SECS", global = true)]
    pub timeout: Option<u64>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Initialize a project
    Init(InitArgs),
}

#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Name of the project to create
    #[arg(value_name = "PROJECT_NAME")]
    pub project_name: Option<String>,

    /// Overwrite existing files
    #[arg(short, long)]
    pub force: bool,
}

impl Cli {
    fn settings(&self) -> Settings {
        Settings {
            target_path: self.target_path.clone(),
            home_path: self.home_path.clone(),
            registry: self.registry.clone(),
            use_mirror: self.mirror,
            node: self.node.clone(),
            timeout: self.timeout.map(Duration::from_secs),
        }
    }

    fn invocation(&self) -> CommandInvocation {
        match &self.command {
            Commands::Init(args) => CommandInvocation::new("init")
                .with_argument(
                    "projectName",
                    args.project_name.clone().map_or(Value::Null, Value::from),
                )
                .with_option("force", args.force),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let level = if cli.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let runtime = clidev::runtime::RealRuntime;
    match exec(runtime, cli.settings(), cli.invocation()).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use serde_json::json;

    #[test]
    fn test_cli_init_parsing() {
        let cli = Cli::try_parse_from(["clidev", "init", "demo", "--force"]).unwrap();
        match &cli.command {
            Commands::Init(args) => {
                assert_eq!(args.project_name.as_deref(), Some("demo"));
                assert!(args.force);
            }
        }
        assert!(!cli.debug);
    }

    #[test]
    fn test_cli_invocation_payload() {
        let cli = Cli::try_parse_from(["clidev", "init", "demo", "-f"]).unwrap();
        assert_eq!(
            cli.invocation().payload(),
            json!(["demo", {"force": true}, {"force": true, "projectName": "demo"}])
        );

        let cli = Cli::try_parse_from(["clidev", "init"]).unwrap();
        assert_eq!(
            cli.invocation().payload(),
            json!([null, {"force": false}, {"force": false, "projectName": null}])
        );
    }

    #[test]
    fn test_cli_global_options_parsing() {
        let cli = Cli::try_parse_from([
            "clidev",
            "--debug",
            "init",
            "--target-path",
            "/tmp/dev-init",
            "--home",
            "/tmp/home",
            "--timeout",
            "30",
        ])
        .unwrap();

        assert!(cli.debug);
        let settings = cli.settings();
        assert_eq!(settings.target_path.as_deref(), Some("/tmp/dev-init"));
        assert_eq!(settings.home_path, Some(PathBuf::from("/tmp/home")));
        assert_eq!(settings.timeout, Some(Duration::from_secs(30)));
        assert!(!settings.use_mirror);
    }

    #[test]
    fn test_cli_no_subcommand_fails() {
        assert!(Cli::try_parse_from(["clidev"]).is_err());
        assert!(Cli::try_parse_from(["clidev", "publish"]).is_err());
    }
}
