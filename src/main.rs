use clap::Parser;
use fleetsync::cli::users::{handle_users_bulk, handle_users_list};
use fleetsync::cli::watch::{build_gateway, load_config_with_overrides, run_watch};
use fleetsync::cli::{
    handle_completions, handle_config_init, Cli, Commands, ConfigCommands, UsersCommands,
};

async fn run_users(cmd: UsersCommands) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        UsersCommands::List(args) => {
            let config = load_config_with_overrides(&args.connection)?;
            config.validate()?;
            let gateway = build_gateway(&config)?;
            println!("{}", handle_users_list(&args, gateway, &config).await?);
        }
        UsersCommands::Bulk(args) => {
            let config = load_config_with_overrides(&args.connection)?;
            config.validate()?;
            let gateway = build_gateway(&config)?;
            println!("{}", handle_users_bulk(&args, gateway, &config).await?);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Watch(args) => run_watch(args).await,
        Commands::Users(cmd) => run_users(cmd).await,
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Init(args) => handle_config_init(&args),
        },
        Commands::Completions(args) => {
            handle_completions(&args);
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
