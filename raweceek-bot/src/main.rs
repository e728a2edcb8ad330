use std::env;
use std::process;

use log::error;
use raweceek_bot::config::Config;
use raweceek_bot::discord;

mod cli;

fn setup_logging() {
    if env::var("LOG").is_err() {
        env::set_var("LOG", "raweceek_bot=info,raweceek_parser=info");
    }

    pretty_env_logger::init_custom_env("LOG");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_logging();

    let args = cli::parse(env::args().skip(1).collect());

    let config = match Config::load_or_prompt(&args.config) {
        Ok(config) => config,
        Err(err) => {
            error!("{err}");
            process::exit(1);
        }
    };

    discord::run(config).await
}
