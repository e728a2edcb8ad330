use std::env;
use std::path::PathBuf;
use std::process;

use getopts::Options;

pub struct Args {
    pub config: PathBuf,
}

fn opts() -> Options {
    let mut opts = Options::new();
    opts.optflag(
        "h",
        "help",
        concat!("Print the help output of ", env!("CARGO_PKG_NAME")),
    );
    opts.optopt(
        "c",
        "config",
        "Path of the JSON config file [Default: config.json]",
        "PATH",
    );
    opts
}

pub fn parse(args: Vec<String>) -> Args {
    let opts = opts();

    let matches = match opts.parse(args) {
        Ok(matches) => matches,
        Err(fail) => {
            eprintln!("{fail}");
            process::exit(1);
        }
    };

    if matches.opt_present("help") {
        println!("{}", opts.usage(&opts.short_usage(env!("CARGO_PKG_NAME"))));
        process::exit(0);
    }

    let config = matches
        .opt_str("config")
        .map_or_else(|| PathBuf::from("config.json"), PathBuf::from);

    Args { config }
}
