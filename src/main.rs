use std::{env, process};

use xss_lab::{app, cli, Result};

fn main() -> Result<()> {
    pretty_env_logger::init_timed();

    let config = cli::parse(env::args_os()).unwrap_or_else(|e| e.exit());
    log::debug!("Running here: {}", env::current_dir()?.to_string_lossy());

    let config = match config.resolve() {
        Ok(config) => config,
        Err(e) => {
            println!("Error: {}", e);
            if let Some(hint) = e.hint() {
                println!("{}", hint);
            }
            process::exit(1);
        }
    };

    app::serve_static(config)
}
