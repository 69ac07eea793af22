use xss_lab::{app, Result};

fn main() -> Result<()> {
    pretty_env_logger::init_timed();
    app::serve_exfil()
}
