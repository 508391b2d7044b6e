// src/main.rs

use wavebuild::{cli, logging, run};

#[tokio::main]
async fn main() {
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("wavebuild: {err:#}");
    }

    match run(args).await {
        Ok(result) => std::process::exit(result.exit_code()),
        Err(err) => {
            eprintln!("wavebuild error: {err}");
            std::process::exit(err.exit_code());
        }
    }
}
