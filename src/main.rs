use clap::Parser;
use git_migrator::{git_migrator_main, GitMigratorCli};
use std::process::exit;

#[tokio::main]
async fn main() {
    println!(concat!(
        env!("CARGO_PKG_NAME"),
        " ",
        env!("CARGO_PKG_VERSION")
    ));
    dotenv::dotenv().ok();
    let args = GitMigratorCli::parse();
    env_logger::builder()
        .filter_level(args.log_level())
        .parse_default_env()
        .format_target(false)
        .format_timestamp(None)
        .init();
    match git_migrator_main(args).await {
        Ok(Some(report)) => {
            exit(report.exit_code());
        }
        Ok(None) => {
            exit(0);
        }
        Err(e) => {
            eprintln!("{e}");
            exit(1);
        }
    };
}
