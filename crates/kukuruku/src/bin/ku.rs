// Short alias for `kukuruku`.
use clap::Parser;
use kukuruku::cli::{Cli, run};

fn main() {
    let cli = Cli::parse();
    std::process::exit(run(cli));
}
