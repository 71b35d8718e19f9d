#[tokio::main]
async fn main() {
    larapg_cli::init_tracing();
    if let Err(e) = larapg_cli::run(std::env::args().collect()).await {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}
