#[tokio::main]
async fn main() {
    if let Err(e) = gradewise::run_evaluate_cli().await {
        eprintln!("gradewise-evaluate: {e:#}");
        std::process::exit(1);
    }
}
