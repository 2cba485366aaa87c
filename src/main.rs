#[tokio::main]
async fn main() {
    let code = tg_transfer_lib::run().await;
    std::process::exit(code);
}
