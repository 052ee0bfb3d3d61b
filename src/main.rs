#[tokio::main]
async fn main() {
    canteen_kiosk::start_server().await;
}
