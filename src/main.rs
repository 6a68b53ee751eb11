use tracing::error;

#[tokio::main]
async fn main() {
    if let Err(error) = subscription_service::run().await {
        error!("Subscription service exited with error: {:#}", error);
        std::process::exit(1);
    }
}
