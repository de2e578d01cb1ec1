use b_ec_store::app::StoreApp;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    StoreApp::run().await.inspect_err(|err| {
        eprintln!("Application errored out: {err}");
    })
}
